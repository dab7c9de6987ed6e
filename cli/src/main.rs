//! efris-schluessel – Diagnose fuer Zertifikat und Sitzungsschluessel
//!
//! Laedt die Konfiguration, prueft den Geraeteschluessel und erzwingt einen
//! Schluesselaustausch mit der konfigurierten Gegenstelle.

use std::process::ExitCode;

use anyhow::Result;
use efris_client::config::LoggingEinstellungen;
use efris_client::{ClientConfig, Dispatcher};
use efris_core::EfrisError;
use efris_observability::{log_format_gueltig, log_level_gueltig, logging_initialisieren};

const STANDARD_LEVEL: &str = "info";
const STANDARD_FORMAT: &str = "text";

#[tokio::main]
async fn main() -> ExitCode {
    match ausfuehren().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Fehlerart zuerst, damit Skripte darauf reagieren koennen
            match e.downcast_ref::<EfrisError>() {
                Some(fehler) => eprintln!("{}: {}", fehler.art(), fehler.nachricht()),
                None => eprintln!("Fehler: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn ausfuehren() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("EFRIS_CONFIG").unwrap_or_else(|_| "efris.toml".into());

    let mut config = ClientConfig::laden(&config_pfad)?;
    config.umgebung_anwenden();

    let (level, format, verworfen) = logging_werte(&config.logging);
    logging_initialisieren(level, format);
    for (feld, wert) in verworfen {
        tracing::warn!(feld, wert, "Ungueltiger Logging-Wert, Standard wird verwendet");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        sandbox = config.endpunkt.sandbox,
        "efris-schluessel wird initialisiert"
    );

    let dispatcher = Dispatcher::aus_config(&config)?;
    let sitzung = dispatcher.session();

    let fingerprint = sitzung.credentials().fingerprint()?;
    println!("Zertifikat:   {fingerprint}");
    println!("Endpunkt:     {}", config.endpunkt.url());

    let schluessel = sitzung.fetch_session_key(true).await?;
    let gueltig_bis = chrono::DateTime::from_timestamp(schluessel.valid_until(), 0)
        .map(|zeit| zeit.to_rfc3339())
        .unwrap_or_else(|| schluessel.valid_until().to_string());

    println!("Schluessel:   {} Bytes", schluessel.laenge());
    println!("Gueltig bis:  {gueltig_bis}");
    Ok(())
}

/// Wirksame Logging-Werte; ungueltige Angaben fallen auf den Standard
/// zurueck und werden als (Feld, Wert) gemeldet.
fn logging_werte(logging: &LoggingEinstellungen) -> (&str, &str, Vec<(&'static str, &str)>) {
    let mut verworfen = Vec::new();

    let level = if log_level_gueltig(&logging.level) {
        logging.level.as_str()
    } else {
        verworfen.push(("logging.level", logging.level.as_str()));
        STANDARD_LEVEL
    };
    let format = if log_format_gueltig(&logging.format) {
        logging.format.as_str()
    } else {
        verworfen.push(("logging.format", logging.format.as_str()));
        STANDARD_FORMAT
    };

    (level, format, verworfen)
}
