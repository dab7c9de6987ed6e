//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `EFRIS_LOG_LEVEL`: Filter-Ausdruck (z.B. `info` oder `efris_client=debug`), Standard: info
//! - `EFRIS_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Schluessel, Sitzungsschluessel und Passwoerter erscheinen nie im Log,
//! nur der Fingerprint des Zertifikatsschluessels.

use tracing_subscriber::{fmt, EnvFilter};

pub const LEVEL_VARIABLE: &str = "EFRIS_LOG_LEVEL";
pub const FORMAT_VARIABLE: &str = "EFRIS_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen haben Vorrang vor den uebergebenen Werten.
/// Ein zweiter Aufruf im selben Prozess ist wirkungslos.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LEVEL_VARIABLE)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var(FORMAT_VARIABLE).unwrap_or_else(|_| format.to_string());

    let ergebnis = match format_env.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init(),
        _ => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging bereits initialisiert");
    }
}

/// Prueft einen Filter-Ausdruck: jede Direktive endet auf eine bekannte
/// Stufe, mit oder ohne Ziel (`info`, `efris_client=debug,warn`).
pub fn log_level_gueltig(level: &str) -> bool {
    !level.trim().is_empty()
        && level.split(',').all(|direktive| {
            let stufe = direktive.rsplit('=').next().unwrap_or_default().trim();
            matches!(stufe, "trace" | "debug" | "info" | "warn" | "error" | "off")
        })
}

pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
