//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen und danach durch
//! Umgebungsvariablen ueberschrieben. Alle Felder haben Standardwerte,
//! sodass nur Zertifikat und Absender zwingend gesetzt werden muessen.

use serde::{Deserialize, Serialize};

use efris_protocol::Absender;

pub const STANDARD_SANDBOX_URL: &str = "https://efristest.ura.go.ug/efrisws/ws/taapp/getInformation";
pub const STANDARD_PRODUKTION_URL: &str = "https://efrisws.ura.go.ug/ws/taapp/getInformation";

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gegenstelle (Sandbox oder Produktion)
    pub endpunkt: EndpunktEinstellungen,
    /// Kennungen des Steuerpflichtigen und Geraets
    pub absender: Absender,
    /// PKCS#12-Container mit dem Geraeteschluessel
    pub zertifikat: ZertifikatEinstellungen,
    /// HTTP-Transport (Timeouts, TLS-Vertrauen)
    pub transport: TransportEinstellungen,
    /// Sitzungsschluessel-Cache
    pub sitzung: SitzungEinstellungen,
    pub logging: LoggingEinstellungen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpunktEinstellungen {
    /// `true` = Testumgebung
    pub sandbox: bool,
    pub sandbox_url: String,
    pub produktion_url: String,
}

impl Default for EndpunktEinstellungen {
    fn default() -> Self {
        Self {
            sandbox: true,
            sandbox_url: STANDARD_SANDBOX_URL.into(),
            produktion_url: STANDARD_PRODUKTION_URL.into(),
        }
    }
}

impl EndpunktEinstellungen {
    /// URL der aktiven Umgebung
    pub fn url(&self) -> &str {
        if self.sandbox {
            &self.sandbox_url
        } else {
            &self.produktion_url
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZertifikatEinstellungen {
    /// Pfad zur `.p12`/`.pfx`-Datei
    pub pfad: Option<String>,
    pub passwort: String,
}

impl std::fmt::Debug for ZertifikatEinstellungen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZertifikatEinstellungen")
            .field("pfad", &self.pfad)
            .field("passwort", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportEinstellungen {
    /// Gesamt-Timeout pro Anfrage
    pub timeout_sekunden: u64,
    pub verbindungs_timeout_sekunden: u64,
    /// Zusaetzliche Vertrauensbasis (PEM)
    pub ca_zertifikat: Option<String>,
    /// Deaktiviert die Zertifikatspruefung (nur fuer Testumgebungen)
    pub zertifikate_nicht_pruefen: bool,
}

impl Default for TransportEinstellungen {
    fn default() -> Self {
        Self {
            timeout_sekunden: 30,
            verbindungs_timeout_sekunden: 10,
            ca_zertifikat: None,
            zertifikate_nicht_pruefen: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungEinstellungen {
    /// Lebensdauer eines Sitzungsschluessels (Standard: 23 Stunden)
    pub ttl_sekunden: i64,
}

impl Default for SitzungEinstellungen {
    fn default() -> Self {
        Self {
            ttl_sekunden: crate::session_key::STANDARD_TTL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter-Ausdruck, z.B. "info" oder "efris_client=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Uebernimmt `EFRIS_MODE`, `EFRIS_CERT_PATH`, `EFRIS_CERT_PASSWORD`,
    /// `EFRIS_TIN` und `EFRIS_DEVICE_NO` aus der Umgebung
    pub fn umgebung_anwenden(&mut self) {
        self.ueberschreiben(|name| std::env::var(name).ok());
    }

    fn ueberschreiben(&mut self, lesen: impl Fn(&str) -> Option<String>) {
        if let Some(modus) = lesen("EFRIS_MODE") {
            match modus.to_ascii_lowercase().as_str() {
                "production" | "produktion" => self.endpunkt.sandbox = false,
                "sandbox" => self.endpunkt.sandbox = true,
                _ => tracing::warn!(modus = %modus, "Unbekannter EFRIS_MODE, Einstellung bleibt"),
            }
        }
        if let Some(pfad) = lesen("EFRIS_CERT_PATH") {
            self.zertifikat.pfad = Some(pfad);
        }
        if let Some(passwort) = lesen("EFRIS_CERT_PASSWORD") {
            self.zertifikat.passwort = passwort;
        }
        if let Some(tin) = lesen("EFRIS_TIN") {
            self.absender.tin = tin;
        }
        if let Some(device_no) = lesen("EFRIS_DEVICE_NO") {
            self.absender.device_no = device_no;
        }
    }
}
