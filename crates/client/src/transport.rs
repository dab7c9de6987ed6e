//! Netzwerk-Transport
//!
//! Einzige Stelle mit Netzwerkzugriff: ein POST mit JSON-Rumpf, Antwort als
//! Status plus Text. Tests ersetzen den Transport durch eine In-Memory-Gegenstelle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client};

use efris_core::{EfrisError, Result};

use crate::config::TransportEinstellungen;

/// Rohe HTTP-Antwort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportAntwort {
    pub status: u16,
    pub body: String,
}

impl TransportAntwort {
    /// 2xx
    pub fn ist_erfolgreich(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fuehrt genau einen Anfrage/Antwort-Austausch durch (keine Wiederholung)
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: String) -> Result<TransportAntwort>;
}

/// HTTPS-Transport ueber reqwest (rustls)
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn neu(einstellungen: &TransportEinstellungen) -> Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(einstellungen.timeout_sekunden))
            .connect_timeout(Duration::from_secs(einstellungen.verbindungs_timeout_sekunden));

        if let Some(pfad) = &einstellungen.ca_zertifikat {
            let pem = std::fs::read(pfad).map_err(|e| {
                EfrisError::api(format!("CA-Zertifikat '{pfad}' nicht lesbar: {e}"), None, None)
            })?;
            let zertifikat = Certificate::from_pem(&pem).map_err(|e| {
                EfrisError::api(format!("CA-Zertifikat '{pfad}' ungueltig: {e}"), None, None)
            })?;
            builder = builder.add_root_certificate(zertifikat);
        }

        if einstellungen.zertifikate_nicht_pruefen {
            tracing::warn!("TLS-Zertifikatspruefung deaktiviert, nur fuer Testumgebungen geeignet");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            EfrisError::api(format!("HTTP-Client nicht erstellbar: {e}"), None, None)
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: String) -> Result<TransportAntwort> {
        let antwort = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let status = e.status().map(|s| s.as_u16());
                if e.is_connect() {
                    EfrisError::api(format!("Keine Verbindung zu {url}"), status, None)
                } else if e.is_timeout() {
                    EfrisError::api(format!("Zeitueberschreitung bei {url}"), status, None)
                } else {
                    EfrisError::api(format!("HTTP-Anfrage fehlgeschlagen: {e}"), status, None)
                }
            })?;

        let status = antwort.status().as_u16();
        let body = antwort.text().await.map_err(|e| {
            EfrisError::api(format!("Antwort nicht lesbar: {e}"), Some(status), None)
        })?;

        tracing::debug!(url, status, laenge = body.len(), "HTTP-Austausch abgeschlossen");
        Ok(TransportAntwort { status, body })
    }
}
