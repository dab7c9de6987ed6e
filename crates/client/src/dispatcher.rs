//! Dispatcher
//!
//! Verbindet Schnittstellen-Verzeichnis, Sitzungsschluessel, Umschlag-Codec
//! und Transport zu einem Aufruf pro Operation.

use std::sync::Arc;

use serde_json::Value;

use efris_core::{EfrisError, Result};
use efris_crypto::{
    build_encrypted_request, build_unencrypted_request, unwrap_response, CredentialStore,
};
use efris_protocol::{Envelope, InterfaceRegistry};

use crate::config::ClientConfig;
use crate::session_key::SessionKeyManager;
use crate::transport::HttpTransport;

pub struct Dispatcher {
    registry: InterfaceRegistry,
    sitzung: Arc<SessionKeyManager>,
}

impl Dispatcher {
    /// Transport, Zertifikat, Absender und URL stammen vom `SessionKeyManager`
    pub fn new(registry: InterfaceRegistry, sitzung: Arc<SessionKeyManager>) -> Self {
        Self { registry, sitzung }
    }

    /// Baut den kompletten Stapel aus der Konfiguration (HTTP-Transport,
    /// Standard-Verzeichnis, Systemuhr)
    pub fn aus_config(config: &ClientConfig) -> Result<Self> {
        let pfad = config
            .zertifikat
            .pfad
            .as_deref()
            .ok_or_else(|| EfrisError::authentifizierung("Kein Zertifikatspfad konfiguriert"))?;
        let credentials = Arc::new(CredentialStore::new(pfad, config.zertifikat.passwort.clone()));
        let transport = Arc::new(HttpTransport::neu(&config.transport)?);

        let sitzung = SessionKeyManager::new(
            transport,
            credentials,
            config.absender.clone(),
            config.endpunkt.url(),
        )
        .mit_ttl(config.sitzung.ttl_sekunden);

        tracing::debug!(
            url = %config.endpunkt.url(),
            sandbox = config.endpunkt.sandbox,
            "Dispatcher erstellt"
        );
        Ok(Self::new(InterfaceRegistry::standard(), Arc::new(sitzung)))
    }

    pub fn session(&self) -> &Arc<SessionKeyManager> {
        &self.sitzung
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Fuehrt eine Operation aus und gibt den entpackten Antwort-Umschlag zurueck
    ///
    /// - `encrypt`: Anfrage AES-verschluesseln
    /// - `decrypt`: Sitzungsschluessel zum Entpacken der Antwort mitgeben
    pub async fn send(
        &self,
        operation: &str,
        payload: &Value,
        encrypt: bool,
        decrypt: bool,
    ) -> Result<Envelope> {
        let interface_code = self.registry.code(operation)?;

        // Immer, auch fuer unverschluesselte Aufrufe
        let schluessel = self.sitzung.fetch_session_key(false).await?;

        let sitzung = &self.sitzung;
        let anfrage = if encrypt {
            build_encrypted_request(
                payload,
                schluessel.hex(),
                &sitzung.credentials,
                interface_code,
                &sitzung.absender,
            )?
        } else {
            build_unencrypted_request(
                payload,
                Some(sitzung.credentials.as_ref()),
                interface_code,
                &sitzung.absender,
            )?
        };
        let body = serde_json::to_string(&anfrage).map_err(|e| {
            EfrisError::verschluesselung(format!("Anfrage nicht serialisierbar: {e}"))
        })?;

        tracing::debug!(
            operation,
            interface_code,
            verschluesselt = encrypt,
            exchange_id = %anfrage.global_info.data_exchange_id,
            "Anfrage wird gesendet"
        );

        let antwort = sitzung.transport.post_json(&sitzung.url, body).await?;
        if !antwort.ist_erfolgreich() {
            return Err(EfrisError::api(
                format!("{operation} ({interface_code}) mit HTTP-Status {}", antwort.status),
                Some(antwort.status),
                None,
            ));
        }

        let umschlag: Envelope = serde_json::from_str(&antwort.body).map_err(|e| {
            EfrisError::verschluesselung(format!("Antwort kein gueltiger Umschlag: {e}"))
        })?;

        unwrap_response(umschlag, decrypt.then(|| schluessel.hex()))
    }
}
