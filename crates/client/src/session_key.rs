//! Sitzungsschluessel-Verwaltung
//!
//! Ein einziger AES-Schluessel pro Prozess, bezogen ueber den
//! RSA-geschuetzten Schluesselaustausch (`T104`) und fuer eine feste
//! Lebensdauer gecacht.
//!
//! ## Nebenlaeufigkeit
//! - Lesepfad: `RwLock` auf dem Cache, O(1), kein Netzwerk
//! - Erneuerung: `tokio::sync::Mutex`, genau ein Austausch gleichzeitig.
//!   Wer waehrend einer Erneuerung wartet, bekommt deren Ergebnis.
//! - Der Cache wird erst nach einem vollstaendig erfolgreichen Austausch
//!   geschrieben; ein abgebrochener Austausch laesst ihn unveraendert.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;

use efris_core::{Clock, EfrisError, Result, SystemClock};
use efris_crypto::aes_ecb::SCHLUESSEL_LAENGEN;
use efris_crypto::{build_unencrypted_request, CredentialStore};
use efris_protocol::{Absender, Envelope, SCHLUESSELAUSTAUSCH};

use crate::transport::Transport;

/// Standard-Lebensdauer: 23 Stunden
pub const STANDARD_TTL: i64 = 23 * 60 * 60;

/// Feld mit dem verschluesselten Schluessel in der Austausch-Antwort
pub const SCHLUESSEL_FELD: &str = "passwordDes";

/// Historische Schreibweise desselben Feldes (Protokoll-Eigenheit)
pub const SCHLUESSEL_FELD_ALT: &str = "passowrdDes";

// ---------------------------------------------------------------------------
// SessionKey
// ---------------------------------------------------------------------------

/// Vollstaendig befuellter Sitzungsschluessel (nie teilweise initialisiert)
#[derive(Clone)]
pub struct SessionKey {
    hex: String,
    fetched_at: i64,
    ttl: i64,
    handshake_inhalt: Value,
}

impl SessionKey {
    pub fn neu(schluessel: &[u8], fetched_at: i64, ttl: i64, handshake_inhalt: Value) -> Self {
        Self {
            hex: hex::encode(schluessel),
            fetched_at,
            ttl,
            handshake_inhalt,
        }
    }

    /// Schluessel als Hex-String (Kleinbuchstaben)
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Schluessellaenge in Bytes
    pub fn laenge(&self) -> usize {
        self.hex.len() / 2
    }

    pub fn fetched_at(&self) -> i64 {
        self.fetched_at
    }

    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    pub fn valid_until(&self) -> i64 {
        self.fetched_at + self.ttl
    }

    pub fn ist_gueltig(&self, jetzt: i64) -> bool {
        jetzt - self.fetched_at < self.ttl
    }

    /// Dekodierter Inhalt der Austausch-Antwort (Diagnose)
    pub fn handshake_inhalt(&self) -> &Value {
        &self.handshake_inhalt
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("schluessel", &"[REDACTED]")
            .field("laenge", &self.laenge())
            .field("fetched_at", &self.fetched_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Normalisierung
// ---------------------------------------------------------------------------

/// Bringt einen Kandidaten auf eine gueltige AES-Schluessellaenge
///
/// - 8 Bytes: verdoppelt, auf 16 gekuerzt
/// - 16/24/32 Bytes: unveraendert
/// - sonst: die ersten 16 Bytes
pub fn normalize_session_key(kandidat: &[u8]) -> Result<Vec<u8>> {
    let normalisiert = match kandidat.len() {
        8 => {
            let mut doppelt = kandidat.repeat(2);
            doppelt.truncate(16);
            doppelt
        }
        16 | 24 | 32 => kandidat.to_vec(),
        n => kandidat[..n.min(16)].to_vec(),
    };

    if !SCHLUESSEL_LAENGEN.contains(&normalisiert.len()) {
        return Err(EfrisError::verschluesselung(format!(
            "Sitzungsschluessel hat ungueltige Laenge {} (erwartet 16, 24 oder 32)",
            normalisiert.len()
        )));
    }
    Ok(normalisiert)
}

/// Versucht den RSA-Klartext als Base64 zu lesen, sonst Rohbytes
fn klartext_kandidat(klartext: &[u8]) -> Vec<u8> {
    std::str::from_utf8(klartext)
        .ok()
        .and_then(|text| BASE64.decode(text).ok())
        .filter(|bytes| !bytes.is_empty())
        .unwrap_or_else(|| klartext.to_vec())
}

/// Liest den verschluesselten Schluessel, kanonische Schreibweise zuerst
fn verschluesselten_schluessel_lesen(inhalt: &Value) -> Result<&str> {
    [SCHLUESSEL_FELD, SCHLUESSEL_FELD_ALT]
        .iter()
        .find_map(|feld| inhalt.get(*feld).and_then(Value::as_str))
        .ok_or_else(|| {
            EfrisError::verschluesselung(format!(
                "Austausch-Antwort ohne Feld '{SCHLUESSEL_FELD}'"
            ))
        })
}

fn handshake_inhalt_dekodieren(content: &Value) -> Result<Value> {
    let roh = content
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EfrisError::verschluesselung("Austausch-Antwort ohne Inhalt"))?;
    let bytes = BASE64.decode(roh).map_err(|e| {
        EfrisError::verschluesselung(format!("Austausch-Inhalt kein Base64: {e}"))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| EfrisError::verschluesselung(format!("Austausch-Inhalt kein JSON: {e}")))
}

// ---------------------------------------------------------------------------
// SessionKeyManager
// ---------------------------------------------------------------------------

/// Besitzt den Lebenszyklus des gemeinsamen Sitzungsschluessels
pub struct SessionKeyManager {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) credentials: Arc<CredentialStore>,
    pub(crate) absender: Absender,
    pub(crate) url: String,
    ttl: i64,
    uhr: Arc<dyn Clock>,
    cache: RwLock<Option<Arc<SessionKey>>>,
    erneuerung: Mutex<()>,
}

impl SessionKeyManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        absender: Absender,
        url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            credentials,
            absender,
            url: url.into(),
            ttl: STANDARD_TTL,
            uhr: Arc::new(SystemClock),
            cache: RwLock::new(None),
            erneuerung: Mutex::new(()),
        }
    }

    pub fn mit_ttl(mut self, ttl_sekunden: i64) -> Self {
        self.ttl = ttl_sekunden;
        self
    }

    pub fn mit_uhr(mut self, uhr: Arc<dyn Clock>) -> Self {
        self.uhr = uhr;
        self
    }

    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Liefert einen gueltigen Sitzungsschluessel
    ///
    /// Ohne `force` wird ein gueltiger Cache-Eintrag ohne Netzwerkzugriff
    /// zurueckgegeben. Mit `force` wird immer ausgetauscht, es sei denn ein
    /// paralleler Aufrufer hat waehrend des Wartens bereits erneuert.
    pub async fn fetch_session_key(&self, force: bool) -> Result<Arc<SessionKey>> {
        let vorher = self.aktueller_schluessel();
        if !force {
            if let Some(schluessel) = &vorher {
                if schluessel.ist_gueltig(self.uhr.jetzt()) {
                    return Ok(Arc::clone(schluessel));
                }
            }
        }

        let _erneuerung = self.erneuerung.lock().await;

        if let Some(aktuell) = self.aktueller_schluessel() {
            let neu_erneuert = vorher
                .as_ref()
                .map_or(true, |alt| !Arc::ptr_eq(alt, &aktuell));
            if neu_erneuert && aktuell.ist_gueltig(self.uhr.jetzt()) {
                tracing::debug!("Sitzungsschluessel von paralleler Erneuerung uebernommen");
                return Ok(aktuell);
            }
        }

        let schluessel = Arc::new(self.schluessel_austauschen().await?);
        *self.cache.write() = Some(Arc::clone(&schluessel));

        tracing::info!(
            laenge = schluessel.laenge(),
            gueltig_bis = schluessel.valid_until(),
            "Sitzungsschluessel erneuert"
        );
        Ok(schluessel)
    }

    /// Verwirft den gecachten Schluessel bedingungslos
    pub fn forget(&self) {
        *self.cache.write() = None;
        tracing::debug!("Sitzungsschluessel verworfen");
    }

    pub fn is_valid(&self) -> bool {
        self.cache
            .read()
            .as_ref()
            .is_some_and(|s| s.ist_gueltig(self.uhr.jetzt()))
    }

    /// `fetched_at + ttl` des gecachten Schluessels
    pub fn valid_until(&self) -> Option<i64> {
        self.cache.read().as_ref().map(|s| s.valid_until())
    }

    /// Gecachter Schluessel, unabhaengig von seiner Gueltigkeit
    pub fn aktueller_schluessel(&self) -> Option<Arc<SessionKey>> {
        self.cache.read().clone()
    }

    async fn schluessel_austauschen(&self) -> Result<SessionKey> {
        let anfrage = build_unencrypted_request(
            &Value::Null,
            Some(self.credentials.as_ref()),
            SCHLUESSELAUSTAUSCH,
            &self.absender,
        )?;
        let body = serde_json::to_string(&anfrage).map_err(|e| {
            EfrisError::verschluesselung(format!("Anfrage nicht serialisierbar: {e}"))
        })?;

        tracing::debug!(url = %self.url, "Schluesselaustausch gestartet");
        let antwort = self.transport.post_json(&self.url, body).await?;
        if !antwort.ist_erfolgreich() {
            return Err(EfrisError::api(
                format!("Schluesselaustausch mit HTTP-Status {}", antwort.status),
                Some(antwort.status),
                None,
            ));
        }

        let umschlag: Envelope = serde_json::from_str(&antwort.body).map_err(|e| {
            EfrisError::verschluesselung(format!("Austausch-Antwort kein Umschlag: {e}"))
        })?;

        let status = &umschlag.return_state_info;
        if !status.ist_erfolgreich() {
            return Err(EfrisError::api(
                format!("Schluesselaustausch abgelehnt: {}", status.return_message),
                Some(antwort.status),
                Some(status.return_code.clone()),
            ));
        }

        let inhalt = handshake_inhalt_dekodieren(&umschlag.data.content)?;
        let chiffrat = BASE64
            .decode(verschluesselten_schluessel_lesen(&inhalt)?)
            .map_err(|e| {
                EfrisError::verschluesselung(format!("Verschluesselter Schluessel kein Base64: {e}"))
            })?;

        let klartext = self.credentials.decrypt_pkcs1v15(&chiffrat)?;
        let schluessel = normalize_session_key(&klartext_kandidat(&klartext))?;

        Ok(SessionKey::neu(&schluessel, self.uhr.jetzt(), self.ttl, inhalt))
    }
}

impl std::fmt::Debug for SessionKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyManager")
            .field("url", &self.url)
            .field("ttl", &self.ttl)
            .field("schluessel", &self.aktueller_schluessel())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
