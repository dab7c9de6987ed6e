//! Zertifikatsspeicher (RSA-Schluessel aus PKCS#12-Container)
//!
//! Der private Schluessel wird beim ersten Bedarf aus dem
//! passwortgeschuetzten Container geladen und fuer die Lebensdauer des
//! Prozesses gehalten. Protokolliert wird nur der SHA-256-Fingerprint,
//! niemals der Schluessel selbst.
//!
//! ## Suchreihenfolge im Container
//! 1. unverschluesselter `keyBag` (PKCS#8 im Klartext)
//! 2. `pkcs8ShroudedKeyBag` (PBES2 oder PKCS#12-PBE)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use der::asn1::{AnyRef, ObjectIdentifier, OctetString};
use der::{Decode, Encode};
use p12_keystore::KeyStore;
use parking_lot::RwLock;
use pkcs12::authenticated_safe::AuthenticatedSafe;
use pkcs12::pfx::Pfx;
use pkcs12::safe_bag::SafeContents;
use pkcs12::PKCS_12_KEY_BAG_OID;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use efris_core::{EfrisError, Result};

/// CMS `data`-Inhaltstyp (unverschluesselter SafeContents-Block)
const CONTENT_TYPE_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");

// ---------------------------------------------------------------------------
// PrivateKeyMaterial
// ---------------------------------------------------------------------------

/// Geladener RSA-Schluessel mit abgeleitetem Fingerprint (unveraenderlich)
pub struct PrivateKeyMaterial {
    schluessel: RsaPrivateKey,
    fingerprint: String,
}

impl PrivateKeyMaterial {
    /// Erstellt das Material aus einem PKCS#8-DER-kodierten Schluessel
    pub fn aus_pkcs8_der(der: &[u8]) -> Result<Self> {
        let schluessel = RsaPrivateKey::from_pkcs8_der(der).map_err(|e| {
            EfrisError::authentifizierung(format!("Kein gueltiger RSA-Schluessel: {e}"))
        })?;
        Self::aus_schluessel(schluessel)
    }

    /// Erstellt das Material aus einem bereits geparsten Schluessel
    pub fn aus_schluessel(schluessel: RsaPrivateKey) -> Result<Self> {
        let kanonisch = schluessel.to_pkcs8_der().map_err(|e| {
            EfrisError::authentifizierung(format!("Schluessel nicht kodierbar: {e}"))
        })?;
        let fingerprint = hex::encode(Sha256::digest(kanonisch.as_bytes()));
        Ok(Self {
            schluessel,
            fingerprint,
        })
    }

    /// Oeffnet einen PKCS#12-Container und extrahiert den privaten Schluessel
    pub fn aus_container(container: &[u8], passwort: &str) -> Result<Self> {
        let der = schluessel_aus_container(container, passwort)?;
        Self::aus_pkcs8_der(&der)
    }

    /// SHA-256-Fingerprint (Hex, Kleinbuchstaben) der kanonischen PKCS#8-Kodierung
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.schluessel.to_public_key()
    }

    /// RSA-Signatur (PKCS#1 v1.5, SHA-1) ueber die exakten Bytes, Base64-kodiert
    pub fn sign(&self, daten: &[u8]) -> Result<String> {
        let signierer = SigningKey::<Sha1>::new(self.schluessel.clone());
        let signatur = signierer
            .try_sign(daten)
            .map_err(|e| EfrisError::verschluesselung(format!("Signierung fehlgeschlagen: {e}")))?;
        Ok(BASE64.encode(signatur.to_bytes()))
    }

    /// RSA-Entschluesselung mit PKCS#1-v1.5-Padding
    pub fn decrypt_pkcs1v15(&self, chiffrat: &[u8]) -> Result<Vec<u8>> {
        self.schluessel
            .decrypt(Pkcs1v15Encrypt, chiffrat)
            .map_err(|e| EfrisError::verschluesselung(format!("RSA-Entschluesselung fehlgeschlagen: {e}")))
    }
}

impl std::fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyMaterial")
            .field("schluessel", &"[REDACTED]")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CredentialStore
// ---------------------------------------------------------------------------

/// Laedt und haelt den privaten Schluessel des Geraets
pub struct CredentialStore {
    pfad: Option<PathBuf>,
    passwort: String,
    material: RwLock<Option<Arc<PrivateKeyMaterial>>>,
}

impl CredentialStore {
    /// Speicher fuer einen Container auf der Platte (wird erst bei Bedarf gelesen)
    pub fn new(pfad: impl Into<PathBuf>, passwort: impl Into<String>) -> Self {
        Self {
            pfad: Some(pfad.into()),
            passwort: passwort.into(),
            material: RwLock::new(None),
        }
    }

    /// Speicher mit bereits geladenem Schluessel
    pub fn from_key_material(material: PrivateKeyMaterial) -> Self {
        Self {
            pfad: None,
            passwort: String::new(),
            material: RwLock::new(Some(Arc::new(material))),
        }
    }

    /// Laedt den Schluessel (idempotent, Ergebnis wird gecacht)
    pub fn load_private_key(&self) -> Result<Arc<PrivateKeyMaterial>> {
        if let Some(material) = self.material.read().as_ref() {
            return Ok(Arc::clone(material));
        }

        let pfad = self
            .pfad
            .as_deref()
            .ok_or_else(|| EfrisError::authentifizierung("Kein Zertifikatspfad konfiguriert"))?;
        let geladen = Arc::new(container_laden(pfad, &self.passwort)?);

        let mut slot = self.material.write();
        match slot.as_ref() {
            // Paralleler Ladevorgang war schneller, Wert ist identisch
            Some(vorhanden) => Ok(Arc::clone(vorhanden)),
            None => {
                tracing::info!(
                    fingerprint = %geladen.fingerprint(),
                    pfad = %pfad.display(),
                    "Privater Schluessel geladen"
                );
                *slot = Some(Arc::clone(&geladen));
                Ok(geladen)
            }
        }
    }

    /// Gibt `true` zurueck wenn der Schluessel bereits im Speicher liegt
    pub fn ist_geladen(&self) -> bool {
        self.material.read().is_some()
    }

    pub fn fingerprint(&self) -> Result<String> {
        Ok(self.load_private_key()?.fingerprint().to_string())
    }

    /// Signiert `daten` (laedt den Schluessel bei Bedarf)
    pub fn sign(&self, daten: &[u8]) -> Result<String> {
        self.load_private_key()?.sign(daten)
    }

    pub fn decrypt_pkcs1v15(&self, chiffrat: &[u8]) -> Result<Vec<u8>> {
        self.load_private_key()?.decrypt_pkcs1v15(chiffrat)
    }

    pub fn public_key(&self) -> Result<RsaPublicKey> {
        Ok(self.load_private_key()?.public_key())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("pfad", &self.pfad)
            .field("geladen", &self.ist_geladen())
            .finish()
    }
}

fn container_laden(pfad: &Path, passwort: &str) -> Result<PrivateKeyMaterial> {
    let container = std::fs::read(pfad).map_err(|e| {
        EfrisError::authentifizierung(format!(
            "Zertifikatsdatei '{}' nicht lesbar: {e}",
            pfad.display()
        ))
    })?;
    PrivateKeyMaterial::aus_container(&container, passwort)
}

/// Extrahiert den privaten Schluessel als PKCS#8-DER
fn schluessel_aus_container(container: &[u8], passwort: &str) -> Result<Vec<u8>> {
    // Oeffnen prueft die Container-MAC und damit das Passwort
    let keystore = KeyStore::from_pkcs12(container, passwort).map_err(|e| {
        EfrisError::authentifizierung(format!("PKCS#12-Container nicht lesbar: {e}"))
    })?;

    let unverpackt = unverpackter_key_bag(container).map_err(|e| {
        EfrisError::authentifizierung(format!("PKCS#12-Struktur ungueltig: {e}"))
    })?;
    if let Some(der) = unverpackt {
        tracing::debug!("Schluessel aus unverschluesseltem keyBag");
        return Ok(der);
    }

    keystore
        .private_key_chain()
        .map(|(_, kette)| kette.key().to_vec())
        .ok_or_else(|| EfrisError::authentifizierung("Kein privater Schluessel im Container"))
}

/// Sucht einen `keyBag` in den unverschluesselten SafeContents
fn unverpackter_key_bag(container: &[u8]) -> der::Result<Option<Vec<u8>>> {
    let pfx = Pfx::from_der(container)?;
    if pfx.auth_safe.content_type != CONTENT_TYPE_DATA {
        return Ok(None);
    }

    let safes = AuthenticatedSafe::from_der(
        &OctetString::from_der(&pfx.auth_safe.content.to_der()?)?.into_bytes(),
    )?;

    for safe in safes {
        if safe.content_type != CONTENT_TYPE_DATA {
            continue;
        }
        let daten = OctetString::from_der(&safe.content.to_der()?)?.into_bytes();
        for bag in SafeContents::from_der(&daten)? {
            if bag.bag_id == PKCS_12_KEY_BAG_OID {
                // bagValue ist [0] EXPLICIT PrivateKeyInfo
                let explizit = AnyRef::from_der(&bag.bag_value)?;
                return Ok(Some(explizit.value().to_vec()));
            }
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
