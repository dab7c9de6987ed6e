//! AES im ECB-Modus (ohne IV) mit PKCS#7-Padding
//!
//! Das Protokoll schreibt ECB vor. Schluessel duerfen 16, 24 oder 32 Bytes
//! lang sein und werden entweder als Hex-String oder als rohe UTF-8-Bytes
//! uebergeben.
//!
//! ## Entschluesselungs-Reihenfolge
//! ```text
//! Base64 -> [zipCode == '1': gzip-Magic pruefen, entpacken]
//!        -> [encryptCode == '2': AES-ECB, Padding pruefen] -> UTF-8
//! ```

use std::io::Read;

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::read::GzDecoder;

use efris_core::{EfrisError, Result};

use crate::padding::{pkcs7_pad, pkcs7_unpad, BLOCK_GROESSE};

/// Gzip-Kennung (erste zwei Bytes jedes gzip-Stroms)
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Gueltige AES-Schluessellaengen in Bytes
pub const SCHLUESSEL_LAENGEN: [usize; 3] = [16, 24, 32];

enum EcbCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl EcbCipher {
    fn neu(schluessel: &[u8]) -> Result<Self> {
        let ungueltig = |_| EfrisError::verschluesselung("AES-Schluessel abgelehnt");
        match schluessel.len() {
            16 => Aes128::new_from_slice(schluessel).map(Self::Aes128).map_err(ungueltig),
            24 => Aes192::new_from_slice(schluessel).map(Self::Aes192).map_err(ungueltig),
            32 => Aes256::new_from_slice(schluessel).map(Self::Aes256).map_err(ungueltig),
            n => Err(EfrisError::verschluesselung(format!(
                "Ungueltige AES-Schluessellaenge: {n} Bytes (erlaubt: 16, 24, 32)"
            ))),
        }
    }

    fn verschluesseln(&self, daten: &mut [u8]) {
        for block in daten.chunks_exact_mut(BLOCK_GROESSE) {
            let block = GenericArray::from_mut_slice(block);
            match self {
                Self::Aes128(c) => c.encrypt_block(block),
                Self::Aes192(c) => c.encrypt_block(block),
                Self::Aes256(c) => c.encrypt_block(block),
            }
        }
    }

    fn entschluesseln(&self, daten: &mut [u8]) {
        for block in daten.chunks_exact_mut(BLOCK_GROESSE) {
            let block = GenericArray::from_mut_slice(block);
            match self {
                Self::Aes128(c) => c.decrypt_block(block),
                Self::Aes192(c) => c.decrypt_block(block),
                Self::Aes256(c) => c.decrypt_block(block),
            }
        }
    }
}

/// Normalisiert einen Schluessel-String zu Schluessel-Bytes
///
/// Hex-Strings der Laenge 32/48/64 werden hex-dekodiert, alles andere wird
/// als rohe UTF-8-Bytes verwendet. Das Ergebnis muss 16, 24 oder 32 Bytes
/// lang sein.
pub fn normalize_aes_key(schluessel: &str) -> Result<Vec<u8>> {
    let ist_hex = SCHLUESSEL_LAENGEN.contains(&(schluessel.len() / 2))
        && schluessel.len() % 2 == 0
        && schluessel.bytes().all(|b| b.is_ascii_hexdigit());

    let bytes = if ist_hex {
        hex::decode(schluessel).map_err(|e| EfrisError::verschluesselung(e.to_string()))?
    } else {
        schluessel.as_bytes().to_vec()
    };

    if !SCHLUESSEL_LAENGEN.contains(&bytes.len()) {
        return Err(EfrisError::verschluesselung(format!(
            "Ungueltige AES-Schluessellaenge: {} Bytes (erlaubt: 16, 24, 32)",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Verschluesselt `klartext` mit AES-ECB und gibt Base64 zurueck
pub fn encrypt(klartext: &[u8], schluessel: &str) -> Result<String> {
    let cipher = EcbCipher::neu(&normalize_aes_key(schluessel)?)?;
    let mut daten = pkcs7_pad(klartext, BLOCK_GROESSE);
    cipher.verschluesseln(&mut daten);
    Ok(BASE64.encode(daten))
}

/// Dekodiert, entpackt und entschluesselt einen Base64-Inhalt
///
/// # Parameter
/// - `schluessel`: nur bei `encrypt_code == "2"` erforderlich
/// - `encrypt_code`: `"2"` = AES-Entschluesselung durchfuehren
/// - `zip_code`: `"1"` = Inhalt ist gzip-komprimiert
pub fn decrypt(
    chiffrat_b64: &str,
    schluessel: Option<&str>,
    encrypt_code: &str,
    zip_code: &str,
) -> Result<String> {
    let mut daten = BASE64
        .decode(chiffrat_b64)
        .map_err(|e| EfrisError::verschluesselung(format!("Base64 ungueltig: {e}")))?;

    if zip_code == "1" {
        daten = gunzip(&daten)?;
    }

    if encrypt_code == "2" {
        let schluessel = schluessel.ok_or_else(|| {
            EfrisError::verschluesselung("Schluessel fehlt fuer verschluesselten Inhalt")
        })?;
        if daten.len() % BLOCK_GROESSE != 0 {
            return Err(EfrisError::verschluesselung(format!(
                "Chiffrat-Laenge {} ist kein Vielfaches von {BLOCK_GROESSE}",
                daten.len()
            )));
        }
        let cipher = EcbCipher::neu(&normalize_aes_key(schluessel)?)?;
        cipher.entschluesseln(&mut daten);
        daten = pkcs7_unpad(&daten, BLOCK_GROESSE)?;
    }

    String::from_utf8(daten)
        .map_err(|e| EfrisError::verschluesselung(format!("Inhalt ist kein UTF-8: {e}")))
}

/// Entpackt einen gzip-Strom nach Pruefung der Magic-Bytes
pub fn gunzip(daten: &[u8]) -> Result<Vec<u8>> {
    if !daten.starts_with(&GZIP_MAGIC) {
        return Err(EfrisError::verschluesselung(
            "gzip-Kennung fehlt (erwartet 0x1f 0x8b)",
        ));
    }
    let mut out = Vec::new();
    GzDecoder::new(daten)
        .read_to_end(&mut out)
        .map_err(|e| EfrisError::verschluesselung(format!("gzip-Entpacken fehlgeschlagen: {e}")))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
