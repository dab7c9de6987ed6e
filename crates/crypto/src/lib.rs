//! # efris-crypto
//!
//! Kryptografische Schicht des EFRIS-Umschlags.
//!
//! ## Module
//! - `credential` - RSA-Schluessel aus PKCS#12, Fingerprint, SHA-1-Signatur
//! - `padding` - PKCS#7 mit strenger Pruefung
//! - `aes_ecb` - AES-ECB, Schluessel-Normalisierung, gzip
//! - `envelope_codec` - Anfragen bauen, Antworten entpacken

pub mod aes_ecb;
pub mod credential;
pub mod envelope_codec;
pub mod padding;

pub use credential::{CredentialStore, PrivateKeyMaterial};
pub use envelope_codec::{
    build_encrypted_request, build_global_info, build_unencrypted_request, unwrap_response,
};
pub use padding::{pkcs7_pad, pkcs7_unpad, BLOCK_GROESSE};
