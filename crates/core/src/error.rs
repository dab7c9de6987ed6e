//! Fehlertypen fuer den EFRIS-Umschlag
//!
//! Geschlossene Menge von drei Fehlerarten. Aufrufer unterscheiden anhand
//! von [`EfrisError::art`], ob neu authentifiziert, der Sitzungsschluessel
//! erneuert oder der Aufruf verworfen werden muss.

use serde::Serialize;
use thiserror::Error;

/// Standard-Statuscode fuer Authentifizierungsfehler an HTTP-Schnittstellen
pub const AUTH_STATUS: u16 = 401;

/// Statuscode fuer Aufruferfehler (z.B. unbekannte Schnittstelle)
pub const CLIENT_FEHLER_STATUS: u16 = 400;

/// Globaler Result-Alias
pub type Result<T> = std::result::Result<T, EfrisError>;

/// Alle moeglichen Fehler im Umschlag-Subsystem
#[derive(Debug, Error)]
pub enum EfrisError {
    // --- Zertifikat & Schluessel ---
    #[error("Authentifizierung fehlgeschlagen: {nachricht}")]
    Authentifizierung { nachricht: String, status: u16 },

    // --- Krypto & Kodierung ---
    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    // --- Gegenstelle & Transport ---
    #[error("API-Fehler: {nachricht}")]
    Api {
        nachricht: String,
        status: Option<u16>,
        return_code: Option<String>,
    },
}

/// Maschinenlesbare Fehlerart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FehlerArt {
    #[serde(rename = "AuthenticationError")]
    Authentication,
    #[serde(rename = "EncryptionError")]
    Encryption,
    #[serde(rename = "APIError")]
    Api,
}

impl FehlerArt {
    /// Stabiler Bezeichner der Fehlerart
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "AuthenticationError",
            Self::Encryption => "EncryptionError",
            Self::Api => "APIError",
        }
    }
}

impl std::fmt::Display for FehlerArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EfrisError {
    /// Authentifizierungsfehler mit Standard-Statuscode
    pub fn authentifizierung(msg: impl Into<String>) -> Self {
        Self::Authentifizierung {
            nachricht: msg.into(),
            status: AUTH_STATUS,
        }
    }

    pub fn verschluesselung(msg: impl Into<String>) -> Self {
        Self::Verschluesselung(msg.into())
    }

    pub fn api(msg: impl Into<String>, status: Option<u16>, return_code: Option<String>) -> Self {
        Self::Api {
            nachricht: msg.into(),
            status,
            return_code,
        }
    }

    /// Gibt die Fehlerart zurueck
    pub fn art(&self) -> FehlerArt {
        match self {
            Self::Authentifizierung { .. } => FehlerArt::Authentication,
            Self::Verschluesselung(_) => FehlerArt::Encryption,
            Self::Api { .. } => FehlerArt::Api,
        }
    }

    /// Statuscode fuer HTTP-nahe Aufrufer, sofern bekannt
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentifizierung { status, .. } => Some(*status),
            Self::Verschluesselung(_) => None,
            Self::Api { status, .. } => *status,
        }
    }

    /// Return-Code der Gegenstelle (`returnStateInfo.returnCode`), sofern bekannt
    pub fn return_code(&self) -> Option<&str> {
        match self {
            Self::Api { return_code, .. } => return_code.as_deref(),
            _ => None,
        }
    }

    /// Reine Fehlermeldung ohne Praefix der Fehlerart
    pub fn nachricht(&self) -> &str {
        match self {
            Self::Authentifizierung { nachricht, .. } => nachricht,
            Self::Verschluesselung(nachricht) => nachricht,
            Self::Api { nachricht, .. } => nachricht,
        }
    }
}
