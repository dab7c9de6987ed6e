//! Schnittstellen-Verzeichnis
//!
//! Ordnet semantische Operationsnamen (z.B. `billing_upload`) den festen
//! Schnittstellencodes des Protokolls (z.B. `T109`) zu. Das Verzeichnis
//! wird einmal beim Start aufgebaut und danach nur noch gelesen.

use std::collections::HashMap;

use efris_core::error::CLIENT_FEHLER_STATUS;
use efris_core::{EfrisError, Result};

/// Schnittstellencode des Schluesselaustauschs
pub const SCHLUESSELAUSTAUSCH: &str = "T104";

/// Ein Eintrag im Schnittstellen-Verzeichnis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub code: String,
}

const STANDARD_SCHNITTSTELLEN: &[(&str, &str)] = &[
    ("server_time", "T101"),
    ("client_init", "T102"),
    ("sign_in", "T103"),
    ("get_symmetric_key", SCHLUESSELAUSTAUSCH),
    ("invoice_query", "T106"),
    ("normal_invoice_query", "T107"),
    ("invoice_details", "T108"),
    ("billing_upload", "T109"),
    ("credit_note_application", "T110"),
    ("credit_note_query", "T111"),
    ("credit_note_details", "T112"),
    ("credit_note_approval", "T113"),
    ("credit_note_cancel", "T114"),
    ("system_dictionary", "T115"),
    ("z_report_upload", "T116"),
    ("invoice_check", "T117"),
    ("credit_note_application_details", "T118"),
    ("taxpayer_query", "T119"),
    ("credit_note_void", "T120"),
    ("exchange_rate", "T121"),
    ("cancel_credit_note_details", "T122"),
    ("commodity_category_query", "T123"),
    ("commodity_category_page", "T124"),
    ("excise_duty_query", "T125"),
    ("exchange_rates_all", "T126"),
    ("goods_inquiry", "T127"),
    ("stock_query", "T128"),
    ("batch_invoice_upload", "T129"),
    ("goods_upload", "T130"),
    ("stock_maintain", "T131"),
    ("exception_log_upload", "T132"),
    ("tcs_upgrade_download", "T133"),
    ("commodity_category_incremental", "T134"),
    ("tcs_version", "T135"),
    ("certificate_upload", "T136"),
    ("exempt_taxpayer_check", "T137"),
    ("branch_query", "T138"),
    ("stock_transfer", "T139"),
    ("goods_by_code", "T144"),
];

/// Unveraenderliches Verzeichnis Operationsname -> Schnittstellencode
#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    eintraege: HashMap<String, InterfaceDescriptor>,
}

impl InterfaceRegistry {
    /// Leeres Verzeichnis
    pub fn leer() -> Self {
        Self::default()
    }

    /// Verzeichnis mit allen bekannten Protokoll-Schnittstellen
    pub fn standard() -> Self {
        STANDARD_SCHNITTSTELLEN
            .iter()
            .fold(Self::leer(), |reg, (name, code)| reg.mit_eintrag(name, code))
    }

    /// Fuegt einen Eintrag hinzu (ueberschreibt gleichnamige)
    pub fn mit_eintrag(mut self, name: &str, code: &str) -> Self {
        self.eintraege.insert(
            name.to_string(),
            InterfaceDescriptor {
                name: name.to_string(),
                code: code.to_string(),
            },
        );
        self
    }

    /// Sucht den Schnittstellencode zu einem Operationsnamen
    ///
    /// Unbekannte Namen sind ein Aufruferfehler (`Api`, Status 400).
    pub fn code(&self, name: &str) -> Result<&str> {
        self.eintraege
            .get(name)
            .map(|d| d.code.as_str())
            .ok_or_else(|| {
                EfrisError::api(
                    format!("Unbekannte Schnittstelle: {name}"),
                    Some(CLIENT_FEHLER_STATUS),
                    None,
                )
            })
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }

    pub fn eintraege(&self) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.eintraege.values()
    }
}
