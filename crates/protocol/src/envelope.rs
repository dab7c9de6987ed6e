//! JSON-Umschlag des EFRIS-Protokolls
//!
//! Jede Anfrage und Antwort besteht aus drei Bloecken:
//!
//! ```text
//! {
//!   "data":            { content, signature, dataDescription{codeType, encryptCode, zipCode} },
//!   "globalInfo":      { appId, version, dataExchangeId, interfaceCode, ... extendField },
//!   "returnStateInfo": { returnCode, returnMessage }
//! }
//! ```
//!
//! `content` ist auf der Leitung immer ein Base64-String. Nach dem Entpacken
//! einer Antwort ersetzt der strukturierte JSON-Wert den String.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

pub const APP_ID: &str = "AP04";
pub const PROTOKOLL_VERSION: &str = "1.1.20191201";
pub const REQUEST_CODE: &str = "TP";
pub const RESPONSE_CODE: &str = "TA";
pub const BENUTZERNAME: &str = "admin";
pub const GERAETE_MAC: &str = "FFFFFFFFFFFF";
pub const LAENGENGRAD: &str = "32.5825";
pub const BREITENGRAD: &str = "0.3476";
pub const AGENT_TYPE: &str = "0";
pub const ANTWORT_DATUMSFORMAT: &str = "dd/MM/yyyy";
pub const ANTWORT_ZEITFORMAT: &str = "dd/MM/yyyy HH:mm:ss";

/// `returnMessage` einer erfolgreichen Antwort
pub const ERFOLG_MELDUNG: &str = "SUCCESS";

/// Maximale Laenge von `data.content` laut Protokoll (Zeichen)
pub const MAX_CONTENT_LAENGE: usize = 40_000;

/// Maximale Laenge von `data.signature` laut Protokoll (Zeichen)
pub const MAX_SIGNATUR_LAENGE: usize = 500;

// ---------------------------------------------------------------------------
// Nachsichtiges Lesen
// ---------------------------------------------------------------------------

// Die Gegenstelle sendet fuer leere Felder teils `null` statt `""`.
// Ohne Nachsicht ginge der Status-Block einer Ablehnung verloren.

fn null_als_standard<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `null` in `dataDescription` gilt wie ein fehlendes Flag als `'0'`
fn null_als_flag<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(|| "0".to_string()))
}

// ---------------------------------------------------------------------------
// Umschlag
// ---------------------------------------------------------------------------

/// Vollstaendiger Umschlag (Anfrage oder Antwort)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Envelope {
    #[serde(deserialize_with = "null_als_standard")]
    pub data: Data,
    #[serde(deserialize_with = "null_als_standard")]
    pub global_info: GlobalInfo,
    #[serde(deserialize_with = "null_als_standard")]
    pub return_state_info: ReturnStateInfo,
}

/// Nutzdaten-Block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Data {
    /// Base64-Inhalt auf der Leitung, strukturierter Wert nach dem Entpacken
    pub content: Value,
    #[serde(deserialize_with = "null_als_standard")]
    pub signature: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub data_description: DataDescription,
}

impl Default for Data {
    fn default() -> Self {
        Self {
            content: Value::String(String::new()),
            signature: String::new(),
            data_description: DataDescription::default(),
        }
    }
}

/// Kodierungs-Flags fuer `data.content`
///
/// - `codeType`: `'1'` = moeglicherweise verschluesselt, `'0'` = nur Base64
/// - `encryptCode`: `'2'` = AES-verschluesselt (nur bei `codeType == '1'` relevant)
/// - `zipCode`: `'1'` = gzip-komprimiert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataDescription {
    #[serde(deserialize_with = "null_als_flag")]
    pub code_type: String,
    #[serde(deserialize_with = "null_als_flag")]
    pub encrypt_code: String,
    #[serde(deserialize_with = "null_als_flag")]
    pub zip_code: String,
}

impl Default for DataDescription {
    /// Fehlende Flags gelten als `'0'`
    fn default() -> Self {
        Self::neu("0", "0", "0")
    }
}

impl DataDescription {
    pub fn neu(code_type: &str, encrypt_code: &str, zip_code: &str) -> Self {
        Self {
            code_type: code_type.to_string(),
            encrypt_code: encrypt_code.to_string(),
            zip_code: zip_code.to_string(),
        }
    }

    /// Flags einer AES-verschluesselten Anfrage
    pub fn verschluesselt() -> Self {
        Self::neu("1", "2", "0")
    }

    /// Flags einer reinen Base64-Anfrage
    pub fn unverschluesselt() -> Self {
        Self::neu("0", "1", "0")
    }
}

/// Metadaten-Block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalInfo {
    #[serde(deserialize_with = "null_als_standard")]
    pub app_id: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub version: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub data_exchange_id: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub interface_code: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub request_code: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub request_time: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub response_code: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub user_name: String,
    #[serde(rename = "deviceMAC", deserialize_with = "null_als_standard")]
    pub device_mac: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub device_no: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub tin: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub brn: String,
    #[serde(rename = "taxpayerID", deserialize_with = "null_als_standard")]
    pub taxpayer_id: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub longitude: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub latitude: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub agent_type: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub extend_field: ExtendField,
}

/// Erweiterungsfelder in `globalInfo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendField {
    #[serde(deserialize_with = "null_als_standard")]
    pub response_date_format: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub response_time_format: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub reference_no: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub operator_name: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub offline_invoice_exception: OfflineInvoiceException,
}

impl Default for ExtendField {
    fn default() -> Self {
        Self {
            response_date_format: ANTWORT_DATUMSFORMAT.to_string(),
            response_time_format: ANTWORT_ZEITFORMAT.to_string(),
            reference_no: String::new(),
            operator_name: BENUTZERNAME.to_string(),
            offline_invoice_exception: OfflineInvoiceException::default(),
        }
    }
}

/// Platzhalter fuer Offline-Ausnahmen (immer leer)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfflineInvoiceException {
    #[serde(deserialize_with = "null_als_standard")]
    pub error_code: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub error_msg: String,
}

/// Status-Block einer Antwort
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReturnStateInfo {
    #[serde(deserialize_with = "null_als_standard")]
    pub return_code: String,
    #[serde(deserialize_with = "null_als_standard")]
    pub return_message: String,
}

impl ReturnStateInfo {
    /// `true` wenn die Gegenstelle die Anfrage akzeptiert hat
    pub fn ist_erfolgreich(&self) -> bool {
        self.return_message == ERFOLG_MELDUNG
    }
}

impl Envelope {
    /// `true` wenn `data.content` fehlt oder ein leerer String ist
    pub fn content_ist_leer(&self) -> bool {
        match &self.data.content {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Absender
// ---------------------------------------------------------------------------

/// Kennungen des meldenden Steuerpflichtigen und Geraets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Absender {
    pub tin: String,
    pub device_no: String,
    pub brn: String,
    pub taxpayer_id: String,
}

impl Absender {
    pub fn neu(tin: impl Into<String>, device_no: impl Into<String>) -> Self {
        Self {
            tin: tin.into(),
            device_no: device_no.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
