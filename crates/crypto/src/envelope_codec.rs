//! Umschlag-Codec
//!
//! Reine Funktionen ohne eigenen Zustand: verpacken ausgehende Nutzdaten in
//! den Leitungsumschlag (verschluesselt oder nur Base64, signiert) und
//! entpacken eingehende Antworten wieder zu strukturiertem JSON.
//!
//! ## Entpack-Pfade
//! - `codeType == '1'`: AES-Pfad, entschluesselt nur bei `encryptCode == '2'`
//! - sonst: Base64 (+ gzip bei `zipCode == '1'`), keine Entschluesselung

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde_json::Value;
use uuid::Uuid;

use efris_core::{EfrisError, Result};
use efris_protocol::envelope::{
    AGENT_TYPE, APP_ID, BENUTZERNAME, BREITENGRAD, GERAETE_MAC, LAENGENGRAD, MAX_CONTENT_LAENGE,
    MAX_SIGNATUR_LAENGE, PROTOKOLL_VERSION, REQUEST_CODE, RESPONSE_CODE,
};
use efris_protocol::{Absender, Data, DataDescription, Envelope, ExtendField, GlobalInfo};

use crate::aes_ecb;
use crate::credential::CredentialStore;

/// Ostafrikanische Zeit (UTC+3, keine Sommerzeit)
const EAT_OFFSET_SEKUNDEN: i32 = 3 * 3600;

const ZEITFORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Metadaten
// ---------------------------------------------------------------------------

/// Erzeugt den `globalInfo`-Block fuer eine neue Anfrage
pub fn build_global_info(interface_code: &str, absender: &Absender) -> GlobalInfo {
    global_info_zum_zeitpunkt(interface_code, absender, Utc::now())
}

fn global_info_zum_zeitpunkt(
    interface_code: &str,
    absender: &Absender,
    zeitpunkt: DateTime<Utc>,
) -> GlobalInfo {
    GlobalInfo {
        app_id: APP_ID.to_string(),
        version: PROTOKOLL_VERSION.to_string(),
        data_exchange_id: exchange_id(),
        interface_code: interface_code.to_string(),
        request_code: REQUEST_CODE.to_string(),
        request_time: request_time(zeitpunkt),
        response_code: RESPONSE_CODE.to_string(),
        user_name: BENUTZERNAME.to_string(),
        device_mac: GERAETE_MAC.to_string(),
        device_no: absender.device_no.clone(),
        tin: absender.tin.clone(),
        brn: absender.brn.clone(),
        taxpayer_id: absender.taxpayer_id.clone(),
        longitude: LAENGENGRAD.to_string(),
        latitude: BREITENGRAD.to_string(),
        agent_type: AGENT_TYPE.to_string(),
        extend_field: ExtendField::default(),
    }
}

/// `yyyy-MM-dd HH:mm:ss` in ostafrikanischer Zeit
pub fn request_time(zeitpunkt: DateTime<Utc>) -> String {
    let eat = FixedOffset::east_opt(EAT_OFFSET_SEKUNDEN).unwrap_or_else(|| Utc.fix());
    zeitpunkt.with_timezone(&eat).format(ZEITFORMAT).to_string()
}

/// 32 zufaellige Hex-Zeichen in Grossbuchstaben
pub fn exchange_id() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

// ---------------------------------------------------------------------------
// Anfragen
// ---------------------------------------------------------------------------

/// Verschluesselte Anfrage: AES-ECB ueber das kompakte JSON, Signatur ueber
/// den verschluesselten Text
pub fn build_encrypted_request(
    content: &Value,
    aes_key: &str,
    credentials: &CredentialStore,
    interface_code: &str,
    absender: &Absender,
) -> Result<Envelope> {
    if aes_key.is_empty() {
        return Err(EfrisError::verschluesselung(
            "Verschluesselte Anfrage ohne Sitzungsschluessel",
        ));
    }

    let klartext = serialisieren(content)?;
    let chiffrat = aes_ecb::encrypt(klartext.as_bytes(), aes_key)?;
    let signatur = credentials.sign(chiffrat.as_bytes())?;

    Ok(umschlag(
        chiffrat,
        signatur,
        DataDescription::verschluesselt(),
        interface_code,
        absender,
    ))
}

/// Unverschluesselte Anfrage: nur Base64, signiert falls ein Schluessel vorliegt
///
/// Leerer Inhalt ergibt leeren `content` und leere Signatur.
pub fn build_unencrypted_request(
    content: &Value,
    credentials: Option<&CredentialStore>,
    interface_code: &str,
    absender: &Absender,
) -> Result<Envelope> {
    let (kodiert, signatur) = if ist_leer(content) {
        (String::new(), String::new())
    } else {
        let kodiert = BASE64.encode(serialisieren(content)?);
        let signatur = match credentials {
            Some(store) => store.sign(kodiert.as_bytes())?,
            None => String::new(),
        };
        (kodiert, signatur)
    };

    Ok(umschlag(
        kodiert,
        signatur,
        DataDescription::unverschluesselt(),
        interface_code,
        absender,
    ))
}

fn umschlag(
    content: String,
    signatur: String,
    beschreibung: DataDescription,
    interface_code: &str,
    absender: &Absender,
) -> Envelope {
    if content.len() > MAX_CONTENT_LAENGE {
        tracing::warn!(
            interface_code,
            laenge = content.len(),
            maximum = MAX_CONTENT_LAENGE,
            "Inhalt ueberschreitet die Protokollgrenze"
        );
    }
    if signatur.len() > MAX_SIGNATUR_LAENGE {
        tracing::warn!(interface_code, laenge = signatur.len(), "Signatur ungewoehnlich lang");
    }
    tracing::debug!(
        interface_code,
        code_type = %beschreibung.code_type,
        laenge = content.len(),
        "Anfrage-Umschlag erstellt"
    );

    Envelope {
        data: Data {
            content: Value::String(content),
            signature: signatur,
            data_description: beschreibung,
        },
        global_info: build_global_info(interface_code, absender),
        ..Envelope::default()
    }
}

fn serialisieren(content: &Value) -> Result<String> {
    serde_json::to_string(content)
        .map_err(|e| EfrisError::verschluesselung(format!("Inhalt nicht serialisierbar: {e}")))
}

fn ist_leer(content: &Value) -> bool {
    match content {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Antworten
// ---------------------------------------------------------------------------

/// Entpackt `data.content` einer Antwort zu strukturiertem JSON
///
/// Leerer Inhalt wird unveraendert durchgereicht. Jeder Fehler auf diesem
/// Pfad wird als `Verschluesselung` gemeldet.
pub fn unwrap_response(mut envelope: Envelope, aes_key: Option<&str>) -> Result<Envelope> {
    if envelope.content_ist_leer() {
        return Ok(envelope);
    }

    let inhalt = inhalt_entpacken(&envelope.data.content, &envelope.data.data_description, aes_key)
        .map_err(|e| {
            EfrisError::verschluesselung(format!("Antwort nicht entpackbar: {}", e.nachricht()))
        })?;

    envelope.data.content = inhalt;
    Ok(envelope)
}

fn inhalt_entpacken(
    content: &Value,
    beschreibung: &DataDescription,
    aes_key: Option<&str>,
) -> Result<Value> {
    let Value::String(roh) = content else {
        return Err(EfrisError::verschluesselung("content ist kein String"));
    };

    let text = if beschreibung.code_type == "1" {
        aes_ecb::decrypt(
            roh,
            aes_key,
            &beschreibung.encrypt_code,
            &beschreibung.zip_code,
        )?
    } else {
        let mut bytes = BASE64
            .decode(roh)
            .map_err(|e| EfrisError::verschluesselung(format!("Base64 ungueltig: {e}")))?;
        if beschreibung.zip_code == "1" {
            bytes = aes_ecb::gunzip(&bytes)?;
        }
        String::from_utf8(bytes)
            .map_err(|e| EfrisError::verschluesselung(format!("Kein gueltiges UTF-8: {e}")))?
    };

    serde_json::from_str(&text)
        .map_err(|e| EfrisError::verschluesselung(format!("Kein gueltiges JSON: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
