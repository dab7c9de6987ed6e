//! Gemeinsame Test-Hilfen: In-Memory-Gegenstelle fuer Schluesselaustausch
//! und Geschaeftsoperationen.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::Mutex;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde_json::{json, Value};

use efris_client::{SessionKeyManager, Transport, TransportAntwort};
use efris_core::{EfrisError, Result};
use efris_crypto::{aes_ecb, CredentialStore};
use efris_protocol::{Absender, DataDescription, Envelope, ReturnStateInfo, SCHLUESSELAUSTAUSCH};

pub const PASSWORT: &str = "geheim123";
pub const URL: &str = "https://efris.test/ws/taapp/getInformation";

/// Klartext, den die Gegenstelle RSA-verschluesselt (Base64 von "12345678")
pub const SCHLUESSEL_KLARTEXT: &str = "MTIzNDU2Nzg=";

/// Normalisierter Sitzungsschluessel als Hex ("12345678" verdoppelt)
pub fn erwarteter_schluessel_hex() -> String {
    hex::encode(b"1234567812345678")
}

pub fn credentials() -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(
        concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../crypto/tests/fixtures/geraet_shrouded.p12"
        ),
        PASSWORT,
    ))
}

pub fn absender() -> Absender {
    Absender::neu("1000000000", "TCS0001")
}

/// Verhalten der Gegenstelle beim Schluesselaustausch
#[derive(Debug, Clone)]
pub enum Austausch {
    Erfolg,
    AlterFeldname,
    OhneFeld,
    Abgelehnt { code: String, meldung: String },
    /// Antwortet mit einem rohen Rumpf und Status 200
    Roh(String),
    /// HTTP-Fehlerstatus ohne Umschlag
    HttpStatus(u16),
    /// Transport meldet selbst einen Fehler
    TransportFehler(u16),
}

pub struct TestServer {
    oeffentlich: RsaPublicKey,
    pub austausch: Mutex<Austausch>,
    pub http_status: AtomicU16,
    pub verzoegerung: Option<Duration>,
    pub handshakes: AtomicUsize,
    pub anfragen: Mutex<Vec<Envelope>>,
}

impl TestServer {
    pub fn neu(credentials: &CredentialStore) -> Arc<Self> {
        Self::mit_verzoegerung(credentials, None)
    }

    pub fn mit_verzoegerung(
        credentials: &CredentialStore,
        verzoegerung: Option<Duration>,
    ) -> Arc<Self> {
        Arc::new(Self {
            oeffentlich: credentials.public_key().unwrap(),
            austausch: Mutex::new(Austausch::Erfolg),
            http_status: AtomicU16::new(200),
            verzoegerung,
            handshakes: AtomicUsize::new(0),
            anfragen: Mutex::new(Vec::new()),
        })
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn letzte_anfrage(&self) -> Envelope {
        self.anfragen.lock().last().cloned().unwrap()
    }

    fn austausch_antwort(&self, verhalten: &Austausch) -> Envelope {
        let chiffrat = self
            .oeffentlich
            .encrypt(
                &mut rand::rngs::OsRng,
                Pkcs1v15Encrypt,
                SCHLUESSEL_KLARTEXT.as_bytes(),
            )
            .unwrap();
        let verschluesselt = BASE64.encode(chiffrat);

        let (inhalt, status) = match verhalten.clone() {
            Austausch::Erfolg => (json!({ "passwordDes": verschluesselt, "sign": "" }), erfolg()),
            Austausch::AlterFeldname => {
                (json!({ "passowrdDes": verschluesselt, "sign": "" }), erfolg())
            }
            Austausch::OhneFeld => (json!({ "sign": "" }), erfolg()),
            Austausch::Abgelehnt { code, meldung } => (
                Value::Null,
                ReturnStateInfo {
                    return_code: code,
                    return_message: meldung,
                },
            ),
            Austausch::Roh(_) | Austausch::HttpStatus(_) | Austausch::TransportFehler(_) => {
                panic!("kein Umschlag fuer {verhalten:?}")
            }
        };

        let mut umschlag = Envelope::default();
        if !inhalt.is_null() {
            umschlag.data.content = json!(BASE64.encode(inhalt.to_string()));
        }
        umschlag.data.data_description = DataDescription::neu("0", "0", "0");
        umschlag.return_state_info = status;
        umschlag
    }

    /// Echo-Antwort, verschluesselt mit dem Sitzungsschluessel
    fn geschaeft_antwort(&self, anfrage: &Envelope) -> Envelope {
        let schluessel = erwarteter_schluessel_hex();
        let content = anfrage.data.content.as_str().unwrap_or_default();
        let echo: Value = if content.is_empty() {
            Value::Null
        } else if anfrage.data.data_description.code_type == "1" {
            let klartext = aes_ecb::decrypt(content, Some(&schluessel), "2", "0").unwrap();
            serde_json::from_str(&klartext).unwrap()
        } else {
            serde_json::from_slice(&BASE64.decode(content).unwrap()).unwrap()
        };

        let antwort = json!({
            "echo": echo,
            "interfaceCode": anfrage.global_info.interface_code,
        });
        let mut umschlag = Envelope::default();
        umschlag.data.content =
            json!(aes_ecb::encrypt(antwort.to_string().as_bytes(), &schluessel).unwrap());
        umschlag.data.data_description = DataDescription::neu("1", "2", "0");
        umschlag.return_state_info = erfolg();
        umschlag
    }
}

fn erfolg() -> ReturnStateInfo {
    ReturnStateInfo {
        return_code: "00".into(),
        return_message: "SUCCESS".into(),
    }
}

#[async_trait]
impl Transport for TestServer {
    async fn post_json(&self, url: &str, body: String) -> Result<TransportAntwort> {
        assert_eq!(url, URL);
        let anfrage: Envelope = serde_json::from_str(&body).unwrap();
        self.anfragen.lock().push(anfrage.clone());

        let antwort = if anfrage.global_info.interface_code == SCHLUESSELAUSTAUSCH {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            if let Some(dauer) = self.verzoegerung {
                tokio::time::sleep(dauer).await;
            }
            let verhalten = self.austausch.lock().clone();
            match &verhalten {
                Austausch::Roh(body) => {
                    return Ok(TransportAntwort {
                        status: 200,
                        body: body.clone(),
                    })
                }
                Austausch::HttpStatus(status) => {
                    return Ok(TransportAntwort {
                        status: *status,
                        body: "Service Unavailable".into(),
                    })
                }
                Austausch::TransportFehler(status) => {
                    return Err(EfrisError::api(
                        "Verbindung zur Gegenstelle abgebrochen",
                        Some(*status),
                        None,
                    ))
                }
                _ => self.austausch_antwort(&verhalten),
            }
        } else {
            let status = self.http_status.load(Ordering::SeqCst);
            if status != 200 {
                return Ok(TransportAntwort {
                    status,
                    body: "Internal Server Error".into(),
                });
            }
            self.geschaeft_antwort(&anfrage)
        };

        Ok(TransportAntwort {
            status: 200,
            body: serde_json::to_string(&antwort).unwrap(),
        })
    }
}

pub fn manager(server: &Arc<TestServer>, credentials: Arc<CredentialStore>) -> SessionKeyManager {
    SessionKeyManager::new(server.clone(), credentials, absender(), URL)
}
