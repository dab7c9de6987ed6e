//! Integration-Tests fuer den Schluesselaustausch und den Sitzungsschluessel-Cache

mod common;

use std::sync::Arc;
use std::time::Duration;

use efris_core::{FehlerArt, ManualClock};
use efris_protocol::SCHLUESSELAUSTAUSCH;

use common::{credentials, erwarteter_schluessel_hex, manager, Austausch, TestServer};

#[tokio::test]
async fn austausch_liefert_normalisierten_schluessel() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    let sitzung = manager(&server, creds);

    let schluessel = sitzung.fetch_session_key(false).await.unwrap();
    assert_eq!(schluessel.hex(), erwarteter_schluessel_hex());
    assert_eq!(schluessel.laenge(), 16);
    assert!(schluessel.handshake_inhalt().get("passwordDes").is_some());

    // Die Anfrage ist unverschluesselt, leer und an T104 adressiert
    let anfrage = server.letzte_anfrage();
    assert_eq!(anfrage.global_info.interface_code, SCHLUESSELAUSTAUSCH);
    assert_eq!(anfrage.global_info.tin, "1000000000");
    assert_eq!(anfrage.global_info.device_no, "TCS0001");
    assert_eq!(anfrage.data.data_description.code_type, "0");
    assert_eq!(anfrage.data.content, "");
    assert!(anfrage.data.signature.is_empty());
}

#[tokio::test]
async fn gueltiger_schluessel_wird_gecacht() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    let sitzung = manager(&server, creds);

    let erster = sitzung.fetch_session_key(false).await.unwrap();
    let zweiter = sitzung.fetch_session_key(false).await.unwrap();

    assert!(Arc::ptr_eq(&erster, &zweiter));
    assert_eq!(server.handshakes(), 1);
    assert!(sitzung.is_valid());
}

#[tokio::test]
async fn erzwungene_erneuerung() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    let sitzung = manager(&server, creds);

    let erster = sitzung.fetch_session_key(false).await.unwrap();
    let zweiter = sitzung.fetch_session_key(true).await.unwrap();

    assert!(!Arc::ptr_eq(&erster, &zweiter));
    assert_eq!(server.handshakes(), 2);
}

#[tokio::test]
async fn ttl_ablauf_mit_manueller_uhr() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    let uhr = Arc::new(ManualClock::neu(10_000));
    let sitzung = manager(&server, creds).mit_ttl(600).mit_uhr(uhr.clone());

    assert!(!sitzung.is_valid());
    assert_eq!(sitzung.valid_until(), None);

    sitzung.fetch_session_key(false).await.unwrap();
    assert_eq!(sitzung.valid_until(), Some(10_600));

    uhr.setzen(10_599);
    assert!(sitzung.is_valid());
    sitzung.fetch_session_key(false).await.unwrap();
    assert_eq!(server.handshakes(), 1);

    uhr.setzen(10_601);
    assert!(!sitzung.is_valid());
    sitzung.fetch_session_key(false).await.unwrap();
    assert_eq!(server.handshakes(), 2);
    assert_eq!(sitzung.valid_until(), Some(11_201));
}

#[tokio::test]
async fn forget_leert_cache() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    let sitzung = manager(&server, creds);

    sitzung.fetch_session_key(false).await.unwrap();
    sitzung.forget();

    assert!(!sitzung.is_valid());
    assert!(sitzung.valid_until().is_none());
    assert!(sitzung.aktueller_schluessel().is_none());

    sitzung.fetch_session_key(false).await.unwrap();
    assert_eq!(server.handshakes(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallele_aufrufer_teilen_einen_austausch() {
    let creds = credentials();
    // Schluessel vorab laden, damit alle Aufrufer gleichzeitig am Austausch ankommen
    creds.load_private_key().unwrap();
    let server = TestServer::mit_verzoegerung(&creds, Some(Duration::from_millis(100)));
    let sitzung = Arc::new(manager(&server, creds));

    let aufgaben: Vec<_> = (0..8)
        .map(|_| {
            let sitzung = Arc::clone(&sitzung);
            tokio::spawn(async move { sitzung.fetch_session_key(false).await })
        })
        .collect();

    let mut schluessel = Vec::new();
    for aufgabe in aufgaben {
        schluessel.push(aufgabe.await.unwrap().unwrap());
    }

    assert_eq!(server.handshakes(), 1);
    assert!(schluessel.iter().all(|s| Arc::ptr_eq(s, &schluessel[0])));
}

#[tokio::test]
async fn alte_feldschreibweise() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    *server.austausch.lock() = Austausch::AlterFeldname;
    let sitzung = manager(&server, creds);

    let schluessel = sitzung.fetch_session_key(false).await.unwrap();
    assert_eq!(schluessel.hex(), erwarteter_schluessel_hex());
}

#[tokio::test]
async fn fehlendes_feld_ist_verschluesselungsfehler() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    *server.austausch.lock() = Austausch::OhneFeld;
    let sitzung = manager(&server, creds);

    let fehler = sitzung.fetch_session_key(false).await.unwrap_err();
    assert_eq!(fehler.art(), FehlerArt::Encryption);
    assert!(!sitzung.is_valid());
}

#[tokio::test]
async fn abgelehnter_austausch_traegt_return_code() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    *server.austausch.lock() = Austausch::Abgelehnt {
        code: "2124".into(),
        meldung: "Device is not registered".into(),
    };
    let sitzung = manager(&server, creds);

    let fehler = sitzung.fetch_session_key(false).await.unwrap_err();
    assert_eq!(fehler.art(), FehlerArt::Api);
    assert_eq!(fehler.return_code(), Some("2124"));
    assert!(fehler.nachricht().contains("Device is not registered"));
    assert!(sitzung.aktueller_schluessel().is_none());
}

#[tokio::test]
async fn fehlschlag_behaelt_alten_schluessel() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    let sitzung = manager(&server, creds);

    let alt = sitzung.fetch_session_key(false).await.unwrap();
    *server.austausch.lock() = Austausch::OhneFeld;

    assert!(sitzung.fetch_session_key(true).await.is_err());
    let aktuell = sitzung.aktueller_schluessel().unwrap();
    assert!(Arc::ptr_eq(&alt, &aktuell));
}

#[tokio::test]
async fn falsches_zertifikatspasswort() {
    let richtig = credentials();
    let server = TestServer::neu(&richtig);
    let falsch = Arc::new(efris_crypto::CredentialStore::new(
        concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../crypto/tests/fixtures/geraet_shrouded.p12"
        ),
        "falsch",
    ));
    let sitzung = manager(&server, falsch);

    let fehler = sitzung.fetch_session_key(false).await.unwrap_err();
    assert_eq!(fehler.art(), FehlerArt::Authentication);
}

#[tokio::test]
async fn ablehnung_mit_null_feldern_traegt_return_code() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    *server.austausch.lock() = Austausch::Roh(
        r#"{
            "data": {
                "content": "",
                "signature": null,
                "dataDescription": { "codeType": "0", "encryptCode": null, "zipCode": "0" }
            },
            "globalInfo": { "interfaceCode": "T104", "extendField": null },
            "returnStateInfo": { "returnCode": "2124", "returnMessage": "Device is not registered" }
        }"#
        .into(),
    );
    let sitzung = manager(&server, creds);

    let fehler = sitzung.fetch_session_key(false).await.unwrap_err();
    assert_eq!(fehler.art(), FehlerArt::Api);
    assert_eq!(fehler.return_code(), Some("2124"));
    assert!(fehler.nachricht().contains("Device is not registered"));
    assert!(sitzung.aktueller_schluessel().is_none());
}

#[tokio::test]
async fn http_fehlerstatus_beim_austausch() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    let sitzung = manager(&server, creds);

    let alt = sitzung.fetch_session_key(false).await.unwrap();
    *server.austausch.lock() = Austausch::HttpStatus(503);

    let fehler = sitzung.fetch_session_key(true).await.unwrap_err();
    assert_eq!(fehler.art(), FehlerArt::Api);
    assert_eq!(fehler.status_code(), Some(503));
    assert_eq!(fehler.return_code(), None);

    // Cache bleibt unveraendert
    let aktuell = sitzung.aktueller_schluessel().unwrap();
    assert!(Arc::ptr_eq(&alt, &aktuell));
    assert!(sitzung.is_valid());
}

#[tokio::test]
async fn transportfehler_beim_austausch() {
    let creds = credentials();
    let server = TestServer::neu(&creds);
    *server.austausch.lock() = Austausch::TransportFehler(503);
    let sitzung = manager(&server, creds);

    let fehler = sitzung.fetch_session_key(false).await.unwrap_err();
    assert_eq!(fehler.art(), FehlerArt::Api);
    assert_eq!(fehler.status_code(), Some(503));
    assert!(sitzung.aktueller_schluessel().is_none());
    assert!(sitzung.valid_until().is_none());

    // Naechster Versuch nach Wiederherstellung tauscht erneut aus
    *server.austausch.lock() = Austausch::Erfolg;
    sitzung.fetch_session_key(false).await.unwrap();
    assert_eq!(server.handshakes(), 2);
}
