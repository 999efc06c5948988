//! Szenario-Tests fuer die AudioHook-Session
//!
//! Die Tests treiben die `Session` direkt mit Text- und Binaer-Frames und
//! lesen die ausgehenden Nachrichten aus dem Ausgangskanal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hoerrohr_auth::sfv::{BareItem, Parameter};
use hoerrohr_auth::signatur::AUDIOHOOK_KOMPONENTEN;
use hoerrohr_auth::{
    anfrage_signieren, Anfrage, ApiSchluesselSpeicher, PrueferKonfig, SignaturPruefer,
};
use hoerrohr_core::SessionId;
use hoerrohr_protocol::{AudioFrame, KanalRolle, MediaFormat, MediaParameter};
use hoerrohr_signaling::{
    signatur_authentifikator_einrichten, OpenKontext, SchliessKontext, Session, SessionBeobachter,
    SessionHandle, SessionKonfig, SessionZustand, SignalingError, SignaturModus,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

const SESSION_ID: &str = "e160e428-53e2-487c-977d-96989bf5c99d";
const ANDERE_ID: &str = "5b1f1a2e-0c7d-4a57-9d55-6a4f6d8a9c01";
const API_KEY: &str = "SGVsbG8sIEkgYW0gdGhlIEFQSSBrZXkh";
const SECRET: &[u8] = b"TXlTdXBlclNlY3JldEtleVRlbGxOby1vbmU=";

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

fn nachricht(seq: u64, serverseq: u64, typ: &str, parameters: Value) -> String {
    nachricht_mit_id(SESSION_ID, seq, serverseq, typ, parameters)
}

fn nachricht_mit_id(id: &str, seq: u64, serverseq: u64, typ: &str, parameters: Value) -> String {
    json!({
        "version": "2",
        "id": id,
        "type": typ,
        "seq": seq,
        "serverseq": serverseq,
        "position": "PT0S",
        "parameters": parameters,
    })
    .to_string()
}

fn media_pcmu() -> Value {
    json!({ "type": "audio", "format": "PCMU", "channels": ["external", "internal"], "rate": 8000 })
}

fn media_l16() -> Value {
    json!({ "type": "audio", "format": "L16", "channels": ["external", "internal"], "rate": 8000 })
}

fn open_parameter(media: Vec<Value>) -> Value {
    json!({
        "organizationId": "d7934305-0972-4844-938e-9060eef73d05",
        "conversationId": "090eaa2f-72fa-480a-83e0-8667ff89c0ec",
        "participant": {
            "id": "883efee8-3d6c-4537-b500-6d7ca4b92fa0",
            "ani": "+1-555-555-1234",
            "aniName": "John Doe",
            "dnis": "+1-800-555-6789"
        },
        "media": media,
    })
}

fn open_text(media: Vec<Value>) -> String {
    nachricht(1, 0, "open", open_parameter(media))
}

/// Liest alle bisher gesendeten Nachrichten
fn gesendet(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
    let mut nachrichten = Vec::new();
    while let Ok(text) = rx.try_recv() {
        nachrichten.push(serde_json::from_str(&text).unwrap());
    }
    nachrichten
}

fn einzige(rx: &mut UnboundedReceiver<String>, typ: &str) -> Value {
    let nachrichten = gesendet(rx);
    assert_eq!(nachrichten.len(), 1, "erwartet genau eine Nachricht: {nachrichten:?}");
    let nachricht = nachrichten.into_iter().next().unwrap();
    assert_eq!(nachricht["type"], typ, "{nachricht}");
    nachricht
}

/// Session im Zustand ACTIVE mit PCMU-Stereo
async fn aktive_session() -> (Session, SessionHandle, UnboundedReceiver<String>) {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    let handle = session.handle();
    session.text_empfangen(&open_text(vec![media_pcmu()])).await;
    einzige(&mut rx, "opened");
    assert_eq!(session.zustand(), SessionZustand::Active);
    (session, handle, rx)
}

#[derive(Default)]
struct AudioZaehler {
    frames: AtomicUsize,
    samples: AtomicUsize,
}

impl SessionBeobachter for AudioZaehler {
    fn audio(&self, frame: &AudioFrame<'_>) {
        self.frames.fetch_add(1, Ordering::SeqCst);
        let samples = frame
            .kanal(KanalRolle::External)
            .map(|k| k.sample_anzahl())
            .unwrap_or_default();
        self.samples.fetch_add(samples, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// open / close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_mit_auswahl_und_close_handlern() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    let handle = session.handle();
    let geschlossen = Arc::new(AtomicUsize::new(0));

    handle
        .media_auswahl_hinzufuegen(|_handle, angebot| async move {
            Ok::<_, anyhow::Error>(angebot.into_iter().skip(1).collect())
        })
        .unwrap();

    for _ in 0..2 {
        let geschlossen = Arc::clone(&geschlossen);
        handle
            .open_handler_hinzufuegen(move |kontext: OpenKontext| async move {
                assert_eq!(kontext.media.as_ref().map(|m| m.format), Some(MediaFormat::L16));
                kontext
                    .handle
                    .close_handler_hinzufuegen(move |_kontext: SchliessKontext| async move {
                        geschlossen.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, anyhow::Error>(())
                    })?;
                Ok::<_, anyhow::Error>(())
            })
            .unwrap();
    }

    session.text_empfangen(&open_text(vec![media_pcmu(), media_l16()])).await;
    let opened = einzige(&mut rx, "opened");
    assert_eq!(opened["seq"], 1);
    assert_eq!(opened["clientseq"], 1);
    assert_eq!(opened["id"], SESSION_ID);
    assert_eq!(opened["parameters"]["startPaused"], false);
    assert_eq!(opened["parameters"]["media"], json!([media_l16()]));
    assert_eq!(session.zustand(), SessionZustand::Active);
    assert_eq!(
        handle.media(),
        Some(MediaParameter::audio(
            MediaFormat::L16,
            vec![KanalRolle::External, KanalRolle::Internal],
            8000
        ))
    );

    session
        .text_empfangen(&nachricht(2, 1, "close", json!({ "reason": "end" })))
        .await;
    let closed = einzige(&mut rx, "closed");
    assert_eq!(closed["seq"], 2);
    assert_eq!(closed["clientseq"], 2);
    assert_eq!(geschlossen.load(Ordering::SeqCst), 2);
    assert_eq!(session.zustand(), SessionZustand::Closed);
}

#[tokio::test]
async fn auswahl_ausserhalb_des_angebots_bedeutet_kein_audio() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    let handle = session.handle();
    handle
        .media_auswahl_hinzufuegen(|_handle, _angebot| async move {
            Ok::<_, anyhow::Error>(vec![MediaParameter::audio(
                MediaFormat::L16,
                vec![KanalRolle::External],
                16000,
            )])
        })
        .unwrap();

    session.text_empfangen(&open_text(vec![media_pcmu()])).await;
    let opened = einzige(&mut rx, "opened");
    assert_eq!(opened["parameters"]["media"], json!([]));
    assert_eq!(handle.media(), None);

    // Ohne Media ist jeder Audio-Frame ein Fehler
    session.binaer_empfangen(&[0u8; 2]);
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
}

#[tokio::test]
async fn start_paused_vor_dem_open() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    let handle = session.handle();
    handle.pausieren();
    assert!(handle.start_paused());

    session.text_empfangen(&open_text(vec![media_pcmu()])).await;
    let opened = einzige(&mut rx, "opened");
    assert_eq!(opened["parameters"]["startPaused"], true);
    assert_eq!(session.zustand(), SessionZustand::Paused);
}

#[tokio::test]
async fn fehler_im_open_handler_trennt_mit_error() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    let handle = session.handle();
    handle
        .open_handler_hinzufuegen(|_kontext| async move {
            Err::<(), _>(anyhow::anyhow!("Datenbank nicht erreichbar"))
        })
        .unwrap();

    session.text_empfangen(&open_text(vec![media_pcmu()])).await;
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
    // Interne Details werden nicht nach aussen gegeben
    assert!(!disconnect.to_string().contains("Datenbank"));
    assert_eq!(session.zustand(), SessionZustand::SignalisierterFehler);
}

#[tokio::test]
async fn close_handler_fehler_unterdrueckt_closed() {
    let (mut session, handle, mut rx) = aktive_session().await;
    handle
        .close_handler_hinzufuegen(|_kontext| async move {
            Err::<(), _>(anyhow::anyhow!("Aufraeumen fehlgeschlagen"))
        })
        .unwrap();

    session
        .text_empfangen(&nachricht(2, 1, "close", json!({ "reason": "end" })))
        .await;
    assert!(gesendet(&mut rx).is_empty());
    assert_eq!(session.zustand(), SessionZustand::SignalisierterFehler);
}

// ---------------------------------------------------------------------------
// Registrierung und Steuerung
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registrierung_nach_preparing_schlaegt_fehl() {
    let (_session, handle, _rx) = aktive_session().await;

    let ergebnis = handle.authentifikator_hinzufuegen(|_handle, _open| async move {
        Ok::<_, anyhow::Error>(hoerrohr_signaling::AuthEntscheidung::Erlaubt)
    });
    assert!(matches!(
        ergebnis,
        Err(SignalingError::UngueltigerZustand {
            zustand: SessionZustand::Active,
            ..
        })
    ));
    assert!(handle
        .open_handler_hinzufuegen(|_kontext| async move { Ok::<_, anyhow::Error>(()) })
        .is_err());
    // Close- und Fini-Handler sind in ACTIVE noch erlaubt
    assert!(handle
        .close_handler_hinzufuegen(|_kontext| async move { Ok::<_, anyhow::Error>(()) })
        .is_ok());
    assert!(handle
        .fini_handler_hinzufuegen(|_handle| async move { Ok::<_, anyhow::Error>(()) })
        .is_ok());
}

#[tokio::test]
async fn pause_und_resume_sind_idempotent() {
    let (mut session, handle, mut rx) = aktive_session().await;

    handle.pausieren();
    handle.pausieren();
    let pause = einzige(&mut rx, "pause");
    assert_eq!(pause["seq"], 2);

    // Zustand wechselt erst mit dem `paused` des Clients
    assert_eq!(session.zustand(), SessionZustand::Active);
    session.text_empfangen(&nachricht(2, 2, "paused", json!({}))).await;
    assert_eq!(session.zustand(), SessionZustand::Paused);

    handle.fortsetzen();
    handle.fortsetzen();
    let resume = einzige(&mut rx, "resume");
    assert_eq!(resume["seq"], 3);
    assert_eq!(resume["clientseq"], 2);

    session.text_empfangen(&nachricht(3, 3, "resumed", json!({}))).await;
    assert_eq!(session.zustand(), SessionZustand::Active);
    assert!(gesendet(&mut rx).is_empty());
}

#[tokio::test]
async fn resume_vor_paused_wird_nachgereicht() {
    let (mut session, handle, mut rx) = aktive_session().await;

    handle.pausieren();
    handle.fortsetzen();
    let pause = einzige(&mut rx, "pause");
    assert_eq!(pause["seq"], 2);

    session.text_empfangen(&nachricht(2, 2, "paused", json!({}))).await;
    assert_eq!(session.zustand(), SessionZustand::Paused);
    let resume = einzige(&mut rx, "resume");
    assert_eq!(resume["seq"], 3);
    assert_eq!(resume["clientseq"], 2);

    // weiteres `fortsetzen` bis zum `resumed` ohne Wirkung
    handle.fortsetzen();
    assert!(gesendet(&mut rx).is_empty());

    session.text_empfangen(&nachricht(3, 3, "resumed", json!({}))).await;
    assert_eq!(session.zustand(), SessionZustand::Active);
    assert!(gesendet(&mut rx).is_empty());
}

#[tokio::test]
async fn pause_vor_resumed_wird_nachgereicht() {
    let (mut session, handle, mut rx) = aktive_session().await;
    handle.pausieren();
    einzige(&mut rx, "pause");
    session.text_empfangen(&nachricht(2, 2, "paused", json!({}))).await;

    handle.fortsetzen();
    handle.pausieren();
    einzige(&mut rx, "resume");

    session.text_empfangen(&nachricht(3, 3, "resumed", json!({}))).await;
    assert_eq!(session.zustand(), SessionZustand::Active);
    let pause = einzige(&mut rx, "pause");
    assert_eq!(pause["seq"], 4);
    assert_eq!(pause["clientseq"], 3);

    session.text_empfangen(&nachricht(4, 4, "paused", json!({}))).await;
    assert_eq!(session.zustand(), SessionZustand::Paused);
    assert!(gesendet(&mut rx).is_empty());
}

#[tokio::test]
async fn widerrufene_vormerkung_sendet_nichts() {
    let (mut session, handle, mut rx) = aktive_session().await;
    handle.pausieren();
    handle.fortsetzen();
    handle.pausieren();
    einzige(&mut rx, "pause");

    session.text_empfangen(&nachricht(2, 2, "paused", json!({}))).await;
    assert_eq!(session.zustand(), SessionZustand::Paused);
    assert!(gesendet(&mut rx).is_empty());
}

#[tokio::test]
async fn pause_nach_closed_sendet_nichts() {
    let (mut session, handle, mut rx) = aktive_session().await;
    session
        .text_empfangen(&nachricht(2, 1, "close", json!({ "reason": "end" })))
        .await;
    einzige(&mut rx, "closed");

    handle.pausieren();
    handle.fortsetzen();
    assert!(!handle.ereignis_senden(vec![json!({ "type": "transcript" })]));
    assert!(!handle.trennen(hoerrohr_protocol::TrennGrund::Completed, None));
    assert!(gesendet(&mut rx).is_empty());
}

#[tokio::test]
async fn ereignis_in_active() {
    let (_session, handle, mut rx) = aktive_session().await;
    assert!(handle.ereignis_senden(vec![json!({ "type": "transcript", "data": {} })]));
    let event = einzige(&mut rx, "event");
    assert_eq!(event["parameters"]["entities"][0]["type"], "transcript");
}

#[tokio::test]
async fn ping_wird_mit_pong_beantwortet() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    session
        .text_empfangen(&nachricht(1, 0, "ping", json!({ "rtt": "PT0.25S" })))
        .await;
    let pong = einzige(&mut rx, "pong");
    assert_eq!(pong["seq"], 1);
    assert_eq!(pong["clientseq"], 1);
    assert_eq!(session.zustand(), SessionZustand::Preparing);
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[tokio::test]
async fn audio_in_active_an_beobachter() {
    let (mut session, handle, mut rx) = aktive_session().await;
    let zaehler = Arc::new(AudioZaehler::default());
    handle.beobachter_hinzufuegen(zaehler.clone());

    session.binaer_empfangen(&[0xFFu8; 320]);
    assert_eq!(zaehler.frames.load(Ordering::SeqCst), 1);
    assert_eq!(zaehler.samples.load(Ordering::SeqCst), 160);

    // Ungerade Laenge passt nicht zu PCMU-Stereo
    session.binaer_empfangen(&[0xFFu8; 3]);
    assert_eq!(zaehler.frames.load(Ordering::SeqCst), 1);
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
}

#[tokio::test]
async fn audio_vor_dem_open_ist_fehler() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    let zaehler = Arc::new(AudioZaehler::default());
    session.handle().beobachter_hinzufuegen(zaehler.clone());

    session.binaer_empfangen(&[0u8; 160]);
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
    assert_eq!(zaehler.frames.load(Ordering::SeqCst), 0);
    assert_eq!(session.zustand(), SessionZustand::SignalisierterFehler);

    // Weitere Fehler werden nicht erneut signalisiert
    session.binaer_empfangen(&[0u8; 160]);
    assert!(gesendet(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Protokollverletzungen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zu_grosser_text_frame() {
    let konfig = SessionKonfig {
        max_text_groesse: 64,
    };
    let (mut session, mut rx) = Session::neu(konfig, None);
    session.text_empfangen(&open_text(vec![media_pcmu()])).await;
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
    assert_eq!(session.zustand(), SessionZustand::SignalisierterFehler);
}

#[tokio::test]
async fn falsche_sequenznummer() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    session
        .text_empfangen(&nachricht(2, 0, "open", open_parameter(vec![media_pcmu()])))
        .await;
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
    assert_eq!(disconnect["clientseq"], 0);
}

#[tokio::test]
async fn serverseq_aus_der_zukunft() {
    let (mut session, _handle, mut rx) = aktive_session().await;
    session.text_empfangen(&nachricht(2, 5, "ping", json!({}))).await;
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
    assert_eq!(session.zustand(), SessionZustand::SignalisierterFehler);
}

#[tokio::test]
async fn session_id_abweichung() {
    let id: SessionId = SESSION_ID.parse().unwrap();
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), Some(id));
    session
        .text_empfangen(&nachricht_mit_id(ANDERE_ID, 1, 0, "ping", json!({})))
        .await;
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["id"], SESSION_ID);
    assert_eq!(disconnect["parameters"]["reason"], "error");
}

#[tokio::test]
async fn nachricht_vor_dem_open_ist_fehler() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    session.text_empfangen(&nachricht(1, 0, "paused", json!({}))).await;
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
}

#[tokio::test]
async fn unbekannter_typ_ist_fehler() {
    let (mut session, _handle, mut rx) = aktive_session().await;
    session.text_empfangen(&nachricht(2, 1, "dance", json!({}))).await;
    einzige(&mut rx, "disconnect");
}

// ---------------------------------------------------------------------------
// Transportende
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transportende_fuehrt_close_dann_fini_aus() {
    let (mut session, handle, mut rx) = aktive_session().await;
    let reihenfolge = Arc::new(Mutex::new(Vec::new()));

    let r = Arc::clone(&reihenfolge);
    handle
        .fini_handler_hinzufuegen(move |_handle| async move {
            r.lock().unwrap().push("fini".to_string());
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    let r = Arc::clone(&reihenfolge);
    handle
        .close_handler_hinzufuegen(move |kontext: SchliessKontext| async move {
            r.lock().unwrap().push(format!("close:{:?}", kontext.grund));
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

    session.transport_geschlossen().await;
    assert_eq!(
        *reihenfolge.lock().unwrap(),
        vec!["close:None".to_string(), "fini".to_string()]
    );
    assert_eq!(session.zustand(), SessionZustand::Disconnected);
    assert!(gesendet(&mut rx).is_empty());

    // Nach dem Ende ist nichts mehr registrierbar oder sendbar
    assert!(handle
        .fini_handler_hinzufuegen(|_handle| async move { Ok::<_, anyhow::Error>(()) })
        .is_err());
    session.text_empfangen(&nachricht(2, 1, "ping", json!({}))).await;
    assert!(gesendet(&mut rx).is_empty());
}

#[tokio::test]
async fn fini_handler_registriert_weitere_runde() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    let handle = session.handle();
    let zaehler = Arc::new(AtomicUsize::new(0));

    let z = Arc::clone(&zaehler);
    handle
        .fini_handler_hinzufuegen(move |handle: SessionHandle| async move {
            z.fetch_add(1, Ordering::SeqCst);
            let z2 = Arc::clone(&z);
            handle.fini_handler_hinzufuegen(move |_handle| async move {
                z2.fetch_add(10, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            })?;
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

    session.transport_geschlossen().await;
    assert_eq!(zaehler.load(Ordering::SeqCst), 11);
    assert!(gesendet(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Signatur-Authentifikator
// ---------------------------------------------------------------------------

fn signierte_anfrage(schluessel: &[u8]) -> Anfrage {
    let mut anfrage = Anfrage::neu("GET", "/api/v1/audiohook/ws")
        .mit_header("host", "audiohook.example.com")
        .mit_header("audiohook-organization-id", "d7934305-0972-4844-938e-9060eef73d05")
        .mit_header("audiohook-session-id", SESSION_ID)
        .mit_header("audiohook-correlation-id", "30b0e395-84d3-4570-ac13-9a62d8f514c0")
        .mit_header("x-api-key", API_KEY);
    let parameter = Parameter::neu()
        .mit("keyid", BareItem::String(API_KEY.into()))
        .mit("nonce", BareItem::String("VGhpc0lzQVVuaXF1ZU5vbmNl".into()))
        .mit("alg", BareItem::String("hmac-sha256".into()))
        .mit("created", BareItem::Integer(chrono::Utc::now().timestamp()));
    anfrage_signieren(&mut anfrage, "sig1", &AUDIOHOOK_KOMPONENTEN, parameter, schluessel)
        .unwrap();
    anfrage
}

fn pruefer() -> Arc<SignaturPruefer> {
    let speicher = ApiSchluesselSpeicher::neu();
    speicher.eintragen_roh(API_KEY, SECRET.to_vec(), "Test").unwrap();
    Arc::new(SignaturPruefer::neu(PrueferKonfig::default(), speicher))
}

#[tokio::test(start_paused = true)]
async fn gueltige_signatur_oeffnet_session() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    signatur_authentifikator_einrichten(
        &session.handle(),
        pruefer(),
        signierte_anfrage(SECRET),
        SignaturModus::BeimOpen,
    )
    .unwrap();

    session.text_empfangen(&open_text(vec![media_pcmu()])).await;
    einzige(&mut rx, "opened");
    assert_eq!(session.zustand(), SessionZustand::Active);
}

#[tokio::test(start_paused = true)]
async fn falsche_signatur_beim_open_unauthorized() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    signatur_authentifikator_einrichten(
        &session.handle(),
        pruefer(),
        signierte_anfrage(b"falscher-schluessel"),
        SignaturModus::BeimOpen,
    )
    .unwrap();

    let start = tokio::time::Instant::now();
    session.text_empfangen(&open_text(vec![media_pcmu()])).await;
    assert!(start.elapsed() >= Duration::from_millis(500));

    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "unauthorized");
    // Standard: keine Details nach aussen
    assert!(disconnect["parameters"].get("info").is_none());
    assert_eq!(session.zustand(), SessionZustand::Unauthorized);
}

#[tokio::test(start_paused = true)]
async fn falsche_signatur_sofort_getrennt() {
    let (mut session, mut rx) = Session::neu(SessionKonfig::default(), None);
    let handle = session.handle();
    signatur_authentifikator_einrichten(
        &handle,
        pruefer(),
        signierte_anfrage(b"falscher-schluessel"),
        SignaturModus::Sofort,
    )
    .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let disconnect = einzige(&mut rx, "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "unauthorized");
    assert_eq!(disconnect["seq"], 1);
    assert_eq!(handle.zustand(), SessionZustand::Unauthorized);

    // Ein spaeteres `open` wird nicht mehr beantwortet
    session.text_empfangen(&open_text(vec![media_pcmu()])).await;
    assert!(gesendet(&mut rx).is_empty());
}
