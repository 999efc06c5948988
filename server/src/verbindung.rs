//! Verbindung – Upgrade, Frame-Pumpe und Session-Verdrahtung
//!
//! Pro TCP-Verbindung:
//! 1. WebSocket-Upgrade mit Pfad- und Header-Pruefung (404 / 400)
//! 2. Session mit Authentifikator, Media-Auswahl und Handlern einrichten
//! 3. Sende-Task leert den Ausgangskanal der Session
//! 4. Lese-Schleife uebergibt Frames nacheinander an die Session
//! 5. Transportende: Close- und Fini-Handler

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use hoerrohr_auth::Anfrage;
use hoerrohr_core::{AnrufEreignis, SessionId};
use hoerrohr_protocol::{AudioFrame, MediaFormat, MediaParameter};
use hoerrohr_signaling::{
    signatur_authentifikator_einrichten, OpenKontext, SchliessKontext, Session, SessionBeobachter,
    SessionHandle,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::Instrument;

use crate::transkription::TranskriptionsBeobachter;
use crate::ServerZustand;

/// Header ohne die kein Upgrade stattfindet
pub const PFLICHT_HEADER: [&str; 4] = [
    "audiohook-organization-id",
    "audiohook-correlation-id",
    "audiohook-session-id",
    "x-api-key",
];

// ---------------------------------------------------------------------------
// Upgrade
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpgradeFehler {
    #[error("Unbekannter Pfad '{0}'")]
    Pfad(String),

    #[error("Header '{0}' fehlt")]
    HeaderFehlt(&'static str),

    #[error("Ungueltige Session-ID '{0}'")]
    SessionId(String),
}

impl UpgradeFehler {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Pfad(_) => StatusCode::NOT_FOUND,
            Self::HeaderFehlt(_) | Self::SessionId(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn antwort(&self) -> ErrorResponse {
        let mut antwort = ErrorResponse::new(Some(self.to_string()));
        *antwort.status_mut() = self.status();
        antwort
    }
}

/// Prueft die Upgrade-Anfrage und uebernimmt sie fuer die Signaturpruefung
pub fn upgrade_pruefen(anfrage: &Request, pfad: &str) -> Result<(Anfrage, SessionId), UpgradeFehler> {
    let uri = anfrage.uri();
    if uri.path() != pfad {
        return Err(UpgradeFehler::Pfad(uri.path().to_string()));
    }

    let ziel = uri.path_and_query().map_or("/", |p| p.as_str());
    let mut signatur_anfrage = Anfrage::neu(anfrage.method().as_str(), ziel);
    for (name, wert) in anfrage.headers() {
        match wert.to_str() {
            Ok(wert) => signatur_anfrage.header_hinzufuegen(name.as_str(), wert),
            Err(_) => tracing::debug!(header = %name, "Header-Wert nicht ASCII, ignoriert"),
        }
    }

    for header in PFLICHT_HEADER {
        if signatur_anfrage.header(header).is_none() {
            return Err(UpgradeFehler::HeaderFehlt(header));
        }
    }
    let roh = signatur_anfrage
        .header("audiohook-session-id")
        .unwrap_or_default();
    let session_id = roh
        .parse::<SessionId>()
        .map_err(|_| UpgradeFehler::SessionId(roh.clone()))?;

    Ok((signatur_anfrage, session_id))
}

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// Fuehrt eine Verbindung vom Upgrade bis zum Teardown
pub async fn verbindung_verarbeiten(stream: TcpStream, peer: SocketAddr, zustand: Arc<ServerZustand>) {
    let pfad = zustand.config.netzwerk.pfad.clone();
    let mut upgrade = None;
    let rueckruf = |anfrage: &Request, antwort: Response| -> Result<Response, ErrorResponse> {
        match upgrade_pruefen(anfrage, &pfad) {
            Ok(ergebnis) => {
                upgrade = Some(ergebnis);
                Ok(antwort)
            }
            Err(fehler) => {
                tracing::warn!(peer = %peer, fehler = %fehler, "Upgrade abgelehnt");
                Err(fehler.antwort())
            }
        }
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, rueckruf).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer = %peer, fehler = %e, "WebSocket-Handshake fehlgeschlagen");
            return;
        }
    };
    let Some((anfrage, session_id)) = upgrade else {
        return;
    };

    let span = tracing::info_span!("session", session_id = %session_id, peer = %peer);
    session_fuehren(ws, anfrage, session_id, zustand)
        .instrument(span)
        .await;
}

async fn session_fuehren(
    ws: WebSocketStream<TcpStream>,
    anfrage: Anfrage,
    session_id: SessionId,
    zustand: Arc<ServerZustand>,
) {
    let (mut session, mut ausgang) =
        Session::neu(zustand.config.session.session_konfig(), Some(session_id));
    if let Err(fehler) = session_einrichten(&session.handle(), anfrage, &zustand) {
        tracing::error!(fehler = %fehler, "Session konnte nicht eingerichtet werden");
        return;
    }
    tracing::info!("Verbindung hergestellt");

    let (mut schreiber, mut leser) = ws.split();
    let sende_task = tokio::spawn(
        async move {
            while let Some(text) = ausgang.recv().await {
                if let Err(e) = schreiber.send(Message::Text(text)).await {
                    tracing::warn!(fehler = %e, "Senden fehlgeschlagen");
                    break;
                }
            }
        }
        .in_current_span(),
    );

    while let Some(frame) = leser.next().await {
        match frame {
            Ok(Message::Text(text)) => session.text_empfangen(&text).await,
            Ok(Message::Binary(daten)) => session.binaer_empfangen(&daten),
            Ok(Message::Close(rahmen)) => {
                tracing::debug!(rahmen = ?rahmen, "Close-Frame empfangen");
                break;
            }
            // Ping/Pong beantwortet tungstenite selbst
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(fehler = %e, "Frame-Lesefehler");
                break;
            }
        }
    }

    session.transport_geschlossen().await;
    sende_task.abort();
    tracing::info!("Verbindung beendet");
}

// ---------------------------------------------------------------------------
// Session-Verdrahtung
// ---------------------------------------------------------------------------

/// Registriert Authentifikator, Media-Auswahl, Handler und Beobachter
pub fn session_einrichten(
    handle: &SessionHandle,
    anfrage: Anfrage,
    zustand: &ServerZustand,
) -> anyhow::Result<()> {
    signatur_authentifikator_einrichten(
        handle,
        Arc::clone(&zustand.pruefer),
        anfrage,
        zustand.config.signatur.modus,
    )?;

    let formate = zustand.config.session.formate.clone();
    handle.media_auswahl_hinzufuegen(move |_handle, angebot| async move {
        Ok::<_, anyhow::Error>(media_bevorzugen(angebot, &formate))
    })?;

    let senke = Arc::clone(&zustand.senke);
    let transkription = zustand
        .config
        .transkription
        .aktiviert
        .then(|| Arc::clone(&zustand.transkription));
    let standard_sprache = zustand.config.transkription.standard_sprache.clone();
    handle.open_handler_hinzufuegen(move |kontext: OpenKontext| async move {
        let OpenKontext {
            handle,
            open,
            media,
        } = kontext;
        let session_id = handle
            .id()
            .ok_or_else(|| anyhow::anyhow!("Session ohne ID"))?;
        let conversation_id = open.conversation_id;

        senke.senden(AnrufEreignis::Gestartet {
            session_id,
            conversation_id,
            organisation_id: open.organization_id,
            ani: open.participant.ani.clone(),
            zeitpunkt: Utc::now(),
        })?;

        let transkription = match (transkription, &media) {
            (Some(dienst), Some(media)) => {
                let sprache = open.language.as_deref().unwrap_or(&standard_sprache);
                dienst.starten(session_id, sprache, media.rate);
                handle.beobachter_hinzufuegen(Arc::new(TranskriptionsBeobachter::neu(
                    session_id,
                    Arc::clone(&dienst),
                )));
                Some(dienst)
            }
            _ => None,
        };

        handle.close_handler_hinzufuegen(move |kontext: SchliessKontext| async move {
            let grund = kontext.grund.map_or("transport", |g| g.als_str());
            if let Some(dienst) = transkription {
                dienst.beenden(session_id);
            }
            senke.senden(AnrufEreignis::Beendet {
                session_id,
                conversation_id,
                grund: grund.to_string(),
                zeitpunkt: Utc::now(),
            })?;
            Ok::<_, anyhow::Error>(())
        })?;
        Ok::<_, anyhow::Error>(())
    })?;

    let statistik = Arc::new(SessionStatistik::default());
    handle.beobachter_hinzufuegen(statistik.clone());
    handle.fini_handler_hinzufuegen(move |handle: SessionHandle| async move {
        tracing::info!(
            zustand = %handle.zustand(),
            position_ms = handle.position().as_millis() as u64,
            frames = statistik.frames.load(Ordering::Relaxed),
            audio_ms = statistik.audio_us.load(Ordering::Relaxed) / 1000,
            verworfen_ms = statistik.verworfen_us.load(Ordering::Relaxed) / 1000,
            pausen = statistik.pausen.load(Ordering::Relaxed),
            rtt_ms = statistik.rtt_us.load(Ordering::Relaxed) / 1000,
            "Session-Zusammenfassung"
        );
        Ok::<_, anyhow::Error>(())
    })?;

    Ok(())
}

/// Behaelt unterstuetzte Formate; Zweikanal-Angebote zuerst
pub fn media_bevorzugen(angebot: Vec<MediaParameter>, formate: &[MediaFormat]) -> Vec<MediaParameter> {
    let mut passend: Vec<_> = angebot
        .into_iter()
        .filter(|m| formate.contains(&m.format))
        .collect();
    // Stabil: innerhalb der Gruppen bleibt die Reihenfolge des Clients
    passend.sort_by_key(|m| m.channels.len() != 2);
    passend
}

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SessionStatistik {
    frames: AtomicU64,
    audio_us: AtomicU64,
    verworfen_us: AtomicU64,
    pausen: AtomicU64,
    rtt_us: AtomicU64,
}

impl SessionBeobachter for SessionStatistik {
    fn audio(&self, frame: &AudioFrame<'_>) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.audio_us
            .fetch_add(frame.dauer().as_micros() as u64, Ordering::Relaxed);
    }

    fn pausiert(&self) {
        self.pausen.fetch_add(1, Ordering::Relaxed);
    }

    fn verworfen(&self, _start: Duration, dauer: Duration) {
        self.verworfen_us
            .fetch_add(dauer.as_micros() as u64, Ordering::Relaxed);
    }

    fn statistik(&self, rtt: Duration) {
        self.rtt_us.store(rtt.as_micros() as u64, Ordering::Relaxed);
    }
}
