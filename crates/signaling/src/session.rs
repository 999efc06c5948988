//! AudioHook-Session – Zustandsmaschine einer Verbindung
//!
//! Die `Session` wird von genau einem Verbindungs-Task getrieben und
//! verarbeitet eingehende Frames strikt nacheinander. Alles was Handler und
//! andere Komponenten von aussen tun duerfen, laeuft ueber den
//! `SessionHandle`.
//!
//! ## Ablauf einer Text-Nachricht
//! 1. Groessenpruefung
//! 2. JSON und Umschlag
//! 3. Version, Session-ID, `seq`, `serverseq`
//! 4. Typ und Parameter
//! 5. Erst dann: Position und Sequenz uebernehmen, Dispatch
//!
//! Jeder Fehler in 1–4 fuehrt zu einem `disconnect` mit Grund `error`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use hoerrohr_core::SessionId;
use hoerrohr_protocol::nachricht::{
    CloseGrund, OpenParameter, OpenedParameter, PingParameter,
};
use hoerrohr_protocol::{
    AudioFrame, ClientNachricht, ClientUmschlag, MediaParameter, ProtokollFehler,
    ServerNachricht, TrennGrund,
};

use crate::beobachter::SessionBeobachter;
use crate::error::SignalingError;
use crate::handle::SessionHandle;
use crate::handler::{
    runde_ausfuehren, AuthEntscheidung, HandlerFuture, HandlerQueues, OpenKontext,
    SchliessKontext,
};
use crate::zustand::SessionZustand;

/// Standard-Maximum fuer Text-Frames: 64 KiB
pub const MAX_TEXT_GROESSE: usize = 64 * 1024;

/// Info im `disconnect` bei Handler-Fehlern
const INTERNER_FEHLER_INFO: &str = "Interner Serverfehler";

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionKonfig {
    /// Maximale Groesse eines Text-Frames in Bytes
    pub max_text_groesse: usize,
}

impl Default for SessionKonfig {
    fn default() -> Self {
        Self {
            max_text_groesse: MAX_TEXT_GROESSE,
        }
    }
}

// ---------------------------------------------------------------------------
// Geteilter Zustand
// ---------------------------------------------------------------------------

pub(crate) struct Kern {
    pub(crate) zustand: SessionZustand,
    pub(crate) id: Option<SessionId>,
    /// Zuletzt gesendete Server-Sequenznummer
    pub(crate) server_seq: u64,
    /// Zuletzt akzeptierte Client-Sequenznummer
    pub(crate) client_seq: u64,
    pub(crate) media: Option<Arc<MediaParameter>>,
    pub(crate) start_paused: bool,
    pub(crate) position: Duration,
    /// `pause` gesendet, `paused` steht aus
    pub(crate) pause_angefordert: bool,
    /// `resume` gesendet, `resumed` steht aus
    pub(crate) fortsetzen_angefordert: bool,
    /// `pause` nach dem naechsten `resumed` senden
    pub(crate) pause_vorgemerkt: bool,
    /// `resume` nach dem naechsten `paused` senden
    pub(crate) fortsetzen_vorgemerkt: bool,
}

/// Von `Session` und allen `SessionHandle`s geteilt
///
/// Sperr-Reihenfolge: erst `kern`, dann `queues`.
pub(crate) struct Geteilt {
    pub(crate) kern: Mutex<Kern>,
    pub(crate) queues: Mutex<HandlerQueues>,
    ausgang: mpsc::UnboundedSender<String>,
    beobachter: RwLock<Vec<Arc<dyn SessionBeobachter>>>,
    pub(crate) konfig: SessionKonfig,
}

/// Sperre auf den Kern; gesendete Nachrichten werden erst nach dem
/// Freigeben an Beobachter gemeldet
pub(crate) struct Transaktion<'a> {
    pub(crate) kern: MutexGuard<'a, Kern>,
    ausgang: &'a mpsc::UnboundedSender<String>,
    gesendet: Vec<String>,
}

impl Transaktion<'_> {
    /// Vergibt die naechste Server-Sequenznummer und sendet
    pub(crate) fn senden(&mut self, nachricht: ServerNachricht) -> bool {
        let id = self.kern.id.unwrap_or(SessionId(Uuid::nil()));
        let seq = self.kern.server_seq + 1;
        let text = match nachricht.umschlag(id, seq, self.kern.client_seq) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(typ = nachricht.typ(), fehler = %e, "Nachricht nicht serialisierbar");
                return false;
            }
        };
        if self.ausgang.send(text.clone()).is_err() {
            tracing::debug!(typ = nachricht.typ(), "Ausgang geschlossen, Nachricht verworfen");
            return false;
        }
        self.kern.server_seq = seq;
        tracing::debug!(typ = nachricht.typ(), seq, "Nachricht gesendet");
        self.gesendet.push(text);
        true
    }

    pub(crate) fn zustand_setzen(&mut self, neu: SessionZustand) {
        let alt = self.kern.zustand;
        if alt != neu {
            self.kern.zustand = neu;
            tracing::debug!(alt = %alt, neu = %neu, "Zustandswechsel");
        }
    }

    /// Sendet `disconnect` gemaess Trennungstabelle
    pub(crate) fn trennen(&mut self, grund: TrennGrund, info: Option<String>) -> bool {
        let zustand = self.kern.zustand;
        if !zustand.trennung_sendbar() {
            tracing::debug!(zustand = %zustand, grund = ?grund, "disconnect in diesem Zustand nicht sendbar");
            return false;
        }
        let gesendet = self.senden(ServerNachricht::disconnect(grund, info));
        match grund {
            TrennGrund::Unauthorized => self.zustand_setzen(SessionZustand::Unauthorized),
            TrennGrund::Error => self.zustand_setzen(SessionZustand::SignalisierterFehler),
            // Der Client antwortet mit `close`
            TrennGrund::Completed => {}
        }
        gesendet
    }

    /// Signalisiert einen Fehler, sofern der Zustand es zulaesst
    pub(crate) fn fehler_signalisieren(&mut self, info: String) {
        let zustand = self.kern.zustand;
        if zustand.fehlersignal_unterdrueckt() {
            tracing::debug!(zustand = %zustand, info = %info, "Fehlersignal unterdrueckt");
        } else if zustand.trennung_sendbar() {
            self.trennen(TrennGrund::Error, Some(info));
        } else {
            tracing::warn!(zustand = %zustand, info = %info, "Fehler waehrend des Schliessens");
            self.zustand_setzen(SessionZustand::SignalisierterFehler);
        }
    }
}

impl Geteilt {
    pub(crate) fn transaktion<R>(&self, f: impl FnOnce(&mut Transaktion<'_>) -> R) -> R {
        let mut t = Transaktion {
            kern: self.kern.lock(),
            ausgang: &self.ausgang,
            gesendet: Vec::new(),
        };
        let ergebnis = f(&mut t);
        let gesendet = std::mem::take(&mut t.gesendet);
        drop(t);

        if !gesendet.is_empty() {
            self.melden(|b| {
                for text in &gesendet {
                    b.nachricht_gesendet(text);
                }
            });
        }
        ergebnis
    }

    pub(crate) fn zustand(&self) -> SessionZustand {
        self.kern.lock().zustand
    }

    pub(crate) fn beobachter_hinzufuegen(&self, beobachter: Arc<dyn SessionBeobachter>) {
        self.beobachter.write().push(beobachter);
    }

    /// Ruft alle Beobachter ohne gehaltene Sperren auf
    pub(crate) fn melden(&self, f: impl Fn(&dyn SessionBeobachter)) {
        let beobachter: Vec<_> = self.beobachter.read().iter().cloned().collect();
        for b in &beobachter {
            f(b.as_ref());
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Treiber einer AudioHook-Session
pub struct Session {
    geteilt: Arc<Geteilt>,
}

impl Session {
    /// Erstellt eine Session im Zustand PREPARING
    ///
    /// `id` ist die Session-ID aus dem Upgrade-Header, falls bekannt. Der
    /// Empfaenger liefert alle ausgehenden Text-Frames in Sendereihenfolge.
    pub fn neu(
        konfig: SessionKonfig,
        id: Option<SessionId>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (ausgang, empfaenger) = mpsc::unbounded_channel();
        let geteilt = Arc::new(Geteilt {
            kern: Mutex::new(Kern {
                zustand: SessionZustand::Preparing,
                id,
                server_seq: 0,
                client_seq: 0,
                media: None,
                start_paused: false,
                position: Duration::ZERO,
                pause_angefordert: false,
                fortsetzen_angefordert: false,
                pause_vorgemerkt: false,
                fortsetzen_vorgemerkt: false,
            }),
            queues: Mutex::new(HandlerQueues::default()),
            ausgang,
            beobachter: RwLock::new(Vec::new()),
            konfig,
        });
        (Self { geteilt }, empfaenger)
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::neu(Arc::clone(&self.geteilt))
    }

    pub fn zustand(&self) -> SessionZustand {
        self.geteilt.zustand()
    }

    // -----------------------------------------------------------------------
    // Eingang
    // -----------------------------------------------------------------------

    /// Verarbeitet einen Text-Frame vollstaendig (inklusive Handler)
    pub async fn text_empfangen(&mut self, text: &str) {
        if self.zustand().ist_beendet() {
            tracing::debug!("Text-Frame nach Transportende ignoriert");
            return;
        }
        self.geteilt.melden(|b| b.nachricht_empfangen(text));

        match self.text_pruefen(text) {
            Ok(nachricht) => self.verteilen(nachricht).await,
            Err(fehler) => self.protokoll_fehler(fehler),
        }
    }

    /// Verarbeitet einen binaeren Audio-Frame
    pub fn binaer_empfangen(&mut self, daten: &[u8]) {
        let media = self.geteilt.transaktion(|t| {
            let zustand = t.kern.zustand;
            if zustand.ist_beendet() {
                return Ok(None);
            }
            if zustand != SessionZustand::Active {
                return Err(SignalingError::zustand("audio", zustand));
            }
            t.kern.media.clone().map(Some).ok_or(SignalingError::KeinMedia)
        });

        let media = match media {
            Ok(Some(media)) => media,
            Ok(None) => return,
            Err(fehler) => return self.protokoll_fehler(fehler),
        };
        match AudioFrame::neu(&media, daten) {
            Ok(frame) => self.geteilt.melden(|b| b.audio(&frame)),
            Err(fehler) => self.protokoll_fehler(fehler.into()),
        }
    }

    /// Transport ist geschlossen: offene Close-Handler, dann Fini-Handler
    pub async fn transport_geschlossen(&mut self) {
        let vorher = self.geteilt.transaktion(|t| {
            let vorher = t.kern.zustand;
            if !vorher.ist_beendet() {
                t.zustand_setzen(SessionZustand::Finalizing);
            }
            vorher
        });
        if vorher.ist_beendet() {
            return;
        }
        tracing::info!(zustand = %vorher, "Transport geschlossen, Session wird beendet");

        self.close_runden(None, false).await;

        let handle = self.handle();
        loop {
            let runde = std::mem::take(&mut self.geteilt.queues.lock().fini);
            if runde.is_empty() {
                break;
            }
            let futures: Vec<HandlerFuture<()>> =
                runde.into_iter().map(|h| h(handle.clone())).collect();
            // Fehler sind bereits geloggt
            let _ = runde_ausfuehren("fini", futures).await;
        }

        self.geteilt.transaktion(|t| t.zustand_setzen(SessionZustand::Disconnected));
        let verworfen = self.geteilt.queues.lock().leeren();
        if verworfen > 0 {
            tracing::debug!(anzahl = verworfen, "Nicht ausgefuehrte Handler verworfen");
        }
    }

    // -----------------------------------------------------------------------
    // Pruefung
    // -----------------------------------------------------------------------

    fn text_pruefen(&self, text: &str) -> Result<ClientNachricht, SignalingError> {
        let maximum = self.geteilt.konfig.max_text_groesse;
        if text.len() > maximum {
            return Err(ProtokollFehler::ZuGross {
                groesse: text.len(),
                maximum,
            }
            .into());
        }

        let umschlag = ClientUmschlag::aus_text(text)?;
        let id = umschlag.strukturell_pruefen()?;

        // Reihenfolge und Zuordnung, noch ohne Uebernahme
        {
            let kern = self.geteilt.kern.lock();
            if let Some(bekannt) = kern.id {
                if bekannt != id {
                    return Err(ProtokollFehler::SessionIdAbweichung {
                        erwartet: bekannt.to_string(),
                        erhalten: id.to_string(),
                    }
                    .into());
                }
            }
            if umschlag.seq != kern.client_seq + 1 {
                return Err(ProtokollFehler::Sequenz {
                    erwartet: kern.client_seq + 1,
                    erhalten: umschlag.seq,
                }
                .into());
            }
            if umschlag.serverseq > kern.server_seq {
                return Err(ProtokollFehler::ServerSequenz {
                    erhalten: umschlag.serverseq,
                    gesendet: kern.server_seq,
                }
                .into());
            }
        }

        let nachricht = ClientNachricht::aus_umschlag(&umschlag.typ, umschlag.parameters)?;

        self.geteilt.transaktion(|t| -> Result<(), SignalingError> {
            let zustand = t.kern.zustand;
            let erlaubt = zustand != SessionZustand::Preparing
                || matches!(nachricht, ClientNachricht::Open(_) | ClientNachricht::Ping(_));
            if !erlaubt {
                return Err(ProtokollFehler::UnerwarteterTyp(format!(
                    "{} im Zustand {zustand}",
                    nachricht.typ()
                ))
                .into());
            }
            t.kern.id = Some(id);
            t.kern.client_seq = umschlag.seq;
            t.kern.position = umschlag.position;
            Ok(())
        })?;

        tracing::trace!(typ = nachricht.typ(), seq = umschlag.seq, "Nachricht akzeptiert");
        Ok(nachricht)
    }

    fn protokoll_fehler(&self, fehler: SignalingError) {
        tracing::warn!(fehler = %fehler, "Protokollverletzung");
        self.geteilt
            .transaktion(|t| t.fehler_signalisieren(fehler.to_string()));
    }

    fn handler_fehler(&self, phase: &'static str, fehler: anyhow::Error) {
        tracing::error!(phase, fehler = %fehler, "Handler-Fehler");
        self.geteilt
            .transaktion(|t| t.fehler_signalisieren(INTERNER_FEHLER_INFO.to_string()));
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    async fn verteilen(&mut self, nachricht: ClientNachricht) {
        match nachricht {
            ClientNachricht::Open(open) => self.open_verarbeiten(open).await,
            ClientNachricht::Close(close) => self.close_verarbeiten(close.reason).await,
            ClientNachricht::Ping(ping) => self.ping_verarbeiten(ping),
            ClientNachricht::Paused => self.pausiert_verarbeiten(),
            ClientNachricht::Resumed => self.fortgesetzt_verarbeiten(),
            ClientNachricht::Discarded(p) => {
                tracing::info!(
                    start = ?p.start,
                    dauer = ?p.discarded,
                    "Client hat Audio verworfen"
                );
                self.geteilt.melden(|b| b.verworfen(p.start, p.discarded));
            }
            ClientNachricht::Error(p) => {
                tracing::warn!(
                    code = p.code,
                    meldung = %p.message,
                    retry_after = ?p.retry_after,
                    "Client meldet Fehler"
                );
            }
            ClientNachricht::Update(p) => {
                tracing::info!(sprache = ?p.language, "Client-Update");
            }
            ClientNachricht::Reconnecting => tracing::info!("Client verbindet neu"),
            ClientNachricht::Reconnected => tracing::info!("Client wieder verbunden"),
        }
    }

    fn ping_verarbeiten(&self, ping: PingParameter) {
        self.geteilt.transaktion(|t| t.senden(ServerNachricht::Pong));
        if let Some(rtt) = ping.rtt {
            tracing::trace!(rtt_ms = rtt.as_millis() as u64, "RTT gemeldet");
            self.geteilt.melden(|b| b.statistik(rtt));
        }
    }

    fn pausiert_verarbeiten(&self) {
        let melden = self.geteilt.transaktion(|t| match t.kern.zustand {
            SessionZustand::Active => {
                t.kern.pause_angefordert = false;
                t.zustand_setzen(SessionZustand::Paused);
                if std::mem::take(&mut t.kern.fortsetzen_vorgemerkt)
                    && t.senden(ServerNachricht::Resume)
                {
                    t.kern.fortsetzen_angefordert = true;
                }
                true
            }
            SessionZustand::Paused => false,
            zustand => {
                tracing::debug!(zustand = %zustand, "'paused' ignoriert");
                false
            }
        });
        if melden {
            self.geteilt.melden(|b| b.pausiert());
        }
    }

    fn fortgesetzt_verarbeiten(&self) {
        let melden = self.geteilt.transaktion(|t| match t.kern.zustand {
            SessionZustand::Paused => {
                t.kern.fortsetzen_angefordert = false;
                t.zustand_setzen(SessionZustand::Active);
                if std::mem::take(&mut t.kern.pause_vorgemerkt)
                    && t.senden(ServerNachricht::Pause)
                {
                    t.kern.pause_angefordert = true;
                }
                true
            }
            SessionZustand::Active => false,
            zustand => {
                tracing::debug!(zustand = %zustand, "'resumed' ignoriert");
                false
            }
        });
        if melden {
            self.geteilt.melden(|b| b.fortgesetzt());
        }
    }

    /// Ist die Session noch im Zustand `erwartet`?
    fn noch_in(&self, erwartet: SessionZustand, phase: &'static str) -> bool {
        let zustand = self.zustand();
        if zustand != erwartet {
            tracing::debug!(phase, zustand = %zustand, "Zustand hat sich geaendert, Phase abgebrochen");
            return false;
        }
        true
    }

    // -----------------------------------------------------------------------
    // open
    // -----------------------------------------------------------------------

    async fn open_verarbeiten(&mut self, open: OpenParameter) {
        let erlaubt = self.geteilt.transaktion(|t| {
            if t.kern.zustand != SessionZustand::Preparing {
                return false;
            }
            t.zustand_setzen(SessionZustand::Opening);
            true
        });
        if !erlaubt {
            let zustand = self.zustand();
            return self.protokoll_fehler(
                ProtokollFehler::UnerwarteterTyp(format!("open im Zustand {zustand}")).into(),
            );
        }
        tracing::info!(
            conversation_id = %open.conversation_id,
            organisation_id = %open.organization_id,
            angebote = open.media.len(),
            "Session wird geoeffnet"
        );

        let open = Arc::new(open);
        let handle = self.handle();

        // Authentifikatoren nacheinander
        loop {
            let naechster = self.geteilt.queues.lock().authentifikatoren.pop_front();
            let Some(authentifikator) = naechster else {
                break;
            };
            match authentifikator(handle.clone(), Arc::clone(&open)).await {
                Ok(AuthEntscheidung::Erlaubt) => {}
                Ok(AuthEntscheidung::Abgelehnt { grund }) => {
                    tracing::warn!(grund = ?grund, "Authentifizierung abgelehnt");
                    self.geteilt.transaktion(|t| {
                        t.trennen(TrennGrund::Unauthorized, grund);
                    });
                    return;
                }
                Ok(AuthEntscheidung::Trennen { grund, info }) => {
                    self.geteilt.transaktion(|t| {
                        t.trennen(grund, info);
                    });
                    return;
                }
                Err(fehler) => return self.handler_fehler("authentifikator", fehler),
            }
            if !self.noch_in(SessionZustand::Opening, "authentifikator") {
                return;
            }
        }

        // Media-Auswahl: jede Stufe engt das Angebot ein
        let mut angebot = open.media.clone();
        loop {
            let naechste = self.geteilt.queues.lock().media_auswahl.pop_front();
            let Some(auswahl) = naechste else {
                break;
            };
            match auswahl(handle.clone(), angebot).await {
                Ok(neu) => {
                    angebot = neu
                        .into_iter()
                        .filter(|m| open.media.contains(m))
                        .collect();
                }
                Err(fehler) => return self.handler_fehler("media-auswahl", fehler),
            }
            if !self.noch_in(SessionZustand::Opening, "media-auswahl") {
                return;
            }
        }
        let media = angebot.into_iter().next();
        match &media {
            Some(m) => tracing::info!(
                media_format = ?m.format,
                kanaele = ?m.channels,
                rate = m.rate,
                "Media ausgewaehlt"
            ),
            None => tracing::info!("Kein Media ausgewaehlt"),
        }
        self.geteilt.transaktion(|t| {
            t.kern.media = media.clone().map(Arc::new);
        });

        // Open-Handler rundenweise parallel
        loop {
            let runde = std::mem::take(&mut self.geteilt.queues.lock().open);
            if runde.is_empty() {
                break;
            }
            let kontext = OpenKontext {
                handle: handle.clone(),
                open: Arc::clone(&open),
                media: media.clone(),
            };
            let futures: Vec<HandlerFuture<()>> =
                runde.into_iter().map(|h| h(kontext.clone())).collect();
            if let Err(fehler) = runde_ausfuehren("open", futures).await {
                return self.handler_fehler("open", fehler);
            }
            if !self.noch_in(SessionZustand::Opening, "open") {
                return;
            }
        }

        self.geteilt.transaktion(|t| {
            if t.kern.zustand != SessionZustand::Opening {
                return;
            }
            let start_paused = t.kern.start_paused;
            t.senden(ServerNachricht::Opened(OpenedParameter {
                start_paused,
                media: media.into_iter().collect(),
            }));
            t.zustand_setzen(if start_paused {
                SessionZustand::Paused
            } else {
                SessionZustand::Active
            });
        });
        tracing::info!(zustand = %self.zustand(), "Session geoeffnet");
    }

    // -----------------------------------------------------------------------
    // close
    // -----------------------------------------------------------------------

    async fn close_verarbeiten(&mut self, grund: CloseGrund) {
        let erlaubt = self.geteilt.transaktion(|t| {
            if !t.kern.zustand.close_erlaubt() {
                return false;
            }
            t.zustand_setzen(SessionZustand::Closing);
            true
        });
        if !erlaubt {
            let zustand = self.zustand();
            return self.protokoll_fehler(
                ProtokollFehler::UnerwarteterTyp(format!("close im Zustand {zustand}")).into(),
            );
        }
        tracing::info!(grund = grund.als_str(), "Session wird geschlossen");

        if !self.close_runden(Some(grund), true).await {
            return;
        }

        self.geteilt.transaktion(|t| {
            if t.kern.zustand == SessionZustand::Closing {
                t.senden(ServerNachricht::Closed);
                t.zustand_setzen(SessionZustand::Closed);
            }
        });
    }

    /// Fuehrt Close-Handler rundenweise aus
    ///
    /// Mit `fehler_melden` fuehrt ein Handler-Fehler zur Fehlersignalisierung
    /// und bricht ab; liefert `false` bei Abbruch.
    async fn close_runden(&self, grund: Option<CloseGrund>, fehler_melden: bool) -> bool {
        let kontext = SchliessKontext {
            handle: self.handle(),
            grund,
        };
        loop {
            let runde = std::mem::take(&mut self.geteilt.queues.lock().close);
            if runde.is_empty() {
                return true;
            }
            let futures: Vec<HandlerFuture<()>> =
                runde.into_iter().map(|h| h(kontext.clone())).collect();
            if let Err(fehler) = runde_ausfuehren("close", futures).await {
                if fehler_melden {
                    self.handler_fehler("close", fehler);
                    return false;
                }
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kern = self.geteilt.kern.lock();
        f.debug_struct("Session")
            .field("id", &kern.id)
            .field("zustand", &kern.zustand)
            .field("server_seq", &kern.server_seq)
            .field("client_seq", &kern.client_seq)
            .finish()
    }
}
