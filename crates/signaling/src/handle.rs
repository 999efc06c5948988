//! SessionHandle – Zugriff von aussen auf eine laufende Session
//!
//! Der Handle ist billig klonbar und wird an alle Handler uebergeben. Alle
//! Operationen sind zustandsabhaengig: Registrierungen ausserhalb ihres
//! Zeitfensters liefern `SignalingError::UngueltigerZustand`, Signale
//! ausserhalb ihres Zeitfensters werden nicht gesendet.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hoerrohr_core::SessionId;
use hoerrohr_protocol::nachricht::{EventParameter, OpenParameter};
use hoerrohr_protocol::{MediaParameter, ServerNachricht, TrennGrund};
use serde_json::Value;

use crate::beobachter::SessionBeobachter;
use crate::error::{SignalingError, SignalingResult};
use crate::handler::{
    AuthEntscheidung, Authentifikator, CloseHandler, FiniHandler, HandlerFuture, HandlerQueues,
    MediaAuswahl, OpenHandler, OpenKontext, SchliessKontext,
};
use crate::session::Geteilt;
use crate::zustand::SessionZustand;

#[derive(Clone)]
pub struct SessionHandle {
    geteilt: Arc<Geteilt>,
}

impl SessionHandle {
    pub(crate) fn neu(geteilt: Arc<Geteilt>) -> Self {
        Self { geteilt }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Session-ID (aus Upgrade-Header oder erster Nachricht)
    pub fn id(&self) -> Option<SessionId> {
        self.geteilt.kern.lock().id
    }

    pub fn zustand(&self) -> SessionZustand {
        self.geteilt.zustand()
    }

    /// Ausgewaehltes Format nach der Media-Auswahl
    pub fn media(&self) -> Option<MediaParameter> {
        self.geteilt.kern.lock().media.as_deref().cloned()
    }

    /// Zuletzt vom Client gemeldete Stream-Position
    pub fn position(&self) -> Duration {
        self.geteilt.kern.lock().position
    }

    pub fn start_paused(&self) -> bool {
        self.geteilt.kern.lock().start_paused
    }

    // -----------------------------------------------------------------------
    // Registrierung
    // -----------------------------------------------------------------------

    fn registrieren(
        &self,
        operation: &'static str,
        erlaubt: impl FnOnce(SessionZustand) -> bool,
        einreihen: impl FnOnce(&mut HandlerQueues),
    ) -> SignalingResult<()> {
        let kern = self.geteilt.kern.lock();
        if !erlaubt(kern.zustand) {
            return Err(SignalingError::zustand(operation, kern.zustand));
        }
        einreihen(&mut self.geteilt.queues.lock());
        Ok(())
    }

    /// Authentifikator fuer das `open` (nur in PREPARING)
    pub fn authentifikator_hinzufuegen<F, Fut>(&self, authentifikator: F) -> SignalingResult<()>
    where
        F: FnOnce(SessionHandle, Arc<OpenParameter>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<AuthEntscheidung>> + Send + 'static,
    {
        let boxed: Authentifikator = Box::new(
            move |handle: SessionHandle,
                  open: Arc<OpenParameter>|
                  -> HandlerFuture<AuthEntscheidung> {
                Box::pin(authentifikator(handle, open))
            },
        );
        self.registrieren(
            "authentifikator_hinzufuegen",
            |z| z == SessionZustand::Preparing,
            |q| q.authentifikatoren.push_back(boxed),
        )
    }

    /// Media-Auswahl-Stufe (nur in PREPARING)
    ///
    /// Jede Stufe erhaelt das verbleibende Angebot und gibt die Teilmenge
    /// zurueck, die sie akzeptiert. Nicht angebotene Eintraege werden
    /// verworfen; der erste verbleibende Eintrag wird ausgewaehlt.
    pub fn media_auswahl_hinzufuegen<F, Fut>(&self, auswahl: F) -> SignalingResult<()>
    where
        F: FnOnce(SessionHandle, Vec<MediaParameter>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Vec<MediaParameter>>> + Send + 'static,
    {
        let boxed: MediaAuswahl = Box::new(
            move |handle: SessionHandle,
                  angebot: Vec<MediaParameter>|
                  -> HandlerFuture<Vec<MediaParameter>> {
                Box::pin(auswahl(handle, angebot))
            },
        );
        self.registrieren(
            "media_auswahl_hinzufuegen",
            |z| z == SessionZustand::Preparing,
            |q| q.media_auswahl.push_back(boxed),
        )
    }

    /// Open-Handler (in PREPARING und OPENING)
    pub fn open_handler_hinzufuegen<F, Fut>(&self, handler: F) -> SignalingResult<()>
    where
        F: FnOnce(OpenKontext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: OpenHandler =
            Box::new(move |kontext: OpenKontext| -> HandlerFuture<()> { Box::pin(handler(kontext)) });
        self.registrieren(
            "open_handler_hinzufuegen",
            |z| matches!(z, SessionZustand::Preparing | SessionZustand::Opening),
            |q| q.open.push(boxed),
        )
    }

    /// Close-Handler (bis CLOSED sowie waehrend FINALIZING)
    pub fn close_handler_hinzufuegen<F, Fut>(&self, handler: F) -> SignalingResult<()>
    where
        F: FnOnce(SchliessKontext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: CloseHandler = Box::new(move |kontext: SchliessKontext| -> HandlerFuture<()> {
            Box::pin(handler(kontext))
        });
        self.registrieren(
            "close_handler_hinzufuegen",
            |z| z.close_handler_erlaubt(),
            |q| q.close.push(boxed),
        )
    }

    /// Fini-Handler (bis DISCONNECTED)
    pub fn fini_handler_hinzufuegen<F, Fut>(&self, handler: F) -> SignalingResult<()>
    where
        F: FnOnce(SessionHandle) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: FiniHandler = Box::new(move |handle: SessionHandle| -> HandlerFuture<()> {
            Box::pin(handler(handle))
        });
        self.registrieren(
            "fini_handler_hinzufuegen",
            |z| z != SessionZustand::Disconnected,
            |q| q.fini.push(boxed),
        )
    }

    pub fn beobachter_hinzufuegen(&self, beobachter: Arc<dyn SessionBeobachter>) {
        self.geteilt.beobachter_hinzufuegen(beobachter);
    }

    // -----------------------------------------------------------------------
    // Steuerung
    // -----------------------------------------------------------------------

    /// Fordert eine Pause an
    ///
    /// Vor ACTIVE wird nur `startPaused` gesetzt. In ACTIVE wird einmalig
    /// `pause` gesendet; der Zustand wechselt mit dem `paused` des Clients.
    /// Laeuft noch ein `resume`, wird die Pause nach dem `resumed` gesendet.
    pub fn pausieren(&self) {
        self.geteilt.transaktion(|t| match t.kern.zustand {
            SessionZustand::Preparing | SessionZustand::Opening => {
                t.kern.start_paused = true;
            }
            SessionZustand::Active if !t.kern.pause_angefordert => {
                if t.senden(ServerNachricht::Pause) {
                    t.kern.pause_angefordert = true;
                    t.kern.fortsetzen_angefordert = false;
                }
            }
            SessionZustand::Active => {
                // `pause` laeuft bereits, ein vorgemerktes `resume` entfaellt
                t.kern.fortsetzen_vorgemerkt = false;
            }
            SessionZustand::Paused if t.kern.fortsetzen_angefordert => {
                t.kern.pause_vorgemerkt = true;
            }
            zustand => {
                tracing::debug!(zustand = %zustand, "pausieren ohne Wirkung");
            }
        });
    }

    /// Hebt eine Pause auf (Gegenstueck zu `pausieren`)
    pub fn fortsetzen(&self) {
        self.geteilt.transaktion(|t| match t.kern.zustand {
            SessionZustand::Preparing | SessionZustand::Opening => {
                t.kern.start_paused = false;
            }
            SessionZustand::Paused if !t.kern.fortsetzen_angefordert => {
                if t.senden(ServerNachricht::Resume) {
                    t.kern.fortsetzen_angefordert = true;
                    t.kern.pause_angefordert = false;
                }
            }
            SessionZustand::Paused => {
                t.kern.pause_vorgemerkt = false;
            }
            SessionZustand::Active if t.kern.pause_angefordert => {
                t.kern.fortsetzen_vorgemerkt = true;
            }
            zustand => {
                tracing::debug!(zustand = %zustand, "fortsetzen ohne Wirkung");
            }
        });
    }

    /// Sendet `disconnect`; liefert `true` wenn gesendet wurde
    pub fn trennen(&self, grund: TrennGrund, info: Option<String>) -> bool {
        tracing::info!(grund = ?grund, info = ?info, "Session wird getrennt");
        self.geteilt.transaktion(|t| t.trennen(grund, info))
    }

    /// Sendet ein `event` an den Client (in ACTIVE, PAUSED, CLOSING)
    pub fn ereignis_senden(&self, entities: Vec<Value>) -> bool {
        self.geteilt.transaktion(|t| {
            let zustand = t.kern.zustand;
            if !zustand.ereignis_erlaubt() {
                tracing::debug!(zustand = %zustand, "event in diesem Zustand nicht sendbar");
                return false;
            }
            t.senden(ServerNachricht::Event(EventParameter { entities }))
        })
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("zustand", &self.zustand())
            .finish()
    }
}
