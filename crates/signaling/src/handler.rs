//! Handler-Warteschlangen einer Session
//!
//! Handler werden beim Ausfuehren verbraucht. Authentifikatoren und
//! Media-Auswahl laufen nacheinander, Open-, Close- und Fini-Handler laufen
//! je Runde parallel. Waehrend einer Runde registrierte Handler bilden die
//! naechste Runde.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};
use hoerrohr_protocol::nachricht::{CloseGrund, OpenParameter};
use hoerrohr_protocol::{MediaParameter, TrennGrund};

use crate::handle::SessionHandle;

/// Ergebnis eines Handlers
pub type HandlerFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Entscheidung eines Authentifikators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEntscheidung {
    /// Weiter mit dem naechsten Authentifikator
    Erlaubt,
    /// Session wird mit `unauthorized` getrennt
    Abgelehnt { grund: Option<String> },
    /// Session wird mit dem angegebenen Grund getrennt
    Trennen {
        grund: TrennGrund,
        info: Option<String>,
    },
}

/// Kontext eines Open-Handlers
#[derive(Clone)]
pub struct OpenKontext {
    pub handle: SessionHandle,
    pub open: Arc<OpenParameter>,
    /// Ausgewaehltes Format (None = kein Audio)
    pub media: Option<MediaParameter>,
}

/// Kontext eines Close-Handlers
#[derive(Clone)]
pub struct SchliessKontext {
    pub handle: SessionHandle,
    /// Grund aus dem `close`; None wenn der Transport vorher geschlossen wurde
    pub grund: Option<CloseGrund>,
}

pub type Authentifikator =
    Box<dyn FnOnce(SessionHandle, Arc<OpenParameter>) -> HandlerFuture<AuthEntscheidung> + Send>;
pub type MediaAuswahl =
    Box<dyn FnOnce(SessionHandle, Vec<MediaParameter>) -> HandlerFuture<Vec<MediaParameter>> + Send>;
pub type OpenHandler = Box<dyn FnOnce(OpenKontext) -> HandlerFuture<()> + Send>;
pub type CloseHandler = Box<dyn FnOnce(SchliessKontext) -> HandlerFuture<()> + Send>;
pub type FiniHandler = Box<dyn FnOnce(SessionHandle) -> HandlerFuture<()> + Send>;

#[derive(Default)]
pub(crate) struct HandlerQueues {
    pub(crate) authentifikatoren: VecDeque<Authentifikator>,
    pub(crate) media_auswahl: VecDeque<MediaAuswahl>,
    pub(crate) open: Vec<OpenHandler>,
    pub(crate) close: Vec<CloseHandler>,
    pub(crate) fini: Vec<FiniHandler>,
}

impl HandlerQueues {
    /// Verwirft alle noch nicht ausgefuehrten Handler
    pub(crate) fn leeren(&mut self) -> usize {
        let anzahl = self.authentifikatoren.len()
            + self.media_auswahl.len()
            + self.open.len()
            + self.close.len()
            + self.fini.len();
        *self = Self::default();
        anzahl
    }
}

/// Fuehrt eine Runde parallel aus
///
/// Alle Handler laufen zu Ende, jeder Fehler wird geloggt, der erste wird
/// zurueckgegeben.
pub(crate) async fn runde_ausfuehren(
    phase: &'static str,
    handler: Vec<HandlerFuture<()>>,
) -> anyhow::Result<()> {
    let anzahl = handler.len();
    let ergebnisse = join_all(handler).await;

    let mut erster = None;
    for fehler in ergebnisse.into_iter().filter_map(Result::err) {
        tracing::error!(phase, fehler = %fehler, "Handler fehlgeschlagen");
        erster.get_or_insert(fehler);
    }
    tracing::trace!(phase, anzahl, "Handler-Runde abgeschlossen");
    erster.map_or(Ok(()), Err)
}
