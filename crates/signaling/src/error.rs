//! Fehlertypen fuer die Session-Zustandsmaschine

use hoerrohr_protocol::{AudioFehler, ProtokollFehler};
use thiserror::Error;

use crate::zustand::SessionZustand;

#[derive(Debug, Error)]
pub enum SignalingError {
    /// Operation im aktuellen Zustand nicht erlaubt
    #[error("'{operation}' im Zustand {zustand} nicht erlaubt")]
    UngueltigerZustand {
        operation: &'static str,
        zustand: SessionZustand,
    },

    /// Verletzung des AudioHook-Protokolls
    #[error(transparent)]
    Protokoll(#[from] ProtokollFehler),

    /// Binaerer Frame passt nicht zum ausgewaehlten Format
    #[error("Ungueltiger Audio-Frame: {0}")]
    Audio(#[from] AudioFehler),

    /// Audio ohne ausgewaehltes Media-Format
    #[error("Kein Media-Format ausgewaehlt")]
    KeinMedia,
}

impl SignalingError {
    pub(crate) fn zustand(operation: &'static str, zustand: SessionZustand) -> Self {
        Self::UngueltigerZustand { operation, zustand }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
