//! Fehlertypen fuer Protokoll und Audio-Frames

use thiserror::Error;

/// Verletzungen des AudioHook-Protokolls
///
/// Alle Varianten werden der Gegenstelle als Client-Fehler signalisiert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtokollFehler {
    #[error("Nachricht zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { groesse: usize, maximum: usize },

    #[error("Ungueltiges JSON: {0}")]
    UngueltigesJson(String),

    #[error("Ungueltiger Nachrichtenumschlag: {0}")]
    UngueltigerUmschlag(String),

    #[error("Nicht unterstuetzte Protokollversion '{0}'")]
    Version(String),

    #[error("Ungueltige Session-ID '{0}'")]
    UngueltigeSessionId(String),

    #[error("Session-ID stimmt nicht ueberein: erwartet {erwartet}, erhalten {erhalten}")]
    SessionIdAbweichung { erwartet: String, erhalten: String },

    #[error("Ungueltige Sequenznummer: erwartet {erwartet}, erhalten {erhalten}")]
    Sequenz { erwartet: u64, erhalten: u64 },

    #[error("Ungueltige Server-Sequenznummer {erhalten} (zuletzt gesendet: {gesendet})")]
    ServerSequenz { erhalten: u64, gesendet: u64 },

    #[error("Unerwarteter Nachrichtentyp '{0}'")]
    UnerwarteterTyp(String),

    #[error("Ungueltige Parameter fuer '{typ}': {grund}")]
    UngueltigeParameter { typ: String, grund: String },

    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(String),
}

/// Fehler beim Interpretieren eines binaeren Audio-Frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioFehler {
    #[error("Media-Parameter ohne Kanaele")]
    KeineKanaele,

    #[error("Audio-Frame mit {laenge} Bytes ist kein Vielfaches von {frame_groesse} Bytes")]
    UngueltigeFrameGroesse { laenge: usize, frame_groesse: usize },
}
