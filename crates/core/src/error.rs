//! Fehlertypen fuer Hoerrohr
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehlerzustaende.
//! Untermodule definieren eigene Fehler und konvertieren bei Bedarf.

use thiserror::Error;

/// Globaler Result-Alias fuer Hoerrohr
pub type Result<T> = std::result::Result<T, HoerrohrError>;

/// Crate-uebergreifende Fehler im Hoerrohr-System
#[derive(Debug, Error)]
pub enum HoerrohrError {
    // --- Identifikation ---
    #[error("Ungueltige ID '{wert}': {grund}")]
    UngueltigeId { wert: String, grund: String },

    // --- Ereignisse ---
    #[error("Ereignis konnte nicht zugestellt werden: {0}")]
    EreignisZustellung(String),
}
