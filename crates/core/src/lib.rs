//! hoerrohr-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Hoerrohr-Crates gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{HoerrohrError, Result};
pub use event::{AnrufEreignis, EreignisSenke};
pub use types::{ConversationId, OrganisationsId, SessionId};
