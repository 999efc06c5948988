//! hoerrohr-signaling – AudioHook-Session-Zustandsmaschine
//!
//! Dieser Crate verarbeitet die Text- und Binaer-Frames einer
//! AudioHook-Verbindung. Er kennt keinen Transport: der Verbindungs-Task
//! uebergibt empfangene Frames an die `Session` und sendet, was aus dem
//! Ausgangskanal kommt.
//!
//! ## Architektur
//!
//! ```text
//! Verbindungs-Task
//!     |  text_empfangen / binaer_empfangen / transport_geschlossen
//!     v
//! Session (sequentiell)
//!     |
//!     +-- Umschlag-, Sequenz- und Parameterpruefung
//!     +-- open:  Authentifikatoren -> Media-Auswahl -> Open-Handler -> opened
//!     +-- close: Close-Handler -> closed
//!     +-- Ende:  Close-Handler -> Fini-Handler -> DISCONNECTED
//!     |
//!     +-- SessionBeobachter (Audio, Pause, Statistik, Nachrichten)
//!
//! SessionHandle (klonbar) – Registrierung, pausieren/fortsetzen,
//!                           trennen, ereignis_senden
//! ```

pub mod authentifikator;
pub mod beobachter;
pub mod error;
pub mod handle;
pub mod handler;
pub mod session;
pub mod zustand;

// Bequeme Re-Exporte
pub use authentifikator::{signatur_authentifikator_einrichten, SignaturModus};
pub use beobachter::SessionBeobachter;
pub use error::{SignalingError, SignalingResult};
pub use handle::SessionHandle;
pub use handler::{AuthEntscheidung, OpenKontext, SchliessKontext};
pub use session::{Session, SessionKonfig, MAX_TEXT_GROESSE};
pub use zustand::SessionZustand;
