//! hoerrohr-protocol – AudioHook-Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen, Media-Parameter und
//! Audio-Frame-Ansichten die zwischen Telefonieplattform und Server
//! ausgetauscht werden.

pub mod audio;
pub mod dauer;
pub mod error;
pub mod media;
pub mod nachricht;

pub use audio::{AudioFrame, KanalAnsicht};
pub use error::{AudioFehler, ProtokollFehler};
pub use media::{KanalRolle, MediaFormat, MediaParameter, MediaTyp};
pub use nachricht::{ClientNachricht, ClientUmschlag, ServerNachricht, TrennGrund, PROTOKOLL_VERSION};
