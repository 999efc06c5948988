//! hoerrohr-auth – Authentifizierung des AudioHook-Upgrades
//!
//! Dieses Crate implementiert:
//! - Structured Field Values nach RFC 8941 (Parser und Serialisierer)
//! - HTTP Message Signatures mit HMAC-SHA256 (Signaturbasis, Pruefer)
//! - API-Schluessel-Speicher und asynchrone Schluesselaufloesung

pub mod error;
pub mod schluessel;
pub mod sfv;
pub mod signatur;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult, SfvFehler, SfvResult};
pub use schluessel::{ApiSchluesselEintrag, ApiSchluesselSpeicher, ClientSchluessel, SchluesselAufloeser};
pub use signatur::{
    anfrage_signieren, Anfrage, FehlerCode, FehlerDetail, PruefErgebnis, PrueferKonfig,
    PrueferStatistik, SignaturParameter, SignaturPruefer, Vorbedingung,
};
