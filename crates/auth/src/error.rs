//! Fehlertypen fuer Structured Fields, Signaturen und API-Schluessel

use thiserror::Error;

/// Fehler beim Parsen oder Serialisieren von Structured Fields (RFC 8941)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SfvFehler {
    #[error("Syntaxfehler an Position {position}: {erwartet} erwartet")]
    Syntax {
        position: usize,
        erwartet: &'static str,
    },

    #[error("Zeichenkette nicht abgeschlossen")]
    ZeichenketteOffen,

    #[error("Byte-Sequenz nicht abgeschlossen")]
    ByteSequenzOffen,

    #[error("Ungueltiges Zeichen an Position {0}")]
    UngueltigesZeichen(usize),

    #[error("Ungueltiges Base64 in Byte-Sequenz: {0}")]
    Base64(String),

    #[error("Zahl ausserhalb des erlaubten Bereichs: {0}")]
    Ueberlauf(String),

    #[error("Ungueltiger Token '{0}'")]
    UngueltigerToken(String),

    #[error("Ungueltiger Schluessel '{0}'")]
    UngueltigerSchluessel(String),

    #[error("Unerwartete Zeichen nach Feldende an Position {0}")]
    RestEingabe(usize),
}

/// Result-Alias fuer Structured Fields
pub type SfvResult<T> = Result<T, SfvFehler>;

/// Fehler im Auth-Subsystem (Schluesselverwaltung)
#[derive(Debug, Error)]
pub enum AuthError {
    // --- API-Schluessel ---
    #[error("API-Schluessel ungueltig: {0}")]
    SchluesselUngueltig(String),

    #[error("API-Schluessel nicht gefunden: {0}")]
    SchluesselNichtGefunden(String),

    #[error("Client-Secret ist kein gueltiges Base64: {0}")]
    SecretKodierung(#[from] base64::DecodeError),
}

/// Result-Alias fuer den Auth-Service
pub type AuthResult<T> = Result<T, AuthError>;
