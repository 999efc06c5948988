//! HTTP Message Signatures fuer den AudioHook-Upgrade
//!
//! Der Client signiert ausgewaehlte Header und abgeleitete Komponenten
//! (`@request-target`, `@authority`) mit HMAC-SHA256. Beschrieben wird die
//! Signatur ueber die Header `signature-input` (Dictionary mit einer Inner
//! List der Komponenten und Parametern) und `signature` (Dictionary mit der
//! Signatur als Byte-Sequenz unter demselben Label).
//!
//! ```text
//! signature-input: sig1=("@request-target" "x-api-key");keyid="..";nonce="..";created=..
//! signature:       sig1=:Base64==:
//! ```

mod basis;
mod parameter;
mod pruefer;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::error::SfvFehler;
use crate::sfv::{self, BareItem, Dictionary, InnerList, Item, ListenEintrag, Parameter};

pub use basis::signatur_basis;
pub use parameter::SignaturParameter;
pub use pruefer::{PrueferKonfig, PrueferStatistik, SignaturPruefer};

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Abgeleitete Komponente: Pfad und Query der Anfrage
pub const KOMPONENTE_REQUEST_TARGET: &str = "@request-target";
/// Abgeleitete Komponente: Host (kleingeschrieben)
pub const KOMPONENTE_AUTHORITY: &str = "@authority";
/// Abgeleitete Komponente: HTTP-Methode
pub const KOMPONENTE_METHOD: &str = "@method";
/// Abgeleitete Komponente: nur der Pfad
pub const KOMPONENTE_PATH: &str = "@path";

/// Mindestlaenge einer Nonce
pub const MIN_NONCE_LAENGE: usize = 22;

/// Komponenten die jeder AudioHook-Client signieren muss
pub const AUDIOHOOK_KOMPONENTEN: [&str; 6] = [
    KOMPONENTE_REQUEST_TARGET,
    KOMPONENTE_AUTHORITY,
    "audiohook-organization-id",
    "audiohook-session-id",
    "audiohook-correlation-id",
    "x-api-key",
];

// ---------------------------------------------------------------------------
// Anfrage
// ---------------------------------------------------------------------------

/// Die fuer die Pruefung relevanten Teile einer HTTP-Anfrage
#[derive(Debug, Clone, Default)]
pub struct Anfrage {
    pub methode: String,
    /// Pfad inklusive optionaler Query
    pub ziel: String,
    felder: Vec<(String, String)>,
}

impl Anfrage {
    pub fn neu(methode: impl Into<String>, ziel: impl Into<String>) -> Self {
        Self {
            methode: methode.into(),
            ziel: ziel.into(),
            felder: Vec::new(),
        }
    }

    /// Fuegt ein Header-Feld hinzu; der Name wird kleingeschrieben gespeichert
    pub fn header_hinzufuegen(&mut self, name: &str, wert: impl Into<String>) {
        self.felder.push((name.to_ascii_lowercase(), wert.into()));
    }

    /// Builder-Variante von `header_hinzufuegen`
    pub fn mit_header(mut self, name: &str, wert: impl Into<String>) -> Self {
        self.header_hinzufuegen(name, wert);
        self
    }

    /// Ersetzt alle Werte eines Headers
    pub fn header_setzen(&mut self, name: &str, wert: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        self.felder.retain(|(k, _)| *k != name);
        self.felder.push((name, wert.into()));
    }

    /// Kombinierter Header-Wert (mehrfache Felder mit `, ` verbunden)
    pub fn header(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let werte: Vec<&str> = self
            .felder
            .iter()
            .filter(|(k, _)| *k == name)
            .map(|(_, v)| v.trim())
            .collect();
        if werte.is_empty() {
            None
        } else {
            Some(werte.join(", "))
        }
    }

    /// `@authority`: Host-Header kleingeschrieben
    pub fn authority(&self) -> Option<String> {
        self.header("host").map(|h| h.to_ascii_lowercase())
    }

    /// `@path`: Ziel ohne Query
    pub fn pfad(&self) -> &str {
        self.ziel.split('?').next().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Ergebnis
// ---------------------------------------------------------------------------

/// Fehlerklasse einer fehlgeschlagenen Pruefung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FehlerCode {
    /// Header, Parameter oder Zeitfenster ungueltig
    Precondition,
    /// Unbekannter oder widerrufener Schluessel
    BadKey,
    /// Signatur stimmt nicht
    Failed,
}

impl FehlerCode {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Precondition => "PRECONDITION",
            Self::BadKey => "BADKEY",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for FehlerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Wie viel Fehlerdetail nach aussen gemeldet wird
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FehlerDetail {
    /// Kein Grund im `disconnect`
    #[default]
    #[serde(rename = "none")]
    Keine,
    /// Nur der Fehlercode
    #[serde(rename = "code")]
    Code,
    /// Code und Beschreibung
    #[serde(rename = "full")]
    Voll,
}

/// Ergebnis einer Signaturpruefung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruefErgebnis {
    Verifiziert,
    Fehlgeschlagen { code: FehlerCode, grund: String },
}

impl PruefErgebnis {
    pub(crate) fn fehler(code: FehlerCode, grund: impl Into<String>) -> Self {
        Self::Fehlgeschlagen {
            code,
            grund: grund.into(),
        }
    }

    pub fn ist_verifiziert(&self) -> bool {
        matches!(self, Self::Verifiziert)
    }

    pub fn code(&self) -> Option<FehlerCode> {
        match self {
            Self::Verifiziert => None,
            Self::Fehlgeschlagen { code, .. } => Some(*code),
        }
    }

    /// Grund fuer den Client gemaess Detail-Stufe
    pub fn externer_grund(&self, detail: FehlerDetail) -> Option<String> {
        let Self::Fehlgeschlagen { code, grund } = self else {
            return None;
        };
        match detail {
            FehlerDetail::Keine => None,
            FehlerDetail::Code => Some(code.als_str().to_string()),
            FehlerDetail::Voll => Some(format!("{code}: {grund}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Vorbedingungen
// ---------------------------------------------------------------------------

/// Verletzte Vorbedingung; fuehrt immer zu `PRECONDITION`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Vorbedingung {
    #[error("Header '{0}' fehlt")]
    HeaderFehlt(String),

    #[error("Header '{header}' ist kein gueltiges Structured Field: {fehler}")]
    HeaderUngueltig { header: String, fehler: SfvFehler },

    #[error("signature-input enthaelt keine Signatur")]
    KeineSignatur,

    #[error("Signatur '{0}' ist keine Inner List")]
    KeineInnerList(String),

    #[error("Komponente ist keine Zeichenkette")]
    KomponenteKeinString,

    #[error("Erforderliche Komponente '{0}' nicht signiert")]
    KomponenteNichtSigniert(String),

    #[error("Unbekannte abgeleitete Komponente '{0}'")]
    UnbekannteKomponente(String),

    #[error("Parameter '{0}' fehlt oder hat falschen Typ")]
    ParameterFehlt(&'static str),

    #[error("keyid stimmt nicht mit x-api-key ueberein")]
    KeyIdAbweichung,

    #[error("Nonce zu kurz ({0} Zeichen)")]
    NonceZuKurz(usize),

    #[error("Algorithmus '{0}' nicht unterstuetzt")]
    Algorithmus(String),

    #[error("created liegt {0}s in der Zukunft")]
    InZukunft(i64),

    #[error("Signatur ist {0}s alt")]
    ZuAlt(i64),

    #[error("Signatur abgelaufen")]
    Abgelaufen,

    #[error("signature enthaelt keine Byte-Sequenz unter '{0}'")]
    SignaturFehlt(String),
}

// ---------------------------------------------------------------------------
// Signieren (Client-Seite)
// ---------------------------------------------------------------------------

/// Berechnet HMAC-SHA256 ueber eine Signaturbasis
pub fn signatur_berechnen(schluessel: &[u8], basis: &str) -> Vec<u8> {
    let mut mac = match HmacSha256::new_from_slice(schluessel) {
        Ok(mac) => mac,
        // HMAC akzeptiert jede Schluessellaenge
        Err(_) => return Vec::new(),
    };
    mac.update(basis.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Signiert eine Anfrage und setzt `signature-input` und `signature`
///
/// Wird von Testclients und Werkzeugen verwendet; `parameter` enthaelt
/// `keyid`, `nonce`, `created` usw.
pub fn anfrage_signieren(
    anfrage: &mut Anfrage,
    label: &str,
    komponenten: &[&str],
    parameter: Parameter,
    schluessel: &[u8],
) -> Result<(), Vorbedingung> {
    let liste = InnerList {
        items: komponenten
            .iter()
            .map(|k| Item::neu(BareItem::String((*k).to_string())))
            .collect(),
        parameter,
    };
    let mut eingabe = Dictionary::neu();
    eingabe.setzen(label, ListenEintrag::InnerList(liste));
    let eingabe_text = sfv::encode(&sfv::Feld::Dictionary(eingabe))
        .map_err(|f| header_fehler("signature-input", f))?;
    anfrage.header_setzen("signature-input", eingabe_text);

    let params = SignaturParameter::aus_anfrage(anfrage)?;
    let basis = signatur_basis(anfrage, &params)?;
    let signatur = signatur_berechnen(schluessel, &basis);

    let mut sig = Dictionary::neu();
    sig.setzen(
        label,
        ListenEintrag::Item(Item::neu(BareItem::ByteSeq(signatur))),
    );
    let sig_text =
        sfv::encode(&sfv::Feld::Dictionary(sig)).map_err(|f| header_fehler("signature", f))?;
    anfrage.header_setzen("signature", sig_text);
    Ok(())
}

fn header_fehler(header: &str, fehler: SfvFehler) -> Vorbedingung {
    Vorbedingung::HeaderUngueltig {
        header: header.to_string(),
        fehler,
    }
}
