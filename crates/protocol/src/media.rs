//! Media-Parameter fuer die Audio-Negotiation
//!
//! Die Telefonieplattform bietet im `open` eine Liste moeglicher Formate an,
//! der Server waehlt hoechstens eines davon aus und bestaetigt es im
//! `opened`.

use serde::{Deserialize, Serialize};

use crate::error::ProtokollFehler;

// ---------------------------------------------------------------------------
// Format, Kanaele, Typ
// ---------------------------------------------------------------------------

/// Audio-Kodierung eines Media-Streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaFormat {
    /// G.711 μ-law, 1 Byte pro Sample
    #[serde(rename = "PCMU")]
    Pcmu,
    /// Lineares PCM, 16 Bit signed little-endian
    #[serde(rename = "L16")]
    L16,
}

impl MediaFormat {
    /// Bytes pro Sample und Kanal
    pub fn bytes_pro_sample(&self) -> usize {
        match self {
            Self::Pcmu => 1,
            Self::L16 => 2,
        }
    }
}

/// Rolle eines Audio-Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KanalRolle {
    /// Externer Teilnehmer (Anrufer)
    External,
    /// Interner Teilnehmer (Agent)
    Internal,
}

/// Typ-Kennung eines Media-Eintrags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTyp {
    Audio,
}

// ---------------------------------------------------------------------------
// MediaParameter
// ---------------------------------------------------------------------------

/// Ein angebotenes bzw. ausgewaehltes Audio-Format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaParameter {
    #[serde(rename = "type")]
    pub typ: MediaTyp,
    pub format: MediaFormat,
    /// Kanal-Rollen in Interleaving-Reihenfolge
    pub channels: Vec<KanalRolle>,
    /// Abtastrate in Hz
    pub rate: u32,
}

impl MediaParameter {
    /// Erstellt einen Audio-Eintrag
    pub fn audio(format: MediaFormat, channels: Vec<KanalRolle>, rate: u32) -> Self {
        Self {
            typ: MediaTyp::Audio,
            format,
            channels,
            rate,
        }
    }

    /// Position eines Kanals im Interleaving
    pub fn kanal_index(&self, rolle: KanalRolle) -> Option<usize> {
        self.channels.iter().position(|k| *k == rolle)
    }

    /// Bytes eines Sample-Frames (ein Sample je Kanal)
    pub fn frame_groesse(&self) -> usize {
        self.channels.len() * self.format.bytes_pro_sample()
    }

    /// Prueft die strukturellen Invarianten eines Media-Eintrags
    pub fn validieren(&self) -> Result<(), ProtokollFehler> {
        if self.channels.is_empty() {
            return Err(media_fehler("Media-Eintrag ohne Kanaele"));
        }
        for (i, kanal) in self.channels.iter().enumerate() {
            if self.channels[..i].contains(kanal) {
                return Err(media_fehler(format!("Kanal {kanal:?} mehrfach angegeben")));
            }
        }
        if self.rate == 0 {
            return Err(media_fehler("Abtastrate 0"));
        }
        Ok(())
    }
}

fn media_fehler(grund: impl Into<String>) -> ProtokollFehler {
    ProtokollFehler::UngueltigeParameter {
        typ: "open".into(),
        grund: grund.into(),
    }
}
