//! Gemeinsame Identifikationstypen fuer Hoerrohr
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Session-, Gespraechs- und Organisations-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::HoerrohrError;

/// AudioHook-Session-ID (eine pro Verbindung)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl FromStr for SessionId {
    type Err = HoerrohrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| HoerrohrError::UngueltigeId {
                wert: s.to_string(),
                grund: e.to_string(),
            })
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gespraechs-ID der Telefonieplattform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conversation:{}", self.0)
    }
}

/// Organisations-ID des Mandanten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganisationsId(pub Uuid);

impl std::fmt::Display for OrganisationsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "org:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_aus_string() {
        let id: SessionId = "e160e428-53e2-487c-977d-96989bf5c99d".parse().unwrap();
        assert_eq!(id.to_string(), "e160e428-53e2-487c-977d-96989bf5c99d");
    }

    #[test]
    fn session_id_ungueltig() {
        let ergebnis = "keine-uuid".parse::<SessionId>();
        assert!(matches!(ergebnis, Err(HoerrohrError::UngueltigeId { .. })));
    }

    #[test]
    fn conversation_id_display() {
        let id = ConversationId(Uuid::nil());
        assert!(id.to_string().starts_with("conversation:"));
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let id = ConversationId(Uuid::new_v4());
        let json = serde_json::to_string(&id).unwrap();
        // Newtype serialisiert transparent als UUID-String
        assert!(json.starts_with('"'));
        let id2: ConversationId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, id2);
    }
}
