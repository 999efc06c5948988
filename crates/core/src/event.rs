//! Lebenszyklus-Ereignisse eines Anrufs
//!
//! Definiert die Ereignisse, die nachgelagerte Systeme (Ereignistabelle,
//! Pub/Sub) ueber Beginn und Ende eines Audio-Streams informieren.
//! Die konkrete Senke wird im Server-Crate bereitgestellt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ConversationId, OrganisationsId, SessionId};

/// Ereignisse die pro Session an die Ereignis-Senke gehen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "ereignis", rename_all = "snake_case")]
pub enum AnrufEreignis {
    /// Audio-Stream wurde geoeffnet
    Gestartet {
        session_id: SessionId,
        conversation_id: ConversationId,
        organisation_id: OrganisationsId,
        /// Rufnummer des Anrufers
        ani: String,
        zeitpunkt: DateTime<Utc>,
    },
    /// Audio-Stream wurde beendet
    Beendet {
        session_id: SessionId,
        conversation_id: ConversationId,
        /// Schliessgrund (`end`, `error`, ... oder `transport` bei Abbruch)
        grund: String,
        zeitpunkt: DateTime<Utc>,
    },
}

impl AnrufEreignis {
    /// Session-ID unter der das Ereignis abgelegt wird
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Gestartet { session_id, .. } | Self::Beendet { session_id, .. } => *session_id,
        }
    }
}

/// Trait fuer die Ereignis-Senke
///
/// Implementierungen muessen nicht-blockierend sein; sie werden aus
/// Open- und Close-Handlern heraus aufgerufen.
pub trait EreignisSenke: Send + Sync + 'static {
    /// Uebergibt ein Ereignis an die Senke
    fn senden(&self, ereignis: AnrufEreignis) -> crate::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn ereignis_ist_serde_kompatibel() {
        let sid = SessionId(Uuid::new_v4());
        let ereignis = AnrufEreignis::Beendet {
            session_id: sid,
            conversation_id: ConversationId(Uuid::new_v4()),
            grund: "end".into(),
            zeitpunkt: Utc::now(),
        };
        let json = serde_json::to_string(&ereignis).unwrap();
        assert!(json.contains("\"ereignis\":\"beendet\""));
        let zurueck: AnrufEreignis = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck.session_id(), sid);
    }
}
