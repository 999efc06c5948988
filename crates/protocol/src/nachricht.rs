//! AudioHook-Nachrichten (Text-Frames)
//!
//! Jede Textnachricht ist ein JSON-Objekt mit einem festen Umschlag und
//! typabhaengigen `parameters`.
//!
//! ## Design
//! - Client-Nachrichten werden zweistufig gelesen: erst der Umschlag
//!   (`ClientUmschlag`), dann die Parameter passend zum `type`
//! - Server-Nachrichten werden mit Sequenznummern erst beim Senden in den
//!   Umschlag verpackt
//! - Unbekannte Typen und falsch geformte Parameter sind Protokollfehler

use std::time::Duration;

use hoerrohr_core::types::{ConversationId, OrganisationsId, SessionId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ProtokollFehler;
use crate::media::MediaParameter;

/// Unterstuetzte Protokollversion
pub const PROTOKOLL_VERSION: &str = "2";

// ---------------------------------------------------------------------------
// Client-Umschlag
// ---------------------------------------------------------------------------

/// Umschlag einer Client-Nachricht (vor der Typpruefung)
#[derive(Debug, Clone, Deserialize)]
pub struct ClientUmschlag {
    pub version: String,
    pub id: String,
    #[serde(rename = "type")]
    pub typ: String,
    /// Sequenznummer des Clients (beginnt bei 1)
    pub seq: u64,
    /// Zuletzt vom Client gesehene Server-Sequenznummer
    pub serverseq: u64,
    /// Aktuelle Stream-Position
    #[serde(with = "crate::dauer::iso")]
    pub position: Duration,
    pub parameters: Value,
}

impl ClientUmschlag {
    /// Liest den Umschlag aus einem Text-Frame
    pub fn aus_text(text: &str) -> Result<Self, ProtokollFehler> {
        let wert: Value = serde_json::from_str(text)
            .map_err(|e| ProtokollFehler::UngueltigesJson(e.to_string()))?;
        serde_json::from_value(wert).map_err(|e| ProtokollFehler::UngueltigerUmschlag(e.to_string()))
    }

    /// Strukturelle Pruefung von Version, Session-ID und Parameter-Objekt
    ///
    /// Gibt die geparste Session-ID zurueck.
    pub fn strukturell_pruefen(&self) -> Result<SessionId, ProtokollFehler> {
        if self.version != PROTOKOLL_VERSION {
            return Err(ProtokollFehler::Version(self.version.clone()));
        }
        if !self.parameters.is_object() {
            return Err(ProtokollFehler::UngueltigerUmschlag(
                "'parameters' ist kein Objekt".into(),
            ));
        }
        Uuid::parse_str(&self.id)
            .map(SessionId)
            .map_err(|_| ProtokollFehler::UngueltigeSessionId(self.id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Client-Parameter
// ---------------------------------------------------------------------------

/// Teilnehmer-Informationen aus dem `open`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teilnehmer {
    pub id: Uuid,
    pub ani: String,
    pub ani_name: String,
    pub dnis: String,
}

/// Parameter der `open`-Nachricht
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenParameter {
    pub organization_id: OrganisationsId,
    pub conversation_id: ConversationId,
    pub participant: Teilnehmer,
    /// Angebotene Formate in Praeferenzreihenfolge
    pub media: Vec<MediaParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<serde_json::Map<String, Value>>,
}

impl OpenParameter {
    fn pruefen(&self) -> Result<(), ProtokollFehler> {
        self.media.iter().try_for_each(MediaParameter::validieren)
    }
}

/// Grund fuer ein `close` des Clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseGrund {
    End,
    Error,
    Disconnect,
    Reconnect,
}

impl CloseGrund {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::End => "end",
            Self::Error => "error",
            Self::Disconnect => "disconnect",
            Self::Reconnect => "reconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloseParameter {
    pub reason: CloseGrund,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateParameter {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PingParameter {
    /// Vom Client gemessene Round-Trip-Time
    #[serde(default, with = "crate::dauer::iso_option")]
    pub rtt: Option<Duration>,
}

/// Vom Client verworfener Audio-Abschnitt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscardedParameter {
    #[serde(with = "crate::dauer::iso")]
    pub start: Duration,
    #[serde(with = "crate::dauer::iso")]
    pub discarded: Duration,
}

/// Fehlermeldung des Clients (z.B. Rate-Limit)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorParameter {
    pub code: u16,
    pub message: String,
    #[serde(default, with = "crate::dauer::iso_option")]
    pub retry_after: Option<Duration>,
}

// ---------------------------------------------------------------------------
// ClientNachricht
// ---------------------------------------------------------------------------

/// Alle Nachrichten die der Client senden darf
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNachricht {
    Open(OpenParameter),
    Close(CloseParameter),
    Update(UpdateParameter),
    Ping(PingParameter),
    Paused,
    Resumed,
    Discarded(DiscardedParameter),
    Error(ErrorParameter),
    Reconnecting,
    Reconnected,
}

impl ClientNachricht {
    /// Typpruefung der Parameter anhand des `type`-Felds
    pub fn aus_umschlag(typ: &str, parameter: Value) -> Result<Self, ProtokollFehler> {
        let nachricht = match typ {
            "open" => {
                let open: OpenParameter = parameter_lesen(typ, parameter)?;
                open.pruefen()?;
                Self::Open(open)
            }
            "close" => Self::Close(parameter_lesen(typ, parameter)?),
            "update" => Self::Update(parameter_lesen(typ, parameter)?),
            "ping" => Self::Ping(parameter_lesen(typ, parameter)?),
            "paused" => Self::Paused,
            "resumed" => Self::Resumed,
            "discarded" => Self::Discarded(parameter_lesen(typ, parameter)?),
            "error" => Self::Error(parameter_lesen(typ, parameter)?),
            "reconnecting" => Self::Reconnecting,
            "reconnected" => Self::Reconnected,
            andere => return Err(ProtokollFehler::UnerwarteterTyp(andere.to_string())),
        };
        Ok(nachricht)
    }

    /// Wire-Name des Typs
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Close(_) => "close",
            Self::Update(_) => "update",
            Self::Ping(_) => "ping",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::Discarded(_) => "discarded",
            Self::Error(_) => "error",
            Self::Reconnecting => "reconnecting",
            Self::Reconnected => "reconnected",
        }
    }
}

fn parameter_lesen<T: DeserializeOwned>(typ: &str, parameter: Value) -> Result<T, ProtokollFehler> {
    serde_json::from_value(parameter).map_err(|e| ProtokollFehler::UngueltigeParameter {
        typ: typ.to_string(),
        grund: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Server-Nachrichten
// ---------------------------------------------------------------------------

/// Bestaetigung des `open`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedParameter {
    pub start_paused: bool,
    /// Ausgewaehltes Format (leer wenn kein Audio gewuenscht)
    pub media: Vec<MediaParameter>,
}

/// Grund fuer ein serverseitiges `disconnect`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrennGrund {
    Completed,
    Unauthorized,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectParameter {
    pub reason: TrennGrund,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventParameter {
    pub entities: Vec<Value>,
}

/// Alle Nachrichten die der Server sendet
#[derive(Debug, Clone, PartialEq)]
pub enum ServerNachricht {
    Opened(OpenedParameter),
    Closed,
    Pong,
    Pause,
    Resume,
    Disconnect(DisconnectParameter),
    Event(EventParameter),
}

/// Serialisierter Umschlag einer Server-Nachricht
#[derive(Debug, Serialize)]
struct ServerUmschlag<'a> {
    version: &'static str,
    id: SessionId,
    #[serde(rename = "type")]
    typ: &'static str,
    seq: u64,
    clientseq: u64,
    parameters: &'a Value,
}

impl ServerNachricht {
    pub fn disconnect(reason: TrennGrund, info: Option<String>) -> Self {
        Self::Disconnect(DisconnectParameter { reason, info })
    }

    pub fn typ(&self) -> &'static str {
        match self {
            Self::Opened(_) => "opened",
            Self::Closed => "closed",
            Self::Pong => "pong",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Disconnect(_) => "disconnect",
            Self::Event(_) => "event",
        }
    }

    fn parameter(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Opened(p) => serde_json::to_value(p),
            Self::Disconnect(p) => serde_json::to_value(p),
            Self::Event(p) => serde_json::to_value(p),
            Self::Closed | Self::Pong | Self::Pause | Self::Resume => {
                Ok(Value::Object(serde_json::Map::new()))
            }
        }
    }

    /// Verpackt die Nachricht mit Sequenznummern in einen Text-Frame
    pub fn umschlag(&self, id: SessionId, seq: u64, clientseq: u64) -> Result<String, ProtokollFehler> {
        let parameters = self
            .parameter()
            .map_err(|e| ProtokollFehler::Serialisierung(e.to_string()))?;
        let umschlag = ServerUmschlag {
            version: PROTOKOLL_VERSION,
            id,
            typ: self.typ(),
            seq,
            clientseq,
            parameters: &parameters,
        };
        serde_json::to_string(&umschlag).map_err(|e| ProtokollFehler::Serialisierung(e.to_string()))
    }
}
