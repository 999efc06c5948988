//! Zustaende einer AudioHook-Session
//!
//! ```text
//! PREPARING -> OPENING -> ACTIVE <-> PAUSED -> CLOSING -> CLOSED
//!                 |          |         |
//!                 +----------+---------+--> UNAUTHORIZED / SIGNALED-ERROR
//!
//! (Transport geschlossen)  * -> FINALIZING -> DISCONNECTED
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum SessionZustand {
    /// Verbunden, noch kein `open`
    Preparing,
    /// `open` wird verarbeitet (Authentifizierung, Media-Auswahl, Open-Handler)
    Opening,
    /// Audio fliesst
    Active,
    /// Audio pausiert
    Paused,
    /// `close` wird verarbeitet
    Closing,
    /// `closed` gesendet
    Closed,
    /// Fehler per `disconnect` signalisiert
    #[serde(rename = "SIGNALED-ERROR")]
    SignalisierterFehler,
    /// Authentifizierung fehlgeschlagen
    Unauthorized,
    /// Transport geschlossen, Teardown laeuft
    Finalizing,
    /// Teardown abgeschlossen
    Disconnected,
}

impl SessionZustand {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Preparing => "PREPARING",
            Self::Opening => "OPENING",
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
            Self::SignalisierterFehler => "SIGNALED-ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Finalizing => "FINALIZING",
            Self::Disconnected => "DISCONNECTED",
        }
    }

    /// Darf in diesem Zustand ein `disconnect` gesendet werden?
    pub fn trennung_sendbar(&self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::Opening | Self::Active | Self::Paused
        )
    }

    /// Wird eine Fehlersignalisierung in diesem Zustand unterdrueckt?
    pub fn fehlersignal_unterdrueckt(&self) -> bool {
        matches!(
            self,
            Self::Closed
                | Self::SignalisierterFehler
                | Self::Unauthorized
                | Self::Finalizing
                | Self::Disconnected
        )
    }

    /// Transport ist geschlossen
    pub fn ist_beendet(&self) -> bool {
        matches!(self, Self::Finalizing | Self::Disconnected)
    }

    /// Darf ein `close` des Clients verarbeitet werden?
    pub fn close_erlaubt(&self) -> bool {
        !matches!(
            self,
            Self::Closing | Self::Closed | Self::Finalizing | Self::Disconnected
        )
    }

    /// Darf ein Close-Handler registriert werden?
    pub(crate) fn close_handler_erlaubt(&self) -> bool {
        !matches!(self, Self::Closed | Self::Disconnected)
    }

    /// Darf ein `event` gesendet werden?
    pub(crate) fn ereignis_erlaubt(&self) -> bool {
        matches!(self, Self::Active | Self::Paused | Self::Closing)
    }
}

impl std::fmt::Display for SessionZustand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}
