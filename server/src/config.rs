//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::time::Duration;

use hoerrohr_auth::{ApiSchluesselEintrag, FehlerDetail, PrueferKonfig};
use hoerrohr_protocol::MediaFormat;
use hoerrohr_signaling::{SessionKonfig, SignaturModus, MAX_TEXT_GROESSE};
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Session-Einstellungen (Frame-Groessen, Formate)
    pub session: SessionEinstellungen,
    /// Signaturpruefung
    pub signatur: SignaturEinstellungen,
    /// Bekannte API-Schluessel
    pub api_schluessel: Vec<ApiSchluesselEintrag>,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Weiterleitung an die Transkription
    pub transkription: TranskriptionsEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Sessions
    pub max_sessions: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Hoerrohr".into(),
            max_sessions: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
    /// Pfad des WebSocket-Endpunkts
    pub pfad: String,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8001,
            pfad: "/api/v1/audiohook/ws".into(),
        }
    }
}

/// Session-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEinstellungen {
    /// Maximale Groesse eines Text-Frames in Bytes
    pub max_text_groesse: usize,
    /// Formate die die Media-Auswahl akzeptiert
    pub formate: Vec<MediaFormat>,
}

impl Default for SessionEinstellungen {
    fn default() -> Self {
        Self {
            max_text_groesse: MAX_TEXT_GROESSE,
            formate: vec![MediaFormat::Pcmu, MediaFormat::L16],
        }
    }
}

impl SessionEinstellungen {
    pub fn session_konfig(&self) -> SessionKonfig {
        SessionKonfig {
            max_text_groesse: self.max_text_groesse,
        }
    }
}

/// Einstellungen der Signaturpruefung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignaturEinstellungen {
    /// "immediate" oder "open"
    pub modus: SignaturModus,
    /// Mindestdauer eines Fehlschlags in Millisekunden
    pub mindest_dauer_ms: u64,
    /// Maximales Signaturalter in Sekunden
    pub max_alter_s: u64,
    /// Erlaubte Uhrabweichung in Sekunden
    pub max_uhrabweichung_s: u64,
    /// "none", "code" oder "full"
    pub fehler_detail: FehlerDetail,
}

impl Default for SignaturEinstellungen {
    fn default() -> Self {
        let standard = PrueferKonfig::default();
        Self {
            modus: SignaturModus::default(),
            mindest_dauer_ms: standard.mindest_dauer.as_millis() as u64,
            max_alter_s: standard.max_alter.as_secs(),
            max_uhrabweichung_s: standard.max_uhrabweichung.as_secs(),
            fehler_detail: standard.fehler_detail,
        }
    }
}

impl SignaturEinstellungen {
    pub fn pruefer_konfig(&self) -> PrueferKonfig {
        PrueferKonfig {
            mindest_dauer: Duration::from_millis(self.mindest_dauer_ms),
            max_alter: Duration::from_secs(self.max_alter_s),
            max_uhrabweichung: Duration::from_secs(self.max_uhrabweichung_s),
            fehler_detail: self.fehler_detail,
            ..PrueferKonfig::default()
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Transkriptions-Weiterleitung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranskriptionsEinstellungen {
    pub aktiviert: bool,
    /// Sprache wenn das `open` keine angibt
    pub standard_sprache: String,
}

impl Default for TranskriptionsEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            standard_sprache: "de-DE".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    pub fn aus_toml(inhalt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(inhalt)
    }

    /// Ueberschreibt Logging-Werte aus `HR_LOG_LEVEL` / `HR_LOG_FORMAT`
    pub fn umgebung_anwenden(&mut self) {
        if let Ok(level) = std::env::var("HR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("HR_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }
}
