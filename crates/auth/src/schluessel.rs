//! API-Schluessel und Client-Secrets
//!
//! Jeder AudioHook-Client identifiziert sich mit einem API-Schluessel
//! (`x-api-key`, gleichzeitig `keyid` der Signatur) und signiert mit dem
//! zugehoerigen Client-Secret. Die Aufloesung ist asynchron, damit
//! Implementierungen Secrets aus externen Speichern holen koennen.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Ein hinterlegter Client-Schluessel
#[derive(Debug, Clone)]
pub struct ClientSchluessel {
    pub api_key: String,
    /// Rohes Secret fuer HMAC
    pub secret: Vec<u8>,
    pub beschreibung: String,
    pub erstellt_am: DateTime<Utc>,
    pub widerrufen: bool,
}

/// Loest eine `keyid` in das zugehoerige Secret auf
///
/// Liefert `None` fuer unbekannte oder widerrufene Schluessel.
#[async_trait]
pub trait SchluesselAufloeser: Send + Sync + 'static {
    async fn aufloesen(&self, key_id: &str) -> Option<ClientSchluessel>;
}

/// Schluessel-Eintrag wie er in der Konfiguration steht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSchluesselEintrag {
    pub api_key: String,
    /// Client-Secret als Standard-Base64
    pub client_secret: String,
    #[serde(default)]
    pub beschreibung: String,
}

/// In-Memory-Schluesselspeicher
#[derive(Debug, Default)]
pub struct ApiSchluesselSpeicher {
    /// api_key -> Schluessel
    schluessel: DashMap<String, ClientSchluessel>,
    /// Kuenstliche Verzoegerung je Abfrage (fuer Tests und Lastsimulation)
    latenz: Option<Duration>,
}

impl ApiSchluesselSpeicher {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Speicher dessen Abfragen jeweils `latenz` dauern
    pub fn mit_latenz(latenz: Duration) -> Arc<Self> {
        Arc::new(Self {
            schluessel: DashMap::new(),
            latenz: Some(latenz),
        })
    }

    /// Hinterlegt einen Schluessel mit Base64-kodiertem Secret
    pub fn eintragen(
        &self,
        api_key: &str,
        secret_base64: &str,
        beschreibung: &str,
    ) -> AuthResult<()> {
        let secret = STANDARD.decode(secret_base64.trim())?;
        self.eintragen_roh(api_key, secret, beschreibung)
    }

    /// Hinterlegt einen Schluessel mit rohem Secret
    pub fn eintragen_roh(
        &self,
        api_key: &str,
        secret: Vec<u8>,
        beschreibung: &str,
    ) -> AuthResult<()> {
        if api_key.trim().is_empty() {
            return Err(AuthError::SchluesselUngueltig("leerer API-Schluessel".into()));
        }
        if secret.is_empty() {
            return Err(AuthError::SchluesselUngueltig(format!(
                "leeres Secret fuer '{api_key}'"
            )));
        }
        let eintrag = ClientSchluessel {
            api_key: api_key.to_string(),
            secret,
            beschreibung: beschreibung.to_string(),
            erstellt_am: Utc::now(),
            widerrufen: false,
        };
        if self.schluessel.insert(api_key.to_string(), eintrag).is_some() {
            tracing::debug!(api_key, "API-Schluessel ersetzt");
        }
        Ok(())
    }

    /// Laedt Eintraege aus der Konfiguration
    pub fn laden(&self, eintraege: &[ApiSchluesselEintrag]) -> AuthResult<usize> {
        for eintrag in eintraege {
            self.eintragen(&eintrag.api_key, &eintrag.client_secret, &eintrag.beschreibung)?;
        }
        tracing::info!(anzahl = eintraege.len(), "API-Schluessel geladen");
        Ok(eintraege.len())
    }

    /// Widerruft einen Schluessel; er wird danach nicht mehr aufgeloest
    pub fn widerrufen(&self, api_key: &str) -> AuthResult<()> {
        match self.schluessel.get_mut(api_key) {
            None => Err(AuthError::SchluesselNichtGefunden(api_key.to_string())),
            Some(mut eintrag) => {
                eintrag.widerrufen = true;
                tracing::info!(api_key, "API-Schluessel widerrufen");
                Ok(())
            }
        }
    }

    pub fn anzahl(&self) -> usize {
        self.schluessel.len()
    }

    /// Laenge des laengsten nicht widerrufenen Secrets
    pub fn max_secret_laenge(&self) -> Option<usize> {
        self.schluessel
            .iter()
            .filter(|eintrag| !eintrag.widerrufen)
            .map(|eintrag| eintrag.secret.len())
            .max()
    }
}

#[async_trait]
impl SchluesselAufloeser for ApiSchluesselSpeicher {
    async fn aufloesen(&self, key_id: &str) -> Option<ClientSchluessel> {
        if let Some(latenz) = self.latenz {
            tokio::time::sleep(latenz).await;
        }
        self.schluessel
            .get(key_id)
            .filter(|eintrag| !eintrag.widerrufen)
            .map(|eintrag| eintrag.clone())
    }
}
