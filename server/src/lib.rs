//! hoerrohr-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod senke;
pub mod transkription;
pub mod verbindung;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use config::ServerConfig;
use hoerrohr_auth::{ApiSchluesselSpeicher, SignaturPruefer};
use hoerrohr_core::EreignisSenke;
use tokio::net::TcpListener;
use transkription::TranskriptionsDienst;

/// Von allen Verbindungen geteilter Zustand
pub struct ServerZustand {
    pub config: ServerConfig,
    pub pruefer: Arc<SignaturPruefer>,
    pub senke: Arc<dyn EreignisSenke>,
    pub transkription: Arc<dyn TranskriptionsDienst>,
    aktive_sessions: AtomicUsize,
}

impl ServerZustand {
    /// Baut den Zustand inklusive Schluesselspeicher aus der Konfiguration
    pub fn aus_config(
        config: ServerConfig,
        senke: Arc<dyn EreignisSenke>,
        transkription: Arc<dyn TranskriptionsDienst>,
    ) -> Result<Self> {
        let speicher = ApiSchluesselSpeicher::neu();
        let anzahl = speicher.laden(&config.api_schluessel)?;
        if anzahl == 0 {
            tracing::warn!("Keine API-Schluessel konfiguriert, jede Signaturpruefung schlaegt fehl");
        } else {
            tracing::info!(anzahl, "API-Schluessel geladen");
        }
        let mut pruefer_konfig = config.signatur.pruefer_konfig();
        if let Some(laenge) = speicher.max_secret_laenge() {
            pruefer_konfig.dummy_schluessel_laenge = laenge;
        }
        let pruefer = Arc::new(SignaturPruefer::neu(pruefer_konfig, speicher));
        Ok(Self {
            config,
            pruefer,
            senke,
            transkription,
            aktive_sessions: AtomicUsize::new(0),
        })
    }

    pub fn aktive_sessions(&self) -> usize {
        self.aktive_sessions.load(Ordering::Relaxed)
    }
}

/// Belegt einen Session-Platz bis zum Drop
struct SessionPlatz(Arc<ServerZustand>);

impl SessionPlatz {
    fn belegen(zustand: &Arc<ServerZustand>) -> Option<Self> {
        let maximum = zustand.config.server.max_sessions as usize;
        let vorher = zustand.aktive_sessions.fetch_add(1, Ordering::AcqRel);
        if vorher >= maximum {
            zustand.aktive_sessions.fetch_sub(1, Ordering::AcqRel);
            return None;
        }
        Some(Self(Arc::clone(zustand)))
    }
}

impl Drop for SessionPlatz {
    fn drop(&mut self) {
        self.0.aktive_sessions.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bindet den Listener und laeuft bis zum Shutdown-Signal
    pub async fn starten(self) -> Result<()> {
        let zustand = Arc::new(ServerZustand::aus_config(
            self.config,
            Arc::new(senke::TracingSenke),
            transkription::LogTranskription::neu(),
        )?);

        let listener = TcpListener::bind(zustand.config.bind_adresse()).await?;
        tracing::info!(
            server_name = %zustand.config.server.name,
            adresse = %listener.local_addr()?,
            pfad = %zustand.config.netzwerk.pfad,
            "Server startet"
        );

        tokio::select! {
            ergebnis = annehmen(listener, zustand) => ergebnis?,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            }
        }
        Ok(())
    }
}

/// Accept-Schleife; jede Verbindung laeuft in einem eigenen Task
pub async fn annehmen(listener: TcpListener, zustand: Arc<ServerZustand>) -> std::io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(verbindung) => verbindung,
            Err(e) => {
                tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                continue;
            }
        };

        let Some(platz) = SessionPlatz::belegen(&zustand) else {
            tracing::warn!(
                peer = %peer,
                max = zustand.config.server.max_sessions,
                "Server voll – Verbindung abgelehnt"
            );
            drop(stream);
            continue;
        };

        tracing::debug!(peer = %peer, "Verbindung akzeptiert");
        let zustand = Arc::clone(&zustand);
        tokio::spawn(async move {
            verbindung::verbindung_verarbeiten(stream, peer, zustand).await;
            drop(platz);
        });
    }
}
