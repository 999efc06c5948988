//! Weiterleitung von Audio an die Transkription
//!
//! Der Server kennt keinen Transkriptionsalgorithmus. Er uebergibt je
//! Session und Kanal 16-Bit-PCM an einen `TranskriptionsDienst`. Die
//! mitgelieferte Implementierung zaehlt nur und loggt.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use hoerrohr_core::SessionId;
use hoerrohr_protocol::{AudioFrame, KanalRolle};
use hoerrohr_signaling::SessionBeobachter;

/// Nachgelagerter Transkriptionsdienst
pub trait TranskriptionsDienst: Send + Sync + 'static {
    /// Neuer Stream; `rate` in Hz
    fn starten(&self, session_id: SessionId, sprache: &str, rate: u32);

    /// Samples eines Kanals (L16, mono)
    fn audio(&self, session_id: SessionId, kanal: KanalRolle, samples: &[i16]);

    fn beenden(&self, session_id: SessionId);
}

// ---------------------------------------------------------------------------
// LogTranskription
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
struct StreamZaehler {
    rate: u32,
    extern_samples: u64,
    intern_samples: u64,
}

/// Zaehlt Samples je Session und loggt beim Beenden
#[derive(Debug, Default)]
pub struct LogTranskription {
    streams: DashMap<SessionId, StreamZaehler>,
}

impl LogTranskription {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Anzahl der laufenden Streams
    pub fn aktive_streams(&self) -> usize {
        self.streams.len()
    }

    /// Bisher empfangene Samples (extern, intern)
    pub fn samples(&self, session_id: &SessionId) -> Option<(u64, u64)> {
        self.streams
            .get(session_id)
            .map(|z| (z.extern_samples, z.intern_samples))
    }
}

impl TranskriptionsDienst for LogTranskription {
    fn starten(&self, session_id: SessionId, sprache: &str, rate: u32) {
        tracing::info!(session_id = %session_id, sprache, rate, "Transkription gestartet");
        self.streams.insert(
            session_id,
            StreamZaehler {
                rate,
                ..Default::default()
            },
        );
    }

    fn audio(&self, session_id: SessionId, kanal: KanalRolle, samples: &[i16]) {
        let Some(mut zaehler) = self.streams.get_mut(&session_id) else {
            tracing::trace!(session_id = %session_id, "Audio ohne laufenden Stream");
            return;
        };
        let anzahl = samples.len() as u64;
        match kanal {
            KanalRolle::External => zaehler.extern_samples += anzahl,
            KanalRolle::Internal => zaehler.intern_samples += anzahl,
        }
    }

    fn beenden(&self, session_id: SessionId) {
        let Some((_, zaehler)) = self.streams.remove(&session_id) else {
            return;
        };
        let dauer = |samples: u64| {
            if zaehler.rate == 0 {
                Duration::ZERO
            } else {
                Duration::from_secs_f64(samples as f64 / f64::from(zaehler.rate))
            }
        };
        tracing::info!(
            session_id = %session_id,
            extern_ms = dauer(zaehler.extern_samples).as_millis() as u64,
            intern_ms = dauer(zaehler.intern_samples).as_millis() as u64,
            "Transkription beendet"
        );
    }
}

// ---------------------------------------------------------------------------
// Beobachter
// ---------------------------------------------------------------------------

/// Leitet jeden Audio-Frame kanalweise als L16 weiter
pub struct TranskriptionsBeobachter {
    session_id: SessionId,
    dienst: Arc<dyn TranskriptionsDienst>,
}

impl TranskriptionsBeobachter {
    pub fn neu(session_id: SessionId, dienst: Arc<dyn TranskriptionsDienst>) -> Self {
        Self { session_id, dienst }
    }
}

impl SessionBeobachter for TranskriptionsBeobachter {
    fn audio(&self, frame: &AudioFrame<'_>) {
        for kanal in frame.kanaele() {
            let samples: Vec<i16> = kanal.samples().collect();
            self.dienst.audio(self.session_id, kanal.rolle(), &samples);
        }
    }

    fn verworfen(&self, start: Duration, dauer: Duration) {
        tracing::debug!(
            session_id = %self.session_id,
            start_ms = start.as_millis() as u64,
            dauer_ms = dauer.as_millis() as u64,
            "Luecke im Audio-Stream"
        );
    }
}
