//! Ereignis-Senke des Servers
//!
//! Lebenszyklus-Ereignisse werden als strukturierte Log-Eintraege
//! geschrieben. Ein Log-Shipper kann sie von dort in eine Ereignistabelle
//! oder ein Pub/Sub-System uebernehmen.

use hoerrohr_core::{AnrufEreignis, EreignisSenke, HoerrohrError};

#[derive(Debug, Default)]
pub struct TracingSenke;

impl EreignisSenke for TracingSenke {
    fn senden(&self, ereignis: AnrufEreignis) -> hoerrohr_core::Result<()> {
        let json = serde_json::to_string(&ereignis)
            .map_err(|e| HoerrohrError::EreignisZustellung(e.to_string()))?;
        tracing::info!(
            target: "hoerrohr::ereignis",
            session_id = %ereignis.session_id(),
            ereignis = %json,
            "Anruf-Ereignis"
        );
        Ok(())
    }
}
