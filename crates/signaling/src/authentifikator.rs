//! Signatur-Authentifikator
//!
//! Die Signaturpruefung startet sofort mit der Verbindung in einem eigenen
//! Task, damit Schluesselaufloesung und Mindestdauer parallel zum Warten auf
//! das `open` laufen. Das Ergebnis wird ueber einen `watch`-Kanal an den
//! Authentifikator der Open-Phase uebergeben.

use std::sync::Arc;

use hoerrohr_auth::{Anfrage, FehlerDetail, PruefErgebnis, SignaturPruefer};
use hoerrohr_protocol::TrennGrund;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::SignalingResult;
use crate::handle::SessionHandle;
use crate::handler::AuthEntscheidung;

/// Wann ein Fehlschlag signalisiert wird
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignaturModus {
    /// `disconnect` sobald die (verzoegerte) Pruefung fehlschlaegt
    #[default]
    #[serde(rename = "immediate")]
    Sofort,
    /// Fehlschlag erst in der Authentifizierungsphase des `open`
    #[serde(rename = "open")]
    BeimOpen,
}

/// Startet die Pruefung und registriert den Authentifikator
pub fn signatur_authentifikator_einrichten(
    handle: &SessionHandle,
    pruefer: Arc<SignaturPruefer>,
    anfrage: Anfrage,
    modus: SignaturModus,
) -> SignalingResult<()> {
    let detail = pruefer.konfig().fehler_detail;
    let (tx, mut rx) = watch::channel::<Option<PruefErgebnis>>(None);

    // Registrierung zuerst, damit ein Zustandsfehler keinen Task hinterlaesst
    handle.authentifikator_hinzufuegen(move |_handle, _open| async move {
        let ergebnis = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| anyhow::anyhow!("Signaturpruefung abgebrochen"))?
            .clone();
        Ok::<_, anyhow::Error>(match ergebnis {
            Some(PruefErgebnis::Verifiziert) => AuthEntscheidung::Erlaubt,
            Some(fehlschlag) => AuthEntscheidung::Abgelehnt {
                grund: fehlschlag.externer_grund(detail),
            },
            None => anyhow::bail!("Signaturpruefung ohne Ergebnis"),
        })
    })?;

    let sitzung = handle.clone();
    tokio::spawn(async move {
        let ergebnis = pruefer.pruefen(&anfrage).await;
        if let (SignaturModus::Sofort, PruefErgebnis::Fehlgeschlagen { .. }) = (modus, &ergebnis) {
            sitzung.trennen(TrennGrund::Unauthorized, ergebnis.externer_grund(detail));
        }
        // Empfaenger kann bereits weg sein
        let _ = tx.send(Some(ergebnis));
    });
    Ok(())
}
