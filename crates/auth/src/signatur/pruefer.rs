//! Signaturpruefung mit Mindestdauer fuer Fehlschlaege
//!
//! Jeder Fehlschlag wird erst nach `mindest_dauer` (gemessen ab Beginn der
//! Pruefung) gemeldet. Unbekannte Schluessel werden mit einem zufaelligen
//! Dummy-Schluessel gleicher Laenge gerechnet, damit sich die Laufzeit nicht
//! von einer falschen Signatur unterscheidet.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use hmac::Mac;
use rand::RngCore;
use tokio::time::Instant;

use super::{
    basis::signatur_basis, Anfrage, FehlerCode, FehlerDetail, HmacSha256, PruefErgebnis,
    SignaturParameter, Vorbedingung, AUDIOHOOK_KOMPONENTEN,
};
use crate::schluessel::SchluesselAufloeser;
use crate::sfv::{self, BareItem, ListenEintrag};

/// Konfiguration des Pruefers
#[derive(Debug, Clone)]
pub struct PrueferKonfig {
    /// Fehlschlaege werden fruehestens nach dieser Zeit gemeldet
    pub mindest_dauer: Duration,
    /// Maximales Alter einer Signatur (`created`)
    pub max_alter: Duration,
    /// Erlaubte Abweichung von `created` in die Zukunft
    pub max_uhrabweichung: Duration,
    /// Komponenten die signiert sein muessen
    pub erforderliche_komponenten: Vec<String>,
    /// Detail-Stufe fuer Fehlergruende nach aussen
    pub fehler_detail: FehlerDetail,
    /// Laenge des Zufallsschluessels fuer unbekannte `keyid`s
    ///
    /// Sollte der Laenge der echten Secrets entsprechen. HMAC-SHA256 hasht
    /// Schluessel ueber 64 Bytes vorab, danach spielt die Laenge keine Rolle.
    pub dummy_schluessel_laenge: usize,
}

impl Default for PrueferKonfig {
    fn default() -> Self {
        Self {
            mindest_dauer: Duration::from_millis(500),
            max_alter: Duration::from_secs(300),
            max_uhrabweichung: Duration::from_secs(10),
            erforderliche_komponenten: AUDIOHOOK_KOMPONENTEN
                .iter()
                .map(|k| k.to_string())
                .collect(),
            fehler_detail: FehlerDetail::Keine,
            dummy_schluessel_laenge: 32,
        }
    }
}

/// Zaehler des Pruefers
#[derive(Debug, Default)]
pub struct PrueferStatistik {
    verifiziert: AtomicU64,
    fehlgeschlagen: AtomicU64,
    signatur_berechnungen: AtomicU64,
}

impl PrueferStatistik {
    pub fn verifiziert(&self) -> u64 {
        self.verifiziert.load(Ordering::Relaxed)
    }

    pub fn fehlgeschlagen(&self) -> u64 {
        self.fehlgeschlagen.load(Ordering::Relaxed)
    }

    /// Anzahl HMAC-Berechnungen (inklusive Dummy-Schluessel)
    pub fn signatur_berechnungen(&self) -> u64 {
        self.signatur_berechnungen.load(Ordering::Relaxed)
    }
}

/// Prueft HTTP Message Signatures gegen hinterlegte Client-Secrets
pub struct SignaturPruefer {
    konfig: PrueferKonfig,
    aufloeser: Arc<dyn SchluesselAufloeser>,
    dummy_schluessel: Vec<u8>,
    statistik: PrueferStatistik,
}

impl std::fmt::Debug for SignaturPruefer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignaturPruefer")
            .field("konfig", &self.konfig)
            .field("statistik", &self.statistik)
            .finish_non_exhaustive()
    }
}

impl SignaturPruefer {
    pub fn neu(konfig: PrueferKonfig, aufloeser: Arc<dyn SchluesselAufloeser>) -> Self {
        let mut dummy_schluessel = vec![0u8; konfig.dummy_schluessel_laenge];
        rand::thread_rng().fill_bytes(&mut dummy_schluessel);
        Self {
            konfig,
            aufloeser,
            dummy_schluessel,
            statistik: PrueferStatistik::default(),
        }
    }

    pub fn konfig(&self) -> &PrueferKonfig {
        &self.konfig
    }

    pub fn statistik(&self) -> &PrueferStatistik {
        &self.statistik
    }

    /// Prueft die Signatur einer Anfrage
    ///
    /// Erfolgreiche Pruefungen kehren sofort zurueck, Fehlschlaege erst nach
    /// Ablauf der Mindestdauer.
    pub async fn pruefen(&self, anfrage: &Anfrage) -> PruefErgebnis {
        let start = Instant::now();
        let ergebnis = self.auswerten(anfrage).await;

        match &ergebnis {
            PruefErgebnis::Verifiziert => {
                self.statistik.verifiziert.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    dauer_ms = start.elapsed().as_millis() as u64,
                    "Signatur verifiziert"
                );
            }
            PruefErgebnis::Fehlgeschlagen { code, grund } => {
                self.statistik.fehlgeschlagen.fetch_add(1, Ordering::Relaxed);
                let api_key = anfrage.header("x-api-key").unwrap_or_default();
                tracing::warn!(
                    code = %code,
                    grund = %grund,
                    api_key = %api_key,
                    "Signaturpruefung fehlgeschlagen"
                );
                tokio::time::sleep_until(start + self.konfig.mindest_dauer).await;
            }
        }
        ergebnis
    }

    async fn auswerten(&self, anfrage: &Anfrage) -> PruefErgebnis {
        let vorbereitet = self.vorbereiten(anfrage);
        let (parameter, basis, signatur) = match vorbereitet {
            Ok(v) => v,
            Err(fehler) => {
                return PruefErgebnis::fehler(FehlerCode::Precondition, fehler.to_string())
            }
        };

        // keyid ist durch die Vorbedingungen gesetzt
        let keyid = parameter.keyid.as_deref().unwrap_or_default();
        match self.aufloeser.aufloesen(keyid).await {
            Some(schluessel) => {
                if self.vergleichen(&schluessel.secret, &basis, &signatur) {
                    PruefErgebnis::Verifiziert
                } else {
                    PruefErgebnis::fehler(FehlerCode::Failed, "Signatur stimmt nicht ueberein")
                }
            }
            None => {
                // Gleicher Aufwand wie bei bekanntem Schluessel
                let _ = self.vergleichen(&self.dummy_schluessel, &basis, &signatur);
                PruefErgebnis::fehler(FehlerCode::BadKey, format!("Unbekannter Schluessel '{keyid}'"))
            }
        }
    }

    /// Alle Pruefungen vor der Schluesselaufloesung
    fn vorbereiten(
        &self,
        anfrage: &Anfrage,
    ) -> Result<(SignaturParameter, String, Vec<u8>), Vorbedingung> {
        let parameter = SignaturParameter::aus_anfrage(anfrage)?;
        parameter.validieren(anfrage, &self.konfig, chrono::Utc::now().timestamp())?;
        let basis = signatur_basis(anfrage, &parameter)?;
        let signatur = signatur_lesen(anfrage, &parameter.label)?;
        Ok((parameter, basis, signatur))
    }

    /// Konstantzeit-Vergleich der HMAC-Signatur
    fn vergleichen(&self, schluessel: &[u8], basis: &str, signatur: &[u8]) -> bool {
        self.statistik
            .signatur_berechnungen
            .fetch_add(1, Ordering::Relaxed);
        let Ok(mut mac) = HmacSha256::new_from_slice(schluessel) else {
            return false;
        };
        mac.update(basis.as_bytes());
        mac.verify_slice(signatur).is_ok()
    }
}

fn signatur_lesen(anfrage: &Anfrage, label: &str) -> Result<Vec<u8>, Vorbedingung> {
    let text = anfrage
        .header("signature")
        .ok_or_else(|| Vorbedingung::HeaderFehlt("signature".into()))?;
    let dict = sfv::parse_dictionary(&text).map_err(|fehler| Vorbedingung::HeaderUngueltig {
        header: "signature".into(),
        fehler,
    })?;
    match dict.get(label).and_then(ListenEintrag::als_item).map(|i| &i.wert) {
        Some(BareItem::ByteSeq(bytes)) => Ok(bytes.clone()),
        _ => Err(Vorbedingung::SignaturFehlt(label.to_string())),
    }
}
