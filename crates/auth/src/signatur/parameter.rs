//! Signaturparameter aus `signature-input`

use super::{Anfrage, PrueferKonfig, Vorbedingung, MIN_NONCE_LAENGE};
use crate::sfv::{self, BareItem, InnerList};

/// Einziger unterstuetzter Algorithmus
const ALGORITHMUS: &str = "hmac-sha256";

/// Beschreibung einer einzelnen Signatur
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturParameter {
    /// Label im Dictionary (z.B. `sig1`)
    pub label: String,
    /// Signierte Komponenten in signierter Reihenfolge
    pub komponenten: Vec<String>,
    pub keyid: Option<String>,
    pub nonce: Option<String>,
    pub alg: Option<String>,
    pub created: Option<i64>,
    pub expires: Option<i64>,
    /// Original-Inner-List fuer `@signature-params`
    pub(crate) roh: InnerList,
}

impl SignaturParameter {
    /// Liest die erste Signatur aus dem `signature-input`-Header
    pub fn aus_anfrage(anfrage: &Anfrage) -> Result<Self, Vorbedingung> {
        let text = anfrage
            .header("signature-input")
            .ok_or_else(|| Vorbedingung::HeaderFehlt("signature-input".into()))?;
        let dict = sfv::parse_dictionary(&text).map_err(|fehler| Vorbedingung::HeaderUngueltig {
            header: "signature-input".into(),
            fehler,
        })?;

        let (label, eintrag) = dict.iter().next().ok_or(Vorbedingung::KeineSignatur)?;
        let liste = eintrag
            .als_inner_list()
            .ok_or_else(|| Vorbedingung::KeineInnerList(label.to_string()))?;

        let komponenten = liste
            .items
            .iter()
            .map(|item| match &item.wert {
                BareItem::String(s) => Ok(s.clone()),
                _ => Err(Vorbedingung::KomponenteKeinString),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let p = &liste.parameter;
        let text_param = |name: &'static str| -> Result<Option<String>, Vorbedingung> {
            match p.get(name) {
                None => Ok(None),
                Some(BareItem::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(Vorbedingung::ParameterFehlt(name)),
            }
        };
        let zahl_param = |name: &'static str| -> Result<Option<i64>, Vorbedingung> {
            match p.get(name) {
                None => Ok(None),
                Some(BareItem::Integer(i)) => Ok(Some(*i)),
                Some(_) => Err(Vorbedingung::ParameterFehlt(name)),
            }
        };

        Ok(Self {
            label: label.to_string(),
            komponenten,
            keyid: text_param("keyid")?,
            nonce: text_param("nonce")?,
            alg: text_param("alg")?,
            created: zahl_param("created")?,
            expires: zahl_param("expires")?,
            roh: liste.clone(),
        })
    }

    /// Prueft alle Vorbedingungen, die ohne Schluessel pruefbar sind
    ///
    /// `jetzt` ist die aktuelle Unix-Zeit in Sekunden.
    pub fn validieren(
        &self,
        anfrage: &Anfrage,
        konfig: &PrueferKonfig,
        jetzt: i64,
    ) -> Result<(), Vorbedingung> {
        for erforderlich in &konfig.erforderliche_komponenten {
            if !self.komponenten.iter().any(|k| k == erforderlich) {
                return Err(Vorbedingung::KomponenteNichtSigniert(erforderlich.clone()));
            }
        }

        let keyid = self.keyid.as_deref().ok_or(Vorbedingung::ParameterFehlt("keyid"))?;
        let api_key = anfrage
            .header("x-api-key")
            .ok_or_else(|| Vorbedingung::HeaderFehlt("x-api-key".into()))?;
        if keyid != api_key {
            return Err(Vorbedingung::KeyIdAbweichung);
        }

        let nonce = self.nonce.as_deref().ok_or(Vorbedingung::ParameterFehlt("nonce"))?;
        if nonce.len() < MIN_NONCE_LAENGE {
            return Err(Vorbedingung::NonceZuKurz(nonce.len()));
        }

        if let Some(alg) = self.alg.as_deref() {
            if alg != ALGORITHMUS {
                return Err(Vorbedingung::Algorithmus(alg.to_string()));
            }
        }

        let created = self.created.ok_or(Vorbedingung::ParameterFehlt("created"))?;
        let abweichung = konfig.max_uhrabweichung.as_secs() as i64;
        if created > jetzt + abweichung {
            return Err(Vorbedingung::InZukunft(created - jetzt));
        }
        let alter = jetzt - created;
        if alter > konfig.max_alter.as_secs() as i64 {
            return Err(Vorbedingung::ZuAlt(alter));
        }
        if let Some(expires) = self.expires {
            if expires < jetzt {
                return Err(Vorbedingung::Abgelaufen);
            }
        }
        Ok(())
    }

    /// Kanonische Form der Parameter fuer die letzte Zeile der Basis
    pub fn signature_params(&self) -> Result<String, Vorbedingung> {
        sfv::encode_inner_list(&self.roh).map_err(|fehler| Vorbedingung::HeaderUngueltig {
            header: "signature-input".into(),
            fehler,
        })
    }
}
