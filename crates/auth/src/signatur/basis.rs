//! Signaturbasis: der kanonische Text, ueber den signiert wird

use super::{
    Anfrage, SignaturParameter, Vorbedingung, KOMPONENTE_AUTHORITY, KOMPONENTE_METHOD,
    KOMPONENTE_PATH, KOMPONENTE_REQUEST_TARGET,
};

/// Baut die Signaturbasis
///
/// Eine Zeile `"<name>": <wert>` je Komponente in signierter Reihenfolge,
/// abgeschlossen von `"@signature-params": <inner list>`. Zeilen sind mit
/// `\n` getrennt, am Ende steht kein Zeilenumbruch.
pub fn signatur_basis(
    anfrage: &Anfrage,
    parameter: &SignaturParameter,
) -> Result<String, Vorbedingung> {
    let mut zeilen = Vec::with_capacity(parameter.komponenten.len() + 1);
    for komponente in &parameter.komponenten {
        let wert = komponenten_wert(anfrage, komponente)?;
        zeilen.push(format!("\"{komponente}\": {wert}"));
    }
    zeilen.push(format!(
        "\"@signature-params\": {}",
        parameter.signature_params()?
    ));
    Ok(zeilen.join("\n"))
}

fn komponenten_wert(anfrage: &Anfrage, komponente: &str) -> Result<String, Vorbedingung> {
    match komponente {
        KOMPONENTE_REQUEST_TARGET => Ok(anfrage.ziel.clone()),
        KOMPONENTE_PATH => Ok(anfrage.pfad().to_string()),
        KOMPONENTE_METHOD => Ok(anfrage.methode.to_ascii_uppercase()),
        KOMPONENTE_AUTHORITY => anfrage
            .authority()
            .ok_or_else(|| Vorbedingung::HeaderFehlt("host".into())),
        abgeleitet if abgeleitet.starts_with('@') => {
            Err(Vorbedingung::UnbekannteKomponente(abgeleitet.to_string()))
        }
        header => anfrage
            .header(header)
            .ok_or_else(|| Vorbedingung::HeaderFehlt(header.to_string())),
    }
}
