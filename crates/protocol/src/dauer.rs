//! ISO-8601-Dauern im AudioHook-Format
//!
//! AudioHook uebertraegt Positionen und Dauern als `PT…S`-Zeichenketten,
//! z.B. `PT12.345S` oder `PT1H2M3.5S`. Unterstuetzt werden nur die
//! Zeitkomponenten (Stunden, Minuten, Sekunden); Sekunden duerfen einen
//! Bruchteil mit bis zu 9 Nachkommastellen haben.

use std::time::Duration;

/// Parst eine ISO-8601-Dauer (`PT[nH][nM][n[.f]S]`)
///
/// Gibt `None` zurueck bei leerer Dauer, falscher Reihenfolge der
/// Komponenten oder Bruchteilen ausserhalb der Sekunden.
pub fn parsen(text: &str) -> Option<Duration> {
    let rest = text.strip_prefix("PT")?;
    if rest.is_empty() {
        return None;
    }

    let mut gesamt = Duration::ZERO;
    let mut zahl_start = 0;
    // 1 = Stunden, 2 = Minuten, 3 = Sekunden
    let mut letzter_rang = 0u8;

    for (i, c) in rest.char_indices() {
        let (rang, faktor) = match c {
            '0'..='9' | '.' => continue,
            'H' => (1, 3600),
            'M' => (2, 60),
            'S' => (3, 1),
            _ => return None,
        };
        if rang <= letzter_rang {
            return None;
        }
        let (ganz, nanos) = zahl_parsen(&rest[zahl_start..i])?;
        if nanos != 0 && c != 'S' {
            return None;
        }
        let sekunden = ganz.checked_mul(faktor)?;
        gesamt = gesamt.checked_add(Duration::new(sekunden, nanos))?;
        letzter_rang = rang;
        zahl_start = i + 1;
    }

    // Ziffern ohne Einheit am Ende
    if zahl_start != rest.len() {
        return None;
    }
    Some(gesamt)
}

/// Formatiert eine Dauer als `PT…S` (Millisekunden-Aufloesung)
pub fn formatieren(dauer: Duration) -> String {
    let millis = dauer.subsec_millis();
    if millis == 0 {
        format!("PT{}S", dauer.as_secs())
    } else {
        let bruch = format!("{millis:03}");
        format!("PT{}.{}S", dauer.as_secs(), bruch.trim_end_matches('0'))
    }
}

fn zahl_parsen(zahl: &str) -> Option<(u64, u32)> {
    let (ganz, bruch) = match zahl.split_once('.') {
        Some((g, b)) => (g, Some(b)),
        None => (zahl, None),
    };
    if ganz.is_empty() || !ganz.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let ganz: u64 = ganz.parse().ok()?;

    let nanos = match bruch {
        None => 0,
        Some(b) => {
            if b.is_empty() || b.len() > 9 || !b.bytes().all(|c| c.is_ascii_digit()) {
                return None;
            }
            // Auf 9 Stellen auffuellen
            let aufgefuellt = format!("{b:0<9}");
            aufgefuellt.parse().ok()?
        }
    };
    Some((ganz, nanos))
}

/// serde-Adapter fuer Pflichtfelder mit ISO-8601-Dauer
pub mod iso {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(dauer: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::formatieren(*dauer))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        super::parsen(&text)
            .ok_or_else(|| de::Error::custom(format!("ungueltige ISO-8601-Dauer '{text}'")))
    }
}

/// serde-Adapter fuer optionale Felder mit ISO-8601-Dauer
pub mod iso_option {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(dauer: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match dauer {
            Some(d) => s.serialize_str(&super::formatieren(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(text) => super::parsen(&text)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("ungueltige ISO-8601-Dauer '{text}'"))),
        }
    }
}
