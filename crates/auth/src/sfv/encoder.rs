//! Serialisierung von Structured Fields nach RFC 8941 Abschnitt 4.1

use std::fmt::Write as _;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::parser::{ist_schluessel_zeichen, ist_tchar};
use super::{
    BareItem, Dezimal, Dictionary, InnerList, Item, Liste, ListenEintrag, Parameter, MAX_DEZIMAL_TAUSENDSTEL,
    MAX_INTEGER,
};
use crate::error::{SfvFehler, SfvResult};

pub(super) fn liste(aus: &mut String, liste: &Liste) -> SfvResult<()> {
    for (i, eintrag) in liste.iter().enumerate() {
        if i > 0 {
            aus.push_str(", ");
        }
        listen_eintrag(aus, eintrag)?;
    }
    Ok(())
}

pub(super) fn dictionary(aus: &mut String, dict: &Dictionary) -> SfvResult<()> {
    for (i, (schluessel_text, eintrag)) in dict.iter().enumerate() {
        if i > 0 {
            aus.push_str(", ");
        }
        schluessel(aus, schluessel_text)?;
        match eintrag {
            // `key=?1` wird zu `key` verkuerzt
            ListenEintrag::Item(Item {
                wert: BareItem::Boolean(true),
                parameter: p,
            }) => parameter(aus, p)?,
            _ => {
                aus.push('=');
                listen_eintrag(aus, eintrag)?;
            }
        }
    }
    Ok(())
}

fn listen_eintrag(aus: &mut String, eintrag: &ListenEintrag) -> SfvResult<()> {
    match eintrag {
        ListenEintrag::Item(i) => item(aus, i),
        ListenEintrag::InnerList(l) => inner_list(aus, l),
    }
}

pub(super) fn inner_list(aus: &mut String, liste: &InnerList) -> SfvResult<()> {
    aus.push('(');
    for (i, eintrag) in liste.items.iter().enumerate() {
        if i > 0 {
            aus.push(' ');
        }
        item(aus, eintrag)?;
    }
    aus.push(')');
    parameter(aus, &liste.parameter)
}

pub(super) fn item(aus: &mut String, item: &Item) -> SfvResult<()> {
    bare_item(aus, &item.wert)?;
    parameter(aus, &item.parameter)
}

fn parameter(aus: &mut String, parameter: &Parameter) -> SfvResult<()> {
    for (k, wert) in parameter.iter() {
        aus.push(';');
        schluessel(aus, k)?;
        if *wert != BareItem::Boolean(true) {
            aus.push('=');
            bare_item(aus, wert)?;
        }
    }
    Ok(())
}

fn schluessel(aus: &mut String, schluessel: &str) -> SfvResult<()> {
    let bytes = schluessel.as_bytes();
    let gueltig = match bytes.first() {
        Some(c) => {
            (c.is_ascii_lowercase() || *c == b'*') && bytes.iter().all(|c| ist_schluessel_zeichen(*c))
        }
        None => false,
    };
    if !gueltig {
        return Err(SfvFehler::UngueltigerSchluessel(schluessel.to_string()));
    }
    aus.push_str(schluessel);
    Ok(())
}

fn bare_item(aus: &mut String, wert: &BareItem) -> SfvResult<()> {
    match wert {
        BareItem::Integer(i) => integer(aus, *i),
        BareItem::Decimal(d) => dezimal(aus, *d),
        BareItem::String(s) => zeichenkette(aus, s),
        BareItem::Token(t) => token(aus, t),
        BareItem::ByteSeq(b) => {
            aus.push(':');
            aus.push_str(&STANDARD.encode(b));
            aus.push(':');
            Ok(())
        }
        BareItem::Boolean(b) => {
            aus.push_str(if *b { "?1" } else { "?0" });
            Ok(())
        }
    }
}

fn integer(aus: &mut String, wert: i64) -> SfvResult<()> {
    if wert.unsigned_abs() > MAX_INTEGER as u64 {
        return Err(SfvFehler::Ueberlauf(wert.to_string()));
    }
    let _ = write!(aus, "{wert}");
    Ok(())
}

fn dezimal(aus: &mut String, wert: Dezimal) -> SfvResult<()> {
    let t = wert.tausendstel();
    let betrag = t.unsigned_abs();
    if betrag > MAX_DEZIMAL_TAUSENDSTEL as u64 {
        return Err(SfvFehler::Ueberlauf(format!("{t} Tausendstel")));
    }
    if t < 0 {
        aus.push('-');
    }
    let _ = write!(aus, "{}.", betrag / 1_000);

    // Nachkommastellen ohne abschliessende Nullen, mindestens eine Stelle
    let bruch = format!("{:03}", betrag % 1_000);
    let gekuerzt = bruch.trim_end_matches('0');
    aus.push_str(if gekuerzt.is_empty() { "0" } else { gekuerzt });
    Ok(())
}

fn zeichenkette(aus: &mut String, wert: &str) -> SfvResult<()> {
    aus.push('"');
    for (i, c) in wert.char_indices() {
        match c {
            '"' | '\\' => {
                aus.push('\\');
                aus.push(c);
            }
            '\u{20}'..='\u{7E}' => aus.push(c),
            _ => return Err(SfvFehler::UngueltigesZeichen(i)),
        }
    }
    aus.push('"');
    Ok(())
}

fn token(aus: &mut String, wert: &str) -> SfvResult<()> {
    let bytes = wert.as_bytes();
    let gueltig = match bytes.first() {
        Some(c) => {
            (c.is_ascii_alphabetic() || *c == b'*')
                && bytes[1..]
                    .iter()
                    .all(|c| ist_tchar(*c) || *c == b':' || *c == b'/')
        }
        None => false,
    };
    if !gueltig {
        return Err(SfvFehler::UngueltigerToken(wert.to_string()));
    }
    aus.push_str(wert);
    Ok(())
}
