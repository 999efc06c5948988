//! Parser fuer Structured Fields nach RFC 8941 Abschnitt 4.2

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{
    BareItem, Dezimal, Dictionary, Feld, FeldTyp, InnerList, Item, Liste, ListenEintrag, Parameter,
};
use crate::error::{SfvFehler, SfvResult};

/// Zustandsbehafteter Parser ueber den Bytes eines Header-Werts
pub(super) struct Parser<'a> {
    eingabe: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn neu(eingabe: &'a str) -> Self {
        Self {
            eingabe: eingabe.as_bytes(),
            pos: 0,
        }
    }

    pub(super) fn feld_parsen(self, typ: FeldTyp) -> SfvResult<Feld> {
        match typ {
            FeldTyp::Item => self.vollstaendig(Self::item).map(Feld::Item),
            FeldTyp::Liste => self.vollstaendig(Self::liste).map(Feld::Liste),
            FeldTyp::Dictionary => self.vollstaendig(Self::dictionary).map(Feld::Dictionary),
        }
    }

    pub(super) fn dictionary_parsen(self) -> SfvResult<Dictionary> {
        self.vollstaendig(Self::dictionary)
    }

    /// Wendet `regel` auf die gesamte Eingabe an; Rest ist ein Fehler
    fn vollstaendig<T>(mut self, regel: fn(&mut Self) -> SfvResult<T>) -> SfvResult<T> {
        self.leerzeichen_ueberspringen();
        let wert = regel(&mut self)?;
        self.leerzeichen_ueberspringen();
        if self.pos < self.eingabe.len() {
            return Err(SfvFehler::RestEingabe(self.pos));
        }
        Ok(wert)
    }

    // -----------------------------------------------------------------------
    // Hilfsfunktionen
    // -----------------------------------------------------------------------

    fn aktuell(&self) -> Option<u8> {
        self.eingabe.get(self.pos).copied()
    }

    fn ist_leer(&self) -> bool {
        self.pos >= self.eingabe.len()
    }

    fn leerzeichen_ueberspringen(&mut self) {
        while self.aktuell() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// OWS: Leerzeichen und Tabs
    fn ows_ueberspringen(&mut self) {
        while matches!(self.aktuell(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn syntax(&self, erwartet: &'static str) -> SfvFehler {
        SfvFehler::Syntax {
            position: self.pos,
            erwartet,
        }
    }

    // -----------------------------------------------------------------------
    // Top-Level
    // -----------------------------------------------------------------------

    fn liste(&mut self) -> SfvResult<Liste> {
        let mut liste = Vec::new();
        while !self.ist_leer() {
            liste.push(self.item_oder_inner_list()?);
            if self.naechstes_element()? {
                break;
            }
        }
        Ok(liste)
    }

    fn dictionary(&mut self) -> SfvResult<Dictionary> {
        let mut dict = Dictionary::neu();
        while !self.ist_leer() {
            let schluessel = self.schluessel()?;
            let eintrag = if self.aktuell() == Some(b'=') {
                self.pos += 1;
                self.item_oder_inner_list()?
            } else {
                let parameter = self.parameter()?;
                ListenEintrag::Item(Item::mit_parametern(BareItem::Boolean(true), parameter))
            };
            dict.setzen(schluessel, eintrag);
            if self.naechstes_element()? {
                break;
            }
        }
        Ok(dict)
    }

    /// Verarbeitet das Trennzeichen zwischen Elementen.
    /// Liefert `true` wenn die Eingabe zu Ende ist.
    fn naechstes_element(&mut self) -> SfvResult<bool> {
        self.ows_ueberspringen();
        if self.ist_leer() {
            return Ok(true);
        }
        if self.aktuell() != Some(b',') {
            return Err(self.syntax("','"));
        }
        self.pos += 1;
        self.ows_ueberspringen();
        if self.ist_leer() {
            // Komma am Ende
            return Err(self.syntax("Element nach ','"));
        }
        Ok(false)
    }

    fn item_oder_inner_list(&mut self) -> SfvResult<ListenEintrag> {
        if self.aktuell() == Some(b'(') {
            Ok(ListenEintrag::InnerList(self.inner_list()?))
        } else {
            Ok(ListenEintrag::Item(self.item()?))
        }
    }

    fn inner_list(&mut self) -> SfvResult<InnerList> {
        // '(' wurde vom Aufrufer erkannt
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.leerzeichen_ueberspringen();
            match self.aktuell() {
                None => return Err(self.syntax("')'")),
                Some(b')') => {
                    self.pos += 1;
                    let parameter = self.parameter()?;
                    return Ok(InnerList { items, parameter });
                }
                Some(_) => {
                    items.push(self.item()?);
                    if !matches!(self.aktuell(), Some(b' ' | b')')) {
                        return Err(self.syntax("' ' oder ')'"));
                    }
                }
            }
        }
    }

    fn item(&mut self) -> SfvResult<Item> {
        let wert = self.bare_item()?;
        let parameter = self.parameter()?;
        Ok(Item::mit_parametern(wert, parameter))
    }

    fn parameter(&mut self) -> SfvResult<Parameter> {
        let mut parameter = Parameter::neu();
        while self.aktuell() == Some(b';') {
            self.pos += 1;
            self.leerzeichen_ueberspringen();
            let schluessel = self.schluessel()?;
            let wert = if self.aktuell() == Some(b'=') {
                self.pos += 1;
                self.bare_item()?
            } else {
                BareItem::Boolean(true)
            };
            parameter.setzen(schluessel, wert);
        }
        Ok(parameter)
    }

    fn schluessel(&mut self) -> SfvResult<String> {
        match self.aktuell() {
            Some(c) if c.is_ascii_lowercase() || c == b'*' => {}
            Some(_) => {
                return Err(SfvFehler::UngueltigerSchluessel(
                    String::from_utf8_lossy(&self.eingabe[self.pos..]).into_owned(),
                ))
            }
            None => return Err(self.syntax("Schluessel")),
        }
        let start = self.pos;
        while let Some(c) = self.aktuell() {
            if !ist_schluessel_zeichen(c) {
                break;
            }
            self.pos += 1;
        }
        Ok(ascii_text(&self.eingabe[start..self.pos]))
    }

    // -----------------------------------------------------------------------
    // Bare Items
    // -----------------------------------------------------------------------

    fn bare_item(&mut self) -> SfvResult<BareItem> {
        match self.aktuell() {
            Some(b'-') | Some(b'0'..=b'9') => self.zahl(),
            Some(b'"') => self.zeichenkette(),
            Some(b':') => self.byte_sequenz(),
            Some(b'?') => self.boolean(),
            Some(c) if c.is_ascii_alphabetic() || c == b'*' => self.token(),
            Some(_) => Err(SfvFehler::UngueltigesZeichen(self.pos)),
            None => Err(self.syntax("Wert")),
        }
    }

    fn zahl(&mut self) -> SfvResult<BareItem> {
        let negativ = self.aktuell() == Some(b'-');
        if negativ {
            self.pos += 1;
        }
        if !matches!(self.aktuell(), Some(b'0'..=b'9')) {
            return Err(self.syntax("Ziffer"));
        }

        let start = self.pos;
        let mut punkt: Option<usize> = None;
        while let Some(c) = self.aktuell() {
            match c {
                b'0'..=b'9' => self.pos += 1,
                b'.' if punkt.is_none() => {
                    if self.pos - start > 12 {
                        return Err(SfvFehler::Ueberlauf(self.text_ab(start)));
                    }
                    punkt = Some(self.pos);
                    self.pos += 1;
                }
                _ => break,
            }
            let laenge = self.pos - start;
            if (punkt.is_none() && laenge > 15) || laenge > 16 {
                return Err(SfvFehler::Ueberlauf(self.text_ab(start)));
            }
        }

        let ziffern = &self.eingabe[start..self.pos];
        let vorzeichen = if negativ { -1 } else { 1 };
        match punkt {
            None => {
                let wert = ziffern_wert(ziffern);
                Ok(BareItem::Integer(vorzeichen * wert))
            }
            Some(p) => {
                let vorkomma = &self.eingabe[start..p];
                let nachkomma = &self.eingabe[p + 1..self.pos];
                if nachkomma.is_empty() {
                    return Err(self.syntax("Nachkommastelle"));
                }
                if nachkomma.len() > 3 {
                    return Err(SfvFehler::Ueberlauf(self.text_ab(start)));
                }
                let mut bruch = ziffern_wert(nachkomma);
                for _ in nachkomma.len()..3 {
                    bruch *= 10;
                }
                let tausendstel = ziffern_wert(vorkomma) * 1_000 + bruch;
                Ok(BareItem::Decimal(Dezimal::aus_tausendstel(
                    vorzeichen * tausendstel,
                )))
            }
        }
    }

    fn zeichenkette(&mut self) -> SfvResult<BareItem> {
        self.pos += 1;
        let mut wert = String::new();
        loop {
            let Some(c) = self.aktuell() else {
                return Err(SfvFehler::ZeichenketteOffen);
            };
            self.pos += 1;
            match c {
                b'\\' => match self.aktuell() {
                    Some(e @ (b'"' | b'\\')) => {
                        wert.push(e as char);
                        self.pos += 1;
                    }
                    Some(_) => return Err(SfvFehler::UngueltigesZeichen(self.pos)),
                    None => return Err(SfvFehler::ZeichenketteOffen),
                },
                b'"' => return Ok(BareItem::String(wert)),
                0x20..=0x7E => wert.push(c as char),
                _ => return Err(SfvFehler::UngueltigesZeichen(self.pos - 1)),
            }
        }
    }

    fn token(&mut self) -> SfvResult<BareItem> {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.aktuell() {
            if !(ist_tchar(c) || c == b':' || c == b'/') {
                break;
            }
            self.pos += 1;
        }
        Ok(BareItem::Token(ascii_text(&self.eingabe[start..self.pos])))
    }

    fn byte_sequenz(&mut self) -> SfvResult<BareItem> {
        self.pos += 1;
        let rest = &self.eingabe[self.pos..];
        let Some(ende) = rest.iter().position(|c| *c == b':') else {
            return Err(SfvFehler::ByteSequenzOffen);
        };
        let inhalt = &rest[..ende];
        let bytes = STANDARD
            .decode(inhalt)
            .map_err(|e| SfvFehler::Base64(e.to_string()))?;
        self.pos += ende + 1;
        Ok(BareItem::ByteSeq(bytes))
    }

    fn boolean(&mut self) -> SfvResult<BareItem> {
        self.pos += 1;
        let wert = match self.aktuell() {
            Some(b'1') => true,
            Some(b'0') => false,
            _ => return Err(self.syntax("'0' oder '1'")),
        };
        self.pos += 1;
        Ok(BareItem::Boolean(wert))
    }

    fn text_ab(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.eingabe[start..self.pos]).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Zeichenklassen
// ---------------------------------------------------------------------------

pub(super) fn ist_schluessel_zeichen(c: u8) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, b'_' | b'-' | b'.' | b'*')
}

/// tchar nach RFC 9110
pub(super) fn ist_tchar(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

fn ziffern_wert(ziffern: &[u8]) -> i64 {
    ziffern
        .iter()
        .fold(0i64, |acc, c| acc * 10 + i64::from(c - b'0'))
}

fn ascii_text(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}
