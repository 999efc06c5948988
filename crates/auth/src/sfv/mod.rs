//! Structured Field Values (RFC 8941)
//!
//! Datentypen, Parser und Serialisierer fuer strukturierte HTTP-Header.
//! Wird fuer `Signature-Input` und `Signature` benoetigt.
//!
//! ## Datenmodell
//! ```text
//! Feld
//!  +-- Item        = BareItem + Parameter
//!  +-- Liste       = [Item | InnerList]
//!  +-- Dictionary  = { key -> Item | InnerList }
//!
//! InnerList = ( Item Item ... ) + Parameter
//! ```
//!
//! Parameter und Dictionaries behalten die Einfuegereihenfolge. Doppelte
//! Schluessel ueberschreiben den Wert an der urspruenglichen Position.

mod encoder;
mod parser;
#[cfg(test)]
mod eigenschaften;

use crate::error::SfvResult;

/// Groesster erlaubter Betrag eines Integers (15 Stellen)
pub const MAX_INTEGER: i64 = 999_999_999_999_999;

/// Groesster erlaubter Betrag eines Decimals in Tausendsteln
/// (12 Vorkomma- und 3 Nachkommastellen)
pub const MAX_DEZIMAL_TAUSENDSTEL: i64 = 999_999_999_999_999;

// ---------------------------------------------------------------------------
// Bare Items
// ---------------------------------------------------------------------------

/// Dezimalzahl mit drei Nachkommastellen, exakt als Tausendstel gespeichert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dezimal(i64);

impl Dezimal {
    pub fn aus_tausendstel(tausendstel: i64) -> Self {
        Self(tausendstel)
    }

    pub fn tausendstel(&self) -> i64 {
        self.0
    }
}

/// Einfacher Wert ohne Parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BareItem {
    Integer(i64),
    Decimal(Dezimal),
    String(String),
    Token(String),
    ByteSeq(Vec<u8>),
    Boolean(bool),
}

impl BareItem {
    pub fn als_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn als_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn als_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::ByteSeq(b) => Some(b),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

/// Geordnete Parameter eines Items oder einer Inner List
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter(Vec<(String, BareItem)>);

impl Parameter {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Setzt einen Parameter; ein vorhandener Schluessel behaelt seine Position
    pub fn setzen(&mut self, schluessel: impl Into<String>, wert: BareItem) {
        let schluessel = schluessel.into();
        match self.0.iter_mut().find(|(k, _)| *k == schluessel) {
            Some((_, alt)) => *alt = wert,
            None => self.0.push((schluessel, wert)),
        }
    }

    /// Builder-Variante von `setzen`
    pub fn mit(mut self, schluessel: impl Into<String>, wert: BareItem) -> Self {
        self.setzen(schluessel, wert);
        self
    }

    pub fn get(&self, schluessel: &str) -> Option<&BareItem> {
        self.0.iter().find(|(k, _)| k == schluessel).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BareItem)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Items, Listen, Dictionaries
// ---------------------------------------------------------------------------

/// Bare Item mit Parametern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub wert: BareItem,
    pub parameter: Parameter,
}

impl Item {
    pub fn neu(wert: BareItem) -> Self {
        Self {
            wert,
            parameter: Parameter::neu(),
        }
    }

    pub fn mit_parametern(wert: BareItem, parameter: Parameter) -> Self {
        Self { wert, parameter }
    }
}

/// Geklammerte Liste von Items mit eigenen Parametern
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InnerList {
    pub items: Vec<Item>,
    pub parameter: Parameter,
}

/// Element einer Liste oder Wert eines Dictionary-Eintrags
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenEintrag {
    Item(Item),
    InnerList(InnerList),
}

impl ListenEintrag {
    pub fn als_item(&self) -> Option<&Item> {
        match self {
            Self::Item(item) => Some(item),
            Self::InnerList(_) => None,
        }
    }

    pub fn als_inner_list(&self) -> Option<&InnerList> {
        match self {
            Self::InnerList(liste) => Some(liste),
            Self::Item(_) => None,
        }
    }
}

/// Liste von Items und Inner Lists
pub type Liste = Vec<ListenEintrag>;

/// Geordnetes Dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary(Vec<(String, ListenEintrag)>);

impl Dictionary {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Setzt einen Eintrag; ein vorhandener Schluessel behaelt seine Position
    pub fn setzen(&mut self, schluessel: impl Into<String>, wert: ListenEintrag) {
        let schluessel = schluessel.into();
        match self.0.iter_mut().find(|(k, _)| *k == schluessel) {
            Some((_, alt)) => *alt = wert,
            None => self.0.push((schluessel, wert)),
        }
    }

    pub fn get(&self, schluessel: &str) -> Option<&ListenEintrag> {
        self.0.iter().find(|(k, _)| k == schluessel).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ListenEintrag)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Feld
// ---------------------------------------------------------------------------

/// Die drei Top-Level-Formen eines strukturierten Headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feld {
    Item(Item),
    Liste(Liste),
    Dictionary(Dictionary),
}

/// Erwartete Form beim Parsen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeldTyp {
    Item,
    Liste,
    Dictionary,
}

/// Parst einen Header-Wert als `typ`
///
/// Fuehrende und abschliessende Leerzeichen werden ignoriert, jeder
/// weitere Rest nach dem Feld ist ein Fehler.
pub fn parse(eingabe: &str, typ: FeldTyp) -> SfvResult<Feld> {
    parser::Parser::neu(eingabe).feld_parsen(typ)
}

/// Parst einen Header-Wert als Dictionary
pub fn parse_dictionary(eingabe: &str) -> SfvResult<Dictionary> {
    parser::Parser::neu(eingabe).dictionary_parsen()
}

/// Serialisiert ein Feld in kanonischer Form
pub fn encode(feld: &Feld) -> SfvResult<String> {
    let mut ausgabe = String::new();
    match feld {
        Feld::Item(item) => encoder::item(&mut ausgabe, item)?,
        Feld::Liste(liste) => encoder::liste(&mut ausgabe, liste)?,
        Feld::Dictionary(dict) => encoder::dictionary(&mut ausgabe, dict)?,
    }
    Ok(ausgabe)
}

/// Serialisiert eine einzelne Inner List (z.B. fuer `@signature-params`)
pub fn encode_inner_list(liste: &InnerList) -> SfvResult<String> {
    let mut ausgabe = String::new();
    encoder::inner_list(&mut ausgabe, liste)?;
    Ok(ausgabe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SfvFehler;

    fn rundreise(feld: Feld, typ: FeldTyp) {
        let text = encode(&feld).expect("Serialisierung fehlgeschlagen");
        let zurueck = parse(&text, typ).expect("Parsen fehlgeschlagen");
        assert_eq!(zurueck, feld, "Rundreise fuer '{text}'");
    }

    #[test]
    fn rundreise_item_mit_parametern() {
        let item = Item::mit_parametern(
            BareItem::Token("sig1".into()),
            Parameter::neu()
                .mit("a", BareItem::Integer(-42))
                .mit("b", BareItem::Decimal(Dezimal::aus_tausendstel(1_500)))
                .mit("c", BareItem::Boolean(true))
                .mit("d", BareItem::Boolean(false))
                .mit("e", BareItem::ByteSeq(vec![0, 1, 2, 255])),
        );
        rundreise(Feld::Item(item), FeldTyp::Item);
    }

    #[test]
    fn rundreise_liste_mit_inner_list() {
        let liste = vec![
            ListenEintrag::Item(Item::neu(BareItem::String("a \"b\" \\c".into()))),
            ListenEintrag::InnerList(InnerList {
                items: vec![
                    Item::neu(BareItem::Integer(1)),
                    Item::mit_parametern(
                        BareItem::Token("*x/y:z".into()),
                        Parameter::neu().mit("q", BareItem::Integer(2)),
                    ),
                ],
                parameter: Parameter::neu().mit("lvl", BareItem::Integer(3)),
            }),
            ListenEintrag::InnerList(InnerList::default()),
        ];
        rundreise(Feld::Liste(liste), FeldTyp::Liste);
    }

    #[test]
    fn rundreise_dictionary() {
        let mut dict = Dictionary::neu();
        dict.setzen("a", ListenEintrag::Item(Item::neu(BareItem::Boolean(true))));
        dict.setzen(
            "b",
            ListenEintrag::Item(Item::mit_parametern(
                BareItem::Boolean(true),
                Parameter::neu().mit("x", BareItem::Integer(1)),
            )),
        );
        dict.setzen(
            "sig1",
            ListenEintrag::InnerList(InnerList {
                items: vec![Item::neu(BareItem::String("@authority".into()))],
                parameter: Parameter::neu().mit("created", BareItem::Integer(1_641_013_200)),
            }),
        );
        rundreise(Feld::Dictionary(dict), FeldTyp::Dictionary);
    }

    #[test]
    fn dictionary_schluessel_dedupliziert() {
        let dict = parse_dictionary("a=1, b=2, a=3").unwrap();
        let schluessel: Vec<_> = dict.iter().map(|(k, _)| k).collect();
        assert_eq!(schluessel, vec!["a", "b"]);
        assert_eq!(
            dict.get("a").and_then(ListenEintrag::als_item).map(|i| &i.wert),
            Some(&BareItem::Integer(3))
        );
    }

    #[test]
    fn parameter_dedupliziert() {
        let feld = parse("abc;a=1;b=2;a=3", FeldTyp::Item).unwrap();
        let Feld::Item(item) = feld else {
            panic!("Item erwartet");
        };
        assert_eq!(item.parameter.len(), 2);
        assert_eq!(item.parameter.get("a"), Some(&BareItem::Integer(3)));
        assert_eq!(item.parameter.iter().next().map(|(k, _)| k), Some("a"));
    }

    #[test]
    fn dezimal_kanonisch() {
        let feld = |t| Feld::Item(Item::neu(BareItem::Decimal(Dezimal::aus_tausendstel(t))));
        assert_eq!(encode(&feld(1_500)).unwrap(), "1.5");
        assert_eq!(encode(&feld(1_000)).unwrap(), "1.0");
        assert_eq!(encode(&feld(1_230)).unwrap(), "1.23");
        assert_eq!(encode(&feld(1_234)).unwrap(), "1.234");
        assert_eq!(encode(&feld(-50)).unwrap(), "-0.05");
    }

    #[test]
    fn integer_ueberlauf() {
        let zu_gross = Feld::Item(Item::neu(BareItem::Integer(MAX_INTEGER + 1)));
        assert!(matches!(encode(&zu_gross), Err(SfvFehler::Ueberlauf(_))));
        let grenze = Feld::Item(Item::neu(BareItem::Integer(-MAX_INTEGER)));
        assert_eq!(encode(&grenze).unwrap(), "-999999999999999");

        assert!(matches!(
            parse("1234567890123456", FeldTyp::Item),
            Err(SfvFehler::Ueberlauf(_))
        ));
        assert!(parse("123456789012345", FeldTyp::Item).is_ok());
    }

    #[test]
    fn dezimal_ueberlauf() {
        assert!(matches!(
            parse("1234567890123.5", FeldTyp::Item),
            Err(SfvFehler::Ueberlauf(_))
        ));
        assert!(matches!(
            parse("1.2345", FeldTyp::Item),
            Err(SfvFehler::Ueberlauf(_))
        ));
        assert!(parse("123456789012.345", FeldTyp::Item).is_ok());

        let zu_gross = Feld::Item(Item::neu(BareItem::Decimal(Dezimal::aus_tausendstel(
            MAX_DEZIMAL_TAUSENDSTEL + 1,
        ))));
        assert!(matches!(encode(&zu_gross), Err(SfvFehler::Ueberlauf(_))));
    }

    #[test]
    fn ungueltige_eingaben() {
        // Nicht druckbares Zeichen in Zeichenkette
        assert!(parse("\"a\tb\"", FeldTyp::Item).is_err());
        assert!(parse("\"a\u{e4}b\"", FeldTyp::Item).is_err());
        // Offene Zeichenkette und Byte-Sequenz
        assert_eq!(parse("\"abc", FeldTyp::Item), Err(SfvFehler::ZeichenketteOffen));
        assert_eq!(parse(":YWJj", FeldTyp::Item), Err(SfvFehler::ByteSequenzOffen));
        // Rest nach dem Feld
        assert!(matches!(
            parse("abc def", FeldTyp::Item),
            Err(SfvFehler::RestEingabe(_))
        ));
        // Abschliessendes Komma
        assert!(parse("a, b,", FeldTyp::Liste).is_err());
        // Ungueltiger Schluessel
        assert!(parse("A=1", FeldTyp::Dictionary).is_err());
        // Dezimalpunkt ohne Nachkommastellen
        assert!(parse("1.", FeldTyp::Item).is_err());
        // Ungueltige Escape-Sequenz
        assert!(parse("\"a\\nb\"", FeldTyp::Item).is_err());
    }

    #[test]
    fn token_validierung_beim_serialisieren() {
        let feld = Feld::Item(Item::neu(BareItem::Token("1abc".into())));
        assert!(matches!(encode(&feld), Err(SfvFehler::UngueltigerToken(_))));
    }

    #[test]
    fn leerzeichen_um_das_feld() {
        let feld = parse("  ?1  ", FeldTyp::Item).unwrap();
        assert_eq!(feld, Feld::Item(Item::neu(BareItem::Boolean(true))));
    }

    #[test]
    fn signature_input_beispiel() {
        let dict = parse_dictionary(
            r#"sig1=("@request-target" "@authority" "x-api-key");keyid="SGVsbG8";nonce="VGhpc0lzQVVuaXF1ZU5vbmNl";alg="hmac-sha256";created=1641013200;expires=3282026430"#,
        )
        .unwrap();
        let liste = dict.get("sig1").and_then(ListenEintrag::als_inner_list).unwrap();
        assert_eq!(liste.items.len(), 3);
        assert_eq!(
            liste.parameter.get("keyid").and_then(BareItem::als_str),
            Some("SGVsbG8")
        );
        assert_eq!(
            liste.parameter.get("created").and_then(BareItem::als_integer),
            Some(1_641_013_200)
        );
    }
}
