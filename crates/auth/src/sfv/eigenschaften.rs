//! Eigenschaftstests: kanonische Serialisierung und Parser sind invers

use proptest::collection::vec;
use proptest::prelude::*;

use super::*;
use crate::error::SfvFehler;

fn schluessel() -> impl Strategy<Value = String> {
    "[a-z*][a-z0-9_.*-]{0,8}"
}

fn bare_item() -> impl Strategy<Value = BareItem> {
    prop_oneof![
        (-MAX_INTEGER..=MAX_INTEGER).prop_map(BareItem::Integer),
        (-MAX_DEZIMAL_TAUSENDSTEL..=MAX_DEZIMAL_TAUSENDSTEL)
            .prop_map(|t| BareItem::Decimal(Dezimal::aus_tausendstel(t))),
        "[ -~]{0,24}".prop_map(BareItem::String),
        r"[a-zA-Z*][a-zA-Z0-9!#$%&'*+.^_`|~:/-]{0,12}".prop_map(BareItem::Token),
        vec(any::<u8>(), 0..24).prop_map(BareItem::ByteSeq),
        any::<bool>().prop_map(BareItem::Boolean),
    ]
}

fn parameter() -> impl Strategy<Value = Parameter> {
    vec((schluessel(), bare_item()), 0..4).prop_map(|paare| {
        paare
            .into_iter()
            .fold(Parameter::neu(), |p, (k, v)| p.mit(k, v))
    })
}

fn item() -> impl Strategy<Value = Item> {
    (bare_item(), parameter()).prop_map(|(wert, p)| Item::mit_parametern(wert, p))
}

fn listen_eintrag() -> impl Strategy<Value = ListenEintrag> {
    prop_oneof![
        item().prop_map(ListenEintrag::Item),
        (vec(item(), 0..4), parameter())
            .prop_map(|(items, parameter)| ListenEintrag::InnerList(InnerList { items, parameter })),
    ]
}

fn dictionary() -> impl Strategy<Value = Dictionary> {
    vec((schluessel(), listen_eintrag()), 1..5).prop_map(|paare| {
        let mut dict = Dictionary::neu();
        for (k, v) in paare {
            dict.setzen(k, v);
        }
        dict
    })
}

fn ist_ueberlauf<T>(ergebnis: &SfvResult<T>) -> bool {
    matches!(ergebnis, Err(SfvFehler::Ueberlauf(_)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn item_rundreise(item in item()) {
        let feld = Feld::Item(item);
        let text = encode(&feld).expect("Serialisierung");
        prop_assert_eq!(parse(&text, FeldTyp::Item), Ok(feld));
    }

    #[test]
    fn liste_rundreise(liste in vec(listen_eintrag(), 1..5)) {
        let feld = Feld::Liste(liste);
        let text = encode(&feld).expect("Serialisierung");
        prop_assert_eq!(parse(&text, FeldTyp::Liste), Ok(feld));
    }

    #[test]
    fn dictionary_rundreise(dict in dictionary()) {
        let text = encode(&Feld::Dictionary(dict.clone())).expect("Serialisierung");
        prop_assert_eq!(parse_dictionary(&text), Ok(dict));
    }

    #[test]
    fn integer_ueberlauf_wird_abgelehnt(
        betrag in (MAX_INTEGER + 1)..=i64::MAX,
        negativ in any::<bool>(),
    ) {
        let wert = if negativ { -betrag } else { betrag };
        let feld = Feld::Item(Item::neu(BareItem::Integer(wert)));
        prop_assert!(ist_ueberlauf(&encode(&feld)));
        prop_assert!(ist_ueberlauf(&parse(&wert.to_string(), FeldTyp::Item)));
    }

    #[test]
    fn dezimal_ueberlauf_wird_abgelehnt(
        tausendstel in (MAX_DEZIMAL_TAUSENDSTEL + 1)..=i64::MAX,
        negativ in any::<bool>(),
    ) {
        let t = if negativ { -tausendstel } else { tausendstel };
        let feld = Feld::Item(Item::neu(BareItem::Decimal(Dezimal::aus_tausendstel(t))));
        prop_assert!(ist_ueberlauf(&encode(&feld)));
    }

    #[test]
    fn zu_viele_vorkommastellen(vorkomma in 1_000_000_000_000i64..=MAX_INTEGER, bruch in 0u16..1000) {
        let text = format!("{vorkomma}.{bruch}");
        prop_assert!(ist_ueberlauf(&parse(&text, FeldTyp::Item)));
    }
}
