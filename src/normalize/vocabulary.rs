//! Shared condition inference used after a provider's own vocabulary fails
//!
//! Provider vocabularies are exact phrase maps owned by each adapter. What is
//! left here is the provider-agnostic part of the chain: a fixed Italian
//! keyword list scanned over free text, and inference from precipitation.

use crate::models::Condition;

/// Ordered keyword list; more specific stems come before the generic ones
/// they contain ("nevischio" before "neve", "poco nuvoloso" before "nuvolos").
const KEYWORDS: &[(&str, Condition)] = &[
    ("temporal", Condition::Thunderstorm),
    ("grandin", Condition::Thunderstorm),
    ("fulmin", Condition::Thunderstorm),
    ("nevischio", Condition::Sleet),
    ("pioggia mista a neve", Condition::Sleet),
    ("neve", Condition::Snow),
    ("nevicat", Condition::Snow),
    ("pioggia forte", Condition::HeavyRain),
    ("pioggia intensa", Condition::HeavyRain),
    ("nubifragi", Condition::HeavyRain),
    ("rovesc", Condition::Showers),
    ("acquazzon", Condition::Showers),
    ("pioggia debole", Condition::LightRain),
    ("pioviggin", Condition::Drizzle),
    ("pioggia", Condition::Rain),
    ("piogge", Condition::Rain),
    ("nebbi", Condition::Fog),
    ("foschia", Condition::Fog),
    ("coperto", Condition::Overcast),
    ("poco nuvoloso", Condition::MostlyClear),
    ("parzialmente nuvoloso", Condition::PartlyCloudy),
    ("variabile", Condition::PartlyCloudy),
    ("nubi sparse", Condition::PartlyCloudy),
    ("velat", Condition::MostlyClear),
    ("nuvolos", Condition::Cloudy),
    ("nubi", Condition::Cloudy),
    ("sereno", Condition::Clear),
    ("soleggiat", Condition::Clear),
    ("sole", Condition::Clear),
];

/// Scan free text for the first keyword of the fixed vocabulary list
#[must_use]
pub fn keyword_scan(text: &str) -> Option<Condition> {
    let text = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, condition)| *condition)
}

/// Infer a condition from a precipitation-intensity phrase ("pioggia debole",
/// "precipitazioni moderate", "forte") when nothing better is known
#[must_use]
pub fn from_precipitation_phrase(text: &str) -> Option<Condition> {
    let text = text.to_lowercase();
    if text.contains("nev") {
        Some(Condition::Snow)
    } else if text.contains("forte") || text.contains("intens") || text.contains("abbondant") {
        Some(Condition::HeavyRain)
    } else if text.contains("moderat") {
        Some(Condition::Rain)
    } else if text.contains("debol") || text.contains("deboli") || text.contains("scars") {
        Some(Condition::LightRain)
    } else {
        None
    }
}

/// Infer a condition from an hourly precipitation amount in mm
#[must_use]
pub fn from_precipitation_amount(mm: f32) -> Option<Condition> {
    if mm <= 0.0 {
        None
    } else if mm < 1.0 {
        Some(Condition::LightRain)
    } else if mm < 6.0 {
        Some(Condition::Rain)
    } else {
        Some(Condition::HeavyRain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Temporale con grandine", Condition::Thunderstorm)]
    #[case("nevischio in serata", Condition::Sleet)]
    #[case("Neve debole", Condition::Snow)]
    #[case("Cielo poco nuvoloso", Condition::MostlyClear)]
    #[case("molto nuvoloso", Condition::Cloudy)]
    #[case("Pioggia debole e schiarite", Condition::LightRain)]
    #[case("possibili rovesci", Condition::Showers)]
    #[case("Nebbia in banchi", Condition::Fog)]
    #[case("cielo SERENO", Condition::Clear)]
    fn test_keyword_scan(#[case] text: &str, #[case] expected: Condition) {
        assert_eq!(keyword_scan(text), Some(expected));
    }

    #[test]
    fn test_keyword_scan_without_match() {
        assert_eq!(keyword_scan("dati non disponibili"), None);
    }

    #[rstest]
    #[case("debole", Some(Condition::LightRain))]
    #[case("Precipitazioni moderate", Some(Condition::Rain))]
    #[case("forte", Some(Condition::HeavyRain))]
    #[case("neve", Some(Condition::Snow))]
    #[case("assenti", None)]
    fn test_precipitation_phrase(#[case] text: &str, #[case] expected: Option<Condition>) {
        assert_eq!(from_precipitation_phrase(text), expected);
    }

    #[test]
    fn test_precipitation_amount() {
        assert_eq!(from_precipitation_amount(0.0), None);
        assert_eq!(from_precipitation_amount(0.4), Some(Condition::LightRain));
        assert_eq!(from_precipitation_amount(2.5), Some(Condition::Rain));
        assert_eq!(from_precipitation_amount(12.0), Some(Condition::HeavyRain));
    }
}
