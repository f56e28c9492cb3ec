//! Property-based tests for classification

use super::*;
use proptest::prelude::*;

const KEYWORDS: &[(&str, Intent)] = &[
    ("water", Intent::Watering),
    ("irrigation", Intent::Watering),
    ("pest", Intent::PestControl),
    ("bug", Intent::PestControl),
    ("fertilizer", Intent::SoilFertility),
    ("nutrient", Intent::SoilFertility),
    ("weather", Intent::WeatherPlanning),
    ("rain", Intent::WeatherPlanning),
];

fn priority(intent: Intent) -> usize {
    FARMING
        .rules()
        .iter()
        .position(|rule| rule.intent == intent)
        .unwrap_or(usize::MAX)
}

fn arb_keyword() -> impl Strategy<Value = (&'static str, Intent)> {
    proptest::sample::select(KEYWORDS)
}

/// Filler that cannot accidentally contain any keyword
fn arb_filler() -> impl Strategy<Value = String> {
    "[cdfhjkmoqsvxyz ]{0,20}"
}

fn random_case(text: &str, mask: &[bool]) -> String {
    text.chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
        .collect()
}

proptest! {
    #[test]
    fn prop_response_from_finite_set(text in ".{0,80}") {
        let response = classify(&text);
        prop_assert!(FARMING.responses().any(|r| r == response));
    }

    #[test]
    fn prop_classification_is_deterministic(text in ".{0,80}") {
        prop_assert_eq!(FARMING.classify(&text), FARMING.classify(&text));
    }

    #[test]
    fn prop_filler_only_falls_back(text in arb_filler()) {
        prop_assert_eq!(FARMING.classify(&text).intent, Intent::General);
    }

    #[test]
    fn prop_single_keyword_selects_its_rule(
        (keyword, intent) in arb_keyword(),
        prefix in arb_filler(),
        suffix in arb_filler(),
        mask in proptest::collection::vec(any::<bool>(), 1..8),
    ) {
        let text = random_case(&format!("{prefix}{keyword}{suffix}"), &mask);
        prop_assert_eq!(FARMING.classify(&text).intent, intent);
    }

    #[test]
    fn prop_earliest_rule_wins(
        (first, first_intent) in arb_keyword(),
        (second, second_intent) in arb_keyword(),
        filler in arb_filler(),
    ) {
        let expected = if priority(first_intent) <= priority(second_intent) {
            first_intent
        } else {
            second_intent
        };

        let forward = format!("{first} {filler} {second}");
        let backward = format!("{second} {filler} {first}");
        prop_assert_eq!(FARMING.classify(&forward).intent, expected);
        prop_assert_eq!(FARMING.classify(&backward).intent, expected);
    }
}
