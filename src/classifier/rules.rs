//! The farming rule table
//!
//! Order matters: rules are tried top to bottom and the first match wins.

use serde::Serialize;

/// Topic a message was classified under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Watering,
    PestControl,
    SoilFertility,
    WeatherPlanning,
    /// Nothing matched; answered with the fallback
    General,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Watering => "watering",
            Intent::PestControl => "pest_control",
            Intent::SoilFertility => "soil_fertility",
            Intent::WeatherPlanning => "weather_planning",
            Intent::General => "general",
        }
    }
}

/// Keyword set mapped to a canned reply. Keywords are lowercase.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
    pub response: &'static str,
}

impl Rule {
    /// `normalized` must already be lowercase.
    pub fn matches(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|keyword| normalized.contains(keyword))
    }
}

pub const WATERING_RESPONSE: &str = "For optimal watering, check soil moisture first. Most crops need 1-2 inches of water per week. Water early morning to reduce evaporation and prevent fungal diseases.";

pub const PEST_CONTROL_RESPONSE: &str = "For pest control, try companion planting, beneficial insects, or organic sprays. Can you describe the pest or show me a photo for specific advice?";

pub const SOIL_FERTILITY_RESPONSE: &str = "Soil testing is key! Generally, use nitrogen for leafy growth, phosphorus for roots/flowers, and potassium for overall health. Organic compost is always beneficial.";

pub const WEATHER_PLANNING_RESPONSE: &str = "I can help you plan around weather! Check the weather tab for forecasts. Protect sensitive plants from extreme conditions and adjust watering based on rainfall.";

pub const FALLBACK_RESPONSE: &str = "That's a great question! I can help with crop management, pest control, watering schedules, soil health, and weather planning. What specific farming challenge are you facing?";

const FARMING_RULES: &[Rule] = &[
    Rule {
        intent: Intent::Watering,
        keywords: &["water", "irrigation"],
        response: WATERING_RESPONSE,
    },
    Rule {
        intent: Intent::PestControl,
        keywords: &["pest", "bug"],
        response: PEST_CONTROL_RESPONSE,
    },
    Rule {
        intent: Intent::SoilFertility,
        keywords: &["fertilizer", "nutrient"],
        response: SOIL_FERTILITY_RESPONSE,
    },
    Rule {
        intent: Intent::WeatherPlanning,
        keywords: &["weather", "rain"],
        response: WEATHER_PLANNING_RESPONSE,
    },
];

/// Rules shipped with the assistant
pub static FARMING: RuleTable = RuleTable {
    rules: FARMING_RULES,
    fallback: FALLBACK_RESPONSE,
};

/// Ordered rules plus the reply used when none of them match
#[derive(Debug)]
pub struct RuleTable {
    rules: &'static [Rule],
    fallback: &'static str,
}

impl RuleTable {
    #[allow(dead_code)] // Alternate tables are only built in tests
    pub const fn new(rules: &'static [Rule], fallback: &'static str) -> Self {
        Self { rules, fallback }
    }

    pub fn rules(&self) -> &'static [Rule] {
        self.rules
    }

    pub fn fallback(&self) -> &'static str {
        self.fallback
    }

    /// Every reply this table can produce, in priority order, fallback last
    #[allow(dead_code)] // Used by tests
    pub fn responses(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules
            .iter()
            .map(|rule| rule.response)
            .chain(std::iter::once(self.fallback))
    }
}
