//! Keyword intent classification
//!
//! A message is lowercased and checked against each rule in priority
//! order. The first rule with a keyword contained in the text supplies the
//! reply; when none match the table's fallback is used, so classification
//! never fails.

pub mod rules;

#[cfg(test)]
mod proptests;

pub use rules::{Intent, RuleTable, FARMING};

/// Outcome of classifying one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub response: &'static str,
}

impl RuleTable {
    pub fn classify(&self, text: &str) -> Classification {
        let normalized = text.to_lowercase();

        self.rules()
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map_or(
                Classification {
                    intent: Intent::General,
                    response: self.fallback(),
                },
                |rule| Classification {
                    intent: rule.intent,
                    response: rule.response,
                },
            )
    }
}

/// Reply text for `text` under the built-in farming rules
#[allow(dead_code)] // Convenience entry point; the scheduler uses the table directly
pub fn classify(text: &str) -> &'static str {
    FARMING.classify(text).response
}
