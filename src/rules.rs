//! Memorized payee rules
//!
//! Rules are consulted during import to suggest a category account and a
//! cleaned-up payee. Matching is case-insensitive and never fails: a rule
//! that cannot be evaluated simply never matches.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a rule's value is compared with payee text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    Exact,
    Contains,
    Regex,
}

impl MatchType {
    /// Precedence tier; lower is consulted first
    fn tier(self) -> u8 {
        match self {
            MatchType::Exact => 0,
            MatchType::Contains => 1,
            MatchType::Regex => 2,
        }
    }
}

/// A saved payee-matching pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorizedRule {
    pub id: String,
    pub name: String,
    pub match_type: MatchType,
    pub match_value: String,
    /// Payee rewrite suggestion
    #[serde(default)]
    pub default_payee: Option<String>,
    /// Category suggestion
    #[serde(default)]
    pub default_account_id: Option<String>,
    /// Lower runs first; rules without one follow those with one
    #[serde(default)]
    pub priority: Option<i32>,
}

impl MemorizedRule {
    pub fn new(id: &str, name: &str, match_type: MatchType, match_value: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            match_type,
            match_value: match_value.to_string(),
            default_payee: None,
            default_account_id: None,
            priority: None,
        }
    }

    pub fn with_payee(mut self, payee: &str) -> Self {
        self.default_payee = Some(payee.to_string());
        self
    }

    pub fn with_account(mut self, account_id: &str) -> Self {
        self.default_account_id = Some(account_id.to_string());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Contains(String),
    Regex(Regex),
}

impl Matcher {
    fn is_match(&self, payee: &str, payee_lower: &str) -> bool {
        match self {
            Matcher::Exact(value) => payee_lower == value,
            Matcher::Contains(value) => !value.is_empty() && payee_lower.contains(value.as_str()),
            Matcher::Regex(re) => re.is_match(payee),
        }
    }
}

/// Rules in evaluation order, with patterns compiled once
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<MemorizedRule>,
    /// (index into `rules`, matcher), sorted by precedence
    order: Vec<(usize, Matcher)>,
}

impl RuleSet {
    pub fn new(rules: Vec<MemorizedRule>) -> Self {
        let mut order: Vec<(usize, Matcher)> = Vec::with_capacity(rules.len());
        for (index, rule) in rules.iter().enumerate() {
            let value = rule.match_value.trim();
            let matcher = match rule.match_type {
                MatchType::Exact => Matcher::Exact(value.to_lowercase()),
                MatchType::Contains => Matcher::Contains(value.to_lowercase()),
                MatchType::Regex => {
                    match RegexBuilder::new(value).case_insensitive(true).build() {
                        Ok(re) => Matcher::Regex(re),
                        Err(e) => {
                            warn!(rule_id = %rule.id, error = %e, "disabling rule with invalid pattern");
                            continue;
                        }
                    }
                }
            };
            order.push((index, matcher));
        }

        // Stable sort keeps supplied order as the final tie-break
        order.sort_by_key(|(index, _)| {
            let rule = &rules[*index];
            (
                rule.match_type.tier(),
                rule.priority.is_none(),
                rule.priority.unwrap_or_default(),
            )
        });

        Self { rules, order }
    }

    pub fn rules(&self) -> &[MemorizedRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching the payee text, by precedence
    pub fn match_rule(&self, payee: &str) -> Option<&MemorizedRule> {
        self.match_index(payee).map(|index| &self.rules[index])
    }

    /// Position of the matching rule in the supplied list
    pub fn match_index(&self, payee: &str) -> Option<usize> {
        let payee = payee.trim();
        if payee.is_empty() {
            return None;
        }
        let payee_lower = payee.to_lowercase();

        self.order
            .iter()
            .find(|(_, matcher)| matcher.is_match(payee, &payee_lower))
            .map(|(index, _)| *index)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// One-shot match over a rule slice
pub fn match_rule<'a>(payee: &str, rules: &'a [MemorizedRule]) -> Option<&'a MemorizedRule> {
    RuleSet::new(rules.to_vec())
        .match_index(payee)
        .and_then(|index| rules.get(index))
}
