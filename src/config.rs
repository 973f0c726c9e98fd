//! Engine settings for import and reconciliation
//!
//! Every field has a default, so an empty TOML document is a valid config.

use serde::{Deserialize, Serialize};

/// How a commit treats rows that fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Each row is its own atomic unit; failures are counted and skipped
    #[default]
    BestEffort,
    /// Validate every row first and write nothing if any row fails
    AllOrNothing,
}

/// Pairing strategy for statement reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Single pass, first acceptable posting wins
    #[default]
    FirstFit,
    /// Same-day pairs are claimed before any early-posting pairs
    PreferSameDay,
}

/// Import pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// Days either side of the statement date that still count as the same
    /// transaction when amounts match
    #[serde(default)]
    pub date_tolerance_days: u32,

    /// strftime formats tried in order when sniffing dates
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    #[serde(default = "default_true")]
    pub skip_duplicates: bool,

    #[serde(default = "default_true")]
    pub apply_rules: bool,

    #[serde(default)]
    pub commit_mode: CommitMode,

    /// Leading payee characters folded into the fingerprint
    #[serde(default = "default_payee_fingerprint_chars")]
    pub payee_fingerprint_chars: usize,
}

/// Reconciliation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    #[serde(default)]
    pub strategy: MatchStrategy,

    /// How many days before the statement date a posting may be dated
    #[serde(default = "default_max_days_early")]
    pub max_days_early: u32,
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub import: ImportSettings,

    #[serde(default)]
    pub reconciliation: ReconciliationSettings,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Largest date tolerance accepted; beyond a week the heuristic starts
/// merging distinct transactions
pub const MAX_DATE_TOLERANCE_DAYS: u32 = 7;

fn default_true() -> bool {
    true
}

fn default_payee_fingerprint_chars() -> usize {
    24
}

fn default_max_days_early() -> u32 {
    1
}

/// Day-first formats lead; textual month forms cover bank exports like
/// "31 Jan 2026"
pub fn default_date_formats() -> Vec<String> {
    [
        "%d/%m/%Y", "%d %b %Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%y", "%d-%b-%Y", "%d %B %Y",
        "%d-%b-%y", "%Y/%m/%d",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            date_tolerance_days: 0,
            date_formats: default_date_formats(),
            skip_duplicates: true,
            apply_rules: true,
            commit_mode: CommitMode::default(),
            payee_fingerprint_chars: default_payee_fingerprint_chars(),
        }
    }
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::default(),
            max_days_early: default_max_days_early(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.import.date_tolerance_days > MAX_DATE_TOLERANCE_DAYS {
            return Err(ConfigError::Invalid(format!(
                "import.date_tolerance_days must be at most {}, got {}",
                MAX_DATE_TOLERANCE_DAYS, self.import.date_tolerance_days
            )));
        }

        if self.import.date_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "import.date_formats cannot be empty".to_string(),
            ));
        }

        if self.import.payee_fingerprint_chars == 0 {
            return Err(ConfigError::Invalid(
                "import.payee_fingerprint_chars must be positive".to_string(),
            ));
        }

        if self.reconciliation.max_days_early > MAX_DATE_TOLERANCE_DAYS {
            return Err(ConfigError::Invalid(format!(
                "reconciliation.max_days_early must be at most {}",
                MAX_DATE_TOLERANCE_DAYS
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.import.date_tolerance_days, 0);
        assert_eq!(config.import.commit_mode, CommitMode::BestEffort);
        assert_eq!(config.reconciliation.strategy, MatchStrategy::FirstFit);
        assert_eq!(config.reconciliation.max_days_early, 1);
    }

    #[test]
    fn test_partial_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            [import]
            date_tolerance_days = 1
            commit_mode = "all_or_nothing"

            [reconciliation]
            strategy = "prefer_same_day"
            "#,
        )
        .unwrap();

        assert_eq!(config.import.date_tolerance_days, 1);
        assert_eq!(config.import.commit_mode, CommitMode::AllOrNothing);
        assert!(config.import.skip_duplicates);
        assert_eq!(config.import.date_formats, default_date_formats());
        assert_eq!(config.reconciliation.strategy, MatchStrategy::PreferSameDay);
    }

    #[test]
    fn test_out_of_range_tolerance_rejected() {
        let err = EngineConfig::from_toml_str("[import]\ndate_tolerance_days = 30\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let err = EngineConfig::from_toml_str("[import\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
