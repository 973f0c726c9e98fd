//! Statement import: preview, categorization, and commit
//!
//! [`Importer`] runs the parser, duplicate detector and rule matcher over a
//! statement without writing anything, then commits the rows the user kept
//! as balanced two-posting transactions. [`ImportSession`] wraps it in an
//! explicit state machine for UI-driven flows.

pub mod orchestrator;
pub mod session;

use serde::{Deserialize, Serialize};

use crate::config::{CommitMode, ImportSettings};
use crate::dedup::DuplicateMatch;
use crate::statement::{ParsedRow, RowError};

pub use orchestrator::Importer;
pub use session::{ImportSession, ImportState};

/// A parsed row annotated for review. Never stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportCandidate {
    pub row: ParsedRow,
    /// Stored as the external id of the committed transaction
    pub fingerprint: String,
    pub is_duplicate: bool,
    pub duplicate_of: Option<DuplicateMatch>,
    pub matched_rule_id: Option<String>,
    pub suggested_category_id: Option<String>,
    pub suggested_payee: Option<String>,
    /// User's choice, beats the rule suggestion
    pub category_override: Option<String>,
    pub payee_override: Option<String>,
}

impl ImportCandidate {
    /// Category the row would be filed under
    pub fn resolved_category(&self, apply_rules: bool) -> Option<&str> {
        self.category_override.as_deref().or(if apply_rules {
            self.suggested_category_id.as_deref()
        } else {
            None
        })
    }

    /// Payee the committed transaction would carry
    pub fn resolved_payee(&self, apply_rules: bool) -> &str {
        self.payee_override
            .as_deref()
            .or(if apply_rules {
                self.suggested_payee.as_deref()
            } else {
                None
            })
            .unwrap_or(&self.row.payee)
    }
}

/// Result of a preview: every row, annotated, plus the rows that failed to parse
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportPreview {
    pub candidates: Vec<ImportCandidate>,
    pub parse_errors: Vec<RowError>,
    pub duplicate_count: usize,
}

impl ImportPreview {
    /// Candidates a commit with the same `apply_rules` would skip as
    /// uncategorized
    pub fn uncategorized_count(&self, apply_rules: bool) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.resolved_category(apply_rules).is_none())
            .count()
    }

    pub fn candidate_mut(&mut self, row: usize) -> Option<&mut ImportCandidate> {
        self.candidates.iter_mut().find(|c| c.row.row == row)
    }
}

/// Per-commit switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOptions {
    pub skip_duplicates: bool,
    pub apply_rules: bool,
    pub mode: CommitMode,
}

impl From<&ImportSettings> for CommitOptions {
    fn from(settings: &ImportSettings) -> Self {
        Self {
            skip_duplicates: settings.skip_duplicates,
            apply_rules: settings.apply_rules,
            mode: settings.commit_mode,
        }
    }
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self::from(&ImportSettings::default())
    }
}

/// A row that could not be committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

/// Outcome of a commit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitSummary {
    pub imported: usize,
    /// Rows left out because they had no category
    pub skipped: usize,
    pub duplicates: usize,
    pub errors: Vec<RowFailure>,
    /// Ids of the transactions written, in row order
    pub transaction_ids: Vec<String>,
}

impl CommitSummary {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Rows accounted for
    pub fn processed(&self) -> usize {
        self.imported + self.skipped + self.duplicates + self.errors.len()
    }
}

/// Running counts reported after every row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitProgress {
    pub processed: usize,
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub errors: usize,
}

impl CommitProgress {
    fn of(summary: &CommitSummary, total: usize) -> Self {
        Self {
            processed: summary.processed(),
            total,
            imported: summary.imported,
            skipped: summary.skipped,
            duplicates: summary.duplicates,
            errors: summary.errors.len(),
        }
    }
}
