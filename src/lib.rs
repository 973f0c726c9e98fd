//! # Bookkeeping Core
//!
//! The integrity and ingestion engine of a double-entry bookkeeping
//! application: a ledger that refuses unbalanced transactions, a CSV bank
//! statement import pipeline, and a statement reconciliation matcher.
//!
//! ## Features
//!
//! - **Double-entry ledger**: postings of every transaction sum to exactly zero, checked in decimal arithmetic
//! - **Statement parsing**: column mapping by index or header name, day-first and textual dates, debit/credit columns
//! - **Duplicate detection**: stable row fingerprints plus an amount/date fallback, so re-imports are idempotent
//! - **Memorized rules**: EXACT, CONTAINS and REGEX payee rules suggesting categories and payees
//! - **Import sessions**: non-mutating preview, per-row overrides, best-effort or all-or-nothing commit
//! - **Reconciliation**: statement lines paired with unreconciled postings under date tolerance
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use bookkeeping_core::utils::MemoryStorage;
//! use bookkeeping_core::{ColumnMapping, Importer, Ledger, RuleSet};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::new(MemoryStorage::new());
//! let csv = "30/06/2025,-17,BWS LIQUOR\n";
//! let mapping = ColumnMapping::new().date(0).amount(1).description(2);
//! let preview = Importer::default()
//!     .preview(&ledger, csv, &mapping, "bank", &RuleSet::default())
//!     .await?;
//! println!("{} rows to review", preview.candidates.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dedup;
pub mod import;
pub mod ledger;
pub mod reconciliation;
pub mod rules;
pub mod statement;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{CommitMode, EngineConfig, ImportSettings, MatchStrategy, ReconciliationSettings};
pub use dedup::{fingerprint, DuplicateDetector};
pub use import::{
    CommitOptions, CommitSummary, ImportCandidate, ImportPreview, ImportSession, ImportState,
    Importer,
};
pub use ledger::*;
pub use reconciliation::{ReconciliationEngine, ReconciliationReport, StatementLine};
pub use rules::{match_rule, MatchType, MemorizedRule, RuleSet};
pub use statement::{ColumnMapping, ParsedRow, RowError, StatementParser};
pub use traits::*;
pub use types::*;

// Re-export transaction patterns for convenience
pub use ledger::transaction::patterns;
