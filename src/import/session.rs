//! Import session state machine

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::orchestrator::Importer;
use super::{CommitOptions, CommitProgress, CommitSummary, ImportCandidate, ImportPreview};
use crate::ledger::Ledger;
use crate::rules::RuleSet;
use crate::statement::ColumnMapping;
use crate::traits::LedgerStorage;
use crate::types::{ImportError, ImportResult};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    Uploaded,
    Mapped,
    Previewed,
    Categorized,
    Committed,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportState::Uploaded => "uploaded",
            ImportState::Mapped => "mapped",
            ImportState::Previewed => "previewed",
            ImportState::Categorized => "categorized",
            ImportState::Committed => "committed",
        };
        write!(f, "{}", name)
    }
}

/// One statement on its way into one account.
///
/// `Uploaded → Mapped → Previewed → Categorized → Committed`. Remapping or
/// re-previewing before commit starts over from that step; a committed
/// session accepts nothing further.
#[derive(Debug, Clone)]
pub struct ImportSession {
    id: String,
    state: ImportState,
    importer: Importer,
    raw_text: String,
    target_account_id: String,
    mapping: Option<ColumnMapping>,
    preview: Option<ImportPreview>,
    summary: Option<CommitSummary>,
}

impl ImportSession {
    pub fn new(importer: Importer, raw_text: String, target_account_id: String) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        debug!(session_id = %id, account_id = %target_account_id, bytes = raw_text.len(), "import session started");
        Self {
            id,
            state: ImportState::Uploaded,
            importer,
            raw_text,
            target_account_id,
            mapping: None,
            preview: None,
            summary: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn target_account_id(&self) -> &str {
        &self.target_account_id
    }

    pub fn mapping(&self) -> Option<&ColumnMapping> {
        self.mapping.as_ref()
    }

    pub fn preview(&self) -> Option<&ImportPreview> {
        self.preview.as_ref()
    }

    pub fn summary(&self) -> Option<&CommitSummary> {
        self.summary.as_ref()
    }

    fn require(&self, allowed: &[ImportState], action: &'static str) -> ImportResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ImportError::InvalidState {
                state: self.state.to_string(),
                action,
            })
        }
    }

    fn transition(&mut self, next: ImportState) {
        debug!(session_id = %self.id, from = %self.state, to = %next, "import session transition");
        self.state = next;
    }

    /// Attach a column mapping; a structurally invalid one is rejected here
    pub fn map_columns(&mut self, mapping: ColumnMapping) -> ImportResult<()> {
        self.require(
            &[
                ImportState::Uploaded,
                ImportState::Mapped,
                ImportState::Previewed,
                ImportState::Categorized,
            ],
            "map",
        )?;
        mapping.validate()?;
        self.mapping = Some(mapping);
        self.preview = None;
        self.transition(ImportState::Mapped);
        Ok(())
    }

    /// Run the pipeline; discards any earlier preview and its overrides
    pub async fn run_preview<S: LedgerStorage>(
        &mut self,
        ledger: &Ledger<S>,
        rules: &RuleSet,
    ) -> ImportResult<&ImportPreview> {
        self.require(
            &[
                ImportState::Mapped,
                ImportState::Previewed,
                ImportState::Categorized,
            ],
            "preview",
        )?;
        let mapping = self.mapping.as_ref().ok_or(ImportError::InvalidState {
            state: self.state.to_string(),
            action: "preview",
        })?;

        let preview = self
            .importer
            .preview(ledger, &self.raw_text, mapping, &self.target_account_id, rules)
            .await?;
        self.transition(ImportState::Previewed);
        Ok(self.preview.insert(preview))
    }

    /// Choose (or clear) the category of one row, by source row number
    pub fn set_category(&mut self, row: usize, account_id: Option<String>) -> ImportResult<()> {
        self.candidate_edit("categorize", row, |candidate| {
            candidate.category_override = account_id
        })
    }

    /// Choose (or clear) the payee of one row, by source row number
    pub fn set_payee(&mut self, row: usize, payee: Option<String>) -> ImportResult<()> {
        self.candidate_edit("categorize", row, |candidate| {
            candidate.payee_override = payee
        })
    }

    fn candidate_edit(
        &mut self,
        action: &'static str,
        row: usize,
        edit: impl FnOnce(&mut ImportCandidate),
    ) -> ImportResult<()> {
        self.require(&[ImportState::Previewed, ImportState::Categorized], action)?;
        let candidate = self
            .preview
            .as_mut()
            .and_then(|preview| preview.candidate_mut(row))
            .ok_or(ImportError::RowOutOfRange(row))?;
        edit(candidate);
        if self.state != ImportState::Categorized {
            self.transition(ImportState::Categorized);
        }
        Ok(())
    }

    /// Write the previewed rows. A failed commit leaves the session where
    /// it was.
    pub async fn commit<S: LedgerStorage>(
        &mut self,
        ledger: &mut Ledger<S>,
        options: &CommitOptions,
    ) -> ImportResult<&CommitSummary> {
        self.commit_with_progress(ledger, options, |_| {}).await
    }

    pub async fn commit_with_progress<S, F>(
        &mut self,
        ledger: &mut Ledger<S>,
        options: &CommitOptions,
        progress: F,
    ) -> ImportResult<&CommitSummary>
    where
        S: LedgerStorage,
        F: FnMut(&CommitProgress),
    {
        self.require(&[ImportState::Previewed, ImportState::Categorized], "commit")?;
        let candidates = self
            .preview
            .as_ref()
            .map(|preview| preview.candidates.as_slice())
            .unwrap_or_default();

        let summary = self
            .importer
            .commit_with_progress(ledger, candidates, &self.target_account_id, options, progress)
            .await?;
        self.transition(ImportState::Committed);
        Ok(self.summary.insert(summary))
    }
}
