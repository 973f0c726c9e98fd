//! Import pipeline: parse, detect duplicates, match rules, commit

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::{CommitOptions, CommitProgress, CommitSummary, ImportCandidate, ImportPreview, RowFailure};
use crate::config::{CommitMode, ImportSettings};
use crate::dedup::{fingerprint, DuplicateDetector, ExistingEntry};
use crate::ledger::transaction::{patterns, CategorizedEntryParams};
use crate::ledger::Ledger;
use crate::rules::RuleSet;
use crate::statement::{ColumnMapping, ParsedRow, StatementParser};
use crate::traits::LedgerStorage;
use crate::types::*;
use crate::utils::account_cache::AccountCache;

/// What commit will do with one candidate
enum Planned {
    Write(Transaction),
    Duplicate,
    Uncategorized,
    Failed(String),
}

/// Stateless import service over a ledger
#[derive(Debug, Clone, Default)]
pub struct Importer {
    settings: ImportSettings,
}

impl Importer {
    pub fn new(settings: ImportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn detector(&self) -> DuplicateDetector {
        DuplicateDetector::from_settings(&self.settings)
    }

    /// Parse and annotate every row of a statement. Writes nothing.
    pub async fn preview<S: LedgerStorage>(
        &self,
        ledger: &Ledger<S>,
        raw_text: &str,
        mapping: &ColumnMapping,
        target_account_id: &str,
        rules: &RuleSet,
    ) -> ImportResult<ImportPreview> {
        validate_target(ledger, target_account_id).await?;
        let parser = StatementParser::new(mapping.clone(), &self.settings)?;

        let mut rows = Vec::new();
        let mut parse_errors = Vec::new();
        for result in parser.rows(raw_text)? {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => {
                    debug!(row = e.row, field = ?e.field, error = %e.message, "statement row rejected");
                    parse_errors.push(e);
                }
            }
        }

        let detector = self.detector();
        let existing = self
            .existing_entries(ledger, target_account_id, rows.iter().map(|r| r.date))
            .await?;

        let candidates: Vec<ImportCandidate> = rows
            .into_iter()
            .map(|row| self.annotate(row, &detector, &existing, rules))
            .collect();
        let duplicate_count = candidates.iter().filter(|c| c.is_duplicate).count();

        info!(
            account_id = target_account_id,
            rows = candidates.len(),
            parse_errors = parse_errors.len(),
            duplicates = duplicate_count,
            "import preview ready"
        );

        Ok(ImportPreview {
            candidates,
            parse_errors,
            duplicate_count,
        })
    }

    fn annotate(
        &self,
        row: ParsedRow,
        detector: &DuplicateDetector,
        existing: &[ExistingEntry],
        rules: &RuleSet,
    ) -> ImportCandidate {
        let fingerprint = fingerprint(
            row.date,
            &row.amount,
            &row.payee,
            row.reference.as_deref(),
            self.settings.payee_fingerprint_chars,
        );
        let duplicate_of = detector.find_duplicate(&fingerprint, row.date, &row.amount, existing);
        let rule = rules.match_rule(&row.payee);

        ImportCandidate {
            is_duplicate: duplicate_of.is_some(),
            duplicate_of,
            matched_rule_id: rule.map(|r| r.id.clone()),
            suggested_category_id: rule.and_then(|r| r.default_account_id.clone()),
            suggested_payee: rule.and_then(|r| r.default_payee.clone()),
            category_override: None,
            payee_override: None,
            fingerprint,
            row,
        }
    }

    /// Recorded transactions of the account around the given dates
    async fn existing_entries<S: LedgerStorage>(
        &self,
        ledger: &Ledger<S>,
        account_id: &str,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> ImportResult<Vec<ExistingEntry>> {
        let Some((start, end)) = self.detector().lookup_window(dates) else {
            return Ok(Vec::new());
        };
        let transactions = ledger
            .get_account_transactions(account_id, Some(start), Some(end))
            .await?;
        Ok(transactions
            .iter()
            .map(|txn| ExistingEntry::from_transaction(txn, account_id))
            .collect())
    }

    /// Write the kept candidates as balanced transactions
    pub async fn commit<S: LedgerStorage>(
        &self,
        ledger: &mut Ledger<S>,
        candidates: &[ImportCandidate],
        target_account_id: &str,
        options: &CommitOptions,
    ) -> ImportResult<CommitSummary> {
        self.commit_with_progress(ledger, candidates, target_account_id, options, |_| {})
            .await
    }

    /// Like [`Importer::commit`], reporting running counts after every row
    pub async fn commit_with_progress<S, F>(
        &self,
        ledger: &mut Ledger<S>,
        candidates: &[ImportCandidate],
        target_account_id: &str,
        options: &CommitOptions,
        mut progress: F,
    ) -> ImportResult<CommitSummary>
    where
        S: LedgerStorage,
        F: FnMut(&CommitProgress),
    {
        validate_target(ledger, target_account_id).await?;

        let mut accounts = AccountCache::new();
        accounts.refresh(ledger).await?;

        // Taken once so rows of this batch never shadow each other
        let snapshot = self
            .existing_entries(ledger, target_account_id, candidates.iter().map(|c| c.row.date))
            .await?;
        let detector = self.detector();

        let plan: Vec<(usize, Planned)> = candidates
            .iter()
            .map(|candidate| {
                let planned = plan_row(
                    candidate,
                    target_account_id,
                    options,
                    &detector,
                    &snapshot,
                    &accounts,
                );
                (candidate.row.row, planned)
            })
            .collect();

        let summary = match options.mode {
            CommitMode::BestEffort => write_best_effort(ledger, plan, &mut progress).await,
            CommitMode::AllOrNothing => write_all_or_nothing(ledger, plan, &mut progress).await,
        };

        info!(
            account_id = target_account_id,
            mode = ?options.mode,
            imported = summary.imported,
            skipped = summary.skipped,
            duplicates = summary.duplicates,
            errors = summary.errors.len(),
            "import committed"
        );
        Ok(summary)
    }
}

/// The account must exist, hold real money, and be open
pub(crate) async fn validate_target<S: LedgerStorage>(
    ledger: &Ledger<S>,
    account_id: &str,
) -> ImportResult<Account> {
    let invalid = |reason: &str| ImportError::InvalidTargetAccount {
        account_id: account_id.to_string(),
        reason: reason.to_string(),
    };

    let account = ledger
        .get_account(account_id)
        .await?
        .ok_or_else(|| invalid("account does not exist"))?;
    if account.kind != AccountKind::Transfer {
        return Err(invalid("not a money account"));
    }
    if account.archived {
        return Err(invalid("account is archived"));
    }
    Ok(account)
}

fn plan_row(
    candidate: &ImportCandidate,
    target_account_id: &str,
    options: &CommitOptions,
    detector: &DuplicateDetector,
    snapshot: &[ExistingEntry],
    accounts: &AccountCache,
) -> Planned {
    let row = &candidate.row;
    if options.skip_duplicates
        && (candidate.is_duplicate
            || detector.is_duplicate(&candidate.fingerprint, row.date, &row.amount, snapshot))
    {
        return Planned::Duplicate;
    }

    let Some(category_id) = candidate.resolved_category(options.apply_rules) else {
        return Planned::Uncategorized;
    };
    let Some(category) = accounts.get(category_id) else {
        return Planned::Failed(LedgerError::AccountNotFound(category_id.to_string()).to_string());
    };
    if category.id == target_account_id {
        return Planned::Failed(format!(
            "Category '{}' is the account being imported into",
            category.id
        ));
    }
    if category.archived {
        return Planned::Failed(format!("Category '{}' is archived", category.id));
    }

    let built = patterns::categorized_entry(CategorizedEntryParams {
        id: uuid::Uuid::new_v4().to_string(),
        date: row.date,
        payee: candidate.resolved_payee(options.apply_rules).to_string(),
        memo: row.memo.clone(),
        target_account_id: target_account_id.to_string(),
        category_account_id: category.id.clone(),
        amount: row.amount.clone(),
        external_id: Some(candidate.fingerprint.clone()),
        is_business: Some(category.is_business_default),
    });

    match built {
        Ok(mut transaction) => {
            transaction
                .metadata
                .insert("import_row".to_string(), row.row.to_string());
            Planned::Write(transaction)
        }
        Err(e) => Planned::Failed(e.to_string()),
    }
}

/// Every row is its own atomic unit; failures are counted and skipped
async fn write_best_effort<S, F>(
    ledger: &mut Ledger<S>,
    plan: Vec<(usize, Planned)>,
    progress: &mut F,
) -> CommitSummary
where
    S: LedgerStorage,
    F: FnMut(&CommitProgress),
{
    let total = plan.len();
    let mut summary = CommitSummary::default();

    for (row, planned) in plan {
        match planned {
            Planned::Duplicate => summary.duplicates += 1,
            Planned::Uncategorized => summary.skipped += 1,
            Planned::Failed(message) => {
                warn!(row, error = %message, "import row rejected");
                summary.errors.push(RowFailure { row, message });
            }
            Planned::Write(transaction) => match ledger.record_transaction(transaction).await {
                Ok(saved) => {
                    summary.imported += 1;
                    summary.transaction_ids.push(saved.id);
                }
                Err(e) => {
                    warn!(row, error = %e, "import row failed");
                    summary.errors.push(RowFailure {
                        row,
                        message: e.to_string(),
                    });
                }
            },
        }
        progress(&CommitProgress::of(&summary, total));
    }

    summary
}

/// Any invalid row rejects the batch before a write; a write failure deletes
/// what was already written
async fn write_all_or_nothing<S, F>(
    ledger: &mut Ledger<S>,
    plan: Vec<(usize, Planned)>,
    progress: &mut F,
) -> CommitSummary
where
    S: LedgerStorage,
    F: FnMut(&CommitProgress),
{
    let total = plan.len();
    let mut summary = CommitSummary::default();
    let mut aborted_at = plan.iter().find_map(|(row, planned)| match planned {
        Planned::Failed(_) => Some(*row),
        _ => None,
    });

    let mut written: Vec<(usize, String)> = Vec::new();
    let mut not_written: Vec<usize> = Vec::new();
    let mut errors: Vec<RowFailure> = Vec::new();

    for (index, (row, planned)) in plan.into_iter().enumerate() {
        match planned {
            Planned::Duplicate => summary.duplicates += 1,
            Planned::Uncategorized => summary.skipped += 1,
            Planned::Failed(message) => errors.push(RowFailure { row, message }),
            Planned::Write(_) if aborted_at.is_some() => not_written.push(row),
            Planned::Write(transaction) => match ledger.record_transaction(transaction).await {
                Ok(saved) => written.push((row, saved.id)),
                Err(e) => {
                    errors.push(RowFailure {
                        row,
                        message: e.to_string(),
                    });
                    aborted_at = Some(row);
                }
            },
        }
        progress(&CommitProgress {
            processed: index + 1,
            total,
            imported: written.len(),
            skipped: summary.skipped,
            duplicates: summary.duplicates,
            errors: errors.len(),
        });
    }

    let Some(aborted_at) = aborted_at else {
        summary.imported = written.len();
        summary.transaction_ids = written.into_iter().map(|(_, id)| id).collect();
        return summary;
    };

    warn!(
        row = aborted_at,
        rolling_back = written.len(),
        "import batch aborted"
    );
    for (row, id) in written.into_iter().rev() {
        match ledger.delete_transaction(&id).await {
            Ok(()) => errors.push(RowFailure {
                row,
                message: format!("Rolled back because row {} failed", aborted_at),
            }),
            Err(e) => {
                // Still stored, so it is reported as imported
                warn!(row, transaction_id = %id, error = %e, "rollback failed");
                summary.imported += 1;
                summary.transaction_ids.push(id);
            }
        }
    }
    errors.extend(not_written.into_iter().map(|row| RowFailure {
        row,
        message: format!("Not imported because row {} failed", aborted_at),
    }));
    errors.sort_by_key(|failure| failure.row);
    summary.transaction_ids.reverse();
    summary.errors = errors;
    summary
}
