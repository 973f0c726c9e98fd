//! Statement reconciliation
//!
//! Aligns an externally supplied list of statement lines with the
//! unreconciled postings of one account, then lets the caller mark the
//! matched transactions as reconciled.

pub mod matcher;

use std::collections::BTreeSet;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ReconciliationSettings;
use crate::ledger::Ledger;
use crate::traits::LedgerStorage;
use crate::types::*;

pub use matcher::ReconciliationEngine;

/// One line of a bank statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    pub date: NaiveDate,
    pub payee: String,
    pub amount: BigDecimal,
    /// Balance printed after this line, when the statement has one
    pub running_balance: Option<BigDecimal>,
}

/// A posting of the account being reconciled whose transaction is not yet
/// reconciled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreconciledPosting {
    pub transaction_id: String,
    pub posting_id: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub payee: String,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledPair {
    /// Position of the statement line in the supplied list
    pub line_index: usize,
    pub transaction_id: String,
    pub posting_id: String,
    /// Days the posting is dated before the statement line
    pub days_early: u32,
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Ordered by statement line
    pub matches: Vec<ReconciledPair>,
    pub unmatched_lines: Vec<usize>,
    pub unmatched_postings: Vec<UnreconciledPosting>,
    /// Running balance of the latest dated statement line that has one
    pub statement_closing_balance: Option<BigDecimal>,
    /// Raw ledger balance as of that line's date
    pub ledger_balance: Option<BigDecimal>,
    /// Statement closing balance minus ledger balance
    pub difference: Option<BigDecimal>,
}

impl ReconciliationReport {
    pub fn is_fully_matched(&self) -> bool {
        self.unmatched_lines.is_empty() && self.unmatched_postings.is_empty()
    }

    /// True when there is no closing balance to compare, or it agrees
    pub fn is_balanced(&self) -> bool {
        self.difference
            .as_ref()
            .is_none_or(|difference| difference.abs() < crate::dedup::amount_epsilon())
    }

    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} matched, {} statement lines unmatched, {} postings unmatched",
            self.matches.len(),
            self.unmatched_lines.len(),
            self.unmatched_postings.len()
        );
        if let Some(difference) = &self.difference {
            text.push_str(&format!(", balance difference {}", difference));
        }
        text
    }
}

impl<S: LedgerStorage> Ledger<S> {
    /// Postings of `account_id` in transactions not yet reconciled, ordered
    /// by date and then insertion order
    pub async fn unreconciled_postings(
        &self,
        account_id: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<UnreconciledPosting>> {
        if self.get_account(account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id.to_string()));
        }

        let mut transactions = self
            .get_account_transactions(account_id, None, as_of_date)
            .await?;
        transactions.retain(|txn| txn.status != TransactionStatus::Reconciled);
        transactions.sort_by_key(|txn| (txn.date, txn.sequence));

        Ok(transactions
            .iter()
            .flat_map(|txn| {
                txn.postings
                    .iter()
                    .filter(|posting| posting.account_id == account_id)
                    .map(|posting| UnreconciledPosting {
                        transaction_id: txn.id.clone(),
                        posting_id: posting.id.clone(),
                        date: txn.date,
                        amount: posting.amount.clone(),
                        payee: txn.payee.clone(),
                        sequence: txn.sequence,
                    })
            })
            .collect())
    }

    /// Match a statement against the account and compare closing balances
    pub async fn reconcile_account(
        &self,
        account_id: &str,
        lines: &[StatementLine],
        settings: &ReconciliationSettings,
    ) -> LedgerResult<ReconciliationReport> {
        let last_date = lines.iter().map(|line| line.date).max();
        let postings = self.unreconciled_postings(account_id, last_date).await?;

        let mut report = ReconciliationEngine::new(settings.clone()).reconcile(lines, &postings);

        // Latest dated line with a balance; on equal dates the later line wins
        let closing = lines
            .iter()
            .filter_map(|line| line.running_balance.clone().map(|balance| (line.date, balance)))
            .enumerate()
            .max_by_key(|(index, (date, _))| (*date, *index))
            .map(|(_, closing)| closing);
        if let Some((closing_date, closing)) = closing {
            let ledger_balance = self.get_balance(account_id, Some(closing_date)).await?;
            report.difference = Some(&closing - &ledger_balance);
            report.statement_closing_balance = Some(closing);
            report.ledger_balance = Some(ledger_balance);
        }

        info!(
            account_id,
            matched = report.matches.len(),
            unmatched_lines = report.unmatched_lines.len(),
            unmatched_postings = report.unmatched_postings.len(),
            difference = ?report.difference,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Move every matched transaction to `reconciled`; returns how many
    /// transactions changed
    pub async fn mark_reconciled(&mut self, report: &ReconciliationReport) -> LedgerResult<usize> {
        let ids: BTreeSet<&str> = report
            .matches
            .iter()
            .map(|pair| pair.transaction_id.as_str())
            .collect();
        for id in &ids {
            self.set_transaction_status(id, TransactionStatus::Reconciled)
                .await?;
        }
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchStrategy;
    use crate::utils::memory_storage::MemoryStorage;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    async fn ledger() -> Ledger<MemoryStorage> {
        let mut ledger = Ledger::new(MemoryStorage::new());
        ledger
            .create_account(
                "bank".to_string(),
                "Bank".to_string(),
                AccountType::Asset,
                AccountKind::Transfer,
                None,
            )
            .await
            .unwrap();
        ledger
            .create_account(
                "rent".to_string(),
                "Rent".to_string(),
                AccountType::Expense,
                AccountKind::Category,
                None,
            )
            .await
            .unwrap();
        ledger
    }

    async fn spend(ledger: &mut Ledger<MemoryStorage>, d: u32, amount: &str) -> Transaction {
        ledger
            .create_transaction(
                date(d),
                "Landlord".to_string(),
                String::new(),
                vec![
                    Posting::new("bank".to_string(), dec(amount)),
                    Posting::new("rent".to_string(), -dec(amount)),
                ],
            )
            .await
            .unwrap()
    }

    fn line(d: u32, amount: &str, balance: Option<&str>) -> StatementLine {
        StatementLine {
            date: date(d),
            payee: "LANDLORD".to_string(),
            amount: dec(amount),
            running_balance: balance.map(dec),
        }
    }

    #[tokio::test]
    async fn test_reconcile_and_mark() {
        let mut ledger = ledger().await;
        let rent = spend(&mut ledger, 21, "-6500.00").await;
        spend(&mut ledger, 25, "-40.00").await;

        let lines = [line(22, "-6500.00", Some("-6500.00"))];
        let report = ledger
            .reconcile_account("bank", &lines, &ReconciliationSettings::default())
            .await
            .unwrap();

        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].transaction_id, rent.id);
        // Postings after the last statement date are not candidates
        assert!(report.unmatched_postings.is_empty());
        assert_eq!(report.ledger_balance, Some(dec("-6500.00")));
        assert!(report.is_balanced());

        assert_eq!(ledger.mark_reconciled(&report).await.unwrap(), 1);
        let stored = ledger.get_transaction(&rent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Reconciled);

        let again = ledger
            .reconcile_account("bank", &lines, &ReconciliationSettings::default())
            .await
            .unwrap();
        assert!(again.matches.is_empty());
        assert_eq!(again.unmatched_lines, vec![0]);
    }

    #[tokio::test]
    async fn test_balance_difference_reported() {
        let mut ledger = ledger().await;
        spend(&mut ledger, 21, "-100.00").await;

        let lines = [
            line(21, "-100.00", Some("-100.00")),
            line(22, "-5.00", Some("-105.00")),
        ];
        let settings = ReconciliationSettings {
            strategy: MatchStrategy::PreferSameDay,
            max_days_early: 1,
        };
        let report = ledger.reconcile_account("bank", &lines, &settings).await.unwrap();

        assert_eq!(report.unmatched_lines, vec![1]);
        assert_eq!(report.statement_closing_balance, Some(dec("-105.00")));
        assert_eq!(report.difference, Some(dec("-5.00")));
        assert!(!report.is_balanced());
        assert!(report.summary().contains("balance difference"));
    }

    #[tokio::test]
    async fn test_closing_balance_taken_from_latest_line() {
        let mut ledger = ledger().await;
        spend(&mut ledger, 21, "-100.00").await;
        spend(&mut ledger, 23, "-20.00").await;

        // Supplied newest first, as many bank exports list them
        let lines = [
            line(23, "-20.00", Some("-120.00")),
            line(21, "-100.00", Some("-100.00")),
        ];
        let report = ledger
            .reconcile_account("bank", &lines, &ReconciliationSettings::default())
            .await
            .unwrap();

        assert_eq!(report.matches.len(), 2);
        assert_eq!(report.statement_closing_balance, Some(dec("-120.00")));
        assert_eq!(report.ledger_balance, Some(dec("-120.00")));
        assert!(report.is_balanced());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let ledger = ledger().await;
        let err = ledger.unreconciled_postings("nope", None).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }
}
