//! Import fingerprints and duplicate detection
//!
//! A fingerprint is the functional identity of an imported row. It is stored
//! as the transaction's external id, so re-importing an overlapping statement
//! finds the rows already recorded. When a bank re-renders a row slightly
//! differently the detector falls back to an exact amount match inside a
//! small date window. Missing a duplicate is preferred to skipping a real
//! transaction, so the amount never gets a fuzzy match.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ImportSettings;
use crate::types::Transaction;

/// Amounts closer than this are the same amount
pub fn amount_epsilon() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// Whether two amounts are equal to the cent
pub fn amounts_match(a: &BigDecimal, b: &BigDecimal) -> bool {
    (a - b).abs() < amount_epsilon()
}

/// Lower-case and collapse runs of whitespace
pub fn normalize_payee(payee: &str) -> String {
    payee
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deterministic identity of a statement row
pub fn fingerprint(
    date: NaiveDate,
    amount: &BigDecimal,
    payee: &str,
    reference: Option<&str>,
    payee_chars: usize,
) -> String {
    let payee: String = normalize_payee(payee).chars().take(payee_chars).collect();
    let cents = amount.round(2).with_scale(2);

    let mut hasher = Sha256::new();
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(cents.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(payee.as_bytes());
    hasher.update(b"|");
    if let Some(reference) = reference {
        hasher.update(reference.trim().as_bytes());
    }
    format!("imp-{}", hex::encode(hasher.finalize()))
}

/// What the detector needs to know about an already recorded transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingEntry {
    pub transaction_id: String,
    pub date: NaiveDate,
    /// Net movement of the account being imported into
    pub amount: BigDecimal,
    pub external_id: Option<String>,
}

impl ExistingEntry {
    /// Project a transaction onto one account
    pub fn from_transaction(transaction: &Transaction, account_id: &str) -> Self {
        Self {
            transaction_id: transaction.id.clone(),
            date: transaction.date,
            amount: transaction.amount_for(account_id),
            external_id: transaction.external_id.clone(),
        }
    }
}

/// Why a row was judged a duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Stored external id equals the row's fingerprint
    ExternalId,
    /// Same amount, date inside the tolerance window
    AmountAndDate,
}

/// The recorded transaction a row duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub transaction_id: String,
    pub reason: DuplicateReason,
}

/// Checks statement rows against an account's recorded transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateDetector {
    date_tolerance_days: u32,
}

impl DuplicateDetector {
    pub fn new(date_tolerance_days: u32) -> Self {
        Self {
            date_tolerance_days,
        }
    }

    pub fn from_settings(settings: &ImportSettings) -> Self {
        Self::new(settings.date_tolerance_days)
    }

    pub fn date_tolerance_days(&self) -> u32 {
        self.date_tolerance_days
    }

    /// Find the recorded transaction this row duplicates, if any.
    /// An external-id hit anywhere beats an amount/date hit.
    pub fn find_duplicate(
        &self,
        fingerprint: &str,
        date: NaiveDate,
        amount: &BigDecimal,
        existing: &[ExistingEntry],
    ) -> Option<DuplicateMatch> {
        if let Some(hit) = existing
            .iter()
            .find(|e| e.external_id.as_deref() == Some(fingerprint))
        {
            return Some(DuplicateMatch {
                transaction_id: hit.transaction_id.clone(),
                reason: DuplicateReason::ExternalId,
            });
        }

        let tolerance = i64::from(self.date_tolerance_days);
        existing
            .iter()
            .find(|e| {
                (e.date - date).num_days().abs() <= tolerance && amounts_match(&e.amount, amount)
            })
            .map(|hit| DuplicateMatch {
                transaction_id: hit.transaction_id.clone(),
                reason: DuplicateReason::AmountAndDate,
            })
    }

    pub fn is_duplicate(
        &self,
        fingerprint: &str,
        date: NaiveDate,
        amount: &BigDecimal,
        existing: &[ExistingEntry],
    ) -> bool {
        self.find_duplicate(fingerprint, date, amount, existing)
            .is_some()
    }

    /// Date range of recorded transactions worth loading for these rows
    pub fn lookup_window(
        &self,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = dates.into_iter();
        let first = dates.next()?;
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        let pad = chrono::Days::new(u64::from(self.date_tolerance_days));
        Some((
            min.checked_sub_days(pad).unwrap_or(min),
            max.checked_add_days(pad).unwrap_or(max),
        ))
    }
}
