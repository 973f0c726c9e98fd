//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::*;

/// Storage abstraction for the ledger system
///
/// This trait allows the ledger to work with any storage backend
/// (SQLite, embedded KV, flat files, in-memory) by implementing these methods.
/// The one hard requirement is that `insert_transaction` and
/// `delete_transaction` are atomic: a transaction and all of its postings
/// become visible together or not at all.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Save a new account to storage
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Get an account by ID
    async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>>;

    /// List all accounts, optionally filtered by type
    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>>;

    /// Update an account
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Delete an account. Postings that reference it are left untouched.
    async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()>;

    /// Atomically persist a transaction with all of its postings.
    ///
    /// Returns the stored copy with its insertion `sequence` assigned.
    async fn insert_transaction(&mut self, transaction: Transaction) -> LedgerResult<Transaction>;

    /// Get a transaction by ID
    async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>>;

    /// Transactions touching an account whose external id equals `external_id`
    async fn find_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> LedgerResult<Vec<Transaction>>;

    /// Transactions touching an account within an inclusive date range,
    /// in insertion order
    async fn get_account_transactions(
        &self,
        account_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>>;

    /// All transactions within an inclusive date range, in insertion order
    async fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>>;

    /// Change only the clearing status of a transaction
    async fn set_transaction_status(
        &mut self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> LedgerResult<()>;

    /// Atomically delete a transaction and all of its postings
    async fn delete_transaction(&mut self, transaction_id: &str) -> LedgerResult<()>;

    /// Raw (debit-positive) balance of an account as of a date.
    ///
    /// Backends with an index on postings should override this.
    async fn get_account_balance(
        &self,
        account_id: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        let transactions = self
            .get_account_transactions(account_id, None, as_of_date)
            .await?;
        Ok(transactions
            .iter()
            .map(|txn| txn.amount_for(account_id))
            .sum())
    }
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;

    /// Validate a change to an existing account
    fn validate_account_update(&self, existing: &Account, updated: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom transaction validation rules
pub trait TransactionValidator: Send + Sync {
    /// Validate a transaction before saving
    fn validate_transaction(&self, transaction: &Transaction) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.id.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account ID cannot be empty".to_string(),
            ));
        }

        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_account_update(&self, existing: &Account, updated: &Account) -> LedgerResult<()> {
        // Historical postings were recorded under the old kind
        if existing.kind != updated.kind {
            return Err(LedgerError::ImmutableAccountKind {
                account_id: existing.id.clone(),
                from: existing.kind,
                to: updated.kind,
            });
        }

        self.validate_account(updated)
    }
}

/// Default transaction validator with the double-entry rules
pub struct DefaultTransactionValidator;

impl TransactionValidator for DefaultTransactionValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> LedgerResult<()> {
        transaction.validate()
    }
}
