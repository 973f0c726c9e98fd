//! Main ledger orchestrator that coordinates accounts and transactions

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::{AccountManager, TransactionManager};
use crate::traits::*;
use crate::types::*;

/// Main ledger system that orchestrates all bookkeeping operations
pub struct Ledger<S: LedgerStorage> {
    account_manager: AccountManager<S>,
    transaction_manager: TransactionManager<S>,
}

impl<S: LedgerStorage + Clone> Ledger<S> {
    /// Create a new ledger with the given storage backend
    pub fn new(storage: S) -> Self {
        Self {
            account_manager: AccountManager::new(storage.clone()),
            transaction_manager: TransactionManager::new(storage),
        }
    }

    /// Create a new ledger with custom validators
    pub fn with_validators(
        storage: S,
        account_validator: Box<dyn AccountValidator>,
        transaction_validator: Box<dyn TransactionValidator>,
    ) -> Self {
        Self {
            account_manager: AccountManager::with_validator(storage.clone(), account_validator),
            transaction_manager: TransactionManager::with_validator(storage, transaction_validator),
        }
    }
}

impl<S: LedgerStorage> Ledger<S> {
    // Account operations
    /// Create a new account
    pub async fn create_account(
        &mut self,
        id: String,
        name: String,
        account_type: AccountType,
        kind: AccountKind,
        parent_id: Option<String>,
    ) -> LedgerResult<Account> {
        self.account_manager
            .add_account(Account::new(id, name, account_type, kind, parent_id))
            .await
    }

    /// Persist a fully configured account (subtype, business flag, ...)
    pub async fn add_account(&mut self, account: Account) -> LedgerResult<Account> {
        self.account_manager.add_account(account).await
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.account_manager.get_account(account_id).await
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.account_manager.list_accounts(None).await
    }

    /// List accounts by type
    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.account_manager
            .list_accounts(Some(account_type))
            .await
    }

    /// Update an account
    pub async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.account_manager.update_account(account).await
    }

    /// Archive or unarchive an account
    pub async fn set_account_archived(
        &mut self,
        account_id: &str,
        archived: bool,
    ) -> LedgerResult<()> {
        self.account_manager.set_archived(account_id, archived).await
    }

    /// Delete an account
    pub async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()> {
        self.account_manager.delete_account(account_id).await
    }

    /// Direct children of a category
    pub async fn get_child_accounts(&self, parent_id: &str) -> LedgerResult<Vec<Account>> {
        self.account_manager.get_child_accounts(parent_id).await
    }

    /// Root-to-leaf path of an account
    pub async fn get_account_path(&self, account_id: &str) -> LedgerResult<Vec<Account>> {
        self.account_manager.get_account_path(account_id).await
    }

    // Transaction operations
    /// Create a transaction from its parts with a generated id
    pub async fn create_transaction(
        &mut self,
        date: NaiveDate,
        payee: String,
        memo: String,
        postings: Vec<Posting>,
    ) -> LedgerResult<Transaction> {
        let mut transaction =
            Transaction::new(uuid::Uuid::new_v4().to_string(), date, payee, memo);
        for posting in postings {
            transaction.add_posting(posting);
        }
        self.record_transaction(transaction).await
    }

    /// Record a fully built transaction
    pub async fn record_transaction(
        &mut self,
        transaction: Transaction,
    ) -> LedgerResult<Transaction> {
        self.transaction_manager
            .record_transaction(transaction)
            .await
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        self.transaction_manager
            .get_transaction(transaction_id)
            .await
    }

    /// Get transactions for a specific account
    pub async fn get_account_transactions(
        &self,
        account_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        self.transaction_manager
            .get_account_transactions(account_id, start_date, end_date)
            .await
    }

    /// Get all transactions within a date range
    pub async fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        self.transaction_manager
            .get_transactions(start_date, end_date)
            .await
    }

    /// Transactions in an account carrying the given external id
    pub async fn find_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> LedgerResult<Vec<Transaction>> {
        self.transaction_manager
            .find_by_external_id(account_id, external_id)
            .await
    }

    /// Change the clearing status of a transaction
    pub async fn set_transaction_status(
        &mut self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> LedgerResult<()> {
        self.transaction_manager
            .set_status(transaction_id, status)
            .await
    }

    /// Delete a transaction and all of its postings
    pub async fn delete_transaction(&mut self, transaction_id: &str) -> LedgerResult<()> {
        self.transaction_manager
            .delete_transaction(transaction_id)
            .await
    }

    // Balance operations
    /// Raw (debit-positive) sum of postings for an account up to a date
    pub async fn get_balance(
        &self,
        account_id: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        self.account_manager
            .get_balance(account_id, as_of_date)
            .await
    }

    /// Balance flipped onto the account's normal side, for display
    pub async fn get_normal_balance(
        &self,
        account_id: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        let account = self.account_manager.get_account_required(account_id).await?;
        let raw = self.get_balance(account_id, as_of_date).await?;
        Ok(account.normal_balance_of(&raw))
    }

    /// Account register with running balances, ordered by date and then
    /// insertion order
    pub async fn running_balances(
        &self,
        account_id: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<RegisterLine>> {
        self.account_manager.get_account_required(account_id).await?;
        let mut transactions = self
            .get_account_transactions(account_id, None, as_of_date)
            .await?;
        transactions.sort_by_key(|txn| (txn.date, txn.sequence));

        let mut balance = BigDecimal::from(0);
        Ok(transactions
            .into_iter()
            .map(|txn| {
                let amount = txn.amount_for(account_id);
                balance += &amount;
                RegisterLine {
                    transaction_id: txn.id,
                    date: txn.date,
                    payee: txn.payee,
                    status: txn.status,
                    amount,
                    balance: balance.clone(),
                }
            })
            .collect())
    }

    /// Re-check every stored transaction against the double-entry invariants
    pub async fn validate_integrity(
        &self,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<LedgerIntegrityReport> {
        let transactions = self.get_transactions(None, as_of_date).await?;

        let mut issues = Vec::new();
        let mut grand_total = BigDecimal::from(0);

        for transaction in &transactions {
            if let Err(e) = transaction.validate() {
                issues.push(format!("Transaction '{}': {}", transaction.id, e));
            }
            grand_total += transaction.total();
        }

        if grand_total != BigDecimal::from(0) {
            issues.push(format!(
                "Postings across the ledger sum to {}, expected 0",
                grand_total
            ));
        }

        Ok(LedgerIntegrityReport {
            as_of_date,
            is_valid: issues.is_empty(),
            issues,
            transactions_checked: transactions.len(),
            grand_total,
        })
    }
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub as_of_date: Option<NaiveDate>,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub transactions_checked: usize,
    pub grand_total: BigDecimal,
}
