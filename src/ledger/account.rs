//! Account management functionality

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::debug;

use crate::traits::*;
use crate::types::*;

/// Account manager for handling chart of accounts operations
pub struct AccountManager<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    /// Create a new account manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Persist a fully configured account
    pub async fn add_account(&mut self, account: Account) -> LedgerResult<Account> {
        self.validator.validate_account(&account)?;

        if self.storage.get_account(&account.id).await?.is_some() {
            return Err(LedgerError::DuplicateId(account.id.clone()));
        }

        if let Some(ref parent_id) = account.parent_id {
            if self.storage.get_account(parent_id).await?.is_none() {
                return Err(LedgerError::Validation(format!(
                    "Parent account '{}' does not exist",
                    parent_id
                )));
            }
        }

        self.storage.save_account(&account).await?;
        debug!(account_id = %account.id, kind = %account.kind, "created account");

        Ok(account)
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account(account_id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_account_required(&self, account_id: &str) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    /// List accounts, optionally filtered by type
    pub async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(account_type).await
    }

    /// Update an account. The account kind cannot change.
    pub async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let existing = self.get_account_required(&account.id).await?;
        self.validator.validate_account_update(&existing, account)?;

        let mut updated = account.clone();
        updated.created_at = existing.created_at;
        updated.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_account(&updated).await
    }

    /// Archive or unarchive an account
    pub async fn set_archived(&mut self, account_id: &str, archived: bool) -> LedgerResult<()> {
        let mut account = self.get_account_required(account_id).await?;
        account.archived = archived;
        self.update_account(&account).await
    }

    /// Delete an account. Postings referencing it are kept.
    pub async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()> {
        self.get_account_required(account_id).await?;
        self.storage.delete_account(account_id).await
    }

    /// Raw balance of an account as of a date
    pub async fn get_balance(
        &self,
        account_id: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        self.get_account_required(account_id).await?;
        self.storage
            .get_account_balance(account_id, as_of_date)
            .await
    }

    /// Direct children of a category
    pub async fn get_child_accounts(&self, parent_id: &str) -> LedgerResult<Vec<Account>> {
        let all_accounts = self.list_accounts(None).await?;
        Ok(all_accounts
            .into_iter()
            .filter(|account| account.parent_id.as_deref() == Some(parent_id))
            .collect())
    }

    /// Path from the root category down to the account
    pub async fn get_account_path(&self, account_id: &str) -> LedgerResult<Vec<Account>> {
        let mut path: Vec<Account> = Vec::new();
        let mut current_account_id = Some(account_id.to_string());

        while let Some(id) = current_account_id {
            if path.iter().any(|a| a.id == id) {
                return Err(LedgerError::Validation(format!(
                    "Account hierarchy cycle at '{}'",
                    id
                )));
            }
            let account = self.get_account_required(&id).await?;
            current_account_id = account.parent_id.clone();
            path.insert(0, account);
        }

        Ok(path)
    }
}
