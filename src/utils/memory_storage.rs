//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    /// Keyed by insertion sequence so iteration is insertion order
    transactions: BTreeMap<u64, Transaction>,
    sequence_by_id: HashMap<String, u64>,
    next_sequence: u64,
    insert_limit: Option<usize>,
}

impl Inner {
    fn in_range(txn: &Transaction, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        if let Some(start) = start {
            if txn.date < start {
                return false;
            }
        }
        if let Some(end) = end {
            if txn.date > end {
                return false;
            }
        }
        true
    }
}

/// In-memory storage implementation for testing and development
///
/// All state sits behind one lock, so every write is atomic with respect to
/// readers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        let mut inner = self.write()?;
        let limit = inner.insert_limit;
        *inner = Inner {
            insert_limit: limit,
            ..Inner::default()
        };
        Ok(())
    }

    /// Refuse new transactions once `limit` are stored, simulating a full
    /// or failing backend
    pub fn set_insert_limit(&self, limit: Option<usize>) -> LedgerResult<()> {
        self.write()?.insert_limit = limit;
        Ok(())
    }

    /// Number of stored transactions
    pub fn transaction_count(&self) -> LedgerResult<usize> {
        Ok(self.read()?.transactions.len())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        let mut inner = self.write()?;
        if inner.accounts.contains_key(&account.id) {
            return Err(LedgerError::DuplicateId(account.id.clone()));
        }
        inner.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        Ok(self.read()?.accounts.get(account_id).cloned())
    }

    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        let inner = self.read()?;
        let mut filtered: Vec<Account> = inner
            .accounts
            .values()
            .filter(|account| account_type.is_none_or(|t| account.account_type == t))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(filtered)
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let mut inner = self.write()?;
        match inner.accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(LedgerError::AccountNotFound(account.id.clone())),
        }
    }

    async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()> {
        if self.write()?.accounts.remove(account_id).is_some() {
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(account_id.to_string()))
        }
    }

    async fn insert_transaction(
        &mut self,
        mut transaction: Transaction,
    ) -> LedgerResult<Transaction> {
        let mut inner = self.write()?;

        if inner.sequence_by_id.contains_key(&transaction.id) {
            return Err(LedgerError::DuplicateId(transaction.id.clone()));
        }
        if let Some(limit) = inner.insert_limit {
            if inner.transactions.len() >= limit {
                return Err(LedgerError::Storage(format!(
                    "transaction limit of {} reached",
                    limit
                )));
            }
        }

        inner.next_sequence += 1;
        let sequence = inner.next_sequence;
        transaction.sequence = sequence;
        for posting in &mut transaction.postings {
            posting.transaction_id = transaction.id.clone();
        }

        inner
            .sequence_by_id
            .insert(transaction.id.clone(), sequence);
        inner.transactions.insert(sequence, transaction.clone());
        Ok(transaction)
    }

    async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        let inner = self.read()?;
        Ok(inner
            .sequence_by_id
            .get(transaction_id)
            .and_then(|seq| inner.transactions.get(seq))
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> LedgerResult<Vec<Transaction>> {
        let inner = self.read()?;
        Ok(inner
            .transactions
            .values()
            .filter(|txn| {
                txn.external_id.as_deref() == Some(external_id) && txn.touches(account_id)
            })
            .cloned()
            .collect())
    }

    async fn get_account_transactions(
        &self,
        account_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        let inner = self.read()?;
        Ok(inner
            .transactions
            .values()
            .filter(|txn| txn.touches(account_id) && Inner::in_range(txn, start_date, end_date))
            .cloned()
            .collect())
    }

    async fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        let inner = self.read()?;
        Ok(inner
            .transactions
            .values()
            .filter(|txn| Inner::in_range(txn, start_date, end_date))
            .cloned()
            .collect())
    }

    async fn set_transaction_status(
        &mut self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> LedgerResult<()> {
        let mut inner = self.write()?;
        let sequence = *inner
            .sequence_by_id
            .get(transaction_id)
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;
        if let Some(txn) = inner.transactions.get_mut(&sequence) {
            txn.status = status;
            txn.updated_at = chrono::Utc::now().naive_utc();
        }
        Ok(())
    }

    async fn delete_transaction(&mut self, transaction_id: &str) -> LedgerResult<()> {
        let mut inner = self.write()?;
        match inner.sequence_by_id.remove(transaction_id) {
            Some(sequence) => {
                inner.transactions.remove(&sequence);
                Ok(())
            }
            None => Err(LedgerError::TransactionNotFound(transaction_id.to_string())),
        }
    }
}
