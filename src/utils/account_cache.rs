//! Explicitly owned account lookup cache

use std::collections::HashMap;

use tracing::debug;

use crate::ledger::Ledger;
use crate::traits::LedgerStorage;
use crate::types::{Account, LedgerResult};

/// Accounts keyed by id, loaded on demand from a ledger.
///
/// Nothing is shared between caches; the owner decides when entries go
/// stale and calls [`AccountCache::invalidate`] or [`AccountCache::refresh`].
#[derive(Debug, Clone, Default)]
pub struct AccountCache {
    accounts: HashMap<String, Account>,
    loaded_all: bool,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with every account in the ledger
    pub async fn refresh<S: LedgerStorage>(&mut self, ledger: &Ledger<S>) -> LedgerResult<()> {
        let accounts = ledger.list_accounts().await?;
        self.accounts = accounts
            .into_iter()
            .map(|account| (account.id.clone(), account))
            .collect();
        self.loaded_all = true;
        debug!(count = self.accounts.len(), "account cache refreshed");
        Ok(())
    }

    /// Drop one account, or everything when `account_id` is `None`
    pub fn invalidate(&mut self, account_id: Option<&str>) {
        match account_id {
            Some(id) => {
                self.accounts.remove(id);
                self.loaded_all = false;
            }
            None => {
                self.accounts.clear();
                self.loaded_all = false;
            }
        }
    }

    /// Cached account, without touching storage
    pub fn get(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    /// Cached account, loading it from the ledger on a miss
    pub async fn get_or_load<S: LedgerStorage>(
        &mut self,
        ledger: &Ledger<S>,
        account_id: &str,
    ) -> LedgerResult<Option<Account>> {
        if let Some(account) = self.accounts.get(account_id) {
            return Ok(Some(account.clone()));
        }
        if self.loaded_all {
            return Ok(None);
        }

        let loaded = ledger.get_account(account_id).await?;
        if let Some(account) = &loaded {
            self.accounts.insert(account.id.clone(), account.clone());
        }
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountKind, AccountType};
    use crate::utils::memory_storage::MemoryStorage;

    #[tokio::test]
    async fn test_refresh_and_invalidate() {
        let mut ledger = Ledger::new(MemoryStorage::new());
        ledger
            .create_account(
                "alcohol".to_string(),
                "Alcohol".to_string(),
                AccountType::Expense,
                AccountKind::Category,
                None,
            )
            .await
            .unwrap();

        let mut cache = AccountCache::new();
        assert!(cache.get("alcohol").is_none());

        cache.refresh(&ledger).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("alcohol").unwrap().name, "Alcohol");

        let mut renamed = cache.get("alcohol").unwrap().clone();
        renamed.name = "Drinks".to_string();
        ledger.update_account(&renamed).await.unwrap();
        assert_eq!(cache.get("alcohol").unwrap().name, "Alcohol");

        cache.invalidate(Some("alcohol"));
        let reloaded = cache.get_or_load(&ledger, "alcohol").await.unwrap().unwrap();
        assert_eq!(reloaded.name, "Drinks");

        cache.invalidate(None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_miss_after_full_refresh_skips_storage() {
        let ledger = Ledger::new(MemoryStorage::new());
        let mut cache = AccountCache::new();
        cache.refresh(&ledger).await.unwrap();
        assert!(cache.get_or_load(&ledger, "nope").await.unwrap().is_none());
    }
}
