//! Transaction processing and management

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::debug;

use crate::traits::*;
use crate::types::*;

/// Parameters for a two-posting transaction between a money account and a
/// category
pub struct CategorizedEntryParams {
    pub id: String,
    pub date: NaiveDate,
    pub payee: String,
    pub memo: String,
    /// Money account the amount lands in
    pub target_account_id: String,
    pub category_account_id: String,
    /// Signed movement of the target account
    pub amount: BigDecimal,
    pub external_id: Option<String>,
    pub is_business: Option<bool>,
}

/// Transaction manager for handling transaction operations
pub struct TransactionManager<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn TransactionValidator>,
}

impl<S: LedgerStorage> TransactionManager<S> {
    /// Create a new transaction manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultTransactionValidator),
        }
    }

    /// Create a new transaction manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn TransactionValidator>) -> Self {
        Self { storage, validator }
    }

    /// Validate and atomically record a transaction
    pub async fn record_transaction(&mut self, transaction: Transaction) -> LedgerResult<Transaction> {
        self.validator.validate_transaction(&transaction)?;

        // Verify all referenced accounts exist
        for posting in &transaction.postings {
            if self.storage.get_account(&posting.account_id).await?.is_none() {
                return Err(LedgerError::AccountNotFound(posting.account_id.clone()));
            }
        }

        let stored = self.storage.insert_transaction(transaction).await?;
        debug!(
            transaction_id = %stored.id,
            sequence = stored.sequence,
            postings = stored.postings.len(),
            "recorded transaction"
        );
        Ok(stored)
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<Option<Transaction>> {
        self.storage.get_transaction(transaction_id).await
    }

    /// Get a transaction by ID, returning an error if not found
    pub async fn get_transaction_required(
        &self,
        transaction_id: &str,
    ) -> LedgerResult<Transaction> {
        self.storage
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))
    }

    /// Get transactions for a specific account
    pub async fn get_account_transactions(
        &self,
        account_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        self.storage
            .get_account_transactions(account_id, start_date, end_date)
            .await
    }

    /// Get all transactions within a date range
    pub async fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        self.storage.get_transactions(start_date, end_date).await
    }

    /// Look up previously imported transactions by external id
    pub async fn find_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> LedgerResult<Vec<Transaction>> {
        self.storage.find_by_external_id(account_id, external_id).await
    }

    /// Change the clearing status of a transaction
    pub async fn set_status(
        &mut self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> LedgerResult<()> {
        self.storage
            .set_transaction_status(transaction_id, status)
            .await
    }

    /// Delete a transaction together with all of its postings
    pub async fn delete_transaction(&mut self, transaction_id: &str) -> LedgerResult<()> {
        self.get_transaction_required(transaction_id).await?;
        self.storage.delete_transaction(transaction_id).await?;
        debug!(transaction_id, "deleted transaction");
        Ok(())
    }
}

/// Transaction builder for creating multi-posting transactions
#[derive(Debug)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    /// Create a new transaction builder
    pub fn new(id: String, date: NaiveDate, payee: String) -> Self {
        Self {
            transaction: Transaction::new(id, date, payee, String::new()),
        }
    }

    /// Set the memo
    pub fn memo(mut self, memo: String) -> Self {
        self.transaction.memo = memo;
        self
    }

    /// Set the external reference for the transaction
    pub fn external_id(mut self, external_id: String) -> Self {
        self.transaction.external_id = Some(external_id);
        self
    }

    /// Set the clearing status
    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.transaction.status = status;
        self
    }

    /// Add metadata to the transaction
    pub fn metadata(mut self, key: String, value: String) -> Self {
        self.transaction.metadata.insert(key, value);
        self
    }

    /// Add a signed posting
    pub fn posting(mut self, account_id: String, amount: BigDecimal) -> Self {
        self.transaction
            .add_posting(Posting::new(account_id, amount));
        self
    }

    /// Add a custom posting
    pub fn entry(mut self, posting: Posting) -> Self {
        self.transaction.add_posting(posting);
        self
    }

    /// Build the transaction, enforcing the double-entry invariants
    pub fn build(self) -> LedgerResult<Transaction> {
        self.transaction.validate()?;
        Ok(self.transaction)
    }
}

/// Common transaction patterns
pub mod patterns {
    use super::*;

    /// Money account moves by `amount`, the category takes the opposite side
    pub fn categorized_entry(params: CategorizedEntryParams) -> LedgerResult<Transaction> {
        let mut category_posting = Posting::new(params.category_account_id, -params.amount.clone());
        if let Some(is_business) = params.is_business {
            category_posting = category_posting.with_business(is_business);
        }

        let mut builder = TransactionBuilder::new(params.id, params.date, params.payee)
            .memo(params.memo)
            .posting(params.target_account_id, params.amount)
            .entry(category_posting);
        if let Some(external_id) = params.external_id {
            builder = builder.external_id(external_id);
        }
        builder.build()
    }

    /// Move money between two real accounts
    pub fn create_transfer(
        id: String,
        date: NaiveDate,
        payee: String,
        from_account_id: String,
        to_account_id: String,
        amount: BigDecimal,
    ) -> LedgerResult<Transaction> {
        TransactionBuilder::new(id, date, payee)
            .posting(to_account_id, amount.clone())
            .posting(from_account_id, -amount)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_categorized_entry_shape() {
        let txn = patterns::categorized_entry(CategorizedEntryParams {
            id: "t1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            payee: "BWS LIQUOR".to_string(),
            memo: String::new(),
            target_account_id: "bank".to_string(),
            category_account_id: "alcohol".to_string(),
            amount: BigDecimal::from_str("-17").unwrap(),
            external_id: Some("imp-abc".to_string()),
            is_business: Some(false),
        })
        .unwrap();

        assert_eq!(txn.postings.len(), 2);
        assert_eq!(txn.amount_for("bank"), BigDecimal::from(-17));
        assert_eq!(txn.amount_for("alcohol"), BigDecimal::from(17));
        assert_eq!(txn.postings[1].is_business, Some(false));
        assert_eq!(txn.external_id.as_deref(), Some("imp-abc"));
        assert!(txn.is_balanced());
    }

    #[test]
    fn test_builder_rejects_unbalanced() {
        let result = TransactionBuilder::new(
            "t".to_string(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            "Oops".to_string(),
        )
        .posting("bank".to_string(), BigDecimal::from(-100))
        .posting("rent".to_string(), BigDecimal::from(50))
        .build();

        assert!(matches!(
            result,
            Err(LedgerError::UnbalancedTransaction { .. })
        ));
    }
}
