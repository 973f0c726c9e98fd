//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an account ID is valid
pub fn validate_account_id(account_id: &str) -> LedgerResult<()> {
    if account_id.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account ID cannot be empty".to_string(),
        ));
    }

    if account_id.len() > 64 {
        return Err(LedgerError::Validation(
            "Account ID cannot exceed 64 characters".to_string(),
        ));
    }

    // Alphanumerics, dashes, underscores (uuids pass)
    if !account_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LedgerError::Validation(
            "Account ID can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a transaction payee. Empty payees are allowed; bank exports
/// sometimes leave the description blank.
pub fn validate_payee(payee: &str) -> LedgerResult<()> {
    if payee.len() > 500 {
        return Err(LedgerError::Validation(
            "Payee cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Enhanced transaction validator with detailed checks
pub struct EnhancedTransactionValidator;

impl TransactionValidator for EnhancedTransactionValidator {
    fn validate_transaction(&self, transaction: &Transaction) -> LedgerResult<()> {
        // Basic validation
        transaction.validate()?;

        validate_payee(&transaction.payee)?;

        for posting in &transaction.postings {
            validate_account_id(&posting.account_id)?;
            if posting.amount == BigDecimal::from(0) {
                return Err(LedgerError::Validation(format!(
                    "Posting to '{}' has a zero amount",
                    posting.account_id
                )));
            }
        }

        // Same account on the same side twice is almost always a mapping bug
        let mut seen = std::collections::HashSet::new();
        for posting in &transaction.postings {
            if !seen.insert((&posting.account_id, posting.entry_type())) {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' appears multiple times on the same side of the transaction",
                    posting.account_id
                )));
            }
        }

        Ok(())
    }
}

/// Enhanced account validator with detailed checks
pub struct EnhancedAccountValidator;

impl AccountValidator for EnhancedAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        validate_account_id(&account.id)?;
        validate_account_name(&account.name)?;

        if account.kind == AccountKind::Category
            && !matches!(
                account.account_type,
                AccountType::Income | AccountType::Expense
            )
        {
            return Err(LedgerError::Validation(format!(
                "Category account '{}' must be INCOME or EXPENSE, not {}",
                account.id, account.account_type
            )));
        }

        if account.kind == AccountKind::Transfer && account.subtype.is_none() {
            return Err(LedgerError::Validation(format!(
                "Transfer account '{}' needs a subtype",
                account.id
            )));
        }

        Ok(())
    }

    fn validate_account_update(&self, existing: &Account, updated: &Account) -> LedgerResult<()> {
        DefaultAccountValidator.validate_account_update(existing, updated)?;
        self.validate_account(updated)
    }
}
