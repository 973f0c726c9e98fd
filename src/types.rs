//! Core types and data structures for the ledger

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// Assets - bank accounts, cash, receivables
    Asset,
    /// Liabilities - credit cards, loans
    Liability,
    /// Equity - opening balances, owner's capital
    Equity,
    /// Income - money earned
    Income,
    /// Expenses - money spent
    Expense,
}

impl AccountType {
    /// Returns the normal balance type for this account type
    /// Assets and Expenses normally have debit balances
    /// Liabilities, Equity, and Income normally have credit balances
    pub fn normal_balance(&self) -> EntryType {
        match self {
            AccountType::Asset | AccountType::Expense => EntryType::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Income => EntryType::Credit,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Income => "INCOME",
            AccountType::Expense => "EXPENSE",
        };
        f.write_str(label)
    }
}

/// Which side of the ledger a posting lands on.
///
/// Posting amounts are debit-positive: a positive amount is a debit, a
/// negative amount is a credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// Increases Assets and Expenses, decreases Liabilities, Equity, and Income
    Debit,
    /// Increases Liabilities, Equity, and Income, decreases Assets and Expenses
    Credit,
}

/// Whether an account holds real money or is a bucket for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountKind {
    /// A real money account (bank, card, cash)
    Transfer,
    /// An income/expense bucket
    Category,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::Transfer => f.write_str("TRANSFER"),
            AccountKind::Category => f.write_str("CATEGORY"),
        }
    }
}

/// Finer classification of transfer accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountSubtype {
    Bank,
    Card,
    /// Payment service provider balance (PayPal, Stripe, ...)
    Psp,
    Cash,
    Loan,
    Investment,
}

/// Core account structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// Transfer or category. Fixed at creation.
    pub kind: AccountKind,
    pub subtype: Option<AccountSubtype>,
    /// Optional parent account for category hierarchies
    pub parent_id: Option<String>,
    /// Postings against this account default to business use
    pub is_business_default: bool,
    pub archived: bool,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
    /// When the account was created
    pub created_at: NaiveDateTime,
    /// When the account was last updated
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new account
    pub fn new(
        id: String,
        name: String,
        account_type: AccountType,
        kind: AccountKind,
        parent_id: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            name,
            account_type,
            kind,
            subtype: None,
            parent_id,
            is_business_default: false,
            archived: false,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the subtype
    pub fn with_subtype(mut self, subtype: AccountSubtype) -> Self {
        self.subtype = Some(subtype);
        self
    }

    /// Mark postings to this account as business by default
    pub fn business_default(mut self, is_business: bool) -> Self {
        self.is_business_default = is_business;
        self
    }

    pub fn is_category(&self) -> bool {
        self.kind == AccountKind::Category
    }

    /// Convert a raw debit-positive balance onto this account's normal side
    pub fn normal_balance_of(&self, raw: &BigDecimal) -> BigDecimal {
        match self.account_type.normal_balance() {
            EntryType::Debit => raw.clone(),
            EntryType::Credit => -raw.clone(),
        }
    }
}

/// One signed line of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: String,
    /// Owning transaction, filled in when the posting is attached
    pub transaction_id: String,
    /// Account being affected
    pub account_id: String,
    /// Debit-positive signed amount
    pub amount: BigDecimal,
    pub is_business: Option<bool>,
}

impl Posting {
    /// Create a new posting with a generated id
    pub fn new(account_id: String, amount: BigDecimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            transaction_id: String::new(),
            account_id,
            amount,
            is_business: None,
        }
    }

    /// Create a posting flagged for business or personal use
    pub fn with_business(mut self, is_business: bool) -> Self {
        self.is_business = Some(is_business);
        self
    }

    /// Debit or credit view of the signed amount
    pub fn entry_type(&self) -> EntryType {
        if self.amount < BigDecimal::from(0) {
            EntryType::Credit
        } else {
            EntryType::Debit
        }
    }
}

/// Clearing state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Uncleared,
    Cleared,
    Reconciled,
}

/// Complete transaction with its postings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,
    /// Date when the transaction occurred
    pub date: NaiveDate,
    pub payee: String,
    pub memo: String,
    pub status: TransactionStatus,
    /// Bank-supplied id or import fingerprint
    pub external_id: Option<String>,
    /// Postings in entry order
    pub postings: Vec<Posting>,
    /// Insertion order assigned by storage on create
    pub sequence: u64,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
    /// When the transaction was created
    pub created_at: NaiveDateTime,
    /// When the transaction was last updated
    pub updated_at: NaiveDateTime,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(id: String, date: NaiveDate, payee: String, memo: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            date,
            payee,
            memo,
            status: TransactionStatus::Uncleared,
            external_id: None,
            postings: Vec::new(),
            sequence: 0,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a posting to the transaction
    pub fn add_posting(&mut self, mut posting: Posting) {
        posting.transaction_id = self.id.clone();
        self.postings.push(posting);
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    /// Sum of all posting amounts
    pub fn total(&self) -> BigDecimal {
        self.postings.iter().map(|p| &p.amount).sum()
    }

    /// Check if the transaction is balanced (postings sum to zero)
    pub fn is_balanced(&self) -> bool {
        self.total() == BigDecimal::from(0)
    }

    /// Whether any posting hits the given account
    pub fn touches(&self, account_id: &str) -> bool {
        self.postings.iter().any(|p| p.account_id == account_id)
    }

    /// Net amount this transaction moves in the given account
    pub fn amount_for(&self, account_id: &str) -> BigDecimal {
        self.postings
            .iter()
            .filter(|p| p.account_id == account_id)
            .map(|p| &p.amount)
            .sum()
    }

    /// Validate the double-entry invariants
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.postings.len() < 2 {
            return Err(LedgerError::InsufficientPostings {
                count: self.postings.len(),
            });
        }

        if self.postings.iter().any(|p| p.account_id.trim().is_empty()) {
            return Err(LedgerError::Validation(
                "Every posting must reference an account".to_string(),
            ));
        }

        let total = self.total();
        if total != BigDecimal::from(0) {
            return Err(LedgerError::UnbalancedTransaction { total });
        }

        Ok(())
    }
}

/// One line of an account register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterLine {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub payee: String,
    pub status: TransactionStatus,
    /// Net movement of the account in this transaction
    pub amount: BigDecimal,
    /// Cumulative balance after this line
    pub balance: BigDecimal,
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Unbalanced transaction: postings sum to {total}, expected 0")]
    UnbalancedTransaction { total: BigDecimal },
    #[error("Transaction needs at least two postings, got {count}")]
    InsufficientPostings { count: usize },
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Account '{account_id}' kind cannot change from {from} to {to}")]
    ImmutableAccountKind {
        account_id: String,
        from: AccountKind,
        to: AccountKind,
    },
    #[error("Duplicate id: {0}")]
    DuplicateId(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that reject a whole import before or outside row processing
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Column mapping is missing '{0}'")]
    MissingColumn(String),
    #[error("Column mapping has both 'amount' and 'debit'/'credit'; use one or the other")]
    ConflictingAmountColumns,
    #[error("Invalid column mapping: {0}")]
    InvalidMapping(String),
    #[error("Column '{0}' not found in statement header")]
    UnknownHeader(String),
    #[error("Account '{account_id}' cannot receive imports: {reason}")]
    InvalidTargetAccount { account_id: String, reason: String },
    #[error("Cannot {action} an import session in state {state}")]
    InvalidState { state: String, action: &'static str },
    #[error("Row {0} is not part of this preview")]
    RowOutOfRange(usize),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
