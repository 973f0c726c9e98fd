//! Column mapping from semantic fields to statement columns

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::types::{ImportError, ImportResult};

/// Reference to a source column: a 0-based index, or a header name.
///
/// Names of the form `col3` resolve to index 3 when no header carries that
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Header(String),
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Header(name.to_string())
    }
}

impl ColumnRef {
    /// `colN` shorthand
    fn positional(name: &str) -> Option<usize> {
        name.trim()
            .strip_prefix("col")
            .and_then(|n| n.parse::<usize>().ok())
    }

    /// Whether this reference can only be resolved through a header row
    pub fn needs_header(&self) -> bool {
        match self {
            ColumnRef::Index(_) => false,
            ColumnRef::Header(name) => Self::positional(name).is_none(),
        }
    }

    fn resolve(&self, headers: Option<&StringRecord>) -> ImportResult<usize> {
        match self {
            ColumnRef::Index(index) => Ok(*index),
            ColumnRef::Header(name) => {
                let wanted = name.trim().to_lowercase();
                let by_header = headers.and_then(|h| {
                    h.iter()
                        .position(|field| field.trim().to_lowercase() == wanted)
                });
                by_header
                    .or_else(|| Self::positional(name))
                    .ok_or_else(|| ImportError::UnknownHeader(name.clone()))
            }
        }
    }
}

/// Column mapping configuration supplied by the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default)]
    pub date: Option<ColumnRef>,
    #[serde(default)]
    pub payee: Option<ColumnRef>,
    #[serde(default)]
    pub description: Option<ColumnRef>,
    /// Single signed amount column. Exclusive with `debit` + `credit`.
    #[serde(default)]
    pub amount: Option<ColumnRef>,
    #[serde(default)]
    pub debit: Option<ColumnRef>,
    #[serde(default)]
    pub credit: Option<ColumnRef>,
    #[serde(default)]
    pub reference: Option<ColumnRef>,
    /// `None` sniffs the first row
    #[serde(default)]
    pub has_header: Option<bool>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Bank-specific date format tried before the configured list
    #[serde(default)]
    pub date_format: Option<String>,
}

fn default_delimiter() -> char {
    ','
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: None,
            payee: None,
            description: None,
            amount: None,
            debit: None,
            credit: None,
            reference: None,
            has_header: None,
            delimiter: default_delimiter(),
            date_format: None,
        }
    }
}

impl ColumnMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date(mut self, column: impl Into<ColumnRef>) -> Self {
        self.date = Some(column.into());
        self
    }

    pub fn payee(mut self, column: impl Into<ColumnRef>) -> Self {
        self.payee = Some(column.into());
        self
    }

    pub fn description(mut self, column: impl Into<ColumnRef>) -> Self {
        self.description = Some(column.into());
        self
    }

    pub fn amount(mut self, column: impl Into<ColumnRef>) -> Self {
        self.amount = Some(column.into());
        self
    }

    /// Separate debit and credit columns
    pub fn debit_credit(
        mut self,
        debit: impl Into<ColumnRef>,
        credit: impl Into<ColumnRef>,
    ) -> Self {
        self.debit = Some(debit.into());
        self.credit = Some(credit.into());
        self
    }

    pub fn reference(mut self, column: impl Into<ColumnRef>) -> Self {
        self.reference = Some(column.into());
        self
    }

    /// Set whether first row is header
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    /// Set the delimiter
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the date format
    pub fn with_date_format(mut self, format: &str) -> Self {
        self.date_format = Some(format.to_string());
        self
    }

    /// Structural check, run before any row is read
    pub fn validate(&self) -> ImportResult<()> {
        if self.date.is_none() {
            return Err(ImportError::MissingColumn("date".to_string()));
        }

        match (&self.amount, &self.debit, &self.credit) {
            (Some(_), None, None) => {}
            (Some(_), _, _) => return Err(ImportError::ConflictingAmountColumns),
            (None, Some(_), Some(_)) => {}
            (None, Some(_), None) => return Err(ImportError::MissingColumn("credit".to_string())),
            (None, None, Some(_)) => return Err(ImportError::MissingColumn("debit".to_string())),
            (None, None, None) => {
                return Err(ImportError::MissingColumn(
                    "amount (or debit and credit)".to_string(),
                ))
            }
        }

        if !self.delimiter.is_ascii() {
            return Err(ImportError::InvalidMapping(format!(
                "delimiter '{}' is not ASCII",
                self.delimiter
            )));
        }

        Ok(())
    }

    /// Whether any reference names a header
    pub fn refers_to_headers(&self) -> bool {
        [
            &self.date,
            &self.payee,
            &self.description,
            &self.amount,
            &self.debit,
            &self.credit,
            &self.reference,
        ]
        .iter()
        .any(|c| c.as_ref().is_some_and(ColumnRef::needs_header))
    }

    /// Resolve references to indices
    pub(crate) fn resolve(&self, headers: Option<&StringRecord>) -> ImportResult<ResolvedMapping> {
        self.validate()?;

        let resolve_opt = |c: &Option<ColumnRef>| -> ImportResult<Option<usize>> {
            c.as_ref().map(|c| c.resolve(headers)).transpose()
        };

        let date = resolve_opt(&self.date)?
            .ok_or_else(|| ImportError::MissingColumn("date".to_string()))?;

        let amount = match (
            resolve_opt(&self.amount)?,
            resolve_opt(&self.debit)?,
            resolve_opt(&self.credit)?,
        ) {
            (Some(column), _, _) => AmountColumns::Signed(column),
            (None, Some(debit), Some(credit)) => AmountColumns::Split { debit, credit },
            _ => return Err(ImportError::MissingColumn("amount".to_string())),
        };

        Ok(ResolvedMapping {
            date,
            payee: resolve_opt(&self.payee)?,
            description: resolve_opt(&self.description)?,
            amount,
            reference: resolve_opt(&self.reference)?,
        })
    }
}

/// Where the amount comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AmountColumns {
    Signed(usize),
    Split { debit: usize, credit: usize },
}

/// Mapping with every reference turned into a column index
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedMapping {
    pub date: usize,
    pub payee: Option<usize>,
    pub description: Option<usize>,
    pub amount: AmountColumns,
    pub reference: Option<usize>,
}
