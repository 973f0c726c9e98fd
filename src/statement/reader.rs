//! Lazy statement row reader

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::mapping::{AmountColumns, ColumnMapping, ResolvedMapping};
use super::parse::{parse_amount, DateParser};
use crate::config::ImportSettings;
use crate::types::ImportResult;

/// A statement row that parsed cleanly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    /// 1-based line in the source text
    pub row: usize,
    pub date: NaiveDate,
    pub payee: String,
    pub memo: String,
    /// Signed; negative is money leaving the account
    pub amount: BigDecimal,
    pub reference: Option<String>,
    /// Source cells as read
    pub raw: Vec<String>,
}

/// Which part of a row failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowField {
    /// The record itself could not be read
    Record,
    Date,
    Amount,
}

/// A row excluded from the candidate set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub field: RowField,
    pub message: String,
    pub raw: Vec<String>,
}

/// Turns statement text into rows according to a column mapping
#[derive(Debug, Clone)]
pub struct StatementParser {
    mapping: ColumnMapping,
    dates: DateParser,
}

impl StatementParser {
    /// Build a parser; rejects structurally invalid mappings up front
    pub fn new(mapping: ColumnMapping, settings: &ImportSettings) -> ImportResult<Self> {
        mapping.validate()?;
        let dates = DateParser::new(mapping.date_format.as_deref(), &settings.date_formats);
        Ok(Self { mapping, dates })
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Start reading `text`. The returned iterator is consumed once.
    pub fn rows<'a>(&self, text: &'a str) -> ImportResult<StatementRows<'a>> {
        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .delimiter(self.mapping.delimiter as u8)
            .from_reader(text.as_bytes())
            .into_records();

        let first = records.next().transpose()?;
        let has_header = match self.mapping.has_header {
            Some(has_header) => has_header,
            None => {
                self.mapping.refers_to_headers()
                    || first.as_ref().is_some_and(|r| self.looks_like_header(r))
            }
        };

        let (headers, pending) = if has_header {
            (first, None)
        } else {
            (None, first)
        };
        let resolved = self.mapping.resolve(headers.as_ref())?;
        debug!(has_header, ?resolved, "resolved statement columns");

        Ok(StatementRows {
            records,
            pending,
            resolved,
            dates: self.dates.clone(),
            counter: usize::from(has_header),
        })
    }

    /// A first row is a header when neither its date cell nor any of its
    /// amount cells parse. A data row with only a bad date stays a row error.
    fn looks_like_header(&self, record: &StringRecord) -> bool {
        let Ok(resolved) = self.mapping.resolve(None) else {
            return true;
        };
        let parses_as_amount =
            |index: usize| record.get(index).and_then(parse_amount).is_some();

        let date_parses = record
            .get(resolved.date)
            .is_some_and(|cell| self.dates.parse(cell).is_some());
        let amount_parses = match resolved.amount {
            AmountColumns::Signed(column) => parses_as_amount(column),
            AmountColumns::Split { debit, credit } => {
                parses_as_amount(debit) || parses_as_amount(credit)
            }
        };
        !date_parses && !amount_parses
    }
}

/// Lazy, finite, single-pass iterator over statement rows
pub struct StatementRows<'a> {
    records: StringRecordsIntoIter<&'a [u8]>,
    pending: Option<StringRecord>,
    resolved: ResolvedMapping,
    dates: DateParser,
    counter: usize,
}

impl Iterator for StatementRows<'_> {
    type Item = Result<ParsedRow, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.pending.take() {
                Some(record) => Ok(record),
                None => self.records.next()?,
            };
            self.counter += 1;

            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    let row = e
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(self.counter);
                    return Some(Err(RowError {
                        row,
                        field: RowField::Record,
                        message: format!("Error reading CSV record: {}", e),
                        raw: Vec::new(),
                    }));
                }
            };

            let row = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(self.counter);

            if record.iter().all(|cell| cell.is_empty()) {
                debug!(row, "skipping empty statement row");
                continue;
            }

            return Some(self.parse_record(&record, row));
        }
    }
}

impl StatementRows<'_> {
    fn parse_record(&self, record: &StringRecord, row: usize) -> Result<ParsedRow, RowError> {
        let raw: Vec<String> = record.iter().map(str::to_string).collect();
        let cell = |index: usize| record.get(index).unwrap_or("").trim();
        let fail = |field: RowField, message: String| RowError {
            row,
            field,
            message,
            raw: raw.clone(),
        };

        let date_str = cell(self.resolved.date);
        let date = self
            .dates
            .parse(date_str)
            .ok_or_else(|| fail(RowField::Date, format!("Could not parse date: '{}'", date_str)))?;

        let amount = match self.resolved.amount {
            AmountColumns::Signed(column) => {
                let amount_str = cell(column);
                parse_amount(amount_str).ok_or_else(|| {
                    fail(
                        RowField::Amount,
                        format!("Could not parse amount: '{}'", amount_str),
                    )
                })?
            }
            AmountColumns::Split { debit, credit } => {
                let debit_str = cell(debit);
                let credit_str = cell(credit);
                if debit_str.is_empty() && credit_str.is_empty() {
                    return Err(fail(
                        RowField::Amount,
                        "Row has neither a debit nor a credit".to_string(),
                    ));
                }

                let magnitude = |s: &str| -> Result<BigDecimal, RowError> {
                    if s.is_empty() {
                        return Ok(BigDecimal::from(0));
                    }
                    parse_amount(s).map(|v| v.abs()).ok_or_else(|| {
                        fail(RowField::Amount, format!("Could not parse amount: '{}'", s))
                    })
                };
                magnitude(credit_str)? - magnitude(debit_str)?
            }
        };

        let payee_cell = self.resolved.payee.map(cell).filter(|s| !s.is_empty());
        let description_cell = self.resolved.description.map(cell).filter(|s| !s.is_empty());
        let (payee, memo) = match (payee_cell, description_cell) {
            (Some(payee), Some(description)) => (payee.to_string(), description.to_string()),
            (Some(payee), None) => (payee.to_string(), String::new()),
            (None, Some(description)) => (description.to_string(), String::new()),
            (None, None) => (String::new(), String::new()),
        };

        let reference = self
            .resolved
            .reference
            .map(cell)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(ParsedRow {
            row,
            date,
            payee,
            memo,
            amount,
            reference,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImportError;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn parse(mapping: ColumnMapping, text: &str) -> Vec<Result<ParsedRow, RowError>> {
        StatementParser::new(mapping, &ImportSettings::default())
            .unwrap()
            .rows(text)
            .unwrap()
            .collect()
    }

    #[test]
    fn test_headerless_signed_amount() {
        let rows = parse(
            ColumnMapping::new().date(0).amount(1).description(2),
            "30/06/2025,-17,BWS LIQUOR\n",
        );
        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
        assert_eq!(row.amount, dec("-17"));
        assert_eq!(row.payee, "BWS LIQUOR");
        assert_eq!(row.row, 1);
    }

    #[test]
    fn test_quoted_fields_with_commas_and_escaped_quotes() {
        let rows = parse(
            ColumnMapping::new().date(0).amount(1).payee(2).description(3),
            "Date,Amount,Payee,Details\n\
             31 Jan 2026,\"-1,250.00\",\"Smith, Jones & Co\",\"Invoice \"\"42\"\"\"\n",
        );
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.amount, dec("-1250.00"));
        assert_eq!(row.payee, "Smith, Jones & Co");
        assert_eq!(row.memo, "Invoice \"42\"");
        assert_eq!(row.row, 2);
    }

    #[test]
    fn test_debit_credit_columns() {
        let rows = parse(
            ColumnMapping::new()
                .date("Date")
                .description("Description")
                .debit_credit("Debit", "Credit")
                .reference("Ref"),
            "Date,Description,Debit,Credit,Ref\n\
             01/02/2026,Rent,1500.00,,R1\n\
             02/02/2026,Salary,,4200.00,R2\n\
             03/02/2026,Nothing,,,R3\n",
        );
        assert_eq!(rows[0].as_ref().unwrap().amount, dec("-1500.00"));
        assert_eq!(rows[0].as_ref().unwrap().reference.as_deref(), Some("R1"));
        assert_eq!(rows[1].as_ref().unwrap().amount, dec("4200.00"));
        let err = rows[2].as_ref().unwrap_err();
        assert_eq!(err.field, RowField::Amount);
        assert_eq!(err.row, 4);
    }

    #[test]
    fn test_bad_rows_reported_not_fatal() {
        let rows = parse(
            ColumnMapping::new().date(0).amount(1).description(2),
            "Date,Amount,Description\n\
             30/06/2025,-17,BWS LIQUOR\n\
             not a date,-5,Coffee\n\
             01/07/2025,lots,Mystery\n\
             02/07/2025,12.50,Refund\n",
        );
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_ok());
        assert_eq!(rows[1].as_ref().unwrap_err().field, RowField::Date);
        assert_eq!(rows[1].as_ref().unwrap_err().raw[2], "Coffee");
        assert_eq!(rows[2].as_ref().unwrap_err().field, RowField::Amount);
        assert!(rows[3].is_ok());
    }

    #[test]
    fn test_header_sniffed_when_unspecified() {
        let rows = parse(
            ColumnMapping::new().date(0).amount(1),
            "Date,Amount\n2026-01-22,-6500.00\n",
        );
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_ok());
    }

    #[test]
    fn test_headerless_first_row_with_bad_date_is_reported() {
        let rows = parse(
            ColumnMapping::new().date(0).amount(1).description(2),
            "3O/06/2025,-5,TYPO ROW\n01/07/2025,-17,BWS\n",
        );
        assert_eq!(rows.len(), 2);
        let err = rows[0].as_ref().unwrap_err();
        assert_eq!(err.field, RowField::Date);
        assert_eq!(err.row, 1);
        assert_eq!(err.raw[2], "TYPO ROW");
        assert_eq!(rows[1].as_ref().unwrap().amount, dec("-17"));
    }

    #[test]
    fn test_split_header_sniffed_when_unspecified() {
        let rows = parse(
            ColumnMapping::new().date(0).payee(1).debit_credit(2, 3),
            "Date,Description,Debit,Credit\n30/06/2025,BWS,17.00,\n",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_ref().unwrap().amount, dec("-17.00"));
    }

    #[test]
    fn test_semicolon_delimiter_and_empty_rows() {
        let rows = parse(
            ColumnMapping::new()
                .date(0)
                .amount(1)
                .payee(2)
                .with_delimiter(';')
                .with_header(false),
            "22/01/2026;-6500.00;Landlord\n;;\n23/01/2026;10;Cafe\n",
        );
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_missing_header_name_is_structural() {
        let parser = StatementParser::new(
            ColumnMapping::new().date("Posted").amount("Amount"),
            &ImportSettings::default(),
        )
        .unwrap();
        let result = parser.rows("Date,Amount\n01/01/2026,1\n");
        assert!(matches!(result, Err(ImportError::UnknownHeader(_))));
    }
}
