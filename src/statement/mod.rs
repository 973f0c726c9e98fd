//! Bank statement parsing: column mapping, cell parsing, and the row reader

pub mod mapping;
pub mod parse;
pub mod reader;

pub use mapping::{ColumnMapping, ColumnRef};
pub use parse::{parse_amount, DateParser};
pub use reader::{ParsedRow, RowError, RowField, StatementParser, StatementRows};
