//! # Column Codecs
//!
//! Money, rates and quantities are stored as decimal TEXT so nothing is lost
//! between the ERP and the till. These helpers read them back from a
//! [`SqliteRow`] and turn bad values into [`DbError::InvalidData`].

use std::str::FromStr;

use caja_core::DocType;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{DbError, DbResult};

/// Reads a NOT NULL decimal column.
pub(crate) fn decimal(row: &SqliteRow, column: &str) -> DbResult<Decimal> {
    let text: String = row.try_get(column)?;
    parse_decimal(column, &text)
}

/// Reads a nullable decimal column.
pub(crate) fn opt_decimal(row: &SqliteRow, column: &str) -> DbResult<Option<Decimal>> {
    let text: Option<String> = row.try_get(column)?;
    text.map(|t| parse_decimal(column, &t)).transpose()
}

pub(crate) fn doc_type(row: &SqliteRow, column: &str) -> DbResult<DocType> {
    let text: String = row.try_get(column)?;
    DocType::from_str(&text).map_err(|e| DbError::invalid_data(column, e.to_string()))
}

pub(crate) fn parse_decimal(column: &str, text: &str) -> DbResult<Decimal> {
    Decimal::from_str(text.trim())
        .map_err(|e| DbError::invalid_data(column, format!("'{}': {}", text, e)))
}

/// Sums decimal TEXT values; SQLite's SUM would go through floating point.
pub(crate) fn sum_decimals(column: &str, values: &[String]) -> DbResult<Decimal> {
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| Ok(acc + parse_decimal(column, v)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("qty", "12.50").unwrap(), dec!(12.50));
        assert_eq!(parse_decimal("qty", " 3 ").unwrap(), dec!(3));
        assert!(matches!(
            parse_decimal("qty", "abc"),
            Err(DbError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_sum_decimals_is_exact() {
        let values = vec!["0.1".to_string(), "0.2".to_string()];
        assert_eq!(sum_decimals("qty", &values).unwrap(), dec!(0.3));
    }
}
