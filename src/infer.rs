//! Best-effort type inference for text columns.
//!
//! A text column is promoted to datetime, integer, or float only when every
//! non-null value parses as that candidate; a single bad cell vetoes the
//! candidate for the whole column and the column stays text. Inference never
//! fails, it only declines.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    dataset::{ColumnType, TabularDataset},
    error::Result,
};

/// Datetime formats attempted, in order. ISO-ish first, then common
/// regional layouts.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parses a single datetime literal against the known formats.
#[must_use]
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// A successfully inferred column: its semantic type and converted values.
#[derive(Debug, Clone)]
pub struct InferredColumn {
    /// The semantic type the column converted to.
    pub column_type: ColumnType,
    /// The converted values, nulls preserved.
    pub array: ArrayRef,
}

/// Attempts to infer a better type for a column of text values.
///
/// Candidates are tried in fixed priority order: datetime, then integer,
/// then float. Returns `None` when no candidate covers every non-null value
/// (including the case of an entirely null column, where there is nothing
/// to decide on).
#[must_use]
pub fn infer_column(values: &[Option<&str>]) -> Option<InferredColumn> {
    if values.iter().all(Option::is_none) {
        return None;
    }

    // Datetime candidate.
    let datetimes: Option<Vec<Option<i64>>> = values
        .iter()
        .map(|v| match v {
            None => Some(None),
            Some(s) => parse_datetime(s).map(|dt| Some(dt.and_utc().timestamp_micros())),
        })
        .collect();
    if let Some(micros) = datetimes {
        return Some(InferredColumn {
            column_type: ColumnType::DateTime,
            array: Arc::new(TimestampMicrosecondArray::from(micros)),
        });
    }

    // Integer candidate.
    let integers: Option<Vec<Option<i64>>> = values
        .iter()
        .map(|v| match v {
            None => Some(None),
            Some(s) => s.trim().parse::<i64>().ok().map(Some),
        })
        .collect();
    if let Some(ints) = integers {
        return Some(InferredColumn {
            column_type: ColumnType::Integer,
            array: Arc::new(Int64Array::from(ints)),
        });
    }

    // Float candidate.
    let floats: Option<Vec<Option<f64>>> = values
        .iter()
        .map(|v| match v {
            None => Some(None),
            Some(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(Some),
        })
        .collect();
    if let Some(fs) = floats {
        return Some(InferredColumn {
            column_type: ColumnType::Float,
            array: Arc::new(Float64Array::from(fs)),
        });
    }

    None
}

/// Applies [`infer_column`] to every text column of a dataset.
///
/// Returns the (possibly unchanged) dataset together with the list of
/// columns that converted and their new types.
///
/// # Errors
///
/// Returns an error only if rebuilding the dataset fails; declined
/// inference is not an error.
pub fn infer_types(data: TabularDataset) -> Result<(TabularDataset, Vec<(String, ColumnType)>)> {
    let mut result = data;
    let mut converted = Vec::new();

    for name in result.column_names() {
        if result.column_type(&name)? != ColumnType::Text {
            continue;
        }
        let col = result.column(&name)?;
        let Some(strings) = col.as_any().downcast_ref::<StringArray>() else {
            continue;
        };
        let values: Vec<Option<&str>> = (0..strings.len())
            .map(|i| {
                if strings.is_null(i) {
                    None
                } else {
                    Some(strings.value(i))
                }
            })
            .collect();

        if let Some(inferred) = infer_column(&values) {
            result = result.with_column_replaced(&name, inferred.array)?;
            converted.push((name, inferred.column_type));
        }
    }

    Ok((result, converted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_iso() {
        assert!(parse_datetime("2024-01-15T10:30:00").is_some());
        assert!(parse_datetime("2024-01-15 10:30:00").is_some());
        assert!(parse_datetime("2024-01-15").is_some());
        assert!(parse_datetime("not a date").is_none());
    }

    #[test]
    fn test_parse_datetime_slash_formats() {
        assert!(parse_datetime("2024/01/15").is_some());
        assert!(parse_datetime("01/15/2024").is_some());
    }

    #[test]
    fn test_infer_integer_column() {
        let values = vec![Some("1"), Some("2"), None, Some("42")];
        let inferred = infer_column(&values).unwrap();
        assert_eq!(inferred.column_type, ColumnType::Integer);
        assert_eq!(inferred.array.null_count(), 1);
    }

    #[test]
    fn test_infer_float_column() {
        let values = vec![Some("1.5"), Some("2"), Some("3.25")];
        let inferred = infer_column(&values).unwrap();
        // "1.5" vetoes the integer candidate; float wins.
        assert_eq!(inferred.column_type, ColumnType::Float);
    }

    #[test]
    fn test_infer_datetime_column() {
        let values = vec![Some("2024-01-01"), Some("2024-06-15"), None];
        let inferred = infer_column(&values).unwrap();
        assert_eq!(inferred.column_type, ColumnType::DateTime);
    }

    #[test]
    fn test_single_bad_cell_vetoes_column() {
        let values = vec![Some("1"), Some("2"), Some("three")];
        assert!(infer_column(&values).is_none());
    }

    #[test]
    fn test_entirely_null_column_declines() {
        let values: Vec<Option<&str>> = vec![None, None];
        assert!(infer_column(&values).is_none());
    }

    #[test]
    fn test_datetime_takes_priority_over_numeric() {
        // These parse as dates, not as numbers, so priority is moot here;
        // but a numeric-looking date string must not be left as text.
        let values = vec![Some("2024-01-01"), Some("2023-12-31")];
        let inferred = infer_column(&values).unwrap();
        assert_eq!(inferred.column_type, ColumnType::DateTime);
    }

    #[test]
    fn test_infer_types_on_dataset() {
        use arrow::{
            array::RecordBatch,
            datatypes::{DataType, Field, Schema},
        };

        let schema = Arc::new(Schema::new(vec![
            Field::new("label", DataType::Utf8, true),
            Field::new("when", DataType::Utf8, true),
        ]));
        let labels = StringArray::from(vec!["alpha", "beta"]);
        let whens = StringArray::from(vec!["2024-01-01", "2024-02-01"]);
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(labels), Arc::new(whens)]).unwrap();

        let (result, converted) = infer_types(TabularDataset::new(batch)).unwrap();
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].0, "when");
        assert_eq!(result.column_type("when").unwrap(), ColumnType::DateTime);
        assert_eq!(result.column_type("label").unwrap(), ColumnType::Text);
    }

    #[test]
    fn test_infer_types_leaves_non_text_alone() {
        let data = TabularDataset::from_csv_str("n\n1\n2\n").unwrap();
        let (result, converted) = infer_types(data).unwrap();
        assert!(converted.is_empty());
        assert_eq!(result.column_type("n").unwrap(), ColumnType::Integer);
    }
}
