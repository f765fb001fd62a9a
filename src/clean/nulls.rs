//! Null handling: row removal and typed fills.

use std::{collections::HashMap, fmt, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray},
    compute::cast,
    datatypes::DataType,
};

use crate::{
    clean::{CleanOp, CleaningLogEntry, OpKind},
    dataset::{cell_to_string, ColumnType, TabularDataset},
    error::{Error, Result},
    outlier,
};

/// How [`FillNulls`] computes replacement values.
#[derive(Debug, Clone, PartialEq)]
pub enum FillStrategy {
    /// A literal integer, for integer columns.
    Int(i64),
    /// A literal float, for float columns.
    Float(f64),
    /// A literal string, for text columns.
    Text(String),
    /// A literal boolean, for boolean columns.
    Bool(bool),
    /// Zero, for numeric columns.
    Zero,
    /// Column mean, for numeric columns. Output becomes float.
    Mean,
    /// Column median, for numeric columns. Output becomes float.
    Median,
    /// First-encountered most frequent value, any supported type.
    /// An entirely-null column has no mode and is skipped with a
    /// warning; there is no caller-supplied fallback value.
    Mode,
    /// Carry the previous non-null value forward; leading nulls remain.
    Forward,
    /// Carry the next non-null value backward; trailing nulls remain.
    Backward,
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "value {v}"),
            Self::Float(v) => write!(f, "value {v}"),
            Self::Text(v) => write!(f, "value '{v}'"),
            Self::Bool(v) => write!(f, "value {v}"),
            Self::Zero => write!(f, "zero"),
            Self::Mean => write!(f, "mean"),
            Self::Median => write!(f, "median"),
            Self::Mode => write!(f, "mode"),
            Self::Forward => write!(f, "forward fill"),
            Self::Backward => write!(f, "backward fill"),
        }
    }
}

/// Resolves a column selection against a dataset.
///
/// Explicit names must all exist; `None` selects every column.
fn resolve_columns(data: &TabularDataset, columns: Option<&[&str]>) -> Result<Vec<String>> {
    match columns {
        Some(names) => {
            for name in names {
                data.column_index(name)?;
            }
            Ok(names.iter().map(|s| (*s).to_string()).collect())
        }
        None => Ok(data.column_names()),
    }
}

/// Drops rows failing a null-count requirement over selected columns.
#[derive(Debug, Clone)]
pub struct RemoveNulls {
    columns: Option<Vec<String>>,
    min_non_null: Option<usize>,
}

impl RemoveNulls {
    /// Creates the operation. See [`DataCleaner::remove_nulls`].
    ///
    /// [`DataCleaner::remove_nulls`]: crate::DataCleaner::remove_nulls
    #[must_use]
    pub fn new(columns: Option<&[&str]>, min_non_null: Option<usize>) -> Self {
        Self {
            columns: columns.map(|names| names.iter().map(|s| (*s).to_string()).collect()),
            min_non_null,
        }
    }
}

impl CleanOp for RemoveNulls {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let selection: Option<Vec<&str>> = self
            .columns
            .as_ref()
            .map(|names| names.iter().map(String::as_str).collect());
        let names = resolve_columns(&data, selection.as_deref())?;
        let indices: Vec<usize> = names
            .iter()
            .map(|name| data.column_index(name))
            .collect::<Result<Vec<_>>>()?;

        let rows_before = data.num_rows();
        let batch = data.batch();
        let mask: BooleanArray = (0..rows_before)
            .map(|row| {
                let non_null = indices
                    .iter()
                    .filter(|&&col| !batch.column(col).is_null(row))
                    .count();
                match self.min_non_null {
                    Some(min) => Some(non_null >= min),
                    None => Some(non_null == indices.len()),
                }
            })
            .collect();

        let result = data.filter_rows(&mask)?;
        let rows_after = result.num_rows();
        let entry = CleaningLogEntry::with_rows(
            OpKind::RemoveNulls,
            format!(
                "removed {} rows with nulls in {} columns",
                rows_before - rows_after,
                indices.len()
            ),
            rows_before,
            rows_after,
        );
        Ok((result, entry))
    }
}

/// Fills nulls in selected columns with a [`FillStrategy`].
#[derive(Debug, Clone)]
pub struct FillNulls {
    columns: Option<Vec<String>>,
    strategy: FillStrategy,
}

impl FillNulls {
    /// Creates the operation. See [`DataCleaner::fill_nulls`].
    ///
    /// [`DataCleaner::fill_nulls`]: crate::DataCleaner::fill_nulls
    #[must_use]
    pub fn new(columns: Option<&[&str]>, strategy: FillStrategy) -> Self {
        Self {
            columns: columns.map(|names| names.iter().map(|s| (*s).to_string()).collect()),
            strategy,
        }
    }
}

impl CleanOp for FillNulls {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let selection: Option<Vec<&str>> = self
            .columns
            .as_ref()
            .map(|names| names.iter().map(String::as_str).collect());
        let names = resolve_columns(&data, selection.as_deref())?;

        let mut result = data;
        let mut filled = 0usize;
        let mut touched = 0usize;
        let mut warnings = Vec::new();

        for name in &names {
            let nulls = result.null_count(name)?;
            if nulls == 0 {
                continue;
            }
            match fill_column(&result, name, &self.strategy)? {
                FillOutcome::Filled(array) => {
                    let remaining = array.null_count();
                    result = result.with_column_replaced(name, array)?;
                    filled += nulls - remaining;
                    touched += 1;
                }
                FillOutcome::Skipped(reason) => {
                    warnings.push(format!("'{name}': {reason}"));
                }
            }
        }

        let mut description = format!(
            "filled {} nulls in {} columns using {}",
            filled, touched, self.strategy
        );
        if !warnings.is_empty() {
            description.push_str(&format!("; skipped {}", warnings.join("; ")));
        }
        let entry = CleaningLogEntry::new(OpKind::FillNulls, description);
        Ok((result, entry))
    }
}

enum FillOutcome {
    Filled(ArrayRef),
    Skipped(String),
}

fn fill_column(
    data: &TabularDataset,
    name: &str,
    strategy: &FillStrategy,
) -> Result<FillOutcome> {
    let column_type = data.column_type(name)?;

    match strategy {
        FillStrategy::Int(v) => {
            if column_type != ColumnType::Integer {
                return Ok(mismatch(column_type, "integer"));
            }
            let mut values = int_values(data, name)?;
            fill_constant(&mut values, *v);
            Ok(FillOutcome::Filled(Arc::new(Int64Array::from(values))))
        }
        FillStrategy::Float(v) => {
            if column_type != ColumnType::Float {
                return Ok(mismatch(column_type, "float"));
            }
            let mut values = data.numeric_values(name)?;
            fill_constant(&mut values, *v);
            Ok(FillOutcome::Filled(Arc::new(Float64Array::from(values))))
        }
        FillStrategy::Text(v) => {
            if column_type != ColumnType::Text {
                return Ok(mismatch(column_type, "text"));
            }
            let mut values = string_values(data, name)?;
            fill_constant(&mut values, v.clone());
            Ok(FillOutcome::Filled(Arc::new(StringArray::from(values))))
        }
        FillStrategy::Bool(v) => {
            if column_type != ColumnType::Boolean {
                return Ok(mismatch(column_type, "boolean"));
            }
            let mut values = bool_values(data, name)?;
            fill_constant(&mut values, *v);
            Ok(FillOutcome::Filled(Arc::new(BooleanArray::from(values))))
        }
        FillStrategy::Zero => match column_type {
            ColumnType::Integer => {
                let mut values = int_values(data, name)?;
                fill_constant(&mut values, 0);
                Ok(FillOutcome::Filled(Arc::new(Int64Array::from(values))))
            }
            ColumnType::Float => {
                let mut values = data.numeric_values(name)?;
                fill_constant(&mut values, 0.0);
                Ok(FillOutcome::Filled(Arc::new(Float64Array::from(values))))
            }
            other => Ok(mismatch(other, "numeric")),
        },
        FillStrategy::Mean | FillStrategy::Median => {
            if !column_type.is_numeric() {
                return Ok(mismatch(column_type, "numeric"));
            }
            let mut values = data.numeric_values(name)?;
            let replacement = if *strategy == FillStrategy::Mean {
                mean(&values)
            } else {
                outlier::median(&values)
            };
            let Some(replacement) = replacement else {
                return Ok(FillOutcome::Skipped("column is entirely null".to_string()));
            };
            fill_constant(&mut values, replacement);
            Ok(FillOutcome::Filled(Arc::new(Float64Array::from(values))))
        }
        FillStrategy::Mode => {
            let col = data.column(name)?;
            let Some(rep) = mode_row_index(col) else {
                return Ok(FillOutcome::Skipped("column is entirely null".to_string()));
            };
            fill_with_row_value(data, name, rep)
        }
        FillStrategy::Forward | FillStrategy::Backward => {
            let forward = *strategy == FillStrategy::Forward;
            match column_type {
                ColumnType::Integer => {
                    let mut values = int_values(data, name)?;
                    fill_directional(&mut values, forward);
                    Ok(FillOutcome::Filled(Arc::new(Int64Array::from(values))))
                }
                ColumnType::Float => {
                    let mut values = data.numeric_values(name)?;
                    fill_directional(&mut values, forward);
                    Ok(FillOutcome::Filled(Arc::new(Float64Array::from(values))))
                }
                ColumnType::Text => {
                    let mut values = string_values(data, name)?;
                    fill_directional(&mut values, forward);
                    Ok(FillOutcome::Filled(Arc::new(StringArray::from(values))))
                }
                ColumnType::Boolean => {
                    let mut values = bool_values(data, name)?;
                    fill_directional(&mut values, forward);
                    Ok(FillOutcome::Filled(Arc::new(BooleanArray::from(values))))
                }
                other => Ok(mismatch(other, "a fillable")),
            }
        }
    }
}

fn mismatch(actual: ColumnType, wanted: &str) -> FillOutcome {
    FillOutcome::Skipped(format!("{actual} column, strategy needs {wanted}"))
}

fn fill_constant<T: Clone>(values: &mut [Option<T>], replacement: T) {
    for v in values.iter_mut() {
        if v.is_none() {
            *v = Some(replacement.clone());
        }
    }
}

fn fill_directional<T: Clone>(values: &mut [Option<T>], forward: bool) {
    let mut carried: Option<T> = None;
    let mut fill_one = |v: &mut Option<T>| match v {
        Some(x) => carried = Some(x.clone()),
        None => v.clone_from(&carried),
    };
    if forward {
        values.iter_mut().for_each(&mut fill_one);
    } else {
        values.iter_mut().rev().for_each(&mut fill_one);
    }
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let non_null: Vec<f64> = values.iter().flatten().copied().collect();
    if non_null.is_empty() {
        None
    } else {
        Some(non_null.iter().sum::<f64>() / non_null.len() as f64)
    }
}

/// Index of the first row holding the most frequent non-null value.
fn mode_row_index(col: &ArrayRef) -> Option<usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for i in 0..col.len() {
        if let Some(v) = cell_to_string(col, i) {
            *counts.entry(v).or_insert(0) += 1;
        }
    }
    let max = counts.values().copied().max()?;
    (0..col.len()).find(|&i| cell_to_string(col, i).is_some_and(|v| counts[&v] == max))
}

fn fill_with_row_value(data: &TabularDataset, name: &str, rep: usize) -> Result<FillOutcome> {
    match data.column_type(name)? {
        ColumnType::Integer => {
            let mut values = int_values(data, name)?;
            let replacement = values[rep].ok_or_else(|| Error::transform("mode row is null"))?;
            fill_constant(&mut values, replacement);
            Ok(FillOutcome::Filled(Arc::new(Int64Array::from(values))))
        }
        ColumnType::Float => {
            let mut values = data.numeric_values(name)?;
            let replacement = values[rep].ok_or_else(|| Error::transform("mode row is null"))?;
            fill_constant(&mut values, replacement);
            Ok(FillOutcome::Filled(Arc::new(Float64Array::from(values))))
        }
        ColumnType::Text => {
            let mut values = string_values(data, name)?;
            let replacement = values[rep]
                .clone()
                .ok_or_else(|| Error::transform("mode row is null"))?;
            fill_constant(&mut values, replacement);
            Ok(FillOutcome::Filled(Arc::new(StringArray::from(values))))
        }
        ColumnType::Boolean => {
            let mut values = bool_values(data, name)?;
            let replacement = values[rep].ok_or_else(|| Error::transform("mode row is null"))?;
            fill_constant(&mut values, replacement);
            Ok(FillOutcome::Filled(Arc::new(BooleanArray::from(values))))
        }
        other => Ok(mismatch(other, "a fillable")),
    }
}

fn int_values(data: &TabularDataset, name: &str) -> Result<Vec<Option<i64>>> {
    let col = data.column(name)?;
    let casted = cast(col.as_ref(), &DataType::Int64)
        .map_err(|e| Error::transform(format!("failed to cast '{name}' to Int64: {e}")))?;
    let ints = casted
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| Error::transform("expected Int64Array after cast"))?;
    Ok((0..ints.len())
        .map(|i| (!ints.is_null(i)).then(|| ints.value(i)))
        .collect())
}

fn string_values(data: &TabularDataset, name: &str) -> Result<Vec<Option<String>>> {
    let col = data.column(name)?;
    let strings = col
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::transform(format!("'{name}' is not a string column")))?;
    Ok((0..strings.len())
        .map(|i| (!strings.is_null(i)).then(|| strings.value(i).to_string()))
        .collect())
}

fn bool_values(data: &TabularDataset, name: &str) -> Result<Vec<Option<bool>>> {
    let col = data.column(name)?;
    let bools = col
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| Error::transform(format!("'{name}' is not a boolean column")))?;
    Ok((0..bools.len())
        .map(|i| (!bools.is_null(i)).then(|| bools.value(i)))
        .collect())
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::RecordBatch,
        datatypes::{Field, Schema},
    };

    use super::*;

    fn with_nulls() -> TabularDataset {
        let schema = Arc::new(Schema::new(vec![
            Field::new("n", DataType::Int64, true),
            Field::new("s", DataType::Utf8, true),
        ]));
        let ns = Int64Array::from(vec![Some(1), None, Some(3), None]);
        let ss = StringArray::from(vec![Some("a"), Some("a"), None, Some("b")]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(ns), Arc::new(ss)]).unwrap();
        TabularDataset::new(batch)
    }

    #[test]
    fn test_remove_nulls_all_columns() {
        let (result, entry) = RemoveNulls::new(None, None).apply(with_nulls()).unwrap();
        // Only row 0 has no nulls at all.
        assert_eq!(result.num_rows(), 1);
        assert_eq!(entry.rows_before, Some(4));
        assert_eq!(entry.rows_after, Some(1));
    }

    #[test]
    fn test_remove_nulls_subset() {
        let (result, _) = RemoveNulls::new(Some(&["n"]), None)
            .apply(with_nulls())
            .unwrap();
        assert_eq!(result.num_rows(), 2);
    }

    #[test]
    fn test_remove_nulls_min_non_null() {
        // Every row has at least one non-null across both columns.
        let (result, _) = RemoveNulls::new(None, Some(1)).apply(with_nulls()).unwrap();
        assert_eq!(result.num_rows(), 4);
    }

    #[test]
    fn test_remove_nulls_missing_column() {
        let result = RemoveNulls::new(Some(&["missing"]), None).apply(with_nulls());
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_fill_mean_promotes_to_float() {
        let (result, _) = FillNulls::new(Some(&["n"]), FillStrategy::Mean)
            .apply(with_nulls())
            .unwrap();
        assert_eq!(result.column_type("n").unwrap(), ColumnType::Float);
        let values = result.numeric_values("n").unwrap();
        // Mean of {1, 3} is 2.
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0), Some(2.0)]);
    }

    #[test]
    fn test_fill_median() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
        let vs = Int64Array::from(vec![Some(1), Some(2), None, Some(100)]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(vs)]).unwrap();
        let data = TabularDataset::new(batch);

        let (result, _) = FillNulls::new(Some(&["v"]), FillStrategy::Median)
            .apply(data)
            .unwrap();
        let values = result.numeric_values("v").unwrap();
        // Median of {1, 2, 100} is 2.
        assert_eq!(values[2], Some(2.0));
    }

    #[test]
    fn test_fill_constant_int() {
        let (result, _) = FillNulls::new(Some(&["n"]), FillStrategy::Int(-1))
            .apply(with_nulls())
            .unwrap();
        assert_eq!(result.column_type("n").unwrap(), ColumnType::Integer);
        assert_eq!(result.null_count("n").unwrap(), 0);
        assert_eq!(result.numeric_values("n").unwrap()[1], Some(-1.0));
    }

    #[test]
    fn test_fill_mode_first_most_frequent() {
        let (result, _) = FillNulls::new(Some(&["s"]), FillStrategy::Mode)
            .apply(with_nulls())
            .unwrap();
        let col = result.column("s").unwrap().clone();
        let strings = col.as_any().downcast_ref::<StringArray>().unwrap();
        // "a" appears twice, "b" once.
        assert_eq!(strings.value(2), "a");
    }

    #[test]
    fn test_fill_type_mismatch_is_soft() {
        let (result, entry) = FillNulls::new(None, FillStrategy::Mean)
            .apply(with_nulls())
            .unwrap();
        // "s" is text: skipped with a warning, "n" still filled.
        assert_eq!(result.null_count("n").unwrap(), 0);
        assert_eq!(result.null_count("s").unwrap(), 1);
        assert!(entry.description.contains("skipped"));
        assert!(entry.description.contains("'s'"));
    }

    #[test]
    fn test_fill_entirely_null_column_is_soft() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
        let vs = Int64Array::from(vec![None, None]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(vs)]).unwrap();
        let data = TabularDataset::new(batch);

        let (result, entry) = FillNulls::new(None, FillStrategy::Mode).apply(data).unwrap();
        assert_eq!(result.null_count("v").unwrap(), 2);
        assert!(entry.description.contains("entirely null"));
    }

    #[test]
    fn test_forward_fill_leading_nulls_remain() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
        let vs = Int64Array::from(vec![None, Some(5), None, Some(7), None]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(vs)]).unwrap();
        let data = TabularDataset::new(batch);

        let (result, _) = FillNulls::new(None, FillStrategy::Forward).apply(data).unwrap();
        let values = result.numeric_values("v").unwrap();
        assert_eq!(values, vec![None, Some(5.0), Some(5.0), Some(7.0), Some(7.0)]);
    }

    #[test]
    fn test_backward_fill_trailing_nulls_remain() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
        let vs = Int64Array::from(vec![None, Some(5), None, Some(7), None]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(vs)]).unwrap();
        let data = TabularDataset::new(batch);

        let (result, _) = FillNulls::new(None, FillStrategy::Backward).apply(data).unwrap();
        let values = result.numeric_values("v").unwrap();
        assert_eq!(values, vec![Some(5.0), Some(5.0), Some(7.0), Some(7.0), None]);
    }

    #[test]
    fn test_fill_zero() {
        let (result, _) = FillNulls::new(Some(&["n"]), FillStrategy::Zero)
            .apply(with_nulls())
            .unwrap();
        assert_eq!(result.numeric_values("n").unwrap()[1], Some(0.0));
        assert_eq!(result.column_type("n").unwrap(), ColumnType::Integer);
    }
}
