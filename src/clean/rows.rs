//! Row-level cleaning: duplicate removal and outlier handling.

use std::{collections::HashMap, sync::Arc};

use arrow::array::{BooleanArray, Float64Array};

use crate::{
    clean::{CleanOp, CleaningLogEntry, OpKind},
    dataset::{row_key, TabularDataset},
    error::{Error, Result},
    outlier::{self, OutlierMethod},
};

/// Which occurrences of a duplicated row survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKeep {
    /// Keep the first occurrence of each key.
    First,
    /// Keep the last occurrence of each key.
    Last,
    /// Drop every row whose key occurs more than once.
    None,
}

/// What [`HandleOutliers`] does with flagged values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierAction {
    /// Clamp flagged values to the detection bounds.
    Cap,
    /// Replace flagged values with the column median, computed before
    /// modification.
    Replace,
    /// Drop the flagged rows.
    Remove,
}

/// Removes duplicate rows by exact value equality over a column subset.
///
/// Nulls compare equal to each other. Surviving rows keep their relative
/// order.
#[derive(Debug, Clone)]
pub struct RemoveDuplicates {
    subset: Option<Vec<String>>,
    keep: DuplicateKeep,
}

impl RemoveDuplicates {
    /// Creates the operation. `subset` of `None` compares whole rows.
    #[must_use]
    pub fn new(subset: Option<&[&str]>, keep: DuplicateKeep) -> Self {
        Self {
            subset: subset.map(|names| names.iter().map(|s| (*s).to_string()).collect()),
            keep,
        }
    }
}

impl CleanOp for RemoveDuplicates {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let key_indices: Vec<usize> = match &self.subset {
            Some(names) => names
                .iter()
                .map(|name| data.column_index(name))
                .collect::<Result<Vec<_>>>()?,
            None => (0..data.num_columns()).collect(),
        };

        let rows_before = data.num_rows();
        let batch = data.batch();
        let keys: Vec<String> = (0..rows_before)
            .map(|row| row_key(batch, row, &key_indices))
            .collect();

        let mask: BooleanArray = match self.keep {
            DuplicateKeep::First => {
                let mut seen = std::collections::HashSet::new();
                keys.iter().map(|k| Some(seen.insert(k.clone()))).collect()
            }
            DuplicateKeep::Last => {
                let mut last: HashMap<&str, usize> = HashMap::new();
                for (i, k) in keys.iter().enumerate() {
                    last.insert(k.as_str(), i);
                }
                keys.iter()
                    .enumerate()
                    .map(|(i, k)| Some(last[k.as_str()] == i))
                    .collect()
            }
            DuplicateKeep::None => {
                let mut counts: HashMap<&str, usize> = HashMap::new();
                for k in &keys {
                    *counts.entry(k.as_str()).or_insert(0) += 1;
                }
                keys.iter().map(|k| Some(counts[k.as_str()] == 1)).collect()
            }
        };

        let result = data.filter_rows(&mask)?;
        let rows_after = result.num_rows();
        let entry = CleaningLogEntry::with_rows(
            OpKind::RemoveDuplicates,
            format!("removed {} duplicate rows", rows_before - rows_after),
            rows_before,
            rows_after,
        );
        Ok((result, entry))
    }
}

/// Drops every row flagged as an outlier in any selected numeric column.
#[derive(Debug, Clone)]
pub struct RemoveOutliers {
    columns: Option<Vec<String>>,
    method: OutlierMethod,
}

impl RemoveOutliers {
    /// Creates the operation. `columns` of `None` scans all numeric columns.
    #[must_use]
    pub fn new(columns: Option<&[&str]>, method: OutlierMethod) -> Self {
        Self {
            columns: columns.map(|names| names.iter().map(|s| (*s).to_string()).collect()),
            method,
        }
    }
}

/// Resolves the numeric columns an outlier operation targets.
///
/// Explicitly named columns must exist and be numeric; `None` selects every
/// numeric column.
fn numeric_targets(data: &TabularDataset, columns: Option<&[String]>) -> Result<Vec<String>> {
    match columns {
        Some(names) => {
            for name in names {
                if !data.is_numeric(name)? {
                    return Err(Error::transform(format!(
                        "column '{name}' is not numeric"
                    )));
                }
            }
            Ok(names.to_vec())
        }
        None => {
            let mut targets = Vec::new();
            for name in data.column_names() {
                if data.is_numeric(&name)? {
                    targets.push(name);
                }
            }
            Ok(targets)
        }
    }
}

impl CleanOp for RemoveOutliers {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let targets = numeric_targets(&data, self.columns.as_deref())?;
        let rows_before = data.num_rows();

        let mut flagged = vec![false; rows_before];
        for name in &targets {
            let flags = outlier::column_flags(&data, name, self.method)?;
            for (row, flag) in flags.flags.iter().enumerate() {
                flagged[row] |= flag;
            }
        }

        let mask: BooleanArray = flagged.iter().map(|&f| Some(!f)).collect();
        let result = data.filter_rows(&mask)?;
        let rows_after = result.num_rows();
        let entry = CleaningLogEntry::with_rows(
            OpKind::RemoveOutliers,
            format!(
                "removed {} outlier rows across {} numeric columns",
                rows_before - rows_after,
                targets.len()
            ),
            rows_before,
            rows_after,
        );
        Ok((result, entry))
    }
}

/// Caps, replaces, or removes outliers in one numeric column.
#[derive(Debug, Clone)]
pub struct HandleOutliers {
    column: String,
    method: OutlierMethod,
    action: OutlierAction,
}

impl HandleOutliers {
    /// Creates the operation for a single column.
    #[must_use]
    pub fn new(column: &str, method: OutlierMethod, action: OutlierAction) -> Self {
        Self {
            column: column.to_string(),
            method,
            action,
        }
    }
}

impl CleanOp for HandleOutliers {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        if !data.is_numeric(&self.column)? {
            return Err(Error::transform(format!(
                "column '{}' is not numeric",
                self.column
            )));
        }

        let rows_before = data.num_rows();
        let flags = outlier::column_flags(&data, &self.column, self.method)?;
        let (Some(lower), Some(upper)) = (flags.lower, flags.upper) else {
            let entry = CleaningLogEntry::with_rows(
                OpKind::HandleOutliers,
                format!("no outlier bounds for '{}', nothing to do", self.column),
                rows_before,
                rows_before,
            );
            return Ok((data, entry));
        };
        if flags.count == 0 {
            // Leave the column untouched so an integer column is not
            // silently rewritten as Float64.
            let entry = CleaningLogEntry::with_rows(
                OpKind::HandleOutliers,
                format!("no outliers in '{}', nothing to do", self.column),
                rows_before,
                rows_before,
            );
            return Ok((data, entry));
        }

        match self.action {
            OutlierAction::Cap => {
                let values = data.numeric_values(&self.column)?;
                let capped: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| v.map(|x| x.clamp(lower, upper)))
                    .collect();
                let result = data
                    .with_column_replaced(&self.column, Arc::new(Float64Array::from(capped)))?;
                let entry = CleaningLogEntry::with_rows(
                    OpKind::HandleOutliers,
                    format!(
                        "capped {} outliers in '{}' to [{lower}, {upper}]",
                        flags.count, self.column
                    ),
                    rows_before,
                    rows_before,
                );
                Ok((result, entry))
            }
            OutlierAction::Replace => {
                let values = data.numeric_values(&self.column)?;
                let median = outlier::median(&values)
                    .ok_or_else(|| Error::transform("cannot replace in an all-null column"))?;
                let replaced: Vec<Option<f64>> = values
                    .iter()
                    .zip(&flags.flags)
                    .map(|(v, &flag)| if flag { Some(median) } else { *v })
                    .collect();
                let result = data
                    .with_column_replaced(&self.column, Arc::new(Float64Array::from(replaced)))?;
                let entry = CleaningLogEntry::with_rows(
                    OpKind::HandleOutliers,
                    format!(
                        "replaced {} outliers in '{}' with median {median}",
                        flags.count, self.column
                    ),
                    rows_before,
                    rows_before,
                );
                Ok((result, entry))
            }
            OutlierAction::Remove => {
                let mask: BooleanArray = flags.flags.iter().map(|&f| Some(!f)).collect();
                let result = data.filter_rows(&mask)?;
                let rows_after = result.num_rows();
                let entry = CleaningLogEntry::with_rows(
                    OpKind::HandleOutliers,
                    format!(
                        "removed {} outlier rows from '{}'",
                        rows_before - rows_after,
                        self.column
                    ),
                    rows_before,
                    rows_after,
                );
                Ok((result, entry))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplicated() -> TabularDataset {
        TabularDataset::from_csv_str("a,b\n1,x\n1,x\n2,y\n1,x\n3,z\n").unwrap()
    }

    #[test]
    fn test_remove_duplicates_keep_first() {
        let (result, entry) = RemoveDuplicates::new(None, DuplicateKeep::First)
            .apply(duplicated())
            .unwrap();
        assert_eq!(result.num_rows(), 3);
        assert_eq!(entry.rows_before, Some(5));
        // First occurrence survives in place.
        assert_eq!(result.numeric_values("a").unwrap()[0], Some(1.0));
    }

    #[test]
    fn test_remove_duplicates_keep_last() {
        let (result, _) = RemoveDuplicates::new(None, DuplicateKeep::Last)
            .apply(duplicated())
            .unwrap();
        assert_eq!(result.num_rows(), 3);
        // Rows 2, 3, 4 survive; order preserved.
        let a = result.numeric_values("a").unwrap();
        assert_eq!(a, vec![Some(2.0), Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_remove_duplicates_keep_none() {
        let (result, _) = RemoveDuplicates::new(None, DuplicateKeep::None)
            .apply(duplicated())
            .unwrap();
        // All three "1,x" rows gone.
        assert_eq!(result.num_rows(), 2);
    }

    #[test]
    fn test_remove_duplicates_subset() {
        let data = TabularDataset::from_csv_str("a,b\n1,x\n1,y\n2,z\n").unwrap();
        let (result, _) = RemoveDuplicates::new(Some(&["a"]), DuplicateKeep::First)
            .apply(data)
            .unwrap();
        assert_eq!(result.num_rows(), 2);
    }

    #[test]
    fn test_remove_duplicates_nulls_compare_equal() {
        let data = TabularDataset::from_csv_str("a,b\n1,\n1,\n2,y\n").unwrap();
        let (result, _) = RemoveDuplicates::new(None, DuplicateKeep::First)
            .apply(data)
            .unwrap();
        assert_eq!(result.num_rows(), 2);
    }

    #[test]
    fn test_remove_duplicates_missing_subset_column() {
        let result =
            RemoveDuplicates::new(Some(&["missing"]), DuplicateKeep::First).apply(duplicated());
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_remove_outliers_all_numeric() {
        let data = TabularDataset::from_csv_str("a,b\n1,x\n2,y\n3,z\n4,w\n100,v\n").unwrap();
        let (result, _) = RemoveOutliers::new(None, OutlierMethod::iqr())
            .apply(data)
            .unwrap();
        assert_eq!(result.num_rows(), 4);
    }

    #[test]
    fn test_remove_outliers_explicit_non_numeric_errors() {
        let data = TabularDataset::from_csv_str("a,b\n1,x\n2,y\n").unwrap();
        let result = RemoveOutliers::new(Some(&["b"]), OutlierMethod::iqr()).apply(data);
        assert!(matches!(result, Err(Error::Transform { .. })));
    }

    #[test]
    fn test_handle_outliers_cap() {
        let data = TabularDataset::from_csv_str("v\n1\n2\n3\n4\n100\n").unwrap();
        let (result, _) = HandleOutliers::new("v", OutlierMethod::iqr(), OutlierAction::Cap)
            .apply(data)
            .unwrap();
        // Fences are [-1, 7]; 100 clamps to 7. Row count unchanged.
        assert_eq!(result.num_rows(), 5);
        assert_eq!(result.numeric_values("v").unwrap()[4], Some(7.0));
        assert_eq!(
            result.column_type("v").unwrap(),
            crate::dataset::ColumnType::Float
        );
    }

    #[test]
    fn test_handle_outliers_replace_uses_premodification_median() {
        let data = TabularDataset::from_csv_str("v\n1\n2\n3\n4\n100\n").unwrap();
        let (result, _) = HandleOutliers::new("v", OutlierMethod::iqr(), OutlierAction::Replace)
            .apply(data)
            .unwrap();
        // Median of {1, 2, 3, 4, 100} is 3.
        assert_eq!(result.numeric_values("v").unwrap()[4], Some(3.0));
    }

    #[test]
    fn test_handle_outliers_remove() {
        let data = TabularDataset::from_csv_str("v\n1\n2\n3\n4\n100\n").unwrap();
        let (result, entry) = HandleOutliers::new("v", OutlierMethod::iqr(), OutlierAction::Remove)
            .apply(data)
            .unwrap();
        assert_eq!(result.num_rows(), 4);
        assert_eq!(entry.rows_after, Some(4));
    }

    #[test]
    fn test_handle_outliers_no_bounds_is_noop() {
        let data = TabularDataset::from_csv_str("v\n5\n5\n5\n").unwrap();
        let (result, entry) = HandleOutliers::new("v", OutlierMethod::zscore(), OutlierAction::Cap)
            .apply(data)
            .unwrap();
        assert_eq!(result.num_rows(), 3);
        // Constant column under z-score leaves the data untouched.
        assert_eq!(
            result.column_type("v").unwrap(),
            crate::dataset::ColumnType::Integer
        );
        assert!(entry.description.contains("nothing to do"));
    }

    #[test]
    fn test_handle_outliers_cap_without_outliers_keeps_column_type() {
        let data = TabularDataset::from_csv_str("v\n1\n2\n3\n4\n5\n").unwrap();
        let (result, entry) = HandleOutliers::new("v", OutlierMethod::iqr(), OutlierAction::Cap)
            .apply(data)
            .unwrap();
        // Nothing is flagged, so the integer column must not come back
        // as Float64.
        assert_eq!(
            result.column_type("v").unwrap(),
            crate::dataset::ColumnType::Integer
        );
        assert_eq!(result.num_rows(), 5);
        assert!(entry.description.contains("nothing to do"));
    }

    #[test]
    fn test_handle_outliers_non_numeric_errors() {
        let data = TabularDataset::from_csv_str("a,b\n1,x\n2,y\n").unwrap();
        let result =
            HandleOutliers::new("b", OutlierMethod::iqr(), OutlierAction::Cap).apply(data);
        assert!(matches!(result, Err(Error::Transform { .. })));
    }
}
