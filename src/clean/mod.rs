//! Cleaning operations and the stateful cleaning engine.
//!
//! Every operation is a value-returning [`CleanOp`]: it takes a dataset,
//! produces a new dataset plus exactly one [`CleaningLogEntry`], and never
//! mutates its input. [`DataCleaner`] is the stateful fold over these
//! operations: it owns the working dataset, a snapshot of the original for
//! resets, and the append-only operation log.

use std::fmt;

use crate::{
    dataset::TabularDataset,
    error::Result,
    infer,
    outlier::{self, OutlierMethod},
};

mod columns;
mod nulls;
mod rows;

pub use columns::{CleanText, DropColumns, FixColumnTypes, RenameColumns, StandardizeNames};
pub use nulls::{FillNulls, FillStrategy, RemoveNulls};
pub use rows::{DuplicateKeep, HandleOutliers, OutlierAction, RemoveDuplicates, RemoveOutliers};

/// The kind of cleaning operation a log entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Rows with nulls removed.
    RemoveNulls,
    /// Nulls filled in place.
    FillNulls,
    /// Duplicate rows removed.
    RemoveDuplicates,
    /// Rows flagged as outliers removed.
    RemoveOutliers,
    /// Outliers capped, replaced, or removed in one column.
    HandleOutliers,
    /// Explicit per-column type coercion.
    FixColumnTypes,
    /// Columns dropped.
    DropColumns,
    /// Columns renamed.
    RenameColumns,
    /// Text columns normalized.
    CleanText,
    /// Column names standardized.
    StandardizeNames,
    /// Text columns promoted by type inference.
    InferTypes,
    /// Working dataset restored to the original snapshot.
    Reset,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RemoveNulls => "remove_nulls",
            Self::FillNulls => "fill_nulls",
            Self::RemoveDuplicates => "remove_duplicates",
            Self::RemoveOutliers => "remove_outliers",
            Self::HandleOutliers => "handle_outliers",
            Self::FixColumnTypes => "fix_column_types",
            Self::DropColumns => "drop_columns",
            Self::RenameColumns => "rename_columns",
            Self::CleanText => "clean_text",
            Self::StandardizeNames => "standardize_column_names",
            Self::InferTypes => "infer_types",
            Self::Reset => "reset",
        };
        write!(f, "{name}")
    }
}

/// One immutable record of a cleaning operation's effect.
#[derive(Debug, Clone)]
pub struct CleaningLogEntry {
    /// Operation kind.
    pub kind: OpKind,
    /// Human-readable description, including any soft-failure warnings.
    pub description: String,
    /// Row count before the operation, when row counts are meaningful.
    pub rows_before: Option<usize>,
    /// Row count after the operation.
    pub rows_after: Option<usize>,
}

impl CleaningLogEntry {
    /// Creates an entry without row counts.
    #[must_use]
    pub fn new(kind: OpKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            rows_before: None,
            rows_after: None,
        }
    }

    /// Creates an entry with before/after row counts.
    #[must_use]
    pub fn with_rows(
        kind: OpKind,
        description: impl Into<String>,
        rows_before: usize,
        rows_after: usize,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            rows_before: Some(rows_before),
            rows_after: Some(rows_after),
        }
    }
}

impl fmt::Display for CleaningLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.rows_before, self.rows_after) {
            (Some(before), Some(after)) => {
                write!(
                    f,
                    "[{}] {} ({} -> {} rows)",
                    self.kind, self.description, before, after
                )
            }
            _ => write!(f, "[{}] {}", self.kind, self.description),
        }
    }
}

/// A cleaning operation: dataset in, dataset plus one log entry out.
pub trait CleanOp: Send + Sync {
    /// Applies the operation.
    ///
    /// # Errors
    ///
    /// Returns an error when the operation cannot be applied; batch
    /// operations record per-column soft failures in the log entry instead
    /// of failing.
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)>;
}

/// Per-column outlier share, for the read-only percentage report.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierShare {
    /// Column name.
    pub column: String,
    /// Number of flagged rows.
    pub count: usize,
    /// Percentage of rows flagged, against the current row count.
    pub percentage: f64,
}

/// Summary of a cleaner's cumulative effect.
#[derive(Debug, Clone)]
pub struct CleaningReport {
    /// Shape of the dataset when the cleaner was constructed.
    pub original_shape: (usize, usize),
    /// Shape of the working dataset now.
    pub current_shape: (usize, usize),
    /// Rows removed since construction.
    pub rows_removed: usize,
    /// Columns removed since construction.
    pub columns_removed: usize,
    /// The full operation log, in application order.
    pub log: Vec<CleaningLogEntry>,
}

/// Stateful cleaning engine over one table.
///
/// Holds the working dataset, a snapshot of the original for
/// [`reset_to_original`](Self::reset_to_original), and the append-only log.
/// One instance per table; no shared mutable state between instances.
///
/// # Example
///
/// ```no_run
/// use limpiar::{DataCleaner, DuplicateKeep, TabularDataset};
///
/// let data = TabularDataset::from_csv_str("a,b\n1,x\n1,x\n2,y\n").unwrap();
/// let mut cleaner = DataCleaner::new(data);
/// cleaner.remove_duplicates(None, DuplicateKeep::First).unwrap();
/// assert_eq!(cleaner.data().num_rows(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct DataCleaner {
    original: TabularDataset,
    data: TabularDataset,
    original_shape: (usize, usize),
    log: Vec<CleaningLogEntry>,
}

impl DataCleaner {
    /// Creates a cleaner over a snapshot of the given dataset.
    #[must_use]
    pub fn new(data: TabularDataset) -> Self {
        let original_shape = data.shape();
        Self {
            original: data.clone(),
            data,
            original_shape,
            log: Vec::new(),
        }
    }

    /// Returns the working dataset.
    #[must_use]
    pub fn data(&self) -> &TabularDataset {
        &self.data
    }

    /// Consumes the cleaner, returning the working dataset.
    #[must_use]
    pub fn into_data(self) -> TabularDataset {
        self.data
    }

    /// Returns the shape the dataset had at construction.
    #[must_use]
    pub fn original_shape(&self) -> (usize, usize) {
        self.original_shape
    }

    /// Returns the operation log.
    #[must_use]
    pub fn log(&self) -> &[CleaningLogEntry] {
        &self.log
    }

    /// Applies any [`CleanOp`] and records its log entry.
    ///
    /// # Errors
    ///
    /// Propagates the operation's error; on error neither the dataset nor
    /// the log changes.
    pub fn run(&mut self, op: &dyn CleanOp) -> Result<&TabularDataset> {
        let (data, entry) = op.apply(self.data.clone())?;
        self.data = data;
        self.log.push(entry);
        Ok(&self.data)
    }

    /// Drops rows failing the null-count requirement.
    ///
    /// With `min_non_null` unset, a row must have zero nulls across the
    /// selected columns (all columns when `columns` is `None`); otherwise it
    /// must have at least `min_non_null` non-null values among them.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` when a selected column is absent.
    pub fn remove_nulls(
        &mut self,
        columns: Option<&[&str]>,
        min_non_null: Option<usize>,
    ) -> Result<&TabularDataset> {
        self.run(&RemoveNulls::new(columns, min_non_null))
    }

    /// Fills nulls in the selected columns with the given strategy.
    ///
    /// Columns where the strategy cannot produce a value (entirely null
    /// under mean/median/mode, or a type mismatch) are soft failures: noted
    /// in the log entry, never aborting the batch.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` when a selected column is absent.
    pub fn fill_nulls(
        &mut self,
        columns: Option<&[&str]>,
        strategy: FillStrategy,
    ) -> Result<&TabularDataset> {
        self.run(&FillNulls::new(columns, strategy))
    }

    /// Removes duplicate rows, compared by exact value equality over
    /// `subset` (or all columns).
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` when a subset column is absent.
    pub fn remove_duplicates(
        &mut self,
        subset: Option<&[&str]>,
        keep: DuplicateKeep,
    ) -> Result<&TabularDataset> {
        self.run(&RemoveDuplicates::new(subset, keep))
    }

    /// Drops every row flagged as an outlier in any selected column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` for an absent column and a transform error
    /// when an explicitly selected column is not numeric.
    pub fn remove_outliers(
        &mut self,
        columns: Option<&[&str]>,
        method: OutlierMethod,
    ) -> Result<&TabularDataset> {
        self.run(&RemoveOutliers::new(columns, method))
    }

    /// Caps, replaces, or removes outliers in a single column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` for an absent column and a transform error
    /// when the column is not numeric.
    pub fn handle_outliers(
        &mut self,
        column: &str,
        method: OutlierMethod,
        action: OutlierAction,
    ) -> Result<&TabularDataset> {
        self.run(&HandleOutliers::new(column, method, action))
    }

    /// Coerces columns to the requested semantic types.
    ///
    /// A failed coercion for one column is a soft failure recorded in the
    /// log entry; the remaining columns are still coerced.
    ///
    /// # Errors
    ///
    /// Returns an error only when rebuilding the dataset fails.
    pub fn fix_column_types(
        &mut self,
        mapping: &[(&str, crate::dataset::ColumnType)],
    ) -> Result<&TabularDataset> {
        self.run(&FixColumnTypes::new(mapping))
    }

    /// Drops the named columns; absent names are silently ignored.
    ///
    /// # Errors
    ///
    /// Returns a transform error when the drop would remove every column.
    pub fn drop_columns(&mut self, names: &[&str]) -> Result<&TabularDataset> {
        self.run(&DropColumns::new(names))
    }

    /// Renames columns; only present keys apply.
    ///
    /// # Errors
    ///
    /// Returns an error only when rebuilding the dataset fails.
    pub fn rename_columns(&mut self, mapping: &[(&str, &str)]) -> Result<&TabularDataset> {
        self.run(&RenameColumns::new(mapping))
    }

    /// Normalizes text columns: case-fold, strip special characters, trim.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` when a selected column is absent.
    pub fn clean_text_columns(
        &mut self,
        columns: Option<&[&str]>,
        lowercase: bool,
        strip_special: bool,
    ) -> Result<&TabularDataset> {
        self.run(&CleanText::new(columns, lowercase, strip_special))
    }

    /// Standardizes column names to `[a-z0-9_]`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error only when rebuilding the dataset fails.
    pub fn standardize_column_names(&mut self) -> Result<&TabularDataset> {
        self.run(&StandardizeNames)
    }

    /// Runs best-effort type inference over all text columns.
    ///
    /// # Errors
    ///
    /// Returns an error only when rebuilding the dataset fails.
    pub fn infer_types(&mut self) -> Result<&TabularDataset> {
        let (data, converted) = infer::infer_types(self.data.clone())?;
        let description = if converted.is_empty() {
            "no text columns converted".to_string()
        } else {
            let names: Vec<String> = converted
                .iter()
                .map(|(name, ty)| format!("{name} -> {ty}"))
                .collect();
            format!("converted {} columns: {}", converted.len(), names.join(", "))
        };
        self.data = data;
        self.log
            .push(CleaningLogEntry::new(OpKind::InferTypes, description));
        Ok(&self.data)
    }

    /// Restores the working dataset to the original snapshot.
    ///
    /// The log keeps appending; it is reset only by constructing a new
    /// cleaner.
    pub fn reset_to_original(&mut self) -> &TabularDataset {
        let (rows_before, _) = self.data.shape();
        self.data = self.original.clone();
        self.log.push(CleaningLogEntry::with_rows(
            OpKind::Reset,
            "restored dataset to original".to_string(),
            rows_before,
            self.data.num_rows(),
        ));
        &self.data
    }

    /// Per-numeric-column outlier percentages, sorted descending.
    ///
    /// Ties keep the original column order. Read-only: no log entry.
    ///
    /// # Errors
    ///
    /// Returns an error when a numeric column cannot be read.
    pub fn outlier_percentage_report(&self, method: OutlierMethod) -> Result<Vec<OutlierShare>> {
        let rows = self.data.num_rows();
        let mut shares = Vec::new();
        for name in self.data.column_names() {
            if !self.data.is_numeric(&name)? {
                continue;
            }
            let flags = outlier::column_flags(&self.data, &name, method)?;
            let percentage = if rows > 0 {
                flags.count as f64 / rows as f64 * 100.0
            } else {
                0.0
            };
            shares.push(OutlierShare {
                column: name,
                count: flags.count,
                percentage,
            });
        }
        // Stable sort keeps original column order on ties.
        shares.sort_by(|a, b| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(shares)
    }

    /// Returns the cumulative cleaning report.
    #[must_use]
    pub fn get_cleaning_report(&self) -> CleaningReport {
        let current_shape = self.data.shape();
        CleaningReport {
            original_shape: self.original_shape,
            current_shape,
            rows_removed: self.original_shape.0.saturating_sub(current_shape.0),
            columns_removed: self.original_shape.1.saturating_sub(current_shape.1),
            log: self.log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnType;

    fn sample() -> TabularDataset {
        TabularDataset::from_csv_str("a,b\n1,x\n1,x\n2,y\n100,z\n").unwrap()
    }

    #[test]
    fn test_each_operation_appends_one_entry() {
        let mut cleaner = DataCleaner::new(sample());
        cleaner
            .remove_duplicates(None, DuplicateKeep::First)
            .unwrap();
        assert_eq!(cleaner.log().len(), 1);
        cleaner.standardize_column_names().unwrap();
        assert_eq!(cleaner.log().len(), 2);
        cleaner.infer_types().unwrap();
        assert_eq!(cleaner.log().len(), 3);
    }

    #[test]
    fn test_failed_operation_leaves_state_untouched() {
        let mut cleaner = DataCleaner::new(sample());
        let result = cleaner.remove_nulls(Some(&["missing"]), None);
        assert!(result.is_err());
        assert_eq!(cleaner.log().len(), 0);
        assert_eq!(cleaner.data().num_rows(), 4);
    }

    #[test]
    fn test_reset_to_original() {
        let mut cleaner = DataCleaner::new(sample());
        cleaner
            .remove_duplicates(None, DuplicateKeep::First)
            .unwrap();
        assert_eq!(cleaner.data().num_rows(), 3);

        cleaner.reset_to_original();
        assert_eq!(cleaner.data().num_rows(), 4);
        // Reset appends; the log is never truncated.
        assert_eq!(cleaner.log().len(), 2);
    }

    #[test]
    fn test_cleaning_report_counts() {
        let mut cleaner = DataCleaner::new(sample());
        cleaner
            .remove_duplicates(None, DuplicateKeep::First)
            .unwrap();
        cleaner.drop_columns(&["b"]).unwrap();

        let report = cleaner.get_cleaning_report();
        assert_eq!(report.original_shape, (4, 2));
        assert_eq!(report.current_shape, (3, 1));
        assert_eq!(report.rows_removed, 1);
        assert_eq!(report.columns_removed, 1);
        assert_eq!(report.log.len(), 2);
    }

    #[test]
    fn test_outlier_percentage_report_sorted() {
        let data =
            TabularDataset::from_csv_str("a,b\n1,5\n2,5\n3,5\n4,5\n100,5\n").unwrap();
        let cleaner = DataCleaner::new(data);
        let report = cleaner
            .outlier_percentage_report(OutlierMethod::iqr())
            .unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].column, "a");
        assert!((report[0].percentage - 20.0).abs() < 1e-9);
        assert_eq!(report[1].count, 0);
    }

    #[test]
    fn test_outlier_report_tie_keeps_column_order() {
        let data = TabularDataset::from_csv_str("x,y\n1,1\n2,2\n3,3\n").unwrap();
        let cleaner = DataCleaner::new(data);
        let report = cleaner
            .outlier_percentage_report(OutlierMethod::iqr())
            .unwrap();
        assert_eq!(report[0].column, "x");
        assert_eq!(report[1].column, "y");
    }

    #[test]
    fn test_fix_column_types_via_cleaner() {
        let mut cleaner = DataCleaner::new(sample());
        cleaner
            .fix_column_types(&[("a", ColumnType::Float)])
            .unwrap();
        assert_eq!(
            cleaner.data().column_type("a").unwrap(),
            ColumnType::Float
        );
    }

    #[test]
    fn test_log_entry_display() {
        let entry =
            CleaningLogEntry::with_rows(OpKind::RemoveDuplicates, "removed 1 duplicate", 4, 3);
        let rendered = entry.to_string();
        assert!(rendered.contains("remove_duplicates"));
        assert!(rendered.contains("4 -> 3 rows"));
    }
}
