//! Read-only quality analysis: overviews, duplicate and outlier summaries,
//! and per-type column statistics.

use std::collections::{HashMap, HashSet};

use arrow::{
    array::{Array, TimestampMicrosecondArray},
    compute::cast,
    datatypes::{DataType, TimeUnit},
};
use chrono::DateTime;

use crate::{
    dataset::{cell_to_string, row_key, ColumnType, TabularDataset},
    error::{Error, Result},
    outlier::{self, OutlierMethod},
};

/// One row of the per-column overview table.
#[derive(Debug, Clone)]
pub struct ColumnOverview {
    /// Column name.
    pub column: String,
    /// Semantic column type.
    pub dtype: ColumnType,
    /// Number of nulls.
    pub null_count: usize,
    /// Nulls as a percentage of rows.
    pub null_pct: f64,
    /// Number of distinct non-null values.
    pub unique_count: usize,
    /// IQR outlier count; `None` for non-numeric columns.
    pub outlier_count: Option<usize>,
    /// IQR outliers as a percentage of rows; `None` for non-numeric columns.
    pub outlier_pct: Option<f64>,
}

/// Whole-table duplicate summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateSummary {
    /// Rows beyond the first occurrence of each distinct row.
    pub duplicate_rows: usize,
    /// Duplicates as a percentage of rows.
    pub percentage: f64,
}

/// Outlier summary for one numeric column.
#[derive(Debug, Clone)]
pub struct OutlierSummary {
    /// Column name.
    pub column: String,
    /// Flagged row count.
    pub count: usize,
    /// Flagged rows as a percentage of rows.
    pub percentage: f64,
    /// Lower fence, when defined.
    pub lower: Option<f64>,
    /// Upper fence, when defined.
    pub upper: Option<f64>,
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone)]
pub struct NumericStats {
    /// Column name.
    pub column: String,
    /// Non-null value count.
    pub count: usize,
    /// Mean of the non-null values.
    pub mean: Option<f64>,
    /// Sample standard deviation; `None` with fewer than two values.
    pub std: Option<f64>,
    /// Minimum non-null value.
    pub min: Option<f64>,
    /// Maximum non-null value.
    pub max: Option<f64>,
}

/// Descriptive statistics for one categorical or text column.
#[derive(Debug, Clone)]
pub struct CategoricalStats {
    /// Column name.
    pub column: String,
    /// Non-null value count.
    pub count: usize,
    /// Distinct non-null value count.
    pub unique: usize,
    /// First-encountered most frequent value.
    pub most_common: Option<String>,
}

/// Descriptive statistics for one datetime column.
#[derive(Debug, Clone)]
pub struct DatetimeStats {
    /// Column name.
    pub column: String,
    /// Non-null value count.
    pub count: usize,
    /// Earliest value, formatted `%Y-%m-%d %H:%M:%S`.
    pub start: Option<String>,
    /// Latest value, formatted the same way.
    pub end: Option<String>,
}

/// Per-type column statistics for a whole table.
#[derive(Debug, Clone, Default)]
pub struct ColumnStatistics {
    /// Numeric columns, in declaration order.
    pub numeric: Vec<NumericStats>,
    /// Text, categorical, and boolean columns.
    pub categorical: Vec<CategoricalStats>,
    /// Datetime columns.
    pub datetime: Vec<DatetimeStats>,
}

/// Every analysis the quality snapshot needs, gathered in one pass.
#[derive(Debug, Clone)]
pub struct QualitySnapshotParts {
    /// Per-column overview.
    pub overview: Vec<ColumnOverview>,
    /// Whole-table duplicate summary.
    pub duplicates: DuplicateSummary,
    /// Per-numeric-column outlier summaries.
    pub outliers: Vec<OutlierSummary>,
    /// Numeric and categorical column statistics.
    pub statistics: ColumnStatistics,
}

/// Read-only analyzer over an optional bound dataset.
///
/// Construct empty and bind with [`set_data`](Self::set_data), or start
/// bound with [`with_data`](Self::with_data). Every accessor returns
/// [`Error::NoData`] until a dataset is bound. Percentages are computed
/// against the current row count, with zero rows yielding zero percent.
#[derive(Debug, Clone, Default)]
pub struct QualityAnalyzer {
    data: Option<TabularDataset>,
}

impl QualityAnalyzer {
    /// Creates an analyzer with no dataset bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an analyzer bound to a dataset.
    #[must_use]
    pub fn with_data(data: TabularDataset) -> Self {
        Self { data: Some(data) }
    }

    /// Binds (or replaces) the dataset under analysis.
    pub fn set_data(&mut self, data: TabularDataset) {
        self.data = Some(data);
    }

    fn data(&self) -> Result<&TabularDataset> {
        self.data.as_ref().ok_or(Error::NoData)
    }

    /// Returns `(rows, columns)` of the bound dataset.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when no dataset is bound.
    pub fn shape(&self) -> Result<(usize, usize)> {
        Ok(self.data()?.shape())
    }

    /// Returns the first `n` rows.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when no dataset is bound.
    pub fn sample(&self, n: usize) -> Result<TabularDataset> {
        Ok(self.data()?.head(n))
    }

    /// Counts duplicate rows (occurrences beyond the first of each key).
    ///
    /// # Errors
    ///
    /// Returns `NoData` when no dataset is bound.
    pub fn duplicates_summary(&self) -> Result<DuplicateSummary> {
        let data = self.data()?;
        let rows = data.num_rows();
        let key_indices: Vec<usize> = (0..data.num_columns()).collect();
        let mut seen = HashSet::new();
        for row in 0..rows {
            seen.insert(row_key(data.batch(), row, &key_indices));
        }
        let duplicate_rows = rows - seen.len();
        Ok(DuplicateSummary {
            duplicate_rows,
            percentage: pct(duplicate_rows, rows),
        })
    }

    /// IQR outlier summary (1.5 multiplier) for every numeric column.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when no dataset is bound.
    pub fn outliers_summary(&self) -> Result<Vec<OutlierSummary>> {
        let data = self.data()?;
        let rows = data.num_rows();
        let mut summaries = Vec::new();
        for name in data.column_names() {
            if !data.is_numeric(&name)? {
                continue;
            }
            let flags = outlier::column_flags(data, &name, OutlierMethod::iqr())?;
            summaries.push(OutlierSummary {
                column: name,
                count: flags.count,
                percentage: pct(flags.count, rows),
                lower: flags.lower,
                upper: flags.upper,
            });
        }
        Ok(summaries)
    }

    /// Per-type descriptive statistics, for the requested groups only.
    ///
    /// Groups that are not requested come back empty and are never
    /// computed.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when no dataset is bound.
    pub fn column_statistics(
        &self,
        numeric: bool,
        categorical: bool,
        datetime: bool,
    ) -> Result<ColumnStatistics> {
        let data = self.data()?;
        let mut stats = ColumnStatistics::default();

        for name in data.column_names() {
            match data.column_type(&name)? {
                ColumnType::Integer | ColumnType::Float if numeric => {
                    stats.numeric.push(numeric_stats(data, &name)?);
                }
                ColumnType::DateTime if datetime => {
                    stats.datetime.push(datetime_stats(data, &name)?);
                }
                ColumnType::Text | ColumnType::Categorical | ColumnType::Boolean
                    if categorical =>
                {
                    stats.categorical.push(categorical_stats(data, &name)?);
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Gathers everything a quality snapshot reports.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when no dataset is bound.
    pub fn snapshot_parts(&self) -> Result<QualitySnapshotParts> {
        Ok(QualitySnapshotParts {
            overview: self.overview()?,
            duplicates: self.duplicates_summary()?,
            outliers: self.outliers_summary()?,
            statistics: self.column_statistics(true, true, false)?,
        })
    }

    /// Builds the per-column overview table.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when no dataset is bound.
    pub fn overview(&self) -> Result<Vec<ColumnOverview>> {
        let data = self.data()?;
        let rows = data.num_rows();
        let mut overviews = Vec::new();

        for name in data.column_names() {
            let dtype = data.column_type(&name)?;
            let null_count = data.null_count(&name)?;
            let unique_count = data.unique_count(&name)?;
            let (outlier_count, outlier_pct) = if dtype.is_numeric() {
                let flags = outlier::column_flags(data, &name, OutlierMethod::iqr())?;
                (Some(flags.count), Some(pct(flags.count, rows)))
            } else {
                (None, None)
            };
            overviews.push(ColumnOverview {
                column: name,
                dtype,
                null_count,
                null_pct: pct(null_count, rows),
                unique_count,
                outlier_count,
                outlier_pct,
            });
        }
        Ok(overviews)
    }
}

fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn numeric_stats(data: &TabularDataset, name: &str) -> Result<NumericStats> {
    let values = data.numeric_values(name)?;
    let non_null: Vec<f64> = values.iter().flatten().copied().collect();
    let count = non_null.len();

    let mean = if count > 0 {
        Some(non_null.iter().sum::<f64>() / count as f64)
    } else {
        None
    };
    let std = match (mean, count) {
        (Some(m), n) if n >= 2 => {
            let variance =
                non_null.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
            Some(variance.sqrt())
        }
        _ => None,
    };
    let min = non_null.iter().copied().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.min(v)))
    });
    let max = non_null.iter().copied().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    });

    Ok(NumericStats {
        column: name.to_string(),
        count,
        mean,
        std,
        min,
        max,
    })
}

fn categorical_stats(data: &TabularDataset, name: &str) -> Result<CategoricalStats> {
    let col = data.column(name)?;
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut count = 0usize;
    for i in 0..col.len() {
        if let Some(v) = cell_to_string(col, i) {
            *counts.entry(v).or_insert(0) += 1;
            count += 1;
        }
    }
    let unique = counts.len();

    // First row holding the modal value, so ties resolve deterministically.
    let most_common = counts.values().copied().max().and_then(|max| {
        (0..col.len()).find_map(|i| {
            cell_to_string(col, i).filter(|v| counts[v] == max)
        })
    });

    Ok(CategoricalStats {
        column: name.to_string(),
        count,
        unique,
        most_common,
    })
}

fn datetime_stats(data: &TabularDataset, name: &str) -> Result<DatetimeStats> {
    let col = data.column(name)?;
    let casted = cast(
        col.as_ref(),
        &DataType::Timestamp(TimeUnit::Microsecond, None),
    )
    .map_err(|e| Error::transform(format!("failed to cast '{name}' to timestamp: {e}")))?;
    let timestamps = casted
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| Error::transform("expected timestamp array after cast"))?;

    let mut count = 0usize;
    let mut min: Option<i64> = None;
    let mut max: Option<i64> = None;
    for i in 0..timestamps.len() {
        if timestamps.is_null(i) {
            continue;
        }
        let v = timestamps.value(i);
        count += 1;
        min = Some(min.map_or(v, |m| m.min(v)));
        max = Some(max.map_or(v, |m| m.max(v)));
    }

    let format = |micros: i64| {
        DateTime::from_timestamp_micros(micros)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
    };

    Ok(DatetimeStats {
        column: name.to_string(),
        count,
        start: min.and_then(format),
        end: max.and_then(format),
    })
}
