//! Outlier detection over numeric columns.
//!
//! Two interchangeable algorithms: the IQR fence and the z-score test.
//! Both are pure functions of the column values and their parameters;
//! nulls are never flagged.

use crate::{
    dataset::TabularDataset,
    error::Result,
};

/// Outlier detection algorithm, selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierMethod {
    /// IQR fences: values strictly outside `[Q1 - m*IQR, Q3 + m*IQR]`.
    Iqr {
        /// Fence multiplier (1.5 is the conventional choice).
        multiplier: f64,
    },
    /// Z-score test: values with `|x - mean| / std > threshold`.
    ZScore {
        /// Number of standard deviations tolerated.
        threshold: f64,
    },
}

impl OutlierMethod {
    /// IQR method with the conventional 1.5 multiplier.
    #[must_use]
    pub fn iqr() -> Self {
        Self::Iqr { multiplier: 1.5 }
    }

    /// Z-score method with the conventional threshold of 3.
    #[must_use]
    pub fn zscore() -> Self {
        Self::ZScore { threshold: 3.0 }
    }
}

impl Default for OutlierMethod {
    fn default() -> Self {
        Self::iqr()
    }
}

/// Per-row outlier flags for one column, plus the bounds used.
///
/// Bounds are `None` when no meaningful fence exists (empty column, or a
/// constant column under the z-score test), in which case nothing is
/// flagged.
#[derive(Debug, Clone)]
pub struct OutlierFlags {
    /// One flag per row; nulls are always `false`.
    pub flags: Vec<bool>,
    /// Lower bound used for flagging, if defined.
    pub lower: Option<f64>,
    /// Upper bound used for flagging, if defined.
    pub upper: Option<f64>,
    /// Number of flagged rows.
    pub count: usize,
}

impl OutlierFlags {
    fn none(len: usize) -> Self {
        Self {
            flags: vec![false; len],
            lower: None,
            upper: None,
            count: 0,
        }
    }
}

/// Linear-interpolated quantile over a sorted, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

/// Median of the non-null values, if any exist.
pub(crate) fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut non_null: Vec<f64> = values.iter().flatten().copied().collect();
    if non_null.is_empty() {
        return None;
    }
    non_null.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(quantile(&non_null, 0.5))
}

/// Flags outliers in a column of nullable values.
///
/// - IQR: quartiles are computed over the non-null values with linear
///   interpolation; a value is an outlier iff strictly outside the fences.
///   An all-null column flags nothing.
/// - Z-score: mean and sample standard deviation over the non-null values;
///   a constant column (`std == 0`) or one with fewer than two values flags
///   nothing, special-cased so no NaN comparison is ever evaluated.
#[must_use]
pub fn detect(values: &[Option<f64>], method: OutlierMethod) -> OutlierFlags {
    let non_null: Vec<f64> = values.iter().flatten().copied().collect();

    let (lower, upper) = match method {
        OutlierMethod::Iqr { multiplier } => {
            if non_null.is_empty() {
                return OutlierFlags::none(values.len());
            }
            let mut sorted = non_null.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let q1 = quantile(&sorted, 0.25);
            let q3 = quantile(&sorted, 0.75);
            let iqr = q3 - q1;
            (q1 - multiplier * iqr, q3 + multiplier * iqr)
        }
        OutlierMethod::ZScore { threshold } => {
            if non_null.len() < 2 {
                return OutlierFlags::none(values.len());
            }
            let n = non_null.len() as f64;
            let mean = non_null.iter().sum::<f64>() / n;
            let variance = non_null.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let std = variance.sqrt();
            if std == 0.0 {
                return OutlierFlags::none(values.len());
            }
            (mean - threshold * std, mean + threshold * std)
        }
    };

    let flags: Vec<bool> = values
        .iter()
        .map(|v| match v {
            Some(x) => *x < lower || *x > upper,
            None => false,
        })
        .collect();
    let count = flags.iter().filter(|&&f| f).count();

    OutlierFlags {
        flags,
        lower: Some(lower),
        upper: Some(upper),
        count,
    }
}

/// Flags outliers in a named numeric column of a dataset.
///
/// # Errors
///
/// Returns `ColumnNotFound` for an absent column and a transform error for
/// a column that cannot be read as numeric.
pub fn column_flags(
    data: &TabularDataset,
    column: &str,
    method: OutlierMethod,
) -> Result<OutlierFlags> {
    let values = data.numeric_values(column)?;
    Ok(detect(&values, method))
}
