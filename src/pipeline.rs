//! Pipeline orchestration: load, analyze, clean, report, export.
//!
//! [`DataPipeline`] wires the loader, the [`QualityAnalyzer`] and the
//! [`DataCleaner`] into one run, keeping a timestamped run log for the
//! lifetime of the instance. A load failure aborts the run; failures in
//! later steps are logged at ERROR, mark the outcome as degraded, and the
//! run continues with the dataset it has.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    analyze::{QualityAnalyzer, QualitySnapshotParts},
    clean::{DataCleaner, DuplicateKeep, FillStrategy},
    dataset::TabularDataset,
    error::{Error, Result},
    io::{self, FileFormat},
    outlier::OutlierMethod,
};

/// Severity of a run-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Normal progress.
    Info,
    /// Recoverable oddity.
    Warning,
    /// A step failed.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One timestamped run-log entry.
#[derive(Debug, Clone)]
pub struct RunLogEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
}

impl fmt::Display for RunLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// How `auto_clean` treats null values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Drop rows containing any null.
    Drop,
    /// Fill numeric columns with their mean.
    FillMean,
    /// Fill numeric columns with their median.
    FillMedian,
    /// Fill every column with its most frequent value.
    FillMode,
    /// Fill numeric columns with zero.
    FillZero,
}

/// Configuration for [`DataPipeline::auto_clean`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Standardize column names first.
    pub standardize_columns: bool,
    /// Remove exact duplicate rows.
    pub remove_duplicates: bool,
    /// Null handling policy.
    pub nulls: NullPolicy,
    /// Remove IQR outliers (1.5 multiplier) from numeric columns.
    pub remove_outliers: bool,
    /// Run type inference over text columns last.
    pub infer_types: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            standardize_columns: true,
            remove_duplicates: true,
            nulls: NullPolicy::Drop,
            remove_outliers: false,
            infer_types: true,
        }
    }
}

/// A quality snapshot of the dataset before cleaning.
#[derive(Debug, Clone)]
pub struct QualitySnapshot {
    /// `(rows, columns)`.
    pub shape: (usize, usize),
    /// Analysis details: overview, duplicates, outliers, statistics.
    pub parts: QualitySnapshotParts,
    /// Nulls as a percentage of all cells.
    pub null_percentage: f64,
    /// Duplicate rows as a percentage of rows.
    pub duplicate_percentage: f64,
    /// `clamp(100 - 0.5 * null% - 0.5 * dup%, 0, 100)`.
    pub quality_score: f64,
}

/// Machine-readable result of a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// The input file.
    pub input_path: PathBuf,
    /// Where the cleaned data was written.
    pub output_path: PathBuf,
    /// Shape before cleaning.
    pub original_shape: (usize, usize),
    /// Shape after cleaning.
    pub final_shape: (usize, usize),
    /// Pre-clean quality score, when analysis succeeded.
    pub quality_score: Option<f64>,
    /// True when any post-load step failed.
    pub degraded: bool,
}

/// Scores a table on nulls and duplicates, 0 to 100.
#[must_use]
pub fn quality_score(null_percentage: f64, duplicate_percentage: f64) -> f64 {
    (100.0 - 0.5 * null_percentage - 0.5 * duplicate_percentage).clamp(0.0, 100.0)
}

/// End-to-end pipeline over one input file.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use limpiar::{CleanConfig, DataPipeline};
///
/// let mut pipeline = DataPipeline::new(false);
/// let outcome = pipeline
///     .run_full_pipeline(Path::new("data.csv"), None, &CleanConfig::default(), true)
///     .unwrap();
/// assert!(!outcome.degraded);
/// ```
#[derive(Debug, Default)]
pub struct DataPipeline {
    analyzer: QualityAnalyzer,
    cleaner: Option<DataCleaner>,
    data: Option<TabularDataset>,
    run_log: Vec<RunLogEntry>,
    verbose: bool,
}

impl DataPipeline {
    /// Creates a pipeline. With `verbose`, log entries also go to stdout.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    /// Returns the dataset, if one is loaded.
    #[must_use]
    pub fn data(&self) -> Option<&TabularDataset> {
        self.data.as_ref()
    }

    /// Returns the run log.
    #[must_use]
    pub fn run_log(&self) -> &[RunLogEntry] {
        &self.run_log
    }

    fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = RunLogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        };
        if self.verbose {
            println!("{entry}");
        }
        self.run_log.push(entry);
    }

    /// Loads the input file and binds it to the analyzer and cleaner.
    ///
    /// # Errors
    ///
    /// Propagates loader errors; a failed load leaves no dataset bound.
    pub fn load_data(&mut self, path: &Path, format: Option<FileFormat>) -> Result<&TabularDataset> {
        self.log(LogLevel::Info, format!("loading data from {}", path.display()));
        match io::load_table(path, format) {
            Ok(data) => {
                let (rows, cols) = data.shape();
                self.log(
                    LogLevel::Info,
                    format!("loaded {rows} rows, {cols} columns"),
                );
                self.analyzer.set_data(data.clone());
                self.cleaner = Some(DataCleaner::new(data.clone()));
                self.data = Some(data);
                Ok(self.data.as_ref().ok_or(Error::NoData)?)
            }
            Err(e) => {
                self.log(LogLevel::Error, format!("failed to load data: {e}"));
                Err(e)
            }
        }
    }

    /// Analyzes the loaded dataset and computes its quality score.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when nothing is loaded.
    pub fn analyze_data_quality(&mut self) -> Result<QualitySnapshot> {
        let data = self.data.as_ref().ok_or(Error::NoData)?.clone();
        self.log(LogLevel::Info, "analyzing data quality");

        let parts = self.analyzer.snapshot_parts()?;
        let (rows, cols) = data.shape();
        let cells = rows * cols;
        let null_percentage = if cells == 0 {
            0.0
        } else {
            data.total_null_count() as f64 / cells as f64 * 100.0
        };
        let duplicate_percentage = parts.duplicates.percentage;
        let score = quality_score(null_percentage, duplicate_percentage);

        self.log(LogLevel::Info, format!("quality score: {score:.2}/100"));
        self.log(LogLevel::Info, format!("null values: {null_percentage:.2}%"));
        self.log(
            LogLevel::Info,
            format!("duplicates: {duplicate_percentage:.2}%"),
        );

        Ok(QualitySnapshot {
            shape: (rows, cols),
            parts,
            null_percentage,
            duplicate_percentage,
            quality_score: score,
        })
    }

    /// Runs the automatic cleaning sequence.
    ///
    /// Fixed step order: standardize names, remove duplicates, null
    /// handling, outlier removal, type inference. Each step runs only when
    /// its flag is set and is logged individually.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when nothing is loaded; propagates the first step
    /// error.
    pub fn auto_clean(&mut self, config: &CleanConfig) -> Result<&TabularDataset> {
        if self.cleaner.is_none() {
            return Err(Error::NoData);
        }
        self.log(LogLevel::Info, "starting automatic cleaning");
        let original_shape = self
            .cleaner
            .as_ref()
            .map(|c| c.data().shape())
            .unwrap_or_default();

        if config.standardize_columns {
            self.cleaner_mut()?.standardize_column_names()?;
            self.log(LogLevel::Info, "standardized column names");
        }
        if config.remove_duplicates {
            self.cleaner_mut()?
                .remove_duplicates(None, DuplicateKeep::First)?;
            self.log(LogLevel::Info, "removed duplicate rows");
        }
        self.apply_null_policy(config.nulls)?;
        if config.remove_outliers {
            self.cleaner_mut()?
                .remove_outliers(None, OutlierMethod::iqr())?;
            self.log(LogLevel::Info, "removed outliers using IQR fences");
        }
        if config.infer_types {
            self.cleaner_mut()?.infer_types()?;
            self.log(LogLevel::Info, "inferred column types");
        }

        let data = self
            .cleaner
            .as_ref()
            .map(|c| c.data().clone())
            .ok_or(Error::NoData)?;
        let new_shape = data.shape();
        self.analyzer.set_data(data.clone());
        self.data = Some(data);
        self.log(
            LogLevel::Info,
            format!(
                "cleaning complete: {:?} to {:?}, removed {} rows",
                original_shape,
                new_shape,
                original_shape.0.saturating_sub(new_shape.0)
            ),
        );
        self.data.as_ref().ok_or(Error::NoData)
    }

    fn cleaner_mut(&mut self) -> Result<&mut DataCleaner> {
        self.cleaner.as_mut().ok_or(Error::NoData)
    }

    fn apply_null_policy(&mut self, policy: NullPolicy) -> Result<()> {
        match policy {
            NullPolicy::Drop => {
                self.cleaner_mut()?.remove_nulls(None, None)?;
                self.log(LogLevel::Info, "removed rows with null values");
            }
            NullPolicy::FillMean | NullPolicy::FillMedian | NullPolicy::FillZero => {
                let strategy = match policy {
                    NullPolicy::FillMean => FillStrategy::Mean,
                    NullPolicy::FillMedian => FillStrategy::Median,
                    _ => FillStrategy::Zero,
                };
                let numeric = self.numeric_columns()?;
                if numeric.is_empty() {
                    self.log(LogLevel::Warning, "no numeric columns to fill");
                } else {
                    let names: Vec<&str> = numeric.iter().map(String::as_str).collect();
                    self.cleaner_mut()?.fill_nulls(Some(&names), strategy)?;
                    self.log(LogLevel::Info, "filled nulls in numeric columns");
                }
            }
            NullPolicy::FillMode => {
                self.cleaner_mut()?.fill_nulls(None, FillStrategy::Mode)?;
                self.log(LogLevel::Info, "filled nulls with mode values");
            }
        }
        Ok(())
    }

    fn numeric_columns(&self) -> Result<Vec<String>> {
        let data = self
            .cleaner
            .as_ref()
            .map(DataCleaner::data)
            .ok_or(Error::NoData)?;
        let mut numeric = Vec::new();
        for name in data.column_names() {
            if data.is_numeric(&name)? {
                numeric.push(name);
            }
        }
        Ok(numeric)
    }

    /// Writes the plain-text quality report and returns its content.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when nothing is loaded and an I/O error when the
    /// file cannot be written.
    pub fn generate_report(&mut self, path: &Path) -> Result<String> {
        if self.data.is_none() {
            return Err(Error::NoData);
        }
        self.log(
            LogLevel::Info,
            format!("generating report: {}", path.display()),
        );

        let text = self.render_report()?;
        std::fs::write(path, &text).map_err(|e| Error::io(e, path))?;
        self.log(
            LogLevel::Info,
            format!("report saved to {}", path.display()),
        );
        Ok(text)
    }

    fn render_report(&self) -> Result<String> {
        let data = self.data.as_ref().ok_or(Error::NoData)?;
        let heavy_rule = "=".repeat(80);
        let light_rule = "-".repeat(80);
        let mut lines = Vec::new();

        lines.push(heavy_rule.clone());
        lines.push("DATA QUALITY REPORT".to_string());
        lines.push(heavy_rule.clone());
        lines.push(format!(
            "Generated: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));
        let (rows, cols) = data.shape();
        lines.push(format!("Dataset Shape: {rows} rows x {cols} columns"));
        lines.push(String::new());

        lines.push(light_rule.clone());
        lines.push("COLUMN OVERVIEW".to_string());
        lines.push(light_rule.clone());
        for entry in self.analyzer.overview()? {
            lines.push(format!(
                "{}: type={}, nulls={} ({:.2}%), unique={}{}",
                entry.column,
                entry.dtype,
                entry.null_count,
                entry.null_pct,
                entry.unique_count,
                match (entry.outlier_count, entry.outlier_pct) {
                    (Some(count), Some(p)) => format!(", outliers={count} ({p:.2}%)"),
                    _ => String::new(),
                }
            ));
        }
        lines.push(String::new());

        lines.push(light_rule.clone());
        lines.push("DUPLICATES".to_string());
        lines.push(light_rule.clone());
        let duplicates = self.analyzer.duplicates_summary()?;
        lines.push(format!(
            "{} duplicate rows ({:.2}%)",
            duplicates.duplicate_rows, duplicates.percentage
        ));
        lines.push(String::new());

        lines.push(light_rule.clone());
        lines.push("NUMERIC STATISTICS".to_string());
        lines.push(light_rule.clone());
        let stats = self.analyzer.column_statistics(true, false, false)?;
        if stats.numeric.is_empty() {
            lines.push("No numeric columns found".to_string());
        } else {
            for s in &stats.numeric {
                lines.push(format!(
                    "{}: count={}, mean={}, std={}, min={}, max={}",
                    s.column,
                    s.count,
                    fmt_opt(s.mean),
                    fmt_opt(s.std),
                    fmt_opt(s.min),
                    fmt_opt(s.max)
                ));
            }
        }
        lines.push(String::new());

        if let Some(cleaner) = &self.cleaner {
            if !cleaner.log().is_empty() {
                lines.push(light_rule.clone());
                lines.push("CLEANING HISTORY".to_string());
                lines.push(light_rule.clone());
                for entry in cleaner.log() {
                    lines.push(format!("  - {entry}"));
                }
                lines.push(String::new());
            }
        }

        lines.push(light_rule.clone());
        lines.push("PIPELINE LOG".to_string());
        lines.push(light_rule);
        for entry in &self.run_log {
            lines.push(entry.to_string());
        }
        lines.push(heavy_rule);

        Ok(lines.join("\n"))
    }

    /// Exports the current dataset.
    ///
    /// # Errors
    ///
    /// Returns `NoData` when nothing is loaded; propagates exporter errors.
    pub fn export_data(&mut self, path: &Path, format: Option<FileFormat>) -> Result<()> {
        let data = self.data.as_ref().ok_or(Error::NoData)?.clone();
        self.log(
            LogLevel::Info,
            format!("exporting data to {}", path.display()),
        );
        match io::export_table(&data, path, format) {
            Ok(()) => {
                self.log(LogLevel::Info, "data exported");
                Ok(())
            }
            Err(e) => {
                self.log(LogLevel::Error, format!("failed to export data: {e}"));
                Err(e)
            }
        }
    }

    /// Runs load, analyze, clean, report, and export as one sequence.
    ///
    /// `output` defaults to `cleaned_<stem>.csv` next to the input; the
    /// report goes to `<output stem>_report.txt`.
    ///
    /// # Errors
    ///
    /// A load failure is fatal and returned as `Err`. Any later failure is
    /// logged at ERROR and reflected in [`PipelineOutcome::degraded`].
    pub fn run_full_pipeline(
        &mut self,
        input: &Path,
        output: Option<&Path>,
        config: &CleanConfig,
        write_report: bool,
    ) -> Result<PipelineOutcome> {
        self.log(LogLevel::Info, "starting full data pipeline");

        let output_path = match output {
            Some(p) => p.to_path_buf(),
            None => default_output_path(input),
        };

        self.load_data(input, None)?;
        let original_shape = self.data.as_ref().ok_or(Error::NoData)?.shape();
        let mut degraded = false;

        let score = match self.analyze_data_quality() {
            Ok(snapshot) => Some(snapshot.quality_score),
            Err(e) => {
                self.log(LogLevel::Error, format!("quality analysis failed: {e}"));
                degraded = true;
                None
            }
        };

        if let Err(e) = self.auto_clean(config) {
            self.log(LogLevel::Error, format!("automatic cleaning failed: {e}"));
            degraded = true;
        }

        if write_report {
            let report_path = report_path_for(&output_path);
            if let Err(e) = self.generate_report(&report_path) {
                self.log(LogLevel::Error, format!("report generation failed: {e}"));
                degraded = true;
            }
        }

        if let Err(e) = self.export_data(&output_path, None) {
            self.log(LogLevel::Error, format!("export failed: {e}"));
            degraded = true;
        }

        let final_shape = self.data.as_ref().ok_or(Error::NoData)?.shape();
        self.log(LogLevel::Info, "pipeline completed");

        Ok(PipelineOutcome {
            input_path: input.to_path_buf(),
            output_path,
            original_shape,
            final_shape,
            quality_score: score,
            degraded,
        })
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

/// `cleaned_<stem>.csv`, next to the input file.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    input.with_file_name(format!("cleaned_{stem}.csv"))
}

/// `<output stem>_report.txt`, next to the output file.
fn report_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output.with_file_name(format!("{stem}_report.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let config = CleanConfig::default();
        assert!(config.standardize_columns);
        assert!(config.remove_duplicates);
        assert_eq!(config.nulls, NullPolicy::Drop);
        assert!(!config.remove_outliers);
        assert!(config.infer_types);
    }

    #[test]
    fn test_quality_score_formula() {
        assert_eq!(quality_score(0.0, 0.0), 100.0);
        assert!((quality_score(10.0, 20.0) - 85.0).abs() < 1e-9);
        assert_eq!(quality_score(300.0, 0.0), 0.0);
    }

    #[test]
    fn test_run_log_entry_format() {
        let entry = RunLogEntry {
            timestamp: DateTime::from_timestamp(1_704_067_200, 0).unwrap(),
            level: LogLevel::Warning,
            message: "something odd".to_string(),
        };
        assert_eq!(
            entry.to_string(),
            "[2024-01-01 00:00:00] [WARNING] something odd"
        );
    }

    #[test]
    fn test_analyze_without_data_fails() {
        let mut pipeline = DataPipeline::new(false);
        assert!(matches!(
            pipeline.analyze_data_quality(),
            Err(Error::NoData)
        ));
        assert!(matches!(
            pipeline.auto_clean(&CleanConfig::default()),
            Err(Error::NoData)
        ));
    }

    #[test]
    fn test_load_failure_is_logged_and_fatal() {
        let mut pipeline = DataPipeline::new(false);
        let result = pipeline.load_data(Path::new("/nonexistent/input.csv"), None);
        assert!(result.is_err());
        assert!(pipeline
            .run_log()
            .iter()
            .any(|e| e.level == LogLevel::Error));
    }

    #[test]
    fn test_default_output_and_report_paths() {
        let out = default_output_path(Path::new("/data/trips.csv"));
        assert_eq!(out, PathBuf::from("/data/cleaned_trips.csv"));
        let report = report_path_for(&out);
        assert_eq!(report, PathBuf::from("/data/cleaned_trips_report.txt"));
    }

    #[test]
    fn test_clean_config_serde_roundtrip() {
        let config = CleanConfig {
            nulls: NullPolicy::FillMedian,
            ..CleanConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("fill_median"));
        let back: CleanConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_auto_clean_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.csv");
        std::fs::write(&input, "Col A,Col B\n1,x\n1,x\n2,\n3,z\n").unwrap();

        let mut pipeline = DataPipeline::new(false);
        pipeline.load_data(&input, None).unwrap();
        let cleaned = pipeline.auto_clean(&CleanConfig::default()).unwrap();

        // Duplicate row and the null row are gone; names standardized.
        assert_eq!(cleaned.num_rows(), 2);
        assert_eq!(cleaned.column_names(), vec!["col_a", "col_b"]);
    }

    #[test]
    fn test_snapshot_quality_score() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.csv");
        // 4 rows, 1 duplicate (25%), no nulls: score 100 - 12.5 = 87.5.
        std::fs::write(&input, "a,b\n1,x\n1,x\n2,y\n3,z\n").unwrap();

        let mut pipeline = DataPipeline::new(false);
        pipeline.load_data(&input, None).unwrap();
        let snapshot = pipeline.analyze_data_quality().unwrap();
        assert!((snapshot.quality_score - 87.5).abs() < 1e-9);
        assert_eq!(snapshot.shape, (4, 2));
    }
}
