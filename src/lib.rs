//! limpiar - Tabular Data Quality and Cleaning in Pure Rust
//!
//! An Arrow-backed data-quality pipeline: load a table, measure its quality,
//! clean it with an auditable sequence of operations, and export the result
//! together with a plain-text report.
//!
//! # Design Principles
//!
//! 1. **Value-returning operations** - Every cleaning step takes a dataset
//!    and returns a new one plus a log entry; nothing mutates in place
//! 2. **Pure Rust** - No Python, no FFI
//! 3. **Zero-copy** - Arrow `RecordBatch` throughout, column buffers shared
//!    via `Arc`
//! 4. **Auditable** - Each operation appends exactly one entry to an
//!    append-only cleaning log
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use limpiar::{CleanConfig, DataPipeline};
//!
//! let mut pipeline = DataPipeline::new(true);
//! let outcome = pipeline
//!     .run_full_pipeline(Path::new("data.csv"), None, &CleanConfig::default(), true)
//!     .unwrap();
//! println!("quality score: {:?}", outcome.quality_score);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow common test patterns
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_lossless,
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::float_cmp,
        clippy::redundant_clone,
        clippy::too_many_lines,
        clippy::unreadable_literal
    )
)]
// Allow some pedantic lints for cleaner code
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::map_unwrap_or)]

pub mod analyze;
pub mod clean;
pub mod dataset;
pub mod error;
pub mod infer;
pub mod io;
pub mod outlier;
pub mod pipeline;

// Re-exports for convenience
// Re-export arrow types commonly needed
pub use arrow::{
    array::RecordBatch,
    datatypes::{Schema, SchemaRef},
};
pub use analyze::{
    CategoricalStats, ColumnOverview, ColumnStatistics, DatetimeStats, DuplicateSummary,
    NumericStats, OutlierSummary, QualityAnalyzer, QualitySnapshotParts,
};
pub use clean::{
    CleanOp, CleanText, CleaningLogEntry, CleaningReport, DataCleaner, DropColumns, DuplicateKeep,
    FillNulls, FillStrategy, FixColumnTypes, HandleOutliers, OpKind, OutlierAction, OutlierShare,
    RemoveDuplicates, RemoveNulls, RemoveOutliers, RenameColumns, StandardizeNames,
};
pub use dataset::{ColumnType, TabularDataset};
pub use error::{Error, Result};
pub use infer::{infer_column, infer_types, parse_datetime, InferredColumn};
pub use io::{export_table, load_table, FileFormat};
pub use outlier::{OutlierFlags, OutlierMethod};
pub use pipeline::{
    CleanConfig, DataPipeline, LogLevel, NullPolicy, PipelineOutcome, QualitySnapshot,
    RunLogEntry,
};
