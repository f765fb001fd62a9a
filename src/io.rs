//! File loading and export.
//!
//! CSV and line-delimited JSON go through the Arrow readers and writers,
//! with schemas inferred from the data. Excel workbooks are read through
//! `calamine` (first sheet, first row as header); there is no Excel writer,
//! so exporting to an Excel target is rejected.

use std::{
    fs::File,
    io::{BufReader, Seek},
    path::Path,
    sync::Arc,
};

use arrow::{
    array::{
        Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
        TimestampMicrosecondArray,
    },
    datatypes::{Field, Schema},
};
use arrow_csv::{reader::Format, ReaderBuilder as CsvReaderBuilder, WriterBuilder as CsvWriterBuilder};
use arrow_json::{reader::infer_json_schema_from_seekable, LineDelimitedWriter, ReaderBuilder as JsonReaderBuilder};

use crate::{
    dataset::TabularDataset,
    error::{Error, Result},
};

const BATCH_SIZE: usize = 8192;
const INFER_LIMIT: usize = 1000;

/// Supported file formats, detected from the path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// Excel workbooks. Readable (first sheet); not writable.
    Excel,
    /// Line-delimited JSON.
    Json,
}

impl FileFormat {
    /// Detects the format from a path extension.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for a missing or unknown extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| Error::unsupported_format(path.display().to_string()))?;
        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "xls" => Ok(Self::Excel),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(Error::unsupported_format(other)),
        }
    }
}

/// Loads a table from a file.
///
/// The format is detected from the extension unless given explicitly.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for unknown extensions and Excel files, an
/// I/O error when the file cannot be opened, a load error for malformed
/// content, and `EmptyDataset` for a file with no data rows.
pub fn load_table(path: &Path, format: Option<FileFormat>) -> Result<TabularDataset> {
    let format = match format {
        Some(f) => f,
        None => FileFormat::from_path(path)?,
    };
    match format {
        FileFormat::Csv => load_csv(path),
        FileFormat::Json => load_json(path),
        FileFormat::Excel => load_excel(path),
    }
}

fn load_csv(path: &Path) -> Result<TabularDataset> {
    let mut file = File::open(path).map_err(|e| Error::io(e, path))?;

    let format = Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(&mut file, Some(INFER_LIMIT))
        .map_err(|e| Error::load(format!("cannot infer schema for {}: {e}", path.display())))?;
    file.rewind().map_err(|e| Error::io(e, path))?;

    let schema = Arc::new(schema);
    let reader = CsvReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .build(file)
        .map_err(|e| Error::load(format!("cannot read {}: {e}", path.display())))?;

    let batches: Vec<RecordBatch> = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::load(format!("cannot read {}: {e}", path.display())))?;
    if batches.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let batch = arrow::compute::concat_batches(&schema, &batches).map_err(Error::Arrow)?;
    Ok(TabularDataset::new(batch))
}

fn load_json(path: &Path) -> Result<TabularDataset> {
    let file = File::open(path).map_err(|e| Error::io(e, path))?;
    let mut reader = BufReader::new(file);

    let (schema, _) = infer_json_schema_from_seekable(&mut reader, None)
        .map_err(|e| Error::load(format!("cannot infer schema for {}: {e}", path.display())))?;
    let schema = Arc::new(schema);

    let json_reader = JsonReaderBuilder::new(Arc::clone(&schema))
        .with_batch_size(BATCH_SIZE)
        .build(reader)
        .map_err(|e| Error::load(format!("cannot read {}: {e}", path.display())))?;

    let batches: Vec<RecordBatch> = json_reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::load(format!("cannot read {}: {e}", path.display())))?;
    if batches.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let batch = arrow::compute::concat_batches(&schema, &batches).map_err(Error::Arrow)?;
    Ok(TabularDataset::new(batch))
}

fn load_excel(path: &Path) -> Result<TabularDataset> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::load(format!("cannot open {}: {e}", path.display())))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::load(format!("no sheets in {}", path.display())))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| Error::load(format!("cannot read sheet '{sheet}': {e}")))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or(Error::EmptyDataset)?
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            calamine::Data::Empty => format!("column_{i}"),
            other => other.to_string(),
        })
        .collect();

    let body: Vec<_> = rows.collect();
    if body.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let mut fields = Vec::with_capacity(header.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(header.len());
    for (col, name) in header.iter().enumerate() {
        let cells: Vec<&calamine::Data> = body
            .iter()
            .map(|row| row.get(col).unwrap_or(&calamine::Data::Empty))
            .collect();
        let array = excel_column(&cells);
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }

    let batch =
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(Error::Arrow)?;
    Ok(TabularDataset::new(batch))
}

/// Converts one column of workbook cells to the narrowest Arrow array that
/// holds every non-empty cell: boolean, integer, float, datetime, or text.
/// Empty and error cells become nulls.
fn excel_column(cells: &[&calamine::Data]) -> ArrayRef {
    use calamine::Data;

    let present = |pred: fn(&Data) -> bool| {
        cells
            .iter()
            .all(|c| matches!(c, Data::Empty | Data::Error(_)) || pred(c))
    };

    if present(|c| matches!(c, Data::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|c| match c {
                Data::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Arc::new(BooleanArray::from(values));
    }
    if present(|c| matches!(c, Data::Int(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Data::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return Arc::new(Int64Array::from(values));
    }
    if present(|c| matches!(c, Data::Int(_) | Data::Float(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                Data::Int(i) => Some(*i as f64),
                Data::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        return Arc::new(Float64Array::from(values));
    }
    if present(|c| matches!(c, Data::DateTime(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Data::DateTime(dt) => dt
                    .as_datetime()
                    .map(|naive| naive.and_utc().timestamp_micros()),
                _ => None,
            })
            .collect();
        return Arc::new(TimestampMicrosecondArray::from(values));
    }

    let values: Vec<Option<String>> = cells
        .iter()
        .map(|c| match c {
            Data::Empty | Data::Error(_) => None,
            other => Some(other.to_string()),
        })
        .collect();
    Arc::new(StringArray::from(values))
}

/// Writes a table to a file.
///
/// The format is detected from the extension unless given explicitly.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for unknown extensions and Excel targets,
/// an I/O error when the file cannot be created, and an export error when
/// serialization fails.
pub fn export_table(data: &TabularDataset, path: &Path, format: Option<FileFormat>) -> Result<()> {
    let format = match format {
        Some(f) => f,
        None => FileFormat::from_path(path)?,
    };
    match format {
        FileFormat::Csv => export_csv(data, path),
        FileFormat::Json => export_json(data, path),
        FileFormat::Excel => Err(Error::unsupported_format(
            "excel files cannot be written; use csv or json",
        )),
    }
}

fn export_csv(data: &TabularDataset, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(e, path))?;
    let mut writer = CsvWriterBuilder::new().with_header(true).build(file);
    writer
        .write(data.batch())
        .map_err(|e| Error::export(format!("cannot write {}: {e}", path.display())))?;
    Ok(())
}

fn export_json(data: &TabularDataset, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(e, path))?;
    let mut writer = LineDelimitedWriter::new(file);
    writer
        .write(data.batch())
        .map_err(|e| Error::export(format!("cannot write {}: {e}", path.display())))?;
    writer
        .finish()
        .map_err(|e| Error::export(format!("cannot write {}: {e}", path.display())))?;
    Ok(())
}
