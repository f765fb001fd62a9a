//! Dataset types for limpiar.
//!
//! Provides [`TabularDataset`], an in-memory table backed by an Arrow
//! `RecordBatch`, plus the semantic [`ColumnType`] classification used by
//! the cleaning engine and the quality analyzer.

use std::{fmt, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, BooleanArray, Float64Array, RecordBatch, UInt64Array},
    compute::{cast, filter_record_batch, take},
    datatypes::{DataType, Field, Schema, SchemaRef},
    util::display::array_value_to_string,
};

use crate::error::{Error, Result};

/// Semantic column type as seen by the cleaning engine.
///
/// This is a coarser classification than Arrow's `DataType`: every physical
/// type maps onto one of these six buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Whole numbers (any Arrow integer width).
    Integer,
    /// Floating-point numbers.
    Float,
    /// Free text (Utf8).
    Text,
    /// Booleans.
    Boolean,
    /// Dates and timestamps.
    DateTime,
    /// Dictionary-encoded categorical values.
    Categorical,
}

impl ColumnType {
    /// Classify an Arrow data type into a semantic column type.
    #[must_use]
    pub fn from_arrow(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Self::Integer,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => Self::Float,
            DataType::Boolean => Self::Boolean,
            DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => Self::DateTime,
            DataType::Dictionary(_, _) => Self::Categorical,
            _ => Self::Text,
        }
    }

    /// Returns true if this type is numeric (integer or float).
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Text => write!(f, "text"),
            Self::Boolean => write!(f, "boolean"),
            Self::DateTime => write!(f, "datetime"),
            Self::Categorical => write!(f, "categorical"),
        }
    }
}

/// An in-memory table with named, typed columns of equal length.
///
/// Row identity is positional; no primary key is enforced. All mutators are
/// value-returning: they build a new dataset and leave the receiver intact
/// (column buffers are shared via `Arc`, so this is cheap).
///
/// # Example
///
/// ```no_run
/// use limpiar::TabularDataset;
///
/// let data = TabularDataset::from_csv_str("a,b\n1,x\n2,y\n").unwrap();
/// assert_eq!(data.shape(), (2, 2));
/// ```
#[derive(Debug, Clone)]
pub struct TabularDataset {
    batch: RecordBatch,
}

impl TabularDataset {
    /// Creates a dataset from a RecordBatch.
    #[must_use]
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Parses a dataset from a CSV string with a header row.
    ///
    /// Schema is inferred from the data, the same way the file loader does it.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid CSV.
    pub fn from_csv_str(data: &str) -> Result<Self> {
        use std::io::Cursor;

        use arrow_csv::{reader::Format, ReaderBuilder};

        let mut cursor_for_infer = Cursor::new(data.as_bytes());
        let format = Format::default().with_header(true);
        let (inferred, _) = format
            .infer_schema(&mut cursor_for_infer, Some(1000))
            .map_err(Error::Arrow)?;

        let schema = Arc::new(inferred);
        let cursor = Cursor::new(data.as_bytes());

        let builder = ReaderBuilder::new(Arc::clone(&schema))
            .with_batch_size(8192)
            .with_header(true);
        let reader = builder.build(cursor).map_err(Error::Arrow)?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Arrow)?;

        if batches.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let batch = arrow::compute::concat_batches(&schema, &batches).map_err(Error::Arrow)?;
        Ok(Self::new(batch))
    }

    /// Returns the underlying RecordBatch.
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Returns the dataset schema.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Returns `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.batch.num_rows(), self.batch.num_columns())
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Returns true if the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Returns column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Returns the index of a column by name.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` if the name is absent.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.batch
            .schema()
            .column_with_name(name)
            .map(|(idx, _)| idx)
            .ok_or_else(|| Error::column_not_found(name))
    }

    /// Returns a column's values by name.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` if the name is absent.
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        let idx = self.column_index(name)?;
        Ok(self.batch.column(idx))
    }

    /// Returns the semantic type of a column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` if the name is absent.
    pub fn column_type(&self, name: &str) -> Result<ColumnType> {
        let idx = self.column_index(name)?;
        Ok(ColumnType::from_arrow(
            self.batch.schema().field(idx).data_type(),
        ))
    }

    /// Returns true if the named column is numeric.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` if the name is absent.
    pub fn is_numeric(&self, name: &str) -> Result<bool> {
        Ok(self.column_type(name)?.is_numeric())
    }

    /// Returns the null count of a column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` if the name is absent.
    pub fn null_count(&self, name: &str) -> Result<usize> {
        Ok(self.column(name)?.null_count())
    }

    /// Returns the total null count across all columns.
    #[must_use]
    pub fn total_null_count(&self) -> usize {
        self.batch.columns().iter().map(|c| c.null_count()).sum()
    }

    /// Returns the number of distinct non-null values in a column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` if the name is absent.
    pub fn unique_count(&self, name: &str) -> Result<usize> {
        let col = self.column(name)?;
        let mut seen = std::collections::HashSet::new();
        for i in 0..col.len() {
            if let Some(v) = cell_to_string(col, i) {
                seen.insert(v);
            }
        }
        Ok(seen.len())
    }

    /// Returns a column as `f64` values, with nulls preserved.
    ///
    /// Integer and float columns are cast to `Float64`, the way numeric
    /// transforms operate internally.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` for an absent column and a transform error
    /// for a column that cannot be cast to `Float64`.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let col = self.column(name)?;
        let float_array = cast(col.as_ref(), &DataType::Float64)
            .map_err(|e| Error::transform(format!("failed to cast '{}' to Float64: {}", name, e)))?;
        let values = float_array
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| Error::transform("expected Float64Array after cast"))?;

        Ok((0..values.len())
            .map(|i| {
                if values.is_null(i) {
                    None
                } else {
                    Some(values.value(i))
                }
            })
            .collect())
    }

    /// Returns a new dataset with the named column's values replaced.
    ///
    /// The column keeps its position; its data type follows the replacement
    /// array.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` for an absent column and `ShapeMismatch`
    /// when the replacement length differs from the row count.
    pub fn with_column_replaced(&self, name: &str, array: ArrayRef) -> Result<Self> {
        let idx = self.column_index(name)?;
        if array.len() != self.num_rows() {
            return Err(Error::ShapeMismatch {
                expected: self.num_rows(),
                actual: array.len(),
            });
        }

        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        fields[idx] = Field::new(name, array.data_type().clone(), true);

        let mut arrays = self.batch.columns().to_vec();
        arrays[idx] = array;

        let batch =
            RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(Error::Arrow)?;
        Ok(Self::new(batch))
    }

    /// Returns a new dataset with a column appended.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` when the column length differs from the row
    /// count, and an invalid-configuration error when the name is taken.
    pub fn with_column_added(&self, name: &str, array: ArrayRef) -> Result<Self> {
        if self.column_index(name).is_ok() {
            return Err(Error::invalid_config(format!(
                "column '{}' already exists",
                name
            )));
        }
        if array.len() != self.num_rows() {
            return Err(Error::ShapeMismatch {
                expected: self.num_rows(),
                actual: array.len(),
            });
        }

        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        fields.push(Field::new(name, array.data_type().clone(), true));

        let mut arrays = self.batch.columns().to_vec();
        arrays.push(array);

        let batch =
            RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(Error::Arrow)?;
        Ok(Self::new(batch))
    }

    /// Returns a new dataset with the named column removed.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` for an absent column and a transform error
    /// when removing the last remaining column.
    pub fn with_column_removed(&self, name: &str) -> Result<Self> {
        let idx = self.column_index(name)?;
        if self.num_columns() == 1 {
            return Err(Error::transform("cannot remove the last column"));
        }

        let schema = self.batch.schema();
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, f)| f.as_ref().clone())
            .collect();
        let arrays: Vec<ArrayRef> = self
            .batch
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, a)| Arc::clone(a))
            .collect();

        let batch =
            RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(Error::Arrow)?;
        Ok(Self::new(batch))
    }

    /// Returns a new dataset keeping only rows where the mask is true.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask length differs from the row count.
    pub fn filter_rows(&self, mask: &BooleanArray) -> Result<Self> {
        if mask.len() != self.num_rows() {
            return Err(Error::ShapeMismatch {
                expected: self.num_rows(),
                actual: mask.len(),
            });
        }
        let batch = filter_record_batch(&self.batch, mask).map_err(Error::Arrow)?;
        Ok(Self::new(batch))
    }

    /// Returns a new dataset with rows reordered/selected by index.
    ///
    /// # Errors
    ///
    /// Returns an error if any index is out of bounds.
    pub fn take_rows(&self, indices: &[usize]) -> Result<Self> {
        let index_array = UInt64Array::from_iter_values(indices.iter().map(|&i| i as u64));
        let columns: Vec<ArrayRef> = self
            .batch
            .columns()
            .iter()
            .map(|col| {
                take(col.as_ref(), &index_array, None)
                    .map_err(Error::Arrow)
                    .map(Arc::from)
            })
            .collect::<Result<Vec<_>>>()?;

        let batch = RecordBatch::try_new(self.batch.schema(), columns).map_err(Error::Arrow)?;
        Ok(Self::new(batch))
    }

    /// Returns the first `n` rows (all rows if `n` exceeds the row count).
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        let len = n.min(self.num_rows());
        Self::new(self.batch.slice(0, len))
    }
}

/// Renders a single cell as a comparable string, or `None` when null.
///
/// Used for row keys in duplicate detection and for mode computation.
pub(crate) fn cell_to_string(col: &ArrayRef, idx: usize) -> Option<String> {
    if col.is_null(idx) {
        None
    } else {
        Some(array_value_to_string(col, idx).unwrap_or_else(|_| "?".to_string()))
    }
}

/// Builds a row key over the given column indices, with a sentinel for nulls.
pub(crate) fn row_key(batch: &RecordBatch, row_idx: usize, key_indices: &[usize]) -> String {
    let parts: Vec<String> = key_indices
        .iter()
        .map(|&col_idx| {
            cell_to_string(batch.column(col_idx), row_idx).unwrap_or_else(|| "NULL".to_string())
        })
        .collect();
    parts.join("|")
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };

    use super::*;

    fn create_test_dataset() -> TabularDataset {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        let ids = Int64Array::from(vec![1, 2, 3]);
        let names = StringArray::from(vec![Some("a"), None, Some("c")]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(ids), Arc::new(names)]).unwrap();
        TabularDataset::new(batch)
    }

    #[test]
    fn test_shape_and_names() {
        let data = create_test_dataset();
        assert_eq!(data.shape(), (3, 2));
        assert_eq!(data.column_names(), vec!["id", "name"]);
    }

    #[test]
    fn test_column_type() {
        let data = create_test_dataset();
        assert_eq!(data.column_type("id").unwrap(), ColumnType::Integer);
        assert_eq!(data.column_type("name").unwrap(), ColumnType::Text);
    }

    #[test]
    fn test_column_not_found() {
        let data = create_test_dataset();
        assert!(matches!(
            data.column("missing"),
            Err(Error::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_null_and_unique_counts() {
        let data = create_test_dataset();
        assert_eq!(data.null_count("name").unwrap(), 1);
        assert_eq!(data.unique_count("name").unwrap(), 2);
        assert_eq!(data.total_null_count(), 1);
    }

    #[test]
    fn test_numeric_values() {
        let data = create_test_dataset();
        let values = data.numeric_values("id").unwrap();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_with_column_replaced() {
        let data = create_test_dataset();
        let replaced = data
            .with_column_replaced("id", Arc::new(Int64Array::from(vec![9, 8, 7])))
            .unwrap();
        assert_eq!(replaced.numeric_values("id").unwrap()[0], Some(9.0));
        // Original is untouched.
        assert_eq!(data.numeric_values("id").unwrap()[0], Some(1.0));
    }

    #[test]
    fn test_with_column_replaced_shape_mismatch() {
        let data = create_test_dataset();
        let result = data.with_column_replaced("id", Arc::new(Int64Array::from(vec![1])));
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_with_column_added_and_removed() {
        let data = create_test_dataset();
        let extra = Arc::new(Int64Array::from(vec![10, 20, 30]));
        let widened = data.with_column_added("score", extra).unwrap();
        assert_eq!(widened.shape(), (3, 3));

        let narrowed = widened.with_column_removed("score").unwrap();
        assert_eq!(narrowed.shape(), (3, 2));
    }

    #[test]
    fn test_with_column_added_duplicate_name() {
        let data = create_test_dataset();
        let extra = Arc::new(Int64Array::from(vec![1, 2, 3]));
        assert!(data.with_column_added("id", extra).is_err());
    }

    #[test]
    fn test_remove_last_column_fails() {
        let data = create_test_dataset();
        let single = data.with_column_removed("name").unwrap();
        assert!(single.with_column_removed("id").is_err());
    }

    #[test]
    fn test_filter_rows() {
        let data = create_test_dataset();
        let mask = BooleanArray::from(vec![true, false, true]);
        let filtered = data.filter_rows(&mask).unwrap();
        assert_eq!(filtered.num_rows(), 2);
    }

    #[test]
    fn test_take_rows() {
        let data = create_test_dataset();
        let taken = data.take_rows(&[2, 0]).unwrap();
        assert_eq!(taken.num_rows(), 2);
        assert_eq!(taken.numeric_values("id").unwrap()[0], Some(3.0));
    }

    #[test]
    fn test_head() {
        let data = create_test_dataset();
        assert_eq!(data.head(2).num_rows(), 2);
        assert_eq!(data.head(10).num_rows(), 3);
    }

    #[test]
    fn test_from_csv_str() {
        let data = TabularDataset::from_csv_str("a,b\n1,x\n2,y\n3,z\n").unwrap();
        assert_eq!(data.shape(), (3, 2));
        assert_eq!(data.column_type("a").unwrap(), ColumnType::Integer);
        assert_eq!(data.column_type("b").unwrap(), ColumnType::Text);
    }

    #[test]
    fn test_row_key_with_null() {
        let data = create_test_dataset();
        let key = row_key(data.batch(), 1, &[0, 1]);
        assert_eq!(key, "2|NULL");
    }
}
