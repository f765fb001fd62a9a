//! Column-level cleaning: dropping, renaming, name standardization, text
//! normalization, and explicit type coercion.

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, RecordBatch, StringArray, TimestampMicrosecondArray},
    compute::cast,
    datatypes::{DataType, Field, Schema, TimeUnit},
};

use crate::{
    clean::{CleanOp, CleaningLogEntry, OpKind},
    dataset::{ColumnType, TabularDataset},
    error::{Error, Result},
    infer,
};

/// Drops named columns. Absent names are ignored.
#[derive(Debug, Clone)]
pub struct DropColumns {
    names: Vec<String>,
}

impl DropColumns {
    /// Creates the operation.
    #[must_use]
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl CleanOp for DropColumns {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let drop_indices: Vec<usize> = self
            .names
            .iter()
            .filter_map(|name| data.column_index(name).ok())
            .collect();

        if drop_indices.len() == data.num_columns() {
            return Err(Error::transform("cannot drop every column"));
        }

        let schema = data.schema();
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| !drop_indices.contains(i))
            .map(|(_, f)| f.as_ref().clone())
            .collect();
        let arrays: Vec<ArrayRef> = data
            .batch()
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| !drop_indices.contains(i))
            .map(|(_, a)| Arc::clone(a))
            .collect();

        let batch =
            RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(Error::Arrow)?;
        let entry = CleaningLogEntry::new(
            OpKind::DropColumns,
            format!("dropped {} columns", drop_indices.len()),
        );
        Ok((TabularDataset::new(batch), entry))
    }
}

/// Renames columns from a mapping. Only present keys apply.
#[derive(Debug, Clone)]
pub struct RenameColumns {
    mapping: Vec<(String, String)>,
}

impl RenameColumns {
    /// Creates the operation from `(old, new)` pairs.
    #[must_use]
    pub fn new(mapping: &[(&str, &str)]) -> Self {
        Self {
            mapping: mapping
                .iter()
                .map(|(old, new)| ((*old).to_string(), (*new).to_string()))
                .collect(),
        }
    }
}

impl CleanOp for RenameColumns {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let mut renamed = 0usize;
        let schema = data.schema();
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|f| {
                match self.mapping.iter().find(|(old, _)| old == f.name()) {
                    Some((_, new)) => {
                        renamed += 1;
                        Field::new(new, f.data_type().clone(), f.is_nullable())
                    }
                    None => f.as_ref().clone(),
                }
            })
            .collect();

        let batch = RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            data.batch().columns().to_vec(),
        )
        .map_err(Error::Arrow)?;
        let entry = CleaningLogEntry::new(
            OpKind::RenameColumns,
            format!("renamed {renamed} columns"),
        );
        Ok((TabularDataset::new(batch), entry))
    }
}

/// Standardizes all column names to lowercase `[a-z0-9_]`.
///
/// Whitespace and hyphens become underscores, everything else outside the
/// character set is dropped. Idempotent; collisions get a numeric suffix.
#[derive(Debug, Clone, Copy)]
pub struct StandardizeNames;

fn standardize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            out.push('_');
        } else if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        }
    }
    out
}

impl CleanOp for StandardizeNames {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let mut used = std::collections::HashSet::new();
        let mut changed = 0usize;
        let schema = data.schema();
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|f| {
                let mut name = standardize(f.name());
                let mut suffix = 2;
                while !used.insert(name.clone()) {
                    name = format!("{}_{suffix}", standardize(f.name()));
                    suffix += 1;
                }
                if &name != f.name() {
                    changed += 1;
                }
                Field::new(&name, f.data_type().clone(), f.is_nullable())
            })
            .collect();

        let batch = RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            data.batch().columns().to_vec(),
        )
        .map_err(Error::Arrow)?;
        let entry = CleaningLogEntry::new(
            OpKind::StandardizeNames,
            format!("standardized {changed} column names"),
        );
        Ok((TabularDataset::new(batch), entry))
    }
}

/// Normalizes text column values.
///
/// Order is fixed: case-fold, strip special characters, trim. Nulls are
/// preserved. Non-text columns in an explicit selection are skipped with a
/// warning.
#[derive(Debug, Clone)]
pub struct CleanText {
    columns: Option<Vec<String>>,
    lowercase: bool,
    strip_special: bool,
}

impl CleanText {
    /// Creates the operation. `columns` of `None` targets all text columns.
    #[must_use]
    pub fn new(columns: Option<&[&str]>, lowercase: bool, strip_special: bool) -> Self {
        Self {
            columns: columns.map(|names| names.iter().map(|s| (*s).to_string()).collect()),
            lowercase,
            strip_special,
        }
    }

    fn normalize(&self, value: &str) -> String {
        let mut s = if self.lowercase {
            value.to_lowercase()
        } else {
            value.to_string()
        };
        if self.strip_special {
            s.retain(|c| c.is_alphanumeric() || c == ' ');
        }
        s.trim().to_string()
    }
}

impl CleanOp for CleanText {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let names: Vec<String> = match &self.columns {
            Some(names) => {
                for name in names {
                    data.column_index(name)?;
                }
                names.clone()
            }
            None => {
                let mut text_cols = Vec::new();
                for name in data.column_names() {
                    if data.column_type(&name)? == ColumnType::Text {
                        text_cols.push(name);
                    }
                }
                text_cols
            }
        };

        let mut result = data;
        let mut cleaned = 0usize;
        let mut warnings = Vec::new();

        for name in &names {
            if result.column_type(name)? != ColumnType::Text {
                warnings.push(format!("'{name}' is not a text column"));
                continue;
            }
            let col = result.column(name)?;
            let strings = col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::transform(format!("'{name}' is not a string column")))?;
            let normalized: Vec<Option<String>> = (0..strings.len())
                .map(|i| (!strings.is_null(i)).then(|| self.normalize(strings.value(i))))
                .collect();
            result =
                result.with_column_replaced(name, Arc::new(StringArray::from(normalized)))?;
            cleaned += 1;
        }

        let mut description = format!("normalized text in {cleaned} columns");
        if !warnings.is_empty() {
            description.push_str(&format!("; skipped {}", warnings.join("; ")));
        }
        let entry = CleaningLogEntry::new(OpKind::CleanText, description);
        Ok((result, entry))
    }
}

/// Coerces columns to requested semantic types.
///
/// A coercion that would lose values (a cast introducing nulls, or a
/// datetime parse failing on any cell) is a soft failure: the column stays
/// unchanged and the failure is noted in the log entry.
#[derive(Debug, Clone)]
pub struct FixColumnTypes {
    mapping: Vec<(String, ColumnType)>,
}

impl FixColumnTypes {
    /// Creates the operation from `(column, target type)` pairs.
    #[must_use]
    pub fn new(mapping: &[(&str, ColumnType)]) -> Self {
        Self {
            mapping: mapping
                .iter()
                .map(|(name, ty)| ((*name).to_string(), *ty))
                .collect(),
        }
    }
}

fn target_data_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
        ColumnType::Categorical => {
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
        }
    }
}

/// Strict string-to-timestamp conversion: every non-null cell must parse.
fn parse_datetime_column(strings: &StringArray) -> Option<ArrayRef> {
    let micros: Option<Vec<Option<i64>>> = (0..strings.len())
        .map(|i| {
            if strings.is_null(i) {
                Some(None)
            } else {
                infer::parse_datetime(strings.value(i))
                    .map(|dt| Some(dt.and_utc().timestamp_micros()))
            }
        })
        .collect();
    micros.map(|m| Arc::new(TimestampMicrosecondArray::from(m)) as ArrayRef)
}

impl CleanOp for FixColumnTypes {
    fn apply(&self, data: TabularDataset) -> Result<(TabularDataset, CleaningLogEntry)> {
        let mut result = data;
        let mut converted = Vec::new();
        let mut warnings = Vec::new();

        for (name, target) in &self.mapping {
            let idx = result.column_index(name)?;
            let current = result.column_type(name)?;
            if current == *target {
                continue;
            }

            let col = Arc::clone(result.batch().column(idx));
            let coerced: Option<ArrayRef> = if *target == ColumnType::DateTime
                && current == ColumnType::Text
            {
                col.as_any()
                    .downcast_ref::<StringArray>()
                    .and_then(parse_datetime_column)
            } else {
                match cast(col.as_ref(), &target_data_type(*target)) {
                    // A cast that invents nulls lost values; reject it.
                    Ok(casted) if casted.null_count() == col.null_count() => Some(casted),
                    _ => None,
                }
            };

            match coerced {
                Some(array) => {
                    result = result.with_column_replaced(name, array)?;
                    converted.push(format!("{name} -> {target}"));
                }
                None => {
                    warnings.push(format!("'{name}' could not be coerced to {target}"));
                }
            }
        }

        let mut description = if converted.is_empty() {
            "no columns coerced".to_string()
        } else {
            format!("coerced {}", converted.join(", "))
        };
        if !warnings.is_empty() {
            description.push_str(&format!("; {}", warnings.join("; ")));
        }
        let entry = CleaningLogEntry::new(OpKind::FixColumnTypes, description);
        Ok((result, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularDataset {
        TabularDataset::from_csv_str("a,b,c\n1,x,10\n2,y,20\n").unwrap()
    }

    #[test]
    fn test_drop_columns_ignores_absent() {
        let (result, _) = DropColumns::new(&["b", "missing"]).apply(sample()).unwrap();
        assert_eq!(result.column_names(), vec!["a", "c"]);
    }

    #[test]
    fn test_drop_all_columns_errors() {
        let result = DropColumns::new(&["a", "b", "c"]).apply(sample());
        assert!(matches!(result, Err(Error::Transform { .. })));
    }

    #[test]
    fn test_rename_columns_present_keys_only() {
        let (result, entry) = RenameColumns::new(&[("a", "alpha"), ("zzz", "omega")])
            .apply(sample())
            .unwrap();
        assert_eq!(result.column_names(), vec!["alpha", "b", "c"]);
        assert!(entry.description.contains("renamed 1"));
    }

    #[test]
    fn test_standardize_names() {
        let data =
            TabularDataset::from_csv_str("First Name,last-name,Age!!\nann,lee,30\n").unwrap();
        let (result, _) = StandardizeNames.apply(data).unwrap();
        assert_eq!(result.column_names(), vec!["first_name", "last_name", "age"]);
    }

    #[test]
    fn test_standardize_names_idempotent() {
        let data = TabularDataset::from_csv_str("First Name,B c\n1,2\n").unwrap();
        let (once, _) = StandardizeNames.apply(data).unwrap();
        let (twice, entry) = StandardizeNames.apply(once.clone()).unwrap();
        assert_eq!(once.column_names(), twice.column_names());
        assert!(entry.description.contains("standardized 0"));
    }

    #[test]
    fn test_standardize_names_collision_suffix() {
        let data = TabularDataset::from_csv_str("a b,a-b\n1,2\n").unwrap();
        let (result, _) = StandardizeNames.apply(data).unwrap();
        assert_eq!(result.column_names(), vec!["a_b", "a_b_2"]);
    }

    #[test]
    fn test_clean_text_full_normalization() {
        let data = TabularDataset::from_csv_str("s\n  Hello! World?  \nOK\n").unwrap();
        let (result, _) = CleanText::new(None, true, true).apply(data).unwrap();
        let col = result.column("s").unwrap().clone();
        let strings = col.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(strings.value(0), "hello world");
        assert_eq!(strings.value(1), "ok");
    }

    #[test]
    fn test_clean_text_preserves_nulls() {
        let data = TabularDataset::from_csv_str("n,s\n1,A \n2,\n").unwrap();
        let (result, _) = CleanText::new(None, true, false).apply(data).unwrap();
        assert_eq!(result.null_count("s").unwrap(), 1);
        let col = result.column("s").unwrap().clone();
        let strings = col.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(strings.value(0), "a");
    }

    #[test]
    fn test_clean_text_explicit_non_text_warns() {
        let (result, entry) = CleanText::new(Some(&["a"]), true, true)
            .apply(sample())
            .unwrap();
        assert_eq!(result.column_type("a").unwrap(), ColumnType::Integer);
        assert!(entry.description.contains("not a text column"));
    }

    #[test]
    fn test_fix_types_int_to_float() {
        let (result, _) = FixColumnTypes::new(&[("a", ColumnType::Float)])
            .apply(sample())
            .unwrap();
        assert_eq!(result.column_type("a").unwrap(), ColumnType::Float);
    }

    #[test]
    fn test_fix_types_text_to_datetime() {
        use arrow::datatypes::Field;

        let schema = Arc::new(Schema::new(vec![Field::new("d", DataType::Utf8, true)]));
        let ds = StringArray::from(vec![Some("2024-01-01"), None]);
        let batch = RecordBatch::try_new(schema, vec![Arc::new(ds)]).unwrap();
        let data = TabularDataset::new(batch);

        let (result, _) = FixColumnTypes::new(&[("d", ColumnType::DateTime)])
            .apply(data)
            .unwrap();
        assert_eq!(result.column_type("d").unwrap(), ColumnType::DateTime);
        assert_eq!(result.null_count("d").unwrap(), 1);
    }

    #[test]
    fn test_fix_types_failed_coercion_is_soft() {
        let (result, entry) = FixColumnTypes::new(&[("b", ColumnType::Integer)])
            .apply(sample())
            .unwrap();
        // "x" does not parse; the column stays text and the batch continues.
        assert_eq!(result.column_type("b").unwrap(), ColumnType::Text);
        assert!(entry.description.contains("could not be coerced"));
    }

    #[test]
    fn test_fix_types_same_type_is_noop() {
        let (result, entry) = FixColumnTypes::new(&[("a", ColumnType::Integer)])
            .apply(sample())
            .unwrap();
        assert_eq!(result.column_type("a").unwrap(), ColumnType::Integer);
        assert!(entry.description.contains("no columns coerced"));
    }
}
