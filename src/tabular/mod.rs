//! Tabular engine
//!
//! Loads CSV uploads into a small column-typed frame and answers the
//! summary questions the HTTP layer exposes: describe, head, shape,
//! positional slices, per-column statistics, correlation and filtering.

pub mod describe;
pub mod filter;
pub mod select;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Cell contents treated as missing values
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA",
    "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("No columns to parse from file")]
    Empty,
    #[error("Error tokenizing data. Expected {expected} fields in line {line}, saw {found}")]
    RaggedRow { line: u64, expected: usize, found: usize },
    #[error("{0} is not a valid column in the dataset")]
    UnknownColumn(String),
    #[error("Index {index} is out of bounds for axis with size {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("Cannot describe a DataFrame without columns")]
    NoColumns,
    #[error("Column {0} is not numeric")]
    NotNumeric(String),
    #[error("Invalid filter expression: {0}")]
    Filter(String),
}

/// One parsed CSV value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Missing => Value::Null,
            Cell::Int(v) => Value::from(*v),
            Cell::Float(v) => float_json(*v),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }

    /// Display form used for grouping and axis labels
    pub fn label(&self) -> String {
        match self {
            Cell::Missing => "NaN".to_string(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// JSON number for finite floats, `null` otherwise
pub fn float_json(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int64,
    Float64,
    Object,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Object => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DType::Int64 | DType::Float64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: DType,
    pub cells: Vec<Cell>,
}

impl Column {
    /// Type a column from its raw strings.
    ///
    /// Integers only when nothing is missing; any missing value in an otherwise
    /// numeric column makes it float. An all-missing column is float as well.
    fn infer(name: String, raw: Vec<String>) -> Self {
        let present: Vec<&str> = raw
            .iter()
            .map(|s| s.as_str())
            .filter(|s| !NA_VALUES.contains(&s.trim()))
            .collect();
        let has_missing = present.len() != raw.len();

        let all_int = present.iter().all(|s| s.trim().parse::<i64>().is_ok());
        let all_float = present.iter().all(|s| s.trim().parse::<f64>().is_ok());

        let dtype = if raw.is_empty() {
            DType::Object
        } else if all_int && !has_missing && !present.is_empty() {
            DType::Int64
        } else if all_float {
            DType::Float64
        } else {
            DType::Object
        };

        let cells = raw
            .into_iter()
            .map(|s| {
                let trimmed = s.trim();
                if NA_VALUES.contains(&trimmed) {
                    return Cell::Missing;
                }
                match dtype {
                    DType::Int64 => trimmed.parse().map(Cell::Int).unwrap_or(Cell::Missing),
                    DType::Float64 => trimmed.parse().map(Cell::Float).unwrap_or(Cell::Missing),
                    DType::Object => Cell::Text(s),
                }
            })
            .collect();

        Self { name, dtype, cells }
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype.is_numeric()
    }

    /// Non-missing values as floats
    pub fn numeric_values(&self) -> Vec<f64> {
        self.cells.iter().filter_map(Cell::as_f64).collect()
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    pub fn values_json(&self) -> Vec<Value> {
        self.cells.iter().map(Cell::to_json).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    columns: Vec<Column>,
    rows: usize,
}

impl DataFrame {
    /// Parse CSV bytes with a header row
    pub fn from_csv_bytes(data: &[u8]) -> Result<Self, TabularError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(TabularError::Empty);
        }
        let names = unique_names(headers.iter());

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for record in reader.records() {
            let record = record?;
            if record.len() > names.len() {
                return Err(TabularError::RaggedRow {
                    line: record.position().map(|p| p.line()).unwrap_or(0),
                    expected: names.len(),
                    found: record.len(),
                });
            }
            for (i, values) in raw.iter_mut().enumerate() {
                values.push(record.get(i).unwrap_or("").to_string());
            }
        }

        let rows = raw.first().map(Vec::len).unwrap_or(0);
        let columns = names
            .into_iter()
            .zip(raw)
            .map(|(name, values)| Column::infer(name, values))
            .collect();
        Ok(Self { columns, rows })
    }

    pub(crate) fn from_parts(columns: Vec<Column>, rows: usize) -> Self {
        Self { columns, rows }
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns.len())
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, TabularError> {
        self.column(name).ok_or_else(|| TabularError::UnknownColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Row as an ordered `{column: value}` object
    pub fn record(&self, row: usize) -> Map<String, Value> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.cells.get(row).map(Cell::to_json).unwrap_or(Value::Null)))
            .collect()
    }
}

/// Blank headers become `Unnamed: i`, repeats get a `.n` suffix
fn unique_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .enumerate()
        .map(|(i, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                header.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 { base.clone() } else { format!("{}.{}", base, count) };
            *count += 1;
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_columns() {
        let frame = DataFrame::from_csv_bytes(b"a,b\n1,x\n2,y\n3,z\n").unwrap();
        assert_eq!(frame.shape(), (3, 2));
        assert_eq!(frame.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_type_inference() {
        let frame = DataFrame::from_csv_bytes(b"i,f,m,t,e\n1,1.5,1,a,\n2,2,,b,\n").unwrap();
        assert_eq!(frame.column("i").unwrap().dtype, DType::Int64);
        assert_eq!(frame.column("f").unwrap().dtype, DType::Float64);
        assert_eq!(frame.column("m").unwrap().dtype, DType::Float64);
        assert_eq!(frame.column("t").unwrap().dtype, DType::Object);
        assert_eq!(frame.column("e").unwrap().dtype, DType::Float64);

        assert_eq!(frame.column("m").unwrap().cells, vec![Cell::Float(1.0), Cell::Missing]);
        assert_eq!(frame.column("i").unwrap().numeric_values(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_na_markers_are_missing() {
        let frame = DataFrame::from_csv_bytes(b"v,w\nNA,x\n3,null\n").unwrap();
        let v = frame.column("v").unwrap();
        assert_eq!(v.dtype, DType::Float64);
        assert_eq!(v.missing_count(), 1);
        assert_eq!(frame.column("w").unwrap().cells[1], Cell::Missing);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let frame = DataFrame::from_csv_bytes(b"a,b\n1,2\n3\n").unwrap();
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(frame.column("b").unwrap().cells[1], Cell::Missing);
    }

    #[test]
    fn test_long_rows_are_rejected() {
        let err = DataFrame::from_csv_bytes(b"a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, TabularError::RaggedRow { expected: 2, found: 3, .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(DataFrame::from_csv_bytes(b""), Err(TabularError::Empty)));
    }

    #[test]
    fn test_header_only() {
        let frame = DataFrame::from_csv_bytes(b"a,b\n").unwrap();
        assert_eq!(frame.shape(), (0, 2));
        assert_eq!(frame.column("a").unwrap().dtype, DType::Object);
    }

    #[test]
    fn test_duplicate_and_blank_headers() {
        let frame = DataFrame::from_csv_bytes(b"a,a,\n1,2,3\n").unwrap();
        assert_eq!(frame.column_names(), vec!["a", "a.1", "Unnamed: 2"]);
    }

    #[test]
    fn test_record_json() {
        let frame = DataFrame::from_csv_bytes(b"n,s\n1.5,hi\n").unwrap();
        let record = frame.record(0);
        assert_eq!(Value::Object(record), serde_json::json!({"n": 1.5, "s": "hi"}));
    }
}
