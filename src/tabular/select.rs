//! Positional access: head and row/column slices

use super::{DataFrame, TabularError};
use serde_json::{Map, Value};

/// Resolve a possibly negative index against `len`
fn resolve_index(index: i64, len: usize) -> Result<usize, TabularError> {
    let len_i = len as i64;
    let resolved = if index < 0 { index + len_i } else { index };
    if resolved < 0 || resolved >= len_i {
        return Err(TabularError::IndexOutOfBounds { index, len });
    }
    Ok(resolved as usize)
}

/// Clamp `start..end` the way a Python slice does
fn slice_bounds(start: i64, end: i64, len: usize) -> (usize, usize) {
    let len_i = len as i64;
    let clamp = |i: i64| -> usize {
        if i < 0 {
            (i + len_i).max(0) as usize
        } else {
            i.min(len_i) as usize
        }
    };
    let (s, e) = (clamp(start), clamp(end));
    (s, e.max(s))
}

impl DataFrame {
    /// First `n` rows as records
    pub fn head(&self, n: usize) -> Vec<Value> {
        self.records(0, n.min(self.row_count()))
    }

    pub fn records(&self, start: usize, end: usize) -> Vec<Value> {
        (start..end).map(|row| Value::Object(self.record(row))).collect()
    }

    /// Single row/column by position, or a half-open range when `range_end` is given
    pub fn select(&self, number: i64, is_column: bool, range_end: Option<i64>) -> Result<Value, TabularError> {
        let mut out = Map::new();
        match (is_column, range_end) {
            (true, None) => {
                let column = &self.columns()[resolve_index(number, self.columns().len())?];
                out.insert(column.name.clone(), Value::Array(column.values_json()));
            }
            (true, Some(end)) => {
                let (s, e) = slice_bounds(number, end, self.columns().len());
                let selected: Map<String, Value> = self.columns()[s..e]
                    .iter()
                    .map(|c| {
                        let by_row: Map<String, Value> = c
                            .values_json()
                            .into_iter()
                            .enumerate()
                            .map(|(row, value)| (row.to_string(), value))
                            .collect();
                        (c.name.clone(), Value::Object(by_row))
                    })
                    .collect();
                out.insert(format!("columns_{}_to_{}", number, end), Value::Object(selected));
            }
            (false, None) => {
                let row = resolve_index(number, self.row_count())?;
                out.insert(row.to_string(), Value::Object(self.record(row)));
            }
            (false, Some(end)) => {
                let (s, e) = slice_bounds(number, end, self.row_count());
                out.insert(format!("rows_{}_to_{}", number, end), Value::Array(self.records(s, e)));
            }
        }
        Ok(Value::Object(out))
    }
}
