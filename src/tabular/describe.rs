//! Summary statistics: describe, per-column stats and correlation

use super::{float_json, Cell, Column, DataFrame, TabularError};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Numeric summary of a column, missing values excluded
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl NumericSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = if count == 0 { f64::NAN } else { sorted.iter().sum::<f64>() / count as f64 };
        let std = if count < 2 {
            f64::NAN
        } else {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        };

        Self {
            count,
            mean,
            std,
            min: sorted.first().copied().unwrap_or(f64::NAN),
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("count".into(), float_json(self.count as f64));
        out.insert("mean".into(), float_json(self.mean));
        out.insert("std".into(), float_json(self.std));
        out.insert("min".into(), float_json(self.min));
        out.insert("25%".into(), float_json(self.q25));
        out.insert("50%".into(), float_json(self.median));
        out.insert("75%".into(), float_json(self.q75));
        out.insert("max".into(), float_json(self.max));
        out
    }
}

/// Frequency summary of a text column
#[derive(Debug, Clone, PartialEq)]
pub struct TextSummary {
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: Option<usize>,
}

impl TextSummary {
    pub fn from_column(column: &Column) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut count = 0;
        for cell in column.cells.iter().filter(|c| !c.is_missing()) {
            count += 1;
            let label = cell.label();
            let entry = counts.entry(label.clone()).or_insert(0);
            if *entry == 0 {
                order.push(label);
            }
            *entry += 1;
        }

        // Ties go to the value seen first
        let mut top: Option<(&String, usize)> = None;
        for label in &order {
            let n = counts[label];
            if top.map_or(true, |(_, best)| n > best) {
                top = Some((label, n));
            }
        }

        Self {
            count,
            unique: order.len(),
            top: top.map(|(label, _)| label.clone()),
            freq: top.map(|(_, n)| n),
        }
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("count".into(), Value::from(self.count));
        out.insert("unique".into(), Value::from(self.unique));
        out.insert("top".into(), self.top.clone().map(Value::String).unwrap_or(Value::Null));
        out.insert("freq".into(), self.freq.map(Value::from).unwrap_or(Value::Null));
        out
    }
}

/// Linear-interpolated quantile over pre-sorted values
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Pearson correlation; NaN when either side has no variance
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return f64::NAN;
    }
    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Column labels plus a square correlation matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

impl Correlation {
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (i, row_label) in self.labels.iter().enumerate() {
            let row: Map<String, Value> = self
                .labels
                .iter()
                .enumerate()
                .map(|(j, col_label)| (col_label.clone(), float_json(self.matrix[i][j])))
                .collect();
            out.insert(row_label.clone(), Value::Object(row));
        }
        Value::Object(out)
    }
}

impl DataFrame {
    /// `{column: {stat: value}}` over numeric columns, or over text columns
    /// when there are no numeric ones
    pub fn describe(&self) -> Result<Value, TabularError> {
        if self.columns().is_empty() {
            return Err(TabularError::NoColumns);
        }

        let numeric: Vec<&Column> = self.columns().iter().filter(|c| c.is_numeric()).collect();
        let mut out = Map::new();
        if numeric.is_empty() {
            for column in self.columns() {
                out.insert(column.name.clone(), Value::Object(TextSummary::from_column(column).to_json()));
            }
        } else {
            for column in numeric {
                let summary = NumericSummary::from_values(&column.numeric_values());
                out.insert(column.name.clone(), Value::Object(summary.to_json()));
            }
        }
        Ok(Value::Object(out))
    }

    pub fn column_stats(&self, name: &str) -> Result<Value, TabularError> {
        let column = self.require_column(name)?;

        let mut out = Map::new();
        out.insert("column".into(), Value::String(column.name.clone()));
        out.insert("dtype".into(), Value::String(column.dtype.as_str().to_string()));
        let text = TextSummary::from_column(column);
        out.insert("count".into(), Value::from(text.count));
        out.insert("missing".into(), Value::from(column.missing_count()));
        out.insert("unique".into(), Value::from(text.unique));

        if column.is_numeric() {
            let summary = NumericSummary::from_values(&column.numeric_values());
            for (key, value) in summary.to_json() {
                if key != "count" {
                    out.insert(key, value);
                }
            }
        } else {
            out.insert("top".into(), text.top.map(Value::String).unwrap_or(Value::Null));
            out.insert("freq".into(), text.freq.map(Value::from).unwrap_or(Value::Null));
        }
        Ok(Value::Object(out))
    }

    /// Pearson matrix over numeric columns, each pair using rows where both are present
    pub fn correlation(&self) -> Correlation {
        let numeric: Vec<&Column> = self.columns().iter().filter(|c| c.is_numeric()).collect();
        let n = numeric.len();
        let mut matrix = vec![vec![f64::NAN; n]; n];

        for i in 0..n {
            for j in i..n {
                let (xs, ys) = paired(&numeric[i].cells, &numeric[j].cells);
                let mut r = pearson(&xs, &ys);
                if i == j && r.is_finite() {
                    r = 1.0;
                }
                matrix[i][j] = r;
                matrix[j][i] = r;
            }
        }

        Correlation {
            labels: numeric.iter().map(|c| c.name.clone()).collect(),
            matrix,
        }
    }
}

fn paired(a: &[Cell], b: &[Cell]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .unzip()
}
