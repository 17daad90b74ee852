//! Chart rendering
//!
//! Turns a frame plus a plot request into an SVG chart and returns it
//! base64-encoded, ready to drop into a JSON response.

pub mod charts;

use crate::tabular::{Column, DataFrame, TabularError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use charts::Series;
use log::debug;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Unsupported plot type: {0}")]
    UnknownPlotType(String),
    #[error("{0} is not a valid column in the dataset")]
    InvalidColumn(String),
    #[error("{plot} plot requires {field}")]
    MissingColumn { plot: PlotType, field: &'static str },
    #[error("Column {0} must be numeric for this plot")]
    NonNumeric(String),
    #[error("No data to plot: {0}")]
    NoData(String),
    #[error(transparent)]
    Tabular(#[from] TabularError),
    #[error("Chart backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotType {
    Histogram,
    Scatter,
    Bar,
    Line,
    Heatmap,
}

impl PlotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotType::Histogram => "histogram",
            PlotType::Scatter => "scatter",
            PlotType::Bar => "bar",
            PlotType::Line => "line",
            PlotType::Heatmap => "heatmap",
        }
    }
}

impl fmt::Display for PlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlotType {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "histogram" => Ok(PlotType::Histogram),
            "scatter" => Ok(PlotType::Scatter),
            "bar" => Ok(PlotType::Bar),
            "line" => Ok(PlotType::Line),
            "heatmap" => Ok(PlotType::Heatmap),
            _ => Err(RenderError::UnknownPlotType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotRequest {
    pub plot_type: PlotType,
    pub column_x: Option<String>,
    pub column_y: Option<String>,
    /// Optional grouping column
    pub column_z: Option<String>,
    /// Row filter applied before plotting
    pub filter: Option<String>,
}

impl PlotRequest {
    pub fn new(plot_type: PlotType) -> Self {
        Self {
            plot_type,
            column_x: None,
            column_y: None,
            column_z: None,
            filter: None,
        }
    }

    fn required(&self, column: &Option<String>, field: &'static str) -> Result<String, RenderError> {
        column.clone().ok_or(RenderError::MissingColumn { plot: self.plot_type, field })
    }
}

/// Media type of the decoded image returned by [`render`]
pub const MEDIA_TYPE: &str = "image/svg+xml";
pub const IMAGE_FORMAT: &str = "svg";

/// Render `request` against `frame`, returning base64 SVG
pub fn render(frame: &DataFrame, request: &PlotRequest) -> Result<String, RenderError> {
    for name in [&request.column_x, &request.column_y, &request.column_z].into_iter().flatten() {
        if !frame.has_column(name) {
            return Err(RenderError::InvalidColumn(name.clone()));
        }
    }

    let filtered;
    let frame = match &request.filter {
        Some(expression) => {
            filtered = frame.filter(expression)?;
            debug!("Filter kept {} of {} rows", filtered.row_count(), frame.row_count());
            &filtered
        }
        None => frame,
    };

    let svg = match request.plot_type {
        PlotType::Histogram => {
            let x = request.required(&request.column_x, "column_x")?;
            let values: Vec<f64> = numeric(frame, &x)?
                .numeric_values()
                .into_iter()
                .filter(|v| v.is_finite())
                .collect();
            if values.is_empty() {
                return Err(RenderError::NoData(x));
            }
            charts::draw_svg(|root| charts::histogram(root, &x, &values))?
        }
        PlotType::Scatter | PlotType::Line => {
            let x = request.required(&request.column_x, "column_x")?;
            let y = request.required(&request.column_y, "column_y")?;
            let mut groups = xy_groups(frame, &x, &y, request.column_z.as_deref())?;
            if groups.iter().all(|g| g.points.is_empty()) {
                return Err(RenderError::NoData(format!("{} vs {}", x, y)));
            }
            let title = titled(request, &x, &y);
            if request.plot_type == PlotType::Scatter {
                charts::draw_svg(|root| charts::scatter(root, &title, (&x, &y), &groups))?
            } else {
                for group in &mut groups {
                    group.points = mean_by_x(&group.points);
                }
                charts::draw_svg(|root| charts::line(root, &title, (&x, &y), &groups))?
            }
        }
        PlotType::Bar => {
            let x = request.required(&request.column_x, "column_x")?;
            let y = request.required(&request.column_y, "column_y")?;
            let bars = bar_means(frame, &x, &y, request.column_z.as_deref())?;
            if bars.categories.is_empty() {
                return Err(RenderError::NoData(format!("{} vs {}", x, y)));
            }
            let title = titled(request, &x, &y);
            charts::draw_svg(|root| charts::bar(root, &title, (&x, &y), &bars))?
        }
        PlotType::Heatmap => {
            let correlation = frame.correlation();
            if correlation.labels.is_empty() {
                return Err(RenderError::NoData("no numeric columns".to_string()));
            }
            charts::draw_svg(|root| charts::heatmap(root, &correlation))?
        }
    };

    debug!("Rendered {} plot, {} bytes of SVG", request.plot_type, svg.len());
    Ok(STANDARD.encode(svg))
}

fn numeric<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Column, RenderError> {
    let column = frame.require_column(name)?;
    if !column.is_numeric() {
        return Err(RenderError::NonNumeric(name.to_string()));
    }
    Ok(column)
}

fn titled(request: &PlotRequest, x: &str, y: &str) -> String {
    let (kind, joiner) = match request.plot_type {
        PlotType::Scatter => ("Scatter plot", "colored by"),
        PlotType::Line => ("Line plot", "colored by"),
        _ => ("Bar plot", "grouped by"),
    };
    match &request.column_z {
        Some(z) => format!("{} of {} vs {} {} {}", kind, x, y, joiner, z),
        None => format!("{} of {} vs {}", kind, x, y),
    }
}

/// Index of the series for `label`, created on first sight
fn series_slot(groups: &mut Vec<Series>, label: Option<String>) -> usize {
    match groups.iter().position(|g| g.label == label) {
        Some(i) => i,
        None => {
            groups.push(Series { label, points: Vec::new() });
            groups.len() - 1
        }
    }
}

/// Numeric (x, y) pairs, split by the grouping column when given.
/// Rows with a missing x, y or group value are skipped.
fn xy_groups(frame: &DataFrame, x: &str, y: &str, z: Option<&str>) -> Result<Vec<Series>, RenderError> {
    let xs = numeric(frame, x)?;
    let ys = numeric(frame, y)?;
    let zs = z.map(|name| frame.require_column(name)).transpose()?;

    let mut groups = Vec::new();
    for row in 0..frame.row_count() {
        let (Some(px), Some(py)) = (xs.cells[row].as_f64(), ys.cells[row].as_f64()) else {
            continue;
        };
        if !px.is_finite() || !py.is_finite() {
            continue;
        }
        let label = match zs {
            Some(column) if column.cells[row].is_missing() => continue,
            Some(column) => Some(column.cells[row].label()),
            None => None,
        };
        let slot = series_slot(&mut groups, label);
        groups[slot].points.push((px, py));
    }
    Ok(groups)
}

/// Sort by x, averaging y over repeated x values
fn mean_by_x(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut out: Vec<(f64, f64)> = Vec::new();
    let mut run = 0usize;
    for (x, y) in sorted {
        match out.last_mut() {
            Some(last) if last.0 == x => {
                run += 1;
                last.1 += (y - last.1) / run as f64;
            }
            _ => {
                out.push((x, y));
                run = 1;
            }
        }
    }
    out
}

/// Category labels plus, per group, the mean y of each category
#[derive(Debug, Clone, PartialEq)]
pub struct BarData {
    pub categories: Vec<String>,
    pub groups: Vec<(Option<String>, Vec<Option<f64>>)>,
}

fn bar_means(frame: &DataFrame, x: &str, y: &str, z: Option<&str>) -> Result<BarData, RenderError> {
    let xs = frame.require_column(x)?;
    let ys = numeric(frame, y)?;
    let zs = z.map(|name| frame.require_column(name)).transpose()?;

    let mut categories: Vec<String> = Vec::new();
    let mut group_labels: Vec<Option<String>> = Vec::new();
    // (group, category) -> (sum, count)
    let mut sums: Vec<Vec<(f64, usize)>> = Vec::new();

    for row in 0..frame.row_count() {
        if xs.cells[row].is_missing() {
            continue;
        }
        let Some(value) = ys.cells[row].as_f64().filter(|v| v.is_finite()) else {
            continue;
        };
        let group = match zs {
            Some(column) if column.cells[row].is_missing() => continue,
            Some(column) => Some(column.cells[row].label()),
            None => None,
        };

        let category = xs.cells[row].label();
        let ci = match categories.iter().position(|c| *c == category) {
            Some(i) => i,
            None => {
                categories.push(category);
                for row_sums in &mut sums {
                    row_sums.push((0.0, 0));
                }
                categories.len() - 1
            }
        };
        let gi = match group_labels.iter().position(|g| *g == group) {
            Some(i) => i,
            None => {
                group_labels.push(group);
                sums.push(vec![(0.0, 0); categories.len()]);
                group_labels.len() - 1
            }
        };
        let cell = &mut sums[gi][ci];
        cell.0 += value;
        cell.1 += 1;
    }

    let groups = group_labels
        .into_iter()
        .zip(sums)
        .map(|(label, row_sums)| {
            let means = row_sums
                .into_iter()
                .map(|(sum, n)| if n == 0 { None } else { Some(sum / n as f64) })
                .collect();
            (label, means)
        })
        .collect();
    Ok(BarData { categories, groups })
}
