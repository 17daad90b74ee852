//! Chart drawing on top of plotters' SVG backend

use super::{BarData, RenderError};
use crate::tabular::describe::Correlation;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

pub const WIDTH: u32 = 1000;
pub const HEIGHT: u32 = 600;
const BINS: usize = 20;
const KDE_POINTS: usize = 200;
const FONT: &str = "sans-serif";

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type XyContext<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// A named run of points
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: Option<String>,
    pub points: Vec<(f64, f64)>,
}

fn backend_err<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Backend(err.to_string())
}

/// Run `draw` on a blank canvas and return the SVG document
pub fn draw_svg<F>(draw: F) -> Result<String, RenderError>
where
    F: FnOnce(&Area<'_>) -> Result<(), RenderError>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(backend_err)?;
        draw(&root)?;
        root.present().map_err(backend_err)?;
    }
    Ok(svg)
}

/// Min/max of the values, widened when they coincide
fn extent(values: impl Iterator<Item = f64>, pad: f64) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if lo == hi {
        return (lo - 0.5, hi + 0.5);
    }
    let margin = (hi - lo) * pad;
    (lo - margin, hi + margin)
}

fn series_color(index: usize) -> RGBAColor {
    Palette99::pick(index).to_rgba()
}

/// Gaussian KDE scaled to histogram counts, Scott's rule bandwidth
fn kde_curve(values: &[f64], lo: f64, hi: f64, bin_width: f64) -> Option<Vec<(f64, f64)>> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let bandwidth = var.sqrt() * (n as f64).powf(-0.2);
    if bandwidth <= 0.0 || !bandwidth.is_finite() {
        return None;
    }

    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let scale = n as f64 * bin_width;
    let step = (hi - lo) / (KDE_POINTS - 1) as f64;
    let curve = (0..KDE_POINTS)
        .map(|i| {
            let x = lo + step * i as f64;
            let density: f64 = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density * scale)
        })
        .collect();
    Some(curve)
}

pub fn histogram<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    column: &str,
    values: &[f64],
) -> Result<(), RenderError> {
    let (lo, hi) = extent(values.iter().copied(), 0.0);
    let bin_width = (hi - lo) / BINS as f64;

    let mut counts = vec![0usize; BINS];
    for v in values {
        let bin = (((v - lo) / bin_width) as usize).min(BINS - 1);
        counts[bin] += 1;
    }
    let kde = kde_curve(values, lo, hi, bin_width);
    let peak = counts
        .iter()
        .map(|&c| c as f64)
        .chain(kde.iter().flatten().map(|p| p.1))
        .fold(1.0, f64::max);

    let mut chart = ChartBuilder::on(root)
        .caption(format!("Histogram of {}", column), (FONT, 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, 0.0..peak * 1.1)
        .map_err(backend_err)?;
    chart
        .configure_mesh()
        .x_desc(column)
        .y_desc("Count")
        .draw()
        .map_err(backend_err)?;

    let color = series_color(0);
    chart
        .draw_series(counts.iter().enumerate().map(|(i, &count)| {
            let x0 = lo + bin_width * i as f64;
            Rectangle::new([(x0, 0.0), (x0 + bin_width, count as f64)], color.mix(0.6).filled())
        }))
        .map_err(backend_err)?;
    if let Some(curve) = kde {
        chart
            .draw_series(LineSeries::new(curve, color.stroke_width(2)))
            .map_err(backend_err)?;
    }
    Ok(())
}

fn draw_legend<'a, DB: DrawingBackend + 'a>(chart: &mut XyContext<'a, DB>) -> Result<(), RenderError> {
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(backend_err)
}

fn xy_chart<'a, DB: DrawingBackend>(
    root: &'a DrawingArea<DB, Shift>,
    title: &str,
    axes: (&str, &str),
    groups: &[Series],
) -> Result<XyContext<'a, DB>, RenderError> {
    let (x0, x1) = extent(groups.iter().flat_map(|g| g.points.iter().map(|p| p.0)), 0.05);
    let (y0, y1) = extent(groups.iter().flat_map(|g| g.points.iter().map(|p| p.1)), 0.05);

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(backend_err)?;
    chart
        .configure_mesh()
        .x_desc(axes.0)
        .y_desc(axes.1)
        .draw()
        .map_err(backend_err)?;
    Ok(chart)
}

pub fn scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    axes: (&str, &str),
    groups: &[Series],
) -> Result<(), RenderError> {
    let mut chart = xy_chart(root, title, axes, groups)?;
    for (i, group) in groups.iter().enumerate() {
        let color = series_color(i);
        let anno = chart
            .draw_series(group.points.iter().map(|&p| Circle::new(p, 4, color.filled())))
            .map_err(backend_err)?;
        if let Some(label) = &group.label {
            anno.label(label.as_str())
                .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
        }
    }
    if groups.iter().any(|g| g.label.is_some()) {
        draw_legend(&mut chart)?;
    }
    Ok(())
}

pub fn line<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    axes: (&str, &str),
    groups: &[Series],
) -> Result<(), RenderError> {
    let mut chart = xy_chart(root, title, axes, groups)?;
    for (i, group) in groups.iter().enumerate() {
        let color = series_color(i);
        let anno = chart
            .draw_series(LineSeries::new(group.points.iter().copied(), color.stroke_width(2)))
            .map_err(backend_err)?;
        if let Some(label) = &group.label {
            anno.label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }
    if groups.iter().any(|g| g.label.is_some()) {
        draw_legend(&mut chart)?;
    }
    Ok(())
}

/// One bar per (category, group); groups sit side by side within a category slot
pub fn bar<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    axes: (&str, &str),
    bars: &BarData,
) -> Result<(), RenderError> {
    let n = bars.categories.len();
    let means = bars.groups.iter().flat_map(|(_, m)| m.iter().flatten().copied());
    let (lo, hi) = extent(means.chain(std::iter::once(0.0)), 0.05);
    let (y0, y1) = (lo.min(0.0), hi.max(0.0));

    let label_for = |v: &f64| -> String {
        let r = v.round();
        if (v - r).abs() < 1e-6 && r >= 0.0 && (r as usize) < n {
            bars.categories[r as usize].clone()
        } else {
            String::new()
        }
    };

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT, 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y0..y1)
        .map_err(backend_err)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&label_for)
        .x_desc(axes.0)
        .y_desc(axes.1)
        .draw()
        .map_err(backend_err)?;

    let slots = bars.groups.len().max(1);
    let width = 0.8 / slots as f64;
    for (g, (label, means)) in bars.groups.iter().enumerate() {
        let color = series_color(g);
        let anno = chart
            .draw_series(means.iter().enumerate().filter_map(|(c, mean)| {
                let mean = (*mean)?;
                let left = c as f64 - 0.4 + width * g as f64;
                Some(Rectangle::new([(left, 0.0), (left + width, mean)], color.filled()))
            }))
            .map_err(backend_err)?;
        if let Some(label) = label {
            anno.label(label.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }
    }
    if bars.groups.iter().any(|(label, _)| label.is_some()) {
        draw_legend(&mut chart)?;
    }
    Ok(())
}

/// Blue through light grey to red over [-1, 1]
fn coolwarm(value: f64) -> RGBColor {
    const COLD: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const MID: (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

    if !value.is_finite() {
        return RGBColor(240, 240, 240);
    }
    let t = value.clamp(-1.0, 1.0);
    let (from, to, f) = if t < 0.0 { (MID, COLD, -t) } else { (MID, WARM, t) };
    let lerp = |a: f64, b: f64| (a + (b - a) * f).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

/// Annotated correlation matrix, first column at the top-left
pub fn heatmap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    correlation: &Correlation,
) -> Result<(), RenderError> {
    let labels = &correlation.labels;
    let n = labels.len() as u32;
    let label_at = |v: &SegmentValue<u32>, flip: bool| -> String {
        match v {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) if *i < n => {
                let idx = if flip { n - 1 - *i } else { *i };
                labels[idx as usize].clone()
            }
            _ => String::new(),
        }
    };
    let x_label = |v: &SegmentValue<u32>| label_at(v, false);
    let y_label = |v: &SegmentValue<u32>| label_at(v, true);

    let mut chart = ChartBuilder::on(root)
        .caption("Correlation Heatmap", (FONT, 24).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(120)
        .build_cartesian_2d((0u32..n).into_segmented(), (0u32..n).into_segmented())
        .map_err(backend_err)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n as usize)
        .y_labels(n as usize)
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .draw()
        .map_err(backend_err)?;

    let cells: Vec<(u32, u32, f64)> = (0..n)
        .flat_map(|row| (0..n).map(move |col| (row, col)))
        .map(|(row, col)| (row, col, correlation.matrix[row as usize][col as usize]))
        .collect();

    chart
        .draw_series(cells.iter().map(|&(row, col, value)| {
            let y = n - 1 - row;
            Rectangle::new(
                [
                    (SegmentValue::Exact(col), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(col + 1), SegmentValue::Exact(y + 1)),
                ],
                coolwarm(value).filled(),
            )
        }))
        .map_err(backend_err)?;

    let annotation = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    chart
        .draw_series(cells.iter().filter(|c| c.2.is_finite()).map(|&(row, col, value)| {
            let y = n - 1 - row;
            Text::new(
                format!("{:.2}", value),
                (SegmentValue::CenterOf(col), SegmentValue::CenterOf(y)),
                annotation.clone(),
            )
        }))
        .map_err(backend_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent() {
        assert_eq!(extent([1.0, 3.0].into_iter(), 0.0), (1.0, 3.0));
        assert_eq!(extent([2.0, 2.0].into_iter(), 0.1), (1.5, 2.5));
        assert_eq!(extent(std::iter::empty(), 0.1), (0.0, 1.0));
    }

    #[test]
    fn test_coolwarm_endpoints() {
        assert_eq!(coolwarm(-1.0), RGBColor(59, 76, 192));
        assert_eq!(coolwarm(0.0), RGBColor(221, 221, 221));
        assert_eq!(coolwarm(1.0), RGBColor(180, 4, 38));
        assert_eq!(coolwarm(f64::NAN), RGBColor(240, 240, 240));
    }

    #[test]
    fn test_kde_matches_histogram_scale() {
        let values: Vec<f64> = (0..100).map(|i| (i % 10) as f64).collect();
        let curve = kde_curve(&values, 0.0, 9.0, 0.45).unwrap();
        assert_eq!(curve.len(), KDE_POINTS);
        let area: f64 = curve.windows(2).map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0).sum();
        // Area under the scaled curve approximates count * bin width, minus tails outside the range
        assert!(area > 100.0 * 0.45 * 0.75 && area < 100.0 * 0.45 * 1.01);
        assert!(kde_curve(&[1.0], 0.0, 1.0, 0.1).is_none());
        assert!(kde_curve(&[2.0, 2.0], 1.5, 2.5, 0.05).is_none());
    }

    #[test]
    fn test_histogram_svg() {
        let svg = draw_svg(|root| histogram(root, "v", &[1.0, 2.0, 2.0, 3.0])).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Histogram of v"));
    }

    #[test]
    fn test_labelled_series_draw_legends() {
        let groups = vec![
            Series { label: Some("north".to_string()), points: vec![(1.0, 2.0), (2.0, 3.0)] },
            Series { label: Some("south".to_string()), points: vec![(1.0, 1.0), (2.0, 0.5)] },
        ];
        let scattered = draw_svg(|root| scatter(root, "s", ("x", "y"), &groups)).unwrap();
        let lined = draw_svg(|root| line(root, "l", ("x", "y"), &groups)).unwrap();
        for svg in [scattered, lined] {
            assert!(svg.contains("north"));
            assert!(svg.contains("south"));
        }

        let bars = BarData {
            categories: vec!["a".to_string(), "b".to_string()],
            groups: vec![(Some("g1".to_string()), vec![Some(1.0), None])],
        };
        let svg = draw_svg(|root| bar(root, "b", ("x", "y"), &bars)).unwrap();
        assert!(svg.contains("g1"));
    }
}
