//! SVG charts.

use std::path::Path;

use plotters::prelude::*;

use crate::error::AppError;

const CHART_SIZE: (u32, u32) = (800, 600);

const PALETTE: [RGBColor; 4] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
];

/// Empirical cumulative distribution `(value, fraction <= value)` of a series.
pub fn cumulative(values: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(idx, v)| (v, (idx + 1) as f64 / n))
        .collect()
}

/// Draw one cumulative-distribution line per named series.
pub fn draw_cumulative(path: &Path, title: &str, series: &[(&str, Vec<f64>)]) -> Result<(), AppError> {
    let curves: Vec<(&str, Vec<(f64, f64)>)> = series
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(name, values)| (*name, cumulative(values)))
        .collect();

    let (x0, x1) = curves
        .iter()
        .flat_map(|(_, c)| c.iter().map(|&(x, _)| x))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
    if !(x0.is_finite() && x1.is_finite()) {
        return Err(AppError::io("Nothing to plot."));
    }
    // Pad so single-valued series still get a non-empty axis.
    let pad = ((x1 - x0) * 0.05).max(x1.abs() * 0.05).max(1e-9);

    render(path, title, &curves, (x0 - pad)..(x1 + pad))
        .map_err(|e| AppError::io(format!("Failed to draw '{}': {e}", path.display())))
}

fn render(
    path: &Path,
    title: &str,
    curves: &[(&str, Vec<(f64, f64)>)],
    x_range: std::ops::Range<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x_range, 0.0..1.0)?;

    chart
        .configure_mesh()
        .x_desc("equivalent diameter")
        .y_desc("cumulative fraction")
        .x_labels(8)
        .y_labels(5)
        .draw()?;

    for (idx, (name, curve)) in curves.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        chart
            .draw_series(LineSeries::new(curve.iter().copied(), color.stroke_width(2)))?
            .label(*name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_fraction_reaches_one() {
        let c = cumulative(&[3.0, 1.0, 2.0, 2.0]);
        assert_eq!(c.first(), Some(&(1.0, 0.25)));
        assert_eq!(c.last(), Some(&(3.0, 1.0)));
        assert!(c.windows(2).all(|w| w[0].0 <= w[1].0 && w[0].1 < w[1].1));
    }

    #[test]
    fn writes_svg() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chart.svg");
        draw_cumulative(&path, "test", &[("a", vec![1.0, 2.0]), ("b", vec![5.0]), ("empty", vec![])]).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn empty_input_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(draw_cumulative(&tmp.path().join("x.svg"), "t", &[("a", vec![])]).is_err());
    }
}
