use std::ops::Range;
use std::path::PathBuf;

use chrono::NaiveDate;
use plotters::prelude::*;
use revenue_core::{
    config::{ChartConfig, RevenueConfig},
    error::{Result, RevenueError},
    types::DailyRevenue,
};
use tracing::{info, instrument};

use crate::snapshot::{read_snapshot, write_atomic};

const MAX_X_LABELS: usize = 12;
const MARKER_RADIUS: i32 = 4;

/// Chart series in ascending date order, whatever order `rows` arrive in.
pub fn chart_points(rows: &[DailyRevenue]) -> Vec<(NaiveDate, f64)> {
    let mut points: Vec<_> = rows
        .iter()
        .map(|r| (r.sale_date, r.total_revenue))
        .collect();
    points.sort_by_key(|(date, _)| *date);
    points
}

/// Render the revenue line chart as an SVG document.
///
/// An empty `rows` still produces a titled, labelled chart with no series.
pub fn render_chart(rows: &[DailyRevenue], style: &ChartConfig) -> Result<String> {
    let points = chart_points(rows);
    let (x_range, y_range) = axis_ranges(&points);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (style.width, style.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&style.title, ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(100)
            .y_label_area_size(90)
            .build_cartesian_2d(x_range, y_range)
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Total Revenue")
            .x_labels(points.len().clamp(2, MAX_X_LABELS))
            .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
            .x_label_style(
                ("sans-serif", 12)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .y_label_formatter(&|v: &f64| format!("{v:.2}"))
            .bold_line_style(BLACK.mix(0.2))
            .light_line_style(BLACK.mix(0.05))
            .draw()
            .map_err(render_error)?;

        if !points.is_empty() {
            chart
                .draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))
                .map_err(render_error)?;
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(d, v)| Circle::new((d, v), MARKER_RADIUS, BLUE.filled())),
                )
                .map_err(render_error)?;
        }

        root.present().map_err(render_error)?;
    }
    Ok(svg)
}

/// Renderer stage: per-day snapshot in, chart image out.
///
/// Returns the path the chart was written to.
#[instrument(skip_all, fields(input = %config.output.revenue_snapshot.display()))]
pub fn plot_daily_revenue(config: &RevenueConfig) -> Result<PathBuf> {
    let input = &config.output.revenue_snapshot;
    let rows: Vec<DailyRevenue> = read_snapshot(input, &DailyRevenue::COLUMNS)?;
    for row in &rows {
        row.validate()
            .map_err(|reason| RevenueError::schema(input.display().to_string(), reason))?;
    }

    let svg = render_chart(&rows, &config.chart)?;
    let path = config.output.chart.clone();
    write_atomic(&path, svg.as_bytes())?;
    info!(points = rows.len(), path = %path.display(), "revenue chart saved");
    Ok(path)
}

/// Pad the date axis by a day on each side so single-day data is visible.
fn axis_ranges(points: &[(NaiveDate, f64)]) -> (Range<NaiveDate>, Range<f64>) {
    let (first, last) = match (points.first(), points.last()) {
        (Some(&(first, _)), Some(&(last, _))) => (first, last),
        _ => {
            let epoch = NaiveDate::default();
            (epoch, epoch)
        }
    };
    let start = first.pred_opt().unwrap_or(first);
    let end = last.succ_opt().unwrap_or(last);

    let low = points.iter().map(|&(_, v)| v).fold(0.0_f64, f64::min);
    let high = points.iter().map(|&(_, v)| v).fold(0.0_f64, f64::max);
    let high = if high > low { high * 1.1 } else { low + 1.0 };

    (start..end, low..high)
}

fn render_error<E: std::fmt::Display>(err: E) -> RevenueError {
    RevenueError::Render(err.to_string())
}
