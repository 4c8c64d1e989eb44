//! SVG chart rendering for log summaries
//!
//! Charts are written with the plotters SVG backend, which emits text as SVG
//! elements and therefore needs no system fonts.

use crate::error::AnalysisError;
use crate::logs::aggregate::{Heatmap, LabelCount};
use crate::records::{LogRecord, Timestamp};
use chrono::DateTime;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::Path;

type DrawResult = Result<(), Box<dyn std::error::Error>>;

const FONT: &str = "sans-serif";
const ORANGE: RGBColor = RGBColor(255, 165, 0);
const LABEL_CHARS: usize = 40;

fn render_error(chart: &str, err: Box<dyn std::error::Error>) -> AnalysisError {
    AnalysisError::RenderError {
        chart: chart.to_string(),
        message: err.to_string(),
    }
}

fn reds(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let fade = (255.0 * (1.0 - 0.85 * t)) as u8;
    let red = (255.0 * (1.0 - 0.4 * t * t)) as u8;
    RGBColor(red, fade, fade)
}

fn seconds(ts: &Timestamp) -> i64 {
    ts.and_utc().timestamp()
}

fn format_seconds(secs: i64, format: &str) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc().format(format).to_string())
        .unwrap_or_default()
}

/// Padded time range covering every timestamp
fn time_range<'a, I>(times: I) -> std::ops::Range<i64>
where
    I: Iterator<Item = &'a Timestamp>,
{
    let secs: Vec<i64> = times.map(seconds).collect();
    let min = secs.iter().copied().min().unwrap_or(0);
    let max = secs.iter().copied().max().unwrap_or(0);
    let pad = ((max - min) / 20).max(60);
    (min - pad)..(max + pad)
}

fn truncate_label(text: &str) -> String {
    text.chars().take(LABEL_CHARS).collect()
}

fn blank_label(_: &i32) -> String {
    String::new()
}

fn label_style(h: HPos, v: VPos) -> TextStyle<'static> {
    TextStyle::from((FONT, 14).into_font()).pos(Pos::new(h, v))
}

/// Corners of a heatmap cell; the first row is drawn at the top
fn heatmap_cell(rows: i32, row: usize, col: usize) -> [(i32, i32); 2] {
    let (x, y) = (col as i32, rows - 1 - row as i32);
    [(x, y), (x + 1, y + 1)]
}

/// Line chart of ERROR counts per hour of day
pub fn render_error_trend(trend: &BTreeMap<u32, usize>, path: &Path) -> Result<(), AnalysisError> {
    draw_error_trend(trend, path).map_err(|e| render_error("error_trends", e))
}

fn draw_error_trend(trend: &BTreeMap<u32, usize>, path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let max = trend.values().copied().max().unwrap_or(0).max(1) as u32;
    let mut chart = ChartBuilder::on(&root)
        .caption("Error Trends by Hour", (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0u32..24u32, 0u32..max + 1)?;

    chart
        .configure_mesh()
        .x_labels(24)
        .x_desc("Hour of Day")
        .y_desc("Number of Errors")
        .draw()?;

    let points: Vec<(u32, u32)> = trend.iter().map(|(h, c)| (*h, *c as u32)).collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), &RED))?;
    chart.draw_series(
        points
            .iter()
            .map(|point| Circle::new(*point, 4, RED.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Pie chart of error types with percentage labels
pub fn render_error_distribution(
    distribution: &[LabelCount],
    path: &Path,
) -> Result<(), AnalysisError> {
    draw_error_distribution(distribution, path).map_err(|e| render_error("error_distribution", e))
}

fn draw_error_distribution(distribution: &[LabelCount], path: &Path) -> DrawResult {
    let (width, height) = (800u32, 800u32);
    let root = SVGBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Error Distribution by Type", (FONT, 24))?;

    let center = (width as i32 / 2, height as i32 / 2 - 30);
    let radius = 280.0;
    let total: usize = distribution.iter().map(|d| d.count).sum();

    if total == 0 {
        root.draw(&Text::new(
            "No error types found",
            center,
            TextStyle::from((FONT, 20).into_font()).pos(Pos::new(HPos::Center, VPos::Center)),
        ))?;
        root.present()?;
        return Ok(());
    }

    // Start at twelve o'clock and go counter-clockwise
    let mut start = PI / 2.0;
    for (index, slice) in distribution.iter().enumerate() {
        let share = slice.count as f64 / total as f64;
        let sweep = share * 2.0 * PI;
        let steps = ((sweep / (2.0 * PI)) * 120.0).ceil().max(2.0) as usize;

        let mut wedge = vec![center];
        for step in 0..=steps {
            let angle = start + sweep * step as f64 / steps as f64;
            wedge.push((
                center.0 + (radius * angle.cos()) as i32,
                center.1 - (radius * angle.sin()) as i32,
            ));
        }

        let shade = 1.0 - index as f64 / distribution.len().max(1) as f64;
        root.draw(&Polygon::new(wedge, reds(0.25 + 0.75 * shade).filled()))?;

        let mid = start + sweep / 2.0;
        let label_at = |r: f64| {
            (
                center.0 + (r * mid.cos()) as i32,
                center.1 - (r * mid.sin()) as i32,
            )
        };
        let centered = TextStyle::from((FONT, 16).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new(
            format!("{:.1}%", share * 100.0),
            label_at(radius * 0.6),
            centered.clone(),
        ))?;
        root.draw(&Text::new(slice.label.clone(), label_at(radius + 40.0), centered))?;

        start += sweep;
    }

    root.present()?;
    Ok(())
}

/// Annotated heatmap of error counts by weekday and hour
pub fn render_error_heatmap(heatmap: &Heatmap, path: &Path) -> Result<(), AnalysisError> {
    draw_error_heatmap(heatmap, path).map_err(|e| render_error("error_heatmap", e))
}

fn draw_error_heatmap(heatmap: &Heatmap, path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let cols = heatmap.hours.len().max(1) as i32;
    let rows = heatmap.days.len().max(1) as i32;

    let mut chart = ChartBuilder::on(&root)
        .caption("Error Heatmap by Day and Hour", (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(100)
        .build_cartesian_2d(0i32..cols, 0i32..rows)?;

    // Ticks mark cell edges; the labels themselves are drawn at cell centres below
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(cols as usize + 1)
        .y_labels(rows as usize + 1)
        .x_label_formatter(&blank_label)
        .y_label_formatter(&blank_label)
        .x_desc("Hour of Day")
        .y_desc("Day of Week")
        .draw()?;

    let max = heatmap.max_count().max(1) as f64;
    for (row, counts) in heatmap.cells.iter().enumerate() {
        for (col, count) in counts.iter().enumerate() {
            let color = reds(*count as f64 / max);
            chart.draw_series(std::iter::once(Rectangle::new(
                heatmap_cell(rows, row, col),
                color.filled(),
            )))?;
        }
    }

    for (row, counts) in heatmap.cells.iter().enumerate() {
        for (col, count) in counts.iter().enumerate() {
            let [low, high] = heatmap_cell(rows, row, col);
            let (x0, y0) = chart.backend_coord(&low);
            let (x1, y1) = chart.backend_coord(&high);
            root.draw(&Text::new(
                count.to_string(),
                ((x0 + x1) / 2, (y0 + y1) / 2),
                label_style(HPos::Center, VPos::Center),
            ))?;
        }
    }

    for (col, hour) in heatmap.hours.iter().enumerate() {
        let [low, high] = heatmap_cell(rows, 0, col);
        let (x0, _) = chart.backend_coord(&low);
        let (x1, _) = chart.backend_coord(&high);
        let (_, bottom) = chart.backend_coord(&(0, 0));
        root.draw(&Text::new(
            hour.to_string(),
            ((x0 + x1) / 2, bottom + 8),
            label_style(HPos::Center, VPos::Top),
        ))?;
    }

    for (row, day) in heatmap.days.iter().enumerate() {
        let [low, high] = heatmap_cell(rows, row, 0);
        let (left, y0) = chart.backend_coord(&low);
        let (_, y1) = chart.backend_coord(&high);
        root.draw(&Text::new(
            format!("{:?}", day),
            (left - 8, (y0 + y1) / 2),
            label_style(HPos::Right, VPos::Center),
        ))?;
    }

    root.present()?;
    Ok(())
}

/// Bar chart of failed logins per user
pub fn render_failed_logins(users: &[LabelCount], path: &Path) -> Result<(), AnalysisError> {
    draw_failed_logins(users, path).map_err(|e| render_error("unauth_users", e))
}

fn draw_failed_logins(users: &[LabelCount], path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let cols = users.len().max(1) as i32;
    let max = users.iter().map(|u| u.count).max().unwrap_or(0).max(1) as u32;

    let mut chart = ChartBuilder::on(&root)
        .caption("Unauthenticated Users", (FONT, 24))
        .margin(20)
        .x_label_area_size(80)
        .y_label_area_size(50)
        .build_cartesian_2d(0i32..cols, 0u32..max + 1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(cols as usize + 1)
        .x_label_formatter(&blank_label)
        .x_desc("User")
        .y_desc("Number of Failed Logins")
        .draw()?;

    chart.draw_series(users.iter().enumerate().map(|(i, user)| {
        let x = i as i32;
        Rectangle::new([(x, 0), (x + 1, user.count as u32)], ORANGE.filled())
    }))?;

    for (i, user) in users.iter().enumerate() {
        let (x0, bottom) = chart.backend_coord(&(i as i32, 0));
        let (x1, _) = chart.backend_coord(&(i as i32 + 1, 0));
        root.draw(&Text::new(
            user.label.clone(),
            ((x0 + x1) / 2, bottom + 8),
            label_style(HPos::Center, VPos::Top),
        ))?;
    }

    root.present()?;
    Ok(())
}

/// Scatter of every log event along the time axis
pub fn render_timeline(times: &[Timestamp], path: &Path) -> Result<(), AnalysisError> {
    draw_timeline(times, path).map_err(|e| render_error("timeline", e))
}

fn draw_timeline(times: &[Timestamp], path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (1500, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Log Event Timeline", (FONT, 24))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(10)
        .build_cartesian_2d(time_range(times.iter()), 0f64..2f64)?;

    let x_formatter = |x: &i64| format_seconds(*x, "%Y-%m-%d %H:%M");
    chart
        .configure_mesh()
        .disable_y_axis()
        .disable_y_mesh()
        .x_labels(8)
        .x_label_formatter(&x_formatter)
        .x_desc("Time")
        .draw()?;

    chart.draw_series(
        times
            .iter()
            .map(|ts| Circle::new((seconds(ts), 1.0), 4, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Scatter of blocked/denied login events with truncated message labels
pub fn render_unauthorized_timeline(
    events: &[&LogRecord],
    path: &Path,
) -> Result<(), AnalysisError> {
    draw_unauthorized_timeline(events, path).map_err(|e| render_error("unauthorized_timeline", e))
}

fn draw_unauthorized_timeline(events: &[&LogRecord], path: &Path) -> DrawResult {
    let root = SVGBackend::new(path, (1500, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Unauthorized Events Timeline", (FONT, 24))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(10)
        .build_cartesian_2d(time_range(events.iter().map(|e| &e.timestamp)), 0f64..2f64)?;

    let x_formatter = |x: &i64| format_seconds(*x, "%Y-%m-%d %H:%M:%S");
    chart
        .configure_mesh()
        .disable_y_axis()
        .disable_y_mesh()
        .x_labels(6)
        .x_label_formatter(&x_formatter)
        .x_desc("Time")
        .draw()?;

    chart.draw_series(
        events
            .iter()
            .map(|event| Circle::new((seconds(&event.timestamp), 1.0), 5, RED.filled())),
    )?;
    chart.draw_series(events.iter().map(|event| {
        Text::new(
            truncate_label(&event.message),
            (seconds(&event.timestamp), 1.1),
            TextStyle::from((FONT, 11).into_font()).pos(Pos::new(HPos::Left, VPos::Bottom)),
        )
    }))?;

    root.present()?;
    Ok(())
}
