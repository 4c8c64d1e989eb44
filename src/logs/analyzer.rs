use crate::error::AnalysisError;
use crate::logs::aggregate::{self, LabelCount};
use crate::logs::charts;
use crate::logs::parser::parse_log;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File prefix used when no corpus name is given
pub const DEFAULT_PREFIX: &str = "corpus_log";

/// Paths of the charts produced by one analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPaths {
    pub error_trends: PathBuf,
    pub error_distribution: PathBuf,
    pub error_heatmap: PathBuf,
    pub unauth_users: PathBuf,
    pub timeline: PathBuf,
    /// Only rendered when at least one blocked or denied login was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unauthorized_timeline: Option<PathBuf>,
}

/// Aggregate figures and chart locations for a log file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub total_errors: usize,
    /// Error type token → occurrences
    pub error_types: BTreeMap<String, usize>,
    /// User address → failed login attempts
    pub failed_logins: BTreeMap<String, usize>,
    pub unauthorized_events: usize,
    pub records_parsed: usize,
    pub skipped_lines: usize,
    pub plots: ChartPaths,
}

/// Turn a corpus name into a safe file name prefix
///
/// Full resource names contribute only their last segment.
pub fn file_prefix(corpus_name: &str) -> String {
    let last = corpus_name.trim().rsplit('/').next().unwrap_or_default();
    if last.is_empty() {
        return DEFAULT_PREFIX.to_string();
    }
    last.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn to_map(counts: &[LabelCount]) -> BTreeMap<String, usize> {
    counts
        .iter()
        .map(|c| (c.label.clone(), c.count))
        .collect()
}

/// Parse log text, aggregate it and render every chart into `output_dir`
///
/// # Errors
///
/// `MissingContent` when no text is given, `InvalidFormat` when no line parses,
/// `RenderError`/`IoError` when a chart cannot be written.
pub fn analyze_logs(
    corpus_name: &str,
    log_content: Option<&str>,
    output_dir: &Path,
) -> Result<AnalysisSummary, AnalysisError> {
    let content = log_content.ok_or(AnalysisError::MissingContent)?;
    let prefix = file_prefix(corpus_name);
    info!("Analyzing logs with chart prefix '{}'", prefix);

    let parsed = parse_log(content);
    debug!(
        "Parsed {} records, skipped {} lines",
        parsed.records.len(),
        parsed.skipped_lines
    );
    if parsed.is_empty() {
        return Err(AnalysisError::InvalidFormat);
    }
    let records = &parsed.records;

    std::fs::create_dir_all(output_dir)?;
    let chart_path = |suffix: &str| output_dir.join(format!("{}_{}.svg", prefix, suffix));

    let total_errors = records.iter().filter(|r| r.is_error()).count();
    debug!("Number of error rows: {}", total_errors);

    let trend = aggregate::error_trend(records);
    debug!("Error trend data: {:?}", trend);
    let error_trends = chart_path("error_trends");
    charts::render_error_trend(&trend, &error_trends)?;

    let distribution = aggregate::error_distribution(records);
    debug!("Error distribution data: {:?}", distribution);
    let error_distribution = chart_path("error_distribution");
    charts::render_error_distribution(&distribution, &error_distribution)?;

    let heatmap = aggregate::error_heatmap(records);
    debug!(
        "Heatmap shape: {}x{}",
        heatmap.days.len(),
        heatmap.hours.len()
    );
    let error_heatmap = chart_path("error_heatmap");
    charts::render_error_heatmap(&heatmap, &error_heatmap)?;

    let users = aggregate::failed_logins(records);
    debug!("Failed login data: {:?}", users);
    let unauth_users = chart_path("unauth_users");
    charts::render_failed_logins(&users, &unauth_users)?;

    let timeline = chart_path("timeline");
    charts::render_timeline(&aggregate::timeline(records), &timeline)?;

    let unauthorized = aggregate::unauthorized_events(records);
    let unauthorized_timeline = if unauthorized.is_empty() {
        debug!("No unauthorized events found");
        None
    } else {
        debug!("Unauthorized events found: {}", unauthorized.len());
        let path = chart_path("unauthorized_timeline");
        charts::render_unauthorized_timeline(&unauthorized, &path)?;
        Some(path)
    };

    info!("All plots generated in {}", output_dir.display());

    Ok(AnalysisSummary {
        total_errors,
        error_types: to_map(&distribution),
        failed_logins: to_map(&users),
        unauthorized_events: unauthorized.len(),
        records_parsed: records.len(),
        skipped_lines: parsed.skipped_lines,
        plots: ChartPaths {
            error_trends,
            error_distribution,
            error_heatmap,
            unauth_users,
            timeline,
            unauthorized_timeline,
        },
    })
}
