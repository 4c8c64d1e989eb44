/// Pipe-delimited log parsing
pub mod parser;

/// Hourly, per-type, per-day and login summaries
pub mod aggregate;

/// SVG chart rendering
pub mod charts;

/// Parse → aggregate → render pipeline
pub mod analyzer;

pub use analyzer::{analyze_logs, AnalysisSummary, ChartPaths};
pub use parser::{parse_log, ParsedLog};
