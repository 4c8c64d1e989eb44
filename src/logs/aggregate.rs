//! Tabular summaries derived from parsed log records

use crate::records::{LogRecord, Timestamp};
use chrono::{Datelike, Timelike, Weekday};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

const UNAUTHORIZED_MARKERS: &[&str] = &["blocked login", "login denied"];

fn error_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"ERROR_\w+").expect("error type pattern is valid"))
}

fn failed_login_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Failed login.*user (.*@.*)").expect("failed login pattern is valid")
    })
}

/// A label with its number of occurrences
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Error counts by weekday and hour
///
/// `cells[row][col]` is the count for `days[row]` at `hours[col]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    pub days: Vec<Weekday>,
    pub hours: Vec<u32>,
    pub cells: Vec<Vec<usize>>,
}

impl Heatmap {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty() || self.hours.is_empty()
    }

    pub fn max_count(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter().copied())
            .max()
            .unwrap_or(0)
    }

    pub fn count(&self, day: Weekday, hour: u32) -> usize {
        let row = self.days.iter().position(|d| *d == day);
        let col = self.hours.iter().position(|h| *h == hour);
        match (row, col) {
            (Some(r), Some(c)) => self.cells[r][c],
            _ => 0,
        }
    }
}

/// Number of ERROR records per hour of day, hours without errors omitted
pub fn error_trend(records: &[LogRecord]) -> BTreeMap<u32, usize> {
    let mut trend = BTreeMap::new();
    for record in records.iter().filter(|r| r.is_error()) {
        *trend.entry(record.timestamp.hour()).or_insert(0) += 1;
    }
    trend
}

/// Frequency of the first `ERROR_<name>` token in each message
///
/// All records are scanned, not only ERROR ones, since the token may appear
/// in messages of any level.
pub fn error_distribution(records: &[LogRecord]) -> Vec<LabelCount> {
    let tokens = records
        .iter()
        .filter_map(|r| error_type_pattern().find(&r.message))
        .map(|m| m.as_str().to_string());
    ranked_counts(tokens)
}

/// Error counts pivoted by weekday (rows) and hour (columns)
pub fn error_heatmap(records: &[LogRecord]) -> Heatmap {
    let mut counts: HashMap<(Weekday, u32), usize> = HashMap::new();
    for record in records.iter().filter(|r| r.is_error()) {
        let key = (record.timestamp.weekday(), record.timestamp.hour());
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut days: Vec<Weekday> = counts.keys().map(|(day, _)| *day).collect();
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();

    let mut hours: Vec<u32> = counts.keys().map(|(_, hour)| *hour).collect();
    hours.sort_unstable();
    hours.dedup();

    let cells = days
        .iter()
        .map(|day| {
            hours
                .iter()
                .map(|hour| counts.get(&(*day, *hour)).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    Heatmap { days, hours, cells }
}

/// Users named in "Failed login ... user <address>" messages, most frequent first
pub fn failed_logins(records: &[LogRecord]) -> Vec<LabelCount> {
    let users = records.iter().filter_map(|r| {
        failed_login_pattern()
            .captures(&r.message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    });
    ranked_counts(users)
}

/// Timestamps of every record, in input order
pub fn timeline(records: &[LogRecord]) -> Vec<Timestamp> {
    records.iter().map(|r| r.timestamp).collect()
}

/// Records describing blocked or denied logins
pub fn unauthorized_events(records: &[LogRecord]) -> Vec<&LogRecord> {
    records
        .iter()
        .filter(|r| {
            let message = r.message.to_lowercase();
            UNAUTHORIZED_MARKERS.iter().any(|m| message.contains(m))
        })
        .collect()
}

/// Count labels and sort by descending count, ties by label
fn ranked_counts<I>(labels: I) -> Vec<LabelCount>
where
    I: Iterator<Item = String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut ranked: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::parser::parse_log;

    // 2024-03-04 is a Monday
    const SAMPLE: &str = "\
2024-03-04 09:10:00|ERROR|ERROR_DB connection lost
2024-03-04 09:45:00|ERROR|ERROR_DB connection lost again
2024-03-04 10:00:00|INFO|Failed login attempt for user alice@example.com
2024-03-05 10:05:00|ERROR|ERROR_AUTH token expired
2024-03-05 10:06:00|WARNING|Failed login attempt for user alice@example.com
2024-03-05 10:07:00|WARNING|Failed login attempt for user bob@example.com
2024-03-06 23:59:00|INFO|Blocked login from 10.0.0.1
2024-03-06 23:59:30|INFO|LOGIN DENIED for mallory
2024-03-07 08:00:00|INFO|ERROR_CACHE mentioned in info line
";

    fn records() -> Vec<LogRecord> {
        parse_log(SAMPLE).records
    }

    #[test]
    fn test_error_trend_by_hour() {
        let trend = error_trend(&records());
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[&9], 2);
        assert_eq!(trend[&10], 1);
        assert!(!trend.contains_key(&23));
    }

    #[test]
    fn test_error_distribution_ranks_by_count() {
        let distribution = error_distribution(&records());
        assert_eq!(
            distribution,
            vec![
                LabelCount { label: "ERROR_DB".to_string(), count: 2 },
                LabelCount { label: "ERROR_AUTH".to_string(), count: 1 },
                LabelCount { label: "ERROR_CACHE".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_error_heatmap_pivot() {
        let heatmap = error_heatmap(&records());
        assert_eq!(heatmap.days, vec![Weekday::Mon, Weekday::Tue]);
        assert_eq!(heatmap.hours, vec![9, 10]);
        assert_eq!(heatmap.cells, vec![vec![2, 0], vec![0, 1]]);
        assert_eq!(heatmap.count(Weekday::Mon, 9), 2);
        assert_eq!(heatmap.count(Weekday::Sun, 9), 0);
        assert_eq!(heatmap.max_count(), 2);
    }

    #[test]
    fn test_error_heatmap_empty_without_errors() {
        let records = parse_log("2024-03-04 09:10:00|INFO|fine").records;
        let heatmap = error_heatmap(&records);
        assert!(heatmap.is_empty());
        assert_eq!(heatmap.max_count(), 0);
    }

    #[test]
    fn test_failed_logins() {
        let users = failed_logins(&records());
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].label, "alice@example.com");
        assert_eq!(users[0].count, 2);
        assert_eq!(users[1].label, "bob@example.com");
    }

    #[test]
    fn test_failed_login_without_address_is_ignored() {
        let records = parse_log("2024-03-04 09:10:00|WARNING|Failed login for user admin").records;
        assert!(failed_logins(&records).is_empty());
    }

    #[test]
    fn test_unauthorized_events_case_insensitive() {
        let records = records();
        let events = unauthorized_events(&records);
        assert_eq!(events.len(), 2);
        assert!(events[0].message.starts_with("Blocked login"));
        assert!(events[1].message.starts_with("LOGIN DENIED"));
    }

    #[test]
    fn test_timeline_preserves_order() {
        let records = records();
        let times = timeline(&records);
        assert_eq!(times.len(), records.len());
        assert_eq!(times[0], records[0].timestamp);
    }
}
