use crate::records::{LogLevel, LogRecord, Timestamp};
use chrono::{DateTime, NaiveDateTime};
use log::debug;

/// Field separator of the log format
pub const DELIMITER: char = '|';

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Result of parsing a block of log text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLog {
    pub records: Vec<LogRecord>,
    /// Non-blank lines that could not be turned into a record
    pub skipped_lines: usize,
}

impl ParsedLog {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse `timestamp|level|message` lines
///
/// Blank lines are ignored. A line is skipped when it has fewer than three
/// fields or its timestamp does not parse. Any `|` after the second one
/// belongs to the message.
pub fn parse_log(content: &str) -> ParsedLog {
    let mut parsed = ParsedLog::default();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Some(record) => parsed.records.push(record),
            None => {
                debug!("Skipping malformed log line {}: '{}'", index + 1, line);
                parsed.skipped_lines += 1;
            }
        }
    }

    parsed
}

/// Parse one line into a record
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let mut fields = line.splitn(3, DELIMITER);
    let timestamp = parse_timestamp(fields.next()?)?;
    let level = fields.next()?;
    let message = fields.next()?;

    Some(LogRecord {
        timestamp,
        level: LogLevel::parse(level),
        message: message.trim().to_string(),
    })
}

/// Parse a timestamp in any of the accepted layouts
///
/// Zoned RFC 3339 timestamps are converted to UTC.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }

    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_basic_line() {
        let record = parse_line("2024-03-04 13:15:00|ERROR|ERROR_DB connection lost").unwrap();
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.message, "ERROR_DB connection lost");
        assert_eq!(record.timestamp.hour(), 13);
        assert_eq!(record.timestamp.day(), 4);
    }

    #[test]
    fn test_message_keeps_extra_delimiters() {
        let record = parse_line("2024-03-04 13:15:00|INFO|a|b|c").unwrap();
        assert_eq!(record.message, "a|b|c");
    }

    #[test]
    fn test_fields_are_trimmed() {
        let record = parse_line(" 2024-03-04 13:15:00 | WARN |  disk almost full ").unwrap();
        assert_eq!(record.level, LogLevel::Warning);
        assert_eq!(record.message, "disk almost full");
    }

    #[test]
    fn test_timestamp_layouts() {
        assert!(parse_timestamp("2024-03-04 13:15:00.123").is_some());
        assert!(parse_timestamp("2024-03-04T13:15:00").is_some());
        assert!(parse_timestamp("2024/03/04 13:15:00").is_some());
        assert!(parse_timestamp("2024-03-04 13:15").is_some());

        let zoned = parse_timestamp("2024-03-04T13:15:00+02:00").unwrap();
        assert_eq!(zoned.hour(), 11);

        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_log_counts_skipped_lines() {
        let content = "\
2024-03-04 13:15:00|ERROR|ERROR_DB connection lost

not a log line
2024-03-04 14:00:00|INFO|started
bad-time|INFO|x
";
        let parsed = parse_log(content);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.skipped_lines, 2);
    }

    #[test]
    fn test_parse_empty_content() {
        let parsed = parse_log("\n  \n");
        assert!(parsed.is_empty());
        assert_eq!(parsed.skipped_lines, 0);
    }

    #[test]
    fn test_missing_message_field_is_skipped() {
        assert!(parse_line("2024-03-04 13:15:00|ERROR").is_none());
    }

    #[test]
    fn test_empty_message_is_allowed() {
        let record = parse_line("2024-03-04 13:15:00|INFO|").unwrap();
        assert_eq!(record.message, "");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// A well-formed log line with known components
    #[derive(Debug, Clone)]
    struct ValidLine {
        hour: u32,
        minute: u32,
        level: &'static str,
        message: String,
    }

    impl Arbitrary for ValidLine {
        fn arbitrary(g: &mut Gen) -> Self {
            let levels = ["INFO", "ERROR", "WARNING", "DEBUG", "CRITICAL"];
            let message: String = String::arbitrary(g)
                .chars()
                .filter(|c| !c.is_control())
                .collect();
            ValidLine {
                hour: u32::arbitrary(g) % 24,
                minute: u32::arbitrary(g) % 60,
                level: g.choose(&levels).copied().unwrap_or("INFO"),
                message: message.trim().to_string(),
            }
        }
    }

    impl ValidLine {
        fn render(&self) -> String {
            format!(
                "2024-05-06 {:02}:{:02}:00|{}|{}",
                self.hour, self.minute, self.level, self.message
            )
        }
    }

    #[quickcheck]
    fn prop_valid_lines_round_trip_fields(lines: Vec<ValidLine>) -> bool {
        let content: Vec<String> = lines.iter().map(|l| l.render()).collect();
        let parsed = parse_log(&content.join("\n"));

        parsed.skipped_lines == 0
            && parsed.records.len() == lines.len()
            && parsed.records.iter().zip(lines.iter()).all(|(record, line)| {
                use chrono::Timelike;
                record.timestamp.hour() == line.hour
                    && record.timestamp.minute() == line.minute
                    && record.level == LogLevel::parse(line.level)
                    && record.message == line.message
            })
    }

    #[quickcheck]
    fn prop_parser_never_panics(content: String) -> bool {
        let parsed = parse_log(&content);
        let non_blank = content.lines().filter(|l| !l.trim().is_empty()).count();
        parsed.records.len() + parsed.skipped_lines == non_blank
    }
}
