//! Lenient line-delimited JSON reading.
//!
//! Every non-empty line is parsed as an independent JSON value. Lines that
//! fail to parse are counted and skipped; they never abort the file. A
//! truncated last line (a session still being written) is just one more
//! skipped line.

use serde_json::Value;
use tracing::{debug, trace};

/// Statistics about one line-mode parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Total lines seen.
    pub lines_processed: usize,
    /// Lines that parsed as JSON.
    pub entries_parsed: usize,
    /// Malformed lines.
    pub lines_skipped: usize,
    /// Blank lines.
    pub empty_lines: usize,
    /// Details of skipped lines.
    pub errors: Vec<LineError>,
}

impl ParseStats {
    /// Share of non-empty lines that parsed, as a percentage.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let non_empty = self.lines_processed - self.empty_lines;
        if non_empty == 0 {
            return 100.0;
        }
        (self.entries_parsed as f64 / non_empty as f64) * 100.0
    }
}

/// A skipped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number.
    pub line: usize,
    /// Parser message.
    pub message: String,
    /// Start of the offending line.
    pub content_preview: String,
}

/// A parsed line with its 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonLine {
    /// 1-based line number.
    pub line: usize,
    /// Parsed value.
    pub value: Value,
}

/// Parse `content` one JSON value per line, skipping malformed lines.
#[must_use]
pub fn parse_json_lines(content: &str) -> (Vec<JsonLine>, ParseStats) {
    let mut stats = ParseStats::default();
    let mut values = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_num = index + 1;
        stats.lines_processed += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            stats.empty_lines += 1;
            continue;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                stats.entries_parsed += 1;
                values.push(JsonLine {
                    line: line_num,
                    value,
                });
            }
            Err(e) => {
                trace!(line = line_num, error = %e, "Malformed line, skipping");
                stats.lines_skipped += 1;
                stats.errors.push(LineError {
                    line: line_num,
                    message: e.to_string(),
                    content_preview: truncate_preview(trimmed, 100),
                });
            }
        }
    }

    debug!(
        entries = stats.entries_parsed,
        lines = stats.lines_processed,
        skipped = stats.lines_skipped,
        "Line parse complete"
    );
    (values, stats)
}

/// Truncate on a character boundary, appending `...` when shortened.
fn truncate_preview(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_malformed_and_blank_lines() {
        let content = "{\"a\":1}\n\nnot json\n{\"b\":2}\n{\"trunc";
        let (values, stats) = parse_json_lines(content);

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].line, 1);
        assert_eq!(values[1].line, 4);
        assert_eq!(stats.lines_processed, 5);
        assert_eq!(stats.empty_lines, 1);
        assert_eq!(stats.lines_skipped, 2);
        assert_eq!(stats.errors[0].line, 3);
        assert!((stats.success_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_crlf_lines() {
        let (values, stats) = parse_json_lines("{\"a\":1}\r\n{\"b\":2}\r\n");
        assert_eq!(values.len(), 2);
        assert_eq!(stats.lines_skipped, 0);
    }

    #[test]
    fn test_truncate_preview_multibyte() {
        let s = "é".repeat(100);
        let preview = truncate_preview(&s, 5);
        assert!(preview.ends_with("..."));
        assert_eq!(preview, "éé...");
    }

    #[test]
    fn test_empty_input() {
        let (values, stats) = parse_json_lines("");
        assert!(values.is_empty());
        assert!((stats.success_rate() - 100.0).abs() < f64::EPSILON);
    }
}
