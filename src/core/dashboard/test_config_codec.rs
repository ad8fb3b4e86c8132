//! Test configuration line format
//!
//! Operators edit the engine's test list as plain text, one test per line:
//!
//! ```text
//! 192.168.1.1 ; Core router ; PING
//! # www.example.com ; Public site ; HTTPS
//! ```
//!
//! A leading `#` keeps the test in the setup but marks it inactive. Decoding
//! is lenient: fields may be separated by `;`, ` :` or `: `, and any line that
//! does not split into exactly three fields, or has no host, is dropped
//! without complaint.
//! Encoding is canonical and always writes ` ; `.

use crate::core::dashboard::types::TestRecord;
use regex::Regex;
use std::sync::OnceLock;

/// Field separators accepted on input, tried in this order
const FIELD_SEPARATORS: &str = r" :|;|: ";

const INACTIVE_MARKER: char = '#';

/// Result of decoding with diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub records: Vec<TestRecord>,
    /// Non-blank lines that did not split into three fields
    pub dropped_lines: usize,
}

fn field_separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(FIELD_SEPARATORS).expect("separator pattern is valid"))
}

/// Parse operator text into test records, silently dropping malformed lines
pub fn decode(raw_text: &str) -> Vec<TestRecord> {
    decode_with_stats(raw_text).records
}

/// Parse operator text and count the lines that were dropped
pub fn decode_with_stats(raw_text: &str) -> DecodeOutcome {
    let mut outcome = DecodeOutcome::default();

    for line in raw_text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match decode_line(line) {
            Some(record) => outcome.records.push(record),
            None => outcome.dropped_lines += 1,
        }
    }

    outcome
}

fn decode_line(line: &str) -> Option<TestRecord> {
    let (body, active) = match line.strip_prefix(INACTIVE_MARKER) {
        Some(rest) => (rest, false),
        None => (line, true),
    };

    let parts: Vec<&str> = field_separators().split(body).map(str::trim).collect();
    if parts.len() != 3 || parts[0].is_empty() {
        return None;
    }

    Some(TestRecord {
        host: parts[0].to_string(),
        description: parts[1].to_string(),
        test_kind: parts[2].to_uppercase(),
        active,
    })
}

/// Render test records in the canonical line format
pub fn encode(records: &[TestRecord]) -> String {
    records
        .iter()
        .map(encode_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn encode_line(record: &TestRecord) -> String {
    let prefix = if record.active { "" } else { "# " };
    format!(
        "{}{} ; {} ; {}",
        prefix, record.host, record.description, record.test_kind
    )
}
