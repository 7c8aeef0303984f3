//! SAR (student attendance record) CSV access.
//!
//! Two readers live here. `records` is the line-numbered reader the validator
//! uses: it keeps the physical line of every row so errors can point back into
//! the export. `parse_keyed` hands the text to the `csv` tokenizer and is what
//! aggregation and balances run on.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::RunError;

pub const OUTCOME: &str = "Outcome";
pub const IN_TIME: &str = "In Time";
pub const OUT_TIME: &str = "Out Time";
pub const FULL_NAME: &str = "Student: Full Name";
pub const LAST_FIRST: &str = "Student: Last, First";
pub const GROUP_NAME: &str = "Program Day: Group: Class Name";
pub const SESSION_DATE: &str = "Session Date";
pub const GRADE: &str = "Grade";
pub const STUDENT_ID: &str = "Student ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Every `"..."` substring is a field; unquoted text is ignored.
    Simple,
    /// Quote-aware comma split; `""` inside quotes is a literal quote.
    Strict,
}

impl ParseMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(ParseMode::Simple),
            "strict" => Some(ParseMode::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based physical line in the source text (the header is line 1).
    pub line: usize,
    fields: HashMap<String, String>,
}

impl Record {
    pub fn new(line: usize, fields: HashMap<String, String>) -> Self {
        Self { line, fields }
    }

    /// Field value, or "" when the column is absent.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

}

/// `Student: Full Name`, falling back to `Student: Last, First`.
pub fn resolve_student_name(rec: &Record) -> &str {
    let full = rec.get(FULL_NAME);
    if !full.is_empty() {
        return full;
    }
    rec.get(LAST_FIRST)
}

pub fn records(text: &str, mode: ParseMode) -> Records<'_> {
    Records {
        lines: text.trim_start_matches('\u{feff}').split('\n').enumerate(),
        headers: None,
        mode,
    }
}

pub struct Records<'a> {
    lines: std::iter::Enumerate<std::str::Split<'a, char>>,
    headers: Option<Vec<String>>,
    mode: ParseMode,
}

impl<'a> Iterator for Records<'a> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            let (idx, raw) = self.lines.next()?;
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.trim().is_empty() {
                continue;
            }
            let values = tokenize(line, self.mode);
            let Some(headers) = self.headers.as_ref() else {
                self.headers = Some(values);
                continue;
            };
            if headers.is_empty() || values.len() != headers.len() {
                continue;
            }
            let fields = headers.iter().cloned().zip(values).collect();
            return Some(Record::new(idx + 1, fields));
        }
    }
}

pub fn tokenize(line: &str, mode: ParseMode) -> Vec<String> {
    match mode {
        ParseMode::Simple => tokenize_simple(line),
        ParseMode::Strict => tokenize_strict(line),
    }
}

fn quoted_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("static regex"))
}

fn tokenize_simple(line: &str) -> Vec<String> {
    quoted_field_re()
        .captures_iter(line)
        .map(|c| c[1].to_string())
        .collect()
}

fn tokenize_strict(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    out.push(buf);
    out
}

/// Column names from the first record, as the `csv` tokenizer sees them.
pub fn header_fields(text: &str) -> Result<Vec<String>, RunError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| RunError::Parse(format!("Error on row 1: {}", e)))?;
    Ok(headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect())
}

/// Header-mode parse through the `csv` tokenizer. Any tokenizer complaint is fatal
/// for the run; all of them are reported together.
pub fn parse_keyed(text: &str) -> Result<Vec<Record>, RunError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| RunError::Parse(format!("Error on row 1: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    let mut problems: Vec<String> = Vec::new();
    for result in rdr.records() {
        match result {
            Ok(rec) => {
                if rec.iter().all(|v| v.trim().is_empty()) {
                    continue;
                }
                let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
                let fields = headers
                    .iter()
                    .cloned()
                    .zip(rec.iter().map(|v| v.to_string()))
                    .collect();
                rows.push(Record::new(line, fields));
            }
            Err(e) => {
                let row = e.position().map(|p| p.line()).unwrap_or(0);
                problems.push(format!("Error on row {}: {}", row, e));
                if !matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. }) {
                    break;
                }
            }
        }
    }

    if !problems.is_empty() {
        return Err(RunError::Parse(problems.join("\n")));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#""Outcome","In Time","Out Time","Student: Full Name","Program Day: Group: Class Name""#;

    #[test]
    fn line_numbers_are_physical_and_mismatches_dropped() {
        let text = format!(
            "{}\n\"Present\",\"a\",\"b\",\"John Doe\",\"G\"\n\n\"short\",\"row\"\n\"Absent\",\"\",\"\",\"Jane Roe\",\"G\"\n",
            HEADER
        );
        let recs: Vec<Record> = records(&text, ParseMode::Simple).collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].line, 2);
        assert_eq!(recs[1].line, 5);
        assert_eq!(recs[1].get(FULL_NAME), "Jane Roe");
    }

    #[test]
    fn strict_mode_keeps_commas_inside_quotes() {
        let fields = tokenize(r#""Present","1/6/2025, 9:00 AM",plain,"say ""hi""""#, ParseMode::Strict);
        assert_eq!(
            fields,
            vec!["Present", "1/6/2025, 9:00 AM", "plain", r#"say "hi""#]
        );
    }

    #[test]
    fn simple_mode_ignores_unquoted_text() {
        let fields = tokenize(r#""a",b,"c""#, ParseMode::Simple);
        assert_eq!(fields, vec!["a", "c"]);
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let text = "\"Outcome\",\"Grade\"\r\n\"Present\",\"3\"\r\n";
        let recs: Vec<Record> = records(text, ParseMode::Strict).collect();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].get(GRADE), "3");
    }

    #[test]
    fn student_name_falls_back_to_last_first() {
        let mut fields = HashMap::new();
        fields.insert(FULL_NAME.to_string(), String::new());
        fields.insert(LAST_FIRST.to_string(), "Doe, John".to_string());
        let rec = Record::new(2, fields);
        assert_eq!(resolve_student_name(&rec), "Doe, John");
    }

    #[test]
    fn keyed_parse_reports_ragged_rows() {
        let text = "Outcome,Grade\nPresent,3\nAbsent\n";
        let err = parse_keyed(text).expect_err("ragged row");
        assert!(err.to_string().contains("Error on row 3"));
    }

    #[test]
    fn keyed_parse_reads_quoted_commas() {
        let text = "\"Outcome\",\"Student: Last, First\"\n\"Present\",\"Doe, John\"\n";
        let rows = parse_keyed(text).expect("parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
        assert_eq!(resolve_student_name(&rows[0]), "Doe, John");
    }
}
