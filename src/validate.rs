//! Row-level business rules for SAR exports.
//!
//! Each record yields at most one error: the rules are guards checked in a
//! fixed order and the first one that trips is reported.

use serde::Serialize;
use std::fmt;

use crate::attendance::clean_group_name;
use crate::sar::{self, ParseMode, Record};
use crate::timefmt;

const ONE_MINUTE_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MissingTime,
    InvalidTimeOrder,
    UnexpectedTime,
    TimeGroupMismatch,
    SystemError,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::MissingTime => "Missing Time",
            ErrorKind::InvalidTimeOrder => "Invalid Time Order",
            ErrorKind::UnexpectedTime => "Unexpected Time",
            ErrorKind::TimeGroupMismatch => "Time/Group Mismatch",
            ErrorKind::SystemError => "System Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub line_number: usize,
    pub student_name: String,
    pub group: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_date: Option<String>,
}

impl ValidationError {
    pub fn readable_message(&self) -> String {
        let mut out = format!(
            "Error on line {}: For student \"{}\" in group \"{}\", a \"{}\" error occurred",
            self.line_number,
            self.student_name,
            clean_group_name(&self.group),
            self.kind
        );
        if let Some(date) = self.session_date.as_deref() {
            out.push_str(&format!(" (session {})", date));
        }
        out
    }
}

/// Why a record was rejected before it is turned into a `ValidationError`.
enum Fault {
    Rule(ErrorKind, String),
    Internal(String),
}

fn is_outcome_without_times(outcome: &str) -> bool {
    outcome == "Scheduled" || outcome == "Absent"
}

/// `Some(true)` for an " AM" group, `Some(false)` for " PM", `None` when exempt.
fn group_meridiem(group: &str) -> Option<bool> {
    if group.ends_with(" AM") {
        Some(true)
    } else if group.ends_with(" PM") {
        Some(false)
    } else {
        None
    }
}

fn check_record(rec: &Record, group_key: &str) -> Result<(), Fault> {
    let outcome = rec.get(sar::OUTCOME);
    let in_raw = rec.get(sar::IN_TIME).trim();
    let out_raw = rec.get(sar::OUT_TIME).trim();
    let group = rec.get(group_key);

    if outcome == "Present" && (in_raw.is_empty() || out_raw.is_empty()) {
        return Err(Fault::Rule(
            ErrorKind::MissingTime,
            "In time or Out time is missing for a \"Present\" outcome.".to_string(),
        ));
    }

    let both = !in_raw.is_empty() && !out_raw.is_empty();
    let in_time = timefmt::normalize_time(in_raw);
    let out_time = timefmt::normalize_time(out_raw);

    // Scheduled/Absent rows with times are reported as unexpected times even when
    // the pair is also out of order.
    if both && !is_outcome_without_times(outcome) {
        let start = timefmt::parse_datetime(&in_time)
            .ok_or_else(|| Fault::Internal(format!("could not parse In Time \"{}\"", in_raw)))?;
        let end = timefmt::parse_datetime(&out_time)
            .ok_or_else(|| Fault::Internal(format!("could not parse Out Time \"{}\"", out_raw)))?;
        if (end - start).num_milliseconds() < ONE_MINUTE_MS {
            return Err(Fault::Rule(
                ErrorKind::InvalidTimeOrder,
                format!(
                    "Out time ({}) must be at least one minute after In time ({}).",
                    out_raw, in_raw
                ),
            ));
        }
    }

    if is_outcome_without_times(outcome) && (!in_raw.is_empty() || !out_raw.is_empty()) {
        return Err(Fault::Rule(
            ErrorKind::UnexpectedTime,
            "Time entries should not exist for a \"Scheduled\" or \"Absent\" outcome.".to_string(),
        ));
    }

    if let Some(group_is_am) = group_meridiem(group) {
        if both {
            let in_is_am = in_time.contains("AM");
            let out_is_am = out_time.contains("AM");
            if group_is_am != in_is_am || group_is_am != out_is_am {
                return Err(Fault::Rule(
                    ErrorKind::TimeGroupMismatch,
                    "Time AM/PM and group AM/PM should match.".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// `group_key` names the column holding the group, as used for aggregation.
pub fn validate_record(rec: &Record, group_key: &str) -> Option<ValidationError> {
    let fault = check_record(rec, group_key).err()?;
    let session_date = Some(rec.get(sar::SESSION_DATE).trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let err = match fault {
        Fault::Rule(kind, message) => ValidationError {
            line_number: rec.line,
            student_name: sar::resolve_student_name(rec).to_string(),
            group: rec.get(group_key).to_string(),
            kind,
            message,
            session_date,
        },
        Fault::Internal(reason) => {
            let or_unknown = |s: &str| {
                if s.is_empty() {
                    "Unknown".to_string()
                } else {
                    s.to_string()
                }
            };
            ValidationError {
                line_number: rec.line,
                student_name: or_unknown(sar::resolve_student_name(rec)),
                group: or_unknown(rec.get(group_key)),
                kind: ErrorKind::SystemError,
                message: format!("An unexpected error occurred: {}", reason),
                session_date,
            }
        }
    };
    Some(err)
}

pub fn validate_records<I>(records: I, group_key: &str) -> Vec<ValidationError>
where
    I: IntoIterator<Item = Record>,
{
    records
        .into_iter()
        .filter_map(|rec| validate_record(&rec, group_key))
        .collect()
}

pub fn validate_csv(text: &str, mode: ParseMode, group_key: &str) -> Vec<ValidationError> {
    validate_records(sar::records(text, mode), group_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#""Outcome","In Time","Out Time","Student: Full Name","Program Day: Group: Class Name","Session Date""#;

    fn run(rows: &[&str]) -> Vec<ValidationError> {
        let mut text = HEADER.to_string();
        for r in rows {
            text.push('\n');
            text.push_str(r);
        }
        validate_csv(&text, ParseMode::Strict, sar::GROUP_NAME)
    }

    #[test]
    fn missing_time_points_at_physical_line() {
        let errs = run(&[
            r#""Absent","","","A B","G","""#,
            r#""Present","","","John Doe","Group A","2025-01-06""#,
        ]);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ErrorKind::MissingTime);
        assert_eq!(errs[0].line_number, 3);
        assert_eq!(errs[0].session_date.as_deref(), Some("2025-01-06"));
    }

    #[test]
    fn one_minute_is_the_boundary() {
        let ok = run(&[r#""Present","2025-01-01 09:00:00 AM","2025-01-01 09:01:00 AM","John Doe","Group A","""#]);
        assert!(ok.is_empty());
        let short = run(&[r#""Present","2025-01-01 09:00:00 AM","2025-01-01 09:00:59 AM","John Doe","Group A","""#]);
        assert_eq!(short[0].kind, ErrorKind::InvalidTimeOrder);
        let reversed = run(&[r#""Present","2025-01-01 05:00 PM","2025-01-01 09:00 AM","John Doe","Group A","""#]);
        assert_eq!(reversed[0].kind, ErrorKind::InvalidTimeOrder);
    }

    #[test]
    fn unexpected_time_wins_for_scheduled_rows() {
        let errs = run(&[
            r#""Scheduled","2025-01-01 05:00 PM","2025-01-01 09:00 AM","John Doe","Group A","""#,
            r#""Absent","","2025-01-01 09:00 AM","Jane Doe","Group A","""#,
        ]);
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| e.kind == ErrorKind::UnexpectedTime));
    }

    #[test]
    fn group_suffix_drives_meridiem_check() {
        let errs = run(&[
            r#""Present","2025-01-01 01:00 PM","2025-01-01 05:00 PM","John Doe","Lab AM","""#,
            r#""Present","2025-01-01 01:00 PM","2025-01-01 05:00 PM","John Doe","Lab","""#,
            r#""Present","2025-01-01 14:00","2025-01-01 16:00","Jane Doe","Lab PM","""#,
        ]);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ErrorKind::TimeGroupMismatch);
        assert_eq!(errs[0].line_number, 2);
    }

    #[test]
    fn unparseable_time_becomes_system_error() {
        let errs = run(&[r#""Present","soon","later","","","""#]);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ErrorKind::SystemError);
        assert_eq!(errs[0].student_name, "Unknown");
        assert_eq!(errs[0].group, "Unknown");
    }

    #[test]
    fn readable_message_uses_clean_group() {
        let errs = run(&[r#""Present","","","John Doe","After School - Think Cafe PM","""#]);
        assert_eq!(
            errs[0].readable_message(),
            "Error on line 2: For student \"John Doe\" in group \"Think Cafe PM\", a \"Missing Time\" error occurred"
        );
    }

    #[test]
    fn custom_group_column_drives_meridiem_check() {
        let text = "\"Outcome\",\"In Time\",\"Out Time\",\"Student: Full Name\",\"Program Day: Group: Class Name\",\"Class\"\n\
                    \"Present\",\"2025-01-01 01:00 PM\",\"2025-01-01 05:00 PM\",\"John Doe\",\"Lab PM\",\"Art AM\"";
        let default_key = validate_csv(text, ParseMode::Strict, sar::GROUP_NAME);
        assert!(default_key.is_empty());
        let errs = validate_csv(text, ParseMode::Strict, "Class");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ErrorKind::TimeGroupMismatch);
        assert_eq!(errs[0].group, "Art AM");
    }

    #[test]
    fn fractional_seconds_are_accepted() {
        let errs = run(&[
            r#""Present","2025-01-06 08:00:00.000","2025-01-06 11:00:00.000","John Doe","Lab AM","2025-01-06""#,
            r#""Present","2025-01-06 08:00:00.000","2025-01-06 08:00:30.500","Jane Roe","Lab AM","2025-01-06""#,
        ]);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ErrorKind::InvalidTimeOrder);
        assert_eq!(errs[0].line_number, 3);
    }
}
