use chrono::{Datelike, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::RunError;
use crate::sar::{self, Record};
use crate::timefmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SchoolDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl SchoolDay {
    pub const ALL: [SchoolDay; 5] = [
        SchoolDay::Monday,
        SchoolDay::Tuesday,
        SchoolDay::Wednesday,
        SchoolDay::Thursday,
        SchoolDay::Friday,
    ];

    pub fn from_weekday(w: Weekday) -> Option<Self> {
        match w {
            Weekday::Mon => Some(SchoolDay::Monday),
            Weekday::Tue => Some(SchoolDay::Tuesday),
            Weekday::Wed => Some(SchoolDay::Wednesday),
            Weekday::Thu => Some(SchoolDay::Thursday),
            Weekday::Fri => Some(SchoolDay::Friday),
            Weekday::Sat | Weekday::Sun => None,
        }
    }

    /// Position of the day's block in the template, Monday = 0.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SchoolDay::Monday => "Monday",
            SchoolDay::Tuesday => "Tuesday",
            SchoolDay::Wednesday => "Wednesday",
            SchoolDay::Thursday => "Thursday",
            SchoolDay::Friday => "Friday",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceEntry {
    pub grade: String,
    pub days: BTreeSet<SchoolDay>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAttendance {
    /// Raw class name as exported.
    pub group: String,
    /// Keyed by "Last, First"; iteration order is the report's sort order.
    pub students: BTreeMap<String, AttendanceEntry>,
}

impl GroupAttendance {
    pub fn clean_name(&self) -> &str {
        clean_group_name(&self.group)
    }

    pub fn sorted_students(&self) -> Vec<String> {
        self.students.keys().cloned().collect()
    }
}

/// Drops a "Program - " style prefix: the part after the last " - ", trimmed.
pub fn clean_group_name(group: &str) -> &str {
    match group.rfind(" - ") {
        Some(i) => group[i + 3..].trim(),
        None => group,
    }
}

pub fn safe_file_stem(group: &str) -> String {
    clean_group_name(group)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// "John Doe" -> "Doe, John". Names that already contain a comma, or that are a
/// single token, are left alone.
pub fn reverse_name(name: &str) -> String {
    if name.contains(',') {
        return name.to_string();
    }
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{}, {}", last, rest.join(" ")),
        _ => name.to_string(),
    }
}

pub fn school_day(session_date: &str) -> Option<SchoolDay> {
    timefmt::parse_calendar_date(session_date).and_then(|d| SchoolDay::from_weekday(d.weekday()))
}

/// Distinct non-empty group values in order of first appearance.
pub fn distinct_groups(rows: &[Record], group_key: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| r.get(group_key))
        .filter(|g| !g.is_empty())
        .filter(|g| seen.insert(*g))
        .map(str::to_string)
        .collect()
}

fn fold_present<'a, I>(rows: I) -> BTreeMap<String, AttendanceEntry>
where
    I: IntoIterator<Item = &'a Record>,
{
    rows.into_iter().fold(BTreeMap::new(), |mut acc, row| {
        let name = reverse_name(sar::resolve_student_name(row));
        let grade = row.get(sar::GRADE).trim();
        let entry: &mut AttendanceEntry = acc.entry(name).or_default();
        if entry.grade.is_empty() && !grade.is_empty() {
            entry.grade = grade.to_string();
        }
        if let Some(day) = school_day(row.get(sar::SESSION_DATE)) {
            entry.days.insert(day);
        }
        acc
    })
}

pub fn aggregate(rows: &[Record], group_key: &str) -> Result<Vec<GroupAttendance>, RunError> {
    let groups = distinct_groups(rows, group_key);
    if groups.is_empty() {
        return Err(RunError::NoGroups(group_key.to_string()));
    }
    Ok(groups
        .into_iter()
        .map(|group| {
            let students = fold_present(
                rows.iter()
                    .filter(|r| r.get(sar::OUTCOME) == "Present" && r.get(group_key) == group),
            );
            GroupAttendance { group, students }
        })
        .collect())
}
