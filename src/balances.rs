//! Session balance reconciliation: every SAR row for a student adds one
//! session to the balance carried over from the previous balances export.

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::RunError;
use crate::sar::{self, Record};

pub const BALANCE: &str = "Balance";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceLine {
    #[serde(rename = "Student ID")]
    pub student_id: String,
    #[serde(rename = "Student: Full Name")]
    pub name: String,
    #[serde(rename = "Balance", serialize_with = "serialize_balance")]
    pub balance: f64,
}

fn serialize_balance<S: serde::Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_balance(*v))
}

/// Whole balances print without a decimal point.
pub fn format_balance(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Attended {
    name: String,
    count: u32,
}

fn require(headers: &[String], column: &str, message: &str) -> Result<(), RunError> {
    if headers.iter().any(|h| h == column) {
        Ok(())
    } else {
        Err(RunError::MissingColumn(message.to_string()))
    }
}

pub fn check_sar_headers(headers: &[String]) -> Result<(), RunError> {
    require(
        headers,
        sar::STUDENT_ID,
        "SAR file is missing the required 'Student ID' column.",
    )?;
    if !headers
        .iter()
        .any(|h| h == sar::FULL_NAME || h == sar::LAST_FIRST)
    {
        return Err(RunError::MissingColumn(
            "SAR file must include at least one of 'Student: Full Name' or 'Student: Last, First' columns."
                .to_string(),
        ));
    }
    Ok(())
}

pub fn check_balance_headers(headers: &[String]) -> Result<(), RunError> {
    require(
        headers,
        sar::STUDENT_ID,
        "Balances file is missing the required 'Student ID' column.",
    )?;
    require(
        headers,
        sar::FULL_NAME,
        "Balances file is missing the required 'Student: Full Name' column.",
    )?;
    require(
        headers,
        BALANCE,
        "Balances file is missing the required 'Balance' column.",
    )
}

/// "doe, JOHN" -> "John Doe". Words are split on single spaces.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.trim().to_lowercase();
    if normalized.contains(',') {
        let parts: Vec<&str> = normalized.split(',').map(str::trim).collect();
        let first = parts.get(1).copied().unwrap_or("");
        let last = parts.first().copied().unwrap_or("");
        normalized = format!("{} {}", first, last).trim().to_string();
    }
    normalized
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rows keyed by Student ID in first-seen order. Rows missing an id or name,
/// or whose balance is not a number, are skipped.
fn opening_balances(rows: &[Record]) -> Vec<BalanceLine> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<BalanceLine> = Vec::new();
    for row in rows {
        let id = row.get(sar::STUDENT_ID).trim();
        let name = row.get(sar::FULL_NAME).trim();
        let Ok(balance) = row.get(BALANCE).trim().parse::<f64>() else {
            continue;
        };
        if id.is_empty() || name.is_empty() || !balance.is_finite() {
            continue;
        }
        let line = BalanceLine {
            student_id: id.to_string(),
            name: name.to_string(),
            balance,
        };
        match index.get(id) {
            Some(&i) => out[i] = line,
            None => {
                index.insert(id.to_string(), out.len());
                out.push(line);
            }
        }
    }
    out
}

fn count_attendance(rows: &[Record]) -> Vec<(String, Attended)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<(String, Attended)> = Vec::new();
    for row in rows {
        let id = row.get(sar::STUDENT_ID).trim();
        if id.is_empty() {
            continue;
        }
        let name = normalize_name(sar::resolve_student_name(row));
        match index.get(id) {
            Some(&i) => {
                let seen = &mut out[i].1;
                seen.count += 1;
                if seen.name.is_empty() || seen.name.contains(',') {
                    seen.name = name;
                }
            }
            None => {
                index.insert(id.to_string(), out.len());
                out.push((id.to_string(), Attended { name, count: 1 }));
            }
        }
    }
    out
}

fn merge(opening: Vec<BalanceLine>, attended: Vec<(String, Attended)>) -> Vec<BalanceLine> {
    let mut index: HashMap<String, usize> = opening
        .iter()
        .enumerate()
        .map(|(i, b)| (b.student_id.clone(), i))
        .collect();
    let mut merged = opening;
    for (id, seen) in attended {
        match index.get(&id) {
            Some(&i) => merged[i].balance += f64::from(seen.count),
            None => {
                index.insert(id.clone(), merged.len());
                merged.push(BalanceLine {
                    student_id: id,
                    name: seen.name,
                    balance: f64::from(seen.count),
                });
            }
        }
    }
    merged
}

/// New balances from a SAR export and an optional previous balances export,
/// sorted by student name without regard to case.
pub fn reconcile(sar_text: &str, balances_text: Option<&str>) -> Result<Vec<BalanceLine>, RunError> {
    check_sar_headers(&sar::header_fields(sar_text)?)?;
    let opening = match balances_text {
        Some(text) => {
            check_balance_headers(&sar::header_fields(text)?)?;
            opening_balances(&sar::parse_keyed(text)?)
        }
        None => Vec::new(),
    };
    let sar_rows = sar::parse_keyed(sar_text)?;
    let attended = count_attendance(&sar_rows);
    info!(
        opening = opening.len(),
        students = attended.len(),
        rows = sar_rows.len(),
        "reconciling balances"
    );

    let mut lines = merge(opening, attended);
    lines.sort_by_cached_key(|b| b.name.to_lowercase());
    Ok(lines)
}

pub fn file_name(date: NaiveDate) -> String {
    format!("Balances-{}.csv", date.format("%Y-%m-%d"))
}

pub fn to_csv(lines: &[BalanceLine]) -> anyhow::Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().from_writer(Vec::new());
    if lines.is_empty() {
        wtr.write_record([sar::STUDENT_ID, sar::FULL_NAME, BALANCE])?;
    }
    for line in lines {
        wtr.serialize(line)?;
    }
    wtr.into_inner().context("failed to flush balances CSV")
}

pub fn write_csv(out_dir: &Path, lines: &[BalanceLine], date: NaiveDate) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.to_string_lossy()))?;
    let path = out_dir.join(file_name(date));
    std::fs::write(&path, to_csv(lines)?)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(path)
}
