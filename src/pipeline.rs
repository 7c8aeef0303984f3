use anyhow::Context;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::attendance::{self, safe_file_stem};
use crate::config::Config;
use crate::error::RunError;
use crate::report::{Assembler, Document, GroupWarning};
use crate::sar;
use crate::template::Template;
use crate::validate::{self, ValidationError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub group: String,
    pub clean_name: String,
    pub file_name: String,
    pub layout: String,
    pub student_count: usize,
    pub pages: usize,
    #[serde(skip)]
    pub document: Document,
}

#[derive(Debug, Default)]
pub struct RunOutcome {
    pub errors: Vec<ValidationError>,
    pub reports: Vec<GeneratedReport>,
    pub warnings: Vec<GroupWarning>,
}

impl RunOutcome {
    pub fn status(&self) -> String {
        if self.errors.is_empty() {
            "Processing complete.".to_string()
        } else {
            format!(
                "Processing complete with {} warning(s).",
                self.errors.len()
            )
        }
    }
}

/// `<stem>.xlsx`, then `<stem>_2.xlsx`, ... when two groups clean to the same name.
fn unique_file_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = format!("{}.xlsx", stem);
    let mut n = 2;
    while !used.insert(candidate.to_ascii_lowercase()) {
        candidate = format!("{}_{}.xlsx", stem, n);
        n += 1;
    }
    candidate
}

/// Validation, aggregation and report assembly over one export. Row-level
/// problems are returned alongside the reports; only an unreadable export or
/// one with no groups fails the run.
pub fn run(
    csv_text: &str,
    template: Result<Template, String>,
    cfg: &Config,
) -> Result<RunOutcome, RunError> {
    let errors = validate::validate_csv(csv_text, cfg.parse_mode, &cfg.group_key);
    if !errors.is_empty() {
        warn!(count = errors.len(), "SAR export has validation errors");
    }

    let rows = sar::parse_keyed(csv_text)?;
    let groups = attendance::aggregate(&rows, &cfg.group_key)?;
    info!(rows = rows.len(), groups = groups.len(), "attendance aggregated");

    let assembler = Assembler::standard(template, &cfg.layout);
    let mut used = HashSet::new();
    let mut outcome = RunOutcome {
        errors,
        ..Default::default()
    };
    for group in &groups {
        match assembler.assemble(group) {
            Ok(assembled) => {
                outcome.warnings.extend(assembled.warnings);
                let report = GeneratedReport {
                    group: group.group.clone(),
                    clean_name: group.clean_name().to_string(),
                    file_name: unique_file_name(&safe_file_stem(&group.group), &mut used),
                    layout: assembled.layout.to_string(),
                    student_count: group.students.len(),
                    pages: assembled.rendered.pages,
                    document: assembled.rendered.document,
                };
                info!(
                    group = %report.clean_name,
                    layout = %report.layout,
                    students = report.student_count,
                    pages = report.pages,
                    sheets = ?report.document.sheet_names(),
                    "report assembled"
                );
                outcome.reports.push(report);
            }
            Err(failed) => {
                warn!(group = %group.clean_name(), "no layout could render this group");
                outcome.warnings.extend(failed.warnings);
            }
        }
    }
    Ok(outcome)
}

/// Serializes every report into `out_dir`, returning the written paths in order.
pub fn write_reports(out_dir: &Path, reports: &[GeneratedReport]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.to_string_lossy()))?;
    let mut paths = Vec::with_capacity(reports.len());
    for report in reports {
        let bytes = report
            .document
            .to_xlsx_bytes()
            .with_context(|| format!("failed to build {}", report.file_name))?;
        let path = out_dir.join(&report.file_name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#""Outcome","In Time","Out Time","Student: Full Name","Program Day: Group: Class Name","Session Date","Grade""#;

    fn csv(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for r in rows {
            text.push('\n');
            text.push_str(r);
        }
        text
    }

    #[test]
    fn present_and_scheduled_rows_produce_one_report() {
        let text = csv(&[
            r#""Present","2025-01-06 08:00 AM","2025-01-06 11:00 AM","John Doe","After School - Book Lab AM","2025-01-06","3""#,
            r#""Scheduled","","","Jane Roe","After School - Book Lab AM","2025-01-07","""#,
        ]);
        let out = run(&text, Err("no template".to_string()), &Config::default()).expect("run");
        assert!(out.errors.is_empty());
        assert_eq!(out.status(), "Processing complete.");
        assert_eq!(out.reports.len(), 1);
        let report = &out.reports[0];
        assert_eq!(report.clean_name, "Book Lab AM");
        assert_eq!(report.file_name, "Book_Lab_AM.xlsx");
        assert_eq!(report.student_count, 1);
        assert_eq!(report.layout, "legacy");
        assert_eq!(report.document.value("Attendance", "A2"), "Doe, John");
        assert_eq!(report.document.value("Attendance", "C2"), "\u{2714}");
        assert_eq!(report.document.value("Attendance", "D2"), "");
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn validation_errors_do_not_block_reports() {
        let text = csv(&[r#""Present","","","John Doe","Lab PM","2025-01-06","""#]);
        let out = run(&text, Err("no template".to_string()), &Config::default()).expect("run");
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.reports.len(), 1);
        assert_eq!(out.status(), "Processing complete with 1 warning(s).");
    }

    #[test]
    fn missing_group_column_is_fatal() {
        let text = "\"Outcome\",\"Student: Full Name\"\n\"Present\",\"John Doe\"";
        let err = run(text, Err("unused".to_string()), &Config::default()).expect_err("fatal");
        assert_eq!(err.code(), "no_groups");
    }

    #[test]
    fn colliding_file_names_get_suffixes() {
        let mut used = HashSet::new();
        assert_eq!(unique_file_name("Lab_AM", &mut used), "Lab_AM.xlsx");
        assert_eq!(unique_file_name("Lab_AM", &mut used), "Lab_AM_2.xlsx");
        assert_eq!(unique_file_name("lab_am", &mut used), "lab_am_3.xlsx");
    }
}
