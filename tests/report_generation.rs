#![allow(dead_code)]

#[path = "../src/attendance.rs"]
mod attendance;
#[path = "../src/config.rs"]
mod config;
#[path = "../src/error.rs"]
mod error;
#[path = "../src/pagination.rs"]
mod pagination;
#[path = "../src/pipeline.rs"]
mod pipeline;
#[path = "../src/report.rs"]
mod report;
#[path = "../src/sar.rs"]
mod sar;
#[path = "../src/template.rs"]
mod template;
#[path = "../src/timefmt.rs"]
mod timefmt;
#[path = "../src/validate.rs"]
mod validate;
#[path = "../src/workbook.rs"]
mod workbook;

use rust_xlsxwriter::{Format, FormatBorder};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use template::Template;
use umya_spreadsheet::{reader, Border, Spreadsheet};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn fixture(name: &str) -> String {
    let p = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("sar")
        .join(name);
    std::fs::read_to_string(&p).expect("read fixture")
}

/// Four pre-formatted pages with sample rows that must never leak into output.
fn write_template(dir: &Path) -> PathBuf {
    let mut book = rust_xlsxwriter::Workbook::new();
    let caption = Format::new().set_bold().set_border(FormatBorder::Thin);
    for i in 1..=4 {
        let ws = book.add_worksheet();
        ws.set_name(format!("Page {}", i)).expect("name");
        ws.set_column_width(0, 42).expect("width");
        ws.set_row_height(9, 30).expect("height");
        ws.write_string(0, 0, "Student Roster Sheet").expect("title");
        ws.merge_range(2, 1, 2, 6, "GROUP", &Format::new()).expect("merge");
        ws.write_string(2, 8, "Teacher name").expect("teacher");
        ws.write_string(2, 13, "Room").expect("room");
        ws.write_string_with_format(8, 0, "Name", &caption).expect("caption");
        ws.write_string(8, 2, "Mon").expect("mon");
        ws.write_string(9, 0, "Sample, Student").expect("sample");
        ws.write_string(9, 5, "\u{2714}").expect("sample mark");
        ws.write_string(43, 0, "Total").expect("total");
        ws.write_formula(43, 3, "=COUNTA(D10:D43)").expect("formula");
    }
    let path = dir.join("srs_blank_template.xlsx");
    book.save(&path).expect("write template");
    path
}

fn load(path: &Path) -> Spreadsheet {
    reader::xlsx::read(path).expect("open report")
}

fn cell(book: &Spreadsheet, sheet: &str, a1: &str) -> String {
    book.get_sheet_by_name(sheet)
        .map(|ws| ws.get_value(a1))
        .unwrap_or_default()
}

#[test]
fn template_reports_are_written_per_group() {
    let dir = temp_dir("srsd-report-template");
    let template_path = write_template(&dir);
    let template = Template::load(&template_path).map_err(|e| e.to_string());

    let cfg = config::Config::default();
    let outcome = pipeline::run(&fixture("week_clean.csv"), template, &cfg).expect("run");
    assert!(outcome.errors.is_empty());
    assert!(outcome.warnings.is_empty());
    let names: Vec<&str> = outcome.reports.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, vec!["Book_Lab_AM.xlsx", "Think_Cafe_PM.xlsx"]);
    assert!(outcome.reports.iter().all(|r| r.layout == "template" && r.pages == 1));

    let out_dir = dir.join("out");
    let paths = pipeline::write_reports(&out_dir, &outcome.reports).expect("write");
    let book_lab = load(&paths[0]);
    assert_eq!(cell(&book_lab, "Page 1", "B3"), "Book Lab AM");
    assert_eq!(cell(&book_lab, "Page 1", "I3"), "");
    assert_eq!(cell(&book_lab, "Page 1", "A1"), "Student Roster Sheet");
    assert_eq!(cell(&book_lab, "Page 1", "C9"), "Mon");
    assert_eq!(cell(&book_lab, "Page 1", "A10"), "Doe, John");
    assert_eq!(cell(&book_lab, "Page 1", "B10"), "3");
    // Monday C-E and Wednesday I-K.
    for col in ["C", "D", "E", "I", "J", "K"] {
        assert_eq!(cell(&book_lab, "Page 1", &format!("{}10", col)), "\u{2714}", "col {}", col);
    }
    assert_eq!(cell(&book_lab, "Page 1", "F10"), "");
    assert_eq!(cell(&book_lab, "Page 2", "A10"), "");

    let cafe = load(&paths[1]);
    assert_eq!(cell(&cafe, "Page 1", "A10"), "Lopez, Ana");
    assert_eq!(cell(&cafe, "Page 1", "A11"), "Roe, Jane");
    assert_eq!(cell(&cafe, "Page 1", "Q11"), "\u{2714}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn template_formatting_survives_into_reports() {
    let dir = temp_dir("srsd-report-formatting");
    let template = Template::load(&write_template(&dir)).map_err(|e| e.to_string());
    let outcome =
        pipeline::run(&fixture("week_clean.csv"), template, &config::Config::default())
            .expect("run");
    let paths = pipeline::write_reports(&dir.join("out"), &outcome.reports).expect("write");
    let book = load(&paths[0]);

    for page in ["Page 1", "Page 4"] {
        let ws = book.get_sheet_by_name(page).expect("page");
        let width = ws.get_column_dimension("A").map(|c| *c.get_width());
        assert!(width.map_or(false, |w| w >= 42.0), "{} width {:?}", page, width);
        assert_eq!(ws.get_row_dimension(&10).map(|r| *r.get_height()), Some(30.0));

        let caption = ws.get_style("A9");
        assert_eq!(caption.get_font().map(|f| *f.get_bold()), Some(true));
        assert_eq!(
            caption.get_borders().map(|b| b.get_top().get_border_style().to_string()),
            Some(Border::BORDER_THIN.to_string())
        );

        let total = ws.get_cell("D44").expect("totals formula");
        assert!(total.is_formula());
        assert!(total.get_formula().contains("COUNTA(D10:D43)"));
        let merges: Vec<String> = ws.get_merge_cells().iter().map(|r| r.get_range()).collect();
        assert_eq!(merges, vec!["B3:G3".to_string()]);
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_pages_are_copied_with_their_formatting() {
    let dir = temp_dir("srsd-report-duplicate");
    let mut book = rust_xlsxwriter::Workbook::new();
    let ws = book.add_worksheet();
    ws.set_name("Page 1").expect("name");
    ws.set_column_width(0, 42).expect("width");
    ws.write_formula(43, 3, "=COUNTA(D10:D43)").expect("formula");
    let path = dir.join("one_page.xlsx");
    book.save(&path).expect("write template");

    let template = Template::load(&path).map_err(|e| e.to_string());
    let outcome =
        pipeline::run(&roster_csv("Club - Art PM", 40), template, &config::Config::default())
            .expect("run");
    assert_eq!(outcome.reports[0].layout, "template");
    assert_eq!(outcome.reports[0].document.sheet_names(), vec!["Page 1", "Page 2"]);

    let paths = pipeline::write_reports(&dir.join("out"), &outcome.reports).expect("write");
    let out = load(&paths[0]);
    let page2 = out.get_sheet_by_name("Page 2").expect("page 2");
    assert_eq!(page2.get_value("A10"), "Tester, Kid034");
    assert!(page2
        .get_column_dimension("A")
        .map_or(false, |c| *c.get_width() >= 42.0));
    assert!(page2.get_cell("D44").map_or(false, |c| c.is_formula()));
    let _ = std::fs::remove_dir_all(&dir);
}

fn roster_csv(group: &str, students: usize) -> String {
    let mut text = String::from(
        "\"Outcome\",\"In Time\",\"Out Time\",\"Student: Full Name\",\"Program Day: Group: Class Name\",\"Session Date\",\"Grade\"",
    );
    for i in 0..students {
        text.push_str(&format!(
            "\n\"Present\",\"2025-01-07 2:00 PM\",\"2025-01-07 5:00 PM\",\"Kid{:03} Tester\",\"{}\",\"2025-01-07\",\"2\"",
            i, group
        ));
    }
    text
}

#[test]
fn large_groups_spill_onto_later_pages() {
    let dir = temp_dir("srsd-report-pages");
    let template = Template::load(&write_template(&dir)).map_err(|e| e.to_string());
    let outcome =
        pipeline::run(&roster_csv("Club - Art PM", 70), template, &config::Config::default())
            .expect("run");
    let report = &outcome.reports[0];
    assert_eq!(report.pages, 3);
    let doc = &report.document;
    assert_eq!(doc.value("Page 3", "A10"), "Tester, Kid068");
    assert_eq!(doc.value("Page 3", "A11"), "Tester, Kid069");
    assert_eq!(doc.value("Page 3", "A12"), "");
    assert_eq!(doc.value("Page 3", "F10"), "\u{2714}");
    assert_eq!(doc.value("Page 4", "A10"), "");
    assert_eq!(doc.value("Page 4", "B3"), "");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn over_capacity_group_uses_legacy_layout() {
    let dir = temp_dir("srsd-report-capacity");
    let template = Template::load(&write_template(&dir)).map_err(|e| e.to_string());
    let mut csv = roster_csv("Club - Art PM", 137);
    csv.push_str("\n\"Present\",\"2025-01-07 2:00 PM\",\"2025-01-07 5:00 PM\",\"Solo Kid\",\"Club - Chess PM\",\"2025-01-07\",\"4\"");
    let outcome = pipeline::run(&csv, template, &config::Config::default()).expect("run");

    assert_eq!(outcome.reports.len(), 2);
    assert_eq!(outcome.reports[0].layout, "legacy");
    assert_eq!(outcome.reports[1].layout, "template");
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].group, "Club - Art PM");
    assert_eq!(
        outcome.warnings[0].message,
        "Group has 137 students, exceeding maximum capacity of 136 students (4 sheets)"
    );

    let paths = pipeline::write_reports(&dir.join("out"), &outcome.reports).expect("write");
    let legacy = load(&paths[0]);
    assert_eq!(cell(&legacy, "Attendance", "A1"), "Student Name");
    assert_eq!(cell(&legacy, "Attendance", "A2"), "Tester, Kid000");
    assert_eq!(cell(&legacy, "Attendance", "D2"), "\u{2714}");
    assert_eq!(cell(&legacy, "Attendance", "A138"), "Tester, Kid136");
    let _ = std::fs::remove_dir_all(&dir);
}
