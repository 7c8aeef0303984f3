//! Report assembly: turns one group's attendance into a spreadsheet document.
//!
//! Layouts are strategies tried in order by the `Assembler`; the first one
//! that renders wins and every failure before it becomes a warning.

use serde::Serialize;
use tracing::{debug, warn};

use crate::attendance::{GroupAttendance, SchoolDay};
use crate::config::SheetLayout;
use crate::error::ReportError;
use crate::pagination::plan_pages;
use crate::template::Template;
use crate::workbook::{column_index, CellRange, CellRef, CellStyle, Workbook};

pub const LEGACY_SHEET: &str = "Attendance";
const HEADER_FILL: u32 = 0x2E4756;
const WHITE: u32 = 0xFFFFFF;
const LIGHT_GREY: u32 = 0xF0F0F0;

/// A rendered report: the edited template, or a sheet built from scratch.
#[derive(Debug, Clone)]
pub enum Document {
    Template(Template),
    Built(Workbook),
}

impl Document {
    pub fn sheet_names(&self) -> Vec<&str> {
        match self {
            Document::Template(t) => t.sheet_names(),
            Document::Built(b) => b.sheet_names(),
        }
    }

    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>, ReportError> {
        match self {
            Document::Template(t) => t.to_xlsx_bytes(),
            Document::Built(b) => b.to_xlsx_bytes(),
        }
    }

    #[cfg(test)]
    pub fn value(&self, sheet: &str, a1: &str) -> String {
        let Ok(cell) = CellRef::parse(a1) else {
            return String::new();
        };
        match self {
            Document::Template(t) => t.value(sheet, cell),
            Document::Built(b) => b
                .sheet(sheet)
                .map(|s| s.value(cell).to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub document: Document,
    /// Template pages filled; the legacy layout always reports 1.
    pub pages: usize,
}

pub trait ReportLayout {
    fn name(&self) -> &'static str;
    fn render(&self, group: &GroupAttendance) -> Result<Rendered, ReportError>;
}

struct Columns {
    name: u16,
    grade: u16,
    days: Vec<Vec<u16>>,
}

impl Columns {
    fn resolve(layout: &SheetLayout) -> Result<Self, ReportError> {
        let col = |letters: &str| {
            column_index(letters).ok_or_else(|| ReportError::CellRef(letters.to_string()))
        };
        let days = layout
            .weekday_blocks
            .iter()
            .map(|block| block.iter().map(|c| col(c)).collect::<Result<Vec<_>, _>>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Columns {
            name: col(&layout.name_column)?,
            grade: col(&layout.grade_column)?,
            days,
        })
    }

    fn all(&self) -> impl Iterator<Item = u16> + '_ {
        [self.name, self.grade]
            .into_iter()
            .chain(self.days.iter().flatten().copied())
    }

    fn day(&self, day: SchoolDay) -> &[u16] {
        self.days.get(day.index()).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Fills the pre-formatted multi-page template.
pub struct TemplateLayout {
    template: Result<Template, String>,
    layout: SheetLayout,
}

impl TemplateLayout {
    /// `template` carries the load failure, if any, so it surfaces per group.
    pub fn new(template: Result<Template, String>, layout: SheetLayout) -> Self {
        Self { template, layout }
    }

    fn clear_page(&self, book: &mut Template, sheet: &str, cols: &Columns) -> Result<(), ReportError> {
        let first = self.layout.start_row - 1;
        let last = first + self.layout.rows_per_page as u32 - 1;
        for col in cols.all() {
            book.clear_range(
                sheet,
                CellRange::new(CellRef { row: first, col }, CellRef { row: last, col }),
            )?;
        }
        for cell in &self.layout.placeholder_cells {
            book.set(sheet, CellRef::parse(cell)?, "")?;
        }
        Ok(())
    }

    fn fill_page(
        &self,
        book: &mut Template,
        sheet: &str,
        cols: &Columns,
        group: &GroupAttendance,
        students: &[String],
    ) -> Result<(), ReportError> {
        book.set(sheet, CellRef::parse(&self.layout.header_cell)?, group.clean_name())?;
        if self.layout.notes_section {
            let notes = CellRange::parse(&self.layout.notes_range)?;
            book.merge(sheet, notes)?;
            book.set(sheet, notes.first, "Notes:")?;
            book.style_notes(sheet, notes.first)?;
        }
        let first = self.layout.start_row - 1;
        for (offset, name) in students.iter().enumerate() {
            let row = first + offset as u32;
            let Some(entry) = group.students.get(name) else {
                continue;
            };
            book.set(sheet, CellRef { row, col: cols.name }, name)?;
            book.set(sheet, CellRef { row, col: cols.grade }, &entry.grade)?;
            for day in &entry.days {
                for col in cols.day(*day) {
                    book.set(sheet, CellRef { row, col: *col }, &self.layout.mark)?;
                }
            }
        }
        Ok(())
    }
}

impl ReportLayout for TemplateLayout {
    fn name(&self) -> &'static str {
        "template"
    }

    fn render(&self, group: &GroupAttendance) -> Result<Rendered, ReportError> {
        let template = self
            .template
            .as_ref()
            .map_err(|e| ReportError::Template(e.clone()))?;
        let students = group.sorted_students();
        let plan = plan_pages(
            &students,
            self.layout.rows_per_page,
            self.layout.max_pages(),
        )?;
        let cols = Columns::resolve(&self.layout)?;

        let primary = &self.layout.sheet_names[0];
        debug!(sheets = ?template.sheet_names(), pages = plan.total_pages, "filling template");
        if !template.has_sheet(primary) {
            return Err(ReportError::MissingSheet(primary.clone()));
        }
        // An empty group still gets a first page carrying its name.
        let pages_used = plan.total_pages.max(1);

        let mut book = template.clone();
        for name in self.layout.sheet_names.iter().take(pages_used) {
            if !book.has_sheet(name) {
                debug!(sheet = %name, "template sheet missing, duplicating {}", primary);
                book.duplicate_sheet(primary, name)?;
            }
        }

        for (index, name) in self.layout.sheet_names.iter().enumerate() {
            if !book.has_sheet(name) {
                continue;
            }
            self.clear_page(&mut book, name, &cols)?;
            if index < pages_used {
                self.fill_page(&mut book, name, &cols, group, plan.page(index))?;
            } else {
                book.set(name, CellRef::parse(&self.layout.header_cell)?, "")?;
            }
        }

        Ok(Rendered {
            document: Document::Template(book),
            pages: pages_used,
        })
    }
}

/// Single unpaginated "Attendance" sheet built from scratch.
pub struct LegacyLayout {
    mark: String,
}

impl LegacyLayout {
    pub fn new(mark: &str) -> Self {
        Self {
            mark: mark.to_string(),
        }
    }
}

impl ReportLayout for LegacyLayout {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn render(&self, group: &GroupAttendance) -> Result<Rendered, ReportError> {
        let mut book = Workbook::new();
        let sheet = book.add_sheet(LEGACY_SHEET);
        sheet.freeze_rows(1);

        let header_style = CellStyle {
            bold: true,
            font_color: Some(WHITE),
            fill: Some(HEADER_FILL),
            center: true,
        };
        let headers = ["Student Name", "Grade"]
            .into_iter()
            .chain(SchoolDay::ALL.iter().map(|d| d.name()));
        for (col, title) in headers.enumerate() {
            let col = col as u16;
            let cell = CellRef { row: 0, col };
            sheet.set(cell, title);
            sheet.set_style(cell, header_style.clone());
            sheet.set_column_width(
                col,
                match col {
                    0 => 30.0,
                    1 => 10.0,
                    _ => 15.0,
                },
            );
        }

        for (i, (name, entry)) in group.students.iter().enumerate() {
            let row = i as u32 + 1;
            // Spreadsheet row numbers are 1-based: even rows white, odd grey.
            let fill = if (row + 1) % 2 == 0 { WHITE } else { LIGHT_GREY };
            let plain = CellStyle {
                fill: Some(fill),
                ..Default::default()
            };
            let marked = CellStyle {
                center: true,
                ..plain.clone()
            };

            sheet.set(CellRef { row, col: 0 }, name);
            sheet.set_style(CellRef { row, col: 0 }, plain.clone());
            sheet.set(CellRef { row, col: 1 }, &entry.grade);
            sheet.set_style(CellRef { row, col: 1 }, plain.clone());
            for day in SchoolDay::ALL {
                let cell = CellRef {
                    row,
                    col: 2 + day.index() as u16,
                };
                if entry.days.contains(&day) {
                    sheet.set(cell, &self.mark);
                    sheet.set_style(cell, marked.clone());
                } else {
                    sheet.set_style(cell, plain.clone());
                }
            }
        }

        Ok(Rendered {
            document: Document::Built(book),
            pages: 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupWarning {
    pub group: String,
    pub layout: String,
    pub message: String,
}

#[derive(Debug)]
pub struct Assembled {
    pub layout: &'static str,
    pub rendered: Rendered,
    pub warnings: Vec<GroupWarning>,
}

#[derive(Debug)]
pub struct AssemblyFailed {
    pub warnings: Vec<GroupWarning>,
}

pub struct Assembler {
    layouts: Vec<Box<dyn ReportLayout>>,
}

impl Assembler {
    pub fn new(layouts: Vec<Box<dyn ReportLayout>>) -> Self {
        Self { layouts }
    }

    /// Template first, legacy as the fallback.
    pub fn standard(template: Result<Template, String>, layout: &SheetLayout) -> Self {
        Self::new(vec![
            Box::new(TemplateLayout::new(template, layout.clone())),
            Box::new(LegacyLayout::new(&layout.mark)),
        ])
    }

    pub fn assemble(&self, group: &GroupAttendance) -> Result<Assembled, AssemblyFailed> {
        let mut warnings = Vec::new();
        for layout in &self.layouts {
            match layout.render(group) {
                Ok(rendered) => {
                    return Ok(Assembled {
                        layout: layout.name(),
                        rendered,
                        warnings,
                    })
                }
                Err(e) => {
                    warn!(
                        group = %group.clean_name(),
                        layout = layout.name(),
                        error = %e,
                        "report layout failed"
                    );
                    warnings.push(GroupWarning {
                        group: group.group.clone(),
                        layout: layout.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Err(AssemblyFailed { warnings })
    }
}
