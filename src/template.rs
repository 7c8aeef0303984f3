//! The pre-formatted SRS template, edited in place.
//!
//! Reports are the template file itself with cell values changed, so column
//! widths, row heights, styles, formulas and merged ranges all carry through.

use std::io::Cursor;
use std::path::Path;
use umya_spreadsheet::{reader, writer, Border, Spreadsheet, VerticalAlignmentValues, Worksheet};

use crate::error::ReportError;
use crate::workbook::{CellRange, CellRef};

#[derive(Debug, Clone)]
pub struct Template {
    book: Spreadsheet,
}

/// umya addresses cells as 1-based `(col, row)`.
fn coords(cell: CellRef) -> (u32, u32) {
    (cell.col as u32 + 1, cell.row + 1)
}

impl From<Spreadsheet> for Template {
    fn from(book: Spreadsheet) -> Self {
        Template { book }
    }
}

impl Template {
    pub fn load(path: &Path) -> Result<Template, ReportError> {
        let load_err = |e: &dyn std::fmt::Display| {
            ReportError::Template(format!(
                "failed to load template {}: {}",
                path.to_string_lossy(),
                e
            ))
        };
        let bytes = std::fs::read(path).map_err(|e| load_err(&e))?;
        Template::from_bytes(&bytes).map_err(|e| load_err(&e))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Template, ReportError> {
        let book = reader::xlsx::read_reader(Cursor::new(bytes), true)
            .map_err(|e| ReportError::Template(e.to_string()))?;
        Ok(Template { book })
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.book
            .get_sheet_collection_no_check()
            .iter()
            .map(|s| s.get_name())
            .collect()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.book.get_sheet_by_name(name).is_some()
    }

    fn sheet(&self, name: &str) -> Result<&Worksheet, ReportError> {
        self.book
            .get_sheet_by_name(name)
            .ok_or_else(|| ReportError::MissingSheet(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Worksheet, ReportError> {
        self.book
            .get_sheet_by_name_mut(name)
            .ok_or_else(|| ReportError::MissingSheet(name.to_string()))
    }

    /// Appends a full copy of `source` (values, styles, dimensions, merges)
    /// under `name`.
    pub fn duplicate_sheet(&mut self, source: &str, name: &str) -> Result<(), ReportError> {
        let mut copy = self.sheet(source)?.clone();
        copy.set_name(name);
        self.book
            .add_sheet(copy)
            .map_err(|e| ReportError::Write(format!("cannot add sheet \"{}\": {}", name, e)))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn value(&self, sheet: &str, cell: CellRef) -> String {
        self.sheet(sheet)
            .map(|ws| ws.get_value(coords(cell)))
            .unwrap_or_default()
    }

    /// Writes `value` as text, keeping the cell's style. An empty value blanks it.
    pub fn set(&mut self, sheet: &str, cell: CellRef, value: &str) -> Result<(), ReportError> {
        let ws = self.sheet_mut(sheet)?;
        if value.is_empty() {
            if ws.get_cell(coords(cell)).is_some() {
                ws.get_cell_mut(coords(cell)).set_blank();
            }
        } else {
            ws.get_cell_mut(coords(cell)).set_value_string(value);
        }
        Ok(())
    }

    /// Blanks every populated cell in `range`; formatting stays.
    pub fn clear_range(&mut self, sheet: &str, range: CellRange) -> Result<(), ReportError> {
        let ws = self.sheet_mut(sheet)?;
        let filled: Vec<(u32, u32)> = ws
            .get_cell_collection()
            .iter()
            .map(|c| {
                let at = c.get_coordinate();
                (*at.get_col_num(), *at.get_row_num())
            })
            .filter(|(col, row)| {
                range.contains(CellRef {
                    row: row - 1,
                    col: (col - 1) as u16,
                })
            })
            .collect();
        for at in filled {
            ws.get_cell_mut(at).set_blank();
        }
        Ok(())
    }

    /// Merged ranges on `sheet`; unreadable range strings are skipped.
    pub fn merges(&self, sheet: &str) -> Result<Vec<CellRange>, ReportError> {
        Ok(self
            .sheet(sheet)?
            .get_merge_cells()
            .iter()
            .filter_map(|r| CellRange::parse(&r.get_range()).ok())
            .collect())
    }

    /// Same range twice is a no-op; a partial overlap is rejected.
    pub fn merge(&mut self, sheet: &str, range: CellRange) -> Result<(), ReportError> {
        let existing = self.merges(sheet)?;
        if existing.contains(&range) {
            return Ok(());
        }
        if let Some(clash) = existing.iter().find(|m| m.overlaps(&range)) {
            return Err(ReportError::Write(format!(
                "cannot merge {} on \"{}\": overlaps {}",
                range, sheet, clash
            )));
        }
        self.sheet_mut(sheet)?.add_merge_cells(range.to_string());
        Ok(())
    }

    /// Bold 9pt Calibri, top-aligned wrapped text inside a thin box.
    pub fn style_notes(&mut self, sheet: &str, cell: CellRef) -> Result<(), ReportError> {
        let style = self.sheet_mut(sheet)?.get_style_mut(coords(cell));
        style
            .get_font_mut()
            .set_bold(true)
            .set_size(9.0)
            .set_name("Calibri");
        let alignment = style.get_alignment_mut();
        alignment.set_vertical(VerticalAlignmentValues::Top);
        alignment.set_wrap_text(true);
        let borders = style.get_borders_mut();
        borders.get_top_mut().set_border_style(Border::BORDER_THIN);
        borders.get_left_mut().set_border_style(Border::BORDER_THIN);
        borders.get_bottom_mut().set_border_style(Border::BORDER_THIN);
        borders.get_right_mut().set_border_style(Border::BORDER_THIN);
        Ok(())
    }

    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let mut buf = Vec::new();
        writer::xlsx::write_writer(&self.book, &mut buf)
            .map_err(|e| ReportError::Write(e.to_string()))?;
        Ok(buf)
    }
}
