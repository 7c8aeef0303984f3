//! A1 cell addressing shared by both report layouts, and the in-memory sheet
//! the legacy layout builds before it is written out with rust_xlsxwriter.

use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook as XlsxWorkbook, XlsxError};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ReportError;

/// Zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

pub fn column_index(letters: &str) -> Option<u16> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut n: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    u16::try_from(n - 1).ok()
}

pub fn column_letters(mut col: u16) -> String {
    let mut out = Vec::new();
    loop {
        out.push((b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    out.iter().rev().collect()
}

impl CellRef {
    /// `column` is a letter reference, `row` is 1-based as written in A1 notation.
    pub fn at(column: &str, row: u32) -> Result<Self, ReportError> {
        let col = column_index(column).ok_or_else(|| ReportError::CellRef(column.to_string()))?;
        if row == 0 {
            return Err(ReportError::CellRef(format!("{}{}", column, row)));
        }
        Ok(CellRef { row: row - 1, col })
    }

    pub fn parse(a1: &str) -> Result<Self, ReportError> {
        let t = a1.trim();
        let split = t
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| ReportError::CellRef(a1.to_string()))?;
        let (letters, digits) = t.split_at(split);
        let row = digits
            .parse::<u32>()
            .map_err(|_| ReportError::CellRef(a1.to_string()))?;
        CellRef::at(letters, row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first: CellRef,
    pub last: CellRef,
}

impl CellRange {
    pub fn new(a: CellRef, b: CellRef) -> Self {
        CellRange {
            first: CellRef {
                row: a.row.min(b.row),
                col: a.col.min(b.col),
            },
            last: CellRef {
                row: a.row.max(b.row),
                col: a.col.max(b.col),
            },
        }
    }

    pub fn parse(s: &str) -> Result<Self, ReportError> {
        match s.split_once(':') {
            Some((a, b)) => Ok(CellRange::new(CellRef::parse(a)?, CellRef::parse(b)?)),
            None => {
                let c = CellRef::parse(s)?;
                Ok(CellRange::new(c, c))
            }
        }
    }

    pub fn contains(&self, c: CellRef) -> bool {
        (self.first.row..=self.last.row).contains(&c.row)
            && (self.first.col..=self.last.col).contains(&c.col)
    }

    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.first.row <= other.last.row
            && other.first.row <= self.last.row
            && self.first.col <= other.last.col
            && other.first.col <= self.last.col
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first, self.last)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellStyle {
    pub bold: bool,
    pub font_color: Option<u32>,
    pub fill: Option<u32>,
    pub center: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<CellRef, String>,
    styles: BTreeMap<CellRef, CellStyle>,
    column_widths: BTreeMap<u16, f64>,
    frozen_rows: u32,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Sheet {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn value(&self, cell: CellRef) -> &str {
        self.cells.get(&cell).map(String::as_str).unwrap_or("")
    }

    /// An empty value blanks the cell.
    pub fn set(&mut self, cell: CellRef, value: &str) {
        if value.is_empty() {
            self.cells.remove(&cell);
        } else {
            self.cells.insert(cell, value.to_string());
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &str)> {
        self.cells.iter().map(|(c, v)| (*c, v.as_str()))
    }

    pub fn set_style(&mut self, cell: CellRef, style: CellStyle) {
        self.styles.insert(cell, style);
    }

    pub fn style(&self, cell: CellRef) -> Option<&CellStyle> {
        self.styles.get(&cell)
    }

    pub fn set_column_width(&mut self, col: u16, width: f64) {
        self.column_widths.insert(col, width);
    }

    pub fn freeze_rows(&mut self, rows: u32) {
        self.frozen_rows = rows;
    }

    pub fn frozen_rows(&self) -> u32 {
        self.frozen_rows
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: &str) -> &mut Sheet {
        self.sheets.push(Sheet::new(name));
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    #[cfg(test)]
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let write_err = |e: XlsxError| ReportError::Write(e.to_string());
        let mut book = XlsxWorkbook::new();
        for sheet in &self.sheets {
            let ws = book.add_worksheet();
            ws.set_name(sheet.name()).map_err(write_err)?;
            for (col, width) in &sheet.column_widths {
                ws.set_column_width(*col, *width).map_err(write_err)?;
            }
            if sheet.frozen_rows() > 0 {
                ws.set_freeze_panes(sheet.frozen_rows(), 0).map_err(write_err)?;
            }
            for (cell, value) in sheet.cells() {
                match sheet.style(cell) {
                    Some(style) => ws.write_string_with_format(cell.row, cell.col, value, &to_format(style)),
                    None => ws.write_string(cell.row, cell.col, value),
                }
                .map_err(write_err)?;
            }
            for (cell, style) in &sheet.styles {
                if sheet.cells.contains_key(cell) {
                    continue;
                }
                ws.write_blank(cell.row, cell.col, &to_format(style))
                    .map_err(write_err)?;
            }
        }
        book.save_to_buffer().map_err(write_err)
    }
}

fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();
    if style.bold {
        format = format.set_bold();
    }
    if let Some(rgb) = style.font_color {
        format = format.set_font_color(Color::RGB(rgb));
    }
    if let Some(rgb) = style.fill {
        format = format.set_background_color(Color::RGB(rgb));
    }
    if style.center {
        format = format
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
    }
    format
}
