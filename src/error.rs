use thiserror::Error;

use crate::pagination::CapacityError;

/// Failures that abort a whole run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("CSV parsing failed:\n{0}")]
    Parse(String),

    #[error("Could not find any groups under the column \"{0}\".")]
    NoGroups(String),

    #[error("{0}")]
    MissingColumn(String),
}

impl RunError {
    pub fn code(&self) -> &'static str {
        match self {
            RunError::Parse(_) => "parse_failed",
            RunError::NoGroups(_) => "no_groups",
            RunError::MissingColumn(_) => "missing_column",
        }
    }
}

/// Failures scoped to a single group's report; the assembler falls back on these.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("Template unavailable: {0}")]
    Template(String),

    #[error("Template missing \"{0}\" sheet")]
    MissingSheet(String),

    #[error("Invalid cell reference: {0}")]
    CellRef(String),

    #[error("Spreadsheet write failed: {0}")]
    Write(String),
}
