use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pagination::{STUDENTS_PER_PAGE, TEMPLATE_PAGES};
use crate::sar::ParseMode;

pub const CONFIG_ENV: &str = "SRSD_CONFIG";
pub const TEMPLATE_ENV: &str = "SRSD_TEMPLATE";
pub const DEFAULT_GROUP_KEY: &str = "Program Day: Group: Class Name";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub parse_mode: ParseMode,
    pub template_path: PathBuf,
    pub group_key: String,
    pub layout: SheetLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parse_mode: ParseMode::Strict,
            template_path: PathBuf::from("srs_blank_template.xlsx"),
            group_key: DEFAULT_GROUP_KEY.to_string(),
            layout: SheetLayout::default(),
        }
    }
}

/// Coordinates of the pre-formatted SRS template. Columns are letters, rows are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetLayout {
    pub sheet_names: Vec<String>,
    pub header_cell: String,
    pub placeholder_cells: Vec<String>,
    pub start_row: u32,
    pub rows_per_page: usize,
    pub name_column: String,
    pub grade_column: String,
    /// Monday through Friday, three columns each.
    pub weekday_blocks: Vec<Vec<String>>,
    pub mark: String,
    pub notes_section: bool,
    pub notes_range: String,
}

impl Default for SheetLayout {
    fn default() -> Self {
        let cols = |c: &[&str]| c.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            sheet_names: (1..=TEMPLATE_PAGES).map(|i| format!("Page {}", i)).collect(),
            header_cell: "B3".to_string(),
            placeholder_cells: cols(&["I3", "N3"]),
            start_row: 10,
            rows_per_page: STUDENTS_PER_PAGE,
            name_column: "A".to_string(),
            grade_column: "B".to_string(),
            weekday_blocks: vec![
                cols(&["C", "D", "E"]),
                cols(&["F", "G", "H"]),
                cols(&["I", "J", "K"]),
                cols(&["L", "M", "N"]),
                cols(&["O", "P", "Q"]),
            ],
            mark: "\u{2714}".to_string(),
            notes_section: false,
            notes_range: "A5:Q7".to_string(),
        }
    }
}

impl SheetLayout {
    pub fn max_pages(&self) -> usize {
        self.sheet_names.len()
    }

    pub fn capacity(&self) -> usize {
        self.rows_per_page * self.max_pages()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sheet_names.is_empty() {
            return Err(anyhow!("layout.sheetNames must not be empty"));
        }
        if self.rows_per_page == 0 {
            return Err(anyhow!("layout.rowsPerPage must be at least 1"));
        }
        if self.start_row == 0 {
            return Err(anyhow!("layout.startRow is 1-based"));
        }
        if self.weekday_blocks.len() != 5 {
            return Err(anyhow!(
                "layout.weekdayBlocks must list Monday..Friday (got {})",
                self.weekday_blocks.len()
            ));
        }
        if let Some(bad) = self.weekday_blocks.iter().position(|b| b.len() != 3) {
            return Err(anyhow!("layout.weekdayBlocks[{}] must be 3 columns wide", bad));
        }
        Ok(())
    }
}

/// Loads the JSON file named by `SRSD_CONFIG` (if any), then applies `SRSD_TEMPLATE`.
pub fn load_from_env() -> anyhow::Result<(Config, Option<PathBuf>)> {
    let path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut cfg = match path.as_deref() {
        Some(p) => load_file(p)?,
        None => Config::default(),
    };
    if let Some(t) = std::env::var_os(TEMPLATE_ENV) {
        cfg.template_path = PathBuf::from(t);
    }
    Ok((cfg, path))
}

pub fn load_file(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
    let cfg: Config = serde_json::from_str(&text)
        .with_context(|| format!("config {} is invalid JSON", path.to_string_lossy()))?;
    cfg.layout.validate()?;
    Ok(cfg)
}
