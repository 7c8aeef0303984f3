use serde_json::json;
use std::path::{Path, PathBuf};

use crate::error::RunError;
use crate::ipc::error::err;
use crate::sar::ParseMode;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RunError> for HandlerErr {
    fn from(e: RunError) -> Self {
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

pub fn optional_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    optional_str(params, key)
        .map(str::to_string)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_path(params: &serde_json::Value, key: &str) -> Option<PathBuf> {
    optional_str(params, key).map(PathBuf::from)
}

pub fn read_text(path: &Path) -> Result<String, HandlerErr> {
    std::fs::read_to_string(path).map_err(|e| HandlerErr {
        code: "io_failed",
        message: e.to_string(),
        details: Some(json!({ "path": path.to_string_lossy() })),
    })
}

/// CSV body from `<prefix>Text`, or read from `<prefix>Path`.
pub fn csv_input(params: &serde_json::Value, prefix: &str) -> Result<String, HandlerErr> {
    let text_key = format!("{}Text", prefix);
    if let Some(text) = params.get(&text_key).and_then(|v| v.as_str()) {
        return Ok(text.to_string());
    }
    let path_key = format!("{}Path", prefix);
    match optional_path(params, &path_key) {
        Some(path) => read_text(&path),
        None => Err(HandlerErr::bad_params(format!(
            "missing {} or {}",
            path_key, text_key
        ))),
    }
}

pub fn parse_mode(params: &serde_json::Value, default: ParseMode) -> Result<ParseMode, HandlerErr> {
    match params.get("parseMode").and_then(|v| v.as_str()) {
        None => Ok(default),
        Some(raw) => ParseMode::parse(raw).ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "parseMode must be one of: simple, strict".to_string(),
            details: Some(json!({ "parseMode": raw })),
        }),
    }
}
