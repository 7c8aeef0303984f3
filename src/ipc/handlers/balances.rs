use crate::balances;
use crate::ipc::error::ok;
use crate::ipc::helpers::{csv_input, optional_path, optional_str, read_text, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn report_date(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    match optional_str(params, "date") {
        None => Ok(chrono::Local::now().date_naive()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| HandlerErr {
            code: "bad_params",
            message: "date must be YYYY-MM-DD".to_string(),
            details: Some(json!({ "date": raw })),
        }),
    }
}

fn balances_reconcile(_state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let sar_text = csv_input(&req.params, "sar")?;
    let opening = match optional_path(&req.params, "balancesPath") {
        Some(path) => Some(read_text(&path)?),
        None => req
            .params
            .get("balancesText")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    };
    let out_dir = PathBuf::from(required_str(&req.params, "outDir")?);
    let date = report_date(&req.params)?;

    let lines = balances::reconcile(&sar_text, opening.as_deref())?;
    let path = balances::write_csv(&out_dir, &lines, date).map_err(|e| HandlerErr {
        code: "write_failed",
        message: format!("{:#}", e),
        details: Some(json!({ "path": out_dir.to_string_lossy() })),
    })?;
    info!(rows = lines.len(), path = %path.to_string_lossy(), "balances written");

    Ok(json!({
        "path": path.to_string_lossy(),
        "fileName": balances::file_name(date),
        "rowCount": lines.len(),
        "rows": lines,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "balances.reconcile" => Some(match balances_reconcile(state, req) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}
