use crate::attendance::{self, safe_file_stem};
use crate::ipc::error::ok;
use crate::ipc::helpers::{csv_input, parse_mode, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::pagination::pages_needed;
use crate::sar;
use crate::validate;
use serde_json::json;
use tracing::info;

fn sar_validate(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let text = csv_input(&req.params, "csv")?;
    let mode = parse_mode(&req.params, state.config.parse_mode)?;
    let errors = validate::validate_csv(&text, mode, &state.config.group_key);
    info!(count = errors.len(), "sar.validate");
    let messages: Vec<String> = errors.iter().map(|e| e.readable_message()).collect();
    Ok(json!({
        "errorCount": errors.len(),
        "errors": errors,
        "messages": messages,
    }))
}

fn sar_summary(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let text = csv_input(&req.params, "csv")?;
    let rows = sar::parse_keyed(&text)?;
    let groups = attendance::aggregate(&rows, &state.config.group_key)?;
    let layout = &state.config.layout;
    let out: Vec<serde_json::Value> = groups
        .iter()
        .map(|g| {
            let pages = pages_needed(g.students.len(), layout.rows_per_page);
            json!({
                "group": g.group,
                "cleanName": g.clean_name(),
                "fileName": format!("{}.xlsx", safe_file_stem(&g.group)),
                "studentCount": g.students.len(),
                "pages": pages,
                "exceedsCapacity": pages > layout.max_pages(),
            })
        })
        .collect();
    Ok(json!({
        "rowCount": rows.len(),
        "capacity": layout.capacity(),
        "groups": out,
    }))
}

fn respond(
    req: &Request,
    result: Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sar.validate" => Some(respond(req, sar_validate(state, req))),
        "sar.summary" => Some(respond(req, sar_summary(state, req))),
        _ => None,
    }
}
