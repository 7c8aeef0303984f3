use crate::bundle;
use crate::ipc::error::ok;
use crate::ipc::helpers::{csv_input, optional_path, parse_mode, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::pipeline;
use crate::template::Template;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

fn write_failed(e: anyhow::Error, path: &Path) -> HandlerErr {
    HandlerErr {
        code: "write_failed",
        message: format!("{:#}", e),
        details: Some(json!({ "path": path.to_string_lossy() })),
    }
}

fn reports_generate(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let text = csv_input(&req.params, "csv")?;
    let out_dir = PathBuf::from(required_str(&req.params, "outDir")?);
    let mut cfg = state.config.clone();
    cfg.parse_mode = parse_mode(&req.params, cfg.parse_mode)?;
    if let Some(p) = optional_path(&req.params, "templatePath") {
        cfg.template_path = p;
    }

    // Loaded once per run; a missing template only demotes groups to the legacy layout.
    let template = Template::load(&cfg.template_path).map_err(|e| e.to_string());
    if let Err(e) = &template {
        warn!(error = %e, "template unavailable");
    }

    let run_id = Uuid::new_v4().to_string();
    info!(run_id = %run_id, "reports.generate");
    let outcome = pipeline::run(&text, template, &cfg)?;
    let paths =
        pipeline::write_reports(&out_dir, &outcome.reports).map_err(|e| write_failed(e, &out_dir))?;

    let bundle = match optional_path(&req.params, "bundlePath") {
        Some(path) => {
            let manifest = bundle::export_report_bundle(&outcome.reports, &path, &run_id)
                .map_err(|e| write_failed(e, &path))?;
            Some(json!({
                "path": path.to_string_lossy(),
                "bundleFormat": manifest.format,
                "entryCount": manifest.entries.len(),
            }))
        }
        None => None,
    };

    let reports: Vec<serde_json::Value> = outcome
        .reports
        .iter()
        .zip(&paths)
        .map(|(r, path)| {
            json!({
                "group": r.group,
                "cleanName": r.clean_name,
                "fileName": r.file_name,
                "path": path.to_string_lossy(),
                "layout": r.layout,
                "studentCount": r.student_count,
                "pages": r.pages,
            })
        })
        .collect();
    let messages: Vec<String> = outcome.errors.iter().map(|e| e.readable_message()).collect();

    Ok(json!({
        "runId": run_id,
        "status": outcome.status(),
        "errors": outcome.errors,
        "messages": messages,
        "reports": reports,
        "warnings": outcome.warnings,
        "bundle": bundle,
    }))
}

fn reports_verify_bundle(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(required_str(&req.params, "bundlePath")?);
    let manifest = bundle::read_manifest(&path).map_err(|e| HandlerErr {
        code: "bundle_invalid",
        message: format!("{:#}", e),
        details: Some(json!({ "path": path.to_string_lossy() })),
    })?;
    serde_json::to_value(&manifest).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.generate" => reports_generate(state, req),
        "reports.verifyBundle" => reports_verify_bundle(req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
