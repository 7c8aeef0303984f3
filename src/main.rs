mod attendance;
mod balances;
mod bundle;
mod config;
mod error;
mod ipc;
mod pagination;
mod pipeline;
mod report;
mod sar;
mod template;
mod timefmt;
mod validate;
mod workbook;

use std::io::{self, BufRead, Write};
use std::process;
use tracing::{error, info};

fn main() {
    // stdout carries the IPC protocol, so logs go to stderr.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();

    let (config, config_path) = match config::load_from_env() {
        Ok(v) => v,
        Err(e) => {
            error!("failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        template = %config.template_path.to_string_lossy(),
        "srsd ready"
    );

    let mut state = ipc::AppState {
        config,
        config_path,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
