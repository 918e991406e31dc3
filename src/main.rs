mod calc;
mod config;
mod error;
mod ipc;
mod logging;
mod marks;
mod report;
mod roster;
mod session;
mod workbook;
mod xlsx;

use clap::Parser;
use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info};

fn main() {
    let config = config::Config::parse();
    if let Err(e) = logging::init_logging(&config.log_level) {
        eprintln!("gradesheetd: {:#}", e);
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        export_dir = %config.export_dir.display(),
        policy = config.mark_policy().as_str(),
        "gradesheetd ready"
    );

    let mut state = ipc::AppState::new(config);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("failed to read stdin: {}", e);
                break;
            }
        }

        // No id to reply to for either failure below.
        let line = match std::str::from_utf8(&buf) {
            Ok(v) => v,
            Err(e) => {
                write_response(&mut stdout, &bad_json(format!("request is not UTF-8: {}", e)));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                write_response(&mut stdout, &bad_json(e.to_string()));
                continue;
            }
        };

        debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        write_response(&mut stdout, &resp);
    }
    info!("stdin closed, exiting");
}

fn bad_json(message: String) -> serde_json::Value {
    json!({
        "ok": false,
        "error": { "code": "bad_json", "message": message }
    })
}

fn write_response(out: &mut impl Write, resp: &serde_json::Value) {
    let line = serde_json::to_string(resp).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    let _ = writeln!(out, "{}", line);
    let _ = out.flush();
}
