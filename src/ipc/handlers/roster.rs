use crate::ipc::error::{grade_err, ok};
use crate::ipc::helpers::{optional_str, required_str, session_ref};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::roster::{header_display_name, REQUIRED_HEADERS};
use crate::session::Session;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

fn headers_json() -> serde_json::Value {
    json!(REQUIRED_HEADERS
        .iter()
        .map(|h| json!({ "key": h, "displayName": header_display_name(h) }))
        .collect::<Vec<_>>())
}

fn session_json(session: &Session) -> serde_json::Value {
    json!({
        "sessionId": session.id().to_string(),
        "fileName": session.source().file_name,
        "source": session.source(),
        "headers": headers_json(),
        "learnerCount": session.roster().len(),
        "learners": session.roster().learners(),
    })
}

fn handle_roster_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let file_name = optional_str(req, "fileName").unwrap_or_else(|| {
        Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone())
    });
    let media_type = optional_str(req, "mediaType");

    // Any failure leaves the daemon with no dataset at all.
    state.session = None;

    match Session::open(
        Path::new(&path),
        &file_name,
        media_type.as_deref(),
        state.config.mark_policy(),
    ) {
        Ok(session) => {
            info!(
                file = %file_name,
                learners = session.roster().len(),
                session = %session.id(),
                "roster imported"
            );
            let result = session_json(&session);
            state.session = Some(session);
            ok(&req.id, result)
        }
        Err(e) => {
            warn!(file = %file_name, code = e.code(), "roster import failed: {:#}", e);
            grade_err(&req.id, &e)
        }
    }
}

fn handle_roster_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match session_ref(state, req) {
        Ok(session) => ok(&req.id, session_json(session)),
        Err(e) => e,
    }
}

fn handle_roster_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cleared = state.session.take().is_some();
    if cleared {
        info!("session cleared");
    }
    ok(&req.id, json!({ "cleared": cleared }))
}

fn handle_roster_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match session_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let out_path = state.config.resolve_export_path(
        optional_str(req, "outPath").as_deref(),
        report::ROSTER_EXPORT_FILE,
    );

    match report::export_roster(session.roster(), &out_path) {
        Ok(summary) => {
            info!(
                path = %out_path.display(),
                rows = session.roster().len(),
                entries = summary.entry_count,
                "roster exported"
            );
            ok(
                &req.id,
                json!({
                    "path": out_path.to_string_lossy(),
                    "sheetNames": summary.sheet_names,
                    "rowCount": session.roster().len(),
                }),
            )
        }
        Err(e) => {
            warn!(path = %out_path.display(), "roster export failed: {:#}", e);
            grade_err(&req.id, &e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.import" => Some(handle_roster_import(state, req)),
        "roster.get" => Some(handle_roster_get(state, req)),
        "roster.clear" => Some(handle_roster_clear(state, req)),
        "roster.export" => Some(handle_roster_export(state, req)),
        _ => None,
    }
}
