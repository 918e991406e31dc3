use crate::ipc::error::{err, grade_err, ok};
use crate::ipc::helpers::{optional_str, session_ref};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;
use tracing::{info, warn};

fn handle_report_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match session_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let model = match report::build_report(session.marks()) {
        Ok(m) => m,
        Err(e) => return grade_err(&req.id, &e),
    };
    match serde_json::to_value(&model) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_report_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match session_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let model = match report::build_report(session.marks()) {
        Ok(m) => m,
        Err(e) => return grade_err(&req.id, &e),
    };
    let out_path = state.config.resolve_export_path(
        optional_str(req, "outPath").as_deref(),
        report::RESULTS_EXPORT_FILE,
    );

    match report::export_results(&model, &out_path) {
        Ok(summary) => {
            info!(
                path = %out_path.display(),
                learners = model.learner_count,
                entries = summary.entry_count,
                "results exported"
            );
            ok(
                &req.id,
                json!({
                    "path": out_path.to_string_lossy(),
                    "sheetNames": summary.sheet_names,
                    "learnerCount": model.learner_count,
                }),
            )
        }
        Err(e) => {
            warn!(path = %out_path.display(), "results export failed: {:#}", e);
            grade_err(&req.id, &e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "report.open" => Some(handle_report_open(state, req)),
        "report.export" => Some(handle_report_export(state, req)),
        _ => None,
    }
}
