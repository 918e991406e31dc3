use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = state.session.as_ref().map(|s| {
        json!({
            "sessionId": s.id().to_string(),
            "fileName": s.source().file_name,
            "learnerCount": s.roster().len(),
        })
    });
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "exportDir": state.config.export_dir.to_string_lossy(),
            "markPolicy": state.config.mark_policy().as_str(),
            "session": session,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
