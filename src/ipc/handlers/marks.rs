use crate::ipc::error::{err, grade_err, ok};
use crate::ipc::helpers::{required_index, required_str, session_mut, session_ref};
use crate::ipc::types::{AppState, Request};
use crate::marks::MarkField;
use crate::report::FieldInfo;
use serde_json::json;
use tracing::debug;

fn fields_json() -> serde_json::Value {
    json!(MarkField::ALL
        .iter()
        .copied()
        .map(FieldInfo::from)
        .collect::<Vec<_>>())
}

fn mark_value(req: &Request) -> Result<String, serde_json::Value> {
    match req.params.get("value") {
        None => Err(err(&req.id, "bad_params", "missing value", None)),
        Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(err(
            &req.id,
            "bad_params",
            "value must be a string, number or null",
            Some(json!({ "value": other })),
        )),
    }
}

fn handle_marks_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match session_ref(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let marks = session.marks();
    ok(
        &req.id,
        json!({
            "fields": fields_json(),
            "policy": marks.policy().as_str(),
            "learnerCount": marks.len(),
            "entries": marks.entries(),
        }),
    )
}

fn handle_marks_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let index = match required_index(req, "index") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let field = match required_str(req, "field") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let field: MarkField = match field.parse() {
        Ok(f) => f,
        Err(e) => return grade_err(&req.id, &e),
    };
    let value = match mark_value(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match session_mut(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    match session.marks_mut().set_field(index, field, value) {
        Ok(entry) => {
            debug!(index, field = %field, "mark updated");
            ok(&req.id, json!({ "index": index, "entry": entry }))
        }
        Err(e) => grade_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.get" => Some(handle_marks_get(state, req)),
        "marks.set" => Some(handle_marks_set(state, req)),
        _ => None,
    }
}
