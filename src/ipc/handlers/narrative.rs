use serde_json::json;
use tracing::warn;

use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_opt_str, get_required_str, load_scored_table, parse_selector, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::narrative::{build_user_prompt, ChatBackend};

fn configure(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let endpoint = get_required_str(params, "endpoint")?;
    let model = get_required_str(params, "model")?;
    let api_key = get_opt_str(params, "apiKey")?;
    let temperature = params.get("temperature").and_then(|v| v.as_f64());
    let max_tokens = params
        .get("maxTokens")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32);

    let backend = ChatBackend::new(endpoint, model, api_key, temperature, max_tokens)
        .map_err(|e| HandlerErr::new("bad_params", format!("{e:#}")))?;
    let described = backend.describe();
    state.narrative = Some(backend);
    Ok(json!({ "narrative": described }))
}

/// Select the student's rows through the normal pipeline, shape the prompt,
/// and ask the backend for commentary. A transport failure is recoverable:
/// the scored rows it was about remain queryable.
fn comment(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let selector = parse_selector(params)?;
    let question = get_opt_str(params, "question")?;
    if state.narrative.is_none() {
        return Err(HandlerErr::new(
            "narrative_not_configured",
            "configure a narrative backend first",
        ));
    }

    let (profile, table) = load_scored_table(state)?;
    let hits = calc::find_rows(&table, &profile, &selector);
    if hits.is_empty() {
        return Err(HandlerErr::new(
            "not_found",
            "no rows matched the requested student",
        ));
    }

    let prompt = build_user_prompt(&hits, question.as_deref());
    let Some(backend) = state.narrative.as_ref() else {
        return Err(HandlerErr::new(
            "narrative_not_configured",
            "configure a narrative backend first",
        ));
    };
    let commentary = backend.comment(&prompt).map_err(|e| {
        warn!(error = %format!("{e:#}"), "narrative request failed");
        HandlerErr::new("narrative_failed", format!("{e:#}"))
    })?;
    Ok(json!({
        "commentary": commentary,
        "rowCount": hits.len(),
    }))
}

fn respond(
    state: &mut AppState,
    req: &Request,
    run: fn(&mut AppState, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match run(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "narrative.configure" => Some(respond(state, req, configure)),
        "narrative.comment" => Some(respond(state, req, comment)),
        _ => None,
    }
}
