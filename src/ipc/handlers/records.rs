use serde_json::json;

use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{load_scored_table, parse_selector, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn rows_json(rows: &[&calc::ScoredRow]) -> Vec<serde_json::Value> {
    rows.iter().map(|r| r.to_json()).collect()
}

fn records_table(state: &mut AppState, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (_, table) = load_scored_table(state)?;
    let rows: Vec<serde_json::Value> = table.rows.iter().map(|r| r.to_json()).collect();
    Ok(json!({
        "columns": table.columns,
        "rows": rows,
        "orphanRows": table.orphans,
    }))
}

fn records_lookup(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let selector = parse_selector(params)?;
    let (profile, table) = load_scored_table(state)?;
    let hits = calc::find_rows(&table, &profile, &selector);

    // A lookup against a column the sheet never carries is a schema problem
    // worth telling the caller about; the (empty) result is still a result.
    let referenced = if selector.identifier.is_some() {
        &profile.id_column
    } else {
        &profile.name_column
    };
    let mut result = json!({ "rows": rows_json(&hits) });
    if !table.columns.iter().any(|c| c == referenced) {
        result["schemaMismatch"] = json!({ "missingColumn": referenced });
    }
    Ok(result)
}

fn records_rankings(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let top_n = params
        .get("topN")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing topN"))? as usize;
    let (profile, table) = load_scored_table(state)?;
    let ranked = calc::rank_students(&table, &profile, top_n);
    let students = serde_json::to_value(&ranked)
        .map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    Ok(json!({ "students": students }))
}

fn records_violations(state: &mut AppState, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (profile, table) = load_scored_table(state)?;
    let mut counts = serde_json::Map::new();
    for (criterion, count) in calc::count_violations(&table, &profile) {
        counts.insert(criterion, json!(count));
    }
    Ok(json!({ "counts": counts }))
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
        "records.table" => Some(respond(state, req, records_table)),
        "records.lookup" => Some(respond(state, req, records_lookup)),
        "records.rankings" => Some(respond(state, req, records_rankings)),
        "records.violations" => Some(respond(state, req, records_violations)),
        _ => None,
    }
}
