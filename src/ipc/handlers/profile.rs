use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::profile::ReportProfile;

fn parse_profile(params: &serde_json::Value) -> Result<ReportProfile, HandlerErr> {
    let profile: ReportProfile = serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
    profile
        .validate()
        .map_err(|msg| HandlerErr::new("bad_params", msg))?;
    Ok(profile)
}

fn install(state: &mut AppState, profile: ReportProfile) -> serde_json::Value {
    info!(
        id_column = %profile.id_column,
        criteria = profile.criteria.len(),
        bands = profile.bands.len(),
        "profile configured"
    );
    let summary = json!({
        "idColumn": profile.id_column,
        "nameColumn": profile.name_column,
        "criteria": profile.criteria.len(),
    });
    state.profile = Some(profile);
    summary
}

fn handle_configure(state: &mut AppState, req: &Request) -> serde_json::Value {
    match parse_profile(&req.params) {
        Ok(profile) => {
            let summary = install(state, profile);
            ok(&req.id, summary)
        }
        Err(error) => error.response(&req.id),
    }
}

fn handle_load_file(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match get_required_str(&req.params, "path") {
        Ok(p) => PathBuf::from(p),
        Err(error) => return error.response(&req.id),
    };
    let profile = match ReportProfile::load_file(&path) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "bad_params", format!("{e:#}"), None),
    };
    if let Err(msg) = profile.validate() {
        return err(&req.id, "bad_params", msg, None);
    }
    let summary = install(state, profile);
    ok(&req.id, summary)
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(profile) = &state.profile else {
        return err(&req.id, "no_profile", "configure a report profile first", None);
    };
    match serde_json::to_value(profile) {
        Ok(value) => ok(&req.id, value),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profile.configure" => Some(handle_configure(state, req)),
        "profile.loadFile" => Some(handle_load_file(state, req)),
        "profile.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
