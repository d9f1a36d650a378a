use serde_json::json;
use tracing::warn;

use crate::calc::{self, RowSelector, ScoredTable};
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::profile::ReportProfile;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(s) = v.as_str() else {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must be a string or null", key),
        ));
    };
    let t = s.trim();
    if t.is_empty() {
        return Ok(None);
    }
    Ok(Some(t.to_string()))
}

/// Identifiers and periods arrive as strings or numbers depending on how the
/// host UI read them; accept both and compare in string form.
pub fn get_opt_scalar(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    match v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                Ok(None)
            } else {
                Ok(Some(t.to_string()))
            }
        }
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(HandlerErr::new(
            "bad_params",
            format!("{} must be a string or number", key),
        )),
    }
}

/// The common selector shape for lookups and narrative requests. At least one
/// of identifier/nameFragment is required; identifier wins when both appear.
pub fn parse_selector(params: &serde_json::Value) -> Result<RowSelector, HandlerErr> {
    let selector = RowSelector {
        identifier: get_opt_scalar(params, "identifier")?,
        name_fragment: get_opt_str(params, "nameFragment")?,
        period: get_opt_scalar(params, "period")?,
    };
    if selector.identifier.is_none() && selector.name_fragment.is_none() {
        return Err(HandlerErr::new(
            "bad_params",
            "supply identifier or nameFragment",
        ));
    }
    Ok(selector)
}

/// Run the fetch → normalize → score pipeline for one request. Gates on a
/// configured profile and source, mirroring the no-workspace gate pattern.
pub fn load_scored_table(state: &mut AppState) -> Result<(ReportProfile, ScoredTable), HandlerErr> {
    let Some(profile) = state.profile.clone() else {
        return Err(HandlerErr::new(
            "no_profile",
            "configure a report profile first",
        ));
    };
    let Some(source) = state.source.as_ref() else {
        return Err(HandlerErr::new("no_source", "configure a record source first"));
    };
    let raw = state.cache.rows(source.as_ref()).map_err(|e| {
        warn!(error = %format!("{e:#}"), "sheet fetch failed");
        HandlerErr {
            code: "source_fetch_failed",
            message: format!("{e:#}"),
            details: Some(json!({ "source": source.describe() })),
        }
    })?;
    let table = calc::score_table(calc::normalize(&raw, &profile), &profile);
    Ok((profile, table))
}
