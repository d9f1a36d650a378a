use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::sheet::{HttpJsonSource, JsonFileSource, RecordSource, DEFAULT_CACHE_TTL};

const HTTP_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

fn build_source(params: &serde_json::Value) -> Result<Box<dyn RecordSource>, HandlerErr> {
    let kind = get_required_str(params, "kind")?;
    match kind.as_str() {
        "file" => {
            let path = get_required_str(params, "path")?;
            Ok(Box::new(JsonFileSource::new(PathBuf::from(path))))
        }
        "http" => {
            let url = get_required_str(params, "url")?;
            let source = HttpJsonSource::new(url, HTTP_FETCH_TIMEOUT)
                .map_err(|e| HandlerErr::new("bad_params", format!("{e:#}")))?;
            Ok(Box::new(source))
        }
        other => Err(HandlerErr::new(
            "bad_params",
            format!("unknown source kind: {}", other),
        )),
    }
}

fn cache_ttl(params: &serde_json::Value) -> Result<Duration, HandlerErr> {
    match params.get("cacheTtlSecs") {
        None => Ok(DEFAULT_CACHE_TTL),
        Some(v) if v.is_null() => Ok(DEFAULT_CACHE_TTL),
        Some(v) => v
            .as_u64()
            .map(Duration::from_secs)
            .ok_or_else(|| HandlerErr::new("bad_params", "cacheTtlSecs must be a non-negative integer")),
    }
}

fn handle_configure(state: &mut AppState, req: &Request) -> serde_json::Value {
    let source = match build_source(&req.params) {
        Ok(s) => s,
        Err(error) => return error.response(&req.id),
    };
    let ttl = match cache_ttl(&req.params) {
        Ok(t) => t,
        Err(error) => return error.response(&req.id),
    };
    let described = source.describe();
    state.cache.set_ttl(ttl);
    state.cache.invalidate();
    state.source = Some(source);
    ok(
        &req.id,
        json!({ "source": described, "cacheTtlSecs": ttl.as_secs() }),
    )
}

fn handle_refresh(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(source) = state.source.as_ref() else {
        return err(&req.id, "no_source", "configure a record source first", None);
    };
    match state.cache.refresh(source.as_ref()) {
        Ok(rows) => ok(&req.id, json!({ "rows": rows })),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "sheet refresh failed");
            err(
                &req.id,
                "source_fetch_failed",
                format!("{e:#}"),
                Some(json!({ "source": source.describe() })),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "source.configure" => Some(handle_configure(state, req)),
        "source.refresh" => Some(handle_refresh(state, req)),
        _ => None,
    }
}
