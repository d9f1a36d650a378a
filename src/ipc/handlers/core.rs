use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cache = state.cache.status().map(|s| {
        json!({
            "rows": s.row_count,
            "ageSecs": s.age_secs,
            "fetchedAt": s.fetched_at.to_rfc3339(),
        })
    });
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "profileLoaded": state.profile.is_some(),
            "source": state.source.as_ref().map(|s| s.describe()),
            "cache": cache,
            "narrative": state.narrative.as_ref().map(|n| n.describe()),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
