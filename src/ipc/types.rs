use serde::Deserialize;

use crate::narrative::ChatBackend;
use crate::profile::ReportProfile;
use crate::sheet::{RecordSource, SheetCache, DEFAULT_CACHE_TTL};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub profile: Option<ReportProfile>,
    pub source: Option<Box<dyn RecordSource>>,
    pub cache: SheetCache,
    pub narrative: Option<ChatBackend>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            profile: None,
            source: None,
            cache: SheetCache::new(DEFAULT_CACHE_TTL),
            narrative: None,
        }
    }
}
