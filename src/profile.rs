use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One classification band: totals at or above `min` take `label`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub label: String,
}

/// The full scoring policy for one sheet. Every knob is supplied by the
/// caller; deployments disagree on all of them (base 0 vs 100, 800/700/600
/// bands vs 500/400, mark symbols), so nothing here is hardcoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportProfile {
    pub id_column: String,
    pub name_column: String,
    #[serde(default)]
    pub period_column: Option<String>,
    pub criteria: Vec<String>,
    #[serde(default = "default_met_marks")]
    pub met_marks: Vec<String>,
    #[serde(default = "default_failed_marks")]
    pub failed_marks: Vec<String>,
    #[serde(default = "default_met_delta")]
    pub met_delta: f64,
    #[serde(default = "default_failed_delta")]
    pub failed_delta: f64,
    /// Starting score per row. Must be explicit: 0 and 100 are both common.
    pub base_score: f64,
    /// Ordered highest threshold first. May be empty, in which case rows get
    /// no label.
    #[serde(default)]
    pub bands: Vec<Band>,
}

fn default_met_marks() -> Vec<String> {
    vec!["✓".to_string(), "v".to_string()]
}

fn default_failed_marks() -> Vec<String> {
    vec!["✗".to_string(), "x".to_string()]
}

fn default_met_delta() -> f64 {
    20.0
}

fn default_failed_delta() -> f64 {
    -30.0
}

impl ReportProfile {
    pub fn is_met_mark(&self, value: &str) -> bool {
        self.met_marks.iter().any(|m| m.eq_ignore_ascii_case(value))
    }

    pub fn is_failed_mark(&self, value: &str) -> bool {
        self.failed_marks
            .iter()
            .any(|m| m.eq_ignore_ascii_case(value))
    }

    /// Reject profiles that would make query results ambiguous. Runs at
    /// configure time so queries stay total.
    pub fn validate(&self) -> Result<(), String> {
        if self.id_column.trim().is_empty() {
            return Err("idColumn must not be empty".to_string());
        }
        if self.name_column.trim().is_empty() {
            return Err("nameColumn must not be empty".to_string());
        }
        if let Some(period) = &self.period_column {
            if period.trim().is_empty() {
                return Err("periodColumn must not be empty when set".to_string());
            }
        }
        for (i, criterion) in self.criteria.iter().enumerate() {
            if criterion.trim().is_empty() {
                return Err("criteria entries must not be empty".to_string());
            }
            if self.criteria[..i].iter().any(|c| c == criterion) {
                return Err(format!("duplicate criterion column: {}", criterion));
            }
        }
        for mark in &self.met_marks {
            if self.is_failed_mark(mark) {
                return Err(format!("mark {:?} is both a met and a failed mark", mark));
            }
        }
        for window in self.bands.windows(2) {
            if window[0].min <= window[1].min {
                return Err("bands must be ordered highest threshold first".to_string());
            }
        }
        if self.bands.iter().any(|b| b.label.trim().is_empty()) {
            return Err("band labels must not be empty".to_string());
        }
        Ok(())
    }

    pub fn load_file(path: &Path) -> anyhow::Result<ReportProfile> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read profile file {}", path.display()))?;
        let profile: ReportProfile = toml::from_str(&text)
            .with_context(|| format!("parse profile file {}", path.display()))?;
        Ok(profile)
    }
}
