use anyhow::{bail, Context};
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::calc::ScoredRow;

/// Persona for the commentary call. The reply is for parents, not staff.
pub const ADVISOR_SYSTEM_PROMPT: &str =
    "You are an academic advisor who writes short conduct and progress summaries for parents.";

const DEFAULT_QUESTION: &str = "Summarize this student's record for the period.";
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Serialize the selected rows as the record list embedded in the prompt.
/// Cells plus the computed total and label; nothing else travels.
pub fn rows_payload(rows: &[&ScoredRow]) -> serde_json::Value {
    serde_json::Value::Array(rows.iter().map(|r| r.to_json()).collect())
}

/// The fixed instructional template around the data subset. The caller's
/// question and the serialized rows are the only variable parts.
pub fn build_user_prompt(rows: &[&ScoredRow], question: Option<&str>) -> String {
    let records = serde_json::to_string_pretty(&rows_payload(rows))
        .unwrap_or_else(|_| "[]".to_string());
    let question = match question {
        Some(q) if !q.trim().is_empty() => q.trim(),
        _ => DEFAULT_QUESTION,
    };
    format!(
        "Here are a student's conduct records, one JSON record per sheet row. \
Each record carries the raw cells plus a computed point total and label.\n\n\
{records}\n\nQuestion: {question}\n\n\
Answer in clear, plain language a parent can follow. Do not reproduce the \
table; describe what stands out and what the student can improve."
    )
}

/// OpenAI-style chat-completions backend. Endpoint, model, and token are
/// caller-supplied; the reply is treated as one opaque string and never
/// parsed for structure.
pub struct ChatBackend {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::blocking::Client,
}

impl ChatBackend {
    pub fn new(
        endpoint: String,
        model: String,
        api_key: Option<String>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build narrative http client")?;
        Ok(Self {
            endpoint,
            model,
            api_key,
            temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            client,
        })
    }

    pub fn describe(&self) -> String {
        format!("{} ({})", self.endpoint, self.model)
    }

    pub fn comment(&self, user_prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": ADVISOR_SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .with_context(|| format!("call narrative endpoint {}", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("narrative endpoint {} returned an error", self.endpoint))?;
        let value: serde_json::Value = response
            .json()
            .context("decode narrative response")?;

        let Some(content) = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
        else {
            bail!("narrative response carried no usable choice");
        };
        if content.trim().is_empty() {
            bail!("narrative response was empty");
        }
        info!(chars = content.len(), "narrative commentary received");
        Ok(content.to_string())
    }
}
