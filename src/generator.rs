/// Candidate generation adapter: asks an OpenAI-style chat-completions API
/// for the next pair of patterns.
///
/// Request:  POST {endpoint}
///           Authorization: Bearer <key>
///           {"model": "...", "messages": [{"role": "user", "content": <prompt>}]}
///
/// Response: the candidate JSON is the text in `choices[0].message.content`.
/// Only the first candidate entry is used.
///
/// Every failure (transport, HTTP status, empty body, bad JSON, malformed
/// sequence) is a `GenerationError`. No retries happen here.

use crate::config::GenerationConfig;
use crate::context;
use crate::error::GenerationError;
use crate::pulse::{CandidatePair, PulseSequence, RawSequence, Round};
use serde_json::{json, Value};
use std::time::Duration;

/// Source of candidate pairs.
///
/// `generate` blocks on network I/O; the driver runs it on a blocking thread.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self, history: &[Round], feedback: &str) -> Result<CandidatePair, GenerationError>;
}

pub struct ChatCompletions {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletions {
    pub fn new(cfg: &GenerationConfig, api_key: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(cfg.timeout_s)))
            .build()
            .into();
        Self {
            agent,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: api_key.into(),
        }
    }

    /// Read the API key from the environment variable named in the config.
    pub fn from_env(cfg: &GenerationConfig) -> Result<Self, GenerationError> {
        match std::env::var(&cfg.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(cfg, key.trim())),
            _ => Err(GenerationError::MissingCredential(cfg.api_key_env.clone())),
        }
    }

    fn request_body(&self, prompt: String) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }

    fn post(&self, body: &Value) -> Result<String, GenerationError> {
        let response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(body.to_string());

        let mut response = match response {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => return Err(GenerationError::Status(code)),
            Err(e) => return Err(GenerationError::Transport(e.to_string())),
        };
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| GenerationError::Transport(e.to_string()))
    }
}

impl Generator for ChatCompletions {
    fn generate(&self, history: &[Round], feedback: &str) -> Result<CandidatePair, GenerationError> {
        let prompt = context::build_prompt(history, feedback)?;
        log::info!(
            "Requesting candidates from {} ({} round(s) of history)",
            self.model,
            history.len()
        );
        let body = self.post(&self.request_body(prompt))?;
        let pair = parse_completion(&body)?;
        log::debug!("Candidate pair:\n{pair}");
        Ok(pair)
    }
}

/// Extract and validate the candidate pair from a chat-completions body.
pub fn parse_completion(body: &str) -> Result<CandidatePair, GenerationError> {
    if body.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    let json: Value = serde_json::from_str(body)?;
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            log::warn!("Unexpected API response: {}", truncate(body, 300));
            GenerationError::EmptyResponse
        })?;
    parse_candidates(content)
}

/// Parse the model's answer: `[{"option1": .., "option2": ..}, ...]`.
///
/// Also accepts a bare object and a Markdown code fence around the JSON.
pub fn parse_candidates(content: &str) -> Result<CandidatePair, GenerationError> {
    let value: Value = serde_json::from_str(strip_code_fence(content))?;
    let entry = match value {
        Value::Array(mut entries) => {
            if entries.is_empty() {
                return Err(GenerationError::EmptyResponse);
            }
            entries.swap_remove(0)
        }
        other => other,
    };
    Ok(CandidatePair::new(
        option(&entry, "option1")?,
        option(&entry, "option2")?,
    ))
}

fn option(entry: &Value, name: &'static str) -> Result<PulseSequence, GenerationError> {
    let raw = entry
        .get(name)
        .ok_or_else(|| GenerationError::Parse(format!("missing field `{name}`")))?;
    let raw: RawSequence = serde_json::from_value(raw.clone())
        .map_err(|e| GenerationError::Parse(format!("{name}: {e}")))?;
    PulseSequence::try_from(raw).map_err(|source| GenerationError::Malformed { option: name, source })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = rest.find('\n').map_or(rest, |i| &rest[i + 1..]);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
