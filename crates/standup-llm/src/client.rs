// HTTP clients for the hosted OpenAI API and a local Ollama server.
//
// Both clients fetch the response body as text and hand it to small parsing
// helpers, so the JSON handling is testable without a live endpoint.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tracing::debug;

use standup_core::config::{OllamaConfig, OpenAiConfig};
use standup_core::standup::{AudioUpload, Transcription};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on a single OpenAI request (long recordings transcribe slowly).
const OPENAI_TIMEOUT: Duration = Duration::from_secs(300);

/// How much of an error body to keep in error messages.
const ERROR_BODY_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// OllamaClient
// ---------------------------------------------------------------------------

/// Client for a local Ollama server's generate and tags endpoints.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    /// Create a client for the server at `base_url` using `model`.
    pub fn new(base_url: &str, model: &str, temperature: f32, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Ollama HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        })
    }

    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.model,
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a single non-streaming completion and return the generated text.
    ///
    /// With `json` set, Ollama constrains the output to a JSON value.
    pub async fn generate(&self, prompt: &str, json: bool) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        if json {
            body["format"] = Value::String("json".into());
        }

        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, prompt_len = prompt.len(), "ollama generate");
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to reach Ollama at {url}"))?;
        let text = success_body(response, "Ollama generate").await?;

        parse_generate_response(&text)
            .ok_or_else(|| anyhow!("Ollama generate response had no `response` field"))
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to reach Ollama at {url}"))?;
        let text = success_body(response, "Ollama tags").await?;

        parse_model_names(&text).ok_or_else(|| anyhow!("Ollama tags response had no `models` list"))
    }
}

/// Whether `model` is among `installed`. A bare name matches any tag of it
/// (`llama3` matches `llama3:latest`).
pub fn model_available(installed: &[String], model: &str) -> bool {
    installed.iter().any(|name| {
        name == model
            || (!model.contains(':')
                && name
                    .strip_prefix(model)
                    .is_some_and(|rest| rest.starts_with(':')))
    })
}

// ---------------------------------------------------------------------------
// OpenAiClient
// ---------------------------------------------------------------------------

/// Client for the OpenAI chat completion and audio transcription endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    transcription_model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(OPENAI_TIMEOUT)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chat_model: config.chat_model.clone(),
            transcription_model: config.transcription_model.clone(),
            temperature: config.temperature,
        })
    }

    /// Send a single user message and return the first choice's content.
    pub async fn chat(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.chat_model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.chat_model, prompt_len = prompt.len(), "openai chat");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to reach OpenAI chat completions")?;
        let text = success_body(response, "OpenAI chat").await?;

        parse_chat_content(&text).ok_or_else(|| anyhow!("OpenAI chat response had no message content"))
    }

    /// Transcribe an in-memory recording with segment-level timestamps.
    pub async fn transcribe(&self, audio: &AudioUpload) -> Result<Transcription> {
        let mut part = reqwest::multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.filename.clone());
        if let Some(mime) = &audio.content_type {
            part = part
                .mime_str(mime)
                .with_context(|| format!("invalid audio content type `{mime}`"))?;
        }
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.transcription_model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!(
            model = %self.transcription_model,
            file = %audio.filename,
            bytes = audio.bytes.len(),
            "openai transcription"
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("failed to reach OpenAI audio transcriptions")?;
        let text = success_body(response, "OpenAI transcription").await?;

        parse_transcription(&text)
            .ok_or_else(|| anyhow!("OpenAI transcription response had no `text` field"))
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Read the body of a response, turning non-2xx statuses into errors that
/// carry the (truncated) body text.
async fn success_body(response: reqwest::Response, what: &str) -> Result<String> {
    let status = response.status();
    let text = response
        .text()
        .await
        .with_context(|| format!("failed to read {what} response body"))?;
    if !status.is_success() {
        bail!("{what} returned status {status}: {}", truncate(&text, ERROR_BODY_LIMIT));
    }
    Ok(text)
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Extract `response` from an Ollama generate body.
///
/// Expected shape: `{ "model": "...", "response": "...", "done": true }`
pub(crate) fn parse_generate_response(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("response")?.as_str().map(str::to_string)
}

/// Extract model names from an Ollama tags body.
///
/// Expected shape: `{ "models": [ { "name": "llama3:latest", ... } ] }`
pub(crate) fn parse_model_names(body: &str) -> Option<Vec<String>> {
    let v: Value = serde_json::from_str(body).ok()?;
    let models = v.get("models")?.as_array()?;
    Some(
        models
            .iter()
            .filter_map(|m| m.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
    )
}

/// Extract `choices[0].message.content` from a chat completion body.
pub(crate) fn parse_chat_content(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// Parse a verbose_json transcription body. Segments are optional.
pub(crate) fn parse_transcription(body: &str) -> Option<Transcription> {
    let transcription: Transcription = serde_json::from_str(body).ok()?;
    Some(Transcription {
        text: transcription.text.trim().to_string(),
        segments: transcription.segments,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
