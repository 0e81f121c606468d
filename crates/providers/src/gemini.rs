use std::sync::LazyLock;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use shared::chat::ChatTurn;
use shared::error::GatewayError;
use shared::messages::ChatContext;
use shared::settings::Settings;

use crate::TextGenerator;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const SYSTEM_PREAMBLE: &str = "You are a helpful assistant.";

// No client-level timeout: the transport's own behavior applies.
static SHARED_HTTP: LazyLock<Client> = LazyLock::new(Client::new);

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

impl GenerateRequest {
    /// The endpoint takes the whole prompt as one text part.
    fn single_text(text: String) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text }],
            }],
        }
    }
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Client for the generation endpoint. Stateless apart from the base URL;
/// credentials and model come from the settings passed to each call.
pub struct GeminiGateway {
    base_url: String,
}

impl Default for GeminiGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiGateway {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the gateway at a different host (tests, proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn validate(settings: &Settings) -> Result<(), GatewayError> {
        if settings.api_key.trim().is_empty() {
            return Err(GatewayError::validation("API key is not configured"));
        }
        if settings.selected_model.trim().is_empty() {
            return Err(GatewayError::validation("no model selected"));
        }
        Ok(())
    }

    async fn request_text(
        &self,
        settings: &Settings,
        prompt: String,
    ) -> Result<String, GatewayError> {
        Self::validate(settings)?;

        let url = format!(
            "{}/v1/models/{}:generateContent?key={}",
            self.base_url, settings.selected_model, settings.api_key
        );
        let body = GenerateRequest::single_text(prompt);
        let resp = SHARED_HTTP
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&raw)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("API request failed ({status})"));
            return Err(GatewayError::protocol(message));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::malformed(e.to_string()))?;
        extract_text(body)
    }
}

#[async_trait]
impl TextGenerator for GeminiGateway {
    async fn generate(
        &self,
        settings: &Settings,
        instruction: &str,
        input_text: &str,
    ) -> Result<String, GatewayError> {
        self.request_text(settings, generate_prompt(instruction, input_text))
            .await
    }

    async fn converse(
        &self,
        settings: &Settings,
        history: &[ChatTurn],
        new_message: &str,
        context: &ChatContext,
    ) -> Result<String, GatewayError> {
        self.request_text(
            settings,
            conversation_prompt(history, new_message, context),
        )
        .await
    }
}

fn generate_prompt(instruction: &str, input_text: &str) -> String {
    format!("{instruction}\n\nInput: {input_text}")
}

/// Flatten the conversation into the endpoint's single text payload:
/// preamble, optional original selection, optional prior response, each
/// history turn as `role: content`, then the new user message. Empty parts
/// are skipped; parts are joined with blank lines.
fn conversation_prompt(
    history: &[ChatTurn],
    new_message: &str,
    context: &ChatContext,
) -> String {
    let mut parts: Vec<String> = vec![SYSTEM_PREAMBLE.to_string()];
    if let Some(text) = nonblank(&context.original_text) {
        parts.push(format!("Original text: \"{text}\""));
    }
    if let Some(prior) = nonblank(&context.prior_response) {
        parts.push(format!("Previous response: {prior}"));
    }
    for turn in history {
        parts.push(format!("{}: {}", turn.role.as_str(), turn.content));
    }
    parts.push(format!("user: {new_message}"));
    parts.join("\n\n")
}

fn nonblank(part: &Option<String>) -> Option<&str> {
    part.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn extract_text(body: GenerateResponse) -> Result<String, GatewayError> {
    body.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| GatewayError::malformed("no generated text in candidates"))
}
