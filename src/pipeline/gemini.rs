//! Gemini REST backend (`models/{model}:generateContent`).
//!
//! The document is sent as an `inlineData` part next to the prompt text. The
//! API key is passed in the `x-goog-api-key` header so it never appears in
//! URLs or request logs. Error bodies (`{"error": {"code", "message",
//! "status"}}`) are decoded into a [`ServiceFailure`] carrying both the HTTP
//! status and the gRPC-style status name for classification.

use crate::pipeline::encode::EncodedFile;
use crate::pipeline::llm::{ExtractionService, ServiceFailure};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    status: Option<String>,
}

/// Gemini client bound to one API key and model.
pub struct GeminiService {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: usize,
}

impl GeminiService {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().build()?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            temperature,
            max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ExtractionService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract_raw_text(&self, file: &EncodedFile, prompt: &str) -> Result<String, ServiceFailure> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: &file.mime_type,
                            data: &file.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_failure)?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(env) => match env.error.status {
                    Some(code) => format!("{}: {}", code, env.error.message),
                    None => env.error.message,
                },
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body.trim()),
            };
            return Err(ServiceFailure::new(Some(status.as_u16()), message));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceFailure::new(Some(status.as_u16()), format!("malformed response envelope: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(ServiceFailure::new(Some(status.as_u16()), format!("empty response: {reason}")));
        }

        debug!("gemini/{}: {} chars", self.model, text.len());
        Ok(text)
    }
}

fn transport_failure(e: reqwest::Error) -> ServiceFailure {
    if e.is_timeout() {
        ServiceFailure::timeout(e.to_string())
    } else {
        ServiceFailure::new(e.status().map(|s| s.as_u16()), e.to_string())
    }
}
