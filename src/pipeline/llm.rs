//! Extraction-service boundary: submit a document + prompt, get text back.
//!
//! Backends implement [`ExtractionService`] and report failures as a raw
//! [`ServiceFailure`] (HTTP status if any, plus the provider's message).
//! [`ExtractionClient`] wraps a backend, enforces the hard timeout and
//! classifies failures into the closed [`ExtractionError`] taxonomy, so no
//! caller ever string-matches provider errors.
//!
//! There are no retries here: a failed extraction is reported straight away
//! (the user can re-upload). Retries are reserved for persistence, see
//! [`crate::sync`].

use crate::error::ExtractionError;
use crate::pipeline::encode::EncodedFile;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An unclassified failure reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    /// HTTP status, when the backend talks HTTP and got a response.
    pub status: Option<u16>,
    pub message: String,
    /// The backend's own transport timeout fired.
    pub timed_out: bool,
}

impl ServiceFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            timed_out: true,
        }
    }
}

/// A generative-AI backend that reads a document and returns free text.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Submit one document with its instruction text.
    async fn extract_raw_text(&self, file: &EncodedFile, prompt: &str) -> Result<String, ServiceFailure>;
}

/// Timeout-enforcing, error-classifying wrapper around a backend.
#[derive(Clone)]
pub struct ExtractionClient {
    service: Arc<dyn ExtractionService>,
    timeout: Duration,
}

impl ExtractionClient {
    pub fn new(service: Arc<dyn ExtractionService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Submit a document. A single round trip bounded by the timeout; on
    /// timeout the in-flight request is dropped.
    pub async fn submit(&self, file: &EncodedFile, prompt: &str) -> Result<String, ExtractionError> {
        let start = Instant::now();
        let call = self.service.extract_raw_text(file, prompt);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => {
                debug!(
                    "{}: {} chars from {} in {:?}",
                    self.service.name(),
                    text.len(),
                    file.file_name,
                    start.elapsed()
                );
                Ok(text)
            }
            Ok(Err(failure)) => {
                let err = classify(&failure, self.timeout);
                warn!("{}: extraction of {} failed: {}", self.service.name(), file.file_name, err);
                Err(err)
            }
            Err(_) => {
                warn!(
                    "{}: extraction of {} abandoned after {:?}",
                    self.service.name(),
                    file.file_name,
                    self.timeout
                );
                Err(ExtractionError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Map a raw backend failure onto the closed taxonomy.
///
/// Status codes win over message text; message patterns cover backends that
/// only surface strings (edgequake-llm errors, gRPC-style status names).
pub fn classify(failure: &ServiceFailure, timeout: Duration) -> ExtractionError {
    let detail = failure.message.clone();
    let msg = failure.message.to_lowercase();

    if failure.timed_out
        || matches!(failure.status, Some(408) | Some(504))
        || msg.contains("timed out")
        || msg.contains("deadline_exceeded")
        || msg.contains("deadline exceeded")
    {
        return ExtractionError::Timeout {
            secs: timeout.as_secs(),
        };
    }

    if failure.status == Some(429)
        || msg.contains("quota")
        || msg.contains("resource_exhausted")
        || msg.contains("rate limit")
        || msg.contains("too many requests")
    {
        return ExtractionError::QuotaExceeded { detail };
    }

    // Gemini reports bad keys as INVALID_ARGUMENT too; those are not format problems.
    let format_hint = !msg.contains("api key")
        && (msg.contains("invalid_argument")
            || msg.contains("invalid argument")
            || msg.contains("mime")
            || msg.contains("unsupported"));
    if failure.status == Some(415) || (matches!(failure.status, None | Some(400)) && format_hint) {
        return ExtractionError::UnsupportedFormat { detail };
    }

    ExtractionError::Unknown { detail }
}

/// Backend over any `edgequake-llm` provider (OpenAI, Anthropic, Ollama, …).
///
/// The document travels as an image attachment on a single user message whose
/// text is the prompt.
pub struct ProviderService {
    provider: Arc<dyn LLMProvider>,
    name: String,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderService {
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            name: name.into(),
            temperature,
            max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ExtractionService for ProviderService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract_raw_text(&self, file: &EncodedFile, prompt: &str) -> Result<String, ServiceFailure> {
        let attachment = ImageData::new(file.data.clone(), file.mime_type.as_str());
        let messages = vec![ChatMessage::user_with_images(prompt, vec![attachment])];
        let options = self.options();

        self.provider
            .chat(&messages, Some(&options))
            .await
            .map(|response| response.content)
            .map_err(|e| ServiceFailure::new(None, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        reply: Result<String, ServiceFailure>,
        delay: Duration,
    }

    #[async_trait]
    impl ExtractionService for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn extract_raw_text(&self, _file: &EncodedFile, _prompt: &str) -> Result<String, ServiceFailure> {
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn file() -> EncodedFile {
        EncodedFile {
            data: "JVBERg==".into(),
            mime_type: "application/pdf".into(),
            file_name: "a.pdf".into(),
            original_len: 4,
            truncated: false,
        }
    }

    fn client(reply: Result<String, ServiceFailure>, delay_ms: u64, timeout_ms: u64) -> ExtractionClient {
        ExtractionClient::new(
            Arc::new(Scripted {
                reply,
                delay: Duration::from_millis(delay_ms),
            }),
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn returns_text_on_success() {
        let c = client(Ok("{\"events\":[]}".into()), 0, 1000);
        assert_eq!(c.submit(&file(), "p").await.unwrap(), "{\"events\":[]}");
    }

    #[tokio::test]
    async fn hard_timeout_fires() {
        let c = client(Ok("late".into()), 500, 20);
        let err = c.submit(&file(), "p").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let c = client(Err(ServiceFailure::new(Some(429), "RESOURCE_EXHAUSTED")), 0, 1000);
        let err = c.submit(&file(), "p").await.unwrap_err();
        assert!(matches!(err, ExtractionError::QuotaExceeded { .. }));
    }

    #[test]
    fn classify_quota_by_message() {
        let f = ServiceFailure::new(None, "You exceeded your current quota");
        assert!(matches!(classify(&f, Duration::from_secs(30)), ExtractionError::QuotaExceeded { .. }));
    }

    #[test]
    fn classify_unsupported_format() {
        let f = ServiceFailure::new(Some(400), "INVALID_ARGUMENT: Unsupported MIME type: text/plain");
        assert!(matches!(
            classify(&f, Duration::from_secs(30)),
            ExtractionError::UnsupportedFormat { .. }
        ));
        let f = ServiceFailure::new(Some(415), "bad media");
        assert!(matches!(
            classify(&f, Duration::from_secs(30)),
            ExtractionError::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn classify_transport_timeout() {
        let f = ServiceFailure::timeout("operation timed out");
        assert_eq!(
            classify(&f, Duration::from_secs(30)),
            ExtractionError::Timeout { secs: 30 }
        );
        let f = ServiceFailure::new(Some(504), "DEADLINE_EXCEEDED");
        assert!(matches!(classify(&f, Duration::from_secs(30)), ExtractionError::Timeout { .. }));
    }

    #[test]
    fn classify_other_bad_request_as_unknown() {
        let f = ServiceFailure::new(Some(400), "INVALID_ARGUMENT: API key not valid");
        assert!(matches!(classify(&f, Duration::from_secs(30)), ExtractionError::Unknown { .. }));
        let f = ServiceFailure::new(Some(500), "internal");
        assert!(matches!(classify(&f, Duration::from_secs(30)), ExtractionError::Unknown { .. }));
    }
}
