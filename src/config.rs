//! Configuration types for document-to-calendar extraction.
//!
//! All behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. The extraction backend is part of the config:
//! credentials are supplied here at construction time and never read from
//! process-wide state by the library.

use crate::error::SyllabusError;
use crate::pipeline::llm::ExtractionService;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default Gemini REST endpoint root.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use syllabus_cal::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_key("test-key")
///     .timeout_secs(45)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.timeout_secs, 45);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Pre-constructed extraction backend. Takes precedence over everything
    /// else; used by tests and by hosts with their own transport.
    pub service: Option<Arc<dyn ExtractionService>>,

    /// Pre-constructed `edgequake-llm` provider. Takes precedence over
    /// `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Named `edgequake-llm` provider ("openai", "anthropic", "ollama", …).
    /// `None` or `"gemini"` selects the built-in Gemini REST backend.
    pub provider_name: Option<String>,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Gemini API key.
    pub api_key: Option<String>,

    /// Gemini endpoint root. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub api_base_url: String,

    /// Hard upper bound on one extraction call, in seconds. Default: 30.
    ///
    /// When it fires the request is abandoned and the file fails with
    /// [`crate::error::ExtractionError::Timeout`].
    pub timeout_secs: u64,

    /// Maximum number of bytes read from an uploaded file. Default: 1 MiB.
    ///
    /// Larger files are truncated to this many bytes before encoding so the
    /// request stays within transport limits. This is lossy; truncation is
    /// logged at `warn` and reported on the encoded file.
    pub max_file_bytes: u64,

    /// Number of files processed concurrently in a batch. Default: 4.
    pub concurrency: usize,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum output tokens per extraction. Default: 8192.
    pub max_tokens: usize,

    /// Attempts per store operation during sync. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Directory receiving durable copies of files that live in temporary or
    /// cache directories. Default: `<system temp>/syllabus-cal-scratch`.
    pub scratch_dir: PathBuf,

    /// Custom instruction text. If None, uses [`crate::prompts::build_prompt`].
    pub system_prompt: Option<String>,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            service: None,
            provider: None,
            provider_name: None,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_secs: 30,
            max_file_bytes: 1024 * 1024,
            concurrency: 4,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            scratch_dir: std::env::temp_dir().join("syllabus-cal-scratch"),
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("service", &self.service.as_ref().map(|s| s.name().to_string()))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy for store operations derived from this config.
    pub fn retry_policy(&self) -> crate::sync::RetryPolicy {
        crate::sync::RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_backoff_ms: self.retry_backoff_ms,
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn service(mut self, service: Arc<dyn ExtractionService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, SyllabusError> {
        let c = &self.config;
        if c.timeout_secs == 0 {
            return Err(SyllabusError::InvalidConfig(
                "Timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_file_bytes == 0 {
            return Err(SyllabusError::InvalidConfig(
                "max_file_bytes must be ≥ 1".into(),
            ));
        }
        if c.max_retries == 0 {
            return Err(SyllabusError::InvalidConfig(
                "max_retries must be ≥ 1 (it counts attempts)".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(SyllabusError::InvalidConfig("Model must not be empty".into()));
        }
        Ok(self.config)
    }
}
