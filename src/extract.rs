//! Extraction entry points: documents in, pending calendar events out.
//!
//! Each file runs through its own pipeline (prepare → encode → prompt →
//! submit → parse → normalize). A batch fans those pipelines out
//! concurrently, bounded by [`ExtractionConfig::concurrency`]. A failing
//! file never cancels its siblings; it contributes no events and carries its
//! [`FileError`] on the [`FileResult`]. Results are concatenated in
//! submission order regardless of completion order.

use crate::config::ExtractionConfig;
use crate::error::{FileError, SyllabusError};
use crate::output::{BatchOutput, BatchStats, FileResult};
use crate::pipeline::encode::{self, EncodedFile};
use crate::pipeline::gemini::GeminiService;
use crate::pipeline::llm::{ExtractionClient, ExtractionService, ProviderService};
use crate::pipeline::normalize::{self, Normalized};
use crate::pipeline::{input, parse};
use crate::prompts;
use edgequake_llm::ProviderFactory;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extract events from one document.
///
/// # Errors
/// Returns [`SyllabusError::FileFailed`] when the file cannot be read or the
/// extraction service fails, and configuration errors when no backend can be
/// built. A document with no recognisable events is a success with an empty
/// event list.
///
/// # Example
/// ```rust,no_run
/// use syllabus_cal::{extract, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::builder()
///     .api_key(std::env::var("GEMINI_API_KEY")?)
///     .build()?;
/// let result = extract("syllabus.pdf", &config).await?;
/// for event in &result.events {
///     println!("{:?} {}", event.date, event.title);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract(path: impl AsRef<Path>, config: &ExtractionConfig) -> Result<FileResult, SyllabusError> {
    let client = build_client(config)?;
    let mut result = extract_file(&client, 1, 1, path.as_ref(), config).await;
    match result.error.take() {
        Some(e) => Err(SyllabusError::FileFailed(e)),
        None => Ok(result),
    }
}

/// Extract events from several documents concurrently.
///
/// Only configuration problems are fatal; per-file failures are reported on
/// [`BatchOutput::files`] and counted in [`BatchStats::failed_files`].
pub async fn extract_batch<P: AsRef<Path>>(
    paths: &[P],
    config: &ExtractionConfig,
) -> Result<BatchOutput, SyllabusError> {
    let start = Instant::now();
    let client = build_client(config)?;
    let total = paths.len();
    info!("Extracting {} file(s) via {}", total, client.service_name());

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let files: Vec<FileResult> = stream::iter(paths.iter().enumerate().map(|(i, path)| {
        let client = client.clone();
        let path = path.as_ref().to_path_buf();
        async move { extract_file(&client, i + 1, total, &path, config).await }
    }))
    .buffered(config.concurrency.max(1))
    .collect()
    .await;

    let succeeded = files.iter().filter(|f| f.is_ok()).count();
    let events: Vec<_> = files.iter().flat_map(|f| f.events.iter().cloned()).collect();
    let stats = BatchStats {
        total_files: total,
        succeeded_files: succeeded,
        failed_files: total - succeeded,
        total_events: events.len(),
        rejected_candidates: files.iter().map(|f| f.rejected_candidates).sum(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {} events from {}/{} files in {}ms",
        stats.total_events, succeeded, total, stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }

    Ok(BatchOutput { events, files, stats })
}

/// Extract events from a document held in memory.
///
/// `file_name` supplies the extension used for MIME detection. The bytes are
/// staged in a managed temp file that is removed on return.
pub async fn extract_bytes(
    bytes: &[u8],
    file_name: &str,
    config: &ExtractionConfig,
) -> Result<FileResult, SyllabusError> {
    let suffix = Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut tmp = tempfile::Builder::new()
        .prefix("syllabus-cal-")
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| SyllabusError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| SyllabusError::Internal(format!("tempfile write: {e}")))?;

    // Staged in the temp dir, so the input step would copy it again; encode
    // straight from the managed file instead.
    let client = build_client(config)?;
    let start = Instant::now();
    let source = PathBuf::from(file_name);
    let outcome = match encode::encode_file(tmp.path(), &source, config.max_file_bytes).await {
        Ok(encoded) => run_encoded(&client, &encoded, config).await.map(|n| (n, encoded.truncated)),
        Err(e) => Err(e.into()),
    };
    let mut result = into_file_result(1, source, outcome, start);
    match result.error.take() {
        Some(e) => Err(SyllabusError::FileFailed(e)),
        None => Ok(result),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn build_client(config: &ExtractionConfig) -> Result<ExtractionClient, SyllabusError> {
    let service = resolve_service(config)?;
    Ok(ExtractionClient::new(service, Duration::from_secs(config.timeout_secs)))
}

/// Pick the extraction backend, from most to least specific:
///
/// 1. a pre-built [`ExtractionService`] (`config.service`);
/// 2. a pre-built `edgequake-llm` provider (`config.provider`);
/// 3. a named non-Gemini provider, created through [`ProviderFactory`],
///    which reads that provider's own API key variable;
/// 4. the built-in Gemini REST backend with `config.api_key`.
pub fn resolve_service(config: &ExtractionConfig) -> Result<Arc<dyn ExtractionService>, SyllabusError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(ProviderService::new(
            Arc::clone(provider),
            config.provider_name.as_deref().unwrap_or("provider"),
            config.temperature,
            config.max_tokens,
        )));
    }

    if let Some(name) = config
        .provider_name
        .as_deref()
        .filter(|n| !n.eq_ignore_ascii_case("gemini"))
    {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            SyllabusError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(Arc::new(ProviderService::new(
            provider,
            name,
            config.temperature,
            config.max_tokens,
        )));
    }

    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| SyllabusError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: "Set GEMINI_API_KEY or pass --api-key.".to_string(),
        })?;

    let service = GeminiService::new(
        api_key,
        config.model.as_str(),
        config.api_base_url.as_str(),
        config.temperature,
        config.max_tokens,
    )
    .map_err(|e| SyllabusError::Internal(format!("HTTP client: {e}")))?;
    Ok(Arc::new(service))
}

/// One file's pipeline, with progress callbacks. Never fails; errors are
/// recorded on the result.
async fn extract_file(
    client: &ExtractionClient,
    index: usize,
    total: usize,
    path: &Path,
    config: &ExtractionConfig,
) -> FileResult {
    let start = Instant::now();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!("[{}/{}] {}", index, total, file_name);
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(index, total, &file_name);
    }

    let outcome = run_file(client, path, config).await;
    let result = into_file_result(index, path.to_path_buf(), outcome, start);

    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_file_complete(index, total, result.events.len()),
            Some(e) => cb.on_file_error(index, total, &e.user_message()),
        }
    }
    result
}

async fn run_file(
    client: &ExtractionClient,
    path: &Path,
    config: &ExtractionConfig,
) -> Result<(Normalized, bool), FileError> {
    let prepared = input::prepare_input(path, &config.scratch_dir).await?;
    let encoded = encode::encode_file(prepared.path(), prepared.source(), config.max_file_bytes).await?;
    let normalized = run_encoded(client, &encoded, config).await?;
    Ok((normalized, encoded.truncated))
}

async fn run_encoded(
    client: &ExtractionClient,
    encoded: &EncodedFile,
    config: &ExtractionConfig,
) -> Result<Normalized, FileError> {
    let prompt = config
        .system_prompt
        .clone()
        .unwrap_or_else(|| prompts::build_prompt(&encoded.mime_type));

    let raw = client.submit(encoded, &prompt).await?;
    let parsed = parse::parse_response(&raw);
    if parsed.events.is_empty() {
        debug!("{}: no candidate events in response", encoded.file_name);
    }
    Ok(normalize::normalize(&parsed.events, &parsed.metadata))
}

fn into_file_result(
    index: usize,
    path: PathBuf,
    outcome: Result<(Normalized, bool), FileError>,
    start: Instant,
) -> FileResult {
    let duration_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok((normalized, truncated)) => {
            info!(
                "{}: {} events ({} rejected) in {}ms",
                path.display(),
                normalized.events.len(),
                normalized.rejected,
                duration_ms
            );
            FileResult {
                index,
                path,
                events: normalized.events,
                document: normalized.metadata,
                rejected_candidates: normalized.rejected,
                truncated,
                duration_ms,
                error: None,
            }
        }
        Err(e) => {
            warn!("{}: {}", path.display(), e);
            FileResult {
                index,
                path,
                events: Vec::new(),
                document: Default::default(),
                rejected_candidates: 0,
                truncated: false,
                duration_ms,
                error: Some(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FileAccessError;

    #[test]
    fn gemini_without_key_is_not_configured() {
        let config = ExtractionConfig::default();
        match resolve_service(&config) {
            Err(SyllabusError::ProviderNotConfigured { provider, .. }) => assert_eq!(provider, "gemini"),
            other => panic!("expected ProviderNotConfigured, got {:?}", other.err()),
        }
    }

    #[test]
    fn gemini_with_key_resolves() {
        let config = ExtractionConfig::builder().api_key("k").build().unwrap();
        assert_eq!(resolve_service(&config).unwrap().name(), "gemini");
    }

    #[test]
    fn explicit_gemini_name_uses_rest_backend() {
        let config = ExtractionConfig::builder()
            .provider_name("Gemini")
            .api_key("k")
            .build()
            .unwrap();
        assert_eq!(resolve_service(&config).unwrap().name(), "gemini");
    }

    #[tokio::test]
    async fn missing_file_fails_single_entry_point() {
        let config = ExtractionConfig::builder().api_key("k").build().unwrap();
        let err = extract("/no/such/syllabus.pdf", &config).await.unwrap_err();
        assert!(matches!(
            err,
            SyllabusError::FileFailed(FileError::Access(FileAccessError::NotFound { .. }))
        ));
    }
}
