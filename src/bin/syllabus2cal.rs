//! CLI binary for syllabus-cal.
//!
//! A thin shim over the library crate: maps flags to `ExtractionConfig`,
//! prints extracted events, and manages a local JSON event store.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use syllabus_cal::config::DEFAULT_MODEL;
use syllabus_cal::store::CalendarEventStore;
use syllabus_cal::{
    extract_batch, review, sync, write_ics, CalendarEvent, ExtractionConfig, ExtractionProgressCallback,
    JsonFileStore, ProgressCallback, RetryPolicy,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar for the batch plus a log line per file.
/// Files may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>2}/{len} files  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, index: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.reset_eta();
    }

    fn on_file_start(&self, index: usize, _total: usize, file_name: &str) {
        self.start_times.lock().unwrap().insert(index, Instant::now());
        self.bar.set_message(file_name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, event_count: usize) {
        self.bar.println(format!(
            "  {} File {:>2}/{:<2}  {:<10}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{event_count:>3} events")),
            dim(&self.elapsed(index)),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} File {:>2}/{:<2}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&self.elapsed(index)),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!("{} {} files processed", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} files processed  ({} failed)",
                if failed == total_files { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print events found in a syllabus
  syllabus2cal extract syllabus.pdf

  # Several documents at once, saved to the local calendar
  syllabus2cal extract syllabus.pdf schedule.png --save

  # Straight to an .ics file
  syllabus2cal extract syllabus.pdf --ics course.ics

  # Manage the local calendar
  syllabus2cal list
  syllabus2cal delete 6f1c…
  syllabus2cal export -o calendar.ics
  syllabus2cal clear --yes

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default backend)
  SYLLABUS_CAL_PROVIDER   Use an edgequake-llm provider instead (openai, anthropic, ollama, …)
  SYLLABUS_CAL_MODEL      Model ID
  SYLLABUS_CAL_STORE      Directory of the local event store
  SYLLABUS_CAL_USER       User id within the store
  RUST_LOG                Log filter (overrides --verbose/--quiet)
"#;

/// Extract calendar events from course documents with a generative model.
#[derive(Parser, Debug)]
#[command(
    name = "syllabus2cal",
    version,
    about = "Extract calendar events from syllabi and course documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory of the local event store.
    #[arg(long, global = true, env = "SYLLABUS_CAL_STORE", default_value = "syllabus-cal-data")]
    store_dir: PathBuf,

    /// User whose calendar is read and written.
    #[arg(long, global = true, env = "SYLLABUS_CAL_USER", default_value = "default")]
    user: String,

    /// Attempts per store operation.
    #[arg(long, global = true, env = "SYLLABUS_CAL_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Initial delay between store retries in milliseconds, doubled per attempt.
    #[arg(long, global = true, env = "SYLLABUS_CAL_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SYLLABUS_CAL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SYLLABUS_CAL_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract events from PDFs or images.
    Extract(ExtractArgs),
    /// List saved events.
    List {
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Delete one saved event.
    Delete {
        /// Event id as shown by `list`.
        id: String,
    },
    /// Delete every saved event of the user.
    Clear {
        /// Required confirmation.
        #[arg(long)]
        yes: bool,
    },
    /// Write saved events to an .ics file.
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// PDF or image files (paths or file:// URIs).
    #[arg(required = true)]
    files: Vec<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// edgequake-llm provider name; omit for Gemini.
    #[arg(long, env = "SYLLABUS_CAL_PROVIDER")]
    provider: Option<String>,

    /// Model ID.
    #[arg(long, env = "SYLLABUS_CAL_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Hard timeout per document, in seconds.
    #[arg(long, env = "SYLLABUS_CAL_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Bytes read per file; larger files are truncated.
    #[arg(long, env = "SYLLABUS_CAL_MAX_FILE_BYTES", default_value_t = 1024 * 1024)]
    max_file_bytes: u64,

    /// Documents processed concurrently.
    #[arg(short, long, env = "SYLLABUS_CAL_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Path to a text file replacing the built-in prompt.
    #[arg(long, env = "SYLLABUS_CAL_PROMPT")]
    prompt: Option<PathBuf>,

    /// Save confirmed events to the local store.
    #[arg(long)]
    save: bool,

    /// Also write the extracted events to this .ics file.
    #[arg(long)]
    ics: Option<PathBuf>,

    /// Output the batch as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "SYLLABUS_CAL_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; keep library
    // INFO logs out of its way.
    let show_progress = match &cli.command {
        Command::Extract(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let store = JsonFileStore::new(&cli.store_dir);
    let policy = store_retry_policy(&cli)?;

    match &cli.command {
        Command::Extract(args) => run_extract(&cli, args, show_progress, &store, &policy).await,
        Command::List { json } => {
            let stored = store.list(&cli.user).await.context("Failed to read event store")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&stored).context("Failed to serialise events")?);
            } else {
                let events: Vec<_> = stored.into_iter().map(|s| s.event).collect();
                print_events(&events, true);
            }
            Ok(())
        }
        Command::Delete { id } => {
            let removed = sync::delete_event(&store, &cli.user, id, &policy)
                .await
                .context("Delete failed")?;
            if !cli.quiet {
                if removed {
                    eprintln!("{} deleted {}", green("✔"), id);
                } else {
                    eprintln!("{} no event with id {}", cyan("⚠"), id);
                }
            }
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                anyhow::bail!("Refusing to clear the calendar of '{}' without --yes", cli.user);
            }
            let removed = sync::clear_calendar(&store, &cli.user, &policy)
                .await
                .context("Clear failed")?;
            if !cli.quiet {
                eprintln!("{} removed {} events", green("✔"), removed);
            }
            Ok(())
        }
        Command::Export { output } => {
            let stored = store.list(&cli.user).await.context("Failed to read event store")?;
            let events: Vec<_> = stored.into_iter().map(|s| s.event).collect();
            write_ics(output, &events)
                .await
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            if !cli.quiet {
                eprintln!("{} {} events → {}", green("✔"), events.len(), bold(&output.display().to_string()));
            }
            Ok(())
        }
    }
}

async fn run_extract(
    cli: &Cli,
    args: &ExtractArgs,
    show_progress: bool,
    store: &JsonFileStore,
    policy: &RetryPolicy,
) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress).await?;

    let paths: Vec<PathBuf> = args
        .files
        .iter()
        .map(|f| syllabus_cal::pipeline::input::resolve_path(f))
        .collect();
    let output = extract_batch(&paths, &config).await.context("Extraction failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output).context("Failed to serialise output")?);
    } else {
        print_events(&output.events, false);
    }

    if !cli.quiet && !show_progress {
        for failed in output.failures() {
            if let Some(ref e) = failed.error {
                eprintln!("{} {}: {}", red("✗"), failed.path.display(), e.user_message());
            }
        }
    }
    if !cli.quiet {
        for file in output.files.iter().filter(|f| f.truncated) {
            eprintln!("{} {} was truncated before upload", cyan("⚠"), file.path.display());
        }
        eprintln!(
            "   {} events  /  {} rejected candidates  /  {}ms",
            bold(&output.stats.total_events.to_string()),
            dim(&output.stats.rejected_candidates.to_string()),
            output.stats.duration_ms,
        );
    }

    if let Some(ref path) = args.ics {
        write_ics(path, &output.events)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{} wrote {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if args.save {
        let mut batch = review::pending(output.events);
        for pending in batch.iter_mut().filter(|p| p.event.date.is_none()) {
            pending.selected = false;
            if !cli.quiet {
                eprintln!("{} skipping '{}': no date", cyan("⚠"), pending.event.title);
            }
        }
        let confirmed = review::confirm(batch).context("Events could not be confirmed")?;
        let report = sync::sync_events(store, &cli.user, &confirmed, policy).await;
        if report.is_success() {
            if !cli.quiet {
                eprintln!(
                    "{} saved {} events for {}",
                    green("✔"),
                    report.saved.len(),
                    bold(&cli.user)
                );
            }
        } else {
            for (id, err) in &report.failed {
                eprintln!("{} {}: {}", red("✗"), id, err);
            }
            anyhow::bail!(
                "Sync failed for {}/{} events; run the command again to retry",
                report.failed.len(),
                confirmed.len()
            );
        }
    }

    Ok(())
}

/// Retry settings for store operations, validated through the library config.
fn store_retry_policy(cli: &Cli) -> Result<RetryPolicy> {
    let config = ExtractionConfig::builder()
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .build()
        .context("Invalid retry settings")?;
    Ok(config.retry_policy())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(args: &ExtractArgs, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .model(args.model.as_str())
        .timeout_secs(args.timeout)
        .max_file_bytes(args.max_file_bytes)
        .concurrency(args.concurrency);

    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key.as_str());
    }
    if let Some(ref name) = args.provider {
        builder = builder.provider_name(name.as_str());
    }
    if let Some(ref path) = args.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_events(events: &[CalendarEvent], with_ids: bool) {
    if events.is_empty() {
        println!("{}", dim("No events."));
        return;
    }
    for e in events {
        let date = e
            .date
            .map(syllabus_cal::dates::canonical)
            .unwrap_or_else(|| "????-??-??".to_string());
        let mut line = format!(
            "{}  {:<7}  {:<12}  {:<6}  {}",
            bold(&date),
            e.time.as_deref().unwrap_or(""),
            e.event_type.as_str(),
            e.priority.as_str(),
            e.title
        );
        if let Some(ref loc) = e.location {
            line.push_str(&format!("  {}", dim(&format!("@ {loc}"))));
        }
        if let Some(ref code) = e.course_code {
            line.push_str(&format!("  {}", cyan(&format!("[{code}]"))));
        }
        if with_ids {
            line.push_str(&format!("  {}", dim(&e.id)));
        }
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_flags_reach_store_policy() {
        let cli = Cli::parse_from(["syllabus2cal", "--max-retries", "5", "--retry-backoff-ms", "20", "list"]);
        let policy = store_retry_policy(&cli).unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_backoff_ms, 20);
    }

    #[test]
    fn zero_retries_is_rejected() {
        let cli = Cli::parse_from(["syllabus2cal", "--max-retries", "0", "list"]);
        assert!(store_retry_policy(&cli).is_err());
    }
}
