//! CLI binary for edgequake-page2captions.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `CaptionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_page2captions::{
    caption_page, caption_page_to_file, CancelToken, CaptionConfig, CaptionProgressCallback,
    PageOutcome, PipelineReport, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar driven by the pipeline's progress
/// fraction, plus one log line per captioned or failed image.
struct CliProgressCallback {
    bar: ProgressBar,
    warnings: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us how many candidates there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Fetching page…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            warnings: AtomicUsize::new(0),
        })
    }

    /// Remove the bar from the terminal without a summary line.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Captioning");
        self.bar.reset_eta();
    }
}

impl CaptionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_candidates: usize) {
        self.activate_bar(total_candidates);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_candidates} images…"))
        ));
    }

    fn on_item_captioned(&self, index: usize, total: usize, url: &str, caption: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index + 1,
            total,
            truncate(caption, 60),
            dim(&truncate(url, 60)),
        ));
    }

    fn on_item_warning(&self, index: usize, total: usize, _url: String, message: String) {
        self.warnings.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&truncate(&message, 100)),
        ));
    }

    fn on_progress(&self, _fraction: f64, index: usize, _total: usize) {
        self.bar.set_position(index as u64 + 1);
    }

    fn on_run_complete(&self, total_candidates: usize, processed: usize) {
        self.bar.finish_and_clear();
        let warnings = self.warnings.load(Ordering::SeqCst);

        if warnings == 0 {
            eprintln!(
                "{} {} of {} images captioned",
                green("✔"),
                bold(&processed.to_string()),
                total_candidates
            );
        } else {
            eprintln!(
                "{} {} of {} images captioned  ({} failed)",
                if processed == 0 { red("✘") } else { cyan("⚠") },
                bold(&processed.to_string()),
                total_candidates,
                red(&warnings.to_string()),
            );
        }
    }
}

/// Shorten `s` to at most `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}\u{2026}")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Caption a page (stdout)
  page2captions https://example.com

  # Write captions.txt
  page2captions https://example.com -o captions.txt

  # Four images in flight, output order unchanged
  page2captions --concurrency 4 https://example.com

  # Use a specific model
  page2captions --model gpt-4.1-mini --provider openai https://example.com

  # JSON report with warnings and counters
  page2captions --json https://example.com > report.json

FILTERS:
  Images whose src is missing, not http(s), or contains "svg" / "1x1" are
  dropped before download. Images smaller than --min-area pixels (default
  400, i.e. 20x20) are skipped after decoding.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. edgequake_page2captions=debug)
"#;

/// Caption the images of a web page using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "page2captions",
    version,
    about = "Caption the images of a web page using Vision LLMs",
    long_about = "Fetch a web page, download every meaningful <img> it references, and \
describe each one with a Vision Language Model. Supports OpenAI, Anthropic, Google Gemini, \
Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTTP/HTTPS URL of the page.
    url: String,

    /// Write captions to this file instead of stdout.
    #[arg(short, long, env = "PAGE2CAPTIONS_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Images processed concurrently (output order is preserved).
    #[arg(short, long, env = "PAGE2CAPTIONS_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Minimum width × height, in pixels, for an image to be captioned.
    #[arg(long, env = "PAGE2CAPTIONS_MIN_AREA", default_value_t = 400)]
    min_area: u64,

    /// Per-image download timeout in seconds.
    #[arg(long, env = "PAGE2CAPTIONS_IMAGE_TIMEOUT", default_value_t = 10)]
    image_timeout: u64,

    /// Page download timeout in seconds.
    #[arg(long, env = "PAGE2CAPTIONS_PAGE_TIMEOUT", default_value_t = 10)]
    page_timeout: u64,

    /// Longest edge, in pixels, of images sent to the model (min 100).
    #[arg(long, env = "PAGE2CAPTIONS_MAX_IMAGE_EDGE", default_value_t = 1024)]
    max_image_edge: u32,

    /// Per-image captioning timeout in seconds.
    #[arg(long, env = "PAGE2CAPTIONS_CAPTION_TIMEOUT", default_value_t = 60)]
    caption_timeout: u64,

    /// Max LLM output tokens per caption.
    #[arg(long, env = "PAGE2CAPTIONS_MAX_TOKENS", default_value_t = 16)]
    max_tokens: usize,

    /// Retries per image on LLM failure.
    #[arg(long, env = "PAGE2CAPTIONS_RETRIES", default_value_t = 0)]
    retries: u32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PAGE2CAPTIONS_PROMPT")]
    prompt: Option<PathBuf>,

    /// Output the structured report as JSON instead of caption text.
    #[arg(long, env = "PAGE2CAPTIONS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAGE2CAPTIONS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGE2CAPTIONS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGE2CAPTIONS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs; per-image warnings
    // are printed by the callback instead.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ctrl-C stops the run between images ─────────────────────────────
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    // The spinner starts before the page is fetched; every exit that skips
    // `on_run_complete` must clear it.
    let cli_progress = show_progress.then(CliProgressCallback::new_dynamic);
    let clear_progress = || {
        if let Some(ref progress) = cli_progress {
            progress.clear();
        }
    };
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn CaptionProgressCallback>);

    let config = build_config(&cli, progress_cb, cancel)
        .await
        .inspect_err(|_| clear_progress())?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = if let Some(ref output_path) = cli.output {
        caption_page_to_file(&cli.url, output_path, &config).await
    } else {
        caption_page(&cli.url, &config).await
    };
    let outcome = result
        .inspect_err(|_| clear_progress())
        .context("Captioning failed")?;

    let report = match outcome {
        PageOutcome::NoImagesFound => {
            clear_progress();
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&PageOutcome::NoImagesFound)
                        .context("Failed to serialise output")?
                );
            }
            if !cli.quiet {
                eprintln!("{} No images found on {}", yellow("⚠"), cli.url);
            }
            return Ok(());
        }
        PageOutcome::Captioned(report) => report,
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let text = report.text();
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        print_summary(&cli, &report, show_progress);
    }

    Ok(())
}

/// Summary lines on stderr. The progress callback already printed per-image
/// lines and the final tick when it was active.
fn print_summary(cli: &Cli, report: &PipelineReport, show_progress: bool) {
    if !show_progress {
        eprintln!(
            "Captioned {}/{} images in {}ms",
            report.processed_count(),
            report.total_candidates(),
            report.duration_ms()
        );
        for warning in report.warnings() {
            eprintln!("  {} {}", red("✗"), warning.message);
        }
    }

    eprintln!(
        "   {} skipped (too small)  /  {} dropped (filtered)  —  {}ms total",
        dim(&report.skipped_count().to_string()),
        dim(&report.dropped_count().to_string()),
        report.duration_ms(),
    );

    if report.is_cancelled() {
        eprintln!("{} Interrupted; partial results shown", yellow("⚠"));
    }

    if let Some(ref path) = cli.output {
        eprintln!("   →  {}", bold(&path.display().to_string()));
    }
}

/// Map CLI args to `CaptionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancelToken,
) -> Result<CaptionConfig> {
    let mut builder = CaptionConfig::builder()
        .concurrency(cli.concurrency)
        .min_pixel_area(cli.min_area)
        .max_image_edge(cli.max_image_edge)
        .image_timeout_secs(cli.image_timeout)
        .page_timeout_secs(cli.page_timeout)
        .caption_timeout_secs(cli.caption_timeout)
        .max_caption_tokens(cli.max_tokens)
        .caption_retries(cli.retries)
        .cancel_token(cancel);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("a cat", 10), "a cat");
    }

    #[test]
    fn truncate_is_char_aware() {
        let out = truncate("ééééé", 3);
        assert_eq!(out.chars().count(), 3);
        assert!(out.ends_with('\u{2026}'));
    }

    #[test]
    fn clear_finishes_spinner() {
        let progress = CliProgressCallback::new_dynamic();
        assert!(!progress.bar.is_finished());
        progress.clear();
        assert!(progress.bar.is_finished());
        // Clearing again, or after the run completed, is harmless.
        progress.clear();
    }

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::try_parse_from(["page2captions", "https://example.com"]).unwrap();
        assert_eq!(cli.concurrency, 1);
        assert_eq!(cli.min_area, 400);
        assert_eq!(cli.max_tokens, 16);
        assert_eq!(cli.max_image_edge, 1024);
        assert!(!cli.json);
    }
}
