//! CLI binary for pdf2questions.
//!
//! A thin shim over the library crate: `extract` maps flags to
//! `ExtractionConfig` and runs the pipeline, `render` turns a JSONL file
//! into an HTML preview, and `tokenize` shows how a markup string is split.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2questions::{
    read_jsonl, render_preview_page, run_extraction, tokenize, ExamFile, ExtractionConfig,
    ExtractionProgressCallback, JsonlSink, MarkingScheme, ProgressCallback, RunReport,
};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar across every page of the run plus
/// one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the page in flight. Pages are processed one at a time.
    page_started: Mutex<Option<Instant>>,
    /// Name of the file in flight, for log lines.
    current_file: Mutex<String>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Starts as a spinner; `on_run_start` sets the length once pages are counted.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Counting pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            current_file: Mutex::new(String::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn file_label(&self) -> String {
        self.current_file
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Extracting questions from {total_pages} pages in {total_files} file(s)…"
            ))
        ));
    }

    fn on_file_start(&self, path: &Path, year: i32, total_pages: usize) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.bar.println(format!(
            "{} {}  {}",
            cyan("▸"),
            bold(&name),
            dim(&format!("{year} · {total_pages} pages"))
        ));
        if let Ok(mut g) = self.current_file.lock() {
            *g = name;
        }
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut g) = self.page_started.lock() {
            *g = Some(Instant::now());
        }
        self.bar
            .set_message(format!("{} page {page_num}", self.file_label()));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, questions: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{questions:>3} questions")),
            dim(&format!("{:.1}s", self.page_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.page_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_questions: usize, failed_pages: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst).max(failed_pages);
        if errors == 0 {
            eprintln!(
                "{} {} questions extracted",
                green("✔"),
                bold(&total_questions.to_string())
            );
        } else {
            eprintln!(
                "{} {} questions extracted  ({} pages failed)",
                if total_questions == 0 { red("✘") } else { cyan("⚠") },
                bold(&total_questions.to_string()),
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one paper, appending to questions.jsonl
  pdf2q extract --course physics-101 --year 2021 paper.pdf

  # Several papers, each with its own year, rotating over three keys
  pdf2q extract --course chem --key K1 --key K2 --key K3 2019.pdf:2019 2020.pdf:2020

  # Custom marking scheme and a JSON run report
  pdf2q extract --course maths --year 2023 --type MSQ --correct 4 --incorrect -2 \
      --json report.json paper.pdf

  # Preview extracted questions in a browser
  pdf2q render questions.jsonl -o preview.html

  # See how a markup string is split into text, math and diagrams
  pdf2q tokenize 'Solve $x^2 = 4$'

ENVIRONMENT VARIABLES:
  GEMINI_API_KEYS   Comma-separated API keys (used when no --key is given)
  PDF2Q_MODEL       Override the model ID
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory); system library otherwise
  RUST_LOG          Override the log filter
"#;

/// Extract exam questions from scanned PDFs with a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2q",
    version,
    about = "Extract exam questions from scanned PDFs with a vision model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2Q_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2Q_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract questions from PDFs into a JSONL file.
    Extract(ExtractArgs),
    /// Render a JSONL file of questions to a standalone HTML page.
    Render(RenderArgs),
    /// Print the segments of a markup string as JSON.
    Tokenize(TokenizeArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// PDF files, optionally suffixed with `:YEAR` to override --year.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Year applied to files without a `:YEAR` suffix.
    #[arg(long)]
    year: Option<i32>,

    /// Course the questions are filed under.
    #[arg(long = "course", env = "PDF2Q_COURSE")]
    course_id: String,

    #[arg(long)]
    slot: Option<String>,

    #[arg(long)]
    part: Option<String>,

    /// API key; repeat for a rotating pool.
    #[arg(long = "key", env = "GEMINI_API_KEYS", value_delimiter = ',', hide_env_values = true)]
    keys: Vec<String>,

    /// Append questions to this file.
    #[arg(short, long, default_value = "questions.jsonl")]
    output: PathBuf,

    /// Also write the run report (pages + stats) as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Question type recorded on every question.
    #[arg(long = "type", default_value = "MCQ")]
    question_type: String,

    #[arg(long, default_value_t = 4.0, allow_hyphen_values = true)]
    correct: f64,

    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    incorrect: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    skipped: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    partial: f64,

    /// Suggested time per question, in minutes.
    #[arg(long, default_value_t = 3.0)]
    time: f64,

    #[arg(long, env = "PDF2Q_MODEL")]
    model: Option<String>,

    /// Rasterisation scale (0.25–8).
    #[arg(long, default_value_t = 2.0)]
    scale: f32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Cap on attempts per page (default: one per key).
    #[arg(long)]
    max_attempts: Option<usize>,

    /// Keep going after a page fails (key exhaustion still stops the run).
    #[arg(long)]
    continue_on_error: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2Q_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// JSONL file written by `extract`.
    input: PathBuf,

    /// Write HTML to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TokenizeArgs {
    /// Markup to split; read from stdin when omitted.
    text: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers INFO-level feedback while it is shown.
    let show_progress = matches!(&cli.command, Command::Extract(a) if !a.no_progress) && !cli.quiet;
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

    match cli.command {
        Command::Extract(args) => extract(args, show_progress, cli.quiet).await,
        Command::Render(args) => render(args).await,
        Command::Tokenize(args) => tokenize_cmd(args),
    }
}

async fn extract(args: ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let files = args
        .inputs
        .iter()
        .map(|s| parse_input(s, args.year))
        .collect::<Result<Vec<_>>>()?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&args, progress_cb)?;
    let mut sink = JsonlSink::open(&args.output)
        .await
        .with_context(|| format!("Failed to open {}", args.output.display()))?;

    let report = run_extraction(&files, &config, &mut sink)
        .await
        .context("Extraction failed")?;

    if let Some(ref path) = args.json {
        write_report(path, &report).await?;
    }

    if !quiet {
        let stats = &report.stats;
        eprintln!(
            "{}  {}/{} pages  {} questions  {}ms  →  {}",
            if report.is_complete() { green("✔") } else { cyan("⚠") },
            stats.processed_pages,
            stats.total_pages,
            stats.total_questions,
            stats.total_duration_ms,
            bold(&args.output.display().to_string()),
        );
        if stats.failed_keys > 0 {
            eprintln!("   {} keys retired", dim(&stats.failed_keys.to_string()));
        }
    }

    if let Some(err) = report.first_error() {
        if report.stats.halted {
            bail!(
                "Run stopped at page {}: {err} ({} pages skipped)",
                err.page(),
                report.stats.skipped_pages
            );
        }
        bail!("{} pages failed", report.stats.failed_pages);
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(args: &ExtractArgs, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let marking = MarkingScheme {
        question_type: args.question_type.clone(),
        correct_marks: args.correct,
        incorrect_marks: args.incorrect,
        skipped_marks: args.skipped,
        partial_marks: args.partial,
        time_minutes: args.time,
    };

    let mut builder = ExtractionConfig::builder()
        .api_keys(args.keys.iter())
        .course_id(args.course_id.clone())
        .marking(marking)
        .render_scale(args.scale)
        .request_timeout_secs(args.timeout)
        .continue_on_page_error(args.continue_on_error);

    if let Some(ref slot) = args.slot {
        builder = builder.slot(slot.clone());
    }
    if let Some(ref part) = args.part {
        builder = builder.part(part.clone());
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(n) = args.max_attempts {
        builder = builder.max_attempts_per_page(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `PATH` or `PATH:YEAR`.
fn parse_input(s: &str, default_year: Option<i32>) -> Result<ExamFile> {
    if let Some((path, year)) = s.rsplit_once(':') {
        if let Ok(year) = year.trim().parse::<i32>() {
            return Ok(ExamFile::new(path, year));
        }
    }
    match default_year {
        Some(year) => Ok(ExamFile::new(s, year)),
        None => bail!("No year for '{s}': pass --year or use PATH:YEAR"),
    }
}

async fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn render(args: RenderArgs) -> Result<()> {
    let records = read_jsonl(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let html = render_preview_page(&records);

    match args.output {
        Some(path) => tokio::fs::write(&path, html)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{html}");
            Ok(())
        }
    }
}

fn tokenize_cmd(args: TokenizeArgs) -> Result<()> {
    let text = match args.text {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    let segments = tokenize(&text);
    println!(
        "{}",
        serde_json::to_string_pretty(&segments).context("Failed to serialise segments")?
    );
    Ok(())
}
