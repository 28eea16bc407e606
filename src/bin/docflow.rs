//! CLI binary for edgequake-docflow.
//!
//! A thin shim over the library crate: maps flags to `WorkflowConfig`,
//! uploads `--file` inputs, runs the workflow and renders status events.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docflow::input::acquire;
use edgequake_docflow::{
    encode_file_upload, DirUploadStore, FileCheckpointStore, LlmStatus, RunState, StatusEvent,
    UploadResolver, Workflow, WorkflowConfig,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarize, translate and count a text
  docflow "The committee met on Tuesday to review the budget…"

  # Transcribe a handwritten scan
  docflow --file scan.jpg

  # Scan from a URL, JSON output
  docflow --file https://example.com/letter.pdf --json > letter.json

  # Translate to Marathi with a specific text model
  docflow --target-language Marathi --provider openai --model gpt-4.1-mini "…"

  # Checkpoint a run and resume it later
  docflow --checkpoint-dir ./checkpoints --run-id r1 --file scan.png
  docflow --checkpoint-dir ./checkpoints --resume r1

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key (document-image steps)
  GEMINI_MODEL            Vision model override (default gemini-2.5-flash)
  EDGEQUAKE_LLM_PROVIDER  Override provider for both pipelines
  EDGEQUAKE_MODEL         Override model ID for both pipelines
  DOCFLOW_UPLOAD_DIR      Where `--file` inputs are stored (default ./uploads)
"#;

/// Summarize text or transcribe handwritten documents with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "docflow",
    version,
    about = "Summarize text or transcribe handwritten documents with LLMs",
    long_about = "Runs free text through summarize → translate → count, or an uploaded \
image/PDF through quality → enhance → preprocess → extract → ground, printing each \
step's status as it happens.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Text to process with the text pipeline.
    #[arg(conflicts_with_all = ["file", "resume"])]
    text: Option<String>,

    /// Local image/PDF path or HTTP/HTTPS URL for the file pipeline.
    #[arg(short, long, conflicts_with = "resume")]
    file: Option<String>,

    /// Resume a checkpointed run by id (needs --checkpoint-dir).
    #[arg(long, requires = "checkpoint_dir")]
    resume: Option<String>,

    /// Run id for this invocation. Generated when omitted.
    #[arg(long)]
    run_id: Option<String>,

    /// Directory for per-run checkpoints.
    #[arg(long, env = "DOCFLOW_CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Directory where `--file` inputs are stored.
    #[arg(long, env = "DOCFLOW_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Text-pipeline provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Text-pipeline model ID (e.g. gpt-4.1-nano).
    #[arg(long)]
    model: Option<String>,

    /// Document-image provider. Default: gemini.
    #[arg(long, env = "DOCFLOW_VISION_PROVIDER")]
    vision_provider: Option<String>,

    /// Document-image model ID. Default: $GEMINI_MODEL or gemini-2.5-flash.
    #[arg(long)]
    vision_model: Option<String>,

    /// Language the summary is translated into.
    #[arg(long, env = "DOCFLOW_TARGET_LANGUAGE", default_value = "Hindi")]
    target_language: String,

    /// Pause after each status update, in milliseconds (0 disables).
    #[arg(long, env = "DOCFLOW_PACING_MS", default_value_t = 500)]
    pacing_ms: u64,

    /// Max LLM output tokens per call.
    #[arg(long, default_value_t = 4096)]
    max_tokens: usize,

    /// Retries per LLM call.
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// Print the final run state as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the status spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep library INFO
    // logs out of its way unless --verbose.
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

    let config = build_config(&cli)?;
    let uploads = Arc::new(
        DirUploadStore::open(&cli.upload_dir)
            .await
            .with_context(|| format!("Failed to open upload directory {:?}", cli.upload_dir))?,
    );

    let mut workflow = Workflow::from_config(config.clone(), uploads.clone());
    if let Some(ref dir) = cli.checkpoint_dir {
        let store = FileCheckpointStore::open(dir)
            .await
            .with_context(|| format!("Failed to open checkpoint directory {:?}", dir))?;
        workflow = workflow.with_checkpoints(Arc::new(store));
    }

    let (tx, rx) = mpsc::channel(config.event_buffer.max(1));
    let renderer = tokio::spawn(render_events(ReceiverStream::new(rx), show_progress));

    let state = if let Some(ref run_id) = cli.resume {
        workflow
            .resume_with_events(run_id, tx)
            .await
            .with_context(|| format!("Failed to resume run {run_id}"))?
    } else {
        let initial = initial_state(&cli, uploads.as_ref(), &config).await?;
        let run_id = cli.run_id.clone().unwrap_or_else(Workflow::new_run_id);
        workflow.execute_with_events(initial, &run_id, tx).await
    };
    // The sender was moved into the run, so the renderer sees end-of-stream.
    renderer.await.context("Status renderer panicked")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&state).context("Failed to serialise run state")?
        );
    } else {
        print_result(&state, cli.quiet);
    }

    if state.has_errors() {
        std::process::exit(2);
    }
    Ok(())
}

/// Map CLI args to `WorkflowConfig`.
fn build_config(cli: &Cli) -> Result<WorkflowConfig> {
    let mut builder = WorkflowConfig::builder()
        .status_pacing_ms(cli.pacing_ms)
        .target_language(cli.target_language.clone())
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref p) = cli.provider {
        builder = builder.text_provider_name(p.clone());
    }
    if let Some(ref m) = cli.model {
        builder = builder.text_model(m.clone());
    }
    if let Some(ref p) = cli.vision_provider {
        builder = builder.vision_provider_name(p.clone());
    }
    if let Some(ref m) = cli.vision_model {
        builder = builder.vision_model(m.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Build the starting state: upload `--file` and reference it, or use the text.
async fn initial_state(
    cli: &Cli,
    uploads: &dyn UploadResolver,
    config: &WorkflowConfig,
) -> Result<RunState> {
    if let Some(ref file) = cli.file {
        let acquired = acquire(file, config.download_timeout_secs)
            .await
            .with_context(|| format!("Failed to read {file}"))?;
        let record = uploads
            .save(
                acquired.bytes,
                Some(acquired.filename.as_str()),
                Some(acquired.content_type.as_str()),
            )
            .await
            .context("Failed to store upload")?;
        if !cli.quiet {
            eprintln!(
                "{} {}  {}",
                green("↑"),
                bold(&record.filename),
                dim(&format!("{} · {} bytes · id {}", record.content_type, record.size, record.file_id)),
            );
        }
        return Ok(RunState::from_text(encode_file_upload(&record)));
    }

    Ok(RunState::from_text(cli.text.clone().unwrap_or_default()))
}

/// Drain the event stream, showing each status on a spinner.
async fn render_events(mut events: ReceiverStream<StatusEvent>, show: bool) {
    let bar = if show {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("docflow");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    while let Some(event) = events.next().await {
        if let Some(ref bar) = bar {
            bar.set_message(format!("{}…", event.llm_status));
            if event.llm_status == LlmStatus::Completed {
                bar.finish_and_clear();
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
}

fn print_result(state: &RunState, quiet: bool) {
    if state.has_errors() {
        for err in &state.file_errors {
            eprintln!("{} {}", red("✘"), err);
        }
    }

    if let Some(ref grounded) = state.grounded_data {
        println!("{}", grounded.normalized_text);
        if !quiet {
            for entity in &grounded.entities {
                eprintln!("  {} {}", dim(&format!("{}:", entity.key)), entity.value);
            }
            if let Some(ref notes) = grounded.notes {
                eprintln!("{}", dim(notes));
            }
        }
    } else if let Some(ref translated) = state.translated_data {
        if !quiet {
            if let Some(ref summary) = state.summary_data {
                eprintln!("{} {}", bold("Summary:"), summary.summary);
                for point in &summary.key_points {
                    eprintln!("  • {point}");
                }
            }
        }
        println!("{}", translated.translated_text);
    } else if let Some(ref summary) = state.summary_data {
        println!("{}", summary.summary);
    }

    if !quiet {
        if let Some(count) = state.final_count {
            eprintln!("{} {} words", green("✔"), count.word_count);
        } else if !state.has_errors() && state.grounded_data.is_some() {
            eprintln!("{} done", green("✔"));
        }
    }
}
