//! Content Scorecard CLI
//!
//! The `scorecard` command scores a piece of content against weighted
//! guidelines using a language-model judge.
//!
//! ## Commands
//!
//! - `evaluate`: Score content from a file, inline text or a bundled sample
//! - `guidelines`: Show, validate or write out guidelines
//! - `report`: List and show saved reports
//! - `samples`: List bundled sample content
//! - `check`: Test the connection to the configured provider
//! - `config`: Show or write out the effective configuration
//! - `serve`: Answer JSON-RPC tool calls on stdin/stdout

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use scorecard_core::{
    default_guidelines, fingerprint, load_guidelines_or_default, render_json, render_markdown,
    CancellationToken, Coordinator, EvaluationResult, FsReportStore, GuidelinesModel,
    GuidelinesOrigin, GuidelinesSource, JudgeClient, JudgeError, ReportStore, SampleLibrary,
    ScorecardConfig, ScorecardError, METRICS,
};
use scorecard_providers::create_judge;
use tracing::{info, warn, Level};

mod rpc;
mod tools;

#[derive(Parser)]
#[command(name = "scorecard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Weighted, judge-scored content evaluation", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate content against the guidelines
    #[command(group(ArgGroup::new("input").required(true).args(["file", "text", "sample"])))]
    Evaluate {
        /// Read content from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Evaluate this text directly
        #[arg(short, long)]
        text: Option<String>,

        /// Evaluate a bundled sample by id
        #[arg(short, long)]
        sample: Option<String>,

        /// Guidelines file (default: app.guidelines_path from the config)
        #[arg(short, long)]
        guidelines: Option<PathBuf>,

        /// Only evaluate these metrics (repeatable)
        #[arg(short, long = "metric")]
        metrics: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,

        /// Do not write the report to the reports directory
        #[arg(long)]
        no_save: bool,

        /// Return a saved report for identical content instead of calling the judge
        #[arg(long)]
        reuse: bool,

        /// Cancel the evaluation after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Inspect or create guidelines files
    Guidelines {
        #[command(subcommand)]
        action: GuidelinesAction,
    },

    /// Saved reports
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },

    /// Bundled sample content
    Samples {
        #[command(subcommand)]
        action: SamplesAction,
    },

    /// Test the connection to the configured provider
    Check,

    /// Effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Serve evaluation tools as line-delimited JSON-RPC on stdin/stdout
    Serve {
        /// Guidelines file (default: app.guidelines_path from the config)
        #[arg(short, long)]
        guidelines: Option<PathBuf>,

        /// Give up on a tool request after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,

        /// Do not save evaluate_content results to the reports directory
        #[arg(long)]
        no_save: bool,
    },
}

#[derive(Subcommand)]
enum GuidelinesAction {
    /// Print the guidelines that `evaluate` would use
    Show,
    /// Strictly validate a guidelines file
    Validate { path: PathBuf },
    /// Write the built-in default guidelines to a file
    Init {
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ReportAction {
    /// List saved reports, newest first
    List,
    /// Show a saved report by content hash (or a prefix of at least 4 characters)
    Show {
        hash: String,
        /// Render as Markdown instead of JSON
        #[arg(long)]
        markdown: bool,
    },
}

#[derive(Subcommand)]
enum SamplesAction {
    /// List sample ids and titles
    List,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Write a configuration file with default values
    Init {
        #[arg(default_value = "config.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

/// Where the content to evaluate comes from.
#[derive(Debug)]
enum ContentInput {
    File(PathBuf),
    Text(String),
    Sample(String),
}

/// Options for one `evaluate` run, independent of the judge.
#[derive(Debug)]
struct EvaluateOptions {
    metrics: Vec<String>,
    format: OutputFormat,
    save: bool,
    reuse: bool,
    deadline: Option<Duration>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env file is normal.
    dotenvy::dotenv().ok();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    scorecard_core::init_tracing(cli.json, level);

    let outcome = run(cli).await;
    METRICS.flush();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Some(hint) = troubleshooting(&err) {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ScorecardConfig::from_sources(&cli.config, |key| std::env::var(key).ok())
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Evaluate {
            file,
            text,
            sample,
            guidelines,
            metrics,
            format,
            no_save,
            reuse,
            timeout_secs,
        } => {
            let input = match (file, text, sample) {
                (Some(path), _, _) => ContentInput::File(path),
                (_, Some(text), _) => ContentInput::Text(text),
                (_, _, Some(id)) => ContentInput::Sample(id),
                _ => anyhow::bail!("one of --file, --text or --sample is required"),
            };
            let options = EvaluateOptions {
                metrics,
                format,
                save: !no_save,
                reuse,
                deadline: timeout_secs.map(Duration::from_secs),
            };
            cmd_evaluate(&config, input, guidelines.as_deref(), options).await
        }
        Commands::Guidelines { action } => match action {
            GuidelinesAction::Show => cmd_guidelines_show(&config),
            GuidelinesAction::Validate { path } => cmd_guidelines_validate(&path),
            GuidelinesAction::Init { path, force } => cmd_guidelines_init(&path, force),
        },
        Commands::Report { action } => {
            let store = FsReportStore::new(&config.app.reports_dir);
            match action {
                ReportAction::List => cmd_report_list(&store).await,
                ReportAction::Show { hash, markdown } => {
                    cmd_report_show(&store, &hash, markdown).await
                }
            }
        }
        Commands::Samples { action } => match action {
            SamplesAction::List => cmd_samples_list(&config),
        },
        Commands::Check => cmd_check(&config).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&config),
            ConfigAction::Init { path, force } => cmd_config_init(&path, force),
        },
        Commands::Serve {
            guidelines,
            timeout_secs,
            no_save,
        } => {
            cmd_serve(
                &config,
                guidelines.as_deref(),
                Duration::from_secs(timeout_secs),
                !no_save,
            )
            .await
        }
    }
}

/// Operator hint for the innermost error that carries one.
fn troubleshooting(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<ScorecardError>() {
            e.troubleshooting()
        } else {
            cause
                .downcast_ref::<JudgeError>()
                .map(JudgeError::troubleshooting)
        }
    })
}

// ---------------------------------------------------------------------------
// evaluate
// ---------------------------------------------------------------------------

async fn cmd_evaluate(
    config: &ScorecardConfig,
    input: ContentInput,
    guidelines_path: Option<&Path>,
    options: EvaluateOptions,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let content = read_content(config, input)?;
    let guidelines = resolve_guidelines(config, guidelines_path)?;
    let store = FsReportStore::new(&config.app.reports_dir);

    let judge = create_judge(&config.llm).context("Failed to create judge client")?;
    let coordinator = Coordinator::new(judge, config.judge_limiter(), config.coordinator_config());

    let result = evaluate(&coordinator, &store, &content, &guidelines, &options).await?;
    println!("{}", render(&result, options.format)?);
    Ok(())
}

/// Run one evaluation: optional reuse, cancellable evaluation, optional save.
async fn evaluate(
    coordinator: &Coordinator,
    store: &dyn ReportStore,
    content: &str,
    guidelines: &GuidelinesModel,
    options: &EvaluateOptions,
) -> Result<EvaluationResult> {
    let guidelines = if options.metrics.is_empty() {
        guidelines.clone()
    } else {
        guidelines.restrict_to(&options.metrics)?
    };

    if options.reuse {
        let hash = fingerprint(content);
        if let Some(saved) = store
            .load(&hash)
            .await
            .context("Failed to look up saved reports")?
        {
            if same_metrics(&saved, &guidelines) {
                info!(content_hash = %hash, "reusing saved report");
                return Ok(saved);
            }
            info!(
                content_hash = %hash,
                saved = saved.metric_results.len(),
                requested = guidelines.metric_count(),
                "saved report covers different metrics, evaluating again"
            );
        }
    }

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone(), options.deadline));
    let outcome = coordinator
        .evaluate_with_cancel(content, &guidelines, &cancel)
        .await;
    watcher.abort();

    let result = match outcome {
        Err(ScorecardError::Cancelled) if options.deadline.is_some() => {
            return Err(ScorecardError::Cancelled).with_context(|| {
                format!(
                    "Evaluation did not finish within {}s",
                    options.deadline.unwrap_or_default().as_secs()
                )
            });
        }
        other => other?,
    };

    for failed in result.failed_metrics() {
        warn!(
            metric = %failed.metric.name,
            reason = failed.status.failure_reason().unwrap_or("unknown"),
            "metric not scored"
        );
    }

    if options.save {
        let saved = store
            .save(&result)
            .await
            .context("Failed to save report")?;
        for location in &saved.locations {
            eprintln!("Saved report to {location}");
        }
    }

    Ok(result)
}

/// A saved report is only reusable when it scored exactly the selected metrics.
fn same_metrics(saved: &EvaluationResult, guidelines: &GuidelinesModel) -> bool {
    let mut saved: Vec<&str> = saved
        .metric_results
        .iter()
        .map(|r| r.metric.name.as_str())
        .collect();
    let selected = guidelines.all_metrics();
    let mut wanted: Vec<&str> = selected.iter().map(|m| m.name.as_str()).collect();
    saved.sort_unstable();
    wanted.sort_unstable();
    saved == wanted
}

/// Cancel on Ctrl-C, or when `deadline` elapses.
async fn cancel_on_interrupt(cancel: CancellationToken, deadline: Option<Duration>) {
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    match deadline {
        Some(deadline) => {
            tokio::select! {
                _ = interrupted => warn!("interrupted, cancelling evaluation"),
                _ = tokio::time::sleep(deadline) => {
                    warn!(secs = deadline.as_secs(), "deadline reached, cancelling evaluation");
                }
            }
        }
        None => {
            interrupted.await;
            warn!("interrupted, cancelling evaluation");
        }
    }
    cancel.cancel();
}

fn read_content(config: &ScorecardConfig, input: ContentInput) -> Result<String> {
    match input {
        ContentInput::File(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read content from {}", path.display())),
        ContentInput::Text(text) => Ok(text),
        ContentInput::Sample(id) => {
            let library = load_samples(config)?;
            let sample = library.get(&id).with_context(|| {
                let known: Vec<&str> = library.all().iter().map(|s| s.id.as_str()).collect();
                if known.is_empty() {
                    format!("Unknown sample '{id}' (no samples available)")
                } else {
                    format!("Unknown sample '{id}' (available: {})", known.join(", "))
                }
            })?;
            Ok(sample.content.clone())
        }
    }
}

/// An explicit `--guidelines` file must be valid; the configured path falls
/// back to the built-in defaults.
fn resolve_guidelines(config: &ScorecardConfig, explicit: Option<&Path>) -> Result<GuidelinesModel> {
    if let Some(path) = explicit {
        return load_strict(path);
    }
    let (model, origin) = load_guidelines_or_default(&config.app.guidelines_path)
        .context("Failed to read guidelines")?;
    if let GuidelinesOrigin::Default { reason } = &origin {
        warn!(%reason, "using built-in default guidelines");
    }
    Ok(model)
}

fn load_strict(path: &Path) -> Result<GuidelinesModel> {
    let source = GuidelinesSource::from_path(path)
        .with_context(|| format!("Failed to read guidelines from {}", path.display()))?;
    let model = GuidelinesModel::load(source)
        .with_context(|| format!("Invalid guidelines in {}", path.display()))?;
    Ok(model)
}

fn render(result: &EvaluationResult, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => render_json(result, true)?,
        OutputFormat::Markdown => render_markdown(result),
    })
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

async fn cmd_serve(
    config: &ScorecardConfig,
    guidelines_path: Option<&Path>,
    request_timeout: Duration,
    save: bool,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let guidelines = resolve_guidelines(config, guidelines_path)?;
    let judge = create_judge(&config.llm).context("Failed to create judge client")?;
    let coordinator = Coordinator::new(judge, config.judge_limiter(), config.coordinator_config());

    let mut server = tools::ToolServer::new(coordinator, guidelines, request_timeout);
    if save {
        server = server.with_store(Arc::new(FsReportStore::new(&config.app.reports_dir)));
    }

    info!(
        timeout_secs = request_timeout.as_secs(),
        "serving evaluate_content, evaluate_metric, get_guidelines, request_status"
    );
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tools::serve(Arc::new(server), stdin, tokio::io::stdout())
        .await
        .context("Tool server I/O failed")
}

// ---------------------------------------------------------------------------
// guidelines
// ---------------------------------------------------------------------------

fn cmd_guidelines_show(config: &ScorecardConfig) -> Result<()> {
    let (model, origin) = load_guidelines_or_default(&config.app.guidelines_path)
        .context("Failed to read guidelines")?;
    match origin {
        GuidelinesOrigin::File(path) => eprintln!("# from {}", path.display()),
        GuidelinesOrigin::Default { reason } => eprintln!("# built-in defaults ({reason})"),
    }
    print!("{}", model.to_yaml()?);
    Ok(())
}

fn cmd_guidelines_validate(path: &Path) -> Result<()> {
    let model = load_strict(path)?;
    println!(
        "{}: OK ({} categories, {} metrics)",
        path.display(),
        model.categories().len(),
        model.metric_count()
    );
    for category in model.categories() {
        let names: Vec<&str> = category.metrics.iter().map(|m| m.name.as_str()).collect();
        println!(
            "  {} (weight {}): {}",
            category.name,
            category.weight,
            names.join(", ")
        );
    }
    Ok(())
}

fn cmd_guidelines_init(path: &Path, force: bool) -> Result<()> {
    let yaml = default_guidelines().to_yaml()?;
    write_new_file(path, &yaml, force)?;
    println!("Wrote default guidelines to {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

async fn cmd_report_list(store: &dyn ReportStore) -> Result<()> {
    let reports = store.list().await.context("Failed to list reports")?;
    if reports.is_empty() {
        println!("No saved reports");
        return Ok(());
    }
    println!("{:<10} {:<20} {:>7} {:>9}", "HASH", "CREATED", "SCORE", "METRICS");
    for report in reports {
        println!(
            "{:<10} {:<20} {:>7.2} {:>4}/{:<4}",
            report.id.short_hash(),
            report.id.timestamp.format("%Y-%m-%d %H:%M:%S"),
            report.overall_score,
            report.metrics_evaluated,
            report.metrics_requested
        );
    }
    Ok(())
}

async fn cmd_report_show(store: &dyn ReportStore, hash: &str, markdown: bool) -> Result<()> {
    let result = store
        .load(hash)
        .await
        .with_context(|| format!("Failed to load report {hash}"))?
        .with_context(|| format!("No saved report matches {hash}"))?;
    let format = if markdown {
        OutputFormat::Markdown
    } else {
        OutputFormat::Json
    };
    println!("{}", render(&result, format)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// samples / check / config
// ---------------------------------------------------------------------------

fn load_samples(config: &ScorecardConfig) -> Result<SampleLibrary> {
    SampleLibrary::load(&config.app.samples_path).with_context(|| {
        format!(
            "Failed to load samples from {}",
            config.app.samples_path.display()
        )
    })
}

fn cmd_samples_list(config: &ScorecardConfig) -> Result<()> {
    let library = load_samples(config)?;
    if library.is_empty() {
        println!("No samples in {}", config.app.samples_path.display());
        return Ok(());
    }
    for sample in library.all() {
        println!("{:<20} {}", sample.id, sample.title);
        if !sample.description.is_empty() {
            println!("{:<20} {}", "", sample.description);
        }
    }
    Ok(())
}

async fn cmd_check(config: &ScorecardConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let judge = create_judge(&config.llm).context("Failed to create judge client")?;
    check_judge(judge, config.llm.timeout()).await
}

async fn check_judge(judge: Arc<dyn JudgeClient>, timeout: Duration) -> Result<()> {
    let check = judge.check_connection(timeout).await.with_context(|| {
        format!(
            "Connection check failed for {} ({})",
            judge.provider(),
            judge.model()
        )
    })?;
    println!(
        "OK: {} model {} answered in {}ms",
        check.provider, check.model, check.latency_ms
    );
    Ok(())
}

fn cmd_config_show(config: &ScorecardConfig) -> Result<()> {
    print!("{}", config.to_toml_redacted()?);
    if let Err(e) = config.validate() {
        eprintln!("warning: {e}");
    }
    Ok(())
}

fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    let toml = ScorecardConfig::default().to_toml_redacted()?;
    write_new_file(path, &toml, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn write_new_file(path: &Path, contents: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_core::fakes::{Scripted, ScriptedJudge};
    use scorecard_core::{
        CoordinatorConfig, EvaluatorConfig, JudgeLimiter, MemoryReportStore, RetryPolicy,
    };

    const CONTENT: &str = "Rust makes fearless concurrency practical.";

    fn options() -> EvaluateOptions {
        EvaluateOptions {
            metrics: Vec::new(),
            format: OutputFormat::Json,
            save: true,
            reuse: false,
            deadline: None,
        }
    }

    fn coordinator(judge: &Arc<ScriptedJudge>) -> Coordinator {
        let config = CoordinatorConfig {
            evaluator: EvaluatorConfig {
                retry: RetryPolicy::none(),
                ..EvaluatorConfig::default()
            },
            ..CoordinatorConfig::default()
        };
        Coordinator::new(judge.clone(), JudgeLimiter::new(4), config)
    }

    #[test]
    fn cli_requires_exactly_one_input() {
        assert!(Cli::try_parse_from(["scorecard", "evaluate"]).is_err());
        assert!(
            Cli::try_parse_from(["scorecard", "evaluate", "--text", "a", "--sample", "b"]).is_err()
        );
        let cli = Cli::try_parse_from([
            "scorecard",
            "evaluate",
            "--text",
            "hello",
            "--metric",
            "conciseness",
            "--metric",
            "structure",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Evaluate {
                text,
                metrics,
                format,
                ..
            } => {
                assert_eq!(text.as_deref(), Some("hello"));
                assert_eq!(metrics, ["conciseness", "structure"]);
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected evaluate"),
        }
        assert_eq!(cli.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn serve_defaults_to_a_five_minute_request_timeout() {
        let cli = Cli::try_parse_from(["scorecard", "serve"]).unwrap();
        match cli.command {
            Commands::Serve {
                guidelines,
                timeout_secs,
                no_save,
            } => {
                assert!(guidelines.is_none());
                assert_eq!(timeout_secs, 300);
                assert!(!no_save);
            }
            _ => panic!("expected serve"),
        }
    }

    #[tokio::test]
    async fn evaluate_saves_and_reuses_reports() {
        let judge = Arc::new(ScriptedJudge::new().with_fallback(Scripted::score(4)));
        let coordinator = coordinator(&judge);
        let store = MemoryReportStore::new();
        let guidelines = default_guidelines();

        let first = evaluate(&coordinator, &store, CONTENT, &guidelines, &options())
            .await
            .unwrap();
        assert_eq!(judge.calls(), guidelines.metric_count());
        assert_eq!(store.list().await.unwrap().len(), 1);

        let reuse = EvaluateOptions {
            reuse: true,
            ..options()
        };
        let second = evaluate(&coordinator, &store, CONTENT, &guidelines, &reuse)
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(judge.calls(), guidelines.metric_count());
    }

    #[tokio::test]
    async fn reuse_ignores_reports_for_a_different_metric_selection() {
        let judge = Arc::new(ScriptedJudge::new().with_fallback(Scripted::score(3)));
        let coordinator = coordinator(&judge);
        let store = MemoryReportStore::new();
        let guidelines = default_guidelines();
        let narrow = EvaluateOptions {
            metrics: vec!["conciseness".into()],
            ..options()
        };

        let partial = evaluate(&coordinator, &store, CONTENT, &guidelines, &narrow)
            .await
            .unwrap();
        assert_eq!(partial.metric_results.len(), 1);
        assert_eq!(judge.calls(), 1);

        // A full run must not be answered by the one-metric report.
        let full_reuse = EvaluateOptions {
            reuse: true,
            ..options()
        };
        let full = evaluate(&coordinator, &store, CONTENT, &guidelines, &full_reuse)
            .await
            .unwrap();
        assert_eq!(full.metric_results.len(), guidelines.metric_count());
        assert_eq!(judge.calls(), 1 + guidelines.metric_count());

        // Nor the other way around once the full report replaced it.
        let narrow_reuse = EvaluateOptions {
            reuse: true,
            ..narrow
        };
        let again = evaluate(&coordinator, &store, CONTENT, &guidelines, &narrow_reuse)
            .await
            .unwrap();
        assert_eq!(again.metric_results.len(), 1);
        assert_eq!(judge.calls(), 2 + guidelines.metric_count());
    }

    #[tokio::test]
    async fn metric_selection_limits_judge_calls() {
        let judge = Arc::new(ScriptedJudge::new());
        let coordinator = coordinator(&judge);
        let store = MemoryReportStore::new();
        let selected = EvaluateOptions {
            metrics: vec!["conciseness".into(), "fact_verification".into()],
            save: false,
            ..options()
        };

        let result = evaluate(&coordinator, &store, CONTENT, &default_guidelines(), &selected)
            .await
            .unwrap();

        assert_eq!(judge.calls(), 2);
        assert_eq!(result.metadata.metrics_requested, 2);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_metrics_failing_carries_a_hint() {
        let judge = Arc::new(ScriptedJudge::new().with_fallback(Scripted::Fail(
            JudgeError::Unauthorized {
                message: "bad key".into(),
            },
        )));
        let coordinator = coordinator(&judge);
        let store = MemoryReportStore::new();

        let err = evaluate(&coordinator, &store, CONTENT, &default_guidelines(), &options())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ScorecardError>(),
            Some(ScorecardError::AllMetricsFailed { .. })
        ));
        assert!(troubleshooting(&err).unwrap().contains("scorecard check"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_a_hanging_evaluation() {
        let judge = Arc::new(ScriptedJudge::new().with_fallback(Scripted::Hang));
        let coordinator = coordinator(&judge);
        let store = MemoryReportStore::new();
        let timed = EvaluateOptions {
            deadline: Some(Duration::from_secs(5)),
            ..options()
        };

        let err = evaluate(&coordinator, &store, CONTENT, &default_guidelines(), &timed)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("within 5s"));
        assert!(matches!(
            err.downcast_ref::<ScorecardError>(),
            Some(ScorecardError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn check_reports_scripted_judge() {
        let judge: Arc<dyn JudgeClient> =
            Arc::new(ScriptedJudge::new().with_fallback(Scripted::Reply("OK".into())));
        check_judge(judge, Duration::from_secs(1)).await.unwrap();
    }

    #[test]
    fn sample_input_reports_known_ids() {
        let dir = tempfile::tempdir().unwrap();
        let samples = dir.path().join("samples.yaml");
        std::fs::write(
            &samples,
            "- id: intro\n  title: Intro\n  content: Hello there.\n",
        )
        .unwrap();
        let mut config = ScorecardConfig::default();
        config.app.samples_path = samples;

        let content = read_content(&config, ContentInput::Sample("intro".into())).unwrap();
        assert_eq!(content, "Hello there.");

        let err = read_content(&config, ContentInput::Sample("missing".into())).unwrap_err();
        assert!(err.to_string().contains("available: intro"));
    }

    #[test]
    fn explicit_guidelines_are_strict_configured_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "clarity:\n  weight: -1\n  metrics: {}\n").unwrap();

        let mut config = ScorecardConfig::default();
        config.app.guidelines_path = broken.clone();

        let fallback = resolve_guidelines(&config, None).unwrap();
        assert_eq!(fallback, default_guidelines());

        assert!(resolve_guidelines(&config, Some(&broken)).is_err());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("guidelines.yaml");

        cmd_guidelines_init(&path, false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            GuidelinesModel::from_yaml_str(&written).unwrap(),
            default_guidelines()
        );

        assert!(cmd_guidelines_init(&path, false).is_err());
        cmd_guidelines_init(&path, true).unwrap();
    }

    #[test]
    fn config_init_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        cmd_config_init(&path, false).unwrap();

        let loaded = ScorecardConfig::load(&path).unwrap();
        assert_eq!(loaded, ScorecardConfig::default());
    }
}
