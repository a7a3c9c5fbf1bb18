//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use galleryforge_core::{
    MessagesService, PipelineConfig, PipelineSummary, ProgressReporter, Publisher, run_pipeline,
};
use galleryforge_extract::HttpDocumentSource;
use galleryforge_shared::{
    AppConfig, SourceRegistry, init_config, load_config, load_config_from, resolve_api_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// galleryforge: build a code-example gallery from upstream documentation.
#[derive(Parser)]
#[command(
    name = "galleryforge",
    version,
    about = "Scrape code examples from documentation, enrich them, and publish a gallery.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.galleryforge/galleryforge.toml.
    #[arg(long, global = true, env = "GALLERYFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline: extract, enrich, select, publish.
    Run(RunArgs),

    /// List the configured sources in scrape order.
    Sources,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Report what would be published without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Output directory (overrides `output.dir`).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Only scrape these sources (repeatable).
    #[arg(short, long = "source")]
    pub sources: Vec<String>,

    /// Maximum concurrent enrichment calls (overrides `enrichment.max_concurrent`).
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "galleryforge=info",
        1 => "galleryforge=debug",
        _ => "galleryforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(args, config_path).await,
        Command::Sources => cmd_sources(config_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(n) = args.max_concurrent {
        config.enrichment.max_concurrent = n;
    }
    if let Some(out) = &args.out {
        config.output.dir = out.to_string_lossy().to_string();
    }

    // Everything fatal is checked before the first request goes out.
    let mut pipeline_config = PipelineConfig::from_app_config(&config)?;
    if !args.sources.is_empty() {
        pipeline_config.registry = pipeline_config.registry.restrict_to(&args.sources)?;
    }
    let api_key = resolve_api_key(&config)?;

    let service = Arc::new(MessagesService::new(
        &config.service,
        &api_key,
        Duration::from_secs(config.enrichment.call_timeout_secs),
    )?);
    let documents =
        HttpDocumentSource::new(Duration::from_secs(config.extraction.fetch_timeout_secs))?;

    let publisher =
        Publisher::new(&config.output.dir).with_tracked_packages(&config.output.tracked_packages);
    let existing = publisher.existing_counts(
        pipeline_config
            .registry
            .list_sources()
            .iter()
            .map(|s| s.name.as_str()),
    )?;

    info!(
        sources = pipeline_config.registry.len(),
        out = %publisher.dir().display(),
        dry_run = args.dry_run,
        "starting gallery run"
    );

    let reporter = CliProgress::new();
    let run = run_pipeline(&pipeline_config, &documents, service, &existing, &reporter).await?;

    print_summary(&run.summary);

    if args.dry_run {
        println!("  Dry run: nothing written. Would publish:");
        for file in &run.files {
            println!("    {}", file.filename);
        }
        let rejected = run.summary.decisions.iter().filter(|d| !d.published).count();
        if rejected > 0 {
            println!("  Rejected: {rejected}");
        }
    } else {
        let report = publisher.write(&run.files, &run.summary)?;
        println!("  Wrote {} file(s) to {}", report.files.len(), publisher.dir().display());
        if !report.requirements_added.is_empty() {
            println!("  Requirements: added {}", report.requirements_added.join(", "));
        }
        if report.readme_updated {
            println!("  README: automation notice added");
        }
        println!("  Report: {}", report.summary_path.display());
    }
    println!();

    Ok(())
}

fn cmd_sources(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let registry: SourceRegistry = config.registry()?;

    println!();
    for source in registry.list_sources() {
        println!(
            "  [{}] {:<10} {:<9} {}",
            source.priority,
            source.name,
            source.format_kind.as_str(),
            source.base_location
        );
        if !source.description.is_empty() {
            println!("      {}", source.description);
        }
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(summary: &PipelineSummary) {
    println!();
    println!("  Gallery run {}", summary.run_id);
    println!("  Candidates: {}", summary.total_candidates);
    println!("  Enriched:   {}", summary.total_enriched);
    println!("  Published:  {}", summary.total_published);
    println!("  Confidence: {:.2} (mean)", summary.mean_confidence);
    println!(
        "  Time:       {:.1}s",
        (summary.finished_at - summary.started_at).num_milliseconds() as f64 / 1000.0
    );

    println!();
    for (name, counts) in &summary.per_source {
        println!(
            "  {name:<10} {} candidate(s), {} published",
            counts.candidates, counts.published
        );
    }
    for (name, error) in &summary.skipped_sources {
        println!("  {name:<10} skipped: {error}");
    }
    if !summary.failure_reasons.is_empty() {
        println!();
        for (kind, count) in &summary.failure_reasons {
            println!("  enrichment fallback ({kind}): {count}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using indicatif spinners/bars.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_extracted(&self, source: &str, candidates: usize) {
        self.spinner
            .set_message(format!("Extracted {candidates} example(s) from {source}"));
    }

    fn artifact_enriched(&self, current: usize, total: usize, title: &str) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}] {title}"));
    }

    fn done(&self, _summary: &PipelineSummary) {
        self.spinner.finish_and_clear();
    }
}
