//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use vinaya_notes_core::pipeline::{BuildConfig, BuildResult, ProgressReporter};
use vinaya_notes_shared::{AppConfig, MergePolicy, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// vinaya-notes: turn Vinaya commentary notes into cross-referenced Markdown.
#[derive(Parser)]
#[command(
    name = "vinaya-notes",
    version,
    about = "Fetch annotated Vinaya notes and render them as cross-referenced Markdown with a glossary.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.vinaya-notes/vinaya-notes.toml).
    #[arg(long, global = true, env = "VINAYA_NOTES_CONFIG")]
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
    /// Fetch notes, assemble them, and write the Markdown files and glossary.
    Build(BuildArgs),

    /// Check an output directory against its manifest.
    Verify {
        /// Output directory to check (defaults to the configured one).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `build`; each overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct BuildArgs {
    /// Output directory for the Markdown files.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Scid map: local path or http(s) URL.
    #[arg(long)]
    pub scidmap: Option<String>,

    /// Read notes from a local JSON file instead of the API.
    #[arg(long)]
    pub notes: Option<PathBuf>,

    /// Where to write glossary.json.
    #[arg(long)]
    pub glossary: Option<PathBuf>,

    /// Edition identifier to fetch.
    #[arg(long)]
    pub edition: Option<String>,

    /// Author recorded in the output.
    #[arg(long)]
    pub author: Option<String>,

    /// Glossary merge policy: first-wins, last-wins, or longest.
    #[arg(long)]
    pub merge_policy: Option<MergePolicy>,

    /// Ignore cached responses (responses are still cached).
    #[arg(long)]
    pub refresh: bool,

    /// Disable the response cache entirely.
    #[arg(long, conflicts_with = "refresh")]
    pub no_cache: bool,

    /// Omit previous/next links between section files.
    #[arg(long)]
    pub no_nav: bool,
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
        0 => "vinaya_notes=info",
        1 => "vinaya_notes=debug",
        _ => "vinaya_notes=trace",
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
        Command::Build(args) => cmd_build(config_path, args).await,
        Command::Verify { out } => cmd_verify(config_path, out),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load the config file given with `--config`, or the default one.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Apply command-line overrides on top of the file configuration.
fn build_config(app: &AppConfig, args: BuildArgs) -> BuildConfig {
    let mut config = BuildConfig::from(app);

    if let Some(out) = args.out {
        config.output_dir = out;
    }
    if let Some(scidmap) = args.scidmap {
        config.scidmap = scidmap;
    }
    if let Some(glossary) = args.glossary {
        config.glossary_path = glossary;
    }
    if let Some(edition) = args.edition {
        config.edition = edition;
    }
    if let Some(author) = args.author {
        config.author = author;
    }
    if let Some(policy) = args.merge_policy {
        config.merge_policy = policy;
    }
    config.notes_file = args.notes;
    config.fetch.refresh = args.refresh;
    if args.no_cache {
        config.fetch.cache_dir = None;
    }
    config.navigation = !args.no_nav;

    config
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(config_path: Option<&Path>, args: BuildArgs) -> Result<()> {
    let app = resolve_config(config_path)?;
    let config = build_config(&app, args);

    if config.edition.trim().is_empty() {
        return Err(eyre!("edition must not be empty"));
    }

    info!(
        edition = %config.edition,
        scidmap = %config.scidmap,
        out = %config.output_dir.display(),
        "building notes"
    );

    let reporter = CliProgress::new();
    let result = match vinaya_notes_core::run_build(&config, &reporter).await {
        Ok(result) => result,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };

    // Print summary
    println!();
    println!("  Notes built successfully!");
    println!("  Notes:    {}", result.note_count);
    println!("  Files:    {}", result.file_count);
    println!("  Terms:    {}", result.glossary_terms);
    println!("  Output:   {}", result.output_dir.display());
    println!("  Glossary: {}", result.glossary_path.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_verify(config_path: Option<&Path>, out: Option<PathBuf>) -> Result<()> {
    let dir = match out {
        Some(dir) => dir,
        None => PathBuf::from(resolve_config(config_path)?.output.dir),
    };

    let manifest = vinaya_notes_core::verify_output(&dir)?;

    println!(
        "{}: {} files, {} notes, {} glossary terms, OK",
        dir.display(),
        manifest.files.len(),
        manifest.note_count,
        manifest.glossary_terms
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created config file at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn abandon(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn notes_loaded(&self, count: usize) {
        self.spinner.set_message(format!("Loaded {count} notes"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}
