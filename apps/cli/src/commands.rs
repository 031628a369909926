//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use scribe_core::ProgressReporter;
use scribe_shared::{
    AppConfig, Message, RuntimeConfig, Session, config_file_path, init_config, load_config,
    load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Scribe — research-then-write content generation.
#[derive(Parser)]
#[command(
    name = "scribe",
    version,
    about = "Generate researched markdown content from a conversation.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.scribe/scribe.toml.
    #[arg(long, global = true, env = "SCRIBE_CONFIG")]
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
    /// Serve the generation API over HTTP.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one generation and print the markdown.
    Generate {
        /// The request to answer.
        prompt: String,

        /// JSON file with prior messages (`{"messages": [...]}`).
        #[arg(short, long)]
        session: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "scribe=info,tower_http=info",
        1 => "scribe=debug,tower_http=debug",
        _ => "scribe=trace,tower_http=trace",
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
    let config = load_app_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => cmd_serve(config, host, port).await,
        Command::Generate { prompt, session } => {
            cmd_generate(&config, &prompt, session.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config, cli.config.as_deref()),
        },
    }
}

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    // Credentials are acquired once, here, and injected into every request.
    let runtime = RuntimeConfig::resolve(&config)?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        model = %runtime.llm.model,
        "starting server"
    );
    println!(
        "Serving POST http://{}:{}/generate",
        config.server.host, config.server.port
    );

    scribe_server::serve(runtime, &config.server).await?;
    Ok(())
}

async fn cmd_generate(config: &AppConfig, prompt: &str, session_file: Option<&Path>) -> Result<()> {
    let runtime = RuntimeConfig::resolve(config)?;

    let prior = match session_file {
        Some(path) => read_session(path)?,
        None => Session::default(),
    };
    let session = with_prompt(prior, prompt);

    info!(messages = session.messages.len(), "generating content");

    let reporter = CliProgress::new();
    let result = scribe_core::generate_content_with_progress(&session, &runtime, &reporter).await;
    reporter.finish();

    let content = result?;
    println!("{content}");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig, path: Option<&Path>) -> Result<()> {
    let source = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    let rendered = toml::to_string_pretty(config).map_err(|e| eyre!("cannot render config: {e}"))?;

    println!("# source: {}", source.display());
    println!(
        "# {}: {}",
        config.llm.api_key_env,
        key_status(&config.llm.api_key_env)
    );
    println!(
        "# {}: {}",
        config.search.api_key_env,
        key_status(&config.search.api_key_env)
    );
    println!();
    print!("{rendered}");
    Ok(())
}

fn key_status(var: &str) -> &'static str {
    match std::env::var(var) {
        Ok(v) if !v.is_empty() => "set",
        _ => "missing",
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read a session JSON file.
fn read_session(path: &Path) -> Result<Session> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read session file '{}': {e}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|e| eyre!("invalid session file '{}': {e}", path.display()))
}

/// Append the prompt as the current user message.
fn with_prompt(mut session: Session, prompt: &str) -> Session {
    session.messages.push(Message::user(prompt));
    session
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }
}
