use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use leafcheck_core::{
    load_checkin_config, parse_accounts, AccountOrchestrator, ArtifactSink, CheckinConfig,
    LaunchOverrides, Launcher, NullArtifactSink, Report, ReportEntry,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] leafcheck_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no accounts configured in ${0} (expected email:password pairs, comma separated)")]
    NoAccounts(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Unattended daily check-in runner", long_about = None)]
pub struct Cli {
    /// Optional TOML config; built-in defaults apply when absent
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Environment variable holding the email:password pairs
    #[arg(long, default_value = "LEAFLOW_ACCOUNTS")]
    pub accounts_env: String,
    /// Directory for diagnostic page snapshots; discarded when unset
    #[arg(long)]
    pub screenshot_dir: Option<PathBuf>,
    /// Run with a visible browser window
    #[arg(long, default_value_t = false)]
    pub headed: bool,
    /// Report output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();

    let config = match &cli.config {
        Some(path) => load_checkin_config(path)?,
        None => CheckinConfig::default(),
    };

    let raw = std::env::var(&cli.accounts_env).unwrap_or_default();
    let accounts = parse_accounts(&raw);
    if accounts.is_empty() {
        return Err(AppError::NoAccounts(cli.accounts_env.clone()));
    }
    info!(count = accounts.len(), "accounts loaded");

    let config = Arc::new(config);
    let factory = Arc::new(Launcher::new(
        Arc::clone(&config),
        launch_overrides(cli.headed),
    ));
    let sink: Arc<dyn ArtifactSink> = match &cli.screenshot_dir {
        Some(dir) => Arc::new(FsArtifactSink::new(dir.clone())),
        None => Arc::new(NullArtifactSink),
    };
    let orchestrator = AccountOrchestrator::new(config, factory, sink);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(orchestrator.run(&accounts));

    // partial failure is a normal run; the exit status means "ran"
    render(&report, cli.format)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// CI runners get the headless, sandbox-less profile; `--headed` wins over
/// the configured headless mode for local debugging.
fn launch_overrides(headed: bool) -> LaunchOverrides {
    let mut overrides = LaunchOverrides::default();
    let on_ci = std::env::var_os("GITHUB_ACTIONS").is_some() || std::env::var_os("CI").is_some();
    if on_ci {
        overrides.headless = Some(true);
        overrides.sandbox = Some(false);
    }
    if headed {
        overrides.headless = Some(false);
    }
    overrides
}

fn render(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for entry in &report.entries {
                println!("{}", text_line(entry));
            }
            Ok(())
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
            Ok(())
        }
    }
}

fn text_line(entry: &ReportEntry) -> String {
    let marker = if entry.success { "✓" } else { "✗" };
    format!("{marker} {}: {}", entry.identifier, entry.message)
}

/// Writes `{name}.png` under the configured directory. Store failures are
/// logged and swallowed; diagnostics must never fail the attempt.
pub struct FsArtifactSink {
    dir: PathBuf,
}

impl FsArtifactSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ArtifactSink for FsArtifactSink {
    async fn store(&self, name: &str, png: &[u8]) {
        if let Err(err) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %err, "cannot create snapshot directory");
            return;
        }
        let path = self.dir.join(format!("{name}.png"));
        match tokio::fs::write(&path, png).await {
            Ok(()) => info!(path = %path.display(), "diagnostic snapshot stored"),
            Err(err) => warn!(path = %path.display(), error = %err, "failed to persist snapshot"),
        }
    }
}
