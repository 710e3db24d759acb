use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::accounts::Account;
use crate::artifact::ArtifactSink;
use crate::browser::{BrowserSession, LaunchOverrides, PageDriver, SessionConfig, SessionResult};
use crate::config::CheckinConfig;
use crate::engine::{AttemptOutcome, CheckinEngine};

/// Opens a fresh session for each account attempt. The real factory launches
/// chromium; tests substitute scripted drivers.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> SessionResult<Box<dyn PageDriver>>;
}

pub struct Launcher {
    config: Arc<CheckinConfig>,
    overrides: LaunchOverrides,
}

impl Launcher {
    pub fn new(config: Arc<CheckinConfig>, overrides: LaunchOverrides) -> Self {
        Self { config, overrides }
    }
}

#[async_trait]
impl SessionFactory for Launcher {
    async fn open(&self) -> SessionResult<Box<dyn PageDriver>> {
        let session_config = SessionConfig::from_config(&self.config, &self.overrides);
        let session = BrowserSession::open(session_config).await?;
        Ok(Box::new(session))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub identifier: String,
    pub success: bool,
    pub message: String,
}

/// One entry per account, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub entries: Vec<ReportEntry>,
}

/// Runs the engine once per account, strictly sequentially. Each account
/// gets a fresh browser session that is always closed before the next one
/// starts, whatever the outcome; per-account failures are recorded in the
/// report and never abort the run.
pub struct AccountOrchestrator {
    config: Arc<CheckinConfig>,
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn ArtifactSink>,
    engine: CheckinEngine,
}

impl AccountOrchestrator {
    pub fn new(
        config: Arc<CheckinConfig>,
        factory: Arc<dyn SessionFactory>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        let engine = CheckinEngine::new(Arc::clone(&config));
        Self {
            config,
            factory,
            sink,
            engine,
        }
    }

    pub async fn run(&self, accounts: &[Account]) -> Report {
        let mut report = Report::default();
        for (position, account) in accounts.iter().enumerate() {
            let outcome = self.run_one(account).await;
            info!(
                account = %account.masked(),
                success = outcome.success(),
                message = %outcome.message(),
                "account finished"
            );
            report.entries.push(ReportEntry {
                identifier: account.masked(),
                success: outcome.success(),
                message: outcome.message(),
            });
            if position + 1 < accounts.len() {
                sleep(self.config.retry.account_pause()).await;
            }
        }
        report
    }

    async fn run_one(&self, account: &Account) -> AttemptOutcome {
        let mut driver = match self.factory.open().await {
            Ok(driver) => driver,
            Err(err) => {
                warn!(account = %account.masked(), error = %err, "browser launch failed");
                return AttemptOutcome::Failed(format!("browser launch failed: {err}"));
            }
        };
        let outcome = self
            .engine
            .run(driver.as_ref(), self.sink.as_ref(), account)
            .await;
        driver.close().await;
        outcome
    }
}
