use std::sync::Arc;

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::accounts::Account;
use crate::artifact::{artifact_name, ArtifactSink};
use crate::browser::{PageDriver, SessionResult};
use crate::config::{CheckinConfig, LoadStrategy};
use crate::detect::{IndicatorSignal, ReadinessDetector};

/// Final state of one account's attempt. Exactly one is produced per
/// account per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    AlreadyCompleted,
    Succeeded,
    Failed(String),
    LoginFailed(String),
}

impl AttemptOutcome {
    pub fn success(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::AlreadyCompleted | AttemptOutcome::Succeeded
        )
    }

    pub fn message(&self) -> String {
        match self {
            AttemptOutcome::AlreadyCompleted => "already checked in".into(),
            AttemptOutcome::Succeeded => "checked in".into(),
            AttemptOutcome::Failed(reason) => reason.clone(),
            AttemptOutcome::LoginFailed(reason) => format!("login failed: {reason}"),
        }
    }
}

/// Drives one account through login, page readiness and the check-in click.
///
/// Login failure is terminal. The check-in page gets a bounded number of
/// navigation attempts; a not-ready page or a stale click consumes one
/// attempt and the loop cools down before the next. Readiness indicators
/// resolve in priority order, actionable button first, so a page exposing
/// both the button and the "already done" text lands on the actionable path
/// deterministically.
pub struct CheckinEngine {
    config: Arc<CheckinConfig>,
    detector: ReadinessDetector,
}

impl CheckinEngine {
    pub fn new(config: Arc<CheckinConfig>) -> Self {
        let detector = ReadinessDetector::new(
            config.timeouts.indicator_wait(),
            config.timeouts.poll_interval(),
        );
        Self { config, detector }
    }

    pub async fn run(
        &self,
        driver: &dyn PageDriver,
        sink: &dyn ArtifactSink,
        account: &Account,
    ) -> AttemptOutcome {
        if let Err(reason) = self.login(driver, account).await {
            warn!(account = %account.masked(), reason, "login failed, abandoning account");
            return AttemptOutcome::LoginFailed(reason);
        }
        info!(account = %account.masked(), "logged in");
        self.checkin(driver, sink, account).await
    }

    async fn login(&self, driver: &dyn PageDriver, account: &Account) -> Result<(), String> {
        let timeouts = &self.config.timeouts;
        let target = &self.config.target;

        driver
            .goto(&target.login_url, timeouts.page_load())
            .await
            .map_err(|err| err.to_string())?;
        sleep(timeouts.settle_after_login()).await;

        driver
            .fill_credentials(account.email(), account.secret())
            .await
            .map_err(|err| err.to_string())?;

        // Submission succeeded once the location leaves the login path.
        let deadline = Instant::now() + timeouts.login_wait();
        loop {
            let url = driver.current_url().await.map_err(|err| err.to_string())?;
            if !url.contains(&target.login_path_marker) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err("still on login page after submit".into());
            }
            sleep(timeouts.poll_interval()).await;
        }
    }

    async fn checkin(
        &self,
        driver: &dyn PageDriver,
        sink: &dyn ArtifactSink,
        account: &Account,
    ) -> AttemptOutcome {
        let retry = &self.config.retry;
        for attempt in 1..=retry.max_page_attempts {
            info!(account = %account.masked(), attempt, "opening check-in page");
            match self.attempt_once(driver).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => {
                    warn!(account = %account.masked(), attempt, "check-in page not ready");
                }
                Err(err) => {
                    warn!(account = %account.masked(), attempt, error = %err, "check-in attempt failed");
                }
            }
            self.capture_diagnostic(driver, sink, account, attempt).await;
            if attempt < retry.max_page_attempts {
                sleep(retry.cooldown()).await;
            }
        }
        AttemptOutcome::Failed("page never ready".into())
    }

    /// One full navigation + readiness + evaluation pass. `Ok(None)` means
    /// the page was not actionable this time and the attempt budget decides
    /// what happens next; `Err` covers navigation and stale-click failures,
    /// which are retried on the same budget.
    async fn attempt_once(&self, driver: &dyn PageDriver) -> SessionResult<Option<AttemptOutcome>> {
        let timeouts = &self.config.timeouts;
        let target = &self.config.target;

        driver.goto(&target.checkin_url, timeouts.page_load()).await?;
        if self.config.chromium.load_strategy == LoadStrategy::None {
            // Contract: strategy None returns before the DOM settles.
            sleep(timeouts.settle_after_nav()).await;
        }

        let matched = match self.detector.await_any(driver, &target.indicators).await {
            Some(matched) => matched,
            None => return Ok(None),
        };

        if matched.indicator.signal == IndicatorSignal::AlreadyDone {
            return Ok(Some(AttemptOutcome::AlreadyCompleted));
        }

        match driver.checkin_button_state().await? {
            None => Ok(None),
            Some(state) if state.disabled || state.text.contains(&target.done_text) => {
                Ok(Some(AttemptOutcome::AlreadyCompleted))
            }
            Some(_) => {
                driver.click_checkin().await?;
                sleep(timeouts.settle_after_click()).await;
                Ok(Some(AttemptOutcome::Succeeded))
            }
        }
    }

    async fn capture_diagnostic(
        &self,
        driver: &dyn PageDriver,
        sink: &dyn ArtifactSink,
        account: &Account,
        attempt: usize,
    ) {
        let name = artifact_name(account, attempt);
        match driver.screenshot().await {
            Ok(png) => sink.store(&name, &png).await,
            Err(err) => {
                warn!(account = %account.masked(), error = %err, "failed to capture diagnostic snapshot");
            }
        }
    }
}
