use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::detect::ReadinessIndicator;

use super::error::SessionResult;

/// Observed state of the actionable check-in button.
#[derive(Debug, Clone, Deserialize)]
pub struct ButtonState {
    pub text: String,
    pub disabled: bool,
}

/// The page operations the engine and detector need from a live session.
/// `BrowserSession` is the real implementation; tests substitute mocks.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate with an upper bound. How much of the load this waits for is
    /// the session's load strategy; with `LoadStrategy::None` the caller
    /// must settle before querying the DOM.
    async fn goto(&self, url: &str, timeout: Duration) -> SessionResult<()>;

    async fn current_url(&self) -> SessionResult<String>;

    /// Fill the login form: identifier into an email-typed input (falling
    /// back to a generic text input), secret into the password field, then
    /// submit.
    async fn fill_credentials(&self, identifier: &str, secret: &str) -> SessionResult<()>;

    /// Whether a readiness indicator currently resolves on the page.
    async fn indicator_present(&self, indicator: &ReadinessIndicator) -> SessionResult<bool>;

    /// State of the check-in button, `None` when it is absent.
    async fn checkin_button_state(&self) -> SessionResult<Option<ButtonState>>;

    async fn click_checkin(&self) -> SessionResult<()>;

    async fn screenshot(&self) -> SessionResult<Vec<u8>>;

    /// Idempotent; releases the underlying browser.
    async fn close(&mut self);
}
