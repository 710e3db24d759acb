use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{CheckinConfig, LoadStrategy};
use crate::detect::{MatcherKind, ReadinessIndicator};

use super::driver::{ButtonState, PageDriver};
use super::error::{SessionError, SessionResult};
use super::stealth;

/// Environment-driven adjustments applied on top of the configured profile.
/// The CI collaborator sets `headless = Some(true)` and `sandbox =
/// Some(false)`; the core never inspects the environment itself.
#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
    pub sandbox: Option<bool>,
}

/// Immutable per-session browser profile, built once per account attempt.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub load_strategy: LoadStrategy,
    pub user_agent: String,
    pub lang: Option<String>,
    pub disable_blink_features: Vec<String>,
    pub disable_automation_controlled: bool,
    pub executable: Option<String>,
    pub page_load_timeout: Duration,
    pub script_timeout: Duration,
    pub checkin_button: String,
}

impl SessionConfig {
    pub fn from_config(config: &CheckinConfig, overrides: &LaunchOverrides) -> Self {
        Self {
            headless: overrides.headless.unwrap_or(config.chromium.headless),
            sandbox: overrides.sandbox.unwrap_or(config.chromium.sandbox),
            disable_gpu: config.chromium.disable_gpu,
            window_width: config.chromium.window_width,
            window_height: config.chromium.window_height,
            load_strategy: config.chromium.load_strategy,
            user_agent: config.flags.user_agent.clone(),
            lang: config.flags.lang.clone(),
            disable_blink_features: config.flags.disable_blink_features.clone(),
            disable_automation_controlled: config.flags.disable_automation_controlled,
            executable: config.chromium.executable_path.clone(),
            page_load_timeout: config.timeouts.page_load(),
            script_timeout: config.timeouts.script(),
            checkin_button: config.target.checkin_button.clone(),
        }
    }
}

/// One browser instance with a single page, exclusively owned by one
/// account's attempt. Always `close()`d before the next account starts so no
/// cookie or session state leaks between identities.
#[derive(Debug)]
pub struct BrowserSession {
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    page: Page,
    config: SessionConfig,
}

impl BrowserSession {
    pub async fn open(config: SessionConfig) -> SessionResult<Self> {
        let chromium_config = build_chromium_config(&config)?;
        info!(
            headless = config.headless,
            sandbox = config.sandbox,
            ua = %config.user_agent,
            "launching chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| SessionError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        let page = browser.new_page(CreateTargetParams::new("about:blank")).await?;
        stealth::apply(&page, &config).await?;

        Ok(Self {
            browser: Some(browser),
            handler_task: Some(handler_task),
            page,
            config,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> SessionResult<T> {
        let evaluation = async {
            self.page
                .evaluate(script)
                .await?
                .into_value::<T>()
                .map_err(|err| SessionError::Unexpected(err.to_string()))
        };
        timeout(self.config.script_timeout, evaluation)
            .await
            .map_err(|_| SessionError::ScriptTimeout("page script evaluation".into()))?
    }
}

fn build_chromium_config(config: &SessionConfig) -> SessionResult<ChromiumConfig> {
    let mut builder = ChromiumConfig::builder()
        .viewport(ChromiumViewport {
            width: config.window_width,
            height: config.window_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: config.window_width >= config.window_height,
            has_touch: false,
        })
        .request_timeout(config.page_load_timeout);

    if let Some(executable) = &config.executable {
        builder = builder.chrome_executable(executable);
    }
    if !config.headless {
        builder = builder.with_head();
    }
    if !config.sandbox {
        builder = builder.no_sandbox();
    }

    let mut args = vec![
        format!("--user-agent={}", config.user_agent),
        format!(
            "--window-size={},{}",
            config.window_width, config.window_height
        ),
        // keeps the renderer responsive on shared CI runners
        "--disable-renderer-backgrounding".into(),
        "--disable-backgrounding-occluded-windows".into(),
        "--disable-ipc-flooding-protection".into(),
        "--no-first-run".into(),
    ];
    if !config.sandbox {
        args.push("--disable-dev-shm-usage".into());
    }
    if config.disable_gpu {
        args.push("--disable-gpu".into());
    }
    for feature in &config.disable_blink_features {
        args.push(format!("--disable-blink-features={feature}"));
    }
    if config.disable_automation_controlled {
        args.push("--disable-features=AutomationControlled".into());
    }
    if let Some(lang) = &config.lang {
        args.push(format!("--lang={lang}"));
    }
    builder = builder.args(args);

    builder.build().map_err(SessionError::Configuration)
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str, limit: Duration) -> SessionResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(SessionError::Configuration)?;
        let strategy = self.config.load_strategy;
        let page = &self.page;

        let navigation = async move {
            page.goto(params).await?;
            match strategy {
                LoadStrategy::Normal => {
                    page.wait_for_navigation().await?;
                }
                LoadStrategy::Eager => {
                    loop {
                        let state: String = page
                            .evaluate("document.readyState")
                            .await?
                            .into_value()
                            .map_err(|err| SessionError::Unexpected(err.to_string()))?;
                        if state == "interactive" || state == "complete" {
                            break;
                        }
                        sleep(Duration::from_millis(100)).await;
                    }
                }
                // caller owes a settle delay before querying the DOM
                LoadStrategy::None => {}
            }
            Ok::<(), SessionError>(())
        };

        match timeout(limit, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(SessionError::Cdp(err))) => Err(SessionError::Navigation(err.to_string())),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SessionError::NavigationTimeout(format!(
                "{url} did not load within {}s",
                limit.as_secs()
            ))),
        }
    }

    async fn current_url(&self) -> SessionResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn fill_credentials(&self, identifier: &str, secret: &str) -> SessionResult<()> {
        // email-typed input preferred, generic text input tolerated
        let field = match self.page.find_element("input[type='email']").await {
            Ok(element) => element,
            Err(_) => self
                .page
                .find_element("input[type='text']")
                .await
                .map_err(|err| {
                    SessionError::Unexpected(format!("credential field not found: {err}"))
                })?,
        };
        field.click().await?;
        field.type_str(identifier).await?;

        let secret_field = self
            .page
            .find_element("input[type='password']")
            .await
            .map_err(|err| SessionError::Unexpected(format!("password field not found: {err}")))?;
        secret_field.click().await?;
        secret_field.type_str(secret).await?;

        let submit = self
            .page
            .find_element("button[type='submit']")
            .await
            .map_err(|err| SessionError::Unexpected(format!("submit button not found: {err}")))?;
        submit.click().await?;
        Ok(())
    }

    async fn indicator_present(&self, indicator: &ReadinessIndicator) -> SessionResult<bool> {
        match indicator.matcher {
            MatcherKind::CssSelector => {
                Ok(self.page.find_element(indicator.pattern.as_str()).await.is_ok())
            }
            MatcherKind::XPathTextContains => {
                let xpath = serde_json::to_string(&indicator.pattern)
                    .map_err(|err| SessionError::Unexpected(err.to_string()))?;
                let script = format!(
                    "document.evaluate({xpath}, document, null, \
                     XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue !== null"
                );
                self.eval(&script).await
            }
        }
    }

    async fn checkin_button_state(&self) -> SessionResult<Option<ButtonState>> {
        let selector = serde_json::to_string(&self.config.checkin_button)
            .map_err(|err| SessionError::Unexpected(err.to_string()))?;
        let script = format!(
            "(() => {{
                const btn = document.querySelector({selector});
                if (!btn) {{
                    return {{ found: false, text: '', disabled: false }};
                }}
                return {{
                    found: true,
                    text: (btn.innerText || btn.textContent || '').trim(),
                    disabled: btn.disabled || btn.hasAttribute('disabled'),
                }};
            }})()"
        );
        let probe: ButtonProbe = self.eval(&script).await?;
        if probe.found {
            Ok(Some(ButtonState {
                text: probe.text,
                disabled: probe.disabled,
            }))
        } else {
            Ok(None)
        }
    }

    async fn click_checkin(&self) -> SessionResult<()> {
        let element = self
            .page
            .find_element(self.config.checkin_button.as_str())
            .await
            .map_err(|err| SessionError::StaleElement(format!("check-in button vanished: {err}")))?;
        element
            .click()
            .await
            .map_err(|err| SessionError::StaleElement(err.to_string()))?;
        Ok(())
    }

    async fn screenshot(&self) -> SessionResult<Vec<u8>> {
        let params = ScreenshotParams::builder().build();
        Ok(self.page.screenshot(params).await?)
    }

    async fn close(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        info!("shutting down chromium instance");
        if let Err(err) = browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "browser handler join error");
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ButtonProbe {
    found: bool,
    text: String,
    disabled: bool,
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("BrowserSession dropped without explicit close");
        }
    }
}
