use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::detect::{IndicatorSignal, MatcherKind, ReadinessIndicator};
use crate::error::{ConfigError, Result};

/// Top-level configuration. Every section has working defaults so the tool
/// runs without a config file; a TOML file overrides individual sections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckinConfig {
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub timeouts: TimeoutsSection,
    pub retry: RetrySection,
    pub target: TargetSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    /// Explicit browser binary; `None` lets chromiumoxide discover one.
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub load_strategy: LoadStrategy,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: true,
            disable_gpu: false,
            window_width: 1920,
            window_height: 1080,
            load_strategy: LoadStrategy::Normal,
        }
    }
}

/// How much of a page load `navigate` waits for before returning.
///
/// With `None` the navigation returns as soon as the request is issued and
/// the caller owes an explicit settle delay before touching the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    Normal,
    Eager,
    None,
}

impl Default for LoadStrategy {
    fn default() -> Self {
        LoadStrategy::Normal
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlagsSection {
    pub disable_automation_controlled: bool,
    pub disable_blink_features: Vec<String>,
    pub user_agent: String,
    pub lang: Option<String>,
}

impl Default for FlagsSection {
    fn default() -> Self {
        Self {
            disable_automation_controlled: true,
            disable_blink_features: vec!["AutomationControlled".into()],
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36"
                .into(),
            lang: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    pub page_load_secs: u64,
    pub script_secs: u64,
    pub login_wait_secs: u64,
    pub indicator_wait_secs: u64,
    pub poll_interval_ms: u64,
    pub settle_after_login_secs: u64,
    pub settle_after_nav_secs: u64,
    pub settle_after_click_secs: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            page_load_secs: 35,
            script_secs: 20,
            login_wait_secs: 20,
            indicator_wait_secs: 15,
            poll_interval_ms: 500,
            settle_after_login_secs: 3,
            settle_after_nav_secs: 3,
            settle_after_click_secs: 5,
        }
    }
}

impl TimeoutsSection {
    pub fn page_load(&self) -> Duration {
        Duration::from_secs(self.page_load_secs)
    }

    pub fn script(&self) -> Duration {
        Duration::from_secs(self.script_secs)
    }

    pub fn login_wait(&self) -> Duration {
        Duration::from_secs(self.login_wait_secs)
    }

    pub fn indicator_wait(&self) -> Duration {
        Duration::from_secs(self.indicator_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_after_login(&self) -> Duration {
        Duration::from_secs(self.settle_after_login_secs)
    }

    pub fn settle_after_nav(&self) -> Duration {
        Duration::from_secs(self.settle_after_nav_secs)
    }

    pub fn settle_after_click(&self) -> Duration {
        Duration::from_secs(self.settle_after_click_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_page_attempts: usize,
    pub cooldown_secs: u64,
    pub account_pause_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_page_attempts: 3,
            cooldown_secs: 5,
            account_pause_secs: 5,
        }
    }
}

impl RetrySection {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn account_pause(&self) -> Duration {
        Duration::from_secs(self.account_pause_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetSection {
    pub login_url: String,
    pub checkin_url: String,
    /// Substring of the location that marks "still on the login page".
    pub login_path_marker: String,
    /// Ordered readiness indicators; the first that resolves wins.
    pub indicators: Vec<ReadinessIndicator>,
    pub checkin_button: String,
    /// Button text that means the check-in already happened today.
    pub done_text: String,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            login_url: "https://leaflow.net/login".into(),
            checkin_url: "https://checkin.leaflow.net".into(),
            login_path_marker: "login".into(),
            indicators: vec![
                ReadinessIndicator {
                    matcher: MatcherKind::CssSelector,
                    pattern: "button.checkin-btn".into(),
                    signal: IndicatorSignal::Actionable,
                },
                ReadinessIndicator {
                    matcher: MatcherKind::XPathTextContains,
                    pattern: "//button[contains(text(), '签到')]".into(),
                    signal: IndicatorSignal::Actionable,
                },
                ReadinessIndicator {
                    matcher: MatcherKind::XPathTextContains,
                    pattern: "//*[contains(text(), '已签到')]".into(),
                    signal: IndicatorSignal::AlreadyDone,
                },
            ],
            checkin_button: "button.checkin-btn".into(),
            done_text: "已签到".into(),
        }
    }
}

pub fn load_checkin_config<P: AsRef<Path>>(path: P) -> Result<CheckinConfig> {
    let path = path.as_ref();
    let config: CheckinConfig = load_toml(path)?;
    validate(&config, path)?;
    Ok(config)
}

fn load_toml<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        source,
        path: PathBuf::from(path),
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        source,
        path: PathBuf::from(path),
    })
}

/// A config that parsed cleanly can still describe an engine that cannot
/// act; reject it before a browser is ever launched.
fn validate(config: &CheckinConfig, path: &Path) -> Result<()> {
    if config.target.indicators.is_empty() {
        return Err(ConfigError::Invalid {
            reason: "target.indicators must list at least one readiness indicator".into(),
            path: PathBuf::from(path),
        });
    }
    if config.retry.max_page_attempts == 0 {
        return Err(ConfigError::Invalid {
            reason: "retry.max_page_attempts must be at least 1".into(),
            path: PathBuf::from(path),
        });
    }
    Ok(())
}
