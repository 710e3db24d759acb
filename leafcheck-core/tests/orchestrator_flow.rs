use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use leafcheck_core::{
    Account, AccountOrchestrator, ButtonState, CheckinConfig, NullArtifactSink, PageDriver,
    ReadinessIndicator, SessionError, SessionFactory, SessionResult,
};

fn fast_config() -> Arc<CheckinConfig> {
    let mut config = CheckinConfig::default();
    config.timeouts.poll_interval_ms = 1;
    config.timeouts.indicator_wait_secs = 0;
    config.timeouts.login_wait_secs = 0;
    config.timeouts.settle_after_login_secs = 0;
    config.timeouts.settle_after_nav_secs = 0;
    config.timeouts.settle_after_click_secs = 0;
    config.retry.cooldown_secs = 0;
    config.retry.account_pause_secs = 0;
    Arc::new(config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    /// browser never starts
    LaunchFail,
    /// submit never leaves the login page
    BadCredentials,
    /// no readiness indicator ever resolves
    NeverReady,
    /// actionable button present and enabled
    ClickSuccess,
    /// only the "already done" text resolves
    AlreadyDone,
}

struct DriverState {
    behavior: Behavior,
    checkin_navigations: AtomicUsize,
    clicks: AtomicUsize,
    closed: AtomicBool,
    logged_in: Mutex<bool>,
}

impl DriverState {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            checkin_navigations: AtomicUsize::new(0),
            clicks: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            logged_in: Mutex::new(false),
        }
    }
}

struct ScriptedDriver {
    state: Arc<DriverState>,
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn goto(&self, url: &str, _timeout: Duration) -> SessionResult<()> {
        if url.contains("checkin") {
            self.state.checkin_navigations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn current_url(&self) -> SessionResult<String> {
        let logged_in = *self.state.logged_in.lock().unwrap();
        if logged_in && self.state.behavior != Behavior::BadCredentials {
            Ok("https://leaflow.net/dashboard".into())
        } else {
            Ok("https://leaflow.net/login".into())
        }
    }

    async fn fill_credentials(&self, _identifier: &str, _secret: &str) -> SessionResult<()> {
        *self.state.logged_in.lock().unwrap() = true;
        Ok(())
    }

    async fn indicator_present(&self, indicator: &ReadinessIndicator) -> SessionResult<bool> {
        Ok(match self.state.behavior {
            Behavior::ClickSuccess => indicator.pattern == "button.checkin-btn",
            Behavior::AlreadyDone => indicator.pattern.contains("已签到"),
            _ => false,
        })
    }

    async fn checkin_button_state(&self) -> SessionResult<Option<ButtonState>> {
        Ok(match self.state.behavior {
            Behavior::ClickSuccess => Some(ButtonState {
                text: "签到".into(),
                disabled: false,
            }),
            _ => None,
        })
    }

    async fn click_checkin(&self) -> SessionResult<()> {
        self.state.clicks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn screenshot(&self) -> SessionResult<Vec<u8>> {
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }

    async fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

struct ScriptedFactory {
    behaviors: Vec<Behavior>,
    next: AtomicUsize,
    states: Mutex<Vec<Arc<DriverState>>>,
}

impl ScriptedFactory {
    fn new(behaviors: Vec<Behavior>) -> Arc<Self> {
        Arc::new(Self {
            behaviors,
            next: AtomicUsize::new(0),
            states: Mutex::new(Vec::new()),
        })
    }

    fn states(&self) -> Vec<Arc<DriverState>> {
        self.states.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self) -> SessionResult<Box<dyn PageDriver>> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behaviors[index % self.behaviors.len()];
        if behavior == Behavior::LaunchFail {
            return Err(SessionError::Launch("chrome binary missing".into()));
        }
        let state = Arc::new(DriverState::new(behavior));
        self.states.lock().unwrap().push(Arc::clone(&state));
        Ok(Box::new(ScriptedDriver { state }))
    }
}

fn orchestrator(factory: Arc<ScriptedFactory>) -> AccountOrchestrator {
    AccountOrchestrator::new(fast_config(), factory, Arc::new(NullArtifactSink))
}

#[tokio::test]
async fn report_preserves_input_order_with_one_entry_each() {
    let factory = ScriptedFactory::new(vec![
        Behavior::ClickSuccess,
        Behavior::NeverReady,
        Behavior::AlreadyDone,
    ]);
    let accounts = vec![
        Account::new("alpha@x.com", "pw1"),
        Account::new("bravo@x.com", "pw2"),
        Account::new("carol@x.com", "pw3"),
    ];

    let report = orchestrator(Arc::clone(&factory)).run(&accounts).await;

    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.entries[0].identifier, "al***@x.com");
    assert_eq!(report.entries[1].identifier, "br***@x.com");
    assert_eq!(report.entries[2].identifier, "ca***@x.com");
    for entry in &report.entries {
        assert!(!entry.message.is_empty());
    }
    assert!(report.entries[0].success);
    assert!(!report.entries[1].success);
    assert!(report.entries[2].success);
    assert_eq!(report.entries[2].message, "already checked in");
}

#[tokio::test]
async fn login_failure_does_not_affect_the_next_account() {
    let factory = ScriptedFactory::new(vec![Behavior::BadCredentials, Behavior::ClickSuccess]);
    let accounts = vec![
        Account::new("bad@x.com", "wrong"),
        Account::new("good@x.com", "pw"),
    ];

    let report = orchestrator(Arc::clone(&factory)).run(&accounts).await;

    assert!(!report.entries[0].success);
    assert!(report.entries[0].message.contains("login failed"));
    assert!(report.entries[1].success);
    assert_eq!(report.entries[1].message, "checked in");

    // the failed account never reached the check-in page
    let states = factory.states();
    assert_eq!(states[0].checkin_navigations.load(Ordering::SeqCst), 0);
    assert_eq!(states[1].clicks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn launch_failure_is_recorded_not_propagated() {
    let factory = ScriptedFactory::new(vec![Behavior::LaunchFail, Behavior::ClickSuccess]);
    let accounts = vec![
        Account::new("first@x.com", "pw"),
        Account::new("second@x.com", "pw"),
    ];

    let report = orchestrator(Arc::clone(&factory)).run(&accounts).await;

    assert_eq!(report.entries.len(), 2);
    assert!(!report.entries[0].success);
    assert!(report.entries[0].message.contains("browser launch failed"));
    assert!(report.entries[1].success);
}

#[tokio::test]
async fn example_scenario_never_ready_then_success() {
    let factory = ScriptedFactory::new(vec![Behavior::NeverReady, Behavior::ClickSuccess]);
    let accounts = vec![Account::new("a@x.com", "pw1"), Account::new("b@x.com", "pw2")];

    let report = orchestrator(Arc::clone(&factory)).run(&accounts).await;

    assert!(!report.entries[0].success);
    assert_eq!(report.entries[0].message, "page never ready");
    assert!(report.entries[1].success);
    assert_eq!(report.entries[1].message, "checked in");

    let states = factory.states();
    // the retry budget is exactly three navigations, then terminal failure
    assert_eq!(states[0].checkin_navigations.load(Ordering::SeqCst), 3);
    assert_eq!(states[1].checkin_navigations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn every_session_is_closed_whatever_the_outcome() {
    let factory = ScriptedFactory::new(vec![
        Behavior::BadCredentials,
        Behavior::NeverReady,
        Behavior::ClickSuccess,
    ]);
    let accounts = vec![
        Account::new("a@x.com", "pw"),
        Account::new("b@x.com", "pw"),
        Account::new("c@x.com", "pw"),
    ];

    orchestrator(Arc::clone(&factory)).run(&accounts).await;

    let states = factory.states();
    assert_eq!(states.len(), 3);
    for state in states {
        assert!(state.closed.load(Ordering::SeqCst));
    }
}
