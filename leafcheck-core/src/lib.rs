pub mod accounts;
pub mod artifact;
pub mod browser;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod orchestrator;

pub use accounts::{parse_accounts, Account};
pub use artifact::{artifact_name, ArtifactSink, NullArtifactSink};
pub use browser::{
    BrowserSession, ButtonState, LaunchOverrides, PageDriver, SessionConfig, SessionError,
    SessionResult,
};
pub use config::{load_checkin_config, CheckinConfig, LoadStrategy};
pub use detect::{IndicatorSignal, Matched, MatcherKind, ReadinessDetector, ReadinessIndicator};
pub use engine::{AttemptOutcome, CheckinEngine};
pub use error::{ConfigError, Result};
pub use orchestrator::{AccountOrchestrator, Launcher, Report, ReportEntry, SessionFactory};
