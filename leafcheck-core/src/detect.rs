use std::time::Duration;

use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::browser::PageDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    CssSelector,
    XPathTextContains,
}

/// What a resolved indicator means for the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorSignal {
    Actionable,
    AlreadyDone,
}

/// A DOM condition whose presence signals the check-in page has rendered
/// enough to act on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadinessIndicator {
    pub matcher: MatcherKind,
    pub pattern: String,
    pub signal: IndicatorSignal,
}

#[derive(Debug, Clone)]
pub struct Matched {
    pub index: usize,
    pub indicator: ReadinessIndicator,
}

/// Polls indicators strictly in priority order, each with its own timeout.
/// Total detection time is bounded by the sum of per-indicator timeouts;
/// later indicators (the "already done" text) are only consulted once the
/// actionable ones have been exhausted.
#[derive(Debug, Clone)]
pub struct ReadinessDetector {
    per_indicator_timeout: Duration,
    poll_interval: Duration,
}

impl ReadinessDetector {
    pub fn new(per_indicator_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            per_indicator_timeout,
            poll_interval,
        }
    }

    /// `None` means "page not ready", not an error; navigation failures are
    /// surfaced by the session, never from here.
    pub async fn await_any(
        &self,
        driver: &dyn PageDriver,
        indicators: &[ReadinessIndicator],
    ) -> Option<Matched> {
        for (index, indicator) in indicators.iter().enumerate() {
            let deadline = Instant::now() + self.per_indicator_timeout;
            loop {
                match driver.indicator_present(indicator).await {
                    Ok(true) => {
                        return Some(Matched {
                            index,
                            indicator: indicator.clone(),
                        });
                    }
                    Ok(false) => {}
                    Err(err) => {
                        debug!(pattern = %indicator.pattern, error = %err, "indicator probe failed");
                    }
                }
                if Instant::now() >= deadline {
                    break;
                }
                sleep(self.poll_interval).await;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ButtonState, SessionError, SessionResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn indicator(pattern: &str, signal: IndicatorSignal) -> ReadinessIndicator {
        ReadinessIndicator {
            matcher: MatcherKind::CssSelector,
            pattern: pattern.into(),
            signal,
        }
    }

    /// Driver whose indicator probes answer from a fixed table; everything
    /// else is unreachable in these tests.
    struct TableDriver {
        present: Vec<&'static str>,
        probes: AtomicUsize,
        /// pattern that starts resolving after N probes
        late: Mutex<Option<(&'static str, usize)>>,
    }

    impl TableDriver {
        fn new(present: Vec<&'static str>) -> Self {
            Self {
                present,
                probes: AtomicUsize::new(0),
                late: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl crate::browser::PageDriver for TableDriver {
        async fn goto(&self, _url: &str, _timeout: Duration) -> SessionResult<()> {
            unreachable!()
        }

        async fn current_url(&self) -> SessionResult<String> {
            unreachable!()
        }

        async fn fill_credentials(&self, _identifier: &str, _secret: &str) -> SessionResult<()> {
            unreachable!()
        }

        async fn indicator_present(&self, indicator: &ReadinessIndicator) -> SessionResult<bool> {
            let probe = self.probes.fetch_add(1, Ordering::SeqCst);
            if let Some((pattern, after)) = *self.late.lock().unwrap() {
                if indicator.pattern == pattern {
                    return Ok(probe >= after);
                }
            }
            Ok(self.present.iter().any(|p| *p == indicator.pattern))
        }

        async fn checkin_button_state(&self) -> SessionResult<Option<ButtonState>> {
            unreachable!()
        }

        async fn click_checkin(&self) -> SessionResult<()> {
            Err(SessionError::Unexpected("not a click test".into()))
        }

        async fn screenshot(&self) -> SessionResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn close(&mut self) {}
    }

    fn detector() -> ReadinessDetector {
        ReadinessDetector::new(Duration::from_millis(40), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn first_matching_indicator_wins() {
        let driver = TableDriver::new(vec!["button.checkin-btn", "done-text"]);
        let indicators = vec![
            indicator("button.checkin-btn", IndicatorSignal::Actionable),
            indicator("done-text", IndicatorSignal::AlreadyDone),
        ];
        let matched = detector().await_any(&driver, &indicators).await.unwrap();
        assert_eq!(matched.index, 0);
        assert_eq!(matched.indicator.signal, IndicatorSignal::Actionable);
    }

    #[tokio::test]
    async fn falls_through_to_lower_priority_indicator() {
        let driver = TableDriver::new(vec!["done-text"]);
        let indicators = vec![
            indicator("button.checkin-btn", IndicatorSignal::Actionable),
            indicator("done-text", IndicatorSignal::AlreadyDone),
        ];
        let matched = detector().await_any(&driver, &indicators).await.unwrap();
        assert_eq!(matched.index, 1);
        assert_eq!(matched.indicator.signal, IndicatorSignal::AlreadyDone);
    }

    #[tokio::test]
    async fn nothing_matches_returns_none() {
        let driver = TableDriver::new(vec![]);
        let indicators = vec![
            indicator("button.checkin-btn", IndicatorSignal::Actionable),
            indicator("done-text", IndicatorSignal::AlreadyDone),
        ];
        assert!(detector().await_any(&driver, &indicators).await.is_none());
    }

    #[tokio::test]
    async fn keeps_polling_until_the_indicator_appears() {
        let driver = TableDriver::new(vec![]);
        *driver.late.lock().unwrap() = Some(("button.checkin-btn", 3));
        let indicators = vec![indicator("button.checkin-btn", IndicatorSignal::Actionable)];
        let matched = detector().await_any(&driver, &indicators).await.unwrap();
        assert_eq!(matched.index, 0);
        assert!(driver.probes.load(Ordering::SeqCst) >= 3);
    }
}
