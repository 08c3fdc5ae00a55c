#![forbid(unsafe_code)]

//! Fixed-interval status polling against a destination's processing endpoint.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS};
use crate::error::SyncResult;
use crate::retry::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Error,
    Deleted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => f.write_str("error"),
            FailureKind::Deleted => f.write_str("deleted"),
        }
    }
}

/// What a single status check reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending { status: Option<String> },
    Ready,
    Failed { kind: FailureKind, reason: Option<String> },
}

/// Result of a whole polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready,
    Failed { kind: FailureKind, reason: Option<String> },
    TimedOut { attempts: u32 },
}

/// Anything that can answer "where is this upload now?".
pub trait StatusSource {
    fn check_status(&self, remote_id: &str) -> SyncResult<RemoteStatus>;
}

/// Polls until a terminal status or `max_attempts` checks. Failed checks
/// (network, non-200) still consume an attempt. No sleep follows the last
/// check.
pub fn wait_for_terminal<S: StatusSource + ?Sized>(
    source: &S,
    remote_id: &str,
    policy: PollPolicy,
    clock: &dyn Clock,
) -> PollOutcome {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match source.check_status(remote_id) {
            Ok(RemoteStatus::Ready) => {
                info!("{remote_id} finished processing after {attempt} check(s)");
                return PollOutcome::Ready;
            }
            Ok(RemoteStatus::Failed { kind, reason }) => {
                warn!(
                    "{remote_id} reached terminal state {kind} (reason: {})",
                    reason.as_deref().unwrap_or("none")
                );
                return PollOutcome::Failed { kind, reason };
            }
            Ok(RemoteStatus::Pending { status }) => {
                debug!(
                    "{remote_id} still processing ({}), check {attempt}/{attempts}",
                    status.as_deref().unwrap_or("unknown")
                );
            }
            Err(err) => {
                warn!("status check {attempt}/{attempts} for {remote_id} failed: {err}");
            }
        }
        if attempt < attempts {
            clock.sleep(policy.interval);
        }
    }
    warn!("{remote_id} did not reach a terminal state after {attempts} checks");
    PollOutcome::TimedOut { attempts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::retry::testing::RecordingClock;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct ScriptedSource {
        responses: RefCell<VecDeque<SyncResult<RemoteStatus>>>,
        calls: RefCell<u32>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<SyncResult<RemoteStatus>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.borrow()
        }
    }

    impl StatusSource for ScriptedSource {
        fn check_status(&self, _remote_id: &str) -> SyncResult<RemoteStatus> {
            *self.calls.borrow_mut() += 1;
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or(Ok(RemoteStatus::Pending { status: None }))
        }
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(5),
            max_attempts,
        }
    }

    #[test]
    fn deleted_status_stops_immediately() {
        let source = ScriptedSource::new(vec![Ok(RemoteStatus::Failed {
            kind: FailureKind::Deleted,
            reason: Some("copyright".into()),
        })]);
        let clock = RecordingClock::default();
        let outcome = wait_for_terminal(&source, "rt1", policy(120), &clock);
        assert_eq!(
            outcome,
            PollOutcome::Failed {
                kind: FailureKind::Deleted,
                reason: Some("copyright".into())
            }
        );
        assert_eq!(source.calls(), 1);
        assert!(clock.slept().is_empty());
    }

    #[test]
    fn ready_after_pending_checks() {
        let source = ScriptedSource::new(vec![
            Ok(RemoteStatus::Pending {
                status: Some("processing".into()),
            }),
            Err(SyncError::Transport("connection reset".into())),
            Ok(RemoteStatus::Ready),
        ]);
        let clock = RecordingClock::default();
        let outcome = wait_for_terminal(&source, "rt2", policy(10), &clock);
        assert_eq!(outcome, PollOutcome::Ready);
        assert_eq!(source.calls(), 3);
        assert_eq!(clock.slept(), vec![Duration::from_secs(5); 2]);
    }

    #[test]
    fn times_out_after_bound_with_fixed_interval() {
        let source = ScriptedSource::new(Vec::new());
        let clock = RecordingClock::default();
        let outcome = wait_for_terminal(&source, "rt3", policy(4), &clock);
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 4 });
        assert_eq!(source.calls(), 4);
        assert_eq!(clock.slept(), vec![Duration::from_secs(5); 3]);
    }
}
