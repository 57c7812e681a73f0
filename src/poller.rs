//! Background discussion poller.
//!
//! A single tokio task fetches the discussion on a fixed cadence and
//! reports what it saw over an event channel. It is controlled only through
//! [`PollerHandle`]; the live view never touches the session state directly.
//!
//! # Protocol
//!
//! Each poll session emits `Started`, then any number of `Data` / `Error`
//! events, then exactly one `Stopped`. Events of two sessions never
//! interleave: a `Start` that arrives while a stopped session is still
//! waiting on its last fetch is held until that session's `Stopped` is out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::PollConfig;
use crate::error::Result;
use crate::model::DiscussionSnapshot;

/// Anything that can produce the current state of a discussion.
#[async_trait]
pub trait DiscussionSource: Send + Sync {
    async fn fetch_discussion(&self, discussion_id: &str, token: &str) -> Result<DiscussionSnapshot>;
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    /// Interval multiplied by `factor` per consecutive failure, capped.
    Exponential { factor: f64, max_interval: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Consecutive failures after which the session gives up.
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self { max_attempts, interval, backoff: Backoff::Fixed }
    }

    pub fn from_config(cfg: &PollConfig) -> Self {
        let interval = Duration::from_millis(cfg.interval_ms);
        let backoff = if cfg.backoff_factor > 1.0 {
            Backoff::Exponential {
                factor: cfg.backoff_factor,
                max_interval: Duration::from_millis(cfg.max_interval_ms),
            }
        } else {
            Backoff::Fixed
        };
        Self { max_attempts: cfg.max_attempts, interval, backoff }
    }

    /// Pause before the next fetch, given the current failure streak.
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { factor, max_interval } => {
                let exp = i32::try_from(consecutive_failures).unwrap_or(i32::MAX);
                let scaled = self.interval.as_secs_f64() * factor.powi(exp);
                if scaled.is_finite() {
                    Duration::from_secs_f64(scaled).min(max_interval)
                } else {
                    max_interval
                }
            }
        }
    }

    pub fn is_exhausted(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollCommand {
    Start { discussion_id: String, token: String },
    Stop,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The backend reported a terminal status.
    Terminal,
    /// The consecutive-failure ceiling was reached.
    RetriesExhausted,
    /// `Stop` or `Shutdown` was requested.
    Requested,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Terminal         => write!(f, "terminal status"),
            StopReason::RetriesExhausted => write!(f, "retries exhausted"),
            StopReason::Requested        => write!(f, "requested"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Started,
    Stopped(StopReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Data(Box<DiscussionSnapshot>),
    Error { message: String, attempt: u32 },
    Status(PollStatus),
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Command side of a running poller. The task exits on `shutdown` or when
/// every handle has been dropped.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    tx: mpsc::Sender<PollCommand>,
}

impl PollerHandle {
    pub async fn start(&self, discussion_id: impl Into<String>, token: impl Into<String>) {
        self.send(PollCommand::Start {
            discussion_id: discussion_id.into(),
            token: token.into(),
        })
        .await;
    }

    pub async fn stop(&self) {
        self.send(PollCommand::Stop).await;
    }

    pub async fn shutdown(&self) {
        self.send(PollCommand::Shutdown).await;
    }

    async fn send(&self, cmd: PollCommand) {
        if self.tx.send(cmd).await.is_err() {
            debug!("poller task already exited; command dropped");
        }
    }
}

/// Spawn the poller task.
pub fn spawn_poller(
    source: Arc<dyn DiscussionSource>,
    policy: RetryPolicy,
) -> (PollerHandle, mpsc::Receiver<PollEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);
    let worker = Poller {
        source,
        policy,
        commands: cmd_rx,
        events: event_tx,
        commands_closed: false,
    };
    tokio::spawn(worker.run());
    (PollerHandle { tx: cmd_tx }, event_rx)
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Session {
    discussion_id: String,
    token: String,
}

/// Command bookkeeping while a session runs.
#[derive(Debug, Default)]
struct SessionControl {
    active: bool,
    queued: Option<Session>,
    shutdown: bool,
}

impl SessionControl {
    fn apply(&mut self, cmd: Option<PollCommand>) {
        match cmd {
            Some(PollCommand::Start { discussion_id, .. }) if self.active => {
                debug!(%discussion_id, "poll session already active; start ignored");
            }
            Some(PollCommand::Start { discussion_id, token }) => {
                debug!(%discussion_id, "start queued behind stopping session");
                self.queued = Some(Session { discussion_id, token });
            }
            Some(PollCommand::Stop) => {
                self.active = false;
                self.queued = None;
            }
            Some(PollCommand::Shutdown) | None => {
                self.active = false;
                self.queued = None;
                self.shutdown = true;
            }
        }
    }
}

struct Poller {
    source: Arc<dyn DiscussionSource>,
    policy: RetryPolicy,
    commands: mpsc::Receiver<PollCommand>,
    events: mpsc::Sender<PollEvent>,
    commands_closed: bool,
}

impl Poller {
    async fn run(mut self) {
        let mut next: Option<Session> = None;
        loop {
            let session = match next.take() {
                Some(s) => s,
                None => match self.commands.recv().await {
                    Some(PollCommand::Start { discussion_id, token }) => Session { discussion_id, token },
                    Some(PollCommand::Stop) => continue,
                    Some(PollCommand::Shutdown) | None => break,
                },
            };

            let mut ctl = SessionControl { active: true, ..Default::default() };
            let reason = self.run_session(&session, &mut ctl).await;
            info!(discussion_id = %session.discussion_id, %reason, "poll session stopped");
            self.emit(PollEvent::Status(PollStatus::Stopped(reason))).await;

            if ctl.shutdown || self.events.is_closed() {
                break;
            }
            next = ctl.queued.take();
        }
        debug!("poller task exiting");
    }

    async fn run_session(&mut self, session: &Session, ctl: &mut SessionControl) -> StopReason {
        info!(discussion_id = %session.discussion_id, "poll session started");
        self.emit(PollEvent::Status(PollStatus::Started)).await;
        let mut consecutive_failures: u32 = 0;

        loop {
            // One fetch in flight at a time. Commands are still handled while
            // it runs, but the fetch itself always runs to completion.
            let source = Arc::clone(&self.source);
            let fetch = source.fetch_discussion(&session.discussion_id, &session.token);
            tokio::pin!(fetch);
            let result = loop {
                tokio::select! {
                    r = &mut fetch => break r,
                    cmd = self.commands.recv(), if !self.commands_closed => {
                        self.commands_closed |= cmd.is_none();
                        ctl.apply(cmd);
                    }
                }
            };

            if !ctl.active {
                debug!(discussion_id = %session.discussion_id, "discarding fetch result of stopped session");
                return StopReason::Requested;
            }

            match result {
                Ok(snapshot) => {
                    consecutive_failures = 0;
                    let terminal = snapshot.status.is_terminal();
                    self.emit(PollEvent::Data(Box::new(snapshot))).await;
                    if terminal {
                        return StopReason::Terminal;
                    }
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let message = format!(
                        "{e} (retry {consecutive_failures}/{})",
                        self.policy.max_attempts
                    );
                    if self.policy.is_exhausted(consecutive_failures) {
                        error!(
                            discussion_id = %session.discussion_id,
                            error = %e,
                            attempt = consecutive_failures,
                            "discussion poll failed repeatedly, giving up"
                        );
                    } else {
                        warn!(
                            discussion_id = %session.discussion_id,
                            error = %e,
                            attempt = consecutive_failures,
                            "discussion poll failed, will retry"
                        );
                    }
                    self.emit(PollEvent::Error { message, attempt: consecutive_failures }).await;
                    if self.policy.is_exhausted(consecutive_failures) {
                        return StopReason::RetriesExhausted;
                    }
                }
            }

            let sleep = tokio::time::sleep(self.policy.delay_after(consecutive_failures));
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    cmd = self.commands.recv(), if !self.commands_closed => {
                        self.commands_closed |= cmd.is_none();
                        ctl.apply(cmd);
                        if !ctl.active {
                            break;
                        }
                    }
                }
            }
            if !ctl.active {
                return StopReason::Requested;
            }
        }
    }

    async fn emit(&self, event: PollEvent) {
        if self.events.send(event).await.is_err() {
            debug!("poll event receiver dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_keeps_cadence() {
        let p = RetryPolicy::fixed(Duration::from_secs(3), 5);
        assert_eq!(p.delay_after(0), Duration::from_secs(3));
        assert_eq!(p.delay_after(4), Duration::from_secs(3));
        assert!(!p.is_exhausted(4));
        assert!(p.is_exhausted(5));
    }

    #[test]
    fn exponential_policy_grows_and_caps() {
        let p = RetryPolicy {
            max_attempts: 5,
            interval: Duration::from_secs(1),
            backoff: Backoff::Exponential { factor: 2.0, max_interval: Duration::from_secs(5) },
        };
        assert_eq!(p.delay_after(0), Duration::from_secs(1));
        assert_eq!(p.delay_after(1), Duration::from_secs(2));
        assert_eq!(p.delay_after(2), Duration::from_secs(4));
        assert_eq!(p.delay_after(3), Duration::from_secs(5));
        assert_eq!(p.delay_after(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn config_factor_one_is_fixed() {
        let p = RetryPolicy::from_config(&PollConfig::default());
        assert_eq!(p.backoff, Backoff::Fixed);
        assert_eq!(p.interval, Duration::from_millis(3_000));
        assert_eq!(p.max_attempts, 5);

        let cfg = PollConfig { backoff_factor: 1.5, ..PollConfig::default() };
        assert!(matches!(RetryPolicy::from_config(&cfg).backoff, Backoff::Exponential { .. }));
    }

    #[test]
    fn control_ignores_start_while_active() {
        let mut ctl = SessionControl { active: true, ..Default::default() };
        ctl.apply(Some(PollCommand::Start { discussion_id: "d2".into(), token: "t".into() }));
        assert!(ctl.active);
        assert!(ctl.queued.is_none());
    }

    #[test]
    fn control_queues_start_after_stop() {
        let mut ctl = SessionControl { active: true, ..Default::default() };
        ctl.apply(Some(PollCommand::Stop));
        ctl.apply(Some(PollCommand::Start { discussion_id: "d2".into(), token: "t".into() }));
        assert!(!ctl.active);
        assert_eq!(ctl.queued.as_ref().map(|s| s.discussion_id.as_str()), Some("d2"));
    }

    #[test]
    fn control_stop_cancels_queued_start() {
        let mut ctl = SessionControl::default();
        ctl.apply(Some(PollCommand::Start { discussion_id: "d2".into(), token: "t".into() }));
        ctl.apply(Some(PollCommand::Stop));
        assert!(ctl.queued.is_none());
    }

    #[test]
    fn closed_command_channel_means_shutdown() {
        let mut ctl = SessionControl { active: true, ..Default::default() };
        ctl.apply(None);
        assert!(ctl.shutdown);
        assert!(!ctl.active);
    }
}
