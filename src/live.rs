//! The live discussion view.
//!
//! Ties the poller, update queue, reconciler, smart scroll and visibility
//! signal together. Snapshots flow in from the poller, wait in the queue
//! while the surface is hidden or busy, and are drained one at a time
//! through the reconciler. A `completed` snapshot skips the queue entirely.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{AnimationConfig, ViewerConfig};
use crate::lifecycle::{LifecycleTransition, ABANDONED_MESSAGE};
use crate::model::{DiscussionSnapshot, DiscussionStatus};
use crate::poller::{spawn_poller, DiscussionSource, PollEvent, PollStatus, PollerHandle, RetryPolicy, StopReason};
use crate::queue::{Drain, UpdateQueue};
use crate::reconciler::{PreemptSignal, Reconciler, RenderEnv, RenderMode};
use crate::render::RenderSurface;
use crate::scroll::{ScrollMetrics, SharedScroll, SmartScroll};
use crate::visibility::{Visibility, VisibilityChange, VisibilityController, VisibilityWatch};

/// Construction parameters for [`LiveView`].
#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub policy: RetryPolicy,
    pub animation: AnimationConfig,
    pub scroll_threshold_px: f64,
    pub initial_visibility: Visibility,
    /// Fixed seed for typing delays; random when `None`.
    pub seed: Option<u64>,
}

impl LiveOptions {
    pub fn from_config(cfg: &ViewerConfig) -> Self {
        Self {
            policy: RetryPolicy::from_config(&cfg.poll),
            animation: cfg.animation.clone(),
            scroll_threshold_px: cfg.scroll.bottom_threshold_px,
            initial_visibility: Visibility::Visible,
            seed: None,
        }
    }
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

/// How a round of live viewing ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    AwaitingVote(Box<DiscussionSnapshot>),
    Completed(Box<DiscussionSnapshot>),
    Failed(Box<DiscussionSnapshot>),
    /// The poller hit its retry ceiling.
    PollingAbandoned { last_error: Option<String> },
    /// The poller task went away.
    Closed,
}

/// Input side of a live view: user scrolling and visibility changes.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    visibility: Arc<VisibilityController>,
    scroll: SharedScroll,
}

impl ViewHandle {
    pub fn set_visibility(&self, visibility: Visibility) -> VisibilityChange {
        let change = self.visibility.set(visibility);
        if change != VisibilityChange::Unchanged {
            debug!(?change, "surface visibility changed");
        }
        change
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility.current()
    }

    pub fn user_scrolled(&self, metrics: &ScrollMetrics) {
        self.scroll.lock().on_user_scroll(metrics);
    }

    pub fn auto_scroll_active(&self) -> bool {
        self.scroll.lock().is_active()
    }
}

pub struct LiveView<S: RenderSurface> {
    surface: S,
    queue: UpdateQueue,
    reconciler: Reconciler,
    env: RenderEnv,
    visibility_changes: VisibilityWatch,
    visibility_open: bool,
    _visibility: Arc<VisibilityController>,
    poller: PollerHandle,
    events: mpsc::Receiver<PollEvent>,
    awaiting_start: bool,
    last_error: Option<String>,
}

impl<S: RenderSurface> LiveView<S> {
    /// Build the view and spawn its poller. Must be called inside a tokio
    /// runtime.
    pub fn new(surface: S, source: Arc<dyn DiscussionSource>, options: LiveOptions) -> (Self, ViewHandle) {
        let visibility = Arc::new(VisibilityController::new(options.initial_visibility));
        let scroll = SharedScroll::new(SmartScroll::new(options.scroll_threshold_px));
        let preempt = PreemptSignal::new();

        let (poller, raw_events) = spawn_poller(source, options.policy);
        let events = forward_events(raw_events, preempt.clone());

        let reconciler = match options.seed {
            Some(seed) => Reconciler::with_seed(options.animation, seed),
            None => Reconciler::new(options.animation),
        };

        let handle = ViewHandle {
            visibility: Arc::clone(&visibility),
            scroll: scroll.clone(),
        };
        let view = Self {
            surface,
            queue: UpdateQueue::new(),
            reconciler,
            env: RenderEnv {
                visibility: visibility.watch(),
                scroll,
                preempt,
            },
            visibility_changes: visibility.watch(),
            visibility_open: true,
            _visibility: visibility,
            poller,
            events,
            awaiting_start: false,
            last_error: None,
        };
        (view, handle)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn watermark(&self) -> usize {
        self.reconciler.watermark()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Start polling `discussion_id` for a new round.
    ///
    /// Any running poll session is stopped first and anything still queued
    /// from it is dropped. `fresh` resets the render watermark; pass it only
    /// when switching to a different discussion, since later rounds of the
    /// same discussion extend the transcript already on screen.
    pub async fn begin_round(&mut self, discussion_id: &str, token: &str, fresh: bool) {
        if fresh {
            self.reconciler.reset();
        }
        self.env.scroll.lock().reset();
        self.env.preempt.clear();
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!(dropped, "cleared pending updates for new round");
        }
        self.last_error = None;
        self.awaiting_start = true;

        self.poller.stop().await;
        self.poller.start(discussion_id, token).await;
        self.reconciler.announce_round(&mut self.surface);
        info!(%discussion_id, fresh, "round started");
    }

    /// Drive the view until the round reaches a terminal state.
    pub async fn run_until_terminal(&mut self) -> ViewOutcome {
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        warn!("poller event channel closed");
                        return ViewOutcome::Closed;
                    };
                    if let Some(outcome) = self.ingest(event).await {
                        return outcome;
                    }
                    if let Some(outcome) = self.ingest_ready().await {
                        return outcome;
                    }
                    if let Some(outcome) = self.pump().await {
                        return outcome;
                    }
                }
                change = self.visibility_changes.changed(), if self.visibility_open => {
                    match change {
                        Some(Visibility::Visible) => {
                            if let Some(outcome) = self.on_visible().await {
                                return outcome;
                            }
                        }
                        Some(Visibility::Hidden) => debug!("surface hidden; draining suspended"),
                        None => self.visibility_open = false,
                    }
                }
            }
        }
    }

    /// Stop polling and end the poller task.
    pub async fn shutdown(self) -> S {
        self.poller.shutdown().await;
        self.surface
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    async fn ingest(&mut self, event: PollEvent) -> Option<ViewOutcome> {
        match event {
            PollEvent::Status(PollStatus::Started) => {
                self.awaiting_start = false;
                self.env.preempt.clear();
                None
            }
            // Leftovers from the session stopped by `begin_round`.
            _ if self.awaiting_start => None,
            PollEvent::Status(PollStatus::Stopped(StopReason::RetriesExhausted)) => {
                self.queue.clear();
                let detail = match &self.last_error {
                    Some(e) => format!("{ABANDONED_MESSAGE} ({e})"),
                    None => ABANDONED_MESSAGE.to_string(),
                };
                self.surface.show_error_panel(&detail);
                self.surface.scroll_to_bottom();
                Some(ViewOutcome::PollingAbandoned { last_error: self.last_error.take() })
            }
            PollEvent::Status(PollStatus::Stopped(reason)) => {
                debug!(%reason, "poll session stopped");
                None
            }
            PollEvent::Error { message, attempt } => {
                debug!(attempt, %message, "poll error reported");
                self.last_error = Some(message);
                None
            }
            PollEvent::Data(snapshot) if snapshot.status == DiscussionStatus::Completed => {
                Some(self.finish_completed(*snapshot).await)
            }
            PollEvent::Data(snapshot) => {
                self.queue.push(*snapshot);
                None
            }
        }
    }

    /// Pull in everything already waiting on the channel so a backlog can
    /// coalesce and a `completed` snapshot can jump ahead of it.
    async fn ingest_ready(&mut self) -> Option<ViewOutcome> {
        while let Ok(event) = self.events.try_recv() {
            if let Some(outcome) = self.ingest(event).await {
                return Some(outcome);
            }
        }
        None
    }

    /// Drain the queue while visible.
    async fn pump(&mut self) -> Option<ViewOutcome> {
        while self.env.visibility.is_visible() {
            let drain = match self.queue.begin_drain() {
                Ok(Some(drain)) => drain,
                Ok(None) => break,
                Err(busy) => {
                    debug!(%busy, "drain skipped");
                    break;
                }
            };
            let (snapshot, mode) = match drain {
                Drain::Animated(s) => (s, RenderMode::Animated),
                Drain::Instant { snapshot, .. } => (snapshot, RenderMode::Instant),
            };
            let outcome = self
                .reconciler
                .reconcile(&snapshot, mode, &mut self.surface, &self.env)
                .await;
            self.queue.finish_drain();

            if outcome.transition.is_terminal() {
                return Some(self.conclude(snapshot, outcome.transition).await);
            }
            if let Some(outcome) = self.ingest_ready().await {
                return Some(outcome);
            }
        }
        None
    }

    async fn on_visible(&mut self) -> Option<ViewOutcome> {
        self.env.scroll.lock().on_visible();
        let outcome = self.pump().await;
        if outcome.is_none() {
            self.surface.scroll_to_bottom();
        }
        outcome
    }

    async fn finish_completed(&mut self, snapshot: DiscussionSnapshot) -> ViewOutcome {
        let superseded = self.queue.clear();
        info!(
            discussion_id = %snapshot.discussion_id,
            superseded,
            "completed snapshot bypassing update queue"
        );
        let outcome = self
            .reconciler
            .reconcile(&snapshot, RenderMode::Instant, &mut self.surface, &self.env)
            .await;
        self.conclude(snapshot, outcome.transition).await
    }

    async fn conclude(&mut self, snapshot: DiscussionSnapshot, transition: LifecycleTransition) -> ViewOutcome {
        self.poller.stop().await;
        self.queue.clear();
        self.env.preempt.clear();
        transition.render(&mut self.surface);
        info!(discussion_id = %snapshot.discussion_id, status = %snapshot.status, "round concluded");

        let snapshot = Box::new(snapshot);
        match transition {
            LifecycleTransition::Completed { .. } => ViewOutcome::Completed(snapshot),
            LifecycleTransition::Failed => ViewOutcome::Failed(snapshot),
            LifecycleTransition::AwaitingVote { .. } | LifecycleTransition::Continue => {
                ViewOutcome::AwaitingVote(snapshot)
            }
        }
    }
}

/// Relay poller events, raising `preempt` as soon as a `completed` snapshot
/// passes so an animation in progress can wrap up.
fn forward_events(mut raw: mpsc::Receiver<PollEvent>, preempt: PreemptSignal) -> mpsc::Receiver<PollEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(event) = raw.recv().await {
            if let PollEvent::Data(snapshot) = &event {
                if snapshot.status == DiscussionStatus::Completed {
                    preempt.raise();
                }
            }
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Turn;

    #[tokio::test]
    async fn forwarder_raises_preempt_on_completed() {
        let (tx, rx) = mpsc::channel(4);
        let preempt = PreemptSignal::new();
        let mut out = forward_events(rx, preempt.clone());

        tx.send(PollEvent::Data(Box::new(DiscussionSnapshot::new("d1", DiscussionStatus::Running))))
            .await
            .unwrap();
        out.recv().await.unwrap();
        assert!(!preempt.is_raised());

        tx.send(PollEvent::Data(Box::new(DiscussionSnapshot::new("d1", DiscussionStatus::Completed))))
            .await
            .unwrap();
        out.recv().await.unwrap();
        assert!(preempt.is_raised());
    }

    #[tokio::test]
    async fn forwarder_ends_with_source() {
        let (tx, rx) = mpsc::channel(4);
        let mut out = forward_events(rx, PreemptSignal::new());
        let mut snap = DiscussionSnapshot::new("d1", DiscussionStatus::Running);
        snap.transcript.push(Turn::new("A", "x"));
        tx.send(PollEvent::Data(Box::new(snap))).await.unwrap();
        drop(tx);
        assert!(out.recv().await.is_some());
        assert!(out.recv().await.is_none());
    }

    #[test]
    fn options_follow_config() {
        let mut cfg = ViewerConfig::default();
        cfg.animation.enabled = false;
        cfg.scroll.bottom_threshold_px = 80.0;
        let opts = LiveOptions::from_config(&cfg);
        assert!(!opts.animation.enabled);
        assert_eq!(opts.scroll_threshold_px, 80.0);
        assert_eq!(opts.initial_visibility, Visibility::Visible);
    }
}
