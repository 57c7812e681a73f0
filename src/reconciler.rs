//! Incremental transcript reconciliation.
//!
//! The reconciler owns the render watermark: the number of transcript
//! entries already materialized on the surface. Reconciling a snapshot
//! renders only the entries beyond the watermark, in index order, and
//! advances it by exactly one per entry. Entries below the watermark are
//! never touched again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::config::AnimationConfig;
use crate::lifecycle::LifecycleTransition;
use crate::markup::{markdown_to_html, reveal_units, Unit};
use crate::model::DiscussionSnapshot;
use crate::render::{Alignment, AnalyticsPanels, RenderSurface, SpeakerCard};
use crate::scroll::{ScrollAction, SharedScroll};
use crate::speaker::{classify, SpeakerKind, SystemNotice};
use crate::visibility::VisibilityWatch;

// ---------------------------------------------------------------------------
// Preemption
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PreemptInner {
    raised: AtomicBool,
    notify: Notify,
}

/// Raised when a higher-priority snapshot arrives. An animation in progress
/// observes it between reveal steps and during pauses, and renders the rest
/// of its snapshot instantly.
#[derive(Debug, Clone, Default)]
pub struct PreemptSignal {
    inner: Arc<PreemptInner>,
}

impl PreemptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.inner.raised.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is raised.
    pub async fn raised(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Everything the reconciler observes but does not own.
#[derive(Debug, Clone)]
pub struct RenderEnv {
    pub visibility: VisibilityWatch,
    pub scroll: SharedScroll,
    pub preempt: PreemptSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Animated,
    Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Entries materialized by this call.
    pub rendered: usize,
    /// The preemption signal cut an animation short.
    pub preempted: bool,
    pub transition: LifecycleTransition,
}

#[derive(Debug)]
pub struct Reconciler {
    watermark: usize,
    regular_count: usize,
    indicator_shown: bool,
    animation: AnimationConfig,
    rng: StdRng,
}

impl Reconciler {
    pub fn new(animation: AnimationConfig) -> Self {
        Self::with_rng(animation, StdRng::from_entropy())
    }

    /// Deterministic typing delays.
    pub fn with_seed(animation: AnimationConfig, seed: u64) -> Self {
        Self::with_rng(animation, StdRng::seed_from_u64(seed))
    }

    fn with_rng(animation: AnimationConfig, rng: StdRng) -> Self {
        Self {
            watermark: 0,
            regular_count: 0,
            indicator_shown: false,
            animation,
            rng,
        }
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn regular_count(&self) -> usize {
        self.regular_count
    }

    /// Forget everything rendered. Only for a brand-new discussion.
    pub fn reset(&mut self) {
        self.watermark = 0;
        self.regular_count = 0;
        self.indicator_shown = false;
    }

    /// Show the "waiting for the next speaker" indicator until the first
    /// new entry of the round is rendered.
    pub fn announce_round<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) {
        surface.set_general_indicator(true);
        self.indicator_shown = true;
    }

    /// Render every entry of `snapshot` beyond the watermark.
    ///
    /// A snapshot with no new entries is a no-op on the surface; its status
    /// is still evaluated so a terminal snapshot is never lost.
    pub async fn reconcile<S: RenderSurface + ?Sized>(
        &mut self,
        snapshot: &DiscussionSnapshot,
        mode: RenderMode,
        surface: &mut S,
        env: &RenderEnv,
    ) -> ReconcileOutcome {
        let transition = LifecycleTransition::evaluate(snapshot);
        let total = snapshot.transcript.len();
        if total <= self.watermark {
            trace!(total, watermark = self.watermark, "snapshot has no new entries");
            return ReconcileOutcome { rendered: 0, preempted: false, transition };
        }

        if self.indicator_shown {
            surface.set_general_indicator(false);
            self.indicator_shown = false;
        }

        let mut instant = mode == RenderMode::Instant || !self.animation.enabled;
        let mut preempted = false;
        let start = self.watermark;

        for turn in &snapshot.transcript[start..] {
            match classify(&turn.agent_name) {
                SpeakerKind::System(speaker) => {
                    surface.system_notice(&SystemNotice::from_turn(speaker, &turn.message));
                }
                SpeakerKind::Regular => {
                    let card = SpeakerCard::new(&turn.agent_name, snapshot.participant(&turn.agent_name));
                    let align = Alignment::for_count(self.regular_count);
                    let html = markdown_to_html(&turn.message);

                    if !instant && env.preempt.is_raised() {
                        instant = true;
                        preempted = true;
                    }
                    if instant || !env.visibility.is_visible() {
                        surface.append_message(&card, align, &html);
                    } else if self.animate(&card, align, &html, surface, env).await {
                        instant = true;
                        preempted = true;
                    }
                    self.regular_count += 1;
                }
            }
            follow(surface, &env.scroll);
            self.watermark += 1;
        }

        surface.update_panels(&AnalyticsPanels::from_snapshot(snapshot));

        let rendered = self.watermark - start;
        debug!(
            discussion_id = %snapshot.discussion_id,
            rendered,
            watermark = self.watermark,
            preempted,
            "reconciled snapshot"
        );
        ReconcileOutcome { rendered, preempted, transition }
    }

    /// Composing pause, then a unit-by-unit reveal. Returns true when the
    /// preemption signal cut it short. Hiding the surface ends the pause
    /// and the reveal early without counting as preemption.
    async fn animate<S: RenderSurface + ?Sized>(
        &mut self,
        card: &SpeakerCard,
        align: Alignment,
        html: &str,
        surface: &mut S,
        env: &RenderEnv,
    ) -> bool {
        surface.show_composing(card, align);
        follow(surface, &env.scroll);
        let delay = self.typing_delay();
        let mut cut = tokio::select! {
            cut = pause(delay, &env.preempt) => cut,
            _ = until_hidden(env.visibility.clone()) => {
                trace!("surface hidden while composing");
                false
            }
        };
        surface.clear_composing();

        surface.begin_message(card, align);
        let step = Duration::from_millis(self.animation.reveal_step_ms);
        for unit in reveal_units(html) {
            surface.reveal(unit);
            // Tags take no space on screen; once cut or hidden, finish flat out.
            if cut || matches!(unit, Unit::Tag(_)) || !env.visibility.is_visible() {
                continue;
            }
            cut = pause(step, &env.preempt).await;
        }
        surface.end_message();
        cut
    }

    fn typing_delay(&mut self) -> Duration {
        let lo = self.animation.typing_delay_min_ms;
        let hi = self.animation.typing_delay_max_ms;
        let ms = if lo >= hi { lo } else { self.rng.gen_range(lo..=hi) };
        Duration::from_millis(ms)
    }
}

fn follow<S: RenderSurface + ?Sized>(surface: &mut S, scroll: &SharedScroll) {
    let action = scroll.lock().after_append();
    if action == ScrollAction::ToBottom {
        surface.scroll_to_bottom();
    }
}

/// Sleep for `duration` unless preempted first. Returns true on preemption.
async fn pause(duration: Duration, preempt: &PreemptSignal) -> bool {
    if preempt.is_raised() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = preempt.raised() => true,
    }
}

/// Resolve once the surface is hidden. Never resolves after the
/// controller is gone.
async fn until_hidden(mut visibility: VisibilityWatch) {
    while visibility.is_visible() {
        if visibility.changed().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}
