//! Smart auto-scroll.
//!
//! Follows new output while the user sits at the bottom of the transcript;
//! stops following as soon as they scroll up to read, and resumes when they
//! come back down or when the surface becomes visible again.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Geometry of the scrollable transcript at the moment of a scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// What the surface should do with its viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAction {
    Stay,
    ToBottom,
}

#[derive(Debug, Clone)]
pub struct SmartScroll {
    auto_scroll: bool,
    threshold: f64,
}

impl SmartScroll {
    pub fn new(threshold_px: f64) -> Self {
        Self {
            auto_scroll: true,
            threshold: threshold_px,
        }
    }

    pub fn is_active(&self) -> bool {
        self.auto_scroll
    }

    pub fn is_near_bottom(&self, metrics: &ScrollMetrics) -> bool {
        metrics.distance_from_bottom() <= self.threshold
    }

    /// A user-initiated scroll.
    pub fn on_user_scroll(&mut self, metrics: &ScrollMetrics) {
        let near = self.is_near_bottom(metrics);
        if near != self.auto_scroll {
            debug!(auto_scroll = near, "smart scroll toggled by user");
        }
        self.auto_scroll = near;
    }

    /// The surface became visible again: follow unconditionally.
    pub fn on_visible(&mut self) -> ScrollAction {
        self.auto_scroll = true;
        ScrollAction::ToBottom
    }

    /// Called after every programmatic append.
    pub fn after_append(&self) -> ScrollAction {
        if self.auto_scroll {
            ScrollAction::ToBottom
        } else {
            ScrollAction::Stay
        }
    }

    /// Start of a discussion or round.
    pub fn reset(&mut self) {
        self.auto_scroll = true;
    }
}

impl Default for SmartScroll {
    fn default() -> Self {
        Self::new(50.0)
    }
}

/// Scroll state shared between the live view and its input handle.
#[derive(Debug, Clone, Default)]
pub struct SharedScroll(Arc<Mutex<SmartScroll>>);

impl SharedScroll {
    pub fn new(scroll: SmartScroll) -> Self {
        Self(Arc::new(Mutex::new(scroll)))
    }

    /// A poisoned lock still holds a usable flag, so recover it.
    pub fn lock(&self) -> MutexGuard<'_, SmartScroll> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(distance: f64) -> ScrollMetrics {
        ScrollMetrics {
            scroll_height: 1_000.0,
            scroll_top: 1_000.0 - 400.0 - distance,
            client_height: 400.0,
        }
    }

    #[test]
    fn active_by_default() {
        let s = SmartScroll::default();
        assert!(s.is_active());
        assert_eq!(s.after_append(), ScrollAction::ToBottom);
    }

    #[test]
    fn scrolling_up_disables_follow() {
        let mut s = SmartScroll::default();
        s.on_user_scroll(&at(300.0));
        assert!(!s.is_active());
        assert_eq!(s.after_append(), ScrollAction::Stay);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut s = SmartScroll::default();
        s.on_user_scroll(&at(50.0));
        assert!(s.is_active());
        s.on_user_scroll(&at(50.5));
        assert!(!s.is_active());
    }

    #[test]
    fn returning_to_bottom_re_enables() {
        let mut s = SmartScroll::default();
        s.on_user_scroll(&at(300.0));
        s.on_user_scroll(&at(10.0));
        assert!(s.is_active());
    }

    #[test]
    fn visibility_forces_follow() {
        let mut s = SmartScroll::default();
        s.on_user_scroll(&at(300.0));
        assert_eq!(s.on_visible(), ScrollAction::ToBottom);
        assert!(s.is_active());
    }

    #[test]
    fn shared_handles_see_the_same_flag() {
        let a = SharedScroll::default();
        let b = a.clone();
        a.lock().on_user_scroll(&at(500.0));
        assert!(!b.lock().is_active());
    }

    #[test]
    fn reset_re_enables() {
        let mut s = SmartScroll::new(20.0);
        s.on_user_scroll(&at(30.0));
        assert!(!s.is_active());
        s.reset();
        assert!(s.is_active());
    }
}
