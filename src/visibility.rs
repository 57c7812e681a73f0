//! Whether the display surface is currently seen by the user.
//!
//! Hidden surfaces suspend queue draining and skip animation; regaining
//! visibility collapses any backlog and snaps the view to the bottom.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

/// Edge produced by a visibility update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityChange {
    BecameVisible,
    BecameHidden,
    Unchanged,
}

/// Owner of the visibility signal. Clones of [`VisibilityWatch`] observe it.
#[derive(Debug)]
pub struct VisibilityController {
    tx: watch::Sender<Visibility>,
}

impl VisibilityController {
    pub fn new(initial: Visibility) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> Visibility {
        *self.tx.borrow()
    }

    /// Record a new visibility, reporting which edge (if any) it crossed.
    /// Watchers are only woken when the value actually changes.
    pub fn set(&self, next: Visibility) -> VisibilityChange {
        let mut prev = next;
        self.tx.send_if_modified(|current| {
            prev = *current;
            *current = next;
            prev != next
        });
        match (prev, next) {
            (Visibility::Hidden, Visibility::Visible) => VisibilityChange::BecameVisible,
            (Visibility::Visible, Visibility::Hidden) => VisibilityChange::BecameHidden,
            _ => VisibilityChange::Unchanged,
        }
    }

    pub fn watch(&self) -> VisibilityWatch {
        VisibilityWatch { rx: self.tx.subscribe() }
    }
}

impl Default for VisibilityController {
    fn default() -> Self {
        Self::new(Visibility::Visible)
    }
}

/// Read side of the visibility signal.
#[derive(Debug, Clone)]
pub struct VisibilityWatch {
    rx: watch::Receiver<Visibility>,
}

impl VisibilityWatch {
    pub fn current(&self) -> Visibility {
        *self.rx.borrow()
    }

    pub fn is_visible(&self) -> bool {
        self.current().is_visible()
    }

    /// Wait for the next update and return the new value. Returns `None`
    /// once the controller is gone.
    pub async fn changed(&mut self) -> Option<Visibility> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_reported() {
        let ctl = VisibilityController::default();
        assert_eq!(ctl.set(Visibility::Visible), VisibilityChange::Unchanged);
        assert_eq!(ctl.set(Visibility::Hidden), VisibilityChange::BecameHidden);
        assert_eq!(ctl.set(Visibility::Hidden), VisibilityChange::Unchanged);
        assert_eq!(ctl.set(Visibility::Visible), VisibilityChange::BecameVisible);
    }

    #[test]
    fn watch_sees_current_value() {
        let ctl = VisibilityController::new(Visibility::Hidden);
        let w = ctl.watch();
        assert!(!w.is_visible());
        ctl.set(Visibility::Visible);
        assert!(w.is_visible());
    }

    #[tokio::test]
    async fn changed_yields_update() {
        let ctl = VisibilityController::default();
        let mut w = ctl.watch();
        ctl.set(Visibility::Hidden);
        assert_eq!(w.changed().await, Some(Visibility::Hidden));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_value_does_not_wake_watchers() {
        let ctl = VisibilityController::default();
        let mut w = ctl.watch();
        assert_eq!(ctl.set(Visibility::Visible), VisibilityChange::Unchanged);
        let woke = tokio::time::timeout(std::time::Duration::from_secs(1), w.changed()).await;
        assert!(woke.is_err());

        ctl.set(Visibility::Hidden);
        assert_eq!(w.changed().await, Some(Visibility::Hidden));
    }

    #[tokio::test]
    async fn changed_ends_when_controller_dropped() {
        let ctl = VisibilityController::default();
        let mut w = ctl.watch();
        drop(ctl);
        assert_eq!(w.changed().await, None);
    }
}
