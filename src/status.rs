//! The single shared status surface.
//!
//! Every poll tick and every form handler writes here; whichever write lands
//! last wins the display. That race is deliberate: there is exactly one
//! surface and no queueing, so concurrent jobs compete for it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::model::{StatusKind, StatusNote};

const AUTO_HIDE_AFTER: Duration = Duration::from_secs(5);

/// Process-wide presenter for pending/running/done/error notes. Cheap to
/// clone; all clones drive the same surface.
#[derive(Clone)]
pub struct StatusPresenter {
    tx: watch::Sender<Option<StatusNote>>,
    hide: Arc<Mutex<Option<AbortHandle>>>,
}

impl Default for StatusPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPresenter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx,
            hide: Arc::new(Mutex::new(None)),
        }
    }

    /// Observe the surface. `None` means hidden.
    pub fn subscribe(&self) -> watch::Receiver<Option<StatusNote>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<StatusNote> {
        self.tx.borrow().clone()
    }

    /// Replace the surface; `done` notes auto-hide after five seconds.
    pub fn show(&self, kind: StatusKind, text: impl Into<String>) {
        self.show_with_hide(kind, text, true);
    }

    /// Replace whatever is currently shown. Any previously scheduled hide is
    /// cancelled, so at most one hide timer is ever pending; only a `done`
    /// note with `auto_hide` schedules a new one. Must be called from within
    /// a tokio runtime.
    pub fn show_with_hide(&self, kind: StatusKind, text: impl Into<String>, auto_hide: bool) {
        let mut slot = self.hide.lock().expect("status hide slot poisoned");
        if let Some(prev) = slot.take() {
            prev.abort();
        }
        self.tx.send_replace(Some(StatusNote {
            kind,
            text: text.into(),
        }));
        if kind == StatusKind::Done && auto_hide {
            let tx = self.tx.clone();
            // The deadline is fixed at the moment of this call; when the
            // spawned task first gets polled must not shift it.
            let deadline = tokio::time::Instant::now() + AUTO_HIDE_AFTER;
            let task = tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                tx.send_replace(None);
            });
            *slot = Some(task.abort_handle());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(p: &StatusPresenter) -> Option<StatusNote> {
        p.current()
    }

    #[tokio::test(start_paused = true)]
    async fn done_note_hides_after_five_seconds() {
        let p = StatusPresenter::new();
        p.show(StatusKind::Done, "complete");
        assert_eq!(note(&p).unwrap().text, "complete");

        tokio::time::advance(Duration::from_millis(4_999)).await;
        tokio::task::yield_now().await;
        assert!(note(&p).is_some());

        tokio::time::advance(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert!(note(&p).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn running_and_error_notes_never_hide() {
        let p = StatusPresenter::new();
        p.show(StatusKind::Running, "working");
        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(note(&p).unwrap().kind, StatusKind::Running);

        p.show(StatusKind::Error, "failed");
        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(note(&p).unwrap().kind, StatusKind::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn later_show_cancels_the_earlier_hide_timer() {
        let p = StatusPresenter::new();
        p.show(StatusKind::Done, "first");
        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;

        // Replaces the note and reschedules; the first timer must not fire
        // two seconds from now and hide the second note early.
        p.show(StatusKind::Done, "second");
        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert_eq!(note(&p).unwrap().text, "second");

        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert!(note(&p).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn done_with_auto_hide_disabled_stays_visible() {
        let p = StatusPresenter::new();
        p.show_with_hide(StatusKind::Done, "pinned", false);
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert_eq!(note(&p).unwrap().text, "pinned");
    }

    #[tokio::test(start_paused = true)]
    async fn last_write_wins_across_competing_writers() {
        let p = StatusPresenter::new();
        p.show(StatusKind::Running, "job a");
        p.show(StatusKind::Running, "job b");
        assert_eq!(note(&p).unwrap().text, "job b");
    }
}
