//! Poll loops for server-tracked jobs.
//!
//! A sequence owns nothing but the task id it was given. It re-checks on a
//! fixed cadence with no backoff and no deadline until the server reports a
//! terminal status, presenting every tick on the shared surface. Sequences
//! from independent jobs run concurrently and do not interfere with each
//! other's cadence; they only compete for the surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::model::{StatusKind, TaskStatus};
use crate::status::StatusPresenter;

/// Busy marker for one submit affordance. Set before a submission goes out,
/// cleared when its poll sequence reaches a terminal state or the submission
/// itself fails.
#[derive(Clone, Debug, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Owned handle to one running poll sequence. Dropping it aborts the loop;
/// a sequence whose initiating context disappears stops polling.
pub struct PollHandle {
    handle: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Wait for the sequence to reach its terminal state.
    pub async fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[derive(Clone)]
pub struct TaskPoller {
    client: ApiClient,
    presenter: StatusPresenter,
    interval: Duration,
}

impl TaskPoller {
    pub fn new(client: ApiClient, presenter: StatusPresenter, interval: Duration) -> Self {
        Self {
            client,
            presenter,
            interval,
        }
    }

    /// Start polling `task_id`.
    ///
    /// Every tick presents the server's status and message. `pending` and
    /// `running` schedule exactly one follow-up after the fixed interval.
    /// `done` runs `on_done` once, after presenting; `error` (and any
    /// unrecognized status) ends the sequence without running it. A failed
    /// status request is surfaced as an error note with the transport
    /// message and also ends the sequence. `busy` is cleared on every way
    /// out, so a submit affordance never stays disabled.
    pub fn spawn(
        &self,
        task_id: impl Into<String>,
        busy: Option<BusyFlag>,
        on_done: Option<BoxFuture<'static, ()>>,
    ) -> PollHandle {
        let client = self.client.clone();
        let presenter = self.presenter.clone();
        let interval = self.interval;
        let task_id = task_id.into();

        let handle = tokio::spawn(async move {
            let mut on_done = on_done;
            loop {
                match client.task_state(&task_id).await {
                    Ok(state) => {
                        let message = state.message.clone().unwrap_or_default();
                        presenter.show(state.status.kind(), message);
                        match state.status {
                            TaskStatus::Pending | TaskStatus::Running => {
                                tokio::time::sleep(interval).await;
                            }
                            TaskStatus::Done => {
                                if let Some(hook) = on_done.take() {
                                    hook.await;
                                }
                                break;
                            }
                            TaskStatus::Error | TaskStatus::Unrecognized => break,
                        }
                    }
                    Err(err) => {
                        presenter
                            .show(StatusKind::Error, format!("task status check failed: {err}"));
                        break;
                    }
                }
            }
            if let Some(busy) = busy {
                busy.clear();
            }
        });

        PollHandle {
            handle: Some(handle),
        }
    }
}
