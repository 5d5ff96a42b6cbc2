//! Cancellable one-shot background task.
//!
//! A `TimerSlot` holds at most one pending task. Arming always cancels the
//! previous task first, so there is never more than one scheduled run.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

struct Armed {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct TimerSlot {
    armed: Option<Armed>,
    next_id: u64,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending task, then run `task` after `delay`.
    ///
    /// The task receives its own id so it can `release` itself when it fires.
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&mut self, delay: Duration, task: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.next_id += 1;
        let id = self.next_id;

        // The deadline is fixed now, not when the task is first polled.
        let sleep = tokio::time::sleep(delay);
        let handle = tokio::spawn(async move {
            sleep.await;
            task(id).await;
        });
        self.armed = Some(Armed { id, handle });
        id
    }

    /// Abort the pending task. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Detach a task that has started running so a re-arm from inside it does
    /// not abort it. Returns false if `id` has been superseded.
    pub fn release(&mut self, id: u64) -> bool {
        if matches!(&self.armed, Some(armed) if armed.id == id) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
            .as_ref()
            .map_or(false, |armed| !armed.handle.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
