//! Cancellation-bearing task slots.
//!
//! A [`TaskSlot`] owns at most one "current" task. [`TaskSlot::replace`]
//! cancels the current task and starts a new one while holding the slot
//! lock, so two concurrent starts cannot both survive.
//!
//! Tasks publish through their [`TaskGuard`]. A guard only lets a publish
//! through while its token is uncancelled, and checks that under the same
//! lock `replace` takes: once a newer task has been started, the older one
//! can no longer reach its observers.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Default)]
struct SlotState {
    token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

pub(crate) struct TaskSlot {
    name: &'static str,
    runtime: Option<Handle>,
    state: Mutex<SlotState>,
}

impl TaskSlot {
    /// Creates a slot spawning on `runtime`, or on the ambient runtime of
    /// each caller when `None`.
    pub(crate) fn new(name: &'static str, runtime: Option<Handle>) -> Arc<Self> {
        Arc::new(Self {
            name,
            runtime,
            state: Mutex::new(SlotState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<Fut>(&self, future: Fut) -> Option<JoinHandle<()>>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = match &self.runtime {
            Some(handle) => handle.clone(),
            None => match Handle::try_current() {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(slot = self.name, error = %err, "No Tokio runtime available, task dropped");
                    return None;
                }
            },
        };
        Some(handle.spawn(future))
    }

    /// Cancels the current task (if any) and starts `task` in its place.
    ///
    /// Returns the generation number of the new task, or `None` when no
    /// runtime was available to run it.
    pub(crate) fn replace<F, Fut>(self: &Arc<Self>, task: F) -> Option<u64>
    where
        F: FnOnce(TaskGuard) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.lock();
        if let Some(previous) = state.token.take() {
            if !previous.is_cancelled() {
                debug!(slot = self.name, generation = state.generation, "Cancelling superseded task");
            }
            previous.cancel();
        }
        self.start_locked(&mut state, task)
    }

    /// Starts `task` without touching the task currently occupying the slot.
    ///
    /// The previous task keeps running to completion; the slot only tracks
    /// the most recent one.
    pub(crate) fn spawn_alongside<F, Fut>(self: &Arc<Self>, task: F) -> Option<u64>
    where
        F: FnOnce(TaskGuard) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.lock();
        self.start_locked(&mut state, task)
    }

    fn start_locked<F, Fut>(self: &Arc<Self>, state: &mut SlotState, task: F) -> Option<u64>
    where
        F: FnOnce(TaskGuard) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = state.generation + 1;
        let token = CancellationToken::new();
        let guard = TaskGuard {
            slot: self.clone(),
            token: token.clone(),
            generation,
        };
        let handle = self.spawn(task(guard))?;
        state.generation = generation;
        state.token = Some(token);
        state.handle = Some(handle);
        debug!(slot = self.name, generation, "Task started");
        Some(generation)
    }

    /// Requests cancellation of the current task.
    pub(crate) fn cancel(&self) {
        let state = self.lock();
        if let Some(token) = &state.token {
            token.cancel();
        }
    }

    /// Whether the most recently started task is still running.
    pub(crate) fn is_busy(&self) -> bool {
        self.lock()
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Generation number of the most recently started task.
    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }
}

/// Handle given to a running task to check for cancellation and publish.
#[derive(Clone)]
pub(crate) struct TaskGuard {
    slot: Arc<TaskSlot>,
    token: CancellationToken,
    generation: u64,
}

impl TaskGuard {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Runs `publish` unless this task has been cancelled.
    ///
    /// Returns whether `publish` ran.
    pub(crate) fn publish_if_current<F: FnOnce()>(&self, publish: F) -> bool {
        let _state = self.slot.lock();
        if self.token.is_cancelled() {
            return false;
        }
        publish();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn replace_cancels_previous_task() {
        let slot = TaskSlot::new("test", None);
        let (tx, rx) = tokio::sync::oneshot::channel();

        slot.replace(|guard| async move {
            guard.token().cancelled().await;
            let _ = tx.send(guard.publish_if_current(|| {}));
        });
        slot.replace(|_guard| async move {});

        // the first task was woken by cancellation and refused to publish
        assert!(!rx.await.unwrap());
        assert_eq!(slot.generation(), 2);
    }

    #[tokio::test]
    async fn spawn_alongside_keeps_previous_running() {
        let slot = TaskSlot::new("test", None);
        let published = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        let counter = published.clone();
        slot.spawn_alongside(move |guard| async move {
            let _ = release_rx.await;
            guard.publish_if_current(|| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            let _ = done_tx.send(());
        });
        slot.spawn_alongside(|_guard| async move {});

        release_tx.send(()).unwrap();
        done_rx.await.unwrap();
        assert_eq!(published.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_marks_guard_cancelled() {
        let slot = TaskSlot::new("test", None);
        let (tx, rx) = tokio::sync::oneshot::channel();
        slot.replace(|guard| async move {
            guard.token().cancelled().await;
            let _ = tx.send(guard.token().is_cancelled());
        });
        slot.cancel();
        assert!(rx.await.unwrap());
    }

    #[test]
    fn without_runtime_nothing_starts() {
        let slot = TaskSlot::new("test", None);
        assert_eq!(slot.replace(|_guard| async move {}), None);
        assert_eq!(slot.generation(), 0);
        assert!(!slot.is_busy());
    }
}
