//! Ordering of cursor moves across generation tasks.
//!
//! Every request submitted to the primary slot takes one [`NavigationStep`].
//! A step first waits until the step taken before it has applied its cursor
//! move, then applies its own. Moves therefore happen in submission order
//! and are never lost, even when the task that owns them has already been
//! superseded: only link generation is cancellable.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::Result;
use crate::generator::LinkGenerator;
use crate::model::Target;

/// Tail of the chain of submitted steps.
#[derive(Debug, Default)]
pub(crate) struct NavigationChain {
    last: Mutex<Option<watch::Receiver<bool>>>,
}

impl NavigationChain {
    fn lock(&self) -> MutexGuard<'_, Option<watch::Receiver<bool>>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a step and hands it to `start` while the chain is locked.
    ///
    /// Tasks started from `start` are therefore started in chain order.
    pub(crate) fn with_next_step<R>(&self, start: impl FnOnce(NavigationStep) -> R) -> R {
        let mut last = self.lock();
        let (tx, rx) = watch::channel(false);
        let previous = last.replace(rx);
        start(NavigationStep {
            previous,
            done: Applied(tx),
        })
    }

    /// Whether some submitted step has not applied its move yet.
    pub(crate) fn is_pending(&self) -> bool {
        self.lock().as_ref().is_some_and(|rx| !*rx.borrow())
    }
}

/// Signals the next step once dropped, whatever happened to this one.
#[derive(Debug)]
struct Applied(watch::Sender<bool>);

impl Drop for Applied {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// One request's place in the chain.
#[derive(Debug)]
pub(crate) struct NavigationStep {
    previous: Option<watch::Receiver<bool>>,
    done: Applied,
}

impl NavigationStep {
    /// Waits until every step taken before this one has moved the cursor.
    pub(crate) async fn settled(&mut self) {
        if let Some(previous) = self.previous.as_mut() {
            // a dropped sender also means the previous step is over
            let _ = previous.wait_for(|applied| *applied).await;
        }
    }

    /// Applies the cursor move of `target` once the previous steps are done.
    ///
    /// `Next` and `Previous` are re-checked against the settled cursor: when
    /// there is no such item any more the cursor stays where the earlier
    /// requests left it and the current item is loaded.
    pub(crate) async fn apply(
        mut self,
        generator: &dyn LinkGenerator,
        target: Target,
    ) -> Result<()> {
        self.settled().await;
        let result = match target {
            Target::Current | Target::Lookahead(_) => Ok(()),
            Target::Index(index) => generator.navigate_to(index).await,
            Target::Next if generator.has_next() => generator.advance().await,
            Target::Previous if generator.has_previous() => generator.retreat().await,
            Target::Next | Target::Previous => {
                debug!(request = ?target, "No item in that direction once settled");
                Ok(())
            }
        };
        drop(self.done);
        result
    }
}
