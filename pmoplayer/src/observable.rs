//! Last-value-cached broadcast cells.
//!
//! An [`Observable`] always holds a value. Readers can take a snapshot with
//! [`Observable::get`] or [`Observable::subscribe`] to receive every later
//! publish, in publish order. A new subscription is primed with the value
//! held at subscribe time.
//!
//! Publishing is reserved to the crate: consumers only read.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

struct Cell<T> {
    value: T,
    subscribers: Vec<UnboundedSender<T>>,
}

/// Shared cell holding the latest published value.
pub struct Observable<T> {
    cell: Arc<Mutex<Cell<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            cell: Arc::new(Mutex::new(Cell {
                value: initial,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cell<T>> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Registers a new subscriber, which immediately receives the current value.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut cell = self.lock();
        // cannot fail: the receiver is still in our hands
        let _ = tx.send(cell.value.clone());
        cell.subscribers.push(tx);
        Subscription { rx }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut cell = self.lock();
        cell.subscribers.retain(|tx| !tx.is_closed());
        cell.subscribers.len()
    }

    /// Stores `value` and delivers it to every subscriber.
    pub(crate) fn publish(&self, value: T) {
        let mut cell = self.lock();
        Self::store_and_notify(&mut cell, value);
    }

    /// Atomically derives the next value from the current one.
    ///
    /// `f` returns `None` to leave the cell untouched (no notification).
    /// Returns whether a publish happened.
    pub(crate) fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let mut cell = self.lock();
        match f(&cell.value) {
            Some(next) => {
                Self::store_and_notify(&mut cell, next);
                true
            }
            None => false,
        }
    }

    fn store_and_notify(cell: &mut Cell<T>, value: T) {
        cell.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        cell.value = value;
    }
}

impl<T: Clone + PartialEq + Send + 'static> Observable<T> {
    /// Publishes only if `value` differs from the current one.
    pub(crate) fn publish_if_changed(&self, value: T) -> bool {
        self.update(|current| (*current != value).then_some(value))
    }
}

impl<T: Clone + Send + std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cell = self.lock();
        f.debug_struct("Observable")
            .field("value", &cell.value)
            .field("subscribers", &cell.subscribers.len())
            .finish()
    }
}

/// Receiving end of an [`Observable`] subscription.
///
/// Dropping it unsubscribes on the next publish.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Waits for the next value. Returns `None` once the observable is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns the next buffered value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drains every value received so far.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.try_recv() {
            values.push(value);
        }
        values
    }
}
