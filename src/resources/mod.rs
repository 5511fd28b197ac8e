//! Loaders for the delivery API collections.
//!
//! Loaders never fail: errors become a readable message in [`Loaded`] and
//! the data falls back to its empty value.

pub mod deliveries;
pub mod personnel;

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use prometheus::IntCounter;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Loaded<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T: Default> Loaded<T> {
    pub fn ready(data: T) -> Self {
        Self {
            data,
            loading: false,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            data: T::default(),
            loading: false,
            error: Some(message.into()),
        }
    }

    pub fn pending() -> Self {
        Self {
            data: T::default(),
            loading: true,
            error: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.loading && self.error.is_none()
    }
}

struct Slot<T> {
    snapshot: Loaded<T>,
    applied: u64,
}

/// Latest loaded value of a collection.
///
/// Each load takes a ticket when it starts. A result is only applied if no
/// result with a newer ticket has been applied yet, so a slow response can
/// not overwrite a fresher one.
pub struct Resource<T> {
    slot: Mutex<Slot<T>>,
    issued: AtomicU64,
    stale: Option<IntCounter>,
}

impl<T: Clone + Default> Resource<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                snapshot: Loaded::pending(),
                applied: 0,
            }),
            issued: AtomicU64::new(0),
            stale: None,
        }
    }

    pub fn with_stale_counter(mut self, counter: IntCounter) -> Self {
        self.stale = Some(counter);
        self
    }

    pub fn snapshot(&self) -> Loaded<T> {
        self.lock().snapshot.clone()
    }

    /// Ticket of the result currently held, 0 before the first load.
    pub fn generation(&self) -> u64 {
        self.lock().applied
    }

    pub async fn load<F>(&self, fetch: F) -> Loaded<T>
    where
        F: Future<Output = Loaded<T>>,
    {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().snapshot.loading = true;

        let result = fetch.await;

        let mut slot = self.lock();
        if ticket < slot.applied {
            debug!(ticket, applied = slot.applied, "discarding stale response");
            if let Some(counter) = &self.stale {
                counter.inc();
            }
            return slot.snapshot.clone();
        }

        slot.applied = ticket;
        slot.snapshot = result;
        slot.snapshot.loading = self.issued.load(Ordering::SeqCst) > ticket;
        slot.snapshot.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl<T: Clone + Default> Default for Resource<T> {
    fn default() -> Self {
        Self::new()
    }
}
