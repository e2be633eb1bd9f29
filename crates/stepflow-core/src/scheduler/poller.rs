// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-tick callback dispatch, tolerant of self-modification.
//!
//! The host calls [`Poller::poll`] once per external tick. A dispatched
//! callback may deregister itself (by dropping its [`Registration`]) or
//! register new callbacks mid-pass; the pass is then re-run until one pass
//! completes with no net change. Within one `poll` call every callback runs at
//! most once, and every callback that is live when the tick settles has run at
//! least once. Worst case O(n²) per tick, which is fine for the small callback
//! counts this engine sees.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{OperationError, Result};

/// A registered poll callback.
pub type PollCallback = Box<dyn FnMut() + Send>;

/// Hard bound on re-run passes within one tick. A callback set that keeps
/// mutating itself past this point is a defect in the host's callbacks.
const MAX_PASSES: usize = 1000;

struct Entry {
    id: u64,
    /// Taken out while the callback is being dispatched.
    callback: Option<PollCallback>,
}

#[derive(Default)]
struct PollerInner {
    entries: Vec<Entry>,
    next_id: u64,
    /// Bumped on every register/deregister; a pass that leaves it unchanged
    /// is a clean pass.
    version: u64,
}

/// Dispatches registered callbacks once per [`poll`](Poller::poll).
#[derive(Clone, Default)]
pub struct Poller {
    inner: Arc<Mutex<PollerInner>>,
}

/// Guard for one registered callback; deregisters on drop.
#[must_use = "dropping the registration immediately deregisters the callback"]
pub struct Registration {
    inner: Weak<Mutex<PollerInner>>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().expect("poller lock poisoned");
            let before = inner.entries.len();
            inner.entries.retain(|entry| entry.id != self.id);
            if inner.entries.len() != before {
                inner.version += 1;
            }
        }
    }
}

impl Poller {
    /// Create an empty poller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback to run once per tick until the guard is dropped.
    pub fn register(&self, callback: PollCallback) -> Registration {
        let mut inner = self.inner.lock().expect("poller lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.version += 1;
        inner.entries.push(Entry {
            id,
            callback: Some(callback),
        });
        Registration {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of currently registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.inner.lock().expect("poller lock poisoned").entries.len()
    }

    /// Run one logical tick.
    ///
    /// Re-runs the dispatch pass until the callback set settles, so callbacks
    /// registered mid-tick still run within this tick and a callback never
    /// runs twice per tick.
    pub fn poll(&self) {
        let mut ran: HashSet<u64> = HashSet::new();

        for pass in 0..MAX_PASSES {
            let (version_before, pending) = {
                let inner = self.inner.lock().expect("poller lock poisoned");
                let pending: Vec<u64> = inner
                    .entries
                    .iter()
                    .filter(|entry| !ran.contains(&entry.id))
                    .map(|entry| entry.id)
                    .collect();
                (inner.version, pending)
            };

            for id in pending {
                // Take the callback out so the lock is not held across the
                // call; the callback may touch the poller itself.
                let callback = {
                    let mut inner = self.inner.lock().expect("poller lock poisoned");
                    inner
                        .entries
                        .iter_mut()
                        .find(|entry| entry.id == id)
                        .and_then(|entry| entry.callback.take())
                };
                let Some(mut callback) = callback else {
                    continue;
                };
                ran.insert(id);
                callback();
                let mut inner = self.inner.lock().expect("poller lock poisoned");
                if let Some(entry) = inner.entries.iter_mut().find(|entry| entry.id == id) {
                    entry.callback = Some(callback);
                }
                // entry gone: the callback deregistered itself mid-call
            }

            let inner = self.inner.lock().expect("poller lock poisoned");
            let settled = inner.version == version_before
                && inner.entries.iter().all(|entry| ran.contains(&entry.id));
            if settled {
                if pass > 0 {
                    debug!(passes = pass + 1, "poll settled after re-runs");
                }
                return;
            }
        }

        warn!(
            max_passes = MAX_PASSES,
            "poll pass limit hit; callback set keeps mutating itself"
        );
    }

    /// Resolve once a predicate is satisfied, re-checking once per tick.
    ///
    /// The predicate is checked once immediately when the returned future is
    /// first polled, so an already-true condition completes without waiting
    /// for a tick. Predicate errors propagate as failures. The per-tick hook
    /// is released when the future completes or is dropped.
    pub fn poll_for_condition<T, F>(
        &self,
        check: F,
    ) -> impl Future<Output = Result<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnMut() -> Result<Option<T>> + Send + 'static,
    {
        let poller = self.clone();
        let mut check = check;
        async move {
            match check() {
                Ok(Some(value)) => return Ok(value),
                Err(error) => return Err(error),
                Ok(None) => {}
            }

            let (sender, receiver) = oneshot::channel::<Result<T>>();
            let mut slot = Some(sender);
            let _registration = poller.register(Box::new(move || {
                let Some(sender) = slot.take() else {
                    return;
                };
                match check() {
                    Ok(None) => slot = Some(sender),
                    Ok(Some(value)) => {
                        let _ = sender.send(Ok(value));
                    }
                    Err(error) => {
                        let _ = sender.send(Err(error));
                    }
                }
            }));

            match receiver.await {
                Ok(result) => result,
                Err(_) => Err(OperationError::invariant(
                    "poller dropped while a condition was pending",
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_each_callback_runs_once_per_poll() {
        let poller = Poller::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = hits.clone();
        let _registration = poller.register(Box::new(move || {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        }));

        poller.poll();
        poller.poll();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_deregisters() {
        let poller = Poller::new();
        let registration = poller.register(Box::new(|| {}));
        assert_eq!(poller.callback_count(), 1);
        drop(registration);
        assert_eq!(poller.callback_count(), 0);
    }

    #[test]
    fn test_swapped_callback_runs_within_the_same_poll() {
        let poller = Poller::new();
        let old_hits = Arc::new(AtomicUsize::new(0));
        let new_hits = Arc::new(AtomicUsize::new(0));
        let old_slot: Arc<Mutex<Option<Registration>>> = Arc::default();
        let new_slot: Arc<Mutex<Option<Registration>>> = Arc::default();

        let registration = {
            let poller = poller.clone();
            let old_hits = old_hits.clone();
            let new_hits = new_hits.clone();
            let old_slot = old_slot.clone();
            let new_slot = new_slot.clone();
            poller.clone().register(Box::new(move || {
                old_hits.fetch_add(1, Ordering::SeqCst);
                // deregister ourselves and hand over to a replacement
                old_slot.lock().expect("lock").take();
                let new_hits = new_hits.clone();
                let replacement = poller.register(Box::new(move || {
                    new_hits.fetch_add(1, Ordering::SeqCst);
                }));
                new_slot.lock().expect("lock").replace(replacement);
            }))
        };
        old_slot.lock().expect("lock").replace(registration);

        poller.poll();
        // old ran at most once, replacement already ran within the same tick
        assert_eq!(old_hits.load(Ordering::SeqCst), 1);
        assert_eq!(new_hits.load(Ordering::SeqCst), 1);

        poller.poll();
        assert_eq!(old_hits.load(Ordering::SeqCst), 1);
        assert_eq!(new_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pass_limit_stops_endless_churn() {
        let poller = Poller::new();
        // Keeps registering fresh callbacks from within a callback, forever.
        let registrations: Arc<Mutex<Vec<Registration>>> = Arc::default();
        let poller_cb = poller.clone();
        let registrations_cb = registrations.clone();

        fn register_churner(
            poller: &Poller,
            registrations: &Arc<Mutex<Vec<Registration>>>,
        ) {
            let poller_inner = poller.clone();
            let registrations_inner = registrations.clone();
            let registration = poller.register(Box::new(move || {
                register_churner(&poller_inner, &registrations_inner);
            }));
            registrations.lock().expect("lock").push(registration);
        }

        register_churner(&poller_cb, &registrations_cb);
        // Must return instead of spinning forever.
        poller.poll();
        assert!(poller.callback_count() >= MAX_PASSES);
    }
}
