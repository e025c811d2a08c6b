// SPDX-License-Identifier: GPL-3.0-only

//! Pending photo completions keyed by request id
//!
//! Every photo request gets its own id and its own oneshot. Session callbacks
//! carry the id back, so overlapping captures resolve their own callers no
//! matter which order the platform answers in.

use crate::errors::BackendError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::debug;

pub type PhotoOutcome = Result<PathBuf, BackendError>;

#[derive(Default)]
pub struct PendingCaptures {
    next_id: AtomicU64,
    slots: Mutex<HashMap<u64, oneshot::Sender<PhotoOutcome>>>,
}

impl PendingCaptures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and the receiver its result will arrive on
    pub fn register(&self) -> (u64, oneshot::Receiver<PhotoOutcome>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(id, tx);
        }
        (id, rx)
    }

    /// Complete request `id`; returns false if it was unknown or already resolved
    pub fn resolve(&self, id: u64, outcome: PhotoOutcome) -> bool {
        let sender = self.slots.lock().ok().and_then(|mut slots| slots.remove(&id));
        match sender {
            Some(tx) => {
                // Receiver may have been dropped by an abandoned caller
                let _ = tx.send(outcome);
                true
            }
            None => {
                debug!(request = id, "Completion for unknown photo request");
                false
            }
        }
    }

    /// Forget request `id` without completing it
    pub fn discard(&self, id: u64) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(&id);
        }
    }

    /// Complete every outstanding request with `error`
    pub fn fail_all(&self, error: BackendError) -> usize {
        let drained: Vec<_> = match self.slots.lock() {
            Ok(mut slots) => slots.drain().collect(),
            Err(_) => return 0,
        };
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let pending = PendingCaptures::new();
        let (first, first_rx) = pending.register();
        let (second, second_rx) = pending.register();
        assert_ne!(first, second);

        assert!(pending.resolve(second, Ok(PathBuf::from("/tmp/b.jpg"))));
        assert!(pending.resolve(first, Ok(PathBuf::from("/tmp/a.jpg"))));

        assert_eq!(first_rx.await.unwrap().unwrap(), PathBuf::from("/tmp/a.jpg"));
        assert_eq!(second_rx.await.unwrap().unwrap(), PathBuf::from("/tmp/b.jpg"));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_resolve_is_single_use() {
        let pending = PendingCaptures::new();
        let (id, _rx) = pending.register();
        assert!(pending.resolve(id, Err(BackendError::Cancelled)));
        assert!(!pending.resolve(id, Err(BackendError::Cancelled)));
    }

    #[tokio::test]
    async fn test_fail_all_cancels_everything() {
        let pending = PendingCaptures::new();
        let (_, a) = pending.register();
        let (_, b) = pending.register();
        assert_eq!(pending.fail_all(BackendError::Cancelled), 2);
        assert_eq!(a.await.unwrap(), Err(BackendError::Cancelled));
        assert_eq!(b.await.unwrap(), Err(BackendError::Cancelled));
    }

    #[test]
    fn test_discard() {
        let pending = PendingCaptures::new();
        let (id, _rx) = pending.register();
        pending.discard(id);
        assert_eq!(pending.len(), 0);
    }
}
