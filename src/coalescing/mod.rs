// Request coalescing
//
// Deduplicates concurrent origin fetches for the same cache entry.
// When several requests miss on the same key at once:
// - First request (leader): fetches and transforms, then publishes the outcome
// - Later requests (followers): wait and receive the leader's outcome
// - If the leader goes away without publishing, waiting followers retry and
//   one of them becomes the new leader

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome shared from a leader to its followers
pub type SharedOutcome = Result<Bytes, String>;

type Slot = watch::Sender<Option<SharedOutcome>>;

/// Tracks in-flight fetches by key
#[derive(Debug, Clone, Default)]
pub struct RequestCoalescer {
    in_flight: Arc<Mutex<HashMap<String, Slot>>>,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a coalescing slot for `key`
    ///
    /// Returns `Leader` when nothing is in flight for the key; the caller must
    /// do the work and publish. Otherwise waits for the current leader and
    /// returns its outcome as `Follower`.
    pub async fn acquire(&self, key: &str) -> CoalescingSlot {
        loop {
            let mut rx = {
                let mut in_flight = self.in_flight.lock();
                match in_flight.get(key) {
                    Some(sender) => sender.subscribe(),
                    None => {
                        let (sender, _rx) = watch::channel(None);
                        in_flight.insert(key.to_string(), sender.clone());
                        return CoalescingSlot::Leader(LeaderGuard {
                            key: key.to_string(),
                            coalescer: self.clone(),
                            sender,
                        });
                    }
                }
            };

            let outcome = rx
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|value| value.clone());

            match outcome {
                Some(outcome) => return CoalescingSlot::Follower(outcome),
                None => {
                    tracing::debug!(key = %key, "Coalescing leader abandoned, retrying");
                }
            }
        }
    }

    /// Number of keys with a leader in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn remove_in_flight(&self, key: &str) {
        self.in_flight.lock().remove(key);
    }
}

/// Result of acquiring a coalescing slot
#[derive(Debug)]
pub enum CoalescingSlot {
    /// First request for the key: do the work, then call [`LeaderGuard::publish`]
    Leader(LeaderGuard),
    /// Another request did the work; this is its outcome
    Follower(SharedOutcome),
}

impl CoalescingSlot {
    pub fn is_leader(&self) -> bool {
        matches!(self, CoalescingSlot::Leader(_))
    }
}

/// Held by the leader until it publishes or is dropped
#[derive(Debug)]
pub struct LeaderGuard {
    key: String,
    coalescer: RequestCoalescer,
    sender: Slot,
}

impl LeaderGuard {
    /// Hand the outcome to every waiting follower and release the key
    pub fn publish(self, outcome: SharedOutcome) {
        self.sender.send_replace(Some(outcome));
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        // Closes the channel once the map's copy is gone; unpublished
        // followers wake up and retry
        self.coalescer.remove_in_flight(&self.key);
    }
}
