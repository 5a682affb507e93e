//! Per-session serialization.
//!
//! Every session gets a lane: an async mutex around an epoch counter.
//! Holding the lane makes a read-modify-write of the session atomic with
//! respect to other events for the same session; distinct sessions never
//! contend. The epoch moves whenever the user abandons the conversation,
//! which lets a rate lookup that finished late notice it is stale.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Lanes kept before idle ones are pruned.
const PRUNE_THRESHOLD: usize = 1024;

/// State guarded by a session lane.
#[derive(Debug, Default)]
pub struct Lane {
    epoch: u64,
}

impl Lane {
    /// Current epoch.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Invalidate work started under the current epoch.
    pub const fn advance(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Exclusive access to one session's lane.
pub type LaneGuard = OwnedMutexGuard<Lane>;

/// Keyed lanes, one per session id.
#[derive(Debug, Default)]
pub struct SessionGate {
    lanes: Mutex<HashMap<String, Arc<Mutex<Lane>>>>,
}

impl SessionGate {
    /// Create an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lane for `session_id`, created on first use.
    ///
    /// Callers keep the returned `Arc` for as long as they may come back to
    /// the lane; a lane nobody holds can be pruned.
    pub async fn lane(&self, session_id: &str) -> Arc<Mutex<Lane>> {
        let mut lanes = self.lanes.lock().await;
        if lanes.len() >= PRUNE_THRESHOLD {
            let before = lanes.len();
            lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
            trace!(pruned = before - lanes.len(), "pruned idle session lanes");
        }
        Arc::clone(lanes.entry(session_id.to_string()).or_default())
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn enter(&self, session_id: &str) -> LaneGuard {
        self.lane(session_id).await.lock_owned().await
    }

    /// Number of lanes currently tracked.
    pub async fn len(&self) -> usize {
        self.lanes.lock().await.len()
    }

    /// Whether no lanes are tracked.
    pub async fn is_empty(&self) -> bool {
        self.lanes.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_session_shares_lane() {
        let gate = SessionGate::new();
        let a = gate.lane("telegram:1").await;
        let b = gate.lane("telegram:1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &gate.lane("telegram:2").await));
        assert_eq!(gate.len().await, 2);
    }

    #[tokio::test]
    async fn test_epoch_advances() {
        let gate = SessionGate::new();
        let mut guard = gate.enter("cli:direct").await;
        assert_eq!(guard.epoch(), 0);
        guard.advance();
        drop(guard);
        assert_eq!(gate.enter("cli:direct").await.epoch(), 1);
    }

    #[tokio::test]
    async fn test_lane_is_exclusive() {
        let gate = Arc::new(SessionGate::new());
        let guard = gate.enter("cli:direct").await;

        let other = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.enter("cli:direct").await.epoch() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!other.is_finished());

        let unrelated = gate.enter("cli:other").await;
        drop(unrelated);

        drop(guard);
        assert_eq!(other.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prunes_unused_lanes() {
        let gate = SessionGate::new();
        let held = gate.lane("keep").await;
        for i in 0..PRUNE_THRESHOLD {
            drop(gate.lane(&format!("s{i}")).await);
        }
        assert!(gate.len().await <= PRUNE_THRESHOLD);
        assert!(Arc::ptr_eq(&held, &gate.lane("keep").await));
    }
}
