//! Single-slot snapshot mailbox between a configuration thread and the
//! audio thread.
//!
//! The configuration side publishes complete [`StateSnapshot`]s; the audio
//! side claims at most the latest one at the start of a callback. A newer
//! publish replaces an unclaimed snapshot.
//!
//! # Memory Ownership
//!
//! ```text
//! publish ──▶ [pending] ──try_claim──▶ ClaimedSnapshot ──drop──▶ [retired]
//!    │                                                               │
//!    └──────────────── collect_garbage (config thread) ◀─────────────┘
//! ```
//!
//! Snapshots are boxed on the configuration thread and freed there too.
//! The audio thread only moves pointers with atomic operations: claiming
//! swaps the pending slot to null, and dropping a claim pushes the node onto
//! an intrusive retire stack. Whatever is still pending or retired when both
//! halves are gone is freed with the shared state.

use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use crate::parameters::StateSnapshot;

struct Node {
    snapshot: StateSnapshot,
    /// Link in the retire stack. Only written by the claimer before pushing.
    next: *mut Node,
}

struct Shared {
    pending: AtomicPtr<Node>,
    retired: AtomicPtr<Node>,
}

impl Shared {
    fn push_retired(&self, node: NonNull<Node>) {
        let node = node.as_ptr();
        let mut head = self.retired.load(Ordering::Relaxed);
        loop {
            // SAFETY: the claimer owns `node` exclusively until the push lands.
            unsafe { (*node).next = head };
            match self
                .retired
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    /// Free every retired node. Returns how many were freed.
    fn free_retired(&self) -> usize {
        let mut node = self.retired.swap(ptr::null_mut(), Ordering::Acquire);
        let mut freed = 0;
        while !node.is_null() {
            // SAFETY: nodes on the retire stack came from Box::into_raw and
            // are no longer reachable by the audio thread.
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
            freed += 1;
        }
        freed
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let pending = self.pending.swap(ptr::null_mut(), Ordering::Acquire);
        if !pending.is_null() {
            // SAFETY: both halves are gone, nobody else can observe the node.
            drop(unsafe { Box::from_raw(pending) });
        }
        self.free_retired();
    }
}

/// Create a connected publisher/receiver pair.
pub fn channel() -> (SnapshotPublisher, SnapshotReceiver) {
    let shared = Arc::new(Shared {
        pending: AtomicPtr::new(ptr::null_mut()),
        retired: AtomicPtr::new(ptr::null_mut()),
    });
    (
        SnapshotPublisher {
            shared: Arc::clone(&shared),
        },
        SnapshotReceiver { shared },
    )
}

// =============================================================================
// Publisher (configuration thread)
// =============================================================================

/// Configuration-thread half of the mailbox.
pub struct SnapshotPublisher {
    shared: Arc<Shared>,
}

impl SnapshotPublisher {
    /// Make `snapshot` the pending snapshot.
    ///
    /// An unclaimed earlier snapshot is replaced and freed here. Retired
    /// snapshots are collected first.
    pub fn publish(&mut self, snapshot: StateSnapshot) {
        self.collect_garbage();
        let node = Box::into_raw(Box::new(Node {
            snapshot,
            next: ptr::null_mut(),
        }));
        let replaced = self.shared.pending.swap(node, Ordering::AcqRel);
        if !replaced.is_null() {
            // SAFETY: the swap handed us the only reference; the audio thread
            // did not claim it.
            drop(unsafe { Box::from_raw(replaced) });
        }
    }

    /// Free snapshots the audio thread has finished with.
    ///
    /// Returns how many were freed.
    pub fn collect_garbage(&mut self) -> usize {
        self.shared.free_retired()
    }

    /// Returns true if a published snapshot has not been claimed yet.
    pub fn has_pending(&self) -> bool {
        !self.shared.pending.load(Ordering::Acquire).is_null()
    }

    /// Inspect the unclaimed snapshot, if any.
    pub fn with_pending<R>(&self, f: impl FnOnce(&StateSnapshot) -> R) -> Option<R> {
        let node = self.shared.pending.load(Ordering::Acquire);
        // SAFETY: nodes are only freed by this publisher (`&mut self`), so a
        // node seen here stays alive for the duration of the borrow even if
        // the audio thread claims it concurrently.
        NonNull::new(node).map(|node| f(unsafe { &node.as_ref().snapshot }))
    }
}

// =============================================================================
// Receiver (audio thread)
// =============================================================================

/// Audio-thread half of the mailbox. Wait-free and allocation-free.
pub struct SnapshotReceiver {
    shared: Arc<Shared>,
}

impl SnapshotReceiver {
    /// Take the pending snapshot, if one was published since the last claim.
    pub fn try_claim(&mut self) -> Option<ClaimedSnapshot<'_>> {
        let node = self.shared.pending.swap(ptr::null_mut(), Ordering::AcqRel);
        NonNull::new(node).map(|node| ClaimedSnapshot {
            node,
            shared: &self.shared,
        })
    }
}

/// A claimed snapshot. Dropping it retires the snapshot without freeing.
pub struct ClaimedSnapshot<'a> {
    node: NonNull<Node>,
    shared: &'a Shared,
}

impl Deref for ClaimedSnapshot<'_> {
    type Target = StateSnapshot;

    fn deref(&self) -> &StateSnapshot {
        // SAFETY: the node stays allocated until it is retired on drop.
        unsafe { &self.node.as_ref().snapshot }
    }
}

impl Drop for ClaimedSnapshot<'_> {
    fn drop(&mut self) {
        self.shared.push_retired(self.node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ReverbParameter;

    fn snapshot(mix: f64) -> StateSnapshot {
        StateSnapshot::default().with(ReverbParameter::Mix, mix)
    }

    #[test]
    fn test_empty_mailbox_yields_nothing() {
        let (publisher, mut receiver) = channel();
        assert!(!publisher.has_pending());
        assert!(receiver.try_claim().is_none());
    }

    #[test]
    fn test_claim_exactly_once() {
        let (mut publisher, mut receiver) = channel();
        publisher.publish(snapshot(0.8));
        assert!(publisher.has_pending());

        {
            let claimed = receiver.try_claim().unwrap();
            assert_eq!(claimed.get(ReverbParameter::Mix), 0.8);
        }
        assert!(receiver.try_claim().is_none());
        assert!(!publisher.has_pending());
        assert_eq!(publisher.collect_garbage(), 1);
        assert_eq!(publisher.collect_garbage(), 0);
    }

    #[test]
    fn test_latest_publish_wins() {
        let (mut publisher, mut receiver) = channel();
        publisher.publish(snapshot(0.2));
        publisher.publish(snapshot(0.4));
        assert_eq!(publisher.with_pending(|s| s.get(ReverbParameter::Mix)), Some(0.4));

        let claimed = receiver.try_claim().unwrap();
        assert_eq!(claimed.get(ReverbParameter::Mix), 0.4);
    }

    #[test]
    fn test_publish_collects_retired() {
        let (mut publisher, mut receiver) = channel();
        publisher.publish(snapshot(0.1));
        drop(receiver.try_claim());
        publisher.publish(snapshot(0.2));
        // The first node was freed by the second publish.
        assert_eq!(publisher.collect_garbage(), 0);
    }

    #[test]
    fn test_drop_with_pending_and_retired() {
        let (mut publisher, mut receiver) = channel();
        publisher.publish(snapshot(0.1));
        let claimed = receiver.try_claim().unwrap();
        publisher.publish(snapshot(0.3));
        drop(claimed);
        // One retired and one pending node, both freed with the shared state.
        drop(publisher);
        drop(receiver);
    }

    #[test]
    fn test_concurrent_claims_observe_publish_order() {
        let (mut publisher, mut receiver) = channel();
        let audio = std::thread::spawn(move || {
            let mut last = -1.0;
            let mut claims = 0;
            while last < 1.0 {
                if let Some(claimed) = receiver.try_claim() {
                    let mix = claimed.get(ReverbParameter::Mix);
                    assert!(mix > last, "snapshots arrived out of order");
                    last = mix;
                    claims += 1;
                }
                std::hint::spin_loop();
            }
            claims
        });

        for step in 1..=100 {
            publisher.publish(snapshot(step as f64 / 100.0));
        }
        let claims = audio.join().unwrap();
        assert!(claims >= 1);
        publisher.collect_garbage();
    }
}
