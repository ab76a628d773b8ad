//! Pending/in-flight request table and subscription registry
//!
//! Requests live in exactly one of two partitions: pending (not yet sent
//! because the connection is not open) or in-flight (sent, awaiting a
//! response). Subscriptions additionally keep a record here carrying the
//! server-assigned remote id once confirmed. All access happens under the
//! engine lock.

use crate::engine::{ResponseHandler, SubscriptionHandler};
use crate::{RequestId, RpcError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A correlated request owned by the store until answered, cancelled, or
/// discarded at disconnect.
pub(crate) struct Request {
    pub id: RequestId,
    /// Serialized envelope, resent verbatim on replay.
    pub payload: String,
    pub resend_on_reconnect: bool,
    /// Subscription shadow requests route their first response to the
    /// registry instead of a response handler.
    pub is_subscription: bool,
    pub handler: Option<ResponseHandler>,
    /// Submission counter preserving FIFO order across requeues.
    pub seq: u64,
}

/// An active subscription keyed by its local request id.
pub(crate) struct SubscriptionRecord {
    pub local_id: RequestId,
    /// Server-assigned id; `Some` only while connected and confirmed since
    /// the latest connection establishment.
    pub remote_id: Option<String>,
    /// Original subscribe envelope, used to regenerate the shadow request
    /// after a disconnect.
    pub payload: String,
    pub handler: Arc<Mutex<dyn SubscriptionHandler>>,
    pub seq: u64,
}

/// Pending queue, in-flight table, and request id allocator.
pub(crate) struct RequestStore {
    pending: VecDeque<Request>,
    in_flight: HashMap<RequestId, Request>,
    next_id: RequestId,
    next_seq: u64,
}

impl RequestStore {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
            next_id: 1,
            next_seq: 0,
        }
    }

    /// Allocate an id unique among the union of pending and in-flight ids.
    ///
    /// Ids are never reused while still outstanding; 0 is reserved.
    pub fn allocate_id(&mut self) -> crate::Result<RequestId> {
        for _ in 0..u16::MAX {
            let candidate = self.next_id;
            self.next_id = if self.next_id == u16::MAX {
                1
            } else {
                self.next_id + 1
            };
            if !self.is_outstanding(candidate) {
                return Ok(candidate);
            }
        }
        Err(RpcError::IdsExhausted)
    }

    fn is_outstanding(&self, id: RequestId) -> bool {
        self.in_flight.contains_key(&id) || self.pending.iter().any(|request| request.id == id)
    }

    /// Next submission sequence number.
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn push_pending(&mut self, request: Request) {
        self.pending.push_back(request);
    }

    /// Restore FIFO submission order after requeues have been appended.
    pub fn sort_pending(&mut self) {
        self.pending
            .make_contiguous()
            .sort_by_key(|request| request.seq);
    }

    /// Take every pending request in FIFO submission order.
    pub fn drain_pending(&mut self) -> Vec<Request> {
        self.sort_pending();
        self.pending.drain(..).collect()
    }

    pub fn mark_in_flight(&mut self, request: Request) {
        self.in_flight.insert(request.id, request);
    }

    pub fn take_in_flight(&mut self, id: RequestId) -> Option<Request> {
        self.in_flight.remove(&id)
    }

    /// Remove a request from whichever partition holds it.
    pub fn take_any(&mut self, id: RequestId) -> Option<Request> {
        if let Some(request) = self.in_flight.remove(&id) {
            return Some(request);
        }
        let position = self.pending.iter().position(|request| request.id == id)?;
        self.pending.remove(position)
    }

    /// Take every in-flight request in original submission order.
    pub fn drain_in_flight(&mut self) -> Vec<Request> {
        let mut drained: Vec<Request> =
            self.in_flight.drain().map(|(_, request)| request).collect();
        drained.sort_by_key(|request| request.seq);
        drained
    }

    /// Take everything, pending and in-flight, in submission order.
    pub fn drain_all(&mut self) -> Vec<Request> {
        let mut drained: Vec<Request> = self
            .pending
            .drain(..)
            .chain(self.in_flight.drain().map(|(_, request)| request))
            .collect();
        drained.sort_by_key(|request| request.seq);
        drained
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}

/// Active subscriptions keyed by local request id.
pub(crate) struct SubscriptionRegistry {
    subscriptions: HashMap<RequestId, SubscriptionRecord>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, record: SubscriptionRecord) {
        self.subscriptions.insert(record.local_id, record);
    }

    pub fn remove(&mut self, local_id: RequestId) -> Option<SubscriptionRecord> {
        self.subscriptions.remove(&local_id)
    }

    pub fn get_mut(&mut self, local_id: RequestId) -> Option<&mut SubscriptionRecord> {
        self.subscriptions.get_mut(&local_id)
    }

    /// Look up the subscription currently holding the given remote id.
    pub fn by_remote(&self, remote_id: &str) -> Option<&SubscriptionRecord> {
        self.subscriptions
            .values()
            .find(|record| record.remote_id.as_deref() == Some(remote_id))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SubscriptionRecord> {
        self.subscriptions.values_mut()
    }

    pub fn drain(&mut self) -> Vec<SubscriptionRecord> {
        self.subscriptions.drain().map(|(_, record)| record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: RequestId, seq: u64) -> Request {
        Request {
            id,
            payload: format!("{{\"id\":{}}}", id),
            resend_on_reconnect: true,
            is_subscription: false,
            handler: None,
            seq,
        }
    }

    #[test]
    fn test_allocate_skips_outstanding_ids() {
        let mut store = RequestStore::new();
        let mut outstanding = Vec::new();
        for _ in 0..32 {
            let id = store.allocate_id().unwrap();
            let seq = store.next_seq();
            store.push_pending(request(id, seq));
            outstanding.push(id);
        }
        // Rewind the cursor so the allocator walks straight into the
        // outstanding range and has to skip over it.
        store.next_id = outstanding[0];
        let fresh = store.allocate_id().unwrap();
        assert!(!outstanding.contains(&fresh));
    }

    #[test]
    fn test_allocate_unique_across_partitions() {
        let mut store = RequestStore::new();
        let a = store.allocate_id().unwrap();
        let seq = store.next_seq();
        store.push_pending(request(a, seq));
        let b = store.allocate_id().unwrap();
        let seq = store.next_seq();
        store.mark_in_flight(request(b, seq));
        let c = store.allocate_id().unwrap();
        assert_ne!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn test_drain_pending_is_fifo() {
        let mut store = RequestStore::new();
        for id in [5u16, 9, 2] {
            let seq = store.next_seq();
            store.push_pending(request(id, seq));
        }
        let drained = store.drain_pending();
        let ids: Vec<RequestId> = drained.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 9, 2]);
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn test_requeue_preserves_submission_order() {
        let mut store = RequestStore::new();
        // Submitted 1, 2, 3; 1 and 3 went in-flight, 2 stayed pending.
        let first = request(1, store.next_seq());
        let second = request(2, store.next_seq());
        let third = request(3, store.next_seq());
        store.mark_in_flight(first);
        store.push_pending(second);
        store.mark_in_flight(third);

        for requeued in store.drain_in_flight() {
            store.push_pending(requeued);
        }
        let ids: Vec<RequestId> = store.drain_pending().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_take_any_finds_both_partitions() {
        let mut store = RequestStore::new();
        let pending = request(1, store.next_seq());
        let flying = request(2, store.next_seq());
        store.push_pending(pending);
        store.mark_in_flight(flying);

        assert_eq!(store.take_any(1).unwrap().id, 1);
        assert_eq!(store.take_any(2).unwrap().id, 2);
        assert!(store.take_any(3).is_none());
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.in_flight_len(), 0);
    }

    #[test]
    fn test_registry_remote_lookup() {
        struct Ignore;
        impl SubscriptionHandler for Ignore {
            fn on_update(&mut self, _update: serde_json::Value) {}
            fn on_failure(&mut self, _error: RpcError) {}
        }

        let mut registry = SubscriptionRegistry::new();
        registry.insert(SubscriptionRecord {
            local_id: 4,
            remote_id: Some("sub1".to_string()),
            payload: String::new(),
            handler: Arc::new(Mutex::new(Ignore)),
            seq: 0,
        });

        assert_eq!(registry.by_remote("sub1").unwrap().local_id, 4);
        assert!(registry.by_remote("sub2").is_none());

        registry.get_mut(4).unwrap().remote_id = None;
        assert!(registry.by_remote("sub1").is_none());
    }
}
