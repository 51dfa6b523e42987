//! Subscriber set and fan-out.
//!
//! Every subscriber owns a bounded queue. Publishing never blocks: a full or
//! closed queue means the subscriber cannot keep up (or is gone) and it is
//! evicted on the spot.

use crate::sensors::{LatestValue, Quaternion};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// One serialized record, ready to be written as a WebSocket text message.
///
/// Cloning is cheap (shared buffer), so a record is encoded once per publish.
pub type Frame = axum::extract::ws::Utf8Bytes;

/// Opaque identity of a registered subscriber.
pub type SubscriberId = u64;

/// Why a frame could not be handed to a subscriber.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber's queue is full; it is not draining fast enough.
    #[error("subscriber queue full")]
    QueueFull,

    /// The receiving side of the queue is gone.
    #[error("subscriber disconnected")]
    Disconnected,
}

impl<T> From<TrySendError<T>> for DeliveryError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Disconnected,
        }
    }
}

/// Receiving end handed to a subscriber connection on registration.
///
/// The first frame in the queue is always the latest-value snapshot taken at
/// registration time.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Frame>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame. Returns `None` once the hub has dropped this
    /// subscriber.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }

    pub fn into_receiver(self) -> mpsc::Receiver<Frame> {
        self.receiver
    }
}

/// Set of live subscribers plus the latest value they are seeded with.
///
/// The hub is the only place the subscriber set is mutated. It has its own
/// lock, independent of the [`LatestValue`] lock.
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Frame>>>,
    latest: Arc<LatestValue>,
    next_id: AtomicU64,
    queue_depth: usize,
}

impl BroadcastHub {
    /// Create a hub seeding new subscribers from `latest`.
    ///
    /// # Arguments
    /// * `latest` - Store written by the ingest loop
    /// * `queue_depth` - Frames buffered per subscriber before eviction (min 1)
    pub fn new(latest: Arc<LatestValue>, queue_depth: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            latest,
            next_id: AtomicU64::new(1),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Add a subscriber and queue the current snapshot as its first message.
    ///
    /// The snapshot is queued while holding the subscriber lock, so no
    /// concurrent publish can overtake it.
    pub fn register(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_depth);

        let mut subscribers = self.subscribers.lock();
        match encode(&self.latest.get()) {
            Some(frame) => {
                // Fresh queue with capacity >= 1, cannot be full
                if let Err(e) = tx.try_send(frame) {
                    warn!(
                        "[Hub] Failed to queue snapshot for subscriber {}: {}",
                        id,
                        DeliveryError::from(e)
                    );
                }
            }
            None => warn!("[Hub] Subscriber {} joined without a snapshot", id),
        }
        subscribers.insert(id, tx);
        let count = subscribers.len();
        drop(subscribers);

        info!("[Hub] Subscriber {} registered ({} active)", id, count);
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            info!("[Hub] Subscriber {} unregistered", id);
        }
        removed
    }

    /// Serialize `record` once and queue it for every subscriber.
    ///
    /// Subscribers whose queue is full or closed are removed before this
    /// returns. Returns the number of subscribers the record was queued for.
    pub fn publish(&self, record: &Quaternion) -> usize {
        let Some(frame) = encode(record) else {
            return 0;
        };

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(e) => {
                let reason = DeliveryError::from(e);
                match reason {
                    DeliveryError::QueueFull => {
                        warn!("[Hub] Evicting subscriber {}: {}", id, reason)
                    }
                    DeliveryError::Disconnected => {
                        debug!("[Hub] Evicting subscriber {}: {}", id, reason)
                    }
                }
                false
            }
        });
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    pub fn latest(&self) -> &Arc<LatestValue> {
        &self.latest
    }
}

/// Serialize a record, or `None` if it cannot be sent as four JSON numbers.
fn encode(record: &Quaternion) -> Option<Frame> {
    if !record.is_finite() {
        error!("[Hub] Error marshaling quaternion: non-finite value in {:?}", record);
        return None;
    }
    match serde_json::to_string(record) {
        Ok(json) => Some(Frame::from(json)),
        Err(e) => {
            error!("[Hub] Error marshaling quaternion: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::serial::parse_quaternion;

    fn decode(frame: &Frame) -> Quaternion {
        serde_json::from_str(frame.as_str()).unwrap()
    }

    fn hub_with_depth(depth: usize) -> BroadcastHub {
        BroadcastHub::new(Arc::new(LatestValue::new()), depth)
    }

    #[test]
    fn test_register_sends_snapshot_first() {
        let latest = Arc::new(LatestValue::new());
        latest.set(Quaternion::new(0.1, 0.2, 0.3, 0.9));
        let hub = BroadcastHub::new(latest, 8);

        let mut sub = hub.register();
        let first = sub.try_recv().expect("snapshot queued on register");
        assert_eq!(decode(&first), Quaternion::new(0.1, 0.2, 0.3, 0.9));
        assert!(sub.try_recv().is_none());
        assert!(hub.is_registered(sub.id()));
    }

    #[test]
    fn test_initial_snapshot_is_identity() {
        let hub = hub_with_depth(8);
        let mut sub = hub.register();
        assert_eq!(decode(&sub.try_recv().unwrap()), Quaternion::IDENTITY);
    }

    #[test]
    fn test_subscriber_ids_are_unique() {
        let hub = hub_with_depth(8);
        let a = hub.register();
        let b = hub.register();
        assert_ne!(a.id(), b.id());
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let hub = hub_with_depth(8);
        let mut subs: Vec<Subscription> = (0..5).map(|_| hub.register()).collect();
        for sub in &mut subs {
            sub.try_recv().unwrap();
        }

        let record = Quaternion::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(hub.publish(&record), 5);

        for sub in &mut subs {
            assert_eq!(decode(&sub.try_recv().unwrap()), record);
        }
    }

    #[test]
    fn test_publish_preserves_order() {
        let hub = hub_with_depth(16);
        let mut sub = hub.register();
        sub.try_recv().unwrap();

        for n in 0..10 {
            hub.publish(&Quaternion::new(n as f64, 0.0, 0.0, 1.0));
        }
        for n in 0..10 {
            assert_eq!(decode(&sub.try_recv().unwrap()).i, n as f64);
        }
    }

    #[test]
    fn test_full_queue_evicts_subscriber() {
        let hub = hub_with_depth(2);
        let mut slow = hub.register(); // snapshot occupies 1 of 2 slots
        let mut fast = hub.register();
        fast.try_recv().unwrap();

        assert_eq!(hub.publish(&Quaternion::new(1.0, 0.0, 0.0, 0.0)), 2);
        fast.try_recv().unwrap();

        // slow is now full
        assert_eq!(hub.publish(&Quaternion::new(2.0, 0.0, 0.0, 0.0)), 1);
        assert!(!hub.is_registered(slow.id()));
        assert!(hub.is_registered(fast.id()));

        // Later records never reach the evicted subscriber
        hub.publish(&Quaternion::new(3.0, 0.0, 0.0, 0.0));
        assert_eq!(decode(&slow.try_recv().unwrap()), Quaternion::IDENTITY);
        assert_eq!(decode(&slow.try_recv().unwrap()).i, 1.0);
        assert!(slow.try_recv().is_none());

        assert_eq!(decode(&fast.try_recv().unwrap()).i, 2.0);
        assert_eq!(decode(&fast.try_recv().unwrap()).i, 3.0);
    }

    #[test]
    fn test_closed_receiver_evicted_on_publish() {
        let hub = hub_with_depth(8);
        let gone = hub.register();
        let gone_id = gone.id();
        drop(gone);

        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.publish(&Quaternion::IDENTITY), 0);
        assert!(!hub.is_registered(gone_id));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let hub = hub_with_depth(8);
        let sub = hub.register();

        assert!(hub.unregister(sub.id()));
        assert!(!hub.unregister(sub.id()));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_closes_queue() {
        let hub = hub_with_depth(8);
        let mut sub = hub.register();
        hub.unregister(sub.id());

        // Snapshot is still delivered, then the queue ends
        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_non_finite_record_not_delivered() {
        let hub = hub_with_depth(8);
        let mut sub = hub.register();
        sub.try_recv().unwrap();

        let record = parse_quaternion("nan,inf,0,1").unwrap();
        assert_eq!(hub.publish(&record), 0);
        assert!(sub.try_recv().is_none());

        // The subscriber is kept and still gets the next good record
        assert!(hub.is_registered(sub.id()));
        assert_eq!(hub.publish(&Quaternion::IDENTITY), 1);
        assert_eq!(decode(&sub.try_recv().unwrap()), Quaternion::IDENTITY);
    }

    #[test]
    fn test_non_finite_latest_gives_no_snapshot() {
        let latest = Arc::new(LatestValue::new());
        latest.set(Quaternion::new(f64::NAN, 0.0, 0.0, 1.0));
        let hub = BroadcastHub::new(latest, 8);

        let mut sub = hub.register();
        assert!(sub.try_recv().is_none());
        assert!(hub.is_registered(sub.id()));
    }

    #[test]
    fn test_delivery_error_from_try_send() {
        assert_eq!(
            DeliveryError::from(TrySendError::Full(())),
            DeliveryError::QueueFull
        );
        assert_eq!(
            DeliveryError::from(TrySendError::Closed(())),
            DeliveryError::Disconnected
        );
    }
}
