//! Broadcast hub fanning quaternion records out to WebSocket subscribers.

mod broadcast;

pub use broadcast::{BroadcastHub, DeliveryError, Frame, SubscriberId, Subscription};
