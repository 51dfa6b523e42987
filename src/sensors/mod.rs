//! Sensor values shared between the serial ingest thread and subscribers.
//!
//! The ingest thread is the only writer; WebSocket sessions only read the
//! latest value when they join.

pub mod latest;
pub mod quaternion;

pub use latest::LatestValue;
pub use quaternion::{Component, Quaternion};
