//! Input sources feeding the bridge.
//!
//! Current input sources:
//! - `serial`: line-oriented quaternion stream from an IMU on a UART

pub mod serial;
