//! Quaternion bridge library.
//!
//! Reads `i,j,k,real` orientation records from a serial IMU and fans each
//! record out to every connected WebSocket viewer.

pub mod config;
pub mod error;
pub mod hub;
pub mod input;
pub mod sensors;
pub mod server;
