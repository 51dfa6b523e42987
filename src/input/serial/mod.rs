//! Serial input source for the IMU quaternion stream.
//!
//! The device prints one `i,j,k,real` record per line. This module opens the
//! port, splits the byte stream into lines, parses each line and feeds the
//! result into the latest-value store and the broadcast hub.

mod client;
mod integration;
mod parser;

pub use client::{LineReader, LineSource, SerialSource, read_lines};
pub use integration::{IngestLoop, IngestState, IngestStats};
pub use parser::{ParseError, parse_quaternion};
