//! Ingest loop: line source -> parser -> latest value -> broadcast hub.
//!
//! Runs for the lifetime of the process on its own thread, because serial
//! reads block. Reconnects whenever the source fails to open or its line
//! sequence ends.

use super::client::{LineSource, read_lines};
use super::parser::parse_quaternion;
use crate::hub::BroadcastHub;
use crate::sensors::LatestValue;
use log::{info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Ingest state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Trying to open the line source.
    Connecting,
    /// Source open; consuming lines.
    Reading,
}

/// Counters accumulated over the life of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub sessions_opened: u64,
    pub open_failures: u64,
    pub records_published: u64,
    pub parse_errors: u64,
}

/// Drives a [`LineSource`] and feeds parsed records to subscribers.
///
/// The loop is the only writer of the [`LatestValue`] store. Every record is
/// stored before it is published, so a subscriber joining mid-publish gets
/// either that record as its snapshot or the next publish.
pub struct IngestLoop<S: LineSource> {
    source: S,
    latest: Arc<LatestValue>,
    hub: Arc<BroadcastHub>,
    retry_interval: Duration,
    state: IngestState,
    stats: IngestStats,
}

impl<S: LineSource + 'static> IngestLoop<S> {
    pub fn new(
        source: S,
        latest: Arc<LatestValue>,
        hub: Arc<BroadcastHub>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            source,
            latest,
            hub,
            retry_interval,
            state: IngestState::Connecting,
            stats: IngestStats::default(),
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Run one Connecting -> (Reading ->) Connecting cycle.
    ///
    /// On open failure this sleeps for the retry interval before returning.
    /// On success it consumes the whole line sequence, then returns so the
    /// next call reopens the source.
    pub fn run_once(&mut self) {
        self.state = IngestState::Connecting;

        let reader = match self.source.open() {
            Ok(reader) => reader,
            Err(e) => {
                self.stats.open_failures += 1;
                warn!(
                    "[Serial] {}. Retrying in {:?}...",
                    e, self.retry_interval
                );
                thread::sleep(self.retry_interval);
                return;
            }
        };

        self.state = IngestState::Reading;
        self.stats.sessions_opened += 1;
        info!("[Serial] Reading quaternions from {}", self.source.name());

        for line in read_lines(reader) {
            self.handle_line(&line);
        }

        self.state = IngestState::Connecting;
        info!(
            "[Serial] {} closed ({} published, {} parse errors so far). Reconnecting...",
            self.source.name(),
            self.stats.records_published,
            self.stats.parse_errors
        );
    }

    fn handle_line(&mut self, line: &str) {
        match parse_quaternion(line) {
            Ok(record) => {
                self.latest.set(record);
                self.hub.publish(&record);
                self.stats.records_published += 1;
            }
            Err(e) => {
                self.stats.parse_errors += 1;
                warn!("[Serial] Error parsing quaternion: {} (line: {:?})", e, line);
            }
        }
    }

    /// Run forever. There is no stop signal; the loop lives as long as the
    /// process.
    pub fn run(mut self) {
        loop {
            self.run_once();
        }
    }

    /// Run the loop on a dedicated, named OS thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("serial-ingest".into())
            .spawn(move || self.run())
    }
}
