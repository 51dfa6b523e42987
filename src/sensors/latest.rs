//! Most recent quaternion, shared between the ingest thread and new
//! subscribers.

use super::Quaternion;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

/// Thread-safe holder of the last successfully parsed record.
///
/// Writes replace the whole record under the write lock, so readers never
/// see a torn value. Only the latest record is kept; there is no history.
///
/// # Example
/// ```ignore
/// let latest = Arc::new(LatestValue::new());
///
/// // Ingest thread
/// latest.set(Quaternion::new(0.1, 0.2, 0.3, 0.9));
///
/// // New WebSocket subscriber
/// let snapshot = latest.get();
/// ```
pub struct LatestValue {
    record: RwLock<Quaternion>,
    version: AtomicU32,
}

impl LatestValue {
    /// Create a store holding the identity quaternion.
    pub fn new() -> Self {
        Self::with_initial(Quaternion::IDENTITY)
    }

    pub fn with_initial(initial: Quaternion) -> Self {
        Self {
            record: RwLock::new(initial),
            version: AtomicU32::new(0),
        }
    }

    /// Get a snapshot of the current record.
    pub fn get(&self) -> Quaternion {
        *self.record.read()
    }

    /// Replace the stored record. Always increments the version.
    pub fn set(&self, record: Quaternion) {
        *self.record.write() = record;
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of `set` calls so far.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }
}

impl Default for LatestValue {
    fn default() -> Self {
        Self::new()
    }
}
