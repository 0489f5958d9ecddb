//! # Scheduler configuration.
//!
//! [`MapConfig`] controls the buffered map's behavior: how many worker
//! tasks may be in flight at once, whether results are delivered in strict
//! input order, and the capacity of the event bus.
//!
//! # Example
//! ```
//! use bufmap::MapConfig;
//!
//! let mut cfg = MapConfig::default();
//! cfg.capacity = 4;
//! cfg.ordered = true;
//!
//! assert!(cfg.validate().is_ok());
//! ```

use crate::error::MapError;

/// Configuration for a [`BufferedMap`](crate::BufferedMap).
///
/// Controls the concurrency budget, delivery order, and event bus capacity.
#[derive(Clone, Copy, Debug)]
pub struct MapConfig {
    /// Maximum number of tasks buffered in flight at once.
    pub capacity: usize,
    /// Deliver results in strict input order instead of completion order.
    pub ordered: bool,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for MapConfig {
    /// Provides a default configuration:
    /// - `capacity = 6`
    /// - `ordered = false` (completion order)
    /// - `bus_capacity = 64`
    fn default() -> Self {
        Self {
            capacity: 6,
            ordered: false,
            bus_capacity: 64,
        }
    }
}

impl MapConfig {
    /// Checks the configuration for invalid values.
    ///
    /// Returns [`MapError::InvalidCapacity`] when `capacity` is zero; a
    /// zero-capacity buffer could never hold a task and the scheduler would
    /// terminate before producing anything.
    pub fn validate(&self) -> Result<(), MapError> {
        if self.capacity == 0 {
            return Err(MapError::InvalidCapacity);
        }
        Ok(())
    }
}
