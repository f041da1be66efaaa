//! Builder pattern for device configuration.
//!
//! # Example
//!
//! ```no_run
//! use websock_broker::{Device, Wsj1Options};
//!
//! let device = Device::builder()
//!     .wsj1(Wsj1Options::new().max_pending_calls(16))
//!     .build();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::transport::{Binder, Wsj1Binder, Wsj1Options};

use super::device::Device;

// ============================================================================
// DeviceBuilder
// ============================================================================

/// Builder for configuring a [`Device`] instance.
///
/// Use [`Device::builder()`] to create a new builder.
#[derive(Default)]
pub struct DeviceBuilder {
    /// Binder producing sessions and listeners.
    binder: Option<Arc<dyn Binder>>,
}

impl DeviceBuilder {
    /// Creates a builder using the default WSJ1 binder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the WSJ1 binder with the given options.
    #[inline]
    #[must_use]
    pub fn wsj1(mut self, options: Wsj1Options) -> Self {
        self.binder = Some(Arc::new(Wsj1Binder::new(options)));
        self
    }

    /// Uses a custom binder.
    #[inline]
    #[must_use]
    pub fn binder(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Builds the device with an empty registry.
    #[must_use]
    pub fn build(self) -> Device {
        let binder: Arc<dyn Binder> = match self.binder {
            Some(binder) => binder,
            None => Arc::new(Wsj1Binder::default()),
        };

        Device::with_binder(binder)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_build_is_empty() {
        let device = DeviceBuilder::new().build();
        assert!(device.servers().is_empty());
        assert!(device.clients().is_empty());
    }

    #[test]
    fn test_custom_wsj1_options() {
        let device = DeviceBuilder::new()
            .wsj1(Wsj1Options::new().path("/ws"))
            .build();
        assert!(device.servers().is_empty());
    }
}
