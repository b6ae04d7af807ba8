//! Configuration for the demultiplexer.
//!
//! This layer deliberately has no file, environment, or CLI configuration
//! surface; those belong to the embedding process. What remains is a small
//! set of tunables with builder-style setters and validation.

use crate::error::StreamError;

/// Tunables for a [`Demultiplexer`].
///
/// [`Demultiplexer`]: crate::demux::Demultiplexer
#[derive(Debug, Clone)]
pub struct DemuxConfig {
    /// Diagnostic label attached to the listen loop's tracing output.
    pub label: String,
    /// Per-stream buffered entry count above which a warning is logged.
    ///
    /// Purely diagnostic: backpressure in this layer is "wait for the next
    /// entry", not admission control, so a consumer that stops iterating
    /// shows up as buffer growth rather than producer-side rejection.
    pub buffer_high_watermark: usize,
}

impl DemuxConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self { label: "demux".to_string(), buffer_high_watermark: 65_536 }
    }

    /// Set the diagnostic label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the per-stream buffer warning threshold.
    #[must_use]
    pub fn with_buffer_high_watermark(mut self, watermark: usize) -> Self {
        self.buffer_high_watermark = watermark;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns an error if the watermark is zero.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.buffer_high_watermark == 0 {
            return Err(StreamError::Configuration {
                detail: "buffer_high_watermark must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(DemuxConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_watermark_rejected() {
        let config = DemuxConfig::new().with_buffer_high_watermark(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = DemuxConfig::new().with_label("follower-3").with_buffer_high_watermark(128);
        assert_eq!(config.label, "follower-3");
        assert_eq!(config.buffer_high_watermark, 128);
    }
}
