use coprocwire_frame::{check_reserved, FieldPosition, ReaderConfig, DEFAULT_MAX_FRAME_SIZE, TERMINATOR};

use crate::error::{ClientError, Result};

/// Application id used when none is configured.
pub const DEFAULT_APPLICATION_ID: &str = "coprocwire";

/// Settings for a [`CoprocessorClient`](crate::CoprocessorClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identity echoed back in every response. Fixed for the client lifetime.
    pub application_id: String,
    /// Pacing and bounds for reading responses.
    pub reader: ReaderConfig,
    /// Largest outbound request accepted, terminator included.
    pub max_frame_size: usize,
    /// Discard stale input pending on the transport before each request.
    pub drain_before_call: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            reader: ReaderConfig::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            drain_before_call: true,
        }
    }
}

impl ClientConfig {
    /// Default settings with the given application id.
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.application_id.is_empty() {
            return Err(ClientError::InvalidConfig(
                "application id must not be empty".to_string(),
            ));
        }
        check_reserved("application id", &self.application_id, FieldPosition::First)
            .map_err(|err| ClientError::InvalidConfig(err.to_string()))?;

        if self.reader.timeout_iterations == 0 {
            return Err(ClientError::InvalidConfig(
                "reader timeout_iterations must be at least 1".to_string(),
            ));
        }
        if self.reader.max_frame_size < TERMINATOR.len() {
            return Err(ClientError::InvalidConfig(format!(
                "reader max_frame_size {} cannot hold a terminator",
                self.reader.max_frame_size
            )));
        }
        if self.max_frame_size < TERMINATOR.len() {
            return Err(ClientError::InvalidConfig(format!(
                "max_frame_size {} cannot hold a terminator",
                self.max_frame_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.drain_before_call);
        assert_eq!(config.application_id, DEFAULT_APPLICATION_ID);
        config.validate().expect("default config should validate");
    }

    #[test]
    fn rejects_empty_application_id() {
        let err = ClientConfig::new("").validate().expect_err("empty id");
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_application_id_with_reserved_sequence() {
        for id in ["ui;;;1", "ui;;@@&&", "ui;"] {
            let err = ClientConfig::new(id).validate().expect_err("reserved id");
            assert!(matches!(err, ClientError::InvalidConfig(_)), "{id}");
        }
    }

    #[test]
    fn rejects_zero_iteration_budget() {
        let mut config = ClientConfig::new("ui");
        config.reader.timeout_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_frame_limit_below_terminator() {
        let mut config = ClientConfig::new("ui");
        config.max_frame_size = 2;
        assert!(config.validate().is_err());
    }
}
