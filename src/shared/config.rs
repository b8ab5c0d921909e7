//! Chat configuration module
//!
//! Provides configuration for the messaging core: the read-state suppression
//! window and the last-message preview length.

use std::time::Duration;
use thiserror::Error;

/// Messaging core configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// How long a freshly-marked conversation keeps its unread count forced
    /// to zero while the mark-as-read write settles
    pub suppression_window: Duration,
    /// Maximum characters of the last-message preview in the directory
    pub preview_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            suppression_window: Duration::from_millis(500),
            preview_length: 80,
        }
    }
}

impl ChatConfig {
    /// Create a new ChatConfigBuilder
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preview_length < 4 {
            return Err(ConfigError::InvalidValue(
                "preview_length",
                "must be at least 4 to leave room for the ellipsis".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ChatConfig
#[derive(Debug, Default)]
pub struct ChatConfigBuilder {
    suppression_window: Option<Duration>,
    preview_length: Option<usize>,
}

impl ChatConfigBuilder {
    /// Set the suppression window
    pub fn suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = Some(window);
        self
    }

    /// Set the preview length
    pub fn preview_length(mut self, len: usize) -> Self {
        self.preview_length = Some(len);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ChatConfig, ConfigError> {
        let defaults = ChatConfig::default();
        let config = ChatConfig {
            suppression_window: self.suppression_window.unwrap_or(defaults.suppression_window),
            preview_length: self.preview_length.unwrap_or(defaults.preview_length),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

impl From<ConfigError> for super::error::ChatError {
    fn from(err: ConfigError) -> Self {
        Self::config(err.to_string())
    }
}
