use tracing::info;

use crate::error::ExtDbError;
use crate::reply;

/// Tracing target every forwarded line is emitted under.
pub const LOG_TARGET: &str = "extdb::protocol::log";

/// Forwards call payloads to the logging sink.
#[derive(Debug, Clone, Default)]
pub struct LogForwarder {
    channel: Option<String>,
}

impl LogForwarder {
    #[must_use]
    pub fn new(channel: Option<String>) -> Self {
        Self { channel }
    }

    /// Build from protocol init text. Empty text means no channel.
    ///
    /// # Errors
    /// Returns `ExtDbError::ConfigError` when the channel name contains path components.
    pub fn from_init(init: &str) -> Result<Self, ExtDbError> {
        let init = init.trim();
        if init.is_empty() {
            return Ok(Self::new(None));
        }
        if init.contains(['/', '\\']) || init.contains("..") {
            return Err(ExtDbError::ConfigError(format!(
                "invalid log channel name {init}"
            )));
        }
        Ok(Self::new(Some(init.to_string())))
    }

    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    #[must_use]
    pub fn forward(&self, input: &str) -> String {
        match &self.channel {
            Some(channel) => info!(target: LOG_TARGET, channel = %channel, "{input}"),
            None => info!(target: LOG_TARGET, "{input}"),
        }
        reply::OK.to_string()
    }
}
