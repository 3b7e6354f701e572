//! Per-connection configuration snapshot.

use std::time::Duration;

use wsgate_protocol::{BufferLimits, ConfigError, InitParams, keys};

/// Read timeout reported to the host when no idle timeout is configured.
pub const NO_TIMEOUT: i64 = -1;

/// Tunables resolved once when an adapter is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterConfig {
    idle_timeout_secs: i64,
    buffer_limits: BufferLimits,
}

impl AdapterConfig {
    /// Read `websocket.idle-timeout-seconds` and
    /// `websocket.max-buffer-size-bytes` from `params`.
    pub fn resolve(params: &InitParams) -> Result<Self, ConfigError> {
        let idle_timeout_secs = params
            .non_negative(keys::IDLE_TIMEOUT_SECONDS)?
            .map_or(NO_TIMEOUT, |secs| i64::try_from(secs).unwrap_or(i64::MAX));
        let buffer_limits = params
            .positive(keys::MAX_BUFFER_SIZE_BYTES)?
            .map_or_else(BufferLimits::host_default, BufferLimits::uniform);

        Ok(Self {
            idle_timeout_secs,
            buffer_limits,
        })
    }

    pub fn with_idle_timeout_secs(mut self, secs: u32) -> Self {
        self.idle_timeout_secs = i64::from(secs);
        self
    }

    pub fn with_buffer_limits(mut self, limits: BufferLimits) -> Self {
        self.buffer_limits = limits;
        self
    }

    /// Idle timeout in seconds, or [`NO_TIMEOUT`].
    pub fn read_timeout(&self) -> i64 {
        self.idle_timeout_secs
    }

    /// The idle timeout as a duration; `None` when disabled or zero.
    pub fn idle_timeout(&self) -> Option<Duration> {
        u64::try_from(self.idle_timeout_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn buffer_limits(&self) -> BufferLimits {
        self.buffer_limits
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: NO_TIMEOUT,
            buffer_limits: BufferLimits::host_default(),
        }
    }
}
