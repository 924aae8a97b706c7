//! # Core Configuration Module
//!
//! Tunables for the playback core, assembled with [`CoreConfigBuilder`].
//!
//! ## Overview
//!
//! Every timing constant the coordinator, backends, authenticator and library
//! rely on lives here so hosts can adjust them in one place. The builder
//! validates the values and fails fast with an actionable message.
//!
//! | Setting | Default | Used by |
//! |---------|---------|---------|
//! | `poll_interval` | 1s | time reporting without push updates |
//! | `connect_timeout` | 15s | remote session establishment |
//! | `connect_poll_interval` | 250ms | remote session establishment |
//! | `refresh_margin` | 60s | token refresh-before-expiry |
//! | `auth_request_timeout` | 30s | token exchange/refresh |
//! | `import_page_size` | 50 | remote catalog import |
//! | `previous_restart_threshold` | 3.0s | "previous" restarts the track past this point |
//! | `event_buffer_size` | 100 | [`EventBus`](crate::events::EventBus) |
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .poll_interval(Duration::from_millis(500))
//!     .import_page_size(25)
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.import_page_size, 25);
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use std::time::Duration;

/// Largest page the streaming service accepts for library listings.
pub const MAX_IMPORT_PAGE_SIZE: u32 = 50;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);
pub const DEFAULT_AUTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PREVIOUS_RESTART_THRESHOLD_SECS: f64 = 3.0;

/// Core configuration for the playback core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Interval of the position polling loops.
    pub poll_interval: Duration,

    /// How long to wait for a remote session to report "connected".
    pub connect_timeout: Duration,

    /// How often the session's connected flag is checked while waiting.
    pub connect_poll_interval: Duration,

    /// Tokens expiring within this margin are refreshed before use.
    pub refresh_margin: Duration,

    /// Upper bound for a single token exchange or refresh request.
    pub auth_request_timeout: Duration,

    /// Page size for paginated remote catalog imports.
    pub import_page_size: u32,

    /// Past this many seconds into a track, "previous" restarts it instead of
    /// moving back in the queue.
    pub previous_restart_threshold_secs: f64,

    pub event_buffer_size: usize,

    pub logging: LoggingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connect_poll_interval: DEFAULT_CONNECT_POLL_INTERVAL,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            auth_request_timeout: DEFAULT_AUTH_REQUEST_TIMEOUT,
            import_page_size: MAX_IMPORT_PAGE_SIZE,
            previous_restart_threshold_secs: DEFAULT_PREVIOUS_RESTART_THRESHOLD_SECS,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            logging: LoggingConfig::default(),
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Intervals and timeouts are non-zero
    /// - The connect poll interval fits inside the connect timeout
    /// - The import page size is within `1..=MAX_IMPORT_PAGE_SIZE`
    /// - The previous-restart threshold is a finite, non-negative number
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("poll_interval", self.poll_interval),
            ("connect_timeout", self.connect_timeout),
            ("connect_poll_interval", self.connect_poll_interval),
            ("auth_request_timeout", self.auth_request_timeout),
        ];
        for (name, value) in non_zero {
            if value.is_zero() {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.connect_poll_interval > self.connect_timeout {
            return Err(Error::Config(
                "connect_poll_interval cannot exceed connect_timeout".to_string(),
            ));
        }

        if self.import_page_size == 0 || self.import_page_size > MAX_IMPORT_PAGE_SIZE {
            return Err(Error::Config(format!(
                "import_page_size must be between 1 and {} (got {})",
                MAX_IMPORT_PAGE_SIZE, self.import_page_size
            )));
        }

        if !self.previous_restart_threshold_secs.is_finite()
            || self.previous_restart_threshold_secs < 0.0
        {
            return Err(Error::Config(
                "previous_restart_threshold_secs must be a non-negative number".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Unset values fall back to the documented defaults.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    poll_interval: Option<Duration>,
    connect_timeout: Option<Duration>,
    connect_poll_interval: Option<Duration>,
    refresh_margin: Option<Duration>,
    auth_request_timeout: Option<Duration>,
    import_page_size: Option<u32>,
    previous_restart_threshold_secs: Option<f64>,
    event_buffer_size: Option<usize>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn connect_poll_interval(mut self, interval: Duration) -> Self {
        self.connect_poll_interval = Some(interval);
        self
    }

    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = Some(margin);
        self
    }

    pub fn auth_request_timeout(mut self, timeout: Duration) -> Self {
        self.auth_request_timeout = Some(timeout);
        self
    }

    pub fn import_page_size(mut self, size: u32) -> Self {
        self.import_page_size = Some(size);
        self
    }

    pub fn previous_restart_threshold_secs(mut self, secs: f64) -> Self {
        self.previous_restart_threshold_secs = Some(secs);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::default();

        let config = CoreConfig {
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            connect_poll_interval: self
                .connect_poll_interval
                .unwrap_or(defaults.connect_poll_interval),
            refresh_margin: self.refresh_margin.unwrap_or(defaults.refresh_margin),
            auth_request_timeout: self
                .auth_request_timeout
                .unwrap_or(defaults.auth_request_timeout),
            import_page_size: self.import_page_size.unwrap_or(defaults.import_page_size),
            previous_restart_threshold_secs: self
                .previous_restart_threshold_secs
                .unwrap_or(defaults.previous_restart_threshold_secs),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
            logging: self.logging.unwrap_or(defaults.logging),
        };

        config.validate()?;

        Ok(config)
    }
}
