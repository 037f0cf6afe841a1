//! Fuzzing run configuration.
//!
//! [`FuzzConfig`] is the record handed over by the surrounding tool (command
//! line, environment, config file). It deserialises from camelCase JSON so an
//! external loader can pass it through untouched:
//!
//! ```
//! use page_fuzzer::FuzzConfig;
//!
//! let config = FuzzConfig::from_json(
//!     r#"{"headless": true, "interactionDelaySeconds": 0.5, "retryBound": 4}"#,
//! )?;
//! assert_eq!(config.retry_bound, 4);
//! assert!(!config.enable_devtools_capture);
//! # Ok::<(), page_fuzzer::Error>(())
//! ```
//!
//! Builder-style methods are available for programmatic use:
//!
//! ```
//! use std::time::Duration;
//! use page_fuzzer::FuzzConfig;
//!
//! let config = FuzzConfig::new()
//!     .with_retry_bound(5)
//!     .with_interaction_delay(Duration::from_millis(250))
//!     .with_devtools_capture(true);
//! assert!(config.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of interaction attempts.
pub const DEFAULT_RETRY_BOUND: u32 = 3;

/// Default delay between attempts and after each interaction, in seconds.
pub const DEFAULT_INTERACTION_DELAY_SECS: f64 = 1.0;

/// Default timeout for a single DevTools command, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: f64 = 30.0;

/// Page-text markers that hint at a server or client failure.
pub const DEFAULT_ERROR_INDICATORS: &[&str] = &[
    "error",
    "exception",
    "not found",
    "500 internal server error",
    "javascript error",
];

// ============================================================================
// FuzzConfig
// ============================================================================

/// Options recognised by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuzzConfig {
    /// Run the browser without a GUI. Consumed by the external launcher.
    pub headless: bool,

    /// Delay between interaction attempts and before the post-snapshot.
    pub interaction_delay_seconds: f64,

    /// Maximum interaction attempts per fuzz attempt (at least 1).
    pub retry_bound: u32,

    /// Capture console and script errors from DevTools events instead of
    /// an in-page hook.
    pub enable_devtools_capture: bool,

    /// Attach a screenshot to anomalous outcomes.
    pub capture_screenshots: bool,

    /// Timeout for a single DevTools command.
    pub command_timeout_seconds: f64,

    /// Case-insensitive page-text markers reported by the change detector.
    pub error_indicators: Vec<String>,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            headless: true,
            interaction_delay_seconds: DEFAULT_INTERACTION_DELAY_SECS,
            retry_bound: DEFAULT_RETRY_BOUND,
            enable_devtools_capture: false,
            capture_screenshots: true,
            command_timeout_seconds: DEFAULT_COMMAND_TIMEOUT_SECS,
            error_indicators: DEFAULT_ERROR_INDICATORS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl FuzzConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON configuration record.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the record is malformed
    /// - [`Error::Config`] if a value is out of range
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl FuzzConfig {
    /// Sets headless mode.
    #[inline]
    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Sets the interaction delay.
    #[inline]
    #[must_use]
    pub fn with_interaction_delay(mut self, delay: Duration) -> Self {
        self.interaction_delay_seconds = delay.as_secs_f64();
        self
    }

    /// Sets the retry bound.
    #[inline]
    #[must_use]
    pub fn with_retry_bound(mut self, attempts: u32) -> Self {
        self.retry_bound = attempts;
        self
    }

    /// Enables or disables DevTools event capture.
    #[inline]
    #[must_use]
    pub fn with_devtools_capture(mut self, enabled: bool) -> Self {
        self.enable_devtools_capture = enabled;
        self
    }

    /// Enables or disables screenshots on anomalous outcomes.
    #[inline]
    #[must_use]
    pub fn with_screenshots(mut self, enabled: bool) -> Self {
        self.capture_screenshots = enabled;
        self
    }

    /// Sets the DevTools command timeout.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_seconds = timeout.as_secs_f64();
        self
    }

    /// Replaces the error indicator list.
    #[inline]
    #[must_use]
    pub fn with_error_indicators(
        mut self,
        indicators: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.error_indicators = indicators.into_iter().map(Into::into).collect();
        self
    }
}

// ============================================================================
// Validation & Derived Values
// ============================================================================

impl FuzzConfig {
    /// Checks every option is in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending option.
    pub fn validate(&self) -> Result<()> {
        if self.retry_bound == 0 {
            return Err(Error::config("retryBound must be at least 1"));
        }
        if seconds(self.interaction_delay_seconds).is_none() {
            return Err(Error::config(format!(
                "interactionDelaySeconds must be a non-negative number of seconds, got {}",
                self.interaction_delay_seconds
            )));
        }
        if self.command_timeout_seconds <= 0.0 || seconds(self.command_timeout_seconds).is_none() {
            return Err(Error::config(format!(
                "commandTimeoutSeconds must be a positive number of seconds, got {}",
                self.command_timeout_seconds
            )));
        }
        Ok(())
    }

    /// Interaction delay as a [`Duration`].
    ///
    /// Out-of-range values clamp to zero; call [`validate`](Self::validate)
    /// to reject them instead.
    #[must_use]
    pub fn interaction_delay(&self) -> Duration {
        seconds(self.interaction_delay_seconds).unwrap_or(Duration::ZERO)
    }

    /// DevTools command timeout as a [`Duration`].
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        seconds(self.command_timeout_seconds)
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(Duration::from_secs_f64(DEFAULT_COMMAND_TIMEOUT_SECS))
    }

    /// Retry policy derived from `retryBound` and the interaction delay.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_bound, self.interaction_delay())
    }
}

/// `None` for negative, non-finite or overflowing values.
fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bounded attempt schedule with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `attempts` is raised to at least 1.
    #[inline]
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A policy that never retries.
    #[inline]
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_BOUND,
            Duration::from_secs_f64(DEFAULT_INTERACTION_DELAY_SECS),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
