use serde::{Deserialize, Serialize};
use std::time::Duration;

/// NusTerm configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NusTermConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Shell session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Host-side tracing level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Shell session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Device to auto-connect to
    #[serde(default)]
    pub device_name: Option<String>,
    /// Level passed to the device's `log enable` command
    #[serde(default = "default_device_log_level")]
    pub device_log_level: String,
    /// Use acknowledged GATT writes
    #[serde(default)]
    pub write_with_response: bool,
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_prompt_delay")]
    pub prompt_delay_ms: u64,
    #[serde(default = "default_log_delay")]
    pub log_delay_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_link_check_interval")]
    pub link_check_interval_ms: u64,
}

/// Resolved timing values used by the session components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub scan_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry_delay: Duration,
    pub prompt_delay: Duration,
    pub log_delay: Duration,
    pub poll_interval: Duration,
    pub link_check_interval: Duration,
}

// Default value functions
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_device_log_level() -> String {
    "inf".to_string()
}

fn default_scan_timeout() -> u64 {
    5000
}

fn default_connect_timeout() -> u64 {
    10000
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_prompt_delay() -> u64 {
    2000
}

fn default_log_delay() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    10
}

fn default_link_check_interval() -> u64 {
    500
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            device_log_level: default_device_log_level(),
            write_with_response: false,
            scan_timeout_ms: default_scan_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            retry_delay_ms: default_retry_delay(),
            prompt_delay_ms: default_prompt_delay(),
            log_delay_ms: default_log_delay(),
            poll_interval_ms: default_poll_interval(),
            link_check_interval_ms: default_link_check_interval(),
        }
    }
}

impl SessionConfig {
    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            scan_timeout: Duration::from_millis(self.scan_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            prompt_delay: Duration::from_millis(self.prompt_delay_ms),
            log_delay: Duration::from_millis(self.log_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            link_check_interval: Duration::from_millis(self.link_check_interval_ms),
        }
    }

    /// Check values that would make the shell hang or spin.
    /// Returns one message per problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.device_log_level.trim().is_empty() {
            problems.push("session.device_log_level must not be empty".to_string());
        }

        let timings = [
            ("scan_timeout_ms", self.scan_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("link_check_interval_ms", self.link_check_interval_ms),
        ];
        for (name, value) in timings {
            if value == 0 {
                problems.push(format!("session.{} must be greater than zero", name));
            }
        }

        problems
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        SessionConfig::default().timings()
    }
}
