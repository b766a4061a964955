//! Runtime defaults resolved from the environment.
//!
//! Priority for every setting:
//! 1. Explicit CLI flag or call-site argument
//! 2. `DRIVEWIRE_*` environment variable (ignored when empty or unparsable)
//! 3. Built-in default
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DRIVEWIRE_WAIT_TIMEOUT_MS` | 3000 |
//! | `DRIVEWIRE_INTERVAL_MS` | 500 |
//! | `DRIVEWIRE_RAISE_ERR` | false |
//! | `DRIVEWIRE_SEND_BUFFER` | 1 MiB |
//! | `DRIVEWIRE_CALL_TIMEOUT_MS` | unset (no limit) |
//! | `DRIVEWIRE_WEB_DRIVER` | `WebDriver.exe` |
//! | `DRIVEWIRE_WIN_DRIVER` | `WindowsDriver.exe` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use drivewire_core::policy::RetryPolicy;
use tracing::warn;

use crate::driver::session::SessionOptions;

pub const ENV_WAIT_TIMEOUT_MS: &str = "DRIVEWIRE_WAIT_TIMEOUT_MS";
pub const ENV_INTERVAL_MS: &str = "DRIVEWIRE_INTERVAL_MS";
pub const ENV_RAISE_ERR: &str = "DRIVEWIRE_RAISE_ERR";
pub const ENV_SEND_BUFFER: &str = "DRIVEWIRE_SEND_BUFFER";
pub const ENV_CALL_TIMEOUT_MS: &str = "DRIVEWIRE_CALL_TIMEOUT_MS";
pub const ENV_WEB_DRIVER: &str = "DRIVEWIRE_WEB_DRIVER";
pub const ENV_WIN_DRIVER: &str = "DRIVEWIRE_WIN_DRIVER";

/// Send buffer for server-side sockets, large enough for full screenshots.
pub const DEFAULT_SEND_BUFFER: usize = 1024 * 1024;

pub const DEFAULT_WEB_DRIVER: &str = "WebDriver.exe";
pub const DEFAULT_WIN_DRIVER: &str = "WindowsDriver.exe";

/// Resolved defaults shared by sessions, facades and the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub retry: RetryPolicy,
    pub send_buffer_size: usize,
    pub call_timeout: Option<Duration>,
    pub web_driver_program: String,
    pub win_driver_program: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            send_buffer_size: DEFAULT_SEND_BUFFER,
            call_timeout: None,
            web_driver_program: DEFAULT_WEB_DRIVER.to_string(),
            win_driver_program: DEFAULT_WIN_DRIVER.to_string(),
        }
    }
}

impl Config {
    /// Built-in defaults overridden by any `DRIVEWIRE_*` variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>(ENV_WAIT_TIMEOUT_MS) {
            config.retry.wait_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>(ENV_INTERVAL_MS) {
            config.retry.interval = Duration::from_millis(ms);
        }
        if let Some(raise) = env_bool(ENV_RAISE_ERR) {
            config.retry.raise_on_timeout = raise;
        }
        if let Some(size) = env_parse::<usize>(ENV_SEND_BUFFER) {
            config.send_buffer_size = size;
        }
        if let Some(ms) = env_parse::<u64>(ENV_CALL_TIMEOUT_MS) {
            // 0 disables the limit
            config.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(program) = env_string(ENV_WEB_DRIVER) {
            config.web_driver_program = program;
        }
        if let Some(program) = env_string(ENV_WIN_DRIVER) {
            config.win_driver_program = program;
        }

        config
    }

    /// Options for sessions accepted on the script side.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            send_buffer_size: Some(self.send_buffer_size),
            call_timeout: self.call_timeout,
        }
    }
}

/// Non-empty variable value.
fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = env_string(name)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("Ignoring {}={:?}: expected true/false", name, raw);
            None
        }
    }
}
