//! Spawning of the local desktop and browser driver processes.
//!
//! A launched driver signals readiness only by connecting back to the
//! listening port, so the listener must be bound before spawning.

use std::process::{Child, Command, Stdio};

use drivewire_core::error::{DriverError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Address a locally launched driver dials back to.
pub const LOOPBACK: &str = "127.0.0.1";

/// Launch parameters the browser driver reads from its single JSON argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDriverParams {
    pub server_ip: String,
    pub server_port: u16,
    pub browser_name: String,
    pub debug_port: u16,
    pub user_data_dir: String,
    pub browser_path: Option<String>,
    pub argument: Option<String>,
}

impl WebDriverParams {
    /// Defaults for a driver on this machine connecting back to `port`.
    ///
    /// Each launch gets its own profile directory so browsers don't share state.
    pub fn local(port: u16) -> Self {
        let suffix = 100_000 + uuid::Uuid::new_v4().as_u128() % 900_000;
        Self {
            server_ip: LOOPBACK.to_string(),
            server_port: port,
            browser_name: "chrome".to_string(),
            debug_port: 0,
            user_data_dir: format!("./UserData{}", suffix),
            browser_path: None,
            argument: None,
        }
    }

    /// Overlay caller-supplied browser settings.
    pub fn apply(mut self, options: &BrowserOptions) -> Self {
        if let Some(name) = &options.browser_name {
            self.browser_name = name.clone();
        }
        if let Some(port) = options.debug_port {
            self.debug_port = port;
        }
        if let Some(dir) = &options.user_data_dir {
            self.user_data_dir = dir.clone();
        }
        if options.browser_path.is_some() {
            self.browser_path = options.browser_path.clone();
        }
        if options.argument.is_some() {
            self.argument = options.argument.clone();
        }
        self
    }
}

/// Optional browser settings; unset fields keep the launch defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserOptions {
    pub browser_name: Option<String>,
    pub debug_port: Option<u16>,
    pub user_data_dir: Option<String>,
    pub browser_path: Option<String>,
    pub argument: Option<String>,
}

/// A driver executable plus its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverLaunch {
    pub program: String,
    pub args: Vec<String>,
}

impl DriverLaunch {
    /// `WindowsDriver.exe 127.0.0.1 <port>`
    pub fn windows(program: impl Into<String>, port: u16) -> Self {
        Self {
            program: program.into(),
            args: vec![LOOPBACK.to_string(), port.to_string()],
        }
    }

    /// `WebDriver.exe <json>`
    pub fn web(program: impl Into<String>, params: &WebDriverParams) -> Result<Self> {
        let json = serde_json::to_string(params)
            .map_err(|e| DriverError::invalid_argument(format!("web driver params: {}", e)))?;
        Ok(Self {
            program: program.into(),
            args: vec![json],
        })
    }

    /// Start the driver detached from our stdio.
    pub fn spawn(&self) -> Result<Child> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DriverError::Launch {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;
        info!("Launched {} (pid {})", self.program, child.id());
        Ok(child)
    }
}
