//! Registry of desktop and browser drivers shared by scripts.
//!
//! Android scripts often drive a Windows or browser driver alongside the
//! device. Building one means listening on a port and waiting for the driver
//! to dial in, so bots are cached per `(port, local)` and built once unless
//! the caller forces a rebuild.

use std::collections::HashMap;
use std::sync::Arc;

use drivewire_core::error::Result;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::launcher::{BrowserOptions, DriverLaunch, WebDriverParams};
use super::session::{bind_listener, Session};
use super::web::WebBot;
use super::win::WinBot;
use crate::config::Config;

/// Cache key: listening port and whether the driver runs on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverKey {
    pub port: u16,
    pub local: bool,
}

/// Builds and caches [`WinBot`]s and [`WebBot`]s.
#[derive(Debug)]
pub struct DriverRegistry {
    config: Arc<Config>,
    win: Mutex<HashMap<DriverKey, Arc<WinBot>>>,
    web: Mutex<HashMap<DriverKey, Arc<WebBot>>>,
}

impl DriverRegistry {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            win: Mutex::new(HashMap::new()),
            web: Mutex::new(HashMap::new()),
        }
    }

    /// Cached Windows driver, built on first use or after its session failed.
    pub async fn get_or_create_win(&self, port: u16, local: bool) -> Result<Arc<WinBot>> {
        let key = DriverKey { port, local };
        let mut cache = self.win.lock().await;
        if let Some(bot) = cache.get(&key) {
            if !bot.session().is_closed() {
                debug!("Reusing Windows driver on port {}", port);
                return Ok(bot.clone());
            }
        }
        let bot = Arc::new(self.build_win(key).await?);
        cache.insert(key, bot.clone());
        Ok(bot)
    }

    /// Always build a fresh Windows driver and replace the cached one.
    pub async fn force_new_win(&self, port: u16, local: bool) -> Result<Arc<WinBot>> {
        let key = DriverKey { port, local };
        let mut cache = self.win.lock().await;
        let bot = Arc::new(self.build_win(key).await?);
        cache.insert(key, bot.clone());
        Ok(bot)
    }

    /// Cached browser driver, built on first use or after its session failed.
    ///
    /// `options` only matter when a new local driver is launched.
    pub async fn get_or_create_web(
        &self,
        port: u16,
        local: bool,
        options: Option<BrowserOptions>,
    ) -> Result<Arc<WebBot>> {
        let key = DriverKey { port, local };
        let mut cache = self.web.lock().await;
        if let Some(bot) = cache.get(&key) {
            if !bot.session().is_closed() {
                debug!("Reusing web driver on port {}", port);
                return Ok(bot.clone());
            }
        }
        let bot = Arc::new(self.build_web(key, options.as_ref()).await?);
        cache.insert(key, bot.clone());
        Ok(bot)
    }

    /// Always build a fresh browser driver and replace the cached one.
    pub async fn force_new_web(
        &self,
        port: u16,
        local: bool,
        options: Option<BrowserOptions>,
    ) -> Result<Arc<WebBot>> {
        let key = DriverKey { port, local };
        let mut cache = self.web.lock().await;
        let bot = Arc::new(self.build_web(key, options.as_ref()).await?);
        cache.insert(key, bot.clone());
        Ok(bot)
    }

    async fn build_win(&self, key: DriverKey) -> Result<WinBot> {
        let launch = key
            .local
            .then(|| DriverLaunch::windows(&self.config.win_driver_program, key.port));
        let session = self.accept_driver(key.port, launch).await?;
        info!("Windows driver ready on port {}", key.port);
        Ok(WinBot::new(Arc::new(session), self.config.retry))
    }

    async fn build_web(&self, key: DriverKey, options: Option<&BrowserOptions>) -> Result<WebBot> {
        let launch = if key.local {
            let mut params = WebDriverParams::local(key.port);
            if let Some(options) = options {
                params = params.apply(options);
            }
            Some(DriverLaunch::web(&self.config.web_driver_program, &params)?)
        } else {
            None
        };
        let session = self.accept_driver(key.port, launch).await?;
        info!("Web driver ready on port {}", key.port);
        Ok(WebBot::new(Arc::new(session), self.config.retry))
    }

    /// Bind, optionally launch the driver, then wait for it to connect.
    async fn accept_driver(&self, port: u16, launch: Option<DriverLaunch>) -> Result<Session> {
        let listener = bind_listener(port).await?;
        if let Some(launch) = launch {
            // the child is detached; it exits on its own when the session closes
            let _child = launch.spawn()?;
        }
        Session::accept_from(&listener, self.config.session_options()).await
    }
}
