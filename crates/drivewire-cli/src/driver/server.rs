//! Task-per-connection script server.
//!
//! Drivers dial in to the script process. Every accepted connection becomes a
//! [`Session`], is wrapped in the platform's bot, and handed to the user's
//! [`Script`]. The accept loop itself is a concrete method on
//! [`ScriptServer`]; applications only supply the script body.

use std::future::Future;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use drivewire_core::error::{DriverError, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::launcher::DriverLaunch;
use super::registry::DriverRegistry;
use super::session::{bind_listener, Session};
use crate::config::Config;

/// Maximum number of drivers served at once.
const MAX_CONNECTIONS: usize = 100;

/// How long running scripts may finish after shutdown is signalled.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A platform command surface that can be built on top of a session.
pub trait Bot: Send + Sync + Sized + 'static {
    /// Platform name used in logs.
    const PLATFORM: &'static str;

    fn attach(session: Arc<Session>, ctx: &ScriptContext) -> Self;
}

/// Shared state handed to every bot the server builds.
#[derive(Debug, Clone)]
pub struct ScriptContext {
    pub config: Arc<Config>,
    pub registry: Arc<DriverRegistry>,
}

impl ScriptContext {
    pub fn new(config: Arc<Config>) -> Self {
        let registry = Arc::new(DriverRegistry::new(config.clone()));
        Self { config, registry }
    }
}

/// The body run once per connected driver.
///
/// Closures `Fn(B) -> impl Future<Output = anyhow::Result<()>>` implement this
/// directly.
pub trait Script<B>: Send + Sync + 'static {
    fn run(&self, bot: B) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<B, F, Fut> Script<B> for F
where
    F: Fn(B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    fn run(&self, bot: B) -> impl Future<Output = anyhow::Result<()>> + Send {
        self(bot)
    }
}

/// Accepts drivers on one port and runs a script for each.
pub struct ScriptServer<B> {
    listener: TcpListener,
    ctx: ScriptContext,
    launch: Option<DriverLaunch>,
    connection_semaphore: Arc<Semaphore>,
    shutdown: Arc<Notify>,
    grace_period: Duration,
    _bot: PhantomData<fn() -> B>,
}

impl<B: Bot> ScriptServer<B> {
    /// Bind `0.0.0.0:port`. Port 0 picks an ephemeral port.
    pub async fn bind(port: u16, ctx: ScriptContext) -> Result<Self> {
        let listener = bind_listener(port).await?;
        let addr = listener.local_addr().map_err(|e| DriverError::Listen {
            addr: format!("0.0.0.0:{}", port),
            reason: e.to_string(),
        })?;
        info!("{} script server listening on {}", B::PLATFORM, addr);

        Ok(Self {
            listener,
            ctx,
            launch: None,
            connection_semaphore: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            shutdown: Arc::new(Notify::new()),
            grace_period: GRACEFUL_SHUTDOWN_TIMEOUT,
            _bot: PhantomData,
        })
    }

    /// Start this driver process when [`run`](Self::run) begins.
    pub fn with_launch(mut self, launch: DriverLaunch) -> Self {
        self.launch = Some(launch);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| DriverError::connection_aborted("listener", e))
    }

    pub fn context(&self) -> &ScriptContext {
        &self.ctx
    }

    /// Notify this to stop accepting. `notify_one` is never lost, even when
    /// sent before `run` starts waiting.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Serve drivers until shutdown is signalled.
    ///
    /// Failed connections and failing scripts are logged and never stop the
    /// loop. On shutdown, running scripts get the grace period and are then
    /// aborted.
    pub async fn run<S: Script<B>>(&self, script: S) -> Result<()> {
        if let Some(launch) = &self.launch {
            // detached; the driver exits when its session closes
            let _child = launch.spawn()?;
        }

        let script = Arc::new(script);
        let mut connection_tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        "Connection limit ({}) reached, rejecting driver {}",
                                        MAX_CONNECTIONS, addr
                                    );
                                    drop(stream);
                                    continue;
                                }
                            };

                            debug!("Accepted driver {}", addr);
                            let script = script.clone();
                            let ctx = self.ctx.clone();
                            connection_tasks.spawn(async move {
                                let _permit = permit;
                                if let Err(e) = handle_connection::<B, S>(stream, &ctx, &script).await {
                                    warn!("Script for {} driver {} failed: {:#}", B::PLATFORM, addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(_) = connection_tasks.join_next(), if !connection_tasks.is_empty() => {}
                _ = self.shutdown.notified() => {
                    info!("Shutdown signal received, waiting for running scripts");
                    break;
                }
            }
        }

        if !connection_tasks.is_empty() {
            info!("Waiting for {} running script(s)", connection_tasks.len());

            let drained = tokio::time::timeout(self.grace_period, async {
                while connection_tasks.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                warn!(
                    "Graceful shutdown timed out after {:?}, aborting {} script(s)",
                    self.grace_period,
                    connection_tasks.len()
                );
                connection_tasks.abort_all();
            }
        }

        Ok(())
    }
}

async fn handle_connection<B: Bot, S: Script<B>>(
    stream: TcpStream,
    ctx: &ScriptContext,
    script: &S,
) -> anyhow::Result<()> {
    let session = Arc::new(Session::from_stream(stream, ctx.config.session_options())?);
    let bot = B::attach(session.clone(), ctx);
    let outcome = script.run(bot).await;
    session.close().await;
    outcome
}
