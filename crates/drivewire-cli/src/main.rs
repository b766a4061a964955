//! drivewire command-line entry point.

mod args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use drivewire::config::Config;
use drivewire::driver::retry;
use drivewire::driver::{Bot, ScriptContext, ScriptServer, Session};
use drivewire_core::codec::Arg;
use drivewire_core::error::DriverError;
use drivewire_core::policy::RetryOverrides;
use drivewire_core::probe::{self, Probe};
use regex::Regex;
use tracing::{error, info};

use crate::args::{CallArgs, Cli, Commands, ServeArgs, WaitArgs};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Examples = cli.command {
        println!("{}", args::EXAMPLES_TEXT);
        return;
    }

    if let Err(e) = run(cli) {
        match e.downcast_ref::<DriverError>() {
            Some(driver) => error!("{:#} (hint: {})", e, driver.suggestion()),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env();
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        match cli.command {
            Commands::Call(args) => call(args, config).await,
            Commands::Wait(args) => wait(args, config).await,
            Commands::Serve(args) => serve(args, config).await,
            Commands::Examples => Ok(()),
        }
    })
}

fn to_args(command: &[String]) -> Vec<Arg> {
    command.iter().map(|s| Arg::from(s.as_str())).collect()
}

async fn accept(port: u16, config: &Config) -> anyhow::Result<Session> {
    info!("Waiting for a driver on port {}", port);
    let session = Session::accept_one(port, config.session_options())
        .await
        .with_context(|| format!("No driver connected on port {}", port))?;
    Ok(session)
}

async fn call(args: CallArgs, config: Config) -> anyhow::Result<()> {
    let session = accept(args.port, &config).await?;
    let request = to_args(&args.command);

    match &args.binary {
        Some(path) => {
            let bytes = session.call_binary(&request).await?;
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => println!("{}", session.call(&request).await?),
    }

    session.close().await;
    Ok(())
}

/// How `wait` decides a reply counts as found.
enum Until {
    NotSentinel(String),
    Matches(Regex),
}

impl Until {
    fn from_args(args: &WaitArgs) -> anyhow::Result<Self> {
        match (&args.until, &args.sentinel) {
            (Some(pattern), _) => {
                let regex =
                    Regex::new(pattern).with_context(|| format!("Invalid --until regex: {}", pattern))?;
                Ok(Self::Matches(regex))
            }
            (None, Some(sentinel)) => Ok(Self::NotSentinel(sentinel.clone())),
            (None, None) => Ok(Self::NotSentinel(probe::NULL.to_string())),
        }
    }

    fn check(&self, raw: &str) -> Probe<String> {
        match self {
            Self::NotSentinel(sentinel) => probe::text_unless(raw, sentinel),
            Self::Matches(regex) if regex.is_match(raw) => Probe::Found(raw.to_string()),
            Self::Matches(_) => Probe::NotFound,
        }
    }
}

async fn wait(args: WaitArgs, config: Config) -> anyhow::Result<()> {
    let until = Until::from_args(&args)?;

    let mut overrides = RetryOverrides::none();
    if let Some(ms) = args.timeout {
        overrides = overrides.wait(Duration::from_millis(ms));
    }
    if let Some(ms) = args.interval {
        overrides = overrides.interval(Duration::from_millis(ms));
    }
    if args.raise {
        overrides = overrides.raise(true);
    }
    let policy = overrides.resolve(config.retry);

    let session = accept(args.port, &config).await?;
    let request = to_args(&args.command);
    let operation = args.command.join(" ");

    let found = retry::poll(&operation, policy, || {
        let session = &session;
        let request = &request;
        let until = &until;
        async move {
            let raw = session.call(request).await?;
            Ok::<_, DriverError>(until.check(&raw))
        }
    })
    .await?;

    if let Some(reply) = found {
        println!("{}", reply);
    } else {
        info!("`{}` not found within {:?}", operation, policy.wait_timeout);
    }

    session.close().await;
    Ok(())
}

/// A bare session, for sending commands by name.
struct RawDriver(Arc<Session>);

impl Bot for RawDriver {
    const PLATFORM: &'static str = "raw";

    fn attach(session: Arc<Session>, _ctx: &ScriptContext) -> Self {
        Self(session)
    }
}

async fn serve(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(size) = args.send_buffer {
        config.send_buffer_size = size;
    }
    let ctx = ScriptContext::new(Arc::new(config));
    let server = ScriptServer::<RawDriver>::bind(args.port, ctx).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down gracefully"),
            _ = sigterm() => info!("Received SIGTERM, shutting down gracefully"),
        }
        shutdown.notify_one();
    });

    let request = Arc::new(to_args(&args.command));
    server
        .run(move |RawDriver(session): RawDriver| {
            let request = request.clone();
            async move {
                let reply = session.call(&request).await?;
                info!("{} replied: {}", session.peer_addr(), reply);
                anyhow::Ok(())
            }
        })
        .await?;
    Ok(())
}

/// Wait for SIGTERM signal (Unix only).
///
/// If signal registration fails, logs a warning and waits indefinitely.
#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(
                "Failed to register SIGTERM handler: {}, only SIGINT will stop the server",
                e
            );
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
