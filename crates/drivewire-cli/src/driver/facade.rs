//! Plumbing shared by the platform bots.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use drivewire_core::codec::Arg;
use drivewire_core::error::Result;
use drivewire_core::geometry::{encode_sub_colors, Algorithm, Region, SubColor};
use drivewire_core::policy::{RetryOverrides, RetryPolicy};
use drivewire_core::probe::{self, Probe};
use serde::{Deserialize, Serialize};

use super::retry;
use super::session::Session;

/// Default match similarity for colour and image search.
pub const DEFAULT_SIMILARITY: f64 = 0.9;

/// A session plus the retry defaults its commands resolve against.
#[derive(Debug, Clone)]
pub struct Facade {
    session: Arc<Session>,
    defaults: RetryPolicy,
}

impl Facade {
    pub fn new(session: Arc<Session>, defaults: RetryPolicy) -> Self {
        Self { session, defaults }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn defaults(&self) -> RetryPolicy {
        self.defaults
    }

    pub fn set_defaults(&mut self, defaults: RetryPolicy) {
        self.defaults = defaults;
    }

    /// Raw text reply.
    pub async fn text(&self, args: Vec<Arg>) -> Result<String> {
        self.session.call(&args).await
    }

    /// Raw binary reply.
    pub async fn bytes(&self, args: Vec<Arg>) -> Result<Bytes> {
        self.session.call_binary(&args).await
    }

    /// `true` when the driver acknowledged.
    pub async fn flag(&self, args: Vec<Arg>) -> Result<bool> {
        Ok(probe::is_true(&self.text(args).await?))
    }

    /// Text reply, `None` for `null`.
    pub async fn optional_text(&self, args: Vec<Arg>) -> Result<Option<String>> {
        Ok(probe::text(&self.text(args).await?).into_option())
    }

    /// `|`-separated list, empty for `null`.
    pub async fn list(&self, args: Vec<Arg>) -> Result<Vec<String>> {
        Ok(probe::list(&self.text(args).await?, '|'))
    }

    /// Repeat one command through the retry executor, decoding each reply with `decode`.
    pub async fn poll<T, D>(
        &self,
        operation: &str,
        overrides: RetryOverrides,
        args: Vec<Arg>,
        decode: D,
    ) -> Result<Option<T>>
    where
        D: Fn(&str) -> Result<Probe<T>>,
    {
        let policy = self.defaults.with(overrides);
        let session = &self.session;
        let args = &args;
        let decode = &decode;
        retry::poll(operation, policy, move || async move {
            let raw = session.call(args).await?;
            decode(&raw)
        })
        .await
    }

    /// [`Facade::poll`] for acknowledgement-style commands.
    pub async fn poll_flag<D>(
        &self,
        operation: &str,
        overrides: RetryOverrides,
        args: Vec<Arg>,
        decode: D,
    ) -> Result<bool>
    where
        D: Fn(&str) -> Probe<()>,
    {
        let found = self
            .poll(operation, overrides, args, |raw| Ok(decode(raw)))
            .await?;
        Ok(found.is_some())
    }
}

/// Durations travel as milliseconds.
pub fn millis(duration: Duration) -> Arg {
    Arg::Float(duration.as_secs_f64() * 1000.0)
}

/// Parameters for colour search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSearch {
    pub sub_colors: Vec<SubColor>,
    pub region: Region,
    pub similarity: f64,
}

impl Default for ColorSearch {
    fn default() -> Self {
        Self {
            sub_colors: Vec::new(),
            region: Region::FULL_SCREEN,
            similarity: DEFAULT_SIMILARITY,
        }
    }
}

impl ColorSearch {
    pub fn sub_colors_arg(&self) -> Arg {
        Arg::Text(encode_sub_colors(&self.sub_colors))
    }
}

/// Parameters for template image search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSearch {
    pub region: Region,
    pub algorithm: Algorithm,
    pub similarity: f64,
    /// Number of matches to collect before the driver stops.
    pub multi: u32,
}

impl Default for ImageSearch {
    fn default() -> Self {
        Self {
            region: Region::FULL_SCREEN,
            algorithm: Algorithm::default(),
            similarity: DEFAULT_SIMILARITY,
            multi: 1,
        }
    }
}
