//! Scripts that drive remote automation agents over TCP.
//!
//! A driver (an Android device agent, a browser driver or a Windows desktop
//! driver) holds one TCP connection to the script process and answers
//! length-prefixed commands one at a time. This crate owns that connection
//! ([`driver::Session`]), polls commands until their result appears
//! ([`driver::retry`]), and exposes each platform's commands as typed async
//! methods ([`driver::AndroidBot`], [`driver::WinBot`], [`driver::WebBot`]).
//!
//! Scripts usually run inside a [`driver::ScriptServer`], which accepts
//! drivers and hands each one to a [`driver::Script`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use drivewire::config::Config;
//! use drivewire::driver::{AndroidBot, ScriptContext, ScriptServer};
//! use drivewire_core::policy::RetryOverrides;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let ctx = ScriptContext::new(Arc::new(Config::from_env()));
//! let server = ScriptServer::<AndroidBot>::bind(56000, ctx).await?;
//! server
//!     .run(|bot: AndroidBot| async move {
//!         bot.click_element("//*[@text='Login']", RetryOverrides::none()).await?;
//!         anyhow::Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
