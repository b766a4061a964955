//! Driver sessions and the command surfaces built on them.

pub mod android;
pub mod facade;
pub mod launcher;
pub mod registry;
pub mod retry;
pub mod server;
pub mod session;
pub mod web;
pub mod win;

#[cfg(test)]
pub(crate) mod test_support;

pub use android::AndroidBot;
pub use registry::DriverRegistry;
pub use server::{Bot, Script, ScriptContext, ScriptServer};
pub use session::{Session, SessionOptions};
pub use web::WebBot;
pub use win::WinBot;
