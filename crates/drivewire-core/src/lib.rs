//! Core types and logic for drivewire.
//!
//! This crate holds everything about the driver protocol that does not touch
//! a socket: the frame codec, the error taxonomy, geometry value types, the
//! sentinel decoders and the retry policy. The `drivewire` crate layers
//! sessions, polling and command facades on top.
//!
//! # Modules
//!
//! - [`codec`]: request encoding and incremental response decoding
//! - [`error`]: driver errors with actionable suggestions
//! - [`geometry`]: points, rectangles, regions and thresholding parameters
//! - [`probe`]: per-command sentinel decoding into [`probe::Probe`]
//! - [`policy`]: retry policy and call-site overrides
//!
//! # Wire format
//!
//! | Direction | Layout |
//! |-----------|--------|
//! | request   | `len/len/.../len\n` + concatenated arguments |
//! | file push | `nameLen/pathLen/fileLen\n` + name + path + bytes |
//! | response  | `len/` + payload (may span many reads) |

pub mod codec;
pub mod error;
pub mod geometry;
pub mod policy;
pub mod probe;
