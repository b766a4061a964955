//! Length-prefixed frame codec shared by every driver platform.
//!
//! Requests are `<len_1>/<len_2>/.../<len_n>\n<arg_1><arg_2>...<arg_n>` where each
//! length is the UTF-8 byte length of the stringified argument. Responses are
//! `<total_len>/<payload>`, and the payload may arrive over many socket reads.
//!
//! # Example
//!
//! ```
//! use drivewire_core::args;
//! use drivewire_core::codec::encode;
//!
//! let frame = encode(&args!["click", 12.5, 7]);
//! assert_eq!(frame, b"5/4/1\nclick12.57");
//! ```

use std::borrow::Cow;
use std::fmt;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::FrameError;

/// Longest length prefix accepted before the `/` separator (`usize::MAX` has 20 digits).
pub const MAX_PREFIX_LEN: usize = 20;

/// One request argument.
///
/// `None` is sent as the empty string and booleans as `true`/`false`.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Arg {
    /// The exact text placed on the wire for this argument.
    pub fn to_wire_text(&self) -> Cow<'_, str> {
        match self {
            Arg::None => Cow::Borrowed(""),
            Arg::Bool(true) => Cow::Borrowed("true"),
            Arg::Bool(false) => Cow::Borrowed("false"),
            Arg::Int(v) => Cow::Owned(v.to_string()),
            // Debug keeps a trailing ".0" on whole numbers, matching what drivers parse.
            Arg::Float(v) => Cow::Owned(format!("{:?}", v)),
            Arg::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_text())
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}

impl From<&String> for Arg {
    fn from(v: &String) -> Self {
        Arg::Text(v.clone())
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        // Format at f32 precision so 0.9f32 stays "0.9".
        Arg::Text(format!("{:?}", v))
    }
}

macro_rules! arg_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Int(i64::from(v))
            }
        })*
    };
}

arg_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Arg {
    fn from(v: u64) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<usize> for Arg {
    fn from(v: usize) -> Self {
        Arg::Text(v.to_string())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map_or(Arg::None, Into::into)
    }
}

/// Build a `Vec<Arg>` from heterogeneous values.
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::codec::Arg>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::codec::Arg::from($value)),+]
    };
}

/// Encode a text command request.
pub fn encode(args: &[Arg]) -> Vec<u8> {
    let texts: Vec<Cow<'_, str>> = args.iter().map(Arg::to_wire_text).collect();
    let lengths: Vec<String> = texts.iter().map(|t| t.len().to_string()).collect();

    let body_len: usize = texts.iter().map(|t| t.len()).sum();
    let header = lengths.join("/");
    let mut frame = Vec::with_capacity(header.len() + 1 + body_len);
    frame.extend_from_slice(header.as_bytes());
    frame.push(b'\n');
    for text in &texts {
        frame.extend_from_slice(text.as_bytes());
    }
    frame
}

/// Encode a file transfer request: exactly three fields, the last one raw bytes.
pub fn encode_file(func_name: &str, to_path: &str, file: &[u8]) -> Vec<u8> {
    let header = format!("{}/{}/{}\n", func_name.len(), to_path.len(), file.len());
    let mut frame = Vec::with_capacity(header.len() + func_name.len() + to_path.len() + file.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(func_name.as_bytes());
    frame.extend_from_slice(to_path.as_bytes());
    frame.extend_from_slice(file);
    frame
}

/// Parse the `len/len/...` header line of a request (without the newline).
pub fn parse_request_header(header: &[u8]) -> Result<Vec<usize>, FrameError> {
    if header.is_empty() {
        return Ok(Vec::new());
    }
    let text = std::str::from_utf8(header)
        .map_err(|_| FrameError::MalformedRequest("header is not UTF-8".to_string()))?;
    text.split('/')
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| FrameError::MalformedRequest(format!("bad length {:?}", part)))
        })
        .collect()
}

/// Split a complete request frame back into its raw arguments.
///
/// This is the inverse of [`encode`] and [`encode_file`]; drivers and test
/// doubles use it to read what a script sent.
pub fn decode_request(frame: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
    let newline = frame
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| FrameError::MalformedRequest("missing header newline".to_string()))?;
    let lengths = parse_request_header(&frame[..newline])?;
    let mut body = &frame[newline + 1..];

    let expected = lengths
        .iter()
        .try_fold(0usize, |total, &len| total.checked_add(len))
        .ok_or_else(|| FrameError::MalformedRequest("declared lengths overflow".to_string()))?;
    if body.len() != expected {
        return Err(FrameError::MalformedRequest(format!(
            "header declares {} bytes, body has {}",
            expected,
            body.len()
        )));
    }

    let mut fields = Vec::with_capacity(lengths.len());
    for len in lengths {
        let (field, rest) = body.split_at(len);
        fields.push(field.to_vec());
        body = rest;
    }
    Ok(fields)
}

/// [`decode_request`] for text commands.
pub fn decode_request_text(frame: &[u8]) -> Result<Vec<String>, FrameError> {
    decode_request(frame)?
        .into_iter()
        .map(|field| {
            String::from_utf8(field)
                .map_err(|_| FrameError::MalformedRequest("argument is not UTF-8".to_string()))
        })
        .collect()
}

/// Encode a response frame as a driver would.
pub fn encode_response(payload: &[u8]) -> Vec<u8> {
    let mut frame = format!("{}/", payload.len()).into_bytes();
    frame.extend_from_slice(payload);
    frame
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Still looking for the `/` that ends the length prefix.
    AwaitingLength,
    /// Prefix parsed; need at least `declared` payload bytes.
    AwaitingPayload { declared: usize },
}

/// Incremental decoder for `<len>/<payload>` response frames.
///
/// Feed it whatever each socket read returned. A zero-length chunk means the
/// peer closed the connection and always yields [`FrameError::Disconnected`].
#[derive(Debug)]
pub struct ResponseDecoder {
    buffer: BytesMut,
    state: State,
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::AwaitingLength,
        }
    }

    /// Declared payload length, once the prefix has been parsed.
    pub fn declared_len(&self) -> Option<usize> {
        match self.state {
            State::AwaitingLength => None,
            State::AwaitingPayload { declared } => Some(declared),
        }
    }

    /// Bytes currently buffered (prefix or payload).
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Push one read's worth of bytes.
    ///
    /// Returns the accumulated payload once at least the declared number of
    /// bytes is buffered. Anything the peer sent beyond that is returned too.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Bytes>, FrameError> {
        if chunk.is_empty() {
            return Err(FrameError::Disconnected);
        }
        self.buffer.extend_from_slice(chunk);

        if self.state == State::AwaitingLength {
            let Some(pos) = self.buffer.iter().position(|&b| b == b'/') else {
                if self.buffer.len() > MAX_PREFIX_LEN {
                    return Err(FrameError::MissingSeparator(self.buffer.len()));
                }
                return Ok(None);
            };
            let prefix = self.buffer.split_to(pos);
            self.buffer.advance(1);

            let declared = std::str::from_utf8(&prefix)
                .ok()
                .and_then(|s| s.trim().parse::<usize>().ok())
                .ok_or_else(|| {
                    FrameError::InvalidLength(String::from_utf8_lossy(&prefix).into_owned())
                })?;
            self.state = State::AwaitingPayload { declared };
        }

        match self.state {
            State::AwaitingPayload { declared } if self.buffer.len() >= declared => {
                self.state = State::AwaitingLength;
                Ok(Some(self.buffer.split().freeze()))
            }
            _ => Ok(None),
        }
    }
}
