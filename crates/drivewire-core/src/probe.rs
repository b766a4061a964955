//! Decoding of the drivers' in-band sentinel replies.
//!
//! Drivers answer "not found yet" with magic strings shaped like real data
//! (`-1.0|-1.0`, `null`, anything but `true`). Each function here turns one
//! such convention into a [`Probe`], so the retry executor and the facades
//! never compare against raw strings themselves.

use serde::Deserialize;

use crate::error::{DriverError, Result};
use crate::geometry::{Point, Rect};

/// Point search failed.
pub const POINT_NOT_FOUND: &str = "-1.0|-1.0";
/// Integer form some desktop drivers use for a failed point search.
pub const POINT_NOT_FOUND_INT: &str = "-1|-1";
/// Element rectangle lookup failed.
pub const RECT_NOT_FOUND: &str = "-1|-1|-1|-1";
/// Generic "nothing" reply.
pub const NULL: &str = "null";
/// Acknowledgement for boolean commands.
pub const TRUE: &str = "true";
/// Error marker returned by browser drivers.
pub const WEBDRIVER_ERROR: &str = "webdriver error";

/// Outcome of a single non-retrying attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Found(T),
    NotFound,
}

impl<T> Probe<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Probe::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probe<U> {
        match self {
            Probe::Found(v) => Probe::Found(f(v)),
            Probe::NotFound => Probe::NotFound,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Probe::Found(v) => Some(v),
            Probe::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for Probe<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Probe::NotFound, Probe::Found)
    }
}

/// `true` means success; any other reply is a boolean failure.
pub fn is_true(raw: &str) -> bool {
    raw == TRUE
}

/// `x|y`, or `-1.0|-1.0` when nothing matched.
pub fn point(command: &str, raw: &str) -> Result<Probe<Point>> {
    if raw == POINT_NOT_FOUND {
        return Ok(Probe::NotFound);
    }
    Point::parse(raw)
        .map(Probe::Found)
        .ok_or_else(|| DriverError::unexpected_response(command, raw))
}

/// `x|y/x|y/...`, or either point sentinel when nothing matched.
pub fn points(command: &str, raw: &str) -> Result<Probe<Vec<Point>>> {
    if raw == POINT_NOT_FOUND || raw == POINT_NOT_FOUND_INT {
        return Ok(Probe::NotFound);
    }
    raw.split('/')
        .map(|p| Point::parse(p).ok_or_else(|| DriverError::unexpected_response(command, raw)))
        .collect::<Result<Vec<_>>>()
        .map(Probe::Found)
}

/// `x1|y1|x2|y2`, or `-1|-1|-1|-1` when the element is missing.
pub fn rect(command: &str, raw: &str) -> Result<Probe<Rect>> {
    if raw == RECT_NOT_FOUND {
        return Ok(Probe::NotFound);
    }
    Rect::parse(raw)
        .map(Probe::Found)
        .ok_or_else(|| DriverError::unexpected_response(command, raw))
}

#[derive(Deserialize)]
struct JsonRect {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

/// Browser form: a JSON object with `left/top/right/bottom`, or `null`.
pub fn rect_json(command: &str, raw: &str) -> Result<Probe<Rect>> {
    if raw == NULL {
        return Ok(Probe::NotFound);
    }
    let r: JsonRect =
        serde_json::from_str(raw).map_err(|_| DriverError::unexpected_response(command, raw))?;
    Ok(Probe::Found(Rect::new(
        Point::new(r.left, r.top),
        Point::new(r.right, r.bottom),
    )))
}

/// Any text, or `null` when absent.
pub fn text(raw: &str) -> Probe<String> {
    text_unless(raw, NULL)
}

/// Any text, unless it equals the given sentinel.
pub fn text_unless(raw: &str, sentinel: &str) -> Probe<String> {
    if raw == sentinel {
        Probe::NotFound
    } else {
        Probe::Found(raw.to_string())
    }
}

/// Found when the driver acknowledged with `true`.
pub fn acknowledged(raw: &str) -> Probe<()> {
    if is_true(raw) {
        Probe::Found(())
    } else {
        Probe::NotFound
    }
}

/// Found when the driver did *not* answer `true` (used for "wait until gone").
pub fn absent(raw: &str) -> Probe<()> {
    if is_true(raw) {
        Probe::NotFound
    } else {
        Probe::Found(())
    }
}

/// Found unless the driver answered exactly `false` (desktop element actions).
pub fn not_false(raw: &str) -> Probe<()> {
    if raw == "false" {
        Probe::NotFound
    } else {
        Probe::Found(())
    }
}

/// Split a delimited list; `null` or an empty reply is an empty list.
pub fn list(raw: &str, separator: char) -> Vec<String> {
    if raw == NULL || raw.is_empty() {
        return Vec::new();
    }
    raw.split(separator).map(str::to_string).collect()
}

/// JSON value, or `None` for `null`.
pub fn json<T: serde::de::DeserializeOwned>(command: &str, raw: &str) -> Result<Option<T>> {
    if raw == NULL {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|_| DriverError::unexpected_response(command, raw))
}
