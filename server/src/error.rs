/*
 * Created on Thu Jul 30 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Error handling
//!
//! A single [`Error`] type is used across the codec, the statement adapter and the
//! connection driver. It carries a numeric [`ErrorCode`] (the only part that ever
//! crosses the wire) plus a stack of context [`Frame`]s pushed by each dispatch layer
//! as the error propagates outward. The human-readable message is only assembled when
//! the error is displayed, never while it is in flight.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The numeric code that is ever surfaced to a client or logged. `Eom` is deliberately
/// absent: it is an internal sentinel (see [`crate::codec::message`]) and must never be
/// constructed as part of a public `Error`.
pub enum ErrorCode {
    Ok,
    Error,
    Proto,
    NoMem,
    Range,
    /// A SQLite result code, passed through verbatim from `rusqlite`
    Sqlite(i32),
}

impl ErrorCode {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
            Self::Proto => 2,
            Self::NoMem => 3,
            Self::Range => 4,
            Self::Sqlite(code) => *code as i64,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Error => write!(f, "ERROR"),
            Self::Proto => write!(f, "PROTO"),
            Self::NoMem => write!(f, "NOMEM"),
            Self::Range => write!(f, "RANGE"),
            Self::Sqlite(code) => write!(f, "SQLITE({code})"),
        }
    }
}

#[derive(Debug, Clone)]
/// One link in the context trail: the field, variant or parameter that was being
/// processed when the error occurred, innermost frame first.
pub struct Frame(String);

#[derive(Debug, Clone)]
pub struct Error {
    code: ErrorCode,
    dmsg: Option<String>,
    trail: Vec<Frame>,
}

impl Error {
    pub fn new(code: ErrorCode, dmsg: impl Into<String>) -> Self {
        Self {
            code,
            dmsg: Some(dmsg.into()),
            trail: Vec::new(),
        }
    }
    pub fn with_code(code: ErrorCode) -> Self {
        Self {
            code,
            dmsg: None,
            trail: Vec::new(),
        }
    }
    pub fn code(&self) -> ErrorCode {
        self.code
    }
    /// Push a context frame (field name, variant name, parameter index) naming the
    /// layer that was unwinding when this error passed through it. The deepest numeric
    /// code is always preserved; only the trail grows.
    pub fn context(mut self, frame: impl Into<String>) -> Self {
        self.trail.push(Frame(frame.into()));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dmsg.as_ref() {
            Some(dmsg) => write!(f, "{dmsg}")?,
            None => write!(f, "{}", self.code)?,
        }
        for frame in self.trail.iter().rev() {
            write!(f, " (in {})", frame.0)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        let code = match &e {
            rusqlite::Error::SqliteFailure(ffi_err, _) => ErrorCode::Sqlite(ffi_err.extended_code),
            _ => ErrorCode::Error,
        };
        Error::new(code, e.to_string())
    }
}

/// Convenience extension mirroring the shape of `Result::map_err`, used at dispatch
/// sites to annotate an inner failure with the field/variant/parameter name without
/// losing the original code.
pub trait ErrorContext<T> {
    fn ctx(self, frame: impl Into<String>) -> Result<T, Error>;
}

impl<T> ErrorContext<T> for Result<T, Error> {
    fn ctx(self, frame: impl Into<String>) -> Result<T, Error> {
        self.map_err(|e| e.context(frame))
    }
}

pub type SkyResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefers_dmsg_over_code() {
        let e = Error::new(ErrorCode::Proto, "incomplete param types");
        assert_eq!(e.to_string(), "incomplete param types");
    }

    #[test]
    fn context_frames_render_innermost_first() {
        let e = Error::new(ErrorCode::Proto, "unexpected EOM")
            .context("field n")
            .context("schema Prepare");
        assert_eq!(
            e.to_string(),
            "unexpected EOM (in schema Prepare) (in field n)"
        );
    }

    #[test]
    fn code_survives_context_wrapping() {
        let e = Error::with_code(ErrorCode::Range).context("param 3");
        assert_eq!(e.code(), ErrorCode::Range);
    }
}
