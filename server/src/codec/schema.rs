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

//! # Schema
//!
//! The closed registry of message variants. Each variant is a plain value struct with
//! an ordered list of fields and an `encode`/`decode` pair; there is no runtime
//! reflection or macro-generated field table, per the guidance that a tagged variant
//! type over per-variant structs is sufficient and preferable to preprocessor-driven
//! schemas.
//!
//! Adding a new message type means adding a variant here and in
//! [`super::handler::SchemaVariant`] — deliberately a source change, not a runtime
//! registration, since wire compatibility is a release-gated concern.
//!
//! `Exec`, `Query`, `ExecSql` and `QuerySql` only decode their own fixed header; the
//! parameter block that follows (§4.4) is read directly off the same [`Message`] by
//! [`crate::stmt::Stmt::bind`], immediately after `decode` returns.

use super::message::{GetError, GetResult, Message};
use crate::error::{Error, ErrorCode, SkyResult};

/// Message type codes. Requests are low, responses are high; this is purely a
/// convention to make a hex dump easier to eyeball, not a wire requirement.
pub mod type_code {
    pub const PREPARE: u8 = 1;
    pub const EXEC: u8 = 2;
    pub const QUERY: u8 = 3;
    pub const FINALIZE: u8 = 4;
    pub const EXEC_SQL: u8 = 5;
    pub const QUERY_SQL: u8 = 6;

    pub const ACK: u8 = 100;
    pub const RESULT: u8 = 101;
    pub const ROWS: u8 = 102;
    pub const ERROR: u8 = 103;
}

/// Promotes a field-level [`GetError`] into a descriptive [`Error`], naming the field
/// that was short. Every declared field in a fixed schema is mandatory, so any `Eom`
/// here — not just one past the last field — is a truncation.
fn field<T>(res: GetResult<T>, name: &'static str) -> SkyResult<T> {
    match res {
        Ok(v) => Ok(v),
        Err(GetError::Eom) => Err(Error::new(
            ErrorCode::Proto,
            format!("truncated field `{name}`"),
        )),
        Err(GetError::Err(e)) => Err(e.context(name)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareRequest {
    pub sql: String,
}

impl PrepareRequest {
    pub fn encode(&self, msg: &mut Message) {
        msg.put_text(&self.sql);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        Ok(Self {
            sql: field(msg.get_text(), "sql")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecRequest {
    pub stmt_id: u32,
}

impl ExecRequest {
    pub fn encode(&self, msg: &mut Message) {
        msg.put_integer(self.stmt_id as i64);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        let stmt_id = field(msg.get_integer(), "stmt_id")?;
        Ok(Self {
            stmt_id: stmt_id as u32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryRequest {
    pub stmt_id: u32,
}

impl QueryRequest {
    pub fn encode(&self, msg: &mut Message) {
        msg.put_integer(self.stmt_id as i64);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        let stmt_id = field(msg.get_integer(), "stmt_id")?;
        Ok(Self {
            stmt_id: stmt_id as u32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalizeRequest {
    pub stmt_id: u32,
}

impl FinalizeRequest {
    pub fn encode(&self, msg: &mut Message) {
        msg.put_integer(self.stmt_id as i64);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        let stmt_id = field(msg.get_integer(), "stmt_id")?;
        Ok(Self {
            stmt_id: stmt_id as u32,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecSqlRequest {
    pub sql: String,
}

impl ExecSqlRequest {
    pub fn encode(&self, msg: &mut Message) {
        msg.put_text(&self.sql);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        Ok(Self {
            sql: field(msg.get_text(), "sql")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySqlRequest {
    pub sql: String,
}

impl QuerySqlRequest {
    pub fn encode(&self, msg: &mut Message) {
        msg.put_text(&self.sql);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        Ok(Self {
            sql: field(msg.get_text(), "sql")?,
        })
    }
}

/// Acknowledgement naming the statement the request addressed (e.g. a successful
/// `Finalize`). Always carries at least one payload word: `header_get` rejects a
/// `words == 0` frame outright (§4.1), so no response may ever encode empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckResponse {
    pub stmt_id: u32,
}

impl AckResponse {
    pub fn encode(&self, msg: &mut Message) {
        msg.put_integer(self.stmt_id as i64);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        let stmt_id = field(msg.get_integer(), "stmt_id")? as u32;
        Ok(Self { stmt_id })
    }
}

/// Summary of a non-yielding statement's execution (`Exec`/`ExecSql`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultResponse {
    pub stmt_id: u32,
    pub last_insert_rowid: i64,
    pub changes: i64,
}

impl ResultResponse {
    pub fn encode(&self, msg: &mut Message) {
        msg.put_integer(self.stmt_id as i64);
        msg.put_integer(self.last_insert_rowid);
        msg.put_integer(self.changes);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        let stmt_id = field(msg.get_integer(), "stmt_id")? as u32;
        let last_insert_rowid = field(msg.get_integer(), "last_insert_rowid")?;
        let changes = field(msg.get_integer(), "changes")?;
        Ok(Self {
            stmt_id,
            last_insert_rowid,
            changes,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub code: i64,
    pub message: String,
}

impl ErrorResponse {
    pub fn from_error(e: &Error) -> Self {
        Self {
            code: e.code().as_i64(),
            message: e.to_string(),
        }
    }
    pub fn encode(&self, msg: &mut Message) {
        msg.put_integer(self.code);
        msg.put_text(&self.message);
    }
    pub fn decode(msg: &mut Message) -> SkyResult<Self> {
        let code = field(msg.get_integer(), "code")?;
        let message = field(msg.get_text(), "message")?;
        Ok(Self { code, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::message::DEFAULT_MAX_WORDS;

    fn round_trip<T: PartialEq + std::fmt::Debug>(
        encode: impl FnOnce(&mut Message),
        decode: impl FnOnce(&mut Message) -> SkyResult<T>,
        expect: T,
    ) {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        encode(&mut msg);
        let framed = msg.flush();
        let words = framed.len() as u32 / 8 - 1;
        let mut header = [0u8; 8];
        header[0..4].copy_from_slice(&words.to_le_bytes());
        msg.reset();
        msg.header_get(&header).unwrap();
        msg.load_body(&framed[8..]).unwrap();
        assert_eq!(decode(&mut msg).unwrap(), expect);
    }

    #[test]
    fn prepare_request_round_trips() {
        round_trip(
            |m| PrepareRequest { sql: "select 1".into() }.encode(m),
            PrepareRequest::decode,
            PrepareRequest { sql: "select 1".into() },
        );
    }

    #[test]
    fn exec_request_round_trips() {
        round_trip(
            |m| ExecRequest { stmt_id: 42 }.encode(m),
            ExecRequest::decode,
            ExecRequest { stmt_id: 42 },
        );
    }

    #[test]
    fn truncated_prepare_request_names_the_field() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        let mut header = [0u8; 8];
        header[0..4].copy_from_slice(&1u32.to_le_bytes());
        msg.header_get(&header).unwrap();
        msg.load_body(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let err = PrepareRequest::decode(&mut msg).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Proto);
        assert!(err.to_string().contains("sql"));
    }

    #[test]
    fn ack_response_round_trips_and_is_never_empty() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        AckResponse { stmt_id: 7 }.encode(&mut msg);
        let framed = msg.flush();
        let words = u32::from_le_bytes(framed[0..4].try_into().unwrap());
        assert!(words > 0, "an Ack frame must never encode as words == 0");
        round_trip(
            |m| AckResponse { stmt_id: 7 }.encode(m),
            AckResponse::decode,
            AckResponse { stmt_id: 7 },
        );
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let e = Error::new(ErrorCode::Range, "parameter index out of range");
        let resp = ErrorResponse::from_error(&e);
        assert_eq!(resp.code, ErrorCode::Range.as_i64());
        round_trip(
            |m| resp.encode(m),
            ErrorResponse::decode,
            resp.clone(),
        );
    }
}
