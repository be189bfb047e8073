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

//! # SchemaHandler
//!
//! Multiplexes encode/decode across every registered [`schema`] variant by dispatching
//! on the message's `type` byte. Owns the one [`Message`] the connection reuses across
//! turns; transitioning to a new incoming message always resets its cursors first.

use super::message::Message;
use super::schema::{
    type_code, AckResponse, ErrorResponse, ExecRequest, ExecSqlRequest, FinalizeRequest,
    PrepareRequest, QueryRequest, QuerySqlRequest, ResultResponse,
};
use crate::error::{Error, ErrorCode, ErrorContext, SkyResult};

#[derive(Debug, Clone, PartialEq)]
pub enum RequestVariant {
    Prepare(PrepareRequest),
    Exec(ExecRequest),
    Query(QueryRequest),
    Finalize(FinalizeRequest),
    ExecSql(ExecSqlRequest),
    QuerySql(QuerySqlRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseVariant {
    Ack(AckResponse),
    Result(ResultResponse),
    Error(ErrorResponse),
}

impl ResponseVariant {
    fn type_code(&self) -> u8 {
        match self {
            Self::Ack(_) => type_code::ACK,
            Self::Result(_) => type_code::RESULT,
            Self::Error(_) => type_code::ERROR,
        }
    }
}

pub struct SchemaHandler {
    msg: Message,
    /// wall-clock stamp of the last frame this handler encoded; the only timekeeping
    /// the codec itself performs (timeouts remain the transport's job)
    timestamp: i64,
}

impl SchemaHandler {
    pub fn new(max_words: u32) -> Self {
        Self {
            msg: Message::new(max_words),
            timestamp: 0,
        }
    }

    pub fn message(&self) -> &Message {
        &self.msg
    }

    pub fn message_mut(&mut self) -> &mut Message {
        &mut self.msg
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Decodes one incoming frame and returns the matched request variant. The
    /// message's cursor is left positioned right after the variant's own fixed
    /// fields — callers binding parameters (§4.4) continue reading from the same
    /// `Message` via [`Self::message_mut`].
    pub fn decode(&mut self, header: &[u8; 8], body: &[u8]) -> SkyResult<RequestVariant> {
        self.msg.reset();
        self.msg.header_get(header)?;
        self.msg.load_body(body)?;
        let type_ = self.msg.msg_type();
        let variant = match type_ {
            type_code::PREPARE => {
                RequestVariant::Prepare(PrepareRequest::decode(&mut self.msg).ctx("Prepare")?)
            }
            type_code::EXEC => RequestVariant::Exec(ExecRequest::decode(&mut self.msg).ctx("Exec")?),
            type_code::QUERY => {
                RequestVariant::Query(QueryRequest::decode(&mut self.msg).ctx("Query")?)
            }
            type_code::FINALIZE => {
                RequestVariant::Finalize(FinalizeRequest::decode(&mut self.msg).ctx("Finalize")?)
            }
            type_code::EXEC_SQL => {
                RequestVariant::ExecSql(ExecSqlRequest::decode(&mut self.msg).ctx("ExecSql")?)
            }
            type_code::QUERY_SQL => {
                RequestVariant::QuerySql(QuerySqlRequest::decode(&mut self.msg).ctx("QuerySql")?)
            }
            other => {
                return Err(Error::new(
                    ErrorCode::Proto,
                    format!("unknown message type {other}"),
                ))
            }
        };
        Ok(variant)
    }

    /// Writes the header for `response` then dispatches to its own encode routine,
    /// returning the framed bytes ready for the transport.
    pub fn encode(&mut self, flags: u8, response: &ResponseVariant) -> Vec<u8> {
        self.timestamp = chrono::Utc::now().timestamp();
        self.msg.reset();
        self.msg.header_put(response.type_code(), flags);
        match response {
            ResponseVariant::Ack(r) => r.encode(&mut self.msg),
            ResponseVariant::Result(r) => r.encode(&mut self.msg),
            ResponseVariant::Error(r) => r.encode(&mut self.msg),
        }
        self.msg.flush()
    }

    /// Begins a `Rows` response (§4.5) whose field count is data-dependent and so has
    /// no fixed [`schema`] counterpart; [`crate::stmt::Stmt::query`] writes directly
    /// into the returned message.
    pub fn begin_rows(&mut self, flags: u8) -> &mut Message {
        self.timestamp = chrono::Utc::now().timestamp();
        self.msg.reset();
        self.msg.header_put(type_code::ROWS, flags);
        &mut self.msg
    }

    pub fn flush(&mut self) -> Vec<u8> {
        self.msg.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::message::DEFAULT_MAX_WORDS;

    fn frame(msg: &mut Message) -> ([u8; 8], Vec<u8>) {
        let framed = msg.flush();
        let mut header = [0u8; 8];
        header.copy_from_slice(&framed[0..8]);
        (header, framed[8..].to_vec())
    }

    #[test]
    fn decode_dispatches_by_type() {
        let mut encoder = Message::new(DEFAULT_MAX_WORDS);
        encoder.header_put(type_code::PREPARE, 0);
        PrepareRequest {
            sql: "select 1".into(),
        }
        .encode(&mut encoder);
        let (header, body) = frame(&mut encoder);

        let mut handler = SchemaHandler::new(DEFAULT_MAX_WORDS);
        let variant = handler.decode(&header, &body).unwrap();
        assert_eq!(
            variant,
            RequestVariant::Prepare(PrepareRequest {
                sql: "select 1".into()
            })
        );
    }

    #[test]
    fn decode_unknown_type_is_proto() {
        let mut handler = SchemaHandler::new(DEFAULT_MAX_WORDS);
        let mut header = [0u8; 8];
        header[0..4].copy_from_slice(&1u32.to_le_bytes());
        header[4] = 0xfe;
        let err = handler.decode(&header, &[0u8; 8]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Proto);
    }

    #[test]
    fn encode_stamps_timestamp() {
        let mut handler = SchemaHandler::new(DEFAULT_MAX_WORDS);
        assert_eq!(handler.timestamp(), 0);
        handler.encode(0, &ResponseVariant::Ack(AckResponse { stmt_id: 1 }));
        assert!(handler.timestamp() > 0);
    }
}
