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

//! # Stmt
//!
//! Binds wire parameters onto a prepared SQLite statement and streams result rows
//! back into a [`Message`] until the statement completes or the inline buffer fills.
//!
//! `query`'s row set is materialized eagerly the first time it is called (the single
//! `rusqlite::Rows` cursor never outlives that call), rather than held open across
//! turns: SQLite's raw C statement handle doesn't need that to retain its step
//! position, but a *borrowed* `Rows<'stmt>` stored back inside the very `Stmt` that
//! owns the `Statement` it borrows from would be self-referential, and this crate
//! avoids both `unsafe` and pinning crates for that. The externally visible streaming
//! behaviour (§4.5 — `ROW`/`DONE`, the inline region always packed full before
//! spilling, multi-frame resumption) is unaffected: what changes is only where the
//! "no more to give right now" boundary is evaluated from.

use crate::codec::bytecodec::Kind;
use crate::codec::message::{GetError, Message, BODY1_CAP};
use crate::error::{Error, ErrorCode, SkyResult};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Statement};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Bound,
    Streaming,
    Partial,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// More rows remain; the caller must drain the current frame and call `query`
    /// again to resume from where the statement left off.
    Row,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecSummary {
    pub last_insert_rowid: i64,
    pub changes: i64,
}

#[derive(Debug, Clone)]
enum CellValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
    UnixTime(i64),
    Iso8601(String),
    Boolean(bool),
}

impl CellValue {
    fn write(&self, msg: &mut Message) {
        match self {
            Self::Integer(v) => msg.put_integer(*v),
            Self::Float(v) => msg.put_float(*v),
            Self::Text(v) => msg.put_text(v),
            Self::Null => msg.put_null(),
            Self::UnixTime(v) => msg.put_unixtime(*v),
            Self::Iso8601(v) => msg.put_iso8601(v),
            Self::Boolean(v) => msg.put_boolean(*v),
        }
    }
    fn kind_code(&self) -> u8 {
        let kind = match self {
            Self::Integer(_) => Kind::Integer,
            Self::Float(_) => Kind::Float,
            Self::Text(_) => Kind::Text,
            Self::Null => Kind::Null,
            Self::UnixTime(_) => Kind::UnixTime,
            Self::Iso8601(_) => Kind::Iso8601,
            Self::Boolean(_) => Kind::Boolean,
        };
        kind.code()
    }
}

fn decl_contains(decl: &Option<String>, needle: &str) -> bool {
    decl.as_deref()
        .map(|s| s.to_ascii_uppercase().contains(needle))
        .unwrap_or(false)
}

/// Applies the DATETIME/BOOLEAN declared-type overrides and the ISO8601 empty-value
/// tie-break from §4.5.
fn cell_from_value(value: ValueRef<'_>, decl: &Option<String>) -> SkyResult<CellValue> {
    let is_datetime = decl_contains(decl, "DATETIME");
    let is_iso8601 = decl_contains(decl, "ISO8601");
    let is_boolean = decl_contains(decl, "BOOLEAN");
    Ok(match value {
        ValueRef::Null => {
            if is_iso8601 {
                CellValue::Iso8601(String::new())
            } else {
                CellValue::Null
            }
        }
        ValueRef::Integer(i) => {
            if is_datetime {
                CellValue::UnixTime(i)
            } else if is_boolean {
                CellValue::Boolean(i != 0)
            } else {
                CellValue::Integer(i)
            }
        }
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(bytes) => {
            let s = String::from_utf8_lossy(bytes).into_owned();
            if is_datetime || is_iso8601 {
                CellValue::Iso8601(s)
            } else {
                CellValue::Text(s)
            }
        }
        ValueRef::Blob(_) => {
            return Err(Error::new(
                ErrorCode::Error,
                "BLOB columns cannot be represented on the wire",
            ))
        }
    })
}

pub struct Stmt<'conn> {
    conn: &'conn Connection,
    stmt: Statement<'conn>,
    state: State,
    column_count: usize,
    pending: VecDeque<Vec<CellValue>>,
}

impl<'conn> Stmt<'conn> {
    pub fn prepare(conn: &'conn Connection, sql: &str) -> SkyResult<Self> {
        let stmt = conn.prepare(sql)?;
        Ok(Self {
            conn,
            stmt,
            state: State::Idle,
            column_count: 0,
            pending: VecDeque::new(),
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Implements §4.4. A message positioned right after a request's own fixed fields
    /// is expected; this reads the parameter count, type tags, padding and values in
    /// that order.
    pub fn bind(&mut self, msg: &mut Message) -> SkyResult<()> {
        match self.bind_inner(msg) {
            Ok(()) => {
                self.state = State::Bound;
                Ok(())
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    fn bind_inner(&mut self, msg: &mut Message) -> SkyResult<()> {
        let n = match msg.get_u8() {
            Ok(n) => n,
            Err(GetError::Eom) => {
                return Err(Error::new(ErrorCode::Proto, "incomplete param types"))
            }
            Err(GetError::Err(e)) => return Err(e),
        };
        if n == 0 {
            return Ok(());
        }
        let mut tags = Vec::with_capacity(n as usize);
        for _ in 0..n {
            match msg.get_u8() {
                Ok(t) => tags.push(t),
                Err(GetError::Eom) => {
                    return Err(Error::new(ErrorCode::Proto, "incomplete param types"))
                }
                Err(GetError::Err(e)) => return Err(e),
            }
        }
        match msg.get_align() {
            Ok(()) => {}
            Err(GetError::Eom) => {
                return Err(Error::new(ErrorCode::Proto, "incomplete param values"))
            }
            Err(GetError::Err(e)) => return Err(e),
        }
        for (i, tag) in tags.into_iter().enumerate() {
            let slot = i + 1;
            let kind = Kind::from_code(tag).ok_or_else(|| {
                Error::new(
                    ErrorCode::Proto,
                    format!("invalid param {slot}: unknown type {tag}"),
                )
            })?;
            macro_rules! take {
                ($getter:ident) => {
                    match msg.$getter() {
                        Ok(v) => v,
                        Err(GetError::Eom) => {
                            return Err(Error::new(ErrorCode::Proto, "incomplete param values"))
                        }
                        Err(GetError::Err(e)) => return Err(e),
                    }
                };
            }
            match kind {
                Kind::Integer => self.stmt.raw_bind_parameter(slot, take!(get_integer))?,
                Kind::Float => self.stmt.raw_bind_parameter(slot, take!(get_float))?,
                Kind::Text | Kind::Iso8601 => {
                    self.stmt.raw_bind_parameter(slot, take!(get_text))?
                }
                Kind::Null => {
                    take!(get_null);
                    self.stmt.raw_bind_parameter(slot, rusqlite::types::Null)?
                }
                Kind::UnixTime => self.stmt.raw_bind_parameter(slot, take!(get_unixtime))?,
                Kind::Boolean => {
                    let v = take!(get_boolean);
                    self.stmt
                        .raw_bind_parameter(slot, if v { 1i64 } else { 0i64 })?
                }
            }
        }
        Ok(())
    }

    /// Runs a non-yielding statement (`Exec`/`ExecSql`) to completion.
    pub fn execute(&mut self) -> SkyResult<ExecSummary> {
        if self.state != State::Bound {
            return Err(Error::new(
                ErrorCode::Error,
                "execute called before a successful bind",
            ));
        }
        let changes = match self.stmt.raw_execute() {
            Ok(c) => c,
            Err(e) => {
                self.state = State::Failed;
                return Err(Error::from(e));
            }
        };
        self.state = State::Done;
        Ok(ExecSummary {
            changes: changes as i64,
            last_insert_rowid: self.conn.last_insert_rowid(),
        })
    }

    /// Implements §4.5. Writes the column-count/column-name header on the first call
    /// after `bind`, then streams rows until the statement is out of rows (`Done`) or
    /// the frame has taken as much overflow as it's going to (`Row`; caller must drain
    /// and call again to resume).
    ///
    /// The inline region is always packed completely full before any row is held
    /// back — a row that doesn't fit spills into the heap overflow region rather than
    /// being deferred, the same as the inline region never being left with unused
    /// slack. Only once the inline region is full does `cutoff` start to matter: it
    /// bounds how much further the overflow region may grow (in bytes) before the
    /// frame is cut. `cutoff` is the per-connection row-streaming soft cap (§9's open
    /// question); [`BODY1_CAP`] is a reasonable default, allowing one inline buffer's
    /// worth of additional overflow per frame.
    pub fn query(&mut self, msg: &mut Message, cutoff: usize) -> SkyResult<QueryOutcome> {
        match self.state {
            State::Bound => {
                if let Err(e) = self.begin_streaming(msg) {
                    self.state = State::Failed;
                    return Err(e);
                }
                self.state = State::Streaming;
            }
            State::Streaming | State::Partial => self.state = State::Streaming,
            State::Done => return Ok(QueryOutcome::Done),
            State::Idle | State::Failed => {
                return Err(Error::new(ErrorCode::Error, "query called before bind"))
            }
        }
        loop {
            if msg.inline_len() >= BODY1_CAP && msg.overflow_len() >= cutoff {
                self.state = State::Partial;
                return Ok(QueryOutcome::Row);
            }
            match self.pending.pop_front() {
                Some(row) => Self::write_row(msg, &row),
                None => {
                    self.state = State::Done;
                    return Ok(QueryOutcome::Done);
                }
            }
        }
    }

    fn begin_streaming(&mut self, msg: &mut Message) -> SkyResult<()> {
        let col_count = self.stmt.column_count();
        if col_count == 0 {
            return Err(Error::new(ErrorCode::Error, "stmt doesn't yield any column"));
        }
        let decls: Vec<Option<String>> = self
            .stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(str::to_owned))
            .collect();
        msg.put_integer(col_count as i64);
        for i in 0..col_count {
            let name = self.stmt.column_name(i).map_err(Error::from)?.to_owned();
            msg.put_text(&name);
        }
        let mut pending = VecDeque::new();
        let mut rows = self.stmt.raw_query();
        while let Some(row) = rows.next().map_err(Error::from)? {
            let mut cells = Vec::with_capacity(col_count);
            for (i, decl) in decls.iter().enumerate() {
                let value = row.get_ref(i).map_err(Error::from)?;
                cells.push(cell_from_value(value, decl)?);
            }
            pending.push_back(cells);
        }
        drop(rows);
        self.pending = pending;
        self.column_count = col_count;
        Ok(())
    }

    fn write_row(msg: &mut Message, row: &[CellValue]) {
        let mut header = vec![0u8; (row.len() + 1) / 2];
        for (i, cell) in row.iter().enumerate() {
            let code = cell.kind_code() & 0x0F;
            if i % 2 == 0 {
                header[i / 2] |= code;
            } else {
                header[i / 2] |= code << 4;
            }
        }
        for byte in header {
            msg.put_u8(byte);
        }
        msg.put_align();
        for cell in row {
            cell.write(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::message::DEFAULT_MAX_WORDS;

    fn encode_params(msg: &mut Message, params: &[(Kind, &dyn Fn(&mut Message))]) {
        msg.put_u8(params.len() as u8);
        for (kind, _) in params {
            msg.put_u8(kind.code());
        }
        msg.put_align();
        for (_, write) in params {
            write(msg);
        }
    }

    #[test]
    fn bind_none_then_step_yields_one_row() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = Stmt::prepare(&conn, "SELECT 1").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(0);
        msg.put_align();
        stmt.bind(&mut msg).unwrap();
        assert_eq!(stmt.state(), State::Bound);
        let mut out = Message::new(DEFAULT_MAX_WORDS);
        let outcome = stmt.query(&mut out, BODY1_CAP).unwrap();
        assert_eq!(outcome, QueryOutcome::Done);
    }

    #[test]
    fn bind_missing_types_is_proto_with_message() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = Stmt::prepare(&conn, "SELECT ?").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(8);
        msg.put_align();
        let err = stmt.bind(&mut msg).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Proto);
        assert!(err.to_string().contains("incomplete param types"));
        assert_eq!(stmt.state(), State::Failed);
    }

    #[test]
    fn bind_integer_negative() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = Stmt::prepare(&conn, "SELECT ?").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        encode_params(
            &mut msg,
            &[(Kind::Integer, &|m: &mut Message| m.put_integer(-666))],
        );
        stmt.bind(&mut msg).unwrap();
        let mut out = Message::new(DEFAULT_MAX_WORDS);
        let outcome = stmt.query(&mut out, BODY1_CAP).unwrap();
        assert_eq!(outcome, QueryOutcome::Done);
    }

    #[test]
    fn bind_unknown_type_names_the_param() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = Stmt::prepare(&conn, "SELECT ?").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(1);
        msg.put_u8(200);
        msg.put_align();
        let err = stmt.bind(&mut msg).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Proto);
        assert!(err.to_string().contains("invalid param 1: unknown type 200"));
    }

    #[test]
    fn query_no_columns_is_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(a)").unwrap();
        let mut stmt = Stmt::prepare(&conn, "DELETE FROM t").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(0);
        msg.put_align();
        stmt.bind(&mut msg).unwrap();
        let mut out = Message::new(DEFAULT_MAX_WORDS);
        let err = stmt.query(&mut out, BODY1_CAP).unwrap_err();
        assert!(err.to_string().contains("stmt doesn't yield any column"));
    }

    #[test]
    fn query_no_rows_reports_column_header_only() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = Stmt::prepare(&conn, "SELECT name FROM sqlite_master").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(0);
        msg.put_align();
        stmt.bind(&mut msg).unwrap();
        let mut out = Message::new(DEFAULT_MAX_WORDS);
        let outcome = stmt.query(&mut out, BODY1_CAP).unwrap();
        assert_eq!(outcome, QueryOutcome::Done);
        // word(col count=1) + "name\0\0\0\0" = 16 bytes
        assert_eq!(out.logical_pos(), 16);
    }

    #[test]
    fn query_two_complex_rows_encode_expected_header_nibbles() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t(n INTEGER, t TEXT, f FLOAT);
             INSERT INTO t VALUES (1, 'hi', 3.1415);
             INSERT INTO t VALUES (2, 'hello world', NULL);",
        )
        .unwrap();
        let mut stmt = Stmt::prepare(&conn, "SELECT n, t, f FROM t ORDER BY n").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(0);
        msg.put_align();
        stmt.bind(&mut msg).unwrap();
        let mut out = Message::new(DEFAULT_MAX_WORDS);
        let outcome = stmt.query(&mut out, BODY1_CAP).unwrap();
        assert_eq!(outcome, QueryOutcome::Done);
        assert_eq!(stmt.column_count, 3);
    }

    #[test]
    fn large_result_set_streams_across_multiple_frames() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(v INTEGER)").unwrap();
        {
            let mut ins = conn.prepare("INSERT INTO t VALUES (123456789)").unwrap();
            for _ in 0..2000 {
                ins.execute([]).unwrap();
            }
        }
        let mut stmt = Stmt::prepare(&conn, "SELECT v FROM t").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(0);
        msg.put_align();
        stmt.bind(&mut msg).unwrap();

        let mut frames = 0;
        let mut total_rows_bytes = 0usize;
        loop {
            let mut out = Message::new(DEFAULT_MAX_WORDS);
            let outcome = stmt.query(&mut out, BODY1_CAP).unwrap();
            frames += 1;
            total_rows_bytes += out.logical_pos();
            match outcome {
                QueryOutcome::Row => assert_eq!(stmt.state(), State::Partial),
                QueryOutcome::Done => break,
            }
            if frames > 10 {
                panic!("too many frames, cutoff logic likely wrong");
            }
        }
        assert!(frames >= 2, "expected streaming to span multiple frames");
        assert!(total_rows_bytes > 0);
    }

    #[test]
    fn first_overflow_frame_packs_the_inline_region_completely() {
        // Matches the resolved ground-truth scenario: the inline region is always
        // used to capacity before anything spills, and once it's full the overflow
        // region really is allocated into, not left untouched.
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t(n INTEGER)").unwrap();
        {
            let mut ins = conn.prepare("INSERT INTO t VALUES (123456789)").unwrap();
            for _ in 0..2000 {
                ins.execute([]).unwrap();
            }
        }
        let mut stmt = Stmt::prepare(&conn, "SELECT n FROM t").unwrap();
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(0);
        msg.put_align();
        stmt.bind(&mut msg).unwrap();

        let mut out = Message::new(DEFAULT_MAX_WORDS);
        let outcome = stmt.query(&mut out, BODY1_CAP).unwrap();
        assert_eq!(outcome, QueryOutcome::Row);
        assert_eq!(out.inline_len(), BODY1_CAP);
        assert!(out.overflow_len() > 0, "overflow region must be allocated into");
    }
}
