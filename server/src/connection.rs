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

//! # The per-turn driver
//!
//! Ties the wire codec ([`crate::codec`]) to the statement adapter ([`crate::stmt`])
//! for one TCP connection. One connection owns one SQLite [`rusqlite::Connection`],
//! one [`Registry`] of live prepared statements, and one reused [`SchemaHandler`] — all
//! three live for as long as the socket does, per the data model's connection-scoped
//! lifecycle. The transport itself (accept loop, framing the socket into length-prefixed
//! reads) is the thin part; hardening it further (TLS, load shedding) is a non-goal.
//!
//! Within one connection, responses appear in request order: the next request is never
//! read until the current one's reply — including every `PARTIAL` continuation frame a
//! `Query` produces — has been written out in full (§5's ordering guarantee).

use crate::codec::handler::{RequestVariant, ResponseVariant, SchemaHandler};
use crate::codec::schema::{AckResponse, ErrorResponse, ResultResponse};
use crate::error::{Error, ErrorCode, SkyResult};
use crate::registry::Registry;
use crate::stmt::{QueryOutcome, Stmt};
use rusqlite::Connection as SqliteConnection;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Reads exactly one framed request (8-byte header, then `words * 8` body bytes) off
/// `socket`. Returns `Ok(None)` on a clean EOF before any header bytes arrive (the
/// client closed the connection between requests, not mid-frame).
async fn read_frame(socket: &mut TcpStream) -> SkyResult<Option<([u8; 8], Vec<u8>)>> {
    let mut header = [0u8; 8];
    match socket.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(Error::new(ErrorCode::Error, e.to_string())),
    }
    let words = u32::from_le_bytes(header[0..4].try_into().unwrap());
    let mut body = vec![0u8; words as usize * 8];
    socket
        .read_exact(&mut body)
        .await
        .map_err(|e| Error::new(ErrorCode::Proto, format!("truncated frame body: {e}")))?;
    Ok(Some((header, body)))
}

async fn write_frame(socket: &mut TcpStream, framed: &[u8]) -> SkyResult<()> {
    socket
        .write_all(framed)
        .await
        .map_err(|e| Error::new(ErrorCode::Error, e.to_string()))?;
    socket
        .flush()
        .await
        .map_err(|e| Error::new(ErrorCode::Error, e.to_string()))
}

async fn respond_error(
    socket: &mut TcpStream,
    handler: &mut SchemaHandler,
    e: &Error,
) -> SkyResult<()> {
    log::debug!("request failed: {e}");
    let framed = handler.encode(0, &ResponseVariant::Error(ErrorResponse::from_error(e)));
    write_frame(socket, &framed).await
}

/// Streams a bound statement's result set (§4.5), writing one frame per call to
/// [`Stmt::query`] and resuming from the statement's retained cursor position until it
/// reports `DONE`.
async fn query_loop(
    socket: &mut TcpStream,
    registry: &Registry<'_>,
    handler: &mut SchemaHandler,
    stmt_id: u32,
    row_soft_cap: usize,
) -> SkyResult<()> {
    loop {
        let outcome = registry.with(stmt_id, |stmt| {
            let msg = handler.begin_rows(0);
            stmt.query(msg, row_soft_cap)
        })?;
        let framed = handler.flush();
        write_frame(socket, &framed).await?;
        if outcome == QueryOutcome::Done {
            return Ok(());
        }
    }
}

/// Decodes, dispatches and fully answers one request (writing every frame the reply
/// requires, including `Query`'s continuations) before returning.
async fn handle_one(
    socket: &mut TcpStream,
    conn: &SqliteConnection,
    registry: &Registry<'_>,
    handler: &mut SchemaHandler,
    header: &[u8; 8],
    body: &[u8],
    row_soft_cap: usize,
) -> SkyResult<()> {
    let variant = match handler.decode(header, body) {
        Ok(v) => v,
        Err(e) => return respond_error(socket, handler, &e).await,
    };
    let result: SkyResult<()> = async {
        match variant {
            RequestVariant::Prepare(req) => {
                // `Prepare` only allocates a statement id; the param block (if any) is
                // read by the `Exec`/`Query` that references it, immediately after that
                // request's own fixed fields, same as a one-shot `ExecSql`/`QuerySql`.
                let stmt = Stmt::prepare(conn, &req.sql)?;
                let stmt_id = registry.insert(stmt);
                let framed = handler.encode(
                    0,
                    &ResponseVariant::Result(ResultResponse {
                        stmt_id,
                        last_insert_rowid: 0,
                        changes: 0,
                    }),
                );
                write_frame(socket, &framed).await
            }
            RequestVariant::Exec(req) => {
                let msg = handler.message_mut();
                let summary = registry.with(req.stmt_id, |stmt| {
                    stmt.bind(msg)?;
                    stmt.execute()
                })?;
                let framed = handler.encode(
                    0,
                    &ResponseVariant::Result(ResultResponse {
                        stmt_id: req.stmt_id,
                        last_insert_rowid: summary.last_insert_rowid,
                        changes: summary.changes,
                    }),
                );
                write_frame(socket, &framed).await
            }
            RequestVariant::Query(req) => {
                let msg = handler.message_mut();
                registry.with(req.stmt_id, |stmt| stmt.bind(msg))?;
                query_loop(socket, registry, handler, req.stmt_id, row_soft_cap).await
            }
            RequestVariant::Finalize(req) => {
                registry.finalize(req.stmt_id);
                let framed = handler.encode(
                    0,
                    &ResponseVariant::Ack(AckResponse {
                        stmt_id: req.stmt_id,
                    }),
                );
                write_frame(socket, &framed).await
            }
            RequestVariant::ExecSql(req) => {
                let mut stmt = Stmt::prepare(conn, &req.sql)?;
                stmt.bind(handler.message_mut())?;
                let summary = stmt.execute()?;
                let framed = handler.encode(
                    0,
                    &ResponseVariant::Result(ResultResponse {
                        stmt_id: 0,
                        last_insert_rowid: summary.last_insert_rowid,
                        changes: summary.changes,
                    }),
                );
                write_frame(socket, &framed).await
            }
            RequestVariant::QuerySql(req) => {
                let stmt = Stmt::prepare(conn, &req.sql)?;
                let id = registry.insert(stmt);
                let msg = handler.message_mut();
                registry.with(id, |s| s.bind(msg))?;
                let outcome = query_loop(socket, registry, handler, id, row_soft_cap).await;
                registry.finalize(id);
                outcome
            }
        }
    }
    .await;
    match result {
        Ok(()) => Ok(()),
        Err(e) => respond_error(socket, handler, &e).await,
    }
}

/// Drives one accepted TCP connection until the client disconnects or a
/// connection-fatal framing error occurs. Owns its own SQLite handle opened against
/// `db_path`, per §5's "callers must not share a single connection across concurrent
/// requests".
pub async fn run(
    mut socket: TcpStream,
    db_path: &str,
    max_frame_words: u32,
    row_soft_cap: usize,
) -> SkyResult<()> {
    let conn = SqliteConnection::open(db_path)
        .map_err(|e| Error::new(ErrorCode::Error, format!("failed to open {db_path}: {e}")))?;
    let registry = Registry::new();
    let mut handler = SchemaHandler::new(max_frame_words);
    loop {
        let (header, body) = match read_frame(&mut socket).await {
            Ok(Some(f)) => f,
            Ok(None) => return Ok(()),
            Err(e) => {
                log::warn!("dropping connection after framing error: {e}");
                return Err(e);
            }
        };
        handle_one(
            &mut socket,
            &conn,
            &registry,
            &mut handler,
            &header,
            &body,
            row_soft_cap,
        )
        .await?;
    }
}
