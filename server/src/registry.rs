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

//! # Registry
//!
//! The `stmt_id -> Stmt` table a single connection keeps alive between `Prepare` and
//! `Finalize`. One registry per connection, one connection per SQLite handle — there is
//! no cross-connection sharing, so a plain [`parking_lot::Mutex`] around a `HashMap`
//! (rather than a sharded map) is all the concurrency this needs.

use crate::error::{Error, ErrorCode, SkyResult};
use crate::stmt::Stmt;
use parking_lot::Mutex;
use std::collections::HashMap;

pub struct Registry<'conn> {
    next_id: Mutex<u32>,
    stmts: Mutex<HashMap<u32, Stmt<'conn>>>,
}

impl<'conn> Registry<'conn> {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            stmts: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a freshly prepared statement and returns the id the client will use to
    /// address it in subsequent `Exec`/`Query`/`Finalize` requests.
    pub fn insert(&self, stmt: Stmt<'conn>) -> u32 {
        let id = {
            let mut next = self.next_id.lock();
            let id = *next;
            *next = next.wrapping_add(1).max(1);
            id
        };
        self.stmts.lock().insert(id, stmt);
        id
    }

    /// Runs `f` against the statement named by `stmt_id`, or a descriptive
    /// [`ErrorCode::Error`] if no such id is registered (an unknown or already
    /// finalized handle).
    pub fn with<R>(&self, stmt_id: u32, f: impl FnOnce(&mut Stmt<'conn>) -> SkyResult<R>) -> SkyResult<R> {
        let mut stmts = self.stmts.lock();
        let stmt = stmts.get_mut(&stmt_id).ok_or_else(|| {
            Error::new(ErrorCode::Error, format!("unknown statement id {stmt_id}"))
        })?;
        f(stmt)
    }

    /// Drops the statement, finalizing the underlying `sqlite3_stmt` handle. A missing
    /// id is not an error: `Finalize` is idempotent from the client's perspective.
    pub fn finalize(&self, stmt_id: u32) {
        self.stmts.lock().remove(&stmt_id);
    }

    pub fn len(&self) -> usize {
        self.stmts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn insert_assigns_increasing_ids() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = Registry::new();
        let a = registry.insert(Stmt::prepare(&conn, "SELECT 1").unwrap());
        let b = registry.insert(Stmt::prepare(&conn, "SELECT 2").unwrap());
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unknown_id_is_a_descriptive_error() {
        let registry: Registry = Registry::new();
        let err = registry.with(999, |_| Ok(())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Error);
        assert!(err.to_string().contains("999"));
    }

    #[test]
    fn finalize_removes_the_handle() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = Registry::new();
        let id = registry.insert(Stmt::prepare(&conn, "SELECT 1").unwrap());
        registry.finalize(id);
        assert!(registry.is_empty());
        assert!(registry.with(id, |_| Ok(())).is_err());
    }
}
