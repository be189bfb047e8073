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

//! # Message
//!
//! The framed envelope: an 8-byte header plus a body split across a fixed inline
//! region (`body1`, never reallocated) and an overflow heap region (`body2`, grown
//! in chunks only once the inline region is exhausted). Puts and gets are expressed
//! against a single logical cursor spanning both regions, so callers never need to
//! know which physical buffer a field landed in.
//!
//! Messages are allocated once per connection and rewound with [`Message::reset`]
//! between turns rather than reallocated, matching the lifecycle described for
//! `SchemaHandler` in the data model.

use crate::codec::bytecodec::{self, padded_len};
use crate::error::{Error, ErrorCode, SkyResult};

pub const BODY1_CAP: usize = 4096;
pub const DEFAULT_MAX_WORDS: u32 = 1 << 22;
/// `body2` is freed rather than merely cleared on reset once it has grown past this.
pub const BODY2_RELEASE_THRESHOLD: usize = 64 * 1024;

/// Internal sentinel distinguishing "ran out of bytes" from a genuine protocol error.
/// Never exposed outside `codec`; [`super::schema`] is responsible for promoting a bare
/// `Eom` into a descriptive [`ErrorCode::Proto`] naming the field that was being read.
pub(crate) enum GetError {
    Eom,
    Err(Error),
}

impl From<Error> for GetError {
    fn from(e: Error) -> Self {
        GetError::Err(e)
    }
}

pub(crate) type GetResult<T> = Result<T, GetError>;

pub struct Message {
    words: u32,
    type_: u8,
    flags: u8,
    extra: u16,
    body1: Box<[u8; BODY1_CAP]>,
    body2: Vec<u8>,
    /// cursor into body1 (write cursor while encoding, read cursor while decoding)
    offset1: usize,
    /// cursor into body2
    offset2: usize,
    /// bytes of body1 considered populated; equals `offset1` while encoding, fixed at
    /// load time while decoding
    cap1: usize,
    max_words: u32,
}

impl Message {
    pub fn new(max_words: u32) -> Self {
        Self {
            words: 0,
            type_: 0,
            flags: 0,
            extra: 0,
            body1: Box::new([0u8; BODY1_CAP]),
            body2: Vec::new(),
            offset1: 0,
            offset2: 0,
            cap1: 0,
            max_words,
        }
    }

    pub fn words(&self) -> u32 {
        self.words
    }
    pub fn msg_type(&self) -> u8 {
        self.type_
    }
    pub fn flags(&self) -> u8 {
        self.flags
    }
    pub fn extra(&self) -> u16 {
        self.extra
    }

    /// Zeros cursors and clears `body2`, ready for the next turn. `body1`'s old
    /// contents are left in place but unreachable until the next writes cover them.
    pub fn reset(&mut self) {
        self.offset1 = 0;
        self.offset2 = 0;
        self.cap1 = 0;
        self.words = 0;
        self.type_ = 0;
        self.flags = 0;
        self.extra = 0;
        if self.body2.capacity() > BODY2_RELEASE_THRESHOLD {
            self.body2 = Vec::new();
        } else {
            self.body2.clear();
        }
    }

    pub fn init(&mut self) {
        self.reset();
    }

    /// Snapshot of the write cursor, used by [`crate::stmt::Stmt::query`] to make a
    /// row an all-or-nothing unit: write the row speculatively, and [`Message::rollback`]
    /// back to the snapshot if it turns out not to fit.
    pub fn checkpoint(&self) -> (usize, usize, usize) {
        (self.offset1, self.offset2, self.body2.len())
    }

    pub fn rollback(&mut self, checkpoint: (usize, usize, usize)) {
        let (offset1, offset2, body2_len) = checkpoint;
        self.offset1 = offset1;
        self.offset2 = offset2;
        self.cap1 = offset1;
        self.body2.truncate(body2_len);
    }

    /// Total bytes committed (encoding) or consumed (decoding) so far.
    pub fn logical_pos(&self) -> usize {
        self.offset1 + self.offset2
    }

    /// Bytes committed to the inline region so far; caps at [`BODY1_CAP`] once it
    /// fills and further writes spill into `body2`.
    pub(crate) fn inline_len(&self) -> usize {
        self.offset1
    }

    /// Bytes committed to the heap overflow region so far.
    pub(crate) fn overflow_len(&self) -> usize {
        self.offset2
    }

    fn remaining(&self) -> usize {
        (self.cap1 - self.offset1) + (self.body2.len() - self.offset2)
    }

    fn byte_ahead(&self, k: usize) -> Option<u8> {
        let from1 = self.cap1 - self.offset1;
        if k < from1 {
            Some(self.body1[self.offset1 + k])
        } else {
            self.body2.get(self.offset2 + (k - from1)).copied()
        }
    }

    // --- header ---

    pub fn header_put(&mut self, type_: u8, flags: u8) {
        self.type_ = type_;
        self.flags = flags;
        self.extra = 0;
    }

    pub fn header_get(&mut self, header: &[u8; 8]) -> SkyResult<()> {
        let words = bytecodec::read_u32_le(&header[0..4]);
        if words == 0 {
            return Err(Error::new(ErrorCode::Proto, "zero-length frame"));
        }
        if words > self.max_words {
            return Err(Error::new(
                ErrorCode::Proto,
                format!(
                    "frame of {} words exceeds the {} word limit",
                    words, self.max_words
                ),
            ));
        }
        self.words = words;
        self.type_ = header[4];
        self.flags = header[5];
        self.extra = bytecodec::read_u16_le(&header[6..8]);
        Ok(())
    }

    /// Loads a body already known to be `words() * 8` bytes long (the transport is
    /// responsible for reading exactly that many bytes before calling this).
    pub fn load_body(&mut self, body: &[u8]) -> SkyResult<()> {
        let expected = self.words as usize * 8;
        if body.len() != expected {
            return Err(Error::new(
                ErrorCode::Proto,
                format!("expected {} body bytes, got {}", expected, body.len()),
            ));
        }
        self.offset1 = 0;
        self.offset2 = 0;
        let n1 = expected.min(BODY1_CAP);
        self.body1[..n1].copy_from_slice(&body[..n1]);
        self.cap1 = n1;
        self.body2.clear();
        if expected > BODY1_CAP {
            self.body2.extend_from_slice(&body[BODY1_CAP..]);
        }
        Ok(())
    }

    /// Patches `words` to the padded body length and assembles the framed bytes.
    pub fn flush(&mut self) -> Vec<u8> {
        let total = self.offset1 + self.offset2;
        self.words = (padded_len(total) / 8) as u32;
        let mut header = [0u8; 8];
        bytecodec::write_u32_le(&mut header[0..4], self.words);
        header[4] = self.type_;
        header[5] = self.flags;
        bytecodec::write_u16_le(&mut header[6..8], self.extra);
        let mut out = Vec::with_capacity(8 + self.words as usize * 8);
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.body1[..self.offset1]);
        out.extend_from_slice(&self.body2[..self.offset2]);
        out
    }

    // --- raw byte primitives ---

    fn put_bytes(&mut self, data: &[u8]) {
        let mut rest = data;
        if self.offset1 < BODY1_CAP {
            let space = BODY1_CAP - self.offset1;
            let take = rest.len().min(space);
            self.body1[self.offset1..self.offset1 + take].copy_from_slice(&rest[..take]);
            self.offset1 += take;
            self.cap1 = self.offset1;
            rest = &rest[take..];
        }
        if !rest.is_empty() {
            self.body2.extend_from_slice(rest);
            self.offset2 += rest.len();
        }
    }

    fn get_bytes(&mut self, n: usize) -> GetResult<Vec<u8>> {
        if self.remaining() < n {
            return Err(GetError::Eom);
        }
        let mut out = Vec::with_capacity(n);
        let from1 = (self.cap1 - self.offset1).min(n);
        if from1 > 0 {
            out.extend_from_slice(&self.body1[self.offset1..self.offset1 + from1]);
            self.offset1 += from1;
        }
        let from2 = n - from1;
        if from2 > 0 {
            out.extend_from_slice(&self.body2[self.offset2..self.offset2 + from2]);
            self.offset2 += from2;
        }
        Ok(out)
    }

    /// Zero-pads the write cursor up to the next 8-byte boundary. Used after writing a
    /// contiguous, non-word-sized block (parameter type tags, row-type headers).
    pub fn put_align(&mut self) {
        let pos = self.logical_pos();
        let pad = padded_len(pos) - pos;
        if pad > 0 {
            self.put_bytes(&vec![0u8; pad]);
        }
    }

    pub(crate) fn get_align(&mut self) -> GetResult<()> {
        let pos = self.logical_pos();
        let pad = padded_len(pos) - pos;
        if pad > 0 {
            self.get_bytes(pad)?;
        }
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) {
        self.put_bytes(&[v]);
    }

    pub(crate) fn get_u8(&mut self) -> GetResult<u8> {
        Ok(self.get_bytes(1)?[0])
    }

    // --- typed kind primitives ---

    pub fn put_integer(&mut self, value: i64) {
        let mut buf = [0u8; 8];
        bytecodec::write_i64_le(&mut buf, value);
        self.put_bytes(&buf);
    }

    pub(crate) fn get_integer(&mut self) -> GetResult<i64> {
        let buf = self.get_bytes(8)?;
        Ok(bytecodec::read_i64_le(&buf))
    }

    pub fn put_float(&mut self, value: f64) {
        let mut buf = [0u8; 8];
        bytecodec::write_f64_le(&mut buf, value);
        self.put_bytes(&buf);
    }

    pub(crate) fn get_float(&mut self) -> GetResult<f64> {
        let buf = self.get_bytes(8)?;
        Ok(bytecodec::read_f64_le(&buf))
    }

    pub fn put_unixtime(&mut self, value: i64) {
        self.put_integer(value);
    }

    pub(crate) fn get_unixtime(&mut self) -> GetResult<i64> {
        self.get_integer()
    }

    pub fn put_boolean(&mut self, value: bool) {
        self.put_integer(if value { 1 } else { 0 });
    }

    pub(crate) fn get_boolean(&mut self) -> GetResult<bool> {
        Ok(self.get_integer()? != 0)
    }

    pub fn put_null(&mut self) {
        self.put_bytes(&[0u8; 8]);
    }

    pub(crate) fn get_null(&mut self) -> GetResult<()> {
        self.get_bytes(8)?;
        Ok(())
    }

    /// NUL-terminated, zero-padded to the 8-byte boundary. Used for both `TEXT` and
    /// `ISO8601` (the latter is semantic-only; it is stored as text on the wire).
    pub fn put_text(&mut self, value: &str) {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        bytes.resize(padded_len(bytes.len()), 0);
        self.put_bytes(&bytes);
    }

    pub(crate) fn get_text(&mut self) -> GetResult<String> {
        let remaining = self.remaining();
        let mut nul_at = None;
        for i in 0..remaining {
            if self.byte_ahead(i) == Some(0) {
                nul_at = Some(i);
                break;
            }
        }
        let nul_at = nul_at.ok_or(GetError::Eom)?;
        let total = padded_len(nul_at + 1);
        if remaining < total {
            return Err(GetError::Eom);
        }
        let raw = self.get_bytes(total)?;
        let s = std::str::from_utf8(&raw[..nul_at])
            .map_err(|_| Error::new(ErrorCode::Proto, "field is not valid UTF-8"))?;
        Ok(s.to_owned())
    }

    pub fn put_iso8601(&mut self, value: &str) {
        self.put_text(value);
    }

    pub(crate) fn get_iso8601(&mut self) -> GetResult<String> {
        self.get_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(words: u32, type_: u8) -> [u8; 8] {
        let mut h = [0u8; 8];
        bytecodec::write_u32_le(&mut h[0..4], words);
        h[4] = type_;
        h
    }

    #[test]
    fn header_get_rejects_zero_words() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        let err = msg.header_get(&header_bytes(0, 1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Proto);
    }

    #[test]
    fn header_get_rejects_oversize_frame() {
        let mut msg = Message::new(4);
        let err = msg.header_get(&header_bytes(5, 1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Proto);
    }

    #[test]
    fn round_trip_integer() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_integer(-666);
        let body = msg.flush()[8..].to_vec();
        msg.reset();
        msg.header_get(&header_bytes(1, 0)).unwrap();
        msg.load_body(&body).unwrap();
        assert_eq!(msg.get_integer().ok(), Some(-666));
    }

    #[test]
    fn body_exactly_4096_stays_inline() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        for _ in 0..512 {
            msg.put_integer(7);
        }
        assert_eq!(msg.logical_pos(), 4096);
        assert_eq!(msg.offset1, 4096);
        assert_eq!(msg.body2.len(), 0);
    }

    #[test]
    fn body_4097_spills_eight_bytes_into_body2() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        for _ in 0..512 {
            msg.put_integer(7);
        }
        msg.put_u8(1);
        msg.put_align();
        assert_eq!(msg.body2.len(), 8);
        assert_eq!(msg.logical_pos(), 4104);
    }

    #[test]
    fn flush_patches_words_to_padded_body_over_8() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_u8(5);
        msg.put_align();
        msg.put_text("hi");
        let framed = msg.flush();
        assert_eq!(bytecodec::read_u32_le(&framed[0..4]), 2);
    }

    #[test]
    fn text_with_nul_on_word_boundary_adds_no_extra_padding() {
        // "abcdefg" is 7 bytes; + NUL = 8, a whole word already
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_text("abcdefg");
        assert_eq!(msg.logical_pos(), 8);
    }

    #[test]
    fn get_text_eom_when_no_nul_present() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.header_get(&header_bytes(1, 0)).unwrap();
        msg.load_body(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert!(matches!(msg.get_text(), Err(GetError::Eom)));
    }

    #[test]
    fn checkpoint_rollback_discards_partial_row() {
        let mut msg = Message::new(DEFAULT_MAX_WORDS);
        msg.put_integer(1);
        let cp = msg.checkpoint();
        msg.put_integer(2);
        msg.put_text("should vanish");
        msg.rollback(cp);
        assert_eq!(msg.logical_pos(), 8);
    }
}
