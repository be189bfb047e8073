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

//! # ByteCodec
//!
//! Primitive little-endian reads/writes and the 8-byte word padding arithmetic shared
//! by [`super::message::Message`] and the row encoder in [`crate::stmt`]. There is
//! exactly one wire representation in this protocol, so these are free functions
//! rather than a trait.

pub const WORD: usize = 8;

/// Rounds `len` up to the next multiple of [`WORD`].
pub const fn padded_len(len: usize) -> usize {
    (len + WORD - 1) / WORD * WORD
}

/// The one-byte wire type tag, identical to the SQLite type code where one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Integer = 1,
    Float = 2,
    Text = 3,
    Null = 5,
    UnixTime = 9,
    Iso8601 = 10,
    Boolean = 11,
}

impl Kind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Integer),
            2 => Some(Self::Float),
            3 => Some(Self::Text),
            5 => Some(Self::Null),
            9 => Some(Self::UnixTime),
            10 => Some(Self::Iso8601),
            11 => Some(Self::Boolean),
            _ => None,
        }
    }
    pub const fn code(self) -> u8 {
        self as u8
    }
}

pub fn write_u16_le(buf: &mut [u8], value: u16) {
    buf[..2].copy_from_slice(&value.to_le_bytes());
}

pub fn read_u16_le(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

pub fn write_u32_le(buf: &mut [u8], value: u32) {
    buf[..4].copy_from_slice(&value.to_le_bytes());
}

pub fn read_u32_le(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

pub fn write_u64_le(buf: &mut [u8], value: u64) {
    buf[..8].copy_from_slice(&value.to_le_bytes());
}

pub fn read_u64_le(buf: &[u8]) -> u64 {
    u64::from_le_bytes(buf[..8].try_into().unwrap())
}

pub fn write_i64_le(buf: &mut [u8], value: i64) {
    buf[..8].copy_from_slice(&value.to_le_bytes());
}

pub fn read_i64_le(buf: &[u8]) -> i64 {
    i64::from_le_bytes(buf[..8].try_into().unwrap())
}

pub fn write_f64_le(buf: &mut [u8], value: f64) {
    buf[..8].copy_from_slice(&value.to_le_bytes());
}

pub fn read_f64_le(buf: &[u8]) -> f64 {
    f64::from_le_bytes(buf[..8].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_to_word_boundary() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 8);
        assert_eq!(padded_len(8), 8);
        assert_eq!(padded_len(9), 16);
    }

    #[test]
    fn integer_round_trips_le() {
        let mut buf = [0u8; 8];
        write_i64_le(&mut buf, -666);
        assert_eq!(buf, [0x66, 0xFD, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(read_i64_le(&buf), -666);
    }

    #[test]
    fn kind_round_trips_through_code() {
        for k in [
            Kind::Integer,
            Kind::Float,
            Kind::Text,
            Kind::Null,
            Kind::UnixTime,
            Kind::Iso8601,
            Kind::Boolean,
        ] {
            assert_eq!(Kind::from_code(k.code()), Some(k));
        }
        assert_eq!(Kind::from_code(0), None);
        assert_eq!(Kind::from_code(4), None);
    }
}
