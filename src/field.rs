// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of tracing-journald-native.
//
// tracing-journald-native is free software: you can redistribute it and/or modify it under the
// terms of the GNU General Public License as published by the Free Software Foundation, either
// version 3 of the License, or (at your option) any later version.
//
// tracing-journald-native is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// tracing-journald-native.  If not, see <http://www.gnu.org/licenses/>.

//! Encoding single journal fields.
//!
//! The journald native [protocol] frames a log entry as a sequence of fields separated by `\n`.
//! Each field has one of two shapes:
//!
//! - `NAME=VALUE`, when `VALUE` contains no newline
//! - `NAME`, `\n`, the length of `VALUE` as a 64-bit little-endian unsigned integer, then the raw
//!   bytes of `VALUE`, when it does (the newline being the field separator, there's no other way
//!   to get one through)
//!
//! [protocol]: https://systemd.io/JOURNAL_NATIVE_PROTOCOL/
//!
//! [`encode_field`] picks between the two; [`Field::write_to`] lays the result out on the wire.

use crate::error::{Error, Result};

use bytes::{BufMut, Bytes, BytesMut};

use std::fmt::Write;

/// How a [`Field`]'s value will be laid out on the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// `NAME=VALUE`; the value contains no newline
    Plain(String),
    /// `NAME\n<u64 LE length><bytes>`
    Binary(Vec<u8>),
}

/// One journal field, ready to be serialized into a payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    name: String,
    encoding: Encoding,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }
    /// The field's value, as raw bytes, regardless of encoding
    pub fn value(&self) -> &[u8] {
        match &self.encoding {
            Encoding::Plain(text) => text.as_bytes(),
            Encoding::Binary(bytes) => bytes,
        }
    }
    /// Number of bytes [`Field::write_to`] will append (not counting any separator)
    pub fn encoded_len(&self) -> usize {
        match &self.encoding {
            Encoding::Plain(text) => self.name.len() + 1 + text.len(),
            Encoding::Binary(bytes) => self.name.len() + 1 + 8 + bytes.len(),
        }
    }
    /// Append this field's wire representation to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_slice(self.name.as_bytes());
        match &self.encoding {
            Encoding::Plain(text) => {
                buf.put_u8(b'=');
                buf.put_slice(text.as_bytes());
            }
            Encoding::Binary(bytes) => {
                buf.put_u8(b'\n');
                buf.put_u64_le(bytes.len() as u64);
                buf.put_slice(bytes);
            }
        }
    }
    /// This field's wire representation on its own
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

/// Encode `value` as the journal field `name`.
///
/// `value` is rendered through its [`Display`] implementation first, so numbers & booleans come
/// out in their canonical textual form (`42`, `-1.5`, `true`). If the rendering contains a newline
/// the binary framing is chosen, otherwise the plain one. Values are not escaped further.
///
/// `name` is taken as-is; callers are expected to have normalized it already.
///
/// A [`Display`] implementation that reports an error yields [`Error::Encoding`].
///
/// [`Display`]: std::fmt::Display
pub fn encode_field(name: &str, value: &dyn std::fmt::Display) -> Result<Field> {
    let mut text = String::new();
    write!(text, "{}", value).map_err(|_| Error::encoding(name))?;
    let encoding = if text.contains('\n') {
        Encoding::Binary(text.into_bytes())
    } else {
        Encoding::Plain(text)
    };
    Ok(Field {
        name: name.to_string(),
        encoding,
    })
}

#[cfg(test)]
mod test {

    use super::*;

    /// Undo the binary framing: name up to the first newline, eight bytes of little-endian length,
    /// then that many bytes of value
    fn decode_binary(buf: &[u8]) -> (&[u8], &[u8]) {
        let nl = buf.iter().position(|&b| b == b'\n').unwrap();
        let (name, rest) = (&buf[..nl], &buf[nl + 1..]);
        let len = u64::from_le_bytes(rest[..8].try_into().unwrap()) as usize;
        assert_eq!(rest.len(), 8 + len);
        (name, &rest[8..8 + len])
    }

    #[test]
    fn test_plain() {
        let f = encode_field("PEER", &"10.0.0.1:5514").unwrap();
        assert_eq!(f.encoding(), &Encoding::Plain("10.0.0.1:5514".to_string()));
        assert_eq!(&f.to_bytes()[..], b"PEER=10.0.0.1:5514");

        // no escaping, even of characters that look like protocol syntax
        let f = encode_field("EQ", &"a=b=c").unwrap();
        assert_eq!(&f.to_bytes()[..], b"EQ=a=b=c");

        let f = encode_field("EMPTY", &"").unwrap();
        assert_eq!(&f.to_bytes()[..], b"EMPTY=");

        let f = encode_field("GREETING", &"Hello, 世界!").unwrap();
        assert_eq!(f.to_bytes(), Bytes::from("GREETING=Hello, 世界!"));
        assert_eq!(f.encoded_len(), f.to_bytes().len());
    }

    #[test]
    fn test_scalars() {
        assert_eq!(&encode_field("N", &42).unwrap().to_bytes()[..], b"N=42");
        assert_eq!(&encode_field("N", &-7i64).unwrap().to_bytes()[..], b"N=-7");
        assert_eq!(&encode_field("F", &1.5).unwrap().to_bytes()[..], b"F=1.5");
        assert_eq!(&encode_field("B", &true).unwrap().to_bytes()[..], b"B=true");
        assert_eq!(&encode_field("B", &false).unwrap().to_bytes()[..], b"B=false");
    }

    #[test]
    fn test_binary() {
        let f = encode_field("MESSAGE", &"line1\nline2").unwrap();
        assert_eq!(f.encoding(), &Encoding::Binary(b"line1\nline2".to_vec()));

        let bytes = f.to_bytes();
        let mut golden = b"MESSAGE\n".to_vec();
        golden.extend_from_slice(&[11, 0, 0, 0, 0, 0, 0, 0]);
        golden.extend_from_slice(b"line1\nline2");
        assert_eq!(&bytes[..], &golden[..]);
        assert_eq!(f.encoded_len(), bytes.len());

        let (name, value) = decode_binary(&bytes);
        assert_eq!(name, b"MESSAGE");
        assert_eq!(value, b"line1\nline2");
    }

    #[test]
    fn test_binary_round_trip() {
        for text in ["\n", "trailing\n", "\nleading", "a\n\nb", "多字节\n文字", "x=1\ny=2\r\n"] {
            let f = encode_field("DATA", &text).unwrap();
            let bytes = f.to_bytes();
            let (name, value) = decode_binary(&bytes);
            assert_eq!(name, b"DATA");
            assert_eq!(value, text.as_bytes());
            assert_eq!(f.value(), text.as_bytes());
        }
    }

    #[test]
    fn test_carriage_return_is_plain() {
        let f = encode_field("CR", &"a\rb").unwrap();
        assert_eq!(&f.to_bytes()[..], b"CR=a\rb");
    }

    struct Broken;

    impl std::fmt::Display for Broken {
        fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            Err(std::fmt::Error)
        }
    }

    #[test]
    fn test_encoding_error() {
        match encode_field("BROKEN", &Broken) {
            Err(Error::Encoding { name, .. }) => assert_eq!(name, "BROKEN"),
            other => panic!("expected an encoding error, got {:?}", other),
        }
        // and the next field is unaffected
        assert!(encode_field("FINE", &"fine").is_ok());
    }
}
