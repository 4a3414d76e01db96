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

//! Assembling journal datagrams.
//!
//! # Introduction
//!
//! The translation from a log event to a journal entry occurs in three parts:
//!
//! 1. formatting the event to a textual message (not our concern here; see [`crate::tracing`])
//!
//! 2. laying that message, its priority, its identifier & its metadata out as journal fields
//!
//! 3. transporting the result to journald ([`crate::transport`])
//!
//! [`assemble`] implements step 2: given a [`LogEvent`], produce the [`Payload`] that will be sent
//! as a single datagram.
//!
//! # Framing
//!
//! `MESSAGE`, `PRIORITY` & `SYSLOG_IDENTIFIER` always come first, in that order, and are never
//! filtered; journald interprets the first two specially. The fields derived from the event's
//! metadata follow (see [`collect_fields`]). Fields are separated by `\n` and the payload ends with
//! one.

use crate::{
    error::Result,
    field::{encode_field, Field},
    metadata::{collect_fields, Metadata},
    priority::Severity,
};

use bytes::{BufMut, Bytes, BytesMut};

use std::ops::Deref;

static NO_METADATA: Metadata = Metadata::new();

/// A fully formatted log event, as handed to us by whatever is doing the dispatching.
#[derive(Clone, Copy, Debug)]
pub struct LogEvent<'a> {
    /// The human-readable message, already formatted
    pub message: &'a str,
    pub severity: Severity,
    /// The logger, process or application name; becomes `SYSLOG_IDENTIFIER`
    pub channel: &'a str,
    pub context: &'a Metadata,
    pub extra: &'a Metadata,
}

impl<'a> LogEvent<'a> {
    /// An event with no metadata.
    pub fn new(message: &'a str, severity: Severity, channel: &'a str) -> LogEvent<'a> {
        LogEvent {
            message,
            severity,
            channel,
            context: &NO_METADATA,
            extra: &NO_METADATA,
        }
    }
    pub fn with_context(mut self, context: &'a Metadata) -> LogEvent<'a> {
        self.context = context;
        self
    }
    pub fn with_extra(mut self, extra: &'a Metadata) -> LogEvent<'a> {
        self.extra = extra;
        self
    }
}

/// One journal entry, laid out on the wire; it will be sent as exactly one datagram.
///
/// The only way to get one is through [`assemble`], so anything handed to a
/// [`Transport`](crate::transport::Transport) as a `Payload` is known to be well-framed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Payload {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Lay `event` out as a journal datagram.
///
/// The whole payload is built in memory before anything is returned; should the message or the
/// identifier fail to render the event is abandoned with [`Error::Encoding`] rather than sent
/// without them. Metadata fields that fail to render are simply left out.
///
/// [`Error::Encoding`]: crate::error::Error::Encoding
pub fn assemble(event: &LogEvent<'_>) -> Result<Payload> {
    let mandatory = [
        encode_field("MESSAGE", &event.message)?,
        encode_field("PRIORITY", &(event.severity.priority() as u8))?,
        encode_field("SYSLOG_IDENTIFIER", &event.channel)?,
    ];
    let additional = collect_fields(event.context, event.extra);

    let fields = || mandatory.iter().chain(additional.iter());
    let mut buf = BytesMut::with_capacity(fields().map(|f: &Field| f.encoded_len() + 1).sum());
    for field in fields() {
        field.write_to(&mut buf);
        buf.put_u8(b'\n');
    }
    Ok(Payload(buf.freeze()))
}
