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

//! A [`tracing-subscriber`] [`Layer`] implementation for sending [`tracing`] [`Event`]s to
//! [systemd-journald] over its [native protocol]
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/0.1.35/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [systemd-journald]: https://www.freedesktop.org/software/systemd/man/systemd-journald.service.html
//! [native protocol]: https://systemd.io/JOURNAL_NATIVE_PROTOCOL/
//!
//! # Introduction
//!
//! journald will happily accept plain syslog lines on `/dev/log`, but then everything but the
//! message text is lost. Its native protocol instead takes a datagram of `KEY=VALUE` fields, so
//! that structured data (a request ID, a peer address, where an error came from) lands in the
//! journal as fields one can filter on (`journalctl REQUEST_ID=r-17`).
//!
//! This crate speaks that protocol directly: entries are laid out as raw protocol bytes & written
//! to journald's socket, with no dependency on `libsystemd`.
//!
//! The translation from a [`tracing`] event to a journal entry happens in three steps:
//!
//! 1. formatting the event to a message, a severity & metadata ([`tracing::TracingFormatter`])
//! 2. laying those out as journal fields ([`message::assemble`], built on [`field::encode_field`]
//!    & [`metadata::collect_fields`])
//! 3. transporting the resulting datagram to journald ([`transport::Transport`])
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//!
//! # Usage
//!
//! [tracing-journald-native](crate)'s [`Layer`] comes with sane defaults:
//!
//! ```rust
//! use tracing::info;
//! use tracing_journald_native::layer::Layer;
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! // The default configuration is to identify ourselves by the name of the running executable
//! // & to send entries to /run/systemd/journal/socket.
//! let subscriber = Registry::default().with(Layer::default());
//!
//! info!("Hello, world!");
//! ```
//!
//! Fields recorded on the event & on the spans it occurs in become journal fields (upper-cased):
//!
//! ```no_run
//! use tracing::{info, info_span};
//! use tracing_journald_native::{layer::Layer, transport::JournalSocket};
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! let subscriber = Registry::default().with(
//!     Layer::with_transport(JournalSocket::new("/run/systemd/journal/socket"))
//!         .with_identifier("my-service"));
//! let _guard = tracing::subscriber::set_default(subscriber);
//!
//! let span = info_span!("request", request_id = "r-17");
//! let _enter = span.enter();
//! info!(rows = 3, "fetched {} rows", 3);
//! ```
//!
//! Will produce a journal entry along the lines of:
//!
//! ```text
//! MESSAGE=fetched 3 rows
//! PRIORITY=6
//! SYSLOG_IDENTIFIER=my-service
//! REQUEST_ID=r-17
//! ROWS=3
//! ```
//!
//! The pieces may also be used without [`tracing`] at all:
//!
//! ```no_run
//! use tracing_journald_native::{
//!     message::{assemble, LogEvent},
//!     metadata::Metadata,
//!     priority::Severity,
//!     transport::{JournalSocket, Transport},
//! };
//!
//! let extra = Metadata::new().with("peer", "10.0.0.1");
//! let payload = assemble(
//!     &LogEvent::new("Hello", Severity::Info, "MyLogger").with_extra(&extra)).unwrap();
//! let mut transport = JournalSocket::default();
//! transport.ensure_connected().unwrap();
//! transport.send(&payload).unwrap();
//! ```

pub mod error;
pub mod field;
pub mod layer;
pub mod message;
pub mod metadata;
pub mod priority;
pub mod tracing;
pub mod transport;
