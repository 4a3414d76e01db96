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

//! The journal transport layer.
//!
//! This module defines the [`Transport`] trait that all implementations must support, as well
//! as the Unix datagram socket implementation journald listens on.
//!
//! # Examples
//!
//! To send entries to journald at its usual address:
//!
//! ```rust
//! use tracing_journald_native::transport::{JournalSocket, Transport};
//! let transpo = JournalSocket::default();
//! assert!(!transpo.is_connected()); // nothing happens until the first entry goes out
//! ```
//!
//! Sockets are connected lazily, so a bad path only shows up on first use:
//!
//! ```rust
//! use tracing_journald_native::transport::{JournalSocket, Transport};
//! let mut transpo = JournalSocket::new("/i/am/not/there.s");
//! assert!(transpo.ensure_connected().is_err()); // no such socket, after all
//! ```
//!
//! # Threads
//!
//! Implementations are not internally synchronized: connecting & shutting down take `&mut self`,
//! and nothing stops two threads holding a shared reference from interleaving their sends. Callers
//! that log from several threads must serialize access themselves (the [`Layer`] keeps its
//! transport behind a [`Mutex`]).
//!
//! [`Layer`]: crate::layer::Layer
//! [`Mutex`]: std::sync::Mutex

use crate::{
    error::{Error, Result},
    message::Payload,
};

#[cfg(unix)]
use std::{
    net::Shutdown,
    os::unix::net::UnixDatagram,
    path::{Path, PathBuf},
};

/// Where journald listens for native protocol datagrams
pub const JOURNALD_PATH: &str = "/run/systemd/journal/socket";

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
///
/// A transport starts out disconnected; [`Transport::ensure_connected`] moves it to connected,
/// [`Transport::shutdown`] back again. [`Transport::send`] never connects on its own.
pub trait Transport {
    /// Connect, unless already connected (in which case this is a no-op).
    fn ensure_connected(&mut self) -> Result<()>;
    /// Send a slice of bytes as one datagram; fails with [`Error::Connection`] if not connected.
    ///
    /// At the end of the day, sockets operate on a contiguous slice of `u8`, so we require that
    /// our caller assemble one.
    fn send(&self, buf: &[u8]) -> Result<usize>;
    fn is_connected(&self) -> bool;
    /// Drop the connection, if any. Idempotent.
    fn shutdown(&mut self);
    /// Connect if need be, then send `payload`.
    fn deliver(&mut self, payload: &Payload) -> Result<usize> {
        self.ensure_connected()?;
        self.send(payload)
    }
}

/// Sending journal entries via a Unix datagram socket.
#[cfg(unix)]
#[derive(Debug)]
pub struct JournalSocket {
    path: PathBuf,
    socket: Option<UnixDatagram>,
}

#[cfg(unix)]
impl JournalSocket {
    /// Construct a [`Transport`] implementation that will send to the Unix datagram socket at
    /// `path`. Nothing is opened until [`Transport::ensure_connected`] is called.
    pub fn new<P: AsRef<Path>>(path: P) -> JournalSocket {
        JournalSocket {
            path: path.as_ref().to_path_buf(),
            socket: None,
        }
    }
    /// Construct a [`JournalSocket`] for `path` & connect it straight away.
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<JournalSocket> {
        let mut transpo = JournalSocket::new(path);
        transpo.ensure_connected()?;
        Ok(transpo)
    }
    /// Attempt to construct a [`Transport`] implementation connected to journald at
    /// [`JOURNALD_PATH`]
    pub fn try_default() -> Result<JournalSocket> {
        JournalSocket::connect(JOURNALD_PATH)
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl std::default::Default for JournalSocket {
    /// A [`Transport`] implementation for journald at [`JOURNALD_PATH`]
    fn default() -> Self {
        JournalSocket::new(JOURNALD_PATH)
    }
}

#[cfg(unix)]
impl Transport for JournalSocket {
    fn ensure_connected(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        let sock =
            UnixDatagram::unbound().map_err(|err| Error::connection(&self.path, Some(err)))?;
        sock.connect(&self.path)
            .map_err(|err| Error::connection(&self.path, Some(err)))?;
        self.socket = Some(sock);
        Ok(())
    }
    fn send(&self, buf: &[u8]) -> Result<usize> {
        let sock = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::connection(&self.path, None))?;
        let cb_written = sock
            .send(buf)
            .map_err(|err| Error::write(&self.path, err))?;
        Ok(cb_written)
    }
    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
    fn shutdown(&mut self) {
        if let Some(sock) = self.socket.take() {
            // The descriptor is closed when `sock` drops regardless; a failure here only means
            // the peer was already gone.
            let _ = sock.shutdown(Shutdown::Both);
        }
    }
}
