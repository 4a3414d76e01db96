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

//! [tracing-journald-native](crate) errors

use backtrace::Backtrace;

use std::path::PathBuf;

/// [tracing-journald-native](crate) error type
///
/// Like its sibling crates, this one eschews libraries like [thiserror], [anyhow] & [Snafu] in
/// favor of a straightforward enumeration with a few match arms chosen on the basis of what the
/// caller will need to respond. Every variant describes the failure of a single log event; none of
/// them should prevent the caller from trying again with the next one.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
#[non_exhaustive]
pub enum Error {
    /// A field value could not be rendered to protocol bytes
    Encoding { name: String, back: Backtrace },
    /// The journal socket could not be created or connected, or is not connected
    Connection {
        path: PathBuf,
        source: Option<std::io::Error>,
        back: Backtrace,
    },
    /// The datagram could not be written to a connected socket
    Write {
        path: PathBuf,
        source: std::io::Error,
        back: Backtrace,
    },
}

impl Error {
    pub(crate) fn encoding(name: &str) -> Error {
        Error::Encoding {
            name: name.to_string(),
            back: Backtrace::new(),
        }
    }
    pub(crate) fn connection(path: &std::path::Path, source: Option<std::io::Error>) -> Error {
        Error::Connection {
            path: path.to_path_buf(),
            source,
            back: Backtrace::new(),
        }
    }
    pub(crate) fn write(path: &std::path::Path, source: std::io::Error) -> Error {
        Error::Write {
            path: path.to_path_buf(),
            source,
            back: Backtrace::new(),
        }
    }
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Encoding { name, .. } => {
                write!(f, "The value of field {} could not be rendered as text", name)
            }
            Error::Connection {
                path,
                source: Some(source),
                ..
            } => write!(f, "While connecting to {:?}, got {}", path, source),
            Error::Connection { path, .. } => {
                write!(f, "Not connected to the journal socket at {:?}", path)
            }
            Error::Write { path, source, .. } => {
                write!(f, "While writing a datagram to {:?}, got {}", path, source)
            }
            _ => write!(f, "Other tracing-journald-native error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Encoding { name: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Connection { back, .. } => write!(f, "{}\n{:#?}", self, back),
            Error::Write { back, .. } => write!(f, "{}\n{:#?}", self, back),
            err => write!(f, "tracing-journald-native error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    #[allow(unreachable_patterns)]
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection {
                source: Some(source),
                ..
            } => Some(source),
            Error::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
