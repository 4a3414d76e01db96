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

//! syslog priority & application severity definitions.
//!
//! [`Level`] replicates the names used in `<syslog.h>`; its discriminants are what journald
//! expects in the `PRIORITY` field. [`Severity`] is the conventional eight-level scale
//! applications log at, ordered from least to most severe.

type StdResult<T, E> = std::result::Result<T, E>;

/// The eight syslog severity levels. The enumeration values duplicate the constants documented as
/// per the `syslog()` manual [page] & defined in `<syslog.h>`.
///
/// [page]: https://man7.org/linux/man-pages/man3/syslog.3.html
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Level {
    /// system is unusable
    LOG_EMERG,
    /// action must be take immediately
    LOG_ALERT,
    /// critical conditions
    LOG_CRIT,
    /// error conditions
    LOG_ERR,
    /// warning conditions
    LOG_WARNING,
    /// normal, but significant condition
    LOG_NOTICE,
    /// informational message
    LOG_INFO,
    /// debug-level message
    LOG_DEBUG,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Level::LOG_EMERG => "LOG_EMERG",
                Level::LOG_ALERT => "LOG_ALERT",
                Level::LOG_CRIT => "LOG_CRIT",
                Level::LOG_ERR => "LOG_ERR",
                Level::LOG_WARNING => "LOG_WARNING",
                Level::LOG_NOTICE => "LOG_NOTICE",
                Level::LOG_INFO => "LOG_INFO",
                Level::LOG_DEBUG => "LOG_DEBUG",
            }
        )
    }
}

/// Application-side severity, least severe first.
///
/// This is the scale most logging front-ends speak (and the one `tracing` levels are mapped onto);
/// [`Severity::priority`] turns it into the syslog [`Level`] the journal wants. The correspondence
/// is monotonic: `Debug` is `LOG_DEBUG` (7) and `Emergency` is `LOG_EMERG` (0).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    /// Map this severity to its syslog priority
    pub fn priority(self) -> Level {
        match self {
            Severity::Debug => Level::LOG_DEBUG,
            Severity::Info => Level::LOG_INFO,
            Severity::Notice => Level::LOG_NOTICE,
            Severity::Warning => Level::LOG_WARNING,
            Severity::Error => Level::LOG_ERR,
            Severity::Critical => Level::LOG_CRIT,
            Severity::Alert => Level::LOG_ALERT,
            Severity::Emergency => Level::LOG_EMERG,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Severity::Debug => "DEBUG",
                Severity::Info => "INFO",
                Severity::Notice => "NOTICE",
                Severity::Warning => "WARNING",
                Severity::Error => "ERROR",
                Severity::Critical => "CRITICAL",
                Severity::Alert => "ALERT",
                Severity::Emergency => "EMERGENCY",
            }
        )
    }
}

/// `tracing` has only five levels; TRACE & DEBUG both land on [`Severity::Debug`].
impl std::convert::From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}
