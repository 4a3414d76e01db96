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

//! [tracing-journald-native](crate) [`Layer`] implementation.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! A basic struct [`Layer`] is defined, generic over the [`TracingFormatter`] & the [`Transport`].
//! Consumers of this crate are of course free to implement those traits for themselves & provide
//! their own implementations.

use crate::{
    message::{assemble, LogEvent},
    priority::Severity,
    tracing::{StructuredTracingFormatter, TracingFormatter},
    transport::Transport,
};

#[cfg(unix)]
use crate::transport::JournalSocket;

use backtrace::Backtrace;
use tracing::Event;
use tracing_subscriber::{layer::Context, registry::LookupSpan};

use std::{
    cell::Cell,
    sync::{Mutex, MutexGuard},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// module error type
#[non_exhaustive]
pub enum Error {
    /// Formatting layer error
    Format {
        source: Box<dyn std::error::Error + Send + Sync>,
        back: Backtrace,
    },
    /// The event couldn't be laid out as a journal entry
    Encoding {
        source: crate::error::Error,
        back: Backtrace,
    },
    /// Transport layer error
    Transport {
        source: crate::error::Error,
        back: Backtrace,
    },
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Format { source, .. } => {
                write!(f, "While formatting an Event, got {}", source)
            }
            Error::Encoding { source, .. } => {
                write!(f, "While assembling a journal entry, got {}", source)
            }
            Error::Transport { source, .. } => {
                write!(f, "While sending a journal entry, got {}", source)
            }
            _ => write!(f, "journald layer error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Format { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Encoding { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Transport { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            _ => write!(f, "{}", self),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          struct Layer                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

thread_local! {
    /// Set while this thread is inside [`Layer::on_event`]; events raised from in there (our own
    /// failure reports, say) are not sent back to the journal.
    static IN_LAYER: Cell<bool> = const { Cell::new(false) };
}

/// Clears [`IN_LAYER`] when dropped
struct ReentrancyGuard;

impl ReentrancyGuard {
    fn enter() -> Option<ReentrancyGuard> {
        if IN_LAYER.with(|flag| flag.replace(true)) {
            None
        } else {
            Some(ReentrancyGuard)
        }
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        IN_LAYER.with(|flag| flag.set(false));
    }
}

/// Derive a `SYSLOG_IDENTIFIER` from the name of the running executable, or "-" if that can't be
/// had.
pub fn default_identifier() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|pbuf| {
            pbuf.file_name()
                .map(|os_str| os_str.to_string_lossy().into_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "-".to_string())
}

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that will send [`Event`]s to
/// journald.
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
///
/// Each event is formatted, assembled & written before `on_event` returns; there is no queue. The
/// transport lives behind a [`Mutex`] so that events from different threads go out as whole
/// datagrams, one after another. The socket is connected on the first event; should a write fail
/// it is shut down, so that the next event connects afresh. Failures never stop later events
/// from being tried. They are raised as a [`tracing::error!`] event, which this layer won't try to
/// send to the journal; whether anything else sees it is up to the dispatcher. Under a scoped
/// default (`set_default`, `with_default`), tracing-core hands events raised from inside a
/// subscriber callback to a no-op dispatcher, so the report is lost.
pub struct Layer<S, F: TracingFormatter<S>, T: Transport>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_formatter: F,
    identifier: String,
    transport: Mutex<T>,
    // I need the Subscriber implementation type as a type parameter to transmit it to the
    // TracingFormatter trait. 👇 gets the compiler to shut-up about unused type parameters.
    subscriber_type: std::marker::PhantomData<S>,
}

/// A [`Layer`] implementation with the following characteristics:
///
/// - Uses the structured formatter for mapping from Tracing events to journal entries
/// - Identifies itself by the name of the running executable
/// - Sends the resulting entries to journald at `/run/systemd/journal/socket`
///
/// May be used with any [`tracing_subscriber::Subscriber`] implementation that supports
/// [`LookupSpan`].
///
/// [`tracing_subscriber::Subscriber`]: https://docs.rs/tracing/latest/tracing/trait.Subscriber.html
/// [`LookupSpan`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/registry/trait.LookupSpan.html
#[cfg(unix)]
impl<S> std::default::Default for Layer<S, StructuredTracingFormatter, JournalSocket>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn default() -> Self {
        Layer::with_transport(JournalSocket::default())
    }
}

#[cfg(unix)]
impl<S> Layer<S, StructuredTracingFormatter, JournalSocket>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    /// Attempt to construct a [`Layer`] already connected to journald at
    /// `/run/systemd/journal/socket`; unlike [`Layer::default`], a journal that isn't there is
    /// reported here rather than on the first event.
    pub fn try_default() -> Result<Self> {
        Ok(Layer::with_transport(JournalSocket::try_default().map_err(
            |err| Error::Transport {
                source: err,
                back: Backtrace::new(),
            },
        )?))
    }
}

impl<S, T: Transport> Layer<S, StructuredTracingFormatter, T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    /// Construct a Layer that will send entries via transport `transport`
    pub fn with_transport(transport: T) -> Self {
        Layer::new(StructuredTracingFormatter::default(), transport)
    }
    /// Replace the default mapping from [`tracing::Level`] to [`Severity`]
    pub fn with_severity_mapping<M>(mut self, map_level: M) -> Self
    where
        M: Fn(&tracing::Level) -> Severity + Send + Sync + 'static,
    {
        self.tracing_formatter = self.tracing_formatter.with_severity_mapping(map_level);
        self
    }
}

impl<S, F: TracingFormatter<S>, T: Transport> Layer<S, F, T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    /// construct Layer with custom inners
    pub fn new(tracing_formatter: F, transport: T) -> Self {
        Layer {
            tracing_formatter,
            identifier: default_identifier(),
            transport: Mutex::new(transport),
            subscriber_type: std::marker::PhantomData,
        }
    }
    /// Set the `SYSLOG_IDENTIFIER` entries will carry
    pub fn with_identifier<I: Into<String>>(mut self, identifier: I) -> Self {
        self.identifier = identifier.into();
        self
    }
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
    pub fn is_connected(&self) -> bool {
        self.transport().is_connected()
    }
    /// Close the transport; the next event will reconnect it.
    pub fn shutdown(&self) {
        self.transport().shutdown()
    }
    // A panic elsewhere while holding the lock leaves the transport in one of its two valid
    // states, so a poisoned lock is still usable.
    fn transport(&self) -> MutexGuard<'_, T> {
        self.transport
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
    fn dispatch(&self, event: &Event<'_>, ctx: Context<'_, S>) -> Result<()> {
        let formatted = match self
            .tracing_formatter
            .on_event(event, ctx)
            .map_err(|err| Error::Format {
                source: Box::new(err),
                back: Backtrace::new(),
            })? {
            Some(formatted) => formatted,
            None => return Ok(()),
        };

        let payload = assemble(
            &LogEvent::new(&formatted.message, formatted.severity, &self.identifier)
                .with_context(&formatted.context)
                .with_extra(&formatted.extra),
        )
        .map_err(|err| Error::Encoding {
            source: err,
            back: Backtrace::new(),
        })?;

        let mut transport = self.transport();
        if let Err(err) = transport.deliver(&payload) {
            // Don't keep writing into a socket whose peer has gone away; journald may have been
            // restarted.
            if let crate::error::Error::Write { .. } = err {
                transport.shutdown();
            }
            return Err(Error::Transport {
                source: err,
                back: Backtrace::new(),
            });
        }
        Ok(())
    }
}

/// This is the Big Tuna-- the [`Layer`] implementation.
///
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
impl<S, F, T> tracing_subscriber::layer::Layer<S> for Layer<S, F, T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    F: TracingFormatter<S> + 'static,
    T: Transport + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing_core::span::Attributes<'_>,
        id: &tracing_core::span::Id,
        ctx: Context<'_, S>,
    ) {
        self.tracing_formatter.on_new_span(attrs, id, ctx)
    }

    fn on_record(
        &self,
        id: &tracing_core::span::Id,
        values: &tracing_core::span::Record<'_>,
        ctx: Context<'_, S>,
    ) {
        self.tracing_formatter.on_record(id, values, ctx)
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let _guard = match ReentrancyGuard::enter() {
            Some(guard) => guard,
            None => return,
        };
        if let Err(err) = self.dispatch(event, ctx) {
            // Best effort; see the notes on `Layer`
            ::tracing::error!("tracing-journald-native failed: {}", err);
        }
    }
}

#[cfg(all(test, unix))]
mod smoke {

    use super::*;

    use tracing::{debug, error, info, info_span, trace, warn};
    use tracing_subscriber::{
        layer::SubscriberExt, // Needed to get `with()`
        registry::Registry,
    };

    use std::os::unix::net::UnixDatagram;

    fn fake_journal() -> (tempfile::TempDir, std::path::PathBuf, UnixDatagram) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.socket");
        let server = UnixDatagram::bind(&path).unwrap();
        server.set_nonblocking(true).unwrap();
        (dir, path, server)
    }

    fn drain(server: &UnixDatagram) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 8192];
        while let Ok(n) = server.recv(&mut buf) {
            out.push(buf[..n].to_vec());
        }
        out
    }

    fn text(datagram: &[u8]) -> &str {
        std::str::from_utf8(datagram).unwrap()
    }

    #[test]
    fn test_levels() {
        let (_dir, path, server) = fake_journal();
        let subscriber = Registry::default()
            .with(Layer::with_transport(JournalSocket::new(&path)).with_identifier("smoke"));
        tracing::subscriber::with_default(subscriber, || {
            trace!("Hello, 世界!");
            debug!("Hello, 世界!");
            info!("Hello, 世界!");
            warn!("Hello, 世界!");
            error!("Hello, 世界!");
        });

        let got = drain(&server);
        let got: Vec<&str> = got.iter().map(|d| text(d)).collect();
        assert_eq!(
            got,
            vec![
                "MESSAGE=Hello, 世界!\nPRIORITY=7\nSYSLOG_IDENTIFIER=smoke\n",
                "MESSAGE=Hello, 世界!\nPRIORITY=7\nSYSLOG_IDENTIFIER=smoke\n",
                "MESSAGE=Hello, 世界!\nPRIORITY=6\nSYSLOG_IDENTIFIER=smoke\n",
                "MESSAGE=Hello, 世界!\nPRIORITY=4\nSYSLOG_IDENTIFIER=smoke\n",
                "MESSAGE=Hello, 世界!\nPRIORITY=3\nSYSLOG_IDENTIFIER=smoke\n",
            ]
        );
    }

    #[test]
    fn test_span_and_event_fields() {
        let (_dir, path, server) = fake_journal();
        let subscriber = Registry::default()
            .with(Layer::with_transport(JournalSocket::new(&path)).with_identifier("smoke"));
        tracing::subscriber::with_default(subscriber, || {
            let outer = info_span!("request", request_id = "r-17", attempt = 1);
            let _outer = outer.enter();
            let inner = info_span!("db", table = "users", attempt = tracing::field::Empty);
            let _inner = inner.enter();
            inner.record("attempt", 2);
            info!(rows = 3, "fetched {} rows", 3);
        });

        let got = drain(&server);
        assert_eq!(got.len(), 1);
        assert_eq!(
            text(&got[0]),
            "MESSAGE=fetched 3 rows\nPRIORITY=6\nSYSLOG_IDENTIFIER=smoke\n\
             REQUEST_ID=r-17\nATTEMPT=2\nTABLE=users\nROWS=3\n"
        );
    }

    #[test]
    fn test_error_field() {
        let (_dir, path, server) = fake_journal();
        let subscriber = Registry::default()
            .with(Layer::with_transport(JournalSocket::new(&path)).with_identifier("smoke"));
        let line = tracing::subscriber::with_default(subscriber, || {
            let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
            let other = std::io::Error::new(std::io::ErrorKind::Other, "also on fire");
            let line = line!() + 1;
            error!(
                error = &err as &(dyn std::error::Error + 'static),
                cause = &other as &(dyn std::error::Error + 'static),
                "write failed\nretrying"
            );
            line
        });

        // only the first error contributes a location
        let got = drain(&server);
        assert_eq!(got.len(), 1);
        let mut golden = b"MESSAGE\n".to_vec();
        golden.extend_from_slice(&21u64.to_le_bytes());
        golden.extend_from_slice(b"write failed\nretrying\nPRIORITY=3\nSYSLOG_IDENTIFIER=smoke\n");
        golden.extend_from_slice(format!("CODE_FILE={}\nCODE_LINE={}\n", file!(), line).as_bytes());
        assert_eq!(got[0], golden);
    }

    #[test]
    fn test_failures_do_not_stop_later_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.socket");
        let layer = Layer::with_transport(JournalSocket::new(&path)).with_identifier("smoke");
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            // nobody listening yet
            info!("lost");

            let server = UnixDatagram::bind(&path).unwrap();
            server.set_nonblocking(true).unwrap();
            info!("found");
            let got = drain(&server);
            assert_eq!(got.len(), 1);
            assert_eq!(
                text(&got[0]),
                "MESSAGE=found\nPRIORITY=6\nSYSLOG_IDENTIFIER=smoke\n"
            );
        });
    }

    #[test]
    fn test_write_failure_forces_reconnect() {
        let (_dir, path, first) = fake_journal();
        let subscriber = Registry::default()
            .with(Layer::with_transport(JournalSocket::new(&path)).with_identifier("smoke"));
        tracing::subscriber::with_default(subscriber, || {
            info!("first");
            assert_eq!(drain(&first).len(), 1);

            // journald goes away...
            drop(first);
            std::fs::remove_file(&path).unwrap();
            info!("second");

            // and comes back; had the layer held on to the old socket, this would fail too
            let second = UnixDatagram::bind(&path).unwrap();
            second.set_nonblocking(true).unwrap();
            info!("third");
            let got = drain(&second);
            assert_eq!(got.len(), 1);
            assert_eq!(
                text(&got[0]),
                "MESSAGE=third\nPRIORITY=6\nSYSLOG_IDENTIFIER=smoke\n"
            );
        });
    }

    #[test]
    fn test_accessors() {
        let (_dir, path, _server) = fake_journal();
        let layer: Layer<Registry, _, _> =
            Layer::with_transport(JournalSocket::new(&path)).with_identifier("smoke");
        assert_eq!(layer.identifier(), "smoke");
        assert!(!layer.is_connected());
        layer.transport().ensure_connected().unwrap();
        assert!(layer.is_connected());
        layer.shutdown();
        layer.shutdown();
        assert!(!layer.is_connected());
    }

    #[test]
    fn test_default_identifier() {
        let id = default_identifier();
        assert!(!id.is_empty());
        let _layer: Layer<Registry, StructuredTracingFormatter, JournalSocket> = Layer::default();
    }

    #[test]
    fn test_severity_mapping() {
        let (_dir, path, server) = fake_journal();
        let subscriber = Registry::default().with(
            Layer::new(
                StructuredTracingFormatter::default().with_severity_mapping(|_| Severity::Notice),
                JournalSocket::new(&path),
            )
            .with_identifier("smoke"),
        );
        tracing::subscriber::with_default(subscriber, || {
            info!("noted");
            error!("noted");
        });

        let subscriber = Registry::default().with(
            Layer::with_transport(JournalSocket::new(&path))
                .with_identifier("smoke")
                .with_severity_mapping(|level| {
                    if *level == tracing::Level::INFO {
                        Severity::Critical
                    } else {
                        Severity::Debug
                    }
                }),
        );
        tracing::subscriber::with_default(subscriber, || {
            info!("mapped");
            warn!("mapped");
        });

        let got = drain(&server);
        let got: Vec<&str> = got.iter().map(|d| text(d)).collect();
        assert_eq!(
            got,
            vec![
                "MESSAGE=noted\nPRIORITY=5\nSYSLOG_IDENTIFIER=smoke\n",
                "MESSAGE=noted\nPRIORITY=5\nSYSLOG_IDENTIFIER=smoke\n",
                "MESSAGE=mapped\nPRIORITY=2\nSYSLOG_IDENTIFIER=smoke\n",
                "MESSAGE=mapped\nPRIORITY=7\nSYSLOG_IDENTIFIER=smoke\n",
            ]
        );
    }

    // The only test in this binary to install a `log` logger.
    #[test]
    #[cfg(feature = "tracing-log")]
    fn test_log_records() {
        tracing_log::LogTracer::init().unwrap();

        let (_dir, path, server) = fake_journal();
        let subscriber = Registry::default()
            .with(Layer::with_transport(JournalSocket::new(&path)).with_identifier("smoke"));
        tracing::subscriber::with_default(subscriber, || {
            log::info!("from {}", "log");
            log::warn!(target: "elsewhere", "also from log");
        });

        // the record's target, module, file & line ride along as `log.*` fields; none of them
        // may show up in the journal
        let got = drain(&server);
        let got: Vec<&str> = got.iter().map(|d| text(d)).collect();
        assert_eq!(
            got,
            vec![
                "MESSAGE=from log\nPRIORITY=6\nSYSLOG_IDENTIFIER=smoke\n",
                "MESSAGE=also from log\nPRIORITY=4\nSYSLOG_IDENTIFIER=smoke\n",
            ]
        );
    }

    #[test]
    fn test_try_default() {
        // Whether or not journald runs on this host, the outcome must be one of these two.
        let layer: Result<Layer<Registry, StructuredTracingFormatter, JournalSocket>> =
            Layer::try_default();
        match layer {
            Ok(layer) => assert!(layer.is_connected()),
            Err(Error::Transport {
                source: crate::error::Error::Connection { .. },
                ..
            }) => (),
            Err(err) => panic!("unexpected error {:?}", err),
        }
    }

    #[test]
    #[cfg(feature = "journald")]
    fn test_tracing_via_journald() {
        let subscriber = Registry::default().with(Layer::default());
        let _guard = tracing::subscriber::set_default(subscriber);

        trace!("Hello, 世界!");
        debug!("Hello, 世界!");
        info!(answer = 42, "Hello, 世界!");
        warn!("Hello,\n世界!");
        error!("Hello, 世界!");
    }
}
