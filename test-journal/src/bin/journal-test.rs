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

//! Test writing to journald on the local host.
//!
//! Run it, then look for the results with `journalctl -t journal-test -o verbose`.

use tracing::{debug, error, info, info_span, trace, warn};
use tracing_journald_native::layer::Layer;
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

pub fn main() {
    let subscriber = Registry::default().with(Layer::default().with_identifier("journal-test"));
    let _guard = tracing::subscriber::set_default(subscriber);

    trace!("你好, journald.");
    debug!("你好, journald.");
    info!("你好, journald.");
    warn!("你好, journald.");
    error!("你好, journald.");

    let span = info_span!("request", request_id = "r-17", attempt = 1);
    let _enter = span.enter();
    info!(rows = 3, peer = "10.0.0.1", "fetched {} rows", 3);
    warn!("this one\nspans\nthree lines");
    let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
    error!(error = &err as &(dyn std::error::Error + 'static), "write failed");
}
