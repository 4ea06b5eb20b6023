//! Keep-alive probe scheduler.
//!
//! One periodic task, started once per process and never restarted on
//! reconnection. Each tick checks the current connection state and sends the
//! reserved probe envelope only while the connection is open; send failures
//! are logged by the shared send path and never stop the timer.

use std::sync::Arc;

use crate::constants::{KEEPALIVE_INTERVAL, KEEPALIVE_ROUTING_KEY};
use crate::envelope::Envelope;

use super::{send_envelope, Shared};

/// Run the keep-alive scheduler. Never returns.
pub(crate) async fn run(shared: Arc<Shared>) {
    // First tick a full period out, matching an auto-repeat timer armed at
    // startup
    let start = tokio::time::Instant::now() + KEEPALIVE_INTERVAL;
    let mut interval = tokio::time::interval_at(start, KEEPALIVE_INTERVAL);

    loop {
        interval.tick().await;
        tick(&shared).await;
    }
}

/// One scheduler tick: probe if and only if the connection is open.
pub(crate) async fn tick(shared: &Shared) {
    if !shared.state.is_open() {
        log::trace!("[PluginSocket] keep-alive skipped; connection not open");
        return;
    }

    let probe = Envelope::keep_alive();
    send_envelope(shared, &probe, KEEPALIVE_ROUTING_KEY).await;
    log::debug!("[PluginSocket] keep-alive probe sent");
}
