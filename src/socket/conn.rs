//! Connection slot and (re)connect procedures.
//!
//! The write half of the connection is the one resource shared between
//! concurrent senders, the keep-alive task, and the receive loop's pong
//! replies. It lives behind a mutex so a handle replacement during
//! reconnection is never observed half-done. The read half is handed to the
//! receive loop exactly once per connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;

use crate::constants::CONNECT_TIMEOUT;
use crate::ws::{self, WsReader, WsWriter};

use super::{ConnectionState, Shared};

/// Holder of the current connection's halves.
///
/// The generation counter increments on every install, making each fresh
/// connection observably distinct from its predecessor.
pub(crate) struct ConnectionSlot {
    writer: Mutex<Option<WsWriter>>,
    pending_reader: StdMutex<Option<WsReader>>,
    generation: AtomicU64,
}

impl ConnectionSlot {
    pub(crate) fn new() -> Self {
        Self {
            writer: Mutex::new(None),
            pending_reader: StdMutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// The guarded write half. `None` while disconnected.
    pub(crate) fn writer(&self) -> &Mutex<Option<WsWriter>> {
        &self.writer
    }

    /// Install a freshly connected pair, bumping the generation.
    async fn install(&self, writer: WsWriter, reader: WsReader) -> u64 {
        *self.writer.lock().await = Some(writer);
        *self
            .pending_reader
            .lock()
            .expect("reader slot poisoned") = Some(reader);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Claim the read half of the most recent connection, if unclaimed.
    pub(crate) fn take_reader(&self) -> Option<WsReader> {
        self.pending_reader
            .lock()
            .expect("reader slot poisoned")
            .take()
    }

    /// Remove both halves, returning the write half for a graceful close.
    pub(crate) async fn discard(&self) -> Option<WsWriter> {
        self.pending_reader
            .lock()
            .expect("reader slot poisoned")
            .take();
        self.writer.lock().await.take()
    }

    /// Number of connections installed so far.
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Attempt a single connection, bounded by [`CONNECT_TIMEOUT`].
///
/// Resolves the target from configuration; no configured base URL fails the
/// attempt. Returns `true` when the connection is open afterwards. Failures
/// are logged, never propagated.
pub(crate) async fn connect(shared: &Shared) -> bool {
    let Some(base_url) = shared.config.base_url() else {
        log::warn!("[PluginSocket] no AntBaseUrl configured; connect attempt failed");
        shared.state.set(ConnectionState::Disconnected);
        return false;
    };

    let url = ws::endpoint(base_url);
    shared.state.set(ConnectionState::Connecting);
    log::info!("[PluginSocket] connecting to {url}");

    match tokio::time::timeout(CONNECT_TIMEOUT, ws::connect(&url)).await {
        Ok(Ok((writer, reader))) => {
            let generation = shared.slot.install(writer, reader).await;
            shared.state.set(ConnectionState::Open);
            log::info!("[PluginSocket] connected (generation {generation})");
            true
        }
        Ok(Err(e)) => {
            log::warn!("[PluginSocket] connect failed: {e:#}");
            shared.state.set(ConnectionState::Disconnected);
            false
        }
        Err(_) => {
            log::warn!(
                "[PluginSocket] connect timed out after {}s",
                CONNECT_TIMEOUT.as_secs()
            );
            shared.state.set(ConnectionState::Disconnected);
            false
        }
    }
}

/// Tear down whatever connection exists and attempt a fresh one.
///
/// An open or closing connection gets a graceful close first; a dead one is
/// simply discarded. Every failure along the way is logged and swallowed -
/// the receive loop retries after its backoff.
pub(crate) async fn reconnect(shared: &Shared) {
    log::info!("[PluginSocket] reconnecting");

    let previous = shared.slot.discard().await;
    if let Some(mut writer) = previous {
        if shared.state.get().is_active() {
            shared.state.set(ConnectionState::Closing);
            if let Err(e) = writer.close().await {
                log::debug!("[PluginSocket] graceful close during reconnect failed: {e:#}");
            }
        }
        // Dead handles are dropped without ceremony
    }
    shared.state.set(ConnectionState::Disconnected);

    connect(shared).await;
}
