//! Plugin socket client.
//!
//! One shared WebSocket connection to the Ant backend carries the traffic of
//! every open UI plugin. The client owns the connection lifecycle and routes
//! inbound envelopes to handlers registered by plugin name or instance id.
//!
//! # Architecture
//!
//! ```text
//! PluginSocket (cloneable handle)
//!     ├── SharedConnectionState (atomic, pure queries)
//!     ├── ConnectionSlot (guarded write half, generation counter)
//!     ├── HandlerRegistry (by name / by instance id)
//!     ├── receive loop task (drain → dispatch, reconnect with flat backoff)
//!     └── keep-alive task (30s probe while open)
//! ```
//!
//! # Delivery contract
//!
//! Sends are fire-and-forget: a send while disconnected, a timeout, or a
//! protocol error is logged and the call returns normally. Callers that need
//! delivery confirmation must build it into their own payloads.
//!
//! Handlers run synchronously on the receive loop, so frames are dispatched
//! strictly in arrival order and a slow handler delays the frames behind it.
//! This stall is accepted; handlers are expected to hand heavy work off.

pub(crate) mod conn;
pub(crate) mod keepalive;
pub(crate) mod recv;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::Config;
use crate::constants::SEND_TIMEOUT;
use crate::envelope::{Envelope, PluginDescriptor};
use crate::registry::HandlerRegistry;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No usable connection.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and ready for traffic.
    Open,
    /// A graceful close handshake is in progress.
    Closing,
}

impl ConnectionState {
    /// Whether the connection is worth a graceful close before discarding.
    pub(crate) fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::Closing)
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Open => 2,
            Self::Closing => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closing,
            _ => Self::Disconnected,
        }
    }
}

/// Connection state cell shared between the handle and the background tasks.
///
/// Atomic so state queries stay pure and synchronous.
#[derive(Debug, Default)]
pub(crate) struct SharedConnectionState {
    state: AtomicU8,
}

impl SharedConnectionState {
    /// Get the current state.
    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Set the state.
    pub(crate) fn set(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Check if the connection is open.
    pub(crate) fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }
}

/// State shared between the handle and the background tasks.
pub(crate) struct Shared {
    config: Config,
    state: SharedConnectionState,
    slot: conn::ConnectionSlot,
    registry: HandlerRegistry,
    started: AtomicBool,
}

/// Handle to the plugin socket client.
///
/// Cheap to clone; every clone talks to the same connection and registry.
#[derive(Clone)]
pub struct PluginSocket {
    shared: Arc<Shared>,
}

impl PluginSocket {
    /// Create a client from configuration. No I/O happens until [`start`].
    ///
    /// [`start`]: PluginSocket::start
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: SharedConnectionState::default(),
                slot: conn::ConnectionSlot::new(),
                registry: HandlerRegistry::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Start the client: one connect attempt, then the background tasks.
    ///
    /// Idempotent - repeated calls are no-ops. A failed initial connect is
    /// logged, not returned; the receive loop keeps retrying on its flat
    /// backoff until the backend answers.
    pub async fn start(&self) {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            log::debug!("[PluginSocket] start() called again; already running");
            return;
        }

        conn::connect(&self.shared).await;

        tokio::spawn(recv::run(Arc::clone(&self.shared)));
        tokio::spawn(keepalive::run(Arc::clone(&self.shared)));
    }

    /// Whether the connection is currently open. Pure query.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.state.is_open()
    }

    /// Send a payload to the backend, routed as the given plugin.
    ///
    /// The payload's `pluginArg` block is unconditionally rewritten with
    /// `name` and `instance_id`. Fire-and-forget: when the connection is not
    /// open, or the write fails or times out, the problem is logged and the
    /// call returns normally.
    pub async fn send(&self, name: &str, instance_id: &str, payload: Map<String, Value>) {
        if !self.is_connected() {
            log::warn!(
                "[PluginSocket] not connected ({:?}); dropping send for plugin '{name}'",
                self.shared.state.get()
            );
            return;
        }

        let envelope = Envelope::from_payload(payload, name, instance_id);
        send_envelope(&self.shared, &envelope, name).await;
    }

    /// [`send`] keyed by a plugin descriptor.
    ///
    /// [`send`]: PluginSocket::send
    pub async fn send_as(&self, descriptor: &PluginDescriptor, payload: Map<String, Value>) {
        self.send(&descriptor.name, &descriptor.instance_id, payload)
            .await;
    }

    /// Register a handler for every envelope routed to a plugin name.
    ///
    /// Last registration for a key wins. The handler receives an independent
    /// copy of each envelope; an `Err` return is logged and isolated to that
    /// message.
    pub fn register_by_name<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared.registry.register_name(name, Arc::new(handler));
    }

    /// Register a handler for every envelope routed to a plugin instance id.
    pub fn register_by_instance_id<F>(&self, instance_id: impl Into<String>, handler: F)
    where
        F: Fn(Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared
            .registry
            .register_instance(instance_id, Arc::new(handler));
    }

    /// Register a handler under a descriptor's plugin name.
    pub fn register<F>(&self, descriptor: &PluginDescriptor, handler: F)
    where
        F: Fn(Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_by_name(descriptor.name.clone(), handler);
    }

    /// Remove the handler for a plugin name.
    ///
    /// Returns `true` if a handler was registered under the key.
    pub fn unregister_by_name(&self, name: &str) -> bool {
        self.shared.registry.unregister_name(name)
    }

    /// Remove the handler for a plugin instance id.
    ///
    /// Returns `true` if a handler was registered under the key.
    pub fn unregister_by_instance_id(&self, instance_id: &str) -> bool {
        self.shared.registry.unregister_instance(instance_id)
    }
}

impl std::fmt::Debug for PluginSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSocket")
            .field("state", &self.shared.state.get())
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}

/// Write one envelope to the connection, bounded by the send timeout.
///
/// Shared by user sends and keep-alive probes. Every failure mode is logged
/// with distinguishing detail and swallowed.
pub(crate) async fn send_envelope(shared: &Shared, envelope: &Envelope, label: &str) {
    let frame = envelope.to_frame();

    let mut guard = shared.slot.writer().lock().await;
    let Some(writer) = guard.as_mut() else {
        log::warn!("[PluginSocket] connection handle gone; dropping frame for '{label}'");
        return;
    };

    match tokio::time::timeout(SEND_TIMEOUT, writer.send_text(&frame)).await {
        Ok(Ok(())) => {
            log::debug!(
                "[PluginSocket] sent frame for '{label}' ({} bytes)",
                frame.len()
            );
        }
        Ok(Err(e)) => log::warn!("[PluginSocket] send for '{label}' failed: {e:#}"),
        Err(_) => log::warn!(
            "[PluginSocket] send for '{label}' timed out after {}s",
            SEND_TIMEOUT.as_secs()
        ),
    }
}
