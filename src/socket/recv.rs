//! Receive loop: inbound frame draining and handler dispatch.
//!
//! One long-lived task drains the connection for the life of the process.
//! While disconnected it runs the reconnection procedure on a flat backoff;
//! while connected it parses each text frame and dispatches it through the
//! registry's two keyspaces. A message matching both a name and an instance
//! registration invokes both handlers, name first.

use std::sync::Arc;

use crate::constants::RECONNECT_BACKOFF;
use crate::envelope::Envelope;
use crate::registry::{Handler, HandlerRegistry};
use crate::ws::WsFrame;

use super::{conn, ConnectionState, Shared};

/// Run the receive loop. Never returns.
pub(crate) async fn run(shared: Arc<Shared>) {
    let mut reader = shared.slot.take_reader();

    loop {
        if !shared.state.is_open() || reader.is_none() {
            conn::reconnect(&shared).await;
            reader = shared.slot.take_reader();
            log::info!(
                "[PluginSocket] next receive attempt in {}s",
                RECONNECT_BACKOFF.as_secs()
            );
            tokio::time::sleep(RECONNECT_BACKOFF).await;
            continue;
        }

        let frame = reader.as_mut().expect("reader checked above").recv().await;
        match frame {
            Some(Ok(WsFrame::Text(text))) => dispatch_frame(&shared.registry, &text),
            Some(Ok(WsFrame::Ping(data))) => {
                let mut guard = shared.slot.writer().lock().await;
                if let Some(writer) = guard.as_mut() {
                    if let Err(e) = writer.send_pong(data).await {
                        log::debug!("[PluginSocket] pong failed: {e:#}");
                    }
                }
            }
            Some(Ok(WsFrame::Pong(_))) | Some(Ok(WsFrame::Binary(_))) => {}
            Some(Ok(WsFrame::Close { code, reason })) => {
                // Server-initiated close feeds the same reconnection path as
                // a dropped connection
                log::info!(
                    "[PluginSocket] server closed the connection (code={code}, reason={reason:?})"
                );
                reader = None;
                shared.state.set(ConnectionState::Disconnected);
            }
            Some(Err(e)) => {
                log::warn!("[PluginSocket] receive error: {e:#}");
                reader = None;
                shared.state.set(ConnectionState::Disconnected);
            }
            None => {
                log::info!("[PluginSocket] stream ended");
                reader = None;
                shared.state.set(ConnectionState::Disconnected);
            }
        }
    }
}

/// Decode one text frame and dispatch it to matching handlers.
///
/// Undecodable frames and frames without a routing block are logged and
/// dropped; neither stops the loop.
fn dispatch_frame(registry: &HandlerRegistry, text: &str) {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::warn!("[PluginSocket] dropping undecodable frame: {e:#}");
            return;
        }
    };

    if !envelope.has_routing() {
        log::debug!("[PluginSocket] dropping frame without a routing block");
        return;
    }
    let routing = envelope.routing().unwrap_or_default();

    if let Some(name) = routing.name.as_deref() {
        match registry.name_handler(name) {
            Some(handler) => invoke(&handler, envelope.clone(), "plugin name", name),
            None => log::debug!("[PluginSocket] no handler registered for plugin name '{name}'"),
        }
    }

    // Independent of the name lookup: both handlers may fire for one frame
    if let Some(instance_id) = routing.instance_id.as_deref() {
        if let Some(handler) = registry.instance_handler(instance_id) {
            invoke(&handler, envelope.clone(), "instance id", instance_id);
        }
    }
}

/// Invoke one handler, isolating its failure to this message.
fn invoke(handler: &Handler, envelope: Envelope, keyspace: &str, key: &str) {
    if let Err(e) = handler(envelope) {
        log::warn!("[PluginSocket] handler for {keyspace} '{key}' failed: {e:#}");
    }
}
