//! Application-wide constants for antlink.
//!
//! This module centralizes the timing and size magic numbers of the socket
//! client. Constants are grouped by domain with documentation explaining
//! their purpose.
//!
//! # Categories
//!
//! - **Timeouts**: per-operation network timeouts
//! - **Scheduling**: reconnection and keep-alive cadence
//! - **Wire**: endpoint and frame-size parameters

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for a single WebSocket connection attempt.
///
/// The backend is expected on a local or near-local network, so a couple of
/// seconds is enough to distinguish "down" from "slow". A failed attempt is
/// retried by the receive loop, never surfaced to the caller.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for writing a single outbound frame.
///
/// Bounds how long a caller can be suspended in `send` when the connection
/// has silently stalled. On expiry the frame is dropped and logged.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Scheduling
// ============================================================================

/// Delay between reconnection attempts in the receive loop.
///
/// Flat, not exponential: the backend is a fixed peer and there is exactly
/// one client loop retrying, so a constant cadence is sufficient.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

/// Period of the keep-alive probe scheduler.
///
/// Matches the backend's idle-connection window. The scheduler is started
/// once per process and checks connection state on every tick.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Wire
// ============================================================================

/// Upper bound on a single inbound message.
///
/// Applied through the transport's message-size limit; larger frames are
/// rejected by the protocol layer instead of growing the read buffer.
pub const MAX_INBOUND_MESSAGE_BYTES: usize = 512 * 1024;

/// WebSocket endpoint path on the backend.
pub const WS_PATH: &str = "/ws";

/// Static query-string token expected by the backend.
///
/// No rotation or negotiation; the backend treats it as a shared secret.
pub const WS_TOKEN: &str = "token123";

/// Reserved routing key for keep-alive probes.
///
/// Used as both the plugin name and the instance id of probe envelopes so
/// the backend can recognize them without a registered plugin.
pub const KEEPALIVE_ROUTING_KEY: &str = "ping";

/// Default location of the tools configuration document, relative to the
/// process working directory.
pub const DEFAULT_CONFIG_PATH: &str = "Config/tools_config.json";
