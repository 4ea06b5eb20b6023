//! Antlink CLI - exercise the plugin socket from a terminal.
//!
//! `listen` registers handlers for a plugin and prints every envelope routed
//! to it; `send` fires one payload at the backend. Both stand in for a UI
//! plugin window during backend development.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use antlink::constants::DEFAULT_CONFIG_PATH;
use antlink::{Config, Envelope, PluginDescriptor, PluginSocket};

#[derive(Parser)]
#[command(name = "antlink", about = "Plugin relay client for the Ant backend", version)]
struct Cli {
    /// Path to the tools configuration document.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Subscribe to a plugin's traffic and print each envelope.
    Listen {
        /// Plugin name to register under.
        #[arg(long)]
        name: String,
        /// Plugin instance id; generated when omitted.
        #[arg(long)]
        instance_id: Option<String>,
    },
    /// Send a single payload to the backend, routed as the given plugin.
    Send {
        /// Plugin name to route as.
        #[arg(long)]
        name: String,
        /// Plugin instance id; generated when omitted.
        #[arg(long)]
        instance_id: Option<String>,
        /// JSON object used as the payload map.
        #[arg(long, default_value = "{}")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::load(DEFAULT_CONFIG_PATH),
    };
    if config.base_url().is_none() {
        log::warn!("no AntBaseUrl configured; connection attempts will fail until one is set");
    }

    let socket = PluginSocket::new(config);

    match cli.command {
        Command::Listen { name, instance_id } => {
            let instance_id = instance_id.unwrap_or_else(new_instance_id);
            let descriptor = PluginDescriptor::new(name, instance_id).title("antlink listener");
            println!(
                "listening as plugin '{}' (instance {})",
                descriptor.name, descriptor.instance_id
            );

            socket.register(&descriptor, print_envelope);
            socket.register_by_instance_id(&descriptor.instance_id, print_envelope);

            socket.start().await;
            tokio::signal::ctrl_c()
                .await
                .context("failed to wait for ctrl-c")?;
            println!("shutting down");
        }
        Command::Send {
            name,
            instance_id,
            payload,
        } => {
            let payload: Map<String, Value> =
                serde_json::from_str(&payload).context("--payload must be a JSON object")?;
            let instance_id = instance_id.unwrap_or_else(new_instance_id);
            let descriptor = PluginDescriptor::new(name, instance_id);

            socket.start().await;
            wait_connected(&socket).await?;
            socket.send_as(&descriptor, payload).await;
            println!(
                "sent payload as plugin '{}' (instance {})",
                descriptor.name, descriptor.instance_id
            );
        }
    }

    Ok(())
}

fn new_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn print_envelope(envelope: Envelope) -> Result<()> {
    let pretty = serde_json::to_string_pretty(envelope.fields())?;
    println!("{pretty}");
    Ok(())
}

/// Wait for the socket to come up, long enough to cover a full reconnect
/// cycle.
async fn wait_connected(socket: &PluginSocket) -> Result<()> {
    for _ in 0..60 {
        if socket.is_connected() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    bail!("could not connect to the backend; check WebSocketClient.AntBaseUrl")
}
