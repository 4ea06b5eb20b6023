//! Message envelopes and plugin routing metadata.
//!
//! Every frame exchanged with the backend is a single JSON object: free-form
//! payload fields plus a nested `pluginArg` block carrying the routing keys
//! `name` and `instanceId`. Outbound envelopes always have their routing
//! block rewritten from the sender's arguments - routing fields supplied
//! inside a caller's payload are never trusted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::constants::KEEPALIVE_ROUTING_KEY;

/// JSON key of the nested routing block.
pub const ROUTING_KEY: &str = "pluginArg";

/// Routing keys extracted from an envelope's `pluginArg` block.
///
/// The two fields are independent: an inbound envelope may carry either,
/// both, or neither as a string. Non-string values degrade to `None` field
/// by field rather than invalidating the whole block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingBlock {
    /// Plugin name (shared by every instance of a plugin kind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Plugin instance identifier (one open window).
    #[serde(rename = "instanceId", default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// A single message exchanged over the socket.
///
/// Wraps the parsed JSON object; payload fields and the routing block live
/// side by side, exactly as on the wire. Cloning yields an independent copy,
/// so a handler may retain an envelope beyond its invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    /// Build an outbound envelope from a payload map and routing arguments.
    ///
    /// Ensures a `pluginArg` object exists (replacing any non-object value
    /// the caller supplied) and unconditionally overwrites its `name` and
    /// `instanceId` fields.
    #[must_use]
    pub fn from_payload(payload: Map<String, Value>, name: &str, instance_id: &str) -> Self {
        let mut fields = payload;

        let slot = fields
            .entry(ROUTING_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            // Caller supplied a non-map routing value; replace it wholesale
            *slot = Value::Object(Map::new());
        }
        let routing = slot.as_object_mut().expect("routing block ensured above");
        routing.insert("name".to_string(), Value::String(name.to_string()));
        routing.insert(
            "instanceId".to_string(),
            Value::String(instance_id.to_string()),
        );

        Self { fields }
    }

    /// The reserved keep-alive probe envelope.
    #[must_use]
    pub fn keep_alive() -> Self {
        let mut payload = Map::new();
        payload.insert("arg".to_string(), json!({ "topic": KEEPALIVE_ROUTING_KEY }));
        payload.insert("data".to_string(), Value::String(String::new()));
        Self::from_payload(payload, KEEPALIVE_ROUTING_KEY, KEEPALIVE_ROUTING_KEY)
    }

    /// Parse an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object.
    pub fn parse(text: &str) -> Result<Self> {
        let fields: Map<String, Value> =
            serde_json::from_str(text).context("frame is not a JSON object")?;
        Ok(Self { fields })
    }

    /// Serialize to a single text frame.
    #[must_use]
    pub fn to_frame(&self) -> String {
        serde_json::to_string(&self.fields).expect("envelope serializable")
    }

    /// Whether a `pluginArg` key is present at all, regardless of shape.
    #[must_use]
    pub fn has_routing(&self) -> bool {
        self.fields.contains_key(ROUTING_KEY)
    }

    /// Routing keys, if the `pluginArg` block is an object.
    ///
    /// Returns `None` when the key is absent or not map-shaped; individual
    /// non-string fields inside the block come back as `None` fields.
    #[must_use]
    pub fn routing(&self) -> Option<RoutingBlock> {
        let block = self.fields.get(ROUTING_KEY)?.as_object()?;
        Some(RoutingBlock {
            name: block.get("name").and_then(Value::as_str).map(str::to_owned),
            instance_id: block
                .get("instanceId")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }

    /// All fields of the envelope, routing block included.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up a payload field by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Static plugin metadata.
///
/// Declared by a plugin at construction time and used to key registration
/// and outbound routing. Replaces runtime discovery: a plugin states its
/// identity explicitly instead of the host inspecting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    /// Plugin name, shared by all instances of the plugin kind.
    pub name: String,
    /// Identifier of this plugin instance.
    pub instance_id: String,
    /// Position in the host's plugin listing.
    pub index: Option<u32>,
    /// Host-side grouping category.
    pub category: Option<String>,
    /// Human-readable window title.
    pub title: Option<String>,
    /// Whether the host should allow at most one open instance.
    pub single: bool,
}

impl PluginDescriptor {
    /// Create a descriptor with the two routing keys; metadata fields start
    /// empty.
    pub fn new(name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_id: instance_id.into(),
            index: None,
            category: None,
            title: None,
            single: false,
        }
    }

    /// Set the listing position.
    #[must_use]
    pub fn index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the grouping category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the window title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Mark the plugin as single-instance.
    #[must_use]
    pub fn single_instance(mut self) -> Self {
        self.single = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_routing_injected_into_plain_payload() {
        let envelope = Envelope::from_payload(payload(&[("a", json!(1))]), "p1", "i1");

        let routing = envelope.routing().expect("routing block");
        assert_eq!(routing.name.as_deref(), Some("p1"));
        assert_eq!(routing.instance_id.as_deref(), Some("i1"));
        assert_eq!(envelope.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_routing_overwrites_caller_supplied_block() {
        let envelope = Envelope::from_payload(
            payload(&[
                ("a", json!(1)),
                (
                    ROUTING_KEY,
                    json!({ "name": "spoofed", "instanceId": "spoofed", "extra": true }),
                ),
            ]),
            "p1",
            "i1",
        );

        let routing = envelope.routing().expect("routing block");
        assert_eq!(routing.name.as_deref(), Some("p1"));
        assert_eq!(routing.instance_id.as_deref(), Some("i1"));
        // Other fields of an existing block survive the rewrite
        assert_eq!(envelope.get(ROUTING_KEY).unwrap()["extra"], json!(true));
    }

    #[test]
    fn test_non_object_routing_block_is_replaced() {
        let envelope = Envelope::from_payload(
            payload(&[(ROUTING_KEY, json!("bogus"))]),
            "p1",
            "i1",
        );

        let routing = envelope.routing().expect("routing block");
        assert_eq!(routing.name.as_deref(), Some("p1"));
        assert_eq!(routing.instance_id.as_deref(), Some("i1"));
    }

    #[test]
    fn test_round_trip_preserves_payload_and_routing() {
        let original = Envelope::from_payload(
            payload(&[("startDate", json!("20250801")), ("endDate", json!("20250807"))]),
            "Exchange_rate",
            "instance-7",
        );

        let decoded = Envelope::parse(&original.to_frame()).expect("parse own frame");
        assert_eq!(decoded, original);

        // Re-encoding is idempotent
        let reencoded = Envelope::parse(&decoded.to_frame()).expect("parse again");
        assert_eq!(reencoded, original);
    }

    #[test]
    fn test_parse_rejects_non_object_frames() {
        assert!(Envelope::parse("[1, 2, 3]").is_err());
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse("\"string\"").is_err());
    }

    #[test]
    fn test_routing_absent() {
        let envelope = Envelope::parse(r#"{ "data": [] }"#).unwrap();
        assert!(!envelope.has_routing());
        assert!(envelope.routing().is_none());
    }

    #[test]
    fn test_routing_present_but_not_object() {
        let envelope = Envelope::parse(r#"{ "pluginArg": 42 }"#).unwrap();
        assert!(envelope.has_routing());
        assert!(envelope.routing().is_none());
    }

    #[test]
    fn test_routing_fields_degrade_individually() {
        let envelope =
            Envelope::parse(r#"{ "pluginArg": { "name": 5, "instanceId": "i1" } }"#).unwrap();
        let routing = envelope.routing().expect("routing block");
        assert!(routing.name.is_none());
        assert_eq!(routing.instance_id.as_deref(), Some("i1"));
    }

    #[test]
    fn test_keep_alive_shape() {
        let probe = Envelope::keep_alive();

        let routing = probe.routing().expect("routing block");
        assert_eq!(routing.name.as_deref(), Some("ping"));
        assert_eq!(routing.instance_id.as_deref(), Some("ping"));
        assert_eq!(probe.get("arg"), Some(&json!({ "topic": "ping" })));
        assert_eq!(probe.get("data"), Some(&json!("")));
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = PluginDescriptor::new("Exchange_rate", "instance-2")
            .index(2)
            .category("markets")
            .title("HK exchange rate history")
            .single_instance();

        assert_eq!(descriptor.name, "Exchange_rate");
        assert_eq!(descriptor.instance_id, "instance-2");
        assert_eq!(descriptor.index, Some(2));
        assert!(descriptor.single);
    }
}
