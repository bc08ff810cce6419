use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Message kinds exchanged between realms.
///
/// Serialized as `CHIRP_URLS` / `THUMBNAIL_DATA` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Injected realm asks for a thumbnail; payload is a list of URL entities
    ChirpUrls,
    /// Content realm answers with provider data; payload is opaque
    ThumbnailData,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::ChirpUrls => "CHIRP_URLS",
            MessageType::ThumbnailData => "THUMBNAIL_DATA",
        }
    }

    /// Parses the wire name; unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "CHIRP_URLS" => Some(MessageType::ChirpUrls),
            "THUMBNAIL_DATA" => Some(MessageType::ThumbnailData),
            _ => None,
        }
    }

    /// Whether an envelope of this kind is only meaningful with a correlation hash.
    pub fn requires_hash(self) -> bool {
        match self {
            MessageType::ChirpUrls | MessageType::ThumbnailData => true,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Realm that produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Origin {
    /// Privileged content-script realm
    Content,
    /// Page-injected realm
    Inject,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Content => "CONTENT",
            Origin::Inject => "INJECT",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing and correlation metadata carried by every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub origin: Origin,
    /// Correlation token; `None` marks a fire-and-forget message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Unit crossing the transport boundary.
///
/// ```
/// use btd_core::{MessageEnvelope, MessageType, Origin};
/// use serde_json::json;
///
/// let env = MessageEnvelope::new(
///     MessageType::ThumbnailData,
///     json!({"title": "a"}),
///     Origin::Content,
///     Some("abc123".to_string()),
/// );
/// let frame = env.encode().unwrap();
/// let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
/// assert_eq!(value["type"], "THUMBNAIL_DATA");
/// assert_eq!(value["meta"]["origin"], "CONTENT");
/// assert_eq!(value["meta"]["hash"], "abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope<T = Value> {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub payload: T,
    pub meta: Meta,
}

impl<T: Serialize> MessageEnvelope<T> {
    pub fn new(kind: MessageType, payload: T, origin: Origin, hash: Option<String>) -> Self {
        Self {
            kind,
            payload,
            meta: Meta { origin, hash },
        }
    }

    /// Serializes the envelope into a text frame for the transport.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One URL of a chirp as the host application describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntity {
    pub expanded_url: String,
    #[serde(rename = "isUrlForAttachment")]
    pub is_url_for_attachment: bool,
}

impl UrlEntity {
    pub fn new(expanded_url: impl Into<String>, is_url_for_attachment: bool) -> Self {
        Self {
            expanded_url: expanded_url.into(),
            is_url_for_attachment,
        }
    }

    /// Reads an entity out of untyped page data.
    ///
    /// Returns `None` unless the value is an object with a non-empty string
    /// `expanded_url` and a boolean `isUrlForAttachment`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let entity: UrlEntity = serde_json::from_value(value.clone()).ok()?;
        if entity.expanded_url.is_empty() {
            return None;
        }
        Some(entity)
    }

    /// Well-formed entities that are not attachments may get a thumbnail.
    pub fn is_eligible(&self) -> bool {
        !self.is_url_for_attachment && !self.expanded_url.is_empty()
    }
}

/// Opaque provider output; the bus never looks inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThumbnailData(pub Value);

impl From<Value> for ThumbnailData {
    fn from(value: Value) -> Self {
        ThumbnailData(value)
    }
}

/// Typed body of a validated inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Raw URL entities; each element is validated individually downstream
    ChirpUrls(Vec<Value>),
    ThumbnailData(ThumbnailData),
}

impl MessageBody {
    pub fn kind(&self) -> MessageType {
        match self {
            MessageBody::ChirpUrls(_) => MessageType::ChirpUrls,
            MessageBody::ThumbnailData(_) => MessageType::ThumbnailData,
        }
    }
}

/// Envelope that passed boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub origin: Origin,
    pub hash: Option<String>,
    pub body: MessageBody,
}

impl InboundMessage {
    pub fn kind(&self) -> MessageType {
        self.body.kind()
    }

    /// Validates a text frame into the closed set of known messages.
    pub fn decode(frame: &str) -> std::result::Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(frame).map_err(|_| DecodeError::Malformed)?;
        let obj = value.as_object().ok_or(DecodeError::Malformed)?;

        let type_name = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::Malformed)?;
        let kind = MessageType::from_wire(type_name)
            .ok_or_else(|| DecodeError::UnknownType(type_name.to_string()))?;

        let meta = obj
            .get("meta")
            .and_then(Value::as_object)
            .ok_or(DecodeError::MissingMeta)?;
        let origin = meta
            .get("origin")
            .cloned()
            .and_then(|o| serde_json::from_value::<Origin>(o).ok())
            .ok_or(DecodeError::UnknownOrigin)?;
        let hash = meta
            .get("hash")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .map(str::to_string);

        if kind.requires_hash() && hash.is_none() {
            return Err(DecodeError::MissingHash(kind));
        }

        let payload = obj.get("payload").cloned().unwrap_or(Value::Null);
        let body = match kind {
            MessageType::ChirpUrls => match payload {
                Value::Array(items) => MessageBody::ChirpUrls(items),
                _ => return Err(DecodeError::InvalidPayload(kind)),
            },
            MessageType::ThumbnailData => MessageBody::ThumbnailData(ThumbnailData(payload)),
        };

        Ok(Self { origin, hash, body })
    }
}

/// Reasons a frame is rejected at the boundary. Never surfaced to a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Malformed,
    UnknownType(String),
    MissingMeta,
    UnknownOrigin,
    MissingHash(MessageType),
    InvalidPayload(MessageType),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed => write!(f, "malformed frame"),
            DecodeError::UnknownType(t) => write!(f, "unknown message type {t}"),
            DecodeError::MissingMeta => write!(f, "missing meta"),
            DecodeError::UnknownOrigin => write!(f, "unknown origin"),
            DecodeError::MissingHash(k) => write!(f, "{k} without hash"),
            DecodeError::InvalidPayload(k) => write!(f, "invalid {k} payload"),
        }
    }
}

impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_chirp_urls() {
        let frame = json!({
            "type": "CHIRP_URLS",
            "payload": [{"expanded_url": "https://example.com/a", "isUrlForAttachment": false}],
            "meta": {"origin": "INJECT", "hash": "abc123"}
        })
        .to_string();

        let msg = InboundMessage::decode(&frame).unwrap();
        assert_eq!(msg.origin, Origin::Inject);
        assert_eq!(msg.hash.as_deref(), Some("abc123"));
        assert_eq!(msg.kind(), MessageType::ChirpUrls);
        match msg.body {
            MessageBody::ChirpUrls(items) => assert_eq!(items.len(), 1),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let frame = json!({
            "type": "SETTINGS_CHANGED",
            "payload": {},
            "meta": {"origin": "INJECT", "hash": "h"}
        })
        .to_string();
        assert_eq!(
            InboundMessage::decode(&frame),
            Err(DecodeError::UnknownType("SETTINGS_CHANGED".to_string()))
        );
    }

    #[test]
    fn test_decode_rejects_missing_hash() {
        let no_hash = json!({"type": "CHIRP_URLS", "payload": [], "meta": {"origin": "INJECT"}});
        assert_eq!(
            InboundMessage::decode(&no_hash.to_string()),
            Err(DecodeError::MissingHash(MessageType::ChirpUrls))
        );

        let empty_hash = json!({"type": "CHIRP_URLS", "payload": [], "meta": {"origin": "INJECT", "hash": ""}});
        assert_eq!(
            InboundMessage::decode(&empty_hash.to_string()),
            Err(DecodeError::MissingHash(MessageType::ChirpUrls))
        );
    }

    #[test]
    fn test_decode_rejects_missing_meta_and_garbage() {
        let frame = json!({"type": "THUMBNAIL_DATA", "payload": {}}).to_string();
        assert_eq!(InboundMessage::decode(&frame), Err(DecodeError::MissingMeta));
        assert_eq!(InboundMessage::decode("not json"), Err(DecodeError::Malformed));
        assert_eq!(InboundMessage::decode("[1,2]"), Err(DecodeError::Malformed));
    }

    #[test]
    fn test_decode_rejects_non_array_chirp_payload() {
        let frame = json!({
            "type": "CHIRP_URLS",
            "payload": {"expanded_url": "https://example.com"},
            "meta": {"origin": "INJECT", "hash": "h"}
        })
        .to_string();
        assert_eq!(
            InboundMessage::decode(&frame),
            Err(DecodeError::InvalidPayload(MessageType::ChirpUrls))
        );
    }

    #[test]
    fn test_decode_rejects_unknown_origin() {
        let frame = json!({
            "type": "THUMBNAIL_DATA",
            "payload": null,
            "meta": {"origin": "BACKGROUND", "hash": "h"}
        })
        .to_string();
        assert_eq!(InboundMessage::decode(&frame), Err(DecodeError::UnknownOrigin));
    }

    #[test]
    fn test_fire_and_forget_omits_hash_on_wire() {
        let env = MessageEnvelope::new(MessageType::ChirpUrls, json!([]), Origin::Inject, None);
        let value: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert!(value["meta"].get("hash").is_none());
    }

    #[test]
    fn test_url_entity_from_value() {
        let ok = json!({"expanded_url": "https://example.com/a", "isUrlForAttachment": false});
        assert_eq!(
            UrlEntity::from_value(&ok),
            Some(UrlEntity::new("https://example.com/a", false))
        );

        assert_eq!(UrlEntity::from_value(&json!("https://example.com")), None);
        assert_eq!(UrlEntity::from_value(&json!({"expanded_url": "https://x"})), None);
        assert_eq!(
            UrlEntity::from_value(&json!({"expanded_url": "", "isUrlForAttachment": false})),
            None
        );
        assert_eq!(
            UrlEntity::from_value(&json!({"expanded_url": 5, "isUrlForAttachment": false})),
            None
        );
    }
}
