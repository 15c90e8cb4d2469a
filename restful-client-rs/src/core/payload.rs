//! Request body encoding

use serde::Serialize;
use serde_json::Value;

use super::Headers;
use crate::error::Result;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_JSON: &str = "application/json";

/// Body of an outbound request
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// No body at all
    #[default]
    None,

    /// Bytes sent exactly as given, e.g. an already serialized JSON string
    Raw(Vec<u8>),

    /// Structured value serialized to JSON before sending
    Json(Value),
}

impl Payload {
    /// Serialize any `Serialize` value into a structured payload
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<String> for Payload {
    fn from(body: String) -> Self {
        Payload::Raw(body.into_bytes())
    }
}

impl From<&str> for Payload {
    fn from(body: &str) -> Self {
        Payload::Raw(body.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(body: Vec<u8>) -> Self {
        Payload::Raw(body)
    }
}

/// Turn a payload into wire bytes plus the headers it implies.
///
/// Structured payloads get `Content-Type: application/json` unless
/// `custom_headers` already carries one; custom headers are merged last so
/// they always win. An empty object still serializes to `{}`.
pub fn prepare_body(payload: &Payload, custom_headers: &Headers) -> Result<(Headers, Option<Vec<u8>>)> {
    let mut headers = Headers::new();

    let body = match payload {
        Payload::None => None,
        Payload::Raw(bytes) => Some(bytes.clone()),
        Payload::Json(value) => {
            headers.insert(CONTENT_TYPE, APPLICATION_JSON);
            Some(serde_json::to_vec(value)?)
        }
    };

    headers.merge(custom_headers);

    Ok((headers, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_payload_gets_json_content_type() {
        let (headers, body) = prepare_body(&json!({"a": 1}).into(), &Headers::new()).unwrap();

        assert_eq!(headers.get(CONTENT_TYPE), Some(APPLICATION_JSON));
        assert_eq!(body.unwrap(), br#"{"a":1}"#.to_vec());
    }

    #[test]
    fn test_raw_payload_passes_through() {
        let (headers, body) = prepare_body(&"already-json-string".into(), &Headers::new()).unwrap();

        assert!(headers.is_empty());
        assert_eq!(body.unwrap(), b"already-json-string".to_vec());
    }

    #[test]
    fn test_custom_content_type_wins() {
        let custom = Headers::new().with(CONTENT_TYPE, "application/vnd.api+json");
        let (headers, _) = prepare_body(&json!({"a": 1}).into(), &custom).unwrap();

        assert_eq!(headers.get(CONTENT_TYPE), Some("application/vnd.api+json"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_empty_object_still_serialized() {
        let (headers, body) = prepare_body(&json!({}).into(), &Headers::new()).unwrap();

        assert_eq!(headers.get(CONTENT_TYPE), Some(APPLICATION_JSON));
        assert_eq!(body.unwrap(), b"{}".to_vec());
    }

    #[test]
    fn test_no_payload_no_body() {
        let custom = Headers::new().with("moshe", "OH MY GOD ~!!");
        let (headers, body) = prepare_body(&Payload::None, &custom).unwrap();

        assert!(body.is_none());
        assert_eq!(headers.get("moshe"), Some("OH MY GOD ~!!"));
    }
}
