use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a signed token.
///
/// JWT payloads are usually JSON objects, but the compact format also
/// allows an arbitrary string body. Downstream consumers match on the
/// variant instead of shape-checking a dynamic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Claims(Map<String, Value>),
    Text(String),
}

impl Payload {
    /// Build a payload from a JSON value. Objects become [`Payload::Claims`],
    /// strings become [`Payload::Text`], anything else is `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::Claims(map)),
            Value::String(s) => Some(Self::Text(s)),
            _ => None,
        }
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Claims(map) => map.get(name),
            Self::Text(_) => None,
        }
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claim("iss").and_then(Value::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.claim("sub").and_then(Value::as_str)
    }

    /// `aud` may be a single string or an array of strings; callers that
    /// care about the distinction get the raw value.
    pub fn audience(&self) -> Option<&Value> {
        self.claim("aud")
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.claim("exp").and_then(Value::as_i64)
    }

    pub fn not_before(&self) -> Option<i64> {
        self.claim("nbf").and_then(Value::as_i64)
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.claim("iat").and_then(Value::as_i64)
    }

    pub fn jwt_id(&self) -> Option<&str> {
        self.claim("jti").and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self::Claims(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reserved_claim_accessors() {
        let payload = Payload::from_value(json!({
            "iss": "issuer-1",
            "sub": "user-42",
            "exp": 1_900_000_000,
            "nbf": 1_800_000_000,
            "iat": 1_800_000_000,
            "jti": "id-1",
            "role": "admin",
        }))
        .unwrap();

        assert_eq!(payload.issuer(), Some("issuer-1"));
        assert_eq!(payload.subject(), Some("user-42"));
        assert_eq!(payload.expires_at(), Some(1_900_000_000));
        assert_eq!(payload.not_before(), Some(1_800_000_000));
        assert_eq!(payload.issued_at(), Some(1_800_000_000));
        assert_eq!(payload.jwt_id(), Some("id-1"));
        assert_eq!(payload.claim("role"), Some(&json!("admin")));
        assert_eq!(payload.claim("missing"), None);
    }

    #[test]
    fn text_payload_has_no_claims() {
        let payload = Payload::Text("raw-subject".to_string());
        assert_eq!(payload.subject(), None);
        assert_eq!(payload.claim("sub"), None);
    }

    #[test]
    fn untagged_serde_round_trip() {
        let claims = Payload::from_value(json!({"sub": "a"})).unwrap();
        let text = Payload::Text("hello".to_string());

        let claims_json = serde_json::to_value(&claims).unwrap();
        let text_json = serde_json::to_value(&text).unwrap();
        assert!(claims_json.is_object());
        assert!(text_json.is_string());

        assert_eq!(serde_json::from_value::<Payload>(claims_json).unwrap(), claims);
        assert_eq!(serde_json::from_value::<Payload>(text_json).unwrap(), text);
    }

    #[test]
    fn from_value_rejects_non_object_non_string() {
        assert_eq!(Payload::from_value(json!(42)), None);
        assert_eq!(Payload::from_value(json!([1, 2])), None);
    }
}
