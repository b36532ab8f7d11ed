//! User identity derived from init data.

use crate::auth::init_data::InitData;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Identifier of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserId {
    /// Telegram user id from signed init data.
    Telegram(i64),
    /// Telegram client without init data.
    Anonymous,
    /// Public mode; nothing was verified.
    Public,
}

impl UserId {
    pub fn telegram_id(&self) -> Option<i64> {
        match self {
            UserId::Telegram(id) => Some(*id),
            UserId::Anonymous | UserId::Public => None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Telegram(id) => write!(f, "{}", id),
            UserId::Anonymous => f.write_str("anonymous"),
            UserId::Public => f.write_str("public"),
        }
    }
}

/// Numeric ids serialize as numbers, sentinels as strings.
impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UserId::Telegram(id) => serializer.serialize_i64(*id),
            UserId::Anonymous => serializer.serialize_str("anonymous"),
            UserId::Public => serializer.serialize_str("public"),
        }
    }
}

/// Who is calling. Never persisted by the gate itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    #[serde(rename = "user_id")]
    pub id: UserId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

impl UserIdentity {
    fn bare(id: UserId) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            language_code: None,
        }
    }

    pub fn telegram(id: i64) -> Self {
        Self::bare(UserId::Telegram(id))
    }

    pub fn anonymous() -> Self {
        Self::bare(UserId::Anonymous)
    }

    pub fn public() -> Self {
        Self::bare(UserId::Public)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.id, UserId::Telegram(_))
    }
}

/// Derive the identity from decoded init data.
///
/// Tries the `user` JSON object first, then a bare `user_id`, and otherwise
/// returns the anonymous identity. Malformed sub-fields degrade to absent
/// values; this never fails.
pub fn extract_identity(data: &InitData) -> UserIdentity {
    if let Some(identity) = data.get("user").and_then(identity_from_user_json) {
        return identity;
    }

    if let Some(id) = data.get("user_id").and_then(parse_id_str) {
        return UserIdentity::telegram(id);
    }

    UserIdentity::anonymous()
}

fn identity_from_user_json(raw: &str) -> Option<UserIdentity> {
    let user: Value = serde_json::from_str(raw).ok()?;
    let object = user.as_object()?;
    let id = object.get("id").and_then(parse_id_value)?;

    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(UserIdentity {
        id: UserId::Telegram(id),
        username: text("username"),
        first_name: text("first_name"),
        last_name: text("last_name"),
        language_code: text("language_code"),
    })
}

fn parse_id_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_id_str(s),
        _ => None,
    }
}

fn parse_id_str(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn data(raw: &str) -> InitData {
        InitData::parse_unverified(raw).unwrap()
    }

    fn encoded_user(json: &str) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user", json)
            .append_pair("hash", "00")
            .finish()
    }

    #[test]
    fn test_user_object_with_id_and_username() {
        let identity = extract_identity(&data(&encoded_user(r#"{"id":12345,"username":"bob"}"#)));

        assert_eq!(identity.id, UserId::Telegram(12345));
        assert_eq!(identity.username.as_deref(), Some("bob"));
        assert_eq!(identity.first_name, None);
        assert!(identity.is_authenticated());
    }

    #[test]
    fn test_user_object_with_full_profile() {
        let identity = extract_identity(&data(&encoded_user(
            r#"{"id":7,"username":"ann","first_name":"Ann","last_name":"Lee","language_code":"ru"}"#,
        )));

        assert_eq!(
            identity,
            UserIdentity {
                id: UserId::Telegram(7),
                username: Some("ann".to_string()),
                first_name: Some("Ann".to_string()),
                last_name: Some("Lee".to_string()),
                language_code: Some("ru".to_string()),
            }
        );
    }

    #[test]
    fn test_bare_user_id() {
        let identity = extract_identity(&data("user_id=77&hash=00"));

        assert_eq!(identity, UserIdentity::telegram(77));
        assert_eq!(identity.username, None);
    }

    #[test]
    fn test_neither_field_is_anonymous() {
        let identity = extract_identity(&data("auth_date=1&hash=00"));
        assert_eq!(identity, UserIdentity::anonymous());
        assert!(!identity.is_authenticated());
    }

    #[test]
    fn test_string_id_is_accepted() {
        let identity = extract_identity(&data(&encoded_user(r#"{"id":"42"}"#)));
        assert_eq!(identity.id, UserId::Telegram(42));
    }

    #[test]
    fn test_large_telegram_id() {
        let identity = extract_identity(&data(&encoded_user(r#"{"id":7012345678}"#)));
        assert_eq!(identity.id, UserId::Telegram(7_012_345_678));
    }

    #[test]
    fn test_malformed_user_json_falls_back_to_user_id() {
        let raw = format!("{}&user_id=5", encoded_user("{not json"));
        let identity = extract_identity(&data(&raw));
        assert_eq!(identity, UserIdentity::telegram(5));
    }

    #[test]
    fn test_user_without_id_is_anonymous() {
        let identity = extract_identity(&data(&encoded_user(r#"{"username":"ghost"}"#)));
        assert_eq!(identity, UserIdentity::anonymous());
    }

    #[test]
    fn test_non_object_user_is_ignored() {
        let identity = extract_identity(&data(&encoded_user("[1,2,3]")));
        assert_eq!(identity, UserIdentity::anonymous());
    }

    #[test]
    fn test_wrongly_typed_profile_fields_are_dropped() {
        let identity = extract_identity(&data(&encoded_user(
            r#"{"id":1,"username":123,"first_name":null,"last_name":""}"#,
        )));

        assert_eq!(identity, UserIdentity::telegram(1));
    }

    #[test]
    fn test_non_numeric_user_id_is_anonymous() {
        let identity = extract_identity(&data("user_id=abc&hash=00"));
        assert_eq!(identity, UserIdentity::anonymous());
    }

    #[test]
    fn test_identity_serialization() {
        let json = serde_json::to_value(UserIdentity::public()).unwrap();
        assert_eq!(json, serde_json::json!({"user_id": "public"}));

        let json = serde_json::to_value(UserIdentity::anonymous()).unwrap();
        assert_eq!(json, serde_json::json!({"user_id": "anonymous"}));

        let mut identity = UserIdentity::telegram(12345);
        identity.username = Some("bob".to_string());
        let json = serde_json::to_value(identity).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"user_id": 12345, "username": "bob"})
        );
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId::Telegram(9).to_string(), "9");
        assert_eq!(UserId::Anonymous.to_string(), "anonymous");
        assert_eq!(UserId::Public.to_string(), "public");
        assert_eq!(UserId::Public.telegram_id(), None);
        assert_eq!(UserId::Telegram(9).telegram_id(), Some(9));
    }
}
