//! Builder for signed Telegram init data.
//!
//! Produces the URL-encoded string a Mini App client would attach, signed the
//! way Telegram signs it: HMAC-SHA256 over the sorted `key=value` lines,
//! keyed by SHA-256 of the bot token.

use crate::fixtures::TEST_BOT_TOKEN;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Builder for init data fixtures
///
/// # Example
/// ```rust,ignore
/// let init_data = TestInitDataBuilder::new()
///     .for_user(12345)
///     .with_username("bob")
///     .build();
/// ```
pub struct TestInitDataBuilder {
    fields: BTreeMap<String, String>,
    user: Option<Map<String, Value>>,
    bot_token: String,
}

impl TestInitDataBuilder {
    /// Start with `auth_date` set to now and no user.
    pub fn new() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("auth_date".to_string(), Utc::now().timestamp().to_string());
        fields.insert("query_id".to_string(), "AAHdF6IQAAAAAN0XohDhrOrc".to_string());
        Self {
            fields,
            user: None,
            bot_token: TEST_BOT_TOKEN.to_string(),
        }
    }

    /// Attach a `user` JSON object with this id.
    pub fn for_user(mut self, id: i64) -> Self {
        self.user
            .get_or_insert_with(Map::new)
            .insert("id".to_string(), Value::from(id));
        self
    }

    pub fn with_username(self, username: &str) -> Self {
        self.with_user_field("username", username)
    }

    pub fn with_first_name(self, first_name: &str) -> Self {
        self.with_user_field("first_name", first_name)
    }

    pub fn with_last_name(self, last_name: &str) -> Self {
        self.with_user_field("last_name", last_name)
    }

    pub fn with_language_code(self, language_code: &str) -> Self {
        self.with_user_field("language_code", language_code)
    }

    fn with_user_field(mut self, key: &str, value: &str) -> Self {
        self.user
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), Value::from(value));
        self
    }

    /// Bare `user_id` field instead of a user object.
    pub fn with_user_id(self, id: i64) -> Self {
        self.with_field("user_id", &id.to_string())
    }

    /// Arbitrary extra field.
    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    /// Sign with a different bot token.
    pub fn signed_with(mut self, bot_token: &str) -> Self {
        self.bot_token = bot_token.to_string();
        self
    }

    fn all_fields(&self) -> BTreeMap<String, String> {
        let mut fields = self.fields.clone();
        if let Some(user) = &self.user {
            fields.insert("user".to_string(), Value::Object(user.clone()).to_string());
        }
        fields
    }

    /// Encoded init data with a valid `hash`.
    pub fn build(self) -> String {
        let fields = self.all_fields();
        let hash = sign(&self.bot_token, &fields);

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &fields {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("hash", &hash);
        serializer.finish()
    }

    /// Encoded init data without a `hash` field.
    pub fn build_unsigned(self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.all_fields() {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl Default for TestInitDataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase hex signature of `fields` under `bot_token`.
pub fn sign(bot_token: &str, fields: &BTreeMap<String, String>) -> String {
    let data_check_string = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n");

    let key = Sha256::digest(bot_token.as_bytes());
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).expect("HMAC accepts any key length");
    mac.update(data_check_string.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Flip the last hex digit of the `hash` value, keeping everything else.
///
/// Expects `hash` to be the final field, as produced by
/// [`TestInitDataBuilder::build`].
pub fn tamper_hash(init_data: &str) -> String {
    let mut chars: Vec<char> = init_data.chars().collect();
    let last = chars.pop().expect("init data must not be empty");
    let flipped = if last == '0' { '1' } else { '0' };
    chars.push(flipped);
    chars.into_iter().collect()
}
