//! Telegram init data verification.
//!
//! Init data is a URL-encoded `key=value&...` string signed by Telegram. The
//! check recomputes the signature over the canonical data-check string:
//!
//! 1. Trim whitespace and strip one layer of matching quotes
//! 2. Percent-decode pairs; the first occurrence of a duplicate key wins
//! 3. Remove `hash`, sort the remaining fields by key (byte order)
//! 4. Join `key=value` lines with `\n`
//! 5. HMAC-SHA256 keyed by SHA-256(bot token), lowercase hex
//! 6. Constant-time comparison against the provided `hash`
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE decoding (DoS prevention)
//! - The derived key lives in a `SecretBox` and is zeroized on drop
//! - Token contents and hashes are never logged

use crate::auth::locator::RawToken;
use crate::observability::metrics::record_init_data_verification;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretBox, SecretString};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted init data size in bytes.
///
/// Real init data is well under 2KB; anything above this is rejected
/// before any decoding or hashing.
pub const MAX_INIT_DATA_BYTES: usize = 8192;

/// Name of the signature field.
pub const HASH_FIELD: &str = "hash";

/// Reasons init data fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitDataError {
    #[error("malformed init data: {0}")]
    MalformedToken(&'static str),

    #[error("init data hash mismatch")]
    HashMismatch,

    #[error("bot token is not configured")]
    MissingSecret,
}

impl InitDataError {
    /// Bounded label for metrics and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            InitDataError::MalformedToken(_) => "malformed",
            InitDataError::HashMismatch => "hash_mismatch",
            InitDataError::MissingSecret => "missing_secret",
        }
    }
}

/// Decoded init data fields, `hash` removed.
///
/// Keys are kept in ascending byte order, which is also the order of the
/// data-check string.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct InitData {
    fields: BTreeMap<String, String>,
}

impl InitData {
    /// Decode init data without checking its signature.
    ///
    /// Only for best-effort uses such as rate-limit keys. Nothing derived from
    /// an unverified payload may be trusted for authorization.
    pub fn parse_unverified(raw: &str) -> Result<Self, InitDataError> {
        let (data, _hash) = decode(raw)?;
        Ok(data)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Canonical `key=value` lines joined by `\n`.
    pub fn data_check_string(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Field values can carry user profile data; only the keys are shown.
impl fmt::Debug for InitData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitData")
            .field("keys", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Verifies init data against the configured bot token.
pub struct InitDataVerifier {
    secret_key: Option<SecretBox<[u8; 32]>>,
    public_mode: bool,
}

impl InitDataVerifier {
    /// Create a verifier. `None` means no bot token is configured and every
    /// check fails with [`InitDataError::MissingSecret`].
    pub fn new(bot_token: Option<&SecretString>) -> Self {
        Self {
            secret_key: bot_token.map(|token| derive_secret_key(token.expose_secret().as_bytes())),
            public_mode: false,
        }
    }

    /// Enable public mode: [`InitDataVerifier::verify`] accepts everything.
    ///
    /// Off by default; only set from explicit operator configuration.
    pub fn with_public_mode(mut self, public_mode: bool) -> Self {
        self.public_mode = public_mode;
        self
    }

    pub fn public_mode(&self) -> bool {
        self.public_mode
    }

    pub fn has_secret(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Decode and verify a raw init data string.
    ///
    /// Pure function of `(raw, bot token)`; public mode does not apply here.
    pub fn check(&self, raw: &str) -> Result<InitData, InitDataError> {
        let secret_key = self
            .secret_key
            .as_ref()
            .ok_or(InitDataError::MissingSecret)?;

        let (data, provided_hash) = decode(raw)?;
        let provided_hash = provided_hash.ok_or(InitDataError::MalformedToken("missing hash"))?;

        let expected_hash = sign(secret_key.expose_secret(), &data.data_check_string())
            .ok_or(InitDataError::HashMismatch)?;

        if bool::from(expected_hash.as_bytes().ct_eq(provided_hash.as_bytes())) {
            Ok(data)
        } else {
            Err(InitDataError::HashMismatch)
        }
    }

    /// Verify a located token, logging and counting the outcome.
    ///
    /// The reason and provenance of a failure are logged; the token itself
    /// never is.
    pub fn verify_token(&self, token: &RawToken) -> Result<InitData, InitDataError> {
        let provenance = token.provenance();
        let result = self.check(token.value());

        match &result {
            Ok(_) => {
                record_init_data_verification("success", provenance.kind());
                tracing::debug!(
                    target: "gate.auth.init_data",
                    provenance = %provenance,
                    "Init data verified"
                );
            }
            Err(InitDataError::MissingSecret) => {
                record_init_data_verification("missing_secret", provenance.kind());
                tracing::error!(
                    target: "gate.auth.init_data",
                    provenance = %provenance,
                    "BOT_TOKEN is not configured, init data cannot be verified"
                );
            }
            Err(e) => {
                record_init_data_verification(e.as_label(), provenance.kind());
                tracing::warn!(
                    target: "gate.auth.init_data",
                    reason = %e,
                    provenance = %provenance,
                    "Init data verification failed"
                );
            }
        }

        result
    }

    /// Boolean verification of a located token.
    ///
    /// Never fails: errors are reported as `false`. In public mode the token
    /// is not inspected at all.
    pub fn verify(&self, token: &RawToken) -> bool {
        if self.public_mode {
            return true;
        }

        self.verify_token(token).is_ok()
    }
}

impl fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitDataVerifier")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("public_mode", &self.public_mode)
            .finish()
    }
}

/// SHA-256 of the bot token, used as the HMAC key.
fn derive_secret_key(bot_token: &[u8]) -> SecretBox<[u8; 32]> {
    let digest: [u8; 32] = Sha256::digest(bot_token).into();
    SecretBox::new(Box::new(digest))
}

/// Lowercase hex HMAC-SHA256 of the data-check string.
fn sign(secret_key: &[u8; 32], data_check_string: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key).ok()?;
    mac.update(data_check_string.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Strip one layer of matching surrounding quotes.
fn unquote(raw: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    raw
}

/// Decode init data into fields plus the provided hash.
fn decode(raw: &str) -> Result<(InitData, Option<String>), InitDataError> {
    if raw.len() > MAX_INIT_DATA_BYTES {
        return Err(InitDataError::MalformedToken("too large"));
    }

    let trimmed = unquote(raw.trim());
    if trimmed.is_empty() {
        return Err(InitDataError::MalformedToken("empty"));
    }

    let mut fields = BTreeMap::new();
    let mut hash = None;

    for segment in trimmed.split('&') {
        if !segment.contains('=') {
            return Err(InitDataError::MalformedToken("pair without '='"));
        }

        let (key, value) = form_urlencoded::parse(segment.as_bytes())
            .next()
            .ok_or(InitDataError::MalformedToken("undecodable pair"))?;

        if key.is_empty() {
            return Err(InitDataError::MalformedToken("empty key"));
        }

        if key == HASH_FIELD {
            if hash.is_none() {
                hash = Some(value.into_owned());
            }
            continue;
        }

        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }

    Ok((InitData { fields }, hash))
}
