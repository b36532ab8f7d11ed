//! Authentication decision for a single request.
//!
//! ```text
//! START -> classify -> NOT_TELEGRAM                       (Redirect | Rejected)
//!                   -> TELEGRAM -> locate -> NO_TOKEN     (Anonymous)
//!                                         -> TOKEN_FOUND -> verify -> INVALID (Rejected)
//!                                                                  -> VALID   (Authenticated)
//! ```
//!
//! Public mode skips every step and authenticates as the `public` identity.
//! The gate is a pure function of the request and an immutable policy
//! snapshot; it performs no I/O other than logging.

use crate::auth::identity::{extract_identity, UserIdentity};
use crate::auth::init_data::{InitDataError, InitDataVerifier};
use crate::auth::locator::{locate_init_data, RequestSources};
use crate::auth::webview::{classify_request, ClientKind};
use crate::config::Config;
use std::fmt;

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotTelegramClient,
    MalformedToken,
    HashMismatch,
    MissingSecret,
}

impl RejectReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            RejectReason::NotTelegramClient => "not_telegram_client",
            RejectReason::MalformedToken => "malformed_token",
            RejectReason::HashMismatch => "hash_mismatch",
            RejectReason::MissingSecret => "missing_secret",
        }
    }
}

impl From<&InitDataError> for RejectReason {
    fn from(err: &InitDataError) -> Self {
        match err {
            InitDataError::MalformedToken(_) => RejectReason::MalformedToken,
            InitDataError::HashMismatch => RejectReason::HashMismatch,
            InitDataError::MissingSecret => RejectReason::MissingSecret,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// The single terminal outcome for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authenticated(UserIdentity),
    Anonymous,
    Redirect(String),
    Rejected(RejectReason),
}

impl AuthDecision {
    /// Bounded label for metrics and counters.
    pub fn as_label(&self) -> &'static str {
        match self {
            AuthDecision::Authenticated(_) => "authenticated",
            AuthDecision::Anonymous => "anonymous",
            AuthDecision::Redirect(_) => "redirect",
            AuthDecision::Rejected(_) => "rejected",
        }
    }
}

/// Operator policy knobs, fixed at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatePolicy {
    /// Bot handle used to redirect non-Telegram clients.
    pub bot_username: Option<String>,
}

impl GatePolicy {
    /// Deep link that opens the Mini App inside Telegram.
    pub fn redirect_target(&self) -> Option<String> {
        self.bot_username
            .as_ref()
            .map(|handle| format!("https://t.me/{}?startapp=go", handle))
    }
}

/// Orchestrates classification, location, verification and identity
/// extraction into one [`AuthDecision`].
#[derive(Debug)]
pub struct AuthGate {
    verifier: InitDataVerifier,
    policy: GatePolicy,
}

impl AuthGate {
    pub fn new(verifier: InitDataVerifier, policy: GatePolicy) -> Self {
        Self { verifier, policy }
    }

    pub fn from_config(config: &Config) -> Self {
        let verifier = InitDataVerifier::new(config.bot_token.as_ref())
            .with_public_mode(config.allow_public);

        Self::new(
            verifier,
            GatePolicy {
                bot_username: config.bot_username.clone(),
            },
        )
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn verifier(&self) -> &InitDataVerifier {
        &self.verifier
    }

    /// Public mode is read from the verifier, which holds the only copy of
    /// the flag.
    pub fn decide(&self, sources: &RequestSources) -> AuthDecision {
        if self.verifier.public_mode() {
            return AuthDecision::Authenticated(UserIdentity::public());
        }

        match classify_request(sources) {
            ClientKind::NotTelegram => {
                tracing::debug!(target: "gate.auth.gate", "Request is not from a Telegram client");
                return match self.policy.redirect_target() {
                    Some(target) => AuthDecision::Redirect(target),
                    None => AuthDecision::Rejected(RejectReason::NotTelegramClient),
                };
            }
            ClientKind::Telegram(signal) => {
                tracing::trace!(target: "gate.auth.gate", signal = ?signal, "Telegram client detected");
            }
        }

        let Some(token) = locate_init_data(sources) else {
            tracing::debug!(target: "gate.auth.gate", "No init data, continuing anonymously");
            return AuthDecision::Anonymous;
        };

        match self.verifier.verify_token(&token) {
            Ok(data) => AuthDecision::Authenticated(extract_identity(&data)),
            Err(e) => AuthDecision::Rejected(RejectReason::from(&e)),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::auth::identity::UserId;
    use axum::http::header::{REFERER, USER_AGENT};
    use axum::http::{HeaderMap, HeaderValue};
    use hmac::{Hmac, Mac};
    use secrecy::SecretString;
    use serde_json::json;
    use sha2::{Digest, Sha256};

    const BOT_TOKEN: &str = "123456:TEST-bot-token";
    const TELEGRAM_UA: &str = "Mozilla/5.0 (Linux; Android 14) Telegram-Android/10.5.0";
    const BROWSER_UA: &str = "Mozilla/5.0 Chrome";

    fn sign(user_json: &str) -> String {
        let check = format!("auth_date=1700000000\nuser={}", user_json);
        let key = Sha256::digest(BOT_TOKEN.as_bytes());
        let mut mac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
        mac.update(check.as_bytes());

        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("auth_date", "1700000000")
            .append_pair("user", user_json)
            .append_pair("hash", &hex::encode(mac.finalize().into_bytes()))
            .finish()
    }

    fn gate(policy: GatePolicy) -> AuthGate {
        AuthGate::new(InitDataVerifier::new(Some(&SecretString::from(BOT_TOKEN))), policy)
    }

    fn public_gate(policy: GatePolicy) -> AuthGate {
        let verifier =
            InitDataVerifier::new(Some(&SecretString::from(BOT_TOKEN))).with_public_mode(true);
        AuthGate::new(verifier, policy)
    }

    fn request(ua: Option<&str>, init_data_header: Option<&str>) -> RequestSources {
        let mut headers = HeaderMap::new();
        if let Some(ua) = ua {
            headers.insert(USER_AGENT, HeaderValue::from_str(ua).unwrap());
        }
        if let Some(value) = init_data_header {
            headers.insert("telegram-init-data", HeaderValue::from_str(value).unwrap());
        }
        RequestSources::new(headers, None, vec![])
    }

    #[test]
    fn test_public_mode_authenticates_as_public() {
        let gate = public_gate(GatePolicy {
            bot_username: Some("schedule_bot".to_string()),
        });

        for sources in [
            request(None, None),
            request(Some(BROWSER_UA), None),
            request(Some(TELEGRAM_UA), Some("garbage")),
        ] {
            assert_eq!(
                gate.decide(&sources),
                AuthDecision::Authenticated(UserIdentity::public())
            );
        }
    }

    #[test]
    fn test_browser_is_redirected_when_bot_configured() {
        let gate = gate(GatePolicy {
            bot_username: Some("schedule_bot".to_string()),
        });

        assert_eq!(
            gate.decide(&request(Some(BROWSER_UA), None)),
            AuthDecision::Redirect("https://t.me/schedule_bot?startapp=go".to_string())
        );
    }

    #[test]
    fn test_browser_is_rejected_without_bot() {
        let gate = gate(GatePolicy::default());

        assert_eq!(
            gate.decide(&request(Some(BROWSER_UA), None)),
            AuthDecision::Rejected(RejectReason::NotTelegramClient)
        );
    }

    #[test]
    fn test_valid_token_authenticates() {
        let gate = gate(GatePolicy::default());
        let token = sign(r#"{"id":12345,"username":"bob","first_name":"Bob"}"#);

        let decision = gate.decide(&request(Some(TELEGRAM_UA), Some(&token)));

        let AuthDecision::Authenticated(identity) = decision else {
            panic!("expected Authenticated, got {:?}", decision);
        };
        assert_eq!(identity.id, UserId::Telegram(12345));
        assert_eq!(identity.username.as_deref(), Some("bob"));
        assert_eq!(identity.first_name.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let gate = gate(GatePolicy::default());
        let token = sign(r#"{"id":12345}"#);
        let last = token.chars().last().unwrap();
        let replacement = if last == 'a' { 'b' } else { 'a' };
        let tampered = format!("{}{}", &token[..token.len() - 1], replacement);

        assert_eq!(
            gate.decide(&request(Some(TELEGRAM_UA), Some(&tampered))),
            AuthDecision::Rejected(RejectReason::HashMismatch)
        );
    }

    #[test]
    fn test_malformed_token_is_rejected() {
        let gate = gate(GatePolicy::default());

        assert_eq!(
            gate.decide(&request(Some(TELEGRAM_UA), Some("not-init-data"))),
            AuthDecision::Rejected(RejectReason::MalformedToken)
        );
    }

    #[test]
    fn test_telegram_without_token_is_anonymous() {
        let gate = gate(GatePolicy::default());
        assert_eq!(
            gate.decide(&request(Some(TELEGRAM_UA), None)),
            AuthDecision::Anonymous
        );
    }

    #[test]
    fn test_empty_token_is_anonymous() {
        let gate = gate(GatePolicy::default());
        let sources = RequestSources::new(
            {
                let mut headers = HeaderMap::new();
                headers.insert(USER_AGENT, HeaderValue::from_static(TELEGRAM_UA));
                headers
            },
            Some(json!({"initData": ""})),
            vec![],
        );

        assert_eq!(gate.decide(&sources), AuthDecision::Anonymous);
    }

    #[test]
    fn test_missing_secret_fails_closed() {
        let gate = AuthGate::new(InitDataVerifier::new(None), GatePolicy::default());
        let token = sign(r#"{"id":1}"#);

        assert_eq!(
            gate.decide(&request(Some(TELEGRAM_UA), Some(&token))),
            AuthDecision::Rejected(RejectReason::MissingSecret)
        );
    }

    #[test]
    fn test_init_data_header_alone_reaches_verification() {
        let gate = gate(GatePolicy::default());
        let token = sign(r#"{"id":3}"#);

        let decision = gate.decide(&request(Some(BROWSER_UA), Some(&token)));
        assert_eq!(
            decision,
            AuthDecision::Authenticated(UserIdentity::telegram(3))
        );
    }

    #[test]
    fn test_web_client_referer_reaches_locator() {
        let gate = gate(GatePolicy::default());
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        headers.insert(REFERER, HeaderValue::from_static("https://web.telegram.org/k/"));

        let decision = gate.decide(&RequestSources::new(headers, None, vec![]));
        assert_eq!(decision, AuthDecision::Anonymous);
    }

    #[test]
    fn test_signed_token_in_body_is_verified() {
        let gate = gate(GatePolicy::default());
        let token = sign(r#"{"id":99}"#);
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(TELEGRAM_UA));
        headers.insert("x-telegram-initdata", HeaderValue::from_static("ignored=1"));

        let sources = RequestSources::new(headers, Some(json!({ "initData": token })), vec![]);
        assert_eq!(
            gate.decide(&sources),
            AuthDecision::Authenticated(UserIdentity::telegram(99))
        );
    }

    #[test]
    fn test_decision_is_deterministic() {
        let gate = gate(GatePolicy::default());
        let sources = request(Some(TELEGRAM_UA), Some(&sign(r#"{"id":5}"#)));

        assert_eq!(gate.decide(&sources), gate.decide(&sources));
    }

    #[test]
    fn test_redirect_target_format() {
        let policy = GatePolicy {
            bot_username: Some("raspisanie_bot".to_string()),
        };
        assert_eq!(
            policy.redirect_target().as_deref(),
            Some("https://t.me/raspisanie_bot?startapp=go")
        );
        assert_eq!(GatePolicy::default().redirect_target(), None);
    }

    #[test]
    fn test_from_config_carries_policy() {
        let vars = std::collections::HashMap::from([
            ("ALLOW_PUBLIC".to_string(), "true".to_string()),
            ("BOT_USERNAME".to_string(), "schedule_bot".to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();
        let gate = AuthGate::from_config(&config);

        assert!(gate.verifier().public_mode());
        assert!(!gate.verifier().has_secret());
        assert_eq!(gate.policy().bot_username.as_deref(), Some("schedule_bot"));
    }

    #[test]
    fn test_reject_reason_from_init_data_error() {
        assert_eq!(
            RejectReason::from(&InitDataError::MalformedToken("empty")),
            RejectReason::MalformedToken
        );
        assert_eq!(
            RejectReason::from(&InitDataError::MissingSecret),
            RejectReason::MissingSecret
        );
        assert_eq!(RejectReason::HashMismatch.to_string(), "hash_mismatch");
    }
}
