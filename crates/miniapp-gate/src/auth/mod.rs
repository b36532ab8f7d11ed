//! Telegram Mini App authentication.
//!
//! - [`locator`] finds the init data token among request sources
//! - [`init_data`] decodes and verifies its signature
//! - [`webview`] classifies whether the client runs inside Telegram
//! - [`identity`] turns verified init data into a [`UserIdentity`]
//! - [`rate_key`] derives the throttling bucket, unverified
//! - [`gate`] composes the above into one [`AuthDecision`]

pub mod gate;
pub mod identity;
pub mod init_data;
pub mod locator;
pub mod rate_key;
pub mod webview;

pub use gate::{AuthDecision, AuthGate, GatePolicy, RejectReason};
pub use identity::{extract_identity, UserId, UserIdentity};
pub use init_data::{InitData, InitDataError, InitDataVerifier};
pub use locator::{locate_init_data, Provenance, RawToken, RequestSources};
pub use rate_key::{derive_rate_limit_key, RateLimitKey};
pub use webview::{classify, classify_request, ClientKind, TelegramSignal};
