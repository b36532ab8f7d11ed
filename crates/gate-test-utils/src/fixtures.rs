//! Common test fixtures.

use miniapp_gate::auth::UserIdentity;
use miniapp_gate::errors::GateError;
use miniapp_gate::services::{ProfileStore, Selection};

/// Bot token used to sign fixtures unless a test overrides it.
pub const TEST_BOT_TOKEN: &str = "7000000001:AAH-test-bot-token-for-fixtures";

/// Bot handle accepted by config validation.
pub const TEST_BOT_USERNAME: &str = "schedule_test_bot";

/// Telegram for Android webview.
pub const TELEGRAM_ANDROID_UA: &str =
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36 Telegram-Android/10.5.0";

/// Telegram Desktop webview.
pub const TELEGRAM_DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0) TDesktop/4.14 TgWebView";

/// A plain desktop browser.
pub const DESKTOP_BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";

/// Referer sent by the Telegram web client.
pub const TELEGRAM_WEB_REFERER: &str = "https://web.telegram.org/k/";

/// Profile store whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingProfileStore;

#[async_trait::async_trait]
impl ProfileStore for FailingProfileStore {
    async fn upsert(&self, _identity: &UserIdentity) -> Result<(), GateError> {
        Err(GateError::ProfileStore("store unavailable".to_string()))
    }

    async fn selection(&self, _user_id: i64) -> Result<Option<Selection>, GateError> {
        Err(GateError::ProfileStore("store unavailable".to_string()))
    }

    async fn save_selection(&self, _user_id: i64, _selection: Selection) -> Result<(), GateError> {
        Err(GateError::ProfileStore("store unavailable".to_string()))
    }
}
