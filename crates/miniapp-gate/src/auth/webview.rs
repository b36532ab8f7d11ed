//! Telegram webview classification.
//!
//! Decides from request headers alone whether a request comes from inside a
//! Telegram client. The checks run in a fixed order and the first match wins:
//!
//! 1. `Referer` points at the Telegram web client
//! 2. `User-Agent` contains a Telegram client marker (case-insensitive)
//! 3. A recognized init data header is present
//!
//! This is a heuristic, not authentication; the signature check is what
//! grants identity.

use crate::auth::locator::RequestSources;
use axum::http::header::{REFERER, USER_AGENT};

/// Host of the Telegram web client.
pub const TELEGRAM_WEB_DOMAIN: &str = "web.telegram.org";

/// Lowercase user-agent fragments seen in Telegram clients.
pub const TELEGRAM_UA_MARKERS: &[&str] = &["telegram", "tgwebview", "tdesktop", "tdlib"];

/// Which signal identified the Telegram client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramSignal {
    Referer,
    UserAgent,
    InitDataHeader,
}

/// Outcome of webview classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Telegram(TelegramSignal),
    NotTelegram,
}

impl ClientKind {
    pub fn is_telegram(&self) -> bool {
        matches!(self, ClientKind::Telegram(_))
    }
}

/// Classify from literal header values.
pub fn classify(
    user_agent: Option<&str>,
    referer: Option<&str>,
    has_init_data_header: bool,
) -> ClientKind {
    if referer.is_some_and(|r| r.to_ascii_lowercase().contains(TELEGRAM_WEB_DOMAIN)) {
        return ClientKind::Telegram(TelegramSignal::Referer);
    }

    if let Some(ua) = user_agent {
        let ua = ua.to_ascii_lowercase();
        if TELEGRAM_UA_MARKERS.iter().any(|marker| ua.contains(marker)) {
            return ClientKind::Telegram(TelegramSignal::UserAgent);
        }
    }

    if has_init_data_header {
        return ClientKind::Telegram(TelegramSignal::InitDataHeader);
    }

    ClientKind::NotTelegram
}

/// Classify a captured request.
pub fn classify_request(sources: &RequestSources) -> ClientKind {
    classify(
        sources.header(USER_AGENT.as_str()),
        sources.header(REFERER.as_str()),
        sources.has_init_data_header(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    const DESKTOP_CHROME: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";

    #[test]
    fn test_telegram_bot_user_agent() {
        assert_eq!(
            classify(Some("TelegramBot/1.0"), None, false),
            ClientKind::Telegram(TelegramSignal::UserAgent)
        );
    }

    #[test]
    fn test_web_client_referer_with_browser_user_agent() {
        assert_eq!(
            classify(
                Some("Mozilla/5.0 Chrome"),
                Some("https://web.telegram.org/"),
                false
            ),
            ClientKind::Telegram(TelegramSignal::Referer)
        );
    }

    #[test]
    fn test_plain_browser_is_not_telegram() {
        assert_eq!(
            classify(Some("Mozilla/5.0 Chrome"), None, false),
            ClientKind::NotTelegram
        );
        assert_eq!(
            classify(Some(DESKTOP_CHROME), Some("https://example.com/"), false),
            ClientKind::NotTelegram
        );
    }

    #[test]
    fn test_no_headers_is_not_telegram() {
        assert_eq!(classify(None, None, false), ClientKind::NotTelegram);
    }

    #[test]
    fn test_user_agent_markers_are_case_insensitive() {
        for ua in [
            "Mozilla/5.0 (Linux; Android 14) Telegram-Android/10.5.0",
            "TDesktop/4.14",
            "Mozilla/5.0 TgWebView",
            "tdlib/1.8",
            "TELEGRAM",
        ] {
            assert!(
                classify(Some(ua), None, false).is_telegram(),
                "'{}' should be classified as Telegram",
                ua
            );
        }
    }

    #[test]
    fn test_referer_match_is_case_insensitive() {
        assert!(classify(None, Some("https://WEB.Telegram.org/k/"), false).is_telegram());
    }

    #[test]
    fn test_init_data_header_is_trusted() {
        assert_eq!(
            classify(Some(DESKTOP_CHROME), None, true),
            ClientKind::Telegram(TelegramSignal::InitDataHeader)
        );
    }

    #[test]
    fn test_referer_takes_precedence_over_user_agent() {
        assert_eq!(
            classify(
                Some("TelegramBot/1.0"),
                Some("https://web.telegram.org/a/"),
                true
            ),
            ClientKind::Telegram(TelegramSignal::Referer)
        );
    }

    #[test]
    fn test_classify_request_reads_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DESKTOP_CHROME));
        headers.insert("x-telegram-initdata", HeaderValue::from_static("a=1"));
        let sources = RequestSources::new(headers, None, vec![]);

        assert_eq!(
            classify_request(&sources),
            ClientKind::Telegram(TelegramSignal::InitDataHeader)
        );
    }

    #[test]
    fn test_classify_request_without_signals() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DESKTOP_CHROME));
        let sources = RequestSources::new(headers, None, vec![]);

        assert_eq!(classify_request(&sources), ClientKind::NotTelegram);
    }
}
