//! End-to-end authentication flow tests.
//!
//! Drives the gated routes over real HTTP with signed init data from
//! `TestInitDataBuilder`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use gate_test_utils::{
    tamper_hash, FailingProfileStore, TestGateServer, TestInitDataBuilder, DESKTOP_BROWSER_UA,
    TELEGRAM_ANDROID_UA, TELEGRAM_DESKTOP_UA, TELEGRAM_WEB_REFERER, TEST_BOT_TOKEN,
    TEST_BOT_USERNAME,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client should build")
}

fn signed_vars() -> Vec<(&'static str, &'static str)> {
    vec![("BOT_TOKEN", TEST_BOT_TOKEN), ("RATE_LIMIT_PER_SECOND", "50")]
}

/// Public mode authenticates everyone as `public`.
#[tokio::test]
async fn test_public_mode_returns_public_identity() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&[("ALLOW_PUBLIC", "true")]).await?;

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", DESKTOP_BROWSER_UA)
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"user_id": "public"}));

    Ok(())
}

/// A browser outside Telegram is sent to the bot.
#[tokio::test]
async fn test_browser_is_redirected_to_bot() -> Result<(), anyhow::Error> {
    let mut vars = signed_vars();
    vars.push(("BOT_USERNAME", TEST_BOT_USERNAME));
    let server = TestGateServer::spawn(&vars).await?;

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", DESKTOP_BROWSER_UA)
        .send()
        .await?;

    assert_eq!(response.status(), 307);
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("https://t.me/schedule_test_bot?startapp=go")
    );

    Ok(())
}

#[tokio::test]
async fn test_browser_is_forbidden_without_bot() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&signed_vars()).await?;

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", DESKTOP_BROWSER_UA)
        .send()
        .await?;

    assert_eq!(response.status(), 403);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    Ok(())
}

/// Valid signed init data yields the Telegram identity.
#[tokio::test]
async fn test_valid_init_data_authenticates() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&signed_vars()).await?;
    let init_data = TestInitDataBuilder::new()
        .for_user(12345)
        .with_username("bob")
        .with_first_name("Bob")
        .with_language_code("en")
        .build();

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", TELEGRAM_ANDROID_UA)
        .header("x-telegram-initdata", init_data)
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(
        body,
        json!({
            "user_id": 12345,
            "username": "bob",
            "first_name": "Bob",
            "language_code": "en"
        })
    );

    let profile = server
        .profiles()
        .expect("in-memory store")
        .profile(12345)
        .await
        .expect("profile should be upserted");
    assert_eq!(profile.username.as_deref(), Some("bob"));

    Ok(())
}

/// Every recognized header name is accepted.
#[tokio::test]
async fn test_all_init_data_headers_are_recognized() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&signed_vars()).await?;

    for (i, header) in [
        "telegram-init-data",
        "x-telegram-web-app-data",
        "x-init-data",
        "x-telegram-initdata",
    ]
    .into_iter()
    .enumerate()
    {
        let user_id = 100 + i as i64;
        let init_data = TestInitDataBuilder::new().for_user(user_id).build();

        let response = client()
            .get(format!("{}/api/v1/whoami", server.url()))
            .header("user-agent", TELEGRAM_DESKTOP_UA)
            .header(header, init_data)
            .send()
            .await?;

        assert_eq!(response.status(), 200, "header {}", header);
        let body: Value = response.json().await?;
        assert_eq!(body["user_id"], user_id, "header {}", header);
    }

    Ok(())
}

/// Init data in the query string is found when nothing else carries it.
#[tokio::test]
async fn test_query_init_data_authenticates() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&signed_vars()).await?;
    let init_data = TestInitDataBuilder::new().with_user_id(77).build();

    let encoded: String = url::form_urlencoded::byte_serialize(init_data.as_bytes()).collect();

    let response = client()
        .get(format!(
            "{}/api/v1/whoami?tgWebAppData={}",
            server.url(),
            encoded
        ))
        .header("referer", TELEGRAM_WEB_REFERER)
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"user_id": 77}));

    Ok(())
}

/// A flipped signature is rejected with 401.
#[tokio::test]
async fn test_tampered_hash_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&signed_vars()).await?;
    let init_data = tamper_hash(&TestInitDataBuilder::new().for_user(12345).build());

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", TELEGRAM_ANDROID_UA)
        .header("x-telegram-initdata", init_data)
        .send()
        .await?;

    assert_eq!(response.status(), 401);
    assert!(response.headers().contains_key("www-authenticate"));
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_INIT_DATA");

    Ok(())
}

#[tokio::test]
async fn test_wrong_bot_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&signed_vars()).await?;
    let init_data = TestInitDataBuilder::new()
        .for_user(1)
        .signed_with("999:another-bot")
        .build();

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", TELEGRAM_ANDROID_UA)
        .header("x-telegram-initdata", init_data)
        .send()
        .await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

/// Telegram client that has not loaded init data yet.
#[tokio::test]
async fn test_telegram_without_init_data_is_anonymous() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&signed_vars()).await?;

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", TELEGRAM_ANDROID_UA)
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({"user_id": "anonymous"}));

    Ok(())
}

/// Without a bot token, signed requests fail closed.
#[tokio::test]
async fn test_missing_bot_token_fails_closed() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&[]).await?;
    let init_data = TestInitDataBuilder::new().for_user(12345).build();

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", TELEGRAM_ANDROID_UA)
        .header("x-telegram-initdata", init_data)
        .send()
        .await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

/// Selection round trip for an authenticated user, init data in the body.
#[tokio::test]
async fn test_selection_roundtrip() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&signed_vars()).await?;
    let init_data = TestInitDataBuilder::new().for_user(555).build();

    let response = client()
        .post(format!("{}/api/v1/user/selection", server.url()))
        .header("user-agent", TELEGRAM_ANDROID_UA)
        .json(&json!({
            "group_id": 42,
            "teacher": "Ivanov I.I.",
            "initData": init_data
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await?, json!({"ok": true}));

    let response = client()
        .get(format!("{}/api/v1/user/selection", server.url()))
        .header("user-agent", TELEGRAM_ANDROID_UA)
        .header("x-telegram-initdata", &init_data)
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.json::<Value>().await?,
        json!({"last_selected_group_id": 42, "last_selected_teacher": "Ivanov I.I."})
    );

    let stats: Value = reqwest::get(format!("{}/api/v1/stats", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(stats["authenticated"], 2);
    assert_eq!(stats["top_groups"], json!([{"group_id": 42, "selections": 1}]));

    Ok(())
}

/// Public callers read nulls and their writes are acknowledged only.
#[tokio::test]
async fn test_public_selection_is_not_stored() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&[("ALLOW_PUBLIC", "true")]).await?;

    let response = client()
        .post(format!("{}/api/v1/user/selection", server.url()))
        .json(&json!({"group_id": 7}))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await?, json!({"ok": true}));

    let response = client()
        .get(format!("{}/api/v1/user/selection", server.url()))
        .send()
        .await?;
    assert_eq!(
        response.json::<Value>().await?,
        json!({"last_selected_group_id": null, "last_selected_teacher": null})
    );
    assert!(server.profiles().expect("in-memory store").is_empty().await);

    Ok(())
}

#[tokio::test]
async fn test_selection_rejects_non_json_body() -> Result<(), anyhow::Error> {
    let server = TestGateServer::spawn(&[("ALLOW_PUBLIC", "true")]).await?;

    let response = client()
        .post(format!("{}/api/v1/user/selection", server.url()))
        .body("group_id=7")
        .send()
        .await?;

    assert_eq!(response.status(), 400);

    Ok(())
}

/// A broken profile store does not block authentication.
#[tokio::test]
async fn test_profile_store_failure_is_not_fatal_for_auth() -> Result<(), anyhow::Error> {
    let server =
        TestGateServer::spawn_with_store(&signed_vars(), Arc::new(FailingProfileStore)).await?;
    let init_data = TestInitDataBuilder::new().for_user(9).build();

    let response = client()
        .get(format!("{}/api/v1/whoami", server.url()))
        .header("user-agent", TELEGRAM_ANDROID_UA)
        .header("x-telegram-initdata", init_data)
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["user_id"], 9);

    Ok(())
}
