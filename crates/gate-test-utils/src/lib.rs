//! # Gate Test Utilities
//!
//! Shared test utilities for the Mini App Gate.
//!
//! This crate provides:
//! - Signed init data construction (`TestInitDataBuilder`, `tamper_hash`)
//! - Common fixtures (bot token, user agents, failing collaborators)
//! - Server test harness (`TestGateServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestGateServer::spawn(&[("BOT_TOKEN", TEST_BOT_TOKEN)]).await?;
//!     let init_data = TestInitDataBuilder::new().for_user(12345).build();
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/whoami", server.url()))
//!         .header("user-agent", TELEGRAM_ANDROID_UA)
//!         .header("x-telegram-initdata", init_data)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod init_data_builder;
pub mod server_harness;

pub use fixtures::*;
pub use init_data_builder::*;
pub use server_harness::*;
