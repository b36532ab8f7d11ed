//! Mini App Gate Library
//!
//! Authentication front door for a Telegram Mini App backend:
//!
//! - Classifies whether a request comes from inside a Telegram client
//! - Locates and verifies the signed init data the client attaches
//! - Derives the caller's identity and a throttling key
//! - Produces exactly one [`auth::AuthDecision`] per request
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/*.rs -> auth/*.rs
//!               -> handlers/*.rs   -> services/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Init data location, verification and the auth gate
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Body capture, rate limiting, authentication, metrics
//! - `models` - Request and response bodies
//! - `observability` - Prometheus metrics and usage counters
//! - `routes` - Axum router setup
//! - `services` - Rate limiter and profile store

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
