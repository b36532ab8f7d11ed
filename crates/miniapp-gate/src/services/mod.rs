//! Collaborators the HTTP layer depends on.
//!
//! - `rate_limiter` - fixed-window request throttling per [`RateLimitKey`]
//! - `profile_store` - best-effort persistence of user profiles and selections
//!
//! [`RateLimitKey`]: crate::auth::RateLimitKey

pub mod profile_store;
pub mod rate_limiter;

pub use profile_store::{InMemoryProfileStore, ProfileStore, Selection, StoredProfile};
pub use rate_limiter::{RateLimitOutcome, RateLimiter};
