//! HTTP request handlers for the gate.

pub mod health;
pub mod metrics;
pub mod selection;
pub mod stats;
pub mod whoami;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use selection::{get_selection, save_selection};
pub use stats::get_stats;
pub use whoami::whoami;
