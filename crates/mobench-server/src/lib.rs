//! Environment-side control plane.
//!
//! Hosts the task registry and the device controllers behind the HTTP
//! operation surface consumed by the benchmark client: device init,
//! screenshots, action steps, task lifecycle round-trips, health, and
//! suite-family switching.

pub mod dispatch;
pub mod http;
pub mod service;
pub mod state;

pub use http::create_router;
pub use service::ServiceError;
pub use state::AppState;
