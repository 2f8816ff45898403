//! HTTP control plane and composition root.
//!
//! The router exposes the authenticated admin API (users, blocklist,
//! relays, configuration, analytics, time control) plus the public
//! status and login endpoints. All state hangs off [`state::AppState`],
//! built once at startup and cloned into handlers.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod housekeeping;
pub mod routes;
pub mod state;
pub mod sysinfo;

pub use routes::build_router;
pub use state::{AppState, DecoderReload, Relays};
