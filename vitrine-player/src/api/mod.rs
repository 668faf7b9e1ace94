//! HTTP control API
//!
//! Axum routes for the user-facing controls plus an SSE stream of
//! session events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
