//! # Vitrine Player Library (vitrine-player)
//!
//! Orchestration core for an interactive 3D-model viewer.
//!
//! **Purpose:** Fetch a model directory from a remote source, cycle through
//! its models manually or on a timer, keep the KPI panel and the iOS platform
//! asset in sync with the displayed model, and track camera interaction so a
//! user's framing survives model switches.
//!
//! **Architecture:** The rendering engine sits behind the [`viewer::Viewer`]
//! trait. A [`session::ViewerSession`] routes its notifications to the
//! [`interaction::InteractionTracker`] and the
//! [`coordinator::SwitchCoordinator`], and exposes user commands to the HTTP
//! API.

pub mod api;
pub mod autoplay;
pub mod conversion;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod headless;
pub mod interaction;
pub mod kpi;
pub mod platform;
pub mod session;
pub mod state;
pub mod viewer;

pub use error::{Error, Result};
pub use session::ViewerSession;
pub use state::SessionContext;
