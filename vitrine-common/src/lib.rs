//! # Vitrine Common Library
//!
//! Shared code for the Vitrine model viewer including:
//! - Camera pose types and their viewer attribute syntax
//! - Model records and KPI tables
//! - Event types (ViewerEvent enum) and the EventBus
//! - Bootstrap configuration loading

pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use camera::{CameraOrbit, CameraPose, CameraTarget, FieldOfView};
pub use error::{Error, Result};
pub use model::{KpiRow, KpiTable, KpiValue, ModelRecord};
