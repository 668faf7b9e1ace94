//! Viewer capability
//!
//! The rendering engine is an external collaborator. The core only needs to
//! set its source and camera, attach a platform asset, forward lighting
//! attributes, start AR, and listen to the notifications it emits.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vitrine_common::CameraPose;

/// Origin of a camera change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeSource {
    /// Direct manipulation by the user (drag, pinch, wheel)
    UserInteraction,
    /// Set by code, including pose restoration after a load
    Programmatic,
}

/// Notifications emitted by the viewer
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerNotification {
    /// The load started by `set_source(source, load)` finished. A source
    /// replaced before it finished never reports.
    Load { source: String, load: u64 },
    /// Rendering failed. `load` names the source change that failed, `None`
    /// when the displayed model broke after its load completed.
    Error { message: String, load: Option<u64> },
    /// Camera moved
    CameraChange {
        pose: CameraPose,
        source: ChangeSource,
    },
    /// Coarse AR session status ("session-started", "failed", ...)
    ArStatus { status: String },
}

/// Presentation attributes forwarded verbatim to the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAttribute {
    Exposure,
    ShadowIntensity,
}

impl ViewerAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerAttribute::Exposure => "exposure",
            ViewerAttribute::ShadowIntensity => "shadow-intensity",
        }
    }
}

/// Rendering engine interface
pub trait Viewer: Send + Sync {
    /// Start loading a new source; completion arrives as `Load` carrying the
    /// same `load` tag
    fn set_source(&self, source: &str, load: u64);

    /// Source currently set, if any
    fn source(&self) -> Option<String>;

    /// Current camera pose, if a model is displayed
    fn camera_pose(&self) -> Option<CameraPose>;

    /// Apply orbit, target and field of view
    fn set_camera_pose(&self, pose: &CameraPose);

    /// Attach the converted platform asset (iOS Quick Look source)
    fn set_platform_asset(&self, asset: &str);

    fn set_attribute(&self, attribute: ViewerAttribute, value: &str);

    /// Enter an immersive AR session
    fn activate_ar(&self);

    /// Receive future notifications
    fn subscribe(&self) -> broadcast::Receiver<ViewerNotification>;
}
