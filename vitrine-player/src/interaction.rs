//! Camera interaction tracking
//!
//! Keeps the decaying "user is interacting" flag and the last camera pose,
//! and tells rotations apart from pan/zoom gestures.

use crate::state::SessionContext;
use crate::viewer::ChangeSource;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};
use vitrine_common::CameraPose;

/// Kind of user gesture behind a camera change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Orbit angles (and possibly fov) changed; radius and target did not
    PureRotation,
    /// Radius or target moved
    PanOrZoom,
    /// No previous pose to compare against
    Unknown,
}

/// Classify a change from `previous` to `current`
///
/// Radius and target are compared within [`vitrine_common::camera::POSE_EPSILON`].
/// Field of view is ignored.
pub fn classify(previous: Option<&CameraPose>, current: &CameraPose) -> Gesture {
    match previous {
        None => Gesture::Unknown,
        Some(previous) => {
            if previous.orbit.same_radius(&current.orbit) && previous.target.approx_eq(&current.target) {
                Gesture::PureRotation
            } else {
                Gesture::PanOrZoom
            }
        }
    }
}

pub fn is_pure_rotation(previous: Option<&CameraPose>, current: &CameraPose) -> bool {
    classify(previous, current) == Gesture::PureRotation
}

/// Outcome of one camera-change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraObservation {
    /// Dropped because a model load is in progress
    Ignored,
    /// Pose recorded; not a user gesture
    Recorded,
    /// Pose recorded and classified
    Gesture(Gesture),
}

pub struct InteractionTracker {
    ctx: Arc<SessionContext>,
    decay: Duration,
}

impl InteractionTracker {
    pub fn new(ctx: Arc<SessionContext>, decay: Duration) -> Self {
        Self { ctx, decay }
    }

    pub fn decay(&self) -> Duration {
        self.decay
    }

    /// Handle a camera-change notification
    pub fn on_camera_change(&self, pose: &CameraPose, source: ChangeSource) -> CameraObservation {
        let mut state = self.ctx.lock_interaction();

        if state.suppressed {
            debug!(source = ?source, "Camera change ignored during model load");
            return CameraObservation::Ignored;
        }

        let previous = state.last_pose.replace(*pose);
        state.active = true;

        state.decay_epoch += 1;
        if let Some(handle) = state.decay_task.take() {
            handle.abort();
        }
        state.decay_task = Some(tokio::spawn(decay_interaction(
            Arc::downgrade(&self.ctx),
            self.decay,
            state.decay_epoch,
        )));
        drop(state);

        match source {
            ChangeSource::UserInteraction => {
                let gesture = classify(previous.as_ref(), pose);
                trace!(gesture = ?gesture, pose = ?pose, "User camera change");
                CameraObservation::Gesture(gesture)
            }
            ChangeSource::Programmatic => CameraObservation::Recorded,
        }
    }
}

async fn decay_interaction(ctx: Weak<SessionContext>, decay: Duration, epoch: u64) {
    tokio::time::sleep(decay).await;
    let Some(ctx) = ctx.upgrade() else {
        return;
    };
    let mut state = ctx.lock_interaction();
    if state.decay_epoch == epoch {
        state.active = false;
        state.decay_task = None;
        debug!("User interaction decayed");
    }
}
