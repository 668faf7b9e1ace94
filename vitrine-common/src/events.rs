//! Event types for the Vitrine event system
//!
//! Provides the shared event definitions and the EventBus used to fan
//! session state changes out to SSE clients and tests.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One KPI card as presented next to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiCard {
    /// Metric key (GFZ, GRZ, BGF, Kosten)
    pub label: String,
    /// Formatted value including unit
    pub value: String,
}

/// Why auto-play changed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoPlayReason {
    /// Armed automatically after the directory loaded
    Startup,
    /// Explicit toggle from the user
    UserToggle,
    /// Pan or zoom gesture while running
    Gesture,
}

/// Vitrine event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ViewerEvent {
    /// Model directory fetched and parsed
    DirectoryLoaded {
        model_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A switch was initiated; the viewer is loading the model
    ModelSwitchStarted {
        index: usize,
        name: String,
        generation: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The viewer finished loading and the camera pose was applied
    ModelDisplayed {
        index: usize,
        name: String,
        generation: u64,
        /// True if the last user pose was restored (false: default pose)
        restored_user_pose: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// KPI panel content changed (empty when the panel is hidden)
    KpiUpdated {
        index: usize,
        cards: Vec<KpiCard>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Converted platform asset attached to the viewer
    PlatformAssetAttached {
        index: usize,
        asset: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Auto-play started or stopped
    AutoPlayChanged {
        running: bool,
        reason: AutoPlayReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The viewer could not display a model
    RenderFailed {
        index: Option<usize>,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User-visible error message
    ErrorShown {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// AR session status reported by the viewer
    ArStatusChanged {
        status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ViewerEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ViewerEvent::DirectoryLoaded { .. } => "DirectoryLoaded",
            ViewerEvent::ModelSwitchStarted { .. } => "ModelSwitchStarted",
            ViewerEvent::ModelDisplayed { .. } => "ModelDisplayed",
            ViewerEvent::KpiUpdated { .. } => "KpiUpdated",
            ViewerEvent::PlatformAssetAttached { .. } => "PlatformAssetAttached",
            ViewerEvent::AutoPlayChanged { .. } => "AutoPlayChanged",
            ViewerEvent::RenderFailed { .. } => "RenderFailed",
            ViewerEvent::ErrorShown { .. } => "ErrorShown",
            ViewerEvent::ArStatusChanged { .. } => "ArStatusChanged",
        }
    }
}

/// Broadcast bus for [`ViewerEvent`]s
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ViewerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use vitrine_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ViewerEvent,
    ) -> Result<usize, broadcast::error::SendError<ViewerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ViewerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
