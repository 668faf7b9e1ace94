//! Per-session shared state
//!
//! One [`SessionContext`] is created per viewer session and shared by `Arc`
//! between the tracker, the coordinator, the scheduler and the HTTP layer.
//! Locks are `std::sync::Mutex` and are never held across `.await`.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use vitrine_common::events::{EventBus, KpiCard, ViewerEvent};
use vitrine_common::CameraPose;

/// Camera interaction bookkeeping
#[derive(Debug, Default)]
pub(crate) struct InteractionState {
    /// User manipulated the camera within the decay window
    pub(crate) active: bool,
    /// A model load is in progress; camera changes are ignored
    pub(crate) suppressed: bool,
    /// Last observed pose, restored on the next load
    pub(crate) last_pose: Option<CameraPose>,
    pub(crate) decay_task: Option<JoinHandle<()>>,
    /// Bumped each time the decay timer is re-armed
    pub(crate) decay_epoch: u64,
}

/// Read-only copy of the interaction flags
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InteractionSnapshot {
    pub active: bool,
    pub suppressed: bool,
    pub last_pose: Option<CameraPose>,
}

#[derive(Debug, Default)]
pub(crate) enum AutoPlay {
    #[default]
    Stopped,
    Running(JoinHandle<()>),
}

#[derive(Debug, Default)]
pub(crate) struct PlaybackState {
    /// Index the user or the timer last selected
    pub(crate) current_index: usize,
    /// Index whose load last completed
    pub(crate) displayed_index: Option<usize>,
    pub(crate) auto_play: AutoPlay,
}

/// State shared by all components of one session
pub struct SessionContext {
    interaction: Mutex<InteractionState>,
    playback: Mutex<PlaybackState>,
    kpi_panel: Mutex<Vec<KpiCard>>,
    last_error: Mutex<Option<String>>,
    events: EventBus,
}

impl SessionContext {
    pub fn new(events: EventBus) -> Self {
        Self {
            interaction: Mutex::new(InteractionState::default()),
            playback: Mutex::new(PlaybackState::default()),
            kpi_panel: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn emit(&self, event: ViewerEvent) {
        self.events.emit_lossy(event);
    }

    pub(crate) fn lock_interaction(&self) -> MutexGuard<'_, InteractionState> {
        self.interaction.lock().unwrap()
    }

    pub(crate) fn lock_playback(&self) -> MutexGuard<'_, PlaybackState> {
        self.playback.lock().unwrap()
    }

    pub fn interaction(&self) -> InteractionSnapshot {
        let state = self.lock_interaction();
        InteractionSnapshot {
            active: state.active,
            suppressed: state.suppressed,
            last_pose: state.last_pose,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.lock_interaction().suppressed
    }

    pub(crate) fn set_suppressed(&self, suppressed: bool) {
        self.lock_interaction().suppressed = suppressed;
    }

    pub fn current_index(&self) -> usize {
        self.lock_playback().current_index
    }

    pub(crate) fn set_current_index(&self, index: usize) {
        self.lock_playback().current_index = index;
    }

    pub fn displayed_index(&self) -> Option<usize> {
        self.lock_playback().displayed_index
    }

    pub(crate) fn set_displayed_index(&self, index: usize) {
        self.lock_playback().displayed_index = Some(index);
    }

    pub fn auto_play_running(&self) -> bool {
        matches!(self.lock_playback().auto_play, AutoPlay::Running(_))
    }

    pub fn kpi_panel(&self) -> Vec<KpiCard> {
        self.kpi_panel.lock().unwrap().clone()
    }

    pub(crate) fn set_kpi_panel(&self, cards: Vec<KpiCard>) {
        *self.kpi_panel.lock().unwrap() = cards;
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    pub(crate) fn set_last_error(&self, message: &str) {
        *self.last_error.lock().unwrap() = Some(message.to_string());
    }

    /// Record a user-visible error and publish it
    pub fn show_error(&self, message: &str) {
        self.set_last_error(message);
        self.emit(ViewerEvent::ErrorShown {
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Abort the decay and auto-play timers without publishing anything
    pub(crate) fn abort_timers(&self) {
        if let Some(handle) = self.lock_interaction().decay_task.take() {
            handle.abort();
        }
        if let AutoPlay::Running(handle) = std::mem::take(&mut self.lock_playback().auto_play) {
            handle.abort();
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.abort_timers();
    }
}
