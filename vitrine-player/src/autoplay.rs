//! Auto-play scheduler
//!
//! Advances the current model at a fixed cadence until stopped by the user
//! or by a pan/zoom gesture. Manual next/previous share the same index.

use crate::coordinator::{SwitchCoordinator, SwitchTicket};
use crate::directory::ModelDirectory;
use crate::error::Result;
use crate::state::{AutoPlay, SessionContext};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use vitrine_common::events::{AutoPlayReason, ViewerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoPlayState {
    Running,
    Stopped,
    /// One model or fewer; the control is hidden
    Disabled,
}

pub struct AutoPlayScheduler {
    ctx: Arc<SessionContext>,
    directory: Arc<ModelDirectory>,
    coordinator: Arc<SwitchCoordinator>,
    period: Duration,
}

impl AutoPlayScheduler {
    pub fn new(
        ctx: Arc<SessionContext>,
        directory: Arc<ModelDirectory>,
        coordinator: Arc<SwitchCoordinator>,
        period: Duration,
    ) -> Self {
        Self {
            ctx,
            directory,
            coordinator,
            period,
        }
    }

    fn enabled(&self) -> bool {
        self.directory.len() > 1
    }

    pub fn state(&self) -> AutoPlayState {
        if !self.enabled() {
            AutoPlayState::Disabled
        } else if self.ctx.auto_play_running() {
            AutoPlayState::Running
        } else {
            AutoPlayState::Stopped
        }
    }

    /// Arm the timer; returns false when already running or disabled
    pub fn start(self: &Arc<Self>, reason: AutoPlayReason) -> bool {
        if !self.enabled() {
            warn!("Auto-play unavailable with {} model(s)", self.directory.len());
            return false;
        }

        {
            let mut playback = self.ctx.lock_playback();
            if matches!(playback.auto_play, AutoPlay::Running(_)) {
                return false;
            }
            let timer = tokio::spawn(run_timer(Arc::downgrade(self), self.period));
            if let AutoPlay::Running(prior) = std::mem::replace(&mut playback.auto_play, AutoPlay::Running(timer)) {
                prior.abort();
            }
        }

        info!(
            reason = ?reason,
            period_ms = self.period.as_millis() as u64,
            "Auto-play started"
        );
        self.ctx.emit(ViewerEvent::AutoPlayChanged {
            running: true,
            reason,
            timestamp: chrono::Utc::now(),
        });
        true
    }

    /// Cancel the timer; returns false when it was not running
    pub fn stop(&self, reason: AutoPlayReason) -> bool {
        let prior = std::mem::take(&mut self.ctx.lock_playback().auto_play);
        let AutoPlay::Running(timer) = prior else {
            return false;
        };
        timer.abort();

        info!(reason = ?reason, "Auto-play stopped");
        self.ctx.emit(ViewerEvent::AutoPlayChanged {
            running: false,
            reason,
            timestamp: chrono::Utc::now(),
        });
        true
    }

    pub fn toggle(self: &Arc<Self>) -> AutoPlayState {
        match self.state() {
            AutoPlayState::Disabled => {
                warn!("Auto-play toggle ignored with {} model(s)", self.directory.len());
            }
            AutoPlayState::Running => {
                self.stop(AutoPlayReason::UserToggle);
            }
            AutoPlayState::Stopped => {
                self.start(AutoPlayReason::UserToggle);
            }
        }
        self.state()
    }

    /// Timer tick: move to the next model
    ///
    /// The index advances even when the switch is refused, so a model that
    /// cannot be shown is skipped on the following tick.
    pub fn advance(&self) -> Result<SwitchTicket> {
        let next = self.directory.next_index(self.ctx.current_index());
        self.ctx.set_current_index(next);
        debug!(index = next, "Auto-play advancing");
        self.coordinator.switch_to(next)
    }

    /// Manual next; `None` when fewer than two models exist
    pub fn next(&self) -> Result<Option<SwitchTicket>> {
        self.step(ModelDirectory::next_index)
    }

    /// Manual previous; `None` when fewer than two models exist
    pub fn previous(&self) -> Result<Option<SwitchTicket>> {
        self.step(ModelDirectory::previous_index)
    }

    fn step(&self, pick: fn(&ModelDirectory, usize) -> usize) -> Result<Option<SwitchTicket>> {
        if !self.enabled() {
            warn!("Navigation ignored with {} model(s)", self.directory.len());
            return Ok(None);
        }
        let index = pick(&self.directory, self.ctx.current_index());
        self.ctx.set_current_index(index);
        self.coordinator.switch_to(index).map(Some)
    }
}

async fn run_timer(scheduler: Weak<AutoPlayScheduler>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(scheduler) = scheduler.upgrade() else {
            break;
        };
        if let Err(e) = scheduler.advance() {
            error!("Auto-play advance failed: {}", e);
        }
    }
}
