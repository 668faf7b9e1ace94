//! Model switch coordinator
//!
//! Loads a directory index into the viewer. Initiation is synchronous; the
//! load completes when the viewer reports it. Each switch gets a generation
//! number that tags its source change, and at most one load is pending at a
//! time. Load and error reports are matched by that tag, never by source, so
//! a late notification from a superseded switch (even one to the same model)
//! can never restore the camera, clear suppression or attach a converted
//! asset for the wrong switch.

use crate::conversion::ConversionCache;
use crate::directory::ModelDirectory;
use crate::error::{Error, Result};
use crate::kpi;
use crate::state::SessionContext;
use crate::viewer::Viewer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vitrine_common::config::MissingKpiPolicy;
use vitrine_common::events::ViewerEvent;
use vitrine_common::CameraPose;

/// User-visible message for a failed render
pub const RENDER_FAILED_MESSAGE: &str =
    "Error displaying 3D model. The model may be incompatible or corrupted.";

/// Handle for an initiated switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchTicket {
    pub index: usize,
    pub generation: u64,
}

#[derive(Debug)]
struct PendingLoad {
    generation: u64,
    index: usize,
    watchdog: JoinHandle<()>,
}

pub struct SwitchCoordinator {
    directory: Arc<ModelDirectory>,
    viewer: Arc<dyn Viewer>,
    ctx: Arc<SessionContext>,
    /// Present only on platforms that need a converted asset
    conversions: Option<Arc<ConversionCache>>,
    missing_kpi: MissingKpiPolicy,
    load_timeout: Duration,
    generation: AtomicU64,
    pending: Mutex<Option<PendingLoad>>,
}

impl SwitchCoordinator {
    pub fn new(
        directory: Arc<ModelDirectory>,
        viewer: Arc<dyn Viewer>,
        ctx: Arc<SessionContext>,
        conversions: Option<Arc<ConversionCache>>,
        missing_kpi: MissingKpiPolicy,
        load_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            viewer,
            ctx,
            conversions,
            missing_kpi,
            load_timeout,
            generation: AtomicU64::new(0),
            pending: Mutex::new(None),
        }
    }

    /// Generation of the most recent switch (0 before the first)
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Index of the load still waiting for the viewer, if any
    pub fn pending_index(&self) -> Option<usize> {
        self.pending.lock().unwrap().as_ref().map(|p| p.index)
    }

    /// Start displaying `index`
    ///
    /// # Panics
    ///
    /// Panics when `index` is outside the directory.
    pub fn switch_to(self: &Arc<Self>, index: usize) -> Result<SwitchTicket> {
        assert!(
            index < self.directory.len(),
            "model index {} out of range ({} models)",
            index,
            self.directory.len()
        );
        let record = &self.directory[index];

        let has_kpi = record.has_kpi_rows();
        if !has_kpi && self.missing_kpi == MissingKpiPolicy::Abort {
            warn!(index, name = %record.name, "Refusing switch: model has no KPI rows");
            return Err(Error::MissingKpi {
                model: record.name.clone(),
            });
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.ctx.set_suppressed(true);

        info!(index, generation, name = %record.name, "Switching model");
        self.ctx.emit(ViewerEvent::ModelSwitchStarted {
            index,
            name: record.name.clone(),
            generation,
            timestamp: chrono::Utc::now(),
        });

        // Registered before the source changes so an immediate load report
        // finds its pending entry
        let watchdog = tokio::spawn(load_watchdog(Arc::downgrade(self), generation, self.load_timeout));
        let superseded = self.pending.lock().unwrap().replace(PendingLoad {
            generation,
            index,
            watchdog,
        });
        if let Some(previous) = superseded {
            debug!(
                generation = previous.generation,
                index = previous.index,
                "Superseded pending load"
            );
            previous.watchdog.abort();
        }

        self.viewer.set_source(&record.content, generation);

        let cards = match (&record.kpi, has_kpi) {
            (Some(table), true) => kpi::summarize(table),
            _ => Vec::new(),
        };
        self.ctx.set_kpi_panel(cards.clone());
        self.ctx.emit(ViewerEvent::KpiUpdated {
            index,
            cards,
            timestamp: chrono::Utc::now(),
        });

        if let Some(cache) = &self.conversions {
            self.attach_platform_asset(Arc::clone(cache), index, generation, record.content.clone());
        }

        Ok(SwitchTicket { index, generation })
    }

    fn attach_platform_asset(
        self: &Arc<Self>,
        cache: Arc<ConversionCache>,
        index: usize,
        generation: u64,
        content: String,
    ) {
        let coordinator = Arc::downgrade(self);
        tokio::spawn(async move {
            let asset = match cache.get_or_convert(&content).await {
                Ok(asset) => asset,
                Err(e) => {
                    warn!(index, content = %content, "Platform asset unavailable: {}", Error::from(e));
                    return;
                }
            };
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if coordinator.current_generation() != generation {
                debug!(index, generation, "Dropping converted asset for superseded switch");
                return;
            }
            coordinator.viewer.set_platform_asset(&asset);
            info!(index, asset = %asset, "Attached platform asset");
            coordinator.ctx.emit(ViewerEvent::PlatformAssetAttached {
                index,
                asset,
                timestamp: chrono::Utc::now(),
            });
        });
    }

    /// Viewer finished the source change tagged `load`
    ///
    /// Completes the pending load when the tag is its generation. Returns
    /// false for stale or unexpected notifications.
    pub fn on_viewer_load(&self, source: &str, load: u64) -> bool {
        let Some(pending) = self.take_pending(load) else {
            debug!(source = %source, load, "Ignoring stale load notification");
            return false;
        };
        pending.watchdog.abort();

        let saved_pose = self.ctx.interaction().last_pose;
        let pose = saved_pose.unwrap_or_else(CameraPose::default_view);
        self.viewer.set_camera_pose(&pose);
        self.ctx.set_suppressed(false);
        self.ctx.set_displayed_index(pending.index);

        let name = self.directory[pending.index].name.clone();
        info!(
            index = pending.index,
            generation = pending.generation,
            restored_user_pose = saved_pose.is_some(),
            "Model displayed: {}",
            name
        );
        self.ctx.emit(ViewerEvent::ModelDisplayed {
            index: pending.index,
            name,
            generation: pending.generation,
            restored_user_pose: saved_pose.is_some(),
            timestamp: chrono::Utc::now(),
        });
        true
    }

    /// Viewer reported a render failure
    ///
    /// A failure tagged with the pending load fails that switch. An untagged
    /// failure concerns the displayed model and is reported without touching
    /// a load in flight. Failures of superseded loads are dropped. Returns
    /// true when the failure was reported.
    pub fn on_viewer_error(&self, message: &str, load: Option<u64>) -> bool {
        let Some(load) = load else {
            let index = self.ctx.displayed_index();
            self.report_failure(index, Error::Render(message.to_string()), RENDER_FAILED_MESSAGE);
            return true;
        };
        let Some(pending) = self.take_pending(load) else {
            debug!(load, "Ignoring render failure of superseded load: {}", message);
            return false;
        };
        pending.watchdog.abort();
        self.fail_load(pending.index, Error::Render(message.to_string()), RENDER_FAILED_MESSAGE);
        true
    }

    /// Watchdog fired for `generation`
    pub fn on_load_timeout(&self, generation: u64) -> bool {
        let Some(pending) = self.take_pending(generation) else {
            return false;
        };
        let message = format!(
            "Timed out loading 3D model after {}ms.",
            self.load_timeout.as_millis()
        );
        self.fail_load(pending.index, Error::Render(format!("load {} timed out", generation)), &message);
        true
    }

    fn take_pending(&self, generation: u64) -> Option<PendingLoad> {
        let mut guard = self.pending.lock().unwrap();
        match guard.as_ref() {
            Some(p) if p.generation == generation => guard.take(),
            _ => None,
        }
    }

    fn fail_load(&self, index: usize, cause: Error, message: &str) {
        self.ctx.set_suppressed(false);
        self.report_failure(Some(index), cause, message);
    }

    fn report_failure(&self, index: Option<usize>, cause: Error, message: &str) {
        error!(index = ?index, "Model failed to display: {}", cause);
        self.ctx.set_last_error(message);
        self.ctx.emit(ViewerEvent::RenderFailed {
            index,
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}

impl Drop for SwitchCoordinator {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.lock().unwrap().take() {
            pending.watchdog.abort();
        }
    }
}

async fn load_watchdog(coordinator: Weak<SwitchCoordinator>, generation: u64, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    if let Some(coordinator) = coordinator.upgrade() {
        coordinator.on_load_timeout(generation);
    }
}
