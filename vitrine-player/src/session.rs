//! Viewer session
//!
//! Wires the directory, coordinator, scheduler and tracker together and
//! routes viewer notifications and user commands to them.

use crate::autoplay::{AutoPlayScheduler, AutoPlayState};
use crate::conversion::{AssetConverter, ConversionCache};
use crate::coordinator::{SwitchCoordinator, SwitchTicket};
use crate::directory::ModelDirectory;
use crate::error::Result;
use crate::gateway::FetchGateway;
use crate::interaction::{CameraObservation, Gesture, InteractionTracker};
use crate::platform::Platform;
use crate::state::{InteractionSnapshot, SessionContext};
use crate::viewer::{Viewer, ViewerAttribute, ViewerNotification};
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vitrine_common::config::PlaybackConfig;
use vitrine_common::events::{AutoPlayReason, KpiCard, ViewerEvent};

/// Fetch and parse the model directory for `model_id`
///
/// Failures are shown to the user through `ctx` before being returned.
pub async fn bootstrap(
    ctx: &SessionContext,
    gateway: &FetchGateway,
    model_id: &str,
    cancel: &CancellationToken,
) -> Result<ModelDirectory> {
    let raw = match gateway.fetch(model_id, cancel).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(model_id = %model_id, "Failed to fetch model directory: {}", e);
            ctx.show_error(&format!("Failed to load models: {}", e));
            return Err(e.into());
        }
    };

    let directory = match ModelDirectory::from_raw(&raw) {
        Ok(directory) => directory,
        Err(e) => {
            error!(model_id = %model_id, "{}", e);
            ctx.show_error("Failed to prepare models for display.");
            return Err(e);
        }
    };

    info!(model_id = %model_id, count = directory.len(), "Model directory loaded");
    ctx.emit(ViewerEvent::DirectoryLoaded {
        model_count: directory.len(),
        timestamp: chrono::Utc::now(),
    });
    Ok(directory)
}

/// Session snapshot served by `GET /status`
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub current_index: usize,
    pub displayed_index: Option<usize>,
    pub model_count: usize,
    pub current_model: String,
    pub auto_play: AutoPlayState,
    pub interaction: InteractionSnapshot,
    pub kpi_panel: Vec<KpiCard>,
    pub last_error: Option<String>,
    pub platform: Platform,
    pub generation: u64,
}

pub struct ViewerSession {
    ctx: Arc<SessionContext>,
    directory: Arc<ModelDirectory>,
    viewer: Arc<dyn Viewer>,
    coordinator: Arc<SwitchCoordinator>,
    scheduler: Arc<AutoPlayScheduler>,
    platform: Platform,
    dispatcher: JoinHandle<()>,
}

impl ViewerSession {
    /// Display the first model and, with more than one, start auto-play
    ///
    /// Must be called inside a tokio runtime. A refused first switch is
    /// shown to the user and returned; nothing keeps running in that case.
    pub fn start(
        ctx: Arc<SessionContext>,
        directory: ModelDirectory,
        viewer: Arc<dyn Viewer>,
        converter: Option<Arc<dyn AssetConverter>>,
        platform: Platform,
        playback: &PlaybackConfig,
    ) -> Result<Self> {
        playback.validate()?;
        let directory = Arc::new(directory);

        let conversions = match (platform.requires_converted_asset(), converter) {
            (true, Some(converter)) => Some(Arc::new(ConversionCache::new(converter))),
            (true, None) => {
                warn!("Platform needs converted assets but no converter is configured");
                None
            }
            (false, _) => None,
        };

        let coordinator = Arc::new(SwitchCoordinator::new(
            Arc::clone(&directory),
            Arc::clone(&viewer),
            Arc::clone(&ctx),
            conversions,
            playback.missing_kpi,
            playback.load_timeout(),
        ));
        let scheduler = Arc::new(AutoPlayScheduler::new(
            Arc::clone(&ctx),
            Arc::clone(&directory),
            Arc::clone(&coordinator),
            playback.auto_play_interval(),
        ));
        let tracker = InteractionTracker::new(Arc::clone(&ctx), playback.interaction_decay());

        // Subscribe before the first switch so its load report is not missed
        let notifications = viewer.subscribe();
        let dispatcher = tokio::spawn(dispatch(
            notifications,
            tracker,
            Arc::clone(&coordinator),
            Arc::downgrade(&scheduler),
            Arc::clone(&ctx),
        ));

        let session = Self {
            ctx,
            directory,
            viewer,
            coordinator,
            scheduler,
            platform,
            dispatcher,
        };

        session.ctx.set_current_index(0);
        if let Err(e) = session.coordinator.switch_to(0) {
            error!("Cannot display first model: {}", e);
            session.ctx.show_error(&e.to_string());
            return Err(e);
        }

        if session.directory.len() > 1 {
            session.scheduler.start(AutoPlayReason::Startup);
        }

        info!(
            models = session.directory.len(),
            platform = %session.platform,
            "Viewer session started"
        );
        Ok(session)
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    pub fn directory(&self) -> &ModelDirectory {
        &self.directory
    }

    pub fn coordinator(&self) -> &Arc<SwitchCoordinator> {
        &self.coordinator
    }

    pub fn next(&self) -> Result<Option<SwitchTicket>> {
        self.report(self.scheduler.next())
    }

    pub fn previous(&self) -> Result<Option<SwitchTicket>> {
        self.report(self.scheduler.previous())
    }

    fn report(&self, result: Result<Option<SwitchTicket>>) -> Result<Option<SwitchTicket>> {
        if let Err(e) = &result {
            warn!("Model switch refused: {}", e);
            self.ctx.show_error(&e.to_string());
        }
        result
    }

    pub fn toggle_auto_play(&self) -> AutoPlayState {
        self.scheduler.toggle()
    }

    pub fn auto_play_state(&self) -> AutoPlayState {
        self.scheduler.state()
    }

    pub fn activate_ar(&self) {
        info!(index = self.ctx.current_index(), "Activating AR");
        self.viewer.activate_ar();
    }

    /// Forwarded verbatim to the viewer
    pub fn set_exposure(&self, value: &str) {
        debug!(value = %value, "Setting exposure");
        self.viewer.set_attribute(ViewerAttribute::Exposure, value);
    }

    /// Forwarded verbatim to the viewer
    pub fn set_shadow_intensity(&self, value: &str) {
        debug!(value = %value, "Setting shadow intensity");
        self.viewer.set_attribute(ViewerAttribute::ShadowIntensity, value);
    }

    pub fn status(&self) -> SessionStatus {
        let current_index = self.ctx.current_index();
        SessionStatus {
            current_index,
            displayed_index: self.ctx.displayed_index(),
            model_count: self.directory.len(),
            current_model: self.directory[current_index].name.clone(),
            auto_play: self.scheduler.state(),
            interaction: self.ctx.interaction(),
            kpi_panel: self.ctx.kpi_panel(),
            last_error: self.ctx.last_error(),
            platform: self.platform,
            generation: self.coordinator.current_generation(),
        }
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.dispatcher.abort();
        self.ctx.abort_timers();
    }
}

/// Route viewer notifications until the viewer goes away
async fn dispatch(
    mut notifications: broadcast::Receiver<ViewerNotification>,
    tracker: InteractionTracker,
    coordinator: Arc<SwitchCoordinator>,
    scheduler: Weak<AutoPlayScheduler>,
    ctx: Arc<SessionContext>,
) {
    loop {
        let notification = match notifications.recv().await {
            Ok(notification) => notification,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Dropped {} viewer notifications", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match notification {
            ViewerNotification::Load { source, load } => {
                coordinator.on_viewer_load(&source, load);
            }
            ViewerNotification::Error { message, load } => {
                coordinator.on_viewer_error(&message, load);
            }
            ViewerNotification::CameraChange { pose, source } => {
                let observation = tracker.on_camera_change(&pose, source);
                if observation == CameraObservation::Gesture(Gesture::PanOrZoom) {
                    if let Some(scheduler) = scheduler.upgrade() {
                        scheduler.stop(AutoPlayReason::Gesture);
                    }
                }
            }
            ViewerNotification::ArStatus { status } => {
                info!(status = %status, "AR status changed");
                ctx.emit(ViewerEvent::ArStatusChanged {
                    status,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }
    debug!("Viewer notification stream closed");
}
