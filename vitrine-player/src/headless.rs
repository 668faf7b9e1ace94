//! Headless viewer
//!
//! A [`Viewer`] without a renderer. It keeps the attributes it was given,
//! reports a load a short delay after every source change (a source replaced
//! before then never reports) and echoes pose
//! changes as programmatic camera notifications. User gestures and render
//! failures can be injected, which is how the HTTP API and the tests drive
//! it.

use crate::viewer::{ChangeSource, Viewer, ViewerAttribute, ViewerNotification};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vitrine_common::CameraPose;

#[derive(Debug, Default)]
struct HeadlessState {
    source: Option<String>,
    pose: Option<CameraPose>,
    platform_asset: Option<String>,
    attributes: HashMap<&'static str, String>,
    source_history: Vec<String>,
    ar_activations: u32,
    /// Source change still waiting for its load report
    loading: Option<(String, u64)>,
    load_task: Option<JoinHandle<()>>,
}

pub struct HeadlessViewer {
    state: Arc<Mutex<HeadlessState>>,
    notifications: broadcast::Sender<ViewerNotification>,
    /// `None`: loads only complete through [`HeadlessViewer::complete_load`]
    load_delay: Option<Duration>,
}

impl HeadlessViewer {
    /// Viewer that reports each load after `load_delay`
    pub fn new(load_delay: Duration) -> Self {
        Self::build(Some(load_delay))
    }

    /// Viewer whose loads must be completed explicitly
    pub fn manual() -> Self {
        Self::build(None)
    }

    fn build(load_delay: Option<Duration>) -> Self {
        let (notifications, _) = broadcast::channel(256);
        Self {
            state: Arc::new(Mutex::new(HeadlessState::default())),
            notifications,
            load_delay,
        }
    }

    fn notify(&self, notification: ViewerNotification) {
        // No receivers is fine before the session subscribes
        let _ = self.notifications.send(notification);
    }

    /// Finish the load in flight. Returns false when nothing is loading.
    pub fn complete_load(&self) -> bool {
        let loading = {
            let mut state = self.state.lock().unwrap();
            if let Some(task) = state.load_task.take() {
                task.abort();
            }
            state.loading.take()
        };
        match loading {
            Some((source, load)) => {
                self.notify(ViewerNotification::Load { source, load });
                true
            }
            None => false,
        }
    }

    /// Report a render failure
    ///
    /// Fails the load in flight, or the displayed model when idle.
    pub fn fail_render(&self, message: &str) {
        let load = {
            let mut state = self.state.lock().unwrap();
            if let Some(task) = state.load_task.take() {
                task.abort();
            }
            state.loading.take().map(|(_, load)| load)
        };
        self.notify(ViewerNotification::Error {
            message: message.to_string(),
            load,
        });
    }

    /// Whether a source change is still waiting for its load report
    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().loading.is_some()
    }

    /// Move the camera as the user would
    pub fn move_camera(&self, pose: CameraPose, source: ChangeSource) {
        self.state.lock().unwrap().pose = Some(pose);
        self.notify(ViewerNotification::CameraChange { pose, source });
    }

    pub fn platform_asset(&self) -> Option<String> {
        self.state.lock().unwrap().platform_asset.clone()
    }

    pub fn attribute(&self, attribute: ViewerAttribute) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .attributes
            .get(attribute.as_str())
            .cloned()
    }

    /// Every source set so far, oldest first
    pub fn source_history(&self) -> Vec<String> {
        self.state.lock().unwrap().source_history.clone()
    }

    pub fn ar_activations(&self) -> u32 {
        self.state.lock().unwrap().ar_activations
    }
}

impl Viewer for HeadlessViewer {
    fn set_source(&self, source: &str, load: u64) {
        let mut state = self.state.lock().unwrap();
        state.source = Some(source.to_string());
        state.platform_asset = None;
        state.source_history.push(source.to_string());
        state.loading = Some((source.to_string(), load));
        if let Some(replaced) = state.load_task.take() {
            replaced.abort();
        }
        debug!(source = %source, load, "Headless viewer source set");

        if let Some(delay) = self.load_delay {
            let tx = self.notifications.clone();
            let shared = Arc::clone(&self.state);
            state.load_task = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let finished = {
                    let mut state = shared.lock().unwrap();
                    let current = state.loading.as_ref().map(|(_, id)| *id);
                    if current == Some(load) {
                        state.load_task = None;
                        state.loading.take()
                    } else {
                        None
                    }
                };
                if let Some((source, load)) = finished {
                    let _ = tx.send(ViewerNotification::Load { source, load });
                }
            }));
        }
    }

    fn source(&self) -> Option<String> {
        self.state.lock().unwrap().source.clone()
    }

    fn camera_pose(&self) -> Option<CameraPose> {
        self.state.lock().unwrap().pose
    }

    fn set_camera_pose(&self, pose: &CameraPose) {
        self.move_camera(*pose, ChangeSource::Programmatic);
    }

    fn set_platform_asset(&self, asset: &str) {
        self.state.lock().unwrap().platform_asset = Some(asset.to_string());
    }

    fn set_attribute(&self, attribute: ViewerAttribute, value: &str) {
        self.state
            .lock()
            .unwrap()
            .attributes
            .insert(attribute.as_str(), value.to_string());
    }

    fn activate_ar(&self) {
        self.state.lock().unwrap().ar_activations += 1;
        info!("AR requested on headless viewer; no AR runtime available");
        self.notify(ViewerNotification::ArStatus {
            status: "failed".to_string(),
        });
    }

    fn subscribe(&self) -> broadcast::Receiver<ViewerNotification> {
        self.notifications.subscribe()
    }
}
