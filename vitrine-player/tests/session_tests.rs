//! End-to-end session behaviour on the headless viewer
//!
//! Timer-driven tests run on a paused clock; bootstrap tests talk to real
//! in-process endpoints.

mod helpers;

use async_trait::async_trait;
use helpers::{
    directory, models, record, record_without_kpi, spawn_endpoint, start_session, wait_for_display,
    wait_for_event, webhook_payload, Reply,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vitrine_common::config::{MissingKpiPolicy, PlaybackConfig};
use vitrine_common::events::{AutoPlayReason, EventBus, ViewerEvent};
use vitrine_common::{CameraOrbit, CameraPose, CameraTarget, FieldOfView};
use vitrine_player::autoplay::AutoPlayState;
use vitrine_player::conversion::AssetConverter;
use vitrine_player::error::ConversionError;
use vitrine_player::gateway::FetchGateway;
use vitrine_player::headless::HeadlessViewer;
use vitrine_player::platform::Platform;
use vitrine_player::session::bootstrap;
use vitrine_player::viewer::{ChangeSource, Viewer, ViewerAttribute};
use vitrine_player::{Error, SessionContext, ViewerSession};

fn user_pose() -> CameraPose {
    CameraPose::new(
        CameraOrbit::new(135.0, 60.0, 0.4),
        CameraTarget::new(0.05, 0.01, -0.02),
        FieldOfView::new(30.0),
    )
}

fn panned(pose: &CameraPose) -> CameraPose {
    let mut moved = *pose;
    moved.target.x += 0.1;
    moved
}

#[tokio::test(start_paused = true)]
async fn test_pan_gesture_stops_auto_play_on_current_model() {
    let mut f = start_session(&models(3), PlaybackConfig::default());
    assert_eq!(f.session.auto_play_state(), AutoPlayState::Running);

    wait_for_display(&mut f.events, 0).await;
    wait_for_display(&mut f.events, 1).await;

    let current = f.viewer.camera_pose().unwrap();
    f.viewer.move_camera(panned(&current), ChangeSource::UserInteraction);

    let event = wait_for_event(&mut f.events, |e| matches!(e, ViewerEvent::AutoPlayChanged { running: false, .. })).await;
    match event {
        ViewerEvent::AutoPlayChanged { reason, .. } => assert_eq!(reason, AutoPlayReason::Gesture),
        _ => unreachable!(),
    }

    tokio::time::sleep(Duration::from_secs(3)).await;
    let status = f.session.status();
    assert_eq!(status.current_index, 1);
    assert_eq!(status.auto_play, AutoPlayState::Stopped);
    assert_eq!(status.current_model, "M1");
}

#[tokio::test(start_paused = true)]
async fn test_rotation_keeps_auto_play_running() {
    let mut f = start_session(&models(3), PlaybackConfig::default());
    wait_for_display(&mut f.events, 0).await;

    let mut rotated = f.viewer.camera_pose().unwrap();
    rotated.orbit.theta_deg += 45.0;
    rotated.fov.degrees = 35.0;
    f.viewer.move_camera(rotated, ChangeSource::UserInteraction);

    wait_for_display(&mut f.events, 1).await;
    assert_eq!(f.session.auto_play_state(), AutoPlayState::Running);
    assert_eq!(f.viewer.camera_pose(), Some(rotated));
}

#[tokio::test(start_paused = true)]
async fn test_missing_kpi_keeps_previous_model() {
    let records = vec![record("A", "a.glb"), record_without_kpi("B", "b.glb"), record("C", "c.glb")];
    let mut f = start_session(&records, PlaybackConfig::default());
    assert_eq!(f.session.toggle_auto_play(), AutoPlayState::Stopped);
    wait_for_display(&mut f.events, 0).await;

    let err = f.session.next().unwrap_err();

    assert!(matches!(err, Error::MissingKpi { ref model } if model == "B"));
    assert_eq!(f.viewer.source().as_deref(), Some("a.glb"));
    assert!(!f.ctx.is_suppressed());
    assert_eq!(f.ctx.displayed_index(), Some(0));
    assert_eq!(f.ctx.last_error().as_deref(), Some("No KPI data found for model: B"));
    wait_for_event(&mut f.events, |e| matches!(e, ViewerEvent::ErrorShown { .. })).await;
}

#[tokio::test(start_paused = true)]
async fn test_hide_panel_policy_displays_model_without_kpis() {
    let records = vec![record("A", "a.glb"), record_without_kpi("B", "b.glb")];
    let playback = PlaybackConfig {
        missing_kpi: MissingKpiPolicy::HidePanel,
        ..PlaybackConfig::default()
    };
    let mut f = start_session(&records, playback);
    f.session.toggle_auto_play();
    wait_for_display(&mut f.events, 0).await;
    assert_eq!(f.ctx.kpi_panel().len(), 3);

    f.session.next().unwrap();
    wait_for_display(&mut f.events, 1).await;
    assert!(f.ctx.kpi_panel().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_user_pose_survives_round_trip() {
    let mut f = start_session(&models(3), PlaybackConfig::default());
    f.session.toggle_auto_play();

    match wait_for_display(&mut f.events, 0).await {
        ViewerEvent::ModelDisplayed { restored_user_pose, .. } => assert!(!restored_user_pose),
        _ => unreachable!(),
    }
    assert_eq!(f.viewer.camera_pose(), Some(CameraPose::default_view()));

    f.viewer.move_camera(user_pose(), ChangeSource::UserInteraction);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.ctx.interaction().last_pose, Some(user_pose()));

    f.session.next().unwrap();
    match wait_for_display(&mut f.events, 1).await {
        ViewerEvent::ModelDisplayed { restored_user_pose, .. } => assert!(restored_user_pose),
        _ => unreachable!(),
    }
    assert_eq!(f.viewer.camera_pose(), Some(user_pose()));

    f.session.previous().unwrap();
    wait_for_display(&mut f.events, 0).await;
    assert_eq!(f.viewer.camera_pose(), Some(user_pose()));
}

#[tokio::test(start_paused = true)]
async fn test_camera_changes_during_load_are_ignored() {
    let mut f = start_session(&models(2), PlaybackConfig::default());
    f.session.toggle_auto_play();
    wait_for_display(&mut f.events, 0).await;

    f.session.next().unwrap();
    assert!(f.ctx.is_suppressed());
    f.viewer.move_camera(user_pose(), ChangeSource::UserInteraction);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_ne!(f.ctx.interaction().last_pose, Some(user_pose()));

    wait_for_display(&mut f.events, 1).await;
    assert_eq!(f.viewer.camera_pose(), Some(CameraPose::default_view()));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_twice_restores_schedule() {
    let mut f = start_session(&models(3), PlaybackConfig::default());
    wait_for_display(&mut f.events, 0).await;

    assert_eq!(f.session.toggle_auto_play(), AutoPlayState::Stopped);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(f.ctx.current_index(), 0);

    assert_eq!(f.session.toggle_auto_play(), AutoPlayState::Running);
    wait_for_display(&mut f.events, 1).await;
    wait_for_display(&mut f.events, 2).await;
    assert_eq!(f.session.auto_play_state(), AutoPlayState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_auto_play_skips_model_without_kpis() {
    let records = vec![record("A", "a.glb"), record_without_kpi("B", "b.glb"), record("C", "c.glb")];
    let mut f = start_session(&records, PlaybackConfig::default());

    wait_for_display(&mut f.events, 0).await;
    wait_for_display(&mut f.events, 2).await;

    assert_eq!(f.session.auto_play_state(), AutoPlayState::Running);
    assert!(!f.viewer.source_history().contains(&"b.glb".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_switches_complete_only_latest() {
    let mut f = start_session(&models(3), PlaybackConfig::default());
    f.session.toggle_auto_play();
    wait_for_display(&mut f.events, 0).await;

    f.session.next().unwrap();
    f.session.next().unwrap();

    let mut displayed = Vec::new();
    loop {
        if let ViewerEvent::ModelDisplayed { index, .. } = wait_for_event(&mut f.events, |e| matches!(e, ViewerEvent::ModelDisplayed { .. })).await {
            displayed.push(index);
            if index == 2 {
                break;
            }
        }
    }
    assert_eq!(displayed, vec![2]);
    assert_eq!(f.session.coordinator().current_generation(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_single_model_disables_controls() {
    let mut f = start_session(&models(1), PlaybackConfig::default());
    wait_for_display(&mut f.events, 0).await;

    assert_eq!(f.session.auto_play_state(), AutoPlayState::Disabled);
    assert_eq!(f.session.toggle_auto_play(), AutoPlayState::Disabled);
    assert_eq!(f.session.next().unwrap(), None);
    assert_eq!(f.session.previous().unwrap(), None);
    assert_eq!(f.viewer.source_history(), vec!["m0.glb".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_render_failure_is_reported() {
    let mut f = start_session(&models(2), PlaybackConfig::default());
    f.session.toggle_auto_play();
    wait_for_display(&mut f.events, 0).await;

    f.session.next().unwrap();
    f.viewer.fail_render("unsupported extension");

    let event = wait_for_event(&mut f.events, |e| matches!(e, ViewerEvent::RenderFailed { .. })).await;
    match event {
        ViewerEvent::RenderFailed { index, message, .. } => {
            assert_eq!(index, Some(1));
            assert_eq!(message, "Error displaying 3D model. The model may be incompatible or corrupted.");
        }
        _ => unreachable!(),
    }
    assert!(!f.ctx.is_suppressed());
    assert_eq!(f.ctx.displayed_index(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_quick_return_to_previous_model_waits_for_its_own_load() {
    let mut f = start_session(&models(2), PlaybackConfig::default());
    f.session.toggle_auto_play();
    wait_for_display(&mut f.events, 0).await;

    f.session.next().unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    f.session.previous().unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    let ticket = f.session.next().unwrap().unwrap();
    assert_eq!(ticket.generation, 4);

    // The first switch to m1 would have finished loading by now
    tokio::time::sleep(Duration::from_millis(8)).await;
    assert!(f.ctx.is_suppressed());
    assert_eq!(f.ctx.displayed_index(), Some(0));

    let event = wait_for_event(&mut f.events, |e| matches!(e, ViewerEvent::ModelDisplayed { .. })).await;
    match event {
        ViewerEvent::ModelDisplayed { index, generation, .. } => {
            assert_eq!(index, 1);
            assert_eq!(generation, 4);
        }
        _ => unreachable!(),
    }
    assert!(!f.ctx.is_suppressed());
    assert_eq!(f.ctx.displayed_index(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_render_failure_of_displayed_model_is_shown() {
    let mut f = start_session(&models(2), PlaybackConfig::default());
    f.session.toggle_auto_play();
    wait_for_display(&mut f.events, 0).await;

    f.viewer.fail_render("context lost");

    let event = wait_for_event(&mut f.events, |e| matches!(e, ViewerEvent::RenderFailed { .. })).await;
    match event {
        ViewerEvent::RenderFailed { index, message, .. } => {
            assert_eq!(index, Some(0));
            assert_eq!(message, "Error displaying 3D model. The model may be incompatible or corrupted.");
        }
        _ => unreachable!(),
    }
    assert_eq!(
        f.ctx.last_error().as_deref(),
        Some("Error displaying 3D model. The model may be incompatible or corrupted.")
    );
    assert_eq!(f.ctx.displayed_index(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_load_watchdog_reports_stuck_load() {
    let ctx = Arc::new(SessionContext::new(EventBus::new(256)));
    let mut events = ctx.events().subscribe();
    let viewer = Arc::new(HeadlessViewer::manual());
    let playback = PlaybackConfig {
        load_timeout_ms: 2000,
        ..PlaybackConfig::default()
    };
    let _session = ViewerSession::start(
        Arc::clone(&ctx),
        directory(&models(1)),
        viewer.clone(),
        None,
        Platform::Other,
        &playback,
    )
    .unwrap();
    assert!(ctx.is_suppressed());

    let event = wait_for_event(&mut events, |e| matches!(e, ViewerEvent::RenderFailed { .. })).await;
    match event {
        ViewerEvent::RenderFailed { message, .. } => assert!(message.contains("2000ms")),
        _ => unreachable!(),
    }
    assert!(!ctx.is_suppressed());

    // A load reported after the timeout no longer completes anything
    assert!(viewer.complete_load());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(ctx.displayed_index(), None);
}

#[tokio::test(start_paused = true)]
async fn test_viewer_controls_are_forwarded() {
    let mut f = start_session(&models(2), PlaybackConfig::default());

    f.session.set_exposure("1.3");
    f.session.set_shadow_intensity("0.8");
    f.session.activate_ar();

    assert_eq!(f.viewer.attribute(ViewerAttribute::Exposure).as_deref(), Some("1.3"));
    assert_eq!(f.viewer.attribute(ViewerAttribute::ShadowIntensity).as_deref(), Some("0.8"));
    assert_eq!(f.viewer.ar_activations(), 1);

    let event = wait_for_event(&mut f.events, |e| matches!(e, ViewerEvent::ArStatusChanged { .. })).await;
    match event {
        ViewerEvent::ArStatusChanged { status, .. } => assert_eq!(status, "failed"),
        _ => unreachable!(),
    }
}

struct SuffixConverter {
    calls: AtomicUsize,
}

#[async_trait]
impl AssetConverter for SuffixConverter {
    async fn convert(&self, content: &str) -> Result<String, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(content.replace(".glb", ".usdz"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_ios_sessions_attach_converted_asset() {
    let ctx = Arc::new(SessionContext::new(EventBus::new(256)));
    let mut events = ctx.events().subscribe();
    let viewer = Arc::new(HeadlessViewer::new(Duration::from_millis(10)));
    let converter = Arc::new(SuffixConverter {
        calls: AtomicUsize::new(0),
    });
    let session = ViewerSession::start(
        Arc::clone(&ctx),
        directory(&models(2)),
        viewer.clone(),
        Some(converter.clone()),
        Platform::Ios,
        &PlaybackConfig::default(),
    )
    .unwrap();
    session.toggle_auto_play();

    let event = wait_for_event(&mut events, |e| matches!(e, ViewerEvent::PlatformAssetAttached { .. })).await;
    match event {
        ViewerEvent::PlatformAssetAttached { index, asset, .. } => {
            assert_eq!(index, 0);
            assert_eq!(asset, "m0.usdz");
        }
        _ => unreachable!(),
    }
    assert_eq!(viewer.platform_asset().as_deref(), Some("m0.usdz"));

    // Revisiting uses the cache
    session.next().unwrap();
    wait_for_event(&mut events, |e| matches!(e, ViewerEvent::PlatformAssetAttached { index: 1, .. })).await;
    session.previous().unwrap();
    wait_for_event(&mut events, |e| matches!(e, ViewerEvent::PlatformAssetAttached { index: 0, .. })).await;
    assert_eq!(converter.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_conversion_is_not_attached() {
    let ctx = Arc::new(SessionContext::new(EventBus::new(256)));
    let mut events = ctx.events().subscribe();
    let viewer = Arc::new(HeadlessViewer::new(Duration::from_millis(10)));
    let converter = Arc::new(SuffixConverter {
        calls: AtomicUsize::new(0),
    });
    let session = ViewerSession::start(
        Arc::clone(&ctx),
        directory(&models(2)),
        viewer.clone(),
        Some(converter),
        Platform::Ios,
        &PlaybackConfig::default(),
    )
    .unwrap();
    session.toggle_auto_play();

    // Switch away before the first conversion finishes
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.next().unwrap();

    let event = wait_for_event(&mut events, |e| matches!(e, ViewerEvent::PlatformAssetAttached { .. })).await;
    match event {
        ViewerEvent::PlatformAssetAttached { index, .. } => assert_eq!(index, 1),
        _ => unreachable!(),
    }
    assert_eq!(viewer.platform_asset().as_deref(), Some("m1.usdz"));
}

#[tokio::test]
async fn test_bootstrap_loads_directory_from_fallback() {
    let primary = spawn_endpoint(Reply::Status(500)).await;
    let fallback = spawn_endpoint(Reply::Json(webhook_payload(&models(3)))).await;
    let gateway = FetchGateway::with_endpoints(&primary.url, &fallback.url, Duration::from_secs(5)).unwrap();
    let ctx = SessionContext::new(EventBus::new(16));
    let mut events = ctx.events().subscribe();

    let directory = bootstrap(&ctx, &gateway, "sample", &CancellationToken::new()).await.unwrap();

    assert_eq!(directory.len(), 3);
    match events.recv().await.unwrap() {
        ViewerEvent::DirectoryLoaded { model_count, .. } => assert_eq!(model_count, 3),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_bootstrap_failures_are_shown() {
    let primary = spawn_endpoint(Reply::Status(500)).await;
    let fallback = spawn_endpoint(Reply::Status(502)).await;
    let gateway = FetchGateway::with_endpoints(&primary.url, &fallback.url, Duration::from_secs(5)).unwrap();
    let ctx = SessionContext::new(EventBus::new(16));

    let err = bootstrap(&ctx, &gateway, "sample", &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
    assert!(ctx.last_error().unwrap().starts_with("Failed to load models"));

    let empty = spawn_endpoint(Reply::Json(json!([{ "data": "{}" }]))).await;
    let gateway = FetchGateway::with_endpoints(&empty.url, &empty.url, Duration::from_secs(5)).unwrap();
    let err = bootstrap(&ctx, &gateway, "sample", &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::EmptyDirectory(_)));
    assert_eq!(ctx.last_error().as_deref(), Some("Failed to prepare models for display."));
}

#[tokio::test]
async fn test_first_model_without_kpis_refuses_to_start() {
    let ctx = Arc::new(SessionContext::new(EventBus::new(16)));
    let viewer = Arc::new(HeadlessViewer::manual());

    let result = ViewerSession::start(
        Arc::clone(&ctx),
        directory(&[record_without_kpi("Empty", "e.glb"), record("A", "a.glb")]),
        viewer.clone(),
        None,
        Platform::Other,
        &PlaybackConfig::default(),
    );

    assert!(matches!(result, Err(Error::MissingKpi { .. })));
    assert_eq!(viewer.source(), None);
    assert!(!ctx.auto_play_running());
    assert_eq!(ctx.last_error().as_deref(), Some("No KPI data found for model: Empty"));
}

#[tokio::test]
async fn test_zero_auto_play_interval_is_rejected() {
    let ctx = Arc::new(SessionContext::new(EventBus::new(16)));
    let viewer = Arc::new(HeadlessViewer::manual());
    let playback = PlaybackConfig {
        auto_play_interval_ms: 0,
        ..PlaybackConfig::default()
    };

    let result = ViewerSession::start(
        Arc::clone(&ctx),
        directory(&models(3)),
        viewer.clone(),
        None,
        Platform::Other,
        &playback,
    );

    assert!(matches!(result, Err(Error::Common(_))));
    assert_eq!(viewer.source(), None);
    assert!(!ctx.auto_play_running());
}
