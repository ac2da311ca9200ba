// Integration tests for the capture session graph and data flow
//
// These tests run against the virtual backend, so frames really flow
// through the routing task.

mod common;

use anyhow::Result;
use common::MemorySink;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use video_recorder::capture::{
    CaptureBackend, DeviceSelector, VirtualBackend, VirtualDevice, MAX_FRAME_RATE,
};
use video_recorder::{
    CaptureError, CaptureSession, DeviceDescriptor, DeviceKind, Facing, LensClass, OutputKind,
    PresetOutcome, SessionPreset,
};

fn session_on(backend: VirtualBackend) -> (CaptureSession, Arc<VirtualBackend>) {
    let backend = Arc::new(backend);
    let session = CaptureSession::new(backend.clone(), Arc::new(MemorySink::new()));
    (session, backend)
}

fn device(backend: &VirtualBackend, id: &str) -> DeviceDescriptor {
    backend
        .devices()
        .into_iter()
        .find(|d| d.id == id)
        .expect("device in profile")
}

fn back_camera(backend: &VirtualBackend) -> DeviceDescriptor {
    DeviceSelector::new(backend)
        .resolve(DeviceKind::Camera, &[LensClass::UltraWide, LensClass::WideAngle])
        .unwrap()
}

async fn configured(preset: SessionPreset) -> Result<(CaptureSession, Arc<VirtualBackend>)> {
    let (mut session, backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    session.add_input(device(&backend, "back-wide"))?;
    assert_eq!(session.try_set_quality(preset)?, PresetOutcome::Applied);
    session.add_output(OutputKind::Preview)?;
    session.add_output(OutputKind::FileRecording)?;
    session.commit_configuration().await?;

    Ok((session, backend))
}

#[test]
fn test_mutations_outside_transaction_are_rejected() {
    let (mut session, backend) = session_on(VirtualBackend::phone());
    let camera = back_camera(&backend);

    assert!(matches!(
        session.add_input(camera),
        Err(CaptureError::ConfigurationRejected(_))
    ));
    assert!(matches!(
        session.add_output(OutputKind::Preview),
        Err(CaptureError::ConfigurationRejected(_))
    ));
    assert!(matches!(
        session.try_set_quality(SessionPreset::Hd1080),
        Err(CaptureError::ConfigurationRejected(_))
    ));
    assert!(session.graph().inputs.is_empty());
}

#[tokio::test]
async fn test_commit_without_begin_is_rejected() {
    let (mut session, _backend) = session_on(VirtualBackend::phone());

    assert!(matches!(
        session.commit_configuration().await,
        Err(CaptureError::ConfigurationRejected(_))
    ));
}

#[test]
fn test_nested_transaction_is_rejected() -> Result<()> {
    let (mut session, backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    assert!(matches!(
        session.begin_configuration(),
        Err(CaptureError::ConfigurationRejected(_))
    ));

    // The outer transaction is still usable
    session.add_input(back_camera(&backend))?;
    assert!(session.is_configuring());

    Ok(())
}

#[test]
fn test_second_camera_is_rejected() -> Result<()> {
    let (mut session, backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    session.add_input(device(&backend, "back-wide"))?;

    let result = session.add_input(device(&backend, "front-wide"));
    assert!(matches!(result, Err(CaptureError::ConfigurationRejected(_))));

    Ok(())
}

#[test]
fn test_same_device_twice_is_rejected() -> Result<()> {
    let (mut session, backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    session.add_input(device(&backend, "builtin-mic"))?;
    assert!(session.add_input(device(&backend, "builtin-mic")).is_err());

    Ok(())
}

#[test]
fn test_output_before_input_is_rejected() -> Result<()> {
    let (mut session, _backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    assert!(matches!(
        session.add_output(OutputKind::FileRecording),
        Err(CaptureError::ConfigurationRejected(_))
    ));

    Ok(())
}

#[test]
fn test_duplicate_output_is_rejected() -> Result<()> {
    let (mut session, backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    session.add_input(back_camera(&backend))?;
    session.add_output(OutputKind::FileRecording)?;
    assert!(session.add_output(OutputKind::FileRecording).is_err());

    Ok(())
}

#[test]
fn test_unopenable_device_is_rejected() -> Result<()> {
    let (mut session, backend) = session_on(VirtualBackend::new(vec![VirtualDevice::camera(
        "busy",
        LensClass::WideAngle,
        Facing::Back,
        vec![],
    )
    .unopenable()]));

    session.begin_configuration()?;
    let result = session.add_input(device(&backend, "busy"));
    assert!(matches!(result, Err(CaptureError::ConfigurationRejected(_))));

    Ok(())
}

#[test]
fn test_disconnected_device_is_unavailable() -> Result<()> {
    let other = VirtualBackend::phone();
    let stale = device(&other, "back-wide");
    let (mut session, _backend) = session_on(VirtualBackend::new(Vec::new()));

    session.begin_configuration()?;
    assert!(matches!(
        session.add_input(stale),
        Err(CaptureError::DeviceUnavailable(DeviceKind::Camera))
    ));

    Ok(())
}

#[tokio::test]
async fn test_preset_falls_back_to_default() -> Result<()> {
    let (mut session, backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    // Ultra-wide only offers 1080p and 720p
    session.add_input(device(&backend, "back-ultra-wide"))?;

    assert_eq!(
        session.try_set_quality(SessionPreset::Hd4K)?,
        PresetOutcome::Unsupported
    );
    assert_eq!(
        session.negotiate_quality(&[SessionPreset::Hd4K])?,
        SessionPreset::Default
    );
    assert_eq!(
        session.negotiate_quality(&[SessionPreset::Hd4K, SessionPreset::Hd1080])?,
        SessionPreset::Hd1080
    );

    session.commit_configuration().await?;
    assert_eq!(session.preset(), SessionPreset::Hd1080);

    Ok(())
}

#[tokio::test]
async fn test_changes_apply_only_on_commit() -> Result<()> {
    let (mut session, backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    session.add_input(back_camera(&backend))?;
    session.add_output(OutputKind::Preview)?;
    assert!(session.graph().inputs.is_empty());
    assert!(session.graph().outputs.is_empty());

    session.commit_configuration().await?;
    assert_eq!(session.graph().inputs.len(), 1);
    assert_eq!(session.graph().outputs, vec![OutputKind::Preview]);

    Ok(())
}

#[tokio::test]
async fn test_cancelled_configuration_is_discarded() -> Result<()> {
    let (mut session, backend) = session_on(VirtualBackend::phone());

    session.begin_configuration()?;
    session.add_input(back_camera(&backend))?;
    session.cancel_configuration();

    assert!(!session.is_configuring());
    assert!(session.graph().inputs.is_empty());
    session.begin_configuration()?;

    Ok(())
}

#[tokio::test]
async fn test_start_and_stop_rejected_inside_transaction() -> Result<()> {
    let (mut session, _backend) = configured(SessionPreset::Vga).await?;

    session.begin_configuration()?;
    assert!(matches!(
        session.start().await,
        Err(CaptureError::ConfigurationRejected(_))
    ));
    assert!(!session.is_running());
    session.cancel_configuration();

    session.start().await?;
    session.begin_configuration()?;
    assert!(session.stop().await.is_err());
    assert!(session.is_running());
    session.cancel_configuration();

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() -> Result<()> {
    let (mut session, backend) = configured(SessionPreset::Vga).await?;

    session.stop().await?;
    assert!(!session.is_running());

    session.start().await?;
    session.start().await?;
    assert!(session.is_running());
    assert!(backend.is_capturing());

    session.stop().await?;
    session.stop().await?;
    assert!(!session.is_running());
    assert!(!backend.is_capturing());

    Ok(())
}

#[tokio::test]
async fn test_start_without_inputs_is_rejected() {
    let (mut session, _backend) = session_on(VirtualBackend::phone());

    assert!(matches!(
        session.start().await,
        Err(CaptureError::ConfigurationRejected(_))
    ));
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_committed_graph_feeds_preview_on_start() -> Result<()> {
    let (mut session, _backend) = configured(SessionPreset::Vga).await?;
    let mut preview = session.preview().subscribe();

    session.start().await?;
    timeout(Duration::from_secs(2), preview.changed()).await??;

    let frame = session.preview().latest().expect("preview frame");
    assert_eq!((frame.width, frame.height), (640, 480));

    session.stop().await?;
    assert!(session.preview().latest().is_none());
    assert!(session.snapshot().samples_routed > 0);

    Ok(())
}

#[tokio::test]
async fn test_commit_while_running_restarts_with_new_preset() -> Result<()> {
    let (mut session, _backend) = configured(SessionPreset::Vga).await?;
    session.start().await?;

    session.begin_configuration()?;
    assert_eq!(
        session.try_set_quality(SessionPreset::Hd720)?,
        PresetOutcome::Applied
    );
    session.commit_configuration().await?;
    assert!(session.is_running());

    let mut preview = session.preview().subscribe();
    timeout(Duration::from_secs(2), async {
        loop {
            preview.changed().await?;
            if let Some(frame) = preview.borrow_and_update().clone() {
                if frame.width == 1280 {
                    return anyhow::Ok(());
                }
            }
        }
    })
    .await??;

    session.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_snapshot_reflects_graph() -> Result<()> {
    let (session, _backend) = configured(SessionPreset::Vga).await?;
    let snapshot = session.snapshot();

    assert!(!snapshot.running);
    assert!(!snapshot.configuring);
    assert_eq!(snapshot.preset, SessionPreset::Vga);
    assert_eq!(snapshot.inputs.len(), 1);
    assert_eq!(
        snapshot.outputs,
        vec![OutputKind::Preview, OutputKind::FileRecording]
    );

    Ok(())
}

#[tokio::test]
async fn test_excessive_frame_rate_still_streams() -> Result<()> {
    let backend = VirtualBackend::phone().with_frame_rate(2000);
    assert_eq!(backend.frame_rate(), MAX_FRAME_RATE);

    let (mut session, backend) = session_on(backend);
    session.begin_configuration()?;
    session.add_input(device(&backend, "back-wide"))?;
    session.try_set_quality(SessionPreset::Vga)?;
    session.add_output(OutputKind::Preview)?;
    session.commit_configuration().await?;

    let mut preview = session.preview().subscribe();
    session.start().await?;
    timeout(Duration::from_secs(2), preview.changed()).await??;

    assert!(session.snapshot().samples_routed > 0);
    assert!(backend.is_capturing());

    session.teardown().await?;
    assert!(!backend.is_capturing());
    Ok(())
}
