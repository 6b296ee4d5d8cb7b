#![allow(dead_code)]

//! Mock collaborators shared by the integration tests.
//!
//! Each mock records the commands the coordinator issues to it; tests drive
//! the session by pushing events through `SessionEvents` and then assert on
//! the recorded call sequences and the observable session state.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use videoroom_core::{
    AudioRouter, CameraCapturer, CameraEnumerator, CapturePlatform, CaptureSource, HandleId,
    IceCandidate, MediaEngine, RenderTarget, Result, SessionConfig, SessionDescription,
    SessionError, SessionHandler, SessionOrchestrator,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingCall {
    Connect {
        room_id: u64,
        user_id: String,
        max_bitrate_kbps: Option<u32>,
    },
    Disconnect,
    PublisherOffer(HandleId, SessionDescription),
    SubscriberAnswer(HandleId, SessionDescription),
    TrickleCandidate(HandleId, IceCandidate),
    TrickleComplete(HandleId),
    StartRecording(HandleId, Option<String>),
    StopRecording(HandleId),
}

#[derive(Default)]
pub struct MockSignaling {
    pub calls: Mutex<Vec<SignalingCall>>,
    /// When set, every negotiation command fails with a channel error.
    pub fail_commands: AtomicBool,
    /// Artificial latency for `connect`, to widen start-up race windows.
    pub connect_delay_ms: AtomicU64,
}

impl MockSignaling {
    pub fn calls(&self) -> Vec<SignalingCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: SignalingCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_commands.load(Ordering::Relaxed) {
            Err(SessionError::Channel("mock channel down".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl videoroom_core::SignalingChannel for MockSignaling {
    async fn connect(
        &self,
        _server_target: &str,
        room_id: u64,
        user_id: &str,
        _max_participants: u32,
        video_max_bitrate_kbps: Option<u32>,
    ) -> Result<()> {
        let delay = self.connect_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.calls.lock().unwrap().push(SignalingCall::Connect {
            room_id,
            user_id: user_id.to_string(),
            max_bitrate_kbps: video_max_bitrate_kbps,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.calls.lock().unwrap().push(SignalingCall::Disconnect);
        Ok(())
    }

    async fn publisher_offer(&self, handle: HandleId, sdp: &SessionDescription) -> Result<()> {
        self.record(SignalingCall::PublisherOffer(handle, sdp.clone()))
    }

    async fn subscriber_answer(&self, handle: HandleId, sdp: &SessionDescription) -> Result<()> {
        self.record(SignalingCall::SubscriberAnswer(handle, sdp.clone()))
    }

    async fn trickle_candidate(&self, handle: HandleId, candidate: &IceCandidate) -> Result<()> {
        self.record(SignalingCall::TrickleCandidate(handle, candidate.clone()))
    }

    async fn trickle_complete(&self, handle: HandleId) -> Result<()> {
        self.record(SignalingCall::TrickleComplete(handle))
    }

    async fn start_recording(&self, handle: HandleId, filename: Option<&str>) -> Result<()> {
        self.record(SignalingCall::StartRecording(
            handle,
            filename.map(str::to_string),
        ))
    }

    async fn stop_recording(&self, handle: HandleId) -> Result<()> {
        self.record(SignalingCall::StopRecording(handle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    CreatePeerConnection(HandleId),
    CreateOffer(HandleId),
    SetRemoteDescription(HandleId, SessionDescription),
    HandleRemoteOffer(HandleId, SessionDescription),
    AddRemoteCandidate(HandleId, IceCandidate),
    RemoteCandidatesComplete(HandleId),
    Close(HandleId),
    Dispose(HandleId),
    StartCapture(CaptureSource),
    StopCapture,
    SwitchCamera,
}

#[derive(Default)]
pub struct MockMedia {
    pub calls: Mutex<Vec<MediaCall>>,
    /// When set, `start_capture` fails, exercising the start_session cleanup
    /// path.
    pub fail_start_capture: AtomicBool,
}

impl MockMedia {
    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: MediaCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaEngine for MockMedia {
    async fn create_peer_connection(&self, handle: HandleId) -> Result<()> {
        self.record(MediaCall::CreatePeerConnection(handle));
        Ok(())
    }

    async fn create_offer(&self, handle: HandleId) -> Result<()> {
        self.record(MediaCall::CreateOffer(handle));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        handle: HandleId,
        sdp: &SessionDescription,
    ) -> Result<()> {
        self.record(MediaCall::SetRemoteDescription(handle, sdp.clone()));
        Ok(())
    }

    async fn handle_remote_offer(&self, handle: HandleId, sdp: &SessionDescription) -> Result<()> {
        self.record(MediaCall::HandleRemoteOffer(handle, sdp.clone()));
        Ok(())
    }

    async fn add_remote_candidate(
        &self,
        handle: HandleId,
        candidate: &IceCandidate,
    ) -> Result<()> {
        self.record(MediaCall::AddRemoteCandidate(handle, candidate.clone()));
        Ok(())
    }

    async fn remote_candidates_complete(&self, handle: HandleId) -> Result<()> {
        self.record(MediaCall::RemoteCandidatesComplete(handle));
        Ok(())
    }

    async fn close(&self, handle: HandleId) -> Result<()> {
        self.record(MediaCall::Close(handle));
        Ok(())
    }

    async fn dispose(&self, handle: HandleId) -> Result<()> {
        self.record(MediaCall::Dispose(handle));
        Ok(())
    }

    async fn start_capture(
        &self,
        source: &CaptureSource,
        _width: u32,
        _height: u32,
        _fps: u32,
    ) -> Result<()> {
        self.record(MediaCall::StartCapture(source.clone()));
        if self.fail_start_capture.load(Ordering::Relaxed) {
            Err(SessionError::CaptureDevice("mock capture refused".into()))
        } else {
            Ok(())
        }
    }

    async fn stop_capture(&self) -> Result<()> {
        self.record(MediaCall::StopCapture);
        Ok(())
    }

    async fn switch_camera(&self) -> Result<()> {
        self.record(MediaCall::SwitchCamera);
        Ok(())
    }

    async fn change_capture_format(&self, _width: u32, _height: u32, _fps: u32) -> Result<()> {
        Ok(())
    }

    async fn set_audio_enabled(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    async fn set_video_enabled(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    async fn set_video_render_target(
        &self,
        _handle: HandleId,
        _target: Option<RenderTarget>,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockAudio {
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
}

#[async_trait]
impl AudioRouter for MockAudio {
    async fn start(&self) -> Result<()> {
        self.started.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stopped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Records every outward callback the coordinator makes.
#[derive(Default)]
pub struct RecordingHandler {
    pub errors: Mutex<Vec<String>>,
    pub connected_handles: Mutex<Vec<HandleId>>,
    pub local_renders: Mutex<Vec<HandleId>>,
    pub remote_renders: Mutex<Vec<HandleId>>,
    pub ice_changes: Mutex<Vec<bool>>,
    pub departed: Mutex<Vec<HandleId>>,
    pub notifications: Mutex<Vec<String>>,
    pub ended: AtomicUsize,
}

impl RecordingHandler {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn ended_count(&self) -> usize {
        self.ended.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SessionHandler for RecordingHandler {
    async fn on_handle_connected(&self, handle: HandleId) {
        self.connected_handles.lock().unwrap().push(handle);
    }

    async fn on_local_render(&self, handle: HandleId) {
        self.local_renders.lock().unwrap().push(handle);
    }

    async fn on_remote_render(&self, handle: HandleId) {
        self.remote_renders.lock().unwrap().push(handle);
    }

    async fn on_ice_connectivity(&self, connected: bool) {
        self.ice_changes.lock().unwrap().push(connected);
    }

    async fn on_peer_left(&self, handle: HandleId) {
        self.departed.lock().unwrap().push(handle);
    }

    async fn on_notification(&self, message: &str) {
        self.notifications.lock().unwrap().push(message.to_string());
    }

    async fn on_error(&self, error: &SessionError) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    async fn on_session_ended(&self) {
        self.ended.fetch_add(1, Ordering::Relaxed);
    }
}

/// One front-facing constructible camera, the common happy path.
pub struct FrontCamera;

impl CameraEnumerator for FrontCamera {
    fn device_names(&self) -> Vec<String> {
        vec!["front".to_string()]
    }

    fn is_front_facing(&self, _device: &str) -> bool {
        true
    }

    fn create_capturer(&self, device: &str) -> Option<CameraCapturer> {
        Some(CameraCapturer {
            device_name: device.to_string(),
            front_facing: true,
        })
    }
}

pub struct Fixture {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub signaling: Arc<MockSignaling>,
    pub media: Arc<MockMedia>,
    pub audio: Arc<MockAudio>,
    pub handler: Arc<RecordingHandler>,
}

impl Fixture {
    pub fn new(config: SessionConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let signaling = Arc::new(MockSignaling::default());
        let media = Arc::new(MockMedia::default());
        let audio = Arc::new(MockAudio::default());
        let handler = Arc::new(RecordingHandler::default());
        let orchestrator = SessionOrchestrator::new(
            config,
            CapturePlatform {
                camera1: Box::new(FrontCamera),
                camera2: Box::new(FrontCamera),
                screen_token: None,
            },
            signaling.clone(),
            media.clone(),
            audio.clone(),
            handler.clone(),
        );
        Self {
            orchestrator,
            signaling,
            media,
            audio,
            handler,
        }
    }

    pub async fn start(&self) -> Result<()> {
        self.orchestrator
            .start_session("wss://gateway.test", 42, "alice", 8)
            .await
    }
}

/// Poll `condition` until it holds or a generous timeout elapses.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {}", what);
}
