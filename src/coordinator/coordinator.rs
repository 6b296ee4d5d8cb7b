//! The session orchestrator: single entry and exit point for the whole call
//! lifecycle.
//!
//! Owns the handle registry and every per-handle state machine. The two
//! collaborators deliver their callbacks through [`SessionEvents`] into one
//! mpsc channel; a single spawned task consumes it and is the only mutator
//! of session state, so the protocol logic needs no internal locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::capture::{select_capture_source, CameraEnumerator, ScreenShareToken};
use crate::config::SessionConfig;
use crate::errors::{Result, SessionError};
use crate::events::{SessionEvent, SessionEvents, SessionHandler};
use crate::media::{AudioRouter, MediaEngine, RenderTarget};
use crate::negotiation::NegotiationState;
use crate::registry::HandleRegistry;
use crate::signaling::SignalingChannel;
use crate::types::HandleId;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Platform capture facilities, supplied by the embedding layer.
pub struct CapturePlatform {
    /// First-generation camera enumeration.
    pub camera1: Box<dyn CameraEnumerator + Send + Sync>,
    /// Second-generation camera enumeration.
    pub camera2: Box<dyn CameraEnumerator + Send + Sync>,
    /// Screen-capture authorization obtained before session start, if any.
    pub screen_token: Option<ScreenShareToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    /// `start_session` is in flight; reserves the slot so a concurrent call
    /// fails with `AlreadyActive` instead of racing for the event receiver.
    Starting,
    Active,
    Ended,
}

/// Coordinates session establishment, per-handle negotiation fan-out, and
/// deterministic teardown.
pub struct SessionOrchestrator {
    pub(crate) config: SessionConfig,
    platform: CapturePlatform,
    pub(crate) signaling: Arc<dyn SignalingChannel>,
    pub(crate) media: Arc<dyn MediaEngine>,
    audio: Arc<dyn AudioRouter>,
    pub(crate) handler: Arc<dyn SessionHandler>,
    pub(crate) registry: Arc<HandleRegistry>,

    lifecycle: Mutex<Lifecycle>,
    pub(crate) publisher: Mutex<Option<HandleId>>,
    pub(crate) ice_connected: AtomicBool,
    torn_down: AtomicBool,

    events: SessionEvents,
    event_rx: AsyncMutex<Option<mpsc::Receiver<SessionEvent>>>,
    loop_handle: AsyncMutex<Option<JoinHandle<()>>>,

    // Back-reference for spawning the event loop from &self.
    self_weak: Weak<Self>,
}

impl SessionOrchestrator {
    pub fn new(
        config: SessionConfig,
        platform: CapturePlatform,
        signaling: Arc<dyn SignalingChannel>,
        media: Arc<dyn MediaEngine>,
        audio: Arc<dyn AudioRouter>,
        handler: Arc<dyn SessionHandler>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new_cyclic(|self_weak| Self {
            config,
            platform,
            signaling,
            media,
            audio,
            handler,
            registry: Arc::new(HandleRegistry::new()),
            lifecycle: Mutex::new(Lifecycle::NotStarted),
            publisher: Mutex::new(None),
            ice_connected: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            events: SessionEvents::new(tx),
            event_rx: AsyncMutex::new(Some(rx)),
            loop_handle: AsyncMutex::new(None),
            self_weak: self_weak.clone(),
        })
    }

    /// Sender the collaborators use to deliver their callbacks into the
    /// session event loop.
    pub fn events(&self) -> SessionEvents {
        self.events.clone()
    }

    /// Establish the session: validate configuration, pick the capture
    /// source, connect to the gateway, start the audio route, and spawn the
    /// event loop.
    ///
    /// Legal exactly once, from the not-started state; any later call fails
    /// with [`SessionError::AlreadyActive`].
    pub async fn start_session(
        &self,
        server_target: &str,
        room_id: u64,
        user_id: &str,
        max_participants: u32,
    ) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock().expect("lifecycle lock");
            if *lifecycle != Lifecycle::NotStarted {
                return Err(SessionError::AlreadyActive);
            }
            *lifecycle = Lifecycle::Starting;
        }

        match self
            .establish(server_target, room_id, user_id, max_participants)
            .await
        {
            Ok(()) => {
                *self.lifecycle.lock().expect("lifecycle lock") = Lifecycle::Active;
                tracing::info!(server_target, room_id, user_id, "session started");
                Ok(())
            }
            Err(e) => {
                // Release the slot so a corrected caller can start again.
                *self.lifecycle.lock().expect("lifecycle lock") = Lifecycle::NotStarted;
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        server_target: &str,
        room_id: u64,
        user_id: &str,
        max_participants: u32,
    ) -> Result<()> {
        self.config.validate()?;

        // Capture selection happens before any side effect so a broken
        // configuration leaves nothing to clean up.
        let capture = if self.config.video_enabled {
            Some(select_capture_source(
                &self.config.capture,
                self.platform.screen_token.as_ref(),
                self.platform.camera2.as_ref(),
                self.platform.camera1.as_ref(),
            )?)
        } else {
            None
        };

        self.signaling
            .connect(
                server_target,
                room_id,
                user_id,
                max_participants,
                self.config.video_max_bitrate_kbps,
            )
            .await?;

        if let Some(source) = &capture {
            if let Err(e) = self
                .media
                .start_capture(
                    source,
                    self.config.video_width,
                    self.config.video_height,
                    self.config.video_fps,
                )
                .await
            {
                let _ = self.signaling.disconnect().await;
                return Err(e);
            }
        }

        if let Err(e) = self.audio.start().await {
            let _ = self.media.stop_capture().await;
            let _ = self.signaling.disconnect().await;
            return Err(e);
        }

        let rx = self
            .event_rx
            .lock()
            .await
            .take()
            .expect("event receiver consumed before start");
        let orchestrator = self.self_weak.upgrade().expect("orchestrator dropped");
        let handle = tokio::spawn(async move {
            orchestrator.run_event_loop(rx).await;
        });
        *self.loop_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Disconnect and release everything. Safe to call repeatedly; the
    /// second and later calls are no-ops.
    pub async fn disconnect(&self) -> Result<()> {
        if self.torn_down.load(Ordering::Acquire) {
            return Ok(());
        }

        let active = *self.lifecycle.lock().expect("lifecycle lock") == Lifecycle::Active;
        if active && self.events.shutdown().await {
            // The loop runs teardown and exits; wait for it.
            if let Some(handle) = self.loop_handle.lock().await.take() {
                let _ = handle.await;
            }
        } else {
            self.teardown("disconnect requested").await;
        }
        Ok(())
    }

    /// Release shared resources and empty the registry. Runs at most once;
    /// every later invocation is a no-op.
    pub(crate) async fn teardown(&self, reason: &str) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(%reason, "tearing down session");

        if let Err(e) = self.signaling.disconnect().await {
            tracing::warn!(error = %e, "signaling disconnect during teardown failed");
        }

        for handle in self.registry.drain() {
            if let Err(e) = self.media.close(handle).await {
                tracing::warn!(%handle, error = %e, "close during teardown failed");
            }
            if let Err(e) = self.media.dispose(handle).await {
                tracing::warn!(%handle, error = %e, "dispose during teardown failed");
            }
        }

        if let Err(e) = self.media.stop_capture().await {
            tracing::warn!(error = %e, "stop capture during teardown failed");
        }
        if let Err(e) = self.audio.stop().await {
            tracing::warn!(error = %e, "audio route stop during teardown failed");
        }

        self.ice_connected.store(false, Ordering::Release);
        *self.lifecycle.lock().expect("lifecycle lock") = Lifecycle::Ended;
        self.handler.on_session_ended().await;
        tracing::info!("session teardown complete");
    }

    // ------------------------------------------------------------------
    // Pass-through controls, legal only while the session is active.
    // ------------------------------------------------------------------

    fn ensure_active(&self) -> Result<()> {
        if *self.lifecycle.lock().expect("lifecycle lock") == Lifecycle::Active
            && !self.torn_down.load(Ordering::Acquire)
        {
            Ok(())
        } else {
            Err(SessionError::NotActive)
        }
    }

    pub async fn switch_camera(&self) -> Result<()> {
        self.ensure_active()?;
        self.media.switch_camera().await
    }

    pub async fn change_capture_format(&self, width: u32, height: u32, fps: u32) -> Result<()> {
        self.ensure_active()?;
        self.media.change_capture_format(width, height, fps).await
    }

    pub async fn set_audio_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_active()?;
        self.media.set_audio_enabled(enabled).await
    }

    pub async fn set_video_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_active()?;
        self.media.set_video_enabled(enabled).await
    }

    pub async fn set_video_render_target(
        &self,
        handle: HandleId,
        target: Option<RenderTarget>,
    ) -> Result<()> {
        self.ensure_active()?;
        if !self.registry.contains(handle) {
            return Err(SessionError::HandleNotFound(handle));
        }
        self.media.set_video_render_target(handle, target).await
    }

    /// Ask the gateway to record a handle's stream; completion is the
    /// returned result.
    pub async fn start_recording(&self, handle: HandleId, filename: Option<&str>) -> Result<()> {
        self.ensure_active()?;
        if !self.registry.contains(handle) {
            return Err(SessionError::HandleNotFound(handle));
        }
        self.signaling.start_recording(handle, filename).await
    }

    pub async fn stop_recording(&self, handle: HandleId) -> Result<()> {
        self.ensure_active()?;
        if !self.registry.contains(handle) {
            return Err(SessionError::HandleNotFound(handle));
        }
        self.signaling.stop_recording(handle).await
    }

    // ------------------------------------------------------------------
    // State inspection.
    // ------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        self.ensure_active().is_ok()
    }

    /// Session-wide ICE connectivity flag.
    pub fn ice_connected(&self) -> bool {
        self.ice_connected.load(Ordering::Acquire)
    }

    pub fn publisher_handle(&self) -> Option<HandleId> {
        *self.publisher.lock().expect("publisher lock")
    }

    pub fn active_handles(&self) -> Vec<HandleId> {
        self.registry.handles()
    }

    pub fn handle_state(&self, handle: HandleId) -> Option<NegotiationState> {
        self.registry.state_of(handle)
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("config", &self.config)
            .field("handles", &self.registry.len())
            .field("ice_connected", &self.ice_connected())
            .finish()
    }
}
