//! Media engine and audio route interfaces.
//!
//! The engine performing SDP generation, ICE gathering and encoding is an
//! external collaborator. The coordinator issues fire-and-forget commands
//! through [`MediaEngine`]; results arrive later as [`MediaEvent`]s from the
//! engine's worker context.

use async_trait::async_trait;

use crate::capture::CaptureSource;
use crate::errors::Result;
use crate::types::{HandleId, IceCandidate, SessionDescription};

/// Opaque rendering surface identifier owned by the embedding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget(pub u64);

/// Commands issued toward the media engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn create_peer_connection(&self, handle: HandleId) -> Result<()>;

    /// Request a local offer; it comes back as
    /// [`MediaEvent::LocalDescription`].
    async fn create_offer(&self, handle: HandleId) -> Result<()>;

    /// Apply a remote answer to a handle that already offered.
    async fn set_remote_description(
        &self,
        handle: HandleId,
        sdp: &SessionDescription,
    ) -> Result<()>;

    /// Hand a remote offer to the engine and request an answer; the answer
    /// comes back as [`MediaEvent::LocalDescription`].
    async fn handle_remote_offer(&self, handle: HandleId, sdp: &SessionDescription) -> Result<()>;

    async fn add_remote_candidate(&self, handle: HandleId, candidate: &IceCandidate)
        -> Result<()>;

    /// Remote end-of-candidates marker for a handle.
    async fn remote_candidates_complete(&self, handle: HandleId) -> Result<()>;

    /// Close a handle's peer connection.
    async fn close(&self, handle: HandleId) -> Result<()>;

    /// Release a handle's remaining engine resources.
    async fn dispose(&self, handle: HandleId) -> Result<()>;

    /// Start feeding the engine from the selected capture source.
    async fn start_capture(
        &self,
        source: &CaptureSource,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<()>;

    async fn stop_capture(&self) -> Result<()>;

    async fn switch_camera(&self) -> Result<()>;

    async fn change_capture_format(&self, width: u32, height: u32, fps: u32) -> Result<()>;

    async fn set_audio_enabled(&self, enabled: bool) -> Result<()>;

    async fn set_video_enabled(&self, enabled: bool) -> Result<()>;

    async fn set_video_render_target(
        &self,
        handle: HandleId,
        target: Option<RenderTarget>,
    ) -> Result<()>;
}

/// Audio output route held for the session's lifetime.
#[async_trait]
pub trait AudioRouter: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Events delivered by the media engine, from its worker context.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    /// The engine produced the requested local offer or answer.
    LocalDescription {
        handle: HandleId,
        sdp: SessionDescription,
    },
    /// A locally gathered candidate; `None` marks gathering complete.
    LocalIceCandidate {
        handle: HandleId,
        candidate: Option<IceCandidate>,
    },
    /// Candidates withdrawn by the engine. Ignored by this core.
    IceCandidatesRemoved { handle: HandleId },
    IceConnected { handle: HandleId },
    IceDisconnected { handle: HandleId },
    /// The local video track is attached and ready to render.
    LocalRenderReady { handle: HandleId },
    /// A remote video track for the named handle is ready to render.
    RemoteRenderReady { handle: HandleId },
    /// A peer connection finished closing.
    PeerConnectionClosed { handle: HandleId },
    /// Statistics snapshot. Ignored by this core.
    StatsReady { handle: HandleId },
    /// Engine failure; `handle` is `None` when the engine cannot attribute
    /// the error, which the coordinator treats as session-fatal.
    PeerConnectionError {
        handle: Option<HandleId>,
        description: String,
    },
}
