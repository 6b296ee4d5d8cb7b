//! # videoroom-core
//!
//! Session negotiation core for a multi-party video room brokered by a
//! signaling gateway. One publisher handle carries the local media upstream;
//! one subscriber handle is attached per remote feed. Each handle runs its
//! own SDP offer/answer exchange with trickled ICE, and all of them negotiate
//! concurrently.
//!
//! The crate deliberately owns only the protocol choreography. The gateway
//! transport, the WebRTC engine, capture devices and audio routing are
//! external collaborators behind the [`SignalingChannel`], [`MediaEngine`],
//! [`CameraEnumerator`] and [`AudioRouter`] traits; the embedding application
//! observes the session through [`SessionHandler`].
//!
//! ## Architecture
//!
//! ```text
//! SignalingChannel ──┐                      ┌──> SignalingChannel commands
//!                    ├──> mpsc ──> event ───┤
//! MediaEngine ───────┘          loop (one   └──> MediaEngine commands
//!   callbacks                   consumer)
//! ```
//!
//! Both callback sources feed one channel; a single task consumes it and is
//! the only mutator of session state. Per handle, a pure
//! [`NegotiationStateMachine`] turns each event into the commands to issue,
//! so the protocol rules live in synchronous, directly testable code.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use videoroom_core::{
//!     CapturePlatform, NullSessionHandler, SessionConfig, SessionOrchestrator,
//! };
//! # use videoroom_core::{AudioRouter, CameraEnumerator, MediaEngine, SignalingChannel};
//! # fn collaborators() -> (
//! #     Arc<dyn SignalingChannel>,
//! #     Arc<dyn MediaEngine>,
//! #     Arc<dyn AudioRouter>,
//! #     Box<dyn CameraEnumerator + Send + Sync>,
//! #     Box<dyn CameraEnumerator + Send + Sync>,
//! # ) { unimplemented!() }
//!
//! # async fn run() -> videoroom_core::Result<()> {
//! let (signaling, media, audio, camera1, camera2) = collaborators();
//! let orchestrator = SessionOrchestrator::new(
//!     SessionConfig::default(),
//!     CapturePlatform { camera1, camera2, screen_token: None },
//!     signaling,
//!     media,
//!     audio,
//!     Arc::new(NullSessionHandler),
//! );
//!
//! // Hand orchestrator.events() to the two collaborators, then:
//! orchestrator
//!     .start_session("wss://gateway.example.com", 1234, "alice", 8)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod capture;
mod config;
mod coordinator;
mod errors;
mod events;
mod media;
mod negotiation;
mod registry;
mod signaling;
mod types;

pub use capture::{
    select_capture_source, CameraCapturer, CameraEnumerator, CameraGeneration, CaptureSource,
    ScreenShareToken,
};
pub use config::{CaptureConfig, SessionConfig};
pub use coordinator::{CapturePlatform, SessionOrchestrator};
pub use errors::{Result, SessionError};
pub use events::{NullSessionHandler, SessionEvent, SessionEvents, SessionHandler};
pub use media::{AudioRouter, MediaEngine, MediaEvent, RenderTarget};
pub use negotiation::{
    Command, HandleEvent, MediaCommand, NegotiationState, NegotiationStateMachine,
    SignalingCommand,
};
pub use registry::HandleRegistry;
pub use signaling::{SignalingChannel, SignalingEvent};
pub use types::{
    HandleId, HandleRole, IceCandidate, SdpType, SessionDescription, TrickleItem,
};
