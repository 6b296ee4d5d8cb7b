//! Session event fan-in and the outward callback surface.
//!
//! The signaling channel and the media engine each deliver callbacks on
//! their own execution context. Both are funneled through one mpsc channel
//! into the coordinator's single-consumer event loop, which preserves the
//! ordering and non-reentrancy assumptions the state machines rely on.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::SessionError;
use crate::media::MediaEvent;
use crate::signaling::SignalingEvent;
use crate::types::HandleId;

/// One event on the coordinator's loop, from either inbound source.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Signaling(SignalingEvent),
    Media(MediaEvent),
    /// Internal control message: run session teardown and stop the loop.
    Shutdown,
}

/// Cloneable sender handed to the two collaborators so they can deliver
/// their callbacks into the coordinator's loop.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Deliver a signaling-channel event. Delivery after teardown is
    /// silently dropped.
    pub async fn signaling(&self, event: SignalingEvent) {
        if self.tx.send(SessionEvent::Signaling(event)).await.is_err() {
            tracing::debug!("signaling event dropped, session loop gone");
        }
    }

    /// Deliver a media-engine event. Delivery after teardown is silently
    /// dropped.
    pub async fn media(&self, event: MediaEvent) {
        if self.tx.send(SessionEvent::Media(event)).await.is_err() {
            tracing::debug!("media event dropped, session loop gone");
        }
    }

    pub(crate) async fn shutdown(&self) -> bool {
        self.tx.send(SessionEvent::Shutdown).await.is_ok()
    }
}

/// Outward callback surface for the embedding application.
///
/// All user-visible failures arrive through [`on_error`]; the core never
/// panics or returns errors past this boundary.
///
/// [`on_error`]: SessionHandler::on_error
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// A handle reached ICE connectivity.
    async fn on_handle_connected(&self, _handle: HandleId) {}

    /// The local video track is ready for rendering.
    async fn on_local_render(&self, _handle: HandleId) {}

    /// A remote handle's video track is ready for rendering.
    async fn on_remote_render(&self, _handle: HandleId) {}

    /// The session-wide ICE connectivity flag changed.
    async fn on_ice_connectivity(&self, _connected: bool) {}

    /// A remote party left and its handle was released.
    async fn on_peer_left(&self, _handle: HandleId) {}

    /// Informational gateway notice.
    async fn on_notification(&self, _message: &str) {}

    /// A negotiation or engine failure. Handle-local failures name the
    /// handle; session-fatal ones are followed by `on_session_ended`.
    async fn on_error(&self, _error: &SessionError) {}

    /// Teardown completed and the registry is empty.
    async fn on_session_ended(&self) {}
}

/// No-op handler for embeddings that poll state instead of reacting.
#[derive(Debug, Default)]
pub struct NullSessionHandler;

#[async_trait]
impl SessionHandler for NullSessionHandler {}
