//! Signaling channel interface.
//!
//! The transport that actually talks to the gateway lives outside this crate;
//! the coordinator only issues commands through [`SignalingChannel`] and
//! consumes [`SignalingEvent`]s delivered into its event loop. Message
//! framing, transactions and keepalives are the implementation's business.

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{HandleId, IceCandidate, SessionDescription, TrickleItem};

/// Commands issued toward the gateway.
///
/// Implementations report delivery failures as [`SessionError::Channel`];
/// the coordinator treats those as session-fatal.
///
/// [`SessionError::Channel`]: crate::errors::SessionError::Channel
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Establish connectivity and join the room, advertising the publisher's
    /// video bitrate cap to the gateway when one is configured.
    async fn connect(
        &self,
        server_target: &str,
        room_id: u64,
        user_id: &str,
        max_participants: u32,
        video_max_bitrate_kbps: Option<u32>,
    ) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Send the publisher's local offer.
    async fn publisher_offer(&self, handle: HandleId, sdp: &SessionDescription) -> Result<()>;

    /// Send a subscriber's local answer.
    async fn subscriber_answer(&self, handle: HandleId, sdp: &SessionDescription) -> Result<()>;

    async fn trickle_candidate(&self, handle: HandleId, candidate: &IceCandidate) -> Result<()>;

    /// Mark end of local candidate discovery for a handle.
    async fn trickle_complete(&self, handle: HandleId) -> Result<()>;

    /// Ask the gateway to record a handle's stream. Completion is the
    /// returned result.
    async fn start_recording(&self, handle: HandleId, filename: Option<&str>) -> Result<()>;

    async fn stop_recording(&self, handle: HandleId) -> Result<()>;
}

/// Events delivered by the signaling channel, from its own I/O context.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// The local publisher handle was accepted into the room.
    PublisherJoined { handle: HandleId },
    /// The gateway attached a subscriber handle for a remote feed; its offer
    /// follows as a `RemoteJsep`.
    SubscriberAttached { handle: HandleId },
    /// A remote session description for the named handle, as the opaque JSEP
    /// JSON the gateway sent.
    RemoteJsep {
        handle: HandleId,
        jsep: serde_json::Value,
    },
    /// A remote trickled candidate, or the end-of-candidates marker, for the
    /// named handle.
    RemoteCandidate {
        handle: HandleId,
        item: TrickleItem,
    },
    /// The named party left the room.
    Left { handle: HandleId },
    /// Informational gateway notice, passed through to the handler.
    Notification { message: String },
    /// The channel closed normally.
    ChannelClosed,
    /// The channel failed.
    ChannelError { message: String },
}
