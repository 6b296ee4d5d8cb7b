//! Error types for session negotiation and lifecycle operations

use thiserror::Error;

use crate::types::HandleId;

/// Errors surfaced by the session coordination layer.
///
/// Handle-local failures (a single subscriber negotiation going wrong) close
/// only the affected handle; publisher failures and protocol violations
/// escalate to full session teardown. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid capture or session parameters, rejected before session start.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No usable camera, screen or file capture source.
    #[error("Capture device error: {0}")]
    CaptureDevice(String),

    /// Camera enumeration produced no constructible capturer.
    #[error("No usable capture device")]
    NoCaptureDevice,

    /// Screen-capture permission was missing or revoked.
    #[error("User revoked capture permission: {0}")]
    UserRevokedPermission(String),

    /// The gateway referenced an unknown handle or sent a malformed payload.
    #[error("Signaling protocol error: {0}")]
    SignalingProtocol(String),

    /// The media engine reported a peer-connection failure.
    #[error("Media engine error on handle {handle}: {message}")]
    MediaEngine { handle: HandleId, message: String },

    /// `start_session` was called while a session is already active.
    #[error("Session already active")]
    AlreadyActive,

    /// An operation that needs a running session was called outside one.
    #[error("Session not active")]
    NotActive,

    /// Lookup of a handle that is not in the registry.
    #[error("Handle not found: {0}")]
    HandleNotFound(HandleId),

    /// The signaling channel failed to deliver a command.
    #[error("Signaling channel error: {0}")]
    Channel(String),

    /// An event arrived in a state where it is not legal.
    #[error("Invalid transition on handle {handle}: {message}")]
    InvalidTransition { handle: HandleId, message: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;
