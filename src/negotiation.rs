//! Per-handle negotiation state machine.
//!
//! One instance per handle. The machine is pure: it consumes one
//! [`HandleEvent`] at a time and returns the commands to dispatch toward the
//! signaling channel and the media engine. It performs no I/O and holds no
//! locks; the coordinator's event loop is its only caller, so transitions are
//! naturally serialized.
//!
//! The one genuinely ordering-sensitive piece is the pending-candidate queue:
//! remote ICE candidates and the local description are produced by two
//! independent asynchronous sources and may race. Candidates that arrive
//! before the local description exists are buffered and replayed in arrival
//! order the moment the description is set, so nothing is dropped or
//! reordered.

use std::collections::VecDeque;

use crate::errors::{Result, SessionError};
use crate::types::{
    HandleId, HandleRole, IceCandidate, SdpType, SessionDescription, TrickleItem,
};

/// Negotiation progress for one handle.
///
/// `AwaitingRole → {Offering, Answering} → IceGathering → Connected → Closed`,
/// with `Failed` absorbing from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    /// Handle created, role not yet determined.
    AwaitingRole,
    /// A local offer has been requested from the media engine.
    Offering,
    /// A remote offer was handed to the media engine; a local answer is
    /// pending.
    Answering,
    /// Local description produced and sent; candidates may still trickle in
    /// either direction.
    IceGathering,
    /// ICE connectivity confirmed.
    Connected,
    /// Handle released, resources returned.
    Closed,
    /// Protocol or media failure; carries the human-readable cause.
    Failed(String),
}

impl NegotiationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Closed | NegotiationState::Failed(_))
    }
}

/// Inbound events, already routed to this handle by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleEvent {
    RoleAssigned(HandleRole),
    LocalDescriptionReady(SessionDescription),
    RemoteOffer(SessionDescription),
    RemoteAnswer(SessionDescription),
    /// A locally gathered candidate, or `None` for gathering-complete.
    LocalCandidate(Option<IceCandidate>),
    RemoteCandidate(TrickleItem),
    IceConnected,
    IceDisconnected,
    MediaError(String),
    PeerLeft,
}

/// Command toward the signaling channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingCommand {
    PublisherOffer {
        handle: HandleId,
        sdp: SessionDescription,
    },
    SubscriberAnswer {
        handle: HandleId,
        sdp: SessionDescription,
    },
    TrickleCandidate {
        handle: HandleId,
        candidate: IceCandidate,
    },
    TrickleComplete {
        handle: HandleId,
    },
}

/// Command toward the media engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCommand {
    CreatePeerConnection {
        handle: HandleId,
    },
    CreateOffer {
        handle: HandleId,
    },
    HandleRemoteOffer {
        handle: HandleId,
        sdp: SessionDescription,
    },
    SetRemoteDescription {
        handle: HandleId,
        sdp: SessionDescription,
    },
    ApplyRemoteCandidate {
        handle: HandleId,
        candidate: IceCandidate,
    },
    RemoteCandidatesComplete {
        handle: HandleId,
    },
    Close {
        handle: HandleId,
    },
}

/// A command emitted by the state machine for the coordinator to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Signaling(SignalingCommand),
    Media(MediaCommand),
}

/// Protocol driver for one handle.
#[derive(Debug)]
pub struct NegotiationStateMachine {
    handle: HandleId,
    state: NegotiationState,
    role: Option<HandleRole>,
    local_description_set: bool,
    /// Remote candidates that arrived before the local description existed,
    /// in arrival order.
    pending_remote: VecDeque<TrickleItem>,
}

impl NegotiationStateMachine {
    pub fn new(handle: HandleId) -> Self {
        Self {
            handle,
            state: NegotiationState::AwaitingRole,
            role: None,
            local_description_set: false,
            pending_remote: VecDeque::new(),
        }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn role(&self) -> Option<HandleRole> {
        self.role
    }

    pub fn is_connected(&self) -> bool {
        self.state == NegotiationState::Connected
    }

    /// Advance the machine with one event, returning the commands to issue.
    ///
    /// Benign out-of-order duplicates (a second role assignment, a repeated
    /// `IceConnected`) are dropped with a log line. Genuine protocol
    /// violations return an error after moving the machine to `Failed`; the
    /// coordinator decides whether that closes the handle or the session.
    pub fn apply(&mut self, event: HandleEvent) -> Result<Vec<Command>> {
        // Failed absorbs everything.
        if let NegotiationState::Failed(_) = self.state {
            tracing::debug!(handle = %self.handle, ?event, "event ignored in failed state");
            return Ok(Vec::new());
        }

        match event {
            HandleEvent::RoleAssigned(role) => self.on_role_assigned(role),
            HandleEvent::LocalDescriptionReady(sdp) => self.on_local_description(sdp),
            HandleEvent::RemoteOffer(sdp) => self.on_remote_offer(sdp),
            HandleEvent::RemoteAnswer(sdp) => self.on_remote_answer(sdp),
            HandleEvent::LocalCandidate(candidate) => self.on_local_candidate(candidate),
            HandleEvent::RemoteCandidate(item) => self.on_remote_candidate(item),
            HandleEvent::IceConnected => self.on_ice_connected(),
            HandleEvent::IceDisconnected => self.on_ice_disconnected(),
            HandleEvent::MediaError(description) => self.on_media_error(description),
            HandleEvent::PeerLeft => self.on_peer_left(),
        }
    }

    fn on_role_assigned(&mut self, role: HandleRole) -> Result<Vec<Command>> {
        if self.role.is_some() || self.state != NegotiationState::AwaitingRole {
            tracing::warn!(handle = %self.handle, ?role, "duplicate role assignment ignored");
            return Ok(Vec::new());
        }
        self.role = Some(role);
        match role {
            HandleRole::Publisher => {
                // The publisher initiates: bring up the peer connection and
                // ask the engine for an offer. The offer comes back later as
                // LocalDescriptionReady.
                self.state = NegotiationState::Offering;
                tracing::info!(handle = %self.handle, "publisher role assigned, requesting offer");
                Ok(vec![
                    Command::Media(MediaCommand::CreatePeerConnection {
                        handle: self.handle,
                    }),
                    Command::Media(MediaCommand::CreateOffer {
                        handle: self.handle,
                    }),
                ])
            }
            HandleRole::Subscriber => {
                // Subscribers wait for the remote offer.
                tracing::info!(handle = %self.handle, "subscriber role assigned, awaiting remote offer");
                Ok(Vec::new())
            }
        }
    }

    fn on_remote_offer(&mut self, sdp: SessionDescription) -> Result<Vec<Command>> {
        if self.role == Some(HandleRole::Publisher) {
            return Err(self.fail(format!(
                "publisher handle {} received a remote offer",
                self.handle
            )));
        }
        if self.state != NegotiationState::AwaitingRole {
            return Err(self.fail(format!(
                "remote offer in state {:?} on handle {}",
                self.state, self.handle
            )));
        }
        // A remote offer determines the role when none was assigned yet.
        self.role = Some(HandleRole::Subscriber);
        self.state = NegotiationState::Answering;
        tracing::info!(handle = %self.handle, "remote offer received, requesting answer");
        Ok(vec![
            Command::Media(MediaCommand::CreatePeerConnection {
                handle: self.handle,
            }),
            Command::Media(MediaCommand::HandleRemoteOffer {
                handle: self.handle,
                sdp,
            }),
        ])
    }

    fn on_remote_answer(&mut self, sdp: SessionDescription) -> Result<Vec<Command>> {
        if !self.local_description_set {
            return Err(self.fail(format!(
                "remote answer before local description on handle {}",
                self.handle
            )));
        }
        tracing::info!(handle = %self.handle, "remote answer received");
        Ok(vec![Command::Media(MediaCommand::SetRemoteDescription {
            handle: self.handle,
            sdp,
        })])
    }

    fn on_local_description(&mut self, sdp: SessionDescription) -> Result<Vec<Command>> {
        let signaling = match (&self.state, sdp.sdp_type) {
            (NegotiationState::Offering, SdpType::Offer) => SignalingCommand::PublisherOffer {
                handle: self.handle,
                sdp,
            },
            (NegotiationState::Answering, SdpType::Answer) => SignalingCommand::SubscriberAnswer {
                handle: self.handle,
                sdp,
            },
            (state, sdp_type) => {
                return Err(self.fail(format!(
                    "local {} in state {:?} on handle {}",
                    sdp_type, state, self.handle
                )));
            }
        };

        self.local_description_set = true;
        self.state = NegotiationState::IceGathering;

        let mut commands = vec![Command::Signaling(signaling)];
        commands.extend(self.flush_pending());
        Ok(commands)
    }

    /// Replay candidates buffered while the local description was pending,
    /// preserving arrival order.
    fn flush_pending(&mut self) -> Vec<Command> {
        if !self.pending_remote.is_empty() {
            tracing::debug!(
                handle = %self.handle,
                queued = self.pending_remote.len(),
                "flushing remote candidates queued before local description"
            );
        }
        self.pending_remote
            .drain(..)
            .map(|item| Command::Media(trickle_to_media(self.handle, item)))
            .collect()
    }

    fn on_local_candidate(&mut self, candidate: Option<IceCandidate>) -> Result<Vec<Command>> {
        // Trickling can outlive the connectivity check, so Connected is as
        // legal a state as IceGathering here.
        if !matches!(
            self.state,
            NegotiationState::IceGathering | NegotiationState::Connected
        ) {
            tracing::warn!(handle = %self.handle, state = ?self.state, "local candidate dropped");
            return Ok(Vec::new());
        }
        let command = match candidate {
            Some(candidate) => SignalingCommand::TrickleCandidate {
                handle: self.handle,
                candidate,
            },
            None => SignalingCommand::TrickleComplete {
                handle: self.handle,
            },
        };
        Ok(vec![Command::Signaling(command)])
    }

    fn on_remote_candidate(&mut self, item: TrickleItem) -> Result<Vec<Command>> {
        if self.state == NegotiationState::Closed {
            tracing::debug!(handle = %self.handle, "remote candidate after close dropped");
            return Ok(Vec::new());
        }
        if !self.local_description_set {
            // Never apply a candidate before the description it belongs to.
            self.pending_remote.push_back(item);
            return Ok(Vec::new());
        }
        Ok(vec![Command::Media(trickle_to_media(self.handle, item))])
    }

    fn on_ice_connected(&mut self) -> Result<Vec<Command>> {
        match self.state {
            NegotiationState::IceGathering => {
                self.state = NegotiationState::Connected;
                tracing::info!(handle = %self.handle, "ICE connected");
            }
            NegotiationState::Connected => {
                tracing::debug!(handle = %self.handle, "duplicate ICE connected ignored");
            }
            ref state => {
                tracing::warn!(handle = %self.handle, ?state, "ICE connected in unexpected state");
            }
        }
        Ok(Vec::new())
    }

    fn on_ice_disconnected(&mut self) -> Result<Vec<Command>> {
        // Intentional wait-and-hope policy: the handle stays Connected and
        // negotiable, only the session-level flag reacts.
        if self.state == NegotiationState::Connected {
            tracing::info!(handle = %self.handle, "ICE disconnected, keeping handle open");
        }
        Ok(Vec::new())
    }

    fn on_media_error(&mut self, description: String) -> Result<Vec<Command>> {
        tracing::error!(handle = %self.handle, %description, "media engine error");
        self.state = NegotiationState::Failed(description);
        Ok(Vec::new())
    }

    fn on_peer_left(&mut self) -> Result<Vec<Command>> {
        if self.state == NegotiationState::Closed {
            return Ok(Vec::new());
        }
        self.state = NegotiationState::Closed;
        self.pending_remote.clear();
        tracing::info!(handle = %self.handle, "peer left, releasing handle");
        Ok(vec![Command::Media(MediaCommand::Close {
            handle: self.handle,
        })])
    }

    /// Record a protocol violation and return the error describing it.
    fn fail(&mut self, message: String) -> SessionError {
        self.state = NegotiationState::Failed(message.clone());
        SessionError::InvalidTransition {
            handle: self.handle,
            message,
        }
    }
}

fn trickle_to_media(handle: HandleId, item: TrickleItem) -> MediaCommand {
    match item {
        TrickleItem::Candidate(candidate) => MediaCommand::ApplyRemoteCandidate {
            handle,
            candidate,
        },
        TrickleItem::Completed => MediaCommand::RemoteCandidatesComplete { handle },
    }
}
