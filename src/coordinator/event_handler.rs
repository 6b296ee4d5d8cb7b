//! Event routing for the session orchestrator.
//!
//! One task consumes the merged event stream and drives the per-handle state
//! machines. Routing never blocks on negotiation results; commands emitted by
//! a machine are dispatched to the collaborators and their outcomes come back
//! later as new events.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::errors::SessionError;
use crate::events::SessionEvent;
use crate::media::MediaEvent;
use crate::negotiation::{
    Command, HandleEvent, MediaCommand, NegotiationState, NegotiationStateMachine,
    SignalingCommand,
};
use crate::signaling::SignalingEvent;
use crate::types::{HandleId, HandleRole, SdpType, SessionDescription};

use super::coordinator::SessionOrchestrator;

/// Whether the event loop keeps running after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopFlow {
    Continue,
    Stop,
}

impl SessionOrchestrator {
    /// Main session event loop. Exits after teardown.
    pub(crate) async fn run_event_loop(self: Arc<Self>, mut rx: mpsc::Receiver<SessionEvent>) {
        tracing::info!("session event loop started");

        while let Some(event) = rx.recv().await {
            let flow = match event {
                SessionEvent::Shutdown => {
                    self.teardown("disconnect requested").await;
                    LoopFlow::Stop
                }
                SessionEvent::Signaling(event) => self.handle_signaling_event(event).await,
                SessionEvent::Media(event) => self.handle_media_event(event).await,
            };
            if flow == LoopFlow::Stop {
                break;
            }
        }

        tracing::info!("session event loop ended");
    }

    async fn handle_signaling_event(&self, event: SignalingEvent) -> LoopFlow {
        tracing::debug!(?event, "signaling event");

        match event {
            SignalingEvent::PublisherJoined { handle } => {
                if let Err(e) = self.registry.insert(NegotiationStateMachine::new(handle)) {
                    return self.report_protocol_error(e).await;
                }
                {
                    let mut publisher = self.publisher.lock().expect("publisher lock");
                    if publisher.is_none() {
                        *publisher = Some(handle);
                    } else {
                        tracing::warn!(%handle, "second publisher announcement");
                    }
                }
                self.advance_handle(handle, HandleEvent::RoleAssigned(HandleRole::Publisher))
                    .await
            }

            SignalingEvent::SubscriberAttached { handle } => {
                if let Err(e) = self.registry.insert(NegotiationStateMachine::new(handle)) {
                    return self.report_protocol_error(e).await;
                }
                self.advance_handle(handle, HandleEvent::RoleAssigned(HandleRole::Subscriber))
                    .await
            }

            SignalingEvent::RemoteJsep { handle, jsep } => {
                let sdp = match SessionDescription::from_jsep(&jsep) {
                    Ok(sdp) => sdp,
                    Err(e) => {
                        // A payload we cannot even type-tag means the channel
                        // itself is unreliable.
                        self.handler.on_error(&e).await;
                        self.teardown("malformed JSEP from gateway").await;
                        return LoopFlow::Stop;
                    }
                };
                if !self.registry.contains(handle) {
                    // The gateway referenced a party we never saw. Reported,
                    // never silently dropped, but existing handles are left
                    // untouched.
                    let e = SessionError::SignalingProtocol(format!(
                        "remote JSEP for unknown {}",
                        handle
                    ));
                    self.handler.on_error(&e).await;
                    return LoopFlow::Continue;
                }
                let event = match sdp.sdp_type {
                    SdpType::Offer => HandleEvent::RemoteOffer(sdp),
                    SdpType::Answer => HandleEvent::RemoteAnswer(sdp),
                };
                self.advance_handle(handle, event).await
            }

            SignalingEvent::RemoteCandidate { handle, item } => {
                self.advance_handle(handle, HandleEvent::RemoteCandidate(item))
                    .await
            }

            SignalingEvent::Left { handle } => self.handle_left(handle).await,

            SignalingEvent::Notification { message } => {
                self.handler.on_notification(&message).await;
                LoopFlow::Continue
            }

            SignalingEvent::ChannelClosed => {
                self.teardown("signaling channel closed").await;
                LoopFlow::Stop
            }

            SignalingEvent::ChannelError { message } => {
                let e = SessionError::Channel(message);
                self.handler.on_error(&e).await;
                self.teardown("signaling channel error").await;
                LoopFlow::Stop
            }
        }
    }

    async fn handle_media_event(&self, event: MediaEvent) -> LoopFlow {
        tracing::debug!(?event, "media event");

        match event {
            MediaEvent::LocalDescription { handle, sdp } => {
                self.advance_handle(handle, HandleEvent::LocalDescriptionReady(sdp))
                    .await
            }

            MediaEvent::LocalIceCandidate { handle, candidate } => {
                self.advance_handle(handle, HandleEvent::LocalCandidate(candidate))
                    .await
            }

            MediaEvent::IceConnected { handle } => {
                let flow = self.advance_handle(handle, HandleEvent::IceConnected).await;
                if self
                    .registry
                    .state_of(handle)
                    .is_some_and(|state| state == NegotiationState::Connected)
                {
                    self.handler.on_handle_connected(handle).await;
                    if !self.ice_connected.swap(true, Ordering::AcqRel) {
                        self.handler.on_ice_connectivity(true).await;
                    }
                }
                flow
            }

            MediaEvent::IceDisconnected { handle } => {
                let flow = self
                    .advance_handle(handle, HandleEvent::IceDisconnected)
                    .await;
                // Wait-and-hope: only the session flag reacts, the handle
                // stays open.
                if self.ice_connected.swap(false, Ordering::AcqRel) {
                    self.handler.on_ice_connectivity(false).await;
                }
                flow
            }

            MediaEvent::PeerConnectionError { handle, description } => {
                match handle {
                    Some(handle) if self.registry.contains(handle) => {
                        // Records the cause on the machine; blast radius is
                        // decided below.
                        let _ = self
                            .registry
                            .with_machine_mut(handle, |m| m.apply(HandleEvent::MediaError(description.clone())));
                        self.fail_handle(
                            handle,
                            SessionError::MediaEngine {
                                handle,
                                message: description,
                            },
                        )
                        .await
                    }
                    _ => {
                        // No resolvable handle: nothing to scope the failure
                        // to, so the whole session goes.
                        let e = SessionError::SignalingProtocol(format!(
                            "media engine error with no resolvable handle: {}",
                            description
                        ));
                        self.handler.on_error(&e).await;
                        self.teardown("unattributable media engine error").await;
                        LoopFlow::Stop
                    }
                }
            }

            MediaEvent::LocalRenderReady { handle } => {
                if self.registry.contains(handle) {
                    self.handler.on_local_render(handle).await;
                } else {
                    tracing::warn!(%handle, "local render for unregistered handle dropped");
                }
                LoopFlow::Continue
            }

            MediaEvent::RemoteRenderReady { handle } => {
                if self.registry.contains(handle) {
                    self.handler.on_remote_render(handle).await;
                } else {
                    tracing::warn!(%handle, "remote render for unregistered handle dropped");
                }
                LoopFlow::Continue
            }

            MediaEvent::PeerConnectionClosed { handle } => {
                tracing::debug!(%handle, "peer connection closed");
                LoopFlow::Continue
            }

            MediaEvent::IceCandidatesRemoved { handle } => {
                tracing::debug!(%handle, "ice candidates removed (ignored)");
                LoopFlow::Continue
            }

            MediaEvent::StatsReady { handle } => {
                tracing::trace!(%handle, "stats ready (ignored)");
                LoopFlow::Continue
            }
        }
    }

    /// Apply one event to a handle's machine and dispatch the resulting
    /// commands. Failures follow the blast-radius policy: handle-local
    /// unless the handle is the publisher.
    async fn advance_handle(&self, handle: HandleId, event: HandleEvent) -> LoopFlow {
        let commands = match self.registry.with_machine_mut(handle, |m| m.apply(event)) {
            Ok(commands) => commands,
            Err(SessionError::HandleNotFound(handle)) => {
                // Routine race: the party left while its engine callbacks
                // were still in flight.
                tracing::warn!(%handle, "event for unregistered handle dropped");
                return LoopFlow::Continue;
            }
            Err(e) => return self.fail_handle(handle, e).await,
        };
        self.dispatch_commands(commands).await
    }

    async fn dispatch_commands(&self, commands: Vec<Command>) -> LoopFlow {
        for command in commands {
            let flow = match command {
                Command::Signaling(command) => self.dispatch_signaling(command).await,
                Command::Media(command) => self.dispatch_media(command).await,
            };
            if flow == LoopFlow::Stop {
                return LoopFlow::Stop;
            }
        }
        LoopFlow::Continue
    }

    async fn dispatch_signaling(&self, command: SignalingCommand) -> LoopFlow {
        let result = match &command {
            SignalingCommand::PublisherOffer { handle, sdp } => {
                self.signaling.publisher_offer(*handle, sdp).await
            }
            SignalingCommand::SubscriberAnswer { handle, sdp } => {
                self.signaling.subscriber_answer(*handle, sdp).await
            }
            SignalingCommand::TrickleCandidate { handle, candidate } => {
                self.signaling.trickle_candidate(*handle, candidate).await
            }
            SignalingCommand::TrickleComplete { handle } => {
                self.signaling.trickle_complete(*handle).await
            }
        };
        match result {
            Ok(()) => LoopFlow::Continue,
            Err(e) => {
                // A channel that cannot deliver negotiation messages cannot
                // carry the session.
                tracing::error!(error = %e, ?command, "signaling command failed");
                self.handler.on_error(&e).await;
                self.teardown("signaling command failed").await;
                LoopFlow::Stop
            }
        }
    }

    async fn dispatch_media(&self, command: MediaCommand) -> LoopFlow {
        let (handle, result) = match &command {
            MediaCommand::CreatePeerConnection { handle } => {
                (*handle, self.media.create_peer_connection(*handle).await)
            }
            MediaCommand::CreateOffer { handle } => (*handle, self.media.create_offer(*handle).await),
            MediaCommand::HandleRemoteOffer { handle, sdp } => {
                (*handle, self.media.handle_remote_offer(*handle, sdp).await)
            }
            MediaCommand::SetRemoteDescription { handle, sdp } => (
                *handle,
                self.media.set_remote_description(*handle, sdp).await,
            ),
            MediaCommand::ApplyRemoteCandidate { handle, candidate } => (
                *handle,
                self.media.add_remote_candidate(*handle, candidate).await,
            ),
            MediaCommand::RemoteCandidatesComplete { handle } => {
                (*handle, self.media.remote_candidates_complete(*handle).await)
            }
            MediaCommand::Close { handle } => (*handle, self.media.close(*handle).await),
        };
        match result {
            Ok(()) => LoopFlow::Continue,
            Err(e) => {
                tracing::error!(%handle, error = %e, "media command failed");
                self.fail_handle(
                    handle,
                    SessionError::MediaEngine {
                        handle,
                        message: e.to_string(),
                    },
                )
                .await
            }
        }
    }

    /// A party left: close its handle; a departing publisher takes the whole
    /// session with it.
    async fn handle_left(&self, handle: HandleId) -> LoopFlow {
        let flow = self.advance_handle(handle, HandleEvent::PeerLeft).await;
        if self.registry.remove(handle).is_some() {
            if let Err(e) = self.media.dispose(handle).await {
                tracing::warn!(%handle, error = %e, "dispose after leave failed");
            }
            self.handler.on_peer_left(handle).await;
        }
        if self.publisher_handle() == Some(handle) {
            self.teardown("publisher left the room").await;
            return LoopFlow::Stop;
        }
        flow
    }

    /// Apply the failure blast-radius policy for one handle.
    async fn fail_handle(&self, handle: HandleId, error: SessionError) -> LoopFlow {
        self.handler.on_error(&error).await;
        if self.publisher_handle() == Some(handle) {
            self.teardown("publisher handle failed").await;
            return LoopFlow::Stop;
        }
        // Subscriber failure closes only that handle; no automatic rejoin.
        if self.registry.remove(handle).is_some() {
            if let Err(e) = self.media.close(handle).await {
                tracing::warn!(%handle, error = %e, "close of failed handle failed");
            }
            if let Err(e) = self.media.dispose(handle).await {
                tracing::warn!(%handle, error = %e, "dispose of failed handle failed");
            }
        }
        LoopFlow::Continue
    }

    async fn report_protocol_error(&self, error: SessionError) -> LoopFlow {
        self.handler.on_error(&error).await;
        LoopFlow::Continue
    }
}
