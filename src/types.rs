//! Core identifier and payload types shared across the crate.
//!
//! SDP and ICE payloads are opaque to this layer: the only field ever
//! interpreted is the offer/answer type tag on a JSEP, which decides whether
//! a remote description is routed down the publisher or subscriber path.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// Opaque identifier for one negotiating party within a room.
///
/// Assigned by the gateway when a party attaches; never generated locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// The two negotiation roles in a room.
///
/// The publisher always initiates with an offer; subscribers receive an offer
/// and answer. The message types sent to the gateway differ per role, so the
/// two paths are never folded into one generic negotiate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleRole {
    Publisher,
    Subscriber,
}

/// Offer/answer tag on a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Answer => write!(f, "answer"),
        }
    }
}

/// A session description produced by or destined for the media engine.
///
/// The `sdp` body is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Parse a JSEP JSON object (`{"type": "offer"|"answer", "sdp": ...}`).
    ///
    /// A missing or unrecognized type tag is a protocol violation from the
    /// gateway, not a recoverable condition.
    pub fn from_jsep(jsep: &serde_json::Value) -> Result<Self, SessionError> {
        serde_json::from_value(jsep.clone()).map_err(|e| {
            SessionError::SignalingProtocol(format!("malformed JSEP payload: {}", e))
        })
    }

    /// Render this description as a JSEP JSON object for the gateway.
    pub fn to_jsep(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.sdp_type.to_string(), "sdp": self.sdp })
    }
}

/// An incrementally discovered ICE network path endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub sdp_mid: String,
    pub sdp_m_line_index: u32,
    pub candidate: String,
}

impl IceCandidate {
    pub fn new(
        sdp_mid: impl Into<String>,
        sdp_m_line_index: u32,
        candidate: impl Into<String>,
    ) -> Self {
        Self {
            sdp_mid: sdp_mid.into(),
            sdp_m_line_index,
            candidate: candidate.into(),
        }
    }
}

/// One element of the remote trickle stream for a handle: either a candidate
/// or the end-of-candidates marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrickleItem {
    Candidate(IceCandidate),
    Completed,
}
