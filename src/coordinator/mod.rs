//! Session orchestration: the coordinator struct and its event loop.

mod coordinator;
mod event_handler;

pub use coordinator::{CapturePlatform, SessionOrchestrator};
