//! Session and capture configuration.
//!
//! One immutable value type, assembled with `with_*` setters and validated
//! wholesale when the session starts. Invalid combinations are rejected with
//! a single aggregated [`SessionError::Configuration`] instead of failing
//! piecemeal mid-negotiation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};

/// Which capture source feeds the media engine.
///
/// Selection priority when the session starts: file-backed synthetic camera,
/// then screen capture, then second-generation camera enumeration if
/// requested, then first-generation enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Path to a video file used as a synthetic camera. Takes priority over
    /// every other source when set.
    pub video_file: Option<PathBuf>,
    /// Stream the screen instead of a camera. Requires a prior user
    /// authorization token at session start.
    pub screen_capture_enabled: bool,
    /// Use second-generation camera enumeration instead of first-generation.
    pub prefer_camera2: bool,
    /// First-generation API only: capture to a texture rather than a
    /// callback buffer.
    pub capture_to_texture: bool,
}

/// Immutable session configuration, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub capture: CaptureConfig,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub video_width: u32,
    pub video_height: u32,
    pub video_fps: u32,
    /// Cap on publisher video bitrate, if any.
    pub video_max_bitrate_kbps: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            audio_enabled: true,
            video_enabled: true,
            video_width: 1280,
            video_height: 720,
            video_fps: 30,
            video_max_bitrate_kbps: None,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_video_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.capture.video_file = Some(path.into());
        self
    }

    pub fn with_screen_capture(mut self, enabled: bool) -> Self {
        self.capture.screen_capture_enabled = enabled;
        self
    }

    pub fn with_camera2(mut self, prefer: bool) -> Self {
        self.capture.prefer_camera2 = prefer;
        self
    }

    pub fn with_audio_enabled(mut self, enabled: bool) -> Self {
        self.audio_enabled = enabled;
        self
    }

    pub fn with_video_enabled(mut self, enabled: bool) -> Self {
        self.video_enabled = enabled;
        self
    }

    pub fn with_video_format(mut self, width: u32, height: u32, fps: u32) -> Self {
        self.video_width = width;
        self.video_height = height;
        self.video_fps = fps;
        self
    }

    pub fn with_max_bitrate_kbps(mut self, kbps: u32) -> Self {
        self.video_max_bitrate_kbps = Some(kbps);
        self
    }

    /// Validate the whole configuration, collecting every problem into one
    /// aggregated error.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.video_enabled {
            if self.video_width == 0 || self.video_height == 0 {
                problems.push(format!(
                    "video format {}x{} has a zero dimension",
                    self.video_width, self.video_height
                ));
            }
            if self.video_fps == 0 {
                problems.push("video fps must be non-zero".to_string());
            }
        }
        if self.video_max_bitrate_kbps == Some(0) {
            problems.push("video max bitrate must be non-zero when set".to_string());
        }
        if let Some(path) = &self.capture.video_file {
            if path.as_os_str().is_empty() {
                problems.push("video file path is empty".to_string());
            }
        }
        if !self.audio_enabled && !self.video_enabled {
            problems.push("session has neither audio nor video enabled".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SessionError::Configuration(problems.join("; ")))
        }
    }
}
