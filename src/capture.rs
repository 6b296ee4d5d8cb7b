//! Capture source selection.
//!
//! Pure policy mapping a [`CaptureConfig`] to the capture source that will
//! feed the media engine, evaluated exactly once at session start. Priority
//! order, first applicable wins: file-backed synthetic camera, screen
//! capture, second-generation camera enumeration, first-generation camera
//! enumeration. A configured-but-unusable source fails fast; it never falls
//! through to the next option.

use std::fs::File;
use std::path::PathBuf;

use crate::config::CaptureConfig;
use crate::errors::{Result, SessionError};

/// Opaque platform token proving the user authorized screen capture.
///
/// Obtained out-of-band by the embedding layer before the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenShareToken(Vec<u8>);

impl ScreenShareToken {
    pub fn new(token: impl Into<Vec<u8>>) -> Self {
        Self(token.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Which camera enumeration API produced a capturer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraGeneration {
    First,
    Second,
}

/// Descriptor for a successfully constructed camera capturer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraCapturer {
    pub device_name: String,
    pub front_facing: bool,
}

/// Platform camera enumeration, one implementation per API generation.
pub trait CameraEnumerator {
    fn device_names(&self) -> Vec<String>;
    fn is_front_facing(&self, device: &str) -> bool;
    /// Construct a capturer for the device, or `None` if the device cannot
    /// be opened.
    fn create_capturer(&self, device: &str) -> Option<CameraCapturer>;
}

/// The capture source chosen for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    FileBacked {
        path: PathBuf,
    },
    Screen {
        token: ScreenShareToken,
    },
    Camera {
        capturer: CameraCapturer,
        generation: CameraGeneration,
        /// Capture into a texture instead of a callback buffer. Always true
        /// for second-generation devices; configurable for first-generation.
        capture_to_texture: bool,
    },
}

/// Select the capture source for a session.
///
/// `screen_token` is the authorization obtained before session start; screen
/// capture without it fails with [`SessionError::UserRevokedPermission`] and
/// never silently falls back to a camera.
pub fn select_capture_source(
    config: &CaptureConfig,
    screen_token: Option<&ScreenShareToken>,
    camera2: &dyn CameraEnumerator,
    camera1: &dyn CameraEnumerator,
) -> Result<CaptureSource> {
    if let Some(path) = &config.video_file {
        // Fail fast on an unreadable file rather than limping along with a
        // camera the caller did not ask for.
        File::open(path).map_err(|e| {
            SessionError::CaptureDevice(format!(
                "failed to open video file {} for emulated camera: {}",
                path.display(),
                e
            ))
        })?;
        return Ok(CaptureSource::FileBacked { path: path.clone() });
    }

    if config.screen_capture_enabled {
        let token = screen_token.ok_or_else(|| {
            SessionError::UserRevokedPermission(
                "user did not give permission to capture the screen".to_string(),
            )
        })?;
        return Ok(CaptureSource::Screen {
            token: token.clone(),
        });
    }

    if config.prefer_camera2 {
        tracing::debug!("creating capturer using camera2 enumeration");
        camera_capturer(camera2)
            .map(|capturer| CaptureSource::Camera {
                capturer,
                generation: CameraGeneration::Second,
                capture_to_texture: true,
            })
            .ok_or(SessionError::NoCaptureDevice)
    } else {
        tracing::debug!("creating capturer using camera1 enumeration");
        camera_capturer(camera1)
            .map(|capturer| CaptureSource::Camera {
                capturer,
                generation: CameraGeneration::First,
                capture_to_texture: config.capture_to_texture,
            })
            .ok_or(SessionError::NoCaptureDevice)
    }
}

/// Front-facing devices first; fall back to the first constructible
/// non-front-facing device.
fn camera_capturer(enumerator: &dyn CameraEnumerator) -> Option<CameraCapturer> {
    let device_names = enumerator.device_names();

    for name in &device_names {
        if enumerator.is_front_facing(name) {
            if let Some(capturer) = enumerator.create_capturer(name) {
                return Some(capturer);
            }
        }
    }

    for name in &device_names {
        if !enumerator.is_front_facing(name) {
            if let Some(capturer) = enumerator.create_capturer(name) {
                return Some(capturer);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeEnumerator {
        devices: Vec<(&'static str, bool, bool)>, // (name, front, constructible)
    }

    impl CameraEnumerator for FakeEnumerator {
        fn device_names(&self) -> Vec<String> {
            self.devices.iter().map(|(n, _, _)| n.to_string()).collect()
        }

        fn is_front_facing(&self, device: &str) -> bool {
            self.devices
                .iter()
                .any(|(n, front, _)| *n == device && *front)
        }

        fn create_capturer(&self, device: &str) -> Option<CameraCapturer> {
            self.devices
                .iter()
                .find(|(n, _, ok)| *n == device && *ok)
                .map(|(n, front, _)| CameraCapturer {
                    device_name: n.to_string(),
                    front_facing: *front,
                })
        }
    }

    fn no_cameras() -> FakeEnumerator {
        FakeEnumerator { devices: vec![] }
    }

    #[test]
    fn prefers_front_facing_camera() {
        let enumerator = FakeEnumerator {
            devices: vec![("back", false, true), ("front", true, true)],
        };
        let source = select_capture_source(
            &CaptureConfig::default(),
            None,
            &no_cameras(),
            &enumerator,
        )
        .unwrap();
        match source {
            CaptureSource::Camera {
                capturer,
                generation,
                ..
            } => {
                assert_eq!(capturer.device_name, "front");
                assert_eq!(generation, CameraGeneration::First);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn texture_capture_flag_reaches_the_camera1_source() {
        let enumerator = FakeEnumerator {
            devices: vec![("front", true, true)],
        };
        let config = CaptureConfig {
            capture_to_texture: true,
            ..Default::default()
        };
        let source = select_capture_source(&config, None, &no_cameras(), &enumerator).unwrap();
        assert!(matches!(
            source,
            CaptureSource::Camera {
                capture_to_texture: true,
                generation: CameraGeneration::First,
                ..
            }
        ));

        let config = CaptureConfig::default();
        let source = select_capture_source(&config, None, &no_cameras(), &enumerator).unwrap();
        assert!(matches!(
            source,
            CaptureSource::Camera {
                capture_to_texture: false,
                ..
            }
        ));
    }

    #[test]
    fn falls_back_to_back_camera_when_front_unconstructible() {
        let enumerator = FakeEnumerator {
            devices: vec![("front", true, false), ("back", false, true)],
        };
        let source = select_capture_source(
            &CaptureConfig::default(),
            None,
            &no_cameras(),
            &enumerator,
        )
        .unwrap();
        assert!(matches!(
            source,
            CaptureSource::Camera { capturer, .. } if capturer.device_name == "back"
        ));
    }

    #[test]
    fn no_constructible_device_is_an_error() {
        let enumerator = FakeEnumerator {
            devices: vec![("front", true, false), ("back", false, false)],
        };
        let err = select_capture_source(
            &CaptureConfig::default(),
            None,
            &no_cameras(),
            &enumerator,
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::NoCaptureDevice));
    }

    #[test]
    fn camera2_request_uses_second_generation_enumerator() {
        let camera2 = FakeEnumerator {
            devices: vec![("wide", true, true)],
        };
        let config = CaptureConfig {
            prefer_camera2: true,
            ..Default::default()
        };
        let source = select_capture_source(&config, None, &camera2, &no_cameras()).unwrap();
        assert!(matches!(
            source,
            CaptureSource::Camera {
                generation: CameraGeneration::Second,
                ..
            }
        ));
    }

    #[test]
    fn missing_video_file_fails_fast() {
        let config = CaptureConfig {
            video_file: Some("/definitely/not/a/file.y4m".into()),
            screen_capture_enabled: true,
            ..Default::default()
        };
        // Screen capture is enabled and authorized, but the configured file
        // must not silently fall through to it.
        let token = ScreenShareToken::new(*b"granted");
        let err = select_capture_source(&config, Some(&token), &no_cameras(), &no_cameras())
            .unwrap_err();
        assert!(matches!(err, SessionError::CaptureDevice(_)));
    }

    #[test]
    fn screen_capture_without_token_is_permission_error() {
        let config = CaptureConfig {
            screen_capture_enabled: true,
            ..Default::default()
        };
        let err =
            select_capture_source(&config, None, &no_cameras(), &no_cameras()).unwrap_err();
        assert!(matches!(err, SessionError::UserRevokedPermission(_)));
    }

    #[test]
    fn file_takes_priority_over_screen() {
        let file = std::env::temp_dir().join("videoroom-core-capture-test.y4m");
        std::fs::write(&file, b"YUV4MPEG2").unwrap();
        let config = CaptureConfig {
            video_file: Some(file.clone()),
            screen_capture_enabled: true,
            ..Default::default()
        };
        let token = ScreenShareToken::new(*b"granted");
        let source = select_capture_source(&config, Some(&token), &no_cameras(), &no_cameras())
            .unwrap();
        assert_eq!(source, CaptureSource::FileBacked { path: file.clone() });
        let _ = std::fs::remove_file(&file);
    }
}
