//! Device and environment signals.
//!
//! The session only ever sees reported values; a failed read becomes a
//! placeholder plus a [`SignalStatus`], never a stop.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("{signal} unavailable: {reason}")]
    Unavailable {
        signal: &'static str,
        reason: String,
    },
    #[error("{0} is not supported on this host")]
    Unsupported(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraHandle {
    pub device: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalStatus {
    pub signal: &'static str,
    pub message: String,
}

impl SignalStatus {
    pub fn from_error(signal: &'static str, err: &SignalError) -> Self {
        Self {
            signal,
            message: err.to_string(),
        }
    }
}

pub trait Signals {
    fn battery_level(&mut self) -> Result<u8, SignalError>;
    fn platform(&mut self) -> Result<String, SignalError>;
    fn open_camera(&mut self) -> Result<CameraHandle, SignalError>;
    /// Best effort, on/off durations in milliseconds.
    fn vibrate(&mut self, pattern: &[u32]);
}

/// Reads what a terminal host can offer: OS name, Linux power-supply
/// capacity and V4L device presence. Haptics are logged only.
pub struct HostSignals {
    power_supply_root: PathBuf,
    video_device: PathBuf,
}

impl Default for HostSignals {
    fn default() -> Self {
        Self {
            power_supply_root: PathBuf::from("/sys/class/power_supply"),
            video_device: PathBuf::from("/dev/video0"),
        }
    }
}

impl HostSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roots<P: Into<PathBuf>, Q: Into<PathBuf>>(power_supply_root: P, video_device: Q) -> Self {
        Self {
            power_supply_root: power_supply_root.into(),
            video_device: video_device.into(),
        }
    }
}

impl Signals for HostSignals {
    fn battery_level(&mut self) -> Result<u8, SignalError> {
        read_capacity(&self.power_supply_root)
    }

    fn platform(&mut self) -> Result<String, SignalError> {
        let os = std::env::consts::OS;
        if os.is_empty() {
            return Err(SignalError::Unsupported("platform"));
        }
        Ok(format!("{os} {}", std::env::consts::ARCH))
    }

    fn open_camera(&mut self) -> Result<CameraHandle, SignalError> {
        if self.video_device.exists() {
            Ok(CameraHandle {
                device: self.video_device.display().to_string(),
            })
        } else {
            Err(SignalError::Unavailable {
                signal: "camera",
                reason: format!("{} not present", self.video_device.display()),
            })
        }
    }

    fn vibrate(&mut self, pattern: &[u32]) {
        debug!(?pattern, "haptic_pulse");
    }
}

fn read_capacity(root: &Path) -> Result<u8, SignalError> {
    let unavailable = |reason: String| SignalError::Unavailable {
        signal: "battery",
        reason,
    };
    let entries = fs::read_dir(root).map_err(|err| unavailable(format!("{}: {err}", root.display())))?;
    for entry in entries.flatten() {
        let capacity = entry.path().join("capacity");
        if let Ok(raw) = fs::read_to_string(&capacity) {
            if let Ok(level) = raw.trim().parse::<u8>() {
                return Ok(level.min(100));
            }
        }
    }
    Err(unavailable(format!("no battery capacity under {}", root.display())))
}

/// First fix becomes the anchor; the first fix farther than `epsilon`
/// (degrees, Euclidean) trips a one-shot alarm.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionAnchor {
    anchor: Option<(f64, f64)>,
    epsilon: f64,
    tripped: bool,
}

impl PositionAnchor {
    pub fn new(epsilon: f64) -> Self {
        Self {
            anchor: None,
            epsilon,
            tripped: false,
        }
    }

    pub fn anchor(&self) -> Option<(f64, f64)> {
        self.anchor
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Returns `true` only on the fix that trips the alarm.
    pub fn observe(&mut self, lat: f64, lon: f64) -> bool {
        let Some((anchor_lat, anchor_lon)) = self.anchor else {
            self.anchor = Some((lat, lon));
            return false;
        };
        if self.tripped {
            return false;
        }
        let displacement = ((lat - anchor_lat).powi(2) + (lon - anchor_lon).powi(2)).sqrt();
        if displacement > self.epsilon {
            self.tripped = true;
            return true;
        }
        false
    }
}
