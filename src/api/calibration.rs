//! Pinhole calibration data loaded from per-camera JSON files.

use crate::{CameraError, CameraErrorCode, CameraResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Intrinsic parameters of a pinhole camera with Brown-Conrady distortion coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Focal length along x, in pixels.
    pub fx: f64,
    /// Focal length along y, in pixels.
    pub fy: f64,
    /// Principal point x.
    pub cx: f64,
    /// Principal point y.
    pub cy: f64,
    /// Radial distortion.
    #[serde(default)]
    pub k1: f64,
    /// Radial distortion.
    #[serde(default)]
    pub k2: f64,
    /// Radial distortion.
    #[serde(default)]
    pub k3: f64,
    /// Tangential distortion.
    #[serde(default)]
    pub p1: f64,
    /// Tangential distortion.
    #[serde(default)]
    pub p2: f64,
}

impl Intrinsics {
    /// Project a point given in camera coordinates to pixel coordinates.
    ///
    /// Distortion is not applied. Returns `None` for points on or behind the image plane.
    pub fn project(&self, [x, y, z]: [f64; 3]) -> Option<[f64; 2]> {
        (z > 0.0).then(|| [self.fx * x / z + self.cx, self.fy * y / z + self.cy])
    }

    /// Point in camera coordinates seen at pixel `[u, v]` at depth `z`.
    pub fn unproject(&self, [u, v]: [f64; 2], z: f64) -> [f64; 3] {
        [(u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z]
    }
}

/// Rigid transformation between two channels' coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    /// Row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation in meters.
    pub translation: [f64; 3],
}

impl Extrinsics {
    /// The transformation that does nothing.
    pub const IDENTITY: Self = Self {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: [0.0; 3],
    };

    /// Apply the transformation to a point.
    pub fn transform(&self, point: [f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [0, 1, 2].map(|row| {
            r[row][0] * point[0] + r[row][1] * point[1] + r[row][2] * point[2] + t[row]
        })
    }

    /// The inverse transformation.
    pub fn inverse(&self) -> Self {
        let r = &self.rotation;
        let rotation = [0, 1, 2].map(|row| [0, 1, 2].map(|col| r[col][row]));
        let t = &self.translation;
        let translation = [0, 1, 2].map(|row| {
            -(rotation[row][0] * t[0] + rotation[row][1] * t[1] + rotation[row][2] * t[2])
        });
        Self {
            rotation,
            translation,
        }
    }
}

pub(crate) fn intrinsics_file_name(model: &str, serial: &str, channel: &str) -> String {
    format!("{model}_{serial}_{channel}.intrinsics.json")
}

pub(crate) fn extrinsics_file_name(model: &str, serial: &str, from: &str, to: &str) -> String {
    format!("{model}_{serial}_{from}_{to}.extrinsics.json")
}

#[tracing::instrument(level = "debug", err)]
pub(crate) fn load<T: DeserializeOwned>(path: &Path) -> CameraResult<T> {
    let contents = std::fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => CameraError::new(
            CameraErrorCode::CALIBRATION_NOT_FOUND,
            format_args!("No calibration file at {}", path.display()),
        ),
        _ => CameraError::invalid_operation(format_args!(
            "Failed to read {}: {err}",
            path.display()
        )),
    })?;
    serde_json::from_str(&contents).map_err(|err| {
        CameraError::invalid_value(format_args!(
            "Malformed calibration file {}: {err}",
            path.display()
        ))
    })
}
