//! # Camera Model
//!
//! Rigid poses, pinhole intrinsics and the calibration bundle of an RGB-D
//! sensor.

use std::path::Path;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};

/// Rigid camera pose. `m` maps world to camera coordinates, `inv_m` maps
/// camera to world. Both are kept consistent by every constructor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    m: Mat4,
    inv_m: Mat4,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    #[must_use]
    pub fn identity() -> Self {
        Self {
            m: Mat4::IDENTITY,
            inv_m: Mat4::IDENTITY,
        }
    }

    /// Pose with world-to-camera matrix `m`.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        Self {
            m,
            inv_m: m.inverse(),
        }
    }

    /// Pose from a translation and an axis-angle rotation (radians times
    /// unit axis), both expressed world-to-camera.
    #[must_use]
    pub fn from_params(translation: Vec3, rotation: Vec3) -> Self {
        Self::from_matrix(Mat4::from_rotation_translation(
            Quat::from_scaled_axis(rotation),
            translation,
        ))
    }

    /// Pose of a camera sitting at `position` in world space, looking along
    /// its +Z axis rotated by `rotation` (axis-angle, camera-to-world).
    #[must_use]
    pub fn looking_from(position: Vec3, rotation: Vec3) -> Self {
        let inv_m = Mat4::from_rotation_translation(Quat::from_scaled_axis(rotation), position);
        Self {
            m: inv_m.inverse(),
            inv_m,
        }
    }

    #[must_use]
    pub fn m(&self) -> Mat4 {
        self.m
    }

    #[must_use]
    pub fn inv_m(&self) -> Mat4 {
        self.inv_m
    }

    pub fn set_m(&mut self, m: Mat4) {
        *self = Self::from_matrix(m);
    }

    /// Camera centre in world coordinates.
    #[must_use]
    pub fn camera_centre(&self) -> Vec3 {
        self.inv_m.w_axis.truncate()
    }
}

/// Pinhole intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::new(580.0, 580.0, 320.0, 240.0)
    }
}

impl Intrinsics {
    #[must_use]
    pub const fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// `(fx, fy, cx, cy)`.
    #[must_use]
    pub fn projection_params(&self) -> Vec4 {
        Vec4::new(self.fx, self.fy, self.cx, self.cy)
    }

    /// `(1 / fx, 1 / fy, cx, cy)`, the form ray construction consumes.
    #[must_use]
    pub fn inverse_projection_params(&self) -> Vec4 {
        Vec4::new(1.0 / self.fx, 1.0 / self.fy, self.cx, self.cy)
    }

    /// Projects a camera-space point with positive depth to pixel coordinates.
    #[must_use]
    pub fn project(&self, point: Vec3) -> Vec2 {
        Vec2::new(
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        )
    }

    /// Camera-space point at depth `z` behind pixel `(u, v)`.
    #[must_use]
    pub fn unproject(&self, u: f32, v: f32, z: f32) -> Vec3 {
        Vec3::new(
            z * (u - self.cx) / self.fx,
            z * (v - self.cy) / self.fy,
            z,
        )
    }
}

/// Fixed rigid transform between the two sensor streams. `calib` maps
/// colour-camera coordinates to depth-camera coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Mat4", into = "Mat4")]
pub struct Extrinsics {
    pub calib: Mat4,
    pub calib_inv: Mat4,
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::from(Mat4::IDENTITY)
    }
}

impl From<Mat4> for Extrinsics {
    fn from(calib: Mat4) -> Self {
        Self {
            calib,
            calib_inv: calib.inverse(),
        }
    }
}

impl From<Extrinsics> for Mat4 {
    fn from(extrinsics: Extrinsics) -> Self {
        extrinsics.calib
    }
}

/// Kinect-style disparity model: `depth = 8 * b * fx / (a - disparity)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisparityCalib {
    pub a: f32,
    pub b: f32,
}

impl Default for DisparityCalib {
    fn default() -> Self {
        Self {
            a: 1135.09,
            b: 0.081_914_1,
        }
    }
}

/// Calibration of an RGB-D sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RgbdCalib {
    pub intrinsics_rgb: Intrinsics,
    pub intrinsics_d: Intrinsics,
    pub trafo_rgb_to_depth: Extrinsics,
    pub disparity_calib: DisparityCalib,
}

impl RgbdCalib {
    /// Reads a calibration from JSON. Missing sections take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Io`] or [`FusionError::Parse`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FusionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| FusionError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pose of the colour camera given the pose of the depth camera.
    #[must_use]
    pub fn colour_pose(&self, depth_pose: &Pose) -> Pose {
        Pose::from_matrix(self.trafo_rgb_to_depth.calib_inv * depth_pose.m())
    }
}
