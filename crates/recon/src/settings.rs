//! # Engine Settings
//!
//! Everything the [`MainEngine`](crate::MainEngine) needs to know up front:
//! backend choice, tracker family, swapping and the scene parameters. The
//! struct deserialises from JSON with every field optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};

/// Which compute backend runs the per-frame passes. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Cpu,
    Device,
}

/// Tracker family. Decides which raycast products the frame leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerType {
    /// Point-to-plane ICP against the raycast point and normal maps.
    #[default]
    Icp,
    /// Depth-only refinement against the raycast maps.
    Ren,
    /// Photometric tracking against a coloured point cloud.
    Colour,
}

impl TrackerType {
    /// Whether this tracker consumes a point cloud rendered from the colour
    /// camera instead of ICP maps from the depth camera.
    #[must_use]
    pub fn uses_point_cloud(self) -> bool {
        matches!(self, Self::Colour)
    }
}

/// Volume and rendering parameters of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    /// Edge length of a voxel in metres.
    pub voxel_size: f32,
    /// Truncation band of the signed distance field in metres.
    pub mu: f32,
    /// Cap on the accumulated integration weight of a voxel.
    pub max_w: u32,
    /// Depth range rendered when no block projects into the image.
    pub view_frustum_min: f32,
    pub view_frustum_max: f32,
    /// Ordered hash buckets. Must be a power of two.
    pub bucket_count: usize,
    /// Overflow entries shared by colliding buckets.
    pub excess_count: usize,
    /// Voxel blocks resident in the local arena.
    pub max_blocks: usize,
    /// Screen tiles the depth bounds planner may emit per frame.
    pub max_rendering_blocks: usize,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            voxel_size: 0.005,
            mu: 0.02,
            max_w: 100,
            view_frustum_min: 0.2,
            view_frustum_max: 3.0,
            bucket_count: 0x40000,
            excess_count: 0x8000,
            max_blocks: 0x4000,
            max_rendering_blocks: 0x40000,
        }
    }
}

impl SceneParams {
    /// Total number of hash entries, ordered and excess.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.bucket_count + self.excess_count
    }

    /// Ratio of truncation band to voxel size: sdf-to-voxel step scale.
    #[must_use]
    pub fn step_scale(&self) -> f32 {
        self.mu / self.voxel_size
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub device: DeviceType,
    /// Stream blocks between the local arena and a host-side global cache.
    pub use_swapping: bool,
    pub tracker_type: TrackerType,
    /// Decimate the tracking point cloud to pixels with odd row and column.
    pub skip_points: bool,
    pub scene: SceneParams,
}

impl FusionSettings {
    /// Reads settings from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Io`] or [`FusionError::Parse`] if the file
    /// cannot be read or decoded, and [`FusionError::InvalidSettings`] if the
    /// decoded settings fail [`validate`](Self::validate).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FusionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| FusionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the invariants the scene structures rely on.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidSettings`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<()> {
        let scene = &self.scene;
        if !positive(scene.voxel_size) {
            return Err(invalid("voxel_size must be positive"));
        }
        if !positive(scene.mu) {
            return Err(invalid("mu must be positive"));
        }
        if scene.max_w == 0 || scene.max_w > u32::from(u8::MAX) {
            return Err(invalid("max_w must lie in 1..=255"));
        }
        if !positive(scene.view_frustum_min) || scene.view_frustum_min >= scene.view_frustum_max {
            return Err(invalid("view frustum must satisfy 0 < min < max"));
        }
        if !scene.bucket_count.is_power_of_two() {
            return Err(invalid("bucket_count must be a power of two"));
        }
        if scene.max_blocks == 0 {
            return Err(invalid("max_blocks must be at least 1"));
        }
        if u32::try_from(scene.entry_count()).is_err() {
            return Err(invalid("too many hash entries"));
        }
        Ok(())
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(reason: &str) -> FusionError {
    FusionError::InvalidSettings(reason.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = FusionSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.scene.entry_count(), 0x48000);
        assert!(!settings.use_swapping);
        assert_eq!(settings.device, DeviceType::Cpu);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "device": "device", "tracker_type": "colour", "scene": { "voxel_size": 0.01 } }"#;
        let settings: FusionSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.device, DeviceType::Device);
        assert!(settings.tracker_type.uses_point_cloud());
        assert!((settings.scene.voxel_size - 0.01).abs() < f32::EPSILON);
        assert!((settings.scene.mu - 0.02).abs() < f32::EPSILON);
    }

    #[test]
    fn bucket_count_must_be_power_of_two() {
        let mut settings = FusionSettings::default();
        settings.scene.bucket_count = 1000;
        assert!(matches!(
            settings.validate(),
            Err(FusionError::InvalidSettings(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = FusionSettings::from_json_file("/nonexistent/fusion.json");
        assert!(matches!(result, Err(FusionError::Io { .. })));
    }
}
