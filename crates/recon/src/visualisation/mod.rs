//! # Visualisation
//!
//! Raycast rendering of the scene. One frame of rendering runs in three
//! passes:
//!
//! 1.  [`visibility`] culls the allocated blocks against the camera frustum.
//! 2.  [`depth_bounds`] projects the surviving blocks to screen-space tiles
//!     and merges their depth ranges into a per-pixel `[near, far]` image.
//! 3.  [`raycast`] marches one ray per pixel inside its interval and hands
//!     the result to one of the consumers in [`projectors`].
//!
//! The passes are generic over a [`ComputeBackend`](compute::ComputeBackend);
//! [`make_visualisation_engine`] picks one from the settings and erases it
//! behind [`VisualisationEngine`].

pub mod depth_bounds;
pub mod depth_colour;
pub mod engine;
pub mod projectors;
pub mod raycast;
pub mod visibility;

use compute::{Image, MemoryDevice, Placement};
use glam::{UVec2, Vec2};

pub use depth_bounds::{DepthBoundsReport, RenderingBlock};
pub use engine::{BackendVisualisationEngine, CpuVisualisationEngine, DeviceVisualisationEngine};
pub use raycast::{PixelSpan, PixelVisit, RaycastConsumer, RaycastParams};

use crate::camera::{Intrinsics, Pose};
use crate::scene::{Scene, Voxel};
use crate::settings::DeviceType;
use crate::tracking_state::TrackingState;
use crate::view::View;

/// Edge of a screen tile emitted by the depth bounds planner, in pixels.
pub const RENDERING_BLOCK_SIZE: i32 = 16;
/// Smallest near bound handed to the ray marcher, in metres.
pub const VERY_CLOSE: f32 = 0.05;
/// Initial near bound of a pixel no block has touched, in metres.
pub const FAR_AWAY: f32 = 999_999.9;
/// Corners at or below this camera depth cannot be projected.
pub const CORNER_DEPTH_EPSILON: f32 = 1e-6;

/// Scratch buffers of a free-viewpoint render at a fixed resolution.
#[derive(Debug)]
pub struct RenderState {
    /// Hash slots of the blocks inside the frustum, ascending.
    pub visible_blocks: Vec<u32>,
    pub min_max: Image<Vec2>,
    pub output: Image<[u8; 4]>,
}

impl RenderState {
    #[must_use]
    pub fn new(dims: UVec2, device: MemoryDevice) -> Self {
        let placement = Placement::shared_with(device);
        Self {
            visible_blocks: Vec::new(),
            min_max: Image::new(dims, Vec2::ZERO, placement),
            output: Image::new(dims, [0, 0, 0, 255], placement),
        }
    }

    #[must_use]
    pub fn dims(&self) -> UVec2 {
        self.output.dims()
    }
}

/// Raycast rendering on one compute backend.
pub trait VisualisationEngine<V: Voxel>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Memory side the engine reads inputs from and writes outputs to.
    fn memory_device(&self) -> MemoryDevice;

    fn allocate_render_state(&self, dims: UVec2) -> RenderState {
        RenderState::new(dims, self.memory_device())
    }

    /// Rebuilds `state.visible_blocks` for the frustum of `pose` and
    /// `intrinsics` at the resolution of `state`.
    fn find_visible_blocks(
        &self,
        scene: &Scene<V>,
        pose: &Pose,
        intrinsics: &Intrinsics,
        state: &mut RenderState,
    );

    /// Fills `min_max` with per-pixel search intervals from the blocks in
    /// `visible`, or from every resident block when `visible` is `None`.
    fn create_expected_depths(
        &self,
        scene: &Scene<V>,
        pose: &Pose,
        intrinsics: &Intrinsics,
        min_max: &mut Image<Vec2>,
        visible: Option<&[u32]>,
    ) -> DepthBoundsReport;

    /// Raycasts `state.min_max` into a shaded image in `state.output`.
    fn render_image(
        &self,
        scene: &Scene<V>,
        pose: &Pose,
        intrinsics: &Intrinsics,
        state: &mut RenderState,
        use_colour: bool,
    );

    /// Raycasts from the colour camera into the tracking point cloud.
    fn create_point_cloud(
        &self,
        scene: &Scene<V>,
        view: &View,
        tracking_state: &mut TrackingState,
        skip_points: bool,
    );

    /// Raycasts from the depth camera into the tracking point and normal maps.
    fn create_icp_maps(&self, scene: &Scene<V>, view: &View, tracking_state: &mut TrackingState);
}

/// Creates the engine for `device`.
#[must_use]
pub fn make_visualisation_engine<V: Voxel>(device: DeviceType) -> Box<dyn VisualisationEngine<V>> {
    let engine: Box<dyn VisualisationEngine<V>> = match device {
        DeviceType::Cpu => Box::new(CpuVisualisationEngine::new()),
        DeviceType::Device => Box::new(DeviceVisualisationEngine::new()),
    };
    tracing::info!("Using {} visualisation backend.", engine.name());
    engine
}

/// Grey level of a shaded surface pixel.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn shade(angle: f32) -> [u8; 4] {
    let level = ((0.8 * angle.clamp(0.0, 1.0) + 0.2) * 255.0) as u8;
    [level, level, level, 255]
}

/// Tints of labelled surfaces, picked by `(id - 1) % len`.
const SEGMENT_TINTS: [[f32; 3]; 6] = [
    [1.0, 0.35, 0.35],
    [0.35, 1.0, 0.35],
    [0.35, 0.35, 1.0],
    [1.0, 1.0, 0.35],
    [1.0, 0.35, 1.0],
    [0.35, 1.0, 1.0],
];

/// Shaded pixel of a surface with segment label `id`. Unlabelled surfaces
/// are grey.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn shade_segment(angle: f32, id: u32) -> [u8; 4] {
    let grey = shade(angle);
    if id == 0 {
        return grey;
    }
    let tint = SEGMENT_TINTS[((id - 1) % SEGMENT_TINTS.len() as u32) as usize];
    let level = f32::from(grey[0]);
    [
        (level * tint[0]) as u8,
        (level * tint[1]) as u8,
        (level * tint[2]) as u8,
        255,
    ]
}

/// Pixel written where a ray finds no surface.
pub const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shading_is_clamped() {
        assert_eq!(shade(1.0), [255, 255, 255, 255]);
        assert_eq!(shade(0.0), [51, 51, 51, 255]);
        assert_eq!(shade(-0.7), shade(0.0));
    }

    #[test]
    fn labelled_surfaces_are_tinted() {
        assert_eq!(shade_segment(1.0, 0), shade(1.0));
        assert_eq!(shade_segment(1.0, 1), [255, 89, 89, 255]);
        assert_eq!(shade_segment(1.0, 2), [89, 255, 89, 255]);
        assert_eq!(shade_segment(0.5, 7), shade_segment(0.5, 1));
    }

    #[test]
    fn render_state_is_sized_to_request() {
        let state = RenderState::new(UVec2::new(8, 6), MemoryDevice::Host);
        assert_eq!(state.dims(), UVec2::new(8, 6));
        assert_eq!(state.min_max.len(), 48);
        assert!(state.visible_blocks.is_empty());
    }
}
