//! # Collaborators
//!
//! Interfaces of the engines the frame pipeline drives but does not own the
//! algorithms of: depth preprocessing, camera tracking, fusion, swapping
//! and segment labelling.
//! Each comes with a reference implementation so the pipeline runs end to
//! end; any of them can be replaced through the
//! [`MainEngine`](crate::MainEngine) builder methods.

pub mod low_level;
pub mod reconstruction;
pub mod segmentation;
pub mod swapping;

use compute::Image;

pub use low_level::ReferenceLowLevelEngine;
pub use reconstruction::ReferenceReconstructionEngine;
pub use segmentation::AlternatingLabelSegmentation;
pub use swapping::ReferenceSwappingEngine;

use crate::camera::{DisparityCalib, Intrinsics, Pose};
use crate::scene::{Scene, Voxel};
use crate::tracking_state::TrackingState;
use crate::view::View;

/// Converts raw sensor depth into metres.
pub trait LowLevelEngine: Send + Sync {
    fn convert_disparity_to_depth(
        &self,
        out: &mut Image<f32>,
        disparity: &Image<u16>,
        intrinsics_d: &Intrinsics,
        calib: &DisparityCalib,
    );

    fn convert_depth_mm_to_float(&self, out: &mut Image<f32>, depth_mm: &Image<u16>);
}

/// Refines the pose estimate in `tracking_state` against the current view.
pub trait Tracker: Send {
    fn track_camera(&mut self, tracking_state: &mut TrackingState, view: &View);
}

/// Grows and fuses the distance field.
pub trait SceneReconstructionEngine<V: Voxel>: Send + Sync {
    /// Allocates every block near the surface observed in `view` from
    /// `pose`, and records the touched slots in [`Scene::live_entries`].
    fn allocate_scene_from_depth(&self, scene: &mut Scene<V>, view: &View, pose: &Pose);

    /// Fuses the depth (and colour, if `V` stores it) of `view` into the
    /// live blocks.
    fn integrate_into_scene(&self, scene: &mut Scene<V>, view: &View, pose: &Pose);
}

/// Rewrites the segment labels of resident voxels after fusion.
pub trait SceneSegmentation<V: Voxel>: Send + Sync {
    fn segment(&self, scene: &mut Scene<V>);
}

/// Moves blocks between the local arena and the global cache.
pub trait SwappingEngine<V: Voxel>: Send + Sync {
    /// Brings swapped-out blocks needed by the current frame back.
    fn integrate_global_into_local(&self, scene: &mut Scene<V>, view: &View);

    /// Parks resident blocks the current frame did not touch.
    fn save_to_global_memory(&self, scene: &mut Scene<V>, view: &View);
}
