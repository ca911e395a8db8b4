//! # Tracking State
//!
//! Pose estimate plus the raycast products trackers consume.

use bytemuck::{Pod, Zeroable};
use compute::{Image, MemoryBlock, MemoryDevice, Placement};
use glam::{UVec2, Vec2, Vec4};

use crate::camera::Pose;

/// One entry of a raycast point cloud. `location.w` is `1` for valid
/// points; `colour` is RGB in `[0, 1]` with `w = 1` once normalised.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct CloudPoint {
    pub location: Vec4,
    pub colour: Vec4,
}

/// Densely packed point cloud. Only the first `count` points are valid.
#[derive(Debug)]
pub struct PointCloud {
    pub points: MemoryBlock<CloudPoint>,
    pub count: usize,
}

impl PointCloud {
    /// Valid points on `side`.
    #[must_use]
    pub fn valid(&self, side: MemoryDevice) -> &[CloudPoint] {
        &self.points.data(side)[..self.count]
    }
}

#[derive(Debug)]
pub struct TrackingState {
    /// World-to-camera pose of the depth camera.
    pub pose_d: Pose,
    /// Per-pixel raycast search interval, `x = near`, `y = far`.
    pub rendering_range: Image<Vec2>,
    /// Shaded preview of the last tracking raycast.
    pub rendering: Image<[u8; 4]>,
    /// World-space surface points, `w = 1` on hit and `-1` on miss.
    pub point_map: Image<Vec4>,
    /// Surface normals, `w = 0` on hit and `-1` on miss.
    pub normal_map: Image<Vec4>,
    pub point_cloud: PointCloud,
}

impl TrackingState {
    #[must_use]
    pub fn new(dims: UVec2, device: MemoryDevice) -> Self {
        let placement = Placement::shared_with(device);
        let pixels = dims.x as usize * dims.y as usize;
        Self {
            pose_d: Pose::identity(),
            rendering_range: Image::new(dims, Vec2::ZERO, placement),
            rendering: Image::new(dims, [0, 0, 0, 255], placement),
            point_map: Image::new(dims, Vec4::new(0.0, 0.0, 0.0, -1.0), placement),
            normal_map: Image::new(dims, Vec4::new(0.0, 0.0, 0.0, -1.0), placement),
            point_cloud: PointCloud {
                points: MemoryBlock::new(pixels, CloudPoint::default(), placement),
                count: 0,
            },
        }
    }

    #[must_use]
    pub fn dims(&self) -> UVec2 {
        self.rendering.dims()
    }

    /// Downloads every raycast product for host-side readers.
    pub fn update_host_from_device(&mut self) {
        self.rendering_range.update_host_from_device();
        self.rendering.update_host_from_device();
        self.point_map.update_host_from_device();
        self.normal_map.update_host_from_device();
        self.point_cloud.points.update_host_from_device();
    }
}
