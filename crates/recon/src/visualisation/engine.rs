use std::marker::PhantomData;

use compute::{ComputeBackend, CpuBackend, DeviceBackend, Image, MemoryDevice};
use glam::Vec2;

use super::depth_bounds::{self, DepthBoundsReport};
use super::projectors::{ColourImageProjector, IcpMapProjector, PointCloudProjector};
use super::raycast::{raycast_pixels, RaycastParams};
use super::{visibility, RenderState, VisualisationEngine};
use crate::camera::{Intrinsics, Pose};
use crate::scene::{Scene, Voxel};
use crate::tracking_state::TrackingState;
use crate::view::View;

/// [`VisualisationEngine`] running every pass on backend `B`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackendVisualisationEngine<B> {
    backend: PhantomData<B>,
}

pub type CpuVisualisationEngine = BackendVisualisationEngine<CpuBackend>;
pub type DeviceVisualisationEngine = BackendVisualisationEngine<DeviceBackend>;

impl<B: ComputeBackend> BackendVisualisationEngine<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: PhantomData,
        }
    }
}

impl<B: ComputeBackend, V: Voxel> VisualisationEngine<V> for BackendVisualisationEngine<B> {
    fn name(&self) -> &'static str {
        B::NAME
    }

    fn memory_device(&self) -> MemoryDevice {
        B::MEMORY
    }

    fn find_visible_blocks(
        &self,
        scene: &Scene<V>,
        pose: &Pose,
        intrinsics: &Intrinsics,
        state: &mut RenderState,
    ) {
        state.visible_blocks =
            visibility::find_visible_blocks::<B, V>(scene, pose, intrinsics, state.dims());
    }

    fn create_expected_depths(
        &self,
        scene: &Scene<V>,
        pose: &Pose,
        intrinsics: &Intrinsics,
        min_max: &mut Image<Vec2>,
        visible: Option<&[u32]>,
    ) -> DepthBoundsReport {
        depth_bounds::create_expected_depths::<B, V>(scene, pose, intrinsics, min_max, visible)
    }

    fn render_image(
        &self,
        scene: &Scene<V>,
        pose: &Pose,
        intrinsics: &Intrinsics,
        state: &mut RenderState,
        use_colour: bool,
    ) {
        let params = RaycastParams::new(pose, intrinsics, &scene.params, state.dims());
        let RenderState {
            min_max, output, ..
        } = state;
        let mut projector =
            ColourImageProjector::new(output.data_mut(B::MEMORY), scene.view(), use_colour);
        raycast_pixels::<B, V, _>(scene.view(), &params, min_max.data(B::MEMORY), &mut projector);
    }

    fn create_point_cloud(
        &self,
        scene: &Scene<V>,
        view: &View,
        tracking_state: &mut TrackingState,
        skip_points: bool,
    ) {
        let inv_m = tracking_state.pose_d.inv_m() * view.calib.trafo_rgb_to_depth.calib;
        let params = RaycastParams::from_inverse(
            inv_m,
            &view.calib.intrinsics_rgb,
            &scene.params,
            tracking_state.dims(),
        );
        let TrackingState {
            rendering_range,
            rendering,
            point_cloud,
            ..
        } = tracking_state;
        let mut projector = PointCloudProjector::new(
            rendering.data_mut(B::MEMORY),
            point_cloud.points.data_mut(B::MEMORY),
            scene.view(),
            scene.params.voxel_size,
            skip_points,
        );
        raycast_pixels::<B, V, _>(
            scene.view(),
            &params,
            rendering_range.data(B::MEMORY),
            &mut projector,
        );
        point_cloud.count = projector.into_count();
        tracing::debug!(points = point_cloud.count, skip_points, "created point cloud");
    }

    fn create_icp_maps(&self, scene: &Scene<V>, view: &View, tracking_state: &mut TrackingState) {
        let params = RaycastParams::new(
            &tracking_state.pose_d,
            &view.calib.intrinsics_d,
            &scene.params,
            tracking_state.dims(),
        );
        let TrackingState {
            rendering_range,
            rendering,
            point_map,
            normal_map,
            ..
        } = tracking_state;
        let mut projector = IcpMapProjector::new(
            rendering.data_mut(B::MEMORY),
            point_map.data_mut(B::MEMORY),
            normal_map.data_mut(B::MEMORY),
            scene.params.voxel_size,
        );
        raycast_pixels::<B, V, _>(
            scene.view(),
            &params,
            rendering_range.data(B::MEMORY),
            &mut projector,
        );
        tracing::debug!("created icp maps");
    }
}
