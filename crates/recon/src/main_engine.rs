//! # Frame Orchestration
//!
//! [`MainEngine`] owns the scene, the current view and the tracking state,
//! and runs every frame through a fixed sequence of stages:
//!
//! ```text
//! PREPROCESS -> TRACK -> ALLOCATE -> INTEGRATE -> [SEGMENT] -> [SWAP] -> RAYCAST
//! ```
//!
//! *   **Preprocess** converts raw sensor depth to metres. Skipped when the
//!     view already holds float depth.
//! *   **Track** runs the primary and then the secondary tracker. Skipped on
//!     the first frame, when there is nothing to track against.
//! *   **Allocate** grows the hash around the observed surface.
//! *   **Integrate** fuses the frame. Can be switched off at runtime.
//! *   **Segment** relabels voxels, if a segmentation pass was installed.
//! *   **Swap** exchanges blocks with the global cache, if enabled.
//! *   **Raycast** renders what the tracker needs next frame: ICP maps from
//!     the depth camera, or a point cloud from the colour camera.
//!
//! On the device backend the input images are uploaded at the start of
//! each frame, and buffers are downloaded before the host reads them.

use compute::{CpuBackend, DeviceBackend, Image, MemoryDevice};
use glam::UVec2;

use crate::camera::{Intrinsics, Pose, RgbdCalib};
use crate::engines::{
    LowLevelEngine, ReferenceLowLevelEngine, ReferenceReconstructionEngine,
    ReferenceSwappingEngine, SceneReconstructionEngine, SceneSegmentation, SwappingEngine,
    Tracker,
};
use crate::error::Result;
use crate::scene::{Scene, Voxel, VoxelRgb};
use crate::settings::{DeviceType, FusionSettings};
use crate::tracking_state::TrackingState;
use crate::view::{InputImageType, View};
use crate::visualisation::depth_colour::depth_to_uchar4;
use crate::visualisation::{
    make_visualisation_engine, DepthBoundsReport, RenderState, VisualisationEngine,
};

/// Image a caller can request from [`MainEngine::get_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// The colour input of the last frame.
    OriginalRgb,
    /// The depth input of the last frame in false colour.
    OriginalDepth,
    /// The shaded preview of the last tracking raycast.
    SceneRaycast,
    /// A raycast from a caller-supplied pose and intrinsics.
    FreeCameraRaycast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Preprocess,
    Track,
    Allocate,
    Integrate,
    Segment,
    Swap,
    Raycast,
}

/// What one call to [`MainEngine::process_frame`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// One-based index of the frame.
    pub frame: u64,
    /// Stages that ran, in order.
    pub stages: Vec<FrameStage>,
    /// Blocks added to the scene by this frame.
    pub allocated_blocks: usize,
    /// Blocks resident after the frame.
    pub resident_blocks: usize,
    /// Slots touched by this frame's depth.
    pub live_blocks: usize,
    pub swapped_out_blocks: usize,
    pub depth_bounds: DepthBoundsReport,
    /// Points in the tracking point cloud, for colour tracking.
    pub point_cloud_points: Option<usize>,
}

impl FrameReport {
    #[must_use]
    pub fn ran(&self, stage: FrameStage) -> bool {
        self.stages.contains(&stage)
    }
}

pub struct MainEngine<V: Voxel = VoxelRgb> {
    settings: FusionSettings,
    device: MemoryDevice,
    scene: Scene<V>,
    view: View,
    tracking_state: TrackingState,
    low_level: Box<dyn LowLevelEngine>,
    reconstruction: Box<dyn SceneReconstructionEngine<V>>,
    swapping: Option<Box<dyn SwappingEngine<V>>>,
    segmentation: Option<Box<dyn SceneSegmentation<V>>>,
    visualisation: Box<dyn VisualisationEngine<V>>,
    tracker_primary: Option<Box<dyn Tracker>>,
    tracker_secondary: Option<Box<dyn Tracker>>,
    render_state: Option<RenderState>,
    has_started: bool,
    fusion_active: bool,
    frame_count: u64,
}

impl<V: Voxel> MainEngine<V> {
    /// Builds an engine for a sensor with the given calibration. `depth_dims`
    /// defaults to `rgb_dims`.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidSettings`](crate::FusionError::InvalidSettings)
    /// if `settings` fail validation.
    pub fn new(
        settings: FusionSettings,
        calib: RgbdCalib,
        rgb_dims: UVec2,
        depth_dims: Option<UVec2>,
    ) -> Result<Self> {
        settings.validate()?;
        let depth_dims = depth_dims.unwrap_or(rgb_dims);
        let (device, low_level, reconstruction): (
            MemoryDevice,
            Box<dyn LowLevelEngine>,
            Box<dyn SceneReconstructionEngine<V>>,
        ) = match settings.device {
            DeviceType::Cpu => (
                MemoryDevice::Host,
                Box::new(ReferenceLowLevelEngine::<CpuBackend>::new()),
                Box::new(ReferenceReconstructionEngine::<CpuBackend>::new()),
            ),
            DeviceType::Device => (
                MemoryDevice::Device,
                Box::new(ReferenceLowLevelEngine::<DeviceBackend>::new()),
                Box::new(ReferenceReconstructionEngine::<DeviceBackend>::new()),
            ),
        };
        let swapping: Option<Box<dyn SwappingEngine<V>>> = settings
            .use_swapping
            .then(|| Box::new(ReferenceSwappingEngine::new()) as Box<dyn SwappingEngine<V>>);

        tracing::info!(
            device = ?settings.device,
            tracker = ?settings.tracker_type,
            use_swapping = settings.use_swapping,
            rgb = ?rgb_dims,
            depth = ?depth_dims,
            "Initialising fusion engine."
        );

        Ok(Self {
            scene: Scene::new(settings.scene, settings.use_swapping),
            view: View::new(calib, rgb_dims, depth_dims, device),
            tracking_state: TrackingState::new(depth_dims, device),
            visualisation: make_visualisation_engine(settings.device),
            settings,
            device,
            low_level,
            reconstruction,
            swapping,
            segmentation: None,
            tracker_primary: None,
            tracker_secondary: None,
            render_state: None,
            has_started: false,
            fusion_active: true,
            frame_count: 0,
        })
    }

    /// Tracker run first on every frame after the first.
    #[must_use]
    pub fn with_primary_tracker(mut self, tracker: Box<dyn Tracker>) -> Self {
        self.tracker_primary = Some(tracker);
        self
    }

    /// Tracker run after the primary one, refining its estimate.
    #[must_use]
    pub fn with_secondary_tracker(mut self, tracker: Box<dyn Tracker>) -> Self {
        self.tracker_secondary = Some(tracker);
        self
    }

    #[must_use]
    pub fn with_low_level_engine(mut self, engine: Box<dyn LowLevelEngine>) -> Self {
        self.low_level = engine;
        self
    }

    #[must_use]
    pub fn with_reconstruction_engine(mut self, engine: Box<dyn SceneReconstructionEngine<V>>) -> Self {
        self.reconstruction = engine;
        self
    }

    /// Replaces the swapping engine. Only consulted when swapping is enabled
    /// in the settings.
    #[must_use]
    pub fn with_swapping_engine(mut self, engine: Box<dyn SwappingEngine<V>>) -> Self {
        self.swapping = Some(engine);
        self
    }

    /// Installs a pass that relabels voxels between integration and
    /// swapping. None runs by default.
    #[must_use]
    pub fn with_scene_segmentation(mut self, segmentation: Box<dyn SceneSegmentation<V>>) -> Self {
        self.segmentation = Some(segmentation);
        self
    }

    /// Runs one frame through the pipeline. The input is whatever was last
    /// written into [`view_mut`](Self::view_mut).
    pub fn process_frame(&mut self) -> FrameReport {
        self.frame_count += 1;
        let mut stages = Vec::with_capacity(7);
        let on_device = self.device == MemoryDevice::Device;

        if on_device {
            self.view.update_device_from_host();
        }

        let view = &mut self.view;
        match view.input_image_type {
            InputImageType::FloatDepth => {}
            InputImageType::Disparity => {
                self.low_level.convert_disparity_to_depth(
                    &mut view.depth,
                    &view.raw_depth,
                    &view.calib.intrinsics_d,
                    &view.calib.disparity_calib,
                );
                stages.push(FrameStage::Preprocess);
            }
            InputImageType::ShortDepth => {
                self.low_level
                    .convert_depth_mm_to_float(&mut view.depth, &view.raw_depth);
                stages.push(FrameStage::Preprocess);
            }
        }

        if self.has_started {
            if on_device {
                self.tracking_state.update_host_from_device();
            }
            if let Some(tracker) = self.tracker_primary.as_mut() {
                tracker.track_camera(&mut self.tracking_state, &self.view);
            }
            if let Some(tracker) = self.tracker_secondary.as_mut() {
                tracker.track_camera(&mut self.tracking_state, &self.view);
            }
            stages.push(FrameStage::Track);
        }

        let pose_d = self.tracking_state.pose_d;
        let before = self.scene.allocated_block_count();
        self.reconstruction
            .allocate_scene_from_depth(&mut self.scene, &self.view, &pose_d);
        let allocated_blocks = self.scene.allocated_block_count().saturating_sub(before);
        stages.push(FrameStage::Allocate);

        if self.fusion_active {
            self.reconstruction
                .integrate_into_scene(&mut self.scene, &self.view, &pose_d);
            stages.push(FrameStage::Integrate);
        }

        if let Some(segmentation) = self.segmentation.as_ref() {
            segmentation.segment(&mut self.scene);
            stages.push(FrameStage::Segment);
        }

        if self.settings.use_swapping {
            if let Some(swapping) = self.swapping.as_ref() {
                swapping.integrate_global_into_local(&mut self.scene, &self.view);
                swapping.save_to_global_memory(&mut self.scene, &self.view);
                stages.push(FrameStage::Swap);
            }
        }

        let (depth_bounds, point_cloud_points) = self.raycast(&pose_d);
        stages.push(FrameStage::Raycast);
        self.has_started = true;

        let report = FrameReport {
            frame: self.frame_count,
            stages,
            allocated_blocks,
            resident_blocks: self.scene.allocated_block_count(),
            live_blocks: self.scene.live_entries.len(),
            swapped_out_blocks: self.scene.swapped_out_count(),
            depth_bounds,
            point_cloud_points,
        };
        tracing::debug!(
            frame = report.frame,
            stages = ?report.stages,
            allocated = report.allocated_blocks,
            resident = report.resident_blocks,
            rendering_blocks = report.depth_bounds.rendering_blocks,
            "processed frame"
        );
        report
    }

    fn raycast(&mut self, pose_d: &Pose) -> (DepthBoundsReport, Option<usize>) {
        let calib = self.view.calib;
        if self.settings.tracker_type.uses_point_cloud() {
            let pose_rgb = calib.colour_pose(pose_d);
            let report = self.visualisation.create_expected_depths(
                &self.scene,
                &pose_rgb,
                &calib.intrinsics_rgb,
                &mut self.tracking_state.rendering_range,
                None,
            );
            self.visualisation.create_point_cloud(
                &self.scene,
                &self.view,
                &mut self.tracking_state,
                self.settings.skip_points,
            );
            (report, Some(self.tracking_state.point_cloud.count))
        } else {
            let report = self.visualisation.create_expected_depths(
                &self.scene,
                pose_d,
                &calib.intrinsics_d,
                &mut self.tracking_state.rendering_range,
                None,
            );
            self.visualisation
                .create_icp_maps(&self.scene, &self.view, &mut self.tracking_state);
            (report, None)
        }
    }

    /// Writes the requested image into the host copy of `out`.
    ///
    /// [`ImageKind::FreeCameraRaycast`] renders at the resolution of `out`
    /// and needs both `pose` and `intrinsics`; without them `out` is left
    /// as it was. The other kinds resize `out` to their source.
    pub fn get_image(
        &mut self,
        out: &mut Image<[u8; 4]>,
        kind: ImageKind,
        use_colour: bool,
        pose: Option<&Pose>,
        intrinsics: Option<&Intrinsics>,
    ) {
        let on_device = self.device == MemoryDevice::Device;
        match kind {
            ImageKind::OriginalRgb => {
                if on_device {
                    self.view.rgb.update_host_from_device();
                }
                copy_to_host(out, &self.view.rgb);
            }
            ImageKind::OriginalDepth => {
                if on_device {
                    self.view.depth.update_host_from_device();
                }
                out.change_dims(self.view.depth_dims());
                depth_to_uchar4(out, &self.view.depth);
            }
            ImageKind::SceneRaycast => {
                if on_device {
                    self.tracking_state.rendering.update_host_from_device();
                }
                copy_to_host(out, &self.tracking_state.rendering);
            }
            ImageKind::FreeCameraRaycast => {
                let (Some(pose), Some(intrinsics)) = (pose, intrinsics) else {
                    tracing::debug!("free camera raycast needs a pose and intrinsics");
                    return;
                };
                let dims = out.dims();
                let state = match self.render_state.take() {
                    Some(state) if state.dims() == dims => state,
                    _ => self.visualisation.allocate_render_state(dims),
                };
                let state = self.render_state.insert(state);
                self.visualisation
                    .find_visible_blocks(&self.scene, pose, intrinsics, state);
                self.visualisation.create_expected_depths(
                    &self.scene,
                    pose,
                    intrinsics,
                    &mut state.min_max,
                    Some(state.visible_blocks.as_slice()),
                );
                self.visualisation
                    .render_image(&self.scene, pose, intrinsics, state, use_colour);
                if on_device {
                    state.output.update_host_from_device();
                }
                copy_to_host(out, &state.output);
            }
        }
    }

    pub fn turn_on_integration(&mut self) {
        self.fusion_active = true;
    }

    pub fn turn_off_integration(&mut self) {
        self.fusion_active = false;
    }

    #[must_use]
    pub fn is_integration_active(&self) -> bool {
        self.fusion_active
    }

    #[must_use]
    pub fn has_started(&self) -> bool {
        self.has_started
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn settings(&self) -> &FusionSettings {
        &self.settings
    }

    /// Memory side the engine's passes run on.
    #[must_use]
    pub fn memory_device(&self) -> MemoryDevice {
        self.device
    }

    #[must_use]
    pub fn scene(&self) -> &Scene<V> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene<V> {
        &mut self.scene
    }

    #[must_use]
    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut View {
        &mut self.view
    }

    #[must_use]
    pub fn tracking_state(&self) -> &TrackingState {
        &self.tracking_state
    }

    pub fn tracking_state_mut(&mut self) -> &mut TrackingState {
        &mut self.tracking_state
    }

    /// Free-camera render state, once a free-camera image was requested.
    #[must_use]
    pub fn render_state(&self) -> Option<&RenderState> {
        self.render_state.as_ref()
    }
}

/// Resizes `out` to `src` and copies the host copy across.
fn copy_to_host(out: &mut Image<[u8; 4]>, src: &Image<[u8; 4]>) {
    out.change_dims(src.dims());
    if let Err(error) = out.set_from(src, MemoryDevice::Host) {
        tracing::error!("failed to copy image: {error}");
    }
}
