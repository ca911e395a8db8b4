mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use compute::{Image, MemoryDevice, Placement};
use glam::{IVec3, UVec2};
use recon::engines::AlternatingLabelSegmentation;
use recon::{
    DeviceType, FrameStage, FusionError, ImageKind, InputImageType, MainEngine, Pose, SceneParams,
    Tracker, TrackerType, TrackingState, View, Voxel,
};

fn engine(device: DeviceType, tracker: TrackerType, params: SceneParams) -> MainEngine {
    MainEngine::new(
        common::settings(device, tracker, params),
        common::calib(),
        common::DIMS,
        None,
    )
    .unwrap()
}

fn frame(engine: &mut MainEngine, depth: &[f32]) -> recon::FrameReport {
    engine.view_mut().set_float_depth(depth).unwrap();
    engine.process_frame()
}

fn blank(dims: UVec2) -> Image<[u8; 4]> {
    Image::new(dims, [7, 7, 7, 7], Placement::Host)
}

struct CountingTracker(Arc<AtomicUsize>);

impl Tracker for CountingTracker {
    fn track_camera(&mut self, _: &mut TrackingState, _: &View) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct NamedTracker {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Tracker for NamedTracker {
    fn track_camera(&mut self, _: &mut TrackingState, _: &View) {
        self.log.lock().unwrap().push(self.name);
    }
}

#[test]
fn single_observation_allocates_one_block_and_tracks_from_frame_two() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = engine(DeviceType::Cpu, TrackerType::Icp, common::coarse_params())
        .with_primary_tracker(Box::new(CountingTracker(Arc::clone(&calls))));
    let depth = common::single_pixel_depth(24, 20, 1.0);

    let first = frame(&mut engine, &depth);
    assert_eq!(
        first.stages,
        vec![FrameStage::Allocate, FrameStage::Integrate, FrameStage::Raycast]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(first.allocated_blocks, 1);
    assert_eq!(first.resident_blocks, 1);
    assert_eq!(first.live_blocks, 1);
    assert!(engine.scene().index.find(IVec3::new(0, 0, 2)).is_some());
    assert!(engine.has_started());

    // The block spans z in [0.8, 1.2], so its far corners bound the search.
    let bounds = engine
        .tracking_state()
        .rendering_range
        .pixel(MemoryDevice::Host, 20, 16)
        .unwrap();
    assert!((bounds.y - 1.2).abs() < 1e-5, "far bound {}", bounds.y);
    assert!((bounds.x - 0.8).abs() < 1e-5, "near bound {}", bounds.x);

    let second = frame(&mut engine, &depth);
    assert!(second.ran(FrameStage::Track));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.allocated_blocks, 0);
    assert_eq!(second.frame, 2);
}

#[test]
fn trackers_run_primary_then_secondary() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut engine = engine(DeviceType::Cpu, TrackerType::Icp, common::coarse_params())
        .with_secondary_tracker(Box::new(NamedTracker {
            name: "secondary",
            log: Arc::clone(&log),
        }))
        .with_primary_tracker(Box::new(NamedTracker {
            name: "primary",
            log: Arc::clone(&log),
        }));
    let depth = common::single_pixel_depth(24, 20, 1.0);
    frame(&mut engine, &depth);
    frame(&mut engine, &depth);
    assert_eq!(*log.lock().unwrap(), vec!["primary", "secondary"]);
}

#[test]
fn integration_can_be_switched_off() {
    let mut engine = engine(DeviceType::Cpu, TrackerType::Icp, common::coarse_params());
    engine.turn_off_integration();
    assert!(!engine.is_integration_active());

    let report = frame(&mut engine, &common::single_pixel_depth(24, 20, 1.0));
    assert!(!report.ran(FrameStage::Integrate));
    assert!(report.ran(FrameStage::Allocate));
    let slot = engine.scene().index.find(IVec3::new(0, 0, 2)).unwrap();
    let block = engine.scene().block(slot).unwrap();
    assert!(block.iter().all(|voxel| voxel.depth_weight() == 0));

    engine.turn_on_integration();
    let report = frame(&mut engine, &common::single_pixel_depth(24, 20, 1.0));
    assert!(report.ran(FrameStage::Integrate));
    let block = engine.scene().block(slot).unwrap();
    assert!(block.iter().any(|voxel| voxel.depth_weight() > 0));
}

#[test]
fn segmentation_runs_between_integration_and_swapping() {
    let mut settings = common::settings(DeviceType::Cpu, TrackerType::Icp, common::coarse_params());
    settings.use_swapping = true;
    let depth = common::single_pixel_depth(24, 20, 1.0);

    let mut plain: MainEngine =
        MainEngine::new(settings.clone(), common::calib(), common::DIMS, None).unwrap();
    assert!(!frame(&mut plain, &depth).ran(FrameStage::Segment));

    let mut engine: MainEngine = MainEngine::new(settings, common::calib(), common::DIMS, None)
        .unwrap()
        .with_scene_segmentation(Box::new(AlternatingLabelSegmentation::new()));
    let report = frame(&mut engine, &depth);
    assert_eq!(
        report.stages,
        vec![
            FrameStage::Allocate,
            FrameStage::Integrate,
            FrameStage::Segment,
            FrameStage::Swap,
            FrameStage::Raycast
        ]
    );
    let slot = engine.scene().index.find(IVec3::new(0, 0, 2)).unwrap();
    let block = engine.scene().block(slot).unwrap();
    assert!(block.iter().step_by(2).all(|voxel| voxel.id() == 1));
    assert!(block.iter().skip(1).step_by(2).all(|voxel| voxel.id() == 0));
}

#[test]
fn swapped_out_block_returns_unchanged() {
    let mut settings = common::settings(DeviceType::Cpu, TrackerType::Icp, common::coarse_params());
    settings.use_swapping = true;
    let mut engine: MainEngine =
        MainEngine::new(settings, common::calib(), common::DIMS, None).unwrap();

    let first = frame(&mut engine, &common::single_pixel_depth(24, 20, 1.0));
    assert!(first.ran(FrameStage::Swap));
    assert_eq!(first.swapped_out_blocks, 0);
    let slot = engine.scene().index.find(IVec3::new(0, 0, 2)).unwrap();
    let fused = engine.scene().block(slot).unwrap().to_vec();

    // Observe a different block; the first one is parked.
    let second = frame(&mut engine, &common::single_pixel_depth(8, 4, 1.0));
    assert!(engine.scene().index.find(IVec3::new(-1, -1, 2)).is_some());
    assert_eq!(second.swapped_out_blocks, 1);
    assert_eq!(second.resident_blocks, 1);
    assert!(engine.scene().block(slot).is_none());

    engine.turn_off_integration();
    let third = frame(&mut engine, &common::single_pixel_depth(24, 20, 1.0));
    assert_eq!(third.resident_blocks, 1);
    assert_eq!(third.swapped_out_blocks, 1);
    assert_eq!(engine.scene().block(slot).unwrap(), fused.as_slice());
}

#[test]
fn device_results_reach_the_host_only_on_request() {
    let mut engine = engine(DeviceType::Device, TrackerType::Icp, common::plane_params());
    assert_eq!(engine.memory_device(), MemoryDevice::Device);
    frame(&mut engine, &common::flat_depth(common::PLANE_Z));

    let rendering = &engine.tracking_state().rendering;
    assert!(rendering
        .data(MemoryDevice::Host)
        .iter()
        .all(|&pixel| pixel == [0, 0, 0, 255]));
    assert!(rendering
        .data(MemoryDevice::Device)
        .iter()
        .any(|&pixel| pixel != [0, 0, 0, 255]));
    let device_copy = rendering.data(MemoryDevice::Device).to_vec();

    let mut out = blank(UVec2::ONE);
    engine.get_image(&mut out, ImageKind::SceneRaycast, false, None, None);
    assert_eq!(out.dims(), common::DIMS);
    assert_eq!(out.data(MemoryDevice::Host), device_copy.as_slice());
}

#[test]
fn backends_agree_on_the_tracking_raycast() {
    let mut images = Vec::new();
    for device in [DeviceType::Cpu, DeviceType::Device] {
        let mut engine = engine(device, TrackerType::Icp, common::plane_params());
        frame(&mut engine, &common::flat_depth(common::PLANE_Z));
        let mut out = blank(common::DIMS);
        engine.get_image(&mut out, ImageKind::SceneRaycast, false, None, None);
        images.push(out.data(MemoryDevice::Host).to_vec());
    }
    assert_eq!(images[0], images[1]);
    let centre = images[0][16 + 12 * common::DIMS.x as usize];
    assert!(centre[0] > 200, "{centre:?}");
}

#[test]
fn colour_tracking_builds_a_point_cloud() {
    let mut engine = engine(DeviceType::Cpu, TrackerType::Colour, common::plane_params());
    let report = frame(&mut engine, &common::flat_depth(common::PLANE_Z));
    let points = report.point_cloud_points.unwrap();
    assert!(points > 0);
    assert_eq!(engine.tracking_state().point_cloud.count, points);

    for tracker in [TrackerType::Icp, TrackerType::Ren] {
        let mut depth_only = crate::engine(DeviceType::Cpu, tracker, common::plane_params());
        let report = frame(&mut depth_only, &common::flat_depth(common::PLANE_Z));
        assert_eq!(report.point_cloud_points, None);
        assert_eq!(depth_only.tracking_state().point_cloud.count, 0);
    }
}

#[test]
fn free_camera_without_pose_leaves_output_untouched() {
    let mut engine = engine(DeviceType::Cpu, TrackerType::Icp, common::plane_params());
    frame(&mut engine, &common::flat_depth(common::PLANE_Z));

    let mut out = blank(common::DIMS);
    let intrinsics = common::intrinsics();
    engine.get_image(&mut out, ImageKind::FreeCameraRaycast, false, None, Some(&intrinsics));
    engine.get_image(
        &mut out,
        ImageKind::FreeCameraRaycast,
        false,
        Some(&Pose::identity()),
        None,
    );
    assert!(out.data(MemoryDevice::Host).iter().all(|&p| p == [7, 7, 7, 7]));
    assert!(engine.render_state().is_none());
}

#[test]
fn free_camera_render_state_follows_output_size() {
    let mut engine = engine(DeviceType::Cpu, TrackerType::Icp, common::plane_params());
    frame(&mut engine, &common::flat_depth(common::PLANE_Z));
    let pose = Pose::identity();
    let intrinsics = common::intrinsics();

    let mut small = blank(UVec2::new(16, 12));
    engine.get_image(&mut small, ImageKind::FreeCameraRaycast, false, Some(&pose), Some(&intrinsics));
    assert_eq!(engine.render_state().unwrap().dims(), UVec2::new(16, 12));
    assert_eq!(small.dims(), UVec2::new(16, 12));

    let mut full = blank(common::DIMS);
    engine.get_image(&mut full, ImageKind::FreeCameraRaycast, false, Some(&pose), Some(&intrinsics));
    assert_eq!(engine.render_state().unwrap().dims(), common::DIMS);
    let centre = full.pixel(MemoryDevice::Host, 16, 12).unwrap();
    assert!(centre[0] > 200, "{centre:?}");
}

#[test]
fn millimetre_depth_is_converted_before_fusion() -> anyhow::Result<()> {
    let mut engine = engine(DeviceType::Cpu, TrackerType::Icp, common::plane_params());
    let pixels = (common::DIMS.x * common::DIMS.y) as usize;
    engine.view_mut().set_short_depth(&vec![500; pixels])?;
    assert_eq!(engine.view().input_image_type, InputImageType::ShortDepth);

    let report = engine.process_frame();
    assert_eq!(report.stages.first(), Some(&FrameStage::Preprocess));
    assert!(report.allocated_blocks > 0);
    assert!(engine
        .view()
        .depth
        .data(MemoryDevice::Host)
        .iter()
        .all(|&d| (d - 0.5).abs() < 1e-6));
    Ok(())
}

#[test]
fn original_images_are_resized_to_their_source() {
    let mut engine = engine(DeviceType::Device, TrackerType::Icp, common::plane_params());
    let width = common::DIMS.x as usize;
    let depth: Vec<f32> = (0..width * common::DIMS.y as usize)
        .map(|i| if i / width < 12 { 0.5 } else { 1.0 })
        .collect();
    frame(&mut engine, &depth);

    let mut out = blank(UVec2::ONE);
    engine.get_image(&mut out, ImageKind::OriginalDepth, false, None, None);
    assert_eq!(out.dims(), common::DIMS);
    assert_ne!(
        out.pixel(MemoryDevice::Host, 0, 0),
        out.pixel(MemoryDevice::Host, 0, 23)
    );

    let mut rgb = blank(UVec2::ONE);
    engine.get_image(&mut rgb, ImageKind::OriginalRgb, false, None, None);
    assert_eq!(rgb.dims(), common::DIMS);
}

#[test]
fn invalid_settings_are_rejected() {
    let mut params = common::coarse_params();
    params.bucket_count = 1000;
    let result: recon::Result<MainEngine> = MainEngine::new(
        common::settings(DeviceType::Cpu, TrackerType::Icp, params),
        common::calib(),
        common::DIMS,
        None,
    );
    assert!(matches!(result, Err(FusionError::InvalidSettings(_))));
}
