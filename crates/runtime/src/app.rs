//! # Frame Loop
//!
//! Builds a [`MainEngine`] from the command line, feeds it the synthetic
//! sequence frame by frame, and exports previews along the way.
//!
//! Settings come from [`FusionSettings::default`] or a JSON file given with
//! `--settings`; the remaining flags override individual fields. Calibration
//! defaults to a Kinect-like pinhole model scaled to the frame size.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use compute::{Image, Placement};
use glam::{Mat4, UVec2, Vec3};
use recon::engines::AlternatingLabelSegmentation;
use recon::{DeviceType, FusionSettings, ImageKind, Intrinsics, MainEngine, Pose, RgbdCalib};

use crate::export::PngExporter;
use crate::synthetic::{sweep, ScriptedPoseTracker, SyntheticScene};

/// Offset of the free viewpoint from the tracked camera, in camera space.
const FREE_VIEW_OFFSET: Vec3 = Vec3::new(-0.1, -0.05, -0.1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Cpu,
    Device,
}

impl From<Backend> for DeviceType {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Cpu => DeviceType::Cpu,
            Backend::Device => DeviceType::Device,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "fusion_main",
    about = "Fuses a synthetic RGB-D sequence into a voxel block hash."
)]
pub struct Args {
    /// JSON settings file. The flags below override its values.
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// JSON calibration file.
    #[arg(long)]
    pub calib: Option<PathBuf>,
    #[arg(long, default_value_t = 30)]
    pub frames: u32,
    #[arg(long, default_value_t = 320)]
    pub width: u32,
    #[arg(long, default_value_t = 240)]
    pub height: u32,
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,
    /// Voxel edge length in metres.
    #[arg(long)]
    pub voxel_size: Option<f32>,
    /// Park blocks outside the current view in the global cache.
    #[arg(long)]
    pub swapping: bool,
    /// Relabel voxels with the alternating segmentation pass after fusion.
    #[arg(long)]
    pub segment: bool,
    /// Relative amplitude of the uniform depth noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f32,
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
    /// Directory for PNG previews. Nothing is written without it.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Export every n-th frame. The last frame is always exported.
    #[arg(long, default_value_t = 10)]
    pub export_every: u32,
}

/// Final state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub resident_blocks: usize,
    pub swapped_out_blocks: usize,
    pub exported: Vec<PathBuf>,
}

/// Resolves the engine settings from the settings file and flags.
///
/// # Errors
///
/// Fails if the settings file cannot be loaded or the result is invalid.
pub fn load_settings(args: &Args) -> Result<FusionSettings> {
    let mut settings = match &args.settings {
        Some(path) => FusionSettings::from_json_file(path)?,
        None => FusionSettings::default(),
    };
    if let Some(backend) = args.backend {
        settings.device = backend.into();
    }
    if let Some(voxel_size) = args.voxel_size {
        settings.scene.voxel_size = voxel_size;
    }
    if args.swapping {
        settings.use_swapping = true;
    }
    settings.validate()?;
    Ok(settings)
}

/// Default intrinsics rescaled from a 640-pixel-wide sensor to `dims`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn default_calib(dims: UVec2) -> RgbdCalib {
    let reference = Intrinsics::default();
    let scale = dims.x as f32 / 640.0;
    let intrinsics = Intrinsics::new(
        reference.fx * scale,
        reference.fy * scale,
        dims.x as f32 / 2.0,
        dims.y as f32 / 2.0,
    );
    RgbdCalib {
        intrinsics_rgb: intrinsics,
        intrinsics_d: intrinsics,
        ..RgbdCalib::default()
    }
}

/// Runs the whole synthetic sequence.
///
/// # Errors
///
/// Returns any error from loading configuration, feeding frames, or writing
/// previews.
pub fn run(args: &Args) -> Result<RunSummary> {
    let dims = UVec2::new(args.width, args.height);
    let settings = load_settings(args)?;
    let calib = match &args.calib {
        Some(path) => RgbdCalib::from_json_file(path)?,
        None => default_calib(dims),
    };

    let scene = SyntheticScene::default();
    let poses = sweep(&scene, args.frames as usize);
    let mut engine: MainEngine = MainEngine::new(settings, calib, dims, None)?
        .with_primary_tracker(Box::new(ScriptedPoseTracker::new(poses.clone())));
    if args.segment {
        engine = engine.with_scene_segmentation(Box::new(AlternatingLabelSegmentation::new()));
    }
    if let Some(first) = poses.first() {
        engine.tracking_state_mut().pose_d = *first;
    }

    let mut exporter = args
        .output_dir
        .as_deref()
        .map(PngExporter::new)
        .transpose()?;
    let mut rng = fastrand::Rng::with_seed(args.seed);

    tracing::info!(frames = poses.len(), ?dims, "Starting synthetic sequence.");
    for (index, pose) in poses.iter().enumerate() {
        let frame = scene.render(pose, &calib, dims, args.noise, &mut rng);
        let view = engine.view_mut();
        view.set_float_depth(&frame.depth)?;
        view.set_rgb(&frame.rgb)?;

        let report = engine.process_frame();
        tracing::info!(
            frame = report.frame,
            new_blocks = report.allocated_blocks,
            resident = report.resident_blocks,
            live = report.live_blocks,
            swapped_out = report.swapped_out_blocks,
            "Processed frame."
        );

        let last = index + 1 == poses.len();
        let due = args.export_every > 0 && report.frame % u64::from(args.export_every) == 0;
        if let Some(exporter) = exporter.as_mut() {
            if last || due {
                export_previews(&mut engine, exporter, report.frame, &calib)?;
            }
        }
    }

    Ok(RunSummary {
        frames: engine.frame_count(),
        resident_blocks: engine.scene().allocated_block_count(),
        swapped_out_blocks: engine.scene().swapped_out_count(),
        exported: exporter.map(PngExporter::into_written).unwrap_or_default(),
    })
}

/// Saves the tracking raycast, the input depth and a free-viewpoint render.
fn export_previews(
    engine: &mut MainEngine,
    exporter: &mut PngExporter,
    frame: u64,
    calib: &RgbdCalib,
) -> Result<()> {
    let mut image = Image::new(UVec2::ONE, [0, 0, 0, 255], Placement::Host);
    engine.get_image(&mut image, ImageKind::SceneRaycast, false, None, None);
    exporter.save(&image, frame, "raycast")?;
    engine.get_image(&mut image, ImageKind::OriginalDepth, false, None, None);
    exporter.save(&image, frame, "depth")?;

    let pose_d = engine.tracking_state().pose_d;
    let free_pose = Pose::from_matrix(Mat4::from_translation(FREE_VIEW_OFFSET) * pose_d.m());
    let mut free = Image::new(engine.view().depth_dims(), [0, 0, 0, 255], Placement::Host);
    engine.get_image(
        &mut free,
        ImageKind::FreeCameraRaycast,
        true,
        Some(&free_pose),
        Some(&calib.intrinsics_d),
    );
    exporter.save(&free, frame, "free")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "fusion_main",
            "--backend",
            "device",
            "--voxel-size",
            "0.02",
            "--swapping",
        ]);
        let settings = load_settings(&args).unwrap();
        assert_eq!(settings.device, DeviceType::Device);
        assert!(settings.use_swapping);
        assert!((settings.scene.voxel_size - 0.02).abs() < f32::EPSILON);
        assert_eq!(args.frames, 30);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = Args::parse_from(["fusion_main", "--voxel-size=-1"]);
        assert!(load_settings(&args).is_err());
    }

    #[test]
    fn default_calibration_centres_the_principal_point() {
        let calib = default_calib(UVec2::new(320, 240));
        assert!((calib.intrinsics_d.fx - 290.0).abs() < 1e-4);
        assert!((calib.intrinsics_d.cx - 160.0).abs() < f32::EPSILON);
        assert!((calib.intrinsics_d.cy - 120.0).abs() < f32::EPSILON);
    }
}
