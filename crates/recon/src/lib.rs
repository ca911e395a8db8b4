#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]
//! # Volumetric Depth Fusion
//!
//! Dense 3D reconstruction from a stream of posed RGB-D frames. Depth is
//! fused into a truncated signed distance field stored sparsely in a voxel
//! block hash, and the surface is recovered by ray marching the field.
//!
//! ## Key Components
//!
//! -   **Scene:** [`Scene`] in the [`scene`] module holds the hash, the voxel
//!     arena and the optional global cache for swapped-out blocks.
//! -   **Visualisation:** the [`visualisation`] module culls blocks against
//!     the frustum, bounds the per-pixel search range and marches rays,
//!     feeding one shared traversal into three projectors: a shaded image,
//!     a point cloud and ICP point/normal maps.
//! -   **Orchestration:** [`MainEngine`] drives the per-frame stage sequence
//!     on a host or device backend chosen from [`FusionSettings`].
//! -   **Collaborators:** depth preprocessing, tracking, fusion and swapping
//!     are traits in [`engines`] with replaceable reference implementations.
//!     An optional segmentation pass relabels voxels after fusion.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recon::{FusionSettings, ImageKind, MainEngine, RgbdCalib};
//!
//! let mut engine: MainEngine = MainEngine::new(settings, calib, dims, None)?;
//! engine.view_mut().set_float_depth(&depth)?;
//! let report = engine.process_frame();
//! engine.get_image(&mut out, ImageKind::SceneRaycast, false, None, None);
//! ```

pub mod camera;
pub mod engines;
pub mod error;
pub mod main_engine;
pub mod scene;
pub mod settings;
pub mod tracking_state;
pub mod view;
pub mod visualisation;

pub use camera::{DisparityCalib, Extrinsics, Intrinsics, Pose, RgbdCalib};
pub use engines::{
    LowLevelEngine, SceneReconstructionEngine, SceneSegmentation, SwappingEngine, Tracker,
};
pub use error::{FusionError, Result};
pub use main_engine::{FrameReport, FrameStage, ImageKind, MainEngine};
pub use scene::{HashEntry, Scene, SlotState, Voxel, VoxelF, VoxelRgb};
pub use settings::{DeviceType, FusionSettings, SceneParams, TrackerType};
pub use tracking_state::{CloudPoint, PointCloud, TrackingState};
pub use view::{InputImageType, View};
pub use visualisation::{RenderState, VisualisationEngine};
