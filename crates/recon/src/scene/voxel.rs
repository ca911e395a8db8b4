//! Voxel formats.
//!
//! Signed distances are stored normalised to `[-1, 1]` in units of the
//! truncation band `mu`. Weights count fused observations. Voxels may carry
//! a segment label; `0` means unlabelled.

use bytemuck::{Pod, Zeroable};

/// Storage format of one voxel.
pub trait Voxel: Pod + Default + Send + Sync + 'static {
    /// Whether the format stores a fused colour.
    const HAS_COLOUR: bool;

    fn sdf(&self) -> f32;
    fn set_sdf(&mut self, sdf: f32);

    fn depth_weight(&self) -> u32;
    fn set_depth_weight(&mut self, weight: u32);

    fn colour(&self) -> [u8; 3] {
        [0; 3]
    }

    fn colour_weight(&self) -> u32 {
        0
    }

    fn set_colour(&mut self, _colour: [u8; 3], _weight: u32) {}

    /// Segment label. Formats without one always read `0`.
    fn id(&self) -> u32 {
        0
    }

    fn set_id(&mut self, _id: u32) {}
}

const SDF_SCALE: f32 = 32767.0;

/// Compact coloured voxel: 16-bit fixed-point distance, 8-bit weights and
/// an 8-bit segment label.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VoxelRgb {
    sdf: i16,
    w_depth: u8,
    w_colour: u8,
    clr: [u8; 3],
    id: u8,
}

impl Default for VoxelRgb {
    fn default() -> Self {
        Self {
            sdf: i16::MAX,
            w_depth: 0,
            w_colour: 0,
            clr: [0; 3],
            id: 0,
        }
    }
}

impl Voxel for VoxelRgb {
    const HAS_COLOUR: bool = true;

    fn sdf(&self) -> f32 {
        f32::from(self.sdf) / SDF_SCALE
    }

    #[allow(clippy::cast_possible_truncation)]
    fn set_sdf(&mut self, sdf: f32) {
        self.sdf = (sdf.clamp(-1.0, 1.0) * SDF_SCALE).round() as i16;
    }

    fn depth_weight(&self) -> u32 {
        u32::from(self.w_depth)
    }

    fn set_depth_weight(&mut self, weight: u32) {
        self.w_depth = saturate_u8(weight);
    }

    fn colour(&self) -> [u8; 3] {
        self.clr
    }

    fn colour_weight(&self) -> u32 {
        u32::from(self.w_colour)
    }

    fn set_colour(&mut self, colour: [u8; 3], weight: u32) {
        self.clr = colour;
        self.w_colour = saturate_u8(weight);
    }

    fn id(&self) -> u32 {
        u32::from(self.id)
    }

    fn set_id(&mut self, id: u32) {
        self.id = saturate_u8(id);
    }
}

/// Float distance, no colour.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VoxelF {
    sdf: f32,
    w_depth: u8,
    _pad: [u8; 3],
}

impl Default for VoxelF {
    fn default() -> Self {
        Self {
            sdf: 1.0,
            w_depth: 0,
            _pad: [0; 3],
        }
    }
}

impl Voxel for VoxelF {
    const HAS_COLOUR: bool = false;

    fn sdf(&self) -> f32 {
        self.sdf
    }

    fn set_sdf(&mut self, sdf: f32) {
        self.sdf = sdf.clamp(-1.0, 1.0);
    }

    fn depth_weight(&self) -> u32 {
        u32::from(self.w_depth)
    }

    fn set_depth_weight(&mut self, weight: u32) {
        self.w_depth = saturate_u8(weight);
    }
}

fn saturate_u8(value: u32) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}
