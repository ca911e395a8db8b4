//! Raycast consumers.
//!
//! Every projector writes the shaded preview pixel for each visit; they
//! differ in what else they record for pixels where the ray found a
//! surface.

use compute::AppendBuffer;
use glam::{Vec3, Vec4};

use super::raycast::{PixelSpan, PixelVisit, RaycastConsumer};
use super::{shade_segment, BACKGROUND};
use crate::scene::{BlockCache, SceneView, Voxel};
use crate::tracking_state::CloudPoint;

fn draw_rendering(visit: &PixelVisit) -> [u8; 4] {
    if visit.found {
        shade_segment(visit.angle, visit.id)
    } else {
        BACKGROUND
    }
}

/// Interpolated colour at `point`, normalised by its accumulated weight.
/// `w` is `1` once normalised and `0` where no colour was ever observed.
fn normalised_colour<V: Voxel>(scene: &SceneView<'_, V>, cache: &mut BlockCache, point: Vec3) -> Vec4 {
    let colour = scene.colour_interpolated(point, cache);
    if colour.w > 0.0 {
        (colour.truncate() / colour.w).extend(1.0)
    } else {
        colour
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_rgba(colour: Vec4) -> [u8; 4] {
    let rgb = (colour.truncate().clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    [rgb.x as u8, rgb.y as u8, rgb.z as u8, 255]
}

/// Shaded or coloured image of the surface.
pub struct ColourImageProjector<'a, V> {
    output: &'a mut [[u8; 4]],
    scene: SceneView<'a, V>,
    use_colour: bool,
}

impl<'a, V: Voxel> ColourImageProjector<'a, V> {
    /// Colour is only blended in when requested and `V` stores it.
    pub fn new(output: &'a mut [[u8; 4]], scene: SceneView<'a, V>, use_colour: bool) -> Self {
        Self {
            output,
            scene,
            use_colour: use_colour && V::HAS_COLOUR,
        }
    }
}

pub struct ColourImageSpan<'s, V> {
    output: &'s mut [[u8; 4]],
    start: usize,
    scene: SceneView<'s, V>,
    use_colour: bool,
    cache: BlockCache,
}

impl<V: Voxel> PixelSpan for ColourImageSpan<'_, V> {
    fn process_pixel(&mut self, visit: &PixelVisit) {
        let mut pixel = draw_rendering(visit);
        if visit.found && self.use_colour {
            let colour = normalised_colour(&self.scene, &mut self.cache, visit.point);
            if colour.w > 0.0 {
                pixel = to_rgba(colour);
            }
        }
        self.output[visit.loc_id - self.start] = pixel;
    }
}

impl<'a, V: Voxel> RaycastConsumer for ColourImageProjector<'a, V> {
    type Span<'s> = ColourImageSpan<'s, V> where Self: 's;

    fn spans(&mut self, span_len: usize) -> Vec<Self::Span<'_>> {
        let (scene, use_colour) = (self.scene, self.use_colour);
        self.output
            .chunks_mut(span_len)
            .enumerate()
            .map(|(index, output)| ColourImageSpan {
                output,
                start: index * span_len,
                scene,
                use_colour,
                cache: BlockCache::default(),
            })
            .collect()
    }
}

/// Preview image plus a densely packed cloud of world-space surface points.
pub struct PointCloudProjector<'a, V> {
    rendering: &'a mut [[u8; 4]],
    cloud: AppendBuffer<'a, CloudPoint>,
    scene: SceneView<'a, V>,
    voxel_size: f32,
    skip_points: bool,
}

impl<'a, V: Voxel> PointCloudProjector<'a, V> {
    /// `points` is the cloud storage; it is treated as empty, so the
    /// accepted count starts at zero.
    pub fn new(
        rendering: &'a mut [[u8; 4]],
        points: &'a mut [CloudPoint],
        scene: SceneView<'a, V>,
        voxel_size: f32,
        skip_points: bool,
    ) -> Self {
        Self {
            rendering,
            cloud: AppendBuffer::new(points),
            scene,
            voxel_size,
            skip_points,
        }
    }

    /// Number of points accepted.
    pub fn into_count(self) -> usize {
        self.cloud.into_len()
    }
}

pub struct PointCloudSpan<'s, 'a, V> {
    rendering: &'s mut [[u8; 4]],
    start: usize,
    cloud: &'s AppendBuffer<'a, CloudPoint>,
    scene: SceneView<'a, V>,
    voxel_size: f32,
    skip_points: bool,
    cache: BlockCache,
}

impl<V: Voxel> PixelSpan for PointCloudSpan<'_, '_, V> {
    fn process_pixel(&mut self, visit: &PixelVisit) {
        self.rendering[visit.loc_id - self.start] = draw_rendering(visit);
        if !visit.found || (self.skip_points && (visit.x % 2 == 0 || visit.y % 2 == 0)) {
            return;
        }
        let colour = normalised_colour(&self.scene, &mut self.cache, visit.point);
        let location = (visit.point * self.voxel_size).extend(1.0);
        if self.cloud.push(CloudPoint { location, colour }).is_none() {
            tracing::trace!(loc_id = visit.loc_id, "point cloud full");
        }
    }
}

impl<'a, V: Voxel> RaycastConsumer for PointCloudProjector<'a, V> {
    type Span<'s> = PointCloudSpan<'s, 'a, V> where Self: 's;

    fn spans(&mut self, span_len: usize) -> Vec<Self::Span<'_>> {
        let cloud = &self.cloud;
        let (scene, voxel_size, skip_points) = (self.scene, self.voxel_size, self.skip_points);
        self.rendering
            .chunks_mut(span_len)
            .enumerate()
            .map(|(index, rendering)| PointCloudSpan {
                rendering,
                start: index * span_len,
                cloud,
                scene,
                voxel_size,
                skip_points,
                cache: BlockCache::default(),
            })
            .collect()
    }
}

/// Preview image plus per-pixel point and normal maps for ICP.
pub struct IcpMapProjector<'a> {
    rendering: &'a mut [[u8; 4]],
    points: &'a mut [Vec4],
    normals: &'a mut [Vec4],
    voxel_size: f32,
}

impl<'a> IcpMapProjector<'a> {
    pub fn new(
        rendering: &'a mut [[u8; 4]],
        points: &'a mut [Vec4],
        normals: &'a mut [Vec4],
        voxel_size: f32,
    ) -> Self {
        Self {
            rendering,
            points,
            normals,
            voxel_size,
        }
    }
}

pub struct IcpMapSpan<'s> {
    rendering: &'s mut [[u8; 4]],
    points: &'s mut [Vec4],
    normals: &'s mut [Vec4],
    start: usize,
    voxel_size: f32,
}

impl PixelSpan for IcpMapSpan<'_> {
    fn process_pixel(&mut self, visit: &PixelVisit) {
        let index = visit.loc_id - self.start;
        self.rendering[index] = draw_rendering(visit);
        if visit.found {
            self.points[index] = (visit.point * self.voxel_size).extend(1.0);
            self.normals[index] = visit.normal.extend(0.0);
        } else {
            let invalid = Vec4::new(0.0, 0.0, 0.0, -1.0);
            self.points[index] = invalid;
            self.normals[index] = invalid;
        }
    }
}

impl RaycastConsumer for IcpMapProjector<'_> {
    type Span<'s> = IcpMapSpan<'s> where Self: 's;

    fn spans(&mut self, span_len: usize) -> Vec<Self::Span<'_>> {
        let voxel_size = self.voxel_size;
        self.rendering
            .chunks_mut(span_len)
            .zip(self.points.chunks_mut(span_len))
            .zip(self.normals.chunks_mut(span_len))
            .enumerate()
            .map(|(index, ((rendering, points), normals))| IcpMapSpan {
                rendering,
                points,
                normals,
                start: index * span_len,
                voxel_size,
            })
            .collect()
    }
}
