//! # Synthetic Sensor
//!
//! An analytic RGB-D camera: a sphere resting in front of a checkered wall
//! above a checkered floor, ray traced exactly per pixel. Camera axes follow
//! the engine's convention, `+z` forward and `+y` down.

use glam::{UVec2, Vec3};
use recon::{Intrinsics, Pose, RgbdCalib, Tracker, TrackingState, View};

const SPHERE_COLOUR: [u8; 3] = [200, 60, 40];
const CHECK_LIGHT: [u8; 3] = [220, 220, 210];
const CHECK_DARK: [u8; 3] = [70, 90, 120];
/// Checker squares per metre.
const CHECKS_PER_METRE: f32 = 5.0;
/// Sideways extent of the camera sweep either side of the origin, metres.
const SWEEP_HALF_WIDTH: f32 = 0.15;

/// One rendered frame, row-major.
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    /// Depth in metres, `-1` where the ray escapes.
    pub depth: Vec<f32>,
    pub rgb: Vec<[u8; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticScene {
    pub sphere_centre: Vec3,
    pub sphere_radius: f32,
    /// The wall is the plane `z = wall_z`.
    pub wall_z: f32,
    /// The floor is the plane `y = floor_y`.
    pub floor_y: f32,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            sphere_centre: Vec3::new(0.0, 0.1, 1.2),
            sphere_radius: 0.25,
            wall_z: 2.0,
            floor_y: 0.35,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn checker(u: f32, v: f32) -> [u8; 3] {
    let cell = (u * CHECKS_PER_METRE).floor() as i32 + (v * CHECKS_PER_METRE).floor() as i32;
    if cell.rem_euclid(2) == 0 {
        CHECK_LIGHT
    } else {
        CHECK_DARK
    }
}

fn keep_nearest(best: &mut Option<(f32, [u8; 3])>, t: f32, colour: [u8; 3]) {
    if t <= 0.0 || !t.is_finite() {
        return;
    }
    match best {
        Some((nearest, _)) if *nearest <= t => {}
        _ => *best = Some((t, colour)),
    }
}

impl SyntheticScene {
    /// First surface hit by the ray `origin + t * direction`, as the ray
    /// parameter `t` and the surface colour. `direction` need not be unit.
    #[must_use]
    pub fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<(f32, [u8; 3])> {
        let mut best = None;

        let oc = origin - self.sphere_centre;
        let a = direction.length_squared();
        let half_b = oc.dot(direction);
        let c = oc.length_squared() - self.sphere_radius * self.sphere_radius;
        let discriminant = half_b * half_b - a * c;
        if discriminant >= 0.0 && a > 0.0 {
            keep_nearest(&mut best, (-half_b - discriminant.sqrt()) / a, SPHERE_COLOUR);
        }

        if direction.z.abs() > f32::EPSILON {
            let t = (self.wall_z - origin.z) / direction.z;
            let hit = origin + t * direction;
            keep_nearest(&mut best, t, checker(hit.x, hit.y));
        }
        if direction.y.abs() > f32::EPSILON {
            let t = (self.floor_y - origin.y) / direction.y;
            let hit = origin + t * direction;
            keep_nearest(&mut best, t, checker(hit.x, hit.z));
        }
        best
    }

    /// Hit behind pixel `(x, y)`. With the camera-space ray scaled to unit
    /// `z`, the returned parameter is the camera depth.
    #[allow(clippy::cast_precision_loss)]
    fn cast(&self, pose: &Pose, intrinsics: &Intrinsics, x: u32, y: u32) -> Option<(f32, [u8; 3])> {
        let inv_m = pose.inv_m();
        let ray = Vec3::new(
            (x as f32 - intrinsics.cx) / intrinsics.fx,
            (y as f32 - intrinsics.cy) / intrinsics.fy,
            1.0,
        );
        self.intersect(inv_m.transform_point3(Vec3::ZERO), inv_m.transform_vector3(ray))
    }

    /// Renders the depth camera at `pose` and the colour camera rigidly
    /// attached to it. Depth is perturbed by uniform relative noise of
    /// amplitude `noise`.
    #[must_use]
    pub fn render(
        &self,
        pose: &Pose,
        calib: &RgbdCalib,
        dims: UVec2,
        noise: f32,
        rng: &mut fastrand::Rng,
    ) -> SyntheticFrame {
        let pose_rgb = calib.colour_pose(pose);
        let mut depth = Vec::with_capacity(dims.x as usize * dims.y as usize);
        let mut rgb = Vec::with_capacity(depth.capacity());
        for y in 0..dims.y {
            for x in 0..dims.x {
                depth.push(match self.cast(pose, &calib.intrinsics_d, x, y) {
                    Some((z, _)) => z * (1.0 + noise * (rng.f32() * 2.0 - 1.0)),
                    None => -1.0,
                });
                rgb.push(match self.cast(&pose_rgb, &calib.intrinsics_rgb, x, y) {
                    Some((_, [r, g, b])) => [r, g, b, 255],
                    None => [0, 0, 0, 255],
                });
            }
        }
        SyntheticFrame { depth, rgb }
    }
}

/// `frames` poses sliding the camera sideways across the scene while
/// turning to keep the sphere in view.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sweep(scene: &SyntheticScene, frames: usize) -> Vec<Pose> {
    (0..frames)
        .map(|i| {
            let phase = if frames > 1 {
                i as f32 / (frames - 1) as f32
            } else {
                0.5
            };
            let position = Vec3::new(SWEEP_HALF_WIDTH * (2.0 * phase - 1.0), 0.0, 0.0);
            let to_target = scene.sphere_centre - position;
            let yaw = to_target.x.atan2(to_target.z);
            Pose::looking_from(position, Vec3::new(0.0, yaw, 0.0))
        })
        .collect()
}

/// Replays a known camera path in place of a real tracker. The first pose
/// belongs to the first frame, which is never tracked, so replay starts at
/// the second.
#[derive(Debug, Clone)]
pub struct ScriptedPoseTracker {
    poses: Vec<Pose>,
    next: usize,
}

impl ScriptedPoseTracker {
    #[must_use]
    pub fn new(poses: Vec<Pose>) -> Self {
        Self { poses, next: 1 }
    }
}

impl Tracker for ScriptedPoseTracker {
    fn track_camera(&mut self, tracking_state: &mut TrackingState, _view: &View) {
        if let Some(pose) = self.poses.get(self.next) {
            tracking_state.pose_d = *pose;
        } else {
            tracing::warn!(frame = self.next, "camera path exhausted; keeping last pose");
        }
        self.next += 1;
    }
}
