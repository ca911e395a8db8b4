use compute::{Image, Placement};
use criterion::{criterion_group, criterion_main, Criterion};
use glam::UVec2;
use recon::{
    DeviceType, FusionSettings, ImageKind, Intrinsics, MainEngine, Pose, RgbdCalib, SceneParams,
};

const DIMS: UVec2 = UVec2::new(160, 120);

fn plane_engine(device: DeviceType) -> MainEngine {
    let intrinsics = Intrinsics::new(150.0, 150.0, 80.0, 60.0);
    let calib = RgbdCalib {
        intrinsics_rgb: intrinsics,
        intrinsics_d: intrinsics,
        ..RgbdCalib::default()
    };
    let settings = FusionSettings {
        device,
        scene: SceneParams {
            voxel_size: 0.01,
            mu: 0.04,
            bucket_count: 0x4000,
            excess_count: 0x1000,
            max_blocks: 0x1000,
            ..SceneParams::default()
        },
        ..FusionSettings::default()
    };
    let mut engine = MainEngine::new(settings, calib, DIMS, None).unwrap();
    let depth = vec![0.8; (DIMS.x * DIMS.y) as usize];
    engine.view_mut().set_float_depth(&depth).unwrap();
    engine.process_frame();
    engine
}

fn bench_frame(c: &mut Criterion) {
    for device in [DeviceType::Cpu, DeviceType::Device] {
        let mut engine = plane_engine(device);
        c.bench_function(&format!("process_frame_{device:?}"), |b| {
            b.iter(|| engine.process_frame())
        });
    }
}

fn bench_free_camera(c: &mut Criterion) {
    let intrinsics = Intrinsics::new(150.0, 150.0, 80.0, 60.0);
    let pose = Pose::identity();
    for device in [DeviceType::Cpu, DeviceType::Device] {
        let mut engine = plane_engine(device);
        let mut out = Image::new(DIMS, [0u8; 4], Placement::Host);
        c.bench_function(&format!("free_camera_{device:?}"), |b| {
            b.iter(|| {
                engine.get_image(
                    &mut out,
                    ImageKind::FreeCameraRaycast,
                    true,
                    Some(&pose),
                    Some(&intrinsics),
                );
            })
        });
    }
}

criterion_group!(benches, bench_frame, bench_free_camera);
criterion_main!(benches);
