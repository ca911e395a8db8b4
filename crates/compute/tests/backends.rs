// Golden-master checks: the device backend must agree with the host backend
// on everything the fusion passes depend on.

use compute::layout::{group_count, THREADS_PER_GROUP};
use compute::{
    AppendBuffer, ComputeBackend, CpuBackend, DeviceBackend, Image, MemoryDevice, Placement,
};
use glam::UVec2;
use rayon::prelude::*;

/// Doubles every pixel of `image` on the side `B` works on, one span per
/// worker, the way image passes are launched.
fn double_pixels<B: ComputeBackend>(image: &mut Image<u32>) {
    let span = B::span_len(image.width());
    image
        .data_mut(B::MEMORY)
        .par_chunks_mut(span)
        .for_each(|pixels| pixels.iter_mut().for_each(|p| *p *= 2));
}

#[test]
fn compaction_agrees_across_backends() {
    for count in [0, 1, THREADS_PER_GROUP - 1, THREADS_PER_GROUP, 10 * THREADS_PER_GROUP + 3] {
        let keep = |i: usize| i % 3 != 1;
        let host = CpuBackend::compact(count, keep);
        let device = DeviceBackend::compact(count, keep);
        assert_eq!(host, device, "count {count}");
        assert!(host.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[test]
fn image_pass_only_touches_its_side_until_synced() {
    let dims = UVec2::new(37, 5);
    let mut image = Image::new(dims, 3u32, Placement::Mirrored);
    double_pixels::<DeviceBackend>(&mut image);
    assert!(image.data(MemoryDevice::Host).iter().all(|&p| p == 3));
    assert!(image.data(MemoryDevice::Device).iter().all(|&p| p == 6));

    image.update_host_from_device();
    double_pixels::<CpuBackend>(&mut image);
    assert!(image.data(MemoryDevice::Host).iter().all(|&p| p == 12));
    assert!(image.data(MemoryDevice::Device).iter().all(|&p| p == 6));
}

#[test]
fn workgroup_grid_covers_every_item() {
    let count = 3 * THREADS_PER_GROUP + 17;
    let mut slots = vec![0usize; count];
    let written = {
        let buffer = AppendBuffer::new(&mut slots);
        (0..group_count(count, THREADS_PER_GROUP))
            .into_par_iter()
            .for_each(|group| {
                let start = group * THREADS_PER_GROUP;
                for item in start..(start + THREADS_PER_GROUP).min(count) {
                    buffer.push(item);
                }
            });
        buffer.into_len()
    };
    assert_eq!(written, count);
    slots.sort_unstable();
    assert!(slots.iter().enumerate().all(|(i, &item)| i == item));
}
