//! Container builders shaped like the bucket's timestep files.

use bytes::Bytes;
use grid_container::{Compression, ContainerWriter};
use stream_common::Param;

use crate::generators::{ramp, timestep_field};

/// Points per chunk used by the builders unless told otherwise.
pub const DEFAULT_CHUNK_POINTS: u64 = 512;

/// Four children where the first is a `[1, n]` ramp `0..n`.
pub fn four_child_container(n: u64) -> Bytes {
    ContainerWriter::new()
        .array("ramp", vec![1, n], vec![1, DEFAULT_CHUNK_POINTS], Compression::Deflate, ramp(n, 1.0))
        .and_then(|w| w.array("zeros", vec![1, 64], vec![1, 64], Compression::None, vec![0.0; 64]))
        .and_then(|w| w.array("grid", vec![4, 8], vec![2, 4], Compression::Deflate, vec![3.5; 32]))
        .and_then(|w| w.array("scalar_like", vec![1], vec![1], Compression::None, vec![-1.0]))
        .and_then(|w| w.finish())
        .expect("Failed to build four-child container")
}

/// A timestep container holding one `[1, points]` variable per slab of
/// `param`, plus an unrelated variable the loader must skip.
///
/// `fields` is in slab order and each field must hold `points` values.
pub fn param_container(param: Param, points: u64, chunk_points: u64, fields: &[Vec<f32>]) -> Bytes {
    assert_eq!(
        fields.len(),
        param.variables().len(),
        "{} needs one field per slab",
        param
    );

    let mut writer = ContainerWriter::new()
        .array("land_mask", vec![1, 16], vec![1, 16], Compression::None, vec![1.0; 16])
        .expect("Failed to add land_mask");
    for (name, field) in param.variables().iter().zip(fields) {
        writer = writer
            .array(*name, vec![1, points], vec![1, chunk_points], Compression::Deflate, field.clone())
            .expect("Failed to add variable");
    }
    writer.finish().expect("Failed to finish container")
}

/// Deterministic fields for timestep `index`: slab `s` is offset by `s * 0.5`.
pub fn timestep_fields(param: Param, points: u64, index: u32) -> Vec<Vec<f32>> {
    (0..param.slabs_count())
        .map(|slab| {
            timestep_field(points, index)
                .into_iter()
                .map(|v| v + slab as f32 * 0.5)
                .collect()
        })
        .collect()
}
