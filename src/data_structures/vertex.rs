//! Vertex math for turning indexed shape descriptions into GPU-ready streams.
//!
//! Shapes are described compactly (8 cube corners and 36 indices, or a
//! parametric tessellation) and expanded here into flat, non-indexed
//! triangle-list arrays. Every triangle gets its own copy of each vertex, so
//! face normals can be flat per triangle.

use cgmath::{InnerSpace, Vector3};

/// Gathers `vertices[indices[i]]` for every index, in index order, into one flat array.
///
/// Works for any component count: positions (`N = 3`) and texture
/// coordinates (`N = 2`) are expanded the same way.
///
/// # Panics
///
/// Panics if an index is out of range for `vertices`.
pub fn expand_indexed<const N: usize>(vertices: &[[f32; N]], indices: &[u32]) -> Vec<f32> {
    let mut elements = Vec::with_capacity(indices.len() * N);
    for &index in indices {
        elements.extend_from_slice(&vertices[index as usize]);
    }
    elements
}

/// Flat per-triangle normals for the expanded stream of `indices`.
///
/// For each triangle `(v0, v1, v2)` the normal is `(v1 - v0) × (v2 - v0)`
/// normalised and repeated for all three of its vertices, so the result has
/// the same length as `expand_indexed(vertices, indices)`. A degenerate
/// triangle normalises a zero vector and yields NaN components.
///
/// # Panics
///
/// Panics if an index is out of range for `vertices`.
pub fn face_normals(vertices: &[[f32; 3]], indices: &[u32]) -> Vec<f32> {
    let mut normals = Vec::with_capacity(indices.len() * 3);
    for triangle in indices.chunks_exact(3) {
        let v0: Vector3<f32> = vertices[triangle[0] as usize].into();
        let v1: Vector3<f32> = vertices[triangle[1] as usize].into();
        let v2: Vector3<f32> = vertices[triangle[2] as usize].into();

        let normal: [f32; 3] = (v1 - v0).cross(v2 - v0).normalize().into();
        for _ in 0..3 {
            normals.extend_from_slice(&normal);
        }
    }
    normals
}

/// Reinterprets a flat array as `[f32; N]` records. A trailing partial record is dropped.
pub(crate) fn chunked<const N: usize>(flat: &[f32]) -> Vec<[f32; N]> {
    flat.chunks_exact(N)
        .map(|chunk| {
            let mut record = [0.0; N];
            record.copy_from_slice(chunk);
            record
        })
        .collect()
}
