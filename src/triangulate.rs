//! Triangulation of simple, flat polygons by ear clipping.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector2, Vector3};
use smallvec::SmallVec;

use crate::error::Error;


/// Angle assigned to vertices that can't be clipped (reflex or degenerate).
const INVALID_ANGLE: f32 = 10000.0;

type Ring = SmallVec<[u32; 16]>;

/// Triangulates the polygon with the given vertex `indices` and writes the
/// resulting triangles (three indices each) to `dest`. Returns the number of
/// triangles written.
///
/// `positions` holds `x, y, z` for each vertex, `num_verts` is the number of
/// valid vertices. Polygons with fewer than three vertices produce no
/// triangles. Triangles are copied through unchanged and quads are split
/// along the diagonal between their second and fourth vertex.
/// Larger polygons are projected onto their plane and triangulated by
/// repeatedly clipping the vertex with the sharpest convex angle. A polygon
/// with `n` vertices always results in `n - 2` triangles.
///
/// For polygons with four or more vertices, every index is checked and
/// `Error::InvalidIndex` is returned if one does not refer to a valid vertex.
/// `Error::OutputTooSmall` is returned if `dest` can't hold all triangles.
pub fn triangulate_polygon(
    indices: &[u32],
    positions: &[f32],
    num_verts: u32,
    dest: &mut [u32],
) -> Result<usize, Error> {
    let n = indices.len();
    if n < 3 {
        return Ok(0);
    }

    let needed = (n - 2) * 3;
    if dest.len() < needed {
        return Err(Error::OutputTooSmall { needed, actual: dest.len() });
    }

    if n == 3 {
        dest[..3].copy_from_slice(indices);
        return Ok(1);
    }

    let num_verts = num_verts.min((positions.len() / 3) as u32);
    if let Some(&index) = indices.iter().find(|&&i| i >= num_verts) {
        return Err(Error::InvalidIndex { index, num_verts });
    }

    if n == 4 {
        dest[..6].copy_from_slice(&[
            indices[0], indices[1], indices[3],
            indices[2], indices[3], indices[1],
        ]);
        return Ok(2);
    }

    let pos = |i: u32| {
        let i = i as usize * 3;
        Vector3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    // Orthonormal basis of the polygon's plane.
    let origin = pos(indices[0]);
    let u = (pos(indices[1]) - origin).normalize();
    let normal = u.cross((pos(indices[n - 1]) - origin).normalize()).normalize();
    let v = normal.cross(u).normalize();

    let points: SmallVec<[Vector2<f32>; 16]> = indices.iter()
        .map(|&i| {
            let p = pos(i) - origin;
            Vector2::new(p.dot(u), p.dot(v))
        })
        .collect();

    // Doubly linked ring of the remaining vertices.
    let mut next: Ring = (0..n as u32).map(|i| (i + 1) % n as u32).collect();
    let mut prev: Ring = (0..n as u32).map(|i| (i + n as u32 - 1) % n as u32).collect();
    let mut first = 0;

    let mut out = 0;
    let mut remaining = n;
    while remaining > 3 {
        let mut best = first;
        let mut best_angle = angle_at(first, &points, &prev, &next);
        let mut i = next[first as usize];
        while i != first {
            let angle = angle_at(i, &points, &prev, &next);
            if angle < best_angle {
                best = i;
                best_angle = angle;
            }
            i = next[i as usize];
        }

        let n_i = next[best as usize];
        let p_i = prev[best as usize];
        dest[out..out + 3].copy_from_slice(&[
            indices[best as usize],
            indices[n_i as usize],
            indices[p_i as usize],
        ]);
        out += 3;

        if best == first {
            first = n_i;
        }
        next[p_i as usize] = n_i;
        prev[n_i as usize] = p_i;
        remaining -= 1;
    }

    dest[out..out + 3].copy_from_slice(&[
        indices[first as usize],
        indices[next[first as usize] as usize],
        indices[prev[first as usize] as usize],
    ]);

    Ok(n - 2)
}

/// The interior angle at vertex `idx`, or `INVALID_ANGLE` if it is not in
/// `(0, pi)`.
fn angle_at(idx: u32, points: &[Vector2<f32>], prev: &Ring, next: &Ring) -> f32 {
    let p = points[idx as usize];
    let x_axis = (points[next[idx as usize] as usize] - p).normalize();
    let y_axis = Vector2::new(-x_axis.y, x_axis.x);
    let to_prev = points[prev[idx as usize] as usize] - p;

    let angle = to_prev.dot(y_axis).atan2(to_prev.dot(x_axis));
    if angle > 0.0 && angle < PI {
        angle
    } else {
        INVALID_ANGLE
    }
}
