// SPDX-License-Identifier: GPL-3.0-only

//! Composable 3D affine transform stack
//!
//! Matrices are 4×4, column-major `[f32; 16]`, the layout GPU APIs expect.
//! A [`Matrix3D`] keeps the primitive transforms it was built from instead
//! of collapsing them into a single product, so [`Matrix3D::invert`] can
//! invert each primitive in closed form and reverse the order.

/// 4×4 column-major matrix
pub type Mat4 = [f32; 16];

/// The identity matrix
pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// A single invertible transform
#[derive(Debug, Clone, Copy, PartialEq)]
enum Primitive {
    /// Rotation by `degrees` about `axis` (right-hand rule)
    Rotate { degrees: f32, axis: [f32; 3] },
    /// Per-axis scale
    Scale([f32; 3]),
    /// Translation
    Translate([f32; 3]),
}

impl Primitive {
    /// Matrix form of this primitive
    fn matrix(&self) -> Mat4 {
        match *self {
            Primitive::Rotate { degrees, axis } => rotation_matrix(degrees, axis),
            Primitive::Scale([sx, sy, sz]) => {
                let mut m = IDENTITY;
                m[0] = sx;
                m[5] = sy;
                m[10] = sz;
                m
            }
            Primitive::Translate([tx, ty, tz]) => {
                let mut m = IDENTITY;
                m[12] = tx;
                m[13] = ty;
                m[14] = tz;
                m
            }
        }
    }

    /// The primitive that undoes this one
    ///
    /// A zero scale factor yields an infinite inverse; callers reject
    /// degenerate rectangles before building transforms.
    fn inverse(&self) -> Primitive {
        match *self {
            Primitive::Rotate { degrees, axis } => Primitive::Rotate {
                degrees: -degrees,
                axis,
            },
            Primitive::Scale([sx, sy, sz]) => Primitive::Scale([1.0 / sx, 1.0 / sy, 1.0 / sz]),
            Primitive::Translate([tx, ty, tz]) => Primitive::Translate([-tx, -ty, -tz]),
        }
    }
}

/// Ordered stack of primitive transforms, applied first to last
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix3D {
    stack: Vec<(Primitive, Mat4)>,
}

impl Matrix3D {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the stack back to identity
    pub fn reset(&mut self) {
        self.stack.clear();
    }

    pub fn is_identity(&self) -> bool {
        self.stack.is_empty()
    }

    fn push(&mut self, primitive: Primitive) {
        let matrix = primitive.matrix();
        self.stack.push((primitive, matrix));
    }

    pub fn post_rotate(&mut self, degrees: f32, x: f32, y: f32, z: f32) {
        self.push(Primitive::Rotate {
            degrees,
            axis: [x, y, z],
        });
    }

    pub fn post_scale(&mut self, sx: f32, sy: f32, sz: f32) {
        self.push(Primitive::Scale([sx, sy, sz]));
    }

    pub fn post_translate(&mut self, tx: f32, ty: f32, tz: f32) {
        self.push(Primitive::Translate([tx, ty, tz]));
    }

    /// Apply the full stack to one homogeneous point
    pub fn map_vec4(&self, point: [f32; 4]) -> [f32; 4] {
        self.stack
            .iter()
            .fold(point, |p, (_, m)| multiply_mv(m, p))
    }

    /// Apply the stack to 3D points (w = 1 implied, no perspective divide)
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than `points`.
    pub fn map_points(&self, points: &[[f32; 3]], out: &mut [[f32; 3]]) {
        for (src, dst) in points.iter().zip(out[..points.len()].iter_mut()) {
            let [x, y, z, _] = self.map_vec4([src[0], src[1], src[2], 1.0]);
            *dst = [x, y, z];
        }
    }

    /// Apply the stack to homogeneous points
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than `points`.
    pub fn map_vec4_points(&self, points: &[[f32; 4]], out: &mut [[f32; 4]]) {
        for (src, dst) in points.iter().zip(out[..points.len()].iter_mut()) {
            *dst = self.map_vec4(*src);
        }
    }

    /// Build the stack that undoes this one
    pub fn invert(&self) -> Matrix3D {
        let mut inverse = Matrix3D::new();
        for (primitive, _) in self.stack.iter().rev() {
            inverse.push(primitive.inverse());
        }
        inverse
    }

    /// The composed matrix (last primitive on the left)
    pub fn concat(&self) -> Mat4 {
        self.stack
            .iter()
            .fold(IDENTITY, |acc, (_, m)| multiply_mm(m, &acc))
    }
}

/// `lhs * rhs`
pub fn multiply_mm(lhs: &Mat4, rhs: &Mat4) -> Mat4 {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| lhs[k * 4 + row] * rhs[col * 4 + k]).sum();
        }
    }
    out
}

/// `m * v`
pub fn multiply_mv(m: &Mat4, v: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (row, value) in out.iter_mut().enumerate() {
        *value = (0..4).map(|k| m[k * 4 + row] * v[k]).sum();
    }
    out
}

/// Post-multiply `m` by a scale, in place
pub fn scale_in_place(m: &mut Mat4, sx: f32, sy: f32, sz: f32) {
    for i in 0..4 {
        m[i] *= sx;
        m[4 + i] *= sy;
        m[8 + i] *= sz;
    }
}

/// Post-multiply `m` by a translation, in place
pub fn translate_in_place(m: &mut Mat4, tx: f32, ty: f32, tz: f32) {
    for i in 0..4 {
        m[12 + i] += m[i] * tx + m[4 + i] * ty + m[8 + i] * tz;
    }
}

/// Orthographic projection onto the given clip volume
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let r_width = 1.0 / (right - left);
    let r_height = 1.0 / (top - bottom);
    let r_depth = 1.0 / (far - near);
    let mut m = [0.0; 16];
    m[0] = 2.0 * r_width;
    m[5] = 2.0 * r_height;
    m[10] = -2.0 * r_depth;
    m[12] = -(right + left) * r_width;
    m[13] = -(top + bottom) * r_height;
    m[14] = -(far + near) * r_depth;
    m[15] = 1.0;
    m
}

/// Sine and cosine of an angle in degrees, exact at multiples of 90°
fn sin_cos_degrees(degrees: f32) -> (f32, f32) {
    let normalized = degrees.rem_euclid(360.0);
    if normalized.fract() == 0.0 && (normalized as i32) % 90 == 0 {
        match normalized as i32 {
            0 => (0.0, 1.0),
            90 => (1.0, 0.0),
            180 => (0.0, -1.0),
            _ => (-1.0, 0.0),
        }
    } else {
        degrees.to_radians().sin_cos()
    }
}

fn rotation_matrix(degrees: f32, axis: [f32; 3]) -> Mat4 {
    let (s, c) = sin_cos_degrees(degrees);
    let len = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
    let (x, y, z) = if len != 0.0 && len != 1.0 {
        (axis[0] / len, axis[1] / len, axis[2] / len)
    } else {
        (axis[0], axis[1], axis[2])
    };
    let nc = 1.0 - c;
    let (xy, yz, zx) = (x * y, y * z, z * x);
    let (xs, ys, zs) = (x * s, y * s, z * s);

    let mut m = IDENTITY;
    m[0] = x * x * nc + c;
    m[4] = xy * nc - zs;
    m[8] = zx * nc + ys;
    m[1] = xy * nc + zs;
    m[5] = y * y * nc + c;
    m[9] = yz * nc - xs;
    m[2] = zx * nc - ys;
    m[6] = yz * nc + xs;
    m[10] = z * z * nc + c;
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn assert_vec_eq(a: [f32; 4], b: [f32; 4]) {
        for i in 0..4 {
            assert!((a[i] - b[i]).abs() < EPS, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_empty_stack_is_identity() {
        let m = Matrix3D::new();
        assert!(m.is_identity());
        assert_vec_eq(m.map_vec4([3.0, -2.0, 1.0, 1.0]), [3.0, -2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_rotate_about_negative_z_is_clockwise() {
        let mut m = Matrix3D::new();
        m.post_rotate(90.0, 0.0, 0.0, -1.0);
        // (1, 0) turns to (0, -1) in a y-up frame
        assert_vec_eq(m.map_vec4([1.0, 0.0, 0.0, 1.0]), [0.0, -1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_stack_applies_in_post_order() {
        let mut m = Matrix3D::new();
        m.post_scale(2.0, 3.0, 1.0);
        m.post_translate(10.0, 20.0, 0.0);
        assert_vec_eq(m.map_vec4([1.0, 1.0, 0.0, 1.0]), [12.0, 23.0, 0.0, 1.0]);
    }

    #[test]
    fn test_invert_round_trips() {
        let mut m = Matrix3D::new();
        m.post_rotate(37.0, 0.0, 0.0, -1.0);
        m.post_scale(-2.5, 0.75, 1.0);
        m.post_translate(-40.0, 12.0, 3.0);
        let inverse = m.invert();
        let p = [13.0, -7.0, 2.0, 1.0];
        assert_vec_eq(inverse.map_vec4(m.map_vec4(p)), p);
        assert_vec_eq(m.map_vec4(inverse.map_vec4(p)), p);
    }

    #[test]
    fn test_concat_matches_stack() {
        let mut m = Matrix3D::new();
        m.post_rotate(90.0, 0.0, 0.0, 1.0);
        m.post_scale(2.0, 2.0, 1.0);
        m.post_translate(5.0, 0.0, 0.0);
        let p = [1.0, 2.0, 0.0, 1.0];
        assert_vec_eq(multiply_mv(&m.concat(), p), m.map_vec4(p));
    }

    #[test]
    fn test_map_points_uses_unit_w() {
        let mut m = Matrix3D::new();
        m.post_translate(1.0, 2.0, 3.0);
        let mut out = [[0.0; 3]; 2];
        m.map_points(&[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]], &mut out);
        assert_eq!(out, [[1.0, 2.0, 3.0], [2.0, 3.0, 4.0]]);
    }

    #[test]
    fn test_ortho_maps_corners_to_clip_space() {
        let m = ortho(0.0, 100.0, 0.0, 50.0, 0.5, 2.5);
        assert_vec_eq(multiply_mv(&m, [0.0, 0.0, -0.5, 1.0]), [-1.0, -1.0, -1.0, 1.0]);
        assert_vec_eq(multiply_mv(&m, [100.0, 50.0, -2.5, 1.0]), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_in_place_helpers_post_multiply() {
        let mut m = IDENTITY;
        scale_in_place(&mut m, 1.0, -1.0, 1.0);
        translate_in_place(&mut m, 0.0, -1.0, 0.0);
        // flips texture v: (u, v) -> (u, 1 - v)
        assert_vec_eq(multiply_mv(&m, [0.25, 0.0, 0.0, 1.0]), [0.25, 1.0, 0.0, 1.0]);
        assert_vec_eq(multiply_mv(&m, [0.25, 1.0, 0.0, 1.0]), [0.25, 0.0, 0.0, 1.0]);
    }
}
