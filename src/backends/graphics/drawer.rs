// SPDX-License-Identifier: GPL-3.0-only

//! Textured quad placement
//!
//! A [`Drawer2D`] turns a [`ContentMatrix`] into the four vertex positions
//! of a quad in viewport space plus an orthographic projection. The `z`
//! value (0 = near plane, 1 = far plane) only places the quad inside the
//! projection volume; quads are composed in draw order.

use crate::backends::camera::PreviewTarget;
use crate::constants::layers::{FAR, NEAR};
use crate::geometry::ContentMatrix;
use crate::geometry::matrix3d::{IDENTITY, Mat4, ortho, scale_in_place, translate_in_place};

/// Texture coordinates of the quad corners, in vertex order
pub const TEXTURE_COORDS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

/// Texture sampled by a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// Camera preview streamed into an external texture
    ExternalOes(PreviewTarget),
    /// Regular 2D texture (mask overlay)
    Texture2d(u64),
}

/// Everything a backend needs to draw one quad
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub texture: TextureKind,
    /// Vertex positions: content (left,bottom), (right,bottom), (left,top), (right,top)
    pub positions: [[f32; 3]; 4],
    pub texture_coords: [[f32; 2]; 4],
    pub texture_matrix: Mat4,
    pub projection: Mat4,
}

/// Quad placement for one content matrix
#[derive(Debug, Clone)]
pub struct Drawer2D {
    positions: [[f32; 3]; 4],
    projection: Mat4,
}

impl Drawer2D {
    pub fn new(matrix: &ContentMatrix, z: f32) -> Self {
        let content = matrix.content_rect();
        let viewport = matrix.viewport_rect();
        let safe_z = -NEAR - (FAR - NEAR) * z;
        let points = [
            [content.left, content.bottom, safe_z],
            [content.right, content.bottom, safe_z],
            [content.left, content.top, safe_z],
            [content.right, content.top, safe_z],
        ];
        let mut positions = [[0.0; 3]; 4];
        matrix.map_vec3_points(&points, &mut positions);

        Self {
            positions,
            projection: ortho(
                viewport.left,
                viewport.right,
                viewport.top,
                viewport.bottom,
                NEAR,
                FAR,
            ),
        }
    }

    pub fn positions(&self) -> &[[f32; 3]; 4] {
        &self.positions
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Draw command for the camera texture
    ///
    /// The surface transform is followed by a vertical flip since camera
    /// images arrive top row first.
    pub fn camera_command(&self, target: PreviewTarget, surface_transform: Mat4) -> DrawCommand {
        let mut texture_matrix = surface_transform;
        scale_in_place(&mut texture_matrix, 1.0, -1.0, 1.0);
        translate_in_place(&mut texture_matrix, 0.0, -1.0, 0.0);
        self.command(TextureKind::ExternalOes(target), texture_matrix)
    }

    /// Draw command for a plain 2D texture
    pub fn texture_command(&self, texture_id: u64) -> DrawCommand {
        self.command(TextureKind::Texture2d(texture_id), IDENTITY)
    }

    fn command(&self, texture: TextureKind, texture_matrix: Mat4) -> DrawCommand {
        DrawCommand {
            texture,
            positions: self.positions,
            texture_coords: TEXTURE_COORDS,
            texture_matrix,
            projection: self.projection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::layers::{CAMERA_Z, MASK_Z};
    use crate::geometry::RectF;
    use crate::geometry::matrix3d::multiply_mv;

    #[test]
    fn test_z_maps_into_projection_volume() {
        let rect = RectF::from_size(100.0, 200.0);
        let matrix = ContentMatrix::new(rect, rect);
        let camera = Drawer2D::new(&matrix, CAMERA_Z);
        let mask = Drawer2D::new(&matrix, MASK_Z);
        assert!((camera.positions()[0][2] + 1.5).abs() < 1e-5);
        assert!((mask.positions()[0][2] + 2.3).abs() < 1e-5);
    }

    #[test]
    fn test_projection_maps_viewport_to_clip_space() {
        let rect = RectF::from_size(100.0, 200.0);
        let drawer = Drawer2D::new(&ContentMatrix::new(rect, rect), 0.0);
        let corner = multiply_mv(drawer.projection(), [100.0, 200.0, -0.5, 1.0]);
        assert!((corner[0] - 1.0).abs() < 1e-5);
        assert!((corner[1] - 1.0).abs() < 1e-5);
        let origin = multiply_mv(drawer.projection(), [0.0, 0.0, -0.5, 1.0]);
        assert!((origin[0] + 1.0).abs() < 1e-5);
        assert!((origin[1] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_camera_texture_matrix_flips_vertically() {
        let rect = RectF::from_size(10.0, 10.0);
        let drawer = Drawer2D::new(&ContentMatrix::new(rect, rect), 0.5);
        let command = drawer.camera_command(PreviewTarget(1), IDENTITY);
        let top = multiply_mv(&command.texture_matrix, [0.0, 0.0, 0.0, 1.0]);
        assert!((top[1] - 1.0).abs() < 1e-5);
        let bottom = multiply_mv(&command.texture_matrix, [0.0, 1.0, 0.0, 1.0]);
        assert!(bottom[1].abs() < 1e-5);
        assert_eq!(drawer.texture_command(7).texture_matrix, IDENTITY);
    }
}
