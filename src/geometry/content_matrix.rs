// SPDX-License-Identifier: GPL-3.0-only

//! Content-to-viewport mapping under a scale-fit policy
//!
//! Unless stated otherwise, coordinates here use a bottom-left origin, the
//! convention of the GPU-style transform math. [`ContentMatrix::viewport_to_content_2d`]
//! is the one entry point that takes top-left-origin input.

use super::matrix3d::Matrix3D;
use super::rect::RectF;
use serde::{Deserialize, Serialize};

/// How content is fitted into the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScaleType {
    /// Uniform scale so the whole content fits inside the viewport (may letterbox)
    CenterInside,
    /// Uniform scale so the content covers the whole viewport (may crop)
    #[default]
    CenterCrop,
    /// Independent x/y scale so the content exactly fills the viewport
    FitXY,
}

impl ScaleType {
    pub const ALL: [ScaleType; 3] = [
        ScaleType::CenterInside,
        ScaleType::CenterCrop,
        ScaleType::FitXY,
    ];
}

/// Binds a content rectangle to a viewport rectangle
///
/// The forward transform maps content space to viewport space; the inverse
/// is rebuilt by every [`update`](Self::update) so the pair never drifts.
#[derive(Debug, Clone)]
pub struct ContentMatrix {
    content_rect: RectF,
    viewport_rect: RectF,
    matrix: Matrix3D,
    inverse: Matrix3D,
    scale_type: ScaleType,
    degrees: i32,
    flip_x: bool,
}

impl ContentMatrix {
    /// Create a matrix initialised with `CenterCrop`, no rotation, no mirroring
    ///
    /// Both rectangles must have a non-zero area.
    pub fn new(content_rect: RectF, viewport_rect: RectF) -> Self {
        let mut matrix = Self {
            content_rect,
            viewport_rect,
            matrix: Matrix3D::new(),
            inverse: Matrix3D::new(),
            scale_type: ScaleType::CenterCrop,
            degrees: 0,
            flip_x: false,
        };
        matrix.update(ScaleType::CenterCrop, 0, false);
        matrix
    }

    /// Rebuild the forward and inverse transforms
    pub fn update(&mut self, scale_type: ScaleType, degrees: i32, flip_x: bool) {
        let content_corners = self.content_rect.corners();
        let mut mapped = [[0.0; 4]; 4];

        self.matrix.reset();
        self.matrix.post_rotate(degrees as f32, 0.0, 0.0, -1.0);

        self.matrix.map_vec4_points(&content_corners, &mut mapped);
        let rotated = RectF::bounds_of(&mapped);
        let content_width = rotated.width();
        let content_height = rotated.height();
        let viewport_width = self.viewport_rect.width().abs();
        let viewport_height = self.viewport_rect.height().abs();

        let scale_x = viewport_width / content_width;
        let scale_y = viewport_height / content_height;
        let content_aspect = content_width / content_height;
        let viewport_aspect = viewport_width / viewport_height;

        let (mut final_x, final_y) = match scale_type {
            ScaleType::CenterInside if content_aspect > viewport_aspect => (scale_x, scale_x),
            ScaleType::CenterInside => (scale_y, scale_y),
            ScaleType::CenterCrop if content_aspect > viewport_aspect => (scale_y, scale_y),
            ScaleType::CenterCrop => (scale_x, scale_x),
            ScaleType::FitXY => (scale_x, scale_y),
        };
        if flip_x {
            final_x = -final_x;
        }
        self.matrix.post_scale(final_x, final_y, 1.0);

        self.matrix.map_vec4_points(&content_corners, &mut mapped);
        let scaled = RectF::bounds_of(&mapped);
        let offset_x = self.viewport_rect.center_x() - scaled.center_x();
        let offset_y = self.viewport_rect.center_y() - scaled.center_y();
        self.matrix.post_translate(offset_x, offset_y, 0.0);

        self.inverse = self.matrix.invert();
        self.scale_type = scale_type;
        self.degrees = degrees;
        self.flip_x = flip_x;
    }

    /// Map 3D points from content space to viewport space
    pub fn map_vec3_points(&self, points: &[[f32; 3]], out: &mut [[f32; 3]]) {
        self.matrix.map_points(points, out);
    }

    /// Map a content-space rectangle to its viewport-space bounds
    pub fn content_to_viewport(&self, rect: &RectF) -> RectF {
        let mut mapped = [[0.0; 4]; 4];
        self.matrix.map_vec4_points(&rect.corners(), &mut mapped);
        RectF::bounds_of(&mapped)
    }

    /// Map a viewport-space rectangle to its content-space bounds
    pub fn viewport_to_content(&self, rect: &RectF) -> RectF {
        let mut mapped = [[0.0; 4]; 4];
        self.inverse.map_vec4_points(&rect.corners(), &mut mapped);
        RectF::bounds_of(&mapped)
    }

    /// Convert a viewport rectangle given with a top-left origin into content
    /// space, also with a top-left origin
    ///
    /// The transform stack works bottom-left up, so y is folded over the
    /// viewport height before the inverse is applied and over the content
    /// height afterwards.
    pub fn viewport_to_content_2d(&self, src: &RectF) -> RectF {
        let viewport_height = self.viewport_rect.height().abs();
        let content_height = self.content_rect.height().abs();

        let mut corners = src.corners();
        for p in corners.iter_mut() {
            p[1] = viewport_height - p[1];
        }
        let mut mapped = [[0.0; 4]; 4];
        self.inverse.map_vec4_points(&corners, &mut mapped);
        for p in mapped.iter_mut() {
            p[1] = content_height - p[1];
        }
        RectF::bounds_of(&mapped)
    }

    /// Forward transform (content → viewport)
    pub fn matrix(&self) -> &Matrix3D {
        &self.matrix
    }

    /// Inverse transform (viewport → content)
    pub fn inverse(&self) -> &Matrix3D {
        &self.inverse
    }

    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    pub fn degrees(&self) -> i32 {
        self.degrees
    }

    pub fn is_flip_x(&self) -> bool {
        self.flip_x
    }

    pub fn content_rect(&self) -> &RectF {
        &self.content_rect
    }

    pub fn viewport_rect(&self) -> &RectF {
        &self.viewport_rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_identity_when_rects_match() {
        let rect = RectF::from_size(640.0, 480.0);
        let matrix = ContentMatrix::new(rect, rect);
        let mapped = matrix.content_to_viewport(&rect);
        assert!(close(mapped.left, 0.0) && close(mapped.right, 640.0));
        assert!(close(mapped.top, 0.0) && close(mapped.bottom, 480.0));
    }

    #[test]
    fn test_center_inside_letterboxes() {
        let mut matrix = ContentMatrix::new(
            RectF::from_size(400.0, 300.0),
            RectF::from_size(1080.0, 1920.0),
        );
        matrix.update(ScaleType::CenterInside, 0, false);
        let mapped = matrix.content_to_viewport(matrix.content_rect());
        assert!(close(mapped.width(), 1080.0));
        assert!(close(mapped.height(), 810.0));
        assert!(close(mapped.center_y(), 960.0));
    }

    #[test]
    fn test_flip_x_mirrors_horizontally() {
        let mut matrix = ContentMatrix::new(
            RectF::from_size(100.0, 100.0),
            RectF::from_size(100.0, 100.0),
        );
        matrix.update(ScaleType::FitXY, 0, true);
        let p = matrix.matrix().map_vec4([10.0, 20.0, 0.0, 1.0]);
        assert!(close(p[0], 90.0));
        assert!(close(p[1], 20.0));
    }

    #[test]
    fn test_viewport_to_content_2d_folds_y() {
        // 90° rotation: viewport x runs along content y
        let mut matrix = ContentMatrix::new(
            RectF::from_size(200.0, 100.0),
            RectF::from_size(100.0, 200.0),
        );
        matrix.update(ScaleType::FitXY, 90, false);
        let top_strip = matrix.viewport_to_content_2d(&RectF::new(0.0, 0.0, 100.0, 20.0));
        // The top strip of the display is a thin band at one end of the content x axis
        assert!(close(top_strip.width(), 20.0));
        assert!(close(top_strip.height(), 100.0));
        assert!(close(top_strip.left, 0.0) || close(top_strip.right, 200.0));
    }

    #[test]
    fn test_update_records_parameters() {
        let mut matrix = ContentMatrix::new(
            RectF::from_size(10.0, 10.0),
            RectF::from_size(20.0, 20.0),
        );
        matrix.update(ScaleType::FitXY, 270, true);
        assert_eq!(matrix.scale_type(), ScaleType::FitXY);
        assert_eq!(matrix.degrees(), 270);
        assert!(matrix.is_flip_x());
    }
}
