// SPDX-License-Identifier: GPL-3.0-only

//! Axis-aligned rectangles

use std::str::FromStr;

/// Floating point rectangle given by its edges
///
/// No ordering between `left`/`right` or `top`/`bottom` is enforced; the
/// geometry code normalises after mapping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin with the given size
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    /// True when the rectangle has no area (or is inverted)
    pub fn is_empty(&self) -> bool {
        !(self.left < self.right && self.top < self.bottom)
    }

    /// The four corners as homogeneous points (z = 0, w = 1)
    pub fn corners(&self) -> [[f32; 4]; 4] {
        [
            [self.left, self.bottom, 0.0, 1.0],
            [self.right, self.bottom, 0.0, 1.0],
            [self.left, self.top, 0.0, 1.0],
            [self.right, self.top, 0.0, 1.0],
        ]
    }

    /// Bounding rectangle of a set of homogeneous points, with min/max normalised
    pub fn bounds_of(points: &[[f32; 4]]) -> Self {
        let mut bounds = Self::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for p in points {
            bounds.left = bounds.left.min(p[0]);
            bounds.right = bounds.right.max(p[0]);
            bounds.top = bounds.top.min(p[1]);
            bounds.bottom = bounds.bottom.max(p[1]);
        }
        bounds
    }

    /// Convert to an integer rectangle, truncating each edge toward zero
    pub fn truncate(&self) -> Rect {
        Rect::new(
            self.left as i32,
            self.top as i32,
            self.right as i32,
            self.bottom as i32,
        )
    }
}

impl From<Rect> for RectF {
    fn from(rect: Rect) -> Self {
        Self::new(
            rect.left as f32,
            rect.top as f32,
            rect.right as f32,
            rect.bottom as f32,
        )
    }
}

/// Integer rectangle in pixel coordinates (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Intersect with `(0, 0, width, height)`, returning `None` when nothing is left
    pub fn clamp_to(&self, width: i32, height: i32) -> Option<Rect> {
        let clamped = Rect::new(
            self.left.clamp(0, width),
            self.top.clamp(0, height),
            self.right.clamp(0, width),
            self.bottom.clamp(0, height),
        );
        (!clamped.is_empty()).then_some(clamped)
    }
}

impl FromStr for Rect {
    type Err = String;

    /// Parse `left,top,right,bottom`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid rect '{}': {}", s, e))?;
        match parts.as_slice() {
            [left, top, right, bottom] => Ok(Rect::new(*left, *top, *right, *bottom)),
            _ => Err(format!("expected left,top,right,bottom, got '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_normalises_inverted_points() {
        let bounds = RectF::bounds_of(&[[10.0, -5.0, 0.0, 1.0], [-2.0, 7.0, 0.0, 1.0]]);
        assert_eq!(bounds, RectF::new(-2.0, -5.0, 10.0, 7.0));
    }

    #[test]
    fn test_truncate_toward_zero() {
        let rect = RectF::new(1.9, -0.5, 10.2, 4.999).truncate();
        assert_eq!(rect, Rect::new(1, 0, 10, 4));
    }

    #[test]
    fn test_clamp_to_frame() {
        let rect = Rect::new(-10, 5, 50, 500);
        assert_eq!(rect.clamp_to(40, 30), Some(Rect::new(0, 5, 40, 30)));
        assert_eq!(Rect::new(50, 50, 60, 60).clamp_to(40, 30), None);
    }

    #[test]
    fn test_parse_rect() {
        assert_eq!("1, 2,3,4".parse::<Rect>(), Ok(Rect::new(1, 2, 3, 4)));
        assert!("1,2,3".parse::<Rect>().is_err());
        assert!("a,b,c,d".parse::<Rect>().is_err());
    }
}
