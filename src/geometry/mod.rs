// SPDX-License-Identifier: GPL-3.0-only

//! Coordinate geometry for the scan engine
//!
//! This module maps rectangles and points between the three coordinate
//! spaces the engine deals with:
//!
//! - **content space**: the native extent of a source (camera preview size,
//!   mask bitmap size)
//! - **viewport space**: the extent of the display surface
//! - **capture space**: content space as the decoder sees it (after undoing
//!   rotation, scale-fit and front-camera mirroring)
//!
//! Transforms are built as an ordered stack of primitive 4×4 matrices
//! ([`Matrix3D`]) so the inverse stays exact. [`ContentMatrix`] binds a
//! content rectangle to a viewport rectangle under a [`ScaleType`].

pub mod content_matrix;
pub mod matrix3d;
pub mod rect;

pub use content_matrix::{ContentMatrix, ScaleType};
pub use matrix3d::Matrix3D;
pub use rect::{Rect, RectF};
