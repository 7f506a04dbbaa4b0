// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Payload value types carried by recorded operations.
//!
//! Rectangles, paths, points and affine transforms come from [`kurbo`](crate::kurbo).
//! The types in this module fill the gaps: integer device rectangles, opaque
//! images, pre-shaped text, vertex meshes and the small enums that parameterize
//! clip and image operations. None of them are inspected by the recorder beyond
//! their bounding rectangles.

use std::sync::Arc;

use crate::kurbo::{Affine, BezPath, Point, Rect, Shape};
use crate::peniko::Color;

/// The largest cull rectangle a builder will ever report.
///
/// Flood operations recorded without a tighter clip accumulate this rectangle.
pub const MAX_CULL_RECT: Rect = Rect::new(-1e9, -1e9, 1e9, 1e9);

/// An integer rectangle in device (pixel) space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    /// The minimum x coordinate.
    pub x0: i32,
    /// The minimum y coordinate.
    pub y0: i32,
    /// The maximum x coordinate.
    pub x1: i32,
    /// The maximum y coordinate.
    pub y1: i32,
}

impl IRect {
    /// An empty rectangle at the origin.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Creates a new rectangle from its edges.
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates the smallest integer rectangle containing `rect`.
    ///
    /// Non-finite edges saturate to the `i32` range.
    pub fn round_out(rect: Rect) -> Self {
        let rect = rect.expand();
        // `as` saturates for out of range floats and maps NaN to 0.
        Self::new(
            rect.x0 as i32,
            rect.y0 as i32,
            rect.x1 as i32,
            rect.y1 as i32,
        )
    }

    /// Converts to a floating point rectangle.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }

    /// The width of the rectangle.
    pub fn width(self) -> i32 {
        self.x1.saturating_sub(self.x0)
    }

    /// The height of the rectangle.
    pub fn height(self) -> i32 {
        self.y1.saturating_sub(self.y0)
    }

    /// Whether the rectangle covers no pixels.
    pub fn is_empty(self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Grows the rectangle by `dx` horizontally and `dy` vertically on each side.
    ///
    /// Negative amounts shrink it.
    #[must_use]
    pub fn outset(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x0.saturating_sub(dx),
            self.y0.saturating_sub(dy),
            self.x1.saturating_add(dx),
            self.y1.saturating_add(dy),
        )
    }

    /// The smallest rectangle containing both rectangles.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(self, other: Self) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }
}

/// Returns whether the two rectangles share any area.
///
/// Rectangles that only touch along an edge do not overlap.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Returns whether every edge of the rectangle is finite.
pub fn rect_is_finite(rect: Rect) -> bool {
    rect.x0.is_finite() && rect.y0.is_finite() && rect.x1.is_finite() && rect.y1.is_finite()
}

/// How a clip shape combines with the current clip.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClipOp {
    /// Keep only the area inside the shape.
    #[default]
    Intersect,
    /// Keep only the area outside the shape.
    Difference,
}

/// How `draw_points` interprets its point list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PointMode {
    /// Every point is drawn individually, as a dot sized by the stroke width.
    Points,
    /// Each pair of points is drawn as a line segment.
    Lines,
    /// The points are connected into an open polyline.
    Polygon,
}

/// How edges of an image or gradient are extended.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileMode {
    /// Replicate the edge color.
    #[default]
    Clamp,
    /// Repeat the content.
    Repeat,
    /// Repeat the content, mirroring every other copy.
    Mirror,
    /// Treat everything outside the content as transparent black.
    Decal,
}

/// Sampling used when an image is drawn scaled or transformed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageSampling {
    /// Nearest neighbor sampling.
    #[default]
    NearestNeighbor,
    /// Bilinear sampling.
    Linear,
    /// Bilinear sampling with mipmaps.
    MipmapLinear,
    /// Bicubic sampling.
    Cubic,
}

/// Filtering for the stretched areas of a nine patch image.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest neighbor.
    #[default]
    Nearest,
    /// Bilinear.
    Linear,
}

/// Whether `draw_image_rect` may sample outside of its source rectangle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SrcRectConstraint {
    /// Sample only inside the source rectangle.
    Strict,
    /// Sampling may bleed outside of the source rectangle.
    #[default]
    Fast,
}

/// An immutable image with premultiplied RGBA8 pixels.
///
/// Images are compared by identity of their pixel storage. Decoding is not
/// the concern of this crate.
#[derive(Clone, Debug)]
pub struct DlImage {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl DlImage {
    /// Creates an image from premultiplied RGBA8 pixel data.
    ///
    /// Returns `None` if the data length does not match the dimensions.
    pub fn from_premul_rgba8(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Option<Self> {
        let pixels = pixels.into();
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The premultiplied RGBA8 pixel data, row major without padding.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The image bounds, anchored at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

impl PartialEq for DlImage {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// Text which has already been shaped and converted to outlines.
///
/// Shaping is outside the scope of this crate, so a text blob is simply the
/// union of its glyph outlines, positioned relative to the blob origin.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlob {
    outlines: BezPath,
    bounds: Rect,
}

impl TextBlob {
    /// Creates a text blob from glyph outlines.
    pub fn from_outlines(outlines: BezPath) -> Self {
        let bounds = outlines.bounding_box();
        Self { outlines, bounds }
    }

    /// The glyph outlines.
    pub fn outlines(&self) -> &BezPath {
        &self.outlines
    }

    /// The conservative bounds of the glyph outlines.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }
}

/// How the positions of a [`Vertices`] mesh are assembled into triangles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VertexMode {
    /// Every three vertices form a triangle.
    Triangles,
    /// Every vertex after the first two forms a triangle with its two predecessors.
    TriangleStrip,
    /// Every vertex after the first two forms a triangle with its predecessor and the first vertex.
    TriangleFan,
}

/// A triangle mesh with optional per vertex colors.
#[derive(Clone, Debug, PartialEq)]
pub struct Vertices {
    mode: VertexMode,
    positions: Vec<Point>,
    colors: Option<Vec<Color>>,
    indices: Option<Vec<u16>>,
    bounds: Rect,
}

impl Vertices {
    /// Creates a mesh.
    ///
    /// `colors`, when present, must have one entry per position; extra or
    /// missing entries are ignored by backends.
    pub fn new(
        mode: VertexMode,
        positions: Vec<Point>,
        colors: Option<Vec<Color>>,
        indices: Option<Vec<u16>>,
    ) -> Self {
        let bounds = positions
            .iter()
            .map(|p| Rect::from_points(*p, *p))
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO);
        Self {
            mode,
            positions,
            colors,
            indices,
            bounds,
        }
    }

    /// The triangle assembly mode.
    pub fn mode(&self) -> VertexMode {
        self.mode
    }

    /// The vertex positions.
    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    /// Per vertex colors.
    pub fn colors(&self) -> Option<&[Color]> {
        self.colors.as_deref()
    }

    /// The bounds of all positions.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Iterates over the assembled triangles as indices into [`Self::positions`].
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let order: Vec<usize> = match &self.indices {
            Some(indices) => indices.iter().map(|i| usize::from(*i)).collect(),
            None => (0..self.positions.len()).collect(),
        };
        let count = match self.mode {
            VertexMode::Triangles => order.len() / 3,
            VertexMode::TriangleStrip | VertexMode::TriangleFan => order.len().saturating_sub(2),
        };
        let mode = self.mode;
        let len = self.positions.len();
        (0..count).filter_map(move |i| {
            let tri = match mode {
                VertexMode::Triangles => [order[3 * i], order[3 * i + 1], order[3 * i + 2]],
                VertexMode::TriangleStrip => [order[i], order[i + 1], order[i + 2]],
                VertexMode::TriangleFan => [order[0], order[i + 1], order[i + 2]],
            };
            tri.iter().all(|ix| *ix < len).then_some(tri)
        })
    }
}

/// A compressed rotation, scale and translation, used by `draw_atlas`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RSTransform {
    /// `scale * cos(angle)`.
    pub scos: f64,
    /// `scale * sin(angle)`.
    pub ssin: f64,
    /// Horizontal translation.
    pub tx: f64,
    /// Vertical translation.
    pub ty: f64,
}

impl RSTransform {
    /// Creates a transform from its components.
    pub fn new(scos: f64, ssin: f64, tx: f64, ty: f64) -> Self {
        Self { scos, ssin, tx, ty }
    }

    /// Creates a transform that scales and rotates around `anchor`, then moves it to `(tx, ty)`.
    pub fn from_radians(scale: f64, radians: f64, tx: f64, ty: f64, anchor: Point) -> Self {
        let scos = scale * radians.cos();
        let ssin = scale * radians.sin();
        Self {
            scos,
            ssin,
            tx: tx - scos * anchor.x + ssin * anchor.y,
            ty: ty - ssin * anchor.x - scos * anchor.y,
        }
    }

    /// Expands into a full affine transform.
    pub fn to_affine(self) -> Affine {
        Affine::new([self.scos, self.ssin, -self.ssin, self.scos, self.tx, self.ty])
    }
}

#[cfg(test)]
mod tests {
    use super::{rects_overlap, IRect, VertexMode, Vertices};
    use crate::kurbo::{Point, Rect};

    #[test]
    fn irect_round_out() {
        let r = IRect::round_out(Rect::new(0.5, -0.5, 10.1, 9.9));
        assert_eq!(r, IRect::new(0, -1, 11, 10));
        assert_eq!(r.outset(2, 3), IRect::new(-2, -4, 13, 13));
        assert!(IRect::new(0, 0, 0, 10).is_empty());
    }

    #[test]
    fn overlap_excludes_touching_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(!rects_overlap(a, Rect::new(10.0, 0.0, 20.0, 10.0)));
        assert!(rects_overlap(a, Rect::new(9.0, 9.0, 20.0, 20.0)));
    }

    #[test]
    fn fan_triangles() {
        let v = Vertices::new(
            VertexMode::TriangleFan,
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            None,
            None,
        );
        let tris: Vec<_> = v.triangles().collect();
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(v.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }
}
