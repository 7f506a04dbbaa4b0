// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The paint attribute state tracked by a builder and its shared sub-objects.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::color_filter::ColorFilter;
use crate::flags::AttributeFlags;
use crate::geometry::{DlImage, ImageSampling, TileMode};
use crate::image_filter::ImageFilter;
use crate::kurbo::{Affine, Cap, Join, Point, Rect};
use crate::peniko::{BlendMode, Color, Compose, Mix};

/// The blend mode every attribute state starts with.
pub const SRC_OVER: BlendMode = BlendMode {
    mix: Mix::Normal,
    compose: Compose::SrcOver,
};

/// Whether geometry is filled, stroked or both.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawStyle {
    /// Fill the interior.
    #[default]
    Fill,
    /// Stroke the outline.
    Stroke,
    /// Fill the interior and stroke the outline.
    StrokeAndFill,
}

/// How a blur mask filter treats the original shape.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlurStyle {
    /// Blur inside and outside the shape.
    #[default]
    Normal,
    /// Keep the shape solid and blur outside of it.
    Solid,
    /// Blur outside of the shape only.
    Outer,
    /// Blur inside of the shape only.
    Inner,
}

/// A filter applied to the coverage mask of a primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum MaskFilter {
    /// A gaussian blur of the coverage.
    Blur {
        /// How the original shape is treated.
        style: BlurStyle,
        /// Standard deviation of the blur.
        sigma: f32,
    },
}

impl MaskFilter {
    /// Creates a blur mask filter.
    pub fn blur(style: BlurStyle, sigma: f32) -> Self {
        Self::Blur { style, sigma }
    }

    /// Grows local bounds to cover everything the filter can touch.
    pub fn map_local_bounds(&self, bounds: Rect) -> Rect {
        match self {
            Self::Blur { sigma, .. } => {
                let pad = f64::from(*sigma) * 3.0;
                bounds.inflate(pad, pad)
            }
        }
    }
}

/// A dash pattern applied to stroked geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct DashPathEffect {
    intervals: SmallVec<[f32; 4]>,
    phase: f32,
}

impl DashPathEffect {
    /// Creates a dash pattern of alternating on and off lengths.
    pub fn new(intervals: &[f32], phase: f32) -> Self {
        Self {
            intervals: intervals.iter().copied().collect(),
            phase,
        }
    }

    /// The on and off lengths.
    pub fn intervals(&self) -> &[f32] {
        &self.intervals
    }

    /// The offset into the pattern at which dashing starts.
    pub fn phase(&self) -> f32 {
        self.phase
    }
}

/// Randomly displaces path segments.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscretePathEffect {
    /// Length of each displaced segment.
    pub segment_length: f32,
    /// Maximum displacement of each segment end point.
    pub deviation: f32,
    /// Seed for the displacement.
    pub seed: u32,
}

/// An effect applied to geometry before it is filled or stroked.
#[derive(Clone, Debug, PartialEq)]
pub enum PathEffect {
    /// Dash the outline.
    Dash(DashPathEffect),
    /// Jitter the outline.
    Discrete(DiscretePathEffect),
}

impl PathEffect {
    /// Returns the dash effect, if this is one.
    pub fn as_dash(&self) -> Option<&DashPathEffect> {
        match self {
            Self::Dash(dash) => Some(dash),
            Self::Discrete(_) => None,
        }
    }

    /// Maps the bounds of the source geometry to the bounds of the effect output.
    ///
    /// Returns `None` if the output bounds cannot be determined.
    pub fn effect_bounds(&self, bounds: Rect) -> Option<Rect> {
        match self {
            Self::Dash(_) => Some(bounds),
            Self::Discrete(discrete) => {
                let deviation = f64::from(discrete.deviation).abs();
                deviation
                    .is_finite()
                    .then(|| bounds.inflate(deviation, deviation))
            }
        }
    }
}

/// A color stop of a gradient.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient, between 0 and 1.
    pub offset: f32,
    /// The color at that position.
    pub color: Color,
}

/// A source of colors which replaces the paint color.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorSource {
    /// A linear gradient from `start` to `end`.
    LinearGradient {
        /// Start point.
        start: Point,
        /// End point.
        end: Point,
        /// Color stops.
        stops: Vec<GradientStop>,
        /// Behavior outside of the gradient range.
        tile_mode: TileMode,
        /// Optional local transform.
        matrix: Option<Affine>,
    },
    /// A radial gradient around `center`.
    RadialGradient {
        /// Center point.
        center: Point,
        /// Radius.
        radius: f64,
        /// Color stops.
        stops: Vec<GradientStop>,
        /// Behavior outside of the gradient range.
        tile_mode: TileMode,
        /// Optional local transform.
        matrix: Option<Affine>,
    },
    /// An image used as a repeating pattern.
    Image {
        /// The image.
        image: DlImage,
        /// Horizontal tiling.
        horizontal_tile_mode: TileMode,
        /// Vertical tiling.
        vertical_tile_mode: TileMode,
        /// Sampling.
        sampling: ImageSampling,
        /// Optional local transform.
        matrix: Option<Affine>,
    },
}

/// A custom blending stage which replaces the blend mode.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Blender {
    /// Blend with a fixed mode.
    Mode(BlendMode),
    /// `k1 * src * dst + k2 * src + k3 * dst + k4`.
    Arithmetic {
        /// The coefficients `k1` through `k4`.
        k: [f32; 4],
        /// Clamp the color channels to the alpha channel.
        enforce_premul: bool,
    },
}

/// The current paint configuration of a builder.
///
/// Draw operations capture the fields that their [`AttributeFlags`] declare
/// relevant; see [`PaintAttributes::masked`].
#[derive(Clone, Debug, PartialEq)]
pub struct PaintAttributes {
    /// The paint color.
    pub color: Color,
    /// Fill, stroke or both.
    pub style: DrawStyle,
    /// Stroke width; zero is a hairline.
    pub stroke_width: f32,
    /// Stroke cap.
    pub stroke_cap: Cap,
    /// Stroke join.
    pub stroke_join: Join,
    /// Miter limit for miter joins.
    pub stroke_miter: f32,
    /// Blend mode.
    pub blend_mode: BlendMode,
    /// Anti-aliasing.
    pub anti_alias: bool,
    /// Dithering of gradients.
    pub dither: bool,
    /// Invert colors after the color filter.
    pub invert_colors: bool,
    /// Color source replacing the color.
    pub color_source: Option<Arc<ColorSource>>,
    /// Color filter.
    pub color_filter: Option<Arc<ColorFilter>>,
    /// Image filter.
    pub image_filter: Option<Arc<ImageFilter>>,
    /// Mask filter.
    pub mask_filter: Option<Arc<MaskFilter>>,
    /// Path effect.
    pub path_effect: Option<Arc<PathEffect>>,
    /// Custom blender, which takes precedence over the blend mode.
    pub blender: Option<Arc<Blender>>,
}

impl Default for PaintAttributes {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            style: DrawStyle::Fill,
            stroke_width: 0.0,
            stroke_cap: Cap::Butt,
            stroke_join: Join::Miter,
            stroke_miter: 4.0,
            blend_mode: SRC_OVER,
            anti_alias: false,
            dither: false,
            invert_colors: false,
            color_source: None,
            color_filter: None,
            image_filter: None,
            mask_filter: None,
            path_effect: None,
            blender: None,
        }
    }
}

impl PaintAttributes {
    /// Returns a copy keeping only the fields that `flags` declares relevant.
    ///
    /// All other fields are reset to their defaults, so two operations whose
    /// relevant attributes agree capture equal snapshots.
    pub fn masked(&self, flags: AttributeFlags) -> Self {
        let mut out = Self::default();
        if flags.ignores_paint() {
            return out;
        }
        if flags.applies_anti_alias() {
            out.anti_alias = self.anti_alias;
        }
        if flags.applies_dither() {
            out.dither = self.dither;
        }
        if flags.applies_color() {
            out.color = self.color;
        } else if flags.applies_alpha() {
            out.color = out.color.with_alpha_factor(f32::from(self.color.a) / 255.0);
        }
        if flags.applies_blend() {
            out.blend_mode = self.blend_mode;
            out.blender = self.blender.clone();
        }
        if flags.applies_shader() {
            out.color_source = self.color_source.clone();
        }
        if flags.applies_color_filter() {
            out.color_filter = self.color_filter.clone();
            out.invert_colors = self.invert_colors;
        }
        if flags.applies_image_filter() {
            out.image_filter = self.image_filter.clone();
        }
        if flags.applies_mask_filter() {
            out.mask_filter = self.mask_filter.clone();
        }
        if flags.is_geometric() {
            out.style = self.style;
            if flags.applies_path_effect() {
                out.path_effect = self.path_effect.clone();
            }
            if flags.is_stroked(self.style) {
                out.stroke_width = self.stroke_width;
                out.stroke_cap = self.stroke_cap;
                out.stroke_join = self.stroke_join;
                out.stroke_miter = self.stroke_miter;
            }
        }
        out
    }

    /// Whether drawing with these attributes composites with plain source-over.
    pub fn uses_src_over(&self) -> bool {
        match self.blender.as_deref() {
            Some(Blender::Mode(mode)) => *mode == SRC_OVER,
            Some(Blender::Arithmetic { .. }) => false,
            None => self.blend_mode == SRC_OVER,
        }
    }

    /// Whether an operation drawn with these attributes can have its alpha
    /// scaled independently of the other operations in its group.
    pub fn is_opacity_compatible(&self) -> bool {
        self.uses_src_over()
            && !self.invert_colors
            && self
                .color_filter
                .as_deref()
                .map_or(true, ColorFilter::can_commute_with_opacity)
    }

    /// Whether an operation drawn with these attributes may change pixels
    /// outside of its geometry.
    ///
    /// This is the case when the color filter or image filter produces color
    /// from transparent black, or when the blend mode affects destination
    /// pixels that the source does not cover.
    pub fn modifies_transparent_black(&self, flags: AttributeFlags) -> bool {
        if flags.ignores_paint() {
            return false;
        }
        if flags.applies_color_filter()
            && (self.invert_colors
                || self
                    .color_filter
                    .as_deref()
                    .is_some_and(ColorFilter::modifies_transparent_black))
        {
            return true;
        }
        if flags.applies_image_filter()
            && self
                .image_filter
                .as_deref()
                .is_some_and(ImageFilter::modifies_transparent_black)
        {
            return true;
        }
        flags.applies_blend() && !self.blend_preserves_uncovered_destination()
    }

    fn blend_preserves_uncovered_destination(&self) -> bool {
        let mode = match self.blender.as_deref() {
            Some(Blender::Mode(mode)) => *mode,
            Some(Blender::Arithmetic { k, .. }) => return k[3] == 0.0,
            None => self.blend_mode,
        };
        // With a transparent source, these modes clear or rewrite the destination.
        !matches!(
            mode.compose,
            Compose::Clear
                | Compose::Copy
                | Compose::SrcIn
                | Compose::DestIn
                | Compose::SrcOut
                | Compose::DestAtop
        )
    }
}
