// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static descriptions of which paint attributes affect each operation.
//!
//! Every drawing operation has an [`AttributeFlags`] entry. The entries are
//! consulted when recording (to decide which attributes are captured and how
//! far the geometric bounds of the operation grow) and when replaying (to
//! decide which attributes have to be forwarded to the backend).

use crate::attributes::{DrawStyle, PathEffect};
use crate::geometry::PointMode;
use crate::kurbo::Point;

/// Flags describing the special geometry an operation may produce when stroked.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct SpecialGeometryFlags(pub u32);

impl SpecialGeometryFlags {
    /// The geometry may have open ends where caps are drawn.
    pub const MAY_HAVE_CAPS: Self = Self(1 << 0);
    /// The geometry may have corners where joins are drawn.
    pub const MAY_HAVE_JOINS: Self = Self(1 << 1);
    /// Butt caps on this geometry render like square caps (e.g. points).
    pub const BUTT_CAP_BECOMES_SQUARE: Self = Self(1 << 2);
    /// Joins may be acute enough for a miter to extend past half the stroke width.
    pub const MAY_HAVE_ACUTE_JOINS: Self = Self(1 << 3);
    /// Caps may face a diagonal direction, so square caps reach `√2` times half the width.
    pub const MAY_HAVE_DIAGONAL_CAPS: Self = Self(1 << 4);

    const NONE: Self = Self(0);

    /// Whether the geometry may have end caps.
    pub const fn may_have_end_caps(self) -> bool {
        self.0 & Self::MAY_HAVE_CAPS.0 != 0
    }

    /// Whether the geometry may have joins.
    pub const fn may_have_joins(self) -> bool {
        self.0 & Self::MAY_HAVE_JOINS.0 != 0
    }

    /// Whether butt caps are drawn as square caps.
    pub const fn butt_cap_becomes_square(self) -> bool {
        self.0 & Self::BUTT_CAP_BECOMES_SQUARE.0 != 0
    }

    /// Whether a miter join may extend past half the stroke width.
    pub const fn may_have_acute_joins(self) -> bool {
        self.0 & Self::MAY_HAVE_ACUTE_JOINS.0 != 0
    }

    /// Whether square caps may extend diagonally.
    pub const fn may_have_diagonal_caps(self) -> bool {
        self.0 & Self::MAY_HAVE_DIAGONAL_CAPS.0 != 0
    }

    const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A per-operation descriptor of the relevant paint attributes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct AttributeFlags(pub u32);

impl AttributeFlags {
    /// The operation ignores the paint attributes entirely.
    pub const IGNORES_PAINT: Self = Self(1 << 0);

    /// Anti-aliasing affects the operation.
    pub const USES_ANTI_ALIAS: Self = Self(1 << 1);
    /// Dithering affects the operation.
    pub const USES_DITHER: Self = Self(1 << 2);
    /// The alpha of the color affects the operation.
    pub const USES_ALPHA: Self = Self(1 << 3);
    /// The color (including alpha) affects the operation.
    pub const USES_COLOR: Self = Self(1 << 4);
    /// The blend mode or blender affects the operation.
    pub const USES_BLEND: Self = Self(1 << 5);
    /// The color source (shader) affects the operation.
    pub const USES_SHADER: Self = Self(1 << 6);
    /// The color filter and color inversion affect the operation.
    pub const USES_COLOR_FILTER: Self = Self(1 << 7);
    /// The path effect affects the operation.
    pub const USES_PATH_EFFECT: Self = Self(1 << 8);
    /// The mask filter affects the operation.
    pub const USES_MASK_FILTER: Self = Self(1 << 9);
    /// The image filter affects the operation.
    pub const USES_IMAGE_FILTER: Self = Self(1 << 10);

    /// The operation fills geometry unless the style says otherwise.
    pub const IS_FILLED_GEOMETRY: Self = Self(1 << 11);
    /// The operation always strokes its geometry, regardless of style.
    pub const IS_STROKED_GEOMETRY: Self = Self(1 << 12);
    /// The operation does not render geometry (images, layers, vertices).
    pub const IS_NON_GEOMETRIC: Self = Self(1 << 13);
    /// The operation covers the entire clip.
    pub const FLOODS_SURFACE: Self = Self(1 << 14);

    const SPECIAL_SHIFT: u32 = 16;
    const MAY_HAVE_CAPS: Self = Self(SpecialGeometryFlags::MAY_HAVE_CAPS.0 << Self::SPECIAL_SHIFT);
    const MAY_HAVE_JOINS: Self =
        Self(SpecialGeometryFlags::MAY_HAVE_JOINS.0 << Self::SPECIAL_SHIFT);
    const BUTT_CAP_BECOMES_SQUARE: Self =
        Self(SpecialGeometryFlags::BUTT_CAP_BECOMES_SQUARE.0 << Self::SPECIAL_SHIFT);
    const MAY_HAVE_ACUTE_JOINS: Self =
        Self(SpecialGeometryFlags::MAY_HAVE_ACUTE_JOINS.0 << Self::SPECIAL_SHIFT);
    const MAY_HAVE_DIAGONAL_CAPS: Self =
        Self(SpecialGeometryFlags::MAY_HAVE_DIAGONAL_CAPS.0 << Self::SPECIAL_SHIFT);

    const BASE_PAINT: Self = Self::USES_ALPHA
        .with(Self::USES_COLOR)
        .with(Self::USES_BLEND)
        .with(Self::USES_SHADER)
        .with(Self::USES_COLOR_FILTER)
        .with(Self::USES_IMAGE_FILTER);
    const BASE_STROKE_OR_FILL: Self = Self::IS_FILLED_GEOMETRY
        .with(Self::IS_STROKED_GEOMETRY)
        .with(Self::USES_MASK_FILTER);
    const BASE_GEOMETRY: Self = Self::BASE_PAINT
        .with(Self::USES_ANTI_ALIAS)
        .with(Self::USES_DITHER)
        .with(Self::USES_PATH_EFFECT);
    const BASE_IMAGE: Self = Self::IS_NON_GEOMETRIC
        .with(Self::USES_ALPHA)
        .with(Self::USES_DITHER)
        .with(Self::USES_BLEND)
        .with(Self::USES_COLOR_FILTER)
        .with(Self::USES_IMAGE_FILTER);

    // Per-operation tables.

    /// `save_layer` without attributes.
    pub const SAVE_LAYER: Self = Self::IGNORES_PAINT;
    /// `save_layer` rendering with the current attributes.
    pub const SAVE_LAYER_WITH_PAINT: Self = Self::IS_NON_GEOMETRIC
        .with(Self::USES_ALPHA)
        .with(Self::USES_BLEND)
        .with(Self::USES_COLOR_FILTER)
        .with(Self::USES_IMAGE_FILTER);
    /// `draw_color`.
    pub const DRAW_COLOR: Self = Self::FLOODS_SURFACE.with(Self::IGNORES_PAINT);
    /// `draw_paint`.
    pub const DRAW_PAINT: Self = Self::BASE_PAINT
        .with(Self::USES_DITHER)
        .with(Self::FLOODS_SURFACE)
        .with(Self::IS_NON_GEOMETRIC);
    /// `draw_line` for horizontal or vertical lines.
    pub const DRAW_HV_LINE: Self = Self::BASE_GEOMETRY
        .with(Self::IS_STROKED_GEOMETRY)
        .with(Self::USES_MASK_FILTER)
        .with(Self::MAY_HAVE_CAPS);
    /// `draw_line` for diagonal lines.
    pub const DRAW_LINE: Self = Self::DRAW_HV_LINE.with(Self::MAY_HAVE_DIAGONAL_CAPS);
    /// `draw_rect`.
    pub const DRAW_RECT: Self = Self::BASE_GEOMETRY
        .with(Self::BASE_STROKE_OR_FILL)
        .with(Self::MAY_HAVE_JOINS);
    /// `draw_oval`.
    pub const DRAW_OVAL: Self = Self::BASE_GEOMETRY.with(Self::BASE_STROKE_OR_FILL);
    /// `draw_circle`.
    pub const DRAW_CIRCLE: Self = Self::BASE_GEOMETRY.with(Self::BASE_STROKE_OR_FILL);
    /// `draw_rrect`.
    pub const DRAW_RRECT: Self = Self::BASE_GEOMETRY.with(Self::BASE_STROKE_OR_FILL);
    /// `draw_drrect`.
    pub const DRAW_DRRECT: Self = Self::BASE_GEOMETRY.with(Self::BASE_STROKE_OR_FILL);
    /// `draw_path`.
    pub const DRAW_PATH: Self = Self::BASE_GEOMETRY
        .with(Self::BASE_STROKE_OR_FILL)
        .with(Self::MAY_HAVE_CAPS)
        .with(Self::MAY_HAVE_JOINS)
        .with(Self::MAY_HAVE_ACUTE_JOINS)
        .with(Self::MAY_HAVE_DIAGONAL_CAPS);
    /// `draw_arc` without the center point.
    pub const DRAW_ARC_NO_CENTER: Self = Self::BASE_GEOMETRY
        .with(Self::BASE_STROKE_OR_FILL)
        .with(Self::MAY_HAVE_CAPS)
        .with(Self::MAY_HAVE_DIAGONAL_CAPS);
    /// `draw_arc` including the center point.
    pub const DRAW_ARC_WITH_CENTER: Self = Self::BASE_GEOMETRY
        .with(Self::BASE_STROKE_OR_FILL)
        .with(Self::MAY_HAVE_JOINS)
        .with(Self::MAY_HAVE_ACUTE_JOINS);
    /// `draw_points` in [`PointMode::Points`](crate::geometry::PointMode::Points).
    pub const DRAW_POINTS_AS_POINTS: Self = Self::BASE_GEOMETRY
        .with(Self::IS_STROKED_GEOMETRY)
        .with(Self::USES_MASK_FILTER)
        .with(Self::MAY_HAVE_CAPS)
        .with(Self::BUTT_CAP_BECOMES_SQUARE);
    /// `draw_points` in [`PointMode::Lines`](crate::geometry::PointMode::Lines).
    pub const DRAW_POINTS_AS_LINES: Self = Self::BASE_GEOMETRY
        .with(Self::IS_STROKED_GEOMETRY)
        .with(Self::USES_MASK_FILTER)
        .with(Self::MAY_HAVE_CAPS)
        .with(Self::MAY_HAVE_DIAGONAL_CAPS);
    /// `draw_points` in [`PointMode::Polygon`](crate::geometry::PointMode::Polygon).
    pub const DRAW_POINTS_AS_POLYGON: Self = Self::BASE_GEOMETRY
        .with(Self::IS_STROKED_GEOMETRY)
        .with(Self::USES_MASK_FILTER)
        .with(Self::MAY_HAVE_CAPS)
        .with(Self::MAY_HAVE_JOINS)
        .with(Self::MAY_HAVE_ACUTE_JOINS)
        .with(Self::MAY_HAVE_DIAGONAL_CAPS);
    /// `draw_vertices`.
    pub const DRAW_VERTICES: Self = Self::IS_NON_GEOMETRIC
        .with(Self::USES_DITHER)
        .with(Self::USES_ALPHA)
        .with(Self::USES_COLOR)
        .with(Self::USES_SHADER)
        .with(Self::USES_BLEND)
        .with(Self::USES_COLOR_FILTER)
        .with(Self::USES_IMAGE_FILTER);
    /// `draw_image` and `draw_image_rect` without attributes.
    pub const DRAW_IMAGE: Self = Self::IGNORES_PAINT;
    /// `draw_image` and `draw_image_rect` with attributes.
    pub const DRAW_IMAGE_WITH_PAINT: Self = Self::BASE_IMAGE
        .with(Self::USES_ANTI_ALIAS)
        .with(Self::USES_MASK_FILTER);
    /// `draw_image_nine` without attributes.
    pub const DRAW_IMAGE_NINE: Self = Self::IGNORES_PAINT;
    /// `draw_image_nine` with attributes.
    pub const DRAW_IMAGE_NINE_WITH_PAINT: Self = Self::BASE_IMAGE;
    /// `draw_atlas` without attributes.
    pub const DRAW_ATLAS: Self = Self::IGNORES_PAINT;
    /// `draw_atlas` with attributes.
    pub const DRAW_ATLAS_WITH_PAINT: Self = Self::BASE_IMAGE;
    /// `draw_display_list` and `draw_picture`.
    pub const DRAW_DISPLAY_LIST: Self = Self::IGNORES_PAINT;
    /// `draw_picture` rendering with the current attributes.
    pub const DRAW_PICTURE_WITH_PAINT: Self = Self::SAVE_LAYER_WITH_PAINT;
    /// `draw_text_blob`.
    pub const DRAW_TEXT_BLOB: Self = Self::BASE_GEOMETRY
        .with(Self::BASE_STROKE_OR_FILL)
        .with(Self::MAY_HAVE_JOINS)
        .with(Self::MAY_HAVE_ACUTE_JOINS);
    /// `draw_shadow`.
    pub const DRAW_SHADOW: Self = Self::IGNORES_PAINT;

    const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    const fn has_any(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the operation ignores all paint attributes.
    pub const fn ignores_paint(self) -> bool {
        self.has_any(Self::IGNORES_PAINT)
    }

    /// Whether anti-aliasing affects the operation.
    pub const fn applies_anti_alias(self) -> bool {
        self.has_any(Self::USES_ANTI_ALIAS)
    }

    /// Whether dithering affects the operation.
    pub const fn applies_dither(self) -> bool {
        self.has_any(Self::USES_DITHER)
    }

    /// Whether the alpha of the color affects the operation.
    pub const fn applies_alpha(self) -> bool {
        self.has_any(Self::USES_ALPHA)
    }

    /// Whether the color affects the operation.
    pub const fn applies_color(self) -> bool {
        self.has_any(Self::USES_COLOR)
    }

    /// Whether the blend mode or blender affects the operation.
    pub const fn applies_blend(self) -> bool {
        self.has_any(Self::USES_BLEND)
    }

    /// Whether the color source affects the operation.
    pub const fn applies_shader(self) -> bool {
        self.has_any(Self::USES_SHADER)
    }

    /// Whether the color filter affects the operation.
    pub const fn applies_color_filter(self) -> bool {
        self.has_any(Self::USES_COLOR_FILTER)
    }

    /// Whether the path effect affects the operation.
    pub const fn applies_path_effect(self) -> bool {
        self.has_any(Self::USES_PATH_EFFECT)
    }

    /// Whether the mask filter affects the operation.
    pub const fn applies_mask_filter(self) -> bool {
        self.has_any(Self::USES_MASK_FILTER)
    }

    /// Whether the image filter affects the operation.
    pub const fn applies_image_filter(self) -> bool {
        self.has_any(Self::USES_IMAGE_FILTER)
    }

    /// Whether the operation renders fillable or strokable geometry.
    pub const fn is_geometric(self) -> bool {
        self.has_any(Self::IS_FILLED_GEOMETRY.with(Self::IS_STROKED_GEOMETRY))
    }

    /// Whether the operation strokes its geometry given the draw style.
    pub const fn is_stroked(self, style: DrawStyle) -> bool {
        self.has_any(Self::IS_STROKED_GEOMETRY)
            || (!matches!(style, DrawStyle::Fill) && self.has_any(Self::IS_FILLED_GEOMETRY))
    }

    /// Whether the operation covers the whole clip.
    pub const fn is_flood(self) -> bool {
        self.has_any(Self::FLOODS_SURFACE)
    }

    /// The special geometry flags of the operation, without path effects.
    pub const fn geometry_flags(self) -> SpecialGeometryFlags {
        SpecialGeometryFlags((self.0 >> Self::SPECIAL_SHIFT) & 0x1f)
    }

    /// The special geometry flags of the operation once `effect` has been applied.
    ///
    /// A dash can introduce end caps wherever the original geometry had joins,
    /// and those caps face diagonally wherever the joins could be acute. Any
    /// other kind of effect is treated as producing arbitrary geometry.
    pub fn with_path_effect(
        self,
        effect: Option<&PathEffect>,
        is_stroked: bool,
    ) -> SpecialGeometryFlags {
        let flags = self.geometry_flags();
        let Some(effect) = effect else {
            return flags;
        };
        if !self.is_geometric() {
            return flags;
        }
        match effect {
            PathEffect::Dash(_) if is_stroked => {
                let mut flags = flags;
                if flags.may_have_joins() {
                    flags = flags.with(SpecialGeometryFlags::MAY_HAVE_CAPS);
                    if flags.may_have_acute_joins() {
                        flags = flags.with(SpecialGeometryFlags::MAY_HAVE_DIAGONAL_CAPS);
                    }
                }
                flags
            }
            PathEffect::Dash(_) => SpecialGeometryFlags::NONE,
            PathEffect::Discrete(_) => SpecialGeometryFlags::MAY_HAVE_CAPS
                .with(SpecialGeometryFlags::MAY_HAVE_JOINS)
                .with(SpecialGeometryFlags::MAY_HAVE_ACUTE_JOINS)
                .with(SpecialGeometryFlags::MAY_HAVE_DIAGONAL_CAPS),
        }
    }
}

/// The flags of a line from `p0` to `p1`.
pub(crate) fn line_flags(p0: Point, p1: Point) -> AttributeFlags {
    if p0.x == p1.x || p0.y == p1.y {
        AttributeFlags::DRAW_HV_LINE
    } else {
        AttributeFlags::DRAW_LINE
    }
}

pub(crate) fn points_flags(mode: PointMode) -> AttributeFlags {
    match mode {
        PointMode::Points => AttributeFlags::DRAW_POINTS_AS_POINTS,
        PointMode::Lines => AttributeFlags::DRAW_POINTS_AS_LINES,
        PointMode::Polygon => AttributeFlags::DRAW_POINTS_AS_POLYGON,
    }
}

#[cfg(test)]
mod tests {
    use super::AttributeFlags;
    use crate::attributes::{DashPathEffect, DrawStyle, PathEffect};

    #[test]
    fn ignores_paint_ops_apply_nothing() {
        for flags in [
            AttributeFlags::DRAW_COLOR,
            AttributeFlags::DRAW_IMAGE,
            AttributeFlags::DRAW_SHADOW,
            AttributeFlags::DRAW_DISPLAY_LIST,
            AttributeFlags::SAVE_LAYER,
        ] {
            assert!(flags.ignores_paint());
            assert!(!flags.applies_color());
            assert!(!flags.applies_image_filter());
            assert!(!flags.is_geometric());
        }
    }

    #[test]
    fn stroke_style_depends_on_geometry() {
        let rect = AttributeFlags::DRAW_RECT;
        assert!(!rect.is_stroked(DrawStyle::Fill));
        assert!(rect.is_stroked(DrawStyle::Stroke));
        assert!(rect.is_stroked(DrawStyle::StrokeAndFill));

        // Lines are always stroked.
        assert!(AttributeFlags::DRAW_LINE.is_stroked(DrawStyle::Fill));
        // Images never are.
        assert!(!AttributeFlags::DRAW_IMAGE_WITH_PAINT.is_stroked(DrawStyle::Stroke));
    }

    #[test]
    fn flood_ops() {
        assert!(AttributeFlags::DRAW_PAINT.is_flood());
        assert!(AttributeFlags::DRAW_COLOR.is_flood());
        assert!(!AttributeFlags::DRAW_RECT.is_flood());
    }

    #[test]
    fn image_ops_use_alpha_not_color() {
        let flags = AttributeFlags::DRAW_IMAGE_WITH_PAINT;
        assert!(flags.applies_alpha());
        assert!(!flags.applies_color());
        assert!(!flags.applies_shader());
        assert!(flags.applies_mask_filter());
    }

    #[test]
    fn dash_adds_caps_at_joins() {
        let dash = PathEffect::Dash(DashPathEffect::new(&[5.0, 5.0], 0.0));
        let rect = AttributeFlags::DRAW_RECT;
        assert!(!rect.geometry_flags().may_have_end_caps());
        let dashed = rect.with_path_effect(Some(&dash), true);
        assert!(dashed.may_have_end_caps());
        assert!(dashed.may_have_joins());
        // A rectangle has no acute joins, so its caps face along the edges.
        assert!(!dashed.may_have_diagonal_caps());

        let path = AttributeFlags::DRAW_PATH.with_path_effect(Some(&dash), true);
        assert!(path.may_have_diagonal_caps());

        // Filled dashes do not change anything with respect to strokes.
        let filled = rect.with_path_effect(Some(&dash), false);
        assert!(!filled.may_have_end_caps());
    }

    #[test]
    fn points_square_off_butt_caps() {
        let flags = AttributeFlags::DRAW_POINTS_AS_POINTS.geometry_flags();
        assert!(flags.butt_cap_becomes_square());
        assert!(!AttributeFlags::DRAW_POINTS_AS_LINES
            .geometry_flags()
            .butt_cap_becomes_square());
    }
}
