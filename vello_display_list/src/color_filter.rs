// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Color filters: per-pixel color transforms which never move pixels.

use crate::peniko::{BlendMode, Color, Compose};

/// A per-pixel color transform.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorFilter {
    /// Blend a constant color onto every pixel.
    Blend {
        /// The constant color, used as the source of the blend.
        color: Color,
        /// The blend mode.
        mode: BlendMode,
    },
    /// A 4x5 row major matrix applied to unpremultiplied `[r, g, b, a, 1]`.
    ///
    /// The offsets in the fifth column are in the normalized `0..1` range.
    Matrix([f32; 20]),
    /// Convert from sRGB gamma to linear.
    SrgbToLinearGamma,
    /// Convert from linear to sRGB gamma.
    LinearToSrgbGamma,
}

impl ColorFilter {
    /// The identity color matrix.
    pub const IDENTITY_MATRIX: [f32; 20] = [
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0, //
    ];

    /// Creates a blend filter.
    ///
    /// Returns `None` when the filter would have no visible effect.
    pub fn blend(color: Color, mode: BlendMode) -> Option<Self> {
        let filter = Self::Blend { color, mode };
        (!filter.is_identity()).then_some(filter)
    }

    /// Creates a matrix filter.
    pub fn matrix(matrix: [f32; 20]) -> Self {
        Self::Matrix(matrix)
    }

    /// Whether the filter can produce a non-transparent color from transparent black.
    pub fn modifies_transparent_black(&self) -> bool {
        match self {
            Self::Blend { color, mode } => {
                color.a != 0 && blend_keeps_source_over_transparent(mode.compose)
            }
            Self::Matrix(m) => m[4] != 0.0 || m[9] != 0.0 || m[14] != 0.0 || m[19] != 0.0,
            Self::SrgbToLinearGamma | Self::LinearToSrgbGamma => false,
        }
    }

    /// Whether applying the filter and then scaling alpha gives the same
    /// result as scaling alpha first.
    pub fn can_commute_with_opacity(&self) -> bool {
        match self {
            Self::Blend { .. } => false,
            // The alpha row must be a pure copy of alpha, and no color channel
            // may depend on alpha.
            Self::Matrix(m) => {
                m[3] == 0.0
                    && m[8] == 0.0
                    && m[13] == 0.0
                    && m[15] == 0.0
                    && m[16] == 0.0
                    && m[17] == 0.0
                    && m[18] == 1.0
                    && m[19] == 0.0
            }
            Self::SrgbToLinearGamma | Self::LinearToSrgbGamma => true,
        }
    }

    /// Applies the filter to a single unpremultiplied color.
    pub fn filter_color(&self, color: Color) -> Color {
        match self {
            Self::Blend { color: src, mode } => blend_colors(*src, color, mode.compose),
            Self::Matrix(m) => {
                let input = [
                    f32::from(color.r) / 255.0,
                    f32::from(color.g) / 255.0,
                    f32::from(color.b) / 255.0,
                    f32::from(color.a) / 255.0,
                ];
                let mut out = [0_u8; 4];
                for (row, channel) in out.iter_mut().enumerate() {
                    let r = &m[row * 5..row * 5 + 5];
                    let v = r[0] * input[0] + r[1] * input[1] + r[2] * input[2] + r[3] * input[3]
                        + r[4];
                    *channel = to_u8(v);
                }
                Color::rgba8(out[0], out[1], out[2], out[3])
            }
            Self::SrgbToLinearGamma => map_rgb(color, |c| {
                if c <= 0.04045 {
                    c / 12.92
                } else {
                    ((c + 0.055) / 1.055).powf(2.4)
                }
            }),
            Self::LinearToSrgbGamma => map_rgb(color, |c| {
                if c <= 0.003_130_8 {
                    c * 12.92
                } else {
                    1.055 * c.powf(1.0 / 2.4) - 0.055
                }
            }),
        }
    }

    fn is_identity(&self) -> bool {
        match self {
            Self::Blend { color, mode } => match mode.compose {
                Compose::Dest => true,
                Compose::SrcOver | Compose::SrcAtop | Compose::DestOver | Compose::Plus => {
                    color.a == 0
                }
                _ => false,
            },
            Self::Matrix(m) => *m == Self::IDENTITY_MATRIX,
            Self::SrgbToLinearGamma | Self::LinearToSrgbGamma => false,
        }
    }
}

fn blend_keeps_source_over_transparent(compose: Compose) -> bool {
    matches!(
        compose,
        Compose::Copy
            | Compose::SrcOver
            | Compose::DestOver
            | Compose::SrcOut
            | Compose::Xor
            | Compose::Plus
            | Compose::PlusLighter
    )
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn map_rgb(color: Color, f: impl Fn(f32) -> f32) -> Color {
    let c = |v: u8| to_u8(f(f32::from(v) / 255.0));
    Color::rgba8(c(color.r), c(color.g), c(color.b), color.a)
}

/// Porter-Duff compositing of two unpremultiplied colors.
fn blend_colors(src: Color, dst: Color, compose: Compose) -> Color {
    let premul = |c: Color| {
        let a = f32::from(c.a) / 255.0;
        [
            f32::from(c.r) / 255.0 * a,
            f32::from(c.g) / 255.0 * a,
            f32::from(c.b) / 255.0 * a,
            a,
        ]
    };
    let s = premul(src);
    let d = premul(dst);
    let (sa, da) = (s[3], d[3]);
    let (fs, fd) = match compose {
        Compose::Clear => (0.0, 0.0),
        Compose::Copy => (1.0, 0.0),
        Compose::Dest => (0.0, 1.0),
        Compose::SrcOver => (1.0, 1.0 - sa),
        Compose::DestOver => (1.0 - da, 1.0),
        Compose::SrcIn => (da, 0.0),
        Compose::DestIn => (0.0, sa),
        Compose::SrcOut => (1.0 - da, 0.0),
        Compose::DestOut => (0.0, 1.0 - sa),
        Compose::SrcAtop => (da, 1.0 - sa),
        Compose::DestAtop => (1.0 - da, sa),
        Compose::Xor => (1.0 - da, 1.0 - sa),
        Compose::Plus | Compose::PlusLighter => (1.0, 1.0),
    };
    let mut out = [0.0_f32; 4];
    for i in 0..4 {
        out[i] = (s[i] * fs + d[i] * fd).min(1.0);
    }
    let a = out[3];
    if a <= 0.0 {
        return Color::TRANSPARENT;
    }
    Color::rgba8(
        to_u8(out[0] / a),
        to_u8(out[1] / a),
        to_u8(out[2] / a),
        to_u8(a),
    )
}

#[cfg(test)]
mod tests {
    use super::ColorFilter;
    use crate::peniko::{BlendMode, Color, Compose, Mix};

    fn blend(color: Color, compose: Compose) -> ColorFilter {
        ColorFilter::Blend {
            color,
            mode: BlendMode::new(Mix::Normal, compose),
        }
    }

    #[test]
    fn blend_transparent_black() {
        let red = Color::rgba8(255, 0, 0, 255);
        assert!(blend(red, Compose::SrcOver).modifies_transparent_black());
        assert!(blend(red, Compose::Copy).modifies_transparent_black());
        assert!(!blend(red, Compose::SrcIn).modifies_transparent_black());
        assert!(!blend(red, Compose::DestIn).modifies_transparent_black());
        assert!(!blend(Color::TRANSPARENT, Compose::SrcOver).modifies_transparent_black());

        // Cross-check the table against the blend math.
        for compose in [Compose::SrcOver, Compose::SrcIn, Compose::Xor, Compose::DestOut] {
            let filter = blend(red, compose);
            let filtered = filter.filter_color(Color::TRANSPARENT);
            assert_eq!(
                filter.modifies_transparent_black(),
                filtered.a != 0,
                "{compose:?}"
            );
        }
    }

    #[test]
    fn blend_identity_is_elided() {
        let mode = BlendMode::new(Mix::Normal, Compose::Dest);
        assert!(ColorFilter::blend(Color::rgba8(255, 0, 0, 255), mode).is_none());
        let mode = BlendMode::new(Mix::Normal, Compose::SrcOver);
        assert!(ColorFilter::blend(Color::TRANSPARENT, mode).is_none());
        assert!(ColorFilter::blend(Color::rgba8(255, 0, 0, 255), mode).is_some());
    }

    #[test]
    fn matrix_offsets() {
        let identity = ColorFilter::matrix(ColorFilter::IDENTITY_MATRIX);
        assert!(!identity.modifies_transparent_black());
        assert!(identity.can_commute_with_opacity());

        let mut m = ColorFilter::IDENTITY_MATRIX;
        m[19] = 1.0;
        let opaque = ColorFilter::matrix(m);
        assert!(opaque.modifies_transparent_black());
        assert!(!opaque.can_commute_with_opacity());
        assert_eq!(opaque.filter_color(Color::TRANSPARENT).a, 255);

        let mut m = ColorFilter::IDENTITY_MATRIX;
        m[3] = 0.5;
        assert!(!ColorFilter::matrix(m).can_commute_with_opacity());
    }
}
