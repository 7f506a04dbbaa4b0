// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversions from display list values to tiny-skia values.

use tiny_skia::{
    FillRule, FilterQuality, GradientStop, LineCap, LineJoin, LinearGradient, Path, PathBuilder,
    Pattern, PixmapRef, RadialGradient, Shader, SpreadMode, Stroke, StrokeDash, Transform,
};
use vello_display_list::kurbo::{Affine, BezPath, Cap, Join, PathEl};
use vello_display_list::peniko::{BlendMode, Color, Compose, Mix};
use vello_display_list::{
    Blender, ColorSource, DlImage, FilterMode, ImageSampling, PaintAttributes, PathEffect,
    TileMode,
};

pub(crate) fn transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

pub(crate) fn color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Converts a path, returning `None` for paths without area or length.
pub(crate) fn path(path: &BezPath) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(p1, p2) => {
                builder.quad_to(p1.x as f32, p1.y as f32, p2.x as f32, p2.y as f32);
            }
            PathEl::CurveTo(p1, p2, p3) => builder.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

pub(crate) fn blend_mode(mode: BlendMode) -> tiny_skia::BlendMode {
    use tiny_skia::BlendMode as Sk;
    if mode.compose != Compose::SrcOver {
        return match mode.compose {
            Compose::Clear => Sk::Clear,
            Compose::Copy => Sk::Source,
            Compose::Dest => Sk::Destination,
            Compose::SrcOver => Sk::SourceOver,
            Compose::DestOver => Sk::DestinationOver,
            Compose::SrcIn => Sk::SourceIn,
            Compose::DestIn => Sk::DestinationIn,
            Compose::SrcOut => Sk::SourceOut,
            Compose::DestOut => Sk::DestinationOut,
            Compose::SrcAtop => Sk::SourceAtop,
            Compose::DestAtop => Sk::DestinationAtop,
            Compose::Xor => Sk::Xor,
            Compose::Plus | Compose::PlusLighter => Sk::Plus,
        };
    }
    match mode.mix {
        Mix::Normal | Mix::Clip => Sk::SourceOver,
        Mix::Multiply => Sk::Multiply,
        Mix::Screen => Sk::Screen,
        Mix::Overlay => Sk::Overlay,
        Mix::Darken => Sk::Darken,
        Mix::Lighten => Sk::Lighten,
        Mix::ColorDodge => Sk::ColorDodge,
        Mix::ColorBurn => Sk::ColorBurn,
        Mix::HardLight => Sk::HardLight,
        Mix::SoftLight => Sk::SoftLight,
        Mix::Difference => Sk::Difference,
        Mix::Exclusion => Sk::Exclusion,
        Mix::Hue => Sk::Hue,
        Mix::Saturation => Sk::Saturation,
        Mix::Color => Sk::Color,
        Mix::Luminosity => Sk::Luminosity,
    }
}

/// The blend mode of the attributes, letting a blender take precedence.
pub(crate) fn effective_blend(attributes: &PaintAttributes) -> tiny_skia::BlendMode {
    match attributes.blender.as_deref() {
        Some(Blender::Mode(mode)) => blend_mode(*mode),
        Some(Blender::Arithmetic { .. }) => {
            log::warn!("arithmetic blenders are not supported, using the blend mode");
            blend_mode(attributes.blend_mode)
        }
        None => blend_mode(attributes.blend_mode),
    }
}

pub(crate) fn spread_mode(mode: TileMode) -> SpreadMode {
    match mode {
        TileMode::Clamp => SpreadMode::Pad,
        TileMode::Repeat => SpreadMode::Repeat,
        TileMode::Mirror => SpreadMode::Reflect,
        TileMode::Decal => {
            log::debug!("decal tiling is drawn as clamp");
            SpreadMode::Pad
        }
    }
}

pub(crate) fn quality(sampling: ImageSampling) -> FilterQuality {
    match sampling {
        ImageSampling::NearestNeighbor => FilterQuality::Nearest,
        ImageSampling::Linear | ImageSampling::MipmapLinear => FilterQuality::Bilinear,
        ImageSampling::Cubic => FilterQuality::Bicubic,
    }
}

pub(crate) fn filter_quality(filter: FilterMode) -> FilterQuality {
    match filter {
        FilterMode::Nearest => FilterQuality::Nearest,
        FilterMode::Linear => FilterQuality::Bilinear,
    }
}

pub(crate) fn image(image: &DlImage) -> Option<PixmapRef<'_>> {
    PixmapRef::from_bytes(image.pixels(), image.width(), image.height())
}

/// Builds the shader for the color or color source of `attributes`.
///
/// Gradient stops and image patterns take the alpha of the color.
pub(crate) fn shader(attributes: &PaintAttributes) -> Shader<'_> {
    let alpha = f32::from(attributes.color.a) / 255.0;
    let Some(source) = attributes.color_source.as_deref() else {
        return Shader::SolidColor(color(attributes.color));
    };
    let stops = |stops: &[vello_display_list::GradientStop]| -> Vec<GradientStop> {
        stops
            .iter()
            .map(|stop| GradientStop::new(stop.offset, color(stop.color.with_alpha_factor(alpha))))
            .collect()
    };
    let shader = match source {
        ColorSource::LinearGradient {
            start,
            end,
            stops: gradient,
            tile_mode,
            matrix,
        } => LinearGradient::new(
            tiny_skia::Point::from_xy(start.x as f32, start.y as f32),
            tiny_skia::Point::from_xy(end.x as f32, end.y as f32),
            stops(gradient),
            spread_mode(*tile_mode),
            transform(matrix.unwrap_or(Affine::IDENTITY)),
        ),
        ColorSource::RadialGradient {
            center,
            radius,
            stops: gradient,
            tile_mode,
            matrix,
        } => {
            let center = tiny_skia::Point::from_xy(center.x as f32, center.y as f32);
            RadialGradient::new(
                center,
                center,
                *radius as f32,
                stops(gradient),
                spread_mode(*tile_mode),
                transform(matrix.unwrap_or(Affine::IDENTITY)),
            )
        }
        ColorSource::Image {
            image: source,
            horizontal_tile_mode,
            vertical_tile_mode,
            sampling,
            matrix,
        } => {
            if horizontal_tile_mode != vertical_tile_mode {
                log::warn!("per axis image tiling is not supported, using the horizontal mode");
            }
            image(source).map(|pixmap| {
                Pattern::new(
                    pixmap,
                    spread_mode(*horizontal_tile_mode),
                    quality(*sampling),
                    alpha,
                    transform(matrix.unwrap_or(Affine::IDENTITY)),
                )
            })
        }
    };
    // Degenerate gradients paint with their last color.
    shader.unwrap_or_else(|| Shader::SolidColor(color(attributes.color)))
}

/// The stroke parameters of `attributes`.
pub(crate) fn stroke(attributes: &PaintAttributes) -> Stroke {
    let dash = match attributes.path_effect.as_deref() {
        Some(PathEffect::Dash(dash)) => {
            StrokeDash::new(dash.intervals().to_vec(), dash.phase())
        }
        Some(PathEffect::Discrete(_)) => {
            log::warn!("discrete path effects are not supported, stroking the plain outline");
            None
        }
        None => None,
    };
    Stroke {
        width: attributes.stroke_width.max(0.0),
        miter_limit: attributes.stroke_miter,
        line_cap: match attributes.stroke_cap {
            Cap::Butt => LineCap::Butt,
            Cap::Round => LineCap::Round,
            Cap::Square => LineCap::Square,
        },
        line_join: match attributes.stroke_join {
            Join::Bevel => LineJoin::Bevel,
            Join::Miter => LineJoin::Miter,
            Join::Round => LineJoin::Round,
        },
        dash,
    }
}

pub(crate) const FILL_RULE: FillRule = FillRule::Winding;

#[cfg(test)]
mod tests {
    use super::{blend_mode, path, transform};
    use vello_display_list::kurbo::{Affine, BezPath, Point};
    use vello_display_list::peniko::{BlendMode, Compose, Mix};

    #[test]
    fn transform_keeps_coefficient_order() {
        let affine = Affine::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = transform(affine);
        assert_eq!((t.sx, t.ky, t.kx, t.sy, t.tx, t.ty), (1.0, 2.0, 3.0, 4.0, 5.0, 6.0));
    }

    #[test]
    fn compose_takes_precedence_over_mix() {
        assert_eq!(
            blend_mode(BlendMode::new(Mix::Multiply, Compose::SrcOver)),
            tiny_skia::BlendMode::Multiply
        );
        assert_eq!(
            blend_mode(BlendMode::new(Mix::Normal, Compose::Copy)),
            tiny_skia::BlendMode::Source
        );
    }

    #[test]
    fn empty_path_converts_to_none() {
        assert!(path(&BezPath::new()).is_none());
        let mut triangle = BezPath::new();
        triangle.move_to(Point::new(0.0, 0.0));
        triangle.line_to(Point::new(10.0, 0.0));
        triangle.line_to(Point::new(0.0, 10.0));
        triangle.close_path();
        let converted = path(&triangle).unwrap();
        assert_eq!(converted.bounds().right(), 10.0);
    }
}
