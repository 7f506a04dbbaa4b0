// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Color and image filters applied to whole pixmaps.

use tiny_skia::{Pixmap, PixmapPaint};
use vello_display_list::kurbo::Affine;
use vello_display_list::peniko::Color;
use vello_display_list::{ColorFilter, ImageFilter};

use crate::convert;

fn unpremultiply(px: &[u8]) -> Color {
    let a = px[3];
    if a == 0 {
        return Color::TRANSPARENT;
    }
    let c = |v: u8| ((u16::from(v) * 255 + u16::from(a) / 2) / u16::from(a)).min(255) as u8;
    Color::rgba8(c(px[0]), c(px[1]), c(px[2]), a)
}

fn premultiply(color: Color, px: &mut [u8]) {
    let a = u16::from(color.a);
    let c = |v: u8| ((u16::from(v) * a + 127) / 255) as u8;
    px[0] = c(color.r);
    px[1] = c(color.g);
    px[2] = c(color.b);
    px[3] = color.a;
}

/// Applies `filter` to every pixel, including transparent ones.
pub(crate) fn apply_color_filter(pixmap: &mut Pixmap, filter: &ColorFilter) {
    for px in pixmap.data_mut().chunks_exact_mut(4) {
        let filtered = filter.filter_color(unpremultiply(px));
        premultiply(filtered, px);
    }
}

pub(crate) fn invert_colors(pixmap: &mut Pixmap) {
    for px in pixmap.data_mut().chunks_exact_mut(4) {
        let c = unpremultiply(px);
        premultiply(Color::rgba8(255 - c.r, 255 - c.g, 255 - c.b, c.a), px);
    }
}

/// A kernel radius along each axis, and the part of it that can reach a pixel.
///
/// No pixel is further than the pixmap size from another, so taps beyond it
/// only ever sample transparent black.
#[derive(Copy, Clone, Debug)]
struct Radius {
    full: usize,
    taps: usize,
}

fn radii(pixmap: &Pixmap, (rx, ry): (i32, i32)) -> [(Radius, bool); 2] {
    let radius = |r: i32, len: u32| {
        let full = usize::try_from(r).unwrap_or(0);
        Radius {
            full,
            taps: full.min(len as usize),
        }
    };
    [
        (radius(rx, pixmap.width()), false),
        (radius(ry, pixmap.height()), true),
    ]
}

/// Applies `filter` to content rendered under `ctm`.
pub(crate) fn apply_image_filter(pixmap: Pixmap, filter: &ImageFilter, ctm: &Affine) -> Pixmap {
    match filter {
        ImageFilter::Blur(blur) => {
            let radii = radii(&pixmap, blur.device_radius(ctm));
            gaussian_blur(pixmap, radii)
        }
        ImageFilter::Matrix(matrix) => {
            let det = ctm.determinant();
            if !det.is_finite() || det == 0.0 {
                log::warn!("matrix filter under a singular transform, skipping");
                return pixmap;
            }
            let device = *ctm * matrix.matrix() * ctm.inverse();
            transform_pixmap(&pixmap, device, convert::quality(matrix.sampling()))
                .unwrap_or(pixmap)
        }
        ImageFilter::Compose(compose) => {
            let inner = match compose.inner() {
                Some(inner) => apply_image_filter(pixmap, inner, ctm),
                None => pixmap,
            };
            match compose.outer() {
                Some(outer) => apply_image_filter(inner, outer, ctm),
                None => inner,
            }
        }
        ImageFilter::ColorFilter(color) => {
            let mut pixmap = pixmap;
            apply_color_filter(&mut pixmap, color.color_filter());
            pixmap
        }
        ImageFilter::LocalMatrix(local) => match local.filter() {
            Some(filter) => apply_image_filter(pixmap, filter, &(*ctm * local.matrix())),
            None => pixmap,
        },
        ImageFilter::Dilate(dilate) => {
            let radii = radii(&pixmap, dilate.device_radius(ctm));
            morphology(pixmap, radii, u8::max)
        }
        ImageFilter::Erode(erode) => {
            let radii = radii(&pixmap, erode.device_radius(ctm));
            morphology(pixmap, radii, u8::min)
        }
        ImageFilter::Unknown(_) => {
            log::warn!("backend image filters are not supported, skipping");
            pixmap
        }
    }
}

fn transform_pixmap(
    pixmap: &Pixmap,
    matrix: Affine,
    quality: tiny_skia::FilterQuality,
) -> Option<Pixmap> {
    let mut out = Pixmap::new(pixmap.width(), pixmap.height())?;
    let paint = PixmapPaint {
        quality,
        ..PixmapPaint::default()
    };
    out.draw_pixmap(
        0,
        0,
        pixmap.as_ref(),
        &paint,
        convert::transform(matrix),
        None,
    );
    Some(out)
}

fn gaussian_kernel(radius: Radius) -> Vec<f32> {
    // The radius covers three standard deviations.
    let sigma = radius.full as f32 / 3.0;
    let taps = radius.taps as f32;
    let mut kernel: Vec<f32> = (0..=2 * radius.taps)
        .map(|i| {
            let x = i as f32 - taps;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    // A truncated kernel keeps the weights of the full one.
    let sum = if radius.taps < radius.full {
        sigma * (2.0 * std::f32::consts::PI).sqrt()
    } else {
        kernel.iter().sum()
    };
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Runs `pass` along rows, or along columns when `vertical` is set.
fn separable(
    pixmap: &mut Pixmap,
    radius: usize,
    vertical: bool,
    mut pass: impl FnMut(&[[u8; 4]]) -> Vec<[u8; 4]>,
) {
    if radius == 0 {
        return;
    }
    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let (lines, len) = if vertical { (width, height) } else { (height, width) };
    let index = |line: usize, i: usize| {
        if vertical {
            (i * width + line) * 4
        } else {
            (line * width + i) * 4
        }
    };
    let data = pixmap.data_mut();
    let mut buffer = Vec::with_capacity(len);
    for line in 0..lines {
        buffer.clear();
        for i in 0..len {
            let at = index(line, i);
            buffer.push([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        }
        for (i, px) in pass(&buffer).into_iter().enumerate() {
            let at = index(line, i);
            data[at..at + 4].copy_from_slice(&px);
        }
    }
}

fn gaussian_blur(mut pixmap: Pixmap, radii: [(Radius, bool); 2]) -> Pixmap {
    for (radius, vertical) in radii {
        let kernel = gaussian_kernel(radius);
        let reach = radius.taps;
        separable(&mut pixmap, reach, vertical, |line| {
            (0..line.len())
                .map(|center| {
                    let mut acc = [0.0_f32; 4];
                    for (k, weight) in kernel.iter().enumerate() {
                        // Pixels outside of the pixmap are transparent.
                        let Some(px) = (center + k)
                            .checked_sub(reach)
                            .and_then(|i| line.get(i))
                        else {
                            continue;
                        };
                        for c in 0..4 {
                            acc[c] += f32::from(px[c]) * weight;
                        }
                    }
                    acc.map(|v| v.round().clamp(0.0, 255.0) as u8)
                })
                .collect()
        });
    }
    pixmap
}

fn morphology(mut pixmap: Pixmap, radii: [(Radius, bool); 2], pick: fn(u8, u8) -> u8) -> Pixmap {
    for (radius, vertical) in radii {
        let reach = radius.taps;
        separable(&mut pixmap, reach, vertical, |line| {
            (0..line.len())
                .map(|center| {
                    let start = center.saturating_sub(reach);
                    let end = center.saturating_add(reach).saturating_add(1).min(line.len());
                    let mut out = line[center];
                    for px in &line[start..end] {
                        for c in 0..4 {
                            out[c] = pick(out[c], px[c]);
                        }
                    }
                    // Outside of the pixmap is transparent, which erosion reaches.
                    let clipped = center < reach || center.saturating_add(reach) >= line.len();
                    if clipped && pick(0, 1) == 0 {
                        out = [0; 4];
                    }
                    out
                })
                .collect()
        });
    }
    pixmap
}

#[cfg(test)]
mod tests {
    use tiny_skia::Pixmap;
    use vello_display_list::kurbo::Affine;
    use vello_display_list::peniko::Color;
    use vello_display_list::{ColorFilter, ImageFilter, TileMode};

    use super::{apply_color_filter, apply_image_filter, gaussian_kernel, Radius};

    fn dot(size: u32, x: u32, y: u32) -> Pixmap {
        let mut pixmap = Pixmap::new(size, size).unwrap();
        let at = ((y * size + x) * 4) as usize;
        pixmap.data_mut()[at..at + 4].copy_from_slice(&[255, 255, 255, 255]);
        pixmap
    }

    fn alpha(pixmap: &Pixmap, x: u32, y: u32) -> u8 {
        pixmap.pixel(x, y).unwrap().alpha()
    }

    #[test]
    fn kernel_is_normalized() {
        let kernel = gaussian_kernel(Radius { full: 6, taps: 6 });
        assert_eq!(kernel.len(), 13);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(kernel[6] > kernel[5]);
    }

    #[test]
    fn truncated_kernel_keeps_full_weights() {
        let kernel = gaussian_kernel(Radius { full: 300, taps: 4 });
        assert_eq!(kernel.len(), 9);
        let sum: f32 = kernel.iter().sum();
        assert!(sum > 0.0 && sum < 0.1);
    }

    #[test]
    fn huge_blur_fades_content_without_overflow() {
        let filter = ImageFilter::blur(1e30, 1e30, TileMode::Decal).unwrap();
        let blurred = apply_image_filter(dot(4, 1, 1), &filter, &Affine::IDENTITY);
        assert_eq!((blurred.width(), blurred.height()), (4, 4));
        assert_eq!(alpha(&blurred, 1, 1), 0);
    }

    #[test]
    fn huge_morphology_radii_cover_the_pixmap() {
        let huge = Affine::scale(1e20);
        let grown = apply_image_filter(dot(4, 1, 1), &ImageFilter::dilate(1e30, 1e30), &huge);
        assert_eq!(alpha(&grown, 3, 3), 255);
        assert_eq!(alpha(&grown, 0, 0), 255);
        let shrunk = apply_image_filter(grown, &ImageFilter::erode(1e30, 1e30), &Affine::IDENTITY);
        assert_eq!(alpha(&shrunk, 1, 1), 0);
    }

    #[test]
    fn blur_spreads_within_three_sigma() {
        let filter = ImageFilter::blur(1.0, 1.0, TileMode::Decal).unwrap();
        let blurred = apply_image_filter(dot(16, 8, 8), &filter, &Affine::IDENTITY);
        assert!(alpha(&blurred, 8, 8) < 255);
        assert!(alpha(&blurred, 9, 8) > 0);
        assert_eq!(alpha(&blurred, 12, 8), 0);
    }

    #[test]
    fn dilate_and_erode_are_opposites() {
        let grown = apply_image_filter(
            dot(9, 4, 4),
            &ImageFilter::dilate(1.0, 1.0),
            &Affine::IDENTITY,
        );
        assert_eq!(alpha(&grown, 3, 3), 255);
        assert_eq!(alpha(&grown, 2, 4), 0);
        let shrunk = apply_image_filter(grown, &ImageFilter::erode(1.0, 1.0), &Affine::IDENTITY);
        assert_eq!(alpha(&shrunk, 4, 4), 255);
        assert_eq!(alpha(&shrunk, 3, 3), 0);
    }

    #[test]
    fn matrix_filter_moves_content() {
        let shift = ImageFilter::matrix(
            Affine::translate((2.0, 0.0)),
            vello_display_list::ImageSampling::NearestNeighbor,
        );
        let moved = apply_image_filter(dot(8, 1, 1), &shift, &Affine::IDENTITY);
        assert_eq!(alpha(&moved, 3, 1), 255);
        assert_eq!(alpha(&moved, 1, 1), 0);
    }

    #[test]
    fn flooding_color_filter_fills_transparent_pixels() {
        let mut pixmap = Pixmap::new(2, 2).unwrap();
        let filter = ColorFilter::blend(
            Color::rgba8(0, 0, 255, 255),
            vello_display_list::peniko::BlendMode::new(
                vello_display_list::peniko::Mix::Normal,
                vello_display_list::peniko::Compose::SrcOver,
            ),
        )
        .unwrap();
        apply_color_filter(&mut pixmap, &filter);
        let px = pixmap.pixel(1, 1).unwrap();
        assert_eq!((px.blue(), px.alpha()), (255, 255));
    }
}
