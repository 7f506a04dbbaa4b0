// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Comparing rendered pixmaps.

use tiny_skia::Pixmap;
use vello_display_list::IRect;

use crate::Error;

/// How far two renderings may differ and still be considered the same.
///
/// The tolerance is explicit configuration: it is never derived from the
/// pixel format of the surfaces being compared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelTolerance {
    /// The largest accepted difference in any channel of a pixel.
    pub max_channel_delta: u8,
    /// The number of pixels allowed to exceed `max_channel_delta`.
    pub max_differing_pixels: usize,
}

impl PixelTolerance {
    /// Pixel identical output.
    pub const EXACT: Self = Self {
        max_channel_delta: 0,
        max_differing_pixels: 0,
    };

    /// Allows the rounding differences of 8-bit blending.
    pub const BLENDING: Self = Self {
        max_channel_delta: 2,
        max_differing_pixels: 0,
    };
}

impl Default for PixelTolerance {
    fn default() -> Self {
        Self::BLENDING
    }
}

/// The result of comparing two pixmaps.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelDiff {
    /// The largest difference in any channel.
    pub max_channel_delta: u8,
    /// Pixels whose difference exceeds the tolerance used for the comparison.
    pub differing_pixels: usize,
    /// The first pixel exceeding the tolerance, in row major order.
    pub first_difference: Option<(u32, u32)>,
}

impl PixelDiff {
    /// Whether the difference is within `tolerance`.
    pub fn is_within(&self, tolerance: PixelTolerance) -> bool {
        self.differing_pixels <= tolerance.max_differing_pixels
    }
}

/// Compares two pixmaps of the same size.
pub fn compare(a: &Pixmap, b: &Pixmap, tolerance: PixelTolerance) -> Result<PixelDiff, Error> {
    if (a.width(), a.height()) != (b.width(), b.height()) {
        return Err(Error::SizeMismatch {
            expected: (a.width(), a.height()),
            actual: (b.width(), b.height()),
        });
    }
    let mut diff = PixelDiff::default();
    let width = a.width() as usize;
    for (i, (pa, pb)) in a
        .data()
        .chunks_exact(4)
        .zip(b.data().chunks_exact(4))
        .enumerate()
    {
        let delta = pa
            .iter()
            .zip(pb)
            .map(|(x, y)| x.abs_diff(*y))
            .max()
            .unwrap_or(0);
        diff.max_channel_delta = diff.max_channel_delta.max(delta);
        if delta > tolerance.max_channel_delta {
            diff.differing_pixels += 1;
            if diff.first_difference.is_none() {
                diff.first_difference = Some(((i % width) as u32, (i / width) as u32));
            }
        }
    }
    if !diff.is_within(tolerance) {
        log::debug!("pixmaps differ: {diff:?}");
    }
    Ok(diff)
}

/// The bounds of the pixels that differ from `background`, if any.
pub fn touched_bounds(pixmap: &Pixmap, background: tiny_skia::Color) -> Option<IRect> {
    let background = background.premultiply().to_color_u8();
    let expected = [
        background.red(),
        background.green(),
        background.blue(),
        background.alpha(),
    ];
    let width = pixmap.width() as usize;
    let mut bounds: Option<IRect> = None;
    for (i, px) in pixmap.data().chunks_exact(4).enumerate() {
        if px == expected {
            continue;
        }
        let x = (i % width) as i32;
        let y = (i / width) as i32;
        let pixel = IRect::new(x, y, x + 1, y + 1);
        bounds = Some(bounds.map_or(pixel, |b| b.union(pixel)));
    }
    bounds
}
