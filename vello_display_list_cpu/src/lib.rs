// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A CPU backend for `vello_display_list`, drawing into [`tiny_skia`] pixmaps.
//!
//! [`CpuCanvas`] receives display list playback as well as direct
//! [`Canvas`](vello_display_list::Canvas) calls, which makes it a reference
//! for checking that a recorded list draws the same pixels as the calls it
//! was recorded from, and that nothing is drawn outside of its bounds.
//!
//! ```
//! use vello_display_list::kurbo::Rect;
//! use vello_display_list::peniko::Color;
//! use vello_display_list::{Dispatcher, DisplayListBuilder};
//! use vello_display_list_cpu::{touched_bounds, CpuCanvas, CpuCanvasOptions};
//!
//! let mut builder = DisplayListBuilder::new();
//! builder.set_color(Color::rgba8(255, 0, 0, 255));
//! builder.draw_rect(Rect::new(4.0, 4.0, 12.0, 8.0));
//! let list = builder.build();
//!
//! let mut canvas = CpuCanvas::new(CpuCanvasOptions::default())?;
//! canvas.render(&list, 1.0)?;
//! let pixmap = canvas.finish();
//! let touched = touched_bounds(&pixmap, vello_display_list_cpu::tiny_skia::Color::TRANSPARENT);
//! assert_eq!(touched.map(|r| r.to_rect()), Some(list.bounds()));
//! # Ok::<(), vello_display_list_cpu::Error>(())
//! ```

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::float_cmp,
    reason = "Pixel arithmetic converts between coordinate types."
)]

mod canvas;
mod compare;
mod convert;
mod filter;

pub use tiny_skia;
pub use vello_display_list;

pub use canvas::{CpuCanvas, CpuCanvasOptions};
pub use compare::{compare, touched_bounds, PixelDiff, PixelTolerance};

#[cfg(test)]
use anyhow as _;

use thiserror::Error;

/// Errors of the CPU backend.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A surface can't have the requested size.
    #[error("invalid surface size {width}x{height}")]
    InvalidSize {
        /// The requested width.
        width: u32,
        /// The requested height.
        height: u32,
    },
    /// Two pixmaps being compared have different sizes.
    #[error("pixmap size {actual:?} doesn't match {expected:?}")]
    SizeMismatch {
        /// The size of the first pixmap.
        expected: (u32, u32),
        /// The size of the second pixmap.
        actual: (u32, u32),
    },
    /// Playing back a display list failed.
    #[error(transparent)]
    DisplayList(#[from] vello_display_list::Error),
}

static_assertions::assert_impl_all!(CpuCanvas: Send);
