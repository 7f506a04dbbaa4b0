// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording and playback of 2D drawing operations.
//!
//! A [`DisplayListBuilder`] records drawing calls into an immutable
//! [`DisplayList`], tracking on the way everything a compositor wants to know
//! without rendering: the bounds of the content, whether a group opacity can
//! be applied by scaling the alpha of each operation, and per operation
//! bounds for culling. A recorded list replays onto any [`Dispatcher`],
//! including another builder.
//!
//! Image filters form a DAG of shared, immutable nodes (see [`ImageFilter`]).
//! Each node answers bounds queries: where its output lands for given input
//! bounds, and which input it needs to produce a given output.
//!
//! ```
//! use vello_display_list::kurbo::Rect;
//! use vello_display_list::peniko::Color;
//! use vello_display_list::{Dispatcher, DisplayListBuilder};
//!
//! let mut builder = DisplayListBuilder::new();
//! builder.set_color(Color::rgba8(0, 0, 255, 255));
//! builder.draw_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
//! let list = builder.build();
//! assert_eq!(list.bounds(), Rect::new(10.0, 10.0, 20.0, 20.0));
//! assert!(list.can_apply_group_opacity());
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
    clippy::float_cmp,
    clippy::exhaustive_enums,
    reason = "Deferred"
)]

pub mod attributes;
mod builder;
mod canvas;
pub mod color_filter;
mod dispatch;
mod display_list;
pub mod flags;
pub mod geometry;
pub mod image_filter;
mod multiplexer;
mod op;
pub mod shared;

pub use peniko;
pub use peniko::kurbo;

pub use attributes::{
    BlurStyle, Blender, ColorSource, DrawStyle, GradientStop, MaskFilter, PaintAttributes,
    PathEffect,
};
pub use builder::{BuilderOptions, DisplayListBuilder};
pub use canvas::{Canvas, CanvasRecorder, Paint};
pub use color_filter::ColorFilter;
pub use dispatch::Dispatcher;
pub use display_list::DisplayList;
pub use geometry::{
    ClipOp, DlImage, FilterMode, IRect, ImageSampling, PointMode, RSTransform, SrcRectConstraint,
    TextBlob, TileMode, VertexMode, Vertices,
};
pub use image_filter::{BackendImageFilter, ImageFilter, ImageFilterBounds, Unbounded};
pub use multiplexer::BuilderMultiplexer;
pub use op::{DlOp, Matrix4, RecordedOp, SaveLayerOptions};

use thiserror::Error;

/// Errors that can occur while recording or replaying a display list.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A `restore` had no matching `save`.
    #[error("restore without a matching save")]
    UnbalancedRestore,
    /// The list was finished with saves still open.
    #[error("{depth} saves without a matching restore")]
    UnbalancedSave {
        /// The number of open saves.
        depth: usize,
    },
    /// The canvas recorder already produced its list.
    #[error("the canvas recorder has already finished")]
    RecorderFinished,
    /// The list can't absorb a group opacity without an intermediate layer.
    #[error("the display list can't be rendered with a group opacity")]
    GroupOpacityIncompatible,
    /// The group opacity is outside of `[0, 1]`.
    #[error("group opacity {0} is outside of [0, 1]")]
    InvalidGroupOpacity(f32),
}

static_assertions::assert_impl_all!(ImageFilter: Send, Sync);
static_assertions::assert_impl_all!(DisplayListBuilder: Send);
