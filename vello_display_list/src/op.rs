// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recorded operations.

use std::sync::Arc;

use crate::attributes::PaintAttributes;
use crate::display_list::DisplayList;
use crate::flags::{line_flags, points_flags, AttributeFlags};
use crate::geometry::{
    ClipOp, DlImage, FilterMode, IRect, ImageSampling, PointMode, RSTransform, SrcRectConstraint,
    TextBlob, Vertices,
};
use crate::image_filter::ImageFilter;
use crate::kurbo::{Affine, BezPath, Point, Rect, RoundedRect};
use crate::peniko::{BlendMode, Color};

/// A row major 4x4 transform, as passed to `transform_full_perspective`.
pub type Matrix4 = [f64; 16];

/// Options of a `save_layer` operation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveLayerOptions {
    /// The layer is composited with the attributes current at `save_layer`.
    pub renders_with_attributes: bool,
    /// The content of the layer can absorb a group opacity on its own.
    ///
    /// Computed by the builder when the layer is restored.
    pub can_distribute_opacity: bool,
}

impl SaveLayerOptions {
    /// Options for a layer composited without attributes.
    pub const NO_ATTRIBUTES: Self = Self {
        renders_with_attributes: false,
        can_distribute_opacity: false,
    };

    /// Options for a layer composited with the current attributes.
    pub const WITH_ATTRIBUTES: Self = Self {
        renders_with_attributes: true,
        can_distribute_opacity: false,
    };
}

/// A single recorded operation.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs, reason = "Variant fields mirror the receiver methods.")]
pub enum DlOp {
    Save,
    SaveLayer {
        bounds: Option<Rect>,
        options: SaveLayerOptions,
        backdrop: Option<Arc<ImageFilter>>,
    },
    Restore,

    Translate {
        tx: f64,
        ty: f64,
    },
    Scale {
        sx: f64,
        sy: f64,
    },
    Rotate {
        degrees: f64,
    },
    Skew {
        sx: f64,
        sy: f64,
    },
    Transform(Affine),
    TransformFullPerspective(Matrix4),
    TransformReset,

    ClipRect {
        rect: Rect,
        op: ClipOp,
        anti_alias: bool,
    },
    ClipRRect {
        rrect: RoundedRect,
        op: ClipOp,
        anti_alias: bool,
    },
    ClipPath {
        path: BezPath,
        op: ClipOp,
        anti_alias: bool,
    },

    DrawPaint,
    DrawColor {
        color: Color,
        mode: BlendMode,
    },
    DrawLine {
        p0: Point,
        p1: Point,
    },
    DrawRect(Rect),
    DrawOval(Rect),
    DrawCircle {
        center: Point,
        radius: f64,
    },
    DrawRRect(RoundedRect),
    DrawDRRect {
        outer: RoundedRect,
        inner: RoundedRect,
    },
    DrawPath(BezPath),
    DrawArc {
        bounds: Rect,
        start_degrees: f64,
        sweep_degrees: f64,
        use_center: bool,
    },
    DrawPoints {
        mode: PointMode,
        points: Vec<Point>,
    },
    DrawVertices {
        vertices: Arc<Vertices>,
        mode: BlendMode,
    },
    DrawImage {
        image: DlImage,
        point: Point,
        sampling: ImageSampling,
        with_attributes: bool,
    },
    DrawImageRect {
        image: DlImage,
        src: Rect,
        dst: Rect,
        sampling: ImageSampling,
        with_attributes: bool,
        constraint: SrcRectConstraint,
    },
    DrawImageNine {
        image: DlImage,
        center: IRect,
        dst: Rect,
        filter: FilterMode,
        with_attributes: bool,
    },
    DrawAtlas {
        atlas: DlImage,
        xforms: Vec<RSTransform>,
        tex: Vec<Rect>,
        colors: Option<Vec<Color>>,
        mode: BlendMode,
        sampling: ImageSampling,
        cull_rect: Option<Rect>,
        with_attributes: bool,
    },
    DrawDisplayList {
        list: Arc<DisplayList>,
        opacity: f32,
    },
    DrawTextBlob {
        blob: Arc<TextBlob>,
        x: f64,
        y: f64,
    },
    DrawShadow {
        path: BezPath,
        color: Color,
        elevation: f64,
        transparent_occluder: bool,
        dpr: f64,
    },
}

impl DlOp {
    /// The attribute flags of a rendering operation.
    ///
    /// Returns `None` for operations that render nothing themselves: `save`,
    /// `restore`, transforms and clips.
    pub fn flags(&self) -> Option<AttributeFlags> {
        let flags = match self {
            Self::Save
            | Self::Restore
            | Self::Translate { .. }
            | Self::Scale { .. }
            | Self::Rotate { .. }
            | Self::Skew { .. }
            | Self::Transform(_)
            | Self::TransformFullPerspective(_)
            | Self::TransformReset
            | Self::ClipRect { .. }
            | Self::ClipRRect { .. }
            | Self::ClipPath { .. } => return None,
            Self::SaveLayer { options, .. } => {
                if options.renders_with_attributes {
                    AttributeFlags::SAVE_LAYER_WITH_PAINT
                } else {
                    AttributeFlags::SAVE_LAYER
                }
            }
            Self::DrawPaint => AttributeFlags::DRAW_PAINT,
            Self::DrawColor { .. } => AttributeFlags::DRAW_COLOR,
            Self::DrawLine { p0, p1 } => line_flags(*p0, *p1),
            Self::DrawRect(_) => AttributeFlags::DRAW_RECT,
            Self::DrawOval(_) => AttributeFlags::DRAW_OVAL,
            Self::DrawCircle { .. } => AttributeFlags::DRAW_CIRCLE,
            Self::DrawRRect(_) => AttributeFlags::DRAW_RRECT,
            Self::DrawDRRect { .. } => AttributeFlags::DRAW_DRRECT,
            Self::DrawPath(_) => AttributeFlags::DRAW_PATH,
            Self::DrawArc { use_center, .. } => {
                if *use_center {
                    AttributeFlags::DRAW_ARC_WITH_CENTER
                } else {
                    AttributeFlags::DRAW_ARC_NO_CENTER
                }
            }
            Self::DrawPoints { mode, .. } => points_flags(*mode),
            Self::DrawVertices { .. } => AttributeFlags::DRAW_VERTICES,
            Self::DrawImage {
                with_attributes, ..
            }
            | Self::DrawImageRect {
                with_attributes, ..
            } => {
                if *with_attributes {
                    AttributeFlags::DRAW_IMAGE_WITH_PAINT
                } else {
                    AttributeFlags::DRAW_IMAGE
                }
            }
            Self::DrawImageNine {
                with_attributes, ..
            } => {
                if *with_attributes {
                    AttributeFlags::DRAW_IMAGE_NINE_WITH_PAINT
                } else {
                    AttributeFlags::DRAW_IMAGE_NINE
                }
            }
            Self::DrawAtlas {
                with_attributes, ..
            } => {
                if *with_attributes {
                    AttributeFlags::DRAW_ATLAS_WITH_PAINT
                } else {
                    AttributeFlags::DRAW_ATLAS
                }
            }
            Self::DrawDisplayList { .. } => AttributeFlags::DRAW_DISPLAY_LIST,
            Self::DrawTextBlob { .. } => AttributeFlags::DRAW_TEXT_BLOB,
            Self::DrawShadow { .. } => AttributeFlags::DRAW_SHADOW,
        };
        Some(flags)
    }

    /// Whether the operation renders content, as opposed to changing state.
    pub fn is_draw(&self) -> bool {
        !matches!(self, Self::SaveLayer { .. }) && self.flags().is_some()
    }
}

/// An operation together with the state captured when it was recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedOp {
    /// The operation.
    pub op: DlOp,
    /// The relevant paint attributes, for operations that use any.
    ///
    /// Consecutive operations with equal relevant attributes share a snapshot.
    pub attributes: Option<Arc<PaintAttributes>>,
    /// The bounds of the operation in the coordinate space of the list.
    ///
    /// Present for rendering operations when the list was built with culling
    /// prepared, and absent for operations whose output is later moved by a
    /// layer image filter.
    pub bounds: Option<Rect>,
}
