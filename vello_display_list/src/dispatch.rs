// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The receiving side of a replay.

use std::sync::Arc;

use crate::attributes::{Blender, ColorSource, DrawStyle, MaskFilter, PaintAttributes, PathEffect};
use crate::color_filter::ColorFilter;
use crate::display_list::DisplayList;
use crate::flags::AttributeFlags;
use crate::geometry::{
    rects_overlap, ClipOp, DlImage, FilterMode, IRect, ImageSampling, PointMode, RSTransform,
    SrcRectConstraint, TextBlob, Vertices,
};
use crate::image_filter::ImageFilter;
use crate::kurbo::{Affine, BezPath, Cap, Join, Point, Rect, RoundedRect};
use crate::op::{DlOp, Matrix4, RecordedOp, SaveLayerOptions};
use crate::peniko::{BlendMode, Color};
use crate::shared::equals;

/// A target for recorded operations.
///
/// There is one method per attribute setter and per recorded operation.
/// Implementations follow the same state rules as the builder: attribute
/// setters change the attributes used by subsequent operations, and
/// `restore` reverts the attributes, the transform and the clip to what they
/// were at the matching `save` or `save_layer`.
///
/// [`DisplayListBuilder`](crate::DisplayListBuilder) implements this trait, so
/// rendering a list into a builder records a copy of it.
#[allow(missing_docs, reason = "Each method mirrors a recorded operation.")]
pub trait Dispatcher {
    fn set_anti_alias(&mut self, anti_alias: bool);
    fn set_dither(&mut self, dither: bool);
    fn set_invert_colors(&mut self, invert: bool);
    fn set_color(&mut self, color: Color);
    fn set_style(&mut self, style: DrawStyle);
    fn set_stroke_width(&mut self, width: f32);
    fn set_stroke_miter(&mut self, limit: f32);
    fn set_stroke_cap(&mut self, cap: Cap);
    fn set_stroke_join(&mut self, join: Join);
    fn set_blend_mode(&mut self, mode: BlendMode);
    fn set_color_source(&mut self, source: Option<Arc<ColorSource>>);
    fn set_color_filter(&mut self, filter: Option<Arc<ColorFilter>>);
    fn set_image_filter(&mut self, filter: Option<Arc<ImageFilter>>);
    fn set_mask_filter(&mut self, filter: Option<Arc<MaskFilter>>);
    fn set_path_effect(&mut self, effect: Option<Arc<PathEffect>>);
    fn set_blender(&mut self, blender: Option<Arc<Blender>>);

    fn save(&mut self);
    fn save_layer(
        &mut self,
        bounds: Option<Rect>,
        options: SaveLayerOptions,
        backdrop: Option<Arc<ImageFilter>>,
    );
    fn restore(&mut self);

    fn translate(&mut self, tx: f64, ty: f64);
    fn scale(&mut self, sx: f64, sy: f64);
    fn rotate(&mut self, degrees: f64);
    fn skew(&mut self, sx: f64, sy: f64);
    fn transform(&mut self, matrix: Affine);
    fn transform_full_perspective(&mut self, matrix: &Matrix4);
    fn transform_reset(&mut self);

    fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool);
    fn clip_rrect(&mut self, rrect: RoundedRect, op: ClipOp, anti_alias: bool);
    fn clip_path(&mut self, path: &BezPath, op: ClipOp, anti_alias: bool);

    fn draw_paint(&mut self);
    fn draw_color(&mut self, color: Color, mode: BlendMode);
    fn draw_line(&mut self, p0: Point, p1: Point);
    fn draw_rect(&mut self, rect: Rect);
    fn draw_oval(&mut self, bounds: Rect);
    fn draw_circle(&mut self, center: Point, radius: f64);
    fn draw_rrect(&mut self, rrect: RoundedRect);
    fn draw_drrect(&mut self, outer: RoundedRect, inner: RoundedRect);
    fn draw_path(&mut self, path: &BezPath);
    fn draw_arc(&mut self, bounds: Rect, start_degrees: f64, sweep_degrees: f64, use_center: bool);
    fn draw_points(&mut self, mode: PointMode, points: &[Point]);
    fn draw_vertices(&mut self, vertices: &Arc<Vertices>, mode: BlendMode);
    fn draw_image(
        &mut self,
        image: &DlImage,
        point: Point,
        sampling: ImageSampling,
        with_attributes: bool,
    );
    fn draw_image_rect(
        &mut self,
        image: &DlImage,
        src: Rect,
        dst: Rect,
        sampling: ImageSampling,
        with_attributes: bool,
        constraint: SrcRectConstraint,
    );
    fn draw_image_nine(
        &mut self,
        image: &DlImage,
        center: IRect,
        dst: Rect,
        filter: FilterMode,
        with_attributes: bool,
    );
    #[allow(clippy::too_many_arguments, reason = "Mirrors the recorded operation.")]
    fn draw_atlas(
        &mut self,
        atlas: &DlImage,
        xforms: &[RSTransform],
        tex: &[Rect],
        colors: Option<&[Color]>,
        mode: BlendMode,
        sampling: ImageSampling,
        cull_rect: Option<Rect>,
        with_attributes: bool,
    );
    fn draw_display_list(&mut self, list: &Arc<DisplayList>, opacity: f32);
    fn draw_text_blob(&mut self, blob: &Arc<TextBlob>, x: f64, y: f64);
    fn draw_shadow(
        &mut self,
        path: &BezPath,
        color: Color,
        elevation: f64,
        transparent_occluder: bool,
        dpr: f64,
    );
}

// One bit per attribute, marking the attributes whose value at the receiver is known.
const ANTI_ALIAS: u32 = 1 << 0;
const DITHER: u32 = 1 << 1;
const INVERT_COLORS: u32 = 1 << 2;
const COLOR: u32 = 1 << 3;
const STYLE: u32 = 1 << 4;
const STROKE_WIDTH: u32 = 1 << 5;
const STROKE_MITER: u32 = 1 << 6;
const STROKE_CAP: u32 = 1 << 7;
const STROKE_JOIN: u32 = 1 << 8;
const BLEND_MODE: u32 = 1 << 9;
const COLOR_SOURCE: u32 = 1 << 10;
const COLOR_FILTER: u32 = 1 << 11;
const IMAGE_FILTER: u32 = 1 << 12;
const MASK_FILTER: u32 = 1 << 13;
const PATH_EFFECT: u32 = 1 << 14;
const BLENDER: u32 = 1 << 15;

/// Replays recorded operations onto a [`Dispatcher`].
///
/// The player tracks the attributes it has sent to the receiver and only
/// forwards the relevant attributes of each operation which differ from them.
/// Attributes that were never sent are assumed unknown, so the first
/// operation that needs one always forwards it.
pub(crate) struct Player<'a, D: Dispatcher + ?Sized> {
    receiver: &'a mut D,
    current: PaintAttributes,
    known: u32,
    opacity: f32,
    stack: Vec<(PaintAttributes, u32, f32)>,
    cull_rect: Option<Rect>,
}

impl<'a, D: Dispatcher + ?Sized> Player<'a, D> {
    pub(crate) fn new(receiver: &'a mut D, opacity: f32, cull_rect: Option<Rect>) -> Self {
        Self {
            receiver,
            current: PaintAttributes::default(),
            known: 0,
            opacity,
            stack: Vec::new(),
            cull_rect,
        }
    }

    pub(crate) fn play(&mut self, ops: &[RecordedOp]) {
        for recorded in ops {
            if self.is_culled(recorded) {
                log::trace!("culled {:?}", recorded.bounds);
                continue;
            }
            self.dispatch(recorded);
        }
    }

    fn is_culled(&self, recorded: &RecordedOp) -> bool {
        match (self.cull_rect, recorded.bounds) {
            (Some(cull), Some(bounds)) => recorded.op.is_draw() && !rects_overlap(cull, bounds),
            _ => false,
        }
    }

    /// Forwards the attributes `wanted` which are relevant to `flags`.
    fn sync(&mut self, wanted: &PaintAttributes, flags: AttributeFlags) {
        if flags.ignores_paint() {
            return;
        }
        let geometric = flags.is_geometric();
        let stroked = geometric && flags.is_stroked(wanted.style);
        if flags.applies_anti_alias()
            && self.needs(ANTI_ALIAS, |c| c.anti_alias == wanted.anti_alias)
        {
            self.receiver.set_anti_alias(wanted.anti_alias);
            self.current.anti_alias = wanted.anti_alias;
        }
        if flags.applies_dither() && self.needs(DITHER, |c| c.dither == wanted.dither) {
            self.receiver.set_dither(wanted.dither);
            self.current.dither = wanted.dither;
        }
        if flags.applies_color_filter() {
            if self.needs(INVERT_COLORS, |c| c.invert_colors == wanted.invert_colors) {
                self.receiver.set_invert_colors(wanted.invert_colors);
                self.current.invert_colors = wanted.invert_colors;
            }
            if self.needs(COLOR_FILTER, |c| {
                equals(c.color_filter.as_ref(), wanted.color_filter.as_ref())
            }) {
                self.receiver.set_color_filter(wanted.color_filter.clone());
                self.current.color_filter = wanted.color_filter.clone();
            }
        }
        if (flags.applies_color() || flags.applies_alpha())
            && self.needs(COLOR, |c| c.color == wanted.color)
        {
            self.receiver.set_color(wanted.color);
            self.current.color = wanted.color;
        }
        if flags.applies_blend() {
            if self.needs(BLEND_MODE, |c| c.blend_mode == wanted.blend_mode) {
                self.receiver.set_blend_mode(wanted.blend_mode);
                self.current.blend_mode = wanted.blend_mode;
            }
            if self.needs(BLENDER, |c| equals(c.blender.as_ref(), wanted.blender.as_ref())) {
                self.receiver.set_blender(wanted.blender.clone());
                self.current.blender = wanted.blender.clone();
            }
        }
        if flags.applies_shader()
            && self.needs(COLOR_SOURCE, |c| {
                equals(c.color_source.as_ref(), wanted.color_source.as_ref())
            })
        {
            self.receiver.set_color_source(wanted.color_source.clone());
            self.current.color_source = wanted.color_source.clone();
        }
        if flags.applies_image_filter()
            && self.needs(IMAGE_FILTER, |c| {
                equals(c.image_filter.as_ref(), wanted.image_filter.as_ref())
            })
        {
            self.receiver.set_image_filter(wanted.image_filter.clone());
            self.current.image_filter = wanted.image_filter.clone();
        }
        if flags.applies_mask_filter()
            && self.needs(MASK_FILTER, |c| {
                equals(c.mask_filter.as_ref(), wanted.mask_filter.as_ref())
            })
        {
            self.receiver.set_mask_filter(wanted.mask_filter.clone());
            self.current.mask_filter = wanted.mask_filter.clone();
        }
        if !geometric {
            return;
        }
        if self.needs(STYLE, |c| c.style == wanted.style) {
            self.receiver.set_style(wanted.style);
            self.current.style = wanted.style;
        }
        if flags.applies_path_effect()
            && self.needs(PATH_EFFECT, |c| {
                equals(c.path_effect.as_ref(), wanted.path_effect.as_ref())
            })
        {
            self.receiver.set_path_effect(wanted.path_effect.clone());
            self.current.path_effect = wanted.path_effect.clone();
        }
        if stroked {
            if self.needs(STROKE_WIDTH, |c| c.stroke_width == wanted.stroke_width) {
                self.receiver.set_stroke_width(wanted.stroke_width);
                self.current.stroke_width = wanted.stroke_width;
            }
            if self.needs(STROKE_MITER, |c| c.stroke_miter == wanted.stroke_miter) {
                self.receiver.set_stroke_miter(wanted.stroke_miter);
                self.current.stroke_miter = wanted.stroke_miter;
            }
            if self.needs(STROKE_CAP, |c| c.stroke_cap == wanted.stroke_cap) {
                self.receiver.set_stroke_cap(wanted.stroke_cap);
                self.current.stroke_cap = wanted.stroke_cap;
            }
            if self.needs(STROKE_JOIN, |c| c.stroke_join == wanted.stroke_join) {
                self.receiver.set_stroke_join(wanted.stroke_join);
                self.current.stroke_join = wanted.stroke_join;
            }
        }
    }

    /// Whether the attribute marked by `bit` has to be sent, marking it known.
    fn needs(&mut self, bit: u32, matches: impl FnOnce(&PaintAttributes) -> bool) -> bool {
        let send = self.known & bit == 0 || !matches(&self.current);
        self.known |= bit;
        send
    }

    /// The attributes of `recorded` with the group opacity applied.
    fn faded(&self, recorded: &RecordedOp) -> Option<PaintAttributes> {
        let attributes = recorded.attributes.as_deref()?;
        let mut attributes = attributes.clone();
        if self.opacity < 1.0 {
            attributes.color = attributes.color.with_alpha_factor(self.opacity);
        }
        Some(attributes)
    }

    /// Syncs the attributes of a draw operation and returns whether an image
    /// operation without attributes must now be drawn with them.
    fn prepare_draw(&mut self, recorded: &RecordedOp, flags: AttributeFlags) -> bool {
        if let Some(attributes) = self.faded(recorded) {
            self.sync(&attributes, flags);
            return false;
        }
        if self.opacity < 1.0 && is_image(&recorded.op) {
            let mut attributes =
                PaintAttributes::default().masked(AttributeFlags::DRAW_IMAGE_WITH_PAINT);
            attributes.color = attributes.color.with_alpha_factor(self.opacity);
            self.sync(&attributes, AttributeFlags::DRAW_IMAGE_WITH_PAINT);
            return true;
        }
        false
    }

    fn push(&mut self) {
        self.stack.push((self.current.clone(), self.known, self.opacity));
    }

    fn pop(&mut self) {
        if let Some((current, known, opacity)) = self.stack.pop() {
            self.current = current;
            self.known = known;
            self.opacity = opacity;
        }
    }

    fn dispatch(&mut self, recorded: &RecordedOp) {
        let op = &recorded.op;
        let promote = match op.flags() {
            Some(flags) if op.is_draw() => self.prepare_draw(recorded, flags),
            _ => false,
        };
        let with_attributes = |recorded_with: bool| recorded_with || promote;
        let receiver = &mut *self.receiver;
        match op {
            DlOp::Save => {
                receiver.save();
                self.push();
            }
            DlOp::SaveLayer {
                bounds,
                options,
                backdrop,
            } => self.save_layer(recorded, *bounds, *options, backdrop.clone()),
            DlOp::Restore => {
                receiver.restore();
                self.pop();
            }
            DlOp::Translate { tx, ty } => receiver.translate(*tx, *ty),
            DlOp::Scale { sx, sy } => receiver.scale(*sx, *sy),
            DlOp::Rotate { degrees } => receiver.rotate(*degrees),
            DlOp::Skew { sx, sy } => receiver.skew(*sx, *sy),
            DlOp::Transform(matrix) => receiver.transform(*matrix),
            DlOp::TransformFullPerspective(matrix) => receiver.transform_full_perspective(matrix),
            DlOp::TransformReset => receiver.transform_reset(),
            DlOp::ClipRect {
                rect,
                op,
                anti_alias,
            } => receiver.clip_rect(*rect, *op, *anti_alias),
            DlOp::ClipRRect {
                rrect,
                op,
                anti_alias,
            } => receiver.clip_rrect(*rrect, *op, *anti_alias),
            DlOp::ClipPath {
                path,
                op,
                anti_alias,
            } => receiver.clip_path(path, *op, *anti_alias),
            DlOp::DrawPaint => receiver.draw_paint(),
            DlOp::DrawColor { color, mode } => {
                receiver.draw_color(color.with_alpha_factor(self.opacity), *mode);
            }
            DlOp::DrawLine { p0, p1 } => receiver.draw_line(*p0, *p1),
            DlOp::DrawRect(rect) => receiver.draw_rect(*rect),
            DlOp::DrawOval(bounds) => receiver.draw_oval(*bounds),
            DlOp::DrawCircle { center, radius } => receiver.draw_circle(*center, *radius),
            DlOp::DrawRRect(rrect) => receiver.draw_rrect(*rrect),
            DlOp::DrawDRRect { outer, inner } => receiver.draw_drrect(*outer, *inner),
            DlOp::DrawPath(path) => receiver.draw_path(path),
            DlOp::DrawArc {
                bounds,
                start_degrees,
                sweep_degrees,
                use_center,
            } => receiver.draw_arc(*bounds, *start_degrees, *sweep_degrees, *use_center),
            DlOp::DrawPoints { mode, points } => receiver.draw_points(*mode, points),
            DlOp::DrawVertices { vertices, mode } => receiver.draw_vertices(vertices, *mode),
            DlOp::DrawImage {
                image,
                point,
                sampling,
                with_attributes: recorded_with,
            } => receiver.draw_image(image, *point, *sampling, with_attributes(*recorded_with)),
            DlOp::DrawImageRect {
                image,
                src,
                dst,
                sampling,
                with_attributes: recorded_with,
                constraint,
            } => receiver.draw_image_rect(
                image,
                *src,
                *dst,
                *sampling,
                with_attributes(*recorded_with),
                *constraint,
            ),
            DlOp::DrawImageNine {
                image,
                center,
                dst,
                filter,
                with_attributes: recorded_with,
            } => receiver.draw_image_nine(
                image,
                *center,
                *dst,
                *filter,
                with_attributes(*recorded_with),
            ),
            DlOp::DrawAtlas {
                atlas,
                xforms,
                tex,
                colors,
                mode,
                sampling,
                cull_rect,
                with_attributes: recorded_with,
            } => receiver.draw_atlas(
                atlas,
                xforms,
                tex,
                colors.as_deref(),
                *mode,
                *sampling,
                *cull_rect,
                with_attributes(*recorded_with),
            ),
            DlOp::DrawDisplayList { list, opacity } => {
                receiver.draw_display_list(list, opacity * self.opacity);
            }
            DlOp::DrawTextBlob { blob, x, y } => receiver.draw_text_blob(blob, *x, *y),
            DlOp::DrawShadow {
                path,
                color,
                elevation,
                transparent_occluder,
                dpr,
            } => receiver.draw_shadow(path, *color, *elevation, *transparent_occluder, *dpr),
        }
    }

    fn save_layer(
        &mut self,
        recorded: &RecordedOp,
        bounds: Option<Rect>,
        mut options: SaveLayerOptions,
        backdrop: Option<Arc<ImageFilter>>,
    ) {
        let distributes = options.can_distribute_opacity && backdrop.is_none();
        let flags = AttributeFlags::SAVE_LAYER_WITH_PAINT;
        if self.opacity < 1.0 && !distributes {
            // The layer absorbs the opacity when it is composited.
            let mut attributes = match recorded.attributes.as_deref() {
                Some(attributes) => attributes.clone(),
                None => PaintAttributes::default().masked(flags),
            };
            attributes.color = attributes.color.with_alpha_factor(self.opacity);
            self.sync(&attributes, flags);
            options.renders_with_attributes = true;
            self.receiver.save_layer(bounds, options, backdrop);
            self.push();
            self.opacity = 1.0;
            return;
        }
        if let Some(attributes) = recorded.attributes.as_deref() {
            self.sync(attributes, flags);
        }
        self.receiver.save_layer(bounds, options, backdrop);
        self.push();
    }
}

fn is_image(op: &DlOp) -> bool {
    matches!(
        op,
        DlOp::DrawImage { .. }
            | DlOp::DrawImageRect { .. }
            | DlOp::DrawImageNine { .. }
            | DlOp::DrawAtlas { .. }
    )
}
