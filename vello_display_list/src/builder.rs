// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The display list recorder.

use std::f64::consts::SQRT_2;
use std::sync::Arc;

use crate::attributes::{
    Blender, ColorSource, DrawStyle, MaskFilter, PaintAttributes, PathEffect, SRC_OVER,
};
use crate::color_filter::ColorFilter;
use crate::dispatch::Dispatcher;
use crate::display_list::DisplayList;
use crate::flags::{AttributeFlags, SpecialGeometryFlags};
use crate::geometry::{
    rect_is_finite, rects_overlap, ClipOp, DlImage, FilterMode, IRect, ImageSampling, PointMode,
    RSTransform, SrcRectConstraint, TextBlob, Vertices, MAX_CULL_RECT,
};
use crate::image_filter::ImageFilter;
use crate::kurbo::{Affine, BezPath, Cap, Join, Point, Rect, RoundedRect, Shape, Size};
use crate::op::{DlOp, Matrix4, RecordedOp, SaveLayerOptions};
use crate::peniko::{BlendMode, Color};
use crate::Error;

/// Configuration of a [`DisplayListBuilder`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BuilderOptions {
    /// The initial clip, in the coordinate space of the list.
    pub cull_rect: Rect,
    /// Store the bounds of every operation so that
    /// [`DisplayList::render_culled`] can skip operations.
    pub prepare_culling: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            cull_rect: MAX_CULL_RECT,
            prepare_culling: false,
        }
    }
}

/// What a draw operation covers before attributes are taken into account.
#[derive(Copy, Clone, Debug)]
enum Coverage {
    /// The whole clip.
    Flood,
    /// The given local rectangle.
    Local(Rect),
    /// Nothing at all.
    Nothing,
}

struct SaveEntry {
    attributes: PaintAttributes,
    matrix: Affine,
    perspective: bool,
    clip: Rect,
    is_layer: bool,
}

/// Bookkeeping for the root of the list and for each open layer.
struct LayerInfo {
    /// Index of the `SaveLayer` operation, `None` for the root.
    op_index: Option<usize>,
    /// Union of the bounds of the content, in the coordinate space of the list.
    bounds: Option<Rect>,
    /// Whether the content can take a group opacity without a layer.
    opacity_compatible: bool,
    /// Union of the bounds of the opacity compatible content so far.
    opacity_bounds: Option<Rect>,
    image_filter: Option<Arc<ImageFilter>>,
    matrix: Affine,
    perspective: bool,
    parent_clip: Rect,
    /// Whether the layer itself composites compatibly into its parent.
    paint_compatible: bool,
    /// Whether compositing the layer changes the whole clip.
    floods: bool,
}

impl LayerInfo {
    fn root(clip: Rect) -> Self {
        Self {
            op_index: None,
            bounds: None,
            opacity_compatible: true,
            opacity_bounds: None,
            image_filter: None,
            matrix: Affine::IDENTITY,
            perspective: false,
            parent_clip: clip,
            paint_compatible: true,
            floods: false,
        }
    }

    fn accumulate(&mut self, bounds: Option<Rect>, compatible: bool) {
        let bounds = bounds.filter(|b| has_area(*b));
        if let Some(b) = bounds {
            self.bounds = Some(self.bounds.map_or(b, |acc| acc.union(b)));
        }
        if !self.opacity_compatible {
            return;
        }
        if !compatible {
            self.opacity_compatible = false;
            return;
        }
        if let Some(b) = bounds {
            if self.opacity_bounds.is_some_and(|acc| rects_overlap(acc, b)) {
                self.opacity_compatible = false;
            } else {
                self.opacity_bounds = Some(self.opacity_bounds.map_or(b, |acc| acc.union(b)));
            }
        }
    }
}

fn has_area(rect: Rect) -> bool {
    rect.width() > 0.0 && rect.height() > 0.0
}

/// How far stroking pushes the outline past the geometry.
fn stroke_padding(attributes: &PaintAttributes, special: SpecialGeometryFlags) -> f64 {
    let half_width = f64::from(attributes.stroke_width.max(0.0)) * 0.5;
    let mut scale = 1.0_f64;
    if special.may_have_joins()
        && special.may_have_acute_joins()
        && attributes.stroke_join == Join::Miter
    {
        scale = scale.max(f64::from(attributes.stroke_miter));
    }
    let square_caps = attributes.stroke_cap == Cap::Square
        || (attributes.stroke_cap == Cap::Butt && special.butt_cap_becomes_square());
    if special.may_have_end_caps() && square_caps && special.may_have_diagonal_caps() {
        scale = scale.max(SQRT_2);
    }
    half_width * scale
}

/// Extracts the 2D affine part of a 4x4 transform, if it has no perspective.
fn matrix4_as_affine(m: &Matrix4) -> Option<Affine> {
    let [mxx, mxy, _, mxt, myx, myy, _, myt, _, _, _, _, mwx, mwy, _, mwt] = *m;
    (mwx == 0.0 && mwy == 0.0 && mwt == 1.0).then(|| Affine::new([mxx, myx, mxy, myy, mxt, myt]))
}

/// Records drawing operations into a [`DisplayList`].
///
/// Attribute setters change the attributes used by subsequent draws without
/// recording anything. Each draw captures the attributes relevant to it, so
/// that replaying the list never depends on attributes a draw doesn't use.
///
/// The builder tracks the transform and a conservative clip rectangle to
/// compute the bounds of the list, and tracks whether the list can be drawn
/// with a group opacity without an intermediate layer.
///
/// All recording methods live on the [`Dispatcher`] trait.
pub struct DisplayListBuilder {
    options: BuilderOptions,
    ops: Vec<RecordedOp>,
    current: PaintAttributes,
    last_snapshot: Option<Arc<PaintAttributes>>,
    matrix: Affine,
    perspective: bool,
    clip: Rect,
    save_stack: Vec<SaveEntry>,
    root: LayerInfo,
    layers: Vec<LayerInfo>,
}

impl Default for DisplayListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DisplayListBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayListBuilder")
            .field("op_count", &self.ops.len())
            .field("save_count", &self.save_stack.len())
            .field("matrix", &self.matrix)
            .field("clip", &self.clip)
            .finish_non_exhaustive()
    }
}

impl DisplayListBuilder {
    /// Creates a builder with default options.
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    /// Creates a builder with the given options.
    pub fn with_options(options: BuilderOptions) -> Self {
        let clip = options.cull_rect.abs();
        Self {
            options,
            ops: Vec::new(),
            current: PaintAttributes::default(),
            last_snapshot: None,
            matrix: Affine::IDENTITY,
            perspective: false,
            clip,
            save_stack: Vec::new(),
            root: LayerInfo::root(clip),
            layers: Vec::new(),
        }
    }

    /// The attributes subsequent draws will use.
    pub fn attributes(&self) -> &PaintAttributes {
        &self.current
    }

    /// The current transform.
    pub fn matrix(&self) -> Affine {
        self.matrix
    }

    /// Whether the current transform has a perspective component.
    pub fn has_perspective(&self) -> bool {
        self.perspective
    }

    /// A conservative bound of the current clip, in the coordinate space of the list.
    pub fn clip_bounds(&self) -> Rect {
        self.clip
    }

    /// The number of `save` and `save_layer` calls awaiting a `restore`.
    pub fn save_count(&self) -> usize {
        self.save_stack.len()
    }

    /// The number of operations recorded so far.
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Sets every attribute that `flags` declares relevant from `attributes`.
    pub fn set_attributes_from(&mut self, attributes: &PaintAttributes, flags: AttributeFlags) {
        if flags.ignores_paint() {
            return;
        }
        let current = &mut self.current;
        if flags.applies_anti_alias() {
            current.anti_alias = attributes.anti_alias;
        }
        if flags.applies_dither() {
            current.dither = attributes.dither;
        }
        if flags.applies_color() || flags.applies_alpha() {
            current.color = attributes.color;
        }
        if flags.applies_blend() {
            current.blend_mode = attributes.blend_mode;
            current.blender.clone_from(&attributes.blender);
        }
        if flags.applies_shader() {
            current.color_source.clone_from(&attributes.color_source);
        }
        if flags.applies_color_filter() {
            current.color_filter.clone_from(&attributes.color_filter);
            current.invert_colors = attributes.invert_colors;
        }
        if flags.applies_image_filter() {
            current.image_filter.clone_from(&attributes.image_filter);
        }
        if flags.applies_mask_filter() {
            current.mask_filter.clone_from(&attributes.mask_filter);
        }
        if flags.is_geometric() {
            current.style = attributes.style;
            if flags.applies_path_effect() {
                current.path_effect.clone_from(&attributes.path_effect);
            }
            if flags.is_stroked(attributes.style) {
                current.stroke_width = attributes.stroke_width;
                current.stroke_cap = attributes.stroke_cap;
                current.stroke_join = attributes.stroke_join;
                current.stroke_miter = attributes.stroke_miter;
            }
        }
    }

    /// Restores until only `count` saves remain open.
    pub fn restore_to_count(&mut self, count: usize) {
        while self.save_stack.len() > count {
            self.restore();
        }
    }

    /// Like [`Dispatcher::restore`], but reports an unmatched restore as an error.
    pub fn try_restore(&mut self) -> Result<(), Error> {
        let entry = self.save_stack.pop().ok_or(Error::UnbalancedRestore)?;
        self.push_op(DlOp::Restore, None, None);
        self.current = entry.attributes;
        self.matrix = entry.matrix;
        self.perspective = entry.perspective;
        self.clip = entry.clip;
        if entry.is_layer {
            if let Some(layer) = self.layers.pop() {
                self.finish_layer(layer);
            }
        }
        Ok(())
    }

    /// Draws another list under an additional transform.
    ///
    /// With `with_attributes`, the picture is composited as a layer using the
    /// current attributes. The picture is recorded as a `save` or
    /// `save_layer`, the transform, a nested list and a `restore`.
    pub fn draw_picture(
        &mut self,
        picture: &Arc<DisplayList>,
        matrix: Option<Affine>,
        with_attributes: bool,
    ) {
        if with_attributes {
            let bounds = matrix
                .unwrap_or(Affine::IDENTITY)
                .transform_rect_bbox(picture.bounds());
            self.save_layer(Some(bounds), SaveLayerOptions::WITH_ATTRIBUTES, None);
        } else {
            self.save();
        }
        if let Some(matrix) = matrix {
            self.transform(matrix);
        }
        self.draw_display_list(picture, 1.0);
        self.restore();
    }

    /// Finishes recording.
    ///
    /// Every `save` must have been restored. Unbalanced saves are a contract
    /// violation: they panic in debug builds and are closed with a warning
    /// otherwise. See [`Self::try_build`] for a checked variant.
    pub fn build(mut self) -> Arc<DisplayList> {
        let depth = self.save_stack.len();
        debug_assert_eq!(depth, 0, "display list built with unbalanced saves");
        if depth > 0 {
            log::warn!("display list built with {depth} unbalanced saves, closing them");
            while self.try_restore().is_ok() {}
        }
        self.finish()
    }

    /// Finishes recording, failing if any `save` was not restored.
    pub fn try_build(self) -> Result<Arc<DisplayList>, Error> {
        match self.save_stack.len() {
            0 => Ok(self.finish()),
            depth => Err(Error::UnbalancedSave { depth }),
        }
    }

    fn finish(self) -> Arc<DisplayList> {
        let bounds = self.root.bounds.unwrap_or(Rect::ZERO);
        log::debug!(
            "built display list with {} ops, bounds {bounds:?}",
            self.ops.len()
        );
        Arc::new(DisplayList::new(
            self.ops,
            bounds,
            self.root.opacity_compatible,
            self.options.prepare_culling,
        ))
    }

    fn layer_mut(&mut self) -> &mut LayerInfo {
        match self.layers.last_mut() {
            Some(layer) => layer,
            None => &mut self.root,
        }
    }

    fn save_entry(&self, is_layer: bool) -> SaveEntry {
        SaveEntry {
            attributes: self.current.clone(),
            matrix: self.matrix,
            perspective: self.perspective,
            clip: self.clip,
            is_layer,
        }
    }

    /// Captures the attributes relevant to `flags`, sharing the previous
    /// snapshot when nothing relevant changed.
    fn snapshot(&mut self, flags: AttributeFlags) -> Option<Arc<PaintAttributes>> {
        if flags.ignores_paint() {
            return None;
        }
        let masked = self.current.masked(flags);
        if let Some(last) = &self.last_snapshot {
            if **last == masked {
                return Some(last.clone());
            }
        }
        let snapshot = Arc::new(masked);
        self.last_snapshot = Some(snapshot.clone());
        Some(snapshot)
    }

    fn push_op(&mut self, op: DlOp, attributes: Option<Arc<PaintAttributes>>, bounds: Option<Rect>) {
        log::trace!("record {op:?}");
        let bounds = bounds.filter(|_| self.options.prepare_culling);
        self.ops.push(RecordedOp {
            op,
            attributes,
            bounds,
        });
    }

    fn record_draw(&mut self, op: DlOp, coverage: Coverage) {
        let Some(flags) = op.flags() else {
            self.push_op(op, None, None);
            return;
        };
        let attributes = self.snapshot(flags);
        let compatible = is_opacity_compatible(&op, attributes.as_deref());
        let bounds = self.op_bounds(coverage, flags, attributes.as_deref());
        self.layer_mut().accumulate(Some(bounds), compatible);
        self.push_op(op, attributes, Some(bounds));
    }

    /// The bounds of a draw in the coordinate space of the list.
    fn op_bounds(
        &self,
        coverage: Coverage,
        flags: AttributeFlags,
        attributes: Option<&PaintAttributes>,
    ) -> Rect {
        if flags.is_flood()
            || attributes.is_some_and(|a| a.modifies_transparent_black(flags))
        {
            return self.clip;
        }
        let local = match coverage {
            Coverage::Nothing => return Rect::ZERO,
            Coverage::Flood => return self.clip,
            Coverage::Local(rect) => rect,
        };
        if self.perspective {
            return self.clip;
        }
        let (local, hairline) = match attributes {
            Some(attributes) => match adjust_for_attributes(local, flags, attributes) {
                Some(adjusted) => adjusted,
                None => return self.clip,
            },
            None => (local, false),
        };
        let mut device = self.matrix.transform_rect_bbox(local);
        if hairline {
            // Hairlines are one device pixel wide regardless of the transform.
            device = device.inflate(1.0, 1.0);
        }
        if !rect_is_finite(device) {
            return self.clip;
        }
        device.intersect(self.clip)
    }

    fn finish_layer(&mut self, layer: LayerInfo) {
        if let Some(index) = layer.op_index {
            if let Some(RecordedOp {
                op: DlOp::SaveLayer { options, .. },
                ..
            }) = self.ops.get_mut(index)
            {
                options.can_distribute_opacity = layer.opacity_compatible;
            }
        }
        let parent_clip = layer.parent_clip;
        let mut bounds = layer.bounds;
        if let Some(filter) = &layer.image_filter {
            // The filter moves the content, so the content bounds no longer
            // tell where it ends up.
            if let Some(index) = layer.op_index {
                for recorded in self.ops.iter_mut().skip(index + 1) {
                    recorded.bounds = None;
                }
            }
            bounds = match bounds {
                Some(content) if !layer.perspective => {
                    match filter.map_device_bounds(IRect::round_out(content), &layer.matrix) {
                        Ok(mapped) => Some(mapped.to_rect().intersect(parent_clip)),
                        Err(_) => Some(parent_clip),
                    }
                }
                Some(_) => Some(parent_clip),
                None if filter.modifies_transparent_black() => Some(parent_clip),
                None => None,
            };
        }
        if layer.floods {
            bounds = Some(parent_clip);
        }
        self.layer_mut().accumulate(bounds, layer.paint_compatible);
    }
}

/// Grows local bounds by the effect of the attributes, returning whether the
/// geometry is a hairline. Returns `None` if the bounds can't be determined.
fn adjust_for_attributes(
    local: Rect,
    flags: AttributeFlags,
    attributes: &PaintAttributes,
) -> Option<(Rect, bool)> {
    let mut rect = local;
    let mut hairline = false;
    if flags.is_geometric() {
        if flags.applies_path_effect() {
            if let Some(effect) = attributes.path_effect.as_deref() {
                rect = effect.effect_bounds(rect)?;
            }
        }
        if flags.is_stroked(attributes.style) {
            let special = flags.with_path_effect(attributes.path_effect.as_deref(), true);
            let pad = stroke_padding(attributes, special);
            hairline = attributes.stroke_width <= 0.0;
            rect = rect.inflate(pad, pad);
        }
    }
    if flags.applies_mask_filter() {
        if let Some(mask) = attributes.mask_filter.as_deref() {
            rect = mask.map_local_bounds(rect);
        }
    }
    if flags.applies_image_filter() {
        if let Some(filter) = attributes.image_filter.as_deref() {
            rect = filter.map_local_bounds(rect).ok()?;
        }
    }
    Some((rect, hairline))
}

/// Whether a draw can have its alpha scaled independently of its neighbors.
fn is_opacity_compatible(op: &DlOp, attributes: Option<&PaintAttributes>) -> bool {
    match op {
        DlOp::DrawShadow { .. }
        | DlOp::DrawVertices { .. }
        | DlOp::DrawAtlas { .. }
        | DlOp::DrawPoints { .. } => false,
        DlOp::DrawDisplayList { list, .. } => list.can_apply_group_opacity(),
        DlOp::DrawColor { mode, .. } => *mode == SRC_OVER,
        _ => attributes.map_or(true, |a| {
            // A stroke drawn over its own fill blends twice.
            a.is_opacity_compatible()
                && a.style != DrawStyle::StrokeAndFill
                && !a
                    .image_filter
                    .as_deref()
                    .is_some_and(ImageFilter::modifies_transparent_black)
        }),
    }
}

/// The local bounds of a shadow cast by an occluder with bounds `bounds`.
fn shadow_bounds(bounds: Rect, elevation: f64, dpr: f64) -> Rect {
    let z = (elevation * dpr).abs();
    let ambient = (z * 0.5).min(300.0);
    let spot = z * 800.0 / 600.0;
    let pad = ambient + spot + z;
    if !pad.is_finite() {
        return MAX_CULL_RECT;
    }
    bounds.inflate(pad, pad)
}

fn points_bounds(points: &[Point]) -> Coverage {
    points
        .iter()
        .map(|p| Rect::from_points(*p, *p))
        .reduce(|a, b| a.union(b))
        .map_or(Coverage::Nothing, Coverage::Local)
}

impl Dispatcher for DisplayListBuilder {
    fn set_anti_alias(&mut self, anti_alias: bool) {
        self.current.anti_alias = anti_alias;
    }

    fn set_dither(&mut self, dither: bool) {
        self.current.dither = dither;
    }

    fn set_invert_colors(&mut self, invert: bool) {
        self.current.invert_colors = invert;
    }

    fn set_color(&mut self, color: Color) {
        self.current.color = color;
    }

    fn set_style(&mut self, style: DrawStyle) {
        self.current.style = style;
    }

    fn set_stroke_width(&mut self, width: f32) {
        self.current.stroke_width = width;
    }

    fn set_stroke_miter(&mut self, limit: f32) {
        self.current.stroke_miter = limit;
    }

    fn set_stroke_cap(&mut self, cap: Cap) {
        self.current.stroke_cap = cap;
    }

    fn set_stroke_join(&mut self, join: Join) {
        self.current.stroke_join = join;
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.current.blend_mode = mode;
    }

    fn set_color_source(&mut self, source: Option<Arc<ColorSource>>) {
        self.current.color_source = source;
    }

    fn set_color_filter(&mut self, filter: Option<Arc<ColorFilter>>) {
        self.current.color_filter = filter;
    }

    fn set_image_filter(&mut self, filter: Option<Arc<ImageFilter>>) {
        self.current.image_filter = filter;
    }

    fn set_mask_filter(&mut self, filter: Option<Arc<MaskFilter>>) {
        self.current.mask_filter = filter;
    }

    fn set_path_effect(&mut self, effect: Option<Arc<PathEffect>>) {
        self.current.path_effect = effect;
    }

    fn set_blender(&mut self, blender: Option<Arc<Blender>>) {
        self.current.blender = blender;
    }

    fn save(&mut self) {
        self.save_stack.push(self.save_entry(false));
        self.push_op(DlOp::Save, None, None);
    }

    fn save_layer(
        &mut self,
        bounds: Option<Rect>,
        options: SaveLayerOptions,
        backdrop: Option<Arc<ImageFilter>>,
    ) {
        let flags = if options.renders_with_attributes {
            AttributeFlags::SAVE_LAYER_WITH_PAINT
        } else {
            AttributeFlags::SAVE_LAYER
        };
        let attributes = self.snapshot(flags);
        let parent_clip = self.clip;
        if backdrop.is_some() {
            // The backdrop filter rewrites everything below the layer.
            self.layer_mut().accumulate(Some(parent_clip), false);
        }
        self.save_stack.push(self.save_entry(true));

        let op_index = self.ops.len();
        let paint_compatible = backdrop.is_none()
            && attributes
                .as_deref()
                .map_or(true, PaintAttributes::is_opacity_compatible);
        let floods = attributes
            .as_deref()
            .is_some_and(|a| a.modifies_transparent_black(flags));
        let image_filter = attributes.as_deref().and_then(|a| a.image_filter.clone());
        let options = SaveLayerOptions {
            renders_with_attributes: options.renders_with_attributes,
            can_distribute_opacity: false,
        };
        self.push_op(
            DlOp::SaveLayer {
                bounds,
                options,
                backdrop,
            },
            attributes,
            None,
        );

        if let Some(bounds) = bounds {
            if !self.perspective {
                self.clip = self.clip.intersect(self.matrix.transform_rect_bbox(bounds));
            }
        }
        self.layers.push(LayerInfo {
            op_index: Some(op_index),
            bounds: None,
            opacity_compatible: true,
            opacity_bounds: None,
            image_filter,
            matrix: self.matrix,
            perspective: self.perspective,
            parent_clip,
            paint_compatible,
            floods,
        });
    }

    fn restore(&mut self) {
        debug_assert!(
            !self.save_stack.is_empty(),
            "restore without a matching save"
        );
        if let Err(err) = self.try_restore() {
            log::warn!("{err}, ignoring");
        }
    }

    fn translate(&mut self, tx: f64, ty: f64) {
        self.matrix *= Affine::translate((tx, ty));
        self.push_op(DlOp::Translate { tx, ty }, None, None);
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.matrix *= Affine::scale_non_uniform(sx, sy);
        self.push_op(DlOp::Scale { sx, sy }, None, None);
    }

    fn rotate(&mut self, degrees: f64) {
        self.matrix *= Affine::rotate(degrees.to_radians());
        self.push_op(DlOp::Rotate { degrees }, None, None);
    }

    fn skew(&mut self, sx: f64, sy: f64) {
        self.matrix *= Affine::skew(sx, sy);
        self.push_op(DlOp::Skew { sx, sy }, None, None);
    }

    fn transform(&mut self, matrix: Affine) {
        self.matrix *= matrix;
        self.push_op(DlOp::Transform(matrix), None, None);
    }

    fn transform_full_perspective(&mut self, matrix: &Matrix4) {
        match matrix4_as_affine(matrix) {
            Some(affine) => self.matrix *= affine,
            None => self.perspective = true,
        }
        self.push_op(DlOp::TransformFullPerspective(*matrix), None, None);
    }

    fn transform_reset(&mut self) {
        self.matrix = Affine::IDENTITY;
        self.perspective = false;
        self.push_op(DlOp::TransformReset, None, None);
    }

    fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool) {
        if op == ClipOp::Intersect && !self.perspective {
            self.clip = self.clip.intersect(self.matrix.transform_rect_bbox(rect.abs()));
        }
        self.push_op(
            DlOp::ClipRect {
                rect,
                op,
                anti_alias,
            },
            None,
            None,
        );
    }

    fn clip_rrect(&mut self, rrect: RoundedRect, op: ClipOp, anti_alias: bool) {
        if op == ClipOp::Intersect && !self.perspective {
            self.clip = self.clip.intersect(self.matrix.transform_rect_bbox(rrect.rect()));
        }
        self.push_op(
            DlOp::ClipRRect {
                rrect,
                op,
                anti_alias,
            },
            None,
            None,
        );
    }

    fn clip_path(&mut self, path: &BezPath, op: ClipOp, anti_alias: bool) {
        if op == ClipOp::Intersect && !self.perspective {
            let bounds = if path.elements().is_empty() {
                Rect::ZERO
            } else {
                path.bounding_box()
            };
            self.clip = self.clip.intersect(self.matrix.transform_rect_bbox(bounds));
        }
        self.push_op(
            DlOp::ClipPath {
                path: path.clone(),
                op,
                anti_alias,
            },
            None,
            None,
        );
    }

    fn draw_paint(&mut self) {
        self.record_draw(DlOp::DrawPaint, Coverage::Flood);
    }

    fn draw_color(&mut self, color: Color, mode: BlendMode) {
        self.record_draw(DlOp::DrawColor { color, mode }, Coverage::Flood);
    }

    fn draw_line(&mut self, p0: Point, p1: Point) {
        self.record_draw(
            DlOp::DrawLine { p0, p1 },
            Coverage::Local(Rect::from_points(p0, p1)),
        );
    }

    fn draw_rect(&mut self, rect: Rect) {
        self.record_draw(DlOp::DrawRect(rect), Coverage::Local(rect.abs()));
    }

    fn draw_oval(&mut self, bounds: Rect) {
        self.record_draw(DlOp::DrawOval(bounds), Coverage::Local(bounds.abs()));
    }

    fn draw_circle(&mut self, center: Point, radius: f64) {
        let r = radius.abs();
        let bounds = Rect::new(center.x - r, center.y - r, center.x + r, center.y + r);
        self.record_draw(DlOp::DrawCircle { center, radius }, Coverage::Local(bounds));
    }

    fn draw_rrect(&mut self, rrect: RoundedRect) {
        self.record_draw(DlOp::DrawRRect(rrect), Coverage::Local(rrect.rect()));
    }

    fn draw_drrect(&mut self, outer: RoundedRect, inner: RoundedRect) {
        self.record_draw(
            DlOp::DrawDRRect { outer, inner },
            Coverage::Local(outer.rect()),
        );
    }

    fn draw_path(&mut self, path: &BezPath) {
        let coverage = if path.elements().is_empty() {
            Coverage::Nothing
        } else {
            Coverage::Local(path.bounding_box())
        };
        self.record_draw(DlOp::DrawPath(path.clone()), coverage);
    }

    fn draw_arc(&mut self, bounds: Rect, start_degrees: f64, sweep_degrees: f64, use_center: bool) {
        self.record_draw(
            DlOp::DrawArc {
                bounds,
                start_degrees,
                sweep_degrees,
                use_center,
            },
            Coverage::Local(bounds.abs()),
        );
    }

    fn draw_points(&mut self, mode: PointMode, points: &[Point]) {
        let coverage = points_bounds(points);
        self.record_draw(
            DlOp::DrawPoints {
                mode,
                points: points.to_vec(),
            },
            coverage,
        );
    }

    fn draw_vertices(&mut self, vertices: &Arc<Vertices>, mode: BlendMode) {
        let coverage = if vertices.positions().is_empty() {
            Coverage::Nothing
        } else {
            Coverage::Local(vertices.bounds())
        };
        self.record_draw(
            DlOp::DrawVertices {
                vertices: vertices.clone(),
                mode,
            },
            coverage,
        );
    }

    fn draw_image(
        &mut self,
        image: &DlImage,
        point: Point,
        sampling: ImageSampling,
        with_attributes: bool,
    ) {
        let size = Size::new(f64::from(image.width()), f64::from(image.height()));
        self.record_draw(
            DlOp::DrawImage {
                image: image.clone(),
                point,
                sampling,
                with_attributes,
            },
            Coverage::Local(Rect::from_origin_size(point, size)),
        );
    }

    fn draw_image_rect(
        &mut self,
        image: &DlImage,
        src: Rect,
        dst: Rect,
        sampling: ImageSampling,
        with_attributes: bool,
        constraint: SrcRectConstraint,
    ) {
        self.record_draw(
            DlOp::DrawImageRect {
                image: image.clone(),
                src,
                dst,
                sampling,
                with_attributes,
                constraint,
            },
            Coverage::Local(dst.abs()),
        );
    }

    fn draw_image_nine(
        &mut self,
        image: &DlImage,
        center: IRect,
        dst: Rect,
        filter: FilterMode,
        with_attributes: bool,
    ) {
        self.record_draw(
            DlOp::DrawImageNine {
                image: image.clone(),
                center,
                dst,
                filter,
                with_attributes,
            },
            Coverage::Local(dst.abs()),
        );
    }

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
    ) {
        let coverage = match cull_rect {
            Some(cull) => Coverage::Local(cull.abs()),
            None => xforms
                .iter()
                .zip(tex)
                .map(|(xform, tex)| {
                    let sprite = Rect::from_origin_size(Point::ORIGIN, tex.size());
                    xform.to_affine().transform_rect_bbox(sprite)
                })
                .reduce(|a, b| a.union(b))
                .map_or(Coverage::Nothing, Coverage::Local),
        };
        self.record_draw(
            DlOp::DrawAtlas {
                atlas: atlas.clone(),
                xforms: xforms.to_vec(),
                tex: tex.to_vec(),
                colors: colors.map(<[Color]>::to_vec),
                mode,
                sampling,
                cull_rect,
                with_attributes,
            },
            coverage,
        );
    }

    fn draw_display_list(&mut self, list: &Arc<DisplayList>, opacity: f32) {
        let coverage = if list.is_empty() {
            Coverage::Nothing
        } else {
            Coverage::Local(list.bounds())
        };
        self.record_draw(
            DlOp::DrawDisplayList {
                list: list.clone(),
                opacity,
            },
            coverage,
        );
    }

    fn draw_text_blob(&mut self, blob: &Arc<TextBlob>, x: f64, y: f64) {
        let bounds = blob.bounds() + crate::kurbo::Vec2::new(x, y);
        self.record_draw(
            DlOp::DrawTextBlob {
                blob: blob.clone(),
                x,
                y,
            },
            Coverage::Local(bounds),
        );
    }

    fn draw_shadow(
        &mut self,
        path: &BezPath,
        color: Color,
        elevation: f64,
        transparent_occluder: bool,
        dpr: f64,
    ) {
        let coverage = if path.elements().is_empty() {
            Coverage::Nothing
        } else {
            Coverage::Local(shadow_bounds(path.bounding_box(), elevation, dpr))
        };
        self.record_draw(
            DlOp::DrawShadow {
                path: path.clone(),
                color,
                elevation,
                transparent_occluder,
                dpr,
            },
            coverage,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BuilderOptions, DisplayListBuilder};
    use crate::attributes::{BlurStyle, DrawStyle, MaskFilter, PaintAttributes};
    use crate::color_filter::ColorFilter;
    use crate::dispatch::Dispatcher;
    use crate::geometry::{ClipOp, TileMode, MAX_CULL_RECT};
    use crate::image_filter::ImageFilter;
    use crate::kurbo::{Affine, BezPath, Cap, Join, Point, Rect};
    use crate::op::{DlOp, SaveLayerOptions};
    use crate::peniko::{BlendMode, Color, Compose, Mix};
    use crate::Error;

    const RED: Color = Color::rgba8(255, 0, 0, 255);

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect::new(x0, y0, x1, y1)
    }

    #[test]
    fn setters_record_nothing() {
        let mut builder = DisplayListBuilder::new();
        builder.set_color(RED);
        builder.set_style(DrawStyle::Stroke);
        builder.set_stroke_width(4.0);
        assert_eq!(builder.op_count(), 0);
        let list = builder.build();
        assert!(list.is_empty());
        assert_eq!(list.bounds(), Rect::ZERO);
    }

    #[test]
    fn draws_capture_relevant_attributes() {
        let mut builder = DisplayListBuilder::new();
        builder.set_color(RED);
        builder.set_stroke_width(12.0);
        builder.draw_rect(rect(0.0, 0.0, 10.0, 10.0));
        builder.draw_oval(rect(20.0, 0.0, 30.0, 10.0));
        builder.set_stroke_width(3.0);
        builder.draw_rect(rect(40.0, 0.0, 50.0, 10.0));
        let list = builder.build();
        let ops = list.ops();
        let first = ops[0].attributes.as_ref().unwrap();
        assert_eq!(first.color, RED);
        // A fill doesn't care about the stroke width.
        assert_eq!(first.stroke_width, PaintAttributes::default().stroke_width);
        let second = ops[1].attributes.as_ref().unwrap();
        let third = ops[2].attributes.as_ref().unwrap();
        assert!(Arc::ptr_eq(first, second));
        assert!(Arc::ptr_eq(second, third));
    }

    #[test]
    fn ignores_paint_ops_capture_nothing() {
        let mut builder = DisplayListBuilder::new();
        builder.set_color(RED);
        builder.draw_color(RED, BlendMode::default());
        let list = builder.build();
        assert!(list.ops()[0].attributes.is_none());
    }

    #[test]
    fn restore_reverts_state() {
        let mut builder = DisplayListBuilder::new();
        builder.set_color(RED);
        builder.save();
        builder.set_color(Color::BLACK);
        builder.translate(10.0, 10.0);
        builder.clip_rect(rect(0.0, 0.0, 5.0, 5.0), ClipOp::Intersect, false);
        assert_eq!(builder.clip_bounds(), rect(10.0, 10.0, 15.0, 15.0));
        builder.restore();
        assert_eq!(builder.attributes().color, RED);
        assert_eq!(builder.matrix(), Affine::IDENTITY);
        assert_eq!(builder.clip_bounds(), MAX_CULL_RECT);
    }

    #[test]
    fn fill_bounds_follow_transform_and_clip() {
        let mut builder = DisplayListBuilder::new();
        builder.scale(2.0, 2.0);
        builder.clip_rect(rect(0.0, 0.0, 100.0, 15.0), ClipOp::Intersect, false);
        builder.draw_rect(rect(10.0, 10.0, 20.0, 20.0));
        let list = builder.build();
        assert_eq!(list.bounds(), rect(20.0, 20.0, 40.0, 30.0));
    }

    #[test]
    fn difference_clip_keeps_bounds() {
        let mut builder = DisplayListBuilder::new();
        builder.clip_rect(rect(0.0, 0.0, 15.0, 15.0), ClipOp::Difference, false);
        builder.draw_rect(rect(10.0, 10.0, 20.0, 20.0));
        assert_eq!(builder.build().bounds(), rect(10.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn stroke_bounds() {
        let mut builder = DisplayListBuilder::new();
        builder.set_style(DrawStyle::Stroke);
        builder.set_stroke_width(4.0);
        builder.draw_rect(rect(10.0, 10.0, 20.0, 20.0));
        assert_eq!(builder.build().bounds(), rect(8.0, 8.0, 22.0, 22.0));

        // Miter joins on arbitrary paths may extend to the miter limit.
        let mut builder = DisplayListBuilder::new();
        builder.set_style(DrawStyle::Stroke);
        builder.set_stroke_width(4.0);
        builder.set_stroke_join(Join::Miter);
        builder.set_stroke_miter(3.0);
        let mut path = BezPath::new();
        path.move_to((10.0, 10.0));
        path.line_to((20.0, 10.0));
        path.line_to((10.0, 12.0));
        builder.draw_path(&path);
        assert_eq!(builder.build().bounds(), rect(4.0, 4.0, 26.0, 18.0));

        // Square caps on a diagonal line reach further than half the width.
        let mut builder = DisplayListBuilder::new();
        builder.set_style(DrawStyle::Stroke);
        builder.set_stroke_width(2.0);
        builder.set_stroke_cap(Cap::Square);
        builder.draw_line(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let bounds = builder.build().bounds();
        let pad = std::f64::consts::SQRT_2;
        assert!((bounds.x0 + pad).abs() < 1e-9);
        assert!((bounds.x1 - 10.0 - pad).abs() < 1e-9);
    }

    #[test]
    fn mask_and_image_filters_grow_bounds() {
        let mut builder = DisplayListBuilder::new();
        builder.set_mask_filter(Some(Arc::new(MaskFilter::blur(BlurStyle::Normal, 2.0))));
        builder.draw_rect(rect(10.0, 10.0, 20.0, 20.0));
        assert_eq!(builder.build().bounds(), rect(4.0, 4.0, 26.0, 26.0));

        let mut builder = DisplayListBuilder::new();
        builder.set_image_filter(ImageFilter::blur(1.0, 1.0, TileMode::Decal));
        builder.draw_rect(rect(10.0, 10.0, 20.0, 20.0));
        assert_eq!(builder.build().bounds(), rect(7.0, 7.0, 23.0, 23.0));
    }

    #[test]
    fn floods_cover_the_clip() {
        let mut builder = DisplayListBuilder::with_options(BuilderOptions {
            cull_rect: rect(0.0, 0.0, 100.0, 100.0),
            prepare_culling: false,
        });
        builder.clip_rect(rect(10.0, 10.0, 50.0, 50.0), ClipOp::Intersect, false);
        builder.draw_paint();
        assert_eq!(builder.build().bounds(), rect(10.0, 10.0, 50.0, 50.0));

        // A color filter that paints transparent pixels floods too.
        let mut builder = DisplayListBuilder::with_options(BuilderOptions {
            cull_rect: rect(0.0, 0.0, 100.0, 100.0),
            prepare_culling: false,
        });
        let mut m = ColorFilter::IDENTITY_MATRIX;
        m[19] = 1.0;
        builder.set_color_filter(Some(Arc::new(ColorFilter::matrix(m))));
        builder.draw_rect(rect(10.0, 10.0, 20.0, 20.0));
        assert_eq!(builder.build().bounds(), rect(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn perspective_falls_back_to_clip() {
        let mut builder = DisplayListBuilder::with_options(BuilderOptions {
            cull_rect: rect(0.0, 0.0, 100.0, 100.0),
            prepare_culling: false,
        });
        let mut m = [0.0; 16];
        for i in 0..4 {
            m[i * 5] = 1.0;
        }
        // An affine 4x4 transform is tracked exactly.
        m[3] = 5.0;
        builder.transform_full_perspective(&m);
        assert_eq!(builder.matrix(), Affine::translate((5.0, 0.0)));
        m[12] = 0.001;
        builder.transform_full_perspective(&m);
        assert!(builder.has_perspective());
        builder.draw_rect(rect(10.0, 10.0, 20.0, 20.0));
        assert_eq!(builder.build().bounds(), rect(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn group_opacity_tracks_overlap() {
        let mut builder = DisplayListBuilder::new();
        builder.draw_rect(rect(0.0, 0.0, 10.0, 10.0));
        builder.draw_rect(rect(10.0, 0.0, 20.0, 10.0));
        assert!(builder.build().can_apply_group_opacity());

        let mut builder = DisplayListBuilder::new();
        builder.draw_rect(rect(0.0, 0.0, 10.0, 10.0));
        builder.draw_rect(rect(5.0, 5.0, 15.0, 15.0));
        assert!(!builder.build().can_apply_group_opacity());
    }

    #[test]
    fn group_opacity_requires_src_over() {
        let mut builder = DisplayListBuilder::new();
        builder.set_blend_mode(BlendMode::new(Mix::Normal, Compose::Xor));
        builder.draw_rect(rect(0.0, 0.0, 10.0, 10.0));
        assert!(!builder.build().can_apply_group_opacity());

        let mut builder = DisplayListBuilder::new();
        builder.draw_shadow(&BezPath::from_svg("M0 0L10 0L10 10Z").unwrap(), RED, 2.0, false, 1.0);
        assert!(!builder.build().can_apply_group_opacity());
    }

    #[test]
    fn layers_absorb_overlap() {
        let mut builder = DisplayListBuilder::new();
        builder.save_layer(None, SaveLayerOptions::NO_ATTRIBUTES, None);
        builder.draw_rect(rect(0.0, 0.0, 10.0, 10.0));
        builder.draw_rect(rect(5.0, 5.0, 15.0, 15.0));
        builder.restore();
        let list = builder.build();
        // The layer content overlaps, but the layer as a whole doesn't.
        assert!(list.can_apply_group_opacity());
        match &list.ops()[0].op {
            DlOp::SaveLayer { options, .. } => assert!(!options.can_distribute_opacity),
            op => panic!("unexpected {op:?}"),
        }

        let mut builder = DisplayListBuilder::new();
        builder.save_layer(None, SaveLayerOptions::NO_ATTRIBUTES, None);
        builder.draw_rect(rect(0.0, 0.0, 10.0, 10.0));
        builder.restore();
        let list = builder.build();
        match &list.ops()[0].op {
            DlOp::SaveLayer { options, .. } => assert!(options.can_distribute_opacity),
            op => panic!("unexpected {op:?}"),
        }
    }

    #[test]
    fn layer_image_filter_maps_content_bounds() {
        let mut builder = DisplayListBuilder::with_options(BuilderOptions {
            cull_rect: rect(0.0, 0.0, 100.0, 100.0),
            prepare_culling: true,
        });
        builder.set_image_filter(ImageFilter::blur(2.0, 2.0, TileMode::Decal));
        builder.save_layer(None, SaveLayerOptions::WITH_ATTRIBUTES, None);
        builder.set_image_filter(None);
        builder.draw_rect(rect(10.0, 10.0, 20.0, 20.0));
        builder.restore();
        let list = builder.build();
        assert_eq!(list.bounds(), rect(4.0, 4.0, 26.0, 26.0));
        // Content moved by the filter is never culled.
        assert_eq!(list.ops()[1].bounds, None);
    }

    #[test]
    fn backdrop_covers_the_clip() {
        let mut builder = DisplayListBuilder::with_options(BuilderOptions {
            cull_rect: rect(0.0, 0.0, 100.0, 100.0),
            prepare_culling: false,
        });
        let blur = ImageFilter::blur(2.0, 2.0, TileMode::Decal);
        builder.save_layer(None, SaveLayerOptions::NO_ATTRIBUTES, blur);
        builder.restore();
        let list = builder.build();
        assert_eq!(list.bounds(), rect(0.0, 0.0, 100.0, 100.0));
        assert!(!list.can_apply_group_opacity());
    }

    #[test]
    fn try_restore_reports_underflow() {
        let mut builder = DisplayListBuilder::new();
        assert!(matches!(builder.try_restore(), Err(Error::UnbalancedRestore)));
        assert_eq!(builder.op_count(), 0);
    }

    #[test]
    fn try_build_reports_unbalanced_saves() {
        let mut builder = DisplayListBuilder::new();
        builder.save();
        builder.save();
        builder.restore();
        assert!(matches!(
            builder.try_build(),
            Err(Error::UnbalancedSave { depth: 1 })
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unbalanced saves")]
    fn build_with_unbalanced_saves_panics_in_debug() {
        let mut builder = DisplayListBuilder::new();
        builder.save();
        builder.save();
        builder.save();
        builder.restore();
        let _ = builder.build();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "restore without a matching save")]
    fn restore_underflow_panics_in_debug() {
        let mut builder = DisplayListBuilder::new();
        builder.restore();
    }

    #[test]
    fn picture_is_flattened() {
        let mut inner = DisplayListBuilder::new();
        inner.draw_rect(rect(0.0, 0.0, 10.0, 10.0));
        let inner = inner.build();

        let mut builder = DisplayListBuilder::new();
        builder.draw_picture(&inner, Some(Affine::translate((5.0, 0.0))), false);
        let list = builder.build();
        let ops: Vec<_> = list.ops().iter().map(|r| &r.op).collect();
        assert!(matches!(ops[0], DlOp::Save));
        assert!(matches!(ops[1], DlOp::Transform(_)));
        assert!(matches!(ops[2], DlOp::DrawDisplayList { .. }));
        assert!(matches!(ops[3], DlOp::Restore));
        assert_eq!(list.bounds(), rect(5.0, 0.0, 15.0, 10.0));
        assert_eq!(list.total_op_count(), 5);
    }
}
