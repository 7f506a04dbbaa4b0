// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An imperative canvas interface, and a recorder implementing it.
//!
//! Existing drawing code is usually written against a canvas that takes a
//! paint object with every call. [`CanvasRecorder`] lets such code record a
//! [`DisplayList`]: for each call it copies the attributes of the paint that
//! matter to the call into its builder, then records the call.

use std::sync::Arc;

use crate::attributes::{
    Blender, ColorSource, DrawStyle, MaskFilter, PaintAttributes, PathEffect,
};
use crate::builder::{BuilderOptions, DisplayListBuilder};
use crate::color_filter::ColorFilter;
use crate::dispatch::Dispatcher;
use crate::display_list::DisplayList;
use crate::flags::{line_flags, points_flags, AttributeFlags};
use crate::geometry::{
    ClipOp, DlImage, FilterMode, IRect, ImageSampling, PointMode, RSTransform, SrcRectConstraint,
    TextBlob, Vertices,
};
use crate::image_filter::ImageFilter;
use crate::kurbo::{Affine, BezPath, Cap, Join, Point, Rect, RoundedRect};
use crate::op::{Matrix4, SaveLayerOptions};
use crate::peniko::{BlendMode, Color};
use crate::Error;

/// The paint object passed to [`Canvas`] calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paint {
    attributes: PaintAttributes,
}

impl Paint {
    /// Creates a paint with default attributes: opaque black fill.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fill paint of the given color.
    pub fn fill(color: Color) -> Self {
        Self::new().with_color(color)
    }

    /// Creates a stroke paint of the given color and width.
    pub fn stroke(color: Color, width: f32) -> Self {
        Self::new()
            .with_color(color)
            .with_style(DrawStyle::Stroke)
            .with_stroke_width(width)
    }

    /// The attributes of the paint.
    pub fn attributes(&self) -> &PaintAttributes {
        &self.attributes
    }

    /// Sets the color.
    pub fn with_color(mut self, color: Color) -> Self {
        self.attributes.color = color;
        self
    }

    /// Scales the alpha of the color.
    pub fn with_alpha_factor(mut self, factor: f32) -> Self {
        self.attributes.color = self.attributes.color.with_alpha_factor(factor);
        self
    }

    /// Sets the draw style.
    pub fn with_style(mut self, style: DrawStyle) -> Self {
        self.attributes.style = style;
        self
    }

    /// Sets the stroke width.
    pub fn with_stroke_width(mut self, width: f32) -> Self {
        self.attributes.stroke_width = width;
        self
    }

    /// Sets the stroke cap.
    pub fn with_stroke_cap(mut self, cap: Cap) -> Self {
        self.attributes.stroke_cap = cap;
        self
    }

    /// Sets the stroke join.
    pub fn with_stroke_join(mut self, join: Join) -> Self {
        self.attributes.stroke_join = join;
        self
    }

    /// Sets the miter limit.
    pub fn with_stroke_miter(mut self, limit: f32) -> Self {
        self.attributes.stroke_miter = limit;
        self
    }

    /// Sets the blend mode.
    pub fn with_blend_mode(mut self, mode: impl Into<BlendMode>) -> Self {
        self.attributes.blend_mode = mode.into();
        self
    }

    /// Sets anti-aliasing.
    pub fn with_anti_alias(mut self, anti_alias: bool) -> Self {
        self.attributes.anti_alias = anti_alias;
        self
    }

    /// Sets dithering.
    pub fn with_dither(mut self, dither: bool) -> Self {
        self.attributes.dither = dither;
        self
    }

    /// Sets color inversion.
    pub fn with_invert_colors(mut self, invert: bool) -> Self {
        self.attributes.invert_colors = invert;
        self
    }

    /// Sets the color source.
    pub fn with_color_source(mut self, source: Option<Arc<ColorSource>>) -> Self {
        self.attributes.color_source = source;
        self
    }

    /// Sets the color filter.
    pub fn with_color_filter(mut self, filter: Option<Arc<ColorFilter>>) -> Self {
        self.attributes.color_filter = filter;
        self
    }

    /// Sets the image filter.
    pub fn with_image_filter(mut self, filter: Option<Arc<ImageFilter>>) -> Self {
        self.attributes.image_filter = filter;
        self
    }

    /// Sets the mask filter.
    pub fn with_mask_filter(mut self, filter: Option<Arc<MaskFilter>>) -> Self {
        self.attributes.mask_filter = filter;
        self
    }

    /// Sets the path effect.
    pub fn with_path_effect(mut self, effect: Option<Arc<PathEffect>>) -> Self {
        self.attributes.path_effect = effect;
        self
    }

    /// Sets the blender.
    pub fn with_blender(mut self, blender: Option<Arc<Blender>>) -> Self {
        self.attributes.blender = blender;
        self
    }
}

impl From<PaintAttributes> for Paint {
    fn from(attributes: PaintAttributes) -> Self {
        Self { attributes }
    }
}

/// An imperative drawing interface.
///
/// Unlike [`Dispatcher`], every drawing call carries its own [`Paint`].
#[allow(missing_docs, reason = "The methods mirror the recorded operations.")]
pub trait Canvas {
    fn save(&mut self);
    fn save_layer(
        &mut self,
        bounds: Option<Rect>,
        paint: Option<&Paint>,
        backdrop: Option<Arc<ImageFilter>>,
    );
    fn restore(&mut self);
    /// The number of saves awaiting a restore.
    fn save_count(&self) -> usize;
    /// Restores until only `count` saves remain.
    fn restore_to_count(&mut self, count: usize) {
        let mut remaining = self.save_count();
        while remaining > count {
            self.restore();
            let now = self.save_count();
            if now >= remaining {
                break;
            }
            remaining = now;
        }
    }

    fn translate(&mut self, tx: f64, ty: f64);
    fn scale(&mut self, sx: f64, sy: f64);
    fn rotate(&mut self, degrees: f64);
    fn skew(&mut self, sx: f64, sy: f64);
    fn concat(&mut self, matrix: Affine);
    fn concat_44(&mut self, matrix: &Matrix4);
    fn set_matrix(&mut self, matrix: Affine);
    fn reset_matrix(&mut self);

    fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool);
    fn clip_rrect(&mut self, rrect: RoundedRect, op: ClipOp, anti_alias: bool);
    fn clip_path(&mut self, path: &BezPath, op: ClipOp, anti_alias: bool);

    fn draw_paint(&mut self, paint: &Paint);
    fn draw_color(&mut self, color: Color, mode: BlendMode);
    fn draw_line(&mut self, p0: Point, p1: Point, paint: &Paint);
    fn draw_rect(&mut self, rect: Rect, paint: &Paint);
    fn draw_oval(&mut self, bounds: Rect, paint: &Paint);
    fn draw_circle(&mut self, center: Point, radius: f64, paint: &Paint);
    fn draw_rrect(&mut self, rrect: RoundedRect, paint: &Paint);
    fn draw_drrect(&mut self, outer: RoundedRect, inner: RoundedRect, paint: &Paint);
    fn draw_path(&mut self, path: &BezPath, paint: &Paint);
    fn draw_arc(
        &mut self,
        bounds: Rect,
        start_degrees: f64,
        sweep_degrees: f64,
        use_center: bool,
        paint: &Paint,
    );
    fn draw_points(&mut self, mode: PointMode, points: &[Point], paint: &Paint);
    fn draw_vertices(&mut self, vertices: &Arc<Vertices>, mode: BlendMode, paint: &Paint);
    fn draw_image(
        &mut self,
        image: &DlImage,
        point: Point,
        sampling: ImageSampling,
        paint: Option<&Paint>,
    );
    fn draw_image_rect(
        &mut self,
        image: &DlImage,
        src: Rect,
        dst: Rect,
        sampling: ImageSampling,
        paint: Option<&Paint>,
        constraint: SrcRectConstraint,
    );
    fn draw_image_nine(
        &mut self,
        image: &DlImage,
        center: IRect,
        dst: Rect,
        filter: FilterMode,
        paint: Option<&Paint>,
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
        paint: Option<&Paint>,
    );
    fn draw_display_list(&mut self, list: &Arc<DisplayList>, opacity: f32);
    fn draw_text_blob(&mut self, blob: &Arc<TextBlob>, x: f64, y: f64, paint: &Paint);
    fn draw_shadow(
        &mut self,
        path: &BezPath,
        color: Color,
        elevation: f64,
        transparent_occluder: bool,
        dpr: f64,
    );
}

/// Records [`Canvas`] calls into a [`DisplayListBuilder`].
///
/// Once [`finish`](Self::finish) has produced the list, the recorder no
/// longer has a builder: further calls are ignored with a warning.
#[derive(Debug)]
pub struct CanvasRecorder {
    builder: Option<DisplayListBuilder>,
}

impl Default for CanvasRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasRecorder {
    /// Creates a recorder with a default builder.
    pub fn new() -> Self {
        Self::from_builder(DisplayListBuilder::new())
    }

    /// Creates a recorder with a builder configured by `options`.
    pub fn with_options(options: BuilderOptions) -> Self {
        Self::from_builder(DisplayListBuilder::with_options(options))
    }

    /// Creates a recorder around an existing builder.
    pub fn from_builder(builder: DisplayListBuilder) -> Self {
        Self {
            builder: Some(builder),
        }
    }

    /// The underlying builder, unless recording has finished.
    pub fn builder(&self) -> Option<&DisplayListBuilder> {
        self.builder.as_ref()
    }

    /// Whether [`finish`](Self::finish) was called.
    pub fn is_finished(&self) -> bool {
        self.builder.is_none()
    }

    /// Builds the recorded list.
    ///
    /// Fails with [`Error::RecorderFinished`] if the list was already built.
    pub fn finish(&mut self) -> Result<Arc<DisplayList>, Error> {
        let builder = self.builder.take().ok_or(Error::RecorderFinished)?;
        Ok(builder.build())
    }

    fn builder_mut(&mut self) -> Option<&mut DisplayListBuilder> {
        if self.builder.is_none() {
            log::warn!("canvas recorder used after finish, ignoring");
        }
        self.builder.as_mut()
    }

    fn with_builder(&mut self, record: impl FnOnce(&mut DisplayListBuilder)) {
        if let Some(builder) = self.builder_mut() {
            record(builder);
        }
    }

    fn with_paint(
        &mut self,
        paint: &Paint,
        flags: AttributeFlags,
        record: impl FnOnce(&mut DisplayListBuilder),
    ) {
        if let Some(builder) = self.builder_mut() {
            builder.set_attributes_from(paint.attributes(), flags);
            record(builder);
        }
    }

    /// Records an image draw, with the paint attributes when there is a paint.
    fn with_image_paint(
        &mut self,
        paint: Option<&Paint>,
        flags: AttributeFlags,
        record: impl FnOnce(&mut DisplayListBuilder, bool),
    ) {
        if let Some(builder) = self.builder_mut() {
            if let Some(paint) = paint {
                builder.set_attributes_from(paint.attributes(), flags);
            }
            record(builder, paint.is_some());
        }
    }
}

impl Canvas for CanvasRecorder {
    fn save(&mut self) {
        self.with_builder(Dispatcher::save);
    }

    fn save_layer(
        &mut self,
        bounds: Option<Rect>,
        paint: Option<&Paint>,
        backdrop: Option<Arc<ImageFilter>>,
    ) {
        self.with_image_paint(
            paint,
            AttributeFlags::SAVE_LAYER_WITH_PAINT,
            |builder, with_attributes| {
                let options = if with_attributes {
                    SaveLayerOptions::WITH_ATTRIBUTES
                } else {
                    SaveLayerOptions::NO_ATTRIBUTES
                };
                builder.save_layer(bounds, options, backdrop);
            },
        );
    }

    fn restore(&mut self) {
        self.with_builder(Dispatcher::restore);
    }

    fn save_count(&self) -> usize {
        self.builder.as_ref().map_or(0, DisplayListBuilder::save_count)
    }

    fn translate(&mut self, tx: f64, ty: f64) {
        self.with_builder(|b| b.translate(tx, ty));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.with_builder(|b| b.scale(sx, sy));
    }

    fn rotate(&mut self, degrees: f64) {
        self.with_builder(|b| b.rotate(degrees));
    }

    fn skew(&mut self, sx: f64, sy: f64) {
        self.with_builder(|b| b.skew(sx, sy));
    }

    fn concat(&mut self, matrix: Affine) {
        self.with_builder(|b| b.transform(matrix));
    }

    fn concat_44(&mut self, matrix: &Matrix4) {
        self.with_builder(|b| b.transform_full_perspective(matrix));
    }

    fn set_matrix(&mut self, matrix: Affine) {
        self.with_builder(|b| {
            b.transform_reset();
            b.transform(matrix);
        });
    }

    fn reset_matrix(&mut self) {
        self.with_builder(Dispatcher::transform_reset);
    }

    fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool) {
        self.with_builder(|b| b.clip_rect(rect, op, anti_alias));
    }

    fn clip_rrect(&mut self, rrect: RoundedRect, op: ClipOp, anti_alias: bool) {
        self.with_builder(|b| b.clip_rrect(rrect, op, anti_alias));
    }

    fn clip_path(&mut self, path: &BezPath, op: ClipOp, anti_alias: bool) {
        self.with_builder(|b| b.clip_path(path, op, anti_alias));
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_PAINT, Dispatcher::draw_paint);
    }

    fn draw_color(&mut self, color: Color, mode: BlendMode) {
        self.with_builder(|b| b.draw_color(color, mode));
    }

    fn draw_line(&mut self, p0: Point, p1: Point, paint: &Paint) {
        self.with_paint(paint, line_flags(p0, p1), |b| b.draw_line(p0, p1));
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_RECT, |b| b.draw_rect(rect));
    }

    fn draw_oval(&mut self, bounds: Rect, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_OVAL, |b| b.draw_oval(bounds));
    }

    fn draw_circle(&mut self, center: Point, radius: f64, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_CIRCLE, |b| {
            b.draw_circle(center, radius);
        });
    }

    fn draw_rrect(&mut self, rrect: RoundedRect, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_RRECT, |b| b.draw_rrect(rrect));
    }

    fn draw_drrect(&mut self, outer: RoundedRect, inner: RoundedRect, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_DRRECT, |b| {
            b.draw_drrect(outer, inner);
        });
    }

    fn draw_path(&mut self, path: &BezPath, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_PATH, |b| b.draw_path(path));
    }

    fn draw_arc(
        &mut self,
        bounds: Rect,
        start_degrees: f64,
        sweep_degrees: f64,
        use_center: bool,
        paint: &Paint,
    ) {
        let flags = if use_center {
            AttributeFlags::DRAW_ARC_WITH_CENTER
        } else {
            AttributeFlags::DRAW_ARC_NO_CENTER
        };
        self.with_paint(paint, flags, |b| {
            b.draw_arc(bounds, start_degrees, sweep_degrees, use_center);
        });
    }

    fn draw_points(&mut self, mode: PointMode, points: &[Point], paint: &Paint) {
        self.with_paint(paint, points_flags(mode), |b| b.draw_points(mode, points));
    }

    fn draw_vertices(&mut self, vertices: &Arc<Vertices>, mode: BlendMode, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_VERTICES, |b| {
            b.draw_vertices(vertices, mode);
        });
    }

    fn draw_image(
        &mut self,
        image: &DlImage,
        point: Point,
        sampling: ImageSampling,
        paint: Option<&Paint>,
    ) {
        self.with_image_paint(
            paint,
            AttributeFlags::DRAW_IMAGE_WITH_PAINT,
            |b, with_attributes| b.draw_image(image, point, sampling, with_attributes),
        );
    }

    fn draw_image_rect(
        &mut self,
        image: &DlImage,
        src: Rect,
        dst: Rect,
        sampling: ImageSampling,
        paint: Option<&Paint>,
        constraint: SrcRectConstraint,
    ) {
        self.with_image_paint(
            paint,
            AttributeFlags::DRAW_IMAGE_WITH_PAINT,
            |b, with_attributes| {
                b.draw_image_rect(image, src, dst, sampling, with_attributes, constraint);
            },
        );
    }

    fn draw_image_nine(
        &mut self,
        image: &DlImage,
        center: IRect,
        dst: Rect,
        filter: FilterMode,
        paint: Option<&Paint>,
    ) {
        self.with_image_paint(
            paint,
            AttributeFlags::DRAW_IMAGE_NINE_WITH_PAINT,
            |b, with_attributes| b.draw_image_nine(image, center, dst, filter, with_attributes),
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
        paint: Option<&Paint>,
    ) {
        self.with_image_paint(
            paint,
            AttributeFlags::DRAW_ATLAS_WITH_PAINT,
            |b, with_attributes| {
                b.draw_atlas(
                    atlas,
                    xforms,
                    tex,
                    colors,
                    mode,
                    sampling,
                    cull_rect,
                    with_attributes,
                );
            },
        );
    }

    fn draw_display_list(&mut self, list: &Arc<DisplayList>, opacity: f32) {
        self.with_builder(|b| b.draw_display_list(list, opacity));
    }

    fn draw_text_blob(&mut self, blob: &Arc<TextBlob>, x: f64, y: f64, paint: &Paint) {
        self.with_paint(paint, AttributeFlags::DRAW_TEXT_BLOB, |b| {
            b.draw_text_blob(blob, x, y);
        });
    }

    fn draw_shadow(
        &mut self,
        path: &BezPath,
        color: Color,
        elevation: f64,
        transparent_occluder: bool,
        dpr: f64,
    ) {
        self.with_builder(|b| b.draw_shadow(path, color, elevation, transparent_occluder, dpr));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Canvas, CanvasRecorder, Paint};
    use crate::attributes::DrawStyle;
    use crate::kurbo::{Point, Rect};
    use crate::op::DlOp;
    use crate::peniko::Color;
    use crate::Error;

    const RED: Color = Color::rgba8(255, 0, 0, 255);

    #[test]
    fn paint_attributes_are_recorded() {
        let mut recorder = CanvasRecorder::new();
        recorder.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), &Paint::fill(RED));
        recorder.draw_line(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            &Paint::stroke(Color::BLACK, 2.0),
        );
        let list = recorder.finish().unwrap();
        let ops = list.ops();
        assert!(matches!(ops[0].op, DlOp::DrawRect(_)));
        let fill = ops[0].attributes.as_ref().unwrap();
        assert_eq!(fill.color, RED);
        assert_eq!(fill.style, DrawStyle::Fill);
        let stroke = ops[1].attributes.as_ref().unwrap();
        assert_eq!(stroke.stroke_width, 2.0);
        assert_eq!(stroke.color, Color::BLACK);
    }

    #[test]
    fn image_without_paint_records_no_attributes() {
        let image = crate::geometry::DlImage::from_premul_rgba8(1, 1, vec![0_u8; 4]).unwrap();
        let mut recorder = CanvasRecorder::new();
        recorder.draw_image(&image, Point::ORIGIN, Default::default(), None);
        recorder.draw_image(
            &image,
            Point::ORIGIN,
            Default::default(),
            Some(&Paint::new().with_alpha_factor(0.5)),
        );
        let list = recorder.finish().unwrap();
        assert!(list.ops()[0].attributes.is_none());
        let attributes = list.ops()[1].attributes.as_ref().unwrap();
        assert!(attributes.color.a < 255);
    }

    #[test]
    fn recorder_fails_safely_after_finish() {
        let mut recorder = CanvasRecorder::new();
        recorder.save();
        recorder.restore();
        let list = recorder.finish().unwrap();
        assert_eq!(list.op_count(), 2);
        assert!(recorder.is_finished());

        // Calls after finish are ignored.
        recorder.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Paint::new());
        recorder.save();
        assert_eq!(recorder.save_count(), 0);
        assert!(matches!(recorder.finish(), Err(Error::RecorderFinished)));
        assert_eq!(Arc::strong_count(&list), 1);
    }

    #[test]
    fn restore_to_count_unwinds() {
        let mut recorder = CanvasRecorder::new();
        recorder.save();
        recorder.save_layer(None, Some(&Paint::new().with_alpha_factor(0.5)), None);
        recorder.save();
        assert_eq!(recorder.save_count(), 3);
        recorder.restore_to_count(1);
        assert_eq!(recorder.save_count(), 1);
        recorder.restore();
        assert_eq!(recorder.finish().unwrap().op_count(), 6);
    }
}
