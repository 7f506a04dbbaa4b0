// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A software canvas drawing display lists into a tiny-skia pixmap.

use std::sync::Arc;

use tiny_skia::{
    FillRule, FilterQuality, Mask, Path, Pattern, Pixmap, PixmapPaint, SpreadMode, Transform,
};
use vello_display_list::attributes::SRC_OVER;
use vello_display_list::flags::AttributeFlags;
use vello_display_list::kurbo::{
    self, Affine, BezPath, Cap, Circle, Ellipse, Join, Point, Rect, RoundedRect, Shape, Vec2,
};
use vello_display_list::peniko::{BlendMode, Color};
use vello_display_list::{
    Blender, BlurStyle, Canvas, ClipOp, ColorFilter, ColorSource, Dispatcher, DisplayList,
    DlImage, DrawStyle, FilterMode, IRect, ImageFilter, ImageSampling, Matrix4, MaskFilter, Paint,
    PaintAttributes, PathEffect, PointMode, RSTransform, SaveLayerOptions, SrcRectConstraint,
    TextBlob, TileMode, Vertices,
};

use crate::{convert, filter, Error};

/// Accuracy of curve flattening, in local units.
const TOLERANCE: f64 = 0.1;

/// Options for creating a [`CpuCanvas`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CpuCanvasOptions {
    /// Width of the surface in pixels.
    pub width: u32,
    /// Height of the surface in pixels.
    pub height: u32,
    /// The color the surface starts with.
    pub background: Color,
}

impl Default for CpuCanvasOptions {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            background: Color::TRANSPARENT,
        }
    }
}

#[derive(Clone)]
struct State {
    attributes: PaintAttributes,
    matrix: Affine,
    clip: Option<Mask>,
}

/// Effects applied to the content of a layer before it is composited.
#[derive(Default)]
struct Effects {
    mask_blur: Option<Arc<ImageFilter>>,
    color_filter: Option<Arc<ColorFilter>>,
    invert: bool,
    image_filter: Option<Arc<ImageFilter>>,
}

impl Effects {
    fn from_attributes(attributes: &PaintAttributes, flags: AttributeFlags) -> Self {
        let mut effects = Self::default();
        if flags.ignores_paint() {
            return effects;
        }
        if flags.applies_mask_filter() {
            if let Some(MaskFilter::Blur { style, sigma }) = attributes.mask_filter.as_deref() {
                if *style != BlurStyle::Normal {
                    log::warn!("only normal blur mask filters are supported, got {style:?}");
                }
                effects.mask_blur = ImageFilter::blur(*sigma, *sigma, TileMode::Decal);
            }
        }
        if flags.applies_color_filter() {
            effects.color_filter = attributes.color_filter.clone();
            effects.invert = attributes.invert_colors;
        }
        if flags.applies_image_filter() {
            effects.image_filter = attributes.image_filter.clone();
        }
        effects
    }

    fn is_empty(&self) -> bool {
        self.mask_blur.is_none()
            && self.color_filter.is_none()
            && !self.invert
            && self.image_filter.is_none()
    }

    fn apply(&self, mut content: Pixmap, matrix: &Affine) -> Pixmap {
        if let Some(blur) = &self.mask_blur {
            content = filter::apply_image_filter(content, blur, matrix);
        }
        if let Some(color_filter) = &self.color_filter {
            filter::apply_color_filter(&mut content, color_filter);
        }
        if self.invert {
            filter::invert_colors(&mut content);
        }
        if let Some(image_filter) = &self.image_filter {
            content = filter::apply_image_filter(content, image_filter, matrix);
        }
        content
    }
}

struct Layer {
    /// The surface the layer composites onto when restored.
    parent: Pixmap,
    opacity: f32,
    blend: tiny_skia::BlendMode,
    effects: Effects,
    /// The transform at the time the layer was saved, used by its filters.
    matrix: Affine,
}

struct SaveEntry {
    state: State,
    layer: Option<Layer>,
}

/// Draws display lists, or [`Canvas`] calls, into a [`Pixmap`].
///
/// The canvas implements both [`Dispatcher`], so that a [`DisplayList`] can be
/// played back onto it, and [`Canvas`], so that the same content can be drawn
/// directly. Layers are rendered into full size offscreen pixmaps.
///
/// Features without a software rendition (perspective, arithmetic blenders,
/// non-normal blur styles and a few more) are drawn approximately and logged.
pub struct CpuCanvas {
    options: CpuCanvasOptions,
    pixmap: Pixmap,
    state: State,
    saves: Vec<SaveEntry>,
}

impl std::fmt::Debug for CpuCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuCanvas")
            .field("options", &self.options)
            .field("matrix", &self.state.matrix)
            .field("saves", &self.saves.len())
            .finish_non_exhaustive()
    }
}

impl CpuCanvas {
    /// Creates a canvas with a surface filled with the background color.
    pub fn new(options: CpuCanvasOptions) -> Result<Self, Error> {
        let mut pixmap = Pixmap::new(options.width, options.height).ok_or(Error::InvalidSize {
            width: options.width,
            height: options.height,
        })?;
        pixmap.fill(convert::color(options.background));
        Ok(Self {
            options,
            pixmap,
            state: State {
                attributes: PaintAttributes::default(),
                matrix: Affine::IDENTITY,
                clip: None,
            },
            saves: Vec::new(),
        })
    }

    /// The options the canvas was created with.
    pub fn options(&self) -> &CpuCanvasOptions {
        &self.options
    }

    /// The current transform.
    pub fn matrix(&self) -> Affine {
        self.state.matrix
    }

    /// The surface drawn so far.
    ///
    /// Content of layers that haven't been restored is not included.
    pub fn surface(&self) -> &Pixmap {
        self.saves
            .iter()
            .find_map(|entry| entry.layer.as_ref())
            .map_or(&self.pixmap, |layer| &layer.parent)
    }

    /// Plays `list` back onto the canvas with a group opacity.
    ///
    /// Fails like [`DisplayList::render`] when the list can't take the opacity
    /// without a layer; see [`Dispatcher::draw_display_list`] for drawing it
    /// through one instead.
    pub fn render(&mut self, list: &DisplayList, opacity: f32) -> Result<(), Error> {
        list.render(self, opacity)?;
        Ok(())
    }

    /// Restores any unbalanced saves and returns the surface.
    pub fn finish(mut self) -> Pixmap {
        if !self.saves.is_empty() {
            log::warn!("{} saves without a matching restore", self.saves.len());
            self.restore_to(0);
        }
        self.pixmap
    }

    fn push_save(&mut self, layer: Option<Layer>) {
        self.saves.push(SaveEntry {
            state: self.state.clone(),
            layer,
        });
    }

    fn pop_save(&mut self) {
        let Some(entry) = self.saves.pop() else {
            log::warn!("restore without a matching save, ignoring");
            return;
        };
        self.state = entry.state;
        if let Some(layer) = entry.layer {
            let content = std::mem::replace(&mut self.pixmap, layer.parent);
            let content = layer.effects.apply(content, &layer.matrix);
            let paint = PixmapPaint {
                opacity: layer.opacity,
                blend_mode: layer.blend,
                quality: FilterQuality::Nearest,
            };
            self.pixmap.draw_pixmap(
                0,
                0,
                content.as_ref(),
                &paint,
                Transform::identity(),
                self.state.clip.as_ref(),
            );
        }
    }

    fn restore_to(&mut self, depth: usize) {
        while self.saves.len() > depth {
            self.pop_save();
        }
    }

    /// Redirects drawing into a new transparent layer.
    fn open_layer(
        &mut self,
        opacity: f32,
        blend: tiny_skia::BlendMode,
        effects: Effects,
        bounds: Option<Rect>,
        backdrop: Option<&ImageFilter>,
    ) {
        let Some(content) = Pixmap::new(self.pixmap.width(), self.pixmap.height()) else {
            log::warn!("can't allocate a layer, drawing into the parent");
            self.push_save(None);
            return;
        };
        let parent = std::mem::replace(&mut self.pixmap, content);
        let matrix = self.state.matrix;
        self.push_save(Some(Layer {
            parent,
            opacity: opacity.clamp(0.0, 1.0),
            blend,
            effects,
            matrix,
        }));
        if let Some(bounds) = bounds {
            self.clip_shape(&bounds.to_path(TOLERANCE), ClipOp::Intersect, false);
        }
        if let Some(backdrop) = backdrop {
            let Some(parent) = self
                .saves
                .last()
                .and_then(|entry| entry.layer.as_ref())
                .map(|layer| layer.parent.clone())
            else {
                return;
            };
            let filtered = filter::apply_image_filter(parent, backdrop, &matrix);
            let paint = PixmapPaint {
                blend_mode: tiny_skia::BlendMode::Source,
                ..PixmapPaint::default()
            };
            self.pixmap.draw_pixmap(
                0,
                0,
                filtered.as_ref(),
                &paint,
                Transform::identity(),
                self.state.clip.as_ref(),
            );
        }
    }

    fn save_layer_with(
        &mut self,
        bounds: Option<Rect>,
        attributes: Option<&PaintAttributes>,
        backdrop: Option<&ImageFilter>,
    ) {
        match attributes {
            Some(attributes) => self.open_layer(
                f32::from(attributes.color.a) / 255.0,
                convert::effective_blend(attributes),
                Effects::from_attributes(attributes, AttributeFlags::SAVE_LAYER_WITH_PAINT),
                bounds,
                backdrop,
            ),
            None => self.open_layer(
                1.0,
                tiny_skia::BlendMode::SourceOver,
                Effects::default(),
                bounds,
                backdrop,
            ),
        }
    }

    /// Runs `draw` with `attributes`, through a layer when they carry effects.
    ///
    /// Inside the layer the draw uses plain source-over attributes; the
    /// effects and the blend mode apply when the layer is composited.
    fn with_effects(
        &mut self,
        attributes: &PaintAttributes,
        flags: AttributeFlags,
        draw: impl FnOnce(&mut Self, &PaintAttributes),
    ) {
        // Only what the operation uses, so direct and replayed drawing agree.
        let attributes = &attributes.masked(flags);
        let effects = Effects::from_attributes(attributes, flags);
        if effects.is_empty() {
            draw(self, attributes);
            return;
        }
        let mut plain = attributes.clone();
        plain.mask_filter = None;
        plain.color_filter = None;
        plain.invert_colors = false;
        plain.image_filter = None;
        plain.blend_mode = SRC_OVER;
        plain.blender = None;
        let depth = self.saves.len();
        self.open_layer(
            1.0,
            convert::effective_blend(attributes),
            effects,
            None,
            None,
        );
        draw(self, &plain);
        self.restore_to(depth);
    }

    fn concat_matrix(&mut self, matrix: Affine) {
        self.state.matrix *= matrix;
    }

    fn concat_matrix4(&mut self, m: &Matrix4) {
        let [mxx, mxy, _, mxt, myx, myy, _, myt, _, _, _, _, mwx, mwy, _, mwt] = *m;
        if mwx != 0.0 || mwy != 0.0 || mwt != 1.0 {
            log::warn!("perspective transforms are not supported, using the affine part");
        }
        self.concat_matrix(Affine::new([mxx, myx, mxy, myy, mxt, myt]));
    }

    fn clip_shape(&mut self, shape: &BezPath, op: ClipOp, anti_alias: bool) {
        let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) else {
            return;
        };
        if let Some(path) = convert::path(shape) {
            mask.fill_path(
                &path,
                convert::FILL_RULE,
                anti_alias,
                convert::transform(self.state.matrix),
            );
        }
        if op == ClipOp::Difference {
            for coverage in mask.data_mut() {
                *coverage = 255 - *coverage;
            }
        }
        if let Some(current) = &self.state.clip {
            for (coverage, existing) in mask.data_mut().iter_mut().zip(current.data()) {
                *coverage = ((u16::from(*coverage) * u16::from(*existing) + 127) / 255) as u8;
            }
        }
        self.state.clip = Some(mask);
    }

    /// Fills and strokes `path` the way `attributes` ask for.
    fn paint_path(
        &mut self,
        path: &Path,
        attributes: &PaintAttributes,
        fill: Option<FillRule>,
        stroke: bool,
    ) {
        let paint = tiny_skia::Paint {
            shader: convert::shader(attributes),
            blend_mode: convert::effective_blend(attributes),
            anti_alias: attributes.anti_alias,
            ..tiny_skia::Paint::default()
        };
        let transform = convert::transform(self.state.matrix);
        let clip = self.state.clip.as_ref();
        if let Some(rule) = fill {
            self.pixmap.fill_path(path, &paint, rule, transform, clip);
        }
        if stroke {
            self.pixmap
                .stroke_path(path, &paint, &convert::stroke(attributes), transform, clip);
        }
    }

    fn draw_shape(
        &mut self,
        shape: &BezPath,
        attributes: &PaintAttributes,
        flags: AttributeFlags,
        rule: FillRule,
    ) {
        let Some(path) = convert::path(shape) else {
            return;
        };
        let stroked = flags.is_stroked(attributes.style);
        let filled = !stroked || attributes.style == DrawStyle::StrokeAndFill;
        self.with_effects(attributes, flags, |canvas, attributes| {
            canvas.paint_path(&path, attributes, filled.then_some(rule), stroked);
        });
    }

    fn draw_line_with(&mut self, p0: Point, p1: Point, attributes: &PaintAttributes) {
        let flags = if p0.x == p1.x || p0.y == p1.y {
            AttributeFlags::DRAW_HV_LINE
        } else {
            AttributeFlags::DRAW_LINE
        };
        let mut line = BezPath::new();
        line.move_to(p0);
        line.line_to(p1);
        self.draw_shape(&line, attributes, flags, convert::FILL_RULE);
    }

    fn draw_arc_with(
        &mut self,
        bounds: Rect,
        start_degrees: f64,
        sweep_degrees: f64,
        use_center: bool,
        attributes: &PaintAttributes,
    ) {
        let bounds = bounds.abs();
        let arc = kurbo::Arc {
            center: bounds.center(),
            radii: Vec2::new(bounds.width() / 2.0, bounds.height() / 2.0),
            start_angle: start_degrees.to_radians(),
            sweep_angle: sweep_degrees.to_radians(),
            x_rotation: 0.0,
        };
        let start = arc.center
            + Vec2::new(
                arc.radii.x * arc.start_angle.cos(),
                arc.radii.y * arc.start_angle.sin(),
            );
        let mut shape = BezPath::new();
        if use_center {
            shape.move_to(arc.center);
            shape.line_to(start);
        } else {
            shape.move_to(start);
        }
        for el in arc.append_iter(TOLERANCE) {
            shape.push(el);
        }
        let flags = if use_center {
            shape.close_path();
            AttributeFlags::DRAW_ARC_WITH_CENTER
        } else {
            AttributeFlags::DRAW_ARC_NO_CENTER
        };
        self.draw_shape(&shape, attributes, flags, convert::FILL_RULE);
    }

    fn draw_points_with(&mut self, mode: PointMode, points: &[Point], attributes: &PaintAttributes) {
        let mut shape = BezPath::new();
        let flags = match mode {
            PointMode::Points => {
                self.draw_dots(points, attributes);
                return;
            }
            PointMode::Lines => {
                for pair in points.chunks_exact(2) {
                    shape.move_to(pair[0]);
                    shape.line_to(pair[1]);
                }
                AttributeFlags::DRAW_POINTS_AS_LINES
            }
            PointMode::Polygon => {
                for (i, p) in points.iter().enumerate() {
                    if i == 0 {
                        shape.move_to(*p);
                    } else {
                        shape.line_to(*p);
                    }
                }
                AttributeFlags::DRAW_POINTS_AS_POLYGON
            }
        };
        self.draw_shape(&shape, attributes, flags, convert::FILL_RULE);
    }

    /// Draws each point as a dot the size of the stroke width.
    ///
    /// Hairline dots cover a single device pixel.
    fn draw_dots(&mut self, points: &[Point], attributes: &PaintAttributes) {
        let hairline = attributes.stroke_width <= 0.0;
        let half = f64::from(attributes.stroke_width) / 2.0;
        let mut dots = BezPath::new();
        for p in points {
            let dot = if hairline {
                let device = self.state.matrix * *p;
                Rect::from_center_size(device, (1.0, 1.0)).to_path(TOLERANCE)
            } else if attributes.stroke_cap == Cap::Round {
                Circle::new(*p, half).to_path(TOLERANCE)
            } else {
                Rect::from_center_size(*p, (2.0 * half, 2.0 * half)).to_path(TOLERANCE)
            };
            dots.extend(dot);
        }
        let Some(path) = convert::path(&dots) else {
            return;
        };
        self.with_effects(
            attributes,
            AttributeFlags::DRAW_POINTS_AS_POINTS,
            |canvas, attributes| {
                if hairline {
                    let matrix = std::mem::replace(&mut canvas.state.matrix, Affine::IDENTITY);
                    canvas.paint_path(&path, attributes, Some(convert::FILL_RULE), false);
                    canvas.state.matrix = matrix;
                } else {
                    canvas.paint_path(&path, attributes, Some(convert::FILL_RULE), false);
                }
            },
        );
    }

    fn draw_vertices_with(&mut self, vertices: &Vertices, attributes: &PaintAttributes) {
        let positions = vertices.positions();
        let colors = vertices.colors();
        if colors.is_some() {
            log::debug!("vertex colors are drawn flat per triangle");
        }
        self.with_effects(
            attributes,
            AttributeFlags::DRAW_VERTICES,
            |canvas, attributes| {
                for [a, b, c] in vertices.triangles() {
                    let mut triangle = BezPath::new();
                    triangle.move_to(positions[a]);
                    triangle.line_to(positions[b]);
                    triangle.line_to(positions[c]);
                    triangle.close_path();
                    let Some(path) = convert::path(&triangle) else {
                        continue;
                    };
                    match colors {
                        Some(colors) => {
                            let mut flat = attributes.clone();
                            flat.color_source = None;
                            flat.color = average([colors[a], colors[b], colors[c]])
                                .with_alpha_factor(f32::from(attributes.color.a) / 255.0);
                            canvas.paint_path(&path, &flat, Some(convert::FILL_RULE), false);
                        }
                        None => canvas.paint_path(&path, attributes, Some(convert::FILL_RULE), false),
                    }
                }
            },
        );
    }

    /// Fills `dst` with the `src` part of `image`, in the space given by `local`.
    #[allow(clippy::too_many_arguments, reason = "Internal helper.")]
    fn fill_image(
        &mut self,
        image: &DlImage,
        src: Rect,
        dst: Rect,
        local: Affine,
        quality: FilterQuality,
        attributes: &PaintAttributes,
    ) {
        let (src, dst) = (src.abs(), dst.abs());
        if src.width() <= 0.0 || src.height() <= 0.0 {
            return;
        }
        let Some(pixmap) = convert::image(image) else {
            return;
        };
        let Some(rect) =
            tiny_skia::Rect::from_ltrb(dst.x0 as f32, dst.y0 as f32, dst.x1 as f32, dst.y1 as f32)
        else {
            return;
        };
        let pattern = Affine::translate((dst.x0, dst.y0))
            * Affine::scale_non_uniform(dst.width() / src.width(), dst.height() / src.height())
            * Affine::translate((-src.x0, -src.y0));
        let paint = tiny_skia::Paint {
            shader: Pattern::new(
                pixmap,
                SpreadMode::Pad,
                quality,
                f32::from(attributes.color.a) / 255.0,
                convert::transform(pattern),
            ),
            blend_mode: convert::effective_blend(attributes),
            anti_alias: true,
            ..tiny_skia::Paint::default()
        };
        self.pixmap.fill_rect(
            rect,
            &paint,
            convert::transform(self.state.matrix * local),
            self.state.clip.as_ref(),
        );
    }

    fn draw_image_rect_with(
        &mut self,
        image: &DlImage,
        src: Rect,
        dst: Rect,
        quality: FilterQuality,
        attributes: Option<&PaintAttributes>,
    ) {
        let plain = PaintAttributes::default();
        let attributes = attributes.unwrap_or(&plain);
        self.with_effects(
            attributes,
            AttributeFlags::DRAW_IMAGE_WITH_PAINT,
            |canvas, attributes| {
                canvas.fill_image(image, src, dst, Affine::IDENTITY, quality, attributes);
            },
        );
    }

    fn draw_image_nine_with(
        &mut self,
        image: &DlImage,
        center: IRect,
        dst: Rect,
        quality: FilterQuality,
        attributes: Option<&PaintAttributes>,
    ) {
        let dst = dst.abs();
        let (width, height) = (f64::from(image.width()), f64::from(image.height()));
        let center = center.to_rect();
        let xs = nine_stops(center.x0, center.x1, width, dst.x0, dst.x1);
        let ys = nine_stops(center.y0, center.y1, height, dst.y0, dst.y1);
        let plain = PaintAttributes::default();
        let attributes = attributes.unwrap_or(&plain);
        self.with_effects(
            attributes,
            AttributeFlags::DRAW_IMAGE_NINE_WITH_PAINT,
            |canvas, attributes| {
                for row in 0..3 {
                    for column in 0..3 {
                        let (sx, dx) = (xs[column], xs[column + 1]);
                        let (sy, dy) = (ys[row], ys[row + 1]);
                        let src = Rect::new(sx.0, sy.0, dx.0, dy.0);
                        let cell = Rect::new(sx.1, sy.1, dx.1, dy.1);
                        if cell.width() <= 0.0 || cell.height() <= 0.0 {
                            continue;
                        }
                        canvas.fill_image(image, src, cell, Affine::IDENTITY, quality, attributes);
                    }
                }
            },
        );
    }

    #[allow(clippy::too_many_arguments, reason = "Mirrors the recorded operation.")]
    fn draw_atlas_with(
        &mut self,
        atlas: &DlImage,
        xforms: &[RSTransform],
        tex: &[Rect],
        colors: Option<&[Color]>,
        quality: FilterQuality,
        attributes: Option<&PaintAttributes>,
    ) {
        if colors.is_some() {
            log::warn!("atlas sprite colors are not supported, drawing the plain sprites");
        }
        let plain = PaintAttributes::default();
        let attributes = attributes.unwrap_or(&plain);
        self.with_effects(
            attributes,
            AttributeFlags::DRAW_ATLAS_WITH_PAINT,
            |canvas, attributes| {
                for (xform, sprite) in xforms.iter().zip(tex) {
                    let dst = Rect::from_origin_size(Point::ORIGIN, sprite.size());
                    canvas.fill_image(atlas, *sprite, dst, xform.to_affine(), quality, attributes);
                }
            },
        );
    }

    fn draw_paint_with(&mut self, attributes: &PaintAttributes) {
        let device = Rect::new(
            0.0,
            0.0,
            f64::from(self.pixmap.width()),
            f64::from(self.pixmap.height()),
        );
        let det = self.state.matrix.determinant();
        if !det.is_finite() || det == 0.0 {
            return;
        }
        // Covers the surface in local space, so that shaders keep their transform.
        let local = self.state.matrix.inverse().transform_rect_bbox(device);
        self.draw_shape(
            &local.to_path(TOLERANCE),
            attributes,
            AttributeFlags::DRAW_PAINT,
            convert::FILL_RULE,
        );
    }

    fn draw_text_blob_with(&mut self, blob: &TextBlob, x: f64, y: f64, attributes: &PaintAttributes) {
        let mut outlines = blob.outlines().clone();
        outlines.apply_affine(Affine::translate((x, y)));
        self.draw_shape(
            &outlines,
            attributes,
            AttributeFlags::DRAW_TEXT_BLOB,
            convert::FILL_RULE,
        );
    }

    /// Draws the shadow of `path` as a blurred, offset silhouette.
    fn draw_shadow_with(&mut self, path: &BezPath, color: Color, elevation: f64, dpr: f64) {
        let z = (elevation * dpr).abs();
        if !z.is_finite() {
            log::warn!("shadow elevation {elevation} is not finite, skipping");
            return;
        }
        let mut silhouette = path.clone();
        silhouette.apply_affine(Affine::translate((0.0, z / 2.0)));
        let Some(silhouette) = convert::path(&silhouette) else {
            return;
        };
        let sigma = (z / 4.0) as f32;
        let effects = Effects {
            mask_blur: ImageFilter::blur(sigma, sigma, TileMode::Decal),
            ..Effects::default()
        };
        let depth = self.saves.len();
        self.open_layer(
            1.0,
            tiny_skia::BlendMode::SourceOver,
            effects,
            None,
            None,
        );
        let attributes = PaintAttributes {
            color,
            anti_alias: true,
            ..PaintAttributes::default()
        };
        self.paint_path(&silhouette, &attributes, Some(convert::FILL_RULE), false);
        self.restore_to(depth);
    }

    fn draw_color_with(&mut self, color: Color, mode: BlendMode) {
        let Some(rect) = tiny_skia::Rect::from_xywh(
            0.0,
            0.0,
            self.pixmap.width() as f32,
            self.pixmap.height() as f32,
        ) else {
            return;
        };
        let paint = tiny_skia::Paint {
            shader: tiny_skia::Shader::SolidColor(convert::color(color)),
            blend_mode: convert::blend_mode(mode),
            ..tiny_skia::Paint::default()
        };
        self.pixmap.fill_rect(
            rect,
            &paint,
            Transform::identity(),
            self.state.clip.as_ref(),
        );
    }

    /// Draws a nested list, through a layer when it can't take the opacity itself.
    fn draw_list(&mut self, list: &DisplayList, opacity: f32) {
        let outer = self.state.clone();
        let depth = self.saves.len();
        if opacity >= 1.0 {
            list.replay(self);
        } else if list.can_apply_group_opacity() {
            if let Err(err) = list.render(self, opacity) {
                log::warn!("nested display list not drawn: {err}");
            }
        } else {
            self.open_layer(
                opacity,
                tiny_skia::BlendMode::SourceOver,
                Effects::default(),
                None,
                None,
            );
            list.replay(self);
        }
        self.restore_to(depth);
        self.state = outer;
    }
}

/// The source and destination coordinates of the columns (or rows) of a nine patch.
///
/// The fixed edges shrink proportionally when the destination is too small for them.
fn nine_stops(center0: f64, center1: f64, size: f64, dst0: f64, dst1: f64) -> [(f64, f64); 4] {
    let c0 = center0.clamp(0.0, size);
    let c1 = center1.clamp(c0, size);
    let (leading, trailing) = (c0, size - c1);
    let available = dst1 - dst0;
    let scale = if leading + trailing > available && leading + trailing > 0.0 {
        available / (leading + trailing)
    } else {
        1.0
    };
    [
        (0.0, dst0),
        (c0, dst0 + leading * scale),
        (c1, dst1 - trailing * scale),
        (size, dst1),
    ]
}

fn average(colors: [Color; 3]) -> Color {
    let mean = |f: fn(&Color) -> u8| {
        let sum: u16 = colors.iter().map(|c| u16::from(f(c))).sum();
        ((sum + 1) / 3) as u8
    };
    Color::rgba8(mean(|c| c.r), mean(|c| c.g), mean(|c| c.b), mean(|c| c.a))
}

fn rrect_path(rrect: RoundedRect) -> BezPath {
    rrect.to_path(TOLERANCE)
}

fn drrect_path(outer: RoundedRect, inner: RoundedRect) -> BezPath {
    let mut shape = rrect_path(outer);
    shape.extend(rrect_path(inner));
    shape
}

impl Dispatcher for CpuCanvas {
    fn set_anti_alias(&mut self, anti_alias: bool) {
        self.state.attributes.anti_alias = anti_alias;
    }

    fn set_dither(&mut self, dither: bool) {
        self.state.attributes.dither = dither;
    }

    fn set_invert_colors(&mut self, invert: bool) {
        self.state.attributes.invert_colors = invert;
    }

    fn set_color(&mut self, color: Color) {
        self.state.attributes.color = color;
    }

    fn set_style(&mut self, style: DrawStyle) {
        self.state.attributes.style = style;
    }

    fn set_stroke_width(&mut self, width: f32) {
        self.state.attributes.stroke_width = width;
    }

    fn set_stroke_miter(&mut self, limit: f32) {
        self.state.attributes.stroke_miter = limit;
    }

    fn set_stroke_cap(&mut self, cap: Cap) {
        self.state.attributes.stroke_cap = cap;
    }

    fn set_stroke_join(&mut self, join: Join) {
        self.state.attributes.stroke_join = join;
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.attributes.blend_mode = mode;
    }

    fn set_color_source(&mut self, source: Option<Arc<ColorSource>>) {
        self.state.attributes.color_source = source;
    }

    fn set_color_filter(&mut self, filter: Option<Arc<ColorFilter>>) {
        self.state.attributes.color_filter = filter;
    }

    fn set_image_filter(&mut self, filter: Option<Arc<ImageFilter>>) {
        self.state.attributes.image_filter = filter;
    }

    fn set_mask_filter(&mut self, filter: Option<Arc<MaskFilter>>) {
        self.state.attributes.mask_filter = filter;
    }

    fn set_path_effect(&mut self, effect: Option<Arc<PathEffect>>) {
        self.state.attributes.path_effect = effect;
    }

    fn set_blender(&mut self, blender: Option<Arc<Blender>>) {
        self.state.attributes.blender = blender;
    }

    fn save(&mut self) {
        self.push_save(None);
    }

    fn save_layer(
        &mut self,
        bounds: Option<Rect>,
        options: SaveLayerOptions,
        backdrop: Option<Arc<ImageFilter>>,
    ) {
        let attributes = options
            .renders_with_attributes
            .then(|| self.state.attributes.clone());
        self.save_layer_with(bounds, attributes.as_ref(), backdrop.as_deref());
    }

    fn restore(&mut self) {
        self.pop_save();
    }

    fn translate(&mut self, tx: f64, ty: f64) {
        self.concat_matrix(Affine::translate((tx, ty)));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.concat_matrix(Affine::scale_non_uniform(sx, sy));
    }

    fn rotate(&mut self, degrees: f64) {
        self.concat_matrix(Affine::rotate(degrees.to_radians()));
    }

    fn skew(&mut self, sx: f64, sy: f64) {
        self.concat_matrix(Affine::skew(sx, sy));
    }

    fn transform(&mut self, matrix: Affine) {
        self.concat_matrix(matrix);
    }

    fn transform_full_perspective(&mut self, matrix: &Matrix4) {
        self.concat_matrix4(matrix);
    }

    fn transform_reset(&mut self) {
        self.state.matrix = Affine::IDENTITY;
    }

    fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool) {
        self.clip_shape(&rect.to_path(TOLERANCE), op, anti_alias);
    }

    fn clip_rrect(&mut self, rrect: RoundedRect, op: ClipOp, anti_alias: bool) {
        self.clip_shape(&rrect_path(rrect), op, anti_alias);
    }

    fn clip_path(&mut self, path: &BezPath, op: ClipOp, anti_alias: bool) {
        self.clip_shape(path, op, anti_alias);
    }

    fn draw_paint(&mut self) {
        let attributes = self.state.attributes.clone();
        self.draw_paint_with(&attributes);
    }

    fn draw_color(&mut self, color: Color, mode: BlendMode) {
        self.draw_color_with(color, mode);
    }

    fn draw_line(&mut self, p0: Point, p1: Point) {
        let attributes = self.state.attributes.clone();
        self.draw_line_with(p0, p1, &attributes);
    }

    fn draw_rect(&mut self, rect: Rect) {
        let attributes = self.state.attributes.clone();
        self.draw_shape(
            &rect.abs().to_path(TOLERANCE),
            &attributes,
            AttributeFlags::DRAW_RECT,
            convert::FILL_RULE,
        );
    }

    fn draw_oval(&mut self, bounds: Rect) {
        let attributes = self.state.attributes.clone();
        self.draw_shape(
            &Ellipse::from_rect(bounds.abs()).to_path(TOLERANCE),
            &attributes,
            AttributeFlags::DRAW_OVAL,
            convert::FILL_RULE,
        );
    }

    fn draw_circle(&mut self, center: Point, radius: f64) {
        let attributes = self.state.attributes.clone();
        self.draw_shape(
            &Circle::new(center, radius).to_path(TOLERANCE),
            &attributes,
            AttributeFlags::DRAW_CIRCLE,
            convert::FILL_RULE,
        );
    }

    fn draw_rrect(&mut self, rrect: RoundedRect) {
        let attributes = self.state.attributes.clone();
        self.draw_shape(
            &rrect_path(rrect),
            &attributes,
            AttributeFlags::DRAW_RRECT,
            convert::FILL_RULE,
        );
    }

    fn draw_drrect(&mut self, outer: RoundedRect, inner: RoundedRect) {
        let attributes = self.state.attributes.clone();
        self.draw_shape(
            &drrect_path(outer, inner),
            &attributes,
            AttributeFlags::DRAW_DRRECT,
            FillRule::EvenOdd,
        );
    }

    fn draw_path(&mut self, path: &BezPath) {
        let attributes = self.state.attributes.clone();
        self.draw_shape(
            path,
            &attributes,
            AttributeFlags::DRAW_PATH,
            convert::FILL_RULE,
        );
    }

    fn draw_arc(&mut self, bounds: Rect, start_degrees: f64, sweep_degrees: f64, use_center: bool) {
        let attributes = self.state.attributes.clone();
        self.draw_arc_with(bounds, start_degrees, sweep_degrees, use_center, &attributes);
    }

    fn draw_points(&mut self, mode: PointMode, points: &[Point]) {
        let attributes = self.state.attributes.clone();
        self.draw_points_with(mode, points, &attributes);
    }

    fn draw_vertices(&mut self, vertices: &Arc<Vertices>, mode: BlendMode) {
        if vertices.colors().is_some() && mode != SRC_OVER {
            log::debug!("vertex color blend mode {mode:?} is drawn as source-over");
        }
        let attributes = self.state.attributes.clone();
        self.draw_vertices_with(vertices, &attributes);
    }

    fn draw_image(
        &mut self,
        image: &DlImage,
        point: Point,
        sampling: ImageSampling,
        with_attributes: bool,
    ) {
        let attributes = with_attributes.then(|| self.state.attributes.clone());
        let src = image.bounds();
        let dst = src + point.to_vec2();
        self.draw_image_rect_with(image, src, dst, convert::quality(sampling), attributes.as_ref());
    }

    fn draw_image_rect(
        &mut self,
        image: &DlImage,
        src: Rect,
        dst: Rect,
        sampling: ImageSampling,
        with_attributes: bool,
        _constraint: SrcRectConstraint,
    ) {
        let attributes = with_attributes.then(|| self.state.attributes.clone());
        self.draw_image_rect_with(image, src, dst, convert::quality(sampling), attributes.as_ref());
    }

    fn draw_image_nine(
        &mut self,
        image: &DlImage,
        center: IRect,
        dst: Rect,
        filter: FilterMode,
        with_attributes: bool,
    ) {
        let attributes = with_attributes.then(|| self.state.attributes.clone());
        self.draw_image_nine_with(
            image,
            center,
            dst,
            convert::filter_quality(filter),
            attributes.as_ref(),
        );
    }

    fn draw_atlas(
        &mut self,
        atlas: &DlImage,
        xforms: &[RSTransform],
        tex: &[Rect],
        colors: Option<&[Color]>,
        _mode: BlendMode,
        sampling: ImageSampling,
        _cull_rect: Option<Rect>,
        with_attributes: bool,
    ) {
        let attributes = with_attributes.then(|| self.state.attributes.clone());
        self.draw_atlas_with(
            atlas,
            xforms,
            tex,
            colors,
            convert::quality(sampling),
            attributes.as_ref(),
        );
    }

    fn draw_display_list(&mut self, list: &Arc<DisplayList>, opacity: f32) {
        self.draw_list(list, opacity);
    }

    fn draw_text_blob(&mut self, blob: &Arc<TextBlob>, x: f64, y: f64) {
        let attributes = self.state.attributes.clone();
        self.draw_text_blob_with(blob, x, y, &attributes);
    }

    fn draw_shadow(
        &mut self,
        path: &BezPath,
        color: Color,
        elevation: f64,
        _transparent_occluder: bool,
        dpr: f64,
    ) {
        self.draw_shadow_with(path, color, elevation, dpr);
    }
}

impl Canvas for CpuCanvas {
    fn save(&mut self) {
        self.push_save(None);
    }

    fn save_layer(
        &mut self,
        bounds: Option<Rect>,
        paint: Option<&Paint>,
        backdrop: Option<Arc<ImageFilter>>,
    ) {
        self.save_layer_with(bounds, paint.map(Paint::attributes), backdrop.as_deref());
    }

    fn restore(&mut self) {
        self.pop_save();
    }

    fn save_count(&self) -> usize {
        self.saves.len()
    }

    fn translate(&mut self, tx: f64, ty: f64) {
        self.concat_matrix(Affine::translate((tx, ty)));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.concat_matrix(Affine::scale_non_uniform(sx, sy));
    }

    fn rotate(&mut self, degrees: f64) {
        self.concat_matrix(Affine::rotate(degrees.to_radians()));
    }

    fn skew(&mut self, sx: f64, sy: f64) {
        self.concat_matrix(Affine::skew(sx, sy));
    }

    fn concat(&mut self, matrix: Affine) {
        self.concat_matrix(matrix);
    }

    fn concat_44(&mut self, matrix: &Matrix4) {
        self.concat_matrix4(matrix);
    }

    fn set_matrix(&mut self, matrix: Affine) {
        self.state.matrix = matrix;
    }

    fn reset_matrix(&mut self) {
        self.state.matrix = Affine::IDENTITY;
    }

    fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool) {
        self.clip_shape(&rect.to_path(TOLERANCE), op, anti_alias);
    }

    fn clip_rrect(&mut self, rrect: RoundedRect, op: ClipOp, anti_alias: bool) {
        self.clip_shape(&rrect_path(rrect), op, anti_alias);
    }

    fn clip_path(&mut self, path: &BezPath, op: ClipOp, anti_alias: bool) {
        self.clip_shape(path, op, anti_alias);
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.draw_paint_with(paint.attributes());
    }

    fn draw_color(&mut self, color: Color, mode: BlendMode) {
        self.draw_color_with(color, mode);
    }

    fn draw_line(&mut self, p0: Point, p1: Point, paint: &Paint) {
        self.draw_line_with(p0, p1, paint.attributes());
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.draw_shape(
            &rect.abs().to_path(TOLERANCE),
            paint.attributes(),
            AttributeFlags::DRAW_RECT,
            convert::FILL_RULE,
        );
    }

    fn draw_oval(&mut self, bounds: Rect, paint: &Paint) {
        self.draw_shape(
            &Ellipse::from_rect(bounds.abs()).to_path(TOLERANCE),
            paint.attributes(),
            AttributeFlags::DRAW_OVAL,
            convert::FILL_RULE,
        );
    }

    fn draw_circle(&mut self, center: Point, radius: f64, paint: &Paint) {
        self.draw_shape(
            &Circle::new(center, radius).to_path(TOLERANCE),
            paint.attributes(),
            AttributeFlags::DRAW_CIRCLE,
            convert::FILL_RULE,
        );
    }

    fn draw_rrect(&mut self, rrect: RoundedRect, paint: &Paint) {
        self.draw_shape(
            &rrect_path(rrect),
            paint.attributes(),
            AttributeFlags::DRAW_RRECT,
            convert::FILL_RULE,
        );
    }

    fn draw_drrect(&mut self, outer: RoundedRect, inner: RoundedRect, paint: &Paint) {
        self.draw_shape(
            &drrect_path(outer, inner),
            paint.attributes(),
            AttributeFlags::DRAW_DRRECT,
            FillRule::EvenOdd,
        );
    }

    fn draw_path(&mut self, path: &BezPath, paint: &Paint) {
        self.draw_shape(
            path,
            paint.attributes(),
            AttributeFlags::DRAW_PATH,
            convert::FILL_RULE,
        );
    }

    fn draw_arc(
        &mut self,
        bounds: Rect,
        start_degrees: f64,
        sweep_degrees: f64,
        use_center: bool,
        paint: &Paint,
    ) {
        self.draw_arc_with(
            bounds,
            start_degrees,
            sweep_degrees,
            use_center,
            paint.attributes(),
        );
    }

    fn draw_points(&mut self, mode: PointMode, points: &[Point], paint: &Paint) {
        self.draw_points_with(mode, points, paint.attributes());
    }

    fn draw_vertices(&mut self, vertices: &Arc<Vertices>, _mode: BlendMode, paint: &Paint) {
        self.draw_vertices_with(vertices, paint.attributes());
    }

    fn draw_image(
        &mut self,
        image: &DlImage,
        point: Point,
        sampling: ImageSampling,
        paint: Option<&Paint>,
    ) {
        let src = image.bounds();
        let dst = src + point.to_vec2();
        self.draw_image_rect_with(
            image,
            src,
            dst,
            convert::quality(sampling),
            paint.map(Paint::attributes),
        );
    }

    fn draw_image_rect(
        &mut self,
        image: &DlImage,
        src: Rect,
        dst: Rect,
        sampling: ImageSampling,
        paint: Option<&Paint>,
        _constraint: SrcRectConstraint,
    ) {
        self.draw_image_rect_with(
            image,
            src,
            dst,
            convert::quality(sampling),
            paint.map(Paint::attributes),
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
        self.draw_image_nine_with(
            image,
            center,
            dst,
            convert::filter_quality(filter),
            paint.map(Paint::attributes),
        );
    }

    fn draw_atlas(
        &mut self,
        atlas: &DlImage,
        xforms: &[RSTransform],
        tex: &[Rect],
        colors: Option<&[Color]>,
        _mode: BlendMode,
        sampling: ImageSampling,
        _cull_rect: Option<Rect>,
        paint: Option<&Paint>,
    ) {
        self.draw_atlas_with(
            atlas,
            xforms,
            tex,
            colors,
            convert::quality(sampling),
            paint.map(Paint::attributes),
        );
    }

    fn draw_display_list(&mut self, list: &Arc<DisplayList>, opacity: f32) {
        self.draw_list(list, opacity);
    }

    fn draw_text_blob(&mut self, blob: &Arc<TextBlob>, x: f64, y: f64, paint: &Paint) {
        self.draw_text_blob_with(blob, x, y, paint.attributes());
    }

    fn draw_shadow(
        &mut self,
        path: &BezPath,
        color: Color,
        elevation: f64,
        _transparent_occluder: bool,
        dpr: f64,
    ) {
        self.draw_shadow_with(path, color, elevation, dpr);
    }
}
