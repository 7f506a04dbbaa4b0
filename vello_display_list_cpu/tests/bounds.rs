// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rendered pixels stay within the bounds computed for a list, and group
//! opacity draws like the equivalent layer.

use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use vello_display_list::kurbo::{Affine, BezPath, Point, Rect};
use vello_display_list::peniko::Color;
use vello_display_list::{
    BlurStyle, Dispatcher, DisplayList, DisplayListBuilder, DrawStyle, IRect, ImageFilter,
    MaskFilter, SaveLayerOptions, TileMode,
};
use vello_display_list_cpu::tiny_skia::{self, Pixmap};
use vello_display_list_cpu::{compare, touched_bounds, CpuCanvas, CpuCanvasOptions, PixelTolerance};

const RED: Color = Color::rgba8(255, 0, 0, 255);
const BLUE: Color = Color::rgba8(0, 0, 255, 255);

fn options() -> CpuCanvasOptions {
    CpuCanvasOptions {
        width: 200,
        height: 200,
        background: Color::TRANSPARENT,
    }
}

fn rendered(list: &DisplayList, opacity: f32) -> Result<Pixmap> {
    let mut canvas = CpuCanvas::new(options())?;
    canvas.render(list, opacity)?;
    Ok(canvas.finish())
}

fn assert_within_bounds(list: &DisplayList) -> Result<()> {
    let pixmap = rendered(list, 1.0)?;
    let touched =
        touched_bounds(&pixmap, tiny_skia::Color::TRANSPARENT).context("nothing was drawn")?;
    let bounds = IRect::round_out(list.bounds());
    ensure!(
        bounds.contains_rect(touched),
        "drew {touched:?} outside of {bounds:?}"
    );
    Ok(())
}

#[test]
fn strokes_stay_within_bounds() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    builder.set_anti_alias(true);
    builder.set_color(RED);
    builder.set_style(DrawStyle::Stroke);
    builder.set_stroke_width(6.0);
    builder.draw_rect(Rect::new(50.0, 50.0, 90.0, 70.0));
    builder.set_stroke_width(0.0);
    builder.draw_circle(Point::new(120.0, 120.0), 15.0);
    let list = builder.build();
    assert_within_bounds(&list)
}

#[test]
fn transformed_content_stays_within_bounds() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    builder.set_anti_alias(true);
    builder.set_color(BLUE);
    builder.translate(100.0, 100.0);
    builder.rotate(45.0);
    builder.scale(1.5, 0.75);
    builder.draw_oval(Rect::new(-40.0, -20.0, 40.0, 20.0));
    let list = builder.build();
    assert_within_bounds(&list)
}

#[test]
fn blurred_layer_stays_within_bounds() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    builder.set_image_filter(ImageFilter::blur(4.0, 4.0, TileMode::Decal));
    builder.save_layer(None, SaveLayerOptions::WITH_ATTRIBUTES, None);
    builder.set_image_filter(None);
    builder.set_color(RED);
    builder.draw_rect(Rect::new(60.0, 60.0, 100.0, 100.0));
    builder.restore();
    let list = builder.build();
    assert_eq!(list.bounds(), Rect::new(48.0, 48.0, 112.0, 112.0));
    assert_within_bounds(&list)
}

#[test]
fn composed_filter_layer_stays_within_bounds() -> Result<()> {
    let shift = ImageFilter::matrix(
        Affine::translate((40.0, 10.0)),
        vello_display_list::ImageSampling::NearestNeighbor,
    );
    let filter = ImageFilter::compose(Some(shift), ImageFilter::blur(2.0, 2.0, TileMode::Decal))
        .context("compose needs a filter")?;
    let mut builder = DisplayListBuilder::new();
    builder.set_image_filter(Some(filter));
    builder.save_layer(None, SaveLayerOptions::WITH_ATTRIBUTES, None);
    builder.set_image_filter(None);
    builder.draw_rect(Rect::new(30.0, 30.0, 60.0, 60.0));
    builder.restore();
    let list = builder.build();
    assert_within_bounds(&list)
}

#[test]
fn mask_blur_and_shadow_stay_within_bounds() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    builder.set_color(RED);
    builder.set_mask_filter(Some(Arc::new(MaskFilter::blur(BlurStyle::Normal, 3.0))));
    builder.draw_circle(Point::new(50.0, 50.0), 20.0);
    builder.set_mask_filter(None);
    let mut occluder = BezPath::new();
    occluder.move_to((110.0, 110.0));
    occluder.line_to((150.0, 110.0));
    occluder.line_to((130.0, 140.0));
    occluder.close_path();
    builder.draw_shadow(&occluder, Color::BLACK, 6.0, false, 1.0);
    let list = builder.build();
    assert_within_bounds(&list)
}

#[test]
fn huge_filter_radii_render() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    builder.set_image_filter(Some(ImageFilter::dilate(1e30, 1e30)));
    builder.save_layer(None, SaveLayerOptions::WITH_ATTRIBUTES, None);
    builder.set_image_filter(None);
    builder.set_color(RED);
    builder.draw_rect(Rect::new(90.0, 90.0, 110.0, 110.0));
    builder.restore();
    builder.set_mask_filter(Some(Arc::new(MaskFilter::blur(BlurStyle::Normal, 1e30))));
    builder.draw_circle(Point::new(50.0, 50.0), 20.0);
    builder.set_mask_filter(None);
    builder.set_image_filter(ImageFilter::blur(1e30, 1e30, TileMode::Decal));
    builder.save_layer(None, SaveLayerOptions::WITH_ATTRIBUTES, None);
    builder.draw_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
    builder.restore();
    let list = builder.build();

    let pixmap = rendered(&list, 1.0)?;
    ensure!(touched_bounds(&pixmap, tiny_skia::Color::TRANSPARENT).is_some());
    Ok(())
}

#[test]
fn full_opacity_matches_plain_replay() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    builder.set_color(RED);
    builder.draw_rect(Rect::new(10.0, 10.0, 60.0, 60.0));
    builder.set_color(BLUE.with_alpha_factor(0.5));
    builder.draw_rect(Rect::new(40.0, 40.0, 90.0, 90.0));
    let list = builder.build();

    let mut replayed = CpuCanvas::new(options())?;
    list.replay(&mut replayed);
    let diff = compare(&rendered(&list, 1.0)?, &replayed.finish(), PixelTolerance::EXACT)?;
    ensure!(diff.is_within(PixelTolerance::EXACT), "{diff:?}");
    Ok(())
}

#[test]
fn group_opacity_matches_a_layer() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    builder.set_color(RED);
    builder.draw_rect(Rect::new(10.0, 10.0, 60.0, 60.0));
    builder.set_color(BLUE);
    builder.draw_circle(Point::new(120.0, 120.0), 30.0);
    let list = builder.build();
    assert!(list.can_apply_group_opacity());

    let distributed = rendered(&list, 0.5)?;

    let mut layered = CpuCanvas::new(options())?;
    layered.set_color(Color::BLACK.with_alpha_factor(0.5));
    layered.save_layer(None, SaveLayerOptions::WITH_ATTRIBUTES, None);
    list.replay(&mut layered);
    layered.restore();

    let diff = compare(&distributed, &layered.finish(), PixelTolerance::BLENDING)?;
    ensure!(diff.is_within(PixelTolerance::BLENDING), "{diff:?}");
    Ok(())
}

#[test]
fn incompatible_list_fails_without_drawing() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    builder.draw_rect(Rect::new(10.0, 10.0, 60.0, 60.0));
    builder.draw_rect(Rect::new(40.0, 40.0, 90.0, 90.0));
    let list = builder.build();

    let mut canvas = CpuCanvas::new(options())?;
    ensure!(canvas.render(&list, 0.5).is_err());
    ensure!(touched_bounds(canvas.surface(), tiny_skia::Color::TRANSPARENT).is_none());
    Ok(())
}
