// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recorded lists draw the same pixels as the calls they were recorded from.

use std::sync::Arc;

use anyhow::{ensure, Result};
use vello_display_list::attributes::DashPathEffect;
use vello_display_list::kurbo::{BezPath, Cap, Point, Rect, RoundedRect};
use vello_display_list::peniko::Color;
use vello_display_list::{
    Canvas, CanvasRecorder, ClipOp, ColorFilter, ColorSource, DisplayList, DisplayListBuilder,
    DlImage, DrawStyle, GradientStop, ImageFilter, ImageSampling, Paint, PathEffect, PointMode,
    TextBlob, TileMode,
};
use vello_display_list_cpu::tiny_skia::Pixmap;
use vello_display_list_cpu::{compare, CpuCanvas, CpuCanvasOptions, PixelTolerance};

const RED: Color = Color::rgba8(255, 0, 0, 255);
const GREEN: Color = Color::rgba8(0, 160, 0, 255);
const BLUE: Color = Color::rgba8(0, 0, 255, 255);

fn options() -> CpuCanvasOptions {
    CpuCanvasOptions {
        width: 128,
        height: 128,
        background: Color::rgba8(255, 255, 255, 255),
    }
}

fn checker() -> DlImage {
    let mut pixels: Vec<u8> = Vec::with_capacity(4 * 4 * 4);
    for y in 0..4 {
        for x in 0..4 {
            let on = (x + y) % 2 == 0;
            pixels.extend_from_slice(if on { &[0, 0, 0, 255] } else { &[255, 255, 255, 255] });
        }
    }
    DlImage::from_premul_rgba8(4, 4, pixels).unwrap()
}

/// Draws with `scene` directly, and through a recorded list.
fn direct_and_replayed(scene: impl Fn(&mut dyn Canvas)) -> Result<(Pixmap, Pixmap)> {
    let mut direct = CpuCanvas::new(options())?;
    scene(&mut direct);

    let mut recorder = CanvasRecorder::new();
    scene(&mut recorder);
    let list = recorder.finish()?;
    let mut replayed = CpuCanvas::new(options())?;
    list.replay(&mut replayed);

    Ok((direct.finish(), replayed.finish()))
}

fn assert_same(scene: impl Fn(&mut dyn Canvas)) -> Result<()> {
    let (direct, replayed) = direct_and_replayed(scene)?;
    let diff = compare(&direct, &replayed, PixelTolerance::BLENDING)?;
    ensure!(
        diff.is_within(PixelTolerance::BLENDING),
        "replay differs: {diff:?}"
    );
    Ok(())
}

#[test]
fn shapes_replay_identically() -> Result<()> {
    assert_same(|canvas| {
        canvas.draw_rect(Rect::new(4.0, 4.0, 40.0, 30.0), &Paint::fill(RED));
        canvas.draw_circle(
            Point::new(80.0, 30.0),
            20.0,
            &Paint::stroke(BLUE, 4.0).with_anti_alias(true),
        );
        canvas.draw_drrect(
            RoundedRect::new(10.0, 60.0, 60.0, 110.0, 8.0),
            RoundedRect::new(20.0, 70.0, 50.0, 100.0, 4.0),
            &Paint::fill(GREEN).with_anti_alias(true),
        );
        canvas.draw_arc(
            Rect::new(70.0, 60.0, 120.0, 110.0),
            0.0,
            135.0,
            true,
            &Paint::fill(BLUE).with_style(DrawStyle::StrokeAndFill),
        );
        canvas.draw_line(
            Point::new(0.0, 120.0),
            Point::new(127.0, 124.0),
            &Paint::stroke(RED, 3.0).with_stroke_cap(Cap::Round),
        );
    })
}

#[test]
fn transforms_and_clips_replay_identically() -> Result<()> {
    assert_same(|canvas| {
        canvas.save();
        canvas.translate(64.0, 64.0);
        canvas.rotate(30.0);
        canvas.clip_rect(Rect::new(-40.0, -40.0, 40.0, 40.0), ClipOp::Intersect, true);
        canvas.draw_rect(Rect::new(-60.0, -20.0, 60.0, 20.0), &Paint::fill(RED));
        canvas.restore();
        canvas.clip_rect(Rect::new(0.0, 0.0, 20.0, 20.0), ClipOp::Difference, false);
        canvas.set_matrix(vello_display_list::kurbo::Affine::scale(2.0));
        canvas.draw_oval(Rect::new(0.0, 0.0, 30.0, 15.0), &Paint::fill(BLUE));
    })
}

#[test]
fn paint_sources_and_effects_replay_identically() -> Result<()> {
    let gradient = Arc::new(ColorSource::LinearGradient {
        start: Point::new(0.0, 0.0),
        end: Point::new(128.0, 0.0),
        stops: vec![
            GradientStop {
                offset: 0.0,
                color: RED,
            },
            GradientStop {
                offset: 1.0,
                color: BLUE,
            },
        ],
        tile_mode: TileMode::Clamp,
        matrix: None,
    });
    let dashes = Arc::new(PathEffect::Dash(DashPathEffect::new(&[6.0, 4.0], 0.0)));
    let grayscale = Arc::new(ColorFilter::matrix([
        0.33, 0.33, 0.33, 0.0, 0.0, //
        0.33, 0.33, 0.33, 0.0, 0.0, //
        0.33, 0.33, 0.33, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]));
    assert_same(|canvas| {
        canvas.draw_paint(&Paint::new().with_color_source(Some(gradient.clone())));
        canvas.draw_rect(
            Rect::new(10.0, 10.0, 110.0, 50.0),
            &Paint::stroke(Color::BLACK, 3.0).with_path_effect(Some(dashes.clone())),
        );
        canvas.draw_rect(
            Rect::new(20.0, 60.0, 100.0, 100.0),
            &Paint::fill(RED).with_color_filter(Some(grayscale.clone())),
        );
        canvas.draw_circle(
            Point::new(64.0, 110.0),
            10.0,
            &Paint::fill(GREEN).with_invert_colors(true),
        );
    })
}

#[test]
fn layers_and_filters_replay_identically() -> Result<()> {
    let blur = ImageFilter::blur(2.0, 2.0, TileMode::Decal);
    assert_same(|canvas| {
        canvas.draw_rect(Rect::new(0.0, 0.0, 64.0, 128.0), &Paint::fill(GREEN));
        canvas.save_layer(
            None,
            Some(&Paint::new().with_alpha_factor(0.5).with_image_filter(blur.clone())),
            None,
        );
        canvas.draw_rect(Rect::new(20.0, 20.0, 60.0, 60.0), &Paint::fill(RED));
        canvas.draw_rect(Rect::new(40.0, 40.0, 80.0, 80.0), &Paint::fill(BLUE));
        canvas.restore();
        canvas.save_layer(Some(Rect::new(60.0, 60.0, 120.0, 120.0)), None, blur.clone());
        canvas.restore();
    })
}

#[test]
fn images_points_and_text_replay_identically() -> Result<()> {
    let image = checker();
    let mut glyph = BezPath::new();
    glyph.move_to((0.0, 0.0));
    glyph.line_to((8.0, -12.0));
    glyph.line_to((16.0, 0.0));
    glyph.close_path();
    let blob = Arc::new(TextBlob::from_outlines(glyph));
    let points = [
        Point::new(100.0, 10.0),
        Point::new(110.0, 20.0),
        Point::new(120.0, 10.0),
    ];
    assert_same(|canvas| {
        canvas.draw_image(&image, Point::new(2.0, 2.0), ImageSampling::NearestNeighbor, None);
        canvas.draw_image_rect(
            &image,
            Rect::new(0.0, 0.0, 4.0, 4.0),
            Rect::new(10.0, 10.0, 50.0, 50.0),
            ImageSampling::NearestNeighbor,
            Some(&Paint::new().with_alpha_factor(0.5)),
            vello_display_list::SrcRectConstraint::Fast,
        );
        canvas.draw_points(PointMode::Points, &points, &Paint::stroke(RED, 4.0));
        canvas.draw_points(PointMode::Polygon, &points, &Paint::stroke(BLUE, 1.0));
        canvas.draw_text_blob(&blob, 20.0, 100.0, &Paint::fill(Color::BLACK));
    })
}

#[test]
fn nested_lists_replay_identically() -> Result<()> {
    let mut builder = DisplayListBuilder::new();
    vello_display_list::Dispatcher::set_color(&mut builder, RED);
    vello_display_list::Dispatcher::draw_rect(&mut builder, Rect::new(0.0, 0.0, 30.0, 30.0));
    vello_display_list::Dispatcher::draw_rect(&mut builder, Rect::new(15.0, 15.0, 45.0, 45.0));
    let inner: Arc<DisplayList> = builder.build();
    assert_same(|canvas| {
        canvas.draw_display_list(&inner, 1.0);
        canvas.translate(60.0, 60.0);
        canvas.draw_display_list(&inner, 0.5);
    })
}

#[test]
fn replaying_twice_draws_the_same() -> Result<()> {
    let mut recorder = CanvasRecorder::new();
    recorder.draw_rect(Rect::new(10.0, 10.0, 50.0, 50.0), &Paint::fill(RED));
    recorder.draw_circle(Point::new(64.0, 64.0), 16.0, &Paint::fill(BLUE));
    let list = recorder.finish()?;

    let mut first = CpuCanvas::new(options())?;
    list.replay(&mut first);
    let mut second = CpuCanvas::new(options())?;
    list.replay(&mut second);
    let diff = compare(&first.finish(), &second.finish(), PixelTolerance::EXACT)?;
    ensure!(diff.is_within(PixelTolerance::EXACT));
    Ok(())
}
