// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounds of layers and draws carrying image filters.

use std::sync::Arc;

use vello_display_list::kurbo::{Affine, Rect};
use vello_display_list::peniko::{BlendMode, Color, Compose, Mix};
use vello_display_list::{
    BuilderOptions, ColorFilter, Dispatcher, DisplayListBuilder, IRect, ImageFilter,
    ImageSampling, SaveLayerOptions, TileMode,
};

fn blur(sigma: f32) -> Arc<ImageFilter> {
    ImageFilter::blur(sigma, sigma, TileMode::Decal).unwrap()
}

fn filtered_layer(builder: &mut DisplayListBuilder, filter: Arc<ImageFilter>, content: Rect) {
    builder.set_image_filter(Some(filter));
    builder.save_layer(None, SaveLayerOptions::WITH_ATTRIBUTES, None);
    builder.set_image_filter(None);
    builder.draw_rect(content);
    builder.restore();
}

#[test]
fn blurred_layer_grows_by_three_sigma() {
    let mut builder = DisplayListBuilder::new();
    filtered_layer(&mut builder, blur(5.0), Rect::new(0.0, 0.0, 10.0, 10.0));
    let list = builder.build();
    assert_eq!(list.bounds(), Rect::new(-15.0, -15.0, 25.0, 25.0));
}

#[test]
fn layer_filter_bounds_follow_the_transform() {
    let mut builder = DisplayListBuilder::new();
    builder.scale(2.0, 2.0);
    filtered_layer(&mut builder, blur(5.0), Rect::new(0.0, 0.0, 10.0, 10.0));
    let list = builder.build();
    assert_eq!(list.bounds(), Rect::new(-30.0, -30.0, 50.0, 50.0));
}

#[test]
fn layer_filter_clears_per_op_bounds() {
    let options = BuilderOptions {
        prepare_culling: true,
        ..BuilderOptions::default()
    };
    let mut builder = DisplayListBuilder::with_options(options);
    builder.draw_rect(Rect::new(100.0, 100.0, 110.0, 110.0));
    filtered_layer(
        &mut builder,
        ImageFilter::matrix(Affine::translate((50.0, 0.0)), ImageSampling::Linear),
        Rect::new(0.0, 0.0, 10.0, 10.0),
    );
    let list = builder.build();
    assert!(list.ops()[0].bounds.is_some());
    // The rect inside the layer is moved by the filter.
    assert!(list.ops()[2].bounds.is_none());
    assert_eq!(list.bounds(), Rect::new(50.0, 0.0, 110.0, 110.0));
}

#[test]
fn composed_filters_apply_inner_first() {
    let shift = ImageFilter::matrix(Affine::translate((100.0, 0.0)), ImageSampling::Linear);
    let blurred_then_shifted = ImageFilter::compose(Some(shift.clone()), Some(blur(1.0))).unwrap();
    let input = IRect::new(0, 0, 10, 10);
    assert_eq!(
        blurred_then_shifted.map_device_bounds(input, &Affine::IDENTITY),
        Ok(IRect::new(97, -3, 113, 13))
    );
    assert_eq!(
        blurred_then_shifted.get_input_device_bounds(IRect::new(97, -3, 113, 13), &Affine::IDENTITY),
        Ok(IRect::new(-6, -6, 16, 16))
    );
    let again = ImageFilter::compose(Some(shift), Some(blur(1.0))).unwrap();
    assert_eq!(blurred_then_shifted, again);
}

#[test]
fn singular_transform_makes_matrix_filter_unbounded() {
    let shift = ImageFilter::matrix(Affine::translate((5.0, 0.0)), ImageSampling::Linear);
    let input = IRect::new(0, 0, 10, 10);
    let result = shift.map_device_bounds(input, &Affine::scale_non_uniform(1.0, 0.0));
    let unbounded = result.unwrap_err();
    assert_eq!(unbounded.last_known, input);
}

#[test]
fn flooding_layer_filter_covers_the_clip() {
    let flood = ColorFilter::blend(
        Color::rgba8(255, 0, 0, 255),
        BlendMode::new(Mix::Normal, Compose::Copy),
    )
    .unwrap();
    let options = BuilderOptions {
        cull_rect: Rect::new(0.0, 0.0, 200.0, 100.0),
        ..BuilderOptions::default()
    };
    let mut builder = DisplayListBuilder::with_options(options);
    filtered_layer(
        &mut builder,
        ImageFilter::color_filter(Arc::new(flood)),
        Rect::new(0.0, 0.0, 10.0, 10.0),
    );
    let list = builder.build();
    assert_eq!(list.bounds(), Rect::new(0.0, 0.0, 200.0, 100.0));
}

#[test]
fn backdrop_filter_covers_the_clip_and_blocks_opacity() {
    let options = BuilderOptions {
        cull_rect: Rect::new(0.0, 0.0, 100.0, 100.0),
        ..BuilderOptions::default()
    };
    let mut builder = DisplayListBuilder::with_options(options);
    builder.save_layer(
        Some(Rect::new(10.0, 10.0, 20.0, 20.0)),
        SaveLayerOptions::NO_ATTRIBUTES,
        Some(blur(3.0)),
    );
    builder.draw_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
    builder.restore();
    let list = builder.build();
    assert_eq!(list.bounds(), Rect::new(0.0, 0.0, 100.0, 100.0));
    assert!(!list.can_apply_group_opacity());
}

#[test]
fn draw_image_filter_grows_local_bounds() {
    let mut builder = DisplayListBuilder::new();
    builder.set_image_filter(Some(ImageFilter::dilate(2.0, 3.0)));
    builder.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
    let list = builder.build();
    assert_eq!(list.bounds(), Rect::new(-2.0, -3.0, 12.0, 13.0));
}
