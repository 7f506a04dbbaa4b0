// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Replaying display lists onto other builders.

use std::sync::Arc;

use vello_display_list::kurbo::{Point, Rect};
use vello_display_list::peniko::Color;
use vello_display_list::{
    BuilderOptions, Dispatcher, DisplayList, DisplayListBuilder, DlImage, DlOp, DrawStyle, Error,
    ImageSampling, SaveLayerOptions,
};

const RED: Color = Color::rgba8(255, 0, 0, 255);
const BLUE: Color = Color::rgba8(0, 0, 255, 255);

fn culling_options() -> BuilderOptions {
    BuilderOptions {
        prepare_culling: true,
        ..BuilderOptions::default()
    }
}

/// Three disjoint shapes: a red square, a stroked circle and a translated oval.
fn sample_list(options: BuilderOptions) -> Arc<DisplayList> {
    let mut builder = DisplayListBuilder::with_options(options);
    builder.set_color(RED);
    builder.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
    builder.set_style(DrawStyle::Stroke);
    builder.set_stroke_width(2.0);
    builder.draw_circle(Point::new(50.0, 50.0), 5.0);
    builder.save();
    builder.translate(100.0, 0.0);
    builder.set_style(DrawStyle::Fill);
    builder.set_color(BLUE);
    builder.draw_oval(Rect::new(0.0, 0.0, 10.0, 20.0));
    builder.restore();
    builder.build()
}

fn copy_of(list: &DisplayList, opacity: f32) -> Arc<DisplayList> {
    let mut builder = DisplayListBuilder::with_options(culling_options());
    list.render(&mut builder, opacity).unwrap();
    builder.build()
}

fn draw_count(list: &DisplayList) -> usize {
    list.ops().iter().filter(|recorded| recorded.op.is_draw()).count()
}

#[test]
fn sample_bounds_cover_every_shape() {
    let list = sample_list(BuilderOptions::default());
    assert_eq!(list.bounds(), Rect::new(0.0, 0.0, 110.0, 56.0));
    assert!(list.can_apply_group_opacity());
    assert_eq!(list.op_count(), 6);
}

#[test]
fn rendering_into_a_builder_copies_the_list() {
    let list = sample_list(culling_options());
    let copy = copy_of(&list, 1.0);
    assert!(copy.equals(&list));
    assert_eq!(*copy, *list);
    assert_eq!(copy.bounds(), list.bounds());
    assert_eq!(copy.can_apply_group_opacity(), list.can_apply_group_opacity());
}

#[test]
fn group_opacity_scales_every_draw() {
    let list = sample_list(BuilderOptions::default());
    let faded = copy_of(&list, 0.5);
    let expected = RED.with_alpha_factor(0.5).a;
    let alphas: Vec<u8> = faded
        .ops()
        .iter()
        .filter_map(|recorded| recorded.attributes.as_ref())
        .map(|attributes| attributes.color.a)
        .collect();
    assert_eq!(alphas, vec![expected; 3]);
    assert_eq!(faded.bounds(), list.bounds());
    assert!(!faded.equals(&list));
}

#[test]
fn overlapping_content_rejects_group_opacity() {
    let mut builder = DisplayListBuilder::new();
    builder.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
    builder.draw_rect(Rect::new(5.0, 5.0, 15.0, 15.0));
    let list = builder.build();
    assert!(!list.can_apply_group_opacity());

    let mut target = DisplayListBuilder::new();
    assert_eq!(
        list.render(&mut target, 0.5),
        Err(Error::GroupOpacityIncompatible)
    );
    assert_eq!(
        list.render(&mut target, 1.5),
        Err(Error::InvalidGroupOpacity(1.5))
    );
    assert!(list.render(&mut target, 1.0).is_ok());
    assert!(target.build().equals(&list));
}

#[test]
fn culling_skips_draws_outside_the_cull_rect() {
    let list = sample_list(culling_options());
    assert!(list.culling_prepared());
    let mut builder = DisplayListBuilder::new();
    list.render_culled(&mut builder, Rect::new(0.0, 0.0, 20.0, 20.0));
    let culled = builder.build();
    assert_eq!(draw_count(&culled), 1);
    assert!(matches!(culled.ops()[0].op, DlOp::DrawRect(_)));
    // State changes are still replayed.
    assert_eq!(culled.op_count(), 4);

    let mut builder = DisplayListBuilder::new();
    list.render_culled(&mut builder, Rect::new(95.0, 0.0, 120.0, 30.0));
    let culled = builder.build();
    assert_eq!(draw_count(&culled), 1);
    assert_eq!(culled.bounds(), Rect::new(100.0, 0.0, 110.0, 20.0));
}

#[test]
fn culling_without_prepared_bounds_draws_everything() {
    let list = sample_list(BuilderOptions::default());
    assert!(!list.culling_prepared());
    let mut builder = DisplayListBuilder::new();
    list.render_culled(&mut builder, Rect::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(draw_count(&builder.build()), 3);
}

#[test]
fn layer_distributes_opacity_to_disjoint_children() {
    let mut builder = DisplayListBuilder::new();
    builder.save_layer(None, SaveLayerOptions::NO_ATTRIBUTES, None);
    builder.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
    builder.draw_rect(Rect::new(20.0, 0.0, 30.0, 10.0));
    builder.restore();
    let list = builder.build();
    match &list.ops()[0].op {
        DlOp::SaveLayer { options, .. } => assert!(options.can_distribute_opacity),
        other => panic!("unexpected op {other:?}"),
    }

    let faded = copy_of(&list, 0.5);
    match &faded.ops()[0].op {
        DlOp::SaveLayer { options, .. } => assert!(!options.renders_with_attributes),
        other => panic!("unexpected op {other:?}"),
    }
    let child = faded.ops()[1].attributes.as_ref().unwrap();
    assert_eq!(child.color.a, Color::BLACK.with_alpha_factor(0.5).a);
}

#[test]
fn layer_absorbs_opacity_for_overlapping_children() {
    let mut builder = DisplayListBuilder::new();
    builder.save_layer(None, SaveLayerOptions::NO_ATTRIBUTES, None);
    builder.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
    builder.draw_rect(Rect::new(5.0, 0.0, 15.0, 10.0));
    builder.restore();
    let list = builder.build();
    // The layer composites as a single unit.
    assert!(list.can_apply_group_opacity());

    let faded = copy_of(&list, 0.5);
    match &faded.ops()[0].op {
        DlOp::SaveLayer { options, .. } => {
            assert!(options.renders_with_attributes);
            assert!(!options.can_distribute_opacity);
        }
        other => panic!("unexpected op {other:?}"),
    }
    let layer = faded.ops()[0].attributes.as_ref().unwrap();
    assert_eq!(layer.color.a, Color::BLACK.with_alpha_factor(0.5).a);
    for recorded in &faded.ops()[1..3] {
        assert_eq!(recorded.attributes.as_ref().unwrap().color.a, 255);
    }
}

#[test]
fn image_without_attributes_gains_them_under_opacity() {
    let image = DlImage::from_premul_rgba8(2, 2, vec![255_u8; 16]).unwrap();
    let mut builder = DisplayListBuilder::new();
    builder.draw_image(&image, Point::new(4.0, 4.0), ImageSampling::Linear, false);
    let list = builder.build();
    assert!(list.ops()[0].attributes.is_none());
    assert!(list.can_apply_group_opacity());

    let faded = copy_of(&list, 0.25);
    match &faded.ops()[0].op {
        DlOp::DrawImage {
            with_attributes, ..
        } => assert!(*with_attributes),
        other => panic!("unexpected op {other:?}"),
    }
    let attributes = faded.ops()[0].attributes.as_ref().unwrap();
    assert_eq!(attributes.color.a, Color::BLACK.with_alpha_factor(0.25).a);
    assert_eq!(faded.bounds(), Rect::new(4.0, 4.0, 6.0, 6.0));
}

#[test]
fn nested_lists_multiply_opacity() {
    let inner = sample_list(BuilderOptions::default());
    let mut builder = DisplayListBuilder::new();
    builder.draw_display_list(&inner, 0.5);
    let outer = builder.build();
    assert_eq!(outer.op_count(), 1);
    assert_eq!(outer.total_op_count(), 1 + inner.op_count());
    assert_eq!(outer.bounds(), inner.bounds());
    assert!(outer.can_apply_group_opacity());

    let faded = copy_of(&outer, 0.5);
    match &faded.ops()[0].op {
        DlOp::DrawDisplayList { list, opacity } => {
            assert!(Arc::ptr_eq(list, &inner));
            assert_eq!(*opacity, 0.25);
        }
        other => panic!("unexpected op {other:?}"),
    }
}

#[test]
fn pictures_are_flattened_with_their_transform() {
    let inner = sample_list(BuilderOptions::default());
    let mut builder = DisplayListBuilder::new();
    builder.draw_picture(
        &inner,
        Some(vello_display_list::kurbo::Affine::translate((10.0, 0.0))),
        false,
    );
    let outer = builder.build();
    assert_eq!(outer.op_count(), 4);
    assert!(matches!(outer.ops()[0].op, DlOp::Save));
    assert!(matches!(outer.ops()[3].op, DlOp::Restore));
    assert_eq!(outer.bounds(), Rect::new(10.0, 0.0, 120.0, 56.0));
}

#[test]
fn lists_are_shared_across_threads() {
    let list = sample_list(BuilderOptions::default());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let list = list.clone();
            std::thread::spawn(move || copy_of(&list, 1.0).equals(&list))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
