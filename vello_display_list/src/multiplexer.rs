// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fanning layer operations out to several builders.

use std::sync::Arc;

use crate::builder::DisplayListBuilder;
use crate::canvas::Paint;
use crate::dispatch::Dispatcher;
use crate::flags::AttributeFlags;
use crate::image_filter::ImageFilter;
use crate::kurbo::Rect;
use crate::op::SaveLayerOptions;

/// Forwards `save_layer` and `restore` to a set of builders.
///
/// Used when one layer of a scene is recorded by several builders at once,
/// for example an overlay recorded next to the main content. Calls reach the
/// builders in the order they were added.
#[derive(Debug, Default)]
pub struct BuilderMultiplexer<'a> {
    builders: Vec<&'a mut DisplayListBuilder>,
}

impl<'a> BuilderMultiplexer<'a> {
    /// Creates a multiplexer without builders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a builder; it receives every subsequent call.
    pub fn add_builder(&mut self, builder: &'a mut DisplayListBuilder) {
        self.builders.push(builder);
    }

    /// The number of builders.
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// Whether no builder was added.
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Opens a layer on every builder.
    pub fn save_layer(
        &mut self,
        bounds: Option<Rect>,
        paint: Option<&Paint>,
        backdrop: Option<&Arc<ImageFilter>>,
    ) {
        let options = if paint.is_some() {
            SaveLayerOptions::WITH_ATTRIBUTES
        } else {
            SaveLayerOptions::NO_ATTRIBUTES
        };
        for builder in &mut self.builders {
            if let Some(paint) = paint {
                builder.set_attributes_from(paint.attributes(), AttributeFlags::SAVE_LAYER_WITH_PAINT);
            }
            builder.save_layer(bounds, options, backdrop.cloned());
        }
    }

    /// Closes the innermost layer of every builder.
    pub fn restore(&mut self) {
        for builder in &mut self.builders {
            builder.restore();
        }
    }
}
