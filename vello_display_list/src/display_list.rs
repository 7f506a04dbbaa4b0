// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The immutable result of recording.

use crate::dispatch::{Dispatcher, Player};
use crate::kurbo::Rect;
use crate::op::{DlOp, RecordedOp};
use crate::Error;

/// An immutable, replayable sequence of drawing operations.
///
/// Created by [`DisplayListBuilder::build`](crate::DisplayListBuilder::build)
/// and shared through [`Arc`](std::sync::Arc). A list is never mutated after it
/// is built, so it can be replayed and queried from several threads at once.
#[derive(Debug)]
pub struct DisplayList {
    ops: Vec<RecordedOp>,
    bounds: Rect,
    can_apply_group_opacity: bool,
    culling_prepared: bool,
    total_op_count: usize,
}

static_assertions::assert_impl_all!(DisplayList: Send, Sync);

impl DisplayList {
    pub(crate) fn new(
        ops: Vec<RecordedOp>,
        bounds: Rect,
        can_apply_group_opacity: bool,
        culling_prepared: bool,
    ) -> Self {
        let nested: usize = ops
            .iter()
            .map(|recorded| match &recorded.op {
                DlOp::DrawDisplayList { list, .. } => list.total_op_count(),
                _ => 0,
            })
            .sum();
        Self {
            total_op_count: ops.len() + nested,
            ops,
            bounds,
            can_apply_group_opacity,
            culling_prepared,
        }
    }

    /// The recorded operations.
    pub fn ops(&self) -> &[RecordedOp] {
        &self.ops
    }

    /// A conservative bound of every pixel the list can change.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The number of recorded operations.
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// The number of recorded operations, including those of nested lists.
    pub fn total_op_count(&self) -> usize {
        self.total_op_count
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Whether the list can be rendered with a group opacity by scaling the
    /// alpha of each operation, without an intermediate layer.
    pub fn can_apply_group_opacity(&self) -> bool {
        self.can_apply_group_opacity
    }

    /// Whether the bounds of each operation were recorded, so that
    /// [`Self::render_culled`] can skip operations.
    pub fn culling_prepared(&self) -> bool {
        self.culling_prepared
    }

    /// Replays the list onto `receiver` with a group opacity.
    ///
    /// An opacity below 1 is only accepted when
    /// [`Self::can_apply_group_opacity`] is true.
    pub fn render<D: Dispatcher + ?Sized>(
        &self,
        receiver: &mut D,
        opacity: f32,
    ) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(Error::InvalidGroupOpacity(opacity));
        }
        if opacity < 1.0 && !self.can_apply_group_opacity {
            return Err(Error::GroupOpacityIncompatible);
        }
        Player::new(receiver, opacity, None).play(&self.ops);
        Ok(())
    }

    /// Replays the list onto `receiver` at full opacity.
    ///
    /// Equivalent to `render(receiver, 1.0)`, which can't fail.
    pub fn replay<D: Dispatcher + ?Sized>(&self, receiver: &mut D) {
        Player::new(receiver, 1.0, None).play(&self.ops);
    }

    /// Replays the draw operations of the list that may touch `cull_rect`.
    ///
    /// State changing operations are always replayed. Without prepared
    /// culling this is the same as rendering at full opacity.
    pub fn render_culled<D: Dispatcher + ?Sized>(&self, receiver: &mut D, cull_rect: Rect) {
        if !self.culling_prepared {
            log::debug!("culling was not prepared for this display list");
        }
        Player::new(receiver, 1.0, Some(cull_rect)).play(&self.ops);
    }

    /// Whether both lists record the same operations with the same attributes.
    pub fn equals(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.ops.len() == other.ops.len()
                && self
                    .ops
                    .iter()
                    .zip(&other.ops)
                    .all(|(a, b)| a.op == b.op && a.attributes == b.attributes))
    }
}

impl PartialEq for DisplayList {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}
