// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Equality of the optional shared objects held by paint attributes.
//!
//! Color sources, filters, blenders and effects are immutable and shared
//! through [`Arc`]. These helpers compare them by value without having to
//! unwrap the `Option` on either side.

use std::sync::Arc;

/// Compares two optional shared objects structurally.
///
/// Two absent objects are equal, an absent object never equals a present one
/// and a shared object always equals itself.
pub fn equals<T: PartialEq + ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b) || **a == **b,
        _ => false,
    }
}

/// The negation of [`equals`].
pub fn not_equals<T: PartialEq + ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    !equals(a, b)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{equals, not_equals};
    use crate::color_filter::ColorFilter;

    #[test]
    fn null_safe_equality() {
        let a = Arc::new(ColorFilter::SrgbToLinearGamma);
        let b = Arc::new(ColorFilter::SrgbToLinearGamma);
        assert!(equals::<ColorFilter>(None, None));
        assert!(!equals(Some(&a), None));
        assert!(!equals(None, Some(&a)));
        assert!(equals(Some(&a), Some(&a)));
        assert!(equals(Some(&a), Some(&b)));
        let c = Arc::new(ColorFilter::LinearToSrgbGamma);
        assert!(!equals(Some(&a), Some(&c)));
    }

    #[test]
    fn not_equals_negates() {
        let a = Arc::new(ColorFilter::SrgbToLinearGamma);
        assert!(!not_equals::<ColorFilter>(None, None));
        assert!(not_equals(Some(&a), None));
        assert!(!not_equals(Some(&a), Some(&a.clone())));
    }
}
