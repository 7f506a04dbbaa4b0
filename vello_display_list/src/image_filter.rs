// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Image filters and their bounds algebra.
//!
//! An image filter transforms the pixels of a layer or primitive. The
//! recorder never runs filters itself; it only needs to know which pixels a
//! filter could possibly touch. Every filter variant therefore implements
//! [`ImageFilterBounds`]:
//!
//! - [`ImageFilterBounds::map_local_bounds`] maps bounds in the coordinate
//!   space the filter is specified in.
//! - [`ImageFilterBounds::map_device_bounds`] maps pixel bounds under a
//!   transform, scaling the spatial parameters of the filter by that transform.
//! - [`ImageFilterBounds::get_input_device_bounds`] is the reverse mapping: the
//!   source pixels an output region depends on.
//!
//! A filter which can produce color from transparent black (see
//! [`ImageFilterBounds::modifies_transparent_black`]) has no finite bounds;
//! its output may fill the entire clip. Such results are reported as
//! [`Unbounded`] together with a best effort rectangle.
//!
//! Filters are immutable. [`ComposeImageFilter`] shares its children through
//! [`Arc`], so a filter graph is a DAG that can be shared freely between
//! threads and display lists.

use std::fmt::Debug;
use std::sync::Arc;

use crate::shared::equals;
use crate::color_filter::ColorFilter;
use crate::geometry::{IRect, ImageSampling, TileMode};
use crate::kurbo::{Affine, Rect};

/// The outcome of a bounds query that could not produce finite bounds.
///
/// `last_known` holds the best effort bounds computed before the failure, for
/// callers that want a rectangle regardless.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Unbounded<R> {
    /// The best effort bounds.
    pub last_known: R,
}

/// The result of mapping local bounds through a filter.
pub type LocalBounds = Result<Rect, Unbounded<Rect>>;

/// The result of mapping device bounds through a filter.
pub type DeviceBounds = Result<IRect, Unbounded<IRect>>;

/// The bounds contract shared by all image filters.
pub trait ImageFilterBounds {
    /// Whether the filter can produce non-transparent output from fully
    /// transparent input.
    fn modifies_transparent_black(&self) -> bool;

    /// Maps the local bounds of the filter input to the bounds of its output.
    fn map_local_bounds(&self, input: Rect) -> LocalBounds;

    /// Maps device bounds of the filter input to the device bounds of its
    /// output, when the filter is applied under `ctm`.
    fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds;

    /// Computes the device bounds of the input needed to produce `output`.
    fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds;
}

/// Scales a pair of spatial lengths by the linear part of `ctm`, rounding up.
///
/// Rotations and skews mix the two axes, so each device axis receives the
/// contribution of both local axes. Non-finite results are clamped to zero
/// and lengths beyond `i32::MAX` saturate.
fn device_extent(x: f64, y: f64, ctm: &Affine) -> (i32, i32) {
    let [a, b, c, d, _, _] = ctm.as_coeffs();
    let dx = (a * x).abs() + (c * y).abs();
    let dy = (b * x).abs() + (d * y).abs();
    let clamp = |v: f64| if v.is_finite() { v.ceil() as i32 } else { 0 };
    (clamp(dx), clamp(dy))
}

fn is_invertible(matrix: &Affine) -> bool {
    let det = matrix.determinant();
    det.is_finite() && det != 0.0
}

/// A gaussian blur.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlurImageFilter {
    sigma_x: f32,
    sigma_y: f32,
    tile_mode: TileMode,
}

impl BlurImageFilter {
    /// Creates a blur with the given standard deviations.
    pub fn new(sigma_x: f32, sigma_y: f32, tile_mode: TileMode) -> Self {
        Self {
            sigma_x,
            sigma_y,
            tile_mode,
        }
    }

    /// Horizontal standard deviation.
    pub fn sigma_x(&self) -> f32 {
        self.sigma_x
    }

    /// Vertical standard deviation.
    pub fn sigma_y(&self) -> f32 {
        self.sigma_y
    }

    /// How pixels outside of the input are sampled.
    pub fn tile_mode(&self) -> TileMode {
        self.tile_mode
    }

    // Three standard deviations cover more than 99.7% of the kernel.
    fn extent(&self) -> (f64, f64) {
        (f64::from(self.sigma_x) * 3.0, f64::from(self.sigma_y) * 3.0)
    }

    /// The kernel radius in device pixels along each axis under `ctm`.
    ///
    /// This is the distance the output bounds grow by, and renderers should
    /// size their kernels from it.
    pub fn device_radius(&self, ctm: &Affine) -> (i32, i32) {
        let (x, y) = self.extent();
        device_extent(x, y, ctm)
    }
}

impl ImageFilterBounds for BlurImageFilter {
    fn modifies_transparent_black(&self) -> bool {
        false
    }

    fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        let (x, y) = self.extent();
        Ok(input.inflate(x, y))
    }

    fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds {
        let (dx, dy) = self.device_radius(ctm);
        Ok(input.outset(dx, dy))
    }

    fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds {
        self.map_device_bounds(output, ctm)
    }
}

/// A transform applied to the filter input.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MatrixImageFilter {
    matrix: Affine,
    sampling: ImageSampling,
}

impl MatrixImageFilter {
    /// Creates a matrix filter.
    pub fn new(matrix: Affine, sampling: ImageSampling) -> Self {
        Self { matrix, sampling }
    }

    /// The transform, in the local space of the filter.
    pub fn matrix(&self) -> Affine {
        self.matrix
    }

    /// The sampling used when transforming.
    pub fn sampling(&self) -> ImageSampling {
        self.sampling
    }

    /// The filter matrix expressed in device space under `ctm`.
    fn device_matrix(&self, ctm: &Affine) -> Option<Affine> {
        is_invertible(ctm).then(|| *ctm * self.matrix * ctm.inverse())
    }
}

impl ImageFilterBounds for MatrixImageFilter {
    fn modifies_transparent_black(&self) -> bool {
        false
    }

    fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        Ok(self.matrix.transform_rect_bbox(input))
    }

    fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds {
        let Some(matrix) = self.device_matrix(ctm) else {
            return Err(Unbounded { last_known: input });
        };
        Ok(IRect::round_out(matrix.transform_rect_bbox(input.to_rect())))
    }

    fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds {
        match self.device_matrix(ctm) {
            Some(matrix) if is_invertible(&matrix) => Ok(IRect::round_out(
                matrix.inverse().transform_rect_bbox(output.to_rect()),
            )),
            _ => Err(Unbounded { last_known: output }),
        }
    }
}

/// Applies `inner` and then `outer`.
///
/// Either stage may be absent, in which case it is the identity.
///
/// When a stage can't bound its output, the composition is [`Unbounded`] as
/// a whole. The remaining stage still maps the failing stage's `last_known`
/// rectangle, so `last_known` of the composition is the best effort result
/// of the full chain rather than of the stage that failed.
#[derive(Clone, Debug)]
pub struct ComposeImageFilter {
    outer: Option<Arc<ImageFilter>>,
    inner: Option<Arc<ImageFilter>>,
}

impl ComposeImageFilter {
    /// Creates a composition of two filters.
    pub fn new(outer: Option<Arc<ImageFilter>>, inner: Option<Arc<ImageFilter>>) -> Self {
        Self { outer, inner }
    }

    /// The filter applied last.
    pub fn outer(&self) -> Option<&Arc<ImageFilter>> {
        self.outer.as_ref()
    }

    /// The filter applied first.
    pub fn inner(&self) -> Option<&Arc<ImageFilter>> {
        self.inner.as_ref()
    }

    /// Threads `input` through the inner and then the outer stage.
    ///
    /// A failing stage does not stop the chain: its best effort result feeds
    /// the next stage, and the failure is reported at the end.
    fn chain<R: Copy>(
        &self,
        input: R,
        first: Option<&Arc<ImageFilter>>,
        second: Option<&Arc<ImageFilter>>,
        map: impl Fn(&ImageFilter, R) -> Result<R, Unbounded<R>>,
    ) -> Result<R, Unbounded<R>> {
        let mut bounded = true;
        let mut current = input;
        for stage in [first, second].into_iter().flatten() {
            current = match map(stage.as_ref(), current) {
                Ok(rect) => rect,
                Err(Unbounded { last_known }) => {
                    bounded = false;
                    last_known
                }
            };
        }
        if bounded {
            Ok(current)
        } else {
            Err(Unbounded {
                last_known: current,
            })
        }
    }
}

impl PartialEq for ComposeImageFilter {
    fn eq(&self, other: &Self) -> bool {
        equals(self.outer.as_ref(), other.outer.as_ref())
            && equals(self.inner.as_ref(), other.inner.as_ref())
    }
}

impl ImageFilterBounds for ComposeImageFilter {
    fn modifies_transparent_black(&self) -> bool {
        [&self.inner, &self.outer]
            .into_iter()
            .flatten()
            .any(|filter| filter.modifies_transparent_black())
    }

    fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        self.chain(input, self.inner(), self.outer(), |filter, rect| {
            filter.map_local_bounds(rect)
        })
    }

    fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds {
        self.chain(input, self.inner(), self.outer(), |filter, rect| {
            filter.map_device_bounds(rect, ctm)
        })
    }

    fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds {
        self.chain(output, self.outer(), self.inner(), |filter, rect| {
            filter.get_input_device_bounds(rect, ctm)
        })
    }
}

/// Applies a [`ColorFilter`] to every pixel.
#[derive(Clone, Debug)]
pub struct ColorFilterImageFilter {
    color_filter: Arc<ColorFilter>,
}

impl ColorFilterImageFilter {
    /// Wraps a color filter.
    pub fn new(color_filter: Arc<ColorFilter>) -> Self {
        Self { color_filter }
    }

    /// The wrapped color filter.
    pub fn color_filter(&self) -> &Arc<ColorFilter> {
        &self.color_filter
    }

    fn same_bounds<R: Copy>(&self, input: R) -> Result<R, Unbounded<R>> {
        if self.modifies_transparent_black() {
            Err(Unbounded { last_known: input })
        } else {
            Ok(input)
        }
    }
}

impl PartialEq for ColorFilterImageFilter {
    fn eq(&self, other: &Self) -> bool {
        equals(Some(&self.color_filter), Some(&other.color_filter))
    }
}

impl ImageFilterBounds for ColorFilterImageFilter {
    fn modifies_transparent_black(&self) -> bool {
        self.color_filter.modifies_transparent_black()
    }

    fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        self.same_bounds(input)
    }

    fn map_device_bounds(&self, input: IRect, _ctm: &Affine) -> DeviceBounds {
        self.same_bounds(input)
    }

    fn get_input_device_bounds(&self, output: IRect, _ctm: &Affine) -> DeviceBounds {
        self.same_bounds(output)
    }
}

/// Applies a filter in a coordinate space transformed by `matrix`.
#[derive(Clone, Debug)]
pub struct LocalMatrixImageFilter {
    matrix: Affine,
    filter: Option<Arc<ImageFilter>>,
}

impl LocalMatrixImageFilter {
    /// Creates a local matrix filter.
    pub fn new(matrix: Affine, filter: Option<Arc<ImageFilter>>) -> Self {
        Self { matrix, filter }
    }

    /// The local transform.
    pub fn matrix(&self) -> Affine {
        self.matrix
    }

    /// The transformed filter.
    pub fn filter(&self) -> Option<&Arc<ImageFilter>> {
        self.filter.as_ref()
    }
}

impl PartialEq for LocalMatrixImageFilter {
    fn eq(&self, other: &Self) -> bool {
        self.matrix == other.matrix && equals(self.filter.as_ref(), other.filter.as_ref())
    }
}

impl ImageFilterBounds for LocalMatrixImageFilter {
    fn modifies_transparent_black(&self) -> bool {
        self.filter
            .as_deref()
            .is_some_and(ImageFilter::modifies_transparent_black)
    }

    fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        match &self.filter {
            Some(filter) => filter.map_local_bounds(input),
            None => Ok(input),
        }
    }

    fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds {
        match &self.filter {
            Some(filter) => filter.map_device_bounds(input, &(*ctm * self.matrix)),
            None => Ok(input),
        }
    }

    fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds {
        match &self.filter {
            Some(filter) => filter.get_input_device_bounds(output, &(*ctm * self.matrix)),
            None => Ok(output),
        }
    }
}

/// Grows every shape by a radius (morphological dilation).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DilateImageFilter {
    radius_x: f32,
    radius_y: f32,
}

impl DilateImageFilter {
    /// Creates a dilation.
    pub fn new(radius_x: f32, radius_y: f32) -> Self {
        Self { radius_x, radius_y }
    }

    /// Horizontal radius.
    pub fn radius_x(&self) -> f32 {
        self.radius_x
    }

    /// Vertical radius.
    pub fn radius_y(&self) -> f32 {
        self.radius_y
    }

    /// The dilation radius in device pixels along each axis under `ctm`.
    pub fn device_radius(&self, ctm: &Affine) -> (i32, i32) {
        device_extent(f64::from(self.radius_x), f64::from(self.radius_y), ctm)
    }
}

impl ImageFilterBounds for DilateImageFilter {
    fn modifies_transparent_black(&self) -> bool {
        false
    }

    fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        Ok(input.inflate(f64::from(self.radius_x), f64::from(self.radius_y)))
    }

    fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds {
        let (dx, dy) = self.device_radius(ctm);
        Ok(input.outset(dx, dy))
    }

    fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds {
        self.map_device_bounds(output, ctm)
    }
}

/// Shrinks every shape by a radius (morphological erosion).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ErodeImageFilter {
    radius_x: f32,
    radius_y: f32,
}

impl ErodeImageFilter {
    /// Creates an erosion.
    pub fn new(radius_x: f32, radius_y: f32) -> Self {
        Self { radius_x, radius_y }
    }

    /// Horizontal radius.
    pub fn radius_x(&self) -> f32 {
        self.radius_x
    }

    /// Vertical radius.
    pub fn radius_y(&self) -> f32 {
        self.radius_y
    }

    /// The erosion radius in device pixels along each axis under `ctm`.
    pub fn device_radius(&self, ctm: &Affine) -> (i32, i32) {
        device_extent(f64::from(self.radius_x), f64::from(self.radius_y), ctm)
    }
}

/// Shrinks a rectangle, collapsing it onto its center line when it would invert.
fn inset_rect(rect: Rect, dx: f64, dy: f64) -> Rect {
    let center = rect.center();
    let (x0, x1) = if rect.width() > 2.0 * dx {
        (rect.x0 + dx, rect.x1 - dx)
    } else {
        (center.x, center.x)
    };
    let (y0, y1) = if rect.height() > 2.0 * dy {
        (rect.y0 + dy, rect.y1 - dy)
    } else {
        (center.y, center.y)
    };
    Rect::new(x0, y0, x1, y1)
}

impl ImageFilterBounds for ErodeImageFilter {
    fn modifies_transparent_black(&self) -> bool {
        false
    }

    fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        Ok(inset_rect(
            input,
            f64::from(self.radius_x),
            f64::from(self.radius_y),
        ))
    }

    fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds {
        let (dx, dy) = self.device_radius(ctm);
        Ok(IRect::round_out(inset_rect(
            input.to_rect(),
            f64::from(dx),
            f64::from(dy),
        )))
    }

    fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds {
        let (dx, dy) = self.device_radius(ctm);
        Ok(output.outset(dx, dy))
    }
}

/// A filter implemented by a rendering backend, opaque to this crate.
pub trait BackendImageFilter: Debug + Send + Sync {
    /// Whether the backend can compute bounds without running the filter.
    ///
    /// Filters that can't are assumed to modify transparent black.
    fn can_compute_fast_bounds(&self) -> bool;

    /// Computes the output bounds for local input bounds.
    fn compute_fast_bounds(&self, input: Rect) -> Rect;

    /// Computes the output device bounds for input device bounds under `ctm`.
    fn filter_device_bounds(&self, input: IRect, ctm: &Affine) -> IRect;

    /// Computes the input device bounds needed for output device bounds under `ctm`.
    fn filter_input_device_bounds(&self, output: IRect, ctm: &Affine) -> IRect;
}

/// Wraps a [`BackendImageFilter`].
///
/// Equality is identity of the wrapped object, since backends don't expose a
/// structural equality.
#[derive(Clone, Debug)]
pub struct UnknownImageFilter {
    backend: Arc<dyn BackendImageFilter>,
}

impl UnknownImageFilter {
    /// Wraps a backend filter.
    pub fn new(backend: Arc<dyn BackendImageFilter>) -> Self {
        Self { backend }
    }

    /// The wrapped backend filter.
    pub fn backend(&self) -> &Arc<dyn BackendImageFilter> {
        &self.backend
    }
}

impl PartialEq for UnknownImageFilter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl ImageFilterBounds for UnknownImageFilter {
    fn modifies_transparent_black(&self) -> bool {
        !self.backend.can_compute_fast_bounds()
    }

    fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        if self.modifies_transparent_black() {
            return Err(Unbounded { last_known: input });
        }
        Ok(self.backend.compute_fast_bounds(input))
    }

    fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds {
        if self.modifies_transparent_black() {
            return Err(Unbounded { last_known: input });
        }
        Ok(self.backend.filter_device_bounds(input, ctm))
    }

    fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds {
        if self.modifies_transparent_black() {
            return Err(Unbounded { last_known: output });
        }
        Ok(self.backend.filter_input_device_bounds(output, ctm))
    }
}

/// An image filter.
///
/// Two filters are equal when they are the same variant with equal
/// parameters; nested filters are compared structurally.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageFilter {
    /// See [`BlurImageFilter`].
    Blur(BlurImageFilter),
    /// See [`MatrixImageFilter`].
    Matrix(MatrixImageFilter),
    /// See [`ComposeImageFilter`].
    Compose(ComposeImageFilter),
    /// See [`ColorFilterImageFilter`].
    ColorFilter(ColorFilterImageFilter),
    /// See [`LocalMatrixImageFilter`].
    LocalMatrix(LocalMatrixImageFilter),
    /// See [`DilateImageFilter`].
    Dilate(DilateImageFilter),
    /// See [`ErodeImageFilter`].
    Erode(ErodeImageFilter),
    /// See [`UnknownImageFilter`].
    Unknown(UnknownImageFilter),
}

impl ImageFilter {
    /// Creates a blur, or `None` if neither sigma would blur anything.
    pub fn blur(sigma_x: f32, sigma_y: f32, tile_mode: TileMode) -> Option<Arc<Self>> {
        let valid = |s: f32| s.is_finite() && s > 0.0;
        if !valid(sigma_x) && !valid(sigma_y) {
            return None;
        }
        let clean = |s: f32| if valid(s) { s } else { 0.0 };
        Some(Arc::new(Self::Blur(BlurImageFilter::new(
            clean(sigma_x),
            clean(sigma_y),
            tile_mode,
        ))))
    }

    /// Creates a matrix filter.
    pub fn matrix(matrix: Affine, sampling: ImageSampling) -> Arc<Self> {
        Arc::new(Self::Matrix(MatrixImageFilter::new(matrix, sampling)))
    }

    /// Composes two filters, collapsing to the present one if either is absent.
    pub fn compose(
        outer: Option<Arc<Self>>,
        inner: Option<Arc<Self>>,
    ) -> Option<Arc<Self>> {
        match (outer, inner) {
            (Some(outer), Some(inner)) => Some(Arc::new(Self::Compose(ComposeImageFilter::new(
                Some(outer),
                Some(inner),
            )))),
            (outer, None) => outer,
            (None, inner) => inner,
        }
    }

    /// Wraps a color filter.
    pub fn color_filter(color_filter: Arc<ColorFilter>) -> Arc<Self> {
        Arc::new(Self::ColorFilter(ColorFilterImageFilter::new(color_filter)))
    }

    /// Applies `filter` under an additional local transform.
    pub fn local_matrix(matrix: Affine, filter: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::LocalMatrix(LocalMatrixImageFilter::new(
            matrix,
            Some(filter),
        )))
    }

    /// Creates a dilation.
    pub fn dilate(radius_x: f32, radius_y: f32) -> Arc<Self> {
        Arc::new(Self::Dilate(DilateImageFilter::new(radius_x, radius_y)))
    }

    /// Creates an erosion.
    pub fn erode(radius_x: f32, radius_y: f32) -> Arc<Self> {
        Arc::new(Self::Erode(ErodeImageFilter::new(radius_x, radius_y)))
    }

    /// Wraps a backend filter.
    pub fn unknown(backend: Arc<dyn BackendImageFilter>) -> Arc<Self> {
        Arc::new(Self::Unknown(UnknownImageFilter::new(backend)))
    }

    /// Returns the blur, if this is one.
    pub fn as_blur(&self) -> Option<&BlurImageFilter> {
        match self {
            Self::Blur(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns the matrix filter, if this is one.
    pub fn as_matrix(&self) -> Option<&MatrixImageFilter> {
        match self {
            Self::Matrix(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns the composition, if this is one.
    pub fn as_compose(&self) -> Option<&ComposeImageFilter> {
        match self {
            Self::Compose(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns the color filter wrapper, if this is one.
    pub fn as_color_filter(&self) -> Option<&ColorFilterImageFilter> {
        match self {
            Self::ColorFilter(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns the local matrix filter, if this is one.
    pub fn as_local_matrix(&self) -> Option<&LocalMatrixImageFilter> {
        match self {
            Self::LocalMatrix(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns the dilation, if this is one.
    pub fn as_dilate(&self) -> Option<&DilateImageFilter> {
        match self {
            Self::Dilate(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns the erosion, if this is one.
    pub fn as_erode(&self) -> Option<&ErodeImageFilter> {
        match self {
            Self::Erode(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns the backend filter wrapper, if this is one.
    pub fn as_unknown(&self) -> Option<&UnknownImageFilter> {
        match self {
            Self::Unknown(filter) => Some(filter),
            _ => None,
        }
    }

    fn bounds(&self) -> &dyn ImageFilterBounds {
        match self {
            Self::Blur(filter) => filter,
            Self::Matrix(filter) => filter,
            Self::Compose(filter) => filter,
            Self::ColorFilter(filter) => filter,
            Self::LocalMatrix(filter) => filter,
            Self::Dilate(filter) => filter,
            Self::Erode(filter) => filter,
            Self::Unknown(filter) => filter,
        }
    }

    /// See [`ImageFilterBounds::modifies_transparent_black`].
    pub fn modifies_transparent_black(&self) -> bool {
        self.bounds().modifies_transparent_black()
    }

    /// See [`ImageFilterBounds::map_local_bounds`].
    pub fn map_local_bounds(&self, input: Rect) -> LocalBounds {
        self.bounds().map_local_bounds(input)
    }

    /// See [`ImageFilterBounds::map_device_bounds`].
    pub fn map_device_bounds(&self, input: IRect, ctm: &Affine) -> DeviceBounds {
        self.bounds().map_device_bounds(input, ctm)
    }

    /// See [`ImageFilterBounds::get_input_device_bounds`].
    pub fn get_input_device_bounds(&self, output: IRect, ctm: &Affine) -> DeviceBounds {
        self.bounds().get_input_device_bounds(output, ctm)
    }
}
