//! Two-corner bounding boxes with typed coordinate spaces.

use std::marker::PhantomData;

/// Marker type for absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Marker type for coordinates expressed as fractions of the image size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Normalized {}

/// An axis-aligned box given by two opposite corners.
///
/// The corners are stored as supplied; annotation tools may record them in
/// any order (top-left/bottom-right, bottom-right/top-left, or the other
/// diagonal). Every derived quantity is independent of that order.
#[derive(Clone, Copy, PartialEq)]
pub struct CornerBox<TSpace> {
    a: (f64, f64),
    b: (f64, f64),
    _space: PhantomData<TSpace>,
}

impl<TSpace> CornerBox<TSpace> {
    #[inline]
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            a,
            b,
            _space: PhantomData,
        }
    }

    /// Midpoint of the two corners.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        ((self.a.0 + self.b.0) / 2.0, (self.a.1 + self.b.1) / 2.0)
    }

    /// Absolute span along x.
    #[inline]
    pub fn width(&self) -> f64 {
        (self.a.0 - self.b.0).abs()
    }

    /// Absolute span along y.
    #[inline]
    pub fn height(&self) -> f64 {
        (self.a.1 - self.b.1).abs()
    }

    /// Returns `(cx, cy, w, h)`.
    #[inline]
    pub fn to_cxcywh(&self) -> (f64, f64, f64, f64) {
        let (cx, cy) = self.center();
        (cx, cy, self.width(), self.height())
    }
}

impl<TSpace> std::fmt::Debug for CornerBox<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CornerBox")
            .field("a", &self.a)
            .field("b", &self.b)
            .finish()
    }
}

impl CornerBox<Pixel> {
    /// Scales pixel corners into the unit square of an image.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> CornerBox<Normalized> {
        CornerBox::from_corners(
            (self.a.0 / image_width, self.a.1 / image_height),
            (self.b.0 / image_width, self.b.1 / image_height),
        )
    }
}
