//! Image-space points and bearings.
//!
//! Image space has its origin at the top-left corner, x growing rightward and
//! y growing downward. A bearing of 0° points along +x; positive bearings
//! follow `atan2`, which on screen reads as clockwise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point2D {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl Point2D {
    /// Construct a point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Signed planar angle from `from` to `to`, in degrees.
///
/// Returns `None` when the two points coincide: a zero-length vector has no
/// direction. The result is not wrapped; it lies in (-180, 180] only because
/// that is the range of `atan2`.
pub fn bearing(from: Point2D, to: Point2D) -> Option<f64> {
    let dx = f64::from(to.x) - f64::from(from.x);
    let dy = f64::from(to.y) - f64::from(from.y);
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(dy.atan2(dx).to_degrees())
}

/// Wrap an angular difference into (-180, 180].
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_cardinal_bearings() {
        let origin = Point2D::new(0, 0);
        assert!(approx(bearing(origin, Point2D::new(100, 0)).unwrap(), 0.0));
        // y grows downward, so "below" is +90
        assert!(approx(bearing(origin, Point2D::new(0, 100)).unwrap(), 90.0));
        assert!(approx(bearing(origin, Point2D::new(0, -100)).unwrap(), -90.0));
        assert!(approx(bearing(origin, Point2D::new(-100, 0)).unwrap(), 180.0));
    }

    #[test]
    fn test_zero_length_vector_is_rejected() {
        for p in [Point2D::new(0, 0), Point2D::new(-7, 12), Point2D::new(640, 480)] {
            assert_eq!(bearing(p, p), None);
        }
    }

    #[test]
    fn test_reversed_bearing_differs_by_half_turn() {
        let pairs = [
            (Point2D::new(3, 4), Point2D::new(10, -2)),
            (Point2D::new(320, 240), Point2D::new(100, 400)),
            (Point2D::new(0, 0), Point2D::new(-5, 0)),
            (Point2D::new(1, 1), Point2D::new(1, 50)),
        ];
        for (a, b) in pairs {
            let forward = bearing(a, b).unwrap();
            let backward = bearing(b, a).unwrap();
            let diff = normalize_degrees(forward - backward).abs();
            assert!(approx(diff, 180.0), "{a} -> {b}: {forward} vs {backward}");
        }
    }

    #[test]
    fn test_normalize_range() {
        assert!(approx(normalize_degrees(0.0), 0.0));
        assert!(approx(normalize_degrees(190.0), -170.0));
        assert!(approx(normalize_degrees(-190.0), 170.0));
        assert!(approx(normalize_degrees(-180.0), 180.0));
        assert!(approx(normalize_degrees(180.0), 180.0));
        assert!(approx(normalize_degrees(-350.0), 10.0));
        assert!(approx(normalize_degrees(359.0), -1.0));
    }
}
