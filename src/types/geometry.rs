//! Planar geometry helpers
//!
//! Coordinates are projected (metres), so plain Euclidean distance is used
//! everywhere.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// A 2D coordinate in a projected reference system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
}

impl Point {
    /// The coordinate-system origin
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    /// Create a new point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        (*other - *self).norm()
    }

    /// Length of this point read as a vector
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector
    pub fn normalized(&self) -> Option<Point> {
        let length = self.norm();
        if length > f64::EPSILON {
            Some(Point::new(self.x / length, self.y / length))
        } else {
            None
        }
    }

    /// The vector rotated by 90 degrees clockwise
    pub fn perpendicular(&self) -> Point {
        Point::new(self.y, -self.x)
    }

    /// Unit vector pointing along `bearing` (radians, counter-clockwise from +x)
    pub fn from_bearing(bearing: f64) -> Point {
        Point::new(bearing.cos(), bearing.sin())
    }

    /// Coordinates as an array, as used by the spatial index
    pub fn to_array(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Whether both coordinates are finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Distances between consecutive points of a polyline
pub fn leg_lengths(points: &[Point]) -> Vec<f64> {
    points.windows(2).map(|pair| pair[0].distance_to(&pair[1])).collect()
}
