use super::Point2d;

/// An axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Point2d,
    pub max: Point2d,
}

impl BoundingBox {
    /// The box used when a network has no points at all.
    pub fn unit() -> Self {
        Self {
            min: Point2d::new(0.0, 0.0),
            max: Point2d::new(1.0, 1.0),
        }
    }

    /// Computes the bounds of a set of points, or `None` if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2d>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for point in points {
            bounds.extend(*point);
        }
        Some(bounds)
    }

    /// Grows the box so it contains the point.
    pub fn extend(&mut self, point: Point2d) {
        self.min.x = f64::min(self.min.x, point.x);
        self.min.y = f64::min(self.min.y, point.y);
        self.max.x = f64::max(self.max.x, point.x);
        self.max.y = f64::max(self.max.y, point.y);
    }

    /// Returns the union of two boxes.
    pub fn union(mut self, other: &Self) -> Self {
        self.extend(other.min);
        self.extend(other.max);
        self
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn centre(&self) -> Point2d {
        Point2d::new(
            0.5 * (self.min.x + self.max.x),
            0.5 * (self.min.y + self.max.y),
        )
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::unit()
    }
}
