use super::{distance_to_segment, rot90, try_normalize, Point2d, Vector2d};
use cgmath::prelude::*;
use itertools::Itertools;

/// Directions shorter than this are treated as degenerate.
const DEGENERATE_LEN: f64 = 1e-9;

/// The arc length between samples when averaging two polylines, in m.
const AVERAGE_STEP: f64 = 2.0;

/// The maximum number of samples when averaging two polylines.
const AVERAGE_MAX_SAMPLES: usize = 400;

/// Limits how far an offset vertex may move at a sharp corner (1 / cos of the half angle).
const MITER_LIMIT: f64 = 2.0;

/// A piecewise linear curve with at least two vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    points: Vec<Point2d>,
    /// The arc length at each vertex.
    dists: Vec<f64>,
}

impl Polyline {
    /// Creates a polyline, or returns `None` if there are fewer than two points.
    pub fn new(points: Vec<Point2d>) -> Option<Self> {
        (points.len() >= 2).then(|| Self::build(points))
    }

    fn build(points: Vec<Point2d>) -> Self {
        let mut dists = Vec::with_capacity(points.len());
        let mut total = 0.0;
        dists.push(total);
        for (a, b) in points.iter().tuple_windows() {
            total += a.distance(*b);
            dists.push(total);
        }
        Self { points, dists }
    }

    /// The vertices of the polyline.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    pub fn first(&self) -> Point2d {
        self.points[0]
    }

    pub fn last(&self) -> Point2d {
        self.points[self.points.len() - 1]
    }

    /// The total arc length in m.
    pub fn length(&self) -> f64 {
        self.dists[self.dists.len() - 1]
    }

    /// Index of the segment containing the given arc length.
    fn segment_at(&self, dist: f64) -> usize {
        let idx = self.dists[1..].partition_point(|d| *d < dist);
        usize::min(idx, self.points.len() - 2)
    }

    /// Samples the point at the given arc length, clamped to the ends.
    pub fn point_at(&self, dist: f64) -> Point2d {
        let dist = dist.clamp(0.0, self.length());
        let idx = self.segment_at(dist);
        let seg_len = self.dists[idx + 1] - self.dists[idx];
        if seg_len <= DEGENERATE_LEN {
            return self.points[idx];
        }
        let t = (dist - self.dists[idx]) / seg_len;
        self.points[idx] + (self.points[idx + 1] - self.points[idx]) * t
    }

    /// Samples the point at a fraction of the total length.
    pub fn point_at_fraction(&self, fraction: f64) -> Point2d {
        self.point_at(fraction * self.length())
    }

    /// The unit tangent at the given arc length.
    pub fn tangent_at(&self, dist: f64) -> Vector2d {
        self.segment_direction(self.segment_at(dist.clamp(0.0, self.length())))
    }

    /// The unit direction of segment `idx`. Zero length segments borrow
    /// the direction of the nearest segment that has one.
    pub fn segment_direction(&self, idx: usize) -> Vector2d {
        let count = self.points.len() - 1;
        for k in 0..count {
            for j in [Some(idx + k), idx.checked_sub(k)].into_iter().flatten() {
                if j >= count {
                    continue;
                }
                if let Some(dir) = try_normalize(self.points[j + 1] - self.points[j], DEGENERATE_LEN)
                {
                    return dir;
                }
            }
        }
        Vector2d::unit_x()
    }

    /// The segment closest to `point` and its distance from it.
    pub fn nearest_segment(&self, point: Point2d) -> (usize, f64) {
        self.points
            .iter()
            .tuple_windows()
            .enumerate()
            .map(|(idx, (a, b))| (idx, distance_to_segment(point, *a, *b).0))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, f64::INFINITY))
    }

    /// The shortest distance from `point` to the polyline.
    pub fn distance_to(&self, point: Point2d) -> f64 {
        self.nearest_segment(point).1
    }

    /// The unit direction of the segment closest to `point`.
    pub fn tangent_near(&self, point: Point2d) -> Vector2d {
        self.segment_direction(self.nearest_segment(point).0)
    }

    /// A copy of this polyline running the other way.
    pub fn reversed(&self) -> Self {
        Self::build(self.points.iter().rev().copied().collect())
    }

    /// Resamples the polyline at `count` evenly spaced fractions of its length.
    pub fn resample(&self, count: usize) -> Vec<Point2d> {
        let count = usize::max(count, 2);
        let denom = (count - 1) as f64;
        (0..count)
            .map(|i| self.point_at_fraction(i as f64 / denom))
            .collect()
    }

    /// The averaged centre line of two polylines running in the same direction.
    ///
    /// Both are resampled at matching fractions of their length and averaged pointwise,
    /// so irregular vertex layouts on either side do not skew the result.
    pub fn average_with(&self, other: &Polyline) -> Polyline {
        let longest = f64::max(self.length(), other.length());
        let count = ((longest / AVERAGE_STEP).ceil() as usize + 1)
            .max(self.points.len())
            .max(other.points.len())
            .min(AVERAGE_MAX_SAMPLES);
        let points = self
            .resample(count)
            .into_iter()
            .zip(other.resample(count))
            .map(|(a, b)| a.midpoint(b))
            .collect();
        Self::build(points)
    }

    /// Offsets every vertex sideways by `offset` m; positive values move to
    /// the left of the direction of travel.
    pub fn offset(&self, offset: f64) -> Vec<Point2d> {
        let last = self.points.len() - 1;
        (0..=last)
            .map(|i| {
                let normal = match (i, i == last) {
                    (0, _) => rot90(self.segment_direction(0)),
                    (_, true) => rot90(self.segment_direction(last - 1)),
                    _ => {
                        let before = rot90(self.segment_direction(i - 1));
                        let after = rot90(self.segment_direction(i));
                        let mitre = try_normalize(before + after, 1e-6).unwrap_or(after);
                        let cos = f64::max(mitre.dot(after), 1.0 / MITER_LIMIT);
                        mitre / cos
                    }
                };
                self.points[i] + normal * offset
            })
            .collect()
    }
}
