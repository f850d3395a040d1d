//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use cgmath::num_traits::Float;
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

impl<T: std::ops::Sub<T, Output = T> + Copy> Interval<T> {
    /// Gets the magnitude of the interval.
    pub fn length(&self) -> T {
        self.max - self.min
    }
}

impl<T: Float> Interval<T> {
    /// Restricts a value to lie within the interval.
    pub fn clamp(&self, value: T) -> T {
        T::min(T::max(value, self.min), self.max)
    }

    pub fn lerp(&self, t: T) -> T {
        self.min + t * (self.max - self.min)
    }

    /// The inverse of `lerp`, clamped to `[0, 1]`.
    /// A degenerate interval maps everything at or past `max` to one.
    pub fn inv_lerp(&self, value: T) -> T {
        let len = self.max - self.min;
        if len <= T::zero() {
            return if value >= self.max { T::one() } else { T::zero() };
        }
        T::min(T::max((value - self.min) / len, T::zero()), T::one())
    }

    /// Evenly spaced samples across the interval, including both ends.
    pub fn samples(&self, count: usize) -> impl Iterator<Item = T> + '_ {
        let denom = T::from(usize::max(count, 2) - 1).unwrap_or_else(T::one);
        (0..count).map(move |i| self.lerp(T::from(i).unwrap_or_else(T::zero) / denom))
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}
