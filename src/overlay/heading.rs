//! Resolving and smoothing vehicle headings.
//!
//! Headings are unit vectors in world space (Y up). The simulator's reported
//! angle is only a fallback, since its convention is not known up front.

use crate::config::HeadingConfig;
use crate::math::{try_normalize, Point2d, Vector2d};
use cgmath::prelude::*;
use log::debug;
use std::collections::HashMap;

/// Vectors shorter than this have no usable direction.
const DIRECTION_EPSILON: f64 = 1e-9;

/// The heading used when nothing else is known.
pub const DEFAULT_HEADING: Vector2d = Vector2d { x: 1.0, y: 0.0 };

/// What is known about a vehicle's heading in one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadingSample {
    pub position: Point2d,
    /// The direction of the lane the vehicle is on, near its position.
    pub lane_tangent: Option<Vector2d>,
    /// The heading reported by the simulator, in degrees.
    pub angle: Option<f64>,
    /// Buses are smoothed more heavily.
    pub is_bus: bool,
}

/// Per-vehicle smoothing state carried between frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleSmoothState {
    /// Where the vehicle was last seen.
    pub position: Point2d,
    /// The smoothed heading.
    pub heading: Vector2d,
    /// The frame in which the vehicle was last updated.
    frame: u64,
}

/// Converts a reported angle to a direction.
///
/// The angle is either measured anticlockwise from east or clockwise from
/// north. Whichever reading points more along `reference` wins; without a
/// reference the north convention is assumed.
pub fn angle_to_heading(degrees: f64, reference: Option<Vector2d>) -> Option<Vector2d> {
    if !degrees.is_finite() {
        return None;
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    let from_east = Vector2d::new(cos, sin);
    let from_north = Vector2d::new(sin, cos);
    Some(match reference {
        Some(reference) if from_east.dot(reference) > from_north.dot(reference) => from_east,
        _ => from_north,
    })
}

/// Tracks a smoothed heading for every vehicle.
#[derive(Clone, Debug)]
pub struct HeadingSmoother {
    config: HeadingConfig,
    states: HashMap<String, VehicleSmoothState>,
    frame: u64,
}

impl HeadingSmoother {
    pub fn new(config: HeadingConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
            frame: 0,
        }
    }

    /// The number of vehicles with stored state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&VehicleSmoothState> {
        self.states.get(id)
    }

    /// Forgets every vehicle.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Starts a new frame of updates.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
    }

    /// Updates a vehicle and returns its smoothed heading.
    ///
    /// `dt` is the time since the previous frame, in seconds.
    pub fn update(&mut self, id: &str, sample: HeadingSample, dt: f64) -> Vector2d {
        let previous = self.states.get(id).copied();
        let raw = self.raw_heading(&sample, previous.as_ref());

        let heading = match previous {
            Some(prev) => self.blend(prev.heading, raw, dt, sample.is_bus),
            None => raw,
        };

        let state = VehicleSmoothState {
            position: sample.position,
            heading,
            frame: self.frame,
        };
        match self.states.get_mut(id) {
            Some(existing) => *existing = state,
            None => {
                self.states.insert(id.to_owned(), state);
            }
        }
        heading
    }

    /// Drops vehicles not seen this frame, once the table has grown well past
    /// the number of `active` vehicles. Returns the number dropped.
    pub fn prune(&mut self, active: usize) -> usize {
        let limit = self.config.prune_factor * active + self.config.prune_slack;
        if self.states.len() <= limit {
            return 0;
        }
        let before = self.states.len();
        let frame = self.frame;
        self.states.retain(|_, state| state.frame == frame);
        let dropped = before - self.states.len();
        debug!("pruned heading state of {dropped} vehicles");
        dropped
    }

    /// The unsmoothed heading for this frame.
    fn raw_heading(&self, sample: &HeadingSample, previous: Option<&VehicleSmoothState>) -> Vector2d {
        let motion = previous.and_then(|prev| {
            let step = sample.position - prev.position;
            if step.magnitude() > self.config.motion_epsilon {
                try_normalize(step, DIRECTION_EPSILON)
            } else {
                None
            }
        });
        let tangent = sample
            .lane_tangent
            .and_then(|t| try_normalize(t, DIRECTION_EPSILON));
        let prev_heading = previous.map(|prev| prev.heading);

        motion
            .or(tangent)
            .or_else(|| {
                let reference = motion.or(tangent).or(prev_heading);
                sample.angle.and_then(|angle| angle_to_heading(angle, reference))
            })
            .or(prev_heading)
            .unwrap_or(DEFAULT_HEADING)
    }

    /// Blends the previous heading towards `raw`, snapping on reversals.
    fn blend(&self, prev: Vector2d, raw: Vector2d, dt: f64, is_bus: bool) -> Vector2d {
        if raw.dot(prev) < self.config.snap_dot {
            return raw;
        }
        let tau = if is_bus {
            self.config.bus_tau
        } else {
            self.config.tau
        };
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.config.max_dt)
        } else {
            0.0
        };
        let alpha = if tau > 0.0 {
            1.0 - (-dt / tau).exp()
        } else {
            1.0
        };
        let alpha = self.config.alpha_range.clamp(alpha);
        try_normalize(prev * (1.0 - alpha) + raw * alpha, DIRECTION_EPSILON).unwrap_or(raw)
    }
}
