//! Matches each edge with the edge running the opposite way along the same road,
//! so the two can share a single centre divider.

use super::LaneRange;
use crate::math::{Polyline, Vector2d};
use crate::network::{Edge, LaneClass, NetworkGeometry};
use crate::util::Interval;
use crate::{EdgeId, LaneId};
use cgmath::prelude::*;
use itertools::Itertools;
use slotmap::SecondaryMap;
use std::collections::HashMap;

/// Edges whose directions have a dot product above this are not opposite.
const MAX_DIRECTION_DOT: f64 = -0.55;

/// The fractions of a lane at which its direction is measured.
const DIRECTION_SAMPLES: [f64; 2] = [0.2, 0.8];

/// The part of a lane compared against its partner, avoiding junction curvature.
const DISTANCE_WINDOW: Interval<f64> = Interval::new(0.15, 0.85);

/// The number of points sampled within [DISTANCE_WINDOW].
const DISTANCE_SAMPLES: usize = 8;

/// The bounds on the adaptive distance cap, in m.
const DISTANCE_CAP: Interval<f64> = Interval::new(7.0, 35.0);

/// The distance cap grows by this much per metre of the shorter edge.
const DISTANCE_CAP_PER_METRE: f64 = 0.25;

/// Score added per metre of difference in edge length.
const LENGTH_PENALTY: f64 = 0.05;

/// Two edges that run in opposite directions along the same road.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgePair {
    pub a: EdgeId,
    pub b: EdgeId,
    /// The lane of `a` that runs alongside `b`.
    pub lane_a: LaneId,
    /// The lane of `b` that runs alongside `a`.
    pub lane_b: LaneId,
}

/// A candidate lane pairing and how well it fits.
#[derive(Clone, Copy)]
struct Fit {
    lane_a: LaneId,
    lane_b: LaneId,
    distance: f64,
}

/// Pairs opposite edges greedily.
///
/// Edges following the `X` / `-X` naming convention are matched first. The
/// rest are matched in id order to the unclaimed reverse edge (same end nodes,
/// swapped) with the lowest geometric score. No edge is ever in two pairs.
pub(crate) fn pair_opposite_edges(
    network: &NetworkGeometry,
    ranges: &SecondaryMap<EdgeId, LaneRange>,
) -> Vec<EdgePair> {
    let edges = network
        .iter_edges()
        .filter(|(_, edge)| !edge.is_internal() && !edge.lanes().is_empty())
        .sorted_by(|a, b| a.1.id().cmp(b.1.id()))
        .collect::<Vec<_>>();

    let mut by_nodes: HashMap<(&str, &str), Vec<EdgeId>> = HashMap::new();
    for (id, edge) in &edges {
        by_nodes.entry((edge.from(), edge.to())).or_default().push(*id);
    }

    let mut claimed: SecondaryMap<EdgeId, ()> = SecondaryMap::new();
    let mut pairs = vec![];

    // Naming convention first
    for (id_a, edge_a) in &edges {
        if claimed.contains_key(*id_a) {
            continue;
        }
        let Some(id_b) = network.edge_id(&toggle_minus(edge_a.id())) else {
            continue;
        };
        let Some(edge_b) = network.edge(id_b) else {
            continue;
        };
        if id_b == *id_a
            || claimed.contains_key(id_b)
            || edge_b.is_internal()
            || !is_reverse(edge_a, edge_b)
        {
            continue;
        }
        if let Some(fit) = closest_lanes(network, ranges, *id_a, id_b) {
            claimed.insert(*id_a, ());
            claimed.insert(id_b, ());
            pairs.push(EdgePair {
                a: *id_a,
                b: id_b,
                lane_a: fit.lane_a,
                lane_b: fit.lane_b,
            });
        }
    }

    // Then by geometric score
    for (id_a, edge_a) in &edges {
        if claimed.contains_key(*id_a) {
            continue;
        }
        let Some(candidates) = by_nodes.get(&(edge_a.to(), edge_a.from())) else {
            continue;
        };
        let mut best: Option<(f64, EdgeId, Fit)> = None;
        for id_b in candidates {
            if *id_b == *id_a || claimed.contains_key(*id_b) {
                continue;
            }
            let Some((value, fit)) = score(network, ranges, *id_a, *id_b) else {
                continue;
            };
            if best.map_or(true, |(best, _, _)| value < best) {
                best = Some((value, *id_b, fit));
            }
        }
        if let Some((_, id_b, fit)) = best {
            claimed.insert(*id_a, ());
            claimed.insert(id_b, ());
            pairs.push(EdgePair {
                a: *id_a,
                b: id_b,
                lane_a: fit.lane_a,
                lane_b: fit.lane_b,
            });
        }
    }

    pairs
}

/// `-X` becomes `X` and `X` becomes `-X`.
fn toggle_minus(id: &str) -> String {
    match id.strip_prefix('-') {
        Some(rest) => rest.to_owned(),
        None => format!("-{id}"),
    }
}

fn is_reverse(a: &Edge, b: &Edge) -> bool {
    a.from() == b.to() && a.to() == b.from()
}

/// Scores `b` as the opposite of `a`; lower is better.
/// Returns `None` if `b` cannot be the opposite edge.
fn score(
    network: &NetworkGeometry,
    ranges: &SecondaryMap<EdgeId, LaneRange>,
    a: EdgeId,
    b: EdgeId,
) -> Option<(f64, Fit)> {
    let fit = closest_lanes(network, ranges, a, b)?;
    let shape_a = network.lane(fit.lane_a)?.shape();
    let shape_b = network.lane(fit.lane_b)?.shape();

    if direction(shape_a).dot(direction(shape_b)) > MAX_DIRECTION_DOT {
        return None;
    }

    let shorter = f64::min(shape_a.length(), shape_b.length());
    let cap = DISTANCE_CAP.clamp(shorter * DISTANCE_CAP_PER_METRE);
    if fit.distance > cap {
        return None;
    }

    let mismatch = (shape_a.length() - shape_b.length()).abs();
    Some((fit.distance + LENGTH_PENALTY * mismatch, fit))
}

/// The direction of a lane between its 20% and 80% points.
fn direction(shape: &Polyline) -> Vector2d {
    let [from, to] = DIRECTION_SAMPLES.map(|f| shape.point_at_fraction(f));
    let dir = to - from;
    if dir.magnitude2() > 0.0 {
        dir.normalize()
    } else {
        dir
    }
}

/// Finds the lanes of `a` and `b` that lie closest together.
///
/// Only indexed motor lanes are considered, unless an edge has none,
/// in which case all of its indexed lanes are.
fn closest_lanes(
    network: &NetworkGeometry,
    ranges: &SecondaryMap<EdgeId, LaneRange>,
    a: EdgeId,
    b: EdgeId,
) -> Option<Fit> {
    let lanes_a = comparable_lanes(network, ranges.get(a)?);
    let lanes_b = comparable_lanes(network, ranges.get(b)?);

    lanes_a
        .iter()
        .cartesian_product(lanes_b.iter())
        .filter_map(|(la, lb)| {
            let distance = mean_distance(
                network.lane(*la)?.shape(),
                &network.lane(*lb)?.shape().reversed(),
            );
            Some(Fit {
                lane_a: *la,
                lane_b: *lb,
                distance,
            })
        })
        .min_by(|x, y| x.distance.total_cmp(&y.distance))
}

fn comparable_lanes(network: &NetworkGeometry, range: &LaneRange) -> Vec<LaneId> {
    let motor = range
        .iter()
        .filter(|id| network.lane(*id).map(|l| l.class()) == Some(LaneClass::Motor))
        .collect::<Vec<_>>();
    if motor.is_empty() {
        range.iter().collect()
    } else {
        motor
    }
}

/// The mean distance from the interior of `a` to `b`, which runs in the same direction.
fn mean_distance(a: &Polyline, b: &Polyline) -> f64 {
    let total: f64 = DISTANCE_WINDOW
        .samples(DISTANCE_SAMPLES)
        .map(|f| b.distance_to(a.point_at_fraction(f)))
        .sum();
    total / DISTANCE_SAMPLES as f64
}
