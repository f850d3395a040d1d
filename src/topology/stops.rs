use crate::math::{Point2d, Vector2d};
use crate::network::NetworkGeometry;
use log::warn;

/// A bus stop as supplied by the simulator.
#[derive(Clone, Debug, PartialEq)]
pub struct BusStop {
    pub id: String,
    pub name: String,
    pub lane_id: String,
    /// Distance along the lane where the stop begins, in m.
    pub start: f64,
    /// Distance along the lane where the stop ends, in m.
    pub end: f64,
}

/// A bus stop placed on the network, ready to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct BusStopMarker {
    pub id: String,
    pub name: String,
    pub lane_id: String,
    pub start: f64,
    pub end: f64,
    /// The point on the lane centre line at `start`.
    pub anchor: Point2d,
    /// The lane direction at `anchor`.
    pub tangent: Vector2d,
    pub lane_width: f64,
}

impl BusStopMarker {
    /// The length of the stop along its lane, in m.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Places bus stops on their lanes.
///
/// Stops on unknown lanes are dropped with a warning. Distances are clamped
/// to the lane and put in order.
pub fn resolve_bus_stops(network: &NetworkGeometry, stops: &[BusStop]) -> Vec<BusStopMarker> {
    stops
        .iter()
        .filter_map(|stop| {
            let Some(lane) = network.lane_by_name(&stop.lane_id) else {
                warn!("bus stop {} is on unknown lane {}", stop.id, stop.lane_id);
                return None;
            };
            let shape = lane.shape();
            let clamp = |d: f64| if d.is_finite() { d.clamp(0.0, shape.length()) } else { 0.0 };
            let (start, end) = (clamp(stop.start), clamp(stop.end));
            let (start, end) = (f64::min(start, end), f64::max(start, end));
            Some(BusStopMarker {
                id: stop.id.clone(),
                name: stop.name.clone(),
                lane_id: stop.lane_id.clone(),
                start,
                end,
                anchor: shape.point_at(start),
                tangent: shape.tangent_at(start),
                lane_width: lane.width(),
            })
        })
        .collect()
}
