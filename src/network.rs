//! The typed road network produced by the parser.

use crate::math::{BoundingBox, Point2d, Polyline};
use crate::{EdgeId, JunctionId, LaneId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::collections::HashMap;

/// The lane width used when the description omits one, in m.
pub const DEFAULT_LANE_WIDTH: f64 = 3.2;

/// The lane index given to lanes whose id has no trailing `_<int>`.
pub const UNKNOWN_LANE_INDEX: i32 = -1;

/// Which kinds of traffic a lane is drawn for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneClass {
    #[default]
    Motor,
    BicycleOnly,
    PedestrianOnly,
}

/// The role of an edge in the network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgeFunction {
    #[default]
    Normal,
    /// Connector geometry through a junction.
    Internal,
}

/// A single lane of an edge.
#[derive(Clone, Debug)]
pub struct Lane {
    pub(crate) id: String,
    pub(crate) edge_id: String,
    pub(crate) index: i32,
    pub(crate) shape: Polyline,
    pub(crate) width: f64,
    /// The vehicle classes explicitly allowed, if the description lists them.
    pub(crate) allow: Option<Vec<String>>,
    /// The vehicle classes explicitly disallowed.
    pub(crate) disallow: Vec<String>,
    pub(crate) class: LaneClass,
}

/// A directed road between two nodes, made of parallel lanes.
#[derive(Clone, Debug)]
pub struct Edge {
    pub(crate) id: String,
    pub(crate) from: String,
    pub(crate) to: String,
    pub(crate) name: String,
    pub(crate) function: EdgeFunction,
    pub(crate) lanes: SmallVec<[LaneId; 4]>,
}

/// The area where edges meet.
#[derive(Clone, Debug)]
pub struct Junction {
    pub(crate) id: String,
    pub(crate) has_signal: bool,
    /// Closed polygon; the last vertex connects back to the first.
    pub(crate) shape: Vec<Point2d>,
}

/// A permitted movement from one edge to another.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub from_edge: String,
    pub to_edge: String,
    pub from_lane: Option<i32>,
    pub to_lane: Option<i32>,
    /// The internal lane carrying the movement through the junction.
    pub via: Option<String>,
}

/// A piece of text anchored in world space.
#[derive(Clone, Debug, PartialEq)]
pub struct TextMarker {
    pub text: String,
    pub anchor: Point2d,
}

impl Lane {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The id of the edge that owns this lane.
    pub fn edge_id(&self) -> &str {
        &self.edge_id
    }

    /// The lateral index, 0 being the rightmost lane, or [UNKNOWN_LANE_INDEX].
    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn shape(&self) -> &Polyline {
        &self.shape
    }

    /// The lane width in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn class(&self) -> LaneClass {
        self.class
    }

    pub fn is_internal(&self) -> bool {
        self.id.starts_with(':')
    }
}

impl Edge {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The id of the node this edge starts at.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// The id of the node this edge ends at.
    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> EdgeFunction {
        self.function
    }

    pub fn is_internal(&self) -> bool {
        self.function == EdgeFunction::Internal
    }

    /// The lanes owned by this edge, in document order.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }
}

impl Junction {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_signal(&self) -> bool {
        self.has_signal
    }

    pub fn shape(&self) -> &[Point2d] {
        &self.shape
    }

    /// The vertex average of the polygon.
    pub fn centroid(&self) -> Point2d {
        let n = self.shape.len().max(1) as f64;
        let (x, y) = self
            .shape
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        Point2d::new(x / n, y / n)
    }
}

/// Splits a lane id of the form `<edgeId>_<index>` into its parts.
/// Ids without a numeric suffix keep the whole id as the edge id.
pub fn split_lane_id(lane_id: &str) -> (&str, i32) {
    match lane_id.rsplit_once('_') {
        Some((edge, index)) => match index.parse::<i32>() {
            Ok(index) if index >= 0 => (edge, index),
            _ => (lane_id, UNKNOWN_LANE_INDEX),
        },
        None => (lane_id, UNKNOWN_LANE_INDEX),
    }
}

/// The road network geometry, as parsed from a description.
///
/// A loaded network is never mutated; a new load replaces it wholesale.
#[derive(Clone, Debug, Default)]
pub struct NetworkGeometry {
    pub(crate) lanes: SlotMap<LaneId, Lane>,
    pub(crate) edges: SlotMap<EdgeId, Edge>,
    pub(crate) junctions: SlotMap<JunctionId, Junction>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) lane_ids: HashMap<String, LaneId>,
    pub(crate) edge_ids: HashMap<String, EdgeId>,
    pub(crate) bounds: BoundingBox,
}

impl NetworkGeometry {
    /// A network with no lanes, edges or junctions.
    pub fn empty() -> Self {
        Default::default()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// The bounds of every parsed point, or the unit box if there were none.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Looks up a lane by its id in the description.
    pub fn lane_id(&self, name: &str) -> Option<LaneId> {
        self.lane_ids.get(name).copied()
    }

    /// Looks up an edge by its id in the description.
    pub fn edge_id(&self, name: &str) -> Option<EdgeId> {
        self.edge_ids.get(name).copied()
    }

    pub fn lane_by_name(&self, name: &str) -> Option<&Lane> {
        self.lane_id(name).and_then(|id| self.lanes.get(id))
    }

    pub fn edge_by_name(&self, name: &str) -> Option<&Edge> {
        self.edge_id(name).and_then(|id| self.edges.get(id))
    }

    pub fn iter_lanes(&self) -> impl Iterator<Item = (LaneId, &Lane)> {
        self.lanes.iter()
    }

    pub fn iter_edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    pub fn iter_junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Adds a lane, attaching it to its parent edge if that edge is known.
    pub(crate) fn insert_lane(&mut self, lane: Lane) -> LaneId {
        let name = lane.id.clone();
        let edge = self.edge_ids.get(&lane.edge_id).copied();
        let id = self.lanes.insert(lane);
        if let Some(edge) = edge {
            self.edges[edge].lanes.push(id);
        }
        self.lane_ids.insert(name, id);
        id
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) -> EdgeId {
        let name = edge.id.clone();
        let id = self.edges.insert(edge);
        self.edge_ids.insert(name, id);
        id
    }

    pub(crate) fn insert_junction(&mut self, junction: Junction) -> JunctionId {
        self.junctions.insert(junction)
    }
}
