//! Rendering oriented facts derived from a parsed network.

pub use classify::classify_lane;
pub use pairing::EdgePair;
pub use stops::{resolve_bus_stops, BusStop, BusStopMarker};

use crate::network::{LaneClass, NetworkGeometry, TextMarker};
use crate::{EdgeId, LaneId};
use log::info;
use slotmap::SecondaryMap;
use smallvec::SmallVec;

mod classify;
mod pairing;
mod stops;

/// The fraction along a lane at which its edge label is anchored.
const LABEL_FRACTION: f64 = 0.55;

/// The indexed lanes of an edge, addressable by lane index.
#[derive(Clone, Debug)]
pub struct LaneRange {
    /// Lanes sorted by index, at most one per index.
    lanes: SmallVec<[(i32, LaneId); 4]>,
}

impl LaneRange {
    /// Builds a range from `(index, lane)` pairs, ignoring negative indices.
    /// Returns `None` if no lane has a valid index.
    fn new(lanes: impl IntoIterator<Item = (i32, LaneId)>) -> Option<Self> {
        let mut lanes = lanes
            .into_iter()
            .filter(|(index, _)| *index >= 0)
            .collect::<SmallVec<[_; 4]>>();
        if lanes.is_empty() {
            return None;
        }
        // Stable, so the first lane declared with an index is kept
        lanes.sort_by_key(|(index, _)| *index);
        lanes.dedup_by_key(|(index, _)| *index);
        Some(Self { lanes })
    }

    pub fn min_index(&self) -> i32 {
        self.lanes.first().map_or(0, |(index, _)| *index)
    }

    pub fn max_index(&self) -> i32 {
        self.lanes.last().map_or(0, |(index, _)| *index)
    }

    /// Gets the lane with the given index.
    pub fn get(&self, index: i32) -> Option<LaneId> {
        let pos = self.lanes.binary_search_by_key(&index, |(i, _)| *i).ok()?;
        Some(self.lanes[pos].1)
    }

    /// The lanes from right to left.
    pub fn iter(&self) -> impl Iterator<Item = LaneId> + '_ {
        self.lanes.iter().map(|(_, lane)| *lane)
    }

    /// The rightmost lane.
    pub fn rightmost(&self) -> Option<LaneId> {
        self.lanes.first().map(|(_, lane)| *lane)
    }

    /// The leftmost lane.
    pub fn leftmost(&self) -> Option<LaneId> {
        self.lanes.last().map(|(_, lane)| *lane)
    }

    /// Neighbouring lanes with consecutive indices, right lane first.
    pub fn adjacent(&self) -> impl Iterator<Item = (LaneId, LaneId)> + '_ {
        self.lanes
            .windows(2)
            .filter(|w| w[0].0.checked_add(1) == Some(w[1].0))
            .map(|w| (w[0].1, w[1].1))
    }
}

/// Topology derived once per network load.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    ranges: SecondaryMap<EdgeId, LaneRange>,
    pairs: Vec<EdgePair>,
    partners: SecondaryMap<EdgeId, EdgeId>,
    bicycle_connectors: Vec<LaneId>,
    edge_labels: Vec<TextMarker>,
    signal_labels: Vec<TextMarker>,
}

impl Topology {
    /// Classifies the lanes of `network` in place and derives its topology.
    pub fn build(network: &mut NetworkGeometry) -> Self {
        for lane in network.lanes.values_mut() {
            lane.class = classify_lane(&lane.id, lane.allow.as_deref(), &lane.disallow);
        }

        let mut ranges = SecondaryMap::new();
        for (edge_id, edge) in network.iter_edges() {
            if edge.is_internal() {
                continue;
            }
            let lanes = edge
                .lanes()
                .iter()
                .filter_map(|id| Some((network.lane(*id)?.index(), *id)));
            if let Some(range) = LaneRange::new(lanes) {
                ranges.insert(edge_id, range);
            }
        }

        let pairs = pairing::pair_opposite_edges(network, &ranges);
        let mut partners = SecondaryMap::new();
        for pair in &pairs {
            partners.insert(pair.a, pair.b);
            partners.insert(pair.b, pair.a);
        }

        let topology = Self {
            bicycle_connectors: find_bicycle_connectors(network, &ranges),
            edge_labels: edge_labels(network, &ranges),
            signal_labels: network
                .iter_junctions()
                .filter(|j| j.has_signal())
                .map(|j| TextMarker {
                    text: j.id().to_owned(),
                    anchor: j.centroid(),
                })
                .collect(),
            ranges,
            pairs,
            partners,
        };

        info!(
            "indexed network: {} opposite edge pairs, {} bicycle connectors",
            topology.pairs.len(),
            topology.bicycle_connectors.len()
        );
        topology
    }

    /// The indexed lanes of a non-internal edge.
    pub fn lane_range(&self, edge: EdgeId) -> Option<&LaneRange> {
        self.ranges.get(edge)
    }

    pub fn iter_lane_ranges(&self) -> impl Iterator<Item = (EdgeId, &LaneRange)> {
        self.ranges.iter()
    }

    /// The matched pairs of opposite edges.
    pub fn pairs(&self) -> &[EdgePair] {
        &self.pairs
    }

    /// The edge running opposite to `edge`, if one was matched.
    pub fn partner(&self, edge: EdgeId) -> Option<EdgeId> {
        self.partners.get(edge).copied()
    }

    /// Internal lanes that carry bicycles through a junction.
    pub fn bicycle_connectors(&self) -> &[LaneId] {
        &self.bicycle_connectors
    }

    /// One label per non-internal edge.
    pub fn edge_labels(&self) -> &[TextMarker] {
        &self.edge_labels
    }

    /// One label per signalised junction.
    pub fn signal_labels(&self) -> &[TextMarker] {
        &self.signal_labels
    }
}

/// Whether the lane a connection leaves from or enters is bicycle-only.
///
/// The lane is looked up by index; if that fails the whole edge counts as
/// bicycle-only when every one of its lanes is.
fn is_bicycle_end(
    network: &NetworkGeometry,
    ranges: &SecondaryMap<EdgeId, LaneRange>,
    edge: &str,
    index: Option<i32>,
) -> bool {
    let Some(edge_id) = network.edge_id(edge) else {
        return false;
    };
    let is_bicycle = |lane: LaneId| {
        network.lane(lane).map(|l| l.class()) == Some(LaneClass::BicycleOnly)
    };
    let by_index = index.and_then(|index| ranges.get(edge_id)?.get(index));
    match by_index {
        Some(lane) => is_bicycle(lane),
        None => network.edge(edge_id).map_or(false, |edge| {
            !edge.lanes().is_empty() && edge.lanes().iter().all(|lane| is_bicycle(*lane))
        }),
    }
}

fn find_bicycle_connectors(
    network: &NetworkGeometry,
    ranges: &SecondaryMap<EdgeId, LaneRange>,
) -> Vec<LaneId> {
    let mut found = SecondaryMap::<LaneId, ()>::new();
    let mut connectors = vec![];
    for conn in network.connections() {
        let Some(via) = conn.via.as_deref().and_then(|via| network.lane_id(via)) else {
            continue;
        };
        if !network.lane(via).map_or(false, |lane| lane.is_internal()) {
            continue;
        }
        let bicycle = is_bicycle_end(network, ranges, &conn.from_edge, conn.from_lane)
            || is_bicycle_end(network, ranges, &conn.to_edge, conn.to_lane);
        if bicycle && found.insert(via, ()).is_none() {
            connectors.push(via);
        }
    }
    connectors
}

/// Anchors a label on each non-internal edge, on its middle lane.
fn edge_labels(
    network: &NetworkGeometry,
    ranges: &SecondaryMap<EdgeId, LaneRange>,
) -> Vec<TextMarker> {
    network
        .iter_edges()
        .filter(|(_, edge)| !edge.is_internal())
        .filter_map(|(edge_id, edge)| {
            let lane = ranges
                .get(edge_id)
                .and_then(|r| r.get(r.min_index() + (r.max_index() - r.min_index()) / 2))
                .or_else(|| edge.lanes().first().copied())?;
            let text = match edge.name() {
                "" => edge.id(),
                name => name,
            };
            Some(TextMarker {
                text: text.to_owned(),
                anchor: network.lane(lane)?.shape().point_at_fraction(LABEL_FRACTION),
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_str;
    use assert_approx_eq::assert_approx_eq;

    fn build(source: &str) -> (NetworkGeometry, Topology) {
        let mut network = parse_str(source);
        let topology = Topology::build(&mut network);
        (network, topology)
    }

    const TWO_WAY: &str = r#"<net>
        <edge id="E1" from="A" to="B"><lane id="E1_0" shape="0,-1.6 100,-1.6"/></edge>
        <edge id="E2" from="B" to="A"><lane id="E2_0" shape="100,1.6 0,1.6"/></edge>
    </net>"#;

    #[test]
    fn mirrored_edges_are_paired() {
        let (network, topology) = build(TWO_WAY);
        let e1 = network.edge_id("E1").unwrap();
        let e2 = network.edge_id("E2").unwrap();
        assert_eq!(topology.pairs().len(), 1);
        assert_eq!(topology.partner(e1), Some(e2));
        assert_eq!(topology.partner(e2), Some(e1));
    }

    #[test]
    fn same_direction_edges_are_not_paired() {
        let (_, topology) = build(
            r#"<net>
            <edge id="E1" from="A" to="B"><lane id="E1_0" shape="0,0 100,0"/></edge>
            <edge id="E2" from="B" to="A"><lane id="E2_0" shape="0,3 100,3"/></edge>
        </net>"#,
        );
        assert!(topology.pairs().is_empty());
    }

    #[test]
    fn distance_cap_grows_with_length() {
        // Both roads have their directions 10 m apart
        let (_, short) = build(
            r#"<net>
            <edge id="E1" from="A" to="B"><lane id="E1_0" shape="0,0 20,0"/></edge>
            <edge id="E2" from="B" to="A"><lane id="E2_0" shape="20,10 0,10"/></edge>
        </net>"#,
        );
        assert!(short.pairs().is_empty());

        let (network, long) = build(
            r#"<net>
            <edge id="E1" from="A" to="B"><lane id="E1_0" shape="0,0 200,0"/></edge>
            <edge id="E2" from="B" to="A"><lane id="E2_0" shape="200,10 0,10"/></edge>
        </net>"#,
        );
        let e1 = network.edge_id("E1").unwrap();
        let e2 = network.edge_id("E2").unwrap();
        assert_eq!(long.partner(e1), Some(e2));
    }

    #[test]
    fn distant_edges_are_not_paired() {
        let (_, topology) = build(
            r#"<net>
            <edge id="E1" from="A" to="B"><lane id="E1_0" shape="0,0 100,0"/></edge>
            <edge id="E2" from="B" to="A"><lane id="E2_0" shape="100,60 0,60"/></edge>
        </net>"#,
        );
        assert!(topology.pairs().is_empty());
    }

    #[test]
    fn naming_convention_wins_over_geometry() {
        // `X` lies closer to `E` than `-E` does, but `-E` follows the naming convention.
        let (network, topology) = build(
            r#"<net>
            <edge id="E" from="A" to="B"><lane id="E_0" shape="0,0 100,0"/></edge>
            <edge id="X" from="B" to="A"><lane id="X_0" shape="100,2 0,2"/></edge>
            <edge id="-E" from="B" to="A"><lane id="-E_0" shape="100,5 0,5"/></edge>
        </net>"#,
        );
        let e = network.edge_id("E").unwrap();
        let minus_e = network.edge_id("-E").unwrap();
        let x = network.edge_id("X").unwrap();
        assert_eq!(topology.partner(e), Some(minus_e));
        assert_eq!(topology.partner(x), None);
    }

    #[test]
    fn closest_candidate_wins() {
        let (network, topology) = build(
            r#"<net>
            <edge id="E" from="A" to="B"><lane id="E_0" shape="0,0 100,0"/></edge>
            <edge id="F" from="B" to="A"><lane id="F_0" shape="100,9 0,9"/></edge>
            <edge id="G" from="B" to="A"><lane id="G_0" shape="100,3 0,3"/></edge>
        </net>"#,
        );
        let e = network.edge_id("E").unwrap();
        let g = network.edge_id("G").unwrap();
        assert_eq!(topology.partner(e), Some(g));
    }

    #[test]
    fn lane_ranges_skip_unindexed_lanes() {
        let (network, topology) = build(
            r#"<net>
            <edge id="E" from="A" to="B">
                <lane id="E_0" shape="0,0 100,0"/>
                <lane id="E_2" shape="0,6.4 100,6.4"/>
                <lane id="E_kerb" shape="0,-2 100,-2"/>
            </edge>
        </net>"#,
        );
        let range = topology.lane_range(network.edge_id("E").unwrap()).unwrap();
        assert_eq!(range.min_index(), 0);
        assert_eq!(range.max_index(), 2);
        assert_eq!(range.get(1), None);
        assert_eq!(range.get(2), network.lane_id("E_2"));
        assert_eq!(range.adjacent().count(), 0);
        assert_eq!(range.iter().count(), 2);
        assert_eq!(range.leftmost(), network.lane_id("E_2"));
    }

    #[test]
    fn lane_ranges_with_huge_or_sparse_indices() {
        let (network, topology) = build(
            r#"<net>
            <edge id="E" from="A" to="B">
                <lane id="E_0" shape="0,0 100,0"/>
                <lane id="E_2147483647" shape="0,3.2 100,3.2"/>
            </edge>
            <edge id="F" from="B" to="C">
                <lane id="F_0" shape="100,0 200,0"/>
                <lane id="F_500000000" shape="100,3.2 200,3.2"/>
                <lane id="F_500000001" shape="100,6.4 200,6.4"/>
            </edge>
        </net>"#,
        );
        let e = topology.lane_range(network.edge_id("E").unwrap()).unwrap();
        assert_eq!(e.max_index(), i32::MAX);
        assert_eq!(e.get(i32::MAX), network.lane_id("E_2147483647"));
        assert_eq!(e.rightmost(), network.lane_id("E_0"));
        assert_eq!(e.adjacent().count(), 0);

        let f = topology.lane_range(network.edge_id("F").unwrap()).unwrap();
        assert_eq!(f.iter().count(), 3);
        assert_eq!(f.get(1), None);
        assert_eq!(
            f.adjacent().collect::<Vec<_>>(),
            vec![(network.lane_id("F_500000000").unwrap(), network.lane_id("F_500000001").unwrap())]
        );
        assert_eq!(topology.edge_labels().len(), 2);
    }

    #[test]
    fn lane_classes() {
        let (network, _) = build(
            r#"<net>
            <edge id="E" from="A" to="B">
                <lane id="E_0" allow="bicycle" shape="0,0 100,0"/>
                <lane id="E_1" allow="bicycle passenger" shape="0,3 100,3"/>
                <lane id="E_2" allow="pedestrian" shape="0,6 100,6"/>
            </edge>
        </net>"#,
        );
        let class = |id: &str| network.lane_by_name(id).unwrap().class();
        assert_eq!(class("E_0"), LaneClass::BicycleOnly);
        assert_eq!(class("E_1"), LaneClass::Motor);
        assert_eq!(class("E_2"), LaneClass::PedestrianOnly);
    }

    #[test]
    fn bicycle_connectors() {
        let (network, topology) = build(
            r#"<net>
            <edge id=":J_0" function="internal"><lane id=":J_0_0" shape="100,0 104,0"/></edge>
            <edge id=":J_1" function="internal"><lane id=":J_1_0" shape="100,3 104,3"/></edge>
            <edge id="E" from="A" to="J">
                <lane id="E_0" allow="bicycle" shape="0,0 100,0"/>
                <lane id="E_1" shape="0,3 100,3"/>
            </edge>
            <edge id="F" from="J" to="C">
                <lane id="F_0" allow="bicycle" shape="104,0 200,0"/>
                <lane id="F_1" shape="104,3 200,3"/>
            </edge>
            <connection from="E" to="F" fromLane="0" toLane="0" via=":J_0_0"/>
            <connection from="E" to="F" fromLane="1" toLane="1" via=":J_1_0"/>
        </net>"#,
        );
        assert_eq!(topology.bicycle_connectors(), &[network.lane_id(":J_0_0").unwrap()]);
    }

    #[test]
    fn bicycle_connectors_without_lane_indices() {
        let (network, topology) = build(
            r#"<net>
            <edge id=":J_0" function="internal"><lane id=":J_0_0" shape="100,0 104,0"/></edge>
            <edge id=":J_1" function="internal"><lane id=":J_1_0" shape="100,3 104,3"/></edge>
            <edge id="B" from="A" to="J">
                <lane id="B_0" allow="bicycle" shape="0,0 100,0"/>
                <lane id="B_1" allow="bicycle" shape="0,2 100,2"/>
            </edge>
            <edge id="M" from="K" to="J">
                <lane id="M_0" allow="bicycle" shape="0,5 100,5"/>
                <lane id="M_1" shape="0,8 100,8"/>
            </edge>
            <edge id="F" from="J" to="C"><lane id="F_0" shape="104,0 200,0"/></edge>
            <connection from="B" to="F" via=":J_0_0"/>
            <connection from="M" to="F" via=":J_1_0"/>
        </net>"#,
        );
        assert_eq!(topology.bicycle_connectors(), &[network.lane_id(":J_0_0").unwrap()]);
    }

    #[test]
    fn labels() {
        let (_, topology) = build(
            r#"<net>
            <edge id=":J_0" function="internal"><lane id=":J_0_0" shape="100,0 104,0"/></edge>
            <edge id="E1" from="A" to="B" name="High St"><lane id="E1_0" shape="0,0 100,0"/></edge>
            <edge id="E2" from="B" to="C"><lane id="E2_0" shape="100,0 100,100"/></edge>
            <junction id="B" type="traffic_light" shape="98,-2 102,-2 102,2 98,2"/>
        </net>"#,
        );
        let labels = topology.edge_labels();
        assert_eq!(labels.len(), 2);
        let high_st = labels.iter().find(|l| l.text == "High St").unwrap();
        assert_approx_eq!(high_st.anchor.x, 55.0);
        assert!(labels.iter().any(|l| l.text == "E2"));
        let signals = topology.signal_labels();
        assert_eq!(signals.len(), 1);
        assert_approx_eq!(signals[0].anchor.x, 100.0);
        assert_approx_eq!(signals[0].anchor.y, 0.0);
    }
}
