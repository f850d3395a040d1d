//! The cached static layer: roads, markings, labels and bus stops.

use crate::config::ViewConfig;
use crate::math::{flip_y, rot90, Point2d, Polyline};
use crate::network::{LaneClass, NetworkGeometry};
use crate::render::{Canvas, DrawList, Pass, Stroke};
use crate::topology::{BusStopMarker, Topology};
use crate::view::NetworkSnapshot;
use crate::viewport::ViewportTransform;
use cgmath::prelude::*;
use log::debug;

/// Shown in place of the network when there is nothing to draw.
pub const PLACEHOLDER_TEXT: &str = "No network loaded";

/// Whether a cached layer reflects the current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    Clean,
    Dirty,
}

/// Draws the static parts of the network into a cached [DrawList].
///
/// The layer is only rebuilt after [mark_dirty](Self::mark_dirty), which the
/// view calls on load, resize, pan, zoom and bus stop updates.
#[derive(Debug)]
pub struct BackgroundRenderer {
    state: LayerState,
    layer: DrawList,
    redraws: usize,
}

impl Default for BackgroundRenderer {
    fn default() -> Self {
        Self {
            state: LayerState::Dirty,
            layer: DrawList::new(),
            redraws: 0,
        }
    }
}

impl BackgroundRenderer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn mark_dirty(&mut self) {
        self.state = LayerState::Dirty;
    }

    /// The most recently drawn layer.
    pub fn layer(&self) -> &DrawList {
        &self.layer
    }

    /// The number of times the layer has been rebuilt.
    pub fn redraw_count(&self) -> usize {
        self.redraws
    }

    /// Rebuilds the layer if it is dirty. Returns whether it was rebuilt.
    pub fn redraw(
        &mut self,
        snapshot: &NetworkSnapshot,
        bus_stops: &[BusStopMarker],
        viewport: &ViewportTransform,
        config: &ViewConfig,
    ) -> bool {
        if self.state == LayerState::Clean {
            return false;
        }
        self.layer.reset();
        let mut painter = Painter {
            canvas: &mut self.layer,
            network: snapshot.geometry(),
            topology: snapshot.topology(),
            viewport,
            config,
        };
        painter.paint(bus_stops);
        self.state = LayerState::Clean;
        self.redraws += 1;
        debug!("background redrawn with {} draw calls", self.layer.len());
        true
    }
}

/// Draws one frame of the background layer.
struct Painter<'a, C: Canvas + ?Sized> {
    canvas: &'a mut C,
    network: &'a NetworkGeometry,
    topology: &'a Topology,
    viewport: &'a ViewportTransform,
    config: &'a ViewConfig,
}

impl<'a, C: Canvas + ?Sized> Painter<'a, C> {
    fn paint(&mut self, bus_stops: &[BusStopMarker]) {
        self.canvas.begin_pass(Pass::Background);
        self.canvas.clear(self.config.palette.background);

        if self.network.is_empty() {
            self.canvas.begin_pass(Pass::Placeholder);
            let centre = Point2d::new(self.viewport.width() / 2.0, self.viewport.height() / 2.0);
            self.canvas.text(
                centre,
                PLACEHOLDER_TEXT,
                self.config.style.label_size_px,
                self.config.palette.placeholder,
            );
            return;
        }

        self.junctions();
        self.lane_fills();
        self.borders();
        self.separators();
        self.dividers();
        self.bicycle_guides();
        self.labels();
        self.arrows();
        self.bus_stops(bus_stops);
    }

    fn screen(&self, points: &[Point2d]) -> Vec<Point2d> {
        points.iter().map(|p| self.viewport.to_screen(*p)).collect()
    }

    /// Strokes a world space polyline as one continuous screen path.
    fn stroke_line(&mut self, line: &Polyline, stroke: &Stroke) {
        let path = self.screen(line.points());
        self.canvas.stroke_path(&path, stroke);
    }

    fn junctions(&mut self) {
        self.canvas.begin_pass(Pass::Junctions);
        for junction in self.network.iter_junctions() {
            let polygon = self.screen(junction.shape());
            self.canvas.fill_polygon(&polygon, self.config.palette.junction);
        }
    }

    /// Motor lanes first, then bicycle and pedestrian lanes on top of them.
    fn lane_fills(&mut self) {
        let network = self.network;
        let palette = &self.config.palette;
        for (pass, class, color) in [
            (Pass::LaneFills, LaneClass::Motor, palette.road),
            (Pass::SpecialLaneFills, LaneClass::BicycleOnly, palette.bicycle_lane),
            (Pass::SpecialLaneFills, LaneClass::PedestrianOnly, palette.pedestrian_lane),
        ] {
            self.canvas.begin_pass(pass);
            // Lanes outside any known edge are filled too
            for (_, lane) in network.iter_lanes() {
                if lane.class() != class {
                    continue;
                }
                let half = lane.width() / 2.0;
                let mut outline = lane.shape().offset(half);
                outline.extend(lane.shape().offset(-half).into_iter().rev());
                let polygon = self.screen(&outline);
                self.canvas.fill_polygon(&polygon, color);
            }
        }
    }

    /// Solid lines along the outer edges of each road.
    ///
    /// The left edge of an edge with an opposite partner is covered by the
    /// centre divider instead.
    fn borders(&mut self) {
        self.canvas.begin_pass(Pass::Borders);
        let stroke = Stroke::solid(self.config.palette.border, self.config.style.border_width_px);
        let (network, topology) = (self.network, self.topology);
        for (edge_id, range) in topology.iter_lane_ranges() {
            if let Some(lane) = range.rightmost().and_then(|id| network.lane(id)) {
                let path = self.screen(&lane.shape().offset(-lane.width() / 2.0));
                self.canvas.stroke_path(&path, &stroke);
            }
            if topology.partner(edge_id).is_some() {
                continue;
            }
            if let Some(lane) = range.leftmost().and_then(|id| network.lane(id)) {
                let path = self.screen(&lane.shape().offset(lane.width() / 2.0));
                self.canvas.stroke_path(&path, &stroke);
            }
        }
    }

    /// Dashed lines between neighbouring lanes of the same edge.
    fn separators(&mut self) {
        self.canvas.begin_pass(Pass::LaneSeparators);
        let style = &self.config.style;
        let stroke = Stroke::dashed(
            self.config.palette.separator,
            style.separator_width_px,
            style.separator_dash,
        );
        let (network, topology) = (self.network, self.topology);
        for (_, range) in topology.iter_lane_ranges() {
            for (right, left) in range.adjacent() {
                let (Some(right), Some(left)) = (network.lane(right), network.lane(left)) else {
                    continue;
                };
                if right.class() == LaneClass::PedestrianOnly || left.class() == LaneClass::PedestrianOnly {
                    continue;
                }
                self.stroke_line(&right.shape().average_with(left.shape()), &stroke);
            }
        }
    }

    /// One solid line between each pair of opposite edges.
    fn dividers(&mut self) {
        self.canvas.begin_pass(Pass::CentreDividers);
        let stroke = Stroke::solid(self.config.palette.divider, self.config.style.divider_width_px);
        let network = self.network;
        for pair in self.topology.pairs() {
            let (Some(a), Some(b)) = (network.lane(pair.lane_a), network.lane(pair.lane_b)) else {
                continue;
            };
            self.stroke_line(&a.shape().average_with(&b.shape().reversed()), &stroke);
        }
    }

    fn bicycle_guides(&mut self) {
        self.canvas.begin_pass(Pass::BicycleGuides);
        let style = &self.config.style;
        let stroke = Stroke::dashed(
            self.config.palette.bicycle_guide,
            style.separator_width_px,
            style.guide_dash,
        );
        let network = self.network;
        for lane in self
            .topology
            .bicycle_connectors()
            .iter()
            .filter_map(|id| network.lane(*id))
        {
            self.stroke_line(lane.shape(), &stroke);
        }
    }

    fn labels(&mut self) {
        let style = &self.config.style;
        if self.viewport.user_scale() < style.label_min_zoom {
            return;
        }
        self.canvas.begin_pass(Pass::Labels);
        for label in self
            .topology
            .edge_labels()
            .iter()
            .chain(self.topology.signal_labels())
        {
            let anchor = self.viewport.to_screen(label.anchor);
            self.canvas
                .text(anchor, &label.text, style.label_size_px, self.config.palette.label);
        }
    }

    /// Direction arrows spaced evenly in screen space along each lane.
    fn arrows(&mut self) {
        self.canvas.begin_pass(Pass::Arrows);
        let style = &self.config.style;
        let size = style.arrow_size_px;
        let scale = self.viewport.scale();
        for lane in self.network.iter_lanes().map(|(_, lane)| lane) {
            if lane.is_internal() || lane.class() == LaneClass::PedestrianOnly {
                continue;
            }
            let length = lane.shape().length();
            let count = (length * scale / style.arrow_spacing_px).floor() as usize;
            for i in 0..count {
                let dist = (i as f64 + 0.5) * length / count as f64;
                let centre = self.viewport.to_screen(lane.shape().point_at(dist));
                let dir = flip_y(lane.shape().tangent_at(dist));
                let side = rot90(dir) * (size * 0.6);
                let triangle = [centre + dir * size, centre - dir * size + side, centre - dir * size - side];
                self.canvas.fill_polygon(&triangle, self.config.palette.arrow);
            }
        }
    }

    /// A rectangle beside the lane for each stop, with an "H" roundel.
    fn bus_stops(&mut self, stops: &[BusStopMarker]) {
        self.canvas.begin_pass(Pass::BusStops);
        let style = &self.config.style;
        let palette = &self.config.palette;
        let scale = self.viewport.scale();
        let show_names = self.viewport.user_scale() >= style.bus_stop_label_min_zoom;
        for stop in stops {
            // The right hand side of the lane, in world space
            let right = -rot90(stop.tangent);
            let offset = stop.lane_width / 2.0 + style.bus_stop_width / 2.0;
            let start = stop.anchor + right * offset;
            let end = start + stop.tangent * stop.length();
            let half = right * (style.bus_stop_width / 2.0);
            let polygon = self.screen(&[start - half, end - half, end + half, start + half]);
            self.canvas.fill_polygon(&polygon, palette.bus_stop);

            let centre = self.viewport.to_screen(start.midpoint(end));
            let radius = f64::max(style.bus_stop_width * scale * 0.5, 5.0);
            self.canvas.fill_circle(centre, radius, palette.bus_stop);
            self.canvas.text(centre, "H", radius * 1.4, palette.bus_stop_text);

            if show_names && !stop.name.is_empty() {
                let label = centre + flip_y(right) * (radius + style.label_size_px);
                self.canvas.text(label, &stop.name, style.label_size_px, palette.label);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_str;
    use crate::render::DrawCommand;
    use crate::topology::{resolve_bus_stops, BusStop};

    const TWO_WAY: &str = r#"<net>
        <edge id="E1" from="A" to="B" name="Mill Rd">
            <lane id="E1_0" shape="0,-4.8 100,-4.8"/>
            <lane id="E1_1" shape="0,-1.6 100,-1.6"/>
        </edge>
        <edge id="E2" from="B" to="A"><lane id="E2_0" shape="100,1.6 0,1.6"/></edge>
        <junction id="B" type="traffic_light" shape="100,-6 104,-6 104,6 100,6"/>
    </net>"#;

    fn draw(source: &str, zoom: f64) -> (BackgroundRenderer, NetworkSnapshot, ViewportTransform) {
        let snapshot = NetworkSnapshot::build(parse_str(source));
        let config = ViewConfig::default();
        let mut viewport = ViewportTransform::new(
            config.viewport.clone(),
            snapshot.geometry().bounds(),
            800.0,
            600.0,
        );
        viewport.zoom(zoom, 400.0, 300.0);
        let mut background = BackgroundRenderer::new();
        assert!(background.redraw(&snapshot, &[], &viewport, &config));
        (background, snapshot, viewport)
    }

    #[test]
    fn lanes_without_an_edge_are_filled() {
        let (background, snapshot, _) = draw(
            r#"<net>
            <edge id="E1" from="A" to="B"><lane id="E1_0" shape="0,0 100,0"/></edge>
            <lane id="Q_0" shape="0,20 100,20"/>
        </net>"#,
            1.0,
        );
        assert_eq!(snapshot.lane_count(), 2);
        assert_eq!(background.layer().count(Pass::LaneFills), 2);
    }

    #[test]
    fn one_divider_per_pair() {
        let (background, snapshot, _) = draw(TWO_WAY, 1.0);
        assert_eq!(snapshot.topology().pairs().len(), 1);
        let layer = background.layer();
        assert_eq!(layer.count(Pass::CentreDividers), 1);
        assert_eq!(layer.count(Pass::LaneSeparators), 1);
        // Right edges of both edges; E1's left edge is the divider
        assert_eq!(layer.count(Pass::Borders), 2);
        assert_eq!(layer.count(Pass::LaneFills), 3);
        assert_eq!(layer.count(Pass::Junctions), 1);
        assert_eq!(layer.count(Pass::Placeholder), 0);
    }

    #[test]
    fn divider_runs_between_the_pair() {
        let (background, _, viewport) = draw(TWO_WAY, 1.0);
        let Some(DrawCommand::StrokePath { points, stroke }) =
            background.layer().in_pass(Pass::CentreDividers).next()
        else {
            panic!("no divider drawn");
        };
        assert!(stroke.dash.is_none());
        for point in points {
            let world = viewport.to_world(*point);
            assert!(world.y.abs() < 1e-6);
        }
    }

    #[test]
    fn clean_layer_is_not_redrawn() {
        let (mut background, snapshot, viewport) = draw(TWO_WAY, 1.0);
        let config = ViewConfig::default();
        assert_eq!(background.state(), LayerState::Clean);
        assert!(!background.redraw(&snapshot, &[], &viewport, &config));
        assert_eq!(background.redraw_count(), 1);
        background.mark_dirty();
        assert!(background.redraw(&snapshot, &[], &viewport, &config));
        assert_eq!(background.redraw_count(), 2);
    }

    #[test]
    fn empty_network_shows_placeholder() {
        let (background, _, _) = draw("", 1.0);
        let layer = background.layer();
        assert_eq!(layer.count(Pass::Placeholder), 1);
        assert_eq!(layer.len(), 2);
        assert!(matches!(
            layer.in_pass(Pass::Placeholder).next(),
            Some(DrawCommand::Text { text, .. }) if text == PLACEHOLDER_TEXT
        ));
    }

    #[test]
    fn labels_need_zoom() {
        let (background, _, _) = draw(TWO_WAY, 1.0);
        assert_eq!(background.layer().count(Pass::Labels), 0);
        let (background, _, _) = draw(TWO_WAY, 3.0);
        // Two edge labels and one signal label
        assert_eq!(background.layer().count(Pass::Labels), 3);
    }

    #[test]
    fn arrows_follow_screen_length() {
        let (zoomed_out, _, _) = draw(TWO_WAY, 1.0);
        let (zoomed_in, _, _) = draw(TWO_WAY, 4.0);
        assert!(zoomed_out.layer().count(Pass::Arrows) >= 3);
        assert!(zoomed_in.layer().count(Pass::Arrows) > zoomed_out.layer().count(Pass::Arrows));
    }

    #[test]
    fn bus_stop_sits_beside_its_lane() {
        let snapshot = NetworkSnapshot::build(parse_str(TWO_WAY));
        let config = ViewConfig::default();
        let viewport = ViewportTransform::new(
            config.viewport.clone(),
            snapshot.geometry().bounds(),
            800.0,
            600.0,
        );
        let stops = resolve_bus_stops(
            snapshot.geometry(),
            &[BusStop {
                id: "bs".into(),
                name: "Market".into(),
                lane_id: "E1_0".into(),
                start: 20.0,
                end: 40.0,
            }],
        );
        let mut background = BackgroundRenderer::new();
        background.redraw(&snapshot, &stops, &viewport, &config);

        let mut calls = background.layer().in_pass(Pass::BusStops);
        let Some(DrawCommand::FillPolygon { points, .. }) = calls.next() else {
            panic!("no bus stop drawn");
        };
        let world: Vec<_> = points.iter().map(|p| viewport.to_world(*p)).collect();
        let xs = world.iter().map(|p| p.x);
        assert!(xs.clone().fold(f64::INFINITY, f64::min) > 19.99);
        assert!(xs.fold(f64::NEG_INFINITY, f64::max) < 40.01);
        // Right of an eastbound lane is south; lane edge at -6.4, marker 2.2 wide
        for p in &world {
            assert!(p.y < -6.39 && p.y > -8.61);
        }
        assert!(matches!(calls.next(), Some(DrawCommand::FillCircle { .. })));
        assert!(matches!(calls.next(), Some(DrawCommand::Text { text, .. }) if text == "H"));
        // Name hidden at this zoom
        assert!(calls.next().is_none());
    }
}
