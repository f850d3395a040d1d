//! Reads a road network description into a [NetworkGeometry].
//!
//! The description is XML with `edge`, `lane`, `junction` and `connection`
//! elements. Shapes are whitespace separated `x,y` point lists in local metres.
//! Bad input never aborts a load: broken points are dropped, broken elements
//! are skipped, and a syntax error keeps everything read before it.

use crate::error::ParseError;
use crate::math::{BoundingBox, Point2d, Polyline};
use crate::network::{
    split_lane_id, Connection, Edge, EdgeFunction, Junction, Lane, LaneClass, NetworkGeometry,
    DEFAULT_LANE_WIDTH,
};
use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::path::Path;

/// Junction types containing this are signalised.
const SIGNAL_JUNCTION_TYPE: &str = "traffic_light";

/// Junctions of this type are connector points and are not drawn.
const INTERNAL_JUNCTION_TYPE: &str = "internal";

/// Parses a network description file.
///
/// A missing or unreadable file yields an empty network and a warning.
pub fn parse_file(path: impl AsRef<Path>) -> NetworkGeometry {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(source) => parse_str(&source),
        Err(source) => {
            let err = ParseError::Io {
                path: path.to_owned(),
                source,
            };
            warn!("{err}; showing an empty network");
            NetworkGeometry::empty()
        }
    }
}

/// Parses a network description held in memory.
pub fn parse_str(source: &str) -> NetworkGeometry {
    let mut builder = Builder::default();
    if let Err(err) = builder.read(source) {
        warn!(
            "{err}; keeping the {} lanes parsed so far",
            builder.network.lane_count()
        );
    }
    builder.finish()
}

/// Parses a shape attribute into points, dropping any token that is not a
/// pair of finite numbers. A third (elevation) component is ignored.
pub fn parse_shape(shape: &str) -> Vec<Point2d> {
    shape
        .split_whitespace()
        .filter_map(|token| {
            let mut coords = token.split(',').map(|c| c.trim().parse::<f64>());
            match (coords.next(), coords.next()) {
                (Some(Ok(x)), Some(Ok(y))) if x.is_finite() && y.is_finite() => {
                    Some(Point2d::new(x, y))
                }
                _ => {
                    debug!("dropping malformed shape point {token:?}");
                    None
                }
            }
        })
        .collect()
}

/// Incrementally assembles a network from XML events.
#[derive(Default)]
struct Builder {
    network: NetworkGeometry,
    /// The id of the `<edge>` element currently open, if any.
    current_edge: Option<String>,
    bounds: Option<BoundingBox>,
    skipped: usize,
}

/// The attributes of one element, decoded and unescaped.
struct Attributes {
    element: String,
    values: HashMap<String, String>,
}

impl Attributes {
    fn read(start: &BytesStart) -> Result<Self, ParseError> {
        let element = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut values = HashMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| ParseError::Attribute {
                element: element.clone(),
                reason: err.to_string(),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|err| ParseError::Attribute {
                element: element.clone(),
                reason: err.to_string(),
            })?;
            values.insert(key, value.into_owned());
        }
        Ok(Self { element, values })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_owned()
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// A whitespace separated list of vehicle classes.
    fn classes(&self, key: &str) -> Option<Vec<String>> {
        self.get(key)
            .map(|v| v.split_whitespace().map(str::to_owned).collect())
    }
}

impl Builder {
    fn read(&mut self, source: &str) -> Result<(), ParseError> {
        let mut reader = Reader::from_str(source);
        loop {
            let event = reader.read_event().map_err(|source| ParseError::Xml {
                position: reader.buffer_position(),
                source,
            })?;
            match event {
                Event::Start(start) => self.element(&start, true),
                Event::Empty(start) => self.element(&start, false),
                Event::End(end) if end.name().as_ref() == b"edge" => self.current_edge = None,
                Event::Eof => return Ok(()),
                _ => {}
            }
        }
    }

    fn element(&mut self, start: &BytesStart, has_children: bool) {
        let name = start.name();
        if !matches!(
            name.as_ref(),
            b"edge" | b"lane" | b"junction" | b"connection"
        ) {
            return;
        }
        let attrs = match Attributes::read(start) {
            Ok(attrs) => attrs,
            Err(err) => {
                self.skip(format_args!("{err}"));
                return;
            }
        };
        match name.as_ref() {
            b"edge" => self.edge(&attrs, has_children),
            b"lane" => self.lane(&attrs),
            b"junction" => self.junction(&attrs),
            _ => self.connection(&attrs),
        }
    }

    fn skip(&mut self, reason: std::fmt::Arguments) {
        self.skipped += 1;
        warn!("skipping element: {reason}");
    }

    fn edge(&mut self, attrs: &Attributes, has_children: bool) {
        let Some(id) = attrs.get("id") else {
            self.skip(format_args!("<{}> has no id", attrs.element));
            return;
        };
        let function = if attrs.get("function") == Some("internal") || id.starts_with(':') {
            EdgeFunction::Internal
        } else {
            EdgeFunction::Normal
        };
        self.network.insert_edge(Edge {
            id: id.to_owned(),
            from: attrs.get_or_empty("from"),
            to: attrs.get_or_empty("to"),
            name: attrs.get_or_empty("name"),
            function,
            lanes: SmallVec::new(),
        });
        if has_children {
            self.current_edge = Some(id.to_owned());
        }
    }

    fn lane(&mut self, attrs: &Attributes) {
        let Some(id) = attrs.get("id") else {
            self.skip(format_args!("<lane> has no id"));
            return;
        };
        let Some(shape) = attrs.get("shape") else {
            self.skip(format_args!("lane {id} has no shape"));
            return;
        };
        let points = parse_shape(shape);
        self.extend_bounds(&points);
        let Some(shape) = Polyline::new(points) else {
            self.skip(format_args!("lane {id} has fewer than two valid points"));
            return;
        };
        let (id_prefix, index) = split_lane_id(id);
        let edge_id = self
            .current_edge
            .clone()
            .unwrap_or_else(|| id_prefix.to_owned());
        let width = attrs
            .parse::<f64>("width")
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(DEFAULT_LANE_WIDTH);
        self.network.insert_lane(Lane {
            id: id.to_owned(),
            edge_id,
            index,
            shape,
            width,
            allow: attrs.classes("allow"),
            disallow: attrs.classes("disallow").unwrap_or_default(),
            class: LaneClass::Motor,
        });
    }

    fn junction(&mut self, attrs: &Attributes) {
        let Some(id) = attrs.get("id") else {
            self.skip(format_args!("<junction> has no id"));
            return;
        };
        let kind = attrs.get("type").unwrap_or_default();
        if kind == INTERNAL_JUNCTION_TYPE {
            return;
        }
        let Some(shape) = attrs.get("shape") else {
            self.skip(format_args!("junction {id} has no shape"));
            return;
        };
        let points = parse_shape(shape);
        self.extend_bounds(&points);
        if points.len() < 3 {
            self.skip(format_args!("junction {id} has fewer than three valid points"));
            return;
        }
        self.network.insert_junction(Junction {
            id: id.to_owned(),
            has_signal: kind.contains(SIGNAL_JUNCTION_TYPE),
            shape: points,
        });
    }

    fn connection(&mut self, attrs: &Attributes) {
        let (Some(from), Some(to)) = (attrs.get("from"), attrs.get("to")) else {
            self.skip(format_args!("<connection> is missing from/to"));
            return;
        };
        self.network.connections.push(Connection {
            from_edge: from.to_owned(),
            to_edge: to.to_owned(),
            from_lane: attrs.parse("fromLane"),
            to_lane: attrs.parse("toLane"),
            via: attrs.get("via").map(str::to_owned),
        });
    }

    fn extend_bounds(&mut self, points: &[Point2d]) {
        if let Some(points) = BoundingBox::from_points(points) {
            self.bounds = Some(match self.bounds {
                Some(bounds) => bounds.union(&points),
                None => points,
            });
        }
    }

    fn finish(mut self) -> NetworkGeometry {
        self.network.bounds = self.bounds.unwrap_or_else(BoundingBox::unit);
        info!(
            "parsed network: {} lanes, {} edges, {} junctions, {} connections ({} elements skipped)",
            self.network.lanes.len(),
            self.network.edges.len(),
            self.network.junctions.len(),
            self.network.connections.len(),
            self.skipped,
        );
        self.network
    }
}
