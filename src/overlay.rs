//! The per-frame layer: vehicles and signal stop lines.

pub use heading::{angle_to_heading, HeadingSample, HeadingSmoother, VehicleSmoothState};

use crate::config::{Palette, StyleConfig, VehicleShape, ViewConfig};
use crate::math::{flip_y, lerp, rot90, smoothstep, Point2d, Vector2d};
use crate::network::NetworkGeometry;
use crate::render::{Canvas, Color, DrawList, Pass, Stroke};
use crate::viewport::ViewportTransform;
use itertools::Itertools;
use log::debug;
use std::collections::HashMap;

mod heading;

/// How much larger than life vehicles are drawn when zoomed out.
const ZOOMED_OUT_EXAGGERATION: f64 = 1.6;

/// The window band runs over this fraction of the body, measured from the front.
const WINDOW_SPAN: [f64; 2] = [0.15, 0.85];

/// Stop line thickness in px at the start, middle and end of the zoom ramp.
const STOP_LINE_THICKNESS: [f64; 3] = [1.5, 3.0, 5.0];

/// Stop line length as a fraction of lane width at the start, middle and end of the zoom ramp.
const STOP_LINE_LENGTH: [f64; 3] = [0.5, 0.8, 0.95];

/// The user zoom levels bounding the two stages of the stop line ramp.
const STOP_LINE_RAMP: [f64; 3] = [1.0, 3.0, 10.0];

/// One vehicle as reported by the simulator in a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleFrameInput {
    pub id: String,
    /// The position of the front of the vehicle, in world space.
    pub position: Point2d,
    /// The reported heading in degrees, in an unknown convention.
    pub angle: Option<f64>,
    pub color: Color,
    /// The lane the vehicle is on.
    pub lane_id: Option<String>,
    /// The vehicle type; anything containing "bus" is drawn as a bus.
    pub type_tag: Option<String>,
}

impl VehicleFrameInput {
    pub fn is_bus(&self) -> bool {
        self.type_tag
            .as_deref()
            .map_or(false, |tag| tag.to_ascii_lowercase().contains("bus"))
    }
}

/// The state of the signal controlling a lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalState {
    Red,
    Yellow,
    Green,
    Off,
}

impl SignalState {
    /// Decodes a signal state character as used in traffic light state strings.
    pub fn from_char(state: char) -> Self {
        match state {
            'r' | 'R' => Self::Red,
            'y' | 'Y' | 'u' | 'U' => Self::Yellow,
            'g' | 'G' | 's' | 'S' => Self::Green,
            _ => Self::Off,
        }
    }

    fn color(self, palette: &Palette) -> Color {
        match self {
            Self::Red => palette.signal_red,
            Self::Yellow => palette.signal_yellow,
            Self::Green => palette.signal_green,
            Self::Off => palette.signal_off,
        }
    }
}

/// A vehicle with its resolved heading, kept until the next frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedVehicle {
    pub id: String,
    /// The front of the vehicle, in world space.
    pub position: Point2d,
    /// The smoothed heading, in world space.
    pub heading: Vector2d,
    pub color: Color,
    pub is_bus: bool,
}

/// Draws vehicles and stop lines over the cached background.
///
/// The layer is rebuilt from the stored frame on every redraw, so pan and
/// zoom move vehicles without new data from the simulator.
#[derive(Debug)]
pub struct OverlayRenderer {
    smoother: HeadingSmoother,
    vehicles: Vec<PlacedVehicle>,
    signals: HashMap<String, SignalState>,
    layer: DrawList,
    redraws: usize,
}

impl OverlayRenderer {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            smoother: HeadingSmoother::new(config.heading.clone()),
            vehicles: vec![],
            signals: HashMap::new(),
            layer: DrawList::new(),
            redraws: 0,
        }
    }

    /// Forgets all vehicles and signals, as when a new network is shown.
    pub fn clear(&mut self) {
        self.smoother.clear();
        self.vehicles.clear();
        self.signals.clear();
    }

    pub fn vehicles(&self) -> &[PlacedVehicle] {
        &self.vehicles
    }

    pub fn smoother(&self) -> &HeadingSmoother {
        &self.smoother
    }

    pub fn layer(&self) -> &DrawList {
        &self.layer
    }

    /// The number of times the layer has been rebuilt.
    pub fn redraw_count(&self) -> usize {
        self.redraws
    }

    /// Replaces the vehicles with a new frame, `dt` seconds after the last one.
    pub fn update_vehicles(&mut self, network: &NetworkGeometry, frames: &[VehicleFrameInput], dt: f64) {
        self.smoother.begin_frame();
        self.vehicles.clear();
        for frame in frames {
            if !(frame.position.x.is_finite() && frame.position.y.is_finite()) {
                debug!("vehicle {} has no valid position", frame.id);
                continue;
            }
            let lane_tangent = frame
                .lane_id
                .as_deref()
                .and_then(|id| network.lane_by_name(id))
                .map(|lane| lane.shape().tangent_near(frame.position));
            let sample = HeadingSample {
                position: frame.position,
                lane_tangent,
                angle: frame.angle,
                is_bus: frame.is_bus(),
            };
            let heading = self.smoother.update(&frame.id, sample, dt);
            self.vehicles.push(PlacedVehicle {
                id: frame.id.clone(),
                position: frame.position,
                heading,
                color: frame.color,
                is_bus: sample.is_bus,
            });
        }
        self.smoother.prune(self.vehicles.len());
    }

    /// Replaces the signal states, keyed by lane id.
    pub fn update_signals(&mut self, signals: HashMap<String, SignalState>) {
        self.signals = signals;
    }

    /// Rebuilds the layer from the stored frame.
    pub fn redraw(&mut self, network: &NetworkGeometry, viewport: &ViewportTransform, config: &ViewConfig) {
        self.layer.reset();
        self.redraws += 1;
        if network.is_empty() {
            return;
        }
        self.layer.begin_pass(Pass::StopLines);
        draw_stop_lines(&mut self.layer, network, &self.signals, viewport, config);
        self.layer.begin_pass(Pass::Vehicles);
        for vehicle in &self.vehicles {
            draw_vehicle(&mut self.layer, vehicle, viewport, config);
        }
    }
}

/// The drawn length of a vehicle body, in px.
///
/// Vehicles are exaggerated when zoomed out and approach true size as the
/// user zooms in, but are never shorter than the configured minimum.
pub fn vehicle_length_px(shape: &VehicleShape, style: &StyleConfig, viewport: &ViewportTransform) -> f64 {
    let ramp = style.vehicle_zoom_ramp;
    let t = smoothstep(ramp.min, ramp.max, viewport.user_scale());
    let exaggeration = lerp(ZOOMED_OUT_EXAGGERATION, 1.0, t);
    f64::max(shape.length * viewport.scale() * exaggeration, style.vehicle_min_length_px)
}

fn draw_vehicle<C: Canvas + ?Sized>(
    canvas: &mut C,
    vehicle: &PlacedVehicle,
    viewport: &ViewportTransform,
    config: &ViewConfig,
) {
    let style = &config.style;
    let palette = &config.palette;
    let shape = if vehicle.is_bus { &style.bus } else { &style.car };
    let length = vehicle_length_px(shape, style, viewport);
    let width = length * shape.width / shape.length.max(f64::EPSILON);

    let forward = flip_y(vehicle.heading);
    let side = rot90(forward);
    // Reported positions are the front bumper, so the body extends backwards
    let front = viewport.to_screen(vehicle.position);

    // Corners of a box spanning `[f0, f1]` of the length from the front and
    // `w` of the width
    let quad = |f0: f64, f1: f64, w: f64| {
        let a = front - forward * (f0 * length);
        let b = front - forward * (f1 * length);
        let s = side * (w * width / 2.0);
        [a + s, b + s, b - s, a - s]
    };

    canvas.fill_polygon(&quad(0.0, 1.0, 1.0), vehicle.color);

    let windows = shape.windows.max(1);
    let span = (WINDOW_SPAN[1] - WINDOW_SPAN[0]) / windows as f64;
    for i in 0..windows {
        let f0 = WINDOW_SPAN[0] + span * i as f64;
        canvas.fill_polygon(&quad(f0, f0 + span * 0.75, 0.75), palette.window);
    }

    let light = width * 0.12;
    for s in [-1.0, 1.0] {
        let lateral = side * (s * width * 0.32);
        canvas.fill_circle(front - forward * light + lateral, light, palette.headlight);
        canvas.fill_circle(front - forward * (length - light) + lateral, light, palette.taillight);
    }
}

/// A two stage ramp through `values` as the zoom crosses [STOP_LINE_RAMP].
fn stop_line_ramp(values: [f64; 3], zoom: f64) -> f64 {
    let first = smoothstep(STOP_LINE_RAMP[0], STOP_LINE_RAMP[1], zoom);
    let second = smoothstep(STOP_LINE_RAMP[1], STOP_LINE_RAMP[2], zoom);
    lerp(lerp(values[0], values[1], first), values[2], second)
}

fn draw_stop_lines<C: Canvas + ?Sized>(
    canvas: &mut C,
    network: &NetworkGeometry,
    signals: &HashMap<String, SignalState>,
    viewport: &ViewportTransform,
    config: &ViewConfig,
) {
    let zoom = viewport.user_scale();
    let thickness = stop_line_ramp(STOP_LINE_THICKNESS, zoom);
    let fraction = stop_line_ramp(STOP_LINE_LENGTH, zoom);
    for (lane_id, state) in signals.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        let Some(lane) = network.lane_by_name(lane_id) else {
            continue;
        };
        let shape = lane.shape();
        let dist = f64::max(shape.length() - config.style.stop_line_margin, 0.0);
        let centre = shape.point_at(dist);
        let across = rot90(shape.tangent_at(dist)) * (lane.width() * fraction / 2.0);
        let path = [viewport.to_screen(centre - across), viewport.to_screen(centre + across)];
        canvas.stroke_path(
            &path,
            &Stroke::solid(config.palette.stop_line_outline, thickness + 2.0),
        );
        canvas.stroke_path(&path, &Stroke::solid(state.color(&config.palette), thickness));
    }
}
