//! Tunable constants for the view, loadable from JSON.
//!
//! Every field has a default, so a config file only needs to list the
//! values it changes.

use crate::error::ConfigError;
use crate::render::Color;
use crate::util::Interval;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All tunables of a [NetworkView](crate::NetworkView).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub viewport: ViewportConfig,
    pub heading: HeadingConfig,
    pub style: StyleConfig,
    pub palette: Palette,
}

impl ViewConfig {
    /// Parses a config from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a config from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Zoom and pan limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Space kept around the network when fitting it to the screen, in px.
    pub padding: f64,
    /// The allowed user zoom factors.
    pub zoom_range: Interval<f64>,
    /// The zoom factor applied per scroll wheel notch.
    pub wheel_step: f64,
    /// The sandbox margin when zoomed out, as a fraction of the shorter screen side.
    pub margin_fraction: f64,
    /// The sandbox margin when zoomed in, in px.
    pub min_margin: f64,
    /// The user zoom range over which the margin shrinks.
    pub margin_ramp: Interval<f64>,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            padding: 24.0,
            zoom_range: Interval::new(1.0, 25.0),
            wheel_step: 1.15,
            margin_fraction: 0.35,
            min_margin: 80.0,
            margin_ramp: Interval::new(1.0, 3.0),
        }
    }
}

/// Vehicle heading resolution and smoothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// The smoothing time constant, in s.
    pub tau: f64,
    /// The smoothing time constant for buses, in s.
    pub bus_tau: f64,
    /// The limits on the per-frame blend factor.
    pub alpha_range: Interval<f64>,
    /// Movements shorter than this do not define a heading, in m.
    pub motion_epsilon: f64,
    /// New headings whose dot product with the previous one is below this are snapped to.
    pub snap_dot: f64,
    /// Per-vehicle state is pruned once it exceeds
    /// `prune_factor * active vehicles + prune_slack` entries.
    pub prune_factor: usize,
    pub prune_slack: usize,
    /// Frame intervals are capped at this, in s.
    pub max_dt: f64,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            tau: 0.14,
            bus_tau: 0.24,
            alpha_range: Interval::new(0.18, 0.95),
            motion_epsilon: 0.05,
            snap_dot: -0.55,
            prune_factor: 2,
            prune_slack: 64,
            max_dt: 1.0,
        }
    }
}

/// The dimensions of a vehicle body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleShape {
    /// Length in m.
    pub length: f64,
    /// Width in m.
    pub width: f64,
    /// Number of side window segments.
    pub windows: usize,
}

/// Sizes, spacings and zoom gates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Labels are hidden below this user zoom.
    pub label_min_zoom: f64,
    pub label_size_px: f64,
    /// Screen distance between direction arrows along a lane, in px.
    pub arrow_spacing_px: f64,
    pub arrow_size_px: f64,
    /// Dash and gap lengths of lane separators, in px.
    pub separator_dash: [f64; 2],
    /// Dash and gap lengths of bicycle guides through junctions, in px.
    pub guide_dash: [f64; 2],
    pub separator_width_px: f64,
    pub divider_width_px: f64,
    pub border_width_px: f64,
    /// Width of the roadside bus stop marker, in m.
    pub bus_stop_width: f64,
    /// Bus stop names are hidden below this user zoom.
    pub bus_stop_label_min_zoom: f64,
    pub car: VehicleShape,
    pub bus: VehicleShape,
    /// The shortest a vehicle is ever drawn, in px.
    pub vehicle_min_length_px: f64,
    /// The user zoom range over which vehicles grow from their minimum to true size.
    pub vehicle_zoom_ramp: Interval<f64>,
    /// How far before the end of a lane its stop line sits, in m.
    pub stop_line_margin: f64,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            label_min_zoom: 2.5,
            label_size_px: 12.0,
            arrow_spacing_px: 140.0,
            arrow_size_px: 6.0,
            separator_dash: [8.0, 8.0],
            guide_dash: [4.0, 4.0],
            separator_width_px: 1.2,
            divider_width_px: 2.0,
            border_width_px: 1.5,
            bus_stop_width: 2.2,
            bus_stop_label_min_zoom: 4.0,
            car: VehicleShape {
                length: 4.6,
                width: 1.9,
                windows: 1,
            },
            bus: VehicleShape {
                length: 12.0,
                width: 2.55,
                windows: 4,
            },
            vehicle_min_length_px: 7.0,
            vehicle_zoom_ramp: Interval::new(1.0, 6.0),
            stop_line_margin: 1.0,
        }
    }
}

/// Colours of everything drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub background: Color,
    pub placeholder: Color,
    pub junction: Color,
    pub road: Color,
    pub bicycle_lane: Color,
    pub pedestrian_lane: Color,
    pub border: Color,
    pub separator: Color,
    pub divider: Color,
    pub bicycle_guide: Color,
    pub label: Color,
    pub arrow: Color,
    pub bus_stop: Color,
    pub bus_stop_text: Color,
    pub window: Color,
    pub headlight: Color,
    pub taillight: Color,
    pub stop_line_outline: Color,
    pub signal_red: Color,
    pub signal_yellow: Color,
    pub signal_green: Color,
    pub signal_off: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::rgb(0x1e, 0x22, 0x27),
            placeholder: Color::rgb(0x9a, 0xa4, 0xae),
            junction: Color::rgb(0x4a, 0x4f, 0x55),
            road: Color::rgb(0x5a, 0x5f, 0x66),
            bicycle_lane: Color::rgb(0x7a, 0x4b, 0x4b),
            pedestrian_lane: Color::rgb(0x8c, 0x86, 0x7a),
            border: Color::rgb(0xe8, 0xe8, 0xe8),
            separator: Color::rgb(0xf0, 0xf0, 0xf0),
            divider: Color::rgb(0xf2, 0xc9, 0x4c),
            bicycle_guide: Color::rgb(0xd9, 0x8c, 0x8c),
            label: Color::rgb(0xff, 0xff, 0xff),
            arrow: Color::rgba(0xff, 0xff, 0xff, 0xb0),
            bus_stop: Color::rgb(0x2f, 0x80, 0xed),
            bus_stop_text: Color::rgb(0xff, 0xff, 0xff),
            window: Color::rgba(0x20, 0x30, 0x40, 0xd0),
            headlight: Color::rgb(0xff, 0xf4, 0xb0),
            taillight: Color::rgb(0xe0, 0x30, 0x30),
            stop_line_outline: Color::rgb(0xff, 0xff, 0xff),
            signal_red: Color::rgb(0xe5, 0x39, 0x35),
            signal_yellow: Color::rgb(0xfb, 0xc0, 0x2d),
            signal_green: Color::rgb(0x43, 0xa0, 0x47),
            signal_off: Color::rgb(0x75, 0x75, 0x75),
        }
    }
}
