//! Backend independent drawing.
//!
//! Renderers draw onto a [Canvas] in screen space. A [DrawList] is a canvas
//! that records what was drawn so a layer can be cached and replayed onto
//! the real backend any number of times.

use crate::math::Point2d;
use serde::{Deserialize, Serialize};

/// An sRGB colour with alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

/// How a path is stroked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: Color,
    /// Line width in px.
    pub width: f64,
    /// Dash and gap lengths in px, or `None` for a solid line.
    pub dash: Option<[f64; 2]>,
}

impl Stroke {
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    pub fn dashed(color: Color, width: f64, dash: [f64; 2]) -> Self {
        Self {
            color,
            width,
            dash: Some(dash),
        }
    }
}

/// The stage of a layer that draw calls belong to, in drawing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pass {
    Background,
    Placeholder,
    Junctions,
    LaneFills,
    SpecialLaneFills,
    Borders,
    LaneSeparators,
    CentreDividers,
    BicycleGuides,
    Labels,
    Arrows,
    BusStops,
    StopLines,
    Vehicles,
}

/// A drawing surface in screen space (px, Y down).
pub trait Canvas {
    /// Marks the start of a new stage; draw calls that follow belong to it.
    fn begin_pass(&mut self, _pass: Pass) {}

    /// Fills the whole surface.
    fn clear(&mut self, color: Color);

    /// Fills a closed polygon.
    fn fill_polygon(&mut self, points: &[Point2d], color: Color);

    /// Strokes `points` as one continuous path, so dashes run on across vertices.
    fn stroke_path(&mut self, points: &[Point2d], stroke: &Stroke);

    fn fill_circle(&mut self, centre: Point2d, radius: f64, color: Color);

    /// Draws text centred on `anchor`.
    fn text(&mut self, anchor: Point2d, text: &str, size: f64, color: Color);
}

/// A recorded draw call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    FillPolygon {
        points: Vec<Point2d>,
        color: Color,
    },
    StrokePath {
        points: Vec<Point2d>,
        stroke: Stroke,
    },
    FillCircle {
        centre: Point2d,
        radius: f64,
        color: Color,
    },
    Text {
        anchor: Point2d,
        text: String,
        size: f64,
        color: Color,
    },
}

/// A canvas that records draw calls for later replay.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    pass: Option<Pass>,
    commands: Vec<(Pass, DrawCommand)>,
}

impl DrawList {
    pub fn new() -> Self {
        Default::default()
    }

    /// Forgets everything recorded.
    pub fn reset(&mut self) {
        self.pass = None;
        self.commands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// The recorded draw calls, each with the stage it was drawn in.
    pub fn commands(&self) -> &[(Pass, DrawCommand)] {
        &self.commands
    }

    /// The draw calls made during one stage.
    pub fn in_pass(&self, pass: Pass) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(move |(p, _)| *p == pass)
            .map(|(_, c)| c)
    }

    /// The number of draw calls made during one stage.
    pub fn count(&self, pass: Pass) -> usize {
        self.in_pass(pass).count()
    }

    /// Replays the recorded draw calls onto another canvas.
    pub fn replay<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        let mut current = None;
        for (pass, command) in &self.commands {
            if current != Some(*pass) {
                canvas.begin_pass(*pass);
                current = Some(*pass);
            }
            match command {
                DrawCommand::Clear(color) => canvas.clear(*color),
                DrawCommand::FillPolygon { points, color } => canvas.fill_polygon(points, *color),
                DrawCommand::StrokePath { points, stroke } => canvas.stroke_path(points, stroke),
                DrawCommand::FillCircle {
                    centre,
                    radius,
                    color,
                } => canvas.fill_circle(*centre, *radius, *color),
                DrawCommand::Text {
                    anchor,
                    text,
                    size,
                    color,
                } => canvas.text(*anchor, text, *size, *color),
            }
        }
    }

    fn push(&mut self, command: DrawCommand) {
        self.commands
            .push((self.pass.unwrap_or(Pass::Background), command));
    }
}

impl Canvas for DrawList {
    fn begin_pass(&mut self, pass: Pass) {
        self.pass = Some(pass);
    }

    fn clear(&mut self, color: Color) {
        self.push(DrawCommand::Clear(color));
    }

    fn fill_polygon(&mut self, points: &[Point2d], color: Color) {
        self.push(DrawCommand::FillPolygon {
            points: points.to_vec(),
            color,
        });
    }

    fn stroke_path(&mut self, points: &[Point2d], stroke: &Stroke) {
        self.push(DrawCommand::StrokePath {
            points: points.to_vec(),
            stroke: *stroke,
        });
    }

    fn fill_circle(&mut self, centre: Point2d, radius: f64, color: Color) {
        self.push(DrawCommand::FillCircle {
            centre,
            radius,
            color,
        });
    }

    fn text(&mut self, anchor: Point2d, text: &str, size: f64, color: Color) {
        self.push(DrawCommand::Text {
            anchor,
            text: text.to_owned(),
            size,
            color,
        });
    }
}
