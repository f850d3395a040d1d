//! Mapping between world coordinates (m, Y up) and screen coordinates (px, Y down).

use crate::config::ViewportConfig;
use crate::math::{lerp, BoundingBox, Point2d, Vector2d};
use cgmath::Zero;

/// The smallest base scale a viewport is ever fitted to, in px/m.
const MIN_BASE_SCALE: f64 = 1e-6;

/// Fits the network into a viewport and tracks the user's zoom and pan.
#[derive(Clone, Debug)]
pub struct ViewportTransform {
    config: ViewportConfig,
    /// The world space extent of the network.
    bounds: BoundingBox,
    /// The viewport width in px.
    width: f64,
    /// The viewport height in px.
    height: f64,
    /// The scale that fits the whole network in the viewport.
    base_scale: f64,
    /// The user's zoom on top of `base_scale`.
    user_scale: f64,
    /// The user's pan, in px.
    offset: Vector2d,
}

impl ViewportTransform {
    /// Creates a transform showing all of `bounds` in a `width` by `height` viewport.
    pub fn new(config: ViewportConfig, bounds: BoundingBox, width: f64, height: f64) -> Self {
        let mut viewport = Self {
            config,
            bounds,
            width: width.max(0.0),
            height: height.max(0.0),
            base_scale: MIN_BASE_SCALE,
            user_scale: 1.0,
            offset: Vector2d::zero(),
        };
        viewport.fit();
        viewport.reset();
        viewport
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// The user's zoom factor, within the configured zoom range.
    pub fn user_scale(&self) -> f64 {
        self.user_scale
    }

    /// Pixels per metre.
    pub fn scale(&self) -> f64 {
        self.base_scale * self.user_scale
    }

    /// Shows a different network, resetting zoom and pan.
    pub fn set_bounds(&mut self, bounds: BoundingBox) {
        self.bounds = bounds;
        self.fit();
        self.reset();
    }

    /// Resizes the viewport, keeping the zoom and the world point at its centre.
    pub fn resize(&mut self, width: f64, height: f64) {
        let centre = self.to_world(Point2d::new(self.width / 2.0, self.height / 2.0));
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        self.fit();
        self.place(centre, Point2d::new(self.width / 2.0, self.height / 2.0));
        self.clamp_offset();
    }

    /// Restores the initial zoom and centres the network.
    pub fn reset(&mut self) {
        self.user_scale = self.config.zoom_range.clamp(1.0);
        self.offset = Vector2d::zero();
        self.clamp_offset();
    }

    pub fn to_screen(&self, world: Point2d) -> Point2d {
        let scale = self.scale();
        let padding = self.config.padding;
        Point2d::new(
            padding + (world.x - self.bounds.min.x) * scale + self.offset.x,
            padding + (self.bounds.max.y - world.y) * scale + self.offset.y,
        )
    }

    pub fn to_world(&self, screen: Point2d) -> Point2d {
        let scale = self.scale();
        let padding = self.config.padding;
        Point2d::new(
            self.bounds.min.x + (screen.x - padding - self.offset.x) / scale,
            self.bounds.max.y - (screen.y - padding - self.offset.y) / scale,
        )
    }

    /// Multiplies the zoom by `factor`, keeping the world point under the pivot in place.
    ///
    /// The resulting zoom is clamped to the configured range and the pan is
    /// then clamped to the sandbox margin.
    pub fn zoom(&mut self, factor: f64, pivot_x: f64, pivot_y: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let pivot = Point2d::new(pivot_x, pivot_y);
        let world = self.to_world(pivot);
        self.user_scale = self.config.zoom_range.clamp(self.user_scale * factor);
        self.place(world, pivot);
        self.clamp_offset();
    }

    /// Moves the view by a screen space delta, within the sandbox margin.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        self.offset += Vector2d::new(dx, dy);
        self.clamp_offset();
    }

    /// How far inside the viewport edges an oversized network must reach, in px.
    ///
    /// Shrinks from a fraction of the shorter viewport side when zoomed out
    /// to a fixed floor when zoomed in.
    pub fn margin(&self) -> f64 {
        let config = &self.config;
        let zoomed_out = f64::max(
            config.margin_fraction * f64::min(self.width, self.height),
            config.min_margin,
        );
        let t = config.margin_ramp.inv_lerp(self.user_scale);
        lerp(zoomed_out, config.min_margin, t)
    }

    /// The network's bounding box in screen space.
    pub fn screen_bounds(&self) -> BoundingBox {
        let a = self.to_screen(self.bounds.min);
        let b = self.to_screen(self.bounds.max);
        BoundingBox {
            min: Point2d::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point2d::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    fn fit(&mut self) {
        let padding = 2.0 * self.config.padding;
        let fit_x = (self.width - padding) / self.bounds.width().max(MIN_BASE_SCALE);
        let fit_y = (self.height - padding) / self.bounds.height().max(MIN_BASE_SCALE);
        let fit = f64::min(fit_x, fit_y);
        self.base_scale = if fit.is_finite() {
            fit.max(MIN_BASE_SCALE)
        } else {
            MIN_BASE_SCALE
        };
    }

    /// Sets the offset so that `world` is drawn at `screen`.
    fn place(&mut self, world: Point2d, screen: Point2d) {
        let scale = self.scale();
        let padding = self.config.padding;
        self.offset = Vector2d::new(
            screen.x - padding - (world.x - self.bounds.min.x) * scale,
            screen.y - padding - (self.bounds.max.y - world.y) * scale,
        );
    }

    fn clamp_offset(&mut self) {
        let scale = self.scale();
        let margin = self.margin();
        let padding = self.config.padding;
        self.offset.x = clamp_axis(
            self.offset.x,
            self.bounds.width() * scale,
            self.width,
            padding,
            margin,
        );
        self.offset.y = clamp_axis(
            self.offset.y,
            self.bounds.height() * scale,
            self.height,
            padding,
            margin,
        );
    }
}

/// Clamps the offset along one axis.
///
/// Content drawn from `padding + offset` to `padding + offset + extent` must
/// reach at least `margin` into a viewport of size `size`. Content no larger
/// than the viewport is centred instead.
fn clamp_axis(offset: f64, extent: f64, size: f64, padding: f64, margin: f64) -> f64 {
    let centred = (size - extent) / 2.0 - padding;
    if extent <= size {
        return centred;
    }
    let lo = margin - padding - extent;
    let hi = size - margin - padding;
    if lo > hi {
        centred
    } else {
        offset.clamp(lo, hi)
    }
}
