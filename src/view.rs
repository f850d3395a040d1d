//! The [NetworkView] facade tying parsing, layers and input together.

use crate::background::BackgroundRenderer;
use crate::config::ViewConfig;
use crate::error::ParseError;
use crate::network::NetworkGeometry;
use crate::overlay::{OverlayRenderer, SignalState, VehicleFrameInput};
use crate::parser::parse_file;
use crate::render::{Canvas, DrawList};
use crate::scheduler::RedrawScheduler;
use crate::topology::{resolve_bus_stops, BusStop, BusStopMarker, Topology};
use crate::viewport::ViewportTransform;
use log::{info, warn};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// A parsed network and everything derived from it.
///
/// Built once per load and never modified, so it can be handed between threads.
#[derive(Clone, Debug)]
pub struct NetworkSnapshot {
    geometry: NetworkGeometry,
    topology: Topology,
}

impl NetworkSnapshot {
    /// Derives the topology of a parsed network.
    pub fn build(mut geometry: NetworkGeometry) -> Self {
        let topology = Topology::build(&mut geometry);
        Self { geometry, topology }
    }

    pub fn empty() -> Self {
        Self::build(NetworkGeometry::empty())
    }

    /// Parses and indexes a network file.
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::build(parse_file(path))
    }

    pub fn geometry(&self) -> &NetworkGeometry {
        &self.geometry
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn lane_count(&self) -> usize {
        self.geometry.lane_count()
    }
}

/// Called on the render thread with the lane count once an asynchronous load is shown.
pub type LoadCallback = Box<dyn FnOnce(usize) + Send>;

/// An asynchronous load whose result has not been applied yet.
struct PendingLoad {
    path: PathBuf,
    result: Receiver<Arc<NetworkSnapshot>>,
    callback: Option<LoadCallback>,
}

/// Which layers a [tick](NetworkView::tick) redrew.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    pub background_redrawn: bool,
    pub overlay_redrawn: bool,
}

/// An interactive view of a road network with live vehicles.
///
/// All methods are meant to be called from a single render thread. Only
/// network parsing may run elsewhere, see [load_network_async](Self::load_network_async).
pub struct NetworkView {
    config: ViewConfig,
    snapshot: Arc<NetworkSnapshot>,
    viewport: ViewportTransform,
    background: BackgroundRenderer,
    overlay: OverlayRenderer,
    scheduler: RedrawScheduler,
    bus_stops: Vec<BusStop>,
    bus_stop_markers: Vec<BusStopMarker>,
    pending: Vec<PendingLoad>,
    last_vehicle_update: Option<Instant>,
}

impl NetworkView {
    /// Creates a view of an empty network in a `width` by `height` px viewport.
    pub fn new(config: ViewConfig, width: f64, height: f64) -> Self {
        let snapshot = Arc::new(NetworkSnapshot::empty());
        let viewport = ViewportTransform::new(
            config.viewport.clone(),
            snapshot.geometry().bounds(),
            width,
            height,
        );
        Self {
            overlay: OverlayRenderer::new(&config),
            config,
            snapshot,
            viewport,
            background: BackgroundRenderer::new(),
            scheduler: RedrawScheduler::new(),
            bus_stops: vec![],
            bus_stop_markers: vec![],
            pending: vec![],
            last_vehicle_update: None,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &Arc<NetworkSnapshot> {
        &self.snapshot
    }

    pub fn viewport(&self) -> &ViewportTransform {
        &self.viewport
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.geometry().is_empty()
    }

    /// The number of lanes in the network shown.
    pub fn lane_count(&self) -> usize {
        self.snapshot.lane_count()
    }

    /// The resolved bus stops currently drawn.
    pub fn bus_stop_markers(&self) -> &[BusStopMarker] {
        &self.bus_stop_markers
    }

    /// The number of asynchronous loads still in flight.
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Parses a network file on the calling thread and shows it.
    ///
    /// Returns the number of lanes loaded; a missing or broken file shows an
    /// empty or partial network rather than failing.
    pub fn load_network(&mut self, path: impl AsRef<Path>) -> usize {
        let snapshot = Arc::new(NetworkSnapshot::load(path));
        self.apply(snapshot)
    }

    /// Parses a network file on a worker thread.
    ///
    /// The result is shown by a later [tick](Self::tick), which then calls
    /// `callback` with the lane count. When several loads are in flight, the
    /// one applied last stays on screen.
    pub fn load_network_async(
        &mut self,
        path: impl AsRef<Path>,
        callback: impl FnOnce(usize) + Send + 'static,
    ) {
        let path = path.as_ref().to_owned();
        let (sender, receiver) = mpsc::channel();
        let fallback = sender.clone();
        let worker_path = path.clone();
        let spawned = thread::Builder::new()
            .name("network-parser".into())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| NetworkSnapshot::load(&worker_path)));
                let snapshot = result.unwrap_or_else(|payload| {
                    let err = ParseError::Worker(panic_message(payload.as_ref()));
                    warn!("{err} while loading {}; showing an empty network", worker_path.display());
                    NetworkSnapshot::empty()
                });
                // The view may have been dropped in the meantime
                let _ = sender.send(Arc::new(snapshot));
            });
        if let Err(err) = spawned {
            let err = ParseError::Worker(err.to_string());
            warn!("{err} while loading {}; showing an empty network", path.display());
            let _ = fallback.send(Arc::new(NetworkSnapshot::empty()));
        }
        self.pending.push(PendingLoad {
            path,
            result: receiver,
            callback: Some(Box::new(callback)),
        });
    }

    /// Replaces the vehicles, timing the frame against the previous update.
    pub fn update_vehicles(&mut self, frames: &[VehicleFrameInput]) {
        let now = Instant::now();
        let dt = self
            .last_vehicle_update
            .map_or(0.0, |last| now.duration_since(last).as_secs_f64());
        self.last_vehicle_update = Some(now);
        self.update_vehicles_with_dt(frames, dt);
    }

    /// Replaces the vehicles with a frame taken `dt` seconds after the previous one.
    pub fn update_vehicles_with_dt(&mut self, frames: &[VehicleFrameInput], dt: f64) {
        self.overlay
            .update_vehicles(self.snapshot.geometry(), frames, dt);
        self.scheduler.request();
    }

    /// Replaces the signal states, keyed by lane id.
    pub fn update_signals(&mut self, signals: HashMap<String, SignalState>) {
        self.overlay.update_signals(signals);
        self.scheduler.request();
    }

    /// Replaces the bus stops drawn beside their lanes.
    pub fn update_bus_stops(&mut self, stops: Vec<BusStop>) {
        self.bus_stop_markers = resolve_bus_stops(self.snapshot.geometry(), &stops);
        self.bus_stops = stops;
        self.background.mark_dirty();
    }

    /// Zooms by `notches` scroll wheel steps around the cursor; positive zooms in.
    pub fn scroll_zoom(&mut self, notches: f64, x: f64, y: f64) {
        let factor = self.config.viewport.wheel_step.powf(notches);
        self.viewport.zoom(factor, x, y);
        self.view_changed();
    }

    /// Pans by a drag of `dx`, `dy` px.
    pub fn drag_pan(&mut self, dx: f64, dy: f64) {
        self.viewport.pan(dx, dy);
        self.view_changed();
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
        self.view_changed();
    }

    /// Runs once per rendering tick: applies finished loads and redraws the
    /// layers that need it.
    pub fn tick(&mut self) -> RenderOutcome {
        self.apply_finished_loads();
        let background_redrawn = self.background.redraw(
            &self.snapshot,
            &self.bus_stop_markers,
            &self.viewport,
            &self.config,
        );
        let overlay_redrawn = self.scheduler.tick();
        if overlay_redrawn {
            self.overlay
                .redraw(self.snapshot.geometry(), &self.viewport, &self.config);
        }
        RenderOutcome {
            background_redrawn,
            overlay_redrawn,
        }
    }

    /// The cached static layer.
    pub fn background_layer(&self) -> &DrawList {
        self.background.layer()
    }

    /// The vehicle and signal layer.
    pub fn overlay_layer(&self) -> &DrawList {
        self.overlay.layer()
    }

    pub fn background(&self) -> &BackgroundRenderer {
        &self.background
    }

    pub fn overlay(&self) -> &OverlayRenderer {
        &self.overlay
    }

    pub fn scheduler(&self) -> &RedrawScheduler {
        &self.scheduler
    }

    /// Draws both layers onto a canvas.
    pub fn paint<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        self.background.layer().replay(canvas);
        self.overlay.layer().replay(canvas);
    }

    fn view_changed(&mut self) {
        self.background.mark_dirty();
        self.scheduler.request();
    }

    fn apply_finished_loads(&mut self) {
        let mut finished = vec![];
        self.pending.retain_mut(|load| match load.result.try_recv() {
            Ok(snapshot) => {
                finished.push((snapshot, load.callback.take()));
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                warn!("network load of {} was lost", load.path.display());
                false
            }
        });
        for (snapshot, callback) in finished {
            let lanes = self.apply(snapshot);
            if let Some(callback) = callback {
                callback(lanes);
            }
        }
    }

    /// Shows a new network. Returns its lane count.
    fn apply(&mut self, snapshot: Arc<NetworkSnapshot>) -> usize {
        self.snapshot = snapshot;
        self.viewport.set_bounds(self.snapshot.geometry().bounds());
        self.overlay.clear();
        self.last_vehicle_update = None;
        self.bus_stop_markers = resolve_bus_stops(self.snapshot.geometry(), &self.bus_stops);
        self.view_changed();
        info!(
            "showing network with {} lanes and {} opposite edge pairs",
            self.lane_count(),
            self.snapshot.topology().pairs().len()
        );
        self.lane_count()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point2d;
    use crate::render::{Color, Pass};

    fn view() -> NetworkView {
        NetworkView::new(ViewConfig::default(), 800.0, 600.0)
    }

    #[test]
    fn starts_empty_with_placeholder() {
        let mut view = view();
        assert!(view.is_empty());
        let outcome = view.tick();
        assert!(outcome.background_redrawn);
        assert_eq!(view.background_layer().count(Pass::Placeholder), 1);
        // Nothing changed, nothing redrawn
        assert_eq!(view.tick(), RenderOutcome::default());
    }

    #[test]
    fn vehicle_updates_do_not_touch_background() {
        let mut view = view();
        view.tick();
        let frame = VehicleFrameInput {
            id: "v".into(),
            position: Point2d::new(0.5, 0.5),
            angle: None,
            color: Color::rgb(0, 0, 255),
            lane_id: None,
            type_tag: None,
        };
        for _ in 0..3 {
            view.update_vehicles_with_dt(std::slice::from_ref(&frame), 0.02);
        }
        let outcome = view.tick();
        assert!(!outcome.background_redrawn);
        assert!(outcome.overlay_redrawn);
        assert_eq!(view.scheduler().fired(), 1);
        assert_eq!(view.background().redraw_count(), 1);
    }

    #[test]
    fn pan_and_zoom_redraw_both_layers() {
        let mut view = view();
        view.tick();
        view.scroll_zoom(2.0, 400.0, 300.0);
        assert!((view.viewport().user_scale() - 1.15f64.powi(2)).abs() < 1e-9);
        let outcome = view.tick();
        assert!(outcome.background_redrawn && outcome.overlay_redrawn);
        view.drag_pan(10.0, 0.0);
        assert!(view.tick().background_redrawn);
    }

    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&3_u8), "unknown panic");
    }
}
