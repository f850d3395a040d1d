//! Tests that drive a whole [NetworkView] through its public operations.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use traffic_view::{
    math::Point2d, Color, DrawCommand, NetworkView, Pass, SignalState, VehicleFrameInput, ViewConfig,
    PLACEHOLDER_TEXT,
};

const TWO_WAY: &str = r#"<net>
    <edge id="E1" from="A" to="B"><lane id="E1_0" shape="0,-1.6 100,-1.6"/></edge>
    <edge id="E2" from="B" to="A"><lane id="E2_0" shape="100,1.6 0,1.6"/></edge>
</net>"#;

/// Writes `contents` to a fresh file in the system temp directory.
fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("traffic-view-{}-{name}.xml", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

fn view() -> NetworkView {
    NetworkView::new(ViewConfig::default(), 800.0, 600.0)
}

/// Ticks the view until `done` yields a value, or panics after a few seconds.
fn tick_until<T>(view: &mut NetworkView, done: &mpsc::Receiver<T>) -> T {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        view.tick();
        if let Ok(value) = done.try_recv() {
            return value;
        }
        assert!(Instant::now() < deadline, "load never finished");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A missing file shows an empty network with a placeholder, without panicking.
#[test]
fn missing_file_shows_placeholder() {
    let mut view = view();
    assert_eq!(view.load_network("/definitely/not/a/network.xml"), 0);
    assert!(view.is_empty());
    view.tick();
    let layer = view.background_layer();
    assert_eq!(layer.count(Pass::Placeholder), 1);
    assert_eq!(layer.count(Pass::LaneFills), 0);
    assert!(view.overlay_layer().is_empty());
    let placeholder = layer.in_pass(Pass::Placeholder).next();
    assert!(matches!(placeholder, Some(DrawCommand::Text { text, .. }) if text == PLACEHOLDER_TEXT));
}

/// Two mirrored edges share exactly one centre divider.
#[test]
fn mirrored_edges_share_one_divider() {
    let path = temp_file("mirrored", TWO_WAY);
    let mut view = view();
    assert_eq!(view.load_network(&path), 2);
    view.tick();
    assert_eq!(view.snapshot().topology().pairs().len(), 1);
    assert_eq!(view.background_layer().count(Pass::CentreDividers), 1);
    assert_eq!(view.background_layer().count(Pass::Placeholder), 0);
}

#[test]
fn async_load_reports_lane_count() {
    let path = temp_file("async", TWO_WAY);
    let mut view = view();
    let (sender, receiver) = mpsc::channel();
    view.load_network_async(&path, move |lanes| sender.send(lanes).unwrap());
    assert_eq!(tick_until(&mut view, &receiver), 2);
    assert_eq!(view.lane_count(), 2);
    assert_eq!(view.pending_loads(), 0);
    assert_eq!(view.background_layer().count(Pass::CentreDividers), 1);
}

#[test]
fn async_load_of_missing_file_is_empty() {
    let mut view = view();
    let (sender, receiver) = mpsc::channel();
    view.load_network_async("/definitely/not/a/network.xml", move |lanes| {
        sender.send(lanes).unwrap()
    });
    assert_eq!(tick_until(&mut view, &receiver), 0);
    assert!(view.is_empty());
    assert_eq!(view.background_layer().count(Pass::Placeholder), 1);
}

/// The load applied last stays on screen.
#[test]
fn last_applied_load_wins() {
    let two_way = temp_file("last-applied", TWO_WAY);
    let mut view = view();
    let (sender, receiver) = mpsc::channel();
    view.load_network_async(&two_way, move |lanes| sender.send(lanes).unwrap());
    assert_eq!(view.load_network("/definitely/not/a/network.xml"), 0);
    assert_eq!(tick_until(&mut view, &receiver), 2);
    assert_eq!(view.lane_count(), 2);
}

#[test]
fn vehicles_and_signals_are_drawn() {
    let path = temp_file("vehicles", TWO_WAY);
    let mut view = view();
    view.load_network(&path);
    view.tick();

    let vehicle = VehicleFrameInput {
        id: "bus_1".into(),
        position: Point2d::new(50.0, -1.6),
        angle: Some(90.0),
        color: Color::rgb(255, 200, 0),
        lane_id: Some("E1_0".into()),
        type_tag: Some("bus".into()),
    };
    view.update_vehicles_with_dt(&[vehicle], 0.05);
    view.update_signals([("E1_0".to_owned(), SignalState::Green)].into_iter().collect());
    let outcome = view.tick();
    assert!(outcome.overlay_redrawn);
    assert!(!outcome.background_redrawn);

    let overlay = view.overlay_layer();
    assert_eq!(overlay.count(Pass::StopLines), 2);
    assert!(overlay.count(Pass::Vehicles) > 0);
    let placed = &view.overlay().vehicles()[0];
    assert!(placed.is_bus);
    assert!((placed.heading.x - 1.0).abs() < 1e-9);

    // Reloading forgets the vehicles
    view.load_network(&path);
    view.tick();
    assert!(view.overlay().vehicles().is_empty());
}
