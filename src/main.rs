use std::time::Instant;

use traffic_view::{BackgroundRenderer, NetworkSnapshot, ViewConfig, ViewportTransform};

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: traffic-view <network.xml> [config.json]");
        std::process::exit(2);
    };
    let config = match std::env::args().nth(2) {
        Some(config_path) => match ViewConfig::from_path(&config_path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        },
        None => ViewConfig::default(),
    };

    let start = Instant::now();
    let snapshot = NetworkSnapshot::load(&path);
    println!(
        "Loaded {} lanes, {} opposite edge pairs, {} bicycle connectors in {:?}",
        snapshot.lane_count(),
        snapshot.topology().pairs().len(),
        snapshot.topology().bicycle_connectors().len(),
        start.elapsed()
    );

    let viewport = ViewportTransform::new(
        config.viewport.clone(),
        snapshot.geometry().bounds(),
        1920.0,
        1080.0,
    );
    let mut background = BackgroundRenderer::new();

    println!("Drawing...");
    const NUM_FRAMES: u32 = 200;
    let start = Instant::now();
    for _ in 0..NUM_FRAMES {
        background.mark_dirty();
        background.redraw(&snapshot, &[], &viewport, &config);
    }
    let frame = start.elapsed() / NUM_FRAMES;
    println!(
        "Avg. background redraw: {:?} ({} draw calls)",
        frame,
        background.layer().len()
    );
}
