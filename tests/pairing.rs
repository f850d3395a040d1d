//! Randomised checks of opposite edge pairing.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fmt::Write;
use traffic_view::{parser::parse_str, NetworkSnapshot};

/// Half the distance between the two directions of a road, in m.
const HALF_GAP: f64 = 1.6;

/// Builds a network of straight two-way roads at random angles. Some roads
/// follow the `X` / `-X` naming convention, some have a second, more distant
/// reverse edge, and some are one-way.
fn random_network(seed: u8, roads: usize) -> (String, Vec<(String, String)>) {
    let mut rng = StdRng::from_seed([seed; 32]);
    let mut xml = String::from("<net>\n");
    let mut expected = vec![];

    for i in 0..roads {
        let origin = (500.0 * (i % 10) as f64, 500.0 * (i / 10) as f64);
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let length = rng.gen_range(20.0..200.0);
        let (dx, dy) = (angle.cos(), angle.sin());
        let (nx, ny) = (-dy, dx);
        let a = origin;
        let b = (origin.0 + dx * length, origin.1 + dy * length);
        let lane = |from: (f64, f64), to: (f64, f64), offset: f64| {
            format!(
                "{},{} {},{}",
                from.0 + nx * offset,
                from.1 + ny * offset,
                to.0 + nx * offset,
                to.1 + ny * offset
            )
        };

        let (forward, backward) = if rng.gen_bool(0.3) {
            (format!("W{i}"), format!("-W{i}"))
        } else {
            (format!("E{i}"), format!("R{i}"))
        };
        let (from, to) = (format!("A{i}"), format!("B{i}"));

        writeln!(
            xml,
            r#"<edge id="{forward}" from="{from}" to="{to}"><lane id="{forward}_0" shape="{}"/></edge>"#,
            lane(a, b, -HALF_GAP)
        )
        .unwrap();

        if rng.gen_bool(0.15) {
            // One-way road
            continue;
        }
        writeln!(
            xml,
            r#"<edge id="{backward}" from="{to}" to="{from}"><lane id="{backward}_0" shape="{}"/></edge>"#,
            lane(b, a, HALF_GAP)
        )
        .unwrap();
        if rng.gen_bool(0.25) {
            writeln!(
                xml,
                r#"<edge id="S{i}" from="{to}" to="{from}"><lane id="S{i}_0" shape="{}"/></edge>"#,
                lane(b, a, 3.0 * HALF_GAP)
            )
            .unwrap();
        }
        expected.push((forward, backward));
    }

    xml.push_str("</net>\n");
    (xml, expected)
}

#[test]
fn pairing_is_symmetric_and_one_to_one() {
    for seed in 0..8 {
        let (xml, expected) = random_network(seed, 60);
        let snapshot = NetworkSnapshot::build(parse_str(&xml));
        let network = snapshot.geometry();
        let topology = snapshot.topology();

        let mut seen = std::collections::HashSet::new();
        for pair in topology.pairs() {
            assert!(seen.insert(pair.a), "edge in two pairs");
            assert!(seen.insert(pair.b), "edge in two pairs");
            assert_eq!(topology.partner(pair.a), Some(pair.b));
            assert_eq!(topology.partner(pair.b), Some(pair.a));
        }

        for (edge_id, _) in network.iter_edges() {
            if let Some(partner) = topology.partner(edge_id) {
                assert_eq!(topology.partner(partner), Some(edge_id));
            }
        }

        assert_eq!(topology.pairs().len(), expected.len());
        for (forward, backward) in &expected {
            let forward = network.edge_id(forward).unwrap();
            let backward = network.edge_id(backward).unwrap();
            assert_eq!(topology.partner(forward), Some(backward));
        }
    }
}
