//! Timing harness: one second of simulated time at several grid sizes.
//!
//! Run with: cargo run --release --example bench

use std::time::Instant;

use glam::Vec2;
use sim2d::FluidSim;

fn main() {
    for &n in &[32usize, 64, 96] {
        let mut sim = FluidSim::new(Vec2::new(0.0, 9.8), n, n, 1.0);
        sim.spawn_block(Vec2::new(0.1, 0.5), Vec2::new(0.9, 0.9), 3);
        let particles = sim.particles.len();

        let start = Instant::now();
        let mut substeps = 0;
        for _ in 0..60 {
            substeps += sim.advance_one_frame(1.0 / 60.0);
        }
        let elapsed = start.elapsed();

        println!(
            "{:>3}x{:<3} {:>7} particles  {:>4} substeps  {:>8.1} ms  ({:.2} ms/substep)",
            n,
            n,
            particles,
            substeps,
            elapsed.as_secs_f64() * 1000.0,
            elapsed.as_secs_f64() * 1000.0 / substeps as f64,
        );
    }
}
