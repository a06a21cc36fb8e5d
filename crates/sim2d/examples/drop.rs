//! Drop a blob of water into an empty tank and print how it settles.
//!
//! Run with: cargo run --release --example drop

use glam::Vec2;
use sim2d::FluidSim;

fn main() {
    env_logger::init();

    let mut sim = FluidSim::new(Vec2::new(0.0, 9.8), 64, 64, 1.0);
    sim.spawn_circle(Vec2::new(0.5, 0.85), 0.1, 4);
    println!("{} particles", sim.particles.len());

    for frame in 0..240 {
        let substeps = sim.advance_one_frame(1.0 / 60.0);
        if frame % 20 == 0 {
            let centroid: Vec2 = sim.particles.iter().map(|p| p.position).sum::<Vec2>()
                / sim.particles.len() as f32;
            println!(
                "frame {:>3}  substeps {}  centroid ({:.3}, {:.3})  fluid cells {:>4}  KE {:.4}  pressure iters {:>3}{}",
                frame,
                substeps,
                centroid.x,
                centroid.y,
                sim.fluid_cell_count(),
                sim.kinetic_energy(),
                sim.last_pressure_solve.iterations,
                if sim.last_pressure_solve.converged { "" } else { " (truncated)" },
            );
        }
    }
}
