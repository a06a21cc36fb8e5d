//! Randomized invariant checks over the simulation pipeline.

use glam::Vec2;
use proptest::prelude::*;
use sim2d::{FluidSim, Grid, VelocityTransfer};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Whatever the scenario, particles never escape the domain, never go
    /// non-finite, and their count never changes.
    #[test]
    fn particles_stay_finite_and_contained(
        cx in 0.25f32..0.75,
        cy in 0.4f32..0.85,
        radius in 0.05f32..0.15,
        gx in -5.0f32..5.0,
        gy in 0.0f32..15.0,
    ) {
        let mut sim = FluidSim::new(Vec2::new(gx, gy), 24, 24, 1.0);
        sim.spawn_circle(Vec2::new(cx, cy), radius, 2);
        prop_assume!(!sim.particles.is_empty());
        let count = sim.particles.len();

        for _ in 0..5 {
            sim.advance_one_frame(1.0 / 60.0);
        }

        prop_assert_eq!(sim.particles.len(), count);
        for p in sim.particles.iter() {
            prop_assert!(p.position.is_finite());
            prop_assert!(p.velocity.is_finite());
            prop_assert!(p.position.x > 0.0 && p.position.x < sim.grid.lx);
            prop_assert!(p.position.y > 0.0 && p.position.y < sim.grid.ly);
        }
    }

    /// The CFL estimate is always finite and positive, and never grows when
    /// velocities do.
    #[test]
    fn cfl_is_finite_positive_and_monotone(
        speed in 0.0f32..100.0,
        gy in 0.0f32..20.0,
    ) {
        let mut grid = Grid::new(Vec2::new(0.0, gy), 16, 16, 1.0);
        let rest = grid.cfl();
        prop_assert!(rest.is_finite() && rest > 0.0);
        grid.u.fill(speed);
        let moving = grid.cfl();
        prop_assert!(moving.is_finite() && moving > 0.0);
        prop_assert!(moving <= rest);
    }

    /// Both transfer modes preserve the particle count and produce finite
    /// velocities from one step.
    #[test]
    fn transfer_modes_are_interchangeable(
        ratio in 0.0f32..1.0,
        dt in 0.001f32..0.02,
    ) {
        for mode in [VelocityTransfer::Pic, VelocityTransfer::FlipBlend { ratio }] {
            let mut sim = FluidSim::new(Vec2::new(0.0, 9.8), 20, 20, 1.0);
            sim.transfer_mode = mode;
            sim.spawn_block(Vec2::new(0.2, 0.2), Vec2::new(0.8, 0.5), 2);
            let count = sim.particles.len();
            sim.step(dt);
            prop_assert_eq!(sim.particles.len(), count);
            for p in sim.particles.iter() {
                prop_assert!(p.velocity.is_finite());
            }
        }
    }
}
