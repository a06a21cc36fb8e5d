//! Particle advection through the grid velocity field.

use glam::Vec2;
use rayon::prelude::*;

use crate::grid::Grid;
use crate::particle::Particles;

/// Two-stage (midpoint) Runge-Kutta advection.
///
/// Positions are clamped strictly inside the domain after each stage so the
/// bilinear lookups never touch a wall face; the 1.001 factor keeps particles
/// off the exact boundary of the valid sampling band.
pub fn advect_particles(grid: &Grid, particles: &mut Particles, dt: f32) {
    let lo = Vec2::splat(1.001 * grid.h);
    let hi = Vec2::new(grid.lx - 1.001 * grid.h, grid.ly - 1.001 * grid.h);
    particles.list.par_iter_mut().for_each(|p| {
        let vel = grid.bilerp_uv(p.position);
        let mid = (p.position + 0.5 * dt * vel).clamp(lo, hi);
        let mid_vel = grid.bilerp_uv(mid);
        p.position = (p.position + dt * mid_vel).clamp(lo, hi);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_field_translates_particles_exactly() {
        let mut grid = Grid::new(Vec2::ZERO, 16, 16, 1.0);
        grid.u.fill(1.0);
        let mut particles = Particles::new();
        particles.spawn_at(Vec2::new(0.4, 0.5));
        advect_particles(&grid, &mut particles, 0.1);
        let pos = particles.list[0].position;
        assert!((pos.x - 0.5).abs() < 1e-5);
        assert!((pos.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn particles_stay_inside_the_clamp_band() {
        let mut grid = Grid::new(Vec2::ZERO, 16, 16, 1.0);
        grid.u.fill(100.0);
        grid.v.fill(-100.0);
        let mut particles = Particles::new();
        particles.spawn_at(Vec2::new(0.5, 0.5));
        for _ in 0..10 {
            advect_particles(&grid, &mut particles, 0.1);
        }
        let pos = particles.list[0].position;
        assert!(pos.x <= grid.lx - 1.0 * grid.h);
        assert!(pos.y >= 1.0 * grid.h);
        assert!(pos.x > 0.0 && pos.y < grid.ly);
    }

    #[test]
    fn zero_dt_is_a_no_op() {
        let mut grid = Grid::new(Vec2::ZERO, 16, 16, 1.0);
        grid.u.fill(5.0);
        let mut particles = Particles::new();
        let start = Vec2::new(0.3, 0.7);
        particles.spawn_at(start);
        advect_particles(&grid, &mut particles, 0.0);
        assert_eq!(particles.list[0].position, start);
    }
}
