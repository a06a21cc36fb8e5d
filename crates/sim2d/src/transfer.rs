//! Particle/grid velocity transfers (P2G splat and G2P read-back).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::array2::Array2;
use crate::grid::{CellType, Grid};
use crate::particle::Particles;

/// How grid velocity reaches the particles on the G2P read-back.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VelocityTransfer {
    /// Overwrite the particle velocity with the grid sample.
    Pic,
    /// Add the per-step grid delta to the particle velocity (FLIP), blended
    /// with the PIC sample; `ratio` 1.0 is pure FLIP, 0.0 collapses to PIC.
    FlipBlend { ratio: f32 },
}

/// Pre-allocated accumulation weights for the P2G splat, sized like u and v.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferBuffers {
    weight_u: Array2<f32>,
    weight_v: Array2<f32>,
}

impl TransferBuffers {
    pub fn new(grid: &Grid) -> Self {
        Self {
            weight_u: Array2::new(grid.nx + 1, grid.ny),
            weight_v: Array2::new(grid.nx, grid.ny + 1),
        }
    }
}

/// Splat particle velocities onto the staggered grid.
///
/// Order matters: zero u, v and the weights, accumulate the weighted bilinear
/// splat, then divide only where weight landed. Faces no particle touched
/// keep the zero from the first stage. Finally rebuild the marker field from
/// particle occupancy; the boundary pass afterwards restores the solid ring.
pub fn particles_to_grid(grid: &mut Grid, particles: &Particles, buffers: &mut TransferBuffers) {
    grid.u.zero();
    grid.v.zero();
    buffers.weight_u.zero();
    buffers.weight_v.zero();

    for p in particles.iter() {
        // u samples: face-aligned in x, cell-centred in y
        let (i, fx) = grid.bary_x(p.position.x);
        let (j, fy) = grid.bary_y_centre(p.position.y);
        accumulate(&mut grid.u, &mut buffers.weight_u, p.velocity.x, i, j, fx, fy);

        // v samples: cell-centred in x, face-aligned in y
        let (i, fx) = grid.bary_x_centre(p.position.x);
        let (j, fy) = grid.bary_y(p.position.y);
        accumulate(&mut grid.v, &mut buffers.weight_v, p.velocity.y, i, j, fx, fy);
    }

    normalize(&mut grid.u, &buffers.weight_u);
    normalize(&mut grid.v, &buffers.weight_v);

    grid.marker.fill(CellType::Air);
    for p in particles.iter() {
        let i = (p.position.x * grid.inv_h) as usize;
        let j = (p.position.y * grid.inv_h) as usize;
        if i < grid.nx && j < grid.ny {
            *grid.marker.at_mut(i, j) = CellType::Fluid;
        }
    }
}

#[inline]
fn accumulate(
    field: &mut Array2<f32>,
    weights: &mut Array2<f32>,
    value: f32,
    i: usize,
    j: usize,
    fx: f32,
    fy: f32,
) {
    let w00 = (1.0 - fx) * (1.0 - fy);
    let w10 = fx * (1.0 - fy);
    let w01 = (1.0 - fx) * fy;
    let w11 = fx * fy;
    *field.at_mut(i, j) += w00 * value;
    *weights.at_mut(i, j) += w00;
    *field.at_mut(i + 1, j) += w10 * value;
    *weights.at_mut(i + 1, j) += w10;
    *field.at_mut(i, j + 1) += w01 * value;
    *weights.at_mut(i, j + 1) += w01;
    *field.at_mut(i + 1, j + 1) += w11 * value;
    *weights.at_mut(i + 1, j + 1) += w11;
}

fn normalize(field: &mut Array2<f32>, weights: &Array2<f32>) {
    for (f, &w) in field.as_mut_slice().iter_mut().zip(weights.as_slice()) {
        if w != 0.0 {
            *f /= w;
        }
    }
}

/// Read the projected grid velocity back onto the particles.
pub fn grid_to_particles(grid: &Grid, particles: &mut Particles, mode: VelocityTransfer) {
    particles.list.par_iter_mut().for_each(|p| {
        let pic = grid.bilerp_uv(p.position);
        p.velocity = match mode {
            VelocityTransfer::Pic => pic,
            VelocityTransfer::FlipBlend { ratio } => {
                let flip = p.velocity + grid.bilerp_duv(p.position);
                ratio * flip + (1.0 - ratio) * pic
            }
        };
    });
}
