//! Pressure projection: divergence, Laplacian assembly, MIC(0)-preconditioned
//! conjugate gradient, gradient subtraction.
//!
//! The system is assembled in cell units (no h or dt scaling); the same
//! scaling is dropped from the gradient subtraction so the two cancel.

use log::{debug, warn};

use crate::grid::{CellType, Grid};

/// Outcome of one pressure solve. The best-effort pressure is committed to
/// the grid whether or not the solve converged within the iteration cap.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PressureSolve {
    pub converged: bool,
    pub iterations: usize,
    pub residual: f32,
}

/// Modified-incomplete-Cholesky tuning constant.
const MIC_TUNING: f32 = 0.97;
/// Fall back to the raw diagonal when the modified pivot loses too much.
const MIC_SAFETY: f32 = 0.25;

/// Project the grid velocity field to be divergence-free on fluid cells:
/// divergence, Laplacian, preconditioner, PCG solve, gradient subtraction.
pub fn make_incompressible(grid: &mut Grid, max_iterations: usize, tolerance: f32) -> PressureSolve {
    find_divergence(grid);
    form_poisson(grid);
    form_preconditioner(grid);
    let outcome = solve_pressure(grid, max_iterations, tolerance);
    add_gradient(grid);
    outcome
}

/// Negative divergence of (u, v) into the right-hand side r, fluid cells only.
pub fn find_divergence(grid: &mut Grid) {
    grid.r.zero();
    for j in 0..grid.ny {
        for i in 0..grid.nx {
            if grid.marker.at(i, j) == CellType::Fluid {
                let div = grid.u.at(i + 1, j) - grid.u.at(i, j) + grid.v.at(i, j + 1)
                    - grid.v.at(i, j);
                *grid.r.at_mut(i, j) = -div;
            }
        }
    }
}

/// Symmetric 5-point Laplacian restricted to fluid cells. Every non-solid
/// neighbor adds one to the diagonal; fluid neighbors carry a -1 coupling
/// stored on the right/up channels (the mirror entries are implied). Air
/// neighbors contribute only to the diagonal: a Dirichlet zero at the
/// free surface.
pub fn form_poisson(grid: &mut Grid) {
    grid.poisson_diag.zero();
    grid.poisson_px.zero();
    grid.poisson_py.zero();
    for j in 1..grid.ny - 1 {
        for i in 1..grid.nx - 1 {
            if grid.marker.at(i, j) != CellType::Fluid {
                continue;
            }
            let mut diag = 0.0;
            if grid.marker.at(i - 1, j) != CellType::Solid {
                diag += 1.0;
            }
            if grid.marker.at(i + 1, j) != CellType::Solid {
                diag += 1.0;
                if grid.marker.at(i + 1, j) == CellType::Fluid {
                    *grid.poisson_px.at_mut(i, j) = -1.0;
                }
            }
            if grid.marker.at(i, j - 1) != CellType::Solid {
                diag += 1.0;
            }
            if grid.marker.at(i, j + 1) != CellType::Solid {
                diag += 1.0;
                if grid.marker.at(i, j + 1) == CellType::Fluid {
                    *grid.poisson_py.at_mut(i, j) = -1.0;
                }
            }
            *grid.poisson_diag.at_mut(i, j) = diag;
        }
    }
}

/// Modified incomplete Cholesky factor of the Poisson matrix, stored as the
/// inverse square root of the pivot.
pub fn form_preconditioner(grid: &mut Grid) {
    grid.precon.zero();
    for j in 1..grid.ny - 1 {
        for i in 1..grid.nx - 1 {
            if grid.marker.at(i, j) != CellType::Fluid {
                continue;
            }
            let mut e = grid.poisson_diag.at(i, j);
            if grid.marker.at(i - 1, j) == CellType::Fluid {
                let px = grid.poisson_px.at(i - 1, j) * grid.precon.at(i - 1, j);
                let py = grid.poisson_py.at(i - 1, j) * grid.precon.at(i - 1, j);
                e -= px * px + MIC_TUNING * px * py;
            }
            if grid.marker.at(i, j - 1) == CellType::Fluid {
                let px = grid.poisson_px.at(i, j - 1) * grid.precon.at(i, j - 1);
                let py = grid.poisson_py.at(i, j - 1) * grid.precon.at(i, j - 1);
                e -= py * py + MIC_TUNING * px * py;
            }
            if e < MIC_SAFETY * grid.poisson_diag.at(i, j) {
                e = grid.poisson_diag.at(i, j);
            }
            *grid.precon.at_mut(i, j) = 1.0 / (e + 1e-6).sqrt();
        }
    }
}

/// z = M^-1 r: forward solve into m, backward solve into z.
fn apply_preconditioner(grid: &mut Grid) {
    grid.m.zero();
    for j in 1..grid.ny - 1 {
        for i in 1..grid.nx - 1 {
            if grid.marker.at(i, j) == CellType::Fluid {
                let d = grid.r.at(i, j)
                    - grid.poisson_px.at(i - 1, j) * grid.precon.at(i - 1, j) * grid.m.at(i - 1, j)
                    - grid.poisson_py.at(i, j - 1) * grid.precon.at(i, j - 1) * grid.m.at(i, j - 1);
                let value = grid.precon.at(i, j) * d;
                *grid.m.at_mut(i, j) = value;
            }
        }
    }
    grid.z.zero();
    for j in (1..grid.ny - 1).rev() {
        for i in (1..grid.nx - 1).rev() {
            if grid.marker.at(i, j) == CellType::Fluid {
                let d = grid.m.at(i, j)
                    - grid.poisson_px.at(i, j) * grid.precon.at(i, j) * grid.z.at(i + 1, j)
                    - grid.poisson_py.at(i, j) * grid.precon.at(i, j) * grid.z.at(i, j + 1);
                let value = grid.precon.at(i, j) * d;
                *grid.z.at_mut(i, j) = value;
            }
        }
    }
}

/// z = A s over fluid cells. Off-diagonal entries at non-fluid cells are
/// zero, so no neighbor marker checks are needed.
fn apply_poisson(grid: &mut Grid) {
    grid.z.zero();
    for j in 1..grid.ny - 1 {
        for i in 1..grid.nx - 1 {
            if grid.marker.at(i, j) == CellType::Fluid {
                let value = grid.poisson_diag.at(i, j) * grid.s.at(i, j)
                    + grid.poisson_px.at(i - 1, j) * grid.s.at(i - 1, j)
                    + grid.poisson_px.at(i, j) * grid.s.at(i + 1, j)
                    + grid.poisson_py.at(i, j - 1) * grid.s.at(i, j - 1)
                    + grid.poisson_py.at(i, j) * grid.s.at(i, j + 1);
                *grid.z.at_mut(i, j) = value;
            }
        }
    }
}

/// Preconditioned conjugate gradient on the assembled system, r as the
/// right-hand side, pressure as the solution. Convergence is an infinity-norm
/// test on the residual. On hitting the iteration cap the partial solution
/// stays committed and the outcome reports `converged: false`.
pub fn solve_pressure(grid: &mut Grid, max_iterations: usize, tolerance: f32) -> PressureSolve {
    grid.pressure.zero();
    let mut residual = grid.r.infnorm();
    if residual <= tolerance {
        return PressureSolve {
            converged: true,
            iterations: 0,
            residual,
        };
    }

    apply_preconditioner(grid);
    grid.z.copy_to(&mut grid.s);
    let mut sigma = grid.z.dot(&grid.r);

    for iteration in 0..max_iterations {
        apply_poisson(grid);
        let denom = grid.z.dot(&grid.s);
        let alpha = if denom != 0.0 { (sigma / denom) as f32 } else { 0.0 };
        grid.pressure.increment(alpha, &grid.s);
        grid.r.increment(-alpha, &grid.z);

        residual = grid.r.infnorm();
        if residual <= tolerance {
            debug!(
                "pressure solve converged in {} iterations, residual {:.3e}",
                iteration + 1,
                residual
            );
            return PressureSolve {
                converged: true,
                iterations: iteration + 1,
                residual,
            };
        }

        apply_preconditioner(grid);
        let sigma_new = grid.z.dot(&grid.r);
        let beta = if sigma != 0.0 { (sigma_new / sigma) as f32 } else { 0.0 };
        grid.s.scale_and_increment(beta, &grid.z);
        sigma = sigma_new;
    }

    warn!(
        "pressure solve hit the {}-iteration cap, residual {:.3e}",
        max_iterations, residual
    );
    PressureSolve {
        converged: false,
        iterations: max_iterations,
        residual,
    }
}

/// Subtract the pressure gradient at every face touching a fluid cell.
/// Solid-adjacent faces are left to the boundary pass.
pub fn add_gradient(grid: &mut Grid) {
    for j in 0..grid.ny {
        for i in 1..grid.nx {
            let left = grid.marker.at(i - 1, j);
            let right = grid.marker.at(i, j);
            if (left == CellType::Fluid || right == CellType::Fluid)
                && left != CellType::Solid
                && right != CellType::Solid
            {
                let gradient = grid.pressure.at(i, j) - grid.pressure.at(i - 1, j);
                *grid.u.at_mut(i, j) -= gradient;
            }
        }
    }
    for j in 1..grid.ny {
        for i in 0..grid.nx {
            let bottom = grid.marker.at(i, j - 1);
            let top = grid.marker.at(i, j);
            if (bottom == CellType::Fluid || top == CellType::Fluid)
                && bottom != CellType::Solid
                && top != CellType::Solid
            {
                let gradient = grid.pressure.at(i, j) - grid.pressure.at(i, j - 1);
                *grid.v.at_mut(i, j) -= gradient;
            }
        }
    }
}
