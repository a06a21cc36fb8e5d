//! 2D MAC (Marker-and-Cell) staggered grid for incompressible fluid simulation.
//!
//! Velocity components live on cell faces:
//! - u (X-velocity) on vertical faces at x = i * h, size (nx+1) * ny
//! - v (Y-velocity) on horizontal faces at y = j * h, size nx * (ny+1)
//!
//! Pressure, cell markers and the distance field live at cell centers.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::array2::Array2;

/// Cell classification for the pressure solve.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Solid obstacle (no flow)
    Solid,
    /// Contains fluid particles
    Fluid,
    /// Empty air
    #[default]
    Air,
}

/// Staggered grid state plus the scratch fields the pressure solver works in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid {
    /// Number of cells in X direction
    pub nx: usize,
    /// Number of cells in Y direction
    pub ny: usize,
    /// Cell size in world units (cells are square)
    pub h: f32,
    pub inv_h: f32,
    /// Domain width: nx * h
    pub lx: f32,
    /// Domain height: ny * h
    pub ly: f32,
    /// Body force; settable between steps
    pub gravity: Vec2,

    /// U velocity on vertical faces
    pub u: Array2<f32>,
    /// V velocity on horizontal faces
    pub v: Array2<f32>,
    /// Saved u; after `get_velocity_update` holds the per-step delta
    pub du: Array2<f32>,
    /// Saved v; after `get_velocity_update` holds the per-step delta
    pub dv: Array2<f32>,

    /// Cell classification, rebuilt from particles every step
    pub marker: Array2<CellType>,
    /// Approximate distance to the fluid surface, negative inside
    pub phi: Array2<f32>,

    pub pressure: Array2<f32>,
    // 5-point Laplacian coefficients, assembled over fluid cells only.
    // Left/down couplings are the mirrored right/up entries of the neighbor.
    pub(crate) poisson_diag: Array2<f32>,
    pub(crate) poisson_px: Array2<f32>,
    pub(crate) poisson_py: Array2<f32>,
    pub(crate) precon: Array2<f32>,
    // Conjugate-gradient work vectors
    pub(crate) m: Array2<f32>,
    pub(crate) r: Array2<f32>,
    pub(crate) z: Array2<f32>,
    pub(crate) s: Array2<f32>,
}

impl Grid {
    /// Create a grid of `nx * ny` square cells spanning `lx` world units in X.
    pub fn new(gravity: Vec2, nx: usize, ny: usize, lx: f32) -> Self {
        assert!(nx > 0 && ny > 0, "grid dimensions must be positive, got {}x{}", nx, ny);
        assert!(lx > 0.0, "domain width must be positive, got {}", lx);
        let h = lx / nx as f32;
        let ly = ny as f32 * h;
        Self {
            nx,
            ny,
            h,
            inv_h: 1.0 / h,
            lx,
            ly,
            gravity,
            u: Array2::new(nx + 1, ny),
            v: Array2::new(nx, ny + 1),
            du: Array2::new(nx + 1, ny),
            dv: Array2::new(nx, ny + 1),
            marker: Array2::new(nx, ny),
            phi: Array2::new(nx, ny),
            pressure: Array2::new(nx, ny),
            poisson_diag: Array2::new(nx, ny),
            poisson_px: Array2::new(nx, ny),
            poisson_py: Array2::new(nx, ny),
            precon: Array2::new(nx, ny),
            m: Array2::new(nx, ny),
            r: Array2::new(nx, ny),
            z: Array2::new(nx, ny),
            s: Array2::new(nx, ny),
        }
    }

    /// Maximum stable time step estimate.
    ///
    /// Finite and strictly positive for any finite velocity field; the 1e-16
    /// floor turns the all-zero, no-gravity case into a large sentinel
    /// instead of a division by zero.
    pub fn cfl(&self) -> f32 {
        let max_vel = self.u.infnorm().max(self.v.infnorm());
        let denom = (self.h * self.gravity.length())
            .max(max_vel * max_vel)
            .max(1e-16);
        self.h / denom.sqrt()
    }

    /// Snapshot u, v into du, dv before the grid forces are applied.
    pub fn save_velocities(&mut self) {
        self.u.copy_to(&mut self.du);
        self.v.copy_to(&mut self.dv);
    }

    /// Forward-Euler body force, subtracted uniformly over every face sample.
    pub fn add_gravity(&mut self, dt: f32) {
        let gx = dt * self.gravity.x;
        let gy = dt * self.gravity.y;
        if gx != 0.0 {
            for value in self.u.as_mut_slice() {
                *value -= gx;
            }
        }
        if gy != 0.0 {
            for value in self.v.as_mut_slice() {
                *value -= gy;
            }
        }
    }

    /// Overwrite du, dv with the net change of this step: u - du, v - dv.
    /// Valid once per step, after the projection and before the G2P read.
    pub fn get_velocity_update(&mut self) {
        for (d, now) in self.du.as_mut_slice().iter_mut().zip(self.u.as_slice()) {
            *d = now - *d;
        }
        for (d, now) in self.dv.as_mut_slice().iter_mut().zip(self.v.as_slice()) {
            *d = now - *d;
        }
    }

    /// Solid perimeter ring plus a two-face no-flow band along each wall.
    /// Idempotent; runs every step after the marker rebuild.
    pub fn apply_boundary_conditions(&mut self) {
        let (nx, ny) = (self.nx, self.ny);
        for i in 0..nx {
            *self.marker.at_mut(i, 0) = CellType::Solid;
            *self.marker.at_mut(i, ny - 1) = CellType::Solid;
        }
        for j in 0..ny {
            *self.marker.at_mut(0, j) = CellType::Solid;
            *self.marker.at_mut(nx - 1, j) = CellType::Solid;
        }
        for j in 0..ny {
            *self.u.at_mut(0, j) = 0.0;
            *self.u.at_mut(1, j) = 0.0;
            *self.u.at_mut(nx - 1, j) = 0.0;
            *self.u.at_mut(nx, j) = 0.0;
        }
        for i in 0..nx {
            *self.v.at_mut(i, 0) = 0.0;
            *self.v.at_mut(i, 1) = 0.0;
            *self.v.at_mut(i, ny - 1) = 0.0;
            *self.v.at_mut(i, ny) = 0.0;
        }
    }

    // ========== Sampling ==========

    /// Face-aligned sample coordinate: base index and fraction along X.
    /// Unclamped; the advection clamp keeps x inside the valid band.
    #[inline]
    pub fn bary_x(&self, x: f32) -> (usize, f32) {
        debug_assert!(x >= 0.0, "face sample x = {} out of domain", x);
        let sx = x * self.inv_h;
        let i = sx as usize;
        (i, sx - i as f32)
    }

    /// Face-aligned sample coordinate along Y.
    #[inline]
    pub fn bary_y(&self, y: f32) -> (usize, f32) {
        debug_assert!(y >= 0.0, "face sample y = {} out of domain", y);
        let sy = y * self.inv_h;
        let j = sy as usize;
        (j, sy - j as f32)
    }

    /// Cell-centred sample coordinate along X, clamped into `[0, nx-2]` so a
    /// bilinear lookup of an nx-wide array never reads out of bounds.
    #[inline]
    pub fn bary_x_centre(&self, x: f32) -> (usize, f32) {
        let sx = x * self.inv_h - 0.5;
        if sx < 0.0 {
            (0, 0.0)
        } else {
            let i = sx as usize;
            if i > self.nx - 2 {
                (self.nx - 2, 1.0)
            } else {
                (i, sx - i as f32)
            }
        }
    }

    /// Cell-centred sample coordinate along Y, clamped into `[0, ny-2]`.
    #[inline]
    pub fn bary_y_centre(&self, y: f32) -> (usize, f32) {
        let sy = y * self.inv_h - 0.5;
        if sy < 0.0 {
            (0, 0.0)
        } else {
            let j = sy as usize;
            if j > self.ny - 2 {
                (self.ny - 2, 1.0)
            } else {
                (j, sy - j as f32)
            }
        }
    }

    /// Sample the staggered velocity field at an arbitrary physical point.
    #[inline]
    pub fn bilerp_uv(&self, pos: Vec2) -> Vec2 {
        let (i, fx) = self.bary_x(pos.x);
        let (j, fy) = self.bary_y_centre(pos.y);
        let pu = self.u.bilerp(i, j, fx, fy);
        let (i, fx) = self.bary_x_centre(pos.x);
        let (j, fy) = self.bary_y(pos.y);
        let pv = self.v.bilerp(i, j, fx, fy);
        Vec2::new(pu, pv)
    }

    /// Sample the saved per-step velocity delta (du, dv) at a physical point.
    /// Only meaningful after `get_velocity_update`.
    #[inline]
    pub fn bilerp_duv(&self, pos: Vec2) -> Vec2 {
        let (i, fx) = self.bary_x(pos.x);
        let (j, fy) = self.bary_y_centre(pos.y);
        let pu = self.du.bilerp(i, j, fx, fy);
        let (i, fx) = self.bary_x_centre(pos.x);
        let (j, fy) = self.bary_y(pos.y);
        let pv = self.dv.bilerp(i, j, fx, fy);
        Vec2::new(pu, pv)
    }

    // ========== Distance field ==========

    /// Rebuild `phi` as an approximate distance to the fluid: seeded negative
    /// inside, then two passes of four diagonal sweeps. Deliberately cheap;
    /// the velocity extension only needs a usable gradient near the surface.
    pub fn compute_distance_to_fluid(&mut self) {
        self.init_phi();
        for _ in 0..2 {
            self.sweep_phi();
        }
    }

    fn init_phi(&mut self) {
        let large = (self.nx + self.ny + 2) as f32 * self.h;
        for j in 0..self.ny {
            for i in 0..self.nx {
                *self.phi.at_mut(i, j) = if self.marker.at(i, j) == CellType::Fluid {
                    -0.5 * self.h
                } else {
                    large
                };
            }
        }
    }

    /// Distance update from the two upwind neighbors (2D Eikonal, |grad| = 1).
    fn solve_distance(h: f32, p: f32, q: f32, current: f32) -> f32 {
        let mut d = p.min(q) + h;
        if d > p.max(q) {
            let disc = 2.0 * h * h - (p - q) * (p - q);
            if disc > 0.0 {
                d = 0.5 * (p + q + disc.sqrt());
            }
        }
        d.min(current)
    }

    fn sweep_phi(&mut self) {
        for &(di, dj) in &[(1i32, 1i32), (-1, -1), (1, -1), (-1, 1)] {
            self.sweep_phi_dir(di, dj);
        }
    }

    fn sweep_phi_dir(&mut self, di: i32, dj: i32) {
        let nx = self.nx as i32;
        let ny = self.ny as i32;
        let (i0, i1) = if di > 0 { (1, nx) } else { (nx - 2, -1) };
        let (j0, j1) = if dj > 0 { (1, ny) } else { (ny - 2, -1) };
        let mut j = j0;
        while j != j1 {
            let mut i = i0;
            while i != i1 {
                let (iu, ju) = (i as usize, j as usize);
                if self.marker.at(iu, ju) != CellType::Fluid {
                    let p = self.phi.at((i - di) as usize, ju);
                    let q = self.phi.at(iu, (j - dj) as usize);
                    let d = Self::solve_distance(self.h, p, q, self.phi.at(iu, ju));
                    *self.phi.at_mut(iu, ju) = d;
                }
                i += di;
            }
            j += dj;
        }
    }

    // ========== Velocity extension ==========

    /// Extrapolate face velocities into the air so interface interpolation
    /// never reads stale zeros. Four iterations of upwinded quadrant sweeps.
    pub fn extend_velocity(&mut self) {
        for _ in 0..4 {
            self.sweep_velocity();
        }
    }

    fn sweep_velocity(&mut self) {
        let unx = (self.nx + 1) as i32;
        let uny = self.ny as i32;
        self.sweep_u(1, unx - 1, 1, uny - 1);
        self.sweep_u(1, unx - 1, uny - 2, 0);
        self.sweep_u(unx - 2, 0, 1, uny - 1);
        self.sweep_u(unx - 2, 0, uny - 2, 0);
        Self::copy_border(&mut self.u);

        let vnx = self.nx as i32;
        let vny = (self.ny + 1) as i32;
        self.sweep_v(1, vnx - 1, 1, vny - 1);
        self.sweep_v(1, vnx - 1, vny - 2, 0);
        self.sweep_v(vnx - 2, 0, 1, vny - 1);
        self.sweep_v(vnx - 2, 0, vny - 2, 0);
        Self::copy_border(&mut self.v);
    }

    /// One directed sweep over the u faces between two air cells. The phi
    /// gradient picks the upwind blend; faces the gradient points away from
    /// are left for the opposite sweep direction.
    fn sweep_u(&mut self, i0: i32, i1: i32, j0: i32, j1: i32) {
        let di: i32 = if i0 < i1 { 1 } else { -1 };
        let dj: i32 = if j0 < j1 { 1 } else { -1 };
        let mut j = j0;
        while j != j1 {
            let mut i = i0;
            while i != i1 {
                let (iu, ju) = (i as usize, j as usize);
                if self.marker.at(iu - 1, ju) == CellType::Air && self.marker.at(iu, ju) == CellType::Air {
                    let dp = di as f32 * (self.phi.at(iu, ju) - self.phi.at(iu - 1, ju));
                    if dp >= 0.0 {
                        let jb = (j - dj) as usize;
                        let dq = 0.5 * (self.phi.at(iu - 1, ju) + self.phi.at(iu, ju))
                            - 0.5 * (self.phi.at(iu - 1, jb) + self.phi.at(iu, jb));
                        if dq >= 0.0 {
                            let alpha = if dp + dq == 0.0 { 0.5 } else { dp / (dp + dq) };
                            let value = alpha * self.u.at((i - di) as usize, ju)
                                + (1.0 - alpha) * self.u.at(iu, jb);
                            *self.u.at_mut(iu, ju) = value;
                        }
                    }
                }
                i += di;
            }
            j += dj;
        }
    }

    fn sweep_v(&mut self, i0: i32, i1: i32, j0: i32, j1: i32) {
        let di: i32 = if i0 < i1 { 1 } else { -1 };
        let dj: i32 = if j0 < j1 { 1 } else { -1 };
        let mut j = j0;
        while j != j1 {
            let mut i = i0;
            while i != i1 {
                let (iu, ju) = (i as usize, j as usize);
                if self.marker.at(iu, ju - 1) == CellType::Air && self.marker.at(iu, ju) == CellType::Air {
                    let dq = dj as f32 * (self.phi.at(iu, ju) - self.phi.at(iu, ju - 1));
                    if dq >= 0.0 {
                        let ib = (i - di) as usize;
                        let dp = 0.5 * (self.phi.at(iu, ju - 1) + self.phi.at(iu, ju))
                            - 0.5 * (self.phi.at(ib, ju - 1) + self.phi.at(ib, ju));
                        if dp >= 0.0 {
                            let alpha = if dp + dq == 0.0 { 0.5 } else { dp / (dp + dq) };
                            let value = alpha * self.v.at(ib, ju)
                                + (1.0 - alpha) * self.v.at(iu, (j - dj) as usize);
                            *self.v.at_mut(iu, ju) = value;
                        }
                    }
                }
                i += di;
            }
            j += dj;
        }
    }

    fn copy_border(field: &mut Array2<f32>) {
        let (nx, ny) = (field.nx(), field.ny());
        for i in 0..nx {
            let a = field.at(i, 1);
            *field.at_mut(i, 0) = a;
            let b = field.at(i, ny - 2);
            *field.at_mut(i, ny - 1) = b;
        }
        for j in 0..ny {
            let a = field.at(1, j);
            *field.at_mut(0, j) = a;
            let b = field.at(nx - 2, j);
            *field.at_mut(nx - 1, j) = b;
        }
    }
}
