//! Dense 2D array storage for grid quantities.
//!
//! Row-major (x-fastest) contiguous buffer. Indexing is unchecked in release
//! builds; callers own the bounds contract and the hot loops rely on it.

use serde::{Deserialize, Serialize};

/// Fixed-size 2D array backed by a `Vec<T>`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Array2<T> {
    nx: usize,
    ny: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Array2<T> {
    /// Create an `nx * ny` array filled with `T::default()`.
    pub fn new(nx: usize, ny: usize) -> Self {
        assert!(nx > 0 && ny > 0, "dimensions must be positive, got {}x{}", nx, ny);
        Self {
            nx,
            ny,
            data: vec![T::default(); nx * ny],
        }
    }

    /// Reallocate to `nx * ny` elements, discarding prior contents.
    pub fn resize(&mut self, nx: usize, ny: usize) {
        assert!(nx > 0 && ny > 0, "dimensions must be positive, got {}x{}", nx, ny);
        self.nx = nx;
        self.ny = ny;
        self.data.clear();
        self.data.resize(nx * ny, T::default());
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(i, j)`. Bounds are a debug-only contract.
    #[inline]
    pub fn at(&self, i: usize, j: usize) -> T {
        debug_assert!(i < self.nx && j < self.ny, "index ({}, {}) out of {}x{}", i, j, self.nx, self.ny);
        self.data[i + self.nx * j]
    }

    /// Mutable reference at `(i, j)`. Bounds are a debug-only contract.
    #[inline]
    pub fn at_mut(&mut self, i: usize, j: usize) -> &mut T {
        debug_assert!(i < self.nx && j < self.ny, "index ({}, {}) out of {}x{}", i, j, self.nx, self.ny);
        let nx = self.nx;
        &mut self.data[i + nx * j]
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn zero(&mut self) {
        self.data.fill(T::default());
    }

    /// Copy every element into `dst`. Dimensions must match.
    pub fn copy_to(&self, dst: &mut Array2<T>) {
        assert_eq!(
            (self.nx, self.ny),
            (dst.nx, dst.ny),
            "copy_to dimension mismatch"
        );
        dst.data.copy_from_slice(&self.data);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl Array2<f32> {
    /// Bilinear interpolation among the four corners at `(i, j)`.
    /// Caller guarantees `i + 1 < nx` and `j + 1 < ny`.
    #[inline]
    pub fn bilerp(&self, i: usize, j: usize, fx: f32, fy: f32) -> f32 {
        debug_assert!(i + 1 < self.nx && j + 1 < self.ny, "bilerp base ({}, {}) out of {}x{}", i, j, self.nx, self.ny);
        let v00 = self.at(i, j);
        let v10 = self.at(i + 1, j);
        let v01 = self.at(i, j + 1);
        let v11 = self.at(i + 1, j + 1);
        (1.0 - fy) * ((1.0 - fx) * v00 + fx * v10) + fy * ((1.0 - fx) * v01 + fx * v11)
    }

    /// Largest absolute value, 0 for the all-zero field.
    pub fn infnorm(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }

    /// Inner product with an f64 accumulator; the conjugate-gradient
    /// convergence decisions ride on this.
    pub fn dot(&self, other: &Array2<f32>) -> f64 {
        assert_eq!((self.nx, self.ny), (other.nx, other.ny), "dot dimension mismatch");
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| *a as f64 * *b as f64)
            .sum()
    }

    /// `self += scale * other`
    pub fn increment(&mut self, scale: f32, other: &Array2<f32>) {
        assert_eq!((self.nx, self.ny), (other.nx, other.ny), "increment dimension mismatch");
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += scale * b;
        }
    }

    /// `self = scale * self + other`
    pub fn scale_and_increment(&mut self, scale: f32, other: &Array2<f32>) {
        assert_eq!((self.nx, self.ny), (other.nx, other.ny), "scale_and_increment dimension mismatch");
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a = scale * *a + b;
        }
    }
}
