//! Massless tracer particles carrying the velocity field between steps.

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }
}

/// Append-only particle store; individual particles are never removed,
/// only the whole set cleared.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Particles {
    pub list: Vec<Particle>,
}

impl Particles {
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    pub fn spawn(&mut self, position: Vec2, velocity: Vec2) {
        self.list.push(Particle::new(position, velocity));
    }

    pub fn spawn_at(&mut self, position: Vec2) {
        self.spawn(position, Vec2::ZERO);
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.list.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_clear() {
        let mut particles = Particles::new();
        assert!(particles.is_empty());
        particles.spawn(Vec2::new(0.5, 0.5), Vec2::new(1.0, 0.0));
        particles.spawn_at(Vec2::new(0.25, 0.75));
        assert_eq!(particles.len(), 2);
        assert_eq!(particles.list[1].velocity, Vec2::ZERO);
        particles.clear();
        assert!(particles.is_empty());
    }
}
