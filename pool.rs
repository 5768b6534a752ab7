//! pool - Fixed-capacity particle storage
//! No heap allocation: N slots live inline and dead slots are reused

use crate::particle::Particle;

/// Reference to a pooled particle.
///
/// The generation check makes a handle go stale once its slot is reclaimed
/// or the pool is reset, so stale handles can never reach a new occupant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParticleHandle {
    index: u16,
    generation: u16,
}

impl ParticleHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// What the per-particle update callback wants done with the particle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fate {
    Live,
    Kill,
}

/// The live count is read off the slots, so a particle killed through
/// [`ParticlePool::get_mut`] is counted out like any other.
pub struct ParticlePool<const N: usize> {
    particles: [Particle; N],
    generations: [u16; N],
}

impl<const N: usize> Default for ParticlePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ParticlePool<N> {
    pub const fn new() -> Self {
        Self {
            particles: [Particle::DEAD; N],
            generations: [0; N],
        }
    }

    /// Store `particle` in the first free slot.
    ///
    /// Mass is clamped and age restarts at zero. A full pool returns `None`
    /// and changes nothing; callers are expected to shrug that off.
    pub fn spawn(&mut self, particle: Particle) -> Option<ParticleHandle> {
        if particle.intensity == 0 {
            return None;
        }
        let index = self.particles.iter().position(|p| !p.is_alive())?;

        let mut fresh = particle;
        fresh.age = 0;
        fresh.clamp_mass();
        if fresh.birth_intensity < fresh.intensity {
            fresh.birth_intensity = fresh.intensity;
        }

        self.particles[index] = fresh;
        self.generations[index] = self.generations[index].wrapping_add(1);
        Some(ParticleHandle {
            index: index as u16,
            generation: self.generations[index],
        })
    }

    fn resolve(&self, handle: ParticleHandle) -> Option<usize> {
        let i = handle.index as usize;
        if i < N && self.generations[i] == handle.generation && self.particles[i].is_alive() {
            Some(i)
        } else {
            None
        }
    }

    /// Out-of-range, stale and already-dead handles are ignored.
    pub fn kill(&mut self, handle: ParticleHandle) {
        if let Some(i) = self.resolve(handle) {
            self.release(i);
        }
    }

    fn release(&mut self, i: usize) {
        self.particles[i].intensity = 0;
    }

    pub fn get(&self, handle: ParticleHandle) -> Option<&Particle> {
        self.resolve(handle).map(|i| &self.particles[i])
    }

    pub fn get_mut(&mut self, handle: ParticleHandle) -> Option<&mut Particle> {
        self.resolve(handle).map(move |i| &mut self.particles[i])
    }

    /// Run `update` once per alive particle.
    ///
    /// A particle is reclaimed when `update` returns `Fate::Kill` or when it
    /// is no longer alive afterwards.
    pub fn update_all<F>(&mut self, mut update: F)
    where
        F: FnMut(&mut Particle) -> Fate,
    {
        for i in 0..N {
            if !self.particles[i].is_alive() {
                continue;
            }
            let fate = update(&mut self.particles[i]);
            if fate == Fate::Kill || !self.particles[i].is_alive() {
                self.release(i);
            }
        }
    }

    /// Read-only pass over alive particles, for rendering.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&Particle),
    {
        self.iter().for_each(|p| visit(p));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.particles.iter().filter(|p| p.is_alive())
    }

    /// Kill everything and invalidate every handle handed out so far.
    pub fn reset(&mut self) {
        for (p, generation) in self.particles.iter_mut().zip(self.generations.iter_mut()) {
            p.intensity = 0;
            *generation = generation.wrapping_add(1);
        }
    }

    pub fn active_count(&self) -> usize {
        self.iter().count()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_full(&self) -> bool {
        self.particles.iter().all(|p| p.is_alive())
    }
}
