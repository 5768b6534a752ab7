//! rng - Small deterministic PRNG shared by the generators
//! xorshift32: one word of state, reproducible from a seed

const FALLBACK_SEED: u32 = 0x1234_5678;

#[derive(Copy, Clone, Debug)]
pub struct Rng {
    state: u32,
}

impl Rng {
    /// A zero seed would lock xorshift at zero forever, so it is replaced.
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { FALLBACK_SEED } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    /// Uniform in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        // 24 bits keep the result exactly representable and strictly below 1.0
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform integer in [min, max]. Swapped bounds are accepted.
    pub fn range_u8(&mut self, a: u8, b: u8) -> u8 {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let span = hi as u32 - lo as u32 + 1;
        (lo as u32 + self.next_u32() % span) as u8
    }

    /// Uniform integer in [0, bound). Returns 0 for an empty range.
    pub fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.next_u32() % bound
        }
    }

    /// True with probability `p` (clamped to [0, 1]; NaN never hits).
    /// Always draws one value, whatever `p` is.
    pub fn chance(&mut self, p: f32) -> bool {
        let roll = self.next_f32();
        roll < p.clamp(0.0, 1.0)
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(FALLBACK_SEED)
    }
}
