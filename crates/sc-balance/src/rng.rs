/// Source of uniform samples in `[0, 1)` for the balance pass.
///
/// The pass takes this explicitly so that callers own seeding and tests can
/// replay a fixed stream.
pub trait UniformSource {
    fn next_unit(&mut self) -> f64;
}

/// xorshift64 generator. Small, fast and reproducible from its seed; not
/// suitable for anything security related.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// A zero seed would lock the generator at zero, so it is bumped to one.
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }
}

impl Default for XorShift64 {
    fn default() -> Self {
        Self::new(0x9E37_79B9_7F4A_7C15)
    }
}

impl UniformSource for XorShift64 {
    fn next_unit(&mut self) -> f64 {
        // Top 53 bits give every representable multiple of 2^-53 in [0, 1).
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

impl<R: UniformSource + ?Sized> UniformSource for &mut R {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}
