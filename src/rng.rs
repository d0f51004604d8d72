//! Xorshift32 generator used for track generation.

#[derive(Clone, Debug)]
pub struct Rng(u32);

impl Rng {
    /// Seeds of zero would lock xorshift at zero forever, so they are remapped.
    pub const fn new(seed: u32) -> Self {
        Self(if seed == 0 { 0x2545_F491 } else { seed })
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }

    /// Uniform-ish value in `0..max`. Returns 0 when `max` is 0.
    pub fn below(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.next_u32() % max
    }

    /// Value in `lo..=hi`.
    pub fn between(&mut self, lo: u8, hi: u8) -> u8 {
        let span = u32::from(hi.saturating_sub(lo)) + 1;
        lo + self.below(span) as u8
    }

    pub fn coin(&mut self) -> bool {
        self.next_u32() & 1 == 1
    }
}
