//! Mulberry32 generator.

use rand::RngCore;

use crate::source::UniformSource;

const INCREMENT: u32 = 0x6D2B_79F5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Small, fast 32-bit generator with a single word of state.
///
/// This is the default replication stream: its output is bit-for-bit stable
/// across platforms, which keeps recorded test vectors valid.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    /// Creates a generator. Only the low 32 bits of `seed` are used.
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed as u32,
        }
    }

    /// Advances the state and returns the next 32-bit output.
    pub fn step(&mut self) -> u32 {
        self.state = self.state.wrapping_add(INCREMENT);
        let a = self.state;
        let mut t = (a ^ (a >> 15)).wrapping_mul(1 | a);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        t ^ (t >> 14)
    }
}

impl UniformSource for Mulberry32 {
    fn next_f64(&mut self) -> f64 {
        f64::from(self.step()) / TWO_POW_32
    }
}

impl RngCore for Mulberry32 {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.step());
        let lo = u64::from(self.step());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
