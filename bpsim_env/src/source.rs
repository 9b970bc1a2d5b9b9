//! Uniform random sources.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// A stream of uniform variates in `[0, 1)`.
///
/// The engine consumes randomness only through this trait, one call per
/// logical draw.
pub trait UniformSource {
    /// Returns the next uniform draw in `[0, 1)`.
    fn next_f64(&mut self) -> f64;
}

impl<U: UniformSource + ?Sized> UniformSource for Box<U> {
    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }
}

impl<U: UniformSource + ?Sized> UniformSource for &mut U {
    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }
}

impl UniformSource for ChaCha8Rng {
    fn next_f64(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Replays a fixed list of draws, wrapping around at the end.
///
/// Counts how many draws were taken, which makes it the natural source for
/// checking the draw budget of a distribution.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<f64>,
    cursor: usize,
    taken: usize,
}

impl SequenceSource {
    /// Creates a source that cycles through `values`.
    ///
    /// An empty list behaves like a source that always returns `0.0`.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
            taken: 0,
        }
    }

    /// Creates a source that always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws taken so far.
    pub fn taken(&self) -> usize {
        self.taken
    }
}

impl UniformSource for SequenceSource {
    fn next_f64(&mut self) -> f64 {
        self.taken += 1;
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor];
        self.cursor = (self.cursor + 1) % self.values.len();
        value
    }
}
