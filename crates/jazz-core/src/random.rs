//! Injectable random source

/// Source of uniform randomness for weighted draws and noise.
///
/// Implemented for `fastrand::Rng`; tests substitute seeded or scripted
/// sources to make draws deterministic.
pub trait RandomSource {
    /// Uniform value in `[0, 1)`
    fn uniform(&mut self) -> f64;

    /// Uniform index in `0..n`. `n` must be non-zero.
    fn below(&mut self, n: usize) -> usize {
        ((self.uniform() * n as f64) as usize).min(n.saturating_sub(1))
    }

    /// Fair coin
    fn coin(&mut self) -> bool {
        self.uniform() < 0.5
    }
}

impl RandomSource for fastrand::Rng {
    fn uniform(&mut self) -> f64 {
        self.f64()
    }

    fn below(&mut self, n: usize) -> usize {
        self.usize(..n)
    }

    fn coin(&mut self) -> bool {
        self.bool()
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn uniform(&mut self) -> f64 {
        (**self).uniform()
    }

    fn below(&mut self, n: usize) -> usize {
        (**self).below(n)
    }

    fn coin(&mut self) -> bool {
        (**self).coin()
    }
}

/// Replays a fixed list of uniform values, cycling when exhausted, and
/// counts how many draws were taken.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: Vec<f64>,
    pos: usize,
    draws: usize,
}

impl ScriptedRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, pos: 0, draws: 0 }
    }

    /// Number of uniform values consumed so far
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self) -> f64 {
        self.draws += 1;
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_random_cycles() {
        let mut rng = ScriptedRandom::new(vec![0.1, 0.9]);
        assert_eq!(rng.uniform(), 0.1);
        assert_eq!(rng.uniform(), 0.9);
        assert_eq!(rng.uniform(), 0.1);
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn test_below_stays_in_range() {
        let mut rng = ScriptedRandom::new(vec![0.0, 0.5, 0.999_999]);
        for _ in 0..3 {
            assert!(rng.below(4) < 4);
        }
    }
}
