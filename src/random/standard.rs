//! This module provides the draw primitives needed by event generation on top
//! of the abstractions of the standard "random" crate.

use crate::numeric::{reals::consts::PI, Float};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};

/// Random number generation engine in use
type Engine = rand_xoshiro::Xoshiro256Plus;

/// Owned pseudo-random stream
#[derive(Clone, Debug)]
pub struct RandGenerator {
    rng: Engine,
}
//
impl RandGenerator {
    /// Spawn a new random number generator from a seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Engine::seed_from_u64(seed),
        }
    }

    /// Restart the stream from a new seed
    pub fn reseed(&mut self, seed: u64) {
        self.rng = Engine::seed_from_u64(seed);
    }

    /// Generate a random floating-point number between 0 and 1
    pub fn random(&mut self) -> Float {
        self.rng.gen()
    }

    /// Generate a random number uniformly distributed in [low, high)
    pub fn uniform(&mut self, low: Float, high: Float) -> Float {
        low + (high - low) * self.random()
    }

    /// Generate an azimuthal angle uniformly distributed in [0, 2π)
    pub fn azimuth(&mut self) -> Float {
        2. * PI * self.random()
    }

    /// Generate a normally distributed number
    ///
    /// A null (or invalid) sigma yields the mean itself, which is how "no
    /// spread" is expressed in beam configurations.
    ///
    pub fn gaussian(&mut self, mean: Float, sigma: Float) -> Float {
        match Normal::new(mean, sigma) {
            Ok(normal) if sigma > 0. => normal.sample(&mut self.rng),
            _ => mean,
        }
    }

    /// Generate an exponentially distributed number with the given mean
    ///
    /// There is no such distribution unless the mean is positive and finite,
    /// in which case None is returned and no randomness is consumed.
    ///
    pub fn exponential(&mut self, mean: Float) -> Option<Float> {
        if !(mean > 0. && mean.is_finite()) {
            return None;
        }
        let exp = Exp::new(1. / mean).ok()?;
        Some(exp.sample(&mut self.rng))
    }

    /// Pick a random index in 0..len (len must be nonzero)
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Switch to a far away, non-overlapping part of the stream
    ///
    /// Used to hand independent sub-streams to parallel generation tasks.
    ///
    pub fn jump(&mut self) {
        self.rng.jump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut rng1 = RandGenerator::new(42);
        let mut rng2 = RandGenerator::new(42);
        for _ in 0..100 {
            assert_eq!(rng1.random(), rng2.random());
        }
        rng1.reseed(7);
        rng2.reseed(7);
        assert_eq!(rng1.gaussian(1., 2.), rng2.gaussian(1., 2.));
    }

    #[test]
    fn draws_stay_in_range() {
        let mut rng = RandGenerator::new(1);
        for _ in 0..1000 {
            let u = rng.uniform(-2., 3.);
            assert!((-2. ..3.).contains(&u));
            assert!(rng.exponential(0.5).unwrap() >= 0.);
            assert!(rng.index(7) < 7);
        }
    }

    #[test]
    fn degenerate_distributions() {
        let mut rng = RandGenerator::new(1);
        assert_eq!(rng.gaussian(191.29, 0.), 191.29);
        assert_eq!(rng.exponential(0.), None);
        assert_eq!(rng.exponential(-0.2), None);
        assert_eq!(rng.exponential(Float::NAN), None);
        assert_eq!(rng.exponential(Float::INFINITY), None);
    }

    #[test]
    fn jump_changes_stream() {
        let mut rng = RandGenerator::new(3);
        let mut jumped = rng.clone();
        jumped.jump();
        assert_ne!(rng.random(), jumped.random());
    }

    #[test]
    fn exponential_mean() {
        let mut rng = RandGenerator::new(5);
        let num_draws = 100_000;
        let mean = (0..num_draws).map(|_| rng.exponential(2.).unwrap()).sum::<Float>() / num_draws as Float;
        assert!((mean - 2.).abs() < 0.05, "mean = {mean}");
    }
}
