//! Random number generation module, built on top of the "rand" crate that is
//! the Rust standard for RNGs.
//!
//! There is no process-wide random state: every consumer is handed an
//! explicitly owned `RandomGenerator`, so independent generators can run
//! concurrently without interfering with one another.

mod standard;

/// Select the RNG implementation in use
pub use self::standard::RandGenerator as RandomGenerator;

/// Seed used when the configuration does not provide one
pub const DEFAULT_SEED: u64 = 12345;
