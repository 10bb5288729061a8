//! Basic numerical concepts used throughout the program

#![allow(missing_docs)]

// Kinematic closure checks need double precision, so unlike other Monte Carlo
// codes we do not offer a single precision build.
pub type Float = f64;
pub use std::f64 as reals;

/// Mathematical functions
pub mod functions {
    use super::Float;

    /// Square root which reports negative radicands instead of returning NaN
    ///
    /// Physically forbidden configurations show up as negative radicands in
    /// the kinematic formulas, and we want to reject those draws.
    ///
    pub fn checked_sqrt(x: Float) -> Option<Float> {
        if x >= 0. {
            Some(x.sqrt())
        } else {
            None
        }
    }

    /// Square of a number
    pub fn sqr(x: Float) -> Float {
        x * x
    }
}
