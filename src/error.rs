//! Errors that prevent the event generator from starting

use crate::{evgen::MassSampling, numeric::Float};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, detected before any event is generated
///
/// Kinematically forbidden draws are not errors: they are silently discarded
/// by the generation loop.
///
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The decay has no daughters
    #[error("at least one decay daughter must be configured")]
    NoDaughters,

    /// A daughter mass is negative or not finite
    #[error("daughter #{index} has invalid mass {mass} GeV/c^2")]
    InvalidDaughterMass {
        /// Position of the daughter in the decay list
        index: usize,

        /// Offending mass
        mass: Float,
    },

    /// A lone daughter is X itself, so X must have the daughter's mass
    #[error(
        "a single daughter of mass {daughter_mass} GeV/c^2 requires a fixed X mass \
         equal to it, not {mass:?}"
    )]
    SingleDaughterMass {
        /// Mass of the only daughter
        daughter_mass: Float,

        /// Configured X mass distribution
        mass: MassSampling,
    },

    /// The X mass distribution makes no sense
    #[error("invalid mass window: {0}")]
    InvalidMassWindow(String),

    /// The t' distribution or cuts make no sense
    #[error("invalid momentum transfer window: {0}")]
    InvalidTWindow(String),

    /// The slope table cannot be interpolated
    #[error("invalid slope table: {0}")]
    InvalidSlopeTable(String),

    /// Unphysical target or beam parameters
    #[error("invalid target or beam: {0}")]
    InvalidBeam(String),

    /// The nominal beam cannot produce the heaviest X
    #[error(
        "maximum X mass {mass} GeV/c^2 is out of kinematic range \
         (limit = {limit} GeV/c^2)"
    )]
    MassOutOfRange {
        /// Largest X mass to be generated
        mass: Float,

        /// Largest X mass the nominal beam can produce
        limit: Float,
    },

    /// The daughters are heavier than the heaviest X
    #[error(
        "daughter masses sum up to {threshold} GeV/c^2, above the largest \
         X mass {mass} GeV/c^2"
    )]
    BelowDecayThreshold {
        /// Sum of the daughter masses
        threshold: Float,

        /// Largest X mass to be generated
        mass: Float,
    },

    /// No decay configuration had a positive weight
    #[error("maximum phase space weight {0} is not positive")]
    NonPositiveMaxWeight(Float),

    /// The beam file could not be read
    #[error("could not read beam file {path:?}")]
    BeamFileIo {
        /// Beam file location
        path: PathBuf,

        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The beam file contains something else than observations
    #[error("malformed line {line} in beam file {path:?}: {reason}")]
    BeamFileFormat {
        /// Beam file location
        path: PathBuf,

        /// Line number (starting at 1)
        line: usize,

        /// What is wrong with the line
        reason: String,
    },
}

/// Result type of generator setup operations
pub type Result<T> = std::result::Result<T, GeneratorError>;
