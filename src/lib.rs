//! Diffractive dissociation phase space event generator
//!
//!
//! # Introduction (for the physicist)
//!
//! A beam particle hits a fixed target. The target recoils, and the exchange
//! produces a system X which decays into a fixed list of final state
//! particles: beam + target -> X + recoil, X -> daughters.
//!
//! Events are distributed according to phase space, with the X mass drawn
//! from a fixed value, a uniform range or a Gaussian, and the reduced
//! momentum transfer t' = |t| - |t|min drawn from a fixed value or from an
//! exponential whose slope may depend on the X mass.
//!
//!
//! # Introduction (for the numerical guy)
//!
//! Unweighted events are produced by rejection sampling: candidates are
//! weighed by the n-body phase space of the X decay and by the two-body phase
//! space of X + recoil production, and compared to an upper bound on that
//! weight which is estimated before the generation starts.
//!
//!
//! # Introduction (for the computer guy)
//!
//! * `config` loads the run parameters and turns them into `GeneratorSettings`
//! * `beam` provides primary vertices and beam 4-momenta
//! * `kinematics` solves beam + target -> X + recoil
//! * `phase_space` and `decay` sample the X decay
//! * `evgen` drives the rejection loop
//! * `scheduling` spreads event batches over threads reproducibly
//! * `output` writes the events and a run summary

#![warn(missing_docs)]

pub mod beam;
pub mod config;
pub mod decay;
pub mod error;
pub mod event;
pub mod evgen;
pub mod kinematics;
pub mod momentum;
pub mod numeric;
pub mod output;
pub mod phase_space;
pub mod random;
pub mod scheduling;
pub mod slope;

pub use crate::{
    error::{GeneratorError, Result},
    event::{EventBatch, GeneratedEvent, ParticleSpec},
    evgen::{EventGenerator, GeneratorSettings, KinematicRange, MassSampling, TPrimeSampling},
    random::RandomGenerator,
};
