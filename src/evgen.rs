//! This module provides event generation facilities
//!
//! Events are generated by rejection sampling. For each event, a primary
//! vertex and a beam are drawn, then (X mass, t') candidates are drawn until
//! one of them is kinematically allowed, passes the cuts, and survives the
//! comparison of its phase space weight with the maximum weight.
//!
//! The candidate loop is unbounded: `generate()` only returns once an event
//! has been accepted. Callers which need a bound on the running time should
//! use `try_generate()`, and may use the attempt counts of the generated
//! events to monitor the acceptance.

use crate::{
    beam::{Target, VertexBeamProvider},
    decay::{DecayPhaseSpace, DEFAULT_MAX_WEIGHT_TRIALS},
    error::{GeneratorError, Result},
    event::{EventBatch, GeneratedEvent, ParticleSpec},
    kinematics::{breakup_momentum, target_rest_frame, ProductionKinematics},
    momentum,
    numeric::Float,
    random::RandomGenerator,
    scheduling::EVENT_BATCH_SIZE,
    slope::{inv_slope_at, SlopeTable},
};
use log::{trace, warn};
use thiserror::Error;

/// Gaussian mass distributions are truncated at this many sigmas
pub const GAUSSIAN_MASS_SIGMAS: Float = 5.;

/// Relative tolerance on the X mass of single-daughter decays
const SINGLE_DAUGHTER_MASS_TOLERANCE: Float = 1e-9;

/// Distribution of the X mass
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MassSampling {
    /// Always the same mass
    Fixed(Float),

    /// Uniformly distributed mass
    UniformInRange {
        /// Lower bound (GeV/c^2)
        min: Float,
        /// Upper bound (GeV/c^2)
        max: Float,
    },

    /// Gaussian mass distribution, truncated at `GAUSSIAN_MASS_SIGMAS`
    GaussianAroundCenter {
        /// Mean mass (GeV/c^2)
        center: Float,
        /// Standard deviation (GeV/c^2)
        sigma: Float,
    },
}
//
impl MassSampling {
    /// Check that the mass distribution makes sense
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(GeneratorError::InvalidMassWindow(msg));
        match *self {
            Self::Fixed(mass) if !(mass.is_finite() && mass > 0.) => {
                invalid(format!("fixed mass {mass} must be positive"))
            }
            Self::UniformInRange { min, max }
                if !(min.is_finite() && max.is_finite() && min >= 0. && max > 0.) =>
            {
                invalid(format!("bounds [{min}, {max}] must be non-negative"))
            }
            Self::UniformInRange { min, max } if min > max => invalid(format!(
                "lower bound {min} is above upper bound {max}, please select the \
                 Gaussian mode explicitly if that is what you meant"
            )),
            Self::GaussianAroundCenter { center, sigma }
                if !(center.is_finite() && sigma.is_finite() && center > 0. && sigma >= 0.) =>
            {
                invalid(format!(
                    "center {center} must be positive and sigma {sigma} non-negative"
                ))
            }
            _ => Ok(()),
        }
    }

    /// Largest mass that can be generated
    pub fn upper_edge(&self) -> Float {
        match *self {
            Self::Fixed(mass) => mass,
            Self::UniformInRange { max, .. } => max,
            Self::GaussianAroundCenter { center, sigma } => center + GAUSSIAN_MASS_SIGMAS * sigma,
        }
    }

    /// Smallest mass that can be generated
    pub fn lower_edge(&self) -> Float {
        match *self {
            Self::Fixed(mass) => mass,
            Self::UniformInRange { min, .. } => min,
            Self::GaussianAroundCenter { center, sigma } => {
                (center - GAUSSIAN_MASS_SIGMAS * sigma).max(0.)
            }
        }
    }

    /// Draw a mass (None if a Gaussian draw falls outside of the window)
    pub fn sample(&self, rng: &mut RandomGenerator) -> Option<Float> {
        match *self {
            Self::Fixed(mass) => Some(mass),
            Self::UniformInRange { min, max } => Some(rng.uniform(min, max)),
            Self::GaussianAroundCenter { center, sigma } => {
                let mass = rng.gaussian(center, sigma);
                (mass > 0. && mass >= self.lower_edge() && mass <= self.upper_edge())
                    .then_some(mass)
            }
        }
    }
}

/// Distribution of t' (before cuts)
#[derive(Clone, Debug, PartialEq)]
pub enum TPrimeSampling {
    /// Always the same t'
    Fixed(Float),

    /// Exponential distribution, whose inverse slope depends on the X mass
    /// (1 (GeV/c)^2 if no table is given)
    Exponential {
        /// Inverse slope versus X mass
        slopes: Option<SlopeTable>,
    },
}
//
impl TPrimeSampling {
    /// Draw a t' value for a given X mass
    ///
    /// Returns None if the slope table extrapolates to a non-positive inverse
    /// slope at this mass, where there is no t' distribution to draw from.
    ///
    pub fn sample(&self, x_mass: Float, rng: &mut RandomGenerator) -> Option<Float> {
        match self {
            Self::Fixed(t_prime) => Some(*t_prime),
            Self::Exponential { slopes } => rng.exponential(inv_slope_at(slopes.as_ref(), x_mass)),
        }
    }
}

/// Kinematic range of generated events
#[derive(Clone, Debug, PartialEq)]
pub struct KinematicRange {
    /// X mass distribution
    pub mass: MassSampling,

    /// t' distribution
    pub t_prime: TPrimeSampling,

    /// Minimal accepted t' ((GeV/c)^2)
    pub t_prime_min: Float,

    /// Maximal accepted t' ((GeV/c)^2)
    pub t_prime_max: Float,

    /// Minimal accepted |t| ((GeV/c)^2)
    pub t_min: Float,
}
//
impl KinematicRange {
    /// Range where t' and |t| are not cut on
    pub fn uncut(mass: MassSampling, t_prime: TPrimeSampling) -> Self {
        Self {
            mass,
            t_prime,
            t_prime_min: 0.,
            t_prime_max: Float::INFINITY,
            t_min: 0.,
        }
    }

    /// Check that the range makes sense
    pub fn validate(&self) -> Result<()> {
        self.mass.validate()?;
        let invalid = |msg: String| Err(GeneratorError::InvalidTWindow(msg));
        if let TPrimeSampling::Fixed(t_prime) = self.t_prime {
            if !(t_prime.is_finite() && t_prime >= 0.) {
                return invalid(format!("fixed t' {t_prime} must be non-negative"));
            }
        }
        if !(self.t_prime_min >= 0. && self.t_prime_max >= self.t_prime_min) {
            return invalid(format!(
                "t' window [{}, {}] is empty or negative",
                self.t_prime_min, self.t_prime_max
            ));
        }
        if !(self.t_min >= 0.) {
            return invalid(format!("|t| cut {} must be non-negative", self.t_min));
        }
        Ok(())
    }

    /// Truth that a candidate passes the t' and |t| cuts
    pub fn passes_cuts(&self, t: Float, t_prime: Float) -> bool {
        t_prime >= self.t_prime_min && t_prime <= self.t_prime_max && t.abs() >= self.t_min
    }
}

/// Everything needed to set up an event generator
#[derive(Clone, Debug)]
pub struct GeneratorSettings {
    /// Decay daughters of X
    pub daughters: Vec<ParticleSpec>,

    /// Fixed target
    pub target: Target,

    /// Source of primary vertices and beams
    pub beam: VertexBeamProvider,

    /// Kinematic range of X
    pub range: KinematicRange,

    /// Number of trials used to estimate the maximum phase space weight
    pub max_weight_trials: usize,
}
//
impl GeneratorSettings {
    /// Gather settings, with the default number of maximum weight trials
    pub fn new(
        daughters: Vec<ParticleSpec>,
        target: Target,
        beam: VertexBeamProvider,
        range: KinematicRange,
    ) -> Self {
        Self {
            daughters,
            target,
            beam,
            range,
            max_weight_trials: DEFAULT_MAX_WEIGHT_TRIALS,
        }
    }
}

/// Error returned when `try_generate()` runs out of candidates
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("no event accepted after {candidates} candidates ({attempts} phase space attempts)")]
pub struct GenerationStalled {
    /// Phase space sampling attempts
    pub attempts: u64,

    /// (X mass, t') candidates
    pub candidates: u64,
}

/// Generator of beam + target -> (X -> daughters) + recoil events
#[derive(Clone, Debug)]
pub struct EventGenerator {
    /// Decay daughters of X
    daughters: Vec<ParticleSpec>,

    /// Fixed target
    target: Target,

    /// Source of primary vertices and beams
    beam: VertexBeamProvider,

    /// Kinematic range of X
    range: KinematicRange,

    /// X decay phase space, with its maximum weight
    decay: DecayPhaseSpace,

    /// Lowest X mass that can be both generated and decayed
    lowest_mass: Float,

    /// Mass at which the maximum phase space weight was estimated
    reference_mass: Float,
}
//
impl EventGenerator {
    // ### CONSTRUCTION ###

    /// Check the settings and prepare event generation
    ///
    /// This is where the maximum phase space weight is estimated, which may
    /// take a while for decays into many particles.
    ///
    pub fn new(settings: GeneratorSettings, rng: &mut RandomGenerator) -> Result<Self> {
        let GeneratorSettings {
            daughters,
            target,
            beam,
            range,
            max_weight_trials,
        } = settings;

        // Check the decay
        if daughters.is_empty() {
            return Err(GeneratorError::NoDaughters);
        }
        if let Some((index, spec)) = daughters
            .iter()
            .enumerate()
            .find(|(_, spec)| !(spec.mass.is_finite() && spec.mass >= 0.))
        {
            return Err(GeneratorError::InvalidDaughterMass {
                index,
                mass: spec.mass,
            });
        }

        // Check the kinematic range
        range.validate()?;
        if let [single] = &daughters[..] {
            let matches_daughter = match range.mass {
                MassSampling::Fixed(mass) => {
                    (mass - single.mass).abs() <= SINGLE_DAUGHTER_MASS_TOLERANCE * mass.max(1.)
                }
                _ => false,
            };
            if !matches_daughter {
                return Err(GeneratorError::SingleDaughterMass {
                    daughter_mass: single.mass,
                    mass: range.mass,
                });
            }
        }
        if !(target.mass > 0. && target.recoil_mass >= 0. && target.length >= 0.) {
            return Err(GeneratorError::InvalidBeam(format!(
                "unphysical target {target:?}"
            )));
        }
        let masses = daughters.iter().map(|spec| spec.mass).collect::<Vec<_>>();
        let mut decay = DecayPhaseSpace::new(&masses);
        let reference_mass = range.mass.upper_edge();
        if decay.threshold() > reference_mass {
            return Err(GeneratorError::BelowDecayThreshold {
                threshold: decay.threshold(),
                mass: reference_mass,
            });
        }
        let lowest_mass = range.mass.lower_edge().max(decay.threshold());

        // Check that the nominal beam can produce the heaviest X
        let nominal_beam = beam.nominal_beam();
        let sqrt_s = momentum::mass(&(nominal_beam + target_rest_frame(target.mass)));
        if reference_mass + target.recoil_mass > sqrt_s {
            return Err(GeneratorError::MassOutOfRange {
                mass: reference_mass,
                limit: sqrt_s - target.recoil_mass,
            });
        }

        // Establish the maximum weight
        decay.estimate_max_weight(reference_mass, max_weight_trials, rng)?;

        Ok(Self {
            daughters,
            target,
            beam,
            range,
            decay,
            lowest_mass,
            reference_mass,
        })
    }

    // ### EVENT GENERATION ###

    /// Generate one event
    ///
    /// The underlying rejection loop has no upper bound on its number of
    /// iterations, see `try_generate()` for a bounded version.
    ///
    pub fn generate(&mut self, rng: &mut RandomGenerator) -> GeneratedEvent {
        loop {
            if let Ok(event) = self.try_generate(rng, u64::MAX) {
                return event;
            }
        }
    }

    /// Generate one event, giving up after `max_candidates` (X mass, t')
    /// candidates have been drawn
    pub fn try_generate(
        &mut self,
        rng: &mut RandomGenerator,
        max_candidates: u64,
    ) -> std::result::Result<GeneratedEvent, GenerationStalled> {
        let mut attempts = 0;
        let mut candidates = 0;
        let recoil_mass = self.target.recoil_mass;
        let target = target_rest_frame(self.target.mass);

        loop {
            // Get a primary vertex and a beam
            let (vertex, beam) = self.beam.sample(&self.target, rng);
            let sqrt_s = momentum::mass(&(beam + target));
            let Some(envelope_breakup) = breakup_momentum(sqrt_s, self.lowest_mass, recoil_mass)
            else {
                // This beam cannot produce any X, draw another one
                candidates += 1;
                if candidates >= max_candidates {
                    return Err(GenerationStalled {
                        attempts,
                        candidates,
                    });
                }
                continue;
            };

            loop {
                if candidates >= max_candidates {
                    return Err(GenerationStalled {
                        attempts,
                        candidates,
                    });
                }
                candidates += 1;

                // Draw the X mass and t'
                let Some(x_mass) = self.range.mass.sample(rng) else {
                    continue;
                };
                let Some(t_prime) = self.range.t_prime.sample(x_mass, rng) else {
                    continue;
                };

                // Check the kinematics and cuts
                let Some(kinematics) =
                    ProductionKinematics::new(&beam, self.target.mass, x_mass, recoil_mass)
                else {
                    continue;
                };
                let Some(t) = kinematics.t_from_t_prime(t_prime) else {
                    continue;
                };
                if !self.range.passes_cuts(t, t_prime) {
                    continue;
                }

                // Build the X system and the recoil in the lab
                let Some((x_system, recoil)) = kinematics.build_x_in_lab(t, rng) else {
                    continue;
                };

                // Weigh the X decay phase space, including the two-body phase
                // space of X + recoil production, against the maximum weight
                attempts += 1;
                let Some(ps_weight) = self.decay.pick_weight(x_mass, rng) else {
                    continue;
                };
                let Some(breakup) = breakup_momentum(kinematics.sqrt_s, x_mass, recoil_mass)
                else {
                    continue;
                };
                let weight_ratio =
                    ps_weight * (x_mass / self.reference_mass) * (breakup / envelope_breakup);
                if weight_ratio > 1. {
                    warn!(
                        "Phase space weight ratio {weight_ratio} exceeds 1 at m = {x_mass} \
                         GeV/c^2, the maximum weight is underestimated"
                    );
                }
                if weight_ratio < rng.random() {
                    continue;
                }

                // The event is accepted, compute the daughter momenta
                let daughters = self.decay.materialize(&x_system, rng);
                trace!(
                    "Accepted event with m = {x_mass}, t' = {t_prime} after {attempts} \
                     attempts ({candidates} candidates)"
                );
                return Ok(GeneratedEvent {
                    vertex,
                    beam,
                    target,
                    recoil,
                    x_system,
                    daughters,
                    x_mass,
                    t,
                    t_prime,
                    attempts,
                    candidates,
                });
            }
        }
    }

    /// Generate the `batch_id`-th batch of a run, using a copy of this
    /// generator
    ///
    /// Batch N starts reading measured beams N * EVENT_BATCH_SIZE
    /// observations after the starting position of this generator. Most
    /// events read a single observation, so the batches of a run read
    /// consecutive stretches of the beam file, whichever order they are
    /// generated in.
    ///
    pub fn generate_batch(
        &self,
        batch_id: usize,
        num_events: usize,
        rng: &mut RandomGenerator,
    ) -> EventBatch {
        let mut evgen = self.clone();
        evgen.beam.advance_cursor(batch_id * EVENT_BATCH_SIZE);
        let mut batch = EventBatch::new();
        for _ in 0..num_events {
            batch.push(evgen.generate(rng));
        }
        batch
    }

    // ### GENERATOR PROPERTIES ###

    /// Decay daughters of X
    pub fn daughters(&self) -> &[ParticleSpec] {
        &self.daughters[..]
    }

    /// Fixed target
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Kinematic range of X
    pub fn range(&self) -> &KinematicRange {
        &self.range
    }

    /// Maximum phase space weight
    pub fn max_weight(&self) -> Float {
        self.decay.max_weight().unwrap_or(1.)
    }

    /// Source of primary vertices and beams
    pub fn beam_provider_mut(&mut self) -> &mut VertexBeamProvider {
        &mut self.beam
    }
}
