//! Unweighted sampling of X decays on top of a phase space generator

use crate::{
    error::{GeneratorError, Result},
    momentum::{self, Momentum},
    numeric::Float,
    phase_space::{NBodyPhaseSpace, PhaseSpaceSampler},
    random::RandomGenerator,
};
use log::info;

/// Safety factor applied to the estimated maximum weight, which is bound to
/// undershoot the true maximum a little
pub const MAX_WEIGHT_SAFETY_FACTOR: Float = 1.01;

/// Number of trials used to estimate the maximum weight by default
pub const DEFAULT_MAX_WEIGHT_TRIALS: usize = 1_000_000;

/// A sampled decay configuration
#[derive(Clone, Debug)]
pub struct DecayCandidate {
    /// Weight relative to the maximum weight
    pub weight: Float,

    /// Daughter 4-momenta, in the frame of the parent 4-momentum
    pub daughters: Vec<Momentum>,
}

/// Decay of the X system into a fixed list of daughters
///
/// The maximum weight is established once for a given daughter list, and
/// is only read afterwards, so clones of a configured `DecayPhaseSpace` can be
/// handed to independent generation tasks.
///
#[derive(Clone, Debug)]
pub struct DecayPhaseSpace<S: PhaseSpaceSampler = NBodyPhaseSpace> {
    /// Underlying phase space generator
    sampler: S,

    /// Daughter masses
    masses: Vec<Float>,

    /// Cached maximum weight (None until estimated)
    max_weight: Option<Float>,
}
//
impl DecayPhaseSpace<NBodyPhaseSpace> {
    /// Set up the decay using the default n-body generator
    pub fn new(masses: &[Float]) -> Self {
        Self::with_sampler(NBodyPhaseSpace::default(), masses)
    }
}
//
impl<S: PhaseSpaceSampler> DecayPhaseSpace<S> {
    /// Set up the decay on top of a custom phase space generator
    pub fn with_sampler(sampler: S, masses: &[Float]) -> Self {
        let mut result = Self {
            sampler,
            masses: Vec::new(),
            max_weight: None,
        };
        result.configure(masses);
        result
    }

    /// Change the daughter list, invalidating the maximum weight
    pub fn configure(&mut self, masses: &[Float]) {
        self.masses = masses.to_vec();
        self.max_weight = None;
        if masses.len() > 1 {
            self.sampler.set_decay(masses);
        }
    }

    /// Number of decay daughters
    pub fn num_daughters(&self) -> usize {
        self.masses.len()
    }

    /// Sum of the daughter masses
    pub fn threshold(&self) -> Float {
        self.masses.iter().sum()
    }

    /// Truth that the decay has angular degrees of freedom to be sampled
    pub fn needs_max_weight(&self) -> bool {
        self.num_daughters() > 1
    }

    /// Estimate the maximum weight from many trials at a reference mass
    ///
    /// The reference mass should be the largest mass that will be generated.
    /// The estimate is scaled by `MAX_WEIGHT_SAFETY_FACTOR` and cached.
    ///
    pub fn estimate_max_weight(
        &mut self,
        reference_mass: Float,
        num_trials: usize,
        rng: &mut RandomGenerator,
    ) -> Result<Float> {
        if !self.needs_max_weight() {
            self.max_weight = Some(1.);
            return Ok(1.);
        }
        info!(
            "Calculating max weight ({} FS particles) for m = {} GeV/c^2",
            self.num_daughters(),
            reference_mass
        );
        let max_weight = (0..num_trials.max(1))
            .filter_map(|_| self.sampler.pick_masses(reference_mass, rng))
            .fold(0., Float::max)
            * MAX_WEIGHT_SAFETY_FACTOR;
        if !(max_weight > 0.) {
            return Err(GeneratorError::NonPositiveMaxWeight(max_weight));
        }
        info!("    max weight = {}", max_weight);
        self.max_weight = Some(max_weight);
        Ok(max_weight)
    }

    /// Cached maximum weight
    pub fn max_weight(&self) -> Option<Float> {
        self.max_weight
    }

    /// Pick a mass configuration and return its weight relative to the
    /// maximum weight (None if the mass is below the decay threshold)
    ///
    /// # Panics
    ///
    /// If the maximum weight has not been estimated yet.
    ///
    pub fn pick_weight(&mut self, mass: Float, rng: &mut RandomGenerator) -> Option<Float> {
        if !self.needs_max_weight() {
            return Some(1.);
        }
        let max_weight = self
            .max_weight
            .expect("The maximum weight must be estimated before sampling");
        self.sampler
            .pick_masses(mass, rng)
            .map(|weight| weight / max_weight)
    }

    /// Pick the decay angles of the current configuration and compute the
    /// daughter 4-momenta in the frame of `parent`
    pub fn materialize(&mut self, parent: &Momentum, rng: &mut RandomGenerator) -> Vec<Momentum> {
        if !self.needs_max_weight() {
            return vec![*parent; self.num_daughters()];
        }
        self.sampler.pick_angles(rng);
        self.sampler.event_kinematics(parent)
    }

    /// Sample a full decay candidate of a parent 4-momentum
    pub fn draw_candidate(
        &mut self,
        parent: &Momentum,
        rng: &mut RandomGenerator,
    ) -> Option<DecayCandidate> {
        let weight = self.pick_weight(momentum::mass(parent), rng)?;
        let daughters = self.materialize(parent, rng);
        Some(DecayCandidate { weight, daughters })
    }
}
