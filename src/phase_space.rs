//! n-body phase space generation for the decay of the X system
//!
//! The decay generator is hidden behind the `PhaseSpaceSampler` trait, so that
//! the event generator only relies on the "pick masses, weigh, pick angles,
//! build kinematics" contract. `NBodyPhaseSpace` implements it using the
//! Raubold-Lynch (GENBOD) method: the n-body decay is split into a chain of
//! two-body decays through n-2 intermediate masses.

use crate::{
    kinematics::breakup_momentum,
    momentum::{self, Momentum},
    numeric::{reals::consts::PI, Float},
    random::RandomGenerator,
};
use nalgebra::Vector3;
use prefix_num_ops::real::*;

/// Interface of an n-body phase space generator
pub trait PhaseSpaceSampler {
    /// Set the masses of the decay daughters
    fn set_decay(&mut self, masses: &[Float]);

    /// Masses of the decay daughters
    fn daughter_masses(&self) -> &[Float];

    /// Draw the intermediate masses of a decay of a system of given mass
    ///
    /// Returns the weight of the resulting configuration, or None if the
    /// daughters cannot be produced at this mass.
    ///
    fn pick_masses(&mut self, mass: Float, rng: &mut RandomGenerator) -> Option<Float>;

    /// Weight of the last configuration picked by `pick_masses()`
    fn weight(&self) -> Float;

    /// Draw the decay angles of the configuration picked by `pick_masses()`
    fn pick_angles(&mut self, rng: &mut RandomGenerator);

    /// Daughter 4-momenta in the frame where the parent has 4-momentum
    /// `parent`, for the configuration picked by the last calls to
    /// `pick_masses()` and `pick_angles()`
    fn event_kinematics(&self, parent: &Momentum) -> Vec<Momentum>;
}

/// Raubold-Lynch n-body phase space generator
#[derive(Clone, Debug, Default)]
pub struct NBodyPhaseSpace {
    /// Daughter masses
    masses: Vec<Float>,

    /// Sum of the daughter masses
    mass_sum: Float,

    /// 1/(n-2)!, volume factor of the ordered intermediate masses
    inv_factorial: Float,

    /// Effective masses of the subsystems made of the first k+1 daughters
    intermediate_masses: Vec<Float>,

    /// Breakup momentum of subsystem k+1 into subsystem k and daughter k+1
    breakup_momenta: Vec<Float>,

    /// Breakup directions in the rest frames of the subsystems
    directions: Vec<Vector3<Float>>,

    /// Current configuration weight
    weight: Float,
}
//
impl NBodyPhaseSpace {
    /// Set up a generator for the given daughter masses
    pub fn new(masses: &[Float]) -> Self {
        let mut result = Self::default();
        result.set_decay(masses);
        result
    }

    /// Number of daughters
    pub fn num_daughters(&self) -> usize {
        self.masses.len()
    }

    /// Draw an isotropically distributed unit vector
    fn random_direction(rng: &mut RandomGenerator) -> Vector3<Float> {
        let cos_theta = 2. * rng.random() - 1.;
        let sin_theta = sqrt((1. - cos_theta * cos_theta).max(0.));
        let phi = 2. * PI * rng.random();
        Vector3::new(sin_theta * cos(phi), sin_theta * sin(phi), cos_theta)
    }
}
//
impl PhaseSpaceSampler for NBodyPhaseSpace {
    fn set_decay(&mut self, masses: &[Float]) {
        let num_daughters = masses.len();
        self.masses = masses.to_vec();
        self.mass_sum = masses.iter().sum();
        self.inv_factorial = 1. / (1..num_daughters.saturating_sub(1))
            .map(|k| k as Float)
            .product::<Float>();
        self.intermediate_masses = vec![0.; num_daughters];
        self.breakup_momenta = vec![0.; num_daughters.saturating_sub(1)];
        self.directions = vec![Vector3::z(); num_daughters.saturating_sub(1)];
        self.weight = 0.;
    }

    fn daughter_masses(&self) -> &[Float] {
        &self.masses[..]
    }

    fn pick_masses(&mut self, mass: Float, rng: &mut RandomGenerator) -> Option<Float> {
        let num_daughters = self.num_daughters();
        assert!(num_daughters > 1, "Need at least two daughters to decay");
        self.weight = 0.;
        let available = mass - self.mass_sum;
        if !(available >= 0.) {
            return None;
        }

        // Kinetic energies of the subsystems are ordered uniform numbers
        let mut kinetic = (0..num_daughters - 2)
            .map(|_| rng.random() * available)
            .collect::<Vec<_>>();
        kinetic.sort_by(|a, b| a.total_cmp(b));

        let mut partial_sum = self.masses[0];
        self.intermediate_masses[0] = partial_sum;
        for k in 1..num_daughters - 1 {
            partial_sum += self.masses[k];
            self.intermediate_masses[k] = partial_sum + kinetic[k - 1];
        }
        self.intermediate_masses[num_daughters - 1] = mass;

        // Weight = volume of the ordered masses * product of breakup momenta / M
        let mut weight = available.powi(num_daughters as i32 - 2) * self.inv_factorial;
        for k in 0..num_daughters - 1 {
            let q = breakup_momentum(
                self.intermediate_masses[k + 1],
                self.intermediate_masses[k],
                self.masses[k + 1],
            )?;
            self.breakup_momenta[k] = q;
            weight *= q;
        }
        self.weight = weight / mass;
        Some(self.weight)
    }

    fn weight(&self) -> Float {
        self.weight
    }

    fn pick_angles(&mut self, rng: &mut RandomGenerator) {
        for direction in self.directions.iter_mut() {
            *direction = Self::random_direction(rng);
        }
    }

    fn event_kinematics(&self, parent: &Momentum) -> Vec<Momentum> {
        let num_daughters = self.num_daughters();
        let mut daughters = Vec::with_capacity(num_daughters);

        // First two-body decay, in the rest frame of the two first daughters
        let q = self.breakup_momenta[0];
        let dir = self.directions[0];
        daughters.push(momentum::from_xyz_mass(&(q * dir), self.masses[0]));
        daughters.push(momentum::from_xyz_mass(&(-q * dir), self.masses[1]));

        // Each further step boosts the subsystem built so far into the rest
        // frame of the next subsystem, and adds the next daughter recoiling
        // against it.
        for k in 1..num_daughters - 1 {
            let q = self.breakup_momenta[k];
            let dir = self.directions[k];
            let sub_mass = self.intermediate_masses[k];
            let beta = q * dir / sqrt(q * q + sub_mass * sub_mass);
            for daughter in daughters.iter_mut() {
                *daughter = momentum::boost(daughter, &beta);
            }
            daughters.push(momentum::from_xyz_mass(&(-q * dir), self.masses[k + 1]));
        }

        // Move from the parent rest frame to the requested frame
        let beta = momentum::boost_vector(parent);
        daughters
            .iter()
            .map(|daughter| momentum::boost(daughter, &beta))
            .collect()
    }
}
