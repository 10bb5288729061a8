//! Two-body production kinematics of beam + target -> X + recoil
//!
//! Conventions: `t` is the (negative) Mandelstam momentum transfer squared
//! between beam and X, `t0` its kinematic upper bound, and `t' = t0 - t` is
//! kept non-negative. The lab frame is the target rest frame.
//!
//! Every function here reports physically forbidden inputs (negative
//! radicands, cosines outside of [-1, 1]) as `None`. The caller is expected to
//! discard the current draw and sample again.

use crate::{
    momentum::{self, Momentum, E},
    numeric::{
        functions::{checked_sqrt, sqr},
        Float,
    },
    random::RandomGenerator,
};

use prefix_num_ops::real::*;

/// Rounding allowance on |cos(theta)| at the edges of the t range
const COS_THETA_TOLERANCE: Float = 1e-9;

/// Breakup momentum of a system of mass `m` decaying into `m_1` and `m_2`
pub fn breakup_momentum(m: Float, m_1: Float, m_2: Float) -> Option<Float> {
    if m < m_1 + m_2 {
        return None;
    }
    let m2 = sqr(m);
    let q2 = (m2 - sqr(m_1 + m_2)) * (m2 - sqr(m_1 - m_2)) / (4. * m2);
    checked_sqrt(q2)
}

/// Center-of-mass description of beam + target -> X + recoil for one X mass
#[derive(Clone, Copy, Debug)]
pub struct ProductionKinematics {
    /// Lab frame beam 4-momentum
    beam: Momentum,

    /// Target mass (the target is at rest in the lab)
    target_mass: Float,

    /// Recoil mass
    recoil_mass: Float,

    /// X mass
    x_mass: Float,

    /// Squared center-of-mass energy
    pub s: Float,

    /// Center-of-mass energy
    pub sqrt_s: Float,

    /// X energy in the center-of-mass frame
    pub x_energy_cm: Float,

    /// X momentum in the center-of-mass frame
    pub x_momentum_cm: Float,

    /// Beam energy in the center-of-mass frame
    pub beam_energy_cm: Float,

    /// Beam momentum in the center-of-mass frame
    pub beam_momentum_cm: Float,

    /// Kinematic upper bound of t (forward X production)
    pub t0: Float,
}
//
impl ProductionKinematics {
    /// Solve the center-of-mass breakup for a given X mass
    ///
    /// Returns None if X and the recoil do not fit within the available
    /// center-of-mass energy.
    ///
    pub fn new(
        beam: &Momentum,
        target_mass: Float,
        x_mass: Float,
        recoil_mass: Float,
    ) -> Option<Self> {
        let overall_cm = beam + target_rest_frame(target_mass);
        let s = momentum::mass2(&overall_cm);
        let sqrt_s = checked_sqrt(s)?;
        if x_mass + recoil_mass > sqrt_s {
            return None;
        }

        let x_mass2 = sqr(x_mass);
        let x_energy_cm = (s - sqr(recoil_mass) + x_mass2) / (2. * sqrt_s);
        let x_momentum_cm = checked_sqrt(sqr(x_energy_cm) - x_mass2)?;

        let beam_mass2 = momentum::mass2(beam);
        let beam_energy_cm = (s - sqr(target_mass) + beam_mass2) / (2. * sqrt_s);
        let beam_momentum_cm = checked_sqrt(sqr(beam_energy_cm) - beam_mass2)?;

        let t0 = sqr(x_energy_cm - beam_energy_cm) - sqr(x_momentum_cm - beam_momentum_cm);

        Some(Self {
            beam: *beam,
            target_mass,
            recoil_mass,
            x_mass,
            s,
            sqrt_s,
            x_energy_cm,
            x_momentum_cm,
            beam_energy_cm,
            beam_momentum_cm,
            t0,
        })
    }

    /// Turn t' into t, rejecting values beyond the kinematic threshold
    pub fn t_from_t_prime(&self, t_prime: Float) -> Option<Float> {
        let t = self.t0 - t_prime;
        if t > self.t0 {
            None
        } else {
            Some(t)
        }
    }

    /// Build the lab frame X and recoil 4-momenta for a given t
    ///
    /// The X direction is first built with respect to the beam axis, with a
    /// uniformly distributed azimuth, then rotated along the actual beam
    /// direction. The recoil follows from 4-momentum conservation.
    ///
    pub fn build_x_in_lab(
        &self,
        t: Float,
        rng: &mut RandomGenerator,
    ) -> Option<(Momentum, Momentum)> {
        let beam = &self.beam;
        let target = target_rest_frame(self.target_mass);
        let x_mass2 = sqr(self.x_mass);
        let beam_mass2 = momentum::mass2(beam);
        let beam_momentum = momentum::momentum_norm(beam);
        if beam_momentum <= 0. {
            return None;
        }

        // Reggeon = X - beam = target - recoil
        let reggeon_energy =
            (sqr(self.target_mass) - sqr(self.recoil_mass) + t) / (2. * self.target_mass);
        let x_energy = beam[E] + reggeon_energy;
        let x_momentum = checked_sqrt(sqr(x_energy) - x_mass2)?;
        if x_momentum <= 0. {
            return None;
        }
        let cos_theta = (t - x_mass2 - beam_mass2 + 2. * beam[E] * x_energy)
            / (2. * beam_momentum * x_momentum);
        if !(cos_theta.abs() <= 1. + COS_THETA_TOLERANCE) {
            return None;
        }
        let cos_theta = cos_theta.clamp(-1., 1.);
        let sin_theta = sqrt(1. - sqr(cos_theta));
        let pt = x_momentum * sin_theta;
        let phi = rng.azimuth();

        let x_wrt_beam = Momentum::new(
            pt * cos(phi),
            pt * sin(phi),
            x_momentum * cos_theta,
            x_energy,
        );
        let x_lab = momentum::rotate_uz(&x_wrt_beam, &momentum::xyz(beam));
        let recoil_lab = beam + target - x_lab;
        Some((x_lab, recoil_lab))
    }
}

/// 4-momentum of a target at rest
pub fn target_rest_frame(target_mass: Float) -> Momentum {
    Momentum::new(0., 0., 0., target_mass)
}

/// Compute t' from the incoming and outgoing 4-momenta at the beam vertex
///
/// Uses the small angle approximation t0 ≈ (m_out² - m_in²)² / (4 p_in²), so
/// this is only meant as a cross-check of the generated t'.
///
pub fn calc_t_prime(incoming: &Momentum, outgoing: &Momentum) -> Float {
    let t_min = sqr(momentum::mass2(outgoing) - momentum::mass2(incoming))
        / (4. * sqr(momentum::momentum_norm(incoming)));
    momentum::mass2(&(incoming - outgoing)).abs() - t_min.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::momentum::{mass, X, Y, Z};
    use nalgebra::Vector3;

    const PION_MASS: Float = 0.13957018;
    const PROTON_MASS: Float = 0.938272013;

    fn beam() -> Momentum {
        momentum::from_xyz_mass(&Vector3::new(0., 0., 191.29), PION_MASS)
    }

    #[test]
    fn breakup_momentum_values() {
        // Two pions from a 1 GeV system
        let q = breakup_momentum(1., PION_MASS, PION_MASS).unwrap();
        let expected = (0.25 - sqr(PION_MASS)).sqrt();
        assert!((q - expected).abs() < 1e-12);

        // Massless daughters carry half the mass each
        assert_eq!(breakup_momentum(3., 0., 0.), Some(1.5));

        // At and below threshold
        assert_eq!(breakup_momentum(2. * PION_MASS, PION_MASS, PION_MASS), Some(0.));
        assert_eq!(breakup_momentum(0.2, PION_MASS, PION_MASS), None);
    }

    #[test]
    fn threshold_t0_is_negative() {
        let kin = ProductionKinematics::new(&beam(), PROTON_MASS, 1.0, PROTON_MASS).unwrap();
        assert!(kin.t0 <= 0.);
        // Approximately -(m_X² - m_π²)² / (4 p²) at high energy
        let approx = -sqr(1. - sqr(PION_MASS)) / (4. * sqr(191.29));
        assert!((kin.t0 - approx).abs() < 1e-2 * approx.abs());
        assert!((kin.sqrt_s - kin.s.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn forbidden_masses_are_rejected() {
        let slow_beam = momentum::from_xyz_mass(&Vector3::new(0., 0., 1.), PION_MASS);
        assert!(ProductionKinematics::new(&slow_beam, PROTON_MASS, 5., PROTON_MASS).is_none());
    }

    #[test]
    fn t_window() {
        let kin = ProductionKinematics::new(&beam(), PROTON_MASS, 1.0, PROTON_MASS).unwrap();
        assert_eq!(kin.t_from_t_prime(0.), Some(kin.t0));
        assert_eq!(kin.t_from_t_prime(0.1), Some(kin.t0 - 0.1));
        assert_eq!(kin.t_from_t_prime(-0.1), None);
    }

    #[test]
    fn lab_frame_construction_conserves_momentum() {
        let mut rng = RandomGenerator::new(12);
        let tilted_beam =
            momentum::from_xyz_mass(&Vector3::new(0.02, -0.01, 190.), PION_MASS);
        let target = target_rest_frame(PROTON_MASS);
        let kin = ProductionKinematics::new(&tilted_beam, PROTON_MASS, 1.3, PROTON_MASS).unwrap();
        for &t_prime in &[0., 0.05, 0.3, 1.2] {
            let t = kin.t_from_t_prime(t_prime).unwrap();
            let (x_lab, recoil) = kin.build_x_in_lab(t, &mut rng).unwrap();
            let total_in = tilted_beam + target;
            let total_out = x_lab + recoil;
            for coord in [X, Y, Z, E] {
                assert!((total_in[coord] - total_out[coord]).abs() < 1e-9 * total_in[E]);
            }
            assert!((mass(&x_lab) - 1.3).abs() < 1e-6);
            assert!((mass(&recoil) - PROTON_MASS).abs() < 1e-6);
            // t is the 4-momentum transfer between beam and X
            let t_check = momentum::mass2(&(x_lab - tilted_beam));
            assert!((t_check - t).abs() < 1e-6, "{t_check} vs {t}");
        }
    }

    #[test]
    fn t_prime_cross_check() {
        let mut rng = RandomGenerator::new(3);
        let kin = ProductionKinematics::new(&beam(), PROTON_MASS, 1.0, PROTON_MASS).unwrap();
        let t = kin.t_from_t_prime(0.2).unwrap();
        let (x_lab, _) = kin.build_x_in_lab(t, &mut rng).unwrap();
        assert!((calc_t_prime(&beam(), &x_lab) - 0.2).abs() < 1e-3);
    }
}
