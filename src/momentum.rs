//! This module implements some domain-specific 4-momentum handling logic.

use crate::numeric::{functions::sqr, reals::consts::PI, Float};
use nalgebra::{Rotation3, SVector, Vector3};

/// 4-momentum dimension
pub const MOMENTUM_DIM: usize = 4;

/// Relativistic 4-momentum (GeV/c for the spatial part, GeV for energy)
pub type Momentum = SVector<Float, MOMENTUM_DIM>;

/// Position of an interaction vertex (cm)
pub type Vertex = Vector3<Float>;

/// Convenience const for accessing the X coordinate of a 4-vector
pub const X: usize = 0;

/// Convenience const for accessing the Y coordinate of a 4-vector
pub const Y: usize = 1;

/// Convenience const for accessing the Z coordinate of a 4-vector
pub const Z: usize = 2;

/// Convenience const for accessing the E coordinate of a 4-vector
pub const E: usize = 3;

/// Build a 4-momentum from its spatial part and the particle mass
pub fn from_xyz_mass(p: &Vector3<Float>, mass: Float) -> Momentum {
    Momentum::new(p[X], p[Y], p[Z], (p.norm_squared() + sqr(mass)).sqrt())
}

/// Get a copy of the spatial part of a 4-momentum
pub fn xyz(p: &Momentum) -> Vector3<Float> {
    p.fixed_rows::<3>(X).into_owned()
}

/// Norm of the spatial part of a 4-momentum
pub fn momentum_norm(p: &Momentum) -> Float {
    p.fixed_rows::<3>(X).norm()
}

/// Invariant mass squared (may be slightly negative due to rounding)
pub fn mass2(p: &Momentum) -> Float {
    sqr(p[E]) - p.fixed_rows::<3>(X).norm_squared()
}

/// Invariant mass, with rounding-induced negative squares mapped to zero
pub fn mass(p: &Momentum) -> Float {
    mass2(p).max(0.).sqrt()
}

/// Velocity of the rest frame of a 4-momentum, in units of c
pub fn boost_vector(p: &Momentum) -> Vector3<Float> {
    xyz(p) / p[E]
}

/// Lorentz-boost a 4-momentum by velocity `beta`
pub fn boost(p: &Momentum, beta: &Vector3<Float>) -> Momentum {
    let beta2 = beta.norm_squared();
    if beta2 == 0. {
        return *p;
    }
    let gamma = 1. / (1. - beta2).sqrt();
    let p_xyz = xyz(p);
    let beta_p = beta.dot(&p_xyz);
    let gamma2 = (gamma - 1.) / beta2;
    let new_xyz = p_xyz + (gamma2 * beta_p + gamma * p[E]) * beta;
    Momentum::new(
        new_xyz[X],
        new_xyz[Y],
        new_xyz[Z],
        gamma * (p[E] + beta_p),
    )
}

/// Rotate a 4-momentum so that its former z axis points along `direction`
///
/// `direction` does not need to be normalized, but must not be null.
///
pub fn rotate_uz(p: &Momentum, direction: &Vector3<Float>) -> Momentum {
    let rotation = Rotation3::rotation_between(&Vector3::z(), direction)
        .unwrap_or_else(|| Rotation3::from_axis_angle(&Vector3::x_axis(), PI));
    let new_xyz = rotation * xyz(p);
    Momentum::new(new_xyz[X], new_xyz[Y], new_xyz[Z], p[E])
}
