//! Primary vertex and incoming beam generation
//!
//! Two beam models are supported: an analytic model where the beam momentum
//! and its inclinations are independent Gaussians, and a measured model which
//! replays a sample of observed (vertex, beam) pairs. The measured model may
//! contain observations without usable beam information (typically at the
//! edges of the target), which are skipped, falling back to the analytic model
//! if too many of them are encountered in a row.

use crate::{
    error::{GeneratorError, Result},
    momentum::{Momentum, Vertex},
    numeric::{functions::sqr, Float},
    random::RandomGenerator,
};
use log::{debug, warn};
use prefix_num_ops::real::*;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};

/// Number of measured observations that may be tried before falling back to
/// the analytic beam model
pub const MAX_BEAM_ATTEMPTS: usize = 1000;

/// Mean and spread of a Gaussian-distributed quantity
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Gaussian {
    /// Mean value
    pub mean: Float,

    /// Standard deviation (0 means no spread)
    pub sigma: Float,
}
//
impl Gaussian {
    /// Describe a Gaussian distribution
    pub fn new(mean: Float, sigma: Float) -> Self {
        Self { mean, sigma }
    }

    /// Draw a value from this distribution
    pub fn sample(&self, rng: &mut RandomGenerator) -> Float {
        rng.gaussian(self.mean, self.sigma)
    }
}

/// Fixed target, at rest in the lab frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    /// Longitudinal position of the target center (cm)
    pub z_position: Float,

    /// Longitudinal extent of the target (cm)
    pub length: Float,

    /// Target particle mass (GeV/c^2)
    pub mass: Float,

    /// Recoil particle mass (GeV/c^2)
    pub recoil_mass: Float,
}
//
impl Target {
    /// Draw a vertex position along the target
    pub fn sample_z(&self, rng: &mut RandomGenerator) -> Float {
        self.z_position + rng.uniform(-0.5 * self.length, 0.5 * self.length)
    }
}

/// Analytic beam model
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianBeam {
    /// Mass of the beam particle (GeV/c^2)
    pub particle_mass: Float,

    /// Beam momentum magnitude (GeV/c)
    pub momentum: Gaussian,

    /// Horizontal beam inclination dx/dz
    pub dxdz: Gaussian,

    /// Vertical beam inclination dy/dz
    pub dydz: Gaussian,
}
//
impl GaussianBeam {
    /// Draw a beam 4-momentum
    pub fn sample_beam(&self, rng: &mut RandomGenerator) -> Momentum {
        let p_beam = self.momentum.sample(rng);
        let dxdz = self.dxdz.sample(rng);
        let dydz = self.dydz.sample(rng);
        beam_from_slopes(p_beam, dxdz, dydz, self.particle_mass)
    }

    /// Draw a vertex on the nominal beam axis, and a beam 4-momentum
    pub fn sample(&self, target: &Target, rng: &mut RandomGenerator) -> (Vertex, Momentum) {
        let vertex = Vertex::new(0., 0., target.sample_z(rng));
        (vertex, self.sample_beam(rng))
    }
}

/// Build a beam 4-momentum from its magnitude and inclinations
fn beam_from_slopes(p_beam: Float, dxdz: Float, dydz: Float, mass: Float) -> Momentum {
    let pz = p_beam / sqrt(1. + sqr(dxdz) + sqr(dydz));
    Momentum::new(
        dxdz * pz,
        dydz * pz,
        pz,
        sqrt(sqr(p_beam) + sqr(mass)),
    )
}

/// One measured (vertex, beam) observation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeamObservation {
    /// Measured vertex position (cm)
    pub vertex: Vertex,

    /// Beam momentum magnitude (GeV/c)
    pub momentum: Float,

    /// Horizontal beam inclination dx/dz
    pub dxdz: Float,

    /// Vertical beam inclination dy/dz
    pub dydz: Float,

    /// Resolution on (x, y, momentum, dx/dz, dy/dz), if known
    pub sigmas: Option<[Float; 5]>,
}
//
impl BeamObservation {
    /// Truth that this observation carries a usable beam direction
    pub fn has_direction(&self) -> bool {
        self.momentum.is_finite()
            && self.momentum > 0.
            && self.dxdz.is_finite()
            && self.dydz.is_finite()
    }
}

/// Measured beam model
#[derive(Clone, Debug)]
pub struct MeasuredBeam {
    /// Measured observations, shared between clones
    observations: Arc<[BeamObservation]>,

    /// Mass of the beam particle (GeV/c^2)
    particle_mass: Float,

    /// Read observations in order instead of randomly
    sequential: bool,

    /// Next observation to be read in sequential mode
    cursor: usize,

    /// Scaling factor applied to the observation resolutions when smearing
    sigma_scaling: Float,
}
//
impl MeasuredBeam {
    /// Build a measured beam model from observations
    pub fn new(observations: Vec<BeamObservation>, particle_mass: Float) -> Result<Self> {
        if observations.is_empty() {
            return Err(GeneratorError::InvalidBeam(
                "measured beam model has no observation".to_owned(),
            ));
        }
        Ok(Self {
            observations: observations.into(),
            particle_mass,
            sequential: false,
            cursor: 0,
            sigma_scaling: 0.,
        })
    }

    /// Load observations from a text file
    ///
    /// Each non-empty line which does not start with '#' holds the columns
    /// `x y z p dx/dz dy/dz`, optionally followed by the resolutions
    /// `sigma_x sigma_y sigma_p sigma_dx/dz sigma_dy/dz`.
    ///
    pub fn load(path: impl AsRef<Path>, particle_mass: Float) -> Result<Self> {
        let path = path.as_ref();
        let io_error = |source| GeneratorError::BeamFileIo {
            path: path.to_owned(),
            source,
        };
        let reader = BufReader::new(File::open(path).map_err(io_error)?);
        let mut observations = Vec::new();
        for (line_idx, line) in reader.lines().enumerate() {
            let line = line.map_err(io_error)?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let format_error = |reason: String| GeneratorError::BeamFileFormat {
                path: path.to_owned(),
                line: line_idx + 1,
                reason,
            };
            let columns = line
                .split_whitespace()
                .map(|column| {
                    column
                        .parse::<Float>()
                        .map_err(|e| format_error(format!("{column:?}: {e}")))
                })
                .collect::<Result<Vec<_>>>()?;
            let sigmas = match columns.len() {
                6 => None,
                11 => Some([columns[6], columns[7], columns[8], columns[9], columns[10]]),
                n => return Err(format_error(format!("expected 6 or 11 columns, got {n}"))),
            };
            observations.push(BeamObservation {
                vertex: Vertex::new(columns[0], columns[1], columns[2]),
                momentum: columns[3],
                dxdz: columns[4],
                dydz: columns[5],
                sigmas,
            });
        }
        debug!("Loaded {} beam observations from {:?}", observations.len(), path);
        Self::new(observations, particle_mass)
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Truth that there are no observations (never true once constructed)
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Read observations sequentially (true) or randomly (false)
    pub fn set_sequential_read_mode(&mut self, sequential: bool) {
        self.sequential = sequential;
    }

    /// Smear observations by their resolution, times this factor
    pub fn set_sigma_scaling(&mut self, scaling: Float) {
        self.sigma_scaling = scaling;
    }

    /// Start sequential reading at a random observation
    pub fn randomize_start_offset(&mut self, rng: &mut RandomGenerator) {
        self.cursor = rng.index(self.len());
    }

    /// Move the sequential reading position `count` observations forward
    pub fn advance_cursor(&mut self, count: usize) {
        self.cursor = (self.cursor + count % self.len()) % self.len();
    }

    /// Pick the next observation
    fn next_observation(&mut self, rng: &mut RandomGenerator) -> BeamObservation {
        let index = if self.sequential {
            let index = self.cursor % self.len();
            self.cursor = (index + 1) % self.len();
            index
        } else {
            rng.index(self.len())
        };
        self.observations[index]
    }

    /// Try to draw a vertex and beam, giving up after `MAX_BEAM_ATTEMPTS`
    /// observations without usable beam information
    pub fn sample(&mut self, rng: &mut RandomGenerator) -> Option<(Vertex, Momentum)> {
        for _ in 0..MAX_BEAM_ATTEMPTS {
            let obs = self.next_observation(rng);
            if !obs.has_direction() {
                continue;
            }
            let (mut vertex, mut p_beam, mut dxdz, mut dydz) =
                (obs.vertex, obs.momentum, obs.dxdz, obs.dydz);
            if let (Some(sigmas), true) = (obs.sigmas, self.sigma_scaling > 0.) {
                let scale = self.sigma_scaling;
                vertex.x = rng.gaussian(vertex.x, scale * sigmas[0]);
                vertex.y = rng.gaussian(vertex.y, scale * sigmas[1]);
                p_beam = rng.gaussian(p_beam, scale * sigmas[2]);
                dxdz = rng.gaussian(dxdz, scale * sigmas[3]);
                dydz = rng.gaussian(dydz, scale * sigmas[4]);
                if !(p_beam > 0.) {
                    // Smeared into an unphysical beam, treat as a hole
                    continue;
                }
            }
            return Some((vertex, beam_from_slopes(p_beam, dxdz, dydz, self.particle_mass)));
        }
        None
    }
}

/// Source of primary vertices and beam 4-momenta
#[derive(Clone, Debug)]
pub enum VertexBeamProvider {
    /// Analytic Gaussian beam
    Analytic(GaussianBeam),

    /// Measured beam, with an analytic fallback for unusable observations
    Measured {
        /// Measured observations
        measured: MeasuredBeam,

        /// Model used when no usable observation is found
        fallback: GaussianBeam,
    },
}
//
impl VertexBeamProvider {
    /// Draw a primary vertex and a beam 4-momentum
    ///
    /// This never fails: if the measured model cannot provide a beam, the
    /// analytic model is used instead and a warning is emitted.
    ///
    pub fn sample(&mut self, target: &Target, rng: &mut RandomGenerator) -> (Vertex, Momentum) {
        match self {
            Self::Analytic(beam) => beam.sample(target, rng),
            Self::Measured { measured, fallback } => {
                measured.sample(rng).unwrap_or_else(|| {
                    warn!(
                        "No usable beam direction after {MAX_BEAM_ATTEMPTS} attempts, please \
                         check the beam properties. Falling back to the analytic beam model."
                    );
                    fallback.sample(target, rng)
                })
            }
        }
    }

    /// Analytic beam model in use (directly or as a fallback)
    pub fn analytic_model(&self) -> &GaussianBeam {
        match self {
            Self::Analytic(beam) => beam,
            Self::Measured { fallback, .. } => fallback,
        }
    }

    /// Nominal beam 4-momentum, used for configuration checks
    pub fn nominal_beam(&self) -> Momentum {
        let model = self.analytic_model();
        beam_from_slopes(
            model.momentum.mean,
            model.dxdz.mean,
            model.dydz.mean,
            model.particle_mass,
        )
    }

    /// Read measured observations sequentially (no effect on analytic beams)
    pub fn set_sequential_read_mode(&mut self, sequential: bool) {
        if let Self::Measured { measured, .. } = self {
            measured.set_sequential_read_mode(sequential);
        }
    }

    /// Start reading measured observations at a random position
    ///
    /// Analytic beams are left alone and consume no randomness.
    ///
    pub fn randomize_start_offset(&mut self, rng: &mut RandomGenerator) {
        if let Self::Measured { measured, .. } = self {
            measured.randomize_start_offset(rng);
        }
    }

    /// Move the measured reading position `count` observations forward
    pub fn advance_cursor(&mut self, count: usize) {
        if let Self::Measured { measured, .. } = self {
            measured.advance_cursor(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::momentum::{self, E, X, Y, Z};
    use std::io::Write;

    const PION_MASS: Float = 0.13957018;

    fn target() -> Target {
        Target {
            z_position: -300.,
            length: 40.,
            mass: 0.938272013,
            recoil_mass: 0.938272013,
        }
    }

    fn ideal_beam() -> GaussianBeam {
        GaussianBeam {
            particle_mass: PION_MASS,
            momentum: Gaussian::new(191.29, 0.),
            dxdz: Gaussian::default(),
            dydz: Gaussian::default(),
        }
    }

    fn observation(x: Float, momentum: Float) -> BeamObservation {
        BeamObservation {
            vertex: Vertex::new(x, 0., -310.),
            momentum,
            dxdz: 0.001,
            dydz: -0.002,
            sigmas: None,
        }
    }

    #[test]
    fn ideal_analytic_beam() {
        let mut rng = RandomGenerator::new(2);
        let mut provider = VertexBeamProvider::Analytic(ideal_beam());
        for _ in 0..100 {
            let (vertex, beam) = provider.sample(&target(), &mut rng);
            assert_eq!((vertex.x, vertex.y), (0., 0.));
            assert!((-320. ..=-280.).contains(&vertex.z));
            assert_eq!((beam[X], beam[Y], beam[Z]), (0., 0., 191.29));
            assert!((momentum::mass(&beam) - PION_MASS).abs() < 1e-8);
        }
        assert_eq!(provider.nominal_beam()[Z], 191.29);
    }

    #[test]
    fn tilted_beam_keeps_momentum_magnitude() {
        let beam = beam_from_slopes(190., 0.003, -0.001, PION_MASS);
        assert!((momentum::momentum_norm(&beam) - 190.).abs() < 1e-10);
        assert!((beam[X] / beam[Z] - 0.003).abs() < 1e-15);
        assert!((beam[Y] / beam[Z] + 0.001).abs() < 1e-15);
        assert!(beam[E] > 190.);
    }

    #[test]
    fn sequential_reading_wraps_around() {
        let mut rng = RandomGenerator::new(2);
        let observations = vec![observation(1., 190.), observation(2., 191.), observation(3., 192.)];
        let mut measured = MeasuredBeam::new(observations, PION_MASS).unwrap();
        measured.set_sequential_read_mode(true);
        let xs = (0..4)
            .map(|_| measured.sample(&mut rng).unwrap().0.x)
            .collect::<Vec<_>>();
        assert_eq!(xs, vec![1., 2., 3., 1.]);
    }

    #[test]
    fn holes_are_skipped() {
        let mut rng = RandomGenerator::new(2);
        let observations = vec![observation(1., 0.), observation(2., 191.)];
        let mut measured = MeasuredBeam::new(observations, PION_MASS).unwrap();
        measured.set_sequential_read_mode(true);
        for _ in 0..3 {
            let (vertex, beam) = measured.sample(&mut rng).unwrap();
            assert_eq!(vertex.x, 2.);
            assert!((momentum::momentum_norm(&beam) - 191.).abs() < 1e-10);
        }
    }

    #[test]
    fn falls_back_to_analytic_beam() {
        let mut rng = RandomGenerator::new(2);
        let observations = vec![observation(5., 0.), observation(6., Float::NAN)];
        let mut provider = VertexBeamProvider::Measured {
            measured: MeasuredBeam::new(observations, PION_MASS).unwrap(),
            fallback: ideal_beam(),
        };
        provider.randomize_start_offset(&mut rng);
        let (vertex, beam) = provider.sample(&target(), &mut rng);
        assert_eq!((vertex.x, vertex.y), (0., 0.));
        assert_eq!(beam[Z], 191.29);
    }

    #[test]
    fn smearing_uses_resolutions() {
        let mut rng = RandomGenerator::new(2);
        let mut obs = observation(1., 190.);
        obs.sigmas = Some([0.1, 0.1, 1., 1e-4, 1e-4]);
        let mut measured = MeasuredBeam::new(vec![obs], PION_MASS).unwrap();
        let (vertex, _) = measured.sample(&mut rng).unwrap();
        assert_eq!(vertex.x, 1.);
        measured.set_sigma_scaling(1.);
        let (vertex, _) = measured.sample(&mut rng).unwrap();
        assert_ne!(vertex.x, 1.);
        assert_eq!(vertex.z, -310.);
    }

    #[test]
    fn smearing_never_reverses_the_beam() {
        let mut rng = RandomGenerator::new(6);
        let mut obs = observation(1., 1.);
        obs.sigmas = Some([0., 0., 5., 0., 0.]);
        let mut measured = MeasuredBeam::new(vec![obs], PION_MASS).unwrap();
        measured.set_sigma_scaling(1.);
        let mut num_beams = 0;
        for _ in 0..200 {
            if let Some((_, beam)) = measured.sample(&mut rng) {
                assert!(beam[Z] > 0., "smeared beam {beam}");
                num_beams += 1;
            }
        }
        assert!(num_beams > 0);
    }

    #[test]
    fn cursor_advances_modulo_length() {
        let mut rng = RandomGenerator::new(2);
        let observations = vec![observation(1., 190.), observation(2., 191.), observation(3., 192.)];
        let mut provider = VertexBeamProvider::Measured {
            measured: MeasuredBeam::new(observations, PION_MASS).unwrap(),
            fallback: ideal_beam(),
        };
        provider.set_sequential_read_mode(true);
        provider.advance_cursor(7);
        let xs = (0..3)
            .map(|_| provider.sample(&target(), &mut rng).0.x)
            .collect::<Vec<_>>();
        assert_eq!(xs, vec![2., 3., 1.]);

        let mut analytic = VertexBeamProvider::Analytic(ideal_beam());
        analytic.advance_cursor(7);
        assert_eq!(analytic.sample(&target(), &mut rng).0.x, 0.);
    }

    #[test]
    fn empty_measured_beam_is_rejected() {
        assert!(MeasuredBeam::new(Vec::new(), PION_MASS).is_err());
    }

    #[test]
    fn load_beam_file() {
        let path = std::env::temp_dir().join(format!("beam_file_test_{}.txt", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "# x y z p dxdz dydz").unwrap();
            writeln!(file, "0.1 -0.2 -305 190.5 0.0001 -0.0002").unwrap();
            writeln!(file).unwrap();
            writeln!(file, "0.3 0.2 -295 191.5 0 0 0.01 0.01 1.9 1e-5 1e-5").unwrap();
        }
        let measured = MeasuredBeam::load(&path, PION_MASS).unwrap();
        assert_eq!(measured.len(), 2);
        assert_eq!(measured.observations[0].sigmas, None);
        assert_eq!(measured.observations[1].sigmas.unwrap()[2], 1.9);

        std::fs::write(&path, "1 2 3\n").unwrap();
        assert!(matches!(
            MeasuredBeam::load(&path, PION_MASS),
            Err(GeneratorError::BeamFileFormat { line: 1, .. })
        ));
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            MeasuredBeam::load(&path, PION_MASS),
            Err(GeneratorError::BeamFileIo { .. })
        ));
    }
}
