//! Mechanism for loading and sharing the generator configuration
//!
//! The configuration file is made of `key value...` lines. Blank lines and
//! everything following a '#' are ignored. The `daughter` and `inv_slope` keys
//! may be repeated, all other keys may appear at most once.

use crate::{
    beam::{Gaussian, GaussianBeam, MeasuredBeam, Target, VertexBeamProvider},
    decay::DEFAULT_MAX_WEIGHT_TRIALS,
    event::ParticleSpec,
    evgen::{GeneratorSettings, KinematicRange, MassSampling, TPrimeSampling},
    numeric::Float,
    random::DEFAULT_SEED,
    slope::SlopeTable,
};

use eyre::{bail, ensure, eyre, Result, WrapErr};
use log::{info, warn};

use std::{collections::HashMap, fs, path::PathBuf, str::FromStr};

/// Generator configuration
#[derive(Clone, Debug)]
pub struct Configuration {
    /// Number of events to be generated
    pub num_events: usize,

    /// Random number generator seed
    pub seed: u64,

    /// Beam particle identification, used in output records
    pub beam_particle: ParticleSpec,

    /// Analytic beam model
    pub beam: GaussianBeam,

    /// Measured beam file (if any)
    pub beam_file: Option<PathBuf>,

    /// Whether the beam file should be read sequentially
    pub beam_file_sequential: bool,

    /// Scaling of the beam file resolutions (0 disables smearing)
    pub beam_sigma_scaling: Float,

    /// Fixed target
    pub target: Target,

    /// Kinematic range of X
    pub range: KinematicRange,

    /// Decay daughters of X
    pub daughters: Vec<ParticleSpec>,

    /// Number of trials used to estimate the maximum phase space weight
    pub max_weight_trials: usize,

    /// Output file for PWA2000 ASCII records
    pub output_file: PathBuf,

    /// Output file for ComGeant records (if any)
    pub comgeant_file: Option<PathBuf>,
}
//
impl Configuration {
    /// Load the configuration from a file, check it, and print it out
    pub fn load(file_name: &str) -> Result<Self> {
        let config_str = fs::read_to_string(file_name)
            .wrap_err_with(|| format!("Could not read configuration file {file_name}"))?;
        let config = Self::parse(&config_str)?;
        config.print();
        Ok(config)
    }

    /// Decode and check the contents of a configuration file
    pub fn parse(config_str: &str) -> Result<Self> {
        // Collect the configuration items, keyed by name
        let mut by_name = HashMap::<&str, Vec<ConfigItem>>::new();
        for line in config_str.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut words = line.split_whitespace();
            if let Some(name) = words.next() {
                // Anything unknown is a typo or an unsupported option
                ensure!(
                    KNOWN_KEYS.iter().any(|&key| key == name),
                    "Unknown configuration item {}",
                    name
                );
                by_name
                    .entry(name)
                    .or_default()
                    .push(ConfigItem::new(name, words.collect()));
            }
        }
        let mut items = ConfigItems { items: by_name };

        // Decode the configuration items into concrete values
        let beam_mass = items.single("beam_mass")?.parse::<Float>(0)?;
        let beam = GaussianBeam {
            particle_mass: beam_mass,
            momentum: items.single("beam_momentum")?.parse_gaussian()?,
            dxdz: items
                .optional("beam_dxdz")?
                .map_or(Ok(Gaussian::default()), |item| item.parse_gaussian())?,
            dydz: items
                .optional("beam_dydz")?
                .map_or(Ok(Gaussian::default()), |item| item.parse_gaussian())?,
        };
        let beam_particle = {
            let item = items.single("beam_particle")?;
            item.expect_len(2)?;
            ParticleSpec::new(item.parse(0)?, item.parse(1)?, beam_mass)
        };
        let target = Target {
            z_position: items.single("target_z_position")?.parse(0)?,
            length: items.single("target_length")?.parse(0)?,
            mass: items.single("target_mass")?.parse(0)?,
            recoil_mass: items.single("recoil_mass")?.parse(0)?,
        };
        let daughters = items
            .repeated("daughter")
            .iter()
            .map(|item| {
                item.expect_len(3)?;
                Ok(ParticleSpec::new(
                    item.parse(0)?,
                    item.parse(1)?,
                    item.parse(2)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let slopes = items
            .repeated("inv_slope")
            .iter()
            .map(|item| {
                item.expect_len(2)?;
                Ok((item.parse::<Float>(0)?, item.parse::<Float>(1)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let slopes = if slopes.is_empty() {
            None
        } else {
            Some(SlopeTable::new(slopes)?)
        };

        let config = Configuration {
            num_events: items.single("num_events")?.parse(0)?,
            seed: items.parse_or("seed", DEFAULT_SEED)?,
            beam_particle,
            beam,
            beam_file: items.optional("beam_file")?.map(|item| item.path()).transpose()?,
            beam_file_sequential: items
                .optional("beam_file_sequential")?
                .map_or(Ok(false), |item| item.parse_bool())?,
            beam_sigma_scaling: items.parse_or("beam_sigma_scaling", 0.)?,
            target,
            range: Self::parse_range(&mut items, slopes)?,
            daughters,
            max_weight_trials: items.parse_or("max_weight_trials", DEFAULT_MAX_WEIGHT_TRIALS)?,
            output_file: items.single("output_file")?.path()?,
            comgeant_file: items
                .optional("comgeant_file")?
                .map(|item| item.path())
                .transpose()?,
        };

        // Keys that the selected sampling modes do not read are mistakes too
        if let Some(name) = items.leftover() {
            bail!(
                "Configuration of {} is not used by the selected sampling modes",
                name
            );
        }

        // A sensible generator run must produce at least one event
        ensure!(config.num_events > 0, "Please generate at least one event");
        ensure!(!config.daughters.is_empty(), "Please configure some daughters");
        Ok(config)
    }

    /// Decode the X mass and t' sampling configuration
    ///
    /// Without an explicit sampling mode, inverted bounds select the Gaussian
    /// mass distribution or the exponential t' distribution. This convention
    /// is easily triggered by accident, so a warning is emitted when it is
    /// relied upon.
    ///
    fn parse_range(config: &mut ConfigItems, slopes: Option<SlopeTable>) -> Result<KinematicRange> {
        let mass = match config.optional("mass_mode")? {
            Some(item) => match item.word(0)? {
                "fixed" => MassSampling::Fixed(config.single("x_mass")?.parse(0)?),
                "uniform" => MassSampling::UniformInRange {
                    min: config.single("x_mass_min")?.parse(0)?,
                    max: config.single("x_mass_max")?.parse(0)?,
                },
                "gaussian" => MassSampling::GaussianAroundCenter {
                    center: config.single("x_mass_center")?.parse(0)?,
                    sigma: config.single("x_mass_sigma")?.parse(0)?,
                },
                other => bail!("Unknown mass_mode {}", other),
            },
            None => {
                let min = config.single("x_mass_min")?.parse::<Float>(0)?;
                let max = config.single("x_mass_max")?.parse::<Float>(0)?;
                if min == max {
                    MassSampling::Fixed(min)
                } else if min < max {
                    MassSampling::UniformInRange { min, max }
                } else {
                    warn!(
                        "x_mass_min > x_mass_max without an explicit mass_mode, generating a \
                         Gaussian mass distribution around {min} with sigma {max}"
                    );
                    MassSampling::GaussianAroundCenter {
                        center: min,
                        sigma: max,
                    }
                }
            }
        };

        let mut t_prime_min = config.parse_or("t_prime_min", 0.)?;
        let mut t_prime_max = config.parse_or("t_prime_max", Float::INFINITY)?;
        let t_prime = match config.optional("t_prime_mode")? {
            Some(item) => match item.word(0)? {
                "fixed" => {
                    ensure!(
                        slopes.is_none(),
                        "inv_slope is not used by t_prime_mode fixed"
                    );
                    TPrimeSampling::Fixed(config.single("t_prime")?.parse(0)?)
                }
                "exponential" => TPrimeSampling::Exponential { slopes },
                other => bail!("Unknown t_prime_mode {}", other),
            },
            None if t_prime_max < t_prime_min => {
                warn!(
                    "t_prime_max < t_prime_min without an explicit t_prime_mode, generating an \
                     exponential t' distribution within [{t_prime_max}, {t_prime_min}]"
                );
                std::mem::swap(&mut t_prime_min, &mut t_prime_max);
                TPrimeSampling::Exponential { slopes }
            }
            None => {
                ensure!(
                    slopes.is_none(),
                    "inv_slope needs an exponential t' distribution, please set t_prime_mode"
                );
                TPrimeSampling::Fixed(t_prime_min)
            }
        };

        let range = KinematicRange {
            mass,
            t_prime,
            t_prime_min,
            t_prime_max,
            t_min: config.parse_or("t_min", 0.)?,
        };
        range.validate()?;
        Ok(range)
    }

    /// Build the event generator settings described by this configuration
    pub fn generator_settings(&self) -> Result<GeneratorSettings> {
        let beam = match &self.beam_file {
            Some(path) => {
                let mut measured = MeasuredBeam::load(path, self.beam.particle_mass)?;
                measured.set_sequential_read_mode(self.beam_file_sequential);
                measured.set_sigma_scaling(self.beam_sigma_scaling);
                VertexBeamProvider::Measured {
                    measured,
                    fallback: self.beam,
                }
            }
            None => VertexBeamProvider::Analytic(self.beam),
        };
        let mut settings =
            GeneratorSettings::new(self.daughters.clone(), self.target, beam, self.range.clone());
        settings.max_weight_trials = self.max_weight_trials;
        Ok(settings)
    }

    /// Display the configuration
    pub fn print(&self) {
        info!("num_events           : {}", self.num_events);
        info!("seed                 : {}", self.seed);
        info!(
            "beam_particle        : id {} charge {} mass {}",
            self.beam_particle.geant_id, self.beam_particle.charge, self.beam.particle_mass
        );
        info!("beam_momentum        : {:?}", self.beam.momentum);
        info!("beam_dxdz            : {:?}", self.beam.dxdz);
        info!("beam_dydz            : {:?}", self.beam.dydz);
        info!("beam_file            : {:?}", self.beam_file);
        info!("beam_file_sequential : {}", self.beam_file_sequential);
        info!("beam_sigma_scaling   : {}", self.beam_sigma_scaling);
        info!("target               : {:?}", self.target);
        info!("mass                 : {:?}", self.range.mass);
        info!("t_prime              : {:?}", self.range.t_prime);
        info!(
            "t_prime window       : [{}, {}]",
            self.range.t_prime_min, self.range.t_prime_max
        );
        info!("t_min                : {}", self.range.t_min);
        for (idx, daughter) in self.daughters.iter().enumerate() {
            info!("daughter {idx:<11} : {daughter:?}");
        }
        info!("max_weight_trials    : {}", self.max_weight_trials);
        info!("output_file          : {:?}", self.output_file);
        info!("comgeant_file        : {:?}", self.comgeant_file);
    }
}

/// Every configuration key that is understood
const KNOWN_KEYS: [&str; 30] = [
    "num_events",
    "seed",
    "beam_mass",
    "beam_particle",
    "beam_momentum",
    "beam_dxdz",
    "beam_dydz",
    "beam_file",
    "beam_file_sequential",
    "beam_sigma_scaling",
    "target_z_position",
    "target_length",
    "target_mass",
    "recoil_mass",
    "mass_mode",
    "x_mass",
    "x_mass_min",
    "x_mass_max",
    "x_mass_center",
    "x_mass_sigma",
    "t_prime_mode",
    "t_prime",
    "t_prime_min",
    "t_prime_max",
    "t_min",
    "inv_slope",
    "daughter",
    "max_weight_trials",
    "output_file",
    "comgeant_file",
];

/// Configuration items, grouped by name
struct ConfigItems<'data> {
    items: HashMap<&'data str, Vec<ConfigItem<'data>>>,
}
//
impl<'data> ConfigItems<'data> {
    /// Fetch an item which may appear at most once
    fn optional(&mut self, name: &'static str) -> Result<Option<ConfigItem<'data>>> {
        match self.items.remove(name) {
            None => Ok(None),
            Some(mut items) if items.len() == 1 => Ok(items.pop()),
            Some(_) => Err(eyre!("Configuration of {} appears more than once", name)),
        }
    }

    /// Fetch an item which must appear exactly once
    fn single(&mut self, name: &'static str) -> Result<ConfigItem<'data>> {
        self.optional(name)?
            .ok_or_else(|| eyre!("Missing configuration of {}", name))
    }

    /// Fetch an item which may be repeated
    fn repeated(&mut self, name: &'static str) -> Vec<ConfigItem<'data>> {
        self.items.remove(name).unwrap_or_default()
    }

    /// Name of an item that was never fetched, if any
    fn leftover(&self) -> Option<&'data str> {
        self.items.keys().min().copied()
    }

    /// Parse an optional single-valued item, with a default value
    fn parse_or<T: FromStr>(&mut self, name: &'static str, default: T) -> Result<T>
    where
        <T as FromStr>::Err: ::std::error::Error + Send + Sync + 'static,
    {
        self.optional(name)?
            .map_or(Ok(default), |item| item.parse(0))
    }
}

/// A line from the configuration file, tagged with its name for error
/// reporting purposes.
struct ConfigItem<'data> {
    name: &'data str,
    data: Vec<&'data str>,
}
//
impl<'data> ConfigItem<'data> {
    /// Build a config item from its name and raw values
    fn new(name: &'data str, data: Vec<&'data str>) -> Self {
        Self { name, data }
    }

    /// Check the number of values
    fn expect_len(&self, len: usize) -> Result<()> {
        ensure!(
            self.data.len() == len,
            "Configuration of {} should have {} values, found {}",
            self.name,
            len,
            self.data.len()
        );
        Ok(())
    }

    /// Access the n-th raw value
    fn word(&self, index: usize) -> Result<&'data str> {
        self.data
            .get(index)
            .copied()
            .ok_or_else(|| eyre!("Missing value #{} in configuration of {}", index, self.name))
    }

    /// Parse the n-th value using Rust's standard parsing logic
    fn parse<T: FromStr>(&self, index: usize) -> Result<T>
    where
        <T as FromStr>::Err: ::std::error::Error + Send + Sync + 'static,
    {
        self.word(index)?
            .parse::<T>()
            .wrap_err_with(|| format!("Could not parse configuration of {}", self.name))
    }

    /// Parse a "mean sigma" pair of values
    fn parse_gaussian(&self) -> Result<Gaussian> {
        self.expect_len(2)?;
        Ok(Gaussian::new(self.parse(0)?, self.parse(1)?))
    }

    /// Interpret the value as a file path
    fn path(&self) -> Result<PathBuf> {
        self.expect_len(1)?;
        Ok(PathBuf::from(self.word(0)?))
    }

    /// Parse the value using special logic which handles Fortran's bool syntax
    fn parse_bool(&self) -> Result<bool> {
        match self.word(0)?.to_lowercase().as_str() {
            // Handle FORTRAN booleans as a special case
            ".true." => Ok(true),
            ".false." => Ok(false),
            // Delegate other booleans to the standard Rust parser
            _ => self.parse::<bool>(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_CONFIG: &str = "
        # Generated events
        num_events        100
        seed              42
        output_file       events.evt

        # Pion beam
        beam_mass         0.13957018
        beam_particle     9 -1
        beam_momentum     191.29 1.94476
        beam_dxdz         0.0 0.0001   # tilts
        beam_dydz         0.0 0.0001

        # Proton target
        target_z_position -300
        target_length     40
        target_mass       0.938272013
        recoil_mass       0.938272013

        daughter          9 -1 0.13957018
        daughter          8  1 0.13957018
        daughter          9 -1 0.13957018
    ";

    fn with(extra: &str) -> String {
        format!("{BASE_CONFIG}\n{extra}")
    }

    #[test]
    fn explicit_modes() {
        let config = Configuration::parse(&with(
            "mass_mode uniform
             x_mass_min 0.5
             x_mass_max 2.5
             t_prime_mode exponential
             t_prime_min 0.1
             t_prime_max 1.0
             t_min 0.001
             inv_slope 1.0 0.1
             inv_slope 2.0 0.2
             max_weight_trials 1000",
        ))
        .unwrap();
        assert_eq!(config.num_events, 100);
        assert_eq!(config.seed, 42);
        assert_eq!(config.daughters.len(), 3);
        assert_eq!(config.daughters[1], ParticleSpec::new(8, 1, 0.13957018));
        assert_eq!(config.beam_particle.geant_id, 9);
        assert_eq!(config.beam.momentum, Gaussian::new(191.29, 1.94476));
        assert_eq!(
            config.range.mass,
            MassSampling::UniformInRange { min: 0.5, max: 2.5 }
        );
        match &config.range.t_prime {
            TPrimeSampling::Exponential { slopes: Some(table) } => assert_eq!(table.len(), 2),
            other => panic!("Unexpected t' sampling {other:?}"),
        }
        assert_eq!(config.range.t_min, 0.001);
        assert_eq!(config.max_weight_trials, 1000);
        assert_eq!(config.output_file, PathBuf::from("events.evt"));
        assert_eq!(config.comgeant_file, None);
        assert!(config.generator_settings().is_ok());
    }

    #[test]
    fn legacy_inverted_bounds() {
        let config = Configuration::parse(&with(
            "x_mass_min 1.5
             x_mass_max 0.1
             t_prime_min 1.0
             t_prime_max 0.1",
        ))
        .unwrap();
        assert_eq!(
            config.range.mass,
            MassSampling::GaussianAroundCenter {
                center: 1.5,
                sigma: 0.1
            }
        );
        assert_eq!(
            config.range.t_prime,
            TPrimeSampling::Exponential { slopes: None }
        );
        assert_eq!(
            (config.range.t_prime_min, config.range.t_prime_max),
            (0.1, 1.0)
        );
    }

    #[test]
    fn legacy_fixed_values() {
        let config = Configuration::parse(&with(
            "x_mass_min 1.0
             x_mass_max 1.0
             t_prime_min 0.2",
        ))
        .unwrap();
        assert_eq!(config.range.mass, MassSampling::Fixed(1.0));
        assert_eq!(config.range.t_prime, TPrimeSampling::Fixed(0.2));
        assert_eq!(config.range.t_prime_max, Float::INFINITY);
    }

    #[test]
    fn explicit_mode_rejects_inverted_bounds() {
        assert!(Configuration::parse(&with(
            "mass_mode uniform
             x_mass_min 2.0
             x_mass_max 1.0"
        ))
        .is_err());
        assert!(Configuration::parse(&with(
            "x_mass_min 1.0
             x_mass_max 2.0
             t_prime_mode exponential
             t_prime_min 1.0
             t_prime_max 0.1"
        ))
        .is_err());
    }

    #[test]
    fn configuration_errors() {
        // Missing mass window
        assert!(Configuration::parse(BASE_CONFIG).is_err());
        // Typo
        assert!(Configuration::parse(&with("x_mass_min 1\nx_mass_max 2\nx_mas 3")).is_err());
        // Duplicate
        assert!(Configuration::parse(&with("x_mass_min 1\nx_mass_max 2\nx_mass_max 3")).is_err());
        // Non-monotonic slopes
        assert!(Configuration::parse(&with(
            "x_mass_min 1\nx_mass_max 2\ninv_slope 2 1\ninv_slope 1 1"
        ))
        .is_err());
        // Unparseable value
        assert!(Configuration::parse(&with("x_mass_min one\nx_mass_max 2")).is_err());
    }

    #[test]
    fn keys_unused_by_the_selected_modes_are_rejected() {
        // Mass bounds alongside a fixed mass
        let err = Configuration::parse(&with("mass_mode fixed\nx_mass 1.0\nx_mass_min 0.5"))
            .unwrap_err();
        assert!(err.to_string().contains("x_mass_min"), "{err}");
        // Gaussian parameters alongside a uniform mass
        assert!(Configuration::parse(&with(
            "mass_mode uniform\nx_mass_min 1\nx_mass_max 2\nx_mass_sigma 0.1"
        ))
        .is_err());
        // Fixed t' alongside an exponential t' distribution
        let err = Configuration::parse(&with(
            "x_mass_min 1\nx_mass_max 2\nt_prime_mode exponential\nt_prime 0.3",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("t_prime"), "{err}");
        // Slopes alongside a fixed t'
        assert!(Configuration::parse(&with(
            "x_mass_min 1\nx_mass_max 2\nt_prime_mode fixed\nt_prime 0.3\ninv_slope 1 0.1"
        ))
        .is_err());
        assert!(Configuration::parse(&with("x_mass_min 1\nx_mass_max 2\ninv_slope 1 0.1")).is_err());
        // The same keys are fine when the selected modes read them
        assert!(Configuration::parse(&with(
            "mass_mode fixed\nx_mass 1.0\nt_prime_mode fixed\nt_prime 0.3"
        ))
        .is_ok());
    }

    #[test]
    fn fortran_booleans() {
        let item = ConfigItem::new("flag", vec![".TRUE."]);
        assert!(item.parse_bool().unwrap());
        let item = ConfigItem::new("flag", vec!["false"]);
        assert!(!item.parse_bool().unwrap());
        let item = ConfigItem::new("flag", vec!["maybe"]);
        assert!(item.parse_bool().is_err());
    }
}
