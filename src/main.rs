//! Command line driver of the diffractive phase space generator
//!
//! Usage: `diffractive_ps [configuration file]`, where the configuration file
//! defaults to `generator.cfg`. Set `RUST_LOG=info` to see the configuration
//! and the run summary.

use diffractive_ps::{
    config::Configuration, evgen::EventGenerator, output, random::RandomGenerator, scheduling,
};

use eyre::{Result, WrapErr};
use log::info;

use std::time::Instant;

/// Configuration file used when none is specified
const DEFAULT_CONFIG_FILE: &str = "generator.cfg";

fn main() -> Result<()> {
    env_logger::init();

    // ### CONFIGURATION READOUT ###

    let config_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_owned());
    let cfg = Configuration::load(&config_file).wrap_err("Failed to load the configuration")?;

    // ### GENERATOR INITIALIZATION ###

    // NOTE: The clock starts after configuration I/O, but includes the maximum
    //       weight estimation which can be a large share of short runs.
    let saved_time = Instant::now();

    let mut rng = RandomGenerator::new(cfg.seed);
    let settings = cfg.generator_settings()?;
    let mut evgen =
        EventGenerator::new(settings, &mut rng).wrap_err("Failed to set up the generator")?;
    info!("Maximum weight: {}", evgen.max_weight());

    // Measured beams are read from a random position, drawn once per run
    evgen.beam_provider_mut().randomize_start_offset(&mut rng);

    // ### EVENT GENERATION ###

    // This kernel generates a batch of events, given a batch-specific random
    // number generator state. Each batch works on its own copy of the
    // generator, which picks up measured beams where the previous batch left.
    let generate_events = |batch_id: usize, num_events: usize, rng: &mut RandomGenerator| {
        evgen.generate_batch(batch_id, num_events, rng)
    };
    let events = scheduling::run_generation(cfg.num_events, rng, generate_events);

    // ### RESULTS STORAGE ###

    let elapsed_time = saved_time.elapsed();
    output::dump_results(&cfg, &events, evgen.max_weight(), elapsed_time)
        .wrap_err("Failed to output the results")?;
    Ok(())
}
