//! This module is in charge of writing the generated events and a summary of
//! the generator run to the standard output and various files

use crate::{
    config::Configuration,
    event::{EventBatch, GeneratedEvent, ParticleSpec},
    momentum::{E, X, Y, Z},
    numeric::Float,
};

use eyre::{Result, WrapErr};
use log::info;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use std::{
    fmt::Display,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    time::Duration,
};

/// Geant ID under which ComGeant expects the (reversed) beam particle
pub const COMGEANT_BEAM_ID: i32 = 44;

/// Geant ID of the recoil proton in ComGeant records
pub const COMGEANT_RECOIL_ID: i32 = 14;

/// Write the generated events and the run summary to disk
pub fn dump_results(
    cfg: &Configuration,
    events: &EventBatch,
    max_weight: Float,
    elapsed_time: Duration,
) -> Result<()> {
    // Write the PWA2000 event file
    {
        let mut evt_file = create(&cfg.output_file)?;
        for event in &events.events {
            write_pwa2000(&mut evt_file, event, &cfg.beam_particle, &cfg.daughters)?;
        }
        evt_file.flush()?;
    }

    // Write the ComGeant event file, if requested
    if let Some(path) = &cfg.comgeant_file {
        let mut cg_file = create(path)?;
        for event in &events.events {
            write_comgeant(&mut cg_file, event, &cfg.daughters)?;
        }
        cg_file.flush()?;
    }

    // Print out and store the run summary
    let summary = RunSummary::new(events, max_weight, elapsed_time);
    summary.log();
    let summary_path = cfg.output_file.with_extension("summary");
    let mut summary_file = create(&summary_path)?;
    summary.write(&mut summary_file)?;
    summary_file.flush()?;
    Ok(())
}

/// Create an output file, with a readable error message on failure
fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .wrap_err_with(|| format!("Could not create output file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write an event in the PWA2000 ASCII format
///
/// The record starts with the number of particles, followed by one line per
/// particle (beam first, then the X daughters) holding the Geant ID, the
/// charge, and the lab 4-momentum as px py pz E.
///
pub fn write_pwa2000(
    out: &mut impl Write,
    event: &GeneratedEvent,
    beam: &ParticleSpec,
    daughters: &[ParticleSpec],
) -> io::Result<()> {
    writeln!(out, "{}", event.daughters.len() + 1)?;
    let particles =
        std::iter::once((beam, &event.beam)).chain(daughters.iter().zip(&event.daughters));
    for (spec, p) in particles {
        writeln!(
            out,
            "{} {} {} {} {} {}",
            spec.geant_id, spec.charge, p[X], p[Y], p[Z], p[E]
        )?;
    }
    Ok(())
}

/// Write an event in the ComGeant text format
///
/// ComGeant's axes are permuted with respect to ours (its first axis is our
/// beam axis), and the beam must travel upstream.
///
pub fn write_comgeant(
    out: &mut impl Write,
    event: &GeneratedEvent,
    daughters: &[ParticleSpec],
) -> io::Result<()> {
    writeln!(out, "{}", event.daughters.len() + 2)?;
    let v = &event.vertex;
    writeln!(out, "{} {} {}", v.z, v.x, v.y)?;
    let b = &event.beam;
    writeln!(out, "{} {} {} {}", COMGEANT_BEAM_ID, -b[Z], -b[X], -b[Y])?;
    let r = &event.recoil;
    writeln!(out, "{} {} {} {}", COMGEANT_RECOIL_ID, r[Z], r[X], r[Y])?;
    for (spec, p) in daughters.iter().zip(&event.daughters) {
        writeln!(out, "{} {} {} {}", spec.geant_id, p[Z], p[X], p[Y])?;
    }
    Ok(())
}

/// Summary of a generator run
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// When the run ended
    pub timestamp: String,

    /// Number of accepted events
    pub num_events: usize,

    /// Phase space sampling attempts
    pub attempts: u64,

    /// (X mass, t') candidates
    pub candidates: u64,

    /// Maximum phase space weight
    pub max_weight: Float,

    /// Wall-clock duration of the generation
    pub elapsed_secs: Float,
}
//
impl RunSummary {
    /// Summarize a generator run which just ended
    pub fn new(events: &EventBatch, max_weight: Float, elapsed_time: Duration) -> Self {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("unknown"));
        Self {
            timestamp,
            num_events: events.len(),
            attempts: events.attempts,
            candidates: events.candidates,
            max_weight,
            elapsed_secs: elapsed_time.as_secs_f64(),
        }
    }

    /// Accepted events per phase space attempt
    pub fn acceptance(&self) -> Float {
        if self.attempts == 0 {
            0.
        } else {
            self.num_events as Float / self.attempts as Float
        }
    }

    /// Time spent per accepted event
    pub fn secs_per_event(&self) -> Float {
        if self.num_events == 0 {
            0.
        } else {
            self.elapsed_secs / self.num_events as Float
        }
    }

    /// Send the summary to the log
    pub fn log(&self) {
        info!(
            "Generated {} events in {:.3} s ({} attempts, {} candidates, acceptance {:.4})",
            self.num_events,
            self.elapsed_secs,
            self.attempts,
            self.candidates,
            self.acceptance()
        );
    }

    /// Write the summary as aligned key-value pairs
    pub fn write(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, " {}", self.timestamp)?;
        write_item(out, "Generated events", self.num_events)?;
        write_item(out, "Phase space attempts", self.attempts)?;
        write_item(out, "(mass, t') candidates", self.candidates)?;
        write_item(out, "Acceptance", self.acceptance())?;
        write_item(out, "Maximum weight", self.max_weight)?;
        writeln!(out, " ---------------------------------------------")?;
        write_item(out, "Elapsed time (s)", self.elapsed_secs)?;
        write_item(out, "Elapsed time per event (s)", self.secs_per_event())
    }
}

/// Key-value output that uses fixed-size columns for better readability
fn write_item(out: &mut impl Write, key: &str, value: impl Display) -> io::Result<()> {
    writeln!(out, " {key:<31}: {value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::momentum::Momentum;
    use nalgebra::Vector3;

    fn event() -> GeneratedEvent {
        GeneratedEvent {
            vertex: Vector3::new(0.5, -0.25, -310.),
            beam: Momentum::new(0.01, 0.02, 190., 190.5),
            target: Momentum::new(0., 0., 0., 0.938),
            recoil: Momentum::new(0.1, 0.2, 0.3, 1.),
            x_system: Momentum::new(-0.09, -0.18, 189.7, 190.438),
            daughters: vec![
                Momentum::new(-0.045, -0.09, 94.85, 95.219),
                Momentum::new(-0.045, -0.09, 94.85, 95.219),
            ],
            x_mass: 1.,
            t: -0.2,
            t_prime: 0.19,
            attempts: 3,
            candidates: 5,
        }
    }

    fn pions() -> Vec<ParticleSpec> {
        vec![
            ParticleSpec::new(9, -1, 0.13957018),
            ParticleSpec::new(8, 1, 0.13957018),
        ]
    }

    #[test]
    fn pwa2000_record() {
        let mut out = Vec::new();
        let beam = ParticleSpec::new(9, -1, 0.13957018);
        write_pwa2000(&mut out, &event(), &beam, &pions()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            [
                "3",
                "9 -1 0.01 0.02 190 190.5",
                "9 -1 -0.045 -0.09 94.85 95.219",
                "8 1 -0.045 -0.09 94.85 95.219",
            ]
        );
    }

    #[test]
    fn full_precision_is_kept() {
        let mut out = Vec::new();
        let mut event = event();
        event.beam[E] = 190.123456789012345;
        let beam = ParticleSpec::new(9, -1, 0.13957018);
        write_pwa2000(&mut out, &event, &beam, &pions()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let energy = text.lines().nth(1).unwrap().split(' ').last().unwrap();
        assert_eq!(energy.parse::<Float>().unwrap(), event.beam[E]);
    }

    #[test]
    fn comgeant_record() {
        let mut out = Vec::new();
        write_comgeant(&mut out, &event(), &pions()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            [
                "4",
                "-310 0.5 -0.25",
                "44 -190 -0.01 -0.02",
                "14 0.3 0.1 0.2",
                "9 94.85 -0.045 -0.09",
                "8 94.85 -0.045 -0.09",
            ]
        );
    }

    #[test]
    fn run_summary() {
        let mut batch = EventBatch::new();
        batch.push(event());
        batch.push(event());
        let summary = RunSummary::new(&batch, 0.25, Duration::from_millis(500));
        assert_eq!(summary.num_events, 2);
        assert_eq!(summary.attempts, 6);
        assert_eq!(summary.candidates, 10);
        assert!((summary.acceptance() - 1. / 3.).abs() < 1e-12);
        assert!((summary.secs_per_event() - 0.25).abs() < 1e-12);

        let mut out = Vec::new();
        summary.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!(" {:<31}: 2\n", "Generated events")));
        assert!(text.contains("Maximum weight"));
    }
}
