//! This module defines the properties and storage of generated events

use crate::{
    momentum::{Momentum, Vertex, E},
    numeric::Float,
};
use std::fmt::Display;

/// Static description of a final state particle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleSpec {
    /// GEANT particle identifier
    pub geant_id: i32,

    /// Electric charge (units of e)
    pub charge: i32,

    /// Rest mass (GeV/c^2)
    pub mass: Float,
}
//
impl ParticleSpec {
    /// Describe a particle
    pub fn new(geant_id: i32, charge: i32, mass: Float) -> Self {
        Self {
            geant_id,
            charge,
            mass,
        }
    }
}

/// Storage for beam + target -> (X -> daughters) + recoil events
#[derive(Clone, Debug)]
pub struct GeneratedEvent {
    /// Primary interaction vertex (cm)
    pub vertex: Vertex,

    /// Lab frame beam 4-momentum
    pub beam: Momentum,

    /// Target 4-momentum (at rest)
    pub target: Momentum,

    /// Lab frame recoil 4-momentum
    pub recoil: Momentum,

    /// Lab frame 4-momentum of the X system
    pub x_system: Momentum,

    /// Lab frame daughter 4-momenta, in the configured decay order
    pub daughters: Vec<Momentum>,

    /// Generated X mass (GeV/c^2)
    pub x_mass: Float,

    /// Mandelstam t ((GeV/c)^2, negative)
    pub t: Float,

    /// Generated t' = t0 - t ((GeV/c)^2, non-negative)
    pub t_prime: Float,

    /// Number of candidates which reached phase space sampling
    pub attempts: u64,

    /// Number of (X mass, t') candidates that were drawn in total
    pub candidates: u64,
}
//
impl GeneratedEvent {
    /// Sum of the daughter 4-momenta
    pub fn daughter_sum(&self) -> Momentum {
        self.daughters
            .iter()
            .fold(Momentum::zeros(), |acc, daughter| acc + daughter)
    }
}

impl Display for GeneratedEvent {
    /// Dump the event's 4-momenta
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dump = |fmt: &mut std::fmt::Formatter<'_>, name: &str, p: &Momentum| {
            writeln!(fmt, "{name}\t{}\t{}\t{}\t{}", p[0], p[1], p[2], p[E])
        };
        writeln!(
            fmt,
            "vertex\t{}\t{}\t{}",
            self.vertex[0], self.vertex[1], self.vertex[2]
        )?;
        dump(fmt, "beam", &self.beam)?;
        dump(fmt, "recoil", &self.recoil)?;
        dump(fmt, "X", &self.x_system)?;
        for (idx, daughter) in self.daughters.iter().enumerate() {
            dump(fmt, &format!("d{idx}"), daughter)?;
        }
        Ok(())
    }
}

/// Ordered collection of generated events, with sampling statistics
///
/// Batches are produced by independent generation tasks and merged back in
/// task order.
///
#[derive(Clone, Debug, Default)]
pub struct EventBatch {
    /// Accepted events, in generation order
    pub events: Vec<GeneratedEvent>,

    /// Total number of phase space sampling attempts
    pub attempts: u64,

    /// Total number of (X mass, t') candidates
    pub candidates: u64,
}
//
impl EventBatch {
    /// Prepare for event accumulation
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly generated event
    pub fn push(&mut self, event: GeneratedEvent) {
        self.attempts += event.attempts;
        self.candidates += event.candidates;
        self.events.push(event);
    }

    /// Append the events of a batch that was generated after this one
    pub fn merge(&mut self, other: EventBatch) {
        self.events.extend(other.events);
        self.attempts += other.attempts;
        self.candidates += other.candidates;
    }

    /// Number of events in the batch
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Truth that no event was generated
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Fraction of phase space sampling attempts that led to an event
    pub fn acceptance(&self) -> Float {
        if self.attempts == 0 {
            0.
        } else {
            self.len() as Float / self.attempts as Float
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_event(attempts: u64) -> GeneratedEvent {
        let x_system = Momentum::new(0., 0., 10., 10.1);
        GeneratedEvent {
            vertex: Vertex::zeros(),
            beam: Momentum::new(0., 0., 10., 10.001),
            target: Momentum::new(0., 0., 0., 0.938),
            recoil: Momentum::zeros(),
            x_system,
            daughters: vec![x_system * 0.5, x_system * 0.5],
            x_mass: 1.,
            t: -0.1,
            t_prime: 0.1,
            attempts,
            candidates: 2 * attempts,
        }
    }

    #[test]
    fn daughter_sum() {
        let event = dummy_event(1);
        assert_eq!(event.daughter_sum(), event.x_system);
    }

    #[test]
    fn batch_statistics() {
        let mut first = EventBatch::new();
        assert!(first.is_empty());
        assert_eq!(first.acceptance(), 0.);
        first.push(dummy_event(3));

        let mut second = EventBatch::new();
        second.push(dummy_event(1));
        first.merge(second);

        assert_eq!(first.len(), 2);
        assert_eq!(first.attempts, 4);
        assert_eq!(first.candidates, 8);
        assert_eq!(first.acceptance(), 0.5);
        assert_eq!(first.events[1].attempts, 1);
    }

    #[test]
    fn display_lists_all_daughters() {
        let dump = dummy_event(1).to_string();
        assert!(dump.contains("d0\t"));
        assert!(dump.contains("d1\t"));
        assert!(!dump.contains("d2\t"));
    }
}
