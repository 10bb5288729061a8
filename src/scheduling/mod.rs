//! This module takes care of scheduling the event generation work,
//! encapsulating use of multiple threads and anything else that will come in
//! the future

#[cfg(feature = "multi-threading")]
mod multi_threading;
#[cfg(not(feature = "multi-threading"))]
mod sequential;

use crate::{event::EventBatch, random::RandomGenerator};

/// Size of the generated event batches
///
/// Generated events are grouped in batches of a certain size. Each batch is
/// generated from its own random number stream, obtained by jumping the
/// stream of the previous batch, so that the generated events do not depend on
/// whether batches are processed sequentially or in parallel.
///
pub const EVENT_BATCH_SIZE: usize = 1_000;

/// Number of batches needed to generate a number of events
pub fn num_batches(num_events: usize) -> usize {
    num_events / EVENT_BATCH_SIZE + usize::from(num_events % EVENT_BATCH_SIZE != 0)
}

/// Size of the n-th batch of a run of `num_events` events
pub fn batch_size(num_events: usize, batch_id: usize) -> usize {
    EVENT_BATCH_SIZE.min(num_events - batch_id * EVENT_BATCH_SIZE)
}

/// Run the event generation in the manner that was configured at build time.
///
/// Takes as parameters the total number of events to be generated, the
/// initial random number generator state, and a kernel that generates a
/// batch of events given the batch index, the batch size, and a
/// batch-specific random number generator.
///
/// Returns all generated events, in batch order
///
pub fn run_generation(
    num_events: usize,
    rng: RandomGenerator,
    generate_events: impl Send + Sync + Fn(usize, usize, &mut RandomGenerator) -> EventBatch,
) -> EventBatch {
    // Check that the user is being reasonable (should have already been checked
    // at configuration time, but bugs can happen...)
    assert!(num_events > 0, "Must generate at least one event");

    // ...in sequential mode
    #[cfg(not(feature = "multi-threading"))]
    {
        sequential::run_generation_impl(num_events, rng, generate_events)
    }

    // ...in multi-threaded mode
    #[cfg(feature = "multi-threading")]
    {
        multi_threading::run_generation_impl(num_events, rng, generate_events)
    }
}
