//! Sequential back-end of the event generation

use crate::{
    event::EventBatch,
    random::RandomGenerator,
    scheduling::{batch_size, num_batches},
};

/// Generate events in sequential mode
///
/// We use batched logic even in sequential mode, in order to achieve
/// reproducibility with respect to multi-threaded runs.
///
pub fn run_generation_impl(
    num_events: usize,
    mut rng: RandomGenerator,
    generate_events: impl Send + Sync + Fn(usize, usize, &mut RandomGenerator) -> EventBatch,
) -> EventBatch {
    // Some double-checking cannot hurt...
    assert!(num_events > 0, "Must generate at least one event");

    let mut accumulator = EventBatch::new();
    for batch_id in 0..num_batches(num_events) {
        let mut batch_rng = rng.clone();
        accumulator.merge(generate_events(
            batch_id,
            batch_size(num_events, batch_id),
            &mut batch_rng,
        ));
        rng.jump();
    }
    accumulator
}
