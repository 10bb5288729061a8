//! Multi-threaded back-end of the event generation

use crate::{
    event::EventBatch,
    random::RandomGenerator,
    scheduling::{batch_size, num_batches},
};

use std::sync::Mutex;

/// Generate events in multi-threaded mode
///
/// Takes the random number generator state as input, and merges the batches
/// in batch order, so that the output is identical to that of a sequential
/// run.
///
pub fn run_generation_impl(
    num_events: usize,
    mut rng: RandomGenerator,
    generate_events: impl Send + Sync + Fn(usize, usize, &mut RandomGenerator) -> EventBatch,
) -> EventBatch {
    // Some double-checking cannot hurt...
    assert!(num_events > 0, "Must generate at least one event");

    // We know in advance how many batches of event we will process
    let num_batches = num_batches(num_events);
    let accumulator = ReproducibleAccumulator::new(num_batches);

    // This function is a synchronization scope: it will only return
    // once all inner tasks have been executed
    rayon::scope(|scope| {
        // For each requested batch of events...
        for batch_id in 0..num_batches {
            let batch_size = batch_size(num_events, batch_id);

            // Spawn a task which is responsible for generating them
            let mut task_rng = rng.clone();
            let accumulator_ref = &accumulator;
            let generate_events_ref = &generate_events;
            scope.spawn(move |_| {
                let result = generate_events_ref(batch_id, batch_size, &mut task_rng);
                accumulator_ref.set_task_result(batch_id, result);
            });

            // The next task gets its own random number stream
            rng.jump();
        }
    });

    // Extract the results from the accumulator
    accumulator.get_merged_result()
}

/// Order-preserving batch accumulation mechanism
struct ReproducibleAccumulator {
    /// Storage for the event batches of parallel tasks
    results: Box<[Mutex<Option<EventBatch>>]>,
}
//
impl ReproducibleAccumulator {
    /// Set up results storage for N parallel tasks
    fn new(num_tasks: usize) -> Self {
        assert!(num_tasks > 0, "There should be at least one task");
        Self {
            results: (0..num_tasks)
                .map(|_| Mutex::new(None))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        }
    }

    /// Integrate the events of the n-th generation task
    fn set_task_result(&self, task_id: usize, result: EventBatch) {
        let mut lock = self.results[task_id]
            .lock()
            .expect("Mutex data should be valid");
        assert!(lock.is_none(), "Tasks should not report results twice");
        *lock = Some(result);
    }

    /// Concatenate the batches in task order
    fn get_merged_result(self) -> EventBatch {
        self.results
            .into_vec()
            .into_iter()
            .map(|entry| {
                entry
                    .into_inner()
                    .expect("Mutex data should be valid")
                    .expect("Result should be ready")
            })
            .fold(EventBatch::new(), |mut merged, batch| {
                merged.merge(batch);
                merged
            })
    }
}
