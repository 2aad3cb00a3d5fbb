use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use flume::Receiver;

use super::{JobOutcome, Shared, Task};
use crate::{
    observability::{log_debug, log_error, log_warn},
    sink::{Connector, SinkError},
};

/// Run jobs until the channel closes, returning the worker's sink (if one was
/// ever opened) so the pipeline can close it.
pub(super) fn run<C: Connector>(
    worker: usize,
    connector: Arc<C>,
    tasks: Receiver<Task<C::Sink>>,
    shared: Arc<Shared>,
) -> Option<C::Sink> {
    let mut slot: Option<C::Sink> = None;

    while let Ok(task) = tasks.recv() {
        let Task { id, size, job } = task;
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            sink_for(&mut slot, connector.as_ref(), worker, &shared).map(job)
        }));
        let outcome = match attempt {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                log_error!(
                    "pipeline",
                    "sink_connect_failed",
                    worker,
                    task = id,
                    error = %err,
                );
                JobOutcome::Failed(err.to_string())
            }
            Err(_) => {
                // The sink may be mid-operation; open a fresh one next time.
                slot = None;
                JobOutcome::Failed("unit panicked".into())
            }
        };

        match &outcome {
            JobOutcome::Succeeded => {
                log_debug!("pipeline", "task_succeeded", worker, task = id);
            }
            JobOutcome::Failed(message) => {
                log_warn!(
                    "pipeline",
                    "task_failed",
                    worker,
                    task = id,
                    error = %message,
                );
            }
        }
        shared.finish(size, &outcome);
    }

    slot
}

fn sink_for<'a, C: Connector>(
    slot: &'a mut Option<C::Sink>,
    connector: &C,
    worker: usize,
    shared: &Shared,
) -> Result<&'a mut C::Sink, SinkError> {
    let sink = match slot.take() {
        Some(sink) => sink,
        None => {
            let sink = connector.connect(worker)?;
            shared.record_connection();
            log_debug!("pipeline", "sink_connected", worker);
            sink
        }
    };
    Ok(slot.insert(sink))
}
