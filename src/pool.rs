use crossbeam_channel::{Receiver, Sender, unbounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, info, warn};

use crate::error::SynthError;
use crate::pipeline::{SampleOutcome, SamplePipeline};
use crate::report::{BatchReport, FailureKind, FailureRecord, ShardReport};
use crate::sample::DatasetWriter;

/// Cooperative stop flag, checked between samples.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Creates the writer for a shard. Called once per shard attempt; the
/// attempt's writer is discarded if the attempt panics.
pub type WriterFactory = dyn Fn(usize) -> Box<dyn DatasetWriter> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardTask {
    pub shard: usize,
    pub first_index: u64,
    pub count: usize,
    pub attempt: usize,
}

enum ShardMessage {
    Done(ShardReport),
    Fault { task: ShardTask, message: String },
}

/// Splits `total` samples into consecutive shards of at most `shard_size`.
pub fn plan_shards(total: usize, shard_size: usize) -> Vec<ShardTask> {
    let shard_size = shard_size.max(1);
    (0..total.div_ceil(shard_size))
        .map(|shard| {
            let start = shard * shard_size;
            ShardTask {
                shard,
                first_index: start as u64,
                count: shard_size.min(total - start),
                attempt: 0,
            }
        })
        .collect()
}

/// Runs one shard in index order, stopping early on cancellation.
pub fn run_shard(
    pipeline: &SamplePipeline,
    task: ShardTask,
    writer: &mut dyn DatasetWriter,
    cancel: &CancelToken,
) -> ShardReport {
    let mut report = ShardReport {
        shard: task.shard,
        first_index: task.first_index,
        requested: task.count,
        attempt: task.attempt,
        ..ShardReport::default()
    };
    for offset in 0..task.count as u64 {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let index = task.first_index + offset;
        match pipeline.produce(index, writer) {
            SampleOutcome::Written { record, retries } => {
                report.produced += 1;
                report.retries += retries;
                report.records.push(record);
            }
            SampleOutcome::Failed { failure, retries } => {
                report.retries += retries;
                if failure.kind == FailureKind::Rejected {
                    report.rejected += 1;
                }
                report.failures.push(failure);
            }
        }
    }
    if let Err(err) = writer.finish() {
        let err = SynthError::from(err);
        warn!("shard {} labels not stored: {}", task.shard, err);
        report.failures.push(FailureRecord {
            index: task.first_index,
            kind: FailureKind::Storage,
            message: err.to_string(),
        });
    }
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn worker_loop(
    pipeline: &SamplePipeline,
    writers: &WriterFactory,
    cancel: &CancelToken,
    tasks: Receiver<ShardTask>,
    results: Sender<ShardMessage>,
) {
    for task in tasks.iter() {
        debug!(
            "shard {} start (indices {}..{}, attempt {})",
            task.shard,
            task.first_index,
            task.first_index + task.count as u64,
            task.attempt + 1
        );
        let mut writer = writers(task.shard);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_shard(pipeline, task, writer.as_mut(), cancel)
        }));
        let message = match outcome {
            Ok(report) => ShardMessage::Done(report),
            Err(payload) => {
                // a faulted attempt commits nothing; the retry starts clean
                writer.discard();
                ShardMessage::Fault {
                    task,
                    message: panic_message(payload.as_ref()),
                }
            }
        };
        if results.send(message).is_err() {
            break;
        }
    }
}

/// Generates `total` samples on `workers` threads. Shards whose worker
/// panics are re-queued up to `max_shard_retries` times.
pub fn run_batch(
    pipeline: &SamplePipeline,
    writers: &WriterFactory,
    cancel: &CancelToken,
) -> BatchReport {
    let generation = &pipeline.config().generation;
    let total = generation.total;
    let max_retries = generation.max_shard_retries;
    let tasks = plan_shards(total, generation.shard_size);
    let workers = generation.worker_count().min(tasks.len()).max(1);
    info!(
        "generating {} samples in {} shards on {} workers",
        total,
        tasks.len(),
        workers
    );

    let (task_tx, task_rx) = unbounded::<ShardTask>();
    let (result_tx, result_rx) = unbounded::<ShardMessage>();
    let mut pending = tasks.len();
    for task in tasks {
        // the receiver is alive until the scope below ends
        let _ = task_tx.send(task);
    }

    let mut shards = Vec::new();
    let mut unresolved = Vec::new();
    let mut fault_failures = Vec::new();
    thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || worker_loop(pipeline, writers, cancel, task_rx, result_tx));
        }
        drop(result_tx);

        while pending > 0 {
            let Ok(message) = result_rx.recv() else {
                break;
            };
            match message {
                ShardMessage::Done(report) => {
                    info!(
                        "shard {} done: {} produced, {} rejected, {} retries",
                        report.shard, report.produced, report.rejected, report.retries
                    );
                    shards.push(report);
                    pending -= 1;
                }
                ShardMessage::Fault { task, message } => {
                    let fault = SynthError::WorkerFault {
                        shard: task.shard,
                        message,
                    };
                    if task.attempt < max_retries && !cancel.is_cancelled() {
                        warn!("{}; re-queueing (attempt {})", fault, task.attempt + 2);
                        let retry = ShardTask {
                            attempt: task.attempt + 1,
                            ..task
                        };
                        if task_tx.send(retry).is_err() {
                            pending -= 1;
                        }
                    } else {
                        warn!("{}; giving up", fault);
                        unresolved.push(task.shard);
                        fault_failures.push(FailureRecord {
                            index: task.first_index,
                            kind: FailureKind::WorkerFault,
                            message: fault.to_string(),
                        });
                        pending -= 1;
                    }
                }
            }
        }
        drop(task_tx);
    });

    unresolved.sort_unstable();
    BatchReport::aggregate(
        total,
        shards,
        unresolved,
        fault_failures,
        cancel.is_cancelled(),
    )
}
