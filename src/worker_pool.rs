//! Fixed-size pool of background threads for CPU bound decoding.
//!
//! Tasks are queued in arrival order on a shared channel and picked up by
//! whichever worker is free. Each submission returns a [`TaskCompletion`]
//! future that resolves exactly once with the task's output, on the
//! executor of whoever awaits it.

use crate::octree::decoder::{self, DecodeError, DecodeTask, DecodedNode};
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::channel::oneshot;
use std::any::Any;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, trace};

const FALLBACK_WORKER_COUNT: usize = 4;

#[derive(Error, Debug)]
pub enum WorkerPoolError {
    #[error("Unable to spawn decoder worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    BinaryDecoder,
}

#[derive(Debug)]
pub enum WorkerTask {
    BinaryDecode(DecodeTask),
}

impl WorkerTask {
    pub fn kind(&self) -> TaskKind {
        match self {
            WorkerTask::BinaryDecode(_) => TaskKind::BinaryDecoder,
        }
    }

    fn run(self) -> WorkerOutput {
        match self {
            WorkerTask::BinaryDecode(task) => WorkerOutput::BinaryDecode(decoder::decode(task)),
        }
    }
}

#[derive(Debug)]
pub enum WorkerOutput {
    BinaryDecode(Result<DecodedNode, DecodeError>),
}

impl WorkerOutput {
    fn failed(kind: TaskKind, error: DecodeError) -> Self {
        match kind {
            TaskKind::BinaryDecoder => WorkerOutput::BinaryDecode(Err(error)),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            WorkerOutput::BinaryDecode(_) => TaskKind::BinaryDecoder,
        }
    }

    pub fn into_decoded(self) -> Result<DecodedNode, DecodeError> {
        match self {
            WorkerOutput::BinaryDecode(result) => result,
        }
    }
}

struct Job {
    task: WorkerTask,
    reply: oneshot::Sender<WorkerOutput>,
}

/// Resolves once with the output of a submitted task.
///
/// If the task can no longer run (pool shut down, worker gone) the output
/// carries [`DecodeError::WorkerUnavailable`].
#[must_use = "the task output is only observable by awaiting the completion"]
pub struct TaskCompletion {
    kind: TaskKind,
    receiver: oneshot::Receiver<WorkerOutput>,
}

impl Future for TaskCompletion {
    type Output = WorkerOutput;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let kind = this.kind;

        Pin::new(&mut this.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| WorkerOutput::failed(kind, DecodeError::WorkerUnavailable))
        })
    }
}

pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(FALLBACK_WORKER_COUNT)
}

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.workers.len())
            .field("running", &self.sender.is_some())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    pub fn new(size: usize) -> Result<Self, WorkerPoolError> {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(size),
        };

        for index in 0..size {
            let jobs = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("potree-decoder-{index}"))
                .spawn(move || worker_loop(index, jobs))?;
            pool.workers.push(handle);
        }

        debug!(size, "worker pool started");
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `task`. Its buffers move into the pool with it.
    pub fn run_task(&self, task: WorkerTask) -> TaskCompletion {
        let kind = task.kind();
        let (reply, receiver) = oneshot::channel();

        match &self.sender {
            Some(sender) => {
                if sender.send(Job { task, reply }).is_err() {
                    error!(?kind, "no decoder worker left to accept the task");
                }
            }
            None => {
                error!(?kind, "task submitted to a stopped worker pool");
                drop(reply);
            }
        }

        TaskCompletion { kind, receiver }
    }

    /// Close the queue and wait for the workers to drain it.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            join_worker(handle);
        }
    }
}

/// Wait for a worker to exit. Returns `false`, after logging, if it died.
fn join_worker(handle: JoinHandle<()>) -> bool {
    let name = handle.thread().name().unwrap_or("decoder").to_string();
    match handle.join() {
        Ok(()) => true,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(worker = %name, %message, "decoder worker died");
            false
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, jobs: Receiver<Job>) {
    while let Ok(Job { task, reply }) = jobs.recv() {
        let kind = task.kind();
        trace!(worker = index, ?kind, "task started");

        let output = panic::catch_unwind(AssertUnwindSafe(|| task.run())).unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(worker = index, ?kind, %message, "decoder task panicked");
            WorkerOutput::failed(kind, DecodeError::WorkerPanicked(message))
        });

        if reply.send(output).is_err() {
            trace!(worker = index, ?kind, "completion dropped before delivery");
        }
    }
    debug!(worker = index, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
