//! Drives the [`Converter`] over a list of files on a worker thread.
//!
//! A job goes `Idle -> Running -> Completed`. Every input is attempted
//! exactly once, in order; a failure never stops the rest of the queue.
//! Observers get events through [`BatchEvents`], which the worker calls
//! inline, so implementations must return promptly (the channel sink below
//! never blocks).

use crate::{
    converter::Converter,
    report::{BatchReport, FileReport},
    util::{display_name, now_rfc3339},
};
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Receives batch notifications. All methods default to no-ops.
pub trait BatchEvents: Send {
    /// `index` is 1-based.
    fn on_progress(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    fn on_file_done(&self, path: &Path, success: bool, message: &str) {
        let _ = (path, success, message);
    }

    fn on_batch_done(&self, success_count: usize, fail_count: usize) {
        let _ = (success_count, fail_count);
    }
}

/// Owned form of the [`BatchEvents`] callbacks, for channel delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Progress {
        index: usize,
        total: usize,
        filename: String,
    },
    FileDone {
        path: PathBuf,
        success: bool,
        message: String,
    },
    BatchDone {
        success_count: usize,
        fail_count: usize,
    },
}

impl BatchEvents for Sender<BatchEvent> {
    fn on_progress(&self, index: usize, total: usize, filename: &str) {
        let _ = self.send(BatchEvent::Progress {
            index,
            total,
            filename: filename.to_string(),
        });
    }

    fn on_file_done(&self, path: &Path, success: bool, message: &str) {
        let _ = self.send(BatchEvent::FileDone {
            path: path.to_path_buf(),
            success,
            message: message.to_string(),
        });
    }

    fn on_batch_done(&self, success_count: usize, fail_count: usize) {
        let _ = self.send(BatchEvent::BatchDone {
            success_count,
            fail_count,
        });
    }
}

/// Discards every event.
pub struct NoEvents;

impl BatchEvents for NoEvents {}

type OutputFn = Box<dyn Fn(&Path) -> Option<PathBuf> + Send>;

/// Ordered inputs plus how each maps to an output path. `None` from the
/// mapping lets the converter place the file per preferences.
pub struct BatchJob {
    inputs: Vec<PathBuf>,
    output_for: OutputFn,
    forced_engine: Option<String>,
}

impl BatchJob {
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            output_for: Box::new(|_| None),
            forced_engine: None,
        }
    }

    pub fn with_output<F>(mut self, output_for: F) -> Self
    where
        F: Fn(&Path) -> Option<PathBuf> + Send + 'static,
    {
        self.output_for = Box::new(output_for);
        self
    }

    pub fn with_engine(mut self, engine_id: impl Into<String>) -> Self {
        self.forced_engine = Some(engine_id.into());
        self
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
}

/// Handle to one runner; clones share the same state and converter.
#[derive(Clone)]
pub struct BatchRunner {
    converter: Arc<Converter>,
    min_duration: Duration,
    state: Arc<Mutex<BatchState>>,
}

impl BatchRunner {
    pub fn new(converter: Arc<Converter>, min_duration: Duration) -> Self {
        Self {
            converter,
            min_duration,
            state: Arc::new(Mutex::new(BatchState::Idle)),
        }
    }

    pub fn state(&self) -> BatchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the worker for `job`. Fails if a job is already running.
    pub fn start<E>(&self, job: BatchJob, events: E) -> Result<JoinHandle<BatchReport>>
    where
        E: BatchEvents + 'static,
    {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == BatchState::Running {
                bail!("a batch is already running");
            }
            *state = BatchState::Running;
        }

        let converter = Arc::clone(&self.converter);
        let state = Arc::clone(&self.state);
        let min_duration = self.min_duration;

        let spawned = std::thread::Builder::new()
            .name("mdconvert-batch".into())
            .spawn(move || {
                let mut finish = CompleteOnDrop::new(state);
                run_job(&converter, min_duration, job, &events, &mut finish)
            });

        if spawned.is_err() {
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) = BatchState::Idle;
        }
        spawned.with_context(|| "spawning batch worker")
    }
}

/// Moves the runner to `Completed` exactly once: explicitly at the end of a
/// job, or on drop if the worker unwinds first.
struct CompleteOnDrop {
    state: Arc<Mutex<BatchState>>,
    armed: bool,
}

impl CompleteOnDrop {
    fn new(state: Arc<Mutex<BatchState>>) -> Self {
        Self { state, armed: true }
    }

    fn complete(&mut self) {
        if self.armed {
            self.armed = false;
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) = BatchState::Completed;
        }
    }
}

impl Drop for CompleteOnDrop {
    fn drop(&mut self) {
        if self.armed {
            warn!("batch worker stopped before finishing its job");
            self.complete();
        }
    }
}

fn run_job(
    converter: &Converter,
    min_duration: Duration,
    job: BatchJob,
    events: &dyn BatchEvents,
    finish: &mut CompleteOnDrop,
) -> BatchReport {
    let clock = Instant::now();
    let started = now_rfc3339();
    let total = job.inputs.len();
    info!("batch start files={total}");

    let mut files = Vec::with_capacity(total);
    let mut success_count = 0;
    let mut fail_count = 0;

    for (i, input) in job.inputs.iter().enumerate() {
        let output = (job.output_for)(input);
        let result = converter.convert(input, output.as_deref(), job.forced_engine.as_deref());

        let (success, message) = match (result.output_path(), result.error()) {
            (Some(out), _) => (true, out.display().to_string()),
            (None, Some(err)) => (false, err.to_string()),
            (None, None) => (false, String::new()),
        };
        let message = if message.is_empty() && !success {
            "Unknown error".to_string()
        } else {
            message
        };

        if success {
            success_count += 1;
        } else {
            fail_count += 1;
            warn!("{} failed: {message}", input.display());
        }

        events.on_progress(i + 1, total, &display_name(input));
        events.on_file_done(input, success, &message);

        files.push(FileReport {
            input: input.clone(),
            success,
            message,
            warnings: result.warnings().to_vec(),
        });
    }

    let elapsed = clock.elapsed();
    if elapsed < min_duration {
        debug!("holding batch for {:?} to reach the minimum", min_duration - elapsed);
        std::thread::sleep(min_duration - elapsed);
    }

    info!("batch done ok={success_count} failed={fail_count}");
    // Completed before the tally so a subscriber may start the next job.
    finish.complete();
    events.on_batch_done(success_count, fail_count);

    BatchReport {
        started,
        finished: now_rfc3339(),
        success_count,
        fail_count,
        files,
    }
}
