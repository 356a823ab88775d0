//! Execution adapter
//!
//! Runs a step body under any of its calling conventions and funnels every kind of
//! failure (returned error, panic, failed future, callback failure, out-of-band failure,
//! timeout) into one signal that drives the cascade.

mod observer;

pub use observer::{ObserverError, ObserverSlot, Registration};

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::body::{Body, Done, Executable};
use crate::cascade::{CascadeController, CascadeOutcome};
use crate::config::RunConfig;
use crate::step::{Step, StepState};

/// Why a step failed
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{0:#}")]
    Failed(eyre::Report),

    #[error("step panicked: {0}")]
    Panicked(String),

    #[error("uncaught failure while step was in flight: {0:#}")]
    Uncaught(eyre::Report),

    #[error("completion handle was dropped before the step completed")]
    Abandoned,

    #[error("step timed out after {0} ms")]
    TimedOut(u64),

    #[error("no step at index {0}")]
    Missing(usize),

    #[error(transparent)]
    Observer(#[from] ObserverError),
}

/// A step failure together with what the cascade did about it
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct StepFailure {
    #[source]
    pub error: StepError,
    pub cascade: CascadeOutcome,
}

/// Drives step bodies for one run
#[derive(Debug)]
pub struct ExecutionAdapter {
    controller: CascadeController,
    timeout_ms: u64,
    observer: ObserverSlot,
}

impl ExecutionAdapter {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            controller: CascadeController::new(config.skip_mode),
            timeout_ms: config.timeout_ms,
            observer: ObserverSlot::new(),
        }
    }

    pub fn controller(&self) -> &CascadeController {
        &self.controller
    }

    pub fn observer(&self) -> &ObserverSlot {
        &self.observer
    }

    /// Run `steps[index]` once
    ///
    /// On failure the cascade is applied before the error is handed back, so the caller
    /// always sees the failure. The step's visible body is the authored one again on
    /// every return path.
    pub async fn execute<W>(
        &self,
        steps: &mut [Step<W>],
        index: usize,
        world: &mut W,
    ) -> Result<(), StepFailure> {
        if index >= steps.len() {
            return Err(StepFailure {
                error: StepError::Missing(index),
                cascade: CascadeOutcome::Applied {
                    range: steps.len()..steps.len(),
                    marked: 0,
                },
            });
        }

        let step = &mut steps[index];

        let label = step.label();
        let Some(body) = step.body.as_mut() else {
            debug!(step = %label, "step has no body, nothing to run");
            return Ok(());
        };
        body.wrap();
        step.set_state(StepState::Running);

        let result = match steps[index].body.as_ref() {
            Some(body) => self.invoke(body, world, &label).await,
            None => Ok(()),
        };

        let step = &mut steps[index];
        if let Some(body) = step.body.as_mut() {
            body.restore();
        }

        match result {
            Ok(()) => {
                step.set_state(StepState::Passed);
                debug!(step = %label, attempt = step.current_retry(), "step passed");
                Ok(())
            }
            Err(error) => {
                step.set_state(StepState::Failed);
                warn!(
                    step = %label,
                    attempt = step.current_retry(),
                    error = %error,
                    "step failed"
                );
                let cascade = self.controller.on_failure(steps, index);
                Err(StepFailure { error, cascade })
            }
        }
    }

    async fn invoke<W>(
        &self,
        body: &Body<W>,
        world: &mut W,
        label: &str,
    ) -> Result<(), StepError> {
        match &body.exec {
            Executable::Sync(f) => match catch_unwind(AssertUnwindSafe(|| f(world))) {
                Ok(result) => result.map_err(StepError::Failed),
                Err(panic) => Err(StepError::Panicked(panic_message(panic.as_ref()))),
            },
            Executable::Future(f) => {
                let fut = AssertUnwindSafe(async move { f(world).await }).catch_unwind();
                match self.bounded(fut).await? {
                    Ok(result) => result.map_err(StepError::Failed),
                    Err(panic) => Err(StepError::Panicked(panic_message(panic.as_ref()))),
                }
            }
            Executable::Callback(f) => {
                let (done, done_rx, mut fail_rx) = Done::channel();
                let mut registration = self.observer.install(label)?;

                let result = match catch_unwind(AssertUnwindSafe(|| f(world, done))) {
                    Err(panic) => Err(StepError::Panicked(panic_message(panic.as_ref()))),
                    Ok(()) => {
                        let settled = async {
                            tokio::select! {
                                biased;
                                Some(err) = fail_rx.recv() => Err(StepError::Uncaught(err)),
                                completion = done_rx => match completion {
                                    Ok(result) => result.map_err(StepError::Failed),
                                    Err(_) => Err(StepError::Abandoned),
                                },
                            }
                        };
                        self.bounded(settled).await.and_then(|settled| settled)
                    }
                };

                // Tokens held by stray tasks go inert before the slot is reused
                fail_rx.close();
                registration.release();
                result
            }
        }
    }

    /// Apply the configured timeout, if any
    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, StepError> {
        if self.timeout_ms == 0 {
            return Ok(fut.await);
        }
        tokio::time::timeout(Duration::from_millis(self.timeout_ms), fut)
            .await
            .map_err(|_| StepError::TimedOut(self.timeout_ms))
    }
}

/// Text of a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
