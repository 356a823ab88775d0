//! Cascading skip of steps after a failure
//!
//! When a step fails for the last time, the steps that depend on it are marked pending
//! so they are reported as skipped instead of as unrelated failures.

use std::ops::Range;

use tracing::{debug, info};

use crate::config::SkipMode;
use crate::step::{PendingReason, Step, StepKind};

/// Compute which steps become pending after the step at `failed` fails
///
/// The range is empty in `original` mode, when the failing step is the last one, or when
/// `moderate` mode finds no main step after the failure.
pub fn cascade_range(kinds: &[StepKind], failed: usize, mode: SkipMode) -> Range<usize> {
    let len = kinds.len();
    let start = match mode {
        SkipMode::Original => len,
        SkipMode::Absolute => failed.saturating_add(1).min(len),
        SkipMode::Moderate => next_main_index(kinds, failed),
    };
    start..len
}

/// Index of the first main step after `failed`, or `kinds.len()` if there is none
fn next_main_index(kinds: &[StepKind], failed: usize) -> usize {
    let from = failed.saturating_add(1).min(kinds.len());
    kinds[from..]
        .iter()
        .position(|kind| kind.is_main())
        .map_or(kinds.len(), |offset| from + offset)
}

/// What the controller did about a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// The step still has retries left; nothing was marked
    Deferred { attempt: u32, retries: u32 },
    /// The cascade ran over `range`; `marked` steps were newly made pending
    Applied { range: Range<usize>, marked: usize },
}

impl CascadeOutcome {
    /// Number of steps this failure made pending
    pub fn marked(&self) -> usize {
        match self {
            CascadeOutcome::Deferred { .. } => 0,
            CascadeOutcome::Applied { marked, .. } => *marked,
        }
    }
}

/// Applies the skip mode to a group's sealed step list
#[derive(Debug, Clone, Copy)]
pub struct CascadeController {
    mode: SkipMode,
}

impl CascadeController {
    pub fn new(mode: SkipMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SkipMode {
        self.mode
    }

    /// Handle a failure of `steps[failed]`
    ///
    /// Failures that will be retried do not cascade. Otherwise every step in the cascade
    /// range is marked pending; steps that were already pending keep their reason.
    pub fn on_failure<W>(&self, steps: &mut [Step<W>], failed: usize) -> CascadeOutcome {
        let Some(step) = steps.get(failed) else {
            return CascadeOutcome::Applied {
                range: steps.len()..steps.len(),
                marked: 0,
            };
        };

        if step.has_retries_left() {
            debug!(
                step = %step.label(),
                attempt = step.current_retry(),
                retries = step.retries(),
                "failure will be retried, cascade deferred"
            );
            return CascadeOutcome::Deferred {
                attempt: step.current_retry(),
                retries: step.retries(),
            };
        }

        let kinds: Vec<StepKind> = steps.iter().map(Step::kind).collect();
        let range = cascade_range(&kinds, failed, self.mode);

        let mut marked = 0;
        for step in &mut steps[range.clone()] {
            if step.mark_pending(PendingReason::Cascade { after: failed }) {
                marked += 1;
            }
        }

        if marked > 0 {
            info!(
                mode = %self.mode,
                failed,
                from = range.start,
                marked,
                "cascading skip applied"
            );
        }

        CascadeOutcome::Applied { range, marked }
    }
}
