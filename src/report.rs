//! Run report
//!
//! Every step that took part in a run, in execution order, with its final status.

use serde::Serialize;

use crate::step::{PendingReason, StepKind};

/// Why a reported step was pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingCause {
    /// Declared without a body or inside a `skip` group
    Declared,
    /// Its group, or an ancestor group, was pending
    GroupPending,
    /// A failure of the step at `after` cascaded over it
    Cascade { after: usize },
}

impl From<PendingReason> for PendingCause {
    fn from(reason: PendingReason) -> Self {
        match reason {
            PendingReason::Declared => PendingCause::Declared,
            PendingReason::Cascade { after } => PendingCause::Cascade { after },
        }
    }
}

/// Final status of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StepStatus {
    Passed,
    Failed { message: String },
    Pending { cause: PendingCause },
    /// A hook failure prevented the step from running
    NotRun,
}

impl StepStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, StepStatus::Pending { .. })
    }
}

/// One step's entry in the report
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub full_title: String,
    pub title: String,
    pub kind: StepKind,
    pub ordinal: usize,
    /// Main step this step belongs to
    pub anchor: Option<usize>,
    pub file: Option<String>,
    #[serde(flatten)]
    pub status: StepStatus,
    /// Attempts made; zero when the step never ran
    pub attempts: u32,
    /// Authored body as a reporter displays it
    pub body: Option<String>,
}

/// A failed hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFailure {
    pub group: String,
    pub hook: String,
    pub message: String,
}

/// Step counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    pub not_run: usize,
}

/// Outcome of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub hook_failures: Vec<HookFailure>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a step by its full title
    pub fn step(&self, full_title: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.full_title == full_title)
    }

    /// Steps whose full title ends with `suffix`
    pub fn steps_ending_with<'a>(
        &'a self,
        suffix: &'a str,
    ) -> impl Iterator<Item = &'a StepReport> + 'a {
        self.steps.iter().filter(move |s| s.full_title.ends_with(suffix))
    }

    pub fn summary(&self) -> Summary {
        self.steps
            .iter()
            .fold(Summary::default(), |mut summary, step| {
                match step.status {
                    StepStatus::Passed => summary.passed += 1,
                    StepStatus::Failed { .. } => summary.failed += 1,
                    StepStatus::Pending { .. } => summary.pending += 1,
                    StepStatus::NotRun => summary.not_run += 1,
                }
                summary
            })
    }

    /// No step failed and no hook failed
    pub fn is_success(&self) -> bool {
        self.hook_failures.is_empty() && self.summary().failed == 0
    }

    pub fn to_json(&self) -> eyre::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
