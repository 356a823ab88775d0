//! Step records
//!
//! A step is one `Given`/`When`/`Then`/`And`/`But` line of a scenario together with
//! its body, pending state and retry bookkeeping.

use std::fmt;

use serde::Serialize;

use crate::body::{Body, BodyView};

/// Gherkin step keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StepKind {
    Given,
    When,
    Then,
    And,
    But,
}

impl StepKind {
    /// `Given`, `When` and `Then` open a new block of the scenario
    pub fn is_main(self) -> bool {
        matches!(self, StepKind::Given | StepKind::When | StepKind::Then)
    }

    /// `And` and `But` extend the nearest preceding main step
    pub fn is_complement(self) -> bool {
        !self.is_main()
    }

    pub fn keyword(self) -> &'static str {
        match self {
            StepKind::Given => "Given",
            StepKind::When => "When",
            StepKind::Then => "Then",
            StepKind::And => "And",
            StepKind::But => "But",
        }
    }

    /// Parse a keyword, ignoring ASCII case
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        [
            StepKind::Given,
            StepKind::When,
            StepKind::Then,
            StepKind::And,
            StepKind::But,
        ]
        .into_iter()
        .find(|kind| kind.keyword().eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Why a step will not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum PendingReason {
    /// Declared without a body or through a `skip` variant
    Declared,
    /// Marked by the cascade after the step at `after` failed
    Cascade { after: usize },
}

/// Execution state of a step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    #[default]
    NotRun,
    Running,
    Passed,
    Failed,
    Pending,
}

/// A single step of a group
pub struct Step<W> {
    pub(crate) title: String,
    pub(crate) kind: StepKind,
    pub(crate) ordinal: usize,
    pub(crate) body: Option<Body<W>>,
    pub(crate) pending: Option<PendingReason>,
    pub(crate) retries: u32,
    pub(crate) current_retry: u32,
    pub(crate) state: StepState,
}

impl<W> Step<W> {
    /// Create a step; a step without a body is pending from the start
    pub fn new(kind: StepKind, title: impl Into<String>, body: Option<Body<W>>) -> Self {
        let pending = body.is_none().then_some(PendingReason::Declared);
        Self {
            title: title.into(),
            kind,
            ordinal: 0,
            body,
            pending,
            retries: 0,
            current_retry: 0,
            state: StepState::NotRun,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Keyword and title, e.g. `Given a user`
    pub fn label(&self) -> String {
        format!("{} {}", self.kind, self.title)
    }

    /// Label prefixed with the full title of the owning group
    pub fn full_title(&self, group_full_title: &str) -> String {
        if group_full_title.is_empty() {
            self.label()
        } else {
            format!("{group_full_title} {}", self.label())
        }
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    /// Position within the owning group's step list
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn body(&self) -> Option<&Body<W>> {
        self.body.as_ref()
    }

    /// The body as reporting tools should see it
    pub fn visible_body(&self) -> Option<BodyView<'_>> {
        self.body.as_ref().map(Body::view)
    }

    /// Author-supplied source of the body
    pub fn display_body(&self) -> Option<&str> {
        self.body.as_ref().map(Body::display)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_reason(&self) -> Option<PendingReason> {
        self.pending
    }

    /// Mark the step pending. A step that is already pending keeps its first reason;
    /// there is no way back to active within a run.
    pub fn mark_pending(&mut self, reason: PendingReason) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(reason);
        true
    }

    /// Retry budget
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn set_retries(&mut self, retries: u32) -> &mut Self {
        self.retries = retries;
        self
    }

    /// Zero-based attempt currently being run
    pub fn current_retry(&self) -> u32 {
        self.current_retry
    }

    pub(crate) fn set_current_retry(&mut self, attempt: u32) {
        self.current_retry = attempt;
    }

    /// Whether a failure on the current attempt will be retried
    pub fn has_retries_left(&self) -> bool {
        self.current_retry < self.retries
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: StepState) {
        self.state = state;
    }
}

impl<W> fmt::Debug for Step<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("title", &self.title)
            .field("kind", &self.kind)
            .field("ordinal", &self.ordinal)
            .field("body", &self.body)
            .field("pending", &self.pending)
            .field("retries", &self.retries)
            .field("current_retry", &self.current_retry)
            .field("state", &self.state)
            .finish()
    }
}
