//! Suite runner
//!
//! Walks the group tree depth first, a group's own steps before its children. Each
//! top-level group gets a fresh world which its descendants share.

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use tracing::{debug, info, warn};

use crate::adapter::ExecutionAdapter;
use crate::builder::{Selection, Suite};
use crate::cascade::CascadeOutcome;
use crate::config::RunConfig;
use crate::group::{Group, GroupKind, Hook, Hooks};
use crate::metrics::RunMetrics;
use crate::report::{HookFailure, PendingCause, Report, StepReport, StepStatus};
use crate::step::{Step, StepState};

/// Executes a [`Suite`] and collects a [`Report`]
#[derive(Debug)]
pub struct Runner {
    adapter: ExecutionAdapter,
    metrics: RunMetrics,
}

/// Outcome of running one step through its attempts
struct StepRun {
    status: StepStatus,
    attempts: u32,
    /// No `before_each`/`after_each` hook failed
    hooks_ok: bool,
}

/// Position of a group in the walk
struct Scope<'a, W> {
    /// `before_each`/`after_each` owners, outermost first
    hooks: Vec<&'a Hooks<W>>,
    /// An ancestor group is pending
    pending: bool,
    /// An ancestor's `before` hook failed
    blocked: bool,
    selection: &'a Selection,
}

impl<'a, W> Scope<'a, W> {
    fn nest(&self, hooks: &'a Hooks<W>, pending: bool, blocked: bool) -> Self {
        let mut chain = self.hooks.clone();
        chain.push(hooks);
        Self {
            hooks: chain,
            pending,
            blocked,
            selection: self.selection,
        }
    }
}

impl Runner {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            adapter: ExecutionAdapter::new(config),
            metrics: RunMetrics::new(),
        }
    }

    /// A runner configured like the suite it will run
    pub fn for_suite<W>(suite: &Suite<W>) -> Self {
        Self::new(suite.config())
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn adapter(&self) -> &ExecutionAdapter {
        &self.adapter
    }

    /// Run every group of the suite
    pub async fn run<W: Default>(&self, suite: &mut Suite<W>) -> Report {
        let mut report = Report::new();
        let (root, selection) = suite.parts_mut();
        let scope = Scope {
            hooks: Vec::new(),
            pending: false,
            blocked: false,
            selection,
        };
        let mut world = W::default();

        info!(
            steps = root.total_steps(),
            mode = %self.adapter.controller().mode(),
            "run started"
        );
        self.run_group(root, scope, &mut world, &mut report).await;

        let summary = report.summary();
        info!(
            passed = summary.passed,
            failed = summary.failed,
            pending = summary.pending,
            not_run = summary.not_run,
            "run finished"
        );
        report
    }

    /// Run the suite on a fresh single-threaded runtime
    ///
    /// Must not be called from within a tokio runtime.
    pub fn run_blocking<W: Default>(&self, suite: &mut Suite<W>) -> eyre::Result<Report> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.run(suite)))
    }

    fn run_group<'a, W: Default + 'a>(
        &'a self,
        group: &'a mut Group<W>,
        scope: Scope<'a, W>,
        world: &'a mut W,
        report: &'a mut Report,
    ) -> LocalBoxFuture<'a, ()> {
        async move {
            // Under `only`, groups with no selected step never run their hooks
            let selected = !scope.selection.is_active()
                || group.any_step_admitted(&|title: &str| scope.selection.admits(title));

            let Group {
                kind,
                full_title,
                file,
                pending,
                hooks,
                steps,
                children,
                ..
            } = group;
            let kind = *kind;
            let full_title = full_title.as_str();
            let file = file.as_deref();
            let hooks: &Hooks<W> = hooks;

            let pending = scope.pending || *pending;
            let mut blocked = scope.blocked;
            let runnable = !pending && !blocked && selected;

            debug!(group = %full_title, pending, blocked, selected, "entering group");

            if runnable && !self.run_hooks(&hooks.before, full_title, world, report) {
                blocked = true;
            }
            let ran_before = runnable && !blocked;

            let scope = scope.nest(hooks, pending, blocked);

            for index in 0..steps.len() {
                let step = &steps.as_slice()[index];
                let step_title = step.full_title(full_title);

                if !scope.selection.admits(&step_title) {
                    debug!(step = %step_title, "step not selected");
                    continue;
                }

                let mut entry = StepReport {
                    full_title: step_title,
                    title: step.title().to_string(),
                    kind: step.kind(),
                    ordinal: step.ordinal(),
                    anchor: steps.anchor_of(index),
                    file: file.map(str::to_string),
                    status: StepStatus::NotRun,
                    attempts: 0,
                    body: step.display_body().map(str::to_string),
                };

                let own_reason = step.pending_reason();
                if pending || own_reason.is_some() {
                    let cause = own_reason.map_or(PendingCause::GroupPending, PendingCause::from);
                    debug!(step = %entry.full_title, cause = ?cause, "step pending");
                    steps.as_mut_slice()[index].set_state(StepState::Pending);
                    self.metrics.inc_pending();
                    entry.status = StepStatus::Pending { cause };
                    report.steps.push(entry);
                    continue;
                }

                if blocked {
                    report.steps.push(entry);
                    continue;
                }

                let run = self
                    .run_step(
                        steps.as_mut_slice(),
                        index,
                        world,
                        &scope.hooks,
                        full_title,
                        report,
                    )
                    .await;
                entry.status = run.status;
                entry.attempts = run.attempts;
                report.steps.push(entry);
                blocked |= !run.hooks_ok;
            }

            for child in children.iter_mut() {
                let nested = Scope {
                    hooks: scope.hooks.clone(),
                    pending,
                    blocked,
                    selection: scope.selection,
                };
                if kind == GroupKind::Root {
                    let mut fresh = W::default();
                    self.run_group(child, nested, &mut fresh, report).await;
                } else {
                    self.run_group(child, nested, world, report).await;
                }
            }

            if ran_before {
                self.run_hooks(&hooks.after, full_title, world, report);
            }
        }
        .boxed_local()
    }

    /// Run one step through its attempts, each wrapped in the `before_each` and
    /// `after_each` hooks of `hooks`
    async fn run_step<W>(
        &self,
        steps: &mut [Step<W>],
        index: usize,
        world: &mut W,
        hooks: &[&Hooks<W>],
        group: &str,
        report: &mut Report,
    ) -> StepRun {
        let retries = steps[index].retries();
        let mut status = StepStatus::NotRun;
        let mut attempt = 0;
        loop {
            let before_each = hooks.iter().flat_map(|h| h.before_each.iter());
            if !self.run_hook_list(before_each, group, world, report) {
                return StepRun {
                    status,
                    attempts: attempt,
                    hooks_ok: false,
                };
            }

            steps[index].set_current_retry(attempt);
            let retry = match self.adapter.execute(steps, index, world).await {
                Ok(()) => {
                    self.metrics.inc_passed();
                    status = StepStatus::Passed;
                    false
                }
                Err(failure) => {
                    status = StepStatus::Failed {
                        message: failure.error.to_string(),
                    };
                    match failure.cascade {
                        CascadeOutcome::Deferred { .. } if attempt < retries => {
                            self.metrics.inc_retries();
                            debug!(attempt, retries, "retrying step");
                            true
                        }
                        CascadeOutcome::Deferred { .. } => {
                            self.metrics.inc_failed();
                            false
                        }
                        CascadeOutcome::Applied { ref range, marked } => {
                            self.metrics.inc_failed();
                            if !range.is_empty() {
                                self.metrics.record_cascade(marked);
                            }
                            false
                        }
                    }
                }
            };
            attempt += 1;

            let after_each = hooks.iter().rev().flat_map(|h| h.after_each.iter());
            let hooks_ok = self.run_hook_list(after_each, group, world, report);
            if !hooks_ok && retry {
                // The retry is abandoned; the failed attempt stands
                self.metrics.inc_failed();
            }
            if !retry || !hooks_ok {
                return StepRun {
                    status,
                    attempts: attempt,
                    hooks_ok,
                };
            }
        }
    }

    fn run_hooks<W>(
        &self,
        hooks: &[Hook<W>],
        group: &str,
        world: &mut W,
        report: &mut Report,
    ) -> bool {
        self.run_hook_list(hooks.iter(), group, world, report)
    }

    /// Run hooks in order, stopping at the first failure. Returns `false` on failure.
    fn run_hook_list<'h, W: 'h>(
        &self,
        hooks: impl Iterator<Item = &'h Hook<W>>,
        group: &str,
        world: &mut W,
        report: &mut Report,
    ) -> bool {
        for hook in hooks {
            if let Err(err) = (hook.f)(world) {
                warn!(group = %group, hook = %hook.title, error = %err, "hook failed");
                self.metrics.inc_hook_failures();
                report.hook_failures.push(HookFailure {
                    group: group.to_string(),
                    hook: hook.title.clone(),
                    message: format!("{err:#}"),
                });
                return false;
            }
        }
        true
    }
}
