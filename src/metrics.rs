//! Run metrics
//!
//! Counters for one run, rendered in the Prometheus text format.

use std::sync::atomic::{AtomicU64, Ordering};

/// Step outcome counters
#[derive(Debug, Default)]
pub struct RunMetrics {
    /// Steps that passed
    pub steps_passed: AtomicU64,
    /// Steps that failed on their final attempt
    pub steps_failed: AtomicU64,
    /// Steps that were not run because they were pending
    pub steps_pending: AtomicU64,
    /// Failures whose cascade was applied
    pub cascades_applied: AtomicU64,
    /// Steps made pending by a cascade
    pub steps_cascaded: AtomicU64,
    /// Failed attempts that were retried
    pub retries: AtomicU64,
    /// Hooks that failed
    pub hook_failures: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_passed(&self) {
        self.steps_passed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_failed(&self) {
        self.steps_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_pending(&self) {
        self.steps_pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Record an applied cascade that made `marked` steps pending
    pub fn record_cascade(&self, marked: usize) {
        self.cascades_applied.fetch_add(1, Ordering::SeqCst);
        self.steps_cascaded.fetch_add(marked as u64, Ordering::SeqCst);
    }

    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_hook_failures(&self) {
        self.hook_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Get current metrics as a Prometheus-formatted string
    pub fn render(&self) -> String {
        let mut output = String::new();

        let counters: [(&str, &str, &AtomicU64); 7] = [
            ("gherkin_steps_passed_total", "Steps that passed", &self.steps_passed),
            (
                "gherkin_steps_failed_total",
                "Steps that failed on their final attempt",
                &self.steps_failed,
            ),
            (
                "gherkin_steps_pending_total",
                "Steps reported pending",
                &self.steps_pending,
            ),
            (
                "gherkin_cascades_applied_total",
                "Failures whose cascade was applied",
                &self.cascades_applied,
            ),
            (
                "gherkin_steps_cascaded_total",
                "Steps made pending by a cascade",
                &self.steps_cascaded,
            ),
            (
                "gherkin_step_retries_total",
                "Failed attempts that were retried",
                &self.retries,
            ),
            (
                "gherkin_hook_failures_total",
                "Hooks that failed",
                &self.hook_failures,
            ),
        ];

        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {name} {help}\n"));
            output.push_str(&format!("# TYPE {name} counter\n"));
            output.push_str(&format!("{name} {}\n", value.load(Ordering::SeqCst)));
        }

        output
    }
}
