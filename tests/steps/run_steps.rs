//! Step definitions that run the suite and inspect its report

use cucumber::{then, when};
use gherkin_ui::{PendingCause, StepReport, StepStatus};

use crate::world::GherkinWorld;

fn reported<'a>(world: &'a GherkinWorld, title: &str) -> &'a StepReport {
    world
        .report()
        .steps
        .iter()
        .find(|s| s.title == title)
        .unwrap_or_else(|| panic!("Step '{title}' was not reported"))
}

// ============================================================================
// When steps
// ============================================================================

#[when("the suite runs")]
fn when_suite_runs(world: &mut GherkinWorld) {
    world.run_suite();
}

// ============================================================================
// Then steps
// ============================================================================

#[then(expr = "step {string} should have passed")]
fn then_step_passed(world: &mut GherkinWorld, title: String) {
    let step = reported(world, &title);
    assert_eq!(
        step.status,
        StepStatus::Passed,
        "Expected '{title}' to pass"
    );
}

#[then(expr = "step {string} should have failed")]
fn then_step_failed(world: &mut GherkinWorld, title: String) {
    let step = reported(world, &title);
    assert!(
        matches!(step.status, StepStatus::Failed { .. }),
        "Expected '{title}' to fail, got {:?}",
        step.status
    );
}

#[then(expr = "step {string} should have failed with {string}")]
fn then_step_failed_with(world: &mut GherkinWorld, title: String, fragment: String) {
    let step = reported(world, &title);
    match &step.status {
        StepStatus::Failed { message } => assert!(
            message.contains(&fragment),
            "Expected failure of '{title}' to mention '{fragment}', got '{message}'"
        ),
        other => panic!("Expected '{title}' to fail, got {other:?}"),
    }
}

#[then(expr = "step {string} should be pending after step {int}")]
fn then_step_cascaded(world: &mut GherkinWorld, title: String, after: usize) {
    let step = reported(world, &title);
    assert_eq!(
        step.status,
        StepStatus::Pending {
            cause: PendingCause::Cascade { after }
        }
    );
}

#[then(expr = "step {string} should be pending as declared")]
fn then_step_declared_pending(world: &mut GherkinWorld, title: String) {
    let step = reported(world, &title);
    assert_eq!(
        step.status,
        StepStatus::Pending {
            cause: PendingCause::Declared
        }
    );
}

#[then(expr = "step {string} should have taken {int} attempt(s)")]
fn then_step_attempts(world: &mut GherkinWorld, title: String, attempts: u32) {
    assert_eq!(reported(world, &title).attempts, attempts);
}

#[then(expr = "step {string} should not be reported")]
fn then_step_not_reported(world: &mut GherkinWorld, title: String) {
    assert!(
        world.report().steps.iter().all(|s| s.title != title),
        "Expected '{title}' to be left out of the run"
    );
}

#[then(expr = "{int} step(s) should be pending")]
fn then_pending_count(world: &mut GherkinWorld, count: usize) {
    assert_eq!(world.report().summary().pending, count);
}

#[then(expr = "{int} step(s) should have passed")]
fn then_passed_count(world: &mut GherkinWorld, count: usize) {
    assert_eq!(world.report().summary().passed, count);
}

#[then("the report should serialize to JSON")]
fn then_report_json(world: &mut GherkinWorld) {
    let json = world.report().to_json().expect("Should serialize report");
    let value: serde_json::Value = serde_json::from_str(&json).expect("Should be valid JSON");
    assert_eq!(
        value["steps"].as_array().map(Vec::len),
        Some(world.report().steps.len())
    );
}
