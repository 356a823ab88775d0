//! Step definitions that plan the suite under test

use cucumber::given;
use gherkin_ui::StepKind;

use crate::world::{Declaration, GherkinWorld, Outcome, PlannedScenario, PlannedStep};

fn kind(keyword: &str) -> StepKind {
    StepKind::from_keyword(keyword).unwrap_or_else(|| panic!("Unknown step keyword: {keyword}"))
}

// ============================================================================
// Invocation
// ============================================================================

#[given(expr = "the skip mode is {string}")]
fn given_skip_mode(world: &mut GherkinWorld, mode: String) {
    world.args.push("--skip-mode".to_string());
    world.args.push(mode);
}

#[given(expr = "the filter tags are {string}")]
fn given_filter_tags(world: &mut GherkinWorld, tags: String) {
    world.args.push("--filter-tags".to_string());
    world.args.push(tags);
}

// ============================================================================
// Scenarios
// ============================================================================

#[given(expr = "a scenario {string}")]
fn given_scenario(world: &mut GherkinWorld, title: String) {
    world.scenarios.push(PlannedScenario {
        title,
        ..Default::default()
    });
}

#[given(expr = "a scenario {string} declared with skip")]
fn given_skipped_scenario(world: &mut GherkinWorld, title: String) {
    world.scenarios.push(PlannedScenario {
        title,
        declaration: Declaration::Skip,
        ..Default::default()
    });
}

#[given(expr = "a scenario {string} declared with only")]
fn given_only_scenario(world: &mut GherkinWorld, title: String) {
    world.scenarios.push(PlannedScenario {
        title,
        declaration: Declaration::Only,
        ..Default::default()
    });
}

#[given(expr = "it is tagged {string}")]
fn given_tagged(world: &mut GherkinWorld, tags: String) {
    world.current().tags = tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
}

// ============================================================================
// Steps
// ============================================================================

#[given(expr = "a {word} step {string} that {word}")]
fn given_step(world: &mut GherkinWorld, keyword: String, title: String, outcome: String) {
    world.current().steps.push(PlannedStep {
        kind: kind(&keyword),
        title,
        outcome: Outcome::parse(&outcome),
        retries: 0,
    });
}

#[given(expr = "a {word} step {string} that fails {int} time(s) with {int} retries")]
fn given_flaky_step(
    world: &mut GherkinWorld,
    keyword: String,
    title: String,
    failures: u32,
    retries: u32,
) {
    world.current().steps.push(PlannedStep {
        kind: kind(&keyword),
        title,
        outcome: Outcome::FailsTimes(failures),
        retries,
    });
}

#[given(expr = "the usual cascade sequence")]
fn given_cascade_sequence(world: &mut GherkinWorld) {
    let plan = [
        ("Given", "the failure", "fails"),
        ("And", "first complement", "passes"),
        ("And", "second complement", "passes"),
        ("But", "third complement", "passes"),
        ("When", "the action", "passes"),
        ("Then", "the check", "passes"),
    ];
    for (keyword, title, outcome) in plan {
        given_step(world, keyword.to_string(), title.to_string(), outcome.to_string());
    }
}
