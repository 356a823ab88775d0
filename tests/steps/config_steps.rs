//! Step definitions for config.feature

use cucumber::{given, then, when};
use gherkin_ui::{RunConfig, SkipMode};

use crate::world::GherkinWorld;

// ============================================================================
// Given steps
// ============================================================================

#[given("a TOML configuration selecting absolute mode with smoke and api tags")]
fn given_full_config(world: &mut GherkinWorld) {
    world.config_toml = Some(
        r#"
[run]
skip_mode = "absolute"
filter_tags = ["smoke", "api"]
timeout_ms = 500
"#
        .to_string(),
    );
}

#[given("a TOML configuration with comma-separated filter tags")]
fn given_csv_config(world: &mut GherkinWorld) {
    world.config_toml = Some(
        r#"
[run]
filter_tags = " smoke , ,api "
"#
        .to_string(),
    );
}

#[given("a TOML configuration with an unknown skip mode")]
fn given_unknown_mode_config(world: &mut GherkinWorld) {
    world.config_toml = Some(
        r#"
[run]
skip_mode = "sometimes"
"#
        .to_string(),
    );
}

#[given("an empty TOML configuration")]
fn given_empty_config(world: &mut GherkinWorld) {
    world.config_toml = Some(String::new());
}

#[given("a malformed TOML configuration")]
fn given_malformed_config(world: &mut GherkinWorld) {
    world.config_toml = Some("[run\nskip_mode = ".to_string());
}

#[given(expr = "the invocation arguments {string}")]
fn given_invocation_args(world: &mut GherkinWorld, args: String) {
    world.args = args.split_whitespace().map(str::to_string).collect();
}

// ============================================================================
// When steps
// ============================================================================

#[when("I parse the configuration")]
fn when_parse_config(world: &mut GherkinWorld) {
    let toml_str = world.config_toml.as_ref().expect("No config TOML set");
    match RunConfig::parse(toml_str) {
        Ok(config) => {
            world.config = Some(config);
            world.last_error = None;
        }
        Err(e) => {
            world.config = None;
            world.last_error = Some(format!("{e:#}"));
        }
    }
}

#[when("I read the invocation arguments")]
fn when_read_args(world: &mut GherkinWorld) {
    let mut args = vec!["host-runner".to_string()];
    args.extend(world.args.iter().cloned());
    match RunConfig::from_args(args) {
        Ok(config) => {
            world.config = Some(config);
            world.last_error = None;
        }
        Err(e) => {
            world.config = None;
            world.last_error = Some(format!("{e:#}"));
        }
    }
}

// ============================================================================
// Then steps
// ============================================================================

#[then("the configuration should be loaded successfully")]
fn then_config_loaded(world: &mut GherkinWorld) {
    assert!(
        world.config.is_some(),
        "Expected configuration to be loaded, but got error: {:?}",
        world.last_error
    );
}

#[then(expr = "the skip mode should be {string}")]
fn then_skip_mode(world: &mut GherkinWorld, mode: String) {
    let config = world.config.as_ref().expect("No config loaded");
    assert_eq!(config.skip_mode.as_str(), mode);
}

#[then(expr = "the filter tags should be {string}")]
fn then_filter_tags(world: &mut GherkinWorld, tags: String) {
    let config = world.config.as_ref().expect("No config loaded");
    let filter = config.filter().expect("Expected filter tags");
    assert_eq!(filter.to_string(), tags);
}

#[then("no tag filtering should apply")]
fn then_no_filter(world: &mut GherkinWorld) {
    let config = world.config.as_ref().expect("No config loaded");
    assert!(config.filter().is_none());
}

#[then(expr = "the step timeout should be {int} ms")]
fn then_timeout(world: &mut GherkinWorld, timeout_ms: u64) {
    let config = world.config.as_ref().expect("No config loaded");
    assert_eq!(config.timeout_ms, timeout_ms);
}

#[then("the configuration should use default values")]
fn then_defaults(world: &mut GherkinWorld) {
    let config = world.config.as_ref().expect("No config loaded");
    assert_eq!(config.skip_mode, SkipMode::Moderate);
    assert!(config.filter().is_none());
    assert_eq!(config.timeout_ms, 2000);
}

#[then("parsing should fail with a TOML error")]
fn then_parsing_fails(world: &mut GherkinWorld) {
    assert!(world.config.is_none(), "Expected parsing to fail");
    let error = world.last_error.as_ref().expect("Expected an error");
    assert!(
        error.contains("failed to parse TOML configuration"),
        "Expected TOML error, got: {error}"
    );
}
