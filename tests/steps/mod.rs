//! Step definitions for the feature files

mod config_steps;
mod run_steps;
mod suite_steps;
