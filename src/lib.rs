//! gherkin-ui - Gherkin vocabulary for step-based test suites
//!
//! Scenarios are written as `Feature`/`Scenario` groups of `Given`/`When`/`Then`/`And`/`But`
//! steps. When a step fails, later steps of its scenario become pending according to the
//! configured skip mode, and groups can be filtered by tags.

pub mod adapter;
pub mod body;
pub mod builder;
pub mod cascade;
pub mod config;
pub mod group;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod runner;
pub mod step;
pub mod tags;
pub mod telemetry;

pub use adapter::{ExecutionAdapter, StepError, StepFailure};
pub use body::{Body, BodyView, Done, FailureToken, IntoBody, StepResult};
pub use builder::{GroupBuilder, Selection, Suite, Tagged};
pub use cascade::{CascadeController, CascadeOutcome};
pub use config::{RunConfig, SkipMode};
pub use group::{Group, GroupKind};
pub use report::{PendingCause, Report, StepReport, StepStatus, Summary};
pub use runner::Runner;
pub use step::{PendingReason, Step, StepKind, StepState};
pub use tags::TagSet;
