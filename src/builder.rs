//! Feature/Scenario/Given/When/Then vocabulary
//!
//! [`Suite::load`] is the per-file registration hook: it hands a [`GroupBuilder`] for the
//! suite root to the file's definitions. Groups are created eagerly while definitions
//! load; step bodies only run later, when the runner schedules them.

use tracing::{debug, info};

use crate::body::{IntoBody, StepResult};
use crate::config::{self, RunConfig};
use crate::group::{Group, GroupKind, Hook};
use crate::registry::StepRegistry;
use crate::step::{PendingReason, Step, StepKind};
use crate::tags::TagSet;

/// Full-title patterns registered through `only`
///
/// When any pattern is registered, only steps whose full title contains one of them run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    patterns: Vec<String>,
}

impl Selection {
    /// Narrow the run to `full_title`
    pub fn select(&mut self, full_title: impl Into<String>) {
        let full_title = full_title.into();
        info!(pattern = %full_title, "run narrowed by only");
        if !self.patterns.contains(&full_title) {
            self.patterns.push(full_title);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a step with this full title takes part in the run
    pub fn admits(&self, full_title: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| full_title.contains(p.as_str()))
    }
}

/// How a group was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Standard,
    Skip,
    Only,
}

/// A tree of groups and steps plus the configuration it was built under
pub struct Suite<W> {
    root: Group<W>,
    config: RunConfig,
    selection: Selection,
}

impl<W> Default for Suite<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Suite<W> {
    /// A suite using the process-wide configuration
    pub fn new() -> Self {
        Self::with_config(config::global().clone())
    }

    /// A suite using an explicit configuration
    pub fn with_config(config: RunConfig) -> Self {
        debug!(
            skip_mode = %config.skip_mode,
            filter_tags = ?config.filter_tags,
            "suite created"
        );
        Self {
            root: Group::root(),
            config,
            selection: Selection::default(),
        }
    }

    /// Register the definitions of one test file
    pub fn load<F>(&mut self, file: &str, define: F) -> &mut Self
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        debug!(file = %file, "loading definitions");
        self.register(Some(file), define)
    }

    /// Register definitions that do not come from a file
    pub fn define<F>(&mut self, define: F) -> &mut Self
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        self.register(None, define)
    }

    fn register<F>(&mut self, file: Option<&str>, define: F) -> &mut Self
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        let mut builder = GroupBuilder::new(&mut self.root, &self.config, &mut self.selection, file);
        define(&mut builder);
        builder.finish();
        self
    }

    pub fn root(&self) -> &Group<W> {
        &self.root
    }

    /// The group tree for running, alongside the selection that narrows it
    pub(crate) fn parts_mut(&mut self) -> (&mut Group<W>, &Selection) {
        (&mut self.root, &self.selection)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Look up a group by the titles along its path from the root
    pub fn find(&self, path: &[&str]) -> Option<&Group<W>> {
        path.iter()
            .try_fold(&self.root, |group, title| group.child(title))
    }
}

impl<W> std::fmt::Debug for Suite<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("selection", &self.selection)
            .finish()
    }
}

/// Defines steps, nested groups and hooks inside one group
pub struct GroupBuilder<'a, W> {
    group: &'a mut Group<W>,
    config: &'a RunConfig,
    selection: &'a mut Selection,
    file: Option<&'a str>,
    /// Inside a group declared with `only`; tag filtering no longer applies
    within_only: bool,
    open: Vec<Step<W>>,
}

impl<'a, W> GroupBuilder<'a, W> {
    fn new(
        group: &'a mut Group<W>,
        config: &'a RunConfig,
        selection: &'a mut Selection,
        file: Option<&'a str>,
    ) -> Self {
        Self {
            group,
            config,
            selection,
            file,
            within_only: false,
            open: Vec::new(),
        }
    }

    /// Seal the steps declared through this builder into the group
    fn finish(self) {
        let GroupBuilder { group, open, .. } = self;
        if group.steps.is_empty() {
            group.steps = StepRegistry::seal(open);
        } else {
            group.steps.append(open);
        }
    }

    /// The group being defined
    pub fn group(&self) -> &Group<W> {
        &*self.group
    }

    pub fn config(&self) -> &RunConfig {
        self.config
    }

    /// Default retry budget for steps declared after this call, and for nested groups
    pub fn retries(&mut self, retries: u32) -> &mut Self {
        self.group.default_retries = retries;
        self
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    /// Declare a `Feature`
    pub fn feature<F>(&mut self, title: impl Into<String>, define: F) -> &Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        self.nest(GroupKind::Feature, title.into(), TagSet::new(), Variant::Standard, define)
    }

    /// Declare a `Feature` that never runs
    pub fn feature_skip<F>(&mut self, title: impl Into<String>, define: F) -> &Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        self.nest(GroupKind::Feature, title.into(), TagSet::new(), Variant::Skip, define)
    }

    /// Declare a `Feature` and narrow the run to it
    pub fn feature_only<F>(&mut self, title: impl Into<String>, define: F) -> &Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        self.nest(GroupKind::Feature, title.into(), TagSet::new(), Variant::Only, define)
    }

    /// Declare a `Scenario`
    pub fn scenario<F>(&mut self, title: impl Into<String>, define: F) -> &Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        self.nest(GroupKind::Scenario, title.into(), TagSet::new(), Variant::Standard, define)
    }

    /// Declare a `Scenario` that never runs
    pub fn scenario_skip<F>(&mut self, title: impl Into<String>, define: F) -> &Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        self.nest(GroupKind::Scenario, title.into(), TagSet::new(), Variant::Skip, define)
    }

    /// Declare a `Scenario` and narrow the run to it
    pub fn scenario_only<F>(&mut self, title: impl Into<String>, define: F) -> &Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        self.nest(GroupKind::Scenario, title.into(), TagSet::new(), Variant::Only, define)
    }

    /// Attach tags to the next `feature` or `scenario`
    pub fn tags<I, S>(&mut self, tags: I) -> Tagged<'_, 'a, W>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tagged {
            builder: self,
            tags: tags.into_iter().collect(),
        }
    }

    fn nest<F>(
        &mut self,
        kind: GroupKind,
        title: String,
        tags: TagSet,
        variant: Variant,
        define: F,
    ) -> &Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        let mut child = Group::nested(kind, title, &self.group.full_title, tags);
        child.file = self.file.map(str::to_string);
        child.default_retries = self.group.default_retries;

        match variant {
            Variant::Standard if self.within_only => {
                debug!(group = %child.full_title, "tag filter bypassed inside only");
            }
            Variant::Standard => {
                child.apply_tag_filter(self.config.filter());
            }
            Variant::Skip => child.skip_manually(),
            Variant::Only => self.selection.select(child.full_title.clone()),
        }

        // A skipped group still defines its structure; a filtered-out one does not
        let define_children = !child.pending || variant == Variant::Skip;

        self.group.children.push(child);
        let index = self.group.children.len() - 1;
        let child = &mut self.group.children[index];

        if define_children {
            let mut builder = GroupBuilder::new(child, self.config, self.selection, self.file);
            builder.within_only = self.within_only || variant == Variant::Only;
            define(&mut builder);
            builder.finish();
        } else {
            debug!(group = %child.full_title, "definition block not run for pending group");
        }

        &self.group.children[index]
    }

    // ------------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------------

    /// Declare a step of any kind
    pub fn step(
        &mut self,
        kind: StepKind,
        title: impl Into<String>,
        body: impl IntoBody<W>,
    ) -> &mut Step<W> {
        let mut step = Step::new(kind, title, Some(body.into_body()));
        if self.group.pending {
            step.mark_pending(PendingReason::Declared);
        }
        self.push(step)
    }

    /// Declare a step that is registered but never runs
    pub fn skip_step(&mut self, kind: StepKind, title: impl Into<String>) -> &mut Step<W> {
        self.push(Step::new(kind, title, None))
    }

    /// Declare a step and narrow the run to it
    pub fn only_step(
        &mut self,
        kind: StepKind,
        title: impl Into<String>,
        body: impl IntoBody<W>,
    ) -> &mut Step<W> {
        let title = title.into();
        let full_title = self.step_full_title(kind, &title);
        self.selection.select(full_title);
        self.step(kind, title, body)
    }

    pub fn given(&mut self, title: impl Into<String>, body: impl IntoBody<W>) -> &mut Step<W> {
        self.step(StepKind::Given, title, body)
    }

    pub fn when(&mut self, title: impl Into<String>, body: impl IntoBody<W>) -> &mut Step<W> {
        self.step(StepKind::When, title, body)
    }

    pub fn then(&mut self, title: impl Into<String>, body: impl IntoBody<W>) -> &mut Step<W> {
        self.step(StepKind::Then, title, body)
    }

    pub fn and(&mut self, title: impl Into<String>, body: impl IntoBody<W>) -> &mut Step<W> {
        self.step(StepKind::And, title, body)
    }

    pub fn but(&mut self, title: impl Into<String>, body: impl IntoBody<W>) -> &mut Step<W> {
        self.step(StepKind::But, title, body)
    }

    fn step_full_title(&self, kind: StepKind, title: &str) -> String {
        if self.group.full_title.is_empty() {
            format!("{kind} {title}")
        } else {
            format!("{} {kind} {title}", self.group.full_title)
        }
    }

    fn push(&mut self, mut step: Step<W>) -> &mut Step<W> {
        step.ordinal = self.group.steps.len() + self.open.len();
        step.retries = self.group.default_retries;
        self.open.push(step);
        let index = self.open.len() - 1;
        &mut self.open[index]
    }

    // ------------------------------------------------------------------------
    // Hooks
    // ------------------------------------------------------------------------

    /// Run once before the group's steps
    pub fn before<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut W) -> StepResult + 'static,
    {
        self.group.hooks.before.push(Hook::new("\"before all\" hook", f));
        self
    }

    /// Run once after the group and its children
    pub fn after<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut W) -> StepResult + 'static,
    {
        self.group.hooks.after.push(Hook::new("\"after all\" hook", f));
        self
    }

    /// Run before each step of this group and its descendants
    pub fn before_each<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut W) -> StepResult + 'static,
    {
        self.group
            .hooks
            .before_each
            .push(Hook::new("\"before each\" hook", f));
        self
    }

    /// Run after each step of this group and its descendants
    pub fn after_each<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut W) -> StepResult + 'static,
    {
        self.group
            .hooks
            .after_each
            .push(Hook::new("\"after each\" hook", f));
        self
    }
}

/// Tagged `feature`/`scenario` constructors returned by [`GroupBuilder::tags`]
pub struct Tagged<'b, 'a, W> {
    builder: &'b mut GroupBuilder<'a, W>,
    tags: TagSet,
}

impl<'b, 'a, W> Tagged<'b, 'a, W> {
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn feature<F>(self, title: impl Into<String>, define: F) -> &'b Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        let Tagged { builder, tags } = self;
        builder.nest(GroupKind::Feature, title.into(), tags, Variant::Standard, define)
    }

    pub fn feature_skip<F>(self, title: impl Into<String>, define: F) -> &'b Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        let Tagged { builder, tags } = self;
        builder.nest(GroupKind::Feature, title.into(), tags, Variant::Skip, define)
    }

    pub fn feature_only<F>(self, title: impl Into<String>, define: F) -> &'b Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        let Tagged { builder, tags } = self;
        builder.nest(GroupKind::Feature, title.into(), tags, Variant::Only, define)
    }

    pub fn scenario<F>(self, title: impl Into<String>, define: F) -> &'b Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        let Tagged { builder, tags } = self;
        builder.nest(GroupKind::Scenario, title.into(), tags, Variant::Standard, define)
    }

    pub fn scenario_skip<F>(self, title: impl Into<String>, define: F) -> &'b Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        let Tagged { builder, tags } = self;
        builder.nest(GroupKind::Scenario, title.into(), tags, Variant::Skip, define)
    }

    pub fn scenario_only<F>(self, title: impl Into<String>, define: F) -> &'b Group<W>
    where
        F: FnOnce(&mut GroupBuilder<'_, W>),
    {
        let Tagged { builder, tags } = self;
        builder.nest(GroupKind::Scenario, title.into(), tags, Variant::Only, define)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkipMode;
    use crate::step::PendingReason;

    #[derive(Debug, Default)]
    struct World;

    fn ok(_: &mut World) -> StepResult {
        Ok(())
    }

    fn suite(filter: &[&str]) -> Suite<World> {
        let config = RunConfig::default()
            .with_skip_mode(SkipMode::Moderate)
            .with_filter_tags(filter.iter().copied().collect());
        Suite::with_config(config)
    }

    #[test]
    fn test_groups_and_steps_registered_in_order() {
        let mut suite = suite(&[]);
        suite.load("login.rs", |ctx| {
            ctx.feature("Login", |f| {
                f.scenario("good password", |s| {
                    s.given("a user", ok);
                    s.and("a password", ok);
                    s.when("logging in", ok);
                    s.then("access is granted", ok);
                });
            });
        });

        let scenario = suite
            .find(&["Login", "good password"])
            .expect("Scenario should be registered");
        assert_eq!(scenario.full_title(), "Feature: Login Scenario: good password");
        assert_eq!(scenario.file(), Some("login.rs"));
        let labels: Vec<String> = scenario.steps().iter().map(Step::label).collect();
        assert_eq!(
            labels,
            vec![
                "Given a user",
                "And a password",
                "When logging in",
                "Then access is granted"
            ]
        );
        let ordinals: Vec<usize> = scenario.steps().iter().map(Step::ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_filtered_out_group_does_not_define_children() {
        let mut suite = suite(&["smoke"]);
        let mut defined = false;
        suite.define(|ctx| {
            ctx.scenario("untagged", |s| {
                defined = true;
                s.given("never registered", ok);
            });
        });

        let scenario = suite.find(&["untagged"]).expect("Scenario should exist");
        assert!(scenario.is_pending());
        assert!(!defined);
        assert!(scenario.steps().is_empty());
    }

    #[test]
    fn test_tagged_scenario_admitted() {
        let mut suite = suite(&["smoke"]);
        suite.define(|ctx| {
            ctx.tags(["smoke", "api"]).scenario("tagged", |s| {
                s.given("registered", ok);
            });
            ctx.tags(["smoke", "ui"]).scenario("also tagged", |s| {
                s.given("registered", ok);
            });
            ctx.tags(["api"]).scenario("wrong tag", |s| {
                s.given("never registered", ok);
            });
        });

        let tagged = suite.find(&["tagged"]).expect("Scenario should exist");
        assert!(!tagged.is_pending());
        assert_eq!(tagged.steps().len(), 1);
        assert!(tagged.tags().contains("api"));

        let wrong = suite.find(&["wrong tag"]).expect("Scenario should exist");
        assert!(wrong.is_pending());
    }

    #[test]
    fn test_skip_registers_structure_but_stays_pending() {
        let mut suite = suite(&["smoke"]);
        suite.define(|ctx| {
            ctx.tags(["smoke"]).scenario_skip("skipped", |s| {
                s.given("visible", ok);
                s.then("also visible", ok);
            });
        });

        let scenario = suite.find(&["skipped"]).expect("Scenario should exist");
        assert!(scenario.is_pending());
        assert!(scenario.is_manually_skipped());
        assert_eq!(scenario.steps().len(), 2);
        assert!(
            scenario
                .steps()
                .iter()
                .all(|s| s.pending_reason() == Some(PendingReason::Declared))
        );
        assert!(scenario.steps().iter().all(|s| s.display_body().is_some()));
    }

    #[test]
    fn test_only_selects_full_title_and_bypasses_tags() {
        let mut suite = suite(&["smoke"]);
        suite.define(|ctx| {
            ctx.feature_only("Checkout", |f| {
                f.given("a cart", ok);
            });
        });

        let feature = suite.find(&["Checkout"]).expect("Feature should exist");
        assert!(!feature.is_pending());
        assert_eq!(suite.selection().patterns(), ["Feature: Checkout"]);
        assert!(suite.selection().admits("Feature: Checkout Given a cart"));
        assert!(!suite.selection().admits("Feature: Other Given a cart"));
    }

    #[test]
    fn test_only_bypasses_tags_for_nested_groups() {
        let mut suite = suite(&["smoke"]);
        suite.define(|ctx| {
            ctx.feature_only("Checkout", |f| {
                f.scenario("pay", |s| {
                    s.given("a card", ok);
                    s.scenario("nested", |n| {
                        n.then("charged", ok);
                    });
                });
            });
            ctx.scenario("outside", |s| {
                s.given("filtered", ok);
            });
        });

        let pay = suite.find(&["Checkout", "pay"]).expect("Scenario should exist");
        assert!(!pay.is_pending());
        assert_eq!(pay.steps().len(), 1);
        let nested = suite
            .find(&["Checkout", "pay", "nested"])
            .expect("Nested scenario should exist");
        assert!(!nested.is_pending());

        let outside = suite.find(&["outside"]).expect("Scenario should exist");
        assert!(outside.is_pending());
    }

    #[test]
    fn test_only_step_selects_step() {
        let mut suite = suite(&[]);
        suite.define(|ctx| {
            ctx.scenario("s", |s| {
                s.given("first", ok);
                s.only_step(StepKind::When, "focused", ok);
            });
        });

        assert_eq!(suite.selection().patterns(), ["Scenario: s When focused"]);
        let scenario = suite.find(&["s"]).expect("Scenario should exist");
        assert_eq!(
            scenario.steps().get(1).map(Step::title),
            Some("focused")
        );
    }

    #[test]
    fn test_skip_step_has_no_body() {
        let mut suite = suite(&[]);
        suite.define(|ctx| {
            ctx.scenario("s", |s| {
                s.skip_step(StepKind::Then, "later");
            });
        });

        let scenario = suite.find(&["s"]).expect("Scenario should exist");
        let step = scenario.steps().get(0).expect("Step should exist");
        assert!(step.body().is_none());
        assert_eq!(step.pending_reason(), Some(PendingReason::Declared));
    }

    #[test]
    fn test_default_retries_inherited() {
        let mut suite = suite(&[]);
        suite.define(|ctx| {
            ctx.feature("f", |f| {
                f.retries(2);
                f.scenario("s", |s| {
                    s.given("flaky", ok);
                    s.then("stable", ok).set_retries(0);
                });
            });
        });

        let scenario = suite.find(&["f", "s"]).expect("Scenario should exist");
        let retries: Vec<u32> = scenario.steps().iter().map(Step::retries).collect();
        assert_eq!(retries, vec![2, 0]);
    }

    #[test]
    fn test_root_steps_accumulate_across_loads() {
        let mut suite = suite(&[]);
        suite.load("a.rs", |ctx| {
            ctx.given("from a", ok);
        });
        suite.load("b.rs", |ctx| {
            ctx.given("from b", ok);
        });

        let titles: Vec<&str> = suite.root().steps().iter().map(Step::title).collect();
        assert_eq!(titles, vec!["from a", "from b"]);
    }
}
