//! Feature and Scenario groups
//!
//! A group owns its sealed step list, its hooks and its child groups.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::body::StepResult;
use crate::registry::StepRegistry;
use crate::tags::{Admission, TagSet};

/// Kind of group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    /// Untitled top of a suite
    Root,
    Feature,
    Scenario,
}

impl GroupKind {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            GroupKind::Root => None,
            GroupKind::Feature => Some("Feature"),
            GroupKind::Scenario => Some("Scenario"),
        }
    }
}

type HookFn<W> = Box<dyn Fn(&mut W) -> StepResult>;

/// A lifecycle hook, passed through to the runner untouched
pub struct Hook<W> {
    pub(crate) title: String,
    pub(crate) f: HookFn<W>,
}

impl<W> Hook<W> {
    pub fn new<F>(title: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut W) -> StepResult + 'static,
    {
        Self {
            title: title.into(),
            f: Box::new(f),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl<W> fmt::Debug for Hook<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("title", &self.title).finish()
    }
}

/// Hooks of one group
pub struct Hooks<W> {
    /// Once, before the group's first step
    pub before: Vec<Hook<W>>,
    /// Once, after the group and its children finished
    pub after: Vec<Hook<W>>,
    /// Before every step of the group and its descendants
    pub before_each: Vec<Hook<W>>,
    /// After every step of the group and its descendants
    pub after_each: Vec<Hook<W>>,
}

impl<W> Default for Hooks<W> {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
            before_each: Vec::new(),
            after_each: Vec::new(),
        }
    }
}

impl<W> fmt::Debug for Hooks<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before)
            .field("after", &self.after)
            .field("before_each", &self.before_each)
            .field("after_each", &self.after_each)
            .finish()
    }
}

/// A Feature, a Scenario, or the root of a suite
pub struct Group<W> {
    pub(crate) title: String,
    pub(crate) kind: GroupKind,
    pub(crate) full_title: String,
    pub(crate) file: Option<String>,
    pub(crate) pending: bool,
    pub(crate) manually_skipped: bool,
    pub(crate) tags: TagSet,
    pub(crate) default_retries: u32,
    pub(crate) hooks: Hooks<W>,
    pub(crate) steps: StepRegistry<W>,
    pub(crate) children: Vec<Group<W>>,
}

impl<W> Group<W> {
    /// The untitled root group of a suite
    pub fn root() -> Self {
        Self::with_full_title(GroupKind::Root, String::new(), String::new(), TagSet::new())
    }

    /// A group nested under a parent with the given full title
    pub fn nested(
        kind: GroupKind,
        title: impl Into<String>,
        parent_full_title: &str,
        tags: TagSet,
    ) -> Self {
        let title = title.into();
        let label = match kind.keyword() {
            Some(keyword) => format!("{keyword}: {title}"),
            None => title.clone(),
        };
        let full_title = if parent_full_title.is_empty() {
            label
        } else {
            format!("{parent_full_title} {label}")
        };
        Self::with_full_title(kind, title, full_title, tags)
    }

    fn with_full_title(kind: GroupKind, title: String, full_title: String, tags: TagSet) -> Self {
        Self {
            title,
            kind,
            full_title,
            file: None,
            pending: false,
            manually_skipped: false,
            tags,
            default_retries: 0,
            hooks: Hooks::default(),
            steps: StepRegistry::new(),
            children: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Labels of all ancestors and this group, joined by spaces
    pub fn full_title(&self) -> &str {
        &self.full_title
    }

    /// File the group was loaded from
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_manually_skipped(&self) -> bool {
        self.manually_skipped
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn steps(&self) -> &StepRegistry<W> {
        &self.steps
    }

    pub fn children(&self) -> &[Group<W>] {
        &self.children
    }

    pub fn hooks(&self) -> &Hooks<W> {
        &self.hooks
    }

    /// Find a direct child by title
    pub fn child(&self, title: &str) -> Option<&Group<W>> {
        self.children.iter().find(|c| c.title == title)
    }

    /// Mark the group pending and manually skipped; tag filtering will never undo this
    pub(crate) fn skip_manually(&mut self) {
        self.pending = true;
        self.manually_skipped = true;
    }

    /// Run the tag filter over this group, updating its pending flag
    pub fn apply_tag_filter(&mut self, filter: Option<&TagSet>) -> Admission {
        let admission = Admission::decide(&self.tags, filter, self.manually_skipped);
        self.pending = admission.pending(self.pending);

        match admission {
            Admission::Unfiltered => {}
            Admission::Admitted => {
                debug!(group = %self.full_title, tags = %self.tags, "group admitted by tags");
            }
            Admission::Rejected | Admission::ManuallySkipped => {
                info!(
                    group = %self.full_title,
                    tags = %self.tags,
                    admission = ?admission,
                    "group pending after tag filter"
                );
            }
        }

        admission
    }

    /// Whether any step of this group or its descendants has a full title accepted by
    /// `admits`
    pub fn any_step_admitted<F>(&self, admits: &F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        self.steps
            .iter()
            .any(|step| admits(&step.full_title(&self.full_title)))
            || self.children.iter().any(|child| child.any_step_admitted(admits))
    }

    /// Number of steps in this group and all descendants
    pub fn total_steps(&self) -> usize {
        self.steps.len() + self.children.iter().map(Group::total_steps).sum::<usize>()
    }
}

impl<W> fmt::Debug for Group<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("full_title", &self.full_title)
            .field("kind", &self.kind)
            .field("file", &self.file)
            .field("pending", &self.pending)
            .field("manually_skipped", &self.manually_skipped)
            .field("tags", &self.tags)
            .field("hooks", &self.hooks)
            .field("steps", &self.steps)
            .field("children", &self.children)
            .finish()
    }
}
