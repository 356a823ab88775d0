//! Ordered step registry of a group
//!
//! Steps collect in an open list while the group's defining block runs. When the block
//! returns the list is sealed: from then on the order is fixed and cascade computations
//! index into it.

use crate::step::{Step, StepKind};

/// Sealed steps of one group, in declaration order
pub struct StepRegistry<W> {
    steps: Box<[Step<W>]>,
}

impl<W> Default for StepRegistry<W> {
    fn default() -> Self {
        Self {
            steps: Box::default(),
        }
    }
}

impl<W> StepRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal a list of steps, fixing their ordinals to their positions
    pub fn seal(steps: Vec<Step<W>>) -> Self {
        let mut registry = Self::new();
        registry.append(steps);
        registry
    }

    /// Seal more steps after the existing ones. Only the suite root receives steps from
    /// several definition blocks; it is never running while this happens.
    pub(crate) fn append(&mut self, more: Vec<Step<W>>) {
        if more.is_empty() {
            return;
        }
        let mut steps = std::mem::take(&mut self.steps).into_vec();
        steps.extend(more);
        for (ordinal, step) in steps.iter_mut().enumerate() {
            step.ordinal = ordinal;
        }
        self.steps = steps.into_boxed_slice();
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step<W>> {
        self.steps.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step<W>> {
        self.steps.iter()
    }

    /// Steps in declaration order; elements can be updated but not added or reordered
    pub fn as_mut_slice(&mut self) -> &mut [Step<W>] {
        &mut self.steps
    }

    pub fn as_slice(&self) -> &[Step<W>] {
        &self.steps
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(Step::kind).collect()
    }

    /// Index of the main step a step belongs to: itself for a main step, the nearest
    /// preceding main step for a complement. A complement with no main step before it
    /// has no anchor.
    pub fn anchor_of(&self, index: usize) -> Option<usize> {
        let step = self.steps.get(index)?;
        if step.kind().is_main() {
            return Some(index);
        }
        self.steps[..index].iter().rposition(|s| s.kind().is_main())
    }
}

impl<'a, W> IntoIterator for &'a StepRegistry<W> {
    type Item = &'a Step<W>;
    type IntoIter = std::slice::Iter<'a, Step<W>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<W> std::fmt::Debug for StepRegistry<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.steps.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;

    fn step(kind: StepKind, title: &str) -> Step<()> {
        Step::new(kind, title, Some(Body::sync(|_: &mut ()| Ok(()))))
    }

    #[test]
    fn test_seal_assigns_ordinals_in_order() {
        let registry = StepRegistry::seal(vec![
            step(StepKind::Given, "a"),
            step(StepKind::When, "b"),
        ]);

        let ordinals: Vec<usize> = registry.iter().map(Step::ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(registry.kinds(), vec![StepKind::Given, StepKind::When]);
    }

    #[test]
    fn test_append_keeps_existing_order() {
        let mut registry = StepRegistry::seal(vec![step(StepKind::Given, "a")]);
        registry.append(vec![step(StepKind::Then, "b")]);

        let titles: Vec<&str> = registry.iter().map(Step::title).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(registry.get(1).map(Step::ordinal), Some(1));
    }

    #[test]
    fn test_anchor_of_complements() {
        let registry = StepRegistry::seal(vec![
            step(StepKind::And, "orphan"),
            step(StepKind::Given, "a"),
            step(StepKind::And, "b"),
            step(StepKind::But, "c"),
            step(StepKind::When, "d"),
        ]);

        assert_eq!(registry.anchor_of(0), None);
        assert_eq!(registry.anchor_of(1), Some(1));
        assert_eq!(registry.anchor_of(2), Some(1));
        assert_eq!(registry.anchor_of(3), Some(1));
        assert_eq!(registry.anchor_of(4), Some(4));
        assert_eq!(registry.anchor_of(9), None);
    }
}
