//! Per-runtime history bookkeeping
//!
//! The built chart is immutable. What a `recall(STATE)` target resumes lives
//! here instead: one `last` slot per state, holding the immediate substate
//! that was most recently active beneath it.

use super::model::{StateChart, StateId};

#[derive(Debug, Clone, Default)]
pub struct History {
    last: Vec<Option<StateId>>,
}

impl History {
    /// Empty history sized for `chart`
    pub fn new(chart: &StateChart) -> Self {
        Self {
            last: vec![None; chart.len()],
        }
    }

    /// Most recently active immediate substate of `state`
    pub fn last(&self, state: StateId) -> Option<StateId> {
        self.last.get(state.index()).copied().flatten()
    }

    /// Record that `leaf` is now active: every ancestor remembers the child
    /// on the path down to it.
    pub fn record(&mut self, chart: &StateChart, leaf: StateId) {
        let mut child = leaf;
        while let Some(parent) = chart.parent(child) {
            if let Some(slot) = self.last.get_mut(parent.index()) {
                *slot = Some(child);
            }
            child = parent;
        }
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.last.iter_mut().for_each(|slot| *slot = None);
    }

    /// Whether any state under `state` has ever been active
    pub fn is_recorded(&self, state: StateId) -> bool {
        self.last(state).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state;

    fn chart() -> StateChart {
        StateChart::build(
            &state!(
                "ROOT -> A",
                state!("A -> A1", state!("A1").unwrap(), state!("A2").unwrap()).unwrap(),
                state!("B").unwrap(),
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_record_updates_every_ancestor() {
        let chart = chart();
        let mut history = History::new(&chart);
        let a = chart.find("A").unwrap();
        let a2 = chart.find("A2").unwrap();

        assert!(!history.is_recorded(chart.root()));
        history.record(&chart, a2);

        assert_eq!(history.last(a), Some(a2));
        assert_eq!(history.last(chart.root()), Some(a));
        assert_eq!(history.last(a2), None);
    }

    #[test]
    fn test_sibling_path_keeps_inner_history() {
        let chart = chart();
        let mut history = History::new(&chart);
        let a = chart.find("A").unwrap();
        let a2 = chart.find("A2").unwrap();
        let b = chart.find("B").unwrap();

        history.record(&chart, a2);
        history.record(&chart, b);

        assert_eq!(history.last(chart.root()), Some(b));
        assert_eq!(history.last(a), Some(a2));

        history.clear();
        assert_eq!(history.last(a), None);
    }
}
