//! Chart runtime - executes transitions over a shared chart
//!
//! A [`ChartRuntime`] holds the current leaf state and the history of one
//! running instance. Several runtimes may share the same `Arc<StateChart>`.
//! A runtime is not synchronized; confine it to a single task.

use super::history::History;
use super::model::{StateChart, StateDescription, StateId, Target};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of dispatching one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub action: String,
    /// Leaf state before the action
    pub previous: StateId,
    /// Leaf state after the action (unchanged when rejected)
    pub state: StateId,
    /// Whether the action was legal in `previous`
    pub accepted: bool,
}

#[derive(Debug, Clone)]
pub struct ChartRuntime {
    chart: Arc<StateChart>,
    history: History,
    current: StateId,
}

impl ChartRuntime {
    /// Create a runtime and perform the initial transition into the chart root
    pub fn start(chart: Arc<StateChart>) -> Result<Self> {
        let history = History::new(&chart);
        let root = chart.root();
        let mut runtime = Self {
            chart,
            history,
            current: root,
        };
        runtime.set_state(Target::State(root))?;
        Ok(runtime)
    }

    pub fn chart(&self) -> &Arc<StateChart> {
        &self.chart
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current leaf state
    pub fn current_state(&self) -> StateId {
        self.current
    }

    pub fn current_name(&self) -> &str {
        self.chart.state(self.current).name()
    }

    /// # Panics
    ///
    /// Panics if `state` was not produced by this runtime's chart.
    pub fn allowed_actions(&self, state: StateId) -> BTreeMap<String, Target> {
        self.chart.actions(state)
    }

    /// # Panics
    ///
    /// Panics if `state` was not produced by this runtime's chart.
    pub fn describe(&self, state: StateId) -> StateDescription {
        self.chart.describe(state)
    }

    /// Enter `target` and make the leaf it reaches current.
    ///
    /// The target must be the object registered under its own name in this
    /// chart; anything else means the caller holds a corrupted handle.
    /// History is only written once the new leaf is known, so a failed
    /// transition leaves the runtime untouched.
    pub fn set_state(&mut self, target: Target) -> Result<StateId> {
        if !self.chart.contains(target) {
            let name = self
                .chart
                .get(target.state())
                .map(|_| self.chart.target_name(target))
                .unwrap_or_else(|| format!("#{}", target.state().index()));
            return Err(Error::UnknownOrMismatchedState(name));
        }

        let leaf = self.chart.enter(target, &self.history)?;
        self.history.record(&self.chart, leaf);
        self.current = leaf;
        tracing::debug!(
            target = self.chart.target_name(target).as_str(),
            state = self.current_name(),
            "entered state"
        );
        Ok(leaf)
    }

    /// Perform `action` if it is legal in the current state.
    ///
    /// An action that is not allowed is not an error: the state is left
    /// unchanged and `accepted` is false. Errors are reserved for failed
    /// transitions, such as recalling a subtree with no history.
    pub fn dispatch(&mut self, action: &str) -> Result<Dispatch> {
        let previous = self.current;
        let target = self.chart.actions(previous).get(action).copied();
        let Some(target) = target else {
            return Ok(Dispatch {
                action: action.to_string(),
                previous,
                state: previous,
                accepted: false,
            });
        };

        let state = self.set_state(target)?;
        Ok(Dispatch {
            action: action.to_string(),
            previous,
            state,
            accepted: true,
        })
    }

    /// Re-enter the chart root. Recorded history is kept.
    pub fn reset(&mut self) -> Result<StateId> {
        let root = self.chart.root();
        self.set_state(Target::State(root))
    }
}
