//! Resolved state charts
//!
//! A [`StateChart`] is an arena of [`StateNode`]s built once from a root
//! [`StateDecl`]. Every name, alias and `recall(..)` pseudostate is registered
//! in its namespace and every trigger target and initial substate is a direct
//! [`Target`] handle. The chart itself never changes after construction;
//! history lives in a separate [`History`] owned by each runtime.

use super::declaration::{DeclNode, Item, Monitor, StateDecl, recall_name};
use super::history::History;
use crate::name_graph::{NameGraph, NodeId};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CHART_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a state within one chart.
///
/// Handles carry the identity of the chart build that produced them, so a
/// handle from another chart (or from an earlier build of the same
/// declarations) never matches a state of this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StateId {
    chart: u64,
    index: usize,
}

impl StateId {
    /// Position of the state in its chart, in declaration preorder
    pub fn index(self) -> usize {
        self.index
    }
}

/// Where a trigger or initial reference leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Enter the state (recursing through initial substates)
    State(StateId),
    /// Resume the most recently active leaf beneath the state
    Recall(StateId),
}

impl Target {
    /// The state this target is attached to
    pub fn state(self) -> StateId {
        match self {
            Target::State(id) | Target::Recall(id) => id,
        }
    }
}

/// One resolved state
#[derive(Debug, Clone)]
pub struct StateNode {
    name: String,
    aliases: Vec<String>,
    documentation: Option<String>,
    parent: Option<StateId>,
    initial: Option<Target>,
    substates: Vec<StateId>,
    triggers: BTreeMap<String, Target>,
    monitors: Vec<Monitor>,
}

impl StateNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    pub fn initial(&self) -> Option<Target> {
        self.initial
    }

    pub fn substates(&self) -> &[StateId] {
        &self.substates
    }

    /// Triggers declared on this state only (no inheritance)
    pub fn triggers(&self) -> &BTreeMap<String, Target> {
        &self.triggers
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn is_compound(&self) -> bool {
        !self.substates.is_empty()
    }
}

/// Read-only summary of a state for documentation and monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateDescription {
    pub name: String,
    pub documentation: Option<String>,
    pub is_compound: bool,
    pub parent: Option<String>,
    pub initial: Option<String>,
    pub allowed_actions: BTreeMap<String, String>,
    pub monitors: Vec<String>,
}

/// A fully linked and validated state chart
#[derive(Debug, Clone)]
pub struct StateChart {
    id: u64,
    states: Vec<StateNode>,
    namespace: HashMap<String, Target>,
}

impl StateChart {
    /// Declare and build a chart in one step, like a root [`StateDecl`]
    pub fn new<I>(description: &str, items: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        Self::build(&StateDecl::new(description, items)?)
    }

    /// Resolve a root declaration into a chart.
    ///
    /// Fails with the first construction error found: a duplicate or empty
    /// name, an unresolved reference, or a compound state whose initial
    /// reference does not lead to one of its own substates.
    pub fn build(root: &StateDecl) -> Result<Self> {
        let graph = NameGraph::build(DeclNode::State(root))?;
        let chart_id = NEXT_CHART_ID.fetch_add(1, Ordering::Relaxed);

        // states take arena slots in preorder; history nodes point at their owner
        let mut targets: Vec<Option<Target>> = vec![None; graph.len()];
        let mut count = 0;
        for id in graph.ids() {
            match graph.node(id) {
                Some(DeclNode::State(_)) => {
                    targets[id.index()] = Some(Target::State(StateId {
                        chart: chart_id,
                        index: count,
                    }));
                    count += 1;
                }
                Some(DeclNode::History(_)) => {
                    let owner = graph.parent(id).and_then(|p| targets[p.index()]);
                    targets[id.index()] = owner.map(|t| Target::Recall(t.state()));
                }
                None => {}
            }
        }
        let target_of = |id: NodeId| -> Result<Target> {
            targets
                .get(id.index())
                .copied()
                .flatten()
                .ok_or_else(|| Error::custom(format!("unmapped graph node {}", id.index())))
        };

        let mut states = Vec::with_capacity(count);
        for id in graph.ids() {
            let Some(DeclNode::State(decl)) = graph.node(id) else {
                continue;
            };
            let parent = graph.parent(id).map(&target_of).transpose()?.map(Target::state);
            let substates = graph
                .children(id)
                .iter()
                .filter(|child| matches!(graph.node(**child), Some(DeclNode::State(_))))
                .map(|child| target_of(*child).map(Target::state))
                .collect::<Result<Vec<_>>>()?;

            let mut links = graph.links(id).iter();
            let initial = match decl.initial {
                Some(_) => links.next().map(|link| target_of(*link)).transpose()?,
                None => None,
            };
            let triggers = decl
                .triggers
                .keys()
                .zip(links)
                .map(|(action, link)| -> Result<(String, Target)> {
                    Ok((action.clone(), target_of(*link)?))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;

            states.push(StateNode {
                name: decl.name.clone(),
                aliases: decl.aliases.clone(),
                documentation: decl.documentation.clone(),
                parent,
                initial,
                substates,
                triggers,
                monitors: decl.monitors.clone(),
            });
        }

        let namespace = graph
            .namespace()
            .iter()
            .map(|(name, id)| -> Result<(String, Target)> { Ok((name.clone(), target_of(*id)?)) })
            .collect::<Result<HashMap<_, _>>>()?;

        let chart = Self {
            id: chart_id,
            states,
            namespace,
        };
        chart.validate()?;
        tracing::debug!(
            root = chart.states[0].name.as_str(),
            states = chart.states.len(),
            "built state chart"
        );
        Ok(chart)
    }

    fn validate(&self) -> Result<()> {
        for (id, state) in self.states() {
            if !state.is_compound() {
                continue;
            }
            match state.initial {
                None => return Err(Error::MissingInitialSubstate(state.name.clone())),
                Some(Target::State(initial)) if self.parent(initial) == Some(id) => {}
                Some(other) => {
                    return Err(Error::InvalidInitialSubstate {
                        initial: self.target_name(other),
                        state: state.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> StateId {
        StateId {
            chart: self.id,
            index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `id` was not produced by this chart.
    pub fn state(&self, id: StateId) -> &StateNode {
        match self.get(id) {
            Some(state) => state,
            None => panic!("state handle {:?} does not belong to this chart", id),
        }
    }

    /// The state behind `id`, or `None` if the handle belongs to another chart
    pub fn get(&self, id: StateId) -> Option<&StateNode> {
        if id.chart != self.id {
            return None;
        }
        self.states.get(id.index)
    }

    pub fn states(&self) -> impl Iterator<Item = (StateId, &StateNode)> + '_ {
        self.states.iter().enumerate().map(|(index, s)| {
            (
                StateId {
                    chart: self.id,
                    index,
                },
                s,
            )
        })
    }

    /// States with no substates, in declaration order
    pub fn leaves(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states()
            .filter(|(_, s)| !s.is_compound())
            .map(|(id, _)| id)
    }

    pub fn parent(&self, id: StateId) -> Option<StateId> {
        self.get(id).and_then(|s| s.parent)
    }

    /// Enclosing states of `id`, innermost first (excluding `id`)
    pub fn ancestors(&self, id: StateId) -> impl Iterator<Item = StateId> + '_ {
        std::iter::successors(self.parent(id), move |s| self.parent(*s))
    }

    pub fn is_compound(&self, id: StateId) -> bool {
        self.get(id).is_some_and(StateNode::is_compound)
    }

    /// Whether `descendant` is `ancestor` or lies beneath it
    pub fn is_within(&self, descendant: StateId, ancestor: StateId) -> bool {
        descendant == ancestor || self.ancestors(descendant).any(|a| a == ancestor)
    }

    /// Resolve any registered name, alias or `recall(..)` name
    pub fn lookup(&self, name: &str) -> Option<Target> {
        self.namespace.get(name).copied()
    }

    /// Resolve a name or alias that denotes a state (not a history pseudostate)
    pub fn find(&self, name: &str) -> Option<StateId> {
        match self.lookup(name)? {
            Target::State(id) => Some(id),
            Target::Recall(_) => None,
        }
    }

    pub fn namespace(&self) -> &HashMap<String, Target> {
        &self.namespace
    }

    /// Primary registered name of a target
    pub fn target_name(&self, target: Target) -> String {
        match target {
            Target::State(id) => self.state(id).name.clone(),
            Target::Recall(id) => recall_name(&self.state(id).name),
        }
    }

    /// Whether `target` was produced by this chart build and is the handle
    /// registered under its own name
    pub fn contains(&self, target: Target) -> bool {
        self.get(target.state()).is_some()
            && self.lookup(&self.target_name(target)) == Some(target)
    }

    /// Leaf reached by entering `target`.
    ///
    /// Plain targets recurse through initial substates; `recall(..)` targets
    /// follow the recorded history. Nothing is mutated.
    pub fn enter(&self, target: Target, history: &History) -> Result<StateId> {
        match target {
            Target::Recall(id) => self.recall(id, history),
            Target::State(id) => {
                let state = self.state(id);
                if !state.is_compound() {
                    return Ok(id);
                }
                let initial = state
                    .initial
                    .ok_or_else(|| Error::MissingInitialSubstate(state.name.clone()))?;
                self.enter(initial, history)
            }
        }
    }

    /// Most recently active leaf beneath `id`, or `id` itself for a leaf
    pub fn recall(&self, id: StateId, history: &History) -> Result<StateId> {
        let state = self.state(id);
        if !state.is_compound() {
            return Ok(id);
        }
        let last = history
            .last(id)
            .ok_or_else(|| Error::NoHistoryRecorded(state.name.clone()))?;
        self.recall(last, history)
    }

    /// Actions legal in `id`: its own triggers, then each ancestor's triggers
    /// for action names not already defined closer in.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this chart.
    pub fn actions(&self, id: StateId) -> BTreeMap<String, Target> {
        let mut actions = self.state(id).triggers.clone();
        for ancestor in self.ancestors(id) {
            for (action, target) in &self.state(ancestor).triggers {
                actions.entry(action.clone()).or_insert(*target);
            }
        }
        actions
    }

    /// Monitors of `id` and its ancestors, innermost first
    pub fn monitors(&self, id: StateId) -> Vec<&Monitor> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .flat_map(|s| self.state(s).monitors.iter())
            .collect()
    }

    /// # Panics
    ///
    /// Panics if `id` was not produced by this chart.
    pub fn describe(&self, id: StateId) -> StateDescription {
        let state = self.state(id);
        StateDescription {
            name: state.name.clone(),
            documentation: state
                .documentation
                .as_deref()
                .map(|doc| doc.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|doc| !doc.is_empty()),
            is_compound: state.is_compound(),
            parent: state.parent.map(|p| self.state(p).name.clone()),
            initial: state.initial.map(|t| self.target_name(t)),
            allowed_actions: self
                .actions(id)
                .into_iter()
                .map(|(action, target)| (action, self.target_name(target)))
                .collect(),
            monitors: self.monitors(id).iter().map(|m| m.name.clone()).collect(),
        }
    }
}
