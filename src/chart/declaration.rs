//! Declarative state items
//!
//! A state is declared from a description string (`NAME` or
//! `NAME -> INITIAL`) followed by an ordered list of [`Item`]s: documentation
//! fragments, nested states, triggers, aliases and monitors. Nothing is linked
//! at this point; target and initial names are resolved when the root state
//! is built into a [`StateChart`](super::StateChart).

use crate::name_graph::GraphNode;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Z_]+)\s*(?:->\s*([A-Z_]+)\s*)?$").expect("description pattern is valid")
});

/// Name of the history pseudostate of `state`
pub fn recall_name(state: &str) -> String {
    format!("recall({})", state)
}

/// Start a trigger declaration: `on("run").goto("BUSY")`
pub fn on(action: impl Into<String>) -> On {
    On {
        action: action.into(),
    }
}

/// Declare an additional name for the enclosing state
pub fn alias(name: impl Into<String>) -> Item {
    Item::Alias(name.into())
}

/// An action name waiting for its target
#[derive(Debug, Clone)]
pub struct On {
    action: String,
}

impl On {
    pub fn goto(self, target: impl Into<String>) -> Trigger {
        Trigger {
            action: self.action,
            target: target.into(),
        }
    }
}

/// A named action leading to a target state (or `recall(STATE)`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub action: String,
    pub target: String,
}

/// An archiving channel published while a state is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Monitor {
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// One entry of a state declaration
#[derive(Debug, Clone)]
pub enum Item {
    /// Documentation fragment; fragments concatenate in order
    Doc(String),
    /// Nested substate
    State(StateDecl),
    /// Action available in this state and every substate
    Trigger(Trigger),
    /// Additional registered name
    Alias(String),
    /// Archiving channel
    Monitor(Monitor),
}

impl From<&str> for Item {
    fn from(doc: &str) -> Self {
        Item::Doc(doc.to_string())
    }
}

impl From<String> for Item {
    fn from(doc: String) -> Self {
        Item::Doc(doc)
    }
}

impl From<StateDecl> for Item {
    fn from(state: StateDecl) -> Self {
        Item::State(state)
    }
}

impl From<Trigger> for Item {
    fn from(trigger: Trigger) -> Self {
        Item::Trigger(trigger)
    }
}

impl From<Monitor> for Item {
    fn from(monitor: Monitor) -> Self {
        Item::Monitor(monitor)
    }
}

/// A declared, unresolved state and its subtree
#[derive(Debug, Clone)]
pub struct StateDecl {
    pub(crate) name: String,
    pub(crate) initial: Option<String>,
    pub(crate) aliases: Vec<String>,
    pub(crate) documentation: Option<String>,
    pub(crate) substates: Vec<StateDecl>,
    pub(crate) triggers: BTreeMap<String, String>,
    pub(crate) monitors: Vec<Monitor>,
}

impl StateDecl {
    /// Declare a state from its description and items.
    ///
    /// Items are consumed in order. A repeated action name keeps the last
    /// target. Once all items are consumed, a state with substates must name
    /// one of them (by name or alias) as its initial substate.
    pub fn new<I>(description: &str, items: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        let captures = DESCRIPTION
            .captures(description)
            .ok_or_else(|| Error::MalformedDescription(description.to_string()))?;
        let name = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::MalformedDescription(description.to_string()))?;
        let initial = captures.get(2).map(|m| m.as_str().to_string());

        let mut state = Self {
            name,
            initial,
            aliases: Vec::new(),
            documentation: None,
            substates: Vec::new(),
            triggers: BTreeMap::new(),
            monitors: Vec::new(),
        };
        for item in items {
            state.push(item.into());
        }
        state.validate()?;
        Ok(state)
    }

    /// Declare a state with no items
    pub fn leaf(description: &str) -> Result<Self> {
        Self::new(description, Vec::<Item>::new())
    }

    fn push(&mut self, item: Item) {
        match item {
            Item::Doc(text) => self.documentation.get_or_insert_with(String::new).push_str(&text),
            Item::State(state) => self.substates.push(state),
            Item::Trigger(trigger) => {
                self.triggers.insert(trigger.action, trigger.target);
            }
            Item::Alias(alias) => self.aliases.push(alias),
            Item::Monitor(monitor) => self.monitors.push(monitor),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.substates.is_empty() {
            return Ok(());
        }
        let initial = self
            .initial
            .as_ref()
            .ok_or_else(|| Error::MissingInitialSubstate(self.name.clone()))?;
        let known = self
            .substates
            .iter()
            .any(|s| &s.name == initial || s.aliases.contains(initial));
        if !known {
            return Err(Error::InvalidInitialSubstate {
                initial: initial.clone(),
                state: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn substates(&self) -> &[StateDecl] {
        &self.substates
    }

    pub fn triggers(&self) -> &BTreeMap<String, String> {
        &self.triggers
    }
}

/// Declare a state from a description and any mix of items.
///
/// ```
/// use statechart_engine::state;
/// use statechart_engine::chart::on;
///
/// let off = state!("OFF", "Device is turned OFF", on("turn on").goto("ON")).unwrap();
/// assert_eq!(off.name(), "OFF");
/// ```
#[macro_export]
macro_rules! state {
    ($description:expr $(, $item:expr)* $(,)?) => {{
        let items: ::std::vec::Vec<$crate::chart::Item> =
            ::std::vec![$($crate::chart::Item::from($item)),*];
        $crate::chart::StateDecl::new($description, items)
    }};
}

/// Borrowed view of a declaration tree as seen by the name graph.
///
/// Every state owns a history pseudonode named `recall(NAME)`, so history
/// targets resolve like any other name.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DeclNode<'a> {
    State(&'a StateDecl),
    History(&'a StateDecl),
}

impl<'a> GraphNode for DeclNode<'a> {
    fn name(&self) -> Option<String> {
        match self {
            DeclNode::State(decl) => Some(decl.name.clone()),
            DeclNode::History(decl) => Some(recall_name(&decl.name)),
        }
    }

    fn aliases(&self) -> Vec<String> {
        match self {
            DeclNode::State(decl) => decl.aliases.clone(),
            DeclNode::History(_) => Vec::new(),
        }
    }

    fn children(&self) -> Vec<Self> {
        match *self {
            DeclNode::State(decl) => std::iter::once(DeclNode::History(decl))
                .chain(decl.substates.iter().map(DeclNode::State))
                .collect(),
            DeclNode::History(_) => Vec::new(),
        }
    }

    // initial first, then trigger targets in action order
    fn references(&self) -> Vec<String> {
        match self {
            DeclNode::State(decl) => decl
                .initial
                .iter()
                .chain(decl.triggers.values())
                .cloned()
                .collect(),
            DeclNode::History(_) => Vec::new(),
        }
    }
}
