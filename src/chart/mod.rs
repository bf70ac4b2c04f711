//! Hierarchical state charts
//!
//! States are declared with [`StateDecl`] (or the [`state!`](crate::state)
//! macro), built into an immutable [`StateChart`] and executed by a
//! [`ChartRuntime`].

pub mod analyzer;
pub mod declaration;
pub mod export;
pub mod file;
pub mod history;
pub mod model;
pub mod runtime;

pub use analyzer::{ChartReport, analyze};
pub use declaration::{Item, Monitor, On, StateDecl, Trigger, alias, on, recall_name};
pub use export::{to_dot, to_json};
pub use file::{ChartFile, StateSpec, load_chart};
pub use history::History;
pub use model::{StateChart, StateDescription, StateId, StateNode, Target};
pub use runtime::{ChartRuntime, Dispatch};
