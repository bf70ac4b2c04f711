//! Static chart analysis
//!
//! Builds a leaf-level transition graph and reports reachability, terminal
//! states and cycles. A `recall(C)` target may resume any leaf under `C`, so
//! it contributes an edge to each of them.

use super::history::History;
use super::model::{StateChart, StateId, Target};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::Serialize;
use std::collections::HashMap;

/// Analysis report for a built chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartReport {
    pub root: String,
    pub states: usize,
    pub leaves: usize,
    pub compound: usize,
    pub transitions: usize,
    /// Leaves with no allowed action
    pub terminal: Vec<String>,
    /// Leaves that can never become current
    pub unreachable: Vec<String>,
    pub has_cycles: bool,
}

/// Leaves a transition to `target` can end in
fn landing_leaves(chart: &StateChart, target: Target, fresh: &History) -> Vec<StateId> {
    match target {
        Target::State(_) => chart.enter(target, fresh).ok().into_iter().collect(),
        Target::Recall(id) => chart.leaves().filter(|leaf| chart.is_within(*leaf, id)).collect(),
    }
}

/// Leaf-level transition graph, edges labelled with the action name
pub fn transition_graph(chart: &StateChart) -> (DiGraph<StateId, String>, HashMap<StateId, NodeIndex>) {
    let mut graph = DiGraph::new();
    let index: HashMap<StateId, NodeIndex> = chart
        .leaves()
        .map(|leaf| (leaf, graph.add_node(leaf)))
        .collect();

    let fresh = History::new(chart);
    for leaf in chart.leaves() {
        for (action, target) in chart.actions(leaf) {
            for landing in landing_leaves(chart, target, &fresh) {
                if let (Some(&from), Some(&to)) = (index.get(&leaf), index.get(&landing)) {
                    graph.add_edge(from, to, action.clone());
                }
            }
        }
    }
    (graph, index)
}

pub fn analyze(chart: &StateChart) -> ChartReport {
    let (graph, index) = transition_graph(chart);
    let name = |id: StateId| chart.state(id).name().to_string();

    let mut reached = vec![false; chart.len()];
    let start = chart
        .enter(Target::State(chart.root()), &History::new(chart))
        .ok()
        .and_then(|leaf| index.get(&leaf).copied());
    if let Some(start) = start {
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            reached[graph[node].index()] = true;
        }
    }

    let terminal = graph
        .node_indices()
        .filter(|node| graph.neighbors(*node).next().is_none())
        .map(|node| name(graph[node]))
        .collect();
    let unreachable = chart
        .leaves()
        .filter(|leaf| !reached[leaf.index()])
        .map(name)
        .collect();

    let report = ChartReport {
        root: name(chart.root()),
        states: chart.len(),
        leaves: graph.node_count(),
        compound: chart.len() - graph.node_count(),
        transitions: graph.edge_count(),
        terminal,
        unreachable,
        has_cycles: petgraph::algo::is_cyclic_directed(&graph),
    };
    tracing::debug!(?report, "analyzed chart");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::on;
    use crate::state;

    fn device() -> StateChart {
        StateChart::new(
            "TEST_CHART -> ON",
            [
                state!(
                    "ON -> IDLE",
                    on("turn off").goto("OFF"),
                    on("fault").goto("ERROR"),
                    state!("IDLE", on("run").goto("BUSY")).unwrap(),
                    state!("BUSY", on("done").goto("IDLE")).unwrap(),
                )
                .unwrap(),
                state!("ERROR", on("resume").goto("recall(ON)")).unwrap(),
                state!("OFF", on("turn on").goto("ON")).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_device_report() {
        let report = analyze(&device());
        assert_eq!(report.root, "TEST_CHART");
        assert_eq!(report.states, 6);
        assert_eq!(report.leaves, 4);
        assert_eq!(report.compound, 2);
        assert!(report.terminal.is_empty());
        assert!(report.unreachable.is_empty());
        assert!(report.has_cycles);
    }

    #[test]
    fn test_recall_reaches_every_leaf_under_state() {
        let chart = device();
        let (graph, index) = transition_graph(&chart);
        let error = index[&chart.find("ERROR").unwrap()];
        let mut targets: Vec<&str> = graph
            .neighbors(error)
            .map(|node| chart.state(graph[node]).name())
            .collect();
        targets.sort();
        assert_eq!(targets, vec!["BUSY", "IDLE"]);
    }

    #[test]
    fn test_terminal_and_unreachable() {
        let chart = StateChart::new(
            "ROOT -> START",
            [
                state!("START", on("finish").goto("END")).unwrap(),
                state!("END").unwrap(),
                state!("ORPHAN", on("go").goto("START")).unwrap(),
            ],
        )
        .unwrap();
        let report = analyze(&chart);
        assert_eq!(report.terminal, vec!["END".to_string()]);
        assert_eq!(report.unreachable, vec!["ORPHAN".to_string()]);
        assert!(!report.has_cycles);
    }
}
