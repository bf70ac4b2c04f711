//! Chart export to Graphviz DOT and flat JSON

use super::model::{StateChart, StateId, Target};
use crate::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// DOT node id of a transition target. Compound states are drawn as a
/// cluster whose entry point is the `I` hexagon carrying the state's name.
fn node_id(chart: &StateChart, target: Target) -> String {
    match target {
        Target::State(id) => chart.state(id).name().to_string(),
        Target::Recall(id) => format!("recall{}", chart.state(id).name()),
    }
}

fn write_nodes(chart: &StateChart, id: StateId, indent: &str, dot: &mut String) {
    let state = chart.state(id);
    if !state.is_compound() {
        dot.push_str(&format!("{}{};\n", indent, state.name()));
        return;
    }

    let name = state.name();
    dot.push_str(&format!("{}subgraph cluster{} {{\n", indent, name));
    dot.push_str(&format!("{}  label=\"{}\";\n", indent, name));
    dot.push_str(&format!("{}  {} [label=\"I\",shape=hexagon];\n", indent, name));
    dot.push_str(&format!("{}  recall{} [label=\"H\",shape=hexagon];\n", indent, name));
    dot.push_str(&format!(
        "{}  anchor{} [style=invis,height=0,width=0,fontsize=0];\n",
        indent, name
    ));
    let inner = format!("{}  ", indent);
    for substate in state.substates() {
        write_nodes(chart, *substate, &inner, dot);
    }
    dot.push_str(&format!("{}}}\n", indent));
}

fn write_edges(chart: &StateChart, id: StateId, dot: &mut String) {
    let state = chart.state(id);
    let name = state.name();
    if !state.is_compound() {
        for (action, target) in state.triggers() {
            dot.push_str(&format!(
                "  {} -> {} [label=\"{}\"];\n",
                name,
                node_id(chart, *target),
                action.replace('"', "\\\"")
            ));
        }
        return;
    }

    if let Some(initial) = state.initial() {
        dot.push_str(&format!("  {} -> {};\n", name, node_id(chart, initial)));
    }
    for substate in state.substates() {
        write_edges(chart, *substate, dot);
    }
    for (action, target) in state.triggers() {
        dot.push_str(&format!(
            "  anchor{} -> {} [ltail=\"cluster{}\",label=\"{}\"];\n",
            name,
            node_id(chart, *target),
            name,
            action.replace('"', "\\\"")
        ));
    }
}

/// Render the chart as a clustered Graphviz digraph
pub fn to_dot(chart: &StateChart) -> String {
    let mut dot = format!(
        "// Statechart generated on {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    dot.push_str("digraph statechart {\n");
    dot.push_str("  compound=true;\n");
    dot.push_str("  remincross=true;\n");
    dot.push_str("  node [shape=box, style=rounded];\n\n");

    write_nodes(chart, chart.root(), "  ", &mut dot);
    dot.push('\n');
    write_edges(chart, chart.root(), &mut dot);

    dot.push_str("}\n");
    dot
}

/// Flat record of one state, as exported to JSON
#[derive(Debug, Clone, Serialize)]
pub struct StateEntry {
    pub name: String,
    pub compound: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub triggers: BTreeMap<String, String>,
}

pub fn entries(chart: &StateChart) -> Vec<StateEntry> {
    chart
        .states()
        .map(|(_, state)| StateEntry {
            name: state.name().to_string(),
            compound: state.is_compound(),
            initial: state.initial().map(|t| chart.target_name(t)),
            parent: state.parent().map(|p| chart.state(p).name().to_string()),
            documentation: state.documentation().map(str::to_string),
            triggers: state
                .triggers()
                .iter()
                .map(|(action, target)| (action.clone(), chart.target_name(*target)))
                .collect(),
        })
        .collect()
}

/// Render the chart as a flat JSON list of states in declaration order
pub fn to_json(chart: &StateChart) -> Result<String> {
    Ok(serde_json::to_string_pretty(&entries(chart))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::on;
    use crate::state;

    fn chart() -> StateChart {
        StateChart::new(
            "TEST_CHART -> ON",
            [
                state!(
                    "ON -> IDLE",
                    on("turn off").goto("OFF"),
                    state!("IDLE", on("run").goto("BUSY")).unwrap(),
                    state!("BUSY").unwrap(),
                )
                .unwrap(),
                state!("OFF", "Device is off", on("turn on").goto("recall(ON)")).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_dot_clusters_and_edges() {
        let dot = to_dot(&chart());
        assert!(dot.starts_with("// Statechart generated on"));
        assert!(dot.contains("subgraph clusterTEST_CHART {"));
        assert!(dot.contains("subgraph clusterON {"));
        assert!(dot.contains("ON [label=\"I\",shape=hexagon];"));
        assert!(dot.contains("recallON [label=\"H\",shape=hexagon];"));
        assert!(dot.contains("  TEST_CHART -> ON;\n"));
        assert!(dot.contains("  ON -> IDLE;\n"));
        assert!(dot.contains("  IDLE -> BUSY [label=\"run\"];\n"));
        assert!(dot.contains("anchorON -> OFF [ltail=\"clusterON\",label=\"turn off\"];"));
        assert!(dot.contains("  OFF -> recallON [label=\"turn on\"];\n"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_json_entries() {
        let json = to_json(&chart()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let states = value.as_array().unwrap();
        assert_eq!(states.len(), 5);
        assert_eq!(states[0]["name"], "TEST_CHART");
        assert_eq!(states[0]["compound"], true);
        assert_eq!(states[0]["initial"], "ON");
        assert!(states[0].get("parent").is_none());

        let off = states.iter().find(|s| s["name"] == "OFF").unwrap();
        assert_eq!(off["parent"], "TEST_CHART");
        assert_eq!(off["documentation"], "Device is off");
        assert_eq!(off["triggers"]["turn on"], "recall(ON)");
    }
}
