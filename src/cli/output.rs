//! Output formatting module
//!
//! This module handles formatting chart reports, state descriptions and the
//! interactive prompt.

use crate::{
    Result,
    chart::{ChartReport, StateDescription},
    proxy::ProxyState,
};
use serde_json::json;

/// Output an analysis report as text
pub fn output_report(w: &mut impl std::io::Write, report: &ChartReport) -> Result<()> {
    writeln!(w, "Chart {} - Validation Report", report.root)?;
    writeln!(w, "{}", "=".repeat(60))?;
    writeln!(w, "  States:      {}", report.states)?;
    writeln!(w, "  Leaves:      {}", report.leaves)?;
    writeln!(w, "  Compound:    {}", report.compound)?;
    writeln!(w, "  Transitions: {}", report.transitions)?;
    writeln!(w, "  Cycles:      {}", if report.has_cycles { "yes" } else { "no" })?;

    if !report.terminal.is_empty() {
        writeln!(w, "  Terminal:    {}", report.terminal.join(", "))?;
    }
    if !report.unreachable.is_empty() {
        writeln!(w, "  Unreachable: {}", report.unreachable.join(", "))?;
    }
    Ok(())
}

/// Output state descriptions as JSON
pub fn output_json(w: &mut impl std::io::Write, states: &[StateDescription]) -> Result<()> {
    let output = json!({
        "summary": {
            "total_states": states.len(),
            "compound_states": states.iter().filter(|s| s.is_compound).count(),
        },
        "states": states,
    });

    serde_json::to_writer_pretty(&mut *w, &output)?;
    writeln!(w)?;
    Ok(())
}

/// Output state descriptions as text table
pub fn output_table(w: &mut impl std::io::Write, states: &[StateDescription]) -> Result<()> {
    writeln!(
        w,
        "{:<20} {:<20} {:<20} {:<40}",
        "State", "Parent", "Initial", "Allowed Actions"
    )?;
    writeln!(w, "{:-<100}", "")?;

    for state in states {
        let actions = state
            .allowed_actions
            .iter()
            .map(|(action, target)| format!("{} -> {}", action, target))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            w,
            "{:<20} {:<20} {:<20} {:<40}",
            state.name,
            state.parent.as_deref().unwrap_or("-"),
            state.initial.as_deref().unwrap_or("-"),
            actions
        )?;
        if let Some(doc) = &state.documentation {
            writeln!(w, "    {}", doc)?;
        }
        if !state.monitors.is_empty() {
            writeln!(w, "    monitors: {}", state.monitors.join(", "))?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Output the current state and a numbered list of allowed actions
pub fn output_prompt(w: &mut impl std::io::Write, state: &ProxyState) -> Result<()> {
    writeln!(w, "Current state is {}", state.state)?;
    for (index, action) in state.allowed_actions.iter().enumerate() {
        writeln!(w, "  [{}] {}", index + 1, action)?;
    }
    Ok(())
}
