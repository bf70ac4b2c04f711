//! CLI command implementations
//!
//! This module contains the implementation for each CLI command.

use crate::chart::{StateChart, load_chart};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

fn load(path: &Path) -> Result<StateChart> {
    load_chart(path).inspect_err(|e| eprintln!("❌ Failed to load chart {:?}: {}", path, e))
}

/// Validate command implementation
pub mod validate {
    use super::*;
    use crate::chart::analyze;

    /// Execute the validate command
    pub fn execute(path: PathBuf) -> Result<()> {
        tracing::info!("Validating chart: {:?}", path);
        let chart = load(&path)?;
        let report = analyze(&chart);

        crate::cli::output::output_report(&mut std::io::stdout(), &report)?;
        if report.unreachable.is_empty() {
            println!("✅ Chart is valid!");
        } else {
            println!(
                "⚠️  Chart is valid but {} state(s) can never be entered",
                report.unreachable.len()
            );
        }
        Ok(())
    }
}

/// Describe command implementation
pub mod describe {
    use super::*;
    use crate::cli::OutputFormat;

    /// Execute the describe command
    pub fn execute(path: PathBuf, state: Option<String>, output: OutputFormat) -> Result<()> {
        let chart = load(&path)?;

        let states = match state {
            Some(name) => {
                let id = chart
                    .find(&name)
                    .ok_or_else(|| Error::custom(format!("no such state named \"{}\"", name)))?;
                vec![chart.describe(id)]
            }
            None => chart.states().map(|(id, _)| chart.describe(id)).collect(),
        };

        match output {
            OutputFormat::Json => crate::cli::output::output_json(&mut std::io::stdout(), &states),
            OutputFormat::Table => crate::cli::output::output_table(&mut std::io::stdout(), &states),
        }
    }
}

/// Export command implementation
pub mod export {
    use super::*;
    use crate::chart::{to_dot, to_json};
    use crate::cli::ExportFormat;

    /// Execute the export command
    pub fn execute(path: PathBuf, format: ExportFormat, out: Option<PathBuf>) -> Result<()> {
        let chart = load(&path)?;
        let document = match format {
            ExportFormat::Dot => to_dot(&chart),
            ExportFormat::Json => to_json(&chart)?,
        };

        match out {
            Some(out) => {
                std::fs::write(&out, document)?;
                println!("Chart exported to {}", out.display());
            }
            None => println!("{}", document),
        }
        Ok(())
    }
}

/// Run command implementation
pub mod run {
    use super::*;
    use crate::Config;
    use crate::proxy::{Proxy, ProxyHandle, TransitionEvent, TransitionObserver, spawn};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, BufReader};

    /// Prints each accepted transition
    struct TransitionPrinter;

    #[async_trait]
    impl TransitionObserver for TransitionPrinter {
        async fn on_transition(&self, event: &TransitionEvent) {
            println!("  {} --{}--> {}", event.from, event.action, event.to);
        }
    }

    /// Map user input to an action: a 1-based index into `allowed` or a name
    pub fn resolve_action(input: &str, allowed: &[String]) -> Option<String> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        match input.parse::<usize>() {
            Ok(index) => index
                .checked_sub(1)
                .and_then(|i| allowed.get(i))
                .cloned(),
            Err(_) => Some(input.to_string()),
        }
    }

    /// Execute the run command
    pub async fn execute(
        path: PathBuf,
        script: Option<Vec<String>>,
        service: Option<String>,
        config: &Config,
    ) -> Result<()> {
        let chart = Arc::new(load(&path)?);
        let service = service.unwrap_or_else(|| config.proxy.service_name.clone());
        let proxy = Proxy::new(service, chart)?.with_observer(Arc::new(TransitionPrinter));
        let handle = spawn(proxy, config.proxy.queue_capacity);

        let outcome = session(&handle, script).await;
        finish(handle, outcome).await
    }

    async fn session(handle: &ProxyHandle, script: Option<Vec<String>>) -> Result<()> {
        let mut stdout = std::io::stdout();
        match script {
            Some(actions) => {
                for action in actions {
                    let action = action.trim();
                    if action.is_empty() {
                        continue;
                    }
                    println!("> {}", action);
                    handle.send(action).await?;
                }
                crate::cli::output::output_prompt(&mut stdout, &handle.state().await?)?;
            }
            None => {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                loop {
                    let state = handle.state().await?;
                    crate::cli::output::output_prompt(&mut stdout, &state)?;

                    let Some(line) = lines.next_line().await? else {
                        break;
                    };
                    if matches!(line.trim(), "quit" | "exit") {
                        break;
                    }
                    match resolve_action(&line, &state.allowed_actions) {
                        Some(action) => handle.send(action).await?,
                        None => println!("Unknown choice {:?}", line.trim()),
                    }
                }
            }
        }
        Ok(())
    }

    /// Stop the driver and report how the session ended.
    ///
    /// An error that stopped the driver takes precedence over `outcome`,
    /// which only sees [`Error::DriverClosed`] in that case.
    pub async fn finish(handle: ProxyHandle, outcome: Result<()>) -> Result<()> {
        // fails only if the driver is already gone; join reports why
        let _ = handle.shutdown().await;
        handle.join().await?;
        outcome
    }

}
