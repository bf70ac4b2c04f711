//! Proxy driver - runs a chart on behalf of a named service
//!
//! A [`Proxy`] wraps one [`ChartRuntime`], logs every action it receives and
//! notifies registered [`TransitionObserver`]s after each accepted
//! transition. [`spawn`] moves a proxy onto its own tokio task, where actions
//! arrive one at a time over a bounded channel and are processed in order.

use crate::chart::{ChartRuntime, Dispatch, Monitor, StateChart, StateDescription, StateId, Target};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Record of one accepted transition
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub service: String,
    pub action: String,
    pub from: String,
    pub to: String,
    /// Monitors active in the new state, innermost first
    pub monitors: Vec<Monitor>,
    pub timestamp: DateTime<Utc>,
}

/// Receives a [`TransitionEvent`] after every accepted action
#[async_trait]
pub trait TransitionObserver: Send + Sync {
    async fn on_transition(&self, event: &TransitionEvent);
}

/// Current state of a proxy and the actions it accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyState {
    pub state: String,
    pub allowed_actions: Vec<String>,
}

pub struct Proxy {
    service: String,
    runtime: ChartRuntime,
    observers: Vec<Arc<dyn TransitionObserver>>,
}

impl Proxy {
    /// Start `chart` on behalf of `service_name`
    pub fn new(service_name: impl Into<String>, chart: Arc<StateChart>) -> Result<Self> {
        let service = service_name.into();
        let runtime = ChartRuntime::start(chart)?;
        tracing::info!(service = service.as_str(), "Started in state {}", runtime.current_name());
        Ok(Self {
            service,
            runtime,
            observers: Vec::new(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn state_name(&self) -> &str {
        self.runtime.current_name()
    }

    pub fn runtime(&self) -> &ChartRuntime {
        &self.runtime
    }

    /// Action names accepted in the current state, sorted
    pub fn allowed_actions(&self) -> Vec<String> {
        self.runtime
            .allowed_actions(self.runtime.current_state())
            .into_keys()
            .collect()
    }

    pub fn describe(&self) -> StateDescription {
        self.runtime.describe(self.runtime.current_state())
    }

    pub fn snapshot(&self) -> ProxyState {
        ProxyState {
            state: self.state_name().to_string(),
            allowed_actions: self.allowed_actions(),
        }
    }

    /// Force a transition into `target` regardless of the allowed actions.
    ///
    /// Fails with a fatal error if `target` was not produced by this proxy's chart.
    pub fn enter(&mut self, target: Target) -> Result<StateId> {
        let leaf = self.runtime.set_state(target)?;
        tracing::info!(service = self.service.as_str(), "Forced into state {}", self.state_name());
        Ok(leaf)
    }

    /// Perform `action` and notify observers if it was accepted
    pub async fn do_action(&mut self, action: &str) -> Result<Dispatch> {
        let dispatch = self.runtime.dispatch(action)?;
        let chart = self.runtime.chart();
        let from = chart.state(dispatch.previous).name().to_string();

        if !dispatch.accepted {
            tracing::warn!(
                service = self.service.as_str(),
                "Ignoring illegal action {} from {}",
                action,
                from
            );
            return Ok(dispatch);
        }

        let event = TransitionEvent {
            service: self.service.clone(),
            action: action.to_string(),
            from,
            to: chart.state(dispatch.state).name().to_string(),
            monitors: chart.monitors(dispatch.state).into_iter().cloned().collect(),
            timestamp: Utc::now(),
        };
        tracing::debug!(
            service = self.service.as_str(),
            "Action {} moved {} to {}",
            action,
            event.from,
            event.to
        );
        for observer in &self.observers {
            observer.on_transition(&event).await;
        }
        Ok(dispatch)
    }
}

enum Command {
    Action(String),
    Enter(Target),
    State(oneshot::Sender<ProxyState>),
    Shutdown,
}

/// Handle to a proxy running on its own task
pub struct ProxyHandle {
    sender: mpsc::Sender<Command>,
    task: JoinHandle<Result<()>>,
}

/// Run `proxy` on a new task fed by a channel holding up to `capacity` actions
pub fn spawn(proxy: Proxy, capacity: usize) -> ProxyHandle {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(drive(proxy, receiver));
    ProxyHandle { sender, task }
}

/// Log a failed transition; only fatal errors stop the driver
fn settle<T>(proxy: &Proxy, request: &str, result: Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_fatal() => {
            tracing::error!(service = proxy.service_name(), "Stopping driver: {}", e);
            Err(e)
        }
        Err(e) => {
            tracing::error!(
                service = proxy.service_name(),
                "{} failed in {}: {}",
                request,
                proxy.state_name(),
                e
            );
            Ok(())
        }
    }
}

async fn drive(mut proxy: Proxy, mut receiver: mpsc::Receiver<Command>) -> Result<()> {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Action(action) => {
                let result = proxy.do_action(&action).await;
                settle(&proxy, &format!("Action {}", action), result)?;
            }
            Command::Enter(target) => {
                let result = proxy.enter(target);
                settle(&proxy, "Forced transition", result)?;
            }
            Command::State(reply) => {
                let _ = reply.send(proxy.snapshot());
            }
            Command::Shutdown => break,
        }
    }
    tracing::info!(service = proxy.service_name(), "Driver stopped in state {}", proxy.state_name());
    Ok(())
}

impl ProxyHandle {
    /// Queue an action; waits while the queue is full
    pub async fn send(&self, action: impl Into<String>) -> Result<()> {
        self.sender
            .send(Command::Action(action.into()))
            .await
            .map_err(|_| Error::DriverClosed)
    }

    /// State after every previously queued action has been processed
    pub async fn state(&self) -> Result<ProxyState> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Command::State(reply))
            .await
            .map_err(|_| Error::DriverClosed)?;
        response.await.map_err(|_| Error::DriverClosed)
    }

    /// Queue a forced transition into `target`, bypassing the allowed actions
    pub async fn enter(&self, target: Target) -> Result<()> {
        self.sender
            .send(Command::Enter(target))
            .await
            .map_err(|_| Error::DriverClosed)
    }

    /// Queue `action` once `delay` has elapsed.
    ///
    /// The timer does not keep the driver alive: if the handle has been
    /// joined or dropped by then, the action is discarded.
    pub fn schedule(&self, action: impl Into<String>, delay: Duration) -> JoinHandle<()> {
        let sender = self.sender.downgrade();
        let action = action.into();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let delivered = match sender.upgrade() {
                Some(sender) => sender.send(Command::Action(action.clone())).await.is_ok(),
                None => false,
            };
            if !delivered {
                tracing::debug!("Dropping scheduled action {}: driver closed", action);
            }
        })
    }

    /// Ask the driver to stop after the actions already queued
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::DriverClosed)
    }

    /// Wait for the driver task to finish.
    ///
    /// Dropping the handle closes the queue, so the driver stops once the
    /// actions already queued are processed. Pending [`schedule`](Self::schedule)
    /// timers do not delay it. Returns the fatal error that stopped the driver, if any.
    pub async fn join(self) -> Result<()> {
        let ProxyHandle { sender, task } = self;
        drop(sender);
        task.await
            .map_err(|e| Error::custom(format!("driver task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::on;
    use crate::state;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<TransitionEvent>>,
    }

    #[async_trait]
    impl TransitionObserver for Recorder {
        async fn on_transition(&self, event: &TransitionEvent) {
            self.events.lock().await.push(event.clone());
        }
    }

    fn device() -> Arc<StateChart> {
        let chart = StateChart::new(
            "TEST_CHART -> ON",
            [
                state!(
                    "ON -> IDLE",
                    Monitor::new("power", ["watts"]),
                    on("turn off").goto("OFF"),
                    on("fault").goto("ERROR"),
                    state!("IDLE", on("run").goto("BUSY")).unwrap(),
                    state!("BUSY", Monitor::new("load", ["percent"]), on("done").goto("IDLE"))
                        .unwrap(),
                )
                .unwrap(),
                state!("ERROR", on("resume").goto("recall(ON)")).unwrap(),
                state!("OFF", on("turn on").goto("ON"), on("repair").goto("recall(BROKEN)"))
                    .unwrap(),
                state!("BROKEN -> PART", state!("PART").unwrap()).unwrap(),
            ],
        )
        .unwrap();
        Arc::new(chart)
    }

    #[tokio::test]
    async fn test_accepted_action_notifies_observers() {
        let recorder = Arc::new(Recorder::default());
        let mut proxy = Proxy::new("device", device())
            .unwrap()
            .with_observer(recorder.clone());
        assert_eq!(proxy.state_name(), "IDLE");

        let dispatch = proxy.do_action("run").await.unwrap();
        assert!(dispatch.accepted);

        let events = recorder.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].service, "device");
        assert_eq!(events[0].from, "IDLE");
        assert_eq!(events[0].to, "BUSY");
        let monitors: Vec<&str> = events[0].monitors.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(monitors, vec!["load", "power"]);
    }

    #[tokio::test]
    async fn test_illegal_action_is_ignored() {
        let recorder = Arc::new(Recorder::default());
        let mut proxy = Proxy::new("device", device())
            .unwrap()
            .with_observer(recorder.clone());

        let dispatch = proxy.do_action("done").await.unwrap();
        assert!(!dispatch.accepted);
        assert_eq!(proxy.state_name(), "IDLE");
        assert!(recorder.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_driver_processes_actions_in_order() {
        let proxy = Proxy::new("device", device()).unwrap();
        let handle = spawn(proxy, 4);

        for action in ["run", "fault", "resume"] {
            handle.send(action).await.unwrap();
        }
        let state = handle.state().await.unwrap();
        assert_eq!(state.state, "BUSY");
        assert_eq!(state.allowed_actions, vec!["done", "fault", "turn off"]);

        handle.shutdown().await.unwrap();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_recall_keeps_driver_running() {
        let proxy = Proxy::new("device", device()).unwrap();
        let handle = spawn(proxy, 4);

        handle.send("turn off").await.unwrap();
        handle.send("repair").await.unwrap();
        assert_eq!(handle.state().await.unwrap().state, "OFF");

        handle.send("turn on").await.unwrap();
        assert_eq!(handle.state().await.unwrap().state, "IDLE");
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_scheduled_action() {
        let proxy = Proxy::new("device", device()).unwrap();
        let handle = spawn(proxy, 4);

        let timer = handle.schedule("run", Duration::from_millis(10));
        timer.await.unwrap();
        assert_eq!(handle.state().await.unwrap().state, "BUSY");
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_driver() {
        let proxy = Proxy::new("device", device()).unwrap();
        let handle = spawn(proxy, 1);
        handle.shutdown().await.unwrap();

        // give the driver a chance to observe the shutdown
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(handle.send("run").await, Err(Error::DriverClosed)));
        assert!(matches!(handle.state().await, Err(Error::DriverClosed)));
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_handle_stops_driver() {
        let handle = spawn(Proxy::new("device", device()).unwrap(), 4);
        let foreign = device().find("BUSY").unwrap();

        handle.enter(Target::State(foreign)).await.unwrap();
        let result = handle.join().await;
        assert!(matches!(result, Err(Error::UnknownOrMismatchedState(_))));
    }

    #[tokio::test]
    async fn test_forced_transition() {
        let chart = device();
        let busy = chart.find("BUSY").unwrap();
        let handle = spawn(Proxy::new("device", chart).unwrap(), 4);

        handle.enter(Target::State(busy)).await.unwrap();
        assert_eq!(handle.state().await.unwrap().state, "BUSY");
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_timer_does_not_delay_join() {
        let handle = spawn(Proxy::new("device", device()).unwrap(), 4);
        let timer = handle.schedule("run", Duration::from_secs(3600));

        let joined = tokio::time::timeout(Duration::from_secs(5), handle.join()).await;
        assert!(matches!(joined, Ok(Ok(()))));
        timer.abort();
    }
}
