use crate::tasker::trigger::{Trigger, TriggerConfigError, TriggerLoop};
use crate::utils::Event;
use log::info;
use mcsv_protocol::management::instance::ServerEvent;
use mcsv_protocol::tasker::TriggerEvent;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Started,
    Ready,
    Stopped,
    Crashed,
}

impl Condition {
    fn parse(keyword: &str) -> Option<Self> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "started" => Some(Self::Started),
            "ready" => Some(Self::Ready),
            "stopped" => Some(Self::Stopped),
            "crashed" => Some(Self::Crashed),
            _ => None,
        }
    }

    fn of(event: &ServerEvent) -> Option<Self> {
        match event {
            ServerEvent::Started { .. } => Some(Self::Started),
            ServerEvent::Ready => Some(Self::Ready),
            ServerEvent::Stopped { .. } => Some(Self::Stopped),
            ServerEvent::Crashed { .. } => Some(Self::Crashed),
            _ => None,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
            Self::Crashed => "crashed",
        }
    }
}

fn parse_conditions(text: &str) -> Option<Vec<Condition>> {
    text.trim_end_matches(';')
        .split(';')
        .map(Condition::parse)
        .collect()
}

struct Running {
    listener: u64,
    task: TriggerLoop,
}

/// Fires when the supervised server reaches one of the listed lifecycle points.
pub struct ServerStatusTrigger {
    server_events: Arc<Event<ServerEvent>>,
    parameters: Mutex<String>,
    running: Mutex<Option<Running>>,
    events: Arc<Event<TriggerEvent>>,
}

impl ServerStatusTrigger {
    pub fn new(server_events: Arc<Event<ServerEvent>>) -> Self {
        Self {
            server_events,
            parameters: Mutex::new(String::new()),
            running: Mutex::new(None),
            events: Arc::new(Event::new()),
        }
    }

    async fn watch(
        conditions: Vec<Condition>,
        mut rx: mpsc::UnboundedReceiver<ServerEvent>,
        token: CancellationToken,
        events: Arc<Event<TriggerEvent>>,
    ) {
        loop {
            let event = select! {
                biased;
                _ = token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let Some(condition) = Condition::of(&event) else {
                continue;
            };
            if conditions.contains(&condition) {
                info!(target: "tasker", "status trigger fired on {}", condition.keyword());
                events.invoke(TriggerEvent::Fired {
                    reason: condition.keyword().to_string(),
                });
            }
        }
    }
}

#[async_trait::async_trait]
impl Trigger for ServerStatusTrigger {
    fn name(&self) -> &'static str {
        "Server status"
    }

    fn description(&self) -> &'static str {
        "Fires when the server starts, finishes loading, stops or crashes"
    }

    fn parameter_description(&self) -> &'static str {
        "Any of started, ready, stopped, crashed, separated by ';'"
    }

    fn validate_input(&self, text: &str) -> bool {
        parse_conditions(text).is_some()
    }

    fn parameters(&self) -> String {
        self.parameters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_parameters(&self, text: &str) -> Result<(), TriggerConfigError> {
        if !self.validate_input(text) {
            return Err(TriggerConfigError::InvalidParameters(text.to_string()));
        }
        *self.parameters.lock().unwrap_or_else(PoisonError::into_inner) = text.to_string();
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn enable(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return;
        }
        let parameters = self.parameters();
        let Some(conditions) = parse_conditions(&parameters) else {
            panic!("status trigger enabled with unvalidated parameters {parameters:?}");
        };

        let (listener, rx) = self.server_events.subscribe();
        let events = self.events.clone();
        let task = TriggerLoop::spawn(move |token| Self::watch(conditions, rx, token, events));
        *running = Some(Running { listener, task });
        drop(running);

        self.events.invoke(TriggerEvent::Enabled);
    }

    async fn disable(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };
        self.server_events.remove_listener(running.listener);
        running.task.shutdown().await;
        self.events.invoke(TriggerEvent::Disabled);
    }

    fn events(&self) -> Arc<Event<TriggerEvent>> {
        self.events.clone()
    }
}
