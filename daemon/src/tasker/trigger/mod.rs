mod current_time;
mod server_status;

use crate::utils::Event;
use mcsv_protocol::management::instance::ServerEvent;
use mcsv_protocol::tasker::{TriggerConfig, TriggerEvent, TriggerKind};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use current_time::{CurrentTimeTrigger, SystemClock};
use server_status::ServerStatusTrigger;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TriggerConfigError {
    #[error("invalid trigger parameters: {0:?}")]
    InvalidParameters(String),
}

/// A condition that, while enabled, emits [`TriggerEvent::Fired`] whenever it holds.
///
/// Triggers start disabled. Parameters must pass [`Trigger::validate_input`] before
/// [`Trigger::enable`]; enabling with unvalidated parameters is a programming error.
#[async_trait::async_trait]
pub trait Trigger: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn parameter_description(&self) -> &'static str;

    /// Pure syntactic check of a parameter string.
    fn validate_input(&self, text: &str) -> bool;

    fn parameters(&self) -> String;

    fn set_parameters(&self, text: &str) -> Result<(), TriggerConfigError>;

    fn enabled(&self) -> bool;

    /// Parses the parameters and starts evaluating. No-op when already enabled.
    ///
    /// # Panics
    /// When the current parameters do not validate.
    fn enable(&self);

    /// Stops evaluating; once this returns no further `Fired` is emitted. No-op when disabled.
    async fn disable(&self);

    fn events(&self) -> Arc<Event<TriggerEvent>>;
}

/// Background evaluation loop of an enabled trigger.
pub(crate) struct TriggerLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TriggerLoop {
    pub(crate) fn spawn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task = tokio::spawn(f(token.clone()));
        Self { token, task }
    }

    /// Cancels the loop and waits for it to finish.
    pub(crate) async fn shutdown(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}

/// Builds a trigger of the configured kind with validated parameters.
pub fn create_trigger(
    config: &TriggerConfig,
    server_events: Arc<Event<ServerEvent>>,
) -> Result<Arc<dyn Trigger>, TriggerConfigError> {
    let trigger: Arc<dyn Trigger> = match config.kind {
        TriggerKind::CurrentTime => Arc::new(CurrentTimeTrigger::new(Arc::new(SystemClock))),
        TriggerKind::ServerStatus => Arc::new(ServerStatusTrigger::new(server_events)),
    };
    trigger.set_parameters(&config.parameters)?;
    Ok(trigger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_validates_parameters() {
        let server_events = Arc::new(Event::new());
        let config = TriggerConfig {
            kind: TriggerKind::CurrentTime,
            parameters: "04:00:00;".into(),
        };
        let trigger = create_trigger(&config, server_events.clone()).unwrap();
        assert_eq!(trigger.name(), "Current time");
        assert_eq!(trigger.parameters(), "04:00:00;");
        assert!(!trigger.enabled());

        let config = TriggerConfig {
            kind: TriggerKind::ServerStatus,
            parameters: "exploded".into(),
        };
        assert_eq!(
            create_trigger(&config, server_events).err(),
            Some(TriggerConfigError::InvalidParameters("exploded".into()))
        );
    }
}
