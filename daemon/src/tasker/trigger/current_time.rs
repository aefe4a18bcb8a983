use crate::tasker::trigger::{Trigger, TriggerConfigError, TriggerLoop};
use crate::utils::Event;
use chrono::NaiveTime;
use lazy_static::lazy_static;
use log::{debug, info};
use mcsv_protocol::tasker::TriggerEvent;
use regex::Regex;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::select;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

lazy_static! {
    static ref TIME_LIST: Regex =
        Regex::new(r"^((\d{2}:\d{2}:\d{2})(;)?)+$").expect("Failed to compile TIME_LIST regex");
}

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Source of the wall-clock time of day.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveTime {
        chrono::Local::now().time()
    }
}

fn parse_targets(text: &str) -> Option<Vec<NaiveTime>> {
    text.trim_end_matches(';')
        .split(';')
        .map(|token| NaiveTime::parse_from_str(token, "%H:%M:%S").ok())
        .collect()
}

/// Distance between two times of day, wrapping around midnight.
fn time_of_day_distance(a: NaiveTime, b: NaiveTime) -> Duration {
    let millis = (a - b).num_milliseconds().rem_euclid(SECONDS_PER_DAY * 1000);
    let millis = millis.min(SECONDS_PER_DAY * 1000 - millis);
    Duration::from_millis(millis as u64)
}

struct Running {
    targets: Arc<Vec<NaiveTime>>,
    task: TriggerLoop,
}

/// Fires at the configured times of day.
///
/// Each poll compares the clock against every target; a target within one poll interval
/// fires, then stays quiet for two intervals so that neighbouring ticks do not fire it again.
pub struct CurrentTimeTrigger {
    clock: Arc<dyn Clock>,
    interval: Duration,
    parameters: Mutex<String>,
    running: Mutex<Option<Running>>,
    events: Arc<Event<TriggerEvent>>,
}

impl CurrentTimeTrigger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_interval(clock, POLL_INTERVAL)
    }

    pub fn with_interval(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            parameters: Mutex::new(String::new()),
            running: Mutex::new(None),
            events: Arc::new(Event::new()),
        }
    }

    /// Parsed targets; present exactly while enabled.
    pub fn targets(&self) -> Option<Vec<NaiveTime>> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|running| running.targets.as_ref().clone())
    }

    async fn poll(
        targets: Arc<Vec<NaiveTime>>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        token: CancellationToken,
        events: Arc<Event<TriggerEvent>>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_fired: Vec<Option<Instant>> = vec![None; targets.len()];

        loop {
            select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let now = clock.now();
                    let instant = Instant::now();
                    for (target, last) in targets.iter().zip(last_fired.iter_mut()) {
                        if time_of_day_distance(now, *target) >= interval {
                            continue;
                        }
                        if last.is_some_and(|at| instant.duration_since(at) < interval * 2) {
                            continue;
                        }
                        *last = Some(instant);
                        let reason = target.format("%H:%M:%S").to_string();
                        info!(
                            target: "tasker",
                            "time trigger fired for {} (clock {})",
                            reason,
                            now.format("%H:%M:%S")
                        );
                        events.invoke(TriggerEvent::Fired { reason });
                    }
                }
            }
        }
        debug!(target: "tasker", "time trigger loop stopped");
    }
}

#[async_trait::async_trait]
impl Trigger for CurrentTimeTrigger {
    fn name(&self) -> &'static str {
        "Current time"
    }

    fn description(&self) -> &'static str {
        "Fires at the given times of day"
    }

    fn parameter_description(&self) -> &'static str {
        "Times as HH:MM:SS, separated by ';' (e.g. 04:00:00;16:00:00)"
    }

    fn validate_input(&self, text: &str) -> bool {
        TIME_LIST.is_match(text) && parse_targets(text).is_some()
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
        assert!(
            self.validate_input(&parameters),
            "time trigger enabled with unvalidated parameters {parameters:?}"
        );
        let targets = Arc::new(parse_targets(&parameters).unwrap_or_default());

        let task = TriggerLoop::spawn({
            let targets = targets.clone();
            let clock = self.clock.clone();
            let interval = self.interval;
            let events = self.events.clone();
            move |token| Self::poll(targets, clock, interval, token, events)
        });
        *running = Some(Running { targets, task });
        drop(running);

        debug!(target: "tasker", "time trigger enabled for {}", parameters);
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
        running.task.shutdown().await;
        self.events.invoke(TriggerEvent::Disabled);
    }

    fn events(&self) -> Arc<Event<TriggerEvent>> {
        self.events.clone()
    }
}
