//! Interval-driven triggers.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TriggerError;
use crate::trigger::{Trigger, TriggerSink};

/// Interval used for schedules that cannot be parsed.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Longest accepted interval (366 days).
pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * 86_400);

/// Parse a schedule expression into an interval.
///
/// Supported forms are `every_<N>s`, `every_<N>m`, `every_<N>h`, `hourly` and
/// `daily`. Anything else, including a zero interval or one longer than
/// [`MAX_INTERVAL`], falls back to [`DEFAULT_INTERVAL`].
pub fn parse_schedule(expr: &str) -> Duration {
  match expr {
    "daily" => Duration::from_secs(86_400),
    "hourly" => Duration::from_secs(3_600),
    other => other
      .strip_prefix("every_")
      .and_then(parse_every)
      .unwrap_or_else(|| {
        warn!(schedule = %expr, "unrecognized schedule, using default interval");
        DEFAULT_INTERVAL
      }),
  }
}

fn parse_every(expr: &str) -> Option<Duration> {
  let unit = expr.chars().last()?;
  let digits = &expr[..expr.len() - unit.len_utf8()];
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }

  let count: u64 = digits.parse().ok()?;
  let multiplier = match unit {
    's' => 1,
    'm' => 60,
    'h' => 3_600,
    _ => return None,
  };

  count
    .checked_mul(multiplier)
    .filter(|secs| *secs > 0)
    .map(Duration::from_secs)
    .filter(|interval| *interval <= MAX_INTERVAL)
}

/// Launches a workflow every interval until stopped.
///
/// The first launch happens one interval after `start`.
pub struct ScheduledTrigger {
  workflow_id: String,
  schedule: String,
  interval: Duration,
  initial_data: Value,
  sink: Mutex<Option<TriggerSink>>,
  cancel: Mutex<Option<CancellationToken>>,
}

impl ScheduledTrigger {
  pub fn new(workflow_id: impl Into<String>, schedule: impl Into<String>, initial_data: Value) -> Self {
    let schedule = schedule.into();
    Self {
      workflow_id: workflow_id.into(),
      interval: parse_schedule(&schedule),
      schedule,
      initial_data,
      sink: Mutex::new(None),
      cancel: Mutex::new(None),
    }
  }

  pub fn schedule(&self) -> &str {
    &self.schedule
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }
}

impl Trigger for ScheduledTrigger {
  fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  fn attach(&self, sink: TriggerSink) {
    *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
  }

  fn start(&self) -> Result<(), TriggerError> {
    let mut cancel = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
    if cancel.as_ref().is_some_and(|token| !token.is_cancelled()) {
      return Ok(());
    }

    let sink = self
      .sink
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
      .ok_or_else(|| TriggerError::NotAttached(self.workflow_id.clone()))?;
    let handle = Handle::try_current().map_err(|_| TriggerError::NoRuntime)?;

    let token = CancellationToken::new();
    let workflow_id = self.workflow_id.clone();
    let data = self.initial_data.clone();
    let interval = self.interval;

    info!(
      trigger = %sink.name(),
      workflow_id = %workflow_id,
      schedule = %self.schedule,
      interval_secs = interval.as_secs(),
      "scheduled_trigger_started"
    );

    handle.spawn(run_schedule(sink, workflow_id, data, interval, token.clone()));
    *cancel = Some(token);
    Ok(())
  }

  fn stop(&self) {
    if let Some(token) = self.cancel.lock().unwrap_or_else(PoisonError::into_inner).take() {
      token.cancel();
      info!(workflow_id = %self.workflow_id, "scheduled_trigger_stopped");
    }
  }

  fn is_active(&self) -> bool {
    self
      .cancel
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .as_ref()
      .is_some_and(|token| !token.is_cancelled())
  }
}

async fn run_schedule(
  sink: TriggerSink,
  workflow_id: String,
  data: Value,
  interval: Duration,
  cancel: CancellationToken,
) {
  let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = ticker.tick() => {
        // Launch errors are logged by the sink; the schedule keeps going.
        let _ = sink.trigger_workflow(&workflow_id, data.clone()).await;
      }
    }
  }

  debug!(workflow_id = %workflow_id, "schedule loop exited");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_schedule() {
    let cases = [
      ("every_30s", 30),
      ("every_5m", 300),
      ("every_2h", 7_200),
      ("every_1s", 1),
      ("hourly", 3_600),
      ("daily", 86_400),
      ("every_0s", 300),
      ("every_m", 300),
      ("every_10d", 300),
      ("every_-5s", 300),
      ("weekly", 300),
      ("", 300),
      ("*/5 * * * *", 300),
      ("every_8784h", 31_622_400),
      ("every_8785h", 300),
      ("every_18446744073709551615s", 300),
      ("every_18446744073709551615h", 300),
      ("every_99999999999999999999999s", 300),
    ];

    for (expr, secs) in cases {
      assert_eq!(parse_schedule(expr), Duration::from_secs(secs), "schedule {:?}", expr);
    }
  }

  #[test]
  fn test_new_uses_parsed_interval() {
    let trigger = ScheduledTrigger::new("wf", "every_15m", Value::Null);
    assert_eq!(trigger.interval(), Duration::from_secs(900));
    assert_eq!(trigger.schedule(), "every_15m");
    assert!(!trigger.is_active());
  }

  #[test]
  fn test_start_requires_sink() {
    let trigger = ScheduledTrigger::new("wf", "hourly", Value::Null);
    assert_eq!(
      trigger.start(),
      Err(TriggerError::NotAttached("wf".to_string()))
    );
  }
}
