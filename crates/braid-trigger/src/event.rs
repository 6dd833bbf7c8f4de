//! Externally driven triggers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::error::TriggerError;
use crate::trigger::{Trigger, TriggerSink};

/// Launches a workflow for each event delivered through [`EventTrigger::handle_event`].
pub struct EventTrigger {
  workflow_id: String,
  listening: AtomicBool,
  sink: Mutex<Option<TriggerSink>>,
  /// Runtime captured at `start`, so events can arrive from any thread.
  handle: Mutex<Option<Handle>>,
}

impl EventTrigger {
  pub fn new(workflow_id: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      listening: AtomicBool::new(false),
      sink: Mutex::new(None),
      handle: Mutex::new(None),
    }
  }

  /// Schedule a launch with `payload` as trigger data.
  ///
  /// Never blocks. Returns `false` when the trigger is not listening.
  pub fn handle_event(&self, payload: Value) -> bool {
    if !self.listening.load(Ordering::SeqCst) {
      debug!(workflow_id = %self.workflow_id, "event ignored, trigger not listening");
      return false;
    }

    let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner).clone();
    let handle = self
      .handle
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    let (Some(sink), Some(handle)) = (sink, handle) else {
      return false;
    };

    let workflow_id = self.workflow_id.clone();
    handle.spawn(async move {
      // Launch errors are logged by the sink.
      let _ = sink.trigger_workflow(&workflow_id, payload).await;
    });
    true
  }
}

impl Trigger for EventTrigger {
  fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  fn attach(&self, sink: TriggerSink) {
    *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
  }

  fn start(&self) -> Result<(), TriggerError> {
    if self
      .sink
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_none()
    {
      return Err(TriggerError::NotAttached(self.workflow_id.clone()));
    }
    let handle = Handle::try_current().map_err(|_| TriggerError::NoRuntime)?;

    *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    self.listening.store(true, Ordering::SeqCst);
    info!(workflow_id = %self.workflow_id, "event_trigger_listening");
    Ok(())
  }

  fn stop(&self) {
    if self.listening.swap(false, Ordering::SeqCst) {
      info!(workflow_id = %self.workflow_id, "event_trigger_stopped");
    }
  }

  fn is_active(&self) -> bool {
    self.listening.load(Ordering::SeqCst)
  }
}
