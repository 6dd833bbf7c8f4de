//! Trigger registry and lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{error, info};

use crate::error::TriggerError;
use crate::launcher::WorkflowLauncher;
use crate::trigger::{Trigger, TriggerSink};

/// Trigger name logged for launches made through [`TriggerService::trigger_workflow`].
pub const DIRECT_TRIGGER: &str = "direct";

/// Owns named triggers and routes their launches to a [`WorkflowLauncher`].
pub struct TriggerService {
  launcher: Arc<dyn WorkflowLauncher>,
  triggers: Mutex<IndexMap<String, Arc<dyn Trigger>>>,
  started: AtomicBool,
}

impl TriggerService {
  pub fn new(launcher: Arc<dyn WorkflowLauncher>) -> Self {
    Self {
      launcher,
      triggers: Mutex::new(IndexMap::new()),
      started: AtomicBool::new(false),
    }
  }

  fn triggers(&self) -> MutexGuard<'_, IndexMap<String, Arc<dyn Trigger>>> {
    self.triggers.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register `trigger` under `name` and attach it to this service.
  ///
  /// If the service is already started the trigger is started immediately.
  pub fn register_trigger(&self, name: impl Into<String>, trigger: Arc<dyn Trigger>) -> Result<(), TriggerError> {
    let name = name.into();
    let mut triggers = self.triggers();
    if triggers.contains_key(&name) {
      return Err(TriggerError::AlreadyRegistered(name));
    }

    trigger.attach(TriggerSink::new(name.clone(), self.launcher.clone()));
    if self.started.load(Ordering::SeqCst) {
      trigger.start()?;
    }

    info!(trigger = %name, workflow_id = %trigger.workflow_id(), "trigger_registered");
    triggers.insert(name, trigger);
    Ok(())
  }

  /// Stop and remove a trigger.
  pub fn unregister_trigger(&self, name: &str) -> Result<(), TriggerError> {
    let trigger = self
      .triggers()
      .shift_remove(name)
      .ok_or_else(|| TriggerError::NotFound(name.to_string()))?;
    trigger.stop();
    info!(trigger = %name, "trigger_unregistered");
    Ok(())
  }

  /// Start every registered trigger.
  ///
  /// Every trigger is attempted; the first failure is returned.
  pub fn start(&self) -> Result<(), TriggerError> {
    self.started.store(true, Ordering::SeqCst);

    let mut first_error = None;
    for (name, trigger) in self.triggers().iter() {
      if let Err(e) = trigger.start() {
        error!(trigger = %name, error = %e, "trigger_start_failed");
        first_error.get_or_insert(e);
      }
    }

    info!("trigger_service_started");
    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Stop every registered trigger.
  pub fn stop(&self) {
    self.started.store(false, Ordering::SeqCst);
    for trigger in self.triggers().values() {
      trigger.stop();
    }
    info!("trigger_service_stopped");
  }

  pub fn is_started(&self) -> bool {
    self.started.load(Ordering::SeqCst)
  }

  /// Registered trigger names in registration order.
  pub fn trigger_names(&self) -> Vec<String> {
    self.triggers().keys().cloned().collect()
  }

  pub fn trigger(&self, name: &str) -> Option<Arc<dyn Trigger>> {
    self.triggers().get(name).cloned()
  }

  /// Launch `workflow_id` directly and return the new execution id.
  ///
  /// Goes through the same sink as registered triggers, under the name
  /// [`DIRECT_TRIGGER`].
  pub async fn trigger_workflow(&self, workflow_id: &str, data: Value) -> Result<String, TriggerError> {
    TriggerSink::new(DIRECT_TRIGGER, self.launcher.clone())
      .trigger_workflow(workflow_id, data)
      .await
  }
}
