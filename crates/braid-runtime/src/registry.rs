//! Active-executions registry.
//!
//! Each execution lives in an [`ExecutionSlot`]. The context sits behind a
//! synchronous mutex that is never held across an await; callers only ever
//! receive clones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::context::{ExecutionContext, ExecutionSummary};

pub(crate) struct ExecutionSlot {
  context: Mutex<ExecutionContext>,
  /// Wakes a run parked at a pause checkpoint.
  pub(crate) wake: Notify,
  /// Cancelled together with the context's transition to `Cancelled`.
  pub(crate) cancel: CancellationToken,
}

impl ExecutionSlot {
  pub(crate) fn new(context: ExecutionContext) -> Self {
    Self {
      context: Mutex::new(context),
      wake: Notify::new(),
      cancel: CancellationToken::new(),
    }
  }

  pub(crate) fn lock(&self) -> MutexGuard<'_, ExecutionContext> {
    self.context.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn snapshot(&self) -> ExecutionContext {
    self.lock().clone()
  }
}

#[derive(Clone, Default)]
pub(crate) struct ExecutionRegistry {
  slots: Arc<Mutex<HashMap<String, Arc<ExecutionSlot>>>>,
}

impl ExecutionRegistry {
  fn slots(&self) -> MutexGuard<'_, HashMap<String, Arc<ExecutionSlot>>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn insert(&self, execution_id: String, slot: Arc<ExecutionSlot>) {
    self.slots().insert(execution_id, slot);
  }

  pub(crate) fn get(&self, execution_id: &str) -> Option<Arc<ExecutionSlot>> {
    self.slots().get(execution_id).cloned()
  }

  pub(crate) fn list(&self) -> Vec<ExecutionSummary> {
    let slots: Vec<Arc<ExecutionSlot>> = self.slots().values().cloned().collect();
    let mut summaries: Vec<ExecutionSummary> =
      slots.iter().map(|slot| slot.lock().summary()).collect();
    summaries.sort_by(|a, b| {
      a.started_at
        .cmp(&b.started_at)
        .then_with(|| a.execution_id.cmp(&b.execution_id))
    });
    summaries
  }

  /// Remove a terminal execution and return its final context.
  pub(crate) fn evict(&self, execution_id: &str) -> Option<ExecutionContext> {
    let mut slots = self.slots();
    let terminal = slots
      .get(execution_id)
      .is_some_and(|slot| slot.lock().status().is_terminal());
    if !terminal {
      return None;
    }
    slots.remove(execution_id).map(|slot| slot.snapshot())
  }

  /// Remove every terminal execution. Returns how many were removed.
  pub(crate) fn evict_terminal(&self) -> usize {
    let mut slots = self.slots();
    let before = slots.len();
    slots.retain(|_, slot| !slot.lock().status().is_terminal());
    before - slots.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::ExecutionStatus;
  use serde_json::Map;

  fn register(registry: &ExecutionRegistry, status: &[ExecutionStatus]) -> String {
    let mut context = ExecutionContext::new("wf", Map::new());
    for to in status {
      context.transition(*to).unwrap();
    }
    let id = context.execution_id().to_string();
    registry.insert(id.clone(), Arc::new(ExecutionSlot::new(context)));
    id
  }

  #[test]
  fn test_get_returns_shared_slot() {
    let registry = ExecutionRegistry::default();
    let id = register(&registry, &[ExecutionStatus::Running]);

    let slot = registry.get(&id).unwrap();
    slot.lock().transition(ExecutionStatus::Paused).unwrap();
    assert_eq!(
      registry.get(&id).unwrap().snapshot().status(),
      ExecutionStatus::Paused
    );
    assert!(registry.get("missing").is_none());
  }

  #[test]
  fn test_evict_only_terminal() {
    let registry = ExecutionRegistry::default();
    let running = register(&registry, &[ExecutionStatus::Running]);
    let done = register(
      &registry,
      &[ExecutionStatus::Running, ExecutionStatus::Completed],
    );

    assert!(registry.evict(&running).is_none());
    let evicted = registry.evict(&done).unwrap();
    assert_eq!(evicted.status(), ExecutionStatus::Completed);
    assert!(registry.get(&done).is_none());
    assert_eq!(registry.list().len(), 1);
  }

  #[test]
  fn test_evict_terminal() {
    let registry = ExecutionRegistry::default();
    register(&registry, &[ExecutionStatus::Running]);
    register(&registry, &[ExecutionStatus::Failed]);
    register(&registry, &[ExecutionStatus::Cancelled]);

    assert_eq!(registry.evict_terminal(), 2);
    let remaining = registry.list();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, ExecutionStatus::Running);
  }
}
