use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use braid_runtime::{EngineConfig, ExecutionStatus, WorkflowEngine};
use braid_trigger::{
  DIRECT_TRIGGER, EngineLauncher, EventTrigger, ScheduledTrigger, Trigger, TriggerError,
  TriggerService, TriggerSink, WorkflowLauncher,
};
use braid_workflow::{Component, NodeType, WorkflowGraph};
use serde_json::{Value, json};

/// Launcher that records every launch instead of running anything.
#[derive(Default)]
struct RecordingLauncher {
  launches: Mutex<Vec<(String, Value)>>,
  next_id: AtomicUsize,
}

impl RecordingLauncher {
  fn launches(&self) -> Vec<(String, Value)> {
    self.launches.lock().unwrap().clone()
  }
}

#[async_trait]
impl WorkflowLauncher for RecordingLauncher {
  async fn launch(&self, workflow_id: &str, data: Value) -> Result<String, TriggerError> {
    if workflow_id == "missing" {
      return Err(TriggerError::UnknownWorkflow(workflow_id.to_string()));
    }
    self
      .launches
      .lock()
      .unwrap()
      .push((workflow_id.to_string(), data));
    Ok(format!("exec-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
  }
}

fn service() -> (TriggerService, Arc<RecordingLauncher>) {
  let launcher = Arc::new(RecordingLauncher::default());
  (TriggerService::new(launcher.clone()), launcher)
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_trigger_fires_every_interval() {
  let (service, launcher) = service();
  let trigger = Arc::new(ScheduledTrigger::new("report", "every_10s", json!({"kind": "daily"})));
  service.register_trigger("report-every-10s", trigger.clone()).unwrap();
  service.start().unwrap();
  assert!(trigger.is_active());

  // First fire is one interval after start.
  tokio::time::sleep(Duration::from_secs(9)).await;
  assert!(launcher.launches().is_empty());

  tokio::time::sleep(Duration::from_secs(26)).await;
  let launches = launcher.launches();
  assert_eq!(launches.len(), 3);
  assert!(
    launches
      .iter()
      .all(|(id, data)| id == "report" && data == &json!({"kind": "daily"}))
  );

  service.stop();
  assert!(!trigger.is_active());
  tokio::time::sleep(Duration::from_secs(60)).await;
  assert_eq!(launcher.launches().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_trigger_survives_launch_errors() {
  let (service, launcher) = service();
  service
    .register_trigger(
      "broken",
      Arc::new(ScheduledTrigger::new("missing", "every_1m", Value::Null)),
    )
    .unwrap();
  service
    .register_trigger(
      "healthy",
      Arc::new(ScheduledTrigger::new("ok", "every_1m", Value::Null)),
    )
    .unwrap();
  service.start().unwrap();

  tokio::time::sleep(Duration::from_secs(181)).await;
  assert_eq!(launcher.launches().len(), 3);
  service.stop();
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_schedule_uses_default_interval() {
  let (service, launcher) = service();
  let trigger = Arc::new(ScheduledTrigger::new("wf", "at midnight", Value::Null));
  assert_eq!(trigger.interval(), Duration::from_secs(300));
  service.register_trigger("fallback", trigger).unwrap();
  service.start().unwrap();

  tokio::time::sleep(Duration::from_secs(299)).await;
  assert!(launcher.launches().is_empty());
  tokio::time::sleep(Duration::from_secs(2)).await;
  assert_eq!(launcher.launches().len(), 1);
  service.stop();
}

#[tokio::test(start_paused = true)]
async fn test_oversized_schedule_falls_back_and_fires() {
  let (service, launcher) = service();
  let trigger = Arc::new(ScheduledTrigger::new(
    "wf",
    "every_18446744073709551615s",
    Value::Null,
  ));
  assert_eq!(trigger.interval(), Duration::from_secs(300));
  service.register_trigger("oversized", trigger.clone()).unwrap();
  service.start().unwrap();

  tokio::time::sleep(Duration::from_secs(301)).await;
  assert_eq!(launcher.launches().len(), 1);
  assert!(trigger.is_active());
  service.stop();
}

#[tokio::test]
async fn test_event_trigger_only_fires_while_listening() {
  let (service, launcher) = service();
  let trigger = Arc::new(EventTrigger::new("ingest"));
  service.register_trigger("webhook", trigger.clone()).unwrap();

  assert!(!trigger.handle_event(json!({"id": 1})));

  service.start().unwrap();
  assert!(trigger.is_active());
  assert!(trigger.handle_event(json!({"id": 2})));

  for _ in 0..10 {
    tokio::task::yield_now().await;
  }
  assert_eq!(launcher.launches(), vec![("ingest".to_string(), json!({"id": 2}))]);

  service.stop();
  assert!(!trigger.handle_event(json!({"id": 3})));
  for _ in 0..10 {
    tokio::task::yield_now().await;
  }
  assert_eq!(launcher.launches().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_event_trigger_accepts_events_from_other_threads() {
  let (service, launcher) = service();
  let trigger = Arc::new(EventTrigger::new("ingest"));
  service.register_trigger("webhook", trigger.clone()).unwrap();
  service.start().unwrap();

  let from_thread = trigger.clone();
  let accepted = std::thread::spawn(move || from_thread.handle_event(json!("from thread")))
    .join()
    .unwrap();
  assert!(accepted);

  for _ in 0..100 {
    if !launcher.launches().is_empty() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(launcher.launches()[0].1, json!("from thread"));
}

#[tokio::test]
async fn test_register_and_unregister() {
  let (service, _launcher) = service();
  let first = Arc::new(EventTrigger::new("a"));

  service.register_trigger("first", first.clone()).unwrap();
  assert_eq!(
    service.register_trigger("first", Arc::new(EventTrigger::new("b"))),
    Err(TriggerError::AlreadyRegistered("first".to_string()))
  );
  service
    .register_trigger("second", Arc::new(EventTrigger::new("b")))
    .unwrap();
  assert_eq!(service.trigger_names(), ["first", "second"]);

  service.start().unwrap();
  assert!(first.is_active());

  service.unregister_trigger("first").unwrap();
  assert!(!first.is_active());
  assert_eq!(service.trigger_names(), ["second"]);
  assert_eq!(
    service.unregister_trigger("first"),
    Err(TriggerError::NotFound("first".to_string()))
  );
}

#[tokio::test]
async fn test_register_after_start_starts_trigger() {
  let (service, _launcher) = service();
  service.start().unwrap();
  assert!(service.is_started());

  let late = Arc::new(EventTrigger::new("late"));
  service.register_trigger("late", late.clone()).unwrap();
  assert!(late.is_active());

  service.stop();
  assert!(!late.is_active());
  assert!(!service.is_started());
}

#[tokio::test]
async fn test_trigger_workflow_direct() {
  let (service, launcher) = service();
  let id = service.trigger_workflow("manual", json!({"x": 1})).await.unwrap();
  assert_eq!(id, "exec-0");
  assert_eq!(launcher.launches(), vec![("manual".to_string(), json!({"x": 1}))]);

  assert_eq!(
    service.trigger_workflow("missing", Value::Null).await,
    Err(TriggerError::UnknownWorkflow("missing".to_string()))
  );

  // A failed direct launch leaves the service usable.
  let id = service.trigger_workflow("manual", Value::Null).await.unwrap();
  assert_eq!(id, "exec-1");
  assert_eq!(launcher.launches().len(), 2);
}

#[tokio::test]
async fn test_direct_and_sink_launches_agree() {
  let (service, launcher) = service();
  let sink = TriggerSink::new(DIRECT_TRIGGER, launcher.clone());

  assert_eq!(
    sink.trigger_workflow("missing", Value::Null).await,
    service.trigger_workflow("missing", Value::Null).await
  );
  assert_eq!(sink.trigger_workflow("wf", json!(1)).await.unwrap(), "exec-0");
  assert_eq!(service.trigger_workflow("wf", json!(2)).await.unwrap(), "exec-1");
  assert_eq!(
    launcher.launches(),
    vec![("wf".to_string(), json!(1)), ("wf".to_string(), json!(2))]
  );
}

fn greeting_workflow() -> WorkflowGraph {
  let mut graph = WorkflowGraph::new("greet");
  graph.add_node(
    "greet",
    Component::function(|kwargs| Ok(Value::Object(kwargs))),
    NodeType::Function,
    json!({"args": {"message": "Hello ${name}", "raw": "${data}"}}),
  );
  graph
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_launcher_runs_registered_workflow() {
  let launcher = Arc::new(EngineLauncher::new(WorkflowEngine::new(EngineConfig::default())));
  launcher.register_workflow(greeting_workflow());
  let service = TriggerService::new(launcher.clone());

  let execution_id = service
    .trigger_workflow("greet", json!({"name": "Ada"}))
    .await
    .unwrap();

  let mut ctx = None;
  for _ in 0..100 {
    let snapshot = launcher.engine().get_execution_status(&execution_id).unwrap();
    if snapshot.status().is_terminal() {
      ctx = Some(snapshot);
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  let ctx = ctx.expect("execution did not finish");

  assert_eq!(ctx.status(), ExecutionStatus::Completed);
  assert_eq!(
    ctx.node_result("greet"),
    Some(&json!({"message": "Hello Ada", "raw": "${data}"}))
  );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_launcher_wraps_non_object_data() {
  let launcher = EngineLauncher::new(WorkflowEngine::new(EngineConfig::default()));
  launcher.register_workflow(greeting_workflow());

  let execution_id = launcher.launch("greet", json!(42)).await.unwrap();

  let mut status = ExecutionStatus::Running;
  for _ in 0..100 {
    let snapshot = launcher.engine().get_execution_status(&execution_id).unwrap();
    status = snapshot.status();
    if status.is_terminal() {
      assert_eq!(snapshot.variable("data"), Some(&json!(42)));
      assert_eq!(
        snapshot.node_result("greet"),
        Some(&json!({"message": "Hello ${name}", "raw": "42"}))
      );
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_engine_launcher_rejects_unknown_workflow() {
  let launcher = EngineLauncher::new(WorkflowEngine::new(EngineConfig::default()));
  assert_eq!(
    launcher.launch("nope", Value::Null).await,
    Err(TriggerError::UnknownWorkflow("nope".to_string()))
  );

  launcher.register_workflow(greeting_workflow());
  assert!(launcher.unregister_workflow("greet"));
  assert!(!launcher.unregister_workflow("greet"));
}
