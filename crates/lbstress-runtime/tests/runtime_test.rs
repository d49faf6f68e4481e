use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lbstress_runtime::{
  ChannelNotifier, ExecutionEvent, Runtime, RuntimeConfig, RuntimeError, SlotError, compile,
};
use lbstress_task::{ExecutionNotifier, NodeExecutor, TaskError, TaskInput};
use lbstress_workflow::{
  FlowNode, NodeKind, SlotName, SlotType, SlotValue, TaskKind, TaskNode, slots,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Scriptable executor that records what it ran.
#[derive(Default)]
struct TestExecutor {
  delay: Duration,
  /// Per-node delays overriding `delay`.
  delays: HashMap<String, Duration>,
  failing: HashSet<String>,
  /// Nodes that return no value even though their kind produces one.
  silent: HashSet<String>,
  running: AtomicUsize,
  max_running: AtomicUsize,
  started: Mutex<Vec<String>>,
  finished: Mutex<Vec<String>>,
  inputs: Mutex<HashMap<String, HashMap<SlotName, SlotValue>>>,
}

impl TestExecutor {
  fn with_delay(delay: Duration) -> Self {
    Self {
      delay,
      ..Default::default()
    }
  }

  fn failing(mut self, node: &str) -> Self {
    self.failing.insert(node.to_string());
    self
  }

  fn slow(mut self, node: &str, delay: Duration) -> Self {
    self.delays.insert(node.to_string(), delay);
    self
  }

  fn silent(mut self, node: &str) -> Self {
    self.silent.insert(node.to_string());
    self
  }
}

#[async_trait]
impl NodeExecutor for TestExecutor {
  async fn execute(
    &self,
    input: TaskInput,
    _notifier: &dyn ExecutionNotifier,
  ) -> Result<Option<SlotValue>, TaskError> {
    let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_running.fetch_max(running, Ordering::SeqCst);
    self.started.lock().unwrap().push(input.node.clone());
    self
      .inputs
      .lock()
      .unwrap()
      .insert(input.node.clone(), input.slots.clone());

    let delay = self.delays.get(&input.node).copied().unwrap_or(self.delay);
    tokio::time::sleep(delay).await;

    self.running.fetch_sub(1, Ordering::SeqCst);
    self.finished.lock().unwrap().push(input.node.clone());

    if self.failing.contains(&input.node) {
      return Err(TaskError::RemoteCall {
        method: "POST".to_string(),
        url: format!("http://stub/{}", input.node),
        status: 500,
        body: "boom".to_string(),
      });
    }
    if self.silent.contains(&input.node) {
      return Ok(None);
    }

    Ok(match input.kind.output() {
      Some(SlotType::Token) => Some(SlotValue::Token(format!("token-{}", input.node))),
      Some(SlotType::ResourceId) => Some(SlotValue::ResourceId(format!("id-{}", input.node))),
      None => None,
    })
  }
}

fn noop(name: &str) -> FlowNode {
  TaskNode::new(name, TaskKind::Authenticate).into()
}

fn auth(name: &str) -> FlowNode {
  TaskNode::new(name, TaskKind::Authenticate)
    .provides(slots::TOKEN)
    .into()
}

fn create_lb(name: &str) -> FlowNode {
  TaskNode::new(name, TaskKind::CreateLoadBalancer)
    .requires([slots::TOKEN])
    .provides(slots::LB_ID)
    .into()
}

fn wait(name: &str) -> FlowNode {
  TaskNode::new(name, TaskKind::WaitForActive)
    .requires([slots::TOKEN, slots::LB_ID])
    .into()
}

fn drain(mut receiver: mpsc::UnboundedReceiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
  let mut events = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    events.push(event);
  }
  events
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_never_more_than_limit_running() {
  let flow = FlowNode::parallel(
    "root",
    (0..10).map(|i| noop(&format!("task-{i}"))).collect(),
  );
  let plan = compile(&flow).unwrap();
  let executor = std::sync::Arc::new(TestExecutor::with_delay(Duration::from_millis(50)));

  let runtime = Runtime::new(
    SharedExecutor(executor.clone()),
    RuntimeConfig {
      concurrency_limit: 3,
    },
  );
  runtime.run(&plan, CancellationToken::new()).await.unwrap();

  let max = executor.max_running.load(Ordering::SeqCst);
  assert!(max <= 3, "max running was {max}");
  assert!(max >= 2, "parallel tasks should overlap, max running was {max}");
  assert_eq!(executor.finished.lock().unwrap().len(), 10);
}

#[tokio::test]
async fn test_sequential_children_run_in_order() {
  let flow = FlowNode::sequential(
    "root",
    vec![auth("get-token"), create_lb("create-lb-0"), wait("wait-lb-0")],
  );
  let plan = compile(&flow).unwrap();
  let executor = std::sync::Arc::new(TestExecutor::with_delay(Duration::from_millis(5)));

  let runtime = Runtime::new(SharedExecutor(executor.clone()), RuntimeConfig::default());
  let report = runtime.run(&plan, CancellationToken::new()).await.unwrap();

  assert_eq!(report.tasks_executed, 3);
  assert_eq!(report.slots_written, 2);
  assert_eq!(
    *executor.started.lock().unwrap(),
    vec!["get-token", "create-lb-0", "wait-lb-0"]
  );
  assert_eq!(executor.max_running.load(Ordering::SeqCst), 1);

  let inputs = executor.inputs.lock().unwrap();
  let wait_inputs = &inputs["wait-lb-0"];
  assert_eq!(
    wait_inputs.get(slots::TOKEN),
    Some(&SlotValue::Token("token-get-token".to_string()))
  );
  assert_eq!(
    wait_inputs.get(slots::LB_ID),
    Some(&SlotValue::ResourceId("id-create-lb-0".to_string()))
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_branch_reads_its_own_slot() {
  let flow = FlowNode::sequential(
    "root",
    vec![
      auth("get-token"),
      FlowNode::parallel(
        "lbs",
        (0..4)
          .map(|i| {
            FlowNode::sequential(
              format!("lb-{i}"),
              vec![
                create_lb(&format!("create-lb-{i}")),
                wait(&format!("wait-lb-{i}")),
              ],
            )
          })
          .collect(),
      ),
    ],
  );
  let plan = compile(&flow).unwrap();
  let executor = std::sync::Arc::new(TestExecutor::with_delay(Duration::from_millis(5)));

  let runtime = Runtime::new(SharedExecutor(executor.clone()), RuntimeConfig::default());
  let report = runtime.run(&plan, CancellationToken::new()).await.unwrap();

  assert_eq!(report.tasks_executed, 9);
  let inputs = executor.inputs.lock().unwrap();
  for i in 0..4 {
    assert_eq!(
      inputs[&format!("wait-lb-{i}")].get(slots::LB_ID),
      Some(&SlotValue::ResourceId(format!("id-create-lb-{i}")))
    );
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_first_failure_aborts_the_run() {
  let flow = FlowNode::sequential(
    "root",
    vec![
      auth("get-token"),
      FlowNode::parallel("branches", vec![noop("fails"), noop("slow")]),
      noop("after"),
    ],
  );
  let plan = compile(&flow).unwrap();
  let executor = std::sync::Arc::new(
    TestExecutor::with_delay(Duration::from_millis(1))
      .failing("fails")
      .slow("slow", Duration::from_millis(100)),
  );
  let (sender, receiver) = mpsc::unbounded_channel();

  let runtime = Runtime::with_notifier(
    SharedExecutor(executor.clone()),
    RuntimeConfig::default(),
    ChannelNotifier::new(sender),
  );
  let err = runtime
    .run(&plan, CancellationToken::new())
    .await
    .unwrap_err();

  match &err {
    RuntimeError::TaskFailed { node, path, source } => {
      assert_eq!(node, "fails");
      assert_eq!(path, "root/branches/fails");
      assert!(matches!(source, TaskError::RemoteCall { status: 500, .. }));
    }
    other => panic!("unexpected error: {other:?}"),
  }
  assert_eq!(err.node(), Some("fails"));

  // The slow sibling settled before run returned, and nothing followed.
  let finished = executor.finished.lock().unwrap().clone();
  assert!(finished.contains(&"slow".to_string()));
  assert!(!executor.started.lock().unwrap().contains(&"after".to_string()));

  let events = drain(receiver);
  assert!(!events.iter().any(|e| matches!(
    e,
    ExecutionEvent::NodeSucceeded { node, .. } if node == "slow"
  )));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::NodeFailed { node, .. } if node == "fails"
  )));
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::RunFailed { .. })
  ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_earliest_failure_wins() {
  let flow = FlowNode::parallel("root", vec![noop("late"), noop("early")]);
  let plan = compile(&flow).unwrap();
  let executor = TestExecutor::with_delay(Duration::from_millis(1))
    .failing("late")
    .failing("early")
    .slow("late", Duration::from_millis(100));

  let runtime = Runtime::new(executor, RuntimeConfig::default());
  let err = runtime
    .run(&plan, CancellationToken::new())
    .await
    .unwrap_err();

  assert_eq!(err.node(), Some("early"));
}

#[tokio::test]
async fn test_queued_tasks_do_not_start_after_abort() {
  let names: Vec<String> = (0..6).map(|i| format!("queued-{i}")).collect();
  let flow = FlowNode::parallel("root", names.iter().map(|n| noop(n)).collect());
  let plan = compile(&flow).unwrap();
  let executor = names.iter().fold(
    TestExecutor::with_delay(Duration::from_millis(20)),
    |executor, name| executor.failing(name),
  );
  let executor = std::sync::Arc::new(executor);

  let runtime = Runtime::new(
    SharedExecutor(executor.clone()),
    RuntimeConfig {
      concurrency_limit: 1,
    },
  );
  let err = runtime
    .run(&plan, CancellationToken::new())
    .await
    .unwrap_err();

  // Only the first task to get the single worker ever runs.
  let started = executor.started.lock().unwrap().clone();
  assert_eq!(started.len(), 1);
  assert_eq!(err.node(), Some(started[0].as_str()));
}

#[tokio::test]
async fn test_missing_output_is_a_slot_error() {
  let flow = FlowNode::sequential("root", vec![auth("get-token"), create_lb("create-lb-0")]);
  let plan = compile(&flow).unwrap();
  let executor = TestExecutor::with_delay(Duration::ZERO).silent("create-lb-0");

  let runtime = Runtime::new(executor, RuntimeConfig::default());
  let err = runtime
    .run(&plan, CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    RuntimeError::Slot {
      source: SlotError::NotProduced { .. },
      ..
    }
  ));
}

#[tokio::test]
async fn test_cancelled_before_start() {
  let flow = FlowNode::sequential("root", vec![auth("get-token")]);
  let plan = compile(&flow).unwrap();
  let cancel = CancellationToken::new();
  cancel.cancel();

  let executor = std::sync::Arc::new(TestExecutor::default());
  let runtime = Runtime::new(SharedExecutor(executor.clone()), RuntimeConfig::default());
  let err = runtime.run(&plan, cancel).await.unwrap_err();

  assert!(matches!(err, RuntimeError::Cancelled));
  assert!(executor.started.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_events_bracket_the_run() {
  let flow = FlowNode::sequential("root", vec![auth("get-token"), create_lb("create-lb-0")]);
  let plan = compile(&flow).unwrap();
  let (sender, receiver) = mpsc::unbounded_channel();

  let runtime = Runtime::with_notifier(
    TestExecutor::default(),
    RuntimeConfig::default(),
    ChannelNotifier::new(sender),
  );
  let report = runtime.run(&plan, CancellationToken::new()).await.unwrap();
  let events = drain(receiver);

  assert!(matches!(
    events.first(),
    Some(ExecutionEvent::RunStarted { tasks: 2, .. })
  ));
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::RunCompleted { tasks_executed: 2, .. })
  ));
  for event in &events {
    if let ExecutionEvent::RunStarted { run_id, .. } = event {
      assert_eq!(run_id, &report.run_id);
    }
  }

  // Tokens are never reported as outputs.
  let outputs: Vec<Option<String>> = events
    .iter()
    .filter_map(|e| match e {
      ExecutionEvent::NodeSucceeded { output, .. } => Some(output.clone()),
      _ => None,
    })
    .collect();
  assert_eq!(outputs, vec![None, Some("id-create-lb-0".to_string())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_groups_report_start_and_end() {
  let flow = FlowNode::sequential(
    "root",
    vec![
      auth("get-token"),
      FlowNode::parallel(
        "lbs",
        vec![FlowNode::sequential(
          "lb-0",
          vec![create_lb("create-lb-0"), wait("wait-lb-0")],
        )],
      ),
    ],
  );
  let plan = compile(&flow).unwrap();
  let (sender, receiver) = mpsc::unbounded_channel();

  let runtime = Runtime::with_notifier(
    TestExecutor::default(),
    RuntimeConfig::default(),
    ChannelNotifier::new(sender),
  );
  runtime.run(&plan, CancellationToken::new()).await.unwrap();
  let events = drain(receiver);

  let started: Vec<(&str, NodeKind)> = events
    .iter()
    .filter_map(|e| match e {
      ExecutionEvent::GroupStarted { node, kind, .. } => Some((node.as_str(), *kind)),
      _ => None,
    })
    .collect();
  assert_eq!(
    started,
    vec![
      ("root", NodeKind::Sequential),
      ("lbs", NodeKind::Parallel),
      ("lb-0", NodeKind::Sequential),
    ]
  );

  let succeeded: Vec<&str> = events
    .iter()
    .filter_map(|e| match e {
      ExecutionEvent::GroupSucceeded { path, .. } => Some(path.as_str()),
      _ => None,
    })
    .collect();
  assert_eq!(succeeded, vec!["root/lbs/lb-0", "root/lbs", "root"]);

  assert!(matches!(
    &events[events.len() - 2],
    ExecutionEvent::GroupSucceeded { node, .. } if node == "root"
  ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_groups_report_abort() {
  let flow = FlowNode::sequential(
    "root",
    vec![FlowNode::parallel("branches", vec![noop("fails"), noop("ok")])],
  );
  let plan = compile(&flow).unwrap();
  let (sender, receiver) = mpsc::unbounded_channel();

  let runtime = Runtime::with_notifier(
    TestExecutor::with_delay(Duration::from_millis(1)).failing("fails"),
    RuntimeConfig::default(),
    ChannelNotifier::new(sender),
  );
  runtime
    .run(&plan, CancellationToken::new())
    .await
    .unwrap_err();
  let events = drain(receiver);

  let failed: Vec<(&str, &str)> = events
    .iter()
    .filter_map(|e| match e {
      ExecutionEvent::GroupFailed { node, error, .. } => Some((node.as_str(), error.as_str())),
      _ => None,
    })
    .collect();
  assert_eq!(failed.len(), 2);
  assert_eq!(failed[0].0, "branches");
  assert_eq!(failed[1].0, "root");
  assert!(failed.iter().all(|(_, error)| error.contains("'fails'")));
  assert!(
    !events
      .iter()
      .any(|e| matches!(e, ExecutionEvent::GroupSucceeded { .. }))
  );
}

/// Fails one node quickly; every other node waits for the abort signal.
#[derive(Default)]
struct AbortAwareExecutor {
  interrupted: AtomicUsize,
}

#[async_trait]
impl NodeExecutor for AbortAwareExecutor {
  async fn execute(
    &self,
    input: TaskInput,
    _notifier: &dyn ExecutionNotifier,
  ) -> Result<Option<SlotValue>, TaskError> {
    if input.node == "fails" {
      tokio::time::sleep(Duration::from_millis(10)).await;
      return Err(TaskError::Resource {
        resource_id: "lb-0".to_string(),
        status: "ERROR".to_string(),
      });
    }

    tokio::select! {
      _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(None),
      _ = input.cancel.cancelled() => {
        self.interrupted.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::Cancelled)
      }
    }
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_bodies_observe_abort() {
  let flow = FlowNode::parallel("root", vec![noop("fails"), noop("polling-0"), noop("polling-1")]);
  let plan = compile(&flow).unwrap();
  let executor = std::sync::Arc::new(AbortAwareExecutor::default());

  let runtime = Runtime::new(SharedAbortAware(executor.clone()), RuntimeConfig::default());
  let started = std::time::Instant::now();
  let err = runtime
    .run(&plan, CancellationToken::new())
    .await
    .unwrap_err();

  assert_eq!(err.node(), Some("fails"));
  assert!(matches!(
    err,
    RuntimeError::TaskFailed {
      source: TaskError::Resource { .. },
      ..
    }
  ));
  assert_eq!(executor.interrupted.load(Ordering::SeqCst), 2);
  assert!(started.elapsed() < Duration::from_secs(10));
}

struct SharedAbortAware(std::sync::Arc<AbortAwareExecutor>);

#[async_trait]
impl NodeExecutor for SharedAbortAware {
  async fn execute(
    &self,
    input: TaskInput,
    notifier: &dyn ExecutionNotifier,
  ) -> Result<Option<SlotValue>, TaskError> {
    self.0.execute(input, notifier).await
  }
}

/// Lets a test keep a handle on the executor the runtime owns.
struct SharedExecutor(std::sync::Arc<TestExecutor>);

#[async_trait]
impl NodeExecutor for SharedExecutor {
  async fn execute(
    &self,
    input: TaskInput,
    notifier: &dyn ExecutionNotifier,
  ) -> Result<Option<SlotValue>, TaskError> {
    self.0.execute(input, notifier).await
  }
}
