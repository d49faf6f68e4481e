//! Plan runtime.
//!
//! The [`Runtime`] owns a task executor and a notifier and provides
//! `run(plan, cancel)` to execute a compiled plan end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use lbstress_task::{ExecutionEvent, ExecutionNotifier, NodeExecutor, NoopNotifier, TaskInput};
use lbstress_workflow::{
  NodeIndex, Plan, PlanNode, PlanNodeKind, PlannedTask, SlotName, SlotValue,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::{RuntimeError, SlotError};
use crate::registry::SlotRegistry;
use crate::result::RunReport;

/// Configuration for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Maximum number of task bodies executing at once. Zero is treated as one.
  pub concurrency_limit: usize,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      concurrency_limit: 5,
    }
  }
}

/// Executes plans.
///
/// Generic over `N: ExecutionNotifier` to allow different notification strategies.
/// Use `Runtime::new()` for no-op notifications, or `Runtime::with_notifier()`
/// to observe events.
pub struct Runtime<E, N: ExecutionNotifier = NoopNotifier> {
  executor: Arc<E>,
  notifier: Arc<N>,
  config: RuntimeConfig,
}

impl<E: NodeExecutor + 'static> Runtime<E, NoopNotifier> {
  pub fn new(executor: E, config: RuntimeConfig) -> Self {
    Self::with_notifier(executor, config, NoopNotifier)
  }
}

impl<E: NodeExecutor + 'static, N: ExecutionNotifier + 'static> Runtime<E, N> {
  pub fn with_notifier(executor: E, config: RuntimeConfig, notifier: N) -> Self {
    Self {
      executor: Arc::new(executor),
      notifier: Arc::new(notifier),
      config,
    }
  }

  /// Run a plan against a fresh slot registry.
  ///
  /// Returns once every spawned task has settled. On failure the error names
  /// the first node that failed.
  #[instrument(
    name = "runtime_run",
    skip(self, plan, cancel),
    fields(root = %plan.node(plan.root()).name, tasks = plan.task_count())
  )]
  pub async fn run(
    &self,
    plan: &Plan,
    cancel: CancellationToken,
  ) -> Result<RunReport, RuntimeError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let start = Instant::now();

    info!(
      run_id = %run_id,
      concurrency_limit = self.config.concurrency_limit,
      "run_started"
    );
    self.notifier.notify(ExecutionEvent::RunStarted {
      run_id: run_id.clone(),
      root: plan.node(plan.root()).name.clone(),
      tasks: plan.task_count(),
    });

    let state = Arc::new(RunState {
      run_id: run_id.clone(),
      plan: plan.clone(),
      executor: self.executor.clone(),
      notifier: self.notifier.clone(),
      registry: SlotRegistry::new(),
      permits: Semaphore::new(self.config.concurrency_limit.max(1)),
      abort: cancel.child_token(),
      failure: Mutex::new(None),
      executed: AtomicUsize::new(0),
      started: start,
    });

    run_node(state.clone(), plan.root()).await;

    let result = state.finish(&cancel, plan);
    match &result {
      Ok(report) => {
        info!(
          run_id = %run_id,
          tasks_executed = report.tasks_executed,
          elapsed_ms = report.elapsed.as_millis() as u64,
          "run_completed"
        );
        self.notifier.notify(ExecutionEvent::RunCompleted {
          run_id,
          tasks_executed: report.tasks_executed,
          elapsed_ms: start.elapsed().as_millis() as u64,
        });
      }
      Err(e) => {
        error!(run_id = %run_id, error = %e, "run_failed");
        self.notifier.notify(ExecutionEvent::RunFailed {
          run_id,
          error: e.to_string(),
        });
      }
    }

    result
  }
}

/// Shared state of one run.
struct RunState<E, N> {
  run_id: String,
  plan: Plan,
  executor: Arc<E>,
  notifier: Arc<N>,
  registry: SlotRegistry,
  permits: Semaphore,
  /// Cancelled on the first failure or when the caller cancels.
  abort: CancellationToken,
  failure: Mutex<Option<RuntimeError>>,
  executed: AtomicUsize,
  started: Instant,
}

impl<E: NodeExecutor + 'static, N: ExecutionNotifier + 'static> RunState<E, N> {
  /// Record a failure. Only the first one is kept; it aborts the run.
  fn fail(&self, error: RuntimeError) {
    let mut failure = self.failure.lock().unwrap();
    if failure.is_none() {
      *failure = Some(error);
    } else {
      warn!(run_id = %self.run_id, error = %error, "additional_failure_ignored");
    }
    self.abort.cancel();
  }

  fn finish(&self, cancel: &CancellationToken, plan: &Plan) -> Result<RunReport, RuntimeError> {
    if let Some(error) = self.failure.lock().unwrap().take() {
      return Err(error);
    }
    if cancel.is_cancelled() {
      return Err(RuntimeError::Cancelled);
    }

    let executed = self.executed.load(Ordering::SeqCst);
    let expected = plan.task_count();
    if executed != expected || self.registry.len() != plan.provider_count() {
      return Err(RuntimeError::Incomplete { executed, expected });
    }

    Ok(RunReport {
      run_id: self.run_id.clone(),
      tasks_executed: executed,
      slots_written: self.registry.len(),
      elapsed: self.started.elapsed(),
    })
  }

  /// Report how a group ended. A group is failed if the run aborted while it
  /// was running, whether or not the failure came from its own subtree.
  fn finish_group(&self, node: &PlanNode) {
    if !self.abort.is_cancelled() {
      self.notifier.notify(ExecutionEvent::GroupSucceeded {
        run_id: self.run_id.clone(),
        node: node.name.clone(),
        path: node.path.clone(),
      });
      return;
    }

    let error = match self.failure.lock().unwrap().as_ref() {
      Some(failure) => failure.to_string(),
      None => RuntimeError::Cancelled.to_string(),
    };
    self.notifier.notify(ExecutionEvent::GroupFailed {
      run_id: self.run_id.clone(),
      node: node.name.clone(),
      path: node.path.clone(),
      error,
    });
  }

  fn slot_error(&self, node: &PlanNode, source: SlotError) -> RuntimeError {
    RuntimeError::Slot {
      node: node.name.clone(),
      path: node.path.clone(),
      source,
    }
  }

  /// Read the task's inputs from the registry.
  fn resolve_inputs(
    &self,
    node: &PlanNode,
    task: &PlannedTask,
  ) -> Result<HashMap<SlotName, SlotValue>, RuntimeError> {
    task
      .inputs
      .iter()
      .map(|(name, key)| {
        self
          .registry
          .read(key)
          .map(|value| (name.clone(), value))
          .map_err(|e| self.slot_error(node, e))
      })
      .collect()
  }

  /// Write the task's output slot.
  fn store_output(
    &self,
    node: &PlanNode,
    task: &PlannedTask,
    value: Option<SlotValue>,
  ) -> Result<(), RuntimeError> {
    match (&task.output, value) {
      // Undeclared outputs are dropped.
      (None, _) => Ok(()),
      (Some(key), None) => {
        Err(self.slot_error(node, SlotError::NotProduced { key: key.clone() }))
      }
      (Some(key), Some(value)) => {
        if let Some(expected) = task.kind.output()
          && expected != value.slot_type()
        {
          return Err(self.slot_error(
            node,
            SlotError::TypeMismatch {
              key: key.clone(),
              expected,
              found: value.slot_type(),
            },
          ));
        }
        self
          .registry
          .write(key.clone(), value)
          .map_err(|e| self.slot_error(node, e))
      }
    }
  }
}

fn run_node<E, N>(state: Arc<RunState<E, N>>, index: NodeIndex) -> BoxFuture<'static, ()>
where
  E: NodeExecutor + 'static,
  N: ExecutionNotifier + 'static,
{
  async move {
    if state.abort.is_cancelled() {
      return;
    }

    let node = state.plan.node(index);
    if !matches!(node.kind, PlanNodeKind::Task(_)) {
      state.notifier.notify(ExecutionEvent::GroupStarted {
        run_id: state.run_id.clone(),
        node: node.name.clone(),
        path: node.path.clone(),
        kind: node.node_kind(),
      });
    }

    match &node.kind {
      PlanNodeKind::Task(_) => return run_task(state.clone(), index).await,
      PlanNodeKind::Sequential(children) => {
        for child in children {
          if state.abort.is_cancelled() {
            break;
          }
          run_node(state.clone(), *child).await;
        }
      }
      PlanNodeKind::Parallel(children) => {
        let handles: Vec<_> = children
          .iter()
          .map(|child| tokio::spawn(run_node(state.clone(), *child)))
          .collect();

        for (child, result) in children
          .iter()
          .zip(futures::future::join_all(handles).await)
        {
          if let Err(e) = result {
            let child = state.plan.node(*child);
            state.fail(RuntimeError::Panicked {
              node: child.name.clone(),
              path: child.path.clone(),
              message: e.to_string(),
            });
          }
        }
      }
    }

    state.finish_group(node);
  }
  .boxed()
}

async fn run_task<E, N>(state: Arc<RunState<E, N>>, index: NodeIndex)
where
  E: NodeExecutor + 'static,
  N: ExecutionNotifier + 'static,
{
  let node = state.plan.node(index);
  let Some(task) = node.task() else {
    return;
  };

  // Queue for a worker. Abort while waiting means never starting.
  let permit = tokio::select! {
    biased;
    _ = state.abort.cancelled() => return,
    permit = state.permits.acquire() => match permit {
      Ok(permit) => permit,
      Err(_) => return,
    },
  };
  if state.abort.is_cancelled() {
    return;
  }

  let slots = match state.resolve_inputs(node, task) {
    Ok(slots) => slots,
    Err(e) => {
      state.fail(e);
      return;
    }
  };

  state.notifier.notify(ExecutionEvent::NodeStarted {
    run_id: state.run_id.clone(),
    node: node.name.clone(),
    path: node.path.clone(),
  });

  let input = TaskInput {
    run_id: state.run_id.clone(),
    node: node.name.clone(),
    kind: task.kind,
    inject: task.inject.clone(),
    slots,
    cancel: state.abort.clone(),
  };

  let executor = state.executor.clone();
  let notifier = state.notifier.clone();
  let joined =
    tokio::spawn(async move { executor.execute(input, notifier.as_ref()).await }).await;
  drop(permit);

  // Results that land after an abort are discarded.
  if state.abort.is_cancelled() {
    return;
  }

  let outcome = match joined {
    Ok(Ok(value)) => state.store_output(node, task, value),
    Ok(Err(source)) => Err(RuntimeError::TaskFailed {
      node: node.name.clone(),
      path: node.path.clone(),
      source,
    }),
    Err(e) => Err(RuntimeError::Panicked {
      node: node.name.clone(),
      path: node.path.clone(),
      message: e.to_string(),
    }),
  };

  match outcome {
    Ok(()) => {
      state.executed.fetch_add(1, Ordering::SeqCst);
      let output = match task.output.as_ref().map(|key| state.registry.read(key)) {
        Some(Ok(SlotValue::ResourceId(id))) => Some(id),
        _ => None,
      };
      state.notifier.notify(ExecutionEvent::NodeSucceeded {
        run_id: state.run_id.clone(),
        node: node.name.clone(),
        path: node.path.clone(),
        output,
      });
    }
    Err(e) => {
      state.notifier.notify(ExecutionEvent::NodeFailed {
        run_id: state.run_id.clone(),
        node: node.name.clone(),
        path: node.path.clone(),
        error: e.to_string(),
      });
      state.fail(e);
    }
  }
}
