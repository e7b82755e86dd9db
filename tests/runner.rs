mod common;

use common::{settle, wait_until, CountingReducer, Recorder, TestAction};
use saga_reducer::config::RunnerSettings;
use saga_reducer::options::{OptionBundle, SagaMonitor};
use saga_reducer::process::{Effect, Interception, ProcessHandle, Resolution, SagaIo, Task};
use saga_reducer::{
    saga, ActionRelay, Dispatch, Saga, SagaContext, SagaError, StateCell, TokioRunner,
    UnhandledErrorPolicy,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

type Ctx = SagaContext<TestAction, u32>;

/// State cell plus a relay fed synchronously by dispatch.
struct Harness {
    cell: StateCell<CountingReducer>,
    relay: ActionRelay<TestAction>,
}

impl Harness {
    fn new() -> Self {
        Self {
            cell: StateCell::new(CountingReducer, 0),
            relay: ActionRelay::new(),
        }
    }

    fn io(&self) -> SagaIo<TestAction, u32> {
        let (cell, relay) = (self.cell.clone(), self.relay.clone());
        SagaIo {
            relay: self.relay.clone(),
            get_state: self.cell.accessor(),
            dispatch: Dispatch::from_fn(move |action: TestAction| {
                cell.apply(&action).map_err(|source| saga_reducer::DispatchError::Reducer {
                    action_type: action.kind.clone(),
                    source: Box::new(source),
                })?;
                relay.put(action);
                Ok(())
            }),
        }
    }
}

async fn finished_within(task: &Task, millis: u64) -> bool {
    tokio::time::timeout(Duration::from_millis(millis), task.finished())
        .await
        .is_ok()
}

#[tokio::test]
async fn root_task_finishes_and_reports_resolution() {
    let harness = Harness::new();
    let resolved = Recorder::new();
    let log = resolved.clone();
    let options = OptionBundle::new()
        .monitor(SagaMonitor::new().on_effect_resolved(move |e| log.push(e.effect_id.to_string())));
    let body = saga(|ctx: Ctx| async move {
        ctx.delay(Duration::from_millis(1)).await?;
        ctx.put(TestAction::new("DONE")).await
    });

    let task = TokioRunner::new().spawn(options, harness.io(), body);

    assert!(finished_within(&task, 500).await);
    assert!(!task.is_running());
    assert_eq!(harness.cell.get(), 1);
    assert_eq!(resolved.entries(), vec!["2", "3", "1"]);
}

#[tokio::test]
async fn take_resolves_with_next_matching_action() {
    let harness = Harness::new();
    let seen = Recorder::new();
    let log = seen.clone();
    let body = saga(move |ctx: Ctx| {
        let log = log.clone();
        async move {
            let action = ctx.take(vec!["START", "GO"]).await?;
            log.push(action.kind);
            Ok(())
        }
    });

    let task = TokioRunner::new().spawn(OptionBundle::new(), harness.io(), body);
    settle().await;

    harness.relay.put(TestAction::new("NOISE"));
    harness.relay.put(TestAction::new("GO"));

    assert!(finished_within(&task, 500).await);
    assert_eq!(seen.entries(), vec!["GO"]);
}

#[tokio::test]
async fn cancel_is_idempotent_and_reported_once() {
    let harness = Harness::new();
    let cancelled = Recorder::new();
    let log = cancelled.clone();
    let options = OptionBundle::new()
        .monitor(SagaMonitor::new().on_effect_cancelled(move |e| log.push(e.effect_id.to_string())));
    let body = saga(|ctx: Ctx| async move {
        ctx.take("NEVER").await?;
        Ok(())
    });

    let task = TokioRunner::new().spawn(options, harness.io(), body);
    settle().await;

    task.cancel();
    task.cancel();

    assert!(task.is_cancelled());
    assert!(finished_within(&task, 500).await);
    assert_eq!(cancelled.entries(), vec!["1"]);
}

#[tokio::test]
async fn closing_relay_fails_pending_take() {
    let harness = Harness::new();
    let errors = Recorder::new();
    let log = errors.clone();
    let options = OptionBundle::new().on_error(move |e: &SagaError| log.push(e.to_string()));
    let body = saga(|ctx: Ctx| async move {
        ctx.take("NEVER").await?;
        Ok(())
    });

    let task = TokioRunner::new().spawn(options, harness.io(), body);
    settle().await;
    harness.relay.close();

    assert!(finished_within(&task, 500).await);
    assert_eq!(errors.entries(), vec!["Action relay closed"]);
}

#[tokio::test]
async fn cancelled_fork_never_dispatches() {
    let harness = Harness::new();
    let body = saga(|ctx: Ctx| async move {
        let child = saga(|child: Ctx| async move {
            child.delay(Duration::from_millis(20)).await?;
            child.put(TestAction::new("LATE")).await
        });
        ctx.fork(child)?;
        ctx.cancelled().await;
        Ok(())
    });

    let task = TokioRunner::new().spawn(OptionBundle::new(), harness.io(), body);
    settle().await;
    task.cancel();
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(harness.cell.get(), 0);
    assert_eq!(harness.relay.delivered(), 0);
}

#[tokio::test]
async fn forks_inherit_a_snapshot_of_context() {
    let harness = Harness::new();
    let seen = Recorder::new();
    let log = seen.clone();
    let options = OptionBundle::new().context_entry("tenant", json!("acme"));
    let body = saga(move |ctx: Ctx| {
        let log = log.clone();
        async move {
            ctx.set_context(HashMap::from([("region".to_string(), json!("eu"))]))
                .await?;
            let child_log = log.clone();
            let child = saga(move |child: Ctx| {
                let log = child_log.clone();
                async move {
                    let tenant = child.get_context("tenant").await?;
                    let region = child.get_context("region").await?;
                    log.push(format!("child:{:?}:{:?}", tenant, region));
                    child
                        .set_context(HashMap::from([("child_only".to_string(), json!(1))]))
                        .await
                }
            });
            let task = ctx.fork(child)?;
            task.finished().await;
            let leaked = ctx.get_context("child_only").await?;
            log.push(format!("parent:{:?}", leaked));
            Ok(())
        }
    });

    let task = TokioRunner::new().spawn(options, harness.io(), body);

    assert!(finished_within(&task, 500).await);
    assert_eq!(
        seen.entries(),
        vec![
            "child:Some(String(\"acme\")):Some(String(\"eu\"))",
            "parent:None"
        ]
    );
}

#[tokio::test]
async fn escalated_failure_still_marks_task_finished() {
    let harness = Harness::new();
    let rejected = Recorder::new();
    let log = rejected.clone();
    let runner = TokioRunner::from_settings(&RunnerSettings {
        unhandled_errors: UnhandledErrorPolicy::Escalate,
    });
    assert_eq!(runner.unhandled_errors(), UnhandledErrorPolicy::Escalate);
    let options = OptionBundle::new()
        .monitor(SagaMonitor::new().on_effect_rejected(move |e| log.push(e.error.clone())));
    let body = saga(|_ctx: Ctx| async move { Err(SagaError::failed("fatal")) });

    let task = runner.spawn(options, harness.io(), body);

    assert!(finished_within(&task, 500).await);
    assert!(!task.is_running());
    assert!(task.is_cancelled());
    assert!(wait_until(|| rejected.len() == 1).await);
    assert_eq!(rejected.entries(), vec!["Saga failed: fatal"]);
}

/// Monitor recording how root effect 1 settled.
fn root_settlements(log: &Recorder) -> SagaMonitor<TestAction> {
    let (resolved, rejected) = (log.clone(), log.clone());
    SagaMonitor::new()
        .on_effect_resolved(move |e| {
            if e.effect_id == 1 {
                resolved.push("resolved:1");
            }
        })
        .on_effect_rejected(move |e| {
            if e.effect_id == 1 {
                rejected.push("rejected:1");
            }
        })
}

#[tokio::test]
async fn root_settles_only_after_attached_forks() {
    let harness = Harness::new();
    let settled = Recorder::new();
    let options = OptionBundle::new().monitor(root_settlements(&settled));
    let body = saga(|ctx: Ctx| async move {
        ctx.fork(saga(|child: Ctx| async move {
            child.delay(Duration::from_millis(30)).await?;
            child.put(TestAction::new("CHILD")).await
        }))?;
        Ok(())
    });

    let task = TokioRunner::new().spawn(options, harness.io(), body);
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(task.is_running(), "root body returned but its fork is still live");
    assert!(settled.entries().is_empty());

    assert!(finished_within(&task, 500).await);
    assert_eq!(harness.cell.get(), 1);
    assert_eq!(settled.entries(), vec!["resolved:1"]);
}

#[tokio::test]
async fn fork_failing_after_root_body_returns_settles_root_once() {
    let harness = Harness::new();
    let settled = Recorder::new();
    let errors = Recorder::new();
    let error_log = errors.clone();
    let options = OptionBundle::new()
        .monitor(root_settlements(&settled))
        .on_error(move |e: &SagaError| error_log.push(e.to_string()));
    let body = saga(|ctx: Ctx| async move {
        ctx.fork(saga(|child: Ctx| async move {
            child.delay(Duration::from_millis(5)).await?;
            Err(SagaError::failed("child"))
        }))?;
        Ok(())
    });

    let task = TokioRunner::new().spawn(options, harness.io(), body);

    assert!(finished_within(&task, 500).await);
    settle().await;
    assert_eq!(settled.entries(), vec!["rejected:1"]);
    assert_eq!(errors.entries(), vec!["Saga failed: child"]);
}

#[tokio::test]
async fn null_context_entry_differs_from_missing_key() {
    let harness = Harness::new();
    let seen = Recorder::new();
    let log = seen.clone();
    let options = OptionBundle::new().context_entry("cleared", Value::Null);
    let body = saga(move |ctx: Ctx| {
        let log = log.clone();
        async move {
            let cleared = ctx.get_context("cleared").await?;
            let absent = ctx.get_context("absent").await?;
            log.push(format!("{:?}/{:?}", cleared, absent));
            Ok(())
        }
    });

    let task = TokioRunner::new().spawn(options, harness.io(), body);

    assert!(finished_within(&task, 500).await);
    assert_eq!(seen.entries(), vec!["Some(Null)/None"]);
}

#[tokio::test]
async fn resolved_fork_is_not_started() {
    let harness = Harness::new();
    let seen = Recorder::new();
    let log = seen.clone();
    let options = OptionBundle::new().interceptor(|effect: Effect<TestAction>| match effect {
        Effect::Fork(ref name) if name == "stubbed" => Interception::Resolve(Resolution::Done),
        other => Interception::Forward(other),
    });
    let body = saga(move |ctx: Ctx| {
        let log = log.clone();
        async move {
            let stubbed = Saga::new("stubbed", |child: Ctx| async move {
                child.put(TestAction::new("STUBBED")).await
            });
            let task = ctx.fork(stubbed)?;
            log.push(format!("running:{}", task.is_running()));
            Ok(())
        }
    });

    let task = TokioRunner::new().spawn(options, harness.io(), body);

    assert!(finished_within(&task, 500).await);
    settle().await;
    assert_eq!(seen.entries(), vec!["running:false"]);
    assert_eq!(harness.cell.get(), 0);
}
