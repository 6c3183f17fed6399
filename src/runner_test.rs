//! Tests for `Host`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use proptest::prelude::*;

use crate::activities::{Activity, WaitForBookmark, Workflow};
use crate::checkpoint_io::{CheckpointStore, MemoryCheckpointStore};
use crate::error::EngineError;
use crate::runner::{Host, Phase};
use crate::test_support::{Detach, Flaky, Record, new_log, trace_of};
use crate::types::Value;

fn records(labels: &[&str], log: &Arc<std::sync::Mutex<Vec<String>>>) -> Workflow {
  Workflow::new(Activity::sequence(
    labels.iter().map(|l| Activity::leaf(Record::new(l, log))),
  ))
}

fn waits() -> Workflow {
  Workflow::new(Activity::parallel([
    Activity::leaf(WaitForBookmark::new("a", "va")),
    Activity::leaf(WaitForBookmark::new("b", "vb")),
  ]))
}

#[test]
fn fresh_open_writes_nothing_until_first_step() {
  let store = MemoryCheckpointStore::new();
  let mut host = Host::open(records(&["a"], &new_log()), store.clone()).unwrap();
  assert!(!host.resumed());
  assert_eq!(host.phase(), Phase::Running);
  let root = host.state().frame(host.state().root).unwrap();
  assert_eq!(root.pending_continuations.len(), 1);
  assert!(!store.exists());

  assert_eq!(host.step().unwrap(), Phase::Running);
  assert!(store.exists());
}

#[test]
fn checkpoint_matches_state_after_every_step() {
  let store = MemoryCheckpointStore::new();
  let mut host = Host::open(records(&["a", "b"], &new_log()), store.clone()).unwrap();
  while host.step().unwrap() != Phase::Done {
    assert_eq!(store.load().unwrap().as_ref(), Some(host.state()));
  }
}

#[test]
fn completion_clears_checkpoint_and_next_open_is_new_instance() {
  let store = MemoryCheckpointStore::new();
  let log = new_log();
  let mut host = Host::open(records(&["a"], &log), store.clone()).unwrap();
  let first_id = host.state().instance_id;
  while host.step().unwrap() != Phase::Done {}
  assert!(!store.exists());
  assert_eq!(trace_of(&host.summary().variables), vec!["a"]);
  // Stepping a finished host is a no-op.
  assert_eq!(host.step().unwrap(), Phase::Done);

  let again = Host::open(records(&["a"], &log), store.clone()).unwrap();
  assert!(!again.resumed());
  assert_ne!(again.state().instance_id, first_id);
}

#[test]
fn reopen_resumes_where_it_stopped() {
  let store = MemoryCheckpointStore::new();
  let log = new_log();
  let mut host = Host::open(records(&["a", "b", "c"], &log), store.clone()).unwrap();
  for _ in 0..3 {
    host.step().unwrap();
  }
  let snapshot = host.state().clone();
  drop(host);

  let mut host = Host::open(records(&["a", "b", "c"], &log), store.clone()).unwrap();
  assert!(host.resumed());
  assert_eq!(host.state(), &snapshot);
  while host.step().unwrap() != Phase::Done {}
  assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn blocked_step_does_not_rewrite_checkpoint() {
  let store = MemoryCheckpointStore::new();
  let mut host = Host::open(waits(), store.clone()).unwrap();
  while host.step().unwrap() != Phase::Blocked {}
  let bytes = store.bytes();
  assert_eq!(host.step().unwrap(), Phase::Blocked);
  assert_eq!(store.bytes(), bytes);
}

#[test]
fn resumed_blocked_instance_opens_blocked() {
  let store = MemoryCheckpointStore::new();
  let mut host = Host::open(waits(), store.clone()).unwrap();
  while host.step().unwrap() != Phase::Blocked {}
  drop(host);
  let host = Host::open(waits(), store).unwrap();
  assert!(host.resumed());
  assert_eq!(host.phase(), Phase::Blocked);
}

#[test]
fn activity_failure_halts_and_keeps_previous_checkpoint() {
  let store = MemoryCheckpointStore::new();
  let armed = Arc::new(AtomicBool::new(true));
  let log = new_log();
  let workflow = |armed: &Arc<AtomicBool>| {
    Workflow::new(Activity::sequence([
      Activity::leaf(Record::new("before", &log)),
      Activity::leaf(Flaky {
        armed: Arc::clone(armed),
      }),
      Activity::leaf(Record::new("after", &log)),
    ]))
  };
  let mut host = Host::open(workflow(&armed), store.clone()).unwrap();
  let err = loop {
    match host.step() {
      Ok(_) => continue,
      Err(e) => break e,
    }
  };
  assert!(matches!(err, EngineError::ActivityFailure { .. }));
  let good = store.load().unwrap().unwrap();
  assert_eq!(trace_of(&good.variables), vec!["before"]);
  assert!(matches!(host.step(), Err(EngineError::HostStopped)));
  drop(host);

  armed.store(false, Ordering::SeqCst);
  let mut host = Host::open(workflow(&armed), store.clone()).unwrap();
  while host.step().unwrap() != Phase::Done {}
  assert_eq!(trace_of(&host.summary().variables), vec!["before", "after"]);
  assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
}

#[test]
fn corrupt_checkpoint_refuses_to_open() {
  let store = MemoryCheckpointStore::new();
  store.set_bytes(Some(b"{not json".to_vec()));
  let r = Host::open(records(&["a"], &new_log()), store.clone());
  assert!(matches!(r, Err(EngineError::CheckpointCorrupt { .. })));
  // The bad checkpoint is left alone.
  assert_eq!(store.bytes(), Some(b"{not json".to_vec()));
}

#[test]
fn checkpoint_from_another_workflow_shape_is_corrupt() {
  let store = MemoryCheckpointStore::new();
  let log = new_log();
  let mut host = Host::open(records(&["a", "b", "c"], &log), store.clone()).unwrap();
  // Three steps leave a frame pending on the third activity, which the smaller
  // workflow does not have.
  for _ in 0..3 {
    host.step().unwrap();
  }
  drop(host);
  let r = Host::open(records(&["a"], &log), store);
  assert!(matches!(r, Err(EngineError::CheckpointCorrupt { .. })));
}

#[tokio::test]
async fn run_waits_for_resolutions_and_completes() {
  let store = MemoryCheckpointStore::new();
  let mut host = Host::open(waits(), store.clone()).unwrap();
  let resolver = host.resolver();
  let notifier = tokio::spawn(async move {
    // Unknown names are rejected without disturbing the worker.
    let unknown = resolver.resolve("zzz", "nope").await;
    assert!(matches!(unknown, Err(EngineError::UnknownBookmark { .. })));
    loop {
      match resolver.resolve("b", "2").await {
        Ok(()) => break,
        Err(EngineError::UnknownBookmark { .. }) => tokio::task::yield_now().await,
        Err(e) => panic!("unexpected {e}"),
      }
    }
    loop {
      match resolver.resolve("a", "1").await {
        Ok(()) => break,
        Err(EngineError::UnknownBookmark { .. }) => tokio::task::yield_now().await,
        Err(e) => panic!("unexpected {e}"),
      }
    }
    let again = resolver.resolve("a", "1").await;
    assert!(matches!(
      again,
      Err(EngineError::UnknownBookmark { .. }) | Err(EngineError::HostStopped)
    ));
  });
  let summary = host.run().await.unwrap();
  assert_eq!(summary.variables.get("va"), Some(&Value::from("1")));
  assert_eq!(summary.variables.get("vb"), Some(&Value::from("2")));
  assert!(!store.exists());
  drop(host);
  notifier.await.unwrap();
}

fn resolve_now<S: CheckpointStore>(
  rt: &tokio::runtime::Runtime,
  host: &mut Host<S>,
  name: &str,
  payload: &str,
) -> Result<Phase, EngineError> {
  let resolver = host.resolver();
  let (name, payload) = (name.to_string(), payload.to_string());
  rt.block_on(async {
    let pending = tokio::spawn(async move { resolver.resolve(&name, payload).await });
    tokio::task::yield_now().await;
    let phase = host.step()?;
    pending.await.unwrap()?;
    Ok::<_, EngineError>(phase)
  })
}

fn current_thread() -> tokio::runtime::Runtime {
  tokio::runtime::Builder::new_current_thread().build().unwrap()
}

#[test]
fn resolution_is_acked_only_after_it_is_checkpointed() {
  let rt = current_thread();
  let store = MemoryCheckpointStore::new();
  let mut host = Host::open(waits(), store.clone()).unwrap();
  while host.step().unwrap() != Phase::Blocked {}
  resolve_now(&rt, &mut host, "b", "2").unwrap();
  let saved = store.load().unwrap().unwrap();
  assert!(!saved.bookmarks.contains_key("b"));
  assert_eq!(saved.variables.get("vb"), Some(&Value::from("2")));
}

#[test]
fn payload_goes_to_the_bookmark_it_names() {
  let rt = current_thread();
  let mut host = Host::open(waits(), MemoryCheckpointStore::new()).unwrap();
  while host.step().unwrap() != Phase::Blocked {}
  resolve_now(&rt, &mut host, "b", "X").unwrap();
  while host.step().unwrap() != Phase::Blocked {}
  resolve_now(&rt, &mut host, "a", "Y").unwrap();
  while host.step().unwrap() != Phase::Done {}
  let vars = host.summary().variables;
  assert_eq!(vars.get("va"), Some(&Value::from("Y")));
  assert_eq!(vars.get("vb"), Some(&Value::from("X")));
}

#[test]
fn second_resolution_of_same_bookmark_is_unknown() {
  let rt = current_thread();
  let mut host = Host::open(waits(), MemoryCheckpointStore::new()).unwrap();
  while host.step().unwrap() != Phase::Blocked {}
  resolve_now(&rt, &mut host, "b", "X").unwrap();
  while host.step().unwrap() != Phase::Blocked {}
  let err = resolve_now(&rt, &mut host, "b", "again").unwrap_err();
  assert!(matches!(err, EngineError::UnknownBookmark { .. }));
  // The rejection does not halt the host.
  assert_eq!(host.step().unwrap(), Phase::Blocked);
}

#[test]
fn resolving_a_bookmark_without_continuation_completes_its_frame() {
  let rt = current_thread();
  let store = MemoryCheckpointStore::new();
  let workflow = Workflow::new(Activity::leaf(Detach { bookmark: "x" }));
  let mut host = Host::open(workflow, store.clone()).unwrap();
  assert_eq!(host.step().unwrap(), Phase::Blocked);
  assert!(store.exists());
  assert_eq!(resolve_now(&rt, &mut host, "x", "ignored").unwrap(), Phase::Done);
  assert!(host.state().is_finished());
  assert!(!store.exists());
}

#[tokio::test]
async fn run_continues_past_a_detached_wait() {
  let store = MemoryCheckpointStore::new();
  let log = new_log();
  let workflow = Workflow::new(Activity::sequence([
    Activity::leaf(Record::new("a", &log)),
    Activity::leaf(Detach { bookmark: "x" }),
    Activity::leaf(Record::new("b", &log)),
  ]));
  let mut host = Host::open(workflow, store.clone()).unwrap();
  let resolver = host.resolver();
  let notifier = tokio::spawn(async move {
    loop {
      match resolver.resolve("x", true).await {
        Ok(()) => break,
        Err(EngineError::UnknownBookmark { .. }) => tokio::task::yield_now().await,
        Err(e) => panic!("unexpected {e}"),
      }
    }
  });
  let summary = host.run().await.unwrap();
  notifier.await.unwrap();
  assert_eq!(trace_of(&summary.variables), vec!["a", "b"]);
  assert!(!store.exists());
}

#[tokio::test]
async fn blocked_run_waits_until_bounded_by_caller() {
  let store = MemoryCheckpointStore::new();
  let mut host = Host::open(waits(), store.clone()).unwrap();
  let bounded = tokio::time::timeout(Duration::from_millis(50), host.run()).await;
  assert!(bounded.is_err());
  assert_eq!(host.phase(), Phase::Blocked);
  let saved = store.load().unwrap().unwrap();
  assert_eq!(&saved, host.state());

  // The host is still usable after the caller gave up waiting.
  let resolver = host.resolver();
  let notifier = tokio::spawn(async move {
    resolver.resolve("a", "1").await.unwrap();
    resolver.resolve("b", "2").await.unwrap();
  });
  let summary = host.run().await.unwrap();
  notifier.await.unwrap();
  assert_eq!(summary.variables.get("vb"), Some(&Value::from("2")));
}

proptest! {
  #[test]
  fn restarts_never_repeat_or_skip_work(
    n in 1usize..6,
    restarts in proptest::collection::vec(any::<bool>(), 0..40),
  ) {
    let labels: Vec<String> = (0..n).map(|i| format!("r{i}")).collect();
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let store = MemoryCheckpointStore::new();
    let log = new_log();
    let mut host = Host::open(records(&refs, &log), store.clone()).unwrap();
    let mut restarts = restarts.into_iter();
    loop {
      if host.step().unwrap() == Phase::Done {
        break;
      }
      if restarts.next().unwrap_or(false) {
        drop(host);
        host = Host::open(records(&refs, &log), store.clone()).unwrap();
      }
    }
    prop_assert_eq!(log.lock().unwrap().clone(), labels.clone());
    prop_assert_eq!(trace_of(&host.summary().variables), labels);
  }

  #[test]
  fn parallel_join_waits_for_every_branch_in_any_order(
    order in Just(vec!["a", "b", "c", "d"]).prop_shuffle(),
    restart_after in 0usize..3,
  ) {
    let rt = current_thread();
    let workflow = || {
      Workflow::new(Activity::parallel(
        ["a", "b", "c", "d"]
          .iter()
          .map(|n| Activity::leaf(WaitForBookmark::new(*n, format!("v{n}")))),
      ))
    };
    let store = MemoryCheckpointStore::new();
    let mut host = Host::open(workflow(), store.clone()).unwrap();
    while host.step().unwrap() != Phase::Blocked {}
    for (i, name) in order.iter().enumerate() {
      prop_assert_ne!(host.phase(), Phase::Done);
      resolve_now(&rt, &mut host, name, &format!("p{name}")).unwrap();
      if i == restart_after {
        drop(host);
        host = Host::open(workflow(), store.clone()).unwrap();
      }
      while !matches!(host.step().unwrap(), Phase::Blocked | Phase::Done) {}
    }
    prop_assert_eq!(host.phase(), Phase::Done);
    prop_assert!(!store.exists());
    let vars = host.summary().variables;
    for name in ["a", "b", "c", "d"] {
      prop_assert_eq!(vars.get(&format!("v{name}")), Some(&Value::from(format!("p{name}"))));
    }
  }
}
