use std::sync::Arc;
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::predicate;
use stackspy::bridge::{Call, MockBridge, Reply};
use stackspy::sink::sink_fn;
use stackspy::{InitParams, Pid, RegistryBuilder, Session, SessionState, SnapshotOutcome};

fn scenario(name: &str) -> Command {
    let mut cmd = Command::cargo_bin("stackspy-tests").unwrap();
    cmd.arg(name);
    cmd
}

#[test]
fn test_live_target() {
    scenario("live")
        .assert()
        .success()
        .stdout(predicate::str::contains("first: main 1"))
        .stdout(predicate::str::contains("delivered: 100, errors: 0"))
        .stdout(predicate::str::contains("second stop: usage error (stop while Stopped)"));
}

#[test]
fn test_target_exits_while_attached() {
    scenario("exited")
        .assert()
        .success()
        .stdout(predicate::str::contains("snapshot error: snapshot of pid"))
        .stdout(predicate::str::contains("no such process"))
        .stdout(predicate::str::contains("stopped: Stopped"));
}

#[test]
fn test_sampling_loop() {
    scenario("sampling")
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed: 20 stacks."))
        .stdout(predicate::str::contains("main 1\n"));
}

#[test]
fn test_missing_pid() {
    scenario("missing")
        .assert()
        .success()
        .stdout(predicate::str::contains("attach error: failed to attach to pid 999999999: no such process: 999999999"));
}

#[test]
fn test_unknown_profiler() {
    scenario("unknown")
        .assert()
        .success()
        .stdout(predicate::str::contains("no profiler named `no-such-profiler` is registered"));
}

fn params(pid: i32) -> InitParams {
    InitParams::new(Pid(pid)).with_settle_delay(Duration::ZERO)
}

#[test]
fn test_sessions_on_distinct_pids_run_in_parallel() {
    let bridge = Arc::new(MockBridge::new().with_call_delay(Duration::from_millis(20)));
    let mut builder = RegistryBuilder::new();
    builder.register_bridge("mock", bridge.clone()).unwrap();
    let registry = Arc::new(builder.build());

    let threads: Vec<_> = (1..=4)
        .map(|pid| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let session = registry.start("mock", params(pid)).unwrap();
                let mut frames = Vec::new();
                for _ in 0..5 {
                    let outcome = session
                        .snapshot(&mut sink_fn(|_, sample, _| {
                            frames.push(sample.folded());
                            Ok(())
                        }))
                        .unwrap();
                    assert_eq!(outcome, SnapshotOutcome::Delivered);
                }
                session.stop().unwrap();
                frames
            })
        })
        .collect();

    for t in threads {
        assert_eq!(t.join().unwrap(), vec!["main"; 5]);
    }
    assert!(bridge.max_in_flight() > 1);
    assert_eq!(bridge.cleanup_calls(), 4);
}

#[test]
fn test_one_session_is_serialized() {
    let bridge = Arc::new(MockBridge::new().with_call_delay(Duration::from_millis(5)));
    let session = Arc::new(Session::start(bridge.clone(), params(7)).unwrap());

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for _ in 0..10 {
                    session.snapshot(&mut sink_fn(|_, _, _| Ok(()))).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(bridge.max_in_flight(), 1);
    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn test_labels_and_weight_reach_sink() {
    let bridge = Arc::new(MockBridge::new());
    bridge.on_snapshot(Reply::ok("{env=prod}main - app.rb:1;work - app.rb:9 3\0"));
    let session = Session::start(bridge.clone(), params(9)).unwrap();

    let mut seen = None;
    session
        .snapshot(&mut sink_fn(|labels, sample, weight| {
            seen = Some((labels.cloned(), sample.folded(), weight));
            Ok(())
        }))
        .unwrap();

    let (labels, folded, weight) = seen.unwrap();
    assert_eq!(labels.unwrap().get("env"), Some("prod"));
    assert_eq!(folded, "main - app.rb:1;work - app.rb:9");
    assert_eq!(weight, 3);
    assert_eq!(
        bridge.calls(),
        [Call::Init { pid: Pid(9), mode: Default::default() }, Call::Snapshot { pid: Pid(9) }]
    );
}
