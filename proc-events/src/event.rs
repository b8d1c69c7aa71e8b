// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The typed event sum type surfaced by the dispatcher.

/// Subscription acknowledgment. `no` is the kernel's ack sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckEvent {
    /// Acknowledgment sequence number reported by the kernel.
    pub no: u32,
}

/// A process forked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkEvent {
    /// Parent process id.
    pub parent_pid: u32,
    /// Parent thread id (thread group leader's tid for the parent).
    pub parent_tid: u32,
    /// Child process id.
    pub child_pid: u32,
    /// Child thread id.
    pub child_tid: u32,
}

/// A process called `exec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecEvent {
    /// Process id.
    pub pid: u32,
    /// Thread id.
    pub tid: u32,
}

/// A process's uid changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UidEvent {
    /// Process id.
    pub pid: u32,
    /// Thread id.
    pub tid: u32,
    /// Real uid after the change.
    pub ruid: u32,
    /// Effective uid after the change.
    pub euid: u32,
}

/// A process's gid changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GidEvent {
    /// Process id.
    pub pid: u32,
    /// Thread id.
    pub tid: u32,
    /// Real gid after the change.
    pub rgid: u32,
    /// Effective gid after the change.
    pub egid: u32,
}

/// A process started a new session (`setsid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidEvent {
    /// Process id.
    pub pid: u32,
    /// Thread id.
    pub tid: u32,
}

/// A process exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitEvent {
    /// Process id.
    pub pid: u32,
    /// Thread id.
    pub tid: u32,
    /// The kernel's `exit_code` word, preserved exactly: for a normal
    /// exit this is the exit status; for a signal-terminated exit this
    /// equals `signal`. See Design Note in SPEC_FULL.md §9 — this is an
    /// explicit choice, not normalized into a separate status field.
    pub code: u32,
    /// Low-order signal number, 0 for a normal exit.
    pub signal: u32,
}

/// An event of a kind the kernel ABI defines but this crate does not
/// decode into a dedicated variant (ptrace, comm, coredump, or any
/// future kind).
///
/// Only produced when [`crate::config::ClientConfig::surface_unknown_kinds`]
/// is `true`; by default these are silently dropped, matching the
/// observed kernel-connector client behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherEvent {
    /// The raw `what` field from the process-event header.
    pub kind: u32,
    /// The raw payload bytes following the process-event header.
    pub payload: Vec<u8>,
}

/// A decoded process-lifecycle event.
///
/// One variant per kind the [`crate::dispatcher::Dispatcher`] has a
/// dedicated channel for, plus [`Event::Other`] for the opt-in path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Subscription acknowledgment.
    Ack(AckEvent),
    /// Process fork.
    Fork(ForkEvent),
    /// Process exec.
    Exec(ExecEvent),
    /// Uid change.
    Uid(UidEvent),
    /// Gid change.
    Gid(GidEvent),
    /// Session-id change.
    Sid(SidEvent),
    /// Process exit.
    Exit(ExitEvent),
    /// Unrecognized kind, surfaced only when opted in.
    Other(OtherEvent),
}

/// `nlmsghdr` size in bytes (S1): `len:u32, type:u16, flags:u16, seq:u32, pid:u32`.
pub const NLMSGHDR_LEN: usize = 16;
/// `cn_msg` header size in bytes (S2): `idx:u32, val:u32, seq:u32, ack:u32, len:u16, flags:u16`.
pub const CN_MSG_LEN: usize = 20;
/// `proc_event` header size in bytes (S3): `what:u32, cpu:u32, timestamp_ns:u64`.
pub const PROC_EVENT_HDR_LEN: usize = 16;
/// Minimum datagram length before any payload: `S1 + S2 + S3`.
pub const MIN_EVENT_DATAGRAM_LEN: usize = NLMSGHDR_LEN + CN_MSG_LEN + PROC_EVENT_HDR_LEN;

/// Length of the outgoing subscription datagram: `S1 + S2 + 4` (one u32 payload).
pub const SUBSCRIBE_MSG_LEN: usize = NLMSGHDR_LEN + CN_MSG_LEN + 4;

/// Connector multiplexer id/value for the process-events sub-channel.
pub const CN_IDX_PROC: u32 = 0x1;
/// See [`CN_IDX_PROC`].
pub const CN_VAL_PROC: u32 = 0x1;

/// Subscribe op for the `cn_msg` payload: start receiving process events.
pub const PROC_CN_MCAST_LISTEN: u32 = 1;
/// Unsubscribe op: stop receiving process events (unused by this crate,
/// which relies on closing the socket instead, but kept for completeness
/// of the protocol constants).
#[allow(dead_code)]
pub const PROC_CN_MCAST_IGNORE: u32 = 2;

/// `proc_event.what` bitmask values.
pub mod what {
    /// Acknowledgment only, no event payload fields besides `no`.
    pub const NONE: u32 = 0x0000_0000;
    /// [`super::ForkEvent`].
    pub const FORK: u32 = 0x0000_0001;
    /// [`super::ExecEvent`].
    pub const EXEC: u32 = 0x0000_0002;
    /// [`super::UidEvent`].
    pub const UID: u32 = 0x0000_0004;
    /// [`super::GidEvent`].
    pub const GID: u32 = 0x0000_0040;
    /// [`super::SidEvent`].
    pub const SID: u32 = 0x0000_0080;
    /// Process is being ptraced; surfaced only as [`super::Event::Other`].
    pub const PTRACE: u32 = 0x0000_0100;
    /// Process changed its `comm`; surfaced only as [`super::Event::Other`].
    pub const COMM: u32 = 0x0000_0200;
    /// Process dumped core; surfaced only as [`super::Event::Other`].
    pub const COREDUMP: u32 = 0x4000_0000;
    /// [`super::ExitEvent`].
    pub const EXIT: u32 = 0x8000_0000;
}
