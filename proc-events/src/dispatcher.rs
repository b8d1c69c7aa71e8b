// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The public subscription surface: one bounded channel per event
//! variant, plus one error channel.
//!
//! Generalizes the teacher's single-mailbox pattern
//! (`ddtelemetry::worker::TelemetryWorker`'s `mpsc::Receiver<TelemetryActions>`)
//! to one channel per message kind, since SPEC_FULL.md §4.4 requires
//! that a decoded event never be cross-delivered onto the wrong
//! variant's channel.

use tokio::sync::mpsc;

use crate::error::ProcEventsError;
use crate::event::{
    AckEvent, Event, ExecEvent, ExitEvent, ForkEvent, GidEvent, OtherEvent, SidEvent, UidEvent,
};

/// Owns the sending half of every channel. Held exclusively by the
/// [`crate::listener::Listener`] — the sole producer per SPEC_FULL.md §4.4.
pub struct DispatcherSender {
    ack: mpsc::Sender<AckEvent>,
    fork: mpsc::Sender<ForkEvent>,
    exec: mpsc::Sender<ExecEvent>,
    uid: mpsc::Sender<UidEvent>,
    gid: mpsc::Sender<GidEvent>,
    sid: mpsc::Sender<SidEvent>,
    exit: mpsc::Sender<ExitEvent>,
    other: mpsc::Sender<OtherEvent>,
    errors: mpsc::Sender<ProcEventsError>,
}

/// Owns the receiving half of every channel. Held by
/// [`crate::client::ProcEventsClient`] and handed out to consumers.
pub struct Dispatcher {
    pub(crate) ack: mpsc::Receiver<AckEvent>,
    pub(crate) fork: mpsc::Receiver<ForkEvent>,
    pub(crate) exec: mpsc::Receiver<ExecEvent>,
    pub(crate) uid: mpsc::Receiver<UidEvent>,
    pub(crate) gid: mpsc::Receiver<GidEvent>,
    pub(crate) sid: mpsc::Receiver<SidEvent>,
    pub(crate) exit: mpsc::Receiver<ExitEvent>,
    pub(crate) other: mpsc::Receiver<OtherEvent>,
    pub(crate) errors: mpsc::Receiver<ProcEventsError>,
}

/// Builds the sender/receiver pair for one [`crate::client::ProcEventsClient`]
/// instance. `capacity` bounds every channel (back-pressure applies
/// independently per channel, per SPEC_FULL.md §4.4).
pub fn channel(capacity: usize) -> (DispatcherSender, Dispatcher) {
    let (ack_tx, ack_rx) = mpsc::channel(capacity);
    let (fork_tx, fork_rx) = mpsc::channel(capacity);
    let (exec_tx, exec_rx) = mpsc::channel(capacity);
    let (uid_tx, uid_rx) = mpsc::channel(capacity);
    let (gid_tx, gid_rx) = mpsc::channel(capacity);
    let (sid_tx, sid_rx) = mpsc::channel(capacity);
    let (exit_tx, exit_rx) = mpsc::channel(capacity);
    let (other_tx, other_rx) = mpsc::channel(capacity);
    let (err_tx, err_rx) = mpsc::channel(capacity);

    (
        DispatcherSender {
            ack: ack_tx,
            fork: fork_tx,
            exec: exec_tx,
            uid: uid_tx,
            gid: gid_tx,
            sid: sid_tx,
            exit: exit_tx,
            other: other_tx,
            errors: err_tx,
        },
        Dispatcher {
            ack: ack_rx,
            fork: fork_rx,
            exec: exec_rx,
            uid: uid_rx,
            gid: gid_rx,
            sid: sid_rx,
            exit: exit_rx,
            other: other_rx,
            errors: err_rx,
        },
    )
}

impl DispatcherSender {
    /// Routes one decoded event onto its matching channel.
    ///
    /// Blocks the calling (Listener) thread if that channel is full —
    /// this is the back-pressure policy SPEC_FULL.md §4.4 specifies:
    /// consumers control the pace, ordering within a kind is preserved
    /// by never dropping in favor of a fresher event. `Event::Other` is
    /// only ever constructed when `ClientConfig::surface_unknown_kinds`
    /// is set, and routes to its own channel like every other variant.
    pub fn dispatch_event(&self, event: Event) {
        match event {
            Event::Ack(e) => self.blocking_send(&self.ack, e),
            Event::Fork(e) => self.blocking_send(&self.fork, e),
            Event::Exec(e) => self.blocking_send(&self.exec, e),
            Event::Uid(e) => self.blocking_send(&self.uid, e),
            Event::Gid(e) => self.blocking_send(&self.gid, e),
            Event::Sid(e) => self.blocking_send(&self.sid, e),
            Event::Exit(e) => self.blocking_send(&self.exit, e),
            Event::Other(e) => self.blocking_send(&self.other, e),
        }
    }

    /// Routes one transport/decode failure onto the error channel.
    pub fn dispatch_error(&self, err: ProcEventsError) {
        self.blocking_send(&self.errors, err);
    }

    fn blocking_send<T: Send>(&self, sender: &mpsc::Sender<T>, item: T) {
        // The receiver may already be gone (client dropped its handle);
        // that is not this thread's concern — the listener keeps
        // draining the kernel socket regardless, per SPEC_FULL.md §4.3
        // (the listener's job ends on Close, not on consumer presence).
        let _ = sender.blocking_send(item);
    }
}

impl Dispatcher {
    /// The ack-event channel.
    pub fn ack_events(&mut self) -> &mut mpsc::Receiver<AckEvent> {
        &mut self.ack
    }
    /// The fork-event channel.
    pub fn fork_events(&mut self) -> &mut mpsc::Receiver<ForkEvent> {
        &mut self.fork
    }
    /// The exec-event channel.
    pub fn exec_events(&mut self) -> &mut mpsc::Receiver<ExecEvent> {
        &mut self.exec
    }
    /// The uid-change channel.
    pub fn uid_events(&mut self) -> &mut mpsc::Receiver<UidEvent> {
        &mut self.uid
    }
    /// The gid-change channel.
    pub fn gid_events(&mut self) -> &mut mpsc::Receiver<GidEvent> {
        &mut self.gid
    }
    /// The session-id-change channel.
    pub fn sid_events(&mut self) -> &mut mpsc::Receiver<SidEvent> {
        &mut self.sid
    }
    /// The exit-event channel.
    pub fn exit_events(&mut self) -> &mut mpsc::Receiver<ExitEvent> {
        &mut self.exit
    }
    /// The channel for kinds not decoded into a dedicated variant
    /// (ptrace, comm, coredump, ...). Only receives events when the
    /// client was configured with `surface_unknown_kinds = true`;
    /// otherwise this channel never produces anything.
    pub fn other_events(&mut self) -> &mut mpsc::Receiver<OtherEvent> {
        &mut self.other
    }
    /// The error channel.
    pub fn errors(&mut self) -> &mut mpsc::Receiver<ProcEventsError> {
        &mut self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[tokio::test]
    async fn dispatch_routes_to_matching_channel_only() {
        let (tx, mut rx) = channel(4);

        tokio::task::spawn_blocking(move || {
            tx.dispatch_event(Event::Fork(ForkEvent {
                parent_pid: 1,
                parent_tid: 1,
                child_pid: 2,
                child_tid: 2,
            }));
        })
        .await
        .unwrap();

        let fork = rx.fork_events().recv().await.unwrap();
        assert_eq!(fork.child_pid, 2);
        assert!(rx.exec_events().try_recv().is_err());
        assert!(rx.ack_events().try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_routes_other_to_its_own_channel() {
        let (tx, mut rx) = channel(4);

        tokio::task::spawn_blocking(move || {
            tx.dispatch_event(Event::Other(crate::event::OtherEvent {
                kind: 0x0000_0100,
                payload: vec![1, 2, 3, 4],
            }));
        })
        .await
        .unwrap();

        let other = rx.other_events().recv().await.unwrap();
        assert_eq!(other.kind, 0x0000_0100);
        assert_eq!(other.payload, vec![1, 2, 3, 4]);
        assert!(rx.fork_events().try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_error_goes_to_error_channel() {
        let (tx, mut rx) = channel(4);
        tokio::task::spawn_blocking(move || {
            tx.dispatch_error(ProcEventsError::Decode(DecodeError::Short {
                got: 1,
                min: 52,
            }));
        })
        .await
        .unwrap();
        let err = rx.errors().recv().await.unwrap();
        assert!(matches!(err, ProcEventsError::Decode(_)));
    }

    #[tokio::test]
    async fn full_channel_does_not_drop_later_event() {
        let (tx, mut rx) = channel(1);
        let tx = std::sync::Arc::new(tx);
        let tx_filler = tx.clone();
        tokio::task::spawn_blocking(move || {
            tx_filler.dispatch_event(Event::Exec(ExecEvent { pid: 1, tid: 1 }));
        })
        .await
        .unwrap();

        // Channel is now full (capacity 1); the second send blocks
        // until drained, so it must run on its own blocking thread.
        let tx_second = tx.clone();
        let handle = tokio::task::spawn_blocking(move || {
            tx_second.dispatch_event(Event::Exec(ExecEvent { pid: 2, tid: 2 }));
        });

        let first = rx.exec_events().recv().await.unwrap();
        assert_eq!(first.pid, 1);
        handle.await.unwrap();
        let second = rx.exec_events().recv().await.unwrap();
        assert_eq!(second.pid, 2);
    }
}
