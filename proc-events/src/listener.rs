// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The blocking receive loop, run on its own OS thread.
//!
//! Mirrors the teacher's worker-loop shape (`ddtelemetry::worker::TelemetryWorker::run`)
//! but on a dedicated `std::thread` rather than a tokio task, because
//! `Endpoint::recv` is a blocking syscall by design (SPEC_FULL.md §4.1)
//! and must not occupy an async executor thread.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, error, warn};

use crate::codec;
use crate::dispatcher::DispatcherSender;
use crate::endpoint::Endpoint;
use crate::error::ProcEventsError;

// `Idle` is represented by the absence of a `Listener` value (before
// `spawn`); the remaining three states are tracked once one exists.
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;
const STOPPED: u8 = 3;

/// Drives the receive loop for one [`crate::client::ProcEventsClient`].
///
/// Lifecycle: `Idle` until [`Listener::spawn`], then `Running` for the
/// duration of the background thread, `Stopping` once
/// [`Listener::stop`] has been called but the thread has not yet
/// observed it, and `Stopped` once the thread has exited (either
/// because `stop` closed the endpoint, or because the kernel socket
/// itself failed).
pub struct Listener {
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    /// Spawns the receive loop. The loop reads datagrams from `endpoint`
    /// until a `TransportError` occurs (fatal: reported once, then the
    /// loop exits) or the endpoint is closed out from under it by
    /// [`Listener::stop`].
    ///
    /// A `DecodeError` is reported on the error channel but does not
    /// stop the loop — one malformed datagram must not silence the
    /// monitor (SPEC_FULL.md §4.3). A datagram the codec silently drops
    /// (unrecognized header, opted-out kind) produces no channel traffic
    /// at all.
    pub fn spawn(
        endpoint: Endpoint,
        sender: DispatcherSender,
        recv_buffer_size: usize,
        surface_unknown_kinds: bool,
    ) -> Self {
        let state = Arc::new(AtomicU8::new(RUNNING));
        let loop_state = state.clone();

        let handle = std::thread::Builder::new()
            .name("proc-events-listener".to_owned())
            .spawn(move || {
                run(endpoint, sender, recv_buffer_size, surface_unknown_kinds);
                loop_state.store(STOPPED, Ordering::SeqCst);
            })
            .expect("failed to spawn proc-events listener thread");

        Self {
            state,
            handle: Some(handle),
        }
    }

    /// Signals the loop to stop by closing `endpoint` (the portable way
    /// to unblock a thread parked in `recvfrom(2)`, per SPEC_FULL.md
    /// §5) and joins the background thread.
    ///
    /// Idempotent: calling `stop` after the loop has already exited on
    /// its own (e.g. the kernel socket failed first) just joins.
    pub fn stop(&mut self, endpoint: &Endpoint) {
        if self.state.load(Ordering::SeqCst) == STOPPED {
            return;
        }
        self.state.store(STOPPING, Ordering::SeqCst);
        endpoint.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.state.store(STOPPED, Ordering::SeqCst);
    }

    /// Whether the background thread is still running.
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == RUNNING
    }
}

fn run(endpoint: Endpoint, sender: DispatcherSender, recv_buffer_size: usize, surface_unknown_kinds: bool) {
    let mut buffer = vec![0u8; recv_buffer_size];
    debug!(recv_buffer_size, "proc-events listener started");

    loop {
        let len = match endpoint.recv(&mut buffer) {
            Ok(len) => len,
            Err(err) => {
                warn!(error = %err, "connector socket closed, listener exiting");
                sender.dispatch_error(ProcEventsError::Transport(err));
                break;
            }
        };

        match codec::decode(&buffer[..len], surface_unknown_kinds) {
            Ok(Some(event)) => sender.dispatch_event(event),
            Ok(None) => {}
            Err(err) => {
                error!(error = %err, "failed to decode process-event datagram");
                sender.dispatch_error(ProcEventsError::Decode(err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher;

    #[test]
    fn stop_before_any_datagram_joins_cleanly() {
        let endpoint = match Endpoint::open() {
            Ok(e) => e,
            Err(_) => return, // sandboxed CI may block AF_NETLINK entirely
        };
        let (tx, _rx) = dispatcher::channel(4);
        let mut listener = Listener::spawn(endpoint.clone(), tx, 4096, false);
        assert!(listener.is_running());
        listener.stop(&endpoint);
        assert!(!listener.is_running());
    }
}
