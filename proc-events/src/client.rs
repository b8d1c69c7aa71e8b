// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The public facade composing transport, codec, dispatcher and
//! listener into one handle, in the manner of
//! `ddtelemetry::worker::TelemetryWorker`.

use tracing::debug;

use crate::codec;
use crate::config::ClientConfig;
use crate::dispatcher::{self, Dispatcher};
use crate::endpoint::{ConnectorAddr, Endpoint};
use crate::error::{ConnectError, ListenError};
use crate::event::CN_IDX_PROC;
use crate::listener::Listener;

/// A subscription to the kernel's process-lifecycle event stream.
///
/// Construct with [`ProcEventsClient::connect`], start delivery with
/// [`ProcEventsClient::listen_events`], and read from the per-variant
/// channels on the [`Dispatcher`] it returns. Call
/// [`ProcEventsClient::close`] (or simply drop the client) to stop.
pub struct ProcEventsClient {
    config: ClientConfig,
    endpoint: Endpoint,
    listener: Option<Listener>,
}

impl ProcEventsClient {
    /// Opens the connector socket, binds it to this process and the
    /// process-events multicast group, and sends the one-shot LISTEN
    /// subscription datagram.
    ///
    /// Does not start delivering events — call
    /// [`ProcEventsClient::listen_events`] for that. Binding the
    /// process-events group typically requires `CAP_NET_ADMIN`.
    pub fn connect(config: ClientConfig) -> Result<Self, ConnectError> {
        let endpoint = Endpoint::open()?;
        let pid = std::process::id();
        endpoint.bind(ConnectorAddr {
            pid,
            groups: CN_IDX_PROC,
        })?;

        let subscribe = codec::encode_subscribe(pid);
        endpoint.send(&subscribe)?;

        debug!(pid, "proc-events client connected and subscribed");
        Ok(Self {
            config,
            endpoint,
            listener: None,
        })
    }

    /// Starts the background listener thread and returns the
    /// [`Dispatcher`] through which decoded events are delivered.
    ///
    /// May only be called once per client; a second call returns
    /// [`ListenError::AlreadyListening`].
    pub fn listen_events(&mut self) -> Result<Dispatcher, ListenError> {
        if self.listener.is_some() {
            return Err(ListenError::AlreadyListening);
        }

        let (sender, dispatcher) = dispatcher::channel(self.config.channel_capacity);
        let listener = Listener::spawn(
            self.endpoint.clone(),
            sender,
            self.config.recv_buffer_size,
            self.config.surface_unknown_kinds,
        );
        self.listener = Some(listener);
        Ok(dispatcher)
    }

    /// Stops the listener (if running) and closes the socket.
    ///
    /// Idempotent: calling `close` more than once, or on a client that
    /// never called `listen_events`, is a no-op beyond the first call.
    pub fn close(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.stop(&self.endpoint);
        } else {
            self.endpoint.close();
        }
    }
}

impl Drop for ProcEventsClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_events_twice_is_an_error() {
        let mut client = match ProcEventsClient::connect(ClientConfig::default()) {
            Ok(c) => c,
            Err(_) => return, // needs CAP_NET_ADMIN / a connector-capable kernel
        };
        assert!(client.listen_events().is_ok());
        assert!(matches!(
            client.listen_events(),
            Err(ListenError::AlreadyListening)
        ));
        client.close();
    }

    #[test]
    fn close_without_listening_is_a_no_op() {
        let mut client = match ProcEventsClient::connect(ClientConfig::default()) {
            Ok(c) => c,
            Err(_) => return,
        };
        client.close();
        client.close();
    }
}
