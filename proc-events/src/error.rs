// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for `proc-events`.

use thiserror::Error;

/// Failures from the socket transport (open/bind/send/recv/close).
///
/// Fatal for the [`crate::listener::Listener`]: once surfaced, the
/// receive loop terminates.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `socket(2)` failed.
    #[error("failed to create connector socket: {0}")]
    SocketCreate(#[source] std::io::Error),

    /// `bind(2)` failed.
    #[error("failed to bind connector socket: {0}")]
    Bind(#[source] std::io::Error),

    /// `sendto(2)` failed, or wrote fewer bytes than requested.
    #[error("failed to send on connector socket: {0}")]
    Send(#[source] std::io::Error),

    /// `sendto(2)` wrote fewer bytes than the message.
    #[error("partial send: wrote {written} of {expected} bytes")]
    PartialSend {
        /// Bytes actually written.
        written: usize,
        /// Bytes requested to be written.
        expected: usize,
    },

    /// `recvfrom(2)` failed.
    #[error("failed to receive on connector socket: {0}")]
    Recv(#[source] std::io::Error),

    /// An operation was attempted on an endpoint that has observed `close()`.
    #[error("operation attempted on a closed endpoint")]
    Closed,
}

/// Failure constructing the subscription control message.
///
/// Per spec, this should be unreachable in practice: the subscription
/// message has a fixed shape with no variable-length or fallible
/// encoding steps. It exists so `ProcEventsClient::connect` has a
/// typed error to surface if that ever changes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoded buffer did not match the expected subscription length.
    #[error("encoded subscription message has wrong length: got {got}, expected {expected}")]
    UnexpectedLength {
        /// Actual encoded length.
        got: usize,
        /// Expected encoded length (`L_sub`).
        expected: usize,
    },
}

/// Non-fatal decode failures.
///
/// Surfaced on the error channel; the [`crate::listener::Listener`]
/// continues after one of these (a single malformed datagram must not
/// silence the monitor).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Fewer bytes were read than the three fixed headers require.
    #[error("datagram too short: got {got} bytes, need at least {min}")]
    Short {
        /// Bytes actually read.
        got: usize,
        /// Minimum bytes required (`S1 + S2 + S3`).
        min: usize,
    },

    /// The process-event kind was recognized but its payload was
    /// smaller than the variant requires.
    #[error("truncated {kind} payload: got {got} bytes, need at least {min}")]
    Truncated {
        /// Name of the event variant being decoded.
        kind: &'static str,
        /// Bytes actually available for the payload.
        got: usize,
        /// Minimum bytes the variant's payload requires.
        min: usize,
    },
}

/// Any error surfaced on [`crate::dispatcher::Dispatcher`]'s error channel.
///
/// A [`TransportError`] is always the final message the consumer will
/// observe before the channels stop receiving new events; a
/// [`DecodeError`] is followed by continued delivery.
#[derive(Debug, Error)]
pub enum ProcEventsError {
    /// A transport failure; fatal, the listener has stopped.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A decode failure; non-fatal, the listener continues.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors returned by [`crate::client::ProcEventsClient::connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The transport could not be opened, bound, or written to.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The subscription message could not be constructed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Errors returned by [`crate::client::ProcEventsClient::listen_events`].
#[derive(Debug, Error)]
pub enum ListenError {
    /// `listen_events` was called more than once on the same client.
    #[error("listen_events has already been called on this client")]
    AlreadyListening,
}
