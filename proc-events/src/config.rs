// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client configuration.

/// Configuration for a [`crate::client::ProcEventsClient`].
///
/// Builder-style defaults mirror `ddtelemetry::worker::builder::ConfigBuilder`:
/// construct with [`ClientConfig::default`] and override only what you need.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound capacity of every per-variant and error channel.
    ///
    /// When full, the listener blocks rather than dropping (SPEC_FULL.md §4.4).
    pub channel_capacity: usize,

    /// Size in bytes of the reusable receive buffer passed to
    /// `Endpoint::recv`. Must be at least `MIN_EVENT_DATAGRAM_LEN`;
    /// defaults to the system page size, which comfortably holds the
    /// largest process-event datagram the kernel ABI defines.
    pub recv_buffer_size: usize,

    /// When `true`, process-event kinds this crate does not decode
    /// into a dedicated variant (ptrace, comm, coredump, ...) are
    /// surfaced as [`crate::event::Event::Other`] instead of being
    /// silently dropped. Defaults to `false` (spec.md's default
    /// behavior).
    pub surface_unknown_kinds: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            recv_buffer_size: page_size::get(),
            surface_unknown_kinds: false,
        }
    }
}
