// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed Linux process-lifecycle events via the kernel's process-events
//! connector (`CONFIG_PROC_EVENTS`, the same netlink-connector
//! facility tools like `forkstat` and `consoletype` build on).
//!
//! ```no_run
//! use proc_events::{ClientConfig, ProcEventsClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = ProcEventsClient::connect(ClientConfig::default())?;
//! let mut events = client.listen_events()?;
//! while let Some(fork) = events.fork_events().recv().await {
//!     println!("{} forked {}", fork.parent_pid, fork.child_pid);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! This is Linux-only: the process-events connector is a Linux kernel
//! facility with no equivalent elsewhere.

#![cfg(target_os = "linux")]

mod client;
mod codec;
mod config;
mod dispatcher;
mod endpoint;
mod error;
mod event;
mod listener;

pub use client::ProcEventsClient;
pub use config::ClientConfig;
pub use dispatcher::Dispatcher;
pub use error::{ConnectError, DecodeError, EncodeError, ListenError, ProcEventsError, TransportError};
pub use event::{
    AckEvent, Event, ExecEvent, ExitEvent, ForkEvent, GidEvent, OtherEvent, SidEvent, UidEvent,
};
