// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport layer
//!
//! - `allocator`: message-type name -> multicast endpoint
//! - `udp`: UDP/IPv6 multicast sockets
//! - `loopback`: in-process network with the same contract
//!
//! Both transports implement [`Transport`]; the bus picks one from
//! [`TransportMode`].

pub mod allocator;
pub mod loopback;
pub mod udp;

pub use allocator::{endpoint_for, AddressAllocator, MulticastEndpoint};
pub use loopback::{LoopbackNetwork, LoopbackTransport};
pub use udp::UdpTransport;

use crate::config::TransportConfig;
use crate::error::Result;
use std::net::SocketAddr;
use std::time::Duration;

/// Direction a transport is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Publisher,
    Subscriber,
}

/// One datagram written into the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub len: usize,
    pub source: SocketAddr,
}

/// Which transport implementation the bus opens.
#[derive(Debug, Clone, Default)]
pub enum TransportMode {
    /// Real UDP/IPv6 multicast.
    #[default]
    Udp,
    /// In-process delivery over the given network.
    Loopback(LoopbackNetwork),
}

/// Datagram transport bound to one multicast endpoint.
///
/// A transport is owned by one thread at a time: a publisher keeps it behind
/// its mutex, a subscriber moves it into its receive thread.
pub trait Transport: Send {
    /// Send one frame to the endpoint. Never blocks.
    ///
    /// # Errors
    ///
    /// `Error::NotOpen` after `close`, `Error::Transport` on OS failure.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one datagram.
    ///
    /// Returns `Ok(None)` on timeout. Any `Err` is a hard failure.
    ///
    /// # Errors
    ///
    /// `Error::NotOpen` after `close`, `Error::Transport` on OS failure.
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<Received>>;

    /// Leave the group (subscribers) and release the socket. Idempotent.
    ///
    /// # Errors
    ///
    /// `Error::Transport` when leaving the group fails; the socket is
    /// released regardless.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    fn endpoint(&self) -> MulticastEndpoint;

    fn role(&self) -> Role;
}

/// Open the transport selected by `mode`.
///
/// # Errors
///
/// `Error::Transport` when the socket cannot be set up.
pub fn open_transport(
    mode: &TransportMode,
    endpoint: MulticastEndpoint,
    role: Role,
    config: &TransportConfig,
) -> Result<Box<dyn Transport>> {
    match mode {
        TransportMode::Udp => Ok(Box::new(UdpTransport::open(endpoint, role, config)?)),
        TransportMode::Loopback(network) => {
            Ok(Box::new(LoopbackTransport::open(network, endpoint, role)?))
        }
    }
}
