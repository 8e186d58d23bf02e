// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP/IPv6 multicast transport.
//!
//! Subscriber sockets bind `group:port` (on unix) with address and port reuse
//! so several subscribers on one host can share a port without seeing each
//! other's groups, join the group on the configured interface, and wait for
//! data through `mio` so a receive never blocks longer than its timeout. Publisher sockets bind an ephemeral
//! port, apply hop limit, loopback and outbound interface, and send
//! non-blocking.

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::transport::{MulticastEndpoint, Received, Role, Transport};
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket};
use std::time::{Duration, Instant};

const SOCKET_TOKEN: Token = Token(0);

/// Readiness state of a subscriber socket.
struct RxPoll {
    poll: Poll,
    events: Events,
    socket: mio::net::UdpSocket,
}

/// `Transport` over a real UDP/IPv6 socket.
pub struct UdpTransport {
    endpoint: MulticastEndpoint,
    role: Role,
    interface: u32,
    destination: SocketAddr,
    socket: Option<UdpSocket>,
    rx: Option<RxPoll>,
}

impl UdpTransport {
    /// Open a socket for `endpoint` in the given role.
    ///
    /// # Errors
    ///
    /// `Error::Transport` naming the socket operation that failed.
    pub fn open(endpoint: MulticastEndpoint, role: Role, config: &TransportConfig) -> Result<Self> {
        let (socket, rx) = match role {
            Role::Subscriber => {
                let socket = subscriber_socket(endpoint, config)?;
                let rx = register_poll(&socket)?;
                (socket, Some(rx))
            }
            Role::Publisher => (publisher_socket(config)?, None),
        };

        let destination = endpoint.socket_addr_on(config.interface);
        log::info!(
            "[UDP] open {:?} endpoint={} iface={} local={}",
            role,
            endpoint,
            config.interface,
            socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string())
        );

        Ok(Self {
            endpoint,
            role,
            interface: config.interface,
            destination,
            socket: Some(socket),
            rx,
        })
    }

    /// Local socket address (ephemeral port for publishers).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let socket = self.socket.as_ref().ok_or(Error::NotOpen)?;
        socket
            .local_addr()
            .map_err(|e| Error::transport("local_addr", e))
    }
}

fn new_socket() -> Result<Socket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::transport("socket", e))?;
    socket
        .set_only_v6(true)
        .map_err(|e| Error::transport("set_only_v6", e))?;
    Ok(socket)
}

fn subscriber_socket(endpoint: MulticastEndpoint, config: &TransportConfig) -> Result<UdpSocket> {
    let socket = new_socket()?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::transport("set_reuse_address", e))?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket
        .set_reuse_port(true)
        .map_err(|e| Error::transport("set_reuse_port", e))?;
    if let Some(size) = config.recv_buffer_size {
        // The kernel may clamp the size; the effective value is only logged.
        if let Err(e) = socket.set_recv_buffer_size(size) {
            log::warn!("[UDP] set_recv_buffer_size({}) failed: {}", size, e);
        } else if let Ok(effective) = socket.recv_buffer_size() {
            log::debug!("[UDP] SO_RCVBUF requested={} effective={}", size, effective);
        }
    }

    bind_subscriber(&socket, endpoint, config.interface)?;
    socket
        .join_multicast_v6(&endpoint.group, config.interface)
        .map_err(|e| Error::transport("join_multicast_v6", e))?;
    log::debug!(
        "[UDP] join_multicast_v6({}) on interface {}",
        endpoint.group,
        config.interface
    );
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::transport("set_nonblocking", e))?;
    Ok(socket.into())
}

/// Bind the receive socket so it only sees datagrams addressed to its group.
///
/// Types share ports, and a socket bound to `[::]:port` gets every group
/// joined on the host for that port. Binding the group address filters by
/// destination. Interface- and link-local groups need a scope id for that;
/// with no interface configured they fall back to the wildcard bind.
#[cfg(unix)]
fn bind_subscriber(socket: &Socket, endpoint: MulticastEndpoint, interface: u32) -> Result<()> {
    let group_addr = SocketAddrV6::new(endpoint.group, endpoint.port, 0, interface);
    match socket.bind(&SocketAddr::V6(group_addr).into()) {
        Ok(()) => Ok(()),
        Err(e) if interface == 0 && needs_scope_id(&endpoint.group) => {
            log::debug!(
                "[UDP] bind {} failed ({}), falling back to wildcard bind",
                group_addr,
                e
            );
            bind_wildcard(socket, endpoint.port)
        }
        Err(e) => Err(Error::transport("bind", e)),
    }
}

#[cfg(not(unix))]
fn bind_subscriber(socket: &Socket, endpoint: MulticastEndpoint, _interface: u32) -> Result<()> {
    // Windows refuses to bind a multicast address.
    bind_wildcard(socket, endpoint.port)
}

fn bind_wildcard(socket: &Socket, port: u16) -> Result<()> {
    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0);
    socket
        .bind(&SocketAddr::V6(bind_addr).into())
        .map_err(|e| Error::transport("bind", e))
}

/// Interface-local (ffx1) and link-local (ffx2) groups.
#[cfg(unix)]
fn needs_scope_id(group: &Ipv6Addr) -> bool {
    matches!(group.segments()[0] & 0x000f, 0x1 | 0x2)
}

fn publisher_socket(config: &TransportConfig) -> Result<UdpSocket> {
    let socket = new_socket()?;
    socket
        .set_multicast_hops_v6(config.hop_limit)
        .map_err(|e| Error::transport("set_multicast_hops_v6", e))?;
    socket
        .set_multicast_loop_v6(config.multicast_loop)
        .map_err(|e| Error::transport("set_multicast_loop_v6", e))?;
    if config.interface != 0 {
        socket
            .set_multicast_if_v6(config.interface)
            .map_err(|e| Error::transport("set_multicast_if_v6", e))?;
    }
    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0);
    socket
        .bind(&SocketAddr::V6(bind_addr).into())
        .map_err(|e| Error::transport("bind", e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::transport("set_nonblocking", e))?;
    log::debug!(
        "[UDP] publisher socket hop_limit={} loop={}",
        config.hop_limit,
        config.multicast_loop
    );
    Ok(socket.into())
}

fn register_poll(socket: &UdpSocket) -> Result<RxPoll> {
    let poll = Poll::new().map_err(|e| Error::transport("poll", e))?;
    // mio owns what it registers; hand it a clone of the descriptor.
    let clone = socket
        .try_clone()
        .map_err(|e| Error::transport("try_clone", e))?;
    let mut mio_socket = mio::net::UdpSocket::from_std(clone);
    poll.registry()
        .register(&mut mio_socket, SOCKET_TOKEN, Interest::READABLE)
        .map_err(|e| Error::transport("poll register", e))?;
    Ok(RxPoll {
        poll,
        events: Events::with_capacity(16),
        socket: mio_socket,
    })
}

impl Transport for UdpTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotOpen)?;
        if self.role != Role::Publisher {
            return Err(Error::InvalidState("send on a subscriber transport".into()));
        }
        let sent = socket
            .send_to(frame, self.destination)
            .map_err(|e| Error::transport("send_to", e))?;
        if sent != frame.len() {
            return Err(Error::transport(
                "send_to",
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short send {} of {} bytes", sent, frame.len()),
                ),
            ));
        }
        log::debug!("[UDP] sent {} bytes to {}", sent, self.destination);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<Received>> {
        if self.socket.is_none() {
            return Err(Error::NotOpen);
        }
        let rx = self
            .rx
            .as_mut()
            .ok_or_else(|| Error::InvalidState("receive on a publisher transport".into()))?;
        let deadline = Instant::now() + timeout;

        loop {
            // Drain before waiting: readiness is edge-triggered.
            match rx.socket.recv_from(buf) {
                Ok((len, source)) => return Ok(Some(Received { len, source })),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::transport("recv_from", e)),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if let Err(e) = rx.poll.poll(&mut rx.events, Some(remaining)) {
                if e.kind() != io::ErrorKind::Interrupted {
                    return Err(Error::transport("poll", e));
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(socket) = self.socket.take() else {
            return Ok(());
        };
        if let Some(mut rx) = self.rx.take() {
            let _ = rx.poll.registry().deregister(&mut rx.socket);
        }
        let result = match self.role {
            Role::Subscriber => socket
                .leave_multicast_v6(&self.endpoint.group, self.interface)
                .map_err(|e| Error::transport("leave_multicast_v6", e)),
            Role::Publisher => Ok(()),
        };
        log::info!("[UDP] closed {:?} endpoint={}", self.role, self.endpoint);
        result
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn endpoint(&self) -> MulticastEndpoint {
        self.endpoint
    }

    fn role(&self) -> Role {
        self.role
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("[UDP] close on drop failed: {}", e);
        }
    }
}
