// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! A `LoopbackNetwork` is an explicit value shared (by clone) between the
//! publishers and subscribers that should see each other. It routes frames by
//! endpoint with UDP-like semantics: every subscriber joined to the endpoint
//! gets a copy, a full subscriber queue drops the frame, and nothing is
//! delivered to endpoints nobody joined.

use crate::config::LOOPBACK_QUEUE_CAPACITY;
use crate::error::{Error, Result};
use crate::transport::{MulticastEndpoint, Received, Role, Transport};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Datagram = (Vec<u8>, SocketAddr);

struct Member {
    id: u64,
    tx: Sender<Datagram>,
}

struct NetworkInner {
    members: Mutex<HashMap<MulticastEndpoint, Vec<Member>>>,
    next_id: AtomicU64,
    next_port: AtomicU16,
    shut_down: AtomicBool,
    dropped: AtomicU64,
}

/// Shared in-process "network" for `LoopbackTransport`s.
#[derive(Clone)]
pub struct LoopbackNetwork {
    inner: Arc<NetworkInner>,
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoopbackNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackNetwork")
            .field("subscribers", &self.subscriber_count())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                members: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                next_port: AtomicU16::new(40_000),
                shut_down: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Tear the network down: joined subscribers see a hard receive error and
    /// further opens or sends fail.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        self.inner.members.lock().clear();
        log::debug!("[LOOPBACK] network shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Number of subscriber transports currently joined (all endpoints).
    pub fn subscriber_count(&self) -> usize {
        self.inner.members.lock().values().map(Vec::len).sum()
    }

    /// Frames dropped because a subscriber queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn check_up(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::transport(
                "loopback",
                io::Error::new(io::ErrorKind::NotConnected, "loopback network is shut down"),
            ));
        }
        Ok(())
    }

    fn next_source(&self) -> SocketAddr {
        let port = self.inner.next_port.fetch_add(1, Ordering::Relaxed);
        SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0))
    }

    fn join(&self, endpoint: MulticastEndpoint) -> Result<(u64, Receiver<Datagram>)> {
        self.check_up()?;
        let (tx, rx) = channel::bounded(LOOPBACK_QUEUE_CAPACITY);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .members
            .lock()
            .entry(endpoint)
            .or_default()
            .push(Member { id, tx });
        Ok((id, rx))
    }

    fn leave(&self, endpoint: MulticastEndpoint, id: u64) {
        let mut members = self.inner.members.lock();
        if let Some(list) = members.get_mut(&endpoint) {
            list.retain(|m| m.id != id);
            if list.is_empty() {
                members.remove(&endpoint);
            }
        }
    }

    fn deliver(&self, endpoint: MulticastEndpoint, frame: &[u8], source: SocketAddr) -> Result<()> {
        self.check_up()?;
        let members = self.inner.members.lock();
        for member in members.get(&endpoint).into_iter().flatten() {
            match member.tx.try_send((frame.to_vec(), source)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[LOOPBACK] queue full, dropped frame for {}", endpoint);
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
        Ok(())
    }
}

/// `Transport` over a `LoopbackNetwork`.
pub struct LoopbackTransport {
    network: LoopbackNetwork,
    endpoint: MulticastEndpoint,
    role: Role,
    source: SocketAddr,
    member_id: Option<u64>,
    rx: Option<Receiver<Datagram>>,
    open: bool,
}

impl LoopbackTransport {
    /// Open a transport on `network`.
    ///
    /// # Errors
    ///
    /// `Error::Transport` when the network has been shut down.
    pub fn open(network: &LoopbackNetwork, endpoint: MulticastEndpoint, role: Role) -> Result<Self> {
        let (member_id, rx) = match role {
            Role::Subscriber => {
                let (id, rx) = network.join(endpoint)?;
                (Some(id), Some(rx))
            }
            Role::Publisher => {
                network.check_up()?;
                (None, None)
            }
        };
        log::debug!("[LOOPBACK] open {:?} endpoint={}", role, endpoint);
        Ok(Self {
            network: network.clone(),
            endpoint,
            role,
            source: network.next_source(),
            member_id,
            rx,
            open: true,
        })
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        if self.role != Role::Publisher {
            return Err(Error::InvalidState("send on a subscriber transport".into()));
        }
        self.network.deliver(self.endpoint, frame, self.source)
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<Received>> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        let rx = self
            .rx
            .as_ref()
            .ok_or_else(|| Error::InvalidState("receive on a publisher transport".into()))?;
        match rx.recv_timeout(timeout) {
            Ok((frame, source)) => {
                // Oversized frames are truncated like a short recv buffer would.
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(Some(Received { len, source }))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::transport(
                "receive",
                io::Error::new(io::ErrorKind::NotConnected, "loopback network is shut down"),
            )),
        }
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        if let Some(id) = self.member_id.take() {
            self.network.leave(self.endpoint, id);
        }
        self.rx = None;
        log::debug!("[LOOPBACK] closed {:?} endpoint={}", self.role, self.endpoint);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn endpoint(&self) -> MulticastEndpoint {
        self.endpoint
    }

    fn role(&self) -> Role {
        self.role
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
