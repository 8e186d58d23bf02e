// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message-type name -> multicast group/port mapping.
//!
//! Group = namespace prefix with the host bits replaced by an FNV-1a hash of
//! the name. Port = `port_base`, or `port_base + hash % port_span` when the
//! namespace spreads types over several ports.
//!
//! `endpoint_for` is stateless and identical in every process. The stateful
//! `AddressAllocator` additionally guarantees that no two names it has handed
//! out share an endpoint, re-hashing with a probe index on collision. Probing
//! depends on allocation order, so two processes only agree on a probed
//! endpoint if they allocate the colliding names in the same order; with the
//! default /64 prefix a probe is practically never needed.

use crate::config::{NamespaceConfig, MAX_PROBES};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::str::FromStr;

const FNV1A_OFFSET_BASIS_64: u64 = 0xcbf2_9ce4_8422_2325;
const FNV1A_PRIME_64: u64 = 0x0000_0100_0000_01b3;

/// IPv6 multicast group and UDP port of one message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MulticastEndpoint {
    pub group: Ipv6Addr,
    pub port: u16,
}

impl MulticastEndpoint {
    pub const fn new(group: Ipv6Addr, port: u16) -> Self {
        Self { group, port }
    }

    /// Destination address for sending (no scope id).
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V6(SocketAddrV6::new(self.group, self.port, 0, 0))
    }

    /// Destination address with an interface scope id (link/interface-local groups).
    pub fn socket_addr_on(&self, interface: u32) -> SocketAddr {
        SocketAddr::V6(SocketAddrV6::new(self.group, self.port, 0, interface))
    }
}

impl fmt::Display for MulticastEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}", self.group, self.port)
    }
}

impl FromStr for MulticastEndpoint {
    type Err = Error;

    /// Parse `[group]:port`.
    fn from_str(s: &str) -> Result<Self> {
        let addr: SocketAddrV6 = s.trim().parse().map_err(|e| {
            Error::Configuration(format!("invalid endpoint '{}': {}", s, e))
        })?;
        if !addr.ip().is_multicast() {
            return Err(Error::Configuration(format!(
                "endpoint '{}' is not an IPv6 multicast group",
                s
            )));
        }
        Ok(Self::new(*addr.ip(), addr.port()))
    }
}

/// FNV-1a 64 over the name; probes > 0 continue the hash over the probe index.
fn name_hash(name: &str, probe: u32) -> u64 {
    let mut hash = FNV1A_OFFSET_BASIS_64;
    let mut feed = |bytes: &[u8]| {
        for &byte in bytes {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV1A_PRIME_64);
        }
    };
    feed(name.as_bytes());
    if probe > 0 {
        feed(b"#");
        feed(&probe.to_le_bytes());
    }
    hash
}

/// Candidate endpoint for `name` at `probe`; `None` when the host bits hash
/// to zero (the all-zero group id is reserved).
fn candidate(name: &str, namespace: &NamespaceConfig, probe: u32) -> Option<MulticastEndpoint> {
    let hash = name_hash(name, probe);
    let free_bits = 128 - u32::from(namespace.prefix_len);
    let host_mask = (1u128 << free_bits) - 1;
    let host = u128::from(hash) & host_mask;
    if host == 0 {
        return None;
    }
    let group = (u128::from(namespace.prefix) & !host_mask) | host;

    let port = if namespace.port_span <= 1 {
        namespace.port_base
    } else {
        // validate() guarantees port_base + port_span fits in u16
        let offset = (hash % u64::from(namespace.port_span)) as u16;
        namespace.port_base + offset
    };
    Some(MulticastEndpoint::new(Ipv6Addr::from(group), port))
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Configuration("message type name is empty".into()));
    }
    Ok(())
}

/// Deterministic endpoint of `message_type_name` in `namespace`.
///
/// # Errors
///
/// `Error::Configuration` for an invalid namespace or an empty name.
///
/// # Example
///
/// ```rust
/// use mcbus::{endpoint_for, NamespaceConfig};
///
/// let ns = NamespaceConfig::default();
/// let a = endpoint_for("Ping", &ns).unwrap();
/// let b = endpoint_for("Ping", &ns).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.port, 26000);
/// assert_eq!(a.group.segments()[0], 0xff15);
/// ```
pub fn endpoint_for(message_type_name: &str, namespace: &NamespaceConfig) -> Result<MulticastEndpoint> {
    check_name(message_type_name)?;
    namespace.validate()?;
    if let Some(endpoint) = namespace.overrides.get(message_type_name) {
        return Ok(*endpoint);
    }
    (0..MAX_PROBES)
        .find_map(|probe| candidate(message_type_name, namespace, probe))
        .ok_or_else(|| {
            Error::Configuration(format!(
                "no usable address for '{}' after {} probes",
                message_type_name, MAX_PROBES
            ))
        })
}

#[derive(Debug, Default)]
struct AllocState {
    by_name: HashMap<String, MulticastEndpoint>,
    by_endpoint: HashMap<MulticastEndpoint, String>,
}

/// Collision-free allocator for one namespace.
#[derive(Debug)]
pub struct AddressAllocator {
    namespace: NamespaceConfig,
    state: Mutex<AllocState>,
}

impl AddressAllocator {
    /// # Errors
    ///
    /// `Error::Configuration` when the namespace is invalid or two overrides
    /// share an endpoint.
    pub fn new(namespace: NamespaceConfig) -> Result<Self> {
        namespace.validate()?;
        let mut seen: HashMap<MulticastEndpoint, &str> = HashMap::new();
        for (name, endpoint) in &namespace.overrides {
            if let Some(other) = seen.insert(*endpoint, name) {
                return Err(Error::Configuration(format!(
                    "overrides '{}' and '{}' share endpoint {}",
                    other, name, endpoint
                )));
            }
        }
        Ok(Self {
            namespace,
            state: Mutex::new(AllocState::default()),
        })
    }

    pub fn namespace(&self) -> &NamespaceConfig {
        &self.namespace
    }

    /// Endpoint for `name`, allocating it on first use.
    ///
    /// Repeated calls for the same name return the same endpoint.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` for an empty name, an override that collides
    /// with an existing allocation, or `MAX_PROBES` consecutive collisions.
    pub fn allocate(&self, name: &str) -> Result<MulticastEndpoint> {
        check_name(name)?;
        let mut state = self.state.lock();
        if let Some(endpoint) = state.by_name.get(name) {
            return Ok(*endpoint);
        }

        if let Some(endpoint) = self.namespace.overrides.get(name).copied() {
            if let Some(holder) = state.by_endpoint.get(&endpoint) {
                return Err(Error::Configuration(format!(
                    "override for '{}' collides with '{}' at {}",
                    name, holder, endpoint
                )));
            }
            Self::record(&mut state, name, endpoint);
            return Ok(endpoint);
        }

        for probe in 0..MAX_PROBES {
            let Some(endpoint) = candidate(name, &self.namespace, probe) else {
                continue;
            };
            // Overrides reserve their endpoints even before they are allocated.
            let reserved = self
                .namespace
                .overrides
                .iter()
                .any(|(other, ep)| *ep == endpoint && other != name);
            if reserved || state.by_endpoint.contains_key(&endpoint) {
                log::debug!(
                    "[ALLOC] collision for '{}' at {} (probe {})",
                    name,
                    endpoint,
                    probe
                );
                continue;
            }
            if probe > 0 {
                log::info!("[ALLOC] '{}' -> {} after {} probes", name, endpoint, probe);
            }
            Self::record(&mut state, name, endpoint);
            return Ok(endpoint);
        }

        log::warn!("[ALLOC] address range exhausted for '{}'", name);
        Err(Error::Configuration(format!(
            "address allocation for '{}' exhausted after {} probes",
            name, MAX_PROBES
        )))
    }

    fn record(state: &mut AllocState, name: &str, endpoint: MulticastEndpoint) {
        state.by_name.insert(name.to_string(), endpoint);
        state.by_endpoint.insert(endpoint, name.to_string());
    }

    /// Endpoint previously allocated to `name`.
    pub fn get(&self, name: &str) -> Option<MulticastEndpoint> {
        self.state.lock().by_name.get(name).copied()
    }

    /// Forget `name`, freeing its endpoint.
    pub fn release(&self, name: &str) -> Option<MulticastEndpoint> {
        let mut state = self.state.lock();
        let endpoint = state.by_name.remove(name)?;
        state.by_endpoint.remove(&endpoint);
        Some(endpoint)
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
