// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! mcbus configuration - single source of truth
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (wire format, ports, timeouts)
//! - **Level 2 (Typed)**: `NamespaceConfig`, `TransportConfig`, `BusConfig`
//!   with builder-style setters and `Default`
//! - **Level 3 (Environment)**: `MCBUS_*` variables and YAML files
//!   (`config-file` feature)
//!
//! # Example
//!
//! ```rust
//! use mcbus::{BusConfig, NamespaceConfig, TransportConfig};
//! use std::time::Duration;
//!
//! let config = BusConfig::default()
//!     .with_namespace(NamespaceConfig::default().with_port_base(27000))
//!     .with_transport(TransportConfig::default().with_receive_timeout(Duration::from_millis(20)));
//! assert_eq!(config.namespace.port_base, 27000);
//! ```

#[cfg(feature = "config-file")]
mod yaml;

#[cfg(feature = "config-file")]
pub use yaml::{YamlBusDocument, YamlLoader};

use crate::error::{Error, Result};
use crate::transport::{MulticastEndpoint, TransportMode};
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;
use std::time::Duration;

// =======================================================================
// Wire format
// =======================================================================

/// Frame magic constant, first four bytes of every datagram.
pub const WIRE_MAGIC: [u8; 4] = *b"MCBS";

/// Current wire-format version. Frames with any other version are rejected.
pub const WIRE_VERSION: u8 = 1;

/// Fixed frame header length in bytes.
pub const HEADER_LEN: usize = 33;

/// Largest frame accepted for sending (IPv6 UDP payload limit minus headroom).
pub const MAX_DATAGRAM_SIZE: usize = 65_507 - 20;

// =======================================================================
// Namespace defaults
// =======================================================================

/// Default multicast prefix (`ff15::`, transient site-local).
pub const DEFAULT_PREFIX: Ipv6Addr = Ipv6Addr::new(0xff15, 0, 0, 0, 0, 0, 0, 0);

/// Default prefix length; the remaining 64 bits come from the name hash.
pub const DEFAULT_PREFIX_LEN: u8 = 64;

/// Smallest prefix length accepted (flags + scope + 8 bits of group id).
pub const MIN_PREFIX_LEN: u8 = 16;

/// Largest prefix length accepted (at least 8 free host bits).
pub const MAX_PREFIX_LEN: u8 = 120;

/// Default UDP port shared by every message type of a namespace.
pub const DEFAULT_PORT_BASE: u16 = 26000;

/// Default port span (1 = every type uses `port_base`).
pub const DEFAULT_PORT_SPAN: u16 = 1;

/// Maximum re-hash attempts before an allocation is declared exhausted.
pub const MAX_PROBES: u32 = 16;

// =======================================================================
// Transport defaults
// =======================================================================

/// Default multicast hop limit (stay on the local link).
pub const DEFAULT_HOP_LIMIT: u32 = 1;

/// Default bound on a single receive wait.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// Receive buffer size for one datagram.
pub const RECV_BUFFER_LEN: usize = 65_536;

/// Capacity of a subscriber's diagnostics channel (oldest events are dropped when full).
pub const DIAGNOSTICS_CAPACITY: usize = 1024;

/// Per-transport queue depth on a `LoopbackNetwork`.
pub const LOOPBACK_QUEUE_CAPACITY: usize = 4096;

// =======================================================================
// Environment variables
// =======================================================================

pub const ENV_PREFIX: &str = "MCBUS_PREFIX";
pub const ENV_PORT_BASE: &str = "MCBUS_PORT_BASE";
pub const ENV_HOP_LIMIT: &str = "MCBUS_HOP_LIMIT";
pub const ENV_LOOP: &str = "MCBUS_LOOP";
pub const ENV_MULTICAST_IF: &str = "MCBUS_MULTICAST_IF";
pub const ENV_RECV_TIMEOUT_MS: &str = "MCBUS_RECV_TIMEOUT_MS";

// =======================================================================
// Multicast scope
// =======================================================================

/// IPv6 multicast scope (RFC 4291 / RFC 7346 scope nibble).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MulticastScope {
    InterfaceLocal,
    LinkLocal,
    AdminLocal,
    #[default]
    SiteLocal,
    OrganizationLocal,
    Global,
}

impl MulticastScope {
    /// Scope nibble as carried in the second byte of a multicast address.
    pub fn nibble(self) -> u8 {
        match self {
            Self::InterfaceLocal => 0x1,
            Self::LinkLocal => 0x2,
            Self::AdminLocal => 0x4,
            Self::SiteLocal => 0x5,
            Self::OrganizationLocal => 0x8,
            Self::Global => 0xE,
        }
    }

    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x1 => Some(Self::InterfaceLocal),
            0x2 => Some(Self::LinkLocal),
            0x4 => Some(Self::AdminLocal),
            0x5 => Some(Self::SiteLocal),
            0x8 => Some(Self::OrganizationLocal),
            0xE => Some(Self::Global),
            _ => None,
        }
    }

    /// Scope of a multicast address (`None` for unicast or reserved scopes).
    pub fn of(addr: &Ipv6Addr) -> Option<Self> {
        let octets = addr.octets();
        if octets[0] != 0xff {
            return None;
        }
        Self::from_nibble(octets[1] & 0x0f)
    }
}

impl fmt::Display for MulticastScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InterfaceLocal => "interface-local",
            Self::LinkLocal => "link-local",
            Self::AdminLocal => "admin-local",
            Self::SiteLocal => "site-local",
            Self::OrganizationLocal => "organization-local",
            Self::Global => "global",
        };
        f.write_str(name)
    }
}

impl FromStr for MulticastScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "interfacelocal" => Ok(Self::InterfaceLocal),
            "linklocal" => Ok(Self::LinkLocal),
            "adminlocal" => Ok(Self::AdminLocal),
            "sitelocal" => Ok(Self::SiteLocal),
            "organizationlocal" => Ok(Self::OrganizationLocal),
            "global" => Ok(Self::Global),
            other => Err(Error::Configuration(format!(
                "unknown multicast scope '{}'",
                other
            ))),
        }
    }
}

// =======================================================================
// Namespace configuration
// =======================================================================

/// Address space in which message-type names are mapped to multicast endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceConfig {
    /// Multicast prefix; bits past `prefix_len` are replaced by the name hash.
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    /// Expected scope; must agree with the prefix's scope nibble.
    pub scope: MulticastScope,
    pub port_base: u16,
    /// Number of ports to spread types over (`<= 1` = fixed port).
    pub port_span: u16,
    /// Explicit endpoints that bypass hashing.
    pub overrides: HashMap<String, MulticastEndpoint>,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX,
            prefix_len: DEFAULT_PREFIX_LEN,
            scope: MulticastScope::default(),
            port_base: DEFAULT_PORT_BASE,
            port_span: DEFAULT_PORT_SPAN,
            overrides: HashMap::new(),
        }
    }
}

impl NamespaceConfig {
    #[must_use]
    pub fn with_prefix(mut self, prefix: Ipv6Addr, prefix_len: u8) -> Self {
        self.prefix = prefix;
        self.prefix_len = prefix_len;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: MulticastScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_port_base(mut self, port_base: u16) -> Self {
        self.port_base = port_base;
        self
    }

    #[must_use]
    pub fn with_port_span(mut self, port_span: u16) -> Self {
        self.port_span = port_span;
        self
    }

    /// Pin `name` to an explicit endpoint.
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, endpoint: MulticastEndpoint) -> Self {
        self.overrides.insert(name.into(), endpoint);
        self
    }

    /// Check prefix, scope and port range.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        let octets = self.prefix.octets();
        if octets[0] != 0xff {
            return Err(Error::Configuration(format!(
                "prefix {} is not an IPv6 multicast address (ff00::/8)",
                self.prefix
            )));
        }
        let nibble = octets[1] & 0x0f;
        if nibble != self.scope.nibble() {
            return Err(Error::Configuration(format!(
                "prefix {} has scope nibble {:x}, configured scope is {} ({:x})",
                self.prefix,
                nibble,
                self.scope,
                self.scope.nibble()
            )));
        }
        if !(MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&self.prefix_len) {
            return Err(Error::Configuration(format!(
                "prefix length {} outside {}..={}",
                self.prefix_len, MIN_PREFIX_LEN, MAX_PREFIX_LEN
            )));
        }
        if self.port_base == 0 {
            return Err(Error::Configuration("port_base must be non-zero".into()));
        }
        if self.port_base.checked_add(self.port_span).is_none() {
            return Err(Error::Configuration(format!(
                "port_base {} + port_span {} overflows the port range",
                self.port_base, self.port_span
            )));
        }
        Ok(())
    }
}

// =======================================================================
// Transport configuration
// =======================================================================

/// Socket-level settings shared by publishers and subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Multicast hop limit for outbound frames.
    pub hop_limit: u32,
    /// Deliver our own multicast frames to local subscribers.
    pub multicast_loop: bool,
    /// Interface index for join/send (0 = kernel default).
    pub interface: u32,
    /// Upper bound on one receive wait; also the stop-flag polling period.
    pub receive_timeout: Duration,
    /// `SO_RCVBUF` for subscriber sockets (kernel default when `None`).
    pub recv_buffer_size: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            hop_limit: DEFAULT_HOP_LIMIT,
            multicast_loop: true,
            interface: 0,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            recv_buffer_size: None,
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn with_hop_limit(mut self, hop_limit: u32) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    #[must_use]
    pub fn with_multicast_loop(mut self, enabled: bool) -> Self {
        self.multicast_loop = enabled;
        self
    }

    #[must_use]
    pub fn with_interface(mut self, index: u32) -> Self {
        self.interface = index;
        self
    }

    #[must_use]
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_recv_buffer_size(mut self, bytes: usize) -> Self {
        self.recv_buffer_size = Some(bytes);
        self
    }
}

// =======================================================================
// Bus configuration
// =======================================================================

/// Everything a `Publisher` or `Subscriber` needs to reach its endpoint.
#[derive(Debug, Clone, Default)]
pub struct BusConfig {
    pub namespace: NamespaceConfig,
    pub transport: TransportConfig,
    /// Which transport implementation to open.
    pub mode: TransportMode,
}

impl BusConfig {
    /// Defaults with `MCBUS_*` environment overrides applied.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: NamespaceConfig) -> Self {
        self.namespace = namespace;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Apply `MCBUS_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` when a variable is set but cannot be parsed.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (environment-shaped).
    ///
    /// # Errors
    ///
    /// `Error::Configuration` naming the offending key.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PREFIX) {
            let (prefix, len) = parse_prefix(&value, self.namespace.prefix_len)
                .map_err(|reason| invalid_env(ENV_PREFIX, &value, &reason))?;
            self.namespace.prefix = prefix;
            self.namespace.prefix_len = len;
            // Keep the scope in step with the prefix; validation still catches
            // reserved nibbles.
            if let Some(scope) = MulticastScope::of(&prefix) {
                self.namespace.scope = scope;
            }
            log::debug!("[CONFIG] {} override: {}/{}", ENV_PREFIX, prefix, len);
        }
        if let Some(value) = lookup(ENV_PORT_BASE) {
            self.namespace.port_base = parse_env(ENV_PORT_BASE, &value)?;
        }
        if let Some(value) = lookup(ENV_HOP_LIMIT) {
            self.transport.hop_limit = parse_env(ENV_HOP_LIMIT, &value)?;
        }
        if let Some(value) = lookup(ENV_LOOP) {
            self.transport.multicast_loop = parse_bool(&value)
                .ok_or_else(|| invalid_env(ENV_LOOP, &value, "expected a boolean"))?;
        }
        if let Some(value) = lookup(ENV_MULTICAST_IF) {
            self.transport.interface = parse_env(ENV_MULTICAST_IF, &value)?;
        }
        if let Some(value) = lookup(ENV_RECV_TIMEOUT_MS) {
            let ms: u64 = parse_env(ENV_RECV_TIMEOUT_MS, &value)?;
            self.transport.receive_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }
}

/// Parse `ff15::` or `ff15::/64`; a bare address keeps `default_len`.
///
/// # Errors
///
/// A message naming the unparsable part.
pub fn parse_prefix(
    value: &str,
    default_len: u8,
) -> core::result::Result<(Ipv6Addr, u8), String> {
    let value = value.trim();
    let (addr, len) = match value.split_once('/') {
        Some((addr, len)) => (
            addr,
            len.trim()
                .parse::<u8>()
                .map_err(|e| format!("bad prefix length: {}", e))?,
        ),
        None => (value, default_len),
    };
    let addr = addr
        .trim()
        .parse::<Ipv6Addr>()
        .map_err(|e| format!("bad IPv6 address: {}", e))?;
    Ok((addr, len))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| invalid_env(key, value, &e.to_string()))
}

fn invalid_env(key: &str, value: &str, reason: &str) -> Error {
    Error::Configuration(format!("invalid {}='{}': {}", key, value, reason))
}
