// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML bus configuration loader.
//!
//! # Example YAML
//!
//! ```yaml
//! # mcbus.yaml
//! namespace:
//!   prefix: "ff15::/64"
//!   scope: site-local
//!   port_base: 26000
//!   port_span: 1
//!   overrides:
//!     Heartbeat: "[ff15::beef]:26001"
//!
//! transport:
//!   hop_limit: 1
//!   multicast_loop: true
//!   interface: 0
//!   receive_timeout_ms: 100
//!   recv_buffer_size: 4194304
//! ```
//!
//! Missing keys keep their defaults. The transport mode is not part of the
//! file; loaded configs always use UDP.

use super::{parse_prefix, BusConfig, MulticastScope};
use crate::error::{Error, Result};
use crate::transport::MulticastEndpoint;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// YAML bus configuration loader.
pub struct YamlLoader;

/// Root YAML document structure.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct YamlBusDocument {
    pub namespace: Option<YamlNamespace>,
    pub transport: Option<YamlTransport>,
}

/// `namespace:` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct YamlNamespace {
    /// `ff15::` or `ff15::/64`
    pub prefix: Option<String>,
    pub prefix_len: Option<u8>,
    pub scope: Option<String>,
    pub port_base: Option<u16>,
    pub port_span: Option<u16>,
    /// Message-type name -> `[group]:port`
    pub overrides: HashMap<String, String>,
}

/// `transport:` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct YamlTransport {
    pub hop_limit: Option<u32>,
    pub multicast_loop: Option<bool>,
    pub interface: Option<u32>,
    pub receive_timeout_ms: Option<u64>,
    pub recv_buffer_size: Option<usize>,
}

impl YamlLoader {
    /// Load YAML document from file.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` when the file cannot be read or parsed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<YamlBusDocument> {
        let path = path.as_ref();
        let yaml_content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::load_from_str(&yaml_content)
    }

    /// Parse YAML document from string.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` on malformed YAML.
    pub fn load_from_str(yaml_content: &str) -> Result<YamlBusDocument> {
        serde_yaml::from_str(yaml_content)
            .map_err(|e| Error::Configuration(format!("failed to parse YAML: {}", e)))
    }

    /// Load a file and convert it into a validated `BusConfig`.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` on I/O, syntax or value errors.
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BusConfig> {
        let config = Self::load_from_file(path)?.into_config()?;
        log::debug!(
            "[CONFIG] loaded YAML config prefix={}/{} port_base={}",
            config.namespace.prefix,
            config.namespace.prefix_len,
            config.namespace.port_base
        );
        Ok(config)
    }
}

impl YamlBusDocument {
    /// Overlay this document on `BusConfig::default()`.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` for unparsable values or an invalid namespace.
    pub fn into_config(self) -> Result<BusConfig> {
        let mut config = BusConfig::default();

        if let Some(ns) = self.namespace {
            let target = &mut config.namespace;
            if let Some(len) = ns.prefix_len {
                target.prefix_len = len;
            }
            if let Some(prefix) = ns.prefix {
                let (addr, len) = parse_prefix(&prefix, target.prefix_len)
                    .map_err(|e| Error::Configuration(format!("namespace.prefix: {}", e)))?;
                target.prefix = addr;
                target.prefix_len = len;
                if let Some(scope) = MulticastScope::of(&addr) {
                    target.scope = scope;
                }
            }
            if let Some(scope) = ns.scope {
                target.scope = scope.parse()?;
            }
            if let Some(port_base) = ns.port_base {
                target.port_base = port_base;
            }
            if let Some(port_span) = ns.port_span {
                target.port_span = port_span;
            }
            for (name, endpoint) in ns.overrides {
                let endpoint: MulticastEndpoint = endpoint.parse().map_err(|e| {
                    Error::Configuration(format!("namespace.overrides.{}: {}", name, e))
                })?;
                target.overrides.insert(name, endpoint);
            }
            target.validate()?;
        }

        if let Some(tr) = self.transport {
            let target = &mut config.transport;
            if let Some(hop_limit) = tr.hop_limit {
                target.hop_limit = hop_limit;
            }
            if let Some(enabled) = tr.multicast_loop {
                target.multicast_loop = enabled;
            }
            if let Some(index) = tr.interface {
                target.interface = index;
            }
            if let Some(ms) = tr.receive_timeout_ms {
                target.receive_timeout = Duration::from_millis(ms);
            }
            if tr.recv_buffer_size.is_some() {
                target.recv_buffer_size = tr.recv_buffer_size;
            }
        }

        Ok(config)
    }
}
