// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed 33-byte frame header.
//!
//! ```text
//! offset  size  field
//!      0     4  magic "MCBS"
//!      4     1  version
//!      5     8  type fingerprint
//!     13     8  sequence number
//!     21     4  payload length
//!     25     8  send timestamp (us since Unix epoch)
//! ```
//!
//! All integers little-endian.

use crate::config::{HEADER_LEN, WIRE_MAGIC, WIRE_VERSION};
use crate::error::{Error, Result};
use crate::wire::cursor::{WireReader, WireResult, WireWriter};

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub fingerprint: u64,
    pub sequence: u64,
    pub payload_len: u32,
    pub timestamp_us: u64,
}

impl FrameHeader {
    /// Header for the current wire version.
    pub fn new(fingerprint: u64, sequence: u64, payload_len: u32, timestamp_us: u64) -> Self {
        Self {
            version: WIRE_VERSION,
            fingerprint,
            sequence,
            payload_len,
            timestamp_us,
        }
    }

    pub fn write_to(&self, w: &mut WireWriter) {
        w.write_bytes(&WIRE_MAGIC);
        w.write_u8(self.version);
        w.write_u64(self.fingerprint);
        w.write_u64(self.sequence);
        w.write_u32(self.payload_len);
        w.write_u64(self.timestamp_us);
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut w = WireWriter::with_capacity(HEADER_LEN);
        self.write_to(&mut w);
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&w.into_inner());
        out
    }

    /// Decode the header at the start of `datagram`.
    ///
    /// Magic is checked first, then version; anything unknown is rejected
    /// without looking further.
    ///
    /// # Errors
    ///
    /// - `Error::Protocol` for a bad magic or unsupported version
    /// - `Error::Decode` when the datagram is shorter than a header
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        let short = |expected_len: usize| Error::Decode {
            endpoint: None,
            raw_len: datagram.len(),
            expected_len,
            reason: "datagram shorter than frame header".into(),
        };

        let magic = datagram.get(..WIRE_MAGIC.len()).ok_or_else(|| short(HEADER_LEN))?;
        if magic != WIRE_MAGIC.as_slice() {
            return Err(Error::Protocol {
                reason: format!("bad magic {:02x?}", magic),
            });
        }
        let version = *datagram.get(WIRE_MAGIC.len()).ok_or_else(|| short(HEADER_LEN))?;
        if version != WIRE_VERSION {
            return Err(Error::Protocol {
                reason: format!(
                    "unsupported wire version {} (expected {})",
                    version, WIRE_VERSION
                ),
            });
        }
        if datagram.len() < HEADER_LEN {
            return Err(short(HEADER_LEN));
        }

        let mut r = WireReader::new(&datagram[WIRE_MAGIC.len() + 1..HEADER_LEN]);
        read_fields(&mut r, version).map_err(|_| short(HEADER_LEN))
    }
}

fn read_fields(r: &mut WireReader<'_>, version: u8) -> WireResult<FrameHeader> {
    Ok(FrameHeader {
        version,
        fingerprint: r.read_u64()?,
        sequence: r.read_u64()?,
        payload_len: r.read_u32()?,
        timestamp_us: r.read_u64()?,
    })
}
