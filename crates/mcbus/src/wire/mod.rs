// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire format
//!
//! One frame per datagram: a fixed 33-byte header (magic, version, schema
//! fingerprint, sequence number, payload length, send timestamp) followed by
//! the schema-encoded payload. See [`header`] for the exact layout.

mod codec;
mod cursor;
pub mod header;

pub use codec::{
    decode_frame, decode_frame_for, decode_payload, encode_frame, encode_payload, DecodedFrame,
};
pub use cursor::{WireError, WireReader, WireResult, WireWriter};
pub use header::FrameHeader;

use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch (0 if the clock is before it).
pub fn now_micros() -> u64 {
    micros_since_epoch(SystemTime::now())
}

/// Convert a `SystemTime` to the frame timestamp unit.
pub fn micros_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_micros_since_epoch() {
        assert_eq!(micros_since_epoch(UNIX_EPOCH), 0);
        assert_eq!(
            micros_since_epoch(UNIX_EPOCH + Duration::from_millis(1500)),
            1_500_000
        );
        assert!(now_micros() > 1_600_000_000_000_000);
    }
}
