//! Common Utilities
//!
//! Provides utility functions used across the E2 node crates

use bytes::Bytes;
use tracing::trace;

/// Convert a byte slice to hex string for debugging
pub fn bytes_to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Assemble a 24-bit big-endian integer
pub fn u24_from_be(bytes: [u8; 3]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
}

/// Short digest of an opaque payload for log lines
pub fn payload_summary(data: &Bytes) -> String {
    const PREVIEW: usize = 8;

    let preview = &data[..data.len().min(PREVIEW)];
    let summary = if data.len() > PREVIEW {
        format!("{} bytes [{} ..]", data.len(), bytes_to_hex(preview))
    } else {
        format!("{} bytes [{}]", data.len(), bytes_to_hex(preview))
    };

    trace!("Summarized payload: {}", summary);
    summary
}
