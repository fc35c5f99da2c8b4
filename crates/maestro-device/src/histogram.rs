//! Result histogram and its wire codec.
//!
//! The engine returns result text that is JSON in practice, but only the
//! `"counts": { "<bits>": <uint>, ... }` subset matters here. The scanner
//! below recognizes exactly that shape; anything malformed or missing yields
//! an empty histogram, never an error.

use std::collections::BTreeMap;

use crate::error::{DeviceError, DeviceResult};

/// Result payloads a caller can query for a finished job.
///
/// Only the histogram kinds are implemented; the others are recognized but
/// rejected as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Comma-joined bitstring keys, NUL-terminated.
    HistKeys,
    /// Native-endian `u64` counts, packed in key order.
    HistValues,
    ProbsSparse,
    ProbsDense,
    StateVectorDense,
}

/// Measurement histogram: bitstring key to shot count, keys kept in
/// ascending lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    counts: BTreeMap<String, u64>,
}

impl Histogram {
    /// Scan `text` for the counts object. Returns an empty histogram when
    /// the marker is absent or the shape is broken.
    pub fn from_result_text(text: &str) -> Self {
        Self::scan(text).unwrap_or_default()
    }

    fn scan(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        let mut i = text.find("\"counts\"")? + "\"counts\"".len();
        while i < bytes.len() && bytes[i] != b'{' {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        i += 1;

        let mut counts = BTreeMap::new();
        loop {
            while i < bytes.len() && bytes[i] != b'"' && bytes[i] != b'}' {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            if bytes[i] == b'}' {
                break;
            }
            i += 1;
            let key_start = i;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            let key = String::from_utf8_lossy(&bytes[key_start..i]).into_owned();
            i += 1;

            // Only a colon separates a key from its count.
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() || bytes[i] != b':' {
                return None;
            }
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() || !bytes[i].is_ascii_digit() {
                return None;
            }
            let num_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let count = std::str::from_utf8(&bytes[num_start..i])
                .ok()?
                .parse::<u64>()
                .ok()?;
            counts.insert(key, count);
        }
        Some(Self { counts })
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, key: &str) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Keys comma-joined in ascending order; the trailing separator becomes
    /// the NUL terminator. Empty histogram encodes to zero bytes.
    fn encoded_keys(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for key in self.counts.keys() {
            out.extend_from_slice(key.as_bytes());
            out.push(b',');
        }
        if let Some(last) = out.last_mut() {
            *last = 0;
        }
        out
    }

    /// Counts as native-endian `u64`, packed in the keys' order.
    fn encoded_values(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.counts.len() * size_of::<u64>());
        for &count in self.counts.values() {
            out.extend_from_slice(&count.to_ne_bytes());
        }
        out
    }

    /// Two-phase result query.
    ///
    /// With `buf: None` this is the size probe: the required byte count is
    /// returned and nothing is written. With a buffer, an undersized one
    /// fails [`DeviceError::BufferTooSmall`] and the buffer is left
    /// untouched; otherwise the payload lands at the front of the buffer
    /// and its length is returned.
    pub fn query(&self, kind: ResultKind, buf: Option<&mut [u8]>) -> DeviceResult<usize> {
        let payload = match kind {
            ResultKind::HistKeys => self.encoded_keys(),
            ResultKind::HistValues => self.encoded_values(),
            other => {
                return Err(DeviceError::NotSupported(format!("result kind {other:?}")));
            }
        };
        match buf {
            None => Ok(payload.len()),
            Some(buf) => {
                if buf.len() < payload.len() {
                    return Err(DeviceError::BufferTooSmall {
                        required: payload.len(),
                        provided: buf.len(),
                    });
                }
                buf[..payload.len()].copy_from_slice(&payload);
                Ok(payload.len())
            }
        }
    }
}
