//! Marker detection, free-space scanning and verified injection.
//!
//! Detection and scanning are strictly read-only; the image is mutated only
//! by [`inject_and_verify`], after both have completed.

use crate::config::InjectorConfig;
use crate::error::{Error, Mismatch, ReloadFailure, VerificationMismatch, WriteFailure};
use crate::image::HexImage;
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Byte order inferred from how the marker is stored in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Big,
    Little,
    Unknown,
}

impl Endianness {
    pub fn is_known(self) -> bool {
        self != Endianness::Unknown
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Big => write!(f, "big"),
            Endianness::Little => write!(f, "little"),
            Endianness::Unknown => write!(f, "unknown"),
        }
    }
}

/// Read `marker_len` bytes at `address` and compare them against the
/// big-endian encoding of the marker value and its reverse. Exact matches
/// only; an unmapped address or a single differing byte yields `Unknown`.
pub fn detect_endianness(image: &HexImage, address: usize, config: &InjectorConfig) -> Endianness {
    let big = config.marker_bytes();
    let little: Vec<u8> = big.iter().rev().copied().collect();

    let mut stored = Vec::with_capacity(config.marker_len);
    for i in 0..config.marker_len {
        match image.get(address + i) {
            Some(byte) => stored.push(byte),
            None => return Endianness::Unknown,
        }
    }

    if stored == big {
        Endianness::Big
    } else if stored == little {
        Endianness::Little
    } else {
        Endianness::Unknown
    }
}

/// Count the contiguous bytes available for payload starting at
/// `start_address`, up to `max_scan`. Scanning stops without counting at the
/// first unmapped address; offsets below `marker_len` are counted regardless
/// of value, offsets at or past it only while they equal the padding byte.
/// A result of 0 means no usable space and the caller must not write.
pub fn free_space_after(image: &HexImage, start_address: usize, config: &InjectorConfig) -> usize {
    let mut length = 0;
    for i in 0..config.max_scan {
        let byte = match image.get(start_address + i) {
            Some(byte) => byte,
            None => break,
        };
        if i >= config.marker_len && byte != config.padding_byte {
            break;
        }
        length += 1;
    }
    debug!(
        "free-space scan from {:#x}: {} byte(s) available",
        start_address, length
    );
    length
}

/// Order the payload bytes for the detected byte order: serial order for a
/// big-endian marker, reversed for a little-endian one.
pub fn orient_payload(endianness: Endianness, payload: &[u8]) -> Vec<u8> {
    match endianness {
        Endianness::Little => payload.iter().rev().copied().collect(),
        _ => payload.to_vec(),
    }
}

/// Compare every payload byte against `image` at `address + i`, collecting
/// the addresses that differ or are unmapped.
pub fn verify(image: &HexImage, address: usize, payload: &[u8]) -> Vec<Mismatch> {
    payload
        .iter()
        .enumerate()
        .filter_map(|(i, &expected)| {
            let addr = address + i;
            let actual = image.get(addr);
            if actual == Some(expected) {
                None
            } else {
                Some(Mismatch {
                    address: addr,
                    expected,
                    actual,
                })
            }
        })
        .collect()
}

/// Write the payload into the image at `address`, persist it to `out_path`
/// and confirm the write by reloading the file into a fresh image. The
/// output file is not rolled back on a verification failure; the caller's
/// pre-injection backup is the only recovery path.
pub fn inject_and_verify(
    image: &mut HexImage,
    address: usize,
    payload: &[u8],
    out_path: &Path,
) -> Result<(), Error> {
    for (i, &byte) in payload.iter().enumerate() {
        image.set(address + i, byte);
    }

    image.write_hex(out_path).context(WriteFailure { path: out_path })?;

    // Reload from disk so verification sees what was durably written, not
    // the in-memory state.
    let reloaded = HexImage::load(out_path).context(ReloadFailure { path: out_path })?;

    let mismatches = verify(&reloaded, address, payload);
    ensure!(mismatches.is_empty(), VerificationMismatch { mismatches });

    info!(
        "verified {} byte(s) at {:#x} in {}",
        payload.len(),
        address,
        out_path.display()
    );
    Ok(())
}
