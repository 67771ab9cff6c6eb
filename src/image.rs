//! Sparse memory image backed by the Intel HEX encoding.
//!
//! The image is a `BTreeMap` from address to byte: absence of a key means
//! "unmapped", which is distinct from a stored `0x00`. Loading parses data,
//! end-of-file and extended segment/linear address records with checksum
//! verification; start-address records are kept verbatim and re-emitted on
//! write.

use chrono::Local;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Snafu)]
pub enum ImageError {
    #[snafu(display("I/O error: {}", source))]
    Io { source: std::io::Error },

    #[snafu(display("line {}: record does not start with ':'", line))]
    MissingStartCode { line: usize },

    #[snafu(display("line {}: invalid hex digit in record", line))]
    BadHexDigit { line: usize },

    #[snafu(display("line {}: record shorter than its declared length", line))]
    Truncated { line: usize },

    #[snafu(display(
        "line {}: checksum mismatch (computed {:#04x}, stored {:#04x})",
        line,
        computed,
        stored
    ))]
    ChecksumMismatch {
        line: usize,
        computed: u8,
        stored: u8,
    },

    #[snafu(display("line {}: unsupported record type {:#04x}", line, record_type))]
    UnsupportedRecord { line: usize, record_type: u8 },
}

/// A sparse byte-addressable image in Intel HEX encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HexImage {
    bytes: BTreeMap<usize, u8>,
    /// Start-address records (types 0x03/0x05), preserved verbatim.
    start_records: Vec<String>,
}

impl HexImage {
    pub fn new() -> Self {
        HexImage::default()
    }

    /// Load and parse an Intel HEX file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let text = fs::read_to_string(path.as_ref()).context(Io)?;
        let image = Self::parse(&text)?;
        debug!(
            "loaded {} mapped byte(s) from {}",
            image.len(),
            path.as_ref().display()
        );
        Ok(image)
    }

    /// Parse Intel HEX text into a sparse image.
    pub fn parse(text: &str) -> Result<Self, ImageError> {
        let mut image = HexImage::default();
        let mut offset = 0usize;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            ensure!(raw.starts_with(':'), MissingStartCode { line });

            let record = decode_hex(&raw[1..], line)?;
            ensure!(record.len() >= 5, Truncated { line });
            let count = record[0] as usize;
            ensure!(record.len() == count + 5, Truncated { line });

            let stored = record[record.len() - 1];
            let computed = record[..record.len() - 1]
                .iter()
                .fold(0u8, |sum, b| sum.wrapping_add(*b))
                .wrapping_neg();
            ensure!(
                computed == stored,
                ChecksumMismatch {
                    line,
                    computed,
                    stored
                }
            );

            let address = ((record[1] as usize) << 8) | record[2] as usize;
            let record_type = record[3];
            let data = &record[4..4 + count];

            match record_type {
                0x00 => {
                    for (i, byte) in data.iter().enumerate() {
                        image.bytes.insert(offset + address + i, *byte);
                    }
                }
                0x01 => break,
                0x02 => {
                    ensure!(count == 2, Truncated { line });
                    offset = (((data[0] as usize) << 8) | data[1] as usize) * 16;
                }
                0x04 => {
                    ensure!(count == 2, Truncated { line });
                    offset = (((data[0] as usize) << 8) | data[1] as usize) << 16;
                }
                0x03 | 0x05 => image.start_records.push(raw.to_string()),
                other => {
                    return UnsupportedRecord {
                        line,
                        record_type: other,
                    }
                    .fail()
                }
            }
        }

        Ok(image)
    }

    /// Byte at `address`, or `None` if the address is unmapped.
    pub fn get(&self, address: usize) -> Option<u8> {
        self.bytes.get(&address).copied()
    }

    /// Write a byte, mapping the address if it was not mapped before.
    pub fn set(&mut self, address: usize, value: u8) {
        self.bytes.insert(address, value);
    }

    /// Number of mapped addresses.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Persist the image as Intel HEX: 16-byte data records, an extended
    /// linear address record whenever the upper 16 address bits change, and
    /// a final end-of-file record.
    pub fn write_hex<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
        let mut out = String::new();
        for record in &self.start_records {
            out.push_str(record);
            out.push('\n');
        }

        let mut upper: u16 = 0;
        let mut pending: Vec<u8> = Vec::with_capacity(16);
        let mut pending_start = 0usize;
        let mut prev: Option<usize> = None;

        for (&address, &byte) in &self.bytes {
            let contiguous = prev.map_or(false, |p| address == p + 1);
            let same_segment = (address >> 16) == (pending_start >> 16);
            if !pending.is_empty() && (!contiguous || pending.len() == 16 || !same_segment) {
                emit_data_record(&mut out, &mut upper, pending_start, &pending);
                pending.clear();
            }
            if pending.is_empty() {
                pending_start = address;
            }
            pending.push(byte);
            prev = Some(address);
        }
        if !pending.is_empty() {
            emit_data_record(&mut out, &mut upper, pending_start, &pending);
        }

        out.push_str(":00000001FF\n");
        fs::write(path, out).context(Io)
    }
}

fn decode_hex(s: &str, line: usize) -> Result<Vec<u8>, ImageError> {
    ensure!(s.is_ascii() && s.len() % 2 == 0, BadHexDigit { line });
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .ok()
                .context(BadHexDigit { line })
        })
        .collect()
}

fn emit_data_record(out: &mut String, upper: &mut u16, start: usize, data: &[u8]) {
    let high = (start >> 16) as u16;
    if high != *upper {
        emit_record(out, 0, 0x04, &[(high >> 8) as u8, high as u8]);
        *upper = high;
    }
    emit_record(out, (start & 0xFFFF) as u16, 0x00, data);
}

fn emit_record(out: &mut String, address: u16, record_type: u8, data: &[u8]) {
    use std::fmt::Write as _;

    let mut sum = (data.len() as u8)
        .wrapping_add((address >> 8) as u8)
        .wrapping_add(address as u8)
        .wrapping_add(record_type);
    let _ = write!(out, ":{:02X}{:04X}{:02X}", data.len(), address, record_type);
    for byte in data {
        let _ = write!(out, "{:02X}", byte);
        sum = sum.wrapping_add(*byte);
    }
    let _ = write!(out, "{:02X}", sum.wrapping_neg());
    out.push('\n');
}

/// Copy `input` to a sibling file named with the load timestamp. The backup
/// is an unconditional side effect of loading and is never read back.
pub fn create_backup<P: AsRef<Path>>(input: P) -> Result<PathBuf, std::io::Error> {
    let input = input.as_ref();
    let timestamp = Local::now().format("%Y-%m-%d_%H%M%S");
    let backup = input.with_file_name(format!("backup_{}.hex", timestamp));
    fs::copy(input, &backup)?;
    debug!("backup written to {}", backup.display());
    Ok(backup)
}
