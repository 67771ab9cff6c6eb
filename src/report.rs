//! JSON summary of one injection run.

use crate::injector::Endianness;
use hex_buffer_serde::{Hex as _, HexForm};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What was injected, where, and in which orientation. Written to disk only
/// when the operator asks for it; never read back by the tool.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
pub struct InjectionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub marker_address: usize,
    pub endianness: Endianness,
    pub injection_address: usize,
    pub free_space: usize,
    /// Payload as written, i.e. already oriented for the detected byte order.
    #[serde(with = "HexForm")]
    pub payload: Vec<u8>,
}

impl InjectionReport {
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InjectionReport {
        InjectionReport {
            input: PathBuf::from("firmware.hex"),
            output: PathBuf::from("out.hex"),
            marker_address: 0x2000,
            endianness: Endianness::Big,
            injection_address: 0x2002,
            free_space: 4,
            payload: vec![0xA1, 0xB2, 0xC3, 0xD4],
        }
    }

    #[test]
    fn payload_serializes_as_hex() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"a1b2c3d4\""));
        assert!(json.contains("\"big\""));
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = sample();
        let json = serde_json::to_string(&report).unwrap();
        let parsed: InjectionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn write_json_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        sample().write_json(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"injection_address\": 8194"));
    }
}
