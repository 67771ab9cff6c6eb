//! Marker and scan parameters shared by every component.

/// Expected marker value when none is configured.
pub const DEFAULT_MARKER_VALUE: u64 = 0xAA55;
/// Number of bytes the marker occupies in the image.
pub const DEFAULT_MARKER_LEN: usize = 2;
/// Byte value treated as free space after the marker.
pub const DEFAULT_PADDING_BYTE: u8 = 0x00;
/// Default upper bound on the free-space scan.
pub const DEFAULT_MAX_SCAN: usize = 256;
/// Scan window used by the command-line entry point.
pub const CLI_MAX_SCAN: usize = 64;

/// Configuration passed explicitly to the detector, scanner and verifier so
/// multiple images or markers can be processed independently in one process.
#[derive(Debug, Clone)]
pub struct InjectorConfig {
    pub marker_value: u64,
    pub marker_len: usize,
    pub padding_byte: u8,
    pub max_scan: usize,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        InjectorConfig {
            marker_value: DEFAULT_MARKER_VALUE,
            marker_len: DEFAULT_MARKER_LEN,
            padding_byte: DEFAULT_PADDING_BYTE,
            max_scan: DEFAULT_MAX_SCAN,
        }
    }
}

impl InjectorConfig {
    /// Big-endian byte encoding of the marker value, `marker_len` bytes long.
    pub fn marker_bytes(&self) -> Vec<u8> {
        let be = self.marker_value.to_be_bytes();
        be[be.len() - self.marker_len..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_marker_encodes_big_endian() {
        let config = InjectorConfig::default();
        assert_eq!(config.marker_bytes(), vec![0xAA, 0x55]);
    }

    #[test]
    fn wider_markers_keep_their_length() {
        let config = InjectorConfig {
            marker_value: 0xDEAD_BEEF,
            marker_len: 4,
            ..InjectorConfig::default()
        };
        assert_eq!(config.marker_bytes(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }
}
