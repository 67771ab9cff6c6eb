//! Serial-number validation and the interactive entry loop.
//!
//! [`validate_serial`] is the non-interactive seam: normalize, apply each
//! rule in order, fail with the first violation. [`prompt_serial`] wraps it
//! in the blocking validate-echo-confirm-retry exchange with the operator,
//! generic over reader and writer so tests can drive it.

use snafu::{ensure, ResultExt, Snafu};
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum SerialError {
    #[snafu(display("no input entered"))]
    Empty,

    #[snafu(display("serial too long: must be {} hex characters or less", max_chars))]
    TooLong { max_chars: usize },

    #[snafu(display("serial number must have an even number of digits"))]
    OddLength,

    #[snafu(display(
        "invalid character {:?}: only hex digits (0-9, A-F) are allowed",
        character
    ))]
    InvalidCharacter { character: char },
}

/// Strip a leading `0x`/`0X` prefix and remove spaces and hyphens.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        &trimmed[2..]
    } else {
        trimmed
    };
    stripped.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

/// Validate a serial string against a byte limit and parse it into bytes.
///
/// Rules, in order: non-empty after normalization; at most `2 * max_bytes`
/// hex characters; even digit count; hex digits only.
pub fn validate_serial(raw: &str, max_bytes: usize) -> Result<Vec<u8>, SerialError> {
    let s = normalize(raw);
    ensure!(!s.is_empty(), Empty);

    let digits = s.chars().count();
    let max_chars = max_bytes * 2;
    ensure!(digits <= max_chars, TooLong { max_chars });
    ensure!(digits % 2 == 0, OddLength);

    // Non-ASCII input cannot be sliced into digit pairs below.
    if let Some(character) = s.chars().find(|c| !c.is_ascii()) {
        return InvalidCharacter { character }.fail();
    }

    let mut bytes = Vec::with_capacity(s.len() / 2);
    for i in (0..s.len()).step_by(2) {
        let pair = &s[i..i + 2];
        match u8::from_str_radix(pair, 16) {
            Ok(byte) => bytes.push(byte),
            Err(_) => {
                let character = pair.chars().find(|c| !c.is_ascii_hexdigit()).unwrap_or('?');
                return InvalidCharacter { character }.fail();
            }
        }
    }
    Ok(bytes)
}

/// Non-interactive entry point: validate once and surface the first violated
/// rule as a crate error instead of re-prompting.
pub fn parse_serial(raw: &str, max_bytes: usize) -> crate::error::Result<Vec<u8>> {
    validate_serial(raw, max_bytes).context(crate::error::SerialInvalid)
}

/// Interactive serial entry. The first attempt is `initial` (normally the
/// `--serial` argument); every rule violation prints the reason and prompts
/// for a new value, and a valid serial is echoed back for confirmation
/// before being accepted. `y`/`yes` accepts, anything else re-enters the
/// loop. End of input surfaces as an I/O error rather than blocking.
pub fn prompt_serial<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    initial: &str,
    max_bytes: usize,
) -> io::Result<Vec<u8>> {
    let max_chars = max_bytes * 2;
    let mut attempt = initial.to_string();
    loop {
        match validate_serial(&attempt, max_bytes) {
            Ok(bytes) => {
                writeln!(output, "Serial bytes to be injected: {}", hex_upper(&bytes))?;
                write!(output, "Proceed with this serial? [y/N]: ")?;
                output.flush()?;
                let answer = read_line(input)?;
                match answer.trim().to_lowercase().as_str() {
                    "y" | "yes" => return Ok(bytes),
                    _ => writeln!(output, "Please re-enter the serial number")?,
                }
            }
            Err(err) => writeln!(output, "{}", err)?,
        }
        write!(output, "Enter a serial number in hex up to {} chars: ", max_chars)?;
        output.flush()?;
        attempt = read_line(input)?;
    }
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<String> {
    let mut line = String::new();
    let read = input.read_line(&mut line)?;
    if read == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "serial entry aborted: end of input",
        ));
    }
    Ok(line)
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Cursor;

    #[test]
    fn accepts_plain_hex() {
        assert_eq!(
            validate_serial("A1B2C3D4", 8).unwrap(),
            vec![0xA1, 0xB2, 0xC3, 0xD4]
        );
    }

    #[test]
    fn accepts_lowercase_hex() {
        assert_eq!(
            validate_serial("deadbeef", 4).unwrap(),
            vec![0xDE, 0xAD, 0xBE, 0xEF]
        );
    }

    #[test]
    fn strips_prefix_and_separators() {
        assert_eq!(
            validate_serial("0xA1-B2 C3", 8).unwrap(),
            vec![0xA1, 0xB2, 0xC3]
        );
    }

    #[test]
    fn produces_half_the_digit_count() {
        let bytes = validate_serial("0011223344556677", 8).unwrap();
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(validate_serial("   ", 8), Err(SerialError::Empty));
        assert_eq!(validate_serial("0x", 8), Err(SerialError::Empty));
    }

    #[test]
    fn rejects_too_long_input() {
        assert_eq!(
            validate_serial("A1B2C3", 2),
            Err(SerialError::TooLong { max_chars: 4 })
        );
    }

    #[test]
    fn rejects_odd_digit_count() {
        assert_eq!(validate_serial("ABC", 8), Err(SerialError::OddLength));
    }

    #[test]
    fn rejects_non_hex_character() {
        assert_eq!(
            validate_serial("G1", 8),
            Err(SerialError::InvalidCharacter { character: 'G' })
        );
    }

    #[test]
    fn each_rule_fires_alone() {
        // Too long wins over odd length, odd length over the hex check.
        assert_eq!(
            validate_serial("ABCDE", 2),
            Err(SerialError::TooLong { max_chars: 4 })
        );
        assert_eq!(validate_serial("ABG", 8), Err(SerialError::OddLength));
    }

    #[test]
    fn parse_serial_wraps_the_violation() {
        match parse_serial("XYZ1", 8) {
            Err(Error::SerialInvalid { .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn prompt_accepts_on_confirmation() {
        let mut input = Cursor::new(b"y\n".to_vec());
        let mut output = Vec::new();
        let bytes = prompt_serial(&mut input, &mut output, "A1B2", 4).unwrap();
        assert_eq!(bytes, vec![0xA1, 0xB2]);
        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("Serial bytes to be injected: A1B2"));
    }

    #[test]
    fn prompt_reenters_after_invalid_initial() {
        let mut input = Cursor::new(b"C3D4\ny\n".to_vec());
        let mut output = Vec::new();
        let bytes = prompt_serial(&mut input, &mut output, "XYZ!", 4).unwrap();
        assert_eq!(bytes, vec![0xC3, 0xD4]);
        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("Enter a serial number in hex up to 8 chars"));
    }

    #[test]
    fn negative_confirmation_reenters_the_loop() {
        let mut input = Cursor::new(b"n\nC3D4\nyes\n".to_vec());
        let mut output = Vec::new();
        let bytes = prompt_serial(&mut input, &mut output, "A1B2", 4).unwrap();
        assert_eq!(bytes, vec![0xC3, 0xD4]);
        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("Please re-enter the serial number"));
    }

    #[test]
    fn end_of_input_is_an_error() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let err = prompt_serial(&mut input, &mut output, "A1B2", 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
