//! Serial-number injection for Intel HEX firmware images.
//!
//! A fixed marker (default `0xAA55`) at a known address signals an injection
//! site and, through its stored byte order, the endianness the payload must
//! be written in. The padding bytes following the marker bound how long an
//! injected serial may be, and every injection is verified by re-reading the
//! persisted file from scratch rather than trusting the in-memory image.

pub mod config;
pub mod error;
pub mod image;
pub mod injector;
pub mod report;
pub mod serial;

pub use config::InjectorConfig;
pub use error::{Error, Mismatch, Result};
pub use image::HexImage;
pub use injector::Endianness;
