//! Binary reading primitives shared by every decoding layer

mod cursor;

pub use cursor::{ByteCursor, Endianness};

/// Format bytes as lowercase hex.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
