//! Identifier generation: content-derived GUIDs and revision-session ids.

use rand::RngExt;
use sha2::{Digest, Sha256};
use std::fmt::Write as FmtWrite;

/// Derive a GUID from content. Equal input always yields the same GUID.
///
/// The first 16 bytes of a SHA-256 digest are stamped with the RFC4122
/// name-based version bits, so the result is indistinguishable in shape from
/// any other GUID.
pub fn guid_from_content(content: &[u8]) -> [u8; 16] {
    let digest = Sha256::digest(content);
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    bytes[6] = (bytes[6] & 0x0f) | 0x50;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    bytes
}

/// Format raw GUID bytes without braces: XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX
pub fn format_guid(bytes: &[u8; 16]) -> String {
    let mut out = String::with_capacity(36);
    for (i, range) in [0..4, 4..6, 6..8, 8..10, 10..16].into_iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        hex_upper(&bytes[range], &mut out);
    }
    out
}

/// Generate a revision-session id: eight uppercase hex digits, as used by
/// `w:rsid*` attributes.
pub fn generate_rsid() -> String {
    let mut rng = rand::rng();
    let value: u32 = rng.random();
    format!("{value:08X}")
}

fn hex_upper(bytes: &[u8], out: &mut String) {
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
}
