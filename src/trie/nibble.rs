//! Nibble-level key handling
//!
//! Trie keys are traversed four bits at a time. Every key byte is split into
//! two nibbles, most significant nibble first, so the byte `0xAB` becomes the
//! nibbles `[0xA, 0xB]`. Extension and leaf paths are stored in memory as raw
//! nibble vectors and only converted to the compact (hex-prefix) form at the
//! canonical encoding boundary.

use crate::trie::error::{TrieError, TrieResult};

/// Nibble is a 4-bit value (0-15)
pub type Nibble = u8;

/// Encode a byte slice into a vector of nibbles
///
/// Each byte is split into two nibbles (4-bit values).
/// For example, the byte 0xAB becomes two nibbles: 0xA and 0xB.
pub fn bytes_to_nibbles(bytes: &[u8]) -> Vec<Nibble> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);

    for &byte in bytes {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }

    nibbles
}

/// Convert a vector of nibbles back to bytes
///
/// Every two nibbles are combined into a single byte. Keys are always split
/// from whole bytes, so a trailing unpaired nibble is padded with zero bits.
pub fn nibbles_to_bytes(nibbles: &[Nibble]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((nibbles.len() + 1) / 2);

    for chunk in nibbles.chunks(2) {
        if chunk.len() == 2 {
            bytes.push((chunk[0] << 4) | chunk[1]);
        } else {
            bytes.push(chunk[0] << 4);
        }
    }

    bytes
}

/// Convert a slice of nibbles to a hex string
///
/// Each nibble becomes one hex character, so `[0xA, 0xB]` becomes `"ab"`.
pub fn nibbles_to_hex(nibbles: &[Nibble]) -> String {
    nibbles
        .iter()
        .map(|&n| char::from_digit(u32::from(n) & 0x0F, 16).unwrap_or('0'))
        .collect()
}

/// Length of the longest common prefix of two nibble slices
pub fn common_prefix_len(a: &[Nibble], b: &[Nibble]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Compact encoding for paths in extension and leaf nodes
///
/// The first byte carries two flags:
/// - bit 4 (0x10): the path has an odd number of nibbles, and the first
///   nibble is packed into the low half of the flag byte
/// - bit 5 (0x20): the path belongs to a leaf node
///
/// For example:
/// - [0, 1, 2, 3, 4, 5] as an extension path becomes [0x00, 0x01, 0x23, 0x45]
/// - [0, 1, 2, 3, 4, 5] as a leaf path becomes [0x20, 0x01, 0x23, 0x45]
/// - [1, 2, 3, 4, 5] as an extension path becomes [0x11, 0x23, 0x45]
/// - [1, 2, 3, 4, 5] as a leaf path becomes [0x31, 0x23, 0x45]
pub fn compact_encode(nibbles: &[Nibble], is_leaf: bool) -> Vec<u8> {
    let mut compact = Vec::with_capacity(nibbles.len() / 2 + 1);
    let is_odd = nibbles.len() % 2 != 0;

    let mut first_byte = 0;
    if is_leaf {
        first_byte |= 0x20;
    }

    if is_odd {
        first_byte |= 0x10;
        compact.push(first_byte | nibbles[0]);

        for pair in nibbles[1..].chunks(2) {
            compact.push((pair[0] << 4) | pair[1]);
        }
    } else {
        compact.push(first_byte);

        for pair in nibbles.chunks(2) {
            compact.push((pair[0] << 4) | pair[1]);
        }
    }

    compact
}

/// Decode a compact encoding back to nibbles and the leaf flag
///
/// Rejects empty input and unused flag bits so that untrusted proof encodings
/// cannot smuggle non-canonical paths.
pub fn compact_decode(compact: &[u8]) -> TrieResult<(Vec<Nibble>, bool)> {
    if compact.is_empty() {
        return Err(TrieError::MalformedNode("empty compact path".to_string()));
    }

    let first_byte = compact[0];
    if first_byte & 0xC0 != 0 {
        return Err(TrieError::MalformedNode(format!(
            "invalid compact path flags: {:#04x}",
            first_byte
        )));
    }

    let is_leaf = (first_byte & 0x20) != 0;
    let is_odd = (first_byte & 0x10) != 0;

    let mut nibbles = Vec::with_capacity(compact.len() * 2);

    if is_odd {
        nibbles.push(first_byte & 0x0F);
    } else if first_byte & 0x0F != 0 {
        return Err(TrieError::MalformedNode(
            "non-zero padding in compact path".to_string(),
        ));
    }

    for &byte in &compact[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }

    Ok((nibbles, is_leaf))
}
