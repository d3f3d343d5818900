//! Merkle proof generation support and verification
//!
//! A proof is the ordered sequence of canonical node encodings on the path
//! from the root to the terminal node of a key. Verification is stateless:
//! it re-derives every hash link from the encodings alone, so a verifier
//! needs nothing but the trusted root hash. Proof bytes are untrusted input;
//! verification reports failure instead of panicking.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::trie::error::{TrieError, TrieResult};
use crate::trie::nibble::{bytes_to_nibbles, compact_decode, Nibble};
use crate::trie::node::{
    Hash, BRANCH_WIDTH, HASH_LEN, TAG_BRANCH, TAG_EMPTY, TAG_EXTENSION, TAG_LEAF,
};

/// Merkle proof for a single key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// The key being proven
    pub key: Vec<u8>,
    /// Canonical node encodings on the root-to-terminal path, root first
    pub nodes: Vec<Vec<u8>>,
}

impl Proof {
    /// Serialize the proof for transport
    pub fn to_bytes(&self) -> TrieResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| TrieError::SerializationError(e.to_string()))
    }

    /// Deserialize a proof received from transport
    pub fn from_bytes(bytes: &[u8]) -> TrieResult<Self> {
        bincode::deserialize(bytes).map_err(|e| TrieError::DeserializationError(e.to_string()))
    }
}

/// A node decoded from an untrusted canonical encoding
///
/// Child references are hashes, exactly as they appear on the wire; the
/// verifier chases them through the proof sequence instead of through owned
/// nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProofNode {
    Empty,
    Leaf {
        path: Vec<Nibble>,
        value: Vec<u8>,
    },
    Extension {
        path: Vec<Nibble>,
        child: Hash,
    },
    Branch {
        children: [Option<Hash>; BRANCH_WIDTH],
        value: Option<Vec<u8>>,
    },
}

fn malformed(msg: &str) -> TrieError {
    TrieError::MalformedNode(msg.to_string())
}

fn read_u8(data: &[u8], pos: &mut usize) -> TrieResult<u8> {
    let byte = *data.get(*pos).ok_or_else(|| malformed("truncated node"))?;
    *pos += 1;
    Ok(byte)
}

fn read_len(data: &[u8], pos: &mut usize) -> TrieResult<usize> {
    let bytes = read_bytes(data, pos, 4)?;
    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Ok(len as usize)
}

fn read_bytes<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> TrieResult<&'a [u8]> {
    // Length prefixes are untrusted; avoid `pos + len` overflow
    if data.len() - *pos < len {
        return Err(malformed("truncated node body"));
    }
    let bytes = &data[*pos..*pos + len];
    *pos += len;
    Ok(bytes)
}

fn read_hash(data: &[u8], pos: &mut usize) -> TrieResult<Hash> {
    let bytes = read_bytes(data, pos, HASH_LEN)?;
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(bytes);
    Ok(hash)
}

impl ProofNode {
    /// Decode a canonical node encoding, rejecting anything non-canonical
    pub(crate) fn decode(data: &[u8]) -> TrieResult<Self> {
        let mut pos = 0;
        let tag = read_u8(data, &mut pos)?;

        let node = match tag {
            TAG_EMPTY => ProofNode::Empty,

            TAG_LEAF => {
                let path_len = read_len(data, &mut pos)?;
                let compact = read_bytes(data, &mut pos, path_len)?;
                let (path, is_leaf) = compact_decode(compact)?;
                if !is_leaf {
                    return Err(malformed("extension flag on leaf path"));
                }
                let value_len = read_len(data, &mut pos)?;
                let value = read_bytes(data, &mut pos, value_len)?.to_vec();
                ProofNode::Leaf { path, value }
            }

            TAG_EXTENSION => {
                let path_len = read_len(data, &mut pos)?;
                let compact = read_bytes(data, &mut pos, path_len)?;
                let (path, is_leaf) = compact_decode(compact)?;
                if is_leaf {
                    return Err(malformed("leaf flag on extension path"));
                }
                if path.is_empty() {
                    return Err(malformed("empty extension path"));
                }
                let child = read_hash(data, &mut pos)?;
                ProofNode::Extension { path, child }
            }

            TAG_BRANCH => {
                let mut children: [Option<Hash>; BRANCH_WIDTH] = [None; BRANCH_WIDTH];
                for slot in children.iter_mut() {
                    match read_u8(data, &mut pos)? {
                        0x00 => {}
                        0x01 => *slot = Some(read_hash(data, &mut pos)?),
                        other => {
                            return Err(TrieError::MalformedNode(format!(
                                "invalid child marker: {:#04x}",
                                other
                            )))
                        }
                    }
                }
                let value = match read_u8(data, &mut pos)? {
                    0x00 => None,
                    0x01 => {
                        let len = read_len(data, &mut pos)?;
                        Some(read_bytes(data, &mut pos, len)?.to_vec())
                    }
                    other => {
                        return Err(TrieError::MalformedNode(format!(
                            "invalid value marker: {:#04x}",
                            other
                        )))
                    }
                };
                ProofNode::Branch { children, value }
            }

            other => {
                return Err(TrieError::MalformedNode(format!(
                    "unknown node tag: {:#04x}",
                    other
                )))
            }
        };

        if pos != data.len() {
            return Err(malformed("trailing bytes after node"));
        }
        Ok(node)
    }
}

/// Verify a Merkle proof against a trusted root hash
///
/// Walks the proof from the root element down, checking at every step that
/// the element hashes to the reference carried by its parent (or to
/// `root_hash` for the first element), that the element consumes the right
/// key nibbles, and that the terminal element stores `value` for the full
/// key. Returns false on any mismatch, short or overlong proof, or malformed
/// encoding.
pub fn verify_proof(root_hash: &Hash, key: &[u8], value: &[u8], proof: &Proof) -> bool {
    if key.is_empty() || proof.key != key || proof.nodes.is_empty() {
        return false;
    }

    let nibbles = bytes_to_nibbles(key);
    let mut pos = 0usize;
    let mut expected: Hash = *root_hash;

    for (i, encoding) in proof.nodes.iter().enumerate() {
        let is_last = i + 1 == proof.nodes.len();

        let actual: Hash = Sha256::digest(encoding).into();
        if actual != expected {
            return false;
        }

        let node = match ProofNode::decode(encoding) {
            Ok(node) => node,
            Err(_) => return false,
        };

        match node {
            ProofNode::Empty => return false,

            ProofNode::Leaf {
                path,
                value: leaf_value,
            } => {
                return is_last && nibbles[pos..] == path[..] && leaf_value == value;
            }

            ProofNode::Extension { path, child } => {
                if is_last {
                    return false;
                }
                if nibbles.len() < pos + path.len() || nibbles[pos..pos + path.len()] != path[..] {
                    return false;
                }
                pos += path.len();
                expected = child;
            }

            ProofNode::Branch {
                children,
                value: branch_value,
            } => {
                if pos == nibbles.len() {
                    return is_last && branch_value.as_deref() == Some(value);
                }
                if is_last {
                    return false;
                }
                match children[nibbles[pos] as usize] {
                    Some(child) => {
                        expected = child;
                        pos += 1;
                    }
                    None => return false,
                }
            }
        }
    }

    false
}
