//! Trie node model and canonical encoding
//!
//! A node is exactly one of four kinds: empty, leaf, extension, or branch.
//! Node identity is the SHA-256 digest of the node's canonical encoding, in
//! which child references appear as the children's own hashes. Tampering with
//! any descendant therefore changes every ancestor's hash.
//!
//! Canonical encoding layout (all lengths are u32 little-endian):
//!
//! ```text
//! branch:    0x00, 16 x (0x00 | 0x01 + child hash), 0x00 | 0x01 + len + value
//! extension: 0x01, len + compact path, child hash
//! leaf:      0x02, len + compact path, len + value
//! empty:     0x03
//! ```

use array_init::array_init;
use sha2::{Digest, Sha256};

use crate::trie::nibble::{compact_encode, nibbles_to_hex, Nibble};

/// Content-addressed node identity: a SHA-256 digest
pub type Hash = [u8; 32];

/// Size of a node hash in bytes
pub const HASH_LEN: usize = 32;

/// Number of child slots in a branch node, one per nibble value
pub const BRANCH_WIDTH: usize = 16;

pub(crate) const TAG_BRANCH: u8 = 0x00;
pub(crate) const TAG_EXTENSION: u8 = 0x01;
pub(crate) const TAG_LEAF: u8 = 0x02;
pub(crate) const TAG_EMPTY: u8 = 0x03;

/// Node kinds in the Merkle Patricia Trie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Empty node (null)
    Empty,

    /// Leaf node containing a value
    Leaf {
        /// Key suffix not yet consumed by ancestors, in nibbles
        path: Vec<Nibble>,
        /// Value stored at this leaf
        value: Vec<u8>,
    },

    /// Extension node carrying a shared path prefix
    Extension {
        /// Non-empty nibble prefix common to every key below this node
        path: Vec<Nibble>,
        /// The single child, always a branch in a canonical trie
        child: Box<Node>,
    },

    /// Branch node with one child slot per nibble value
    Branch {
        /// Children indexed by the next key nibble
        children: [Option<Box<Node>>; BRANCH_WIDTH],
        /// Value stored when a key terminates exactly at this node
        value: Option<Vec<u8>>,
    },
}

impl Node {
    /// Create a new empty node
    pub fn empty() -> Self {
        Node::Empty
    }

    /// Create a new leaf node
    pub fn leaf(path: Vec<Nibble>, value: Vec<u8>) -> Self {
        Node::Leaf { path, value }
    }

    /// Create a new extension node
    pub fn extension(path: Vec<Nibble>, child: Node) -> Self {
        Node::Extension {
            path,
            child: Box::new(child),
        }
    }

    /// Create a new branch node
    pub fn branch(children: [Option<Box<Node>>; BRANCH_WIDTH], value: Option<Vec<u8>>) -> Self {
        Node::Branch { children, value }
    }

    /// Create an empty set of branch children
    pub fn empty_children() -> [Option<Box<Node>>; BRANCH_WIDTH] {
        array_init(|_| None)
    }

    /// Check if the node is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    /// Get the node kind as a string, for logs and snapshots
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Empty => "empty",
            Node::Leaf { .. } => "leaf",
            Node::Extension { .. } => "extension",
            Node::Branch { .. } => "branch",
        }
    }

    /// Serialize the node to its canonical encoding
    ///
    /// Child references are replaced by the child's hash, which is what makes
    /// the resulting digest content-addressed.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Node::Empty => vec![TAG_EMPTY],

            Node::Leaf { path, value } => {
                let compact = compact_encode(path, true);
                let mut out = Vec::with_capacity(9 + compact.len() + value.len());
                out.push(TAG_LEAF);
                out.extend_from_slice(&(compact.len() as u32).to_le_bytes());
                out.extend_from_slice(&compact);
                out.extend_from_slice(&(value.len() as u32).to_le_bytes());
                out.extend_from_slice(value);
                out
            }

            Node::Extension { path, child } => {
                let compact = compact_encode(path, false);
                let mut out = Vec::with_capacity(5 + compact.len() + HASH_LEN);
                out.push(TAG_EXTENSION);
                out.extend_from_slice(&(compact.len() as u32).to_le_bytes());
                out.extend_from_slice(&compact);
                out.extend_from_slice(&child.hash());
                out
            }

            Node::Branch { children, value } => {
                let mut out = Vec::with_capacity(1 + BRANCH_WIDTH * (1 + HASH_LEN) + 5);
                out.push(TAG_BRANCH);
                for child in children.iter() {
                    match child {
                        Some(node) => {
                            out.push(0x01);
                            out.extend_from_slice(&node.hash());
                        }
                        None => out.push(0x00),
                    }
                }
                match value {
                    Some(v) => {
                        out.push(0x01);
                        out.extend_from_slice(&(v.len() as u32).to_le_bytes());
                        out.extend_from_slice(v);
                    }
                    None => out.push(0x00),
                }
                out
            }
        }
    }

    /// Calculate the content hash of this node
    ///
    /// Two nodes with identical subtree content hash identically. The empty
    /// node's digest doubles as the sentinel hash of the empty trie.
    pub fn hash(&self) -> Hash {
        Sha256::digest(self.encode()).into()
    }

    /// Content hash rendered as a 64-character lowercase hex string
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Empty => write!(f, "empty"),
            Node::Leaf { path, value } => {
                write!(f, "leaf({}, {} bytes)", nibbles_to_hex(path), value.len())
            }
            Node::Extension { path, .. } => write!(f, "extension({})", nibbles_to_hex(path)),
            Node::Branch { children, value } => {
                let live = children.iter().filter(|c| c.is_some()).count();
                write!(
                    f,
                    "branch({} children{})",
                    live,
                    if value.is_some() { ", value" } else { "" }
                )
            }
        }
    }
}
