//! Merkle Patricia Trie implementation for VibeCoin
//!
//! This module provides a from-scratch implementation of a Merkle Patricia Trie
//! (MPT) for storing and verifying key-value state. The MPT enables efficient
//! lookups, updates, and cryptographic verification through content-addressed
//! node hashes and Merkle proofs.
//!
//! Keys are traversed as 4-bit nibbles (two per byte, most significant first),
//! and the node graph uses the four classic MPT node kinds: empty, leaf,
//! extension, and branch.

pub mod error;
pub mod mpt;
pub mod nibble;
pub mod node;
pub mod proof;
pub mod snapshot;

// Re-export main components
pub use error::{TrieError, TrieResult};
pub use mpt::{MerklePatriciaTrie, TrieConfig};
pub use nibble::Nibble;
pub use node::{Hash, Node};
pub use proof::{verify_proof, Proof};
pub use snapshot::{GraphEdge, GraphNode, SnapshotChild, SnapshotNode, TrieGraph};
