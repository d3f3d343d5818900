// Vibetrie - A Merkle Patricia Trie engine for blockchain state

// Re-export trie module
pub mod trie;

pub use trie::{
    verify_proof, Hash, MerklePatriciaTrie, Node, Proof, SnapshotNode, TrieConfig, TrieError,
    TrieGraph, TrieResult,
};

// Initialize logging
pub fn init_logger() {
    env_logger::init();
}
