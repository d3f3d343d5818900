//! Merkle Patricia Trie engine
//!
//! The trie owns its entire node graph. Mutations rebuild the affected path
//! from the bottom up and swap the new nodes in, so a failed validation never
//! leaves the graph half-updated. The root hash is recomputed on read from the
//! canonical node encodings.

use log::{debug, trace};

use crate::trie::error::{TrieError, TrieResult};
use crate::trie::nibble::{bytes_to_nibbles, common_prefix_len, nibbles_to_bytes, Nibble};
use crate::trie::node::{Hash, Node, BRANCH_WIDTH};
use crate::trie::proof::Proof;
use crate::trie::snapshot::{self, SnapshotNode, TrieGraph};

/// Configuration for the trie engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrieConfig {
    /// Maximum accepted key length in bytes
    pub max_key_len: usize,

    /// Maximum accepted value length in bytes
    pub max_value_len: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            max_key_len: 1024,
            max_value_len: 64 * 1024,
        }
    }
}

impl TrieConfig {
    /// Create a new trie configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum key length
    pub fn with_max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Set the maximum value length
    pub fn with_max_value_len(mut self, len: usize) -> Self {
        self.max_value_len = len;
        self
    }
}

/// Merkle Patricia Trie implementation
pub struct MerklePatriciaTrie {
    /// Root node of the trie
    root: Node,
    /// Input limits applied before any mutation
    config: TrieConfig,
}

impl MerklePatriciaTrie {
    /// Create a new empty trie with default limits
    pub fn new() -> Self {
        Self::with_config(TrieConfig::default())
    }

    /// Create a new empty trie with custom limits
    pub fn with_config(config: TrieConfig) -> Self {
        Self {
            root: Node::empty(),
            config,
        }
    }

    /// Get the root hash of the trie
    ///
    /// The empty trie maps to the fixed sentinel hash of the empty node.
    pub fn root_hash(&self) -> Hash {
        self.root.hash()
    }

    /// Root hash as a 64-character lowercase hex string
    pub fn root_hash_hex(&self) -> String {
        hex::encode(self.root_hash())
    }

    /// Check whether the trie holds no values
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of values stored in the trie
    pub fn len(&self) -> usize {
        Self::count_values(&self.root)
    }

    fn count_values(node: &Node) -> usize {
        match node {
            Node::Empty => 0,
            Node::Leaf { .. } => 1,
            Node::Extension { child, .. } => Self::count_values(child),
            Node::Branch { children, value } => {
                let own = usize::from(value.is_some());
                children
                    .iter()
                    .flatten()
                    .map(|child| Self::count_values(child))
                    .sum::<usize>()
                    + own
            }
        }
    }

    /// Get a value from the trie
    pub fn get(&self, key: &[u8]) -> TrieResult<Option<Vec<u8>>> {
        self.check_key(key)?;
        let nibbles = bytes_to_nibbles(key);
        Ok(Self::get_at(&self.root, &nibbles).cloned())
    }

    /// Check whether a key has a value in the trie
    pub fn contains(&self, key: &[u8]) -> TrieResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn get_at<'a>(node: &'a Node, nibbles: &[Nibble]) -> Option<&'a Vec<u8>> {
        match node {
            Node::Empty => None,

            Node::Leaf { path, value } => {
                if path.as_slice() == nibbles {
                    Some(value)
                } else {
                    None
                }
            }

            Node::Extension { path, child } => match nibbles.strip_prefix(path.as_slice()) {
                Some(rest) => Self::get_at(child, rest),
                None => None,
            },

            Node::Branch { children, value } => {
                if nibbles.is_empty() {
                    value.as_ref()
                } else {
                    match &children[nibbles[0] as usize] {
                        Some(child) => Self::get_at(child, &nibbles[1..]),
                        None => None,
                    }
                }
            }
        }
    }

    /// Insert a key-value pair into the trie
    ///
    /// Inserting an existing key replaces its value. Input limits are checked
    /// before any node is touched, so a rejected insert leaves the trie
    /// unchanged.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> TrieResult<()> {
        self.check_key(key)?;
        self.check_value(value)?;

        let nibbles = bytes_to_nibbles(key);
        trace!(
            "insert key={} ({} nibbles, {} byte value)",
            hex::encode(key),
            nibbles.len(),
            value.len()
        );

        let root = std::mem::take(&mut self.root);
        self.root = Self::insert_at(root, &nibbles, value.to_vec());
        Ok(())
    }

    fn insert_at(node: Node, nibbles: &[Nibble], value: Vec<u8>) -> Node {
        match node {
            Node::Empty => Node::leaf(nibbles.to_vec(), value),

            Node::Leaf {
                path,
                value: old_value,
            } => {
                let shared = common_prefix_len(&path, nibbles);
                if shared == path.len() && shared == nibbles.len() {
                    // Same key, replace the value
                    return Node::leaf(path, value);
                }

                // The paths diverge: introduce a branch, fed through an
                // extension when the shared prefix is non-empty.
                let mut children = Node::empty_children();
                let mut branch_value = None;

                let old_rest = &path[shared..];
                if old_rest.is_empty() {
                    branch_value = Some(old_value);
                } else {
                    children[old_rest[0] as usize] =
                        Some(Box::new(Node::leaf(old_rest[1..].to_vec(), old_value)));
                }

                let new_rest = &nibbles[shared..];
                if new_rest.is_empty() {
                    branch_value = Some(value);
                } else {
                    children[new_rest[0] as usize] =
                        Some(Box::new(Node::leaf(new_rest[1..].to_vec(), value)));
                }

                let branch = Node::branch(children, branch_value);
                if shared == 0 {
                    branch
                } else {
                    Node::extension(nibbles[..shared].to_vec(), branch)
                }
            }

            Node::Extension { path, child } => {
                let shared = common_prefix_len(&path, nibbles);
                if shared == path.len() {
                    // Full prefix match, descend into the child
                    let next = Self::insert_at(*child, &nibbles[shared..], value);
                    return Node::extension(path, next);
                }

                // Split the extension at the divergence point
                let mut children = Node::empty_children();

                let old_rest = &path[shared..];
                let lower = if old_rest.len() == 1 {
                    *child
                } else {
                    Node::Extension {
                        path: old_rest[1..].to_vec(),
                        child,
                    }
                };
                children[old_rest[0] as usize] = Some(Box::new(lower));

                let new_rest = &nibbles[shared..];
                let branch_value = if new_rest.is_empty() {
                    Some(value)
                } else {
                    children[new_rest[0] as usize] =
                        Some(Box::new(Node::leaf(new_rest[1..].to_vec(), value)));
                    None
                };

                let branch = Node::branch(children, branch_value);
                if shared == 0 {
                    branch
                } else {
                    Node::extension(path[..shared].to_vec(), branch)
                }
            }

            Node::Branch {
                mut children,
                value: branch_value,
            } => {
                if nibbles.is_empty() {
                    // Key terminates exactly at this branch
                    return Node::branch(children, Some(value));
                }

                let idx = nibbles[0] as usize;
                let child = match children[idx].take() {
                    Some(boxed) => *boxed,
                    None => Node::empty(),
                };
                children[idx] = Some(Box::new(Self::insert_at(child, &nibbles[1..], value)));
                Node::branch(children, branch_value)
            }
        }
    }

    /// Delete a key from the trie
    ///
    /// Returns whether a value was actually removed. Removal canonicalizes
    /// every ancestor on the way back up: branches left with a single live
    /// child (and no own value) collapse into extensions or leaves, and
    /// adjacent extension paths merge.
    pub fn delete(&mut self, key: &[u8]) -> TrieResult<bool> {
        self.check_key(key)?;

        let nibbles = bytes_to_nibbles(key);
        let root = std::mem::take(&mut self.root);
        let (root, removed) = Self::delete_at(root, &nibbles);
        self.root = root;

        if removed {
            debug!("deleted key={}", hex::encode(key));
        }
        Ok(removed)
    }

    fn delete_at(node: Node, nibbles: &[Nibble]) -> (Node, bool) {
        match node {
            Node::Empty => (Node::empty(), false),

            Node::Leaf { path, value } => {
                if path.as_slice() == nibbles {
                    (Node::empty(), true)
                } else {
                    (Node::Leaf { path, value }, false)
                }
            }

            Node::Extension { path, child } => {
                let rest = match nibbles.strip_prefix(path.as_slice()) {
                    Some(rest) => rest,
                    None => return (Node::Extension { path, child }, false),
                };

                let (new_child, removed) = Self::delete_at(*child, rest);
                if !removed {
                    return (Node::extension(path, new_child), false);
                }
                (Self::merge_extension(path, new_child), true)
            }

            Node::Branch {
                mut children,
                value,
            } => {
                if nibbles.is_empty() {
                    if value.is_none() {
                        return (Node::branch(children, value), false);
                    }
                    // Drop the branch's own value, then restore invariants
                    return (Self::collapse_branch(children, None), true);
                }

                let idx = nibbles[0] as usize;
                let child = match children[idx].take() {
                    Some(boxed) => *boxed,
                    None => return (Node::branch(children, value), false),
                };

                let (new_child, removed) = Self::delete_at(child, &nibbles[1..]);
                if !new_child.is_empty() {
                    children[idx] = Some(Box::new(new_child));
                }

                if !removed {
                    return (Node::branch(children, value), false);
                }
                (Self::collapse_branch(children, value), true)
            }
        }
    }

    /// Re-attach an extension prefix to a rebuilt child, merging path chains
    ///
    /// An extension may never point at nothing, and chains of extensions or
    /// an extension over a leaf are non-canonical, so the prefix is folded
    /// into the child where possible.
    fn merge_extension(path: Vec<Nibble>, child: Node) -> Node {
        match child {
            Node::Empty => Node::empty(),

            Node::Leaf {
                path: child_path,
                value,
            } => {
                let mut joined = path;
                joined.extend_from_slice(&child_path);
                Node::Leaf {
                    path: joined,
                    value,
                }
            }

            Node::Extension {
                path: child_path,
                child,
            } => {
                let mut joined = path;
                joined.extend_from_slice(&child_path);
                Node::Extension {
                    path: joined,
                    child,
                }
            }

            branch @ Node::Branch { .. } => Node::extension(path, branch),
        }
    }

    /// Restore branch invariants after a deletion below or at this branch
    ///
    /// A branch must keep at least two live children, or one live child plus
    /// its own value. Anything smaller collapses into a leaf, an extension,
    /// or the empty node.
    fn collapse_branch(
        mut children: [Option<Box<Node>>; BRANCH_WIDTH],
        value: Option<Vec<u8>>,
    ) -> Node {
        let live = children.iter().filter(|c| c.is_some()).count();

        match (live, value) {
            (0, None) => Node::empty(),

            // Only the branch's own value is left
            (0, Some(v)) => Node::leaf(Vec::new(), v),

            // A single child and no value: fold the slot nibble into the child
            (1, None) => {
                for (idx, slot) in children.iter_mut().enumerate() {
                    if let Some(child) = slot.take() {
                        return Self::merge_extension(vec![idx as Nibble], *child);
                    }
                }
                // The live count guarantees a child above
                Node::empty()
            }

            (_, value) => Node::branch(children, value),
        }
    }

    /// All key-value pairs in lexicographic key order
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        Self::collect_entries(&self.root, &mut prefix, &mut out);
        out
    }

    fn collect_entries(
        node: &Node,
        prefix: &mut Vec<Nibble>,
        out: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) {
        match node {
            Node::Empty => {}

            Node::Leaf { path, value } => {
                prefix.extend_from_slice(path);
                out.push((nibbles_to_bytes(prefix), value.clone()));
                prefix.truncate(prefix.len() - path.len());
            }

            Node::Extension { path, child } => {
                prefix.extend_from_slice(path);
                Self::collect_entries(child, prefix, out);
                prefix.truncate(prefix.len() - path.len());
            }

            Node::Branch { children, value } => {
                if let Some(v) = value {
                    out.push((nibbles_to_bytes(prefix), v.clone()));
                }
                for (idx, child) in children.iter().enumerate() {
                    if let Some(child) = child {
                        prefix.push(idx as Nibble);
                        Self::collect_entries(child, prefix, out);
                        prefix.pop();
                    }
                }
            }
        }
    }

    /// Generate a Merkle proof for a key
    ///
    /// The proof is the ordered sequence of canonical node encodings from the
    /// root down to the terminal node holding the key's value. Fails with
    /// [`TrieError::NotFound`] when the key has no value.
    pub fn generate_proof(&self, key: &[u8]) -> TrieResult<Proof> {
        self.check_key(key)?;

        let nibbles = bytes_to_nibbles(key);
        let mut nodes = Vec::new();
        if !Self::prove_at(&self.root, &nibbles, &mut nodes) {
            return Err(TrieError::NotFound);
        }

        trace!(
            "proof for key={} has {} nodes",
            hex::encode(key),
            nodes.len()
        );
        Ok(Proof {
            key: key.to_vec(),
            nodes,
        })
    }

    fn prove_at(node: &Node, nibbles: &[Nibble], out: &mut Vec<Vec<u8>>) -> bool {
        match node {
            Node::Empty => false,

            Node::Leaf { path, .. } => {
                if path.as_slice() == nibbles {
                    out.push(node.encode());
                    true
                } else {
                    false
                }
            }

            Node::Extension { path, child } => match nibbles.strip_prefix(path.as_slice()) {
                Some(rest) => {
                    out.push(node.encode());
                    Self::prove_at(child, rest, out)
                }
                None => false,
            },

            Node::Branch { children, value } => {
                if nibbles.is_empty() {
                    if value.is_some() {
                        out.push(node.encode());
                        true
                    } else {
                        false
                    }
                } else {
                    match &children[nibbles[0] as usize] {
                        Some(child) => {
                            out.push(node.encode());
                            Self::prove_at(child, &nibbles[1..], out)
                        }
                        None => false,
                    }
                }
            }
        }
    }

    /// Hierarchical snapshot of the trie for tree renderers
    pub fn snapshot(&self) -> SnapshotNode {
        snapshot::snapshot_node(&self.root)
    }

    /// Flat node/edge view of the trie for graph renderers
    pub fn graph(&self) -> TrieGraph {
        snapshot::build_graph(&self.root)
    }

    fn check_key(&self, key: &[u8]) -> TrieResult<()> {
        if key.is_empty() {
            return Err(TrieError::EmptyKey);
        }
        if key.len() > self.config.max_key_len {
            return Err(TrieError::KeyTooLong(key.len(), self.config.max_key_len));
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> TrieResult<()> {
        if value.len() > self.config.max_value_len {
            return Err(TrieError::ValueTooLong(
                value.len(),
                self.config.max_value_len,
            ));
        }
        Ok(())
    }
}

impl Default for MerklePatriciaTrie {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trie() {
        let trie = MerklePatriciaTrie::new();
        assert!(trie.is_empty());
        assert_eq!(trie.len(), 0);
        assert_eq!(trie.get(b"key").unwrap(), None);
        // Sentinel hash of the empty node
        assert_eq!(trie.root_hash(), Node::empty().hash());
    }

    #[test]
    fn test_insert_and_get() {
        let mut trie = MerklePatriciaTrie::new();

        trie.insert(b"key1", b"value1").unwrap();
        assert_eq!(trie.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(trie.get(b"key2").unwrap(), None);
        assert!(trie.contains(b"key1").unwrap());
        assert!(!trie.contains(b"key2").unwrap());
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_update_existing_key() {
        let mut trie = MerklePatriciaTrie::new();

        trie.insert(b"key1", b"value1").unwrap();
        let hash_before = trie.root_hash();

        trie.insert(b"key1", b"value2").unwrap();
        assert_eq!(trie.get(b"key1").unwrap(), Some(b"value2".to_vec()));
        assert_eq!(trie.len(), 1);
        assert_ne!(trie.root_hash(), hash_before);
    }

    #[test]
    fn test_prefix_keys() {
        let mut trie = MerklePatriciaTrie::new();

        // "a" is a strict prefix of "ab", which is a prefix of "abc"
        trie.insert(b"a", b"1").unwrap();
        trie.insert(b"ab", b"2").unwrap();
        trie.insert(b"abc", b"3").unwrap();

        assert_eq!(trie.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(trie.get(b"ab").unwrap(), Some(b"2".to_vec()));
        assert_eq!(trie.get(b"abc").unwrap(), Some(b"3".to_vec()));
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn test_delete() {
        let mut trie = MerklePatriciaTrie::new();

        trie.insert(b"key1", b"value1").unwrap();
        trie.insert(b"key2", b"value2").unwrap();

        assert!(trie.delete(b"key1").unwrap());
        assert_eq!(trie.get(b"key1").unwrap(), None);
        assert_eq!(trie.get(b"key2").unwrap(), Some(b"value2".to_vec()));

        // Deleting a missing key reports false and changes nothing
        let hash = trie.root_hash();
        assert!(!trie.delete(b"key3").unwrap());
        assert_eq!(trie.root_hash(), hash);
    }

    #[test]
    fn test_delete_all_restores_sentinel() {
        let mut trie = MerklePatriciaTrie::new();
        let sentinel = trie.root_hash();

        trie.insert(b"a", b"1").unwrap();
        trie.insert(b"b", b"2").unwrap();
        assert!(trie.delete(b"a").unwrap());
        assert!(trie.delete(b"b").unwrap());

        assert!(trie.is_empty());
        assert_eq!(trie.root_hash(), sentinel);
    }

    #[test]
    fn test_delete_prefix_key_keeps_longer_key() {
        let mut trie = MerklePatriciaTrie::new();

        trie.insert(b"a", b"1").unwrap();
        trie.insert(b"ab", b"2").unwrap();

        assert!(trie.delete(b"a").unwrap());
        assert_eq!(trie.get(b"a").unwrap(), None);
        assert_eq!(trie.get(b"ab").unwrap(), Some(b"2".to_vec()));

        // And the other way around
        trie.insert(b"a", b"1").unwrap();
        assert!(trie.delete(b"ab").unwrap());
        assert_eq!(trie.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(trie.get(b"ab").unwrap(), None);
    }

    #[test]
    fn test_root_hash_content_addressed() {
        let mut trie1 = MerklePatriciaTrie::new();
        let mut trie2 = MerklePatriciaTrie::new();

        trie1.insert(b"key1", b"value1").unwrap();
        trie1.insert(b"key2", b"value2").unwrap();

        trie2.insert(b"key2", b"value2").unwrap();
        trie2.insert(b"key1", b"value1").unwrap();

        // Same content, different insertion order
        assert_eq!(trie1.root_hash(), trie2.root_hash());

        trie2.insert(b"key3", b"value3").unwrap();
        assert_ne!(trie1.root_hash(), trie2.root_hash());
    }

    #[test]
    fn test_delete_is_insert_inverse() {
        let mut trie = MerklePatriciaTrie::new();
        trie.insert(b"cat", b"meow").unwrap();
        trie.insert(b"dog", b"bark").unwrap();
        let hash_before = trie.root_hash();

        trie.insert(b"cow", b"moo").unwrap();
        assert_ne!(trie.root_hash(), hash_before);

        assert!(trie.delete(b"cow").unwrap());
        assert_eq!(trie.root_hash(), hash_before);
    }

    #[test]
    fn test_cat_car_dog_scenario() {
        let mut trie = MerklePatriciaTrie::new();
        trie.insert(b"cat", b"meow").unwrap();
        trie.insert(b"car", b"vroom").unwrap();
        trie.insert(b"dog", b"bark").unwrap();

        assert_eq!(trie.get(b"cat").unwrap(), Some(b"meow".to_vec()));
        assert_eq!(trie.get(b"car").unwrap(), Some(b"vroom".to_vec()));
        assert_eq!(trie.get(b"dog").unwrap(), Some(b"bark".to_vec()));

        let hash_before_delete = trie.root_hash();
        assert!(trie.delete(b"car").unwrap());
        assert_ne!(trie.root_hash(), hash_before_delete);

        // The collapsed trie matches one built fresh with only cat and dog
        let mut fresh = MerklePatriciaTrie::new();
        fresh.insert(b"cat", b"meow").unwrap();
        fresh.insert(b"dog", b"bark").unwrap();
        assert_eq!(trie.root_hash(), fresh.root_hash());
    }

    #[test]
    fn test_entries_sorted_by_key() {
        let mut trie = MerklePatriciaTrie::new();
        trie.insert(b"dog", b"bark").unwrap();
        trie.insert(b"cat", b"meow").unwrap();
        trie.insert(b"car", b"vroom").unwrap();
        trie.insert(b"ca", b"prefix").unwrap();

        let entries = trie.entries();
        assert_eq!(
            entries,
            vec![
                (b"ca".to_vec(), b"prefix".to_vec()),
                (b"car".to_vec(), b"vroom".to_vec()),
                (b"cat".to_vec(), b"meow".to_vec()),
                (b"dog".to_vec(), b"bark".to_vec()),
            ]
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut trie = MerklePatriciaTrie::new();
        assert_eq!(trie.insert(b"", b"v"), Err(TrieError::EmptyKey));
        assert_eq!(trie.get(b""), Err(TrieError::EmptyKey));
        assert_eq!(trie.delete(b""), Err(TrieError::EmptyKey));
        assert_eq!(trie.generate_proof(b""), Err(TrieError::EmptyKey));
    }

    #[test]
    fn test_length_limits_leave_trie_unchanged() {
        let config = TrieConfig::new().with_max_key_len(4).with_max_value_len(8);
        let mut trie = MerklePatriciaTrie::with_config(config);
        trie.insert(b"ok", b"fine").unwrap();
        let hash = trie.root_hash();

        assert_eq!(
            trie.insert(b"toolong", b"v"),
            Err(TrieError::KeyTooLong(7, 4))
        );
        assert_eq!(
            trie.insert(b"k", b"waytoolongvalue"),
            Err(TrieError::ValueTooLong(15, 8))
        );
        assert_eq!(trie.root_hash(), hash);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_many_keys() {
        let mut trie = MerklePatriciaTrie::new();

        for i in 0..100u32 {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            trie.insert(key.as_bytes(), value.as_bytes()).unwrap();
        }
        assert_eq!(trie.len(), 100);

        for i in 0..100u32 {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            assert_eq!(
                trie.get(key.as_bytes()).unwrap(),
                Some(value.into_bytes())
            );
        }

        for i in 0..50u32 {
            let key = format!("key{}", i);
            assert!(trie.delete(key.as_bytes()).unwrap());
        }
        assert_eq!(trie.len(), 50);

        for i in 0..50u32 {
            let key = format!("key{}", i);
            assert_eq!(trie.get(key.as_bytes()).unwrap(), None);
        }
        for i in 50..100u32 {
            let key = format!("key{}", i);
            let value = format!("value{}", i);
            assert_eq!(
                trie.get(key.as_bytes()).unwrap(),
                Some(value.into_bytes())
            );
        }
    }
}
