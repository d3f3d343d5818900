//! Serialized views of the trie for visualization front-ends
//!
//! External collaborators never hold references into the node graph; they
//! receive one of two serializable views instead:
//!
//! - [`SnapshotNode`]: a hierarchical description (node kind, partial key
//!   segment, stored value, children) for tree renderers
//! - [`TrieGraph`]: a flat node/edge list with stable path-derived ids for
//!   generic graph renderers
//!
//! Hashes and values cross this boundary as lowercase hex strings.

use serde::{Deserialize, Serialize};

use crate::trie::nibble::nibbles_to_hex;
use crate::trie::node::Node;

/// Hierarchical view of a trie node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SnapshotNode {
    /// The empty trie
    Empty,

    /// Terminal node
    Leaf {
        /// Remaining key nibbles as hex characters
        path: String,
        /// Stored value as hex
        value: String,
        /// Content hash as 64 hex characters
        hash: String,
    },

    /// Path-compression node
    Extension {
        /// Shared key nibbles as hex characters
        path: String,
        /// Content hash as 64 hex characters
        hash: String,
        /// The single child
        child: Box<SnapshotNode>,
    },

    /// Fan-out node
    Branch {
        /// Content hash as 64 hex characters
        hash: String,
        /// Value stored at this branch, as hex, if any
        value: Option<String>,
        /// Live children with their slot nibbles
        children: Vec<SnapshotChild>,
    },
}

/// A live branch child and the nibble slot it occupies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotChild {
    /// Branch slot index (0-15)
    pub nibble: u8,
    /// The child subtree
    pub node: SnapshotNode,
}

/// Flat node/edge view of the trie
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieGraph {
    /// All nodes, root first
    pub nodes: Vec<GraphNode>,
    /// Parent-to-child edges
    pub edges: Vec<GraphEdge>,
}

/// A node in the flat graph view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable id derived from the node's position ("root", "root/6", ...)
    pub id: String,
    /// Human-readable label
    pub label: String,
}

/// A directed edge in the flat graph view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Parent node id
    pub from: String,
    /// Child node id
    pub to: String,
}

/// Build the hierarchical view of a subtree
pub(crate) fn snapshot_node(node: &Node) -> SnapshotNode {
    match node {
        Node::Empty => SnapshotNode::Empty,

        Node::Leaf { path, value } => SnapshotNode::Leaf {
            path: nibbles_to_hex(path),
            value: hex::encode(value),
            hash: node.hash_hex(),
        },

        Node::Extension { path, child } => SnapshotNode::Extension {
            path: nibbles_to_hex(path),
            hash: node.hash_hex(),
            child: Box::new(snapshot_node(child)),
        },

        Node::Branch { children, value } => SnapshotNode::Branch {
            hash: node.hash_hex(),
            value: value.as_ref().map(hex::encode),
            children: children
                .iter()
                .enumerate()
                .filter_map(|(idx, child)| {
                    child.as_ref().map(|child| SnapshotChild {
                        nibble: idx as u8,
                        node: snapshot_node(child),
                    })
                })
                .collect(),
        },
    }
}

/// Build the flat graph view of a trie
pub(crate) fn build_graph(root: &Node) -> TrieGraph {
    let mut graph = TrieGraph::default();
    graph.nodes.push(GraphNode {
        id: "root".to_string(),
        label: label_of(root),
    });
    walk(root, "root", &mut graph);
    graph
}

fn label_of(node: &Node) -> String {
    match node {
        Node::Empty => "empty".to_string(),
        Node::Leaf { path, .. } => format!("leaf:{}", nibbles_to_hex(path)),
        Node::Extension { path, .. } => format!("ext:{}", nibbles_to_hex(path)),
        Node::Branch { .. } => "branch".to_string(),
    }
}

fn add_child(graph: &mut TrieGraph, parent_id: &str, child_id: String, label: String) {
    graph.nodes.push(GraphNode {
        id: child_id.clone(),
        label,
    });
    graph.edges.push(GraphEdge {
        from: parent_id.to_string(),
        to: child_id,
    });
}

fn add_value(graph: &mut TrieGraph, node_id: &str, value: &[u8]) {
    let value_id = format!("{}:value", node_id);
    add_child(graph, node_id, value_id, hex::encode(value));
}

fn walk(node: &Node, id: &str, graph: &mut TrieGraph) {
    match node {
        Node::Empty => {}

        Node::Leaf { value, .. } => {
            add_value(graph, id, value);
        }

        Node::Extension { path, child } => {
            let child_id = format!("{}/{}", id, nibbles_to_hex(path));
            add_child(graph, id, child_id.clone(), label_of(child));
            walk(child, &child_id, graph);
        }

        Node::Branch { children, value } => {
            if let Some(v) = value {
                add_value(graph, id, v);
            }
            for (idx, child) in children.iter().enumerate() {
                if let Some(child) = child {
                    let child_id = format!("{}/{:x}", id, idx);
                    add_child(graph, id, child_id.clone(), label_of(child));
                    walk(child, &child_id, graph);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::mpt::MerklePatriciaTrie;

    #[test]
    fn test_empty_snapshot() {
        let trie = MerklePatriciaTrie::new();
        assert_eq!(trie.snapshot(), SnapshotNode::Empty);

        let graph = trie.graph();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, "root");
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_single_leaf_snapshot() {
        let mut trie = MerklePatriciaTrie::new();
        trie.insert(b"cat", b"meow").unwrap();

        match trie.snapshot() {
            SnapshotNode::Leaf { path, value, hash } => {
                // "cat" is 0x636174, six nibbles
                assert_eq!(path, "636174");
                assert_eq!(value, hex::encode(b"meow"));
                assert_eq!(hash, trie.root_hash_hex());
            }
            other => panic!("expected leaf snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_split_snapshot_shape() {
        let mut trie = MerklePatriciaTrie::new();
        trie.insert(b"cat", b"meow").unwrap();
        trie.insert(b"car", b"vroom").unwrap();

        // cat/car share the nibbles 63617 and diverge on the final nibble
        match trie.snapshot() {
            SnapshotNode::Extension { path, child, .. } => {
                assert_eq!(path, "63617");
                match *child {
                    SnapshotNode::Branch {
                        children, value, ..
                    } => {
                        assert!(value.is_none());
                        let slots: Vec<u8> = children.iter().map(|c| c.nibble).collect();
                        assert_eq!(slots, vec![2, 4]);
                    }
                    other => panic!("expected branch under extension, got {:?}", other),
                }
            }
            other => panic!("expected extension snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_graph_ids_are_unique() {
        let mut trie = MerklePatriciaTrie::new();
        trie.insert(b"cat", b"meow").unwrap();
        trie.insert(b"car", b"vroom").unwrap();
        trie.insert(b"dog", b"bark").unwrap();

        let graph = trie.graph();
        let mut ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);

        // Every edge endpoint refers to a declared node
        for edge in &graph.edges {
            assert!(graph.nodes.iter().any(|n| n.id == edge.from));
            assert!(graph.nodes.iter().any(|n| n.id == edge.to));
        }

        // One value node per stored value
        let value_nodes = graph
            .nodes
            .iter()
            .filter(|n| n.id.ends_with(":value"))
            .count();
        assert_eq!(value_nodes, 3);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let mut trie = MerklePatriciaTrie::new();
        trie.insert(b"cat", b"meow").unwrap();
        trie.insert(b"car", b"vroom").unwrap();

        let json = serde_json::to_value(trie.snapshot()).unwrap();
        assert_eq!(json["kind"], "extension");
        assert_eq!(json["child"]["kind"], "branch");

        let graph_json = serde_json::to_value(trie.graph()).unwrap();
        assert!(graph_json["nodes"].as_array().unwrap().len() > 1);
        assert_eq!(graph_json["nodes"][0]["id"], "root");
    }
}
