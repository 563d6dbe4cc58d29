//! Nodes and the pool of nodes a campaign draws from.

use std::net::IpAddr;

use itertools::Itertools;

/// An addressable endpoint in the measured network.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialOrd,
    Ord,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    derive_more::FromStr,
    derive_more::From,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Node(IpAddr);

impl Node {
    /// Creates a node from its address.
    pub const fn new(addr: IpAddr) -> Self {
        Self(addr)
    }

    /// Returns the node's address.
    pub const fn addr(self) -> IpAddr {
        self.0
    }
}

/// Renders a path as a comma-separated list of nodes.
pub(crate) fn join(path: &[Node]) -> String {
    itertools::join(path, ",")
}

/// An ordered, non-empty sequence of nodes. Duplicate addresses are kept as distinct positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePool {
    nodes: Vec<Node>,
}

impl NodePool {
    /// Creates a node pool. This function returns an error if `nodes` is empty.
    pub fn new(nodes: Vec<Node>) -> Result<Self, NodePoolError> {
        if nodes.is_empty() {
            return Err(NodePoolError::Empty);
        }
        Ok(Self { nodes })
    }

    /// Returns the nodes in pool order.
    pub fn as_slice(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the number of distinct addresses in the pool.
    pub fn nr_distinct(&self) -> usize {
        self.nodes.iter().unique().count()
    }

    /// Every ordered pair of pool positions whose addresses differ.
    pub fn ordered_pairs(&self) -> impl Iterator<Item = (Node, Node)> + '_ {
        self.nodes
            .iter()
            .copied()
            .permutations(2)
            .filter_map(|pair| (pair[0] != pair[1]).then(|| (pair[0], pair[1])))
    }

    /// The nodes that may appear on a path between `src` and `dst`, in pool order.
    ///
    /// Neither endpoint appears in the result, and each address appears at most once.
    pub fn remaining(&self, src: Node, dst: Node) -> Vec<Node> {
        self.nodes
            .iter()
            .copied()
            .filter(|&n| n != src && n != dst)
            .unique()
            .collect()
    }

    delegate::delegate! {
        to self.nodes {
            /// Returns the number of positions in the pool.
            pub fn len(&self) -> usize;

            /// Always false; pools are never empty.
            pub fn is_empty(&self) -> bool;

            /// Returns an iterator over the pool in order.
            pub fn iter(&self) -> std::slice::Iter<'_, Node>;
        }
    }
}

/// Node pool error.
#[derive(Debug, thiserror::Error)]
pub enum NodePoolError {
    /// The pool has no nodes.
    #[error("node pool is empty")]
    Empty,
}
