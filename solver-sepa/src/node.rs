//! Search-tree information needed by the separation layer.

/// The node currently being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    /// Unique node identifier.
    pub id: u64,

    /// Depth in the tree (0 for root).
    pub depth: usize,

    /// Whether the node's LP relaxation has been solved.
    pub lp_processed: bool,
}

impl NodeInfo {
    /// The root node with an unsolved LP.
    pub fn root() -> Self {
        Self {
            id: 0,
            depth: 0,
            lp_processed: false,
        }
    }

    /// A node at the given depth.
    pub fn at_depth(id: u64, depth: usize) -> Self {
        Self {
            id,
            depth,
            lp_processed: false,
        }
    }

    /// Mark the node LP as solved.
    pub fn with_lp_processed(mut self) -> Self {
        self.lp_processed = true;
        self
    }

    /// Whether this is the root node.
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_node() {
        let root = NodeInfo::root();
        assert!(root.is_root());
        assert!(!root.lp_processed);
        assert!(root.with_lp_processed().lp_processed);
    }

    #[test]
    fn test_child_node() {
        let node = NodeInfo::at_depth(7, 2);
        assert!(!node.is_root());
        assert_eq!(node.id, 7);
    }
}
