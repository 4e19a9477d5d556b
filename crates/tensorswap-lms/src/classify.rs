//! Scope- and type-based node classification.

use std::collections::{BTreeSet, HashSet};

use tensorswap_ir::DataflowGraph;

use crate::config::LmsConfig;

/// Op types whose outputs are never swapped: constants and pass-throughs,
/// graph inputs, parameter variables and their read/assign/lifecycle ops,
/// and bulk-fill ops.
pub const STRUCTURAL_OP_TYPES: &[&str] = &[
    // input data
    "Const",
    "Identity",
    "Placeholder",
    "PlaceholderWithDefault",
    // learnable parameters
    "VariableV2",
    "Read",
    "Assign",
    "VarHandleOp",
    // variable ops
    "VarIsInitializedOp",
    "VariableShape",
    "ReadVariableOp",
    "AssignVariableOp",
    "AssignAddVariableOp",
    "AssignSubVariableOp",
    "ResourceGather",
    "ResourceScatterAdd",
    "ResourceScatterSub",
    "ResourceScatterMul",
    "ResourceScatterDiv",
    "ResourceScatterMin",
    "ResourceScatterMax",
    "ResourceScatterUpdate",
    "ResourceScatterNdUpdate",
    "ResourceScatterNdAdd",
    // data filling
    "Fill",
    "Range",
    "RandomUniform",
];

/// Nodes among `nodes` that live in any of `scopes` or whose op type is in `types`.
pub fn classify(
    graph: &DataflowGraph,
    nodes: impl IntoIterator<Item = usize>,
    scopes: &BTreeSet<String>,
    types: &BTreeSet<String>,
) -> HashSet<usize> {
    nodes
        .into_iter()
        .filter(|&idx| {
            graph.node(idx).is_some_and(|node| {
                types.contains(&node.op_type) || scopes.iter().any(|s| node.in_scope(s))
            })
        })
        .collect()
}

/// Excluded and included node sets for one rewrite.
///
/// Exclusion always wins. An empty included set admits every node that
/// is not excluded.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    excluded: HashSet<usize>,
    included: HashSet<usize>,
}

impl NodeFilter {
    /// Classify every node of `graph` according to `config`, with
    /// [`STRUCTURAL_OP_TYPES`] always added to the excluded types.
    pub fn new(graph: &DataflowGraph, config: &LmsConfig) -> Self {
        let mut excl_types = config.excl_types.clone();
        excl_types.extend(STRUCTURAL_OP_TYPES.iter().map(|t| t.to_string()));

        let all = 0..graph.num_nodes();
        NodeFilter {
            excluded: classify(graph, all.clone(), &config.excl_scopes, &excl_types),
            included: classify(graph, all, &config.incl_scopes, &config.incl_types),
        }
    }

    pub fn is_excluded(&self, node_idx: usize) -> bool {
        self.excluded.contains(&node_idx)
    }

    /// Permanently exclude a node, e.g. one inserted by the rewrite.
    pub fn exclude(&mut self, node_idx: usize) {
        self.excluded.insert(node_idx);
    }

    pub fn inclusion_active(&self) -> bool {
        !self.included.is_empty()
    }

    /// Whether the node may have its outputs swapped.
    pub fn admits(&self, node_idx: usize) -> bool {
        !self.is_excluded(node_idx)
            && (!self.inclusion_active() || self.included.contains(&node_idx))
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn included_count(&self) -> usize {
        self.included.len()
    }
}
