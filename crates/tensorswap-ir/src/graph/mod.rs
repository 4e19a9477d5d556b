//! Dataflow graphs with data and control edges.
//!
//! A [`DataflowGraph`] owns its nodes and tensors. Every tensor is produced
//! by at most one node at a fixed output slot and read by any number of
//! nodes at fixed input slots. Control edges carry no data and only order
//! execution.
//!
//! The graph keeps reverse indices (consumers per tensor, control outputs
//! per node, node names) in sync with every mutation, so fan-out queries do
//! not scan the whole node list.

pub mod dot_export;
mod node;
mod tensor;
pub mod validation;

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

pub use dot_export::{export_to_dot, export_to_dot_with_options, DotExportOptions};
pub use node::GraphNode;
pub use tensor::{Outlet, TensorInfo, TensorShape};
pub use validation::{validate_graph, ValidationReport};

use crate::error::IrError;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphRepr", into = "GraphRepr")]
pub struct DataflowGraph {
    nodes: Vec<GraphNode>,
    tensors: Vec<TensorInfo>,
    /// Consumers of each tensor, sorted and deduplicated.
    consumers: Vec<Vec<usize>>,
    /// Nodes holding a control input on each node.
    control_outputs: Vec<Vec<usize>>,
    names: HashMap<String, usize>,
}

/// On-disk form of a graph; reverse indices are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct GraphRepr {
    #[serde(default)]
    tensors: Vec<TensorInfo>,
    #[serde(default)]
    nodes: Vec<GraphNode>,
}

impl From<DataflowGraph> for GraphRepr {
    fn from(graph: DataflowGraph) -> Self {
        GraphRepr {
            tensors: graph.tensors,
            nodes: graph.nodes,
        }
    }
}

impl TryFrom<GraphRepr> for DataflowGraph {
    type Error = IrError;

    fn try_from(repr: GraphRepr) -> Result<Self, IrError> {
        let mut graph = DataflowGraph::with_capacity(repr.tensors.len(), repr.nodes.len());
        let declared: Vec<Option<Outlet>> = repr.tensors.iter().map(|t| t.producer).collect();
        for tensor in repr.tensors {
            graph.add_tensor(tensor.name, tensor.shape);
        }

        // Control inputs may point forward in the node list, so they are
        // attached once every node exists.
        let mut controls = Vec::with_capacity(repr.nodes.len());
        for mut node in repr.nodes {
            controls.push(std::mem::take(&mut node.control_inputs));
            graph.add_node(node)?;
        }
        for (node_idx, control_inputs) in controls.into_iter().enumerate() {
            for control in control_inputs {
                graph.check_node(control)?;
                if control != node_idx && !graph.nodes[node_idx].control_inputs.contains(&control)
                {
                    graph.nodes[node_idx].control_inputs.push(control);
                    graph.control_outputs[control].push(node_idx);
                }
            }
        }

        for (tensor_idx, declared) in declared.into_iter().enumerate() {
            if let Some(outlet) = declared {
                if graph.tensors[tensor_idx].producer != Some(outlet) {
                    return Err(IrError::ProducerMismatch {
                        tensor: tensor_idx,
                        node: outlet.node,
                        slot: outlet.slot,
                    });
                }
            }
        }

        Ok(graph)
    }
}

impl PartialEq for DataflowGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.tensors == other.tensors
    }
}

impl Eq for DataflowGraph {}

impl DataflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(tensor_cap: usize, node_cap: usize) -> Self {
        DataflowGraph {
            nodes: Vec::with_capacity(node_cap),
            tensors: Vec::with_capacity(tensor_cap),
            consumers: Vec::with_capacity(tensor_cap),
            control_outputs: Vec::with_capacity(node_cap),
            names: HashMap::with_capacity(node_cap),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_tensors(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.tensors.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn tensors(&self) -> &[TensorInfo] {
        &self.tensors
    }

    pub fn node(&self, node_idx: usize) -> Option<&GraphNode> {
        self.nodes.get(node_idx)
    }

    pub fn tensor(&self, tensor_idx: usize) -> Option<&TensorInfo> {
        self.tensors.get(tensor_idx)
    }

    /// Look up a node by its fully qualified name.
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Add a tensor that no node produces yet.
    pub fn add_tensor(&mut self, name: impl Into<String>, shape: TensorShape) -> usize {
        let idx = self.tensors.len();
        self.tensors.push(TensorInfo::new(name, shape));
        self.consumers.push(Vec::new());
        idx
    }

    /// Add a node. Its output tensors must exist and must not have a producer.
    pub fn add_node(&mut self, mut node: GraphNode) -> Result<usize, IrError> {
        if let Some(&existing) = self.names.get(&node.name) {
            return Err(IrError::DuplicateNodeName {
                name: node.name,
                existing,
            });
        }
        let idx = self.nodes.len();

        for &input in &node.inputs {
            self.check_tensor(input)?;
        }
        let mut claimed = HashSet::new();
        for &output in &node.outputs {
            self.check_tensor(output)?;
            if let Some(producer) = self.tensors[output].producer {
                return Err(IrError::TensorAlreadyProduced {
                    tensor: output,
                    producer: producer.node,
                });
            }
            if !claimed.insert(output) {
                return Err(IrError::TensorAlreadyProduced {
                    tensor: output,
                    producer: idx,
                });
            }
        }
        for &control in &node.control_inputs {
            if control >= idx {
                return Err(IrError::NodeIndexOutOfBounds {
                    index: control,
                    max: idx.saturating_sub(1),
                });
            }
        }

        let mut seen = HashSet::new();
        node.control_inputs.retain(|c| seen.insert(*c));

        for (slot, &output) in node.outputs.iter().enumerate() {
            self.tensors[output].producer = Some(Outlet::new(idx, slot));
        }
        for &input in &node.inputs {
            insert_sorted(&mut self.consumers[input], idx);
        }
        for &control in &node.control_inputs {
            self.control_outputs[control].push(idx);
        }
        self.control_outputs.push(Vec::new());
        self.names.insert(node.name.clone(), idx);
        self.nodes.push(node);
        Ok(idx)
    }

    /// Add a node together with freshly created output tensors named
    /// `<name>:<slot>`.
    pub fn add_op(
        &mut self,
        name: impl Into<String>,
        op_type: impl Into<String>,
        inputs: Vec<usize>,
        output_shapes: Vec<TensorShape>,
    ) -> Result<usize, IrError> {
        let name = name.into();
        let first_new = self.tensors.len();
        let outputs = output_shapes
            .into_iter()
            .enumerate()
            .map(|(slot, shape)| self.add_tensor(format!("{}:{}", name, slot), shape))
            .collect();
        let node = GraphNode::new(name, op_type)
            .with_inputs(inputs)
            .with_outputs(outputs);

        match self.add_node(node) {
            Ok(idx) => Ok(idx),
            Err(e) => {
                self.tensors.truncate(first_new);
                self.consumers.truncate(first_new);
                Err(e)
            }
        }
    }

    /// Return `base` if no node uses it yet, otherwise `base_1`, `base_2`, ...
    pub fn unique_name(&self, base: &str) -> String {
        if !self.names.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|candidate| !self.names.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn producer(&self, tensor_idx: usize) -> Option<Outlet> {
        self.tensors.get(tensor_idx).and_then(|t| t.producer)
    }

    /// Nodes reading `tensor_idx`, in ascending index order.
    pub fn consumers(&self, tensor_idx: usize) -> &[usize] {
        self.consumers
            .get(tensor_idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Input slots of `node_idx` that read `tensor_idx`.
    pub fn consuming_slots(&self, node_idx: usize, tensor_idx: usize) -> Vec<usize> {
        self.nodes
            .get(node_idx)
            .map(|node| {
                node.inputs
                    .iter()
                    .enumerate()
                    .filter(|(_, &t)| t == tensor_idx)
                    .map(|(slot, _)| slot)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Producers of the node's inputs (data edges only).
    pub fn fanins(&self, node_idx: usize) -> Vec<usize> {
        let Some(node) = self.nodes.get(node_idx) else {
            return Vec::new();
        };
        node.inputs
            .iter()
            .filter_map(|&t| self.tensors[t].producer.map(|o| o.node))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Consumers of the node's outputs (data edges only).
    pub fn fanouts(&self, node_idx: usize) -> Vec<usize> {
        let Some(node) = self.nodes.get(node_idx) else {
            return Vec::new();
        };
        node.outputs
            .iter()
            .flat_map(|&t| self.consumers[t].iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn control_inputs(&self, node_idx: usize) -> &[usize] {
        self.nodes
            .get(node_idx)
            .map(|n| n.control_inputs.as_slice())
            .unwrap_or(&[])
    }

    pub fn control_outputs(&self, node_idx: usize) -> &[usize] {
        self.control_outputs
            .get(node_idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Data and control predecessors.
    pub fn predecessors(&self, node_idx: usize) -> Vec<usize> {
        let mut preds: BTreeSet<usize> = self.fanins(node_idx).into_iter().collect();
        preds.extend(self.control_inputs(node_idx).iter().copied());
        preds.into_iter().collect()
    }

    /// Data and control successors.
    pub fn successors(&self, node_idx: usize) -> Vec<usize> {
        let mut succs: BTreeSet<usize> = self.fanouts(node_idx).into_iter().collect();
        succs.extend(self.control_outputs(node_idx).iter().copied());
        succs.into_iter().collect()
    }

    /// Make input `slot` of `node_idx` read `tensor_idx` instead.
    pub fn replace_input(
        &mut self,
        node_idx: usize,
        slot: usize,
        tensor_idx: usize,
    ) -> Result<(), IrError> {
        self.check_node(node_idx)?;
        self.check_tensor(tensor_idx)?;
        let old = *self.nodes[node_idx]
            .inputs
            .get(slot)
            .ok_or(IrError::InputSlotOutOfBounds {
                node: node_idx,
                slot,
            })?;
        if old == tensor_idx {
            return Ok(());
        }

        self.nodes[node_idx].inputs[slot] = tensor_idx;
        if !self.nodes[node_idx].inputs.contains(&old) {
            self.consumers[old].retain(|&c| c != node_idx);
        }
        insert_sorted(&mut self.consumers[tensor_idx], node_idx);
        Ok(())
    }

    /// Make `node_idx` wait for `control_idx`.
    ///
    /// Returns `Ok(false)` and leaves the graph untouched when the edge
    /// already exists, is a self-edge, or would close a cycle.
    pub fn add_control_input(
        &mut self,
        node_idx: usize,
        control_idx: usize,
    ) -> Result<bool, IrError> {
        self.check_node(node_idx)?;
        self.check_node(control_idx)?;
        if node_idx == control_idx
            || self.nodes[node_idx].control_inputs.contains(&control_idx)
            || self.nodes[control_idx].control_inputs.contains(&node_idx)
            || self.reaches(node_idx, control_idx)
        {
            return Ok(false);
        }
        self.nodes[node_idx].control_inputs.push(control_idx);
        self.control_outputs[control_idx].push(node_idx);
        Ok(true)
    }

    /// Whether a path of data or control edges leads from `from` to `to`.
    pub fn reaches(&self, from: usize, to: usize) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            for next in self.successors(current) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Every node reachable from `node_idx` along data edges, `node_idx` included.
    pub fn forward_walk(&self, node_idx: usize) -> HashSet<usize> {
        self.walk_from(node_idx, Self::fanouts)
    }

    /// Every node reachable from `node_idx` along data or control edges,
    /// `node_idx` included.
    pub fn descendants(&self, node_idx: usize) -> HashSet<usize> {
        self.walk_from(node_idx, Self::successors)
    }

    fn walk_from(&self, node_idx: usize, next_of: fn(&Self, usize) -> Vec<usize>) -> HashSet<usize> {
        let mut reachable = HashSet::new();
        if node_idx >= self.nodes.len() {
            return reachable;
        }
        let mut queue = VecDeque::new();
        reachable.insert(node_idx);
        queue.push_back(node_idx);
        while let Some(current) = queue.pop_front() {
            for next in next_of(self, current) {
                if reachable.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        reachable
    }

    /// Structural validation; fails on the first problem found.
    pub fn validate(&self) -> Result<(), IrError> {
        validation::check_graph(self)
    }

    pub fn is_acyclic(&self) -> bool {
        validation::is_acyclic(self)
    }

    pub fn to_json(&self) -> Result<String, IrError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, IrError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, IrError> {
        Ok(serde_json::from_str(json)?)
    }

    fn check_node(&self, node_idx: usize) -> Result<(), IrError> {
        if node_idx >= self.nodes.len() {
            return Err(IrError::NodeIndexOutOfBounds {
                index: node_idx,
                max: self.nodes.len().saturating_sub(1),
            });
        }
        Ok(())
    }

    fn check_tensor(&self, tensor_idx: usize) -> Result<(), IrError> {
        if tensor_idx >= self.tensors.len() {
            return Err(IrError::TensorIndexOutOfBounds {
                index: tensor_idx,
                max: self.tensors.len().saturating_sub(1),
            });
        }
        Ok(())
    }
}

fn insert_sorted(list: &mut Vec<usize>, value: usize) {
    if let Err(pos) = list.binary_search(&value) {
        list.insert(pos, value);
    }
}
