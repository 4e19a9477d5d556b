//! Operation nodes in the dataflow graph.

use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Fully qualified name, `/`-separated by name scope (e.g. `encoder/layer_0/matmul`).
    pub name: String,
    /// Operation type tag (e.g. `MatMul`, `Const`, `Identity`).
    pub op_type: String,
    /// Tensors read by this node, one per input slot.
    #[serde(default)]
    pub inputs: Vec<usize>,
    /// Tensors written by this node, one per output slot.
    #[serde(default)]
    pub outputs: Vec<usize>,
    /// Nodes that must complete before this node starts, without passing data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub control_inputs: Vec<usize>,
    /// Placement tag such as `/gpu:0` or `/cpu:0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Set for nodes inside a conditional-branch construct, whose execution
    /// is not guaranteed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub in_conditional: bool,
}

impl GraphNode {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        GraphNode {
            name: name.into(),
            op_type: op_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            control_inputs: Vec::new(),
            device: None,
            in_conditional: false,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<usize>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<usize>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_control_inputs(mut self, control_inputs: Vec<usize>) -> Self {
        self.control_inputs = control_inputs;
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Mark the node as living inside a conditional branch.
    pub fn in_conditional(mut self) -> Self {
        self.in_conditional = true;
        self
    }

    /// Whether the node lives in name scope `scope`.
    ///
    /// A scope matches the node carrying exactly that name and every node
    /// nested below it; `enc` matches `enc` and `enc/matmul` but not
    /// `encoder/matmul`. A trailing `/` on the scope is ignored.
    pub fn in_scope(&self, scope: &str) -> bool {
        let scope = scope.strip_suffix('/').unwrap_or(scope);
        if scope.is_empty() {
            return false;
        }
        match self.name.strip_prefix(scope) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
