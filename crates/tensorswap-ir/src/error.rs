//! Error types for the IR.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("Node index {index} out of bounds (max: {max})")]
    NodeIndexOutOfBounds { index: usize, max: usize },
    #[error("Tensor index {index} out of bounds (max: {max})")]
    TensorIndexOutOfBounds { index: usize, max: usize },
    #[error("Node {node} has no input slot {slot}")]
    InputSlotOutOfBounds { node: usize, slot: usize },
    #[error("Node name '{name}' is already used by node {existing}")]
    DuplicateNodeName { name: String, existing: usize },
    #[error("Tensor {tensor} is already produced by node {producer}")]
    TensorAlreadyProduced { tensor: usize, producer: usize },
    #[error("Tensor {tensor} records producer ({node}, {slot}) but that node does not output it")]
    ProducerMismatch {
        tensor: usize,
        node: usize,
        slot: usize,
    },
    #[error("Graph contains a cycle and cannot be topologically sorted")]
    CyclicGraph,
    #[error("Failed to (de)serialize graph: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IrError {
    fn from(err: serde_json::Error) -> Self {
        IrError::Serialization(err.to_string())
    }
}
