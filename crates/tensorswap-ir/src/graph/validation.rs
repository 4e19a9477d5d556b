//! Graph validation utilities.
//!
//! [`validate_graph`] collects every problem it finds into a
//! [`ValidationReport`]; [`DataflowGraph::validate`] stops at the first
//! fatal one and reports it as an [`IrError`].

use std::collections::VecDeque;

use crate::error::IrError;
use crate::graph::DataflowGraph;

/// Result of graph validation with detailed diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Total number of validation checks performed
    pub checks_performed: usize,
    /// List of errors found
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues)
    pub warnings: Vec<ValidationWarning>,
    /// Graph statistics
    pub stats: GraphValidationStats,
}

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
    pub node_index: Option<usize>,
    pub tensor_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Tensor's recorded producer does not list it as an output
    ProducerMismatch,
    /// Cycle through data or control edges
    CyclicDependency,
}

/// Validation warning (non-fatal issue).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub kind: ValidationWarningKind,
    pub message: String,
    pub node_index: Option<usize>,
    pub tensor_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationWarningKind {
    /// Tensor is read but no node produces it
    UnproducedTensor,
    /// Tensor is produced but never read
    UnusedTensor,
    /// Node has no data or control edges at all
    IsolatedNode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphValidationStats {
    pub total_tensors: usize,
    pub total_nodes: usize,
    pub data_edges: usize,
    pub control_edges: usize,
    pub conditional_nodes: usize,
    pub unused_tensors: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_issues(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Validation: {} errors, {} warnings ({} checks)",
            self.errors.len(),
            self.warnings.len(),
            self.checks_performed
        )
    }
}

/// Validate a [`DataflowGraph`] with every available check.
///
/// # Example
///
/// ```
/// use tensorswap_ir::{validate_graph, DataflowGraph, TensorShape};
///
/// let mut graph = DataflowGraph::new();
/// let x = graph.add_op("x", "Placeholder", vec![], vec![TensorShape::known(&[8, 8])]).unwrap();
/// let x_out = graph.node(x).unwrap().outputs[0];
/// graph.add_op("relu", "Relu", vec![x_out], vec![TensorShape::known(&[8, 8])]).unwrap();
///
/// let report = validate_graph(&graph);
/// assert!(report.is_valid());
/// ```
pub fn validate_graph(graph: &DataflowGraph) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.stats.total_tensors = graph.num_tensors();
    report.stats.total_nodes = graph.num_nodes();

    report.checks_performed += 1;
    check_producers(graph, &mut report);

    report.checks_performed += 1;
    check_tensor_usage(graph, &mut report);

    report.checks_performed += 1;
    check_isolated_nodes(graph, &mut report);

    report.checks_performed += 1;
    if !is_acyclic(graph) {
        report.errors.push(ValidationError {
            kind: ValidationErrorKind::CyclicDependency,
            message: "Graph contains a cycle through data or control edges".to_string(),
            node_index: None,
            tensor_index: None,
        });
    }

    report
}

pub(crate) fn check_graph(graph: &DataflowGraph) -> Result<(), IrError> {
    for (tensor_idx, tensor) in graph.tensors().iter().enumerate() {
        if let Some(outlet) = tensor.producer {
            let consistent = graph
                .node(outlet.node)
                .and_then(|n| n.outputs.get(outlet.slot))
                .is_some_and(|&t| t == tensor_idx);
            if !consistent {
                return Err(IrError::ProducerMismatch {
                    tensor: tensor_idx,
                    node: outlet.node,
                    slot: outlet.slot,
                });
            }
        }
    }
    if !is_acyclic(graph) {
        return Err(IrError::CyclicGraph);
    }
    Ok(())
}

/// Kahn's algorithm over data and control edges.
pub(crate) fn is_acyclic(graph: &DataflowGraph) -> bool {
    let n = graph.num_nodes();
    let mut in_degree: Vec<usize> = (0..n).map(|i| graph.predecessors(i).len()).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut visited = 0;

    while let Some(node) = queue.pop_front() {
        visited += 1;
        for next in graph.successors(node) {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    visited == n
}

fn check_producers(graph: &DataflowGraph, report: &mut ValidationReport) {
    for (tensor_idx, tensor) in graph.tensors().iter().enumerate() {
        let Some(outlet) = tensor.producer else {
            continue;
        };
        let consistent = graph
            .node(outlet.node)
            .and_then(|n| n.outputs.get(outlet.slot))
            .is_some_and(|&t| t == tensor_idx);
        if !consistent {
            report.errors.push(ValidationError {
                kind: ValidationErrorKind::ProducerMismatch,
                message: format!(
                    "Tensor {} '{}' claims producer ({}, {})",
                    tensor_idx, tensor.name, outlet.node, outlet.slot
                ),
                node_index: Some(outlet.node),
                tensor_index: Some(tensor_idx),
            });
        }
    }
}

fn check_tensor_usage(graph: &DataflowGraph, report: &mut ValidationReport) {
    for (tensor_idx, tensor) in graph.tensors().iter().enumerate() {
        let consumers = graph.consumers(tensor_idx);
        report.stats.data_edges += consumers.len();

        if tensor.producer.is_none() && !consumers.is_empty() {
            report.warnings.push(ValidationWarning {
                kind: ValidationWarningKind::UnproducedTensor,
                message: format!(
                    "Tensor {} '{}' is consumed but never produced",
                    tensor_idx, tensor.name
                ),
                node_index: None,
                tensor_index: Some(tensor_idx),
            });
        }
        if tensor.producer.is_some() && consumers.is_empty() {
            report.stats.unused_tensors += 1;
            report.warnings.push(ValidationWarning {
                kind: ValidationWarningKind::UnusedTensor,
                message: format!(
                    "Tensor {} '{}' is produced but never consumed",
                    tensor_idx, tensor.name
                ),
                node_index: None,
                tensor_index: Some(tensor_idx),
            });
        }
    }
}

fn check_isolated_nodes(graph: &DataflowGraph, report: &mut ValidationReport) {
    for (node_idx, node) in graph.nodes().iter().enumerate() {
        report.stats.control_edges += node.control_inputs.len();
        if node.in_conditional {
            report.stats.conditional_nodes += 1;
        }
        if graph.predecessors(node_idx).is_empty() && graph.successors(node_idx).is_empty() {
            report.warnings.push(ValidationWarning {
                kind: ValidationWarningKind::IsolatedNode,
                message: format!("Node {} '{}' has no edges", node_idx, node.name),
                node_index: Some(node_idx),
                tensor_index: None,
            });
        }
    }
}
