//! # TensorSwap IR
//!
//! **Mutable dataflow graph representation for the TensorSwap rewriter**
//!
//! This crate provides the graph that the large-model-support engine in
//! `tensorswap-lms` queries and edits in place. It models a static
//! execution graph as it exists before it is handed to an executor:
//!
//! - **Nodes** ([`GraphNode`]): a qualified `/`-scoped name, an op type tag,
//!   input and output tensor slots, control predecessors, an optional
//!   device placement and a flag for nodes inside conditional branches.
//! - **Tensors** ([`TensorInfo`]): produced by exactly one node at a fixed
//!   output slot ([`Outlet`]) and read by any number of consumers; each
//!   carries a static [`TensorShape`] whose rank may be unknown.
//! - **Edges**: data edges are implied by tensor reads; control edges are
//!   explicit and ordering-only.
//!
//! ## Graph editing
//!
//! ```rust
//! use tensorswap_ir::{DataflowGraph, TensorShape};
//!
//! let mut graph = DataflowGraph::new();
//! let x = graph.add_op("x", "Placeholder", vec![], vec![TensorShape::known(&[32, 128])]).unwrap();
//! let x_out = graph.node(x).unwrap().outputs[0];
//! let relu = graph.add_op("relu", "Relu", vec![x_out], vec![TensorShape::known(&[32, 128])]).unwrap();
//!
//! assert_eq!(graph.fanouts(x), vec![relu]);
//! assert!(graph.validate().is_ok());
//! ```
//!
//! ## Serialization
//!
//! Graphs round-trip through JSON with [`DataflowGraph::to_json`] and
//! [`DataflowGraph::from_json`]; reverse indices are rebuilt on load.
//!
//! ## Visualization
//!
//! [`export_to_dot`] renders a graph for Graphviz, drawing control edges dashed.

mod error;
pub mod graph;

pub use error::IrError;
pub use graph::{
    export_to_dot, export_to_dot_with_options, validate_graph, DataflowGraph, DotExportOptions,
    GraphNode, Outlet, TensorInfo, TensorShape, ValidationReport,
};
