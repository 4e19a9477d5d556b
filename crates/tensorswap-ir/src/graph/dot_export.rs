//! DOT format export for graph visualization.
//!
//! Operations become DOT nodes, tensors become labelled data edges, and
//! control edges are drawn dashed.
//!
//! # Example
//!
//! ```
//! use tensorswap_ir::{export_to_dot, DataflowGraph, TensorShape};
//!
//! let mut graph = DataflowGraph::new();
//! let x = graph.add_op("x", "Placeholder", vec![], vec![TensorShape::known(&[4, 4])]).unwrap();
//! let x_out = graph.node(x).unwrap().outputs[0];
//! graph.add_op("relu", "Relu", vec![x_out], vec![TensorShape::known(&[4, 4])]).unwrap();
//!
//! let dot = export_to_dot(&graph);
//! assert!(dot.contains("digraph DataflowGraph"));
//! assert!(dot.contains("Relu"));
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

use crate::graph::{DataflowGraph, GraphNode};

/// Options for DOT export customization.
#[derive(Debug, Clone, Default)]
pub struct DotExportOptions {
    /// Show node indices in labels (e.g. "op_3")
    pub show_node_ids: bool,
    /// Label data edges with tensor shapes
    pub show_shapes: bool,
    /// Show device placement in node labels
    pub show_devices: bool,
    /// Group nodes into one cluster per device
    pub cluster_by_device: bool,
    /// Use horizontal (left-to-right) layout instead of vertical
    pub horizontal_layout: bool,
    /// Highlight specific nodes (by index)
    pub highlight_nodes: Vec<usize>,
}

/// Export a [`DataflowGraph`] to DOT format with default options.
pub fn export_to_dot(graph: &DataflowGraph) -> String {
    export_to_dot_with_options(graph, &DotExportOptions::default())
}

/// Export a [`DataflowGraph`] to DOT format with custom options.
///
/// ```
/// use tensorswap_ir::{export_to_dot_with_options, DataflowGraph, DotExportOptions};
///
/// let graph = DataflowGraph::new();
/// let options = DotExportOptions {
///     horizontal_layout: true,
///     ..Default::default()
/// };
/// assert!(export_to_dot_with_options(&graph, &options).contains("rankdir=LR"));
/// ```
pub fn export_to_dot_with_options(graph: &DataflowGraph, options: &DotExportOptions) -> String {
    let mut output = String::new();
    export_to_dot_writer_with_options(graph, &mut output, options)
        .expect("String write should not fail");
    output
}

/// Export to DOT format with options, writing to a generic writer.
pub fn export_to_dot_writer_with_options<W: FmtWrite>(
    graph: &DataflowGraph,
    writer: &mut W,
    options: &DotExportOptions,
) -> std::fmt::Result {
    writeln!(writer, "digraph DataflowGraph {{")?;
    writeln!(writer, "  graph [fontname=\"Helvetica\", fontsize=10];")?;
    writeln!(writer, "  node [fontname=\"Helvetica\", fontsize=10];")?;
    writeln!(writer, "  edge [fontname=\"Helvetica\", fontsize=9];")?;
    if options.horizontal_layout {
        writeln!(writer, "  rankdir=LR;")?;
    }
    writeln!(writer)?;

    if options.cluster_by_device {
        let mut clusters: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, node) in graph.nodes().iter().enumerate() {
            clusters
                .entry(node.device.as_deref().unwrap_or("default"))
                .or_default()
                .push(idx);
        }
        for (cluster_idx, (device, members)) in clusters.iter().enumerate() {
            writeln!(writer, "  subgraph cluster_{} {{", cluster_idx)?;
            writeln!(writer, "    label=\"{}\";", escape_label(device))?;
            writeln!(writer, "    style=dashed;")?;
            for &idx in members {
                write_operation_node(writer, &graph.nodes()[idx], idx, options)?;
            }
            writeln!(writer, "  }}")?;
        }
    } else {
        for (idx, node) in graph.nodes().iter().enumerate() {
            write_operation_node(writer, node, idx, options)?;
        }
    }
    writeln!(writer)?;

    for (idx, tensor) in graph.tensors().iter().enumerate() {
        let Some(producer) = tensor.producer else {
            continue;
        };
        for &consumer in graph.consumers(idx) {
            if options.show_shapes {
                writeln!(
                    writer,
                    "  op_{} -> op_{} [label=\"{}\"];",
                    producer.node,
                    consumer,
                    escape_label(&tensor.shape.to_string())
                )?;
            } else {
                writeln!(writer, "  op_{} -> op_{};", producer.node, consumer)?;
            }
        }
    }

    for (idx, node) in graph.nodes().iter().enumerate() {
        for &control in &node.control_inputs {
            writeln!(
                writer,
                "  op_{} -> op_{} [style=dashed, color=gray40];",
                control, idx
            )?;
        }
    }

    writeln!(writer, "}}")
}

fn write_operation_node<W: FmtWrite>(
    writer: &mut W,
    node: &GraphNode,
    idx: usize,
    options: &DotExportOptions,
) -> std::fmt::Result {
    let mut label = format!("{}\\n{}", escape_label(&node.name), escape_label(&node.op_type));
    if options.show_devices {
        if let Some(device) = &node.device {
            label.push_str(&format!("\\n@{}", escape_label(device)));
        }
    }
    if options.show_node_ids {
        label.push_str(&format!("\\n[op_{}]", idx));
    }

    let color = if options.highlight_nodes.contains(&idx) {
        "orange"
    } else if node.in_conditional {
        "lightpink"
    } else {
        "lightcyan"
    };

    writeln!(
        writer,
        "  op_{} [label=\"{}\", shape=ellipse, style=filled, fillcolor={}];",
        idx, label, color
    )
}

/// Escape special characters in DOT labels.
fn escape_label(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
