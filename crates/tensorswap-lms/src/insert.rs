//! Swap-out / swap-in node insertion.
//!
//! For one swapped tensor the rewrite looks like this:
//!
//! ```text
//! Before:
//!   (producer) -> |t| -> (consumer_a), (consumer_b)
//!
//! After:
//!   (producer) -> |t| -> (swapout) -> |t'| -> (swapin_0) -> |t''| -> (consumer_a)
//!                                          \-> (swapin_1) -> |t'''| -> (consumer_b)
//! ```
//!
//! One swap-out per tensor, one swap-in per consumer band. Both are
//! `Identity` nodes placed on the offload device.

use serde::Serialize;
use tensorswap_ir::{DataflowGraph, GraphNode, IrError};

use crate::grouping::ConsumerBand;

/// Op type given to inserted swap nodes.
pub const SWAP_OP_TYPE: &str = "Identity";

/// Records that `dest_op`'s read of a tensor produced by `src_op` now goes
/// through `swapin_op`. `dest_op` is the earliest consumer of the band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RelocationTriple {
    pub src_op: usize,
    pub dest_op: usize,
    pub swapin_op: usize,
}

/// Nodes created for one swapped tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub swapout_op: usize,
    /// `(anchor consumer, swap-in)` per band, in band order.
    pub swapins: Vec<(usize, usize)>,
}

impl Insertion {
    pub fn triples(&self, src_op: usize) -> impl Iterator<Item = RelocationTriple> + '_ {
        self.swapins
            .iter()
            .map(move |&(dest_op, swapin_op)| RelocationTriple {
                src_op,
                dest_op,
                swapin_op,
            })
    }
}

/// Route every band of consumers of `tensor_idx` through host memory.
pub fn insert_for_tensor(
    graph: &mut DataflowGraph,
    producer: usize,
    tensor_idx: usize,
    bands: &[ConsumerBand],
    device: &str,
) -> Result<Insertion, IrError> {
    let tensor = graph
        .tensor(tensor_idx)
        .cloned()
        .ok_or(IrError::TensorIndexOutOfBounds {
            index: tensor_idx,
            max: graph.num_tensors().saturating_sub(1),
        })?;
    let suffix = tensor.name.replace(['/', ':'], "_");

    let swapout_op = add_identity(
        graph,
        &format!("lms/swapout_{}", suffix),
        tensor_idx,
        device,
    )?;
    graph.add_control_input(swapout_op, producer)?;
    let swapped = graph.node(swapout_op).map(|n| n.outputs[0]).unwrap_or(tensor_idx);

    let mut swapins = Vec::with_capacity(bands.len());
    for band in bands.iter().filter(|b| !b.is_empty()) {
        let swapin_op = add_identity(graph, &format!("lms/swapin_{}", suffix), swapped, device)?;
        let restored = graph.node(swapin_op).map(|n| n.outputs[0]).unwrap_or(swapped);

        for consumer in band.nodes() {
            for slot in graph.consuming_slots(consumer, tensor_idx) {
                graph.replace_input(consumer, slot, restored)?;
            }
        }
        swapins.push((band.anchor().0, swapin_op));
    }

    Ok(Insertion {
        swapout_op,
        swapins,
    })
}

/// Add an identity node on `device` reading `input`, with one output of the same shape.
fn add_identity(
    graph: &mut DataflowGraph,
    base_name: &str,
    input: usize,
    device: &str,
) -> Result<usize, IrError> {
    let name = graph.unique_name(base_name);
    let shape = graph
        .tensor(input)
        .map(|t| t.shape.clone())
        .unwrap_or_default();
    let output = graph.add_tensor(format!("{}:0", name), shape);
    graph.add_node(
        GraphNode::new(name, SWAP_OP_TYPE)
            .with_inputs(vec![input])
            .with_outputs(vec![output])
            .with_device(device),
    )
}
