//! Swap candidate selection.
//!
//! A tensor is a swap candidate when its rank is known and greater than
//! one, and at least one of its consumers runs more than
//! `swapout_threshold` ranks after the producer. Scalars and vectors are
//! never swapped: their transfer costs more than they occupy.

use tensorswap_ir::{DataflowGraph, TensorShape};

use crate::topo::TopoOrder;

/// An output tensor of a producer together with its distant consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCandidate {
    pub tensor: usize,
    /// `(consumer, rank)` pairs, ascending by consumer index.
    pub consumers: Vec<(usize, usize)>,
}

/// Whether a tensor of this shape may be swapped at all.
pub fn is_swappable_shape(shape: &TensorShape) -> bool {
    matches!(shape.ndims(), Some(ndims) if ndims > 1)
}

/// Consumers of `tensor_idx` more than `threshold` ranks after `producer_rank`.
pub fn distant_consumers(
    graph: &DataflowGraph,
    topo: &TopoOrder,
    tensor_idx: usize,
    producer_rank: usize,
    threshold: usize,
) -> Vec<(usize, usize)> {
    graph
        .consumers(tensor_idx)
        .iter()
        .filter_map(|&consumer| {
            let rank = topo.order_of(consumer)?;
            let distance = rank.checked_sub(producer_rank)?;
            (distance > threshold).then_some((consumer, rank))
        })
        .collect()
}

/// Swap candidates among the outputs of `producer`, in output-slot order.
///
/// Returns nothing for a producer without a rank.
pub fn select_candidates(
    graph: &DataflowGraph,
    topo: &TopoOrder,
    producer: usize,
    threshold: usize,
) -> Vec<SwapCandidate> {
    let (Some(node), Some(producer_rank)) = (graph.node(producer), topo.order_of(producer)) else {
        return Vec::new();
    };

    node.outputs
        .iter()
        .filter(|&&tensor| {
            graph
                .tensor(tensor)
                .is_some_and(|t| is_swappable_shape(&t.shape))
        })
        .filter_map(|&tensor| {
            let consumers = distant_consumers(graph, topo, tensor, producer_rank, threshold);
            (!consumers.is_empty()).then_some(SwapCandidate { tensor, consumers })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Chain `n0 -> n1 -> ... -> n{len-1}`, with `n0` emitting one extra
    /// tensor of `shape` read by every node in `readers`.
    fn chain_with_side_tensor(len: usize, shape: TensorShape, readers: &[usize]) -> DataflowGraph {
        let mut g = DataflowGraph::new();
        let vec_shape = TensorShape::known(&[8]);
        let n0 = g
            .add_op("n0", "Op", vec![], vec![vec_shape.clone(), shape])
            .unwrap();
        let side = g.node(n0).unwrap().outputs[1];
        let mut prev = g.node(n0).unwrap().outputs[0];
        for i in 1..len {
            let mut inputs = vec![prev];
            if readers.contains(&i) {
                inputs.push(side);
            }
            let n = g
                .add_op(format!("n{}", i), "Op", inputs, vec![vec_shape.clone()])
                .unwrap();
            prev = g.node(n).unwrap().outputs[0];
        }
        g
    }

    #[test]
    fn test_shape_filter() {
        assert!(!is_swappable_shape(&TensorShape::unknown()));
        assert!(!is_swappable_shape(&TensorShape::scalar()));
        assert!(!is_swappable_shape(&TensorShape::known(&[1024])));
        assert!(is_swappable_shape(&TensorShape::known(&[2, 2])));
        assert!(is_swappable_shape(&TensorShape::partial(vec![None, None, None])));
    }

    #[test]
    fn test_distance_is_strict() {
        // producer at rank 0, readers at ranks 1, 2, 5, 10; threshold 3 keeps 5 and 10
        let g = chain_with_side_tensor(12, TensorShape::known(&[4, 4]), &[1, 2, 5, 10]);
        let topo = TopoOrder::build(&g).unwrap();
        let side = g.node(0).unwrap().outputs[1];

        let consumers = distant_consumers(&g, &topo, side, 0, 3);
        assert_eq!(consumers, vec![(5, 5), (10, 10)]);

        let candidates = select_candidates(&g, &topo, 0, 3);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tensor, side);

        // the reader at rank 5 sits exactly at the threshold
        assert_eq!(distant_consumers(&g, &topo, side, 0, 5), vec![(10, 10)]);
        assert_eq!(distant_consumers(&g, &topo, side, 0, 4), vec![(5, 5), (10, 10)]);
    }

    #[test]
    fn test_low_rank_tensor_never_selected() {
        let g = chain_with_side_tensor(12, TensorShape::known(&[64]), &[11]);
        let topo = TopoOrder::build(&g).unwrap();
        assert!(select_candidates(&g, &topo, 0, 1).is_empty());

        let g = chain_with_side_tensor(12, TensorShape::unknown(), &[11]);
        let topo = TopoOrder::build(&g).unwrap();
        assert!(select_candidates(&g, &topo, 0, 1).is_empty());
    }

    #[test]
    fn test_no_distant_consumer() {
        let g = chain_with_side_tensor(6, TensorShape::known(&[4, 4]), &[1, 2]);
        let topo = TopoOrder::build(&g).unwrap();
        assert!(select_candidates(&g, &topo, 0, 3).is_empty());
    }

    #[test]
    fn test_unranked_producer_skipped() {
        let mut g = chain_with_side_tensor(6, TensorShape::known(&[4, 4]), &[5]);
        let topo = TopoOrder::build(&g).unwrap();
        let late = g
            .add_op("late", "Op", vec![], vec![TensorShape::known(&[4, 4])])
            .unwrap();
        assert!(select_candidates(&g, &topo, late, 0).is_empty());
    }
}
