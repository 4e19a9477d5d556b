//! Level-based topological order.
//!
//! Nodes are ranked by Kahn levels: rank 0 holds every node without
//! predecessors, rank `k + 1` holds every node whose last predecessor sits
//! at rank `k`. Several nodes may share a rank, but never two nodes joined
//! by an edge. Data and control edges both count.
//!
//! Ranks within a level are listed in ascending node index, so rebuilding
//! on an unchanged graph reproduces the same order.

use std::collections::{HashSet, VecDeque};

use tensorswap_ir::{DataflowGraph, IrError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopoOrder {
    /// Rank per node index; `None` for nodes outside the build set.
    orders: Vec<Option<usize>>,
    /// Nodes per rank, ascending.
    levels: Vec<Vec<usize>>,
}

impl TopoOrder {
    /// Rank every node of the graph.
    pub fn build(graph: &DataflowGraph) -> Result<Self, IrError> {
        let all: Vec<usize> = (0..graph.num_nodes()).collect();
        Self::build_from(graph, &all)
    }

    /// Rank the nodes reachable from `seeds` along data and control edges.
    ///
    /// Edges coming from outside the reachable set are ignored.
    pub fn build_from(graph: &DataflowGraph, seeds: &[usize]) -> Result<Self, IrError> {
        let n = graph.num_nodes();
        let members = reachable_set(graph, seeds);

        let mut in_degree = vec![0usize; n];
        for &node in &members {
            in_degree[node] = graph
                .predecessors(node)
                .into_iter()
                .filter(|p| members.contains(p))
                .count();
        }

        let mut current: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&node| in_degree[node] == 0)
            .collect();
        current.sort_unstable();

        let mut orders = vec![None; n];
        let mut levels = Vec::new();
        let mut ranked = 0;

        while !current.is_empty() {
            let rank = levels.len();
            let mut next = Vec::new();
            for &node in &current {
                orders[node] = Some(rank);
                for succ in graph.successors(node) {
                    if !members.contains(&succ) {
                        continue;
                    }
                    in_degree[succ] -= 1;
                    if in_degree[succ] == 0 {
                        next.push(succ);
                    }
                }
            }
            ranked += current.len();
            next.sort_unstable();
            levels.push(std::mem::replace(&mut current, next));
        }

        if ranked != members.len() {
            return Err(IrError::CyclicGraph);
        }

        Ok(TopoOrder { orders, levels })
    }

    /// Number of distinct ranks.
    pub fn size(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Rank of `node_idx`, or `None` if the node was not part of the build
    /// (including nodes added to the graph afterwards).
    pub fn order_of(&self, node_idx: usize) -> Option<usize> {
        self.orders.get(node_idx).copied().flatten()
    }

    /// Nodes sharing `rank`, ascending. Empty for out-of-range ranks.
    pub fn nodes_at(&self, rank: usize) -> &[usize] {
        self.levels.get(rank).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over `(rank, nodes)` pairs in ascending rank.
    pub fn levels(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.levels
            .iter()
            .enumerate()
            .map(|(rank, nodes)| (rank, nodes.as_slice()))
    }
}

fn reachable_set(graph: &DataflowGraph, seeds: &[usize]) -> HashSet<usize> {
    let mut members = HashSet::new();
    let mut queue = VecDeque::new();
    for &seed in seeds {
        if seed < graph.num_nodes() && members.insert(seed) {
            queue.push_back(seed);
        }
    }
    while let Some(node) = queue.pop_front() {
        for succ in graph.successors(node) {
            if members.insert(succ) {
                queue.push_back(succ);
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorswap_ir::{GraphNode, TensorShape};

    fn shape() -> Vec<TensorShape> {
        vec![TensorShape::known(&[2, 2])]
    }

    /// a -> b -> d, a -> c -> d, plus an unrelated e.
    fn diamond() -> DataflowGraph {
        let mut g = DataflowGraph::new();
        let a = g.add_op("a", "Op", vec![], shape()).unwrap();
        let a0 = g.node(a).unwrap().outputs[0];
        let b = g.add_op("b", "Op", vec![a0], shape()).unwrap();
        let c = g.add_op("c", "Op", vec![a0], shape()).unwrap();
        let b0 = g.node(b).unwrap().outputs[0];
        let c0 = g.node(c).unwrap().outputs[0];
        g.add_op("d", "Op", vec![b0, c0], shape()).unwrap();
        g.add_op("e", "Op", vec![], shape()).unwrap();
        g
    }

    #[test]
    fn test_levels() {
        let topo = TopoOrder::build(&diamond()).unwrap();
        assert_eq!(topo.size(), 3);
        assert_eq!(topo.nodes_at(0), &[0, 4]);
        assert_eq!(topo.nodes_at(1), &[1, 2]);
        assert_eq!(topo.nodes_at(2), &[3]);
        assert_eq!(topo.order_of(3), Some(2));
        assert!(topo.nodes_at(9).is_empty());
    }

    #[test]
    fn test_control_edges_shift_ranks() {
        let mut g = diamond();
        // e must now run after d
        g.add_control_input(4, 3).unwrap();
        let topo = TopoOrder::build(&g).unwrap();
        assert_eq!(topo.order_of(4), Some(3));
        assert_eq!(topo.nodes_at(0), &[0]);
    }

    #[test]
    fn test_late_nodes_are_unranked() {
        let mut g = diamond();
        let topo = TopoOrder::build(&g).unwrap();
        let late = g.add_op("late", "Op", vec![], shape()).unwrap();
        assert_eq!(topo.order_of(late), None);
    }

    #[test]
    fn test_build_from_seeds() {
        let g = diamond();
        let topo = TopoOrder::build_from(&g, &[1]).unwrap();
        assert_eq!(topo.order_of(1), Some(0));
        assert_eq!(topo.order_of(3), Some(1));
        assert_eq!(topo.order_of(0), None);
        assert_eq!(topo.order_of(4), None);
    }

    #[test]
    fn test_deterministic() {
        let g = diamond();
        assert_eq!(TopoOrder::build(&g).unwrap(), TopoOrder::build(&g).unwrap());
    }

    #[test]
    fn test_cycle_rejected() {
        let mut g = DataflowGraph::new();
        let t = g.add_tensor("loop", TensorShape::known(&[2]));
        let a = g.add_op("a", "Op", vec![t], shape()).unwrap();
        let a0 = g.node(a).unwrap().outputs[0];
        g.add_node(GraphNode::new("b", "Op").with_inputs(vec![a0]).with_outputs(vec![t]))
            .unwrap();
        assert_eq!(TopoOrder::build(&g), Err(IrError::CyclicGraph));
    }

    #[test]
    fn test_empty_graph() {
        let topo = TopoOrder::build(&DataflowGraph::new()).unwrap();
        assert!(topo.is_empty());
        assert_eq!(topo.order_of(0), None);
    }
}
