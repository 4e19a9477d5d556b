//! Dependency scheduling for inserted swap-in nodes.
//!
//! In asynchronous mode each swap-in gets one extra control input from a
//! "trigger" node picked inside a rank window ahead of its anchor consumer,
//! so the transfer overlaps with computation that has to happen anyway.
//! In the synchronous modes swap nodes are pinned directly to the fan-ins
//! of the rewired consumers and/or the fan-outs of the producers.

use std::collections::{BTreeSet, HashMap, HashSet};

use tensorswap_ir::{DataflowGraph, IrError};

use crate::config::{LmsConfig, SyncMode};
use crate::insert::RelocationTriple;
use crate::log::lms_log;
use crate::topo::TopoOrder;

/// Lookahead used for the swap-ins anchored at the earliest consumer rank.
pub const INITIAL_LOOKAHEAD: usize = 3;

/// Lookahead per triple for the sequential strategy.
///
/// `anchor_ranks` must be sorted ascending. Triples sharing the first
/// anchor rank get [`INITIAL_LOOKAHEAD`]; every later triple looks back to
/// the previous distinct anchor rank, so the trigger window of each swap-in
/// ends where the previous group of consumers sits.
pub fn sequential_lookaheads(anchor_ranks: &[usize]) -> Vec<usize> {
    let Some(&first) = anchor_ranks.first() else {
        return Vec::new();
    };

    let mut lookaheads = Vec::with_capacity(anchor_ranks.len());
    let mut lower = first;
    let mut last = first;
    for &rank in anchor_ranks {
        if rank == first {
            lookaheads.push(INITIAL_LOOKAHEAD);
            continue;
        }
        if rank != last {
            lower = last;
            last = rank;
        }
        lookaheads.push(rank - lower);
    }
    lookaheads
}

/// Run-scoped scheduler state.
///
/// Forward walks are cached on first use and follow data edges only, so a
/// node ordered before a consumer purely through control edges never
/// qualifies as its trigger.
pub struct DependencyScheduler<'a> {
    graph: &'a mut DataflowGraph,
    topo: &'a TopoOrder,
    config: &'a LmsConfig,
    forward_walks: HashMap<usize, HashSet<usize>>,
    added: Vec<(usize, usize)>,
}

impl<'a> DependencyScheduler<'a> {
    pub fn new(graph: &'a mut DataflowGraph, topo: &'a TopoOrder, config: &'a LmsConfig) -> Self {
        DependencyScheduler {
            graph,
            topo,
            config,
            forward_walks: HashMap::new(),
            added: Vec::new(),
        }
    }

    /// Schedule every triple according to `mode` and return the control
    /// edges added, as `(from, to)` pairs.
    pub fn schedule(
        mut self,
        triples: &[RelocationTriple],
        mode: SyncMode,
    ) -> Result<Vec<(usize, usize)>, IrError> {
        if triples.is_empty() {
            return Ok(self.added);
        }
        match (mode, self.config.swapin_ahead) {
            (SyncMode::Async, None) => self.sequential_strategy(triples)?,
            (SyncMode::Async, Some(ahead)) => {
                for triple in triples {
                    self.add_control_dependency(triple, ahead)?;
                }
            }
            (mode, _) => self.sync_ops(triples, mode)?,
        }
        Ok(self.added)
    }

    /// Schedule triples in anchor-rank order with growing lookahead.
    fn sequential_strategy(&mut self, triples: &[RelocationTriple]) -> Result<(), IrError> {
        let mut ranked: Vec<(usize, &RelocationTriple)> = triples
            .iter()
            .filter_map(|t| self.topo.order_of(t.dest_op).map(|rank| (rank, t)))
            .collect();
        ranked.sort_by_key(|&(rank, _)| rank);

        let ranks: Vec<usize> = ranked.iter().map(|&(rank, _)| rank).collect();
        for ((_, triple), ahead) in ranked.into_iter().zip(sequential_lookaheads(&ranks)) {
            self.add_control_dependency(triple, ahead)?;
        }
        Ok(())
    }

    /// Make `triple.swapin_op` wait for a trigger found `ahead` ranks
    /// before its anchor consumer.
    pub fn add_control_dependency(
        &mut self,
        triple: &RelocationTriple,
        ahead: usize,
    ) -> Result<(), IrError> {
        match self.find_trigger(triple.src_op, triple.dest_op, ahead) {
            Some((trigger, trigger_rank)) => {
                if self.graph.add_control_input(triple.swapin_op, trigger)? {
                    self.added.push((trigger, triple.swapin_op));
                    lms_log!(
                        self.config,
                        1,
                        "Control dependency: {} (order: {}) -> {} (order: {})",
                        self.node_name(trigger),
                        trigger_rank,
                        self.node_name(triple.dest_op),
                        self.topo.order_of(triple.dest_op).unwrap_or_default()
                    );
                } else {
                    lms_log!(
                        self.config,
                        1,
                        "Control dependency {} -> {} skipped: already present or would close a cycle",
                        self.node_name(trigger),
                        self.node_name(triple.swapin_op)
                    );
                }
            }
            None => lms_log!(
                self.config,
                1,
                "No control dependency op needed for swap in of op {}",
                self.node_name(triple.src_op)
            ),
        }
        Ok(())
    }

    /// Search for a trigger of the swap-in feeding `src_op`.
    ///
    /// Ranks strictly between `rank(fw_op)` and `rank(src_op) - distance`
    /// are scanned from the latest down. The first rank holding a node
    /// that is not inside a conditional branch and from which `src_op` is
    /// reachable along data edges wins; among those the lowest node index is picked.
    /// Returns the trigger and its rank.
    pub fn find_trigger(
        &mut self,
        fw_op: usize,
        src_op: usize,
        distance: usize,
    ) -> Option<(usize, usize)> {
        let topo = self.topo;
        let lower = topo.order_of(fw_op)? + 1;
        let upper = topo.order_of(src_op)?.checked_sub(distance)?;

        for rank in (lower..upper).rev() {
            for &candidate in topo.nodes_at(rank) {
                let conditional = self
                    .graph
                    .node(candidate)
                    .is_some_and(|node| node.in_conditional);
                if !conditional && self.forward_walk(candidate).contains(&src_op) {
                    return Some((candidate, rank));
                }
            }
        }
        None
    }

    fn forward_walk(&mut self, node_idx: usize) -> &HashSet<usize> {
        let graph = &*self.graph;
        self.forward_walks
            .entry(node_idx)
            .or_insert_with(|| graph.forward_walk(node_idx))
    }

    /// Synchronous pinning.
    ///
    /// Consumer side: the swap-ins feeding each rewired consumer wait for
    /// every other fan-in of that consumer. Producer side: every other
    /// fan-out of each producer waits for the producer's swap-outs.
    fn sync_ops(&mut self, triples: &[RelocationTriple], mode: SyncMode) -> Result<(), IrError> {
        let swapins: HashSet<usize> = triples.iter().map(|t| t.swapin_op).collect();

        if mode.syncs_consumers() {
            let dests: BTreeSet<usize> = triples.iter().map(|t| t.dest_op).collect();
            for dest in dests {
                let (dest_swapins, others): (Vec<usize>, Vec<usize>) = self
                    .graph
                    .fanins(dest)
                    .into_iter()
                    .partition(|f| swapins.contains(f));
                self.add_controls(&dest_swapins, &others)?;
            }
        }

        if mode.syncs_producers() {
            let swapouts: HashSet<usize> = triples
                .iter()
                .flat_map(|t| self.graph.fanins(t.swapin_op))
                .collect();
            let srcs: BTreeSet<usize> = triples.iter().map(|t| t.src_op).collect();
            for src in srcs {
                let (src_swapouts, others): (Vec<usize>, Vec<usize>) = self
                    .graph
                    .fanouts(src)
                    .into_iter()
                    .partition(|f| swapouts.contains(f));
                self.add_controls(&others, &src_swapouts)?;
            }
        }
        Ok(())
    }

    /// Every node of `waiting` gets a control input from every node of `controls`.
    fn add_controls(&mut self, waiting: &[usize], controls: &[usize]) -> Result<(), IrError> {
        for &node in waiting {
            for &control in controls {
                if self.graph.add_control_input(node, control)? {
                    self.added.push((control, node));
                }
            }
        }
        Ok(())
    }

    fn node_name(&self, node_idx: usize) -> &str {
        self.graph
            .node(node_idx)
            .map(|n| n.name.as_str())
            .unwrap_or("<unknown>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorswap_ir::{GraphNode, TensorShape};

    fn matrix() -> Vec<TensorShape> {
        vec![TensorShape::known(&[4, 4])]
    }

    /// Chain `n0 -> ... -> n{len-1}`; returns the graph and the output of each node.
    fn chain(len: usize) -> (DataflowGraph, Vec<usize>) {
        let mut g = DataflowGraph::new();
        let mut outs = Vec::new();
        for i in 0..len {
            let inputs = outs.last().map(|&t| vec![t]).unwrap_or_default();
            let n = g.add_op(format!("n{}", i), "Op", inputs, matrix()).unwrap();
            outs.push(g.node(n).unwrap().outputs[0]);
        }
        (g, outs)
    }

    /// Chain of `len` nodes where `n0` also emits a side tensor read by the last node.
    fn chain_with_side(len: usize) -> (DataflowGraph, usize) {
        let mut g = DataflowGraph::new();
        let n0 = g
            .add_op("n0", "Op", vec![], vec![matrix()[0].clone(), matrix()[0].clone()])
            .unwrap();
        let side = g.node(n0).unwrap().outputs[1];
        let mut prev = g.node(n0).unwrap().outputs[0];
        for i in 1..len {
            let mut inputs = vec![prev];
            if i == len - 1 {
                inputs.push(side);
            }
            let n = g.add_op(format!("n{}", i), "Op", inputs, matrix()).unwrap();
            prev = g.node(n).unwrap().outputs[0];
        }
        (g, side)
    }

    /// Attach an unranked swap-in reading `tensor` and rewire `consumer`'s `slot` to it.
    fn attach_swapin(g: &mut DataflowGraph, tensor: usize, consumer: usize, slot: usize) -> usize {
        let out = g.add_tensor("swapin:0", TensorShape::known(&[4, 4]));
        let s = g
            .add_node(
                GraphNode::new("swapin", "Identity")
                    .with_inputs(vec![tensor])
                    .with_outputs(vec![out]),
            )
            .unwrap();
        g.replace_input(consumer, slot, out).unwrap();
        s
    }

    #[test]
    fn test_sequential_lookaheads() {
        assert!(sequential_lookaheads(&[]).is_empty());
        assert_eq!(sequential_lookaheads(&[7, 7]), vec![3, 3]);
        assert_eq!(
            sequential_lookaheads(&[10, 10, 14, 14, 20, 27]),
            vec![3, 3, 4, 4, 6, 7]
        );
    }

    #[test]
    fn test_window_bound_never_moves_back() {
        let ranks = [5, 6, 6, 9, 15, 16, 30];
        let bounds: Vec<usize> = ranks
            .iter()
            .zip(sequential_lookaheads(&ranks))
            .skip(1)
            .map(|(&r, a)| r - a)
            .collect();
        assert!(bounds.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_find_trigger_latest_rank() {
        let (mut g, _) = chain(20);
        let topo = TopoOrder::build(&g).unwrap();
        let config = LmsConfig::default();
        let mut scheduler = DependencyScheduler::new(&mut g, &topo, &config);

        assert_eq!(scheduler.find_trigger(0, 19, 3), Some((15, 15)));
        assert_eq!(scheduler.find_trigger(0, 19, 18), None);
        assert_eq!(scheduler.find_trigger(0, 19, 25), None);
        assert_eq!(scheduler.forward_walks.len(), 1);
    }

    #[test]
    fn test_find_trigger_skips_conditional_and_off_path() {
        // a -> {o, c, m}; c and m -> z -> y; o leads nowhere, c is conditional
        let mut g = DataflowGraph::new();
        let a = g.add_op("a", "Op", vec![], matrix()).unwrap();
        let a0 = g.node(a).unwrap().outputs[0];
        g.add_op("o", "Op", vec![a0], matrix()).unwrap();
        let c0 = g.add_tensor("cond/c:0", TensorShape::known(&[4, 4]));
        g.add_node(
            GraphNode::new("cond/c", "Op")
                .with_inputs(vec![a0])
                .with_outputs(vec![c0])
                .in_conditional(),
        )
        .unwrap();
        let m = g.add_op("m", "Op", vec![a0], matrix()).unwrap();
        let m0 = g.node(m).unwrap().outputs[0];
        let z = g.add_op("z", "Op", vec![c0, m0], matrix()).unwrap();
        let z0 = g.node(z).unwrap().outputs[0];
        let y = g.add_op("y", "Op", vec![z0], matrix()).unwrap();

        let topo = TopoOrder::build(&g).unwrap();
        assert_eq!(topo.nodes_at(1), &[1, 2, m]);

        let config = LmsConfig::default();
        let mut scheduler = DependencyScheduler::new(&mut g, &topo, &config);
        assert_eq!(scheduler.find_trigger(a, y, 1), Some((m, 1)));
    }

    #[test]
    fn test_conditional_only_rank_is_passed_over() {
        // a -> b -> c -> d -> e, with c inside a conditional branch
        let mut g = DataflowGraph::new();
        let a = g.add_op("a", "Op", vec![], matrix()).unwrap();
        let a0 = g.node(a).unwrap().outputs[0];
        let b = g.add_op("b", "Op", vec![a0], matrix()).unwrap();
        let b0 = g.node(b).unwrap().outputs[0];
        let c0 = g.add_tensor("c:0", TensorShape::known(&[4, 4]));
        g.add_node(
            GraphNode::new("c", "Op")
                .with_inputs(vec![b0])
                .with_outputs(vec![c0])
                .in_conditional(),
        )
        .unwrap();
        let d = g.add_op("d", "Op", vec![c0], matrix()).unwrap();
        let d0 = g.node(d).unwrap().outputs[0];
        let e = g.add_op("e", "Op", vec![d0], matrix()).unwrap();

        let topo = TopoOrder::build(&g).unwrap();
        let config = LmsConfig::default();
        let mut scheduler = DependencyScheduler::new(&mut g, &topo, &config);
        // window covers ranks 2 and 1; rank 2 only holds the conditional node
        assert_eq!(scheduler.find_trigger(a, e, 1), Some((b, 1)));
    }

    #[test]
    fn test_control_only_path_is_not_a_trigger() {
        // n19 reads n0 directly and is ordered after n18 by a control edge only
        let (mut g, outs) = chain(19);
        let n19 = g.add_op("n19", "Op", vec![outs[0]], matrix()).unwrap();
        g.add_control_input(n19, 18).unwrap();
        let topo = TopoOrder::build(&g).unwrap();
        assert_eq!(topo.order_of(n19), Some(19));
        assert!(g.descendants(13).contains(&n19));

        let config = LmsConfig::default();
        let mut scheduler = DependencyScheduler::new(&mut g, &topo, &config);
        assert_eq!(scheduler.find_trigger(0, n19, 5), None);
    }

    #[test]
    fn test_existing_edge_is_not_reported() {
        let (mut g, side) = chain_with_side(20);
        let topo = TopoOrder::build(&g).unwrap();
        let swapin = attach_swapin(&mut g, side, 19, 1);
        assert!(g.add_control_input(swapin, 14).unwrap());
        let triple = RelocationTriple {
            src_op: 0,
            dest_op: 19,
            swapin_op: swapin,
        };
        let config = LmsConfig::new().with_swapin_ahead(4);
        let added = DependencyScheduler::new(&mut g, &topo, &config)
            .schedule(&[triple], SyncMode::Async)
            .unwrap();

        assert!(added.is_empty());
        assert_eq!(g.control_inputs(swapin), &[14]);
    }

    #[test]
    fn test_fixed_lookahead_adds_edge() {
        let (mut g, side) = chain_with_side(20);
        let topo = TopoOrder::build(&g).unwrap();
        let swapin = attach_swapin(&mut g, side, 19, 1);
        let triple = RelocationTriple {
            src_op: 0,
            dest_op: 19,
            swapin_op: swapin,
        };
        let config = LmsConfig::new().with_swapin_ahead(4);
        let added = DependencyScheduler::new(&mut g, &topo, &config)
            .schedule(&[triple], SyncMode::Async)
            .unwrap();

        assert_eq!(added, vec![(14, swapin)]);
        assert_eq!(g.control_inputs(swapin), &[14]);
        assert!(g.is_acyclic());
    }

    #[test]
    fn test_sequential_strategy_uses_initial_lookahead() {
        let (mut g, side) = chain_with_side(20);
        let topo = TopoOrder::build(&g).unwrap();
        let swapin = attach_swapin(&mut g, side, 19, 1);
        let triple = RelocationTriple {
            src_op: 0,
            dest_op: 19,
            swapin_op: swapin,
        };
        let config = LmsConfig::default();
        let added = DependencyScheduler::new(&mut g, &topo, &config)
            .schedule(&[triple], SyncMode::Async)
            .unwrap();
        assert_eq!(added, vec![(19 - INITIAL_LOOKAHEAD - 1, swapin)]);
    }

    #[test]
    fn test_sync_both_sides() {
        // p feeds x (through the swap-in) and q; x also reads from f
        let mut g = DataflowGraph::new();
        let p = g.add_op("p", "Op", vec![], matrix()).unwrap();
        let p0 = g.node(p).unwrap().outputs[0];
        let f = g.add_op("f", "Op", vec![], matrix()).unwrap();
        let f0 = g.node(f).unwrap().outputs[0];
        let q = g.add_op("q", "Op", vec![p0], matrix()).unwrap();
        let x = g.add_op("x", "Op", vec![p0, f0], matrix()).unwrap();
        let topo = TopoOrder::build(&g).unwrap();

        let so_out = g.add_tensor("so:0", TensorShape::known(&[4, 4]));
        let swapout = g
            .add_node(GraphNode::new("so", "Identity").with_inputs(vec![p0]).with_outputs(vec![so_out]))
            .unwrap();
        let swapin = attach_swapin(&mut g, so_out, x, 0);
        let triple = RelocationTriple {
            src_op: p,
            dest_op: x,
            swapin_op: swapin,
        };

        let config = LmsConfig::default();
        let added = DependencyScheduler::new(&mut g, &topo, &config)
            .schedule(&[triple], SyncMode::Both)
            .unwrap();

        assert_eq!(g.control_inputs(swapin), &[f]);
        assert_eq!(g.control_inputs(q), &[swapout]);
        assert_eq!(added, vec![(f, swapin), (swapout, q)]);
        assert!(g.is_acyclic());
    }

    #[test]
    fn test_no_triples_no_edges() {
        let (mut g, _) = chain(3);
        let topo = TopoOrder::build(&g).unwrap();
        let config = LmsConfig::default();
        let added = DependencyScheduler::new(&mut g, &topo, &config)
            .schedule(&[], SyncMode::Async)
            .unwrap();
        assert!(added.is_empty());
    }
}
