//! The rewrite session: classification, ordering, relocation and scheduling
//! for one graph.
//!
//! All run state (node filters, the topological order, the relocation
//! triples, the forward-walk cache) lives for exactly one [`Lms::run`].
//! The rewrite operates on a copy of the graph that is written back only
//! when every stage succeeded, so a failed run leaves the caller's graph
//! untouched.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;
use tensorswap_ir::DataflowGraph;

use crate::candidates::select_candidates;
use crate::classify::NodeFilter;
use crate::config::{LmsConfig, SyncMode};
use crate::error::{LmsError, LmsResult};
use crate::grouping::group_consumers;
use crate::insert::{insert_for_tensor, RelocationTriple};
use crate::log::lms_log;
use crate::schedule::DependencyScheduler;
use crate::topo::TopoOrder;

/// What a rewrite did to the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LmsReport {
    /// Inserted swap-out nodes, in insertion order.
    pub swapout_ops: Vec<usize>,
    /// Inserted swap-in nodes, in insertion order.
    pub swapin_ops: Vec<usize>,
    pub triples: Vec<RelocationTriple>,
    /// Control edges added by dependency scheduling, as `(from, to)`.
    pub control_edges: Vec<(usize, usize)>,
    /// Distance threshold in effect, after auto resolution.
    pub swapout_threshold: usize,
    /// Number of distinct ranks in the topological order.
    pub order_size: usize,
    pub sync_mode: u8,
    pub elapsed: Duration,
}

impl LmsReport {
    pub fn total_inserted(&self) -> usize {
        self.swapout_ops.len() + self.swapin_ops.len()
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Added {} operations ({} swap-out, {} swap-in) and {} control edges; threshold {} over {} ranks",
            self.total_inserted(),
            self.swapout_ops.len(),
            self.swapin_ops.len(),
            self.control_edges.len(),
            self.swapout_threshold,
            self.order_size,
        )
    }
}

/// Builder for a rewrite session.
///
/// ```rust
/// use tensorswap_ir::{DataflowGraph, TensorShape};
/// use tensorswap_lms::{LmsBuilder, LmsConfig};
///
/// let mut graph = DataflowGraph::new();
/// graph.add_op("x", "Conv2D", vec![], vec![TensorShape::known(&[8, 8])]).unwrap();
///
/// let report = LmsBuilder::new()
///     .with_config(LmsConfig::new().with_sync_mode(0))
///     .with_graph(&mut graph)
///     .build()
///     .unwrap()
///     .run()
///     .unwrap();
/// assert_eq!(report.total_inserted(), 0);
/// ```
#[derive(Debug, Default)]
pub struct LmsBuilder<'g> {
    config: LmsConfig,
    graph: Option<&'g mut DataflowGraph>,
}

impl<'g> LmsBuilder<'g> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LmsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_graph(mut self, graph: &'g mut DataflowGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Check the configuration and the graph handle.
    pub fn build(self) -> LmsResult<Lms<'g>> {
        let graph = self.graph.ok_or(LmsError::MissingGraph)?;
        let sync_mode = self.config.sync_mode()?;
        Ok(Lms {
            graph,
            config: self.config,
            sync_mode,
        })
    }
}

/// A validated rewrite session over one graph.
#[derive(Debug)]
pub struct Lms<'g> {
    graph: &'g mut DataflowGraph,
    config: LmsConfig,
    sync_mode: SyncMode,
}

impl Lms<'_> {
    pub fn config(&self) -> &LmsConfig {
        &self.config
    }

    /// Insert swap-out/swap-in nodes and their control dependencies.
    pub fn run(self) -> LmsResult<LmsReport> {
        let span = tracing::info_span!("lms", nodes = self.graph.num_nodes());
        let _guard = span.enter();
        let config = &self.config;
        let start = Instant::now();

        lms_log!(config, 0, "Editing model for LMS");
        let mut work = self.graph.clone();
        let original_nodes = work.num_nodes();
        lms_log!(config, 0, "The graph has {} ops in total", original_nodes);

        let mut filter = NodeFilter::new(&work, config);
        lms_log!(
            config,
            1,
            "{} ops excluded, {} ops included",
            filter.excluded_count(),
            filter.included_count()
        );

        let topo = TopoOrder::build(&work)?;
        lms_log!(config, 0, "Topological sort size: {}", topo.size());
        if config.log_enabled(1) {
            for (rank, nodes) in topo.levels() {
                let listing: Vec<(&str, &str)> = nodes
                    .iter()
                    .filter_map(|&n| work.node(n))
                    .map(|n| (n.name.as_str(), n.op_type.as_str()))
                    .collect();
                lms_log!(config, 1, "[{}]: {:?}", rank, listing);
            }
        }

        let swapout_threshold = config.swapout_threshold.unwrap_or_else(|| {
            lms_log!(config, 0, "Use auto mode for setting swapout_threshold");
            topo.size() / 2
        });
        log_configuration(config, self.sync_mode, swapout_threshold);

        let mut report = relocate(
            &mut work,
            &topo,
            &mut filter,
            config,
            swapout_threshold,
            original_nodes,
        )?;

        report.control_edges = DependencyScheduler::new(&mut work, &topo, config)
            .schedule(&report.triples, self.sync_mode)?;
        report.swapout_threshold = swapout_threshold;
        report.order_size = topo.size();
        report.sync_mode = self.sync_mode.as_u8();
        report.elapsed = start.elapsed();

        lms_log!(
            config,
            0,
            "Added {} operations to the model ({} swap-out operations and {} swap-in operations)",
            report.total_inserted(),
            report.swapout_ops.len(),
            report.swapin_ops.len()
        );
        lms_log!(
            config,
            0,
            "Editing model for LMS, took: {:.3} ms",
            report.elapsed.as_secs_f64() * 1000.0
        );

        *self.graph = work;
        Ok(report)
    }
}

/// Rewrite `graph` in place with `config`.
pub fn rewrite_graph(graph: &mut DataflowGraph, config: &LmsConfig) -> LmsResult<LmsReport> {
    LmsBuilder::new()
        .with_config(config.clone())
        .with_graph(graph)
        .build()?
        .run()
}

/// Breadth-first pass over the original nodes inserting swap nodes for
/// every admitted, ranked producer.
///
/// Fan-outs are captured before a node is rewritten. Inserted nodes are
/// excluded right away, so they are queued at most once and never
/// relocated.
fn relocate(
    graph: &mut DataflowGraph,
    topo: &TopoOrder,
    filter: &mut NodeFilter,
    config: &LmsConfig,
    threshold: usize,
    original_nodes: usize,
) -> LmsResult<LmsReport> {
    let mut report = LmsReport::default();
    let mut queue: VecDeque<usize> = (0..original_nodes).collect();
    let mut seen: HashSet<usize> = (0..original_nodes).collect();

    while let Some(node) = queue.pop_front() {
        let next = graph.fanouts(node);

        if filter.admits(node) {
            if let Some(rank) = topo.order_of(node) {
                for candidate in select_candidates(graph, topo, node, threshold) {
                    let bands = group_consumers(&candidate.consumers, config.swapin_groupby);
                    let insertion = insert_for_tensor(
                        graph,
                        node,
                        candidate.tensor,
                        &bands,
                        &config.offload_device,
                    )?;

                    filter.exclude(insertion.swapout_op);
                    report.swapout_ops.push(insertion.swapout_op);
                    if let Some(tensor) = graph.tensor(candidate.tensor) {
                        lms_log!(
                            config,
                            1,
                            "Swap-out: Tensor {} (shape: {}) will be placed on {} (producer order: {})",
                            tensor.name,
                            tensor.shape,
                            config.offload_device,
                            rank
                        );
                    }

                    for (band, &(anchor, swapin)) in bands.iter().zip(&insertion.swapins) {
                        filter.exclude(swapin);
                        report.swapin_ops.push(swapin);
                        lms_log!(
                            config,
                            1,
                            "Swap-in: {} serves {} consumers at orders {}..={}, anchored at {}",
                            graph.node(swapin).map(|n| n.name.as_str()).unwrap_or_default(),
                            band.len(),
                            band.lo,
                            band.hi,
                            graph.node(anchor).map(|n| n.name.as_str()).unwrap_or_default()
                        );
                    }
                    report.triples.extend(insertion.triples(node));
                }
            }
        }

        for succ in next {
            if seen.insert(succ) {
                queue.push_back(succ);
            }
        }
    }

    Ok(report)
}

fn log_configuration(config: &LmsConfig, sync_mode: SyncMode, threshold: usize) {
    lms_log!(config, 0, "swapout_threshold: {}", threshold);
    lms_log!(config, 0, "swapin_groupby: {}", config.swapin_groupby);
    lms_log!(config, 0, "sync_mode: {}", sync_mode);
    if sync_mode.is_async() {
        match config.swapin_ahead {
            Some(ahead) => lms_log!(config, 0, "swapin_ahead: {}", ahead),
            None => lms_log!(config, 0, "swapin_ahead: auto mode"),
        }
    } else if config.swapin_ahead.is_some() {
        lms_log!(config, 0, "swapin_ahead will be ignored in synchronous mode");
    }
    lms_log!(config, 0, "offload_device: {}", config.offload_device);
}
