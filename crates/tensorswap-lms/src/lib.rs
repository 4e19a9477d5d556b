//! # TensorSwap LMS
//!
//! **Large model support for static dataflow graphs**
//!
//! This crate rewrites a [`DataflowGraph`](tensorswap_ir::DataflowGraph) so
//! that tensors produced early and consumed much later are staged in host
//! memory in between. For each such tensor it inserts a swap-out node right
//! after the producer and one swap-in node per band of nearby consumers,
//! then adds control edges so every swap-in fires early enough to finish
//! before it is needed without competing with unrelated early work.
//!
//! ## Pipeline
//!
//! 1. [`NodeFilter`]: exclusion and inclusion by name scope and op type.
//! 2. [`TopoOrder`]: deterministic Kahn-level ranks.
//! 3. [`select_candidates`]: shape and topological-distance filters.
//! 4. [`group_consumers`]: consumer bands sharing one swap-in.
//! 5. [`insert_for_tensor`]: graph edits, producing [`RelocationTriple`]s.
//! 6. [`DependencyScheduler`]: asynchronous trigger search or synchronous pinning.
//!
//! [`Lms::run`] drives all of them and returns an [`LmsReport`].
//!
//! ## Quick start
//!
//! ```rust
//! use tensorswap_ir::{DataflowGraph, TensorShape};
//! use tensorswap_lms::{rewrite_graph, LmsConfig};
//!
//! // a 20-node chain whose first node also emits a matrix read by the last
//! let mut graph = DataflowGraph::new();
//! let first = graph
//!     .add_op("n0", "MatMul", vec![], vec![TensorShape::known(&[64]), TensorShape::known(&[64, 64])])
//!     .unwrap();
//! let side = graph.node(first).unwrap().outputs[1];
//! let mut prev = graph.node(first).unwrap().outputs[0];
//! for i in 1..20 {
//!     let mut inputs = vec![prev];
//!     if i == 19 {
//!         inputs.push(side);
//!     }
//!     let n = graph.add_op(format!("n{}", i), "Relu", inputs, vec![TensorShape::known(&[64])]).unwrap();
//!     prev = graph.node(n).unwrap().outputs[0];
//! }
//!
//! let report = rewrite_graph(&mut graph, &LmsConfig::default()).unwrap();
//! assert_eq!(report.swapout_ops.len(), 1);
//! assert_eq!(report.swapin_ops.len(), 1);
//! assert!(graph.validate().is_ok());
//! ```

mod candidates;
mod classify;
mod config;
mod error;
mod grouping;
mod insert;
mod log;
mod schedule;
mod session;
mod topo;

pub use candidates::{distant_consumers, is_swappable_shape, select_candidates, SwapCandidate};
pub use classify::{classify, NodeFilter, STRUCTURAL_OP_TYPES};
pub use config::{LmsConfig, SyncMode, DEFAULT_OFFLOAD_DEVICE, DEFAULT_SWAPIN_GROUPBY};
pub use error::{LmsError, LmsResult};
pub use grouping::{group_consumers, ConsumerBand};
pub use insert::{insert_for_tensor, Insertion, RelocationTriple, SWAP_OP_TYPE};
pub use schedule::{sequential_lookaheads, DependencyScheduler, INITIAL_LOOKAHEAD};
pub use session::{rewrite_graph, Lms, LmsBuilder, LmsReport};
pub use topo::TopoOrder;
