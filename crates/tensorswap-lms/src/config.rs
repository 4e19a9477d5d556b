//! Rewrite configuration.
//!
//! [`LmsConfig`] gathers every knob of one rewrite: node filters, the
//! swap-out distance threshold, consumer grouping, swap-in lookahead, the
//! synchronization mode and the offload device. It deserializes from TOML
//! or JSON with every field optional.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LmsError, LmsResult};

/// Default distance within which consumers share one swap-in node.
pub const DEFAULT_SWAPIN_GROUPBY: usize = 5;

/// Default placement for inserted swap nodes.
pub const DEFAULT_OFFLOAD_DEVICE: &str = "/cpu:0";

/// How strictly swap nodes are pinned to the surrounding computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncMode {
    /// `0`: swap-ins are scheduled through a windowed control-edge search so
    /// transfers overlap with computation.
    Async,
    /// `1`: each swap-in waits for every other input of its consumer.
    Consumers,
    /// `2`: every other consumer of a swapped tensor's producer waits for
    /// the swap-out.
    Producers,
    /// `3`: both of the above.
    Both,
}

impl SyncMode {
    pub fn as_u8(self) -> u8 {
        match self {
            SyncMode::Async => 0,
            SyncMode::Consumers => 1,
            SyncMode::Producers => 2,
            SyncMode::Both => 3,
        }
    }

    pub fn is_async(self) -> bool {
        self == SyncMode::Async
    }

    pub fn syncs_consumers(self) -> bool {
        matches!(self, SyncMode::Consumers | SyncMode::Both)
    }

    pub fn syncs_producers(self) -> bool {
        matches!(self, SyncMode::Producers | SyncMode::Both)
    }
}

impl TryFrom<u8> for SyncMode {
    type Error = LmsError;

    fn try_from(value: u8) -> LmsResult<Self> {
        match value {
            0 => Ok(SyncMode::Async),
            1 => Ok(SyncMode::Consumers),
            2 => Ok(SyncMode::Producers),
            3 => Ok(SyncMode::Both),
            other => Err(LmsError::InvalidSyncMode(other)),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncMode::Async => "async",
            SyncMode::Consumers => "sync swap-in",
            SyncMode::Producers => "sync swap-out",
            SyncMode::Both => "sync swap-in and swap-out",
        };
        write!(f, "{} ({})", name, self.as_u8())
    }
}

/// Configuration for one large-model-support rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmsConfig {
    /// Name scopes whose nodes never have their outputs swapped.
    pub excl_scopes: BTreeSet<String>,
    /// When non-empty (together with `incl_types`), only nodes in these
    /// scopes have their outputs swapped.
    pub incl_scopes: BTreeSet<String>,
    /// Op types whose outputs are never swapped, on top of the built-in
    /// structural types.
    pub excl_types: BTreeSet<String>,
    /// When non-empty (together with `incl_scopes`), only nodes of these
    /// types have their outputs swapped.
    pub incl_types: BTreeSet<String>,
    /// A tensor is swapped for consumers whose rank distance from the
    /// producer is strictly greater than this. `None` uses half the
    /// topological order size.
    pub swapout_threshold: Option<usize>,
    /// Consumers whose ranks are within this distance share a swap-in.
    pub swapin_groupby: usize,
    /// Fixed lookahead for triggering swap-ins. `None` uses the sequential
    /// strategy.
    pub swapin_ahead: Option<usize>,
    /// Raw synchronization mode, validated into [`SyncMode`].
    pub sync_mode: u8,
    /// Device tag placed on inserted swap nodes.
    pub offload_device: String,
    /// Enable level-1 and deeper diagnostics.
    pub debug: bool,
    /// Deepest diagnostic level emitted when `debug` is set.
    pub debug_level: u8,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            excl_scopes: BTreeSet::new(),
            incl_scopes: BTreeSet::new(),
            excl_types: BTreeSet::new(),
            incl_types: BTreeSet::new(),
            swapout_threshold: None,
            swapin_groupby: DEFAULT_SWAPIN_GROUPBY,
            swapin_ahead: None,
            sync_mode: 0,
            offload_device: DEFAULT_OFFLOAD_DEVICE.to_string(),
            debug: false,
            debug_level: 1,
        }
    }
}

impl LmsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_excl_scope(mut self, scope: impl Into<String>) -> Self {
        self.excl_scopes.insert(scope.into());
        self
    }

    pub fn with_incl_scope(mut self, scope: impl Into<String>) -> Self {
        self.incl_scopes.insert(scope.into());
        self
    }

    pub fn with_excl_type(mut self, op_type: impl Into<String>) -> Self {
        self.excl_types.insert(op_type.into());
        self
    }

    pub fn with_incl_type(mut self, op_type: impl Into<String>) -> Self {
        self.incl_types.insert(op_type.into());
        self
    }

    pub fn with_swapout_threshold(mut self, threshold: usize) -> Self {
        self.swapout_threshold = Some(threshold);
        self
    }

    pub fn with_swapin_groupby(mut self, groupby: usize) -> Self {
        self.swapin_groupby = groupby;
        self
    }

    pub fn with_swapin_ahead(mut self, ahead: usize) -> Self {
        self.swapin_ahead = Some(ahead);
        self
    }

    pub fn with_sync_mode(mut self, mode: u8) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn with_offload_device(mut self, device: impl Into<String>) -> Self {
        self.offload_device = device.into();
        self
    }

    pub fn with_debug(mut self, level: u8) -> Self {
        self.debug = true;
        self.debug_level = level;
        self
    }

    /// The validated synchronization mode.
    pub fn sync_mode(&self) -> LmsResult<SyncMode> {
        SyncMode::try_from(self.sync_mode)
    }

    pub fn validate(&self) -> LmsResult<()> {
        self.sync_mode().map(|_| ())
    }

    /// Whether a diagnostic at `level` should be emitted.
    pub fn log_enabled(&self, level: u8) -> bool {
        level == 0 || (self.debug && self.debug_level >= level)
    }
}
