//! Consumer grouping by topological proximity.
//!
//! Consumers whose ranks chain together with gaps of at most `limit` form
//! one band and share a single swap-in node, so the number of inserted
//! swap-ins grows with the number of bands rather than consumers.

/// Consumers sharing one swap-in node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerBand {
    /// Lowest rank in the band.
    pub lo: usize,
    /// Highest rank in the band.
    pub hi: usize,
    /// `(consumer, rank)` pairs, ascending by rank then consumer index.
    pub consumers: Vec<(usize, usize)>,
}

impl ConsumerBand {
    /// The earliest consumer, lowest index first on ties.
    ///
    /// Dependency scheduling for the band's swap-in is anchored here.
    pub fn anchor(&self) -> (usize, usize) {
        self.consumers[0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.consumers.iter().map(|&(node, _)| node)
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

/// Group `(consumer, rank)` pairs into bands.
///
/// Distinct ranks are walked in ascending order; a rank joins the open
/// band when it is at most `limit` above the band's upper bound, and opens
/// a new band otherwise. Every input pair lands in exactly one band.
pub fn group_consumers(consumers: &[(usize, usize)], limit: usize) -> Vec<ConsumerBand> {
    let mut ranks: Vec<usize> = consumers.iter().map(|&(_, rank)| rank).collect();
    ranks.sort_unstable();
    ranks.dedup();

    let mut intervals: Vec<(usize, usize)> = Vec::new();
    for rank in ranks {
        match intervals.last_mut() {
            Some((_, hi)) if rank - *hi <= limit => *hi = rank,
            _ => intervals.push((rank, rank)),
        }
    }

    let mut sorted = consumers.to_vec();
    sorted.sort_unstable_by_key(|&(node, rank)| (rank, node));
    sorted.dedup();

    intervals
        .into_iter()
        .map(|(lo, hi)| ConsumerBand {
            lo,
            hi,
            consumers: sorted
                .iter()
                .copied()
                .filter(|&(_, rank)| rank >= lo && rank <= hi)
                .collect(),
        })
        .collect()
}
