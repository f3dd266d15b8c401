//! Capping the number of nodes in one merge

use std::collections::HashSet;

use crate::bucket::BucketCopy;

/// A node's part in a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeMetaData {
    /// Storage node index
    pub node: u16,
    /// Node only supplies data
    pub source_only: bool,
    /// The node's copy; an invalid placeholder when it has none
    pub copy: BucketCopy,
}

impl MergeMetaData {
    /// Metadata for a node holding `copy`
    pub fn new(copy: BucketCopy, source_only: bool) -> Self {
        Self {
            node: copy.node,
            source_only,
            copy,
        }
    }

    /// Whether the node has a copy with reported info
    pub fn has_valid_copy(&self) -> bool {
        self.copy.info.is_valid()
    }

    /// Checksum of the node's copy
    pub fn checksum(&self) -> u32 {
        self.copy.info.checksum
    }
}

/// Picks which nodes take part when a merge would involve too many.
///
/// Selection order, stopping at the cap: nodes without a valid copy, one
/// node per distinct checksum (preferring nodes that keep the bucket), the
/// remaining nodes that keep the bucket, and finally the remaining
/// source-only nodes. The result keeps the input order.
#[derive(Debug, Clone, Copy)]
pub struct MergeLimiter {
    max_nodes: usize,
}

impl MergeLimiter {
    /// Smallest usable cap
    pub const MIN_NODES: usize = 2;

    /// Limiter allowing `max_nodes` nodes, raised to [`MergeLimiter::MIN_NODES`] if lower
    pub fn new(max_nodes: usize) -> Self {
        if max_nodes < Self::MIN_NODES {
            tracing::warn!(
                "Merge node limit {} is below the minimum, using {}",
                max_nodes,
                Self::MIN_NODES
            );
        }
        Self {
            max_nodes: max_nodes.max(Self::MIN_NODES),
        }
    }

    /// Configured cap
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Reduce `nodes` to at most the cap
    pub fn limit(&self, nodes: Vec<MergeMetaData>) -> Vec<MergeMetaData> {
        if nodes.len() <= self.max_nodes {
            return nodes;
        }
        let mut selected = vec![false; nodes.len()];
        let mut count = 0;
        let mut take = |selected: &mut [bool], i: usize| {
            if count < self.max_nodes && !selected[i] {
                selected[i] = true;
                count += 1;
            }
        };

        for (i, node) in nodes.iter().enumerate() {
            if !node.has_valid_copy() {
                take(&mut selected, i);
            }
        }

        let mut checksums = HashSet::new();
        for source_only in [false, true] {
            for (i, node) in nodes.iter().enumerate() {
                if node.has_valid_copy() && node.source_only == source_only && checksums.insert(node.checksum()) {
                    take(&mut selected, i);
                }
            }
        }

        for source_only in [false, true] {
            for (i, node) in nodes.iter().enumerate() {
                if node.source_only == source_only {
                    take(&mut selected, i);
                }
            }
        }

        nodes
            .into_iter()
            .zip(selected)
            .filter_map(|(node, keep)| keep.then_some(node))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketInfo;

    fn node(index: u16, checksum: Option<u32>, source_only: bool) -> MergeMetaData {
        let copy = match checksum {
            Some(checksum) => BucketCopy::new(index, BucketInfo::new(checksum, 1, 1), false, 0),
            None => BucketCopy::empty(index),
        };
        MergeMetaData::new(copy, source_only)
    }

    fn indexes(nodes: &[MergeMetaData]) -> Vec<u16> {
        nodes.iter().map(|n| n.node).collect()
    }

    #[test]
    fn test_under_cap_is_untouched() {
        let nodes = vec![node(1, Some(1), false), node(2, None, false)];
        assert_eq!(MergeLimiter::new(4).limit(nodes.clone()), nodes);
    }

    #[test]
    fn test_cap_is_at_least_two() {
        assert_eq!(MergeLimiter::new(0).max_nodes(), 2);
        assert_eq!(MergeLimiter::new(16).max_nodes(), 16);
    }

    #[test]
    fn test_missing_copies_always_kept() {
        let nodes = vec![
            node(0, Some(1), false),
            node(1, Some(1), false),
            node(2, None, false),
            node(3, Some(1), true),
            node(4, None, false),
        ];
        let limited = MergeLimiter::new(3).limit(nodes);
        assert_eq!(indexes(&limited), vec![0, 2, 4]);
    }

    #[test]
    fn test_one_per_checksum_prefers_kept_nodes() {
        let nodes = vec![
            node(0, Some(1), false),
            node(1, Some(1), false),
            node(2, Some(2), true),
            node(3, Some(2), false),
            node(4, Some(3), true),
        ];
        let limited = MergeLimiter::new(3).limit(nodes);
        assert_eq!(indexes(&limited), vec![0, 3, 4]);
    }

    #[test]
    fn test_source_only_nodes_fill_last() {
        let nodes = vec![
            node(0, Some(1), true),
            node(1, Some(1), false),
            node(2, Some(1), true),
            node(3, Some(1), false),
        ];
        let limited = MergeLimiter::new(2).limit(nodes);
        assert_eq!(indexes(&limited), vec![1, 3]);
    }
}
