use super::id::BucketId;

/// Content summary a storage node reports for its copy of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketInfo {
    /// Checksum over the documents in the copy
    pub checksum: u32,
    /// Number of live documents
    pub doc_count: u32,
    /// Total size of live documents in bytes
    pub total_size: u32,
    /// Number of entries including removes
    pub meta_count: u32,
    /// Copy is indexed and searchable
    pub ready: bool,
    /// Copy is the active one serving queries
    pub active: bool,
    valid: bool,
}

impl BucketInfo {
    /// Valid info for a ready, inactive copy
    pub fn new(checksum: u32, doc_count: u32, total_size: u32) -> Self {
        Self {
            checksum,
            doc_count,
            total_size,
            meta_count: doc_count,
            ready: true,
            active: false,
            valid: true,
        }
    }

    /// Info for a copy that has not reported yet
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Whether the info was actually reported
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether two copies hold the same documents; ready/active flags are ignored
    pub fn same_documents(&self, other: &BucketInfo) -> bool {
        self.valid == other.valid
            && self.checksum == other.checksum
            && self.doc_count == other.doc_count
            && self.total_size == other.total_size
            && self.meta_count == other.meta_count
    }
}

/// One node's copy of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketCopy {
    /// Storage node index
    pub node: u16,
    /// Last reported info
    pub info: BucketInfo,
    /// Copy is known to match the converged state
    pub trusted: bool,
    /// When the info was last updated
    pub timestamp: u64,
}

impl BucketCopy {
    /// Copy with reported info
    pub fn new(node: u16, info: BucketInfo, trusted: bool, timestamp: u64) -> Self {
        Self { node, info, trusted, timestamp }
    }

    /// Placeholder for a node that has no copy yet
    pub fn empty(node: u16) -> Self {
        Self::new(node, BucketInfo::invalid(), false, 0)
    }

    /// Valid and holding the same documents as `other`
    pub fn consistent_with(&self, other: &BucketCopy) -> bool {
        self.info.is_valid() && self.info.same_documents(&other.info)
    }
}

/// A bucket and every known copy of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry {
    /// The bucket
    pub bucket: BucketId,
    copies: Vec<BucketCopy>,
}

impl BucketEntry {
    /// Entry without copies
    pub fn new(bucket: BucketId) -> Self {
        Self { bucket, copies: Vec::new() }
    }

    /// Entry with the given copies; a later copy for the same node replaces an earlier one
    pub fn with_copies(bucket: BucketId, copies: impl IntoIterator<Item = BucketCopy>) -> Self {
        let mut entry = Self::new(bucket);
        for copy in copies {
            entry.update_node(copy);
        }
        entry
    }

    /// All copies, in node order
    pub fn copies(&self) -> &[BucketCopy] {
        &self.copies
    }

    /// Copy held by `node`
    pub fn get_node(&self, node: u16) -> Option<&BucketCopy> {
        self.copies.iter().find(|c| c.node == node)
    }

    /// Insert or replace the copy for `copy.node`
    pub fn update_node(&mut self, copy: BucketCopy) {
        match self.copies.binary_search_by_key(&copy.node, |c| c.node) {
            Ok(pos) => self.copies[pos] = copy,
            Err(pos) => self.copies.insert(pos, copy),
        }
    }

    /// Remove the copy held by `node`; returns whether there was one
    pub fn remove_node(&mut self, node: u16) -> bool {
        let before = self.copies.len();
        self.copies.retain(|c| c.node != node);
        self.copies.len() != before
    }

    /// Nodes holding a copy, ascending
    pub fn nodes(&self) -> Vec<u16> {
        self.copies.iter().map(|c| c.node).collect()
    }

    /// Number of copies
    pub fn node_count(&self) -> usize {
        self.copies.len()
    }

    /// No copies left
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// Every copy is valid and all hold the same documents
    pub fn valid_and_consistent(&self) -> bool {
        match self.copies.split_first() {
            None => true,
            Some((first, rest)) => first.info.is_valid() && rest.iter().all(|c| c.consistent_with(first)),
        }
    }
}
