use docgrid_core::types::{DocumentId, Location};

use super::id::{BucketId, MAX_USED_BITS};

/// Maps document ids to full-resolution buckets.
///
/// The low 32 bits come from the id's location: the `n=` number, a hash of
/// the `g=` group, or a hash of the whole id when there is no modifier. The
/// remaining bits are taken from the id hash so documents sharing a location
/// still spread over the buckets below it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketIdFactory;

fn hash_words(data: &[u8]) -> (u32, u64) {
    let hash = blake3::hash(data);
    let bytes = hash.as_bytes();
    let low = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let mut high = [0u8; 8];
    high.copy_from_slice(&bytes[4..12]);
    (low, u64::from_le_bytes(high))
}

impl BucketIdFactory {
    /// Create a factory
    pub fn new() -> Self {
        Self
    }

    /// 32-bit location of a document id
    pub fn location(&self, id: &DocumentId) -> u32 {
        match id.location() {
            Some(Location::Number(n)) => *n as u32,
            Some(Location::Group(group)) => hash_words(group.as_bytes()).0,
            None => hash_words(id.as_str().as_bytes()).0,
        }
    }

    /// Bucket with all location bits in use
    pub fn bucket_id(&self, id: &DocumentId) -> BucketId {
        let (_, gid_bits) = hash_words(id.as_str().as_bytes());
        let raw = self.location(id) as u64 | (gid_bits << 32);
        BucketId::new(MAX_USED_BITS, raw)
    }
}
