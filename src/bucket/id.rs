use std::fmt;

/// Number of low bits that can address a bucket location
pub const MAX_USED_BITS: u32 = 58;

const COUNT_SHIFT: u32 = 64 - 6;
const COUNT_MASK: u64 = 0x3F;

/// 64-bit bucket identifier.
///
/// The top 6 bits hold how many of the low location bits are in use; the rest
/// of the id is always stored stripped (unused location bits cleared), so two
/// ids naming the same bucket compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BucketId(u64);

fn location_mask(used_bits: u32) -> u64 {
    if used_bits == 0 {
        0
    } else {
        u64::MAX >> (64 - used_bits)
    }
}

impl BucketId {
    /// Bucket using the low `used_bits` bits of `location`. Counts above
    /// [`MAX_USED_BITS`] are clamped.
    pub fn new(used_bits: u32, location: u64) -> Self {
        let used_bits = used_bits.min(MAX_USED_BITS);
        Self(((used_bits as u64) << COUNT_SHIFT) | (location & location_mask(used_bits)))
    }

    /// Interpret a raw id, stripping location bits beyond its used-bit count
    pub fn from_raw(raw: u64) -> Self {
        Self::new(((raw >> COUNT_SHIFT) & COUNT_MASK) as u32, raw)
    }

    /// Raw 64-bit form
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Number of location bits in use
    pub fn used_bits(&self) -> u32 {
        ((self.0 >> COUNT_SHIFT) & COUNT_MASK) as u32
    }

    /// Location bits without the count
    pub fn location(&self) -> u64 {
        self.0 & location_mask(MAX_USED_BITS)
    }

    /// Same location seen with a different number of used bits
    pub fn with_used_bits(&self, used_bits: u32) -> Self {
        Self::new(used_bits, self.location())
    }

    /// Whether `other` is this bucket or lies below it in the split tree
    pub fn contains(&self, other: &BucketId) -> bool {
        other.used_bits() >= self.used_bits() && other.with_used_bits(self.used_bits()) == *self
    }

    /// Database key: the location bits reversed, with the used-bit count in
    /// the low 6 bits. Sorting by key puts a parent right before its children.
    pub fn to_key(&self) -> u64 {
        self.location().reverse_bits() | self.used_bits() as u64
    }

    /// Inverse of [`BucketId::to_key`]
    pub fn from_key(key: u64) -> Self {
        Self::new((key & COUNT_MASK) as u32, (key & !COUNT_MASK).reverse_bits())
    }

    /// Largest key any bucket contained in this one can have
    pub(crate) fn last_contained_key(&self) -> u64 {
        let used = self.used_bits();
        let free = location_mask(MAX_USED_BITS - used) << (64 - MAX_USED_BITS);
        (self.to_key() & !COUNT_MASK) | free | COUNT_MASK
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId(0x{:016x})", self.0)
    }
}
