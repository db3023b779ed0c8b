//! Trie shape constants.

/// Bits consumed per trie level.
pub(crate) const RADIX_BITS: usize = 4;

/// Child slots per trie node (one per nibble value).
pub const FANOUT: usize = 1 << RADIX_BITS;

/// Trie levels needed for a canonical key of `width` bytes.
#[inline]
pub(crate) const fn levels_for(width: usize) -> usize {
    width * (8 / RADIX_BITS)
}

/// Returns the digit of `key` consumed at `depth`. Even depths read the high
/// nibble of a byte, odd depths the low nibble.
#[inline(always)]
pub(crate) fn digit_at(key: &[u8], depth: usize) -> usize {
    let byte = key[depth >> 1];
    if depth & 1 == 0 {
        (byte >> 4) as usize
    } else {
        (byte & 0x0F) as usize
    }
}
