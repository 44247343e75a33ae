//! Sparse bitmap with one bit per byte of address space.

use std::cmp;

use foldhash::{HashMap, HashMapExt};

/// Bytes of address space covered by a single block.
pub(crate) const BLOCK_RANGE: usize = 1024 * 1024;

const WORD_BITS: usize = u64::BITS as usize;

#[expect(
    clippy::integer_division,
    reason = "BLOCK_RANGE is a multiple of the word size"
)]
const BLOCK_WORDS: usize = BLOCK_RANGE / WORD_BITS;

const WORD_BYTES: usize = size_of::<u64>();

/// Tracks which bytes of the address space have already been charged to some value.
///
/// Object graphs are sparse in the full address space, so the bits are kept in fixed-size
/// blocks that are allocated on first touch. A bit is set if and only if the byte at that
/// address has been counted. Bits are never cleared - the whole bitmap is discarded together
/// with the scan that owns it.
#[derive(Debug, Default)]
pub(crate) struct Bitmap {
    // Block index (address / BLOCK_RANGE) to block.
    blocks: HashMap<usize, Block>,
}

impl Bitmap {
    pub(crate) fn new() -> Self {
        Self {
            blocks: HashMap::new(),
        }
    }

    /// Sets `len` consecutive bits starting at `addr`, crossing block boundaries as needed.
    pub(crate) fn mark_range(&mut self, addr: usize, len: usize) {
        for (index, from, to) in block_segments(addr, len) {
            self.blocks
                .entry(index)
                .or_insert_with(Block::new)
                .mark_bits(from, to);
        }
    }

    /// Whether the byte at `addr` has been marked.
    #[expect(
        clippy::arithmetic_side_effects,
        clippy::integer_division,
        reason = "division by a non-zero constant, remainder is below the block range"
    )]
    pub(crate) fn is_marked(&self, addr: usize) -> bool {
        self.blocks
            .get(&(addr / BLOCK_RANGE))
            .is_some_and(|block| block.is_marked(addr % BLOCK_RANGE))
    }

    /// Whether any byte in `[addr, addr + len)` has been marked.
    pub(crate) fn any_marked(&self, addr: usize, len: usize) -> bool {
        block_segments(addr, len).any(|(index, from, to)| {
            self.blocks
                .get(&index)
                .is_some_and(|block| block.any_marked(from, to))
        })
    }

    /// Bytes of memory consumed by the bits themselves.
    pub(crate) fn size(&self) -> usize {
        self.blocks
            .len()
            .checked_mul(BLOCK_WORDS * WORD_BYTES)
            .expect("bitmap block count overflows usize - this indicates an unrealistic scenario")
    }

    /// Mean fraction of set bits across allocated blocks, in `0.0..=1.0`.
    ///
    /// An empty bitmap has a utilization of zero.
    #[expect(
        clippy::cast_precision_loss,
        reason = "a diagnostic ratio, precision loss is acceptable"
    )]
    pub(crate) fn utilization(&self) -> f64 {
        if self.blocks.is_empty() {
            return 0.0;
        }

        let sum: f64 = self
            .blocks
            .values()
            .map(|block| block.ones_count() as f64 / BLOCK_RANGE as f64)
            .sum();

        sum / self.blocks.len() as f64
    }
}

/// Splits `[addr, addr + len)` into `(block index, first bit, end bit)` segments.
#[expect(
    clippy::arithmetic_side_effects,
    clippy::integer_division,
    reason = "all quantities stay within the checked end address"
)]
fn block_segments(addr: usize, len: usize) -> impl Iterator<Item = (usize, usize, usize)> {
    let end = addr
        .checked_add(len)
        .expect("marked range extends past the end of the address space");

    let mut cursor = addr;

    std::iter::from_fn(move || {
        if cursor >= end {
            return None;
        }

        let index = cursor / BLOCK_RANGE;
        let block_start = index * BLOCK_RANGE;
        let from = cursor - block_start;
        let to = cmp::min(end - block_start, BLOCK_RANGE);

        cursor = block_start + to;
        Some((index, from, to))
    })
}

#[derive(Debug)]
struct Block {
    // Always BLOCK_WORDS long. Boxed so that creating a block does not put 128 KiB on the stack.
    words: Box<[u64]>,
}

impl Block {
    fn new() -> Self {
        Self {
            words: vec![0; BLOCK_WORDS].into_boxed_slice(),
        }
    }

    fn mark_bits(&mut self, from: usize, to: usize) {
        for (word, mask) in word_masks(from, to) {
            let slot = self
                .words
                .get_mut(word)
                .expect("bit index is within the block by construction");
            *slot |= mask;
        }
    }

    fn is_marked(&self, bit: usize) -> bool {
        word_masks(bit, bit.saturating_add(1))
            .all(|(word, mask)| self.words.get(word).is_some_and(|w| w & mask != 0))
    }

    fn any_marked(&self, from: usize, to: usize) -> bool {
        word_masks(from, to).any(|(word, mask)| self.words.get(word).is_some_and(|w| w & mask != 0))
    }

    fn ones_count(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }
}

/// Splits the bit range `[from, to)` into `(word index, mask)` pairs.
#[expect(
    clippy::arithmetic_side_effects,
    clippy::integer_division,
    reason = "bit offsets are below WORD_BITS and spans never exceed it"
)]
fn word_masks(from: usize, to: usize) -> impl Iterator<Item = (usize, u64)> {
    let mut bit = from;

    std::iter::from_fn(move || {
        if bit >= to {
            return None;
        }

        let word = bit / WORD_BITS;
        let offset = bit % WORD_BITS;
        let span = cmp::min(WORD_BITS - offset, to - bit);

        let mask = if span == WORD_BITS {
            u64::MAX
        } else {
            ((1_u64 << span) - 1) << offset
        };

        bit += span;
        Some((word, mask))
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn block_marks_only_requested_bits() {
        let marks = [10, 13, 44, 128, 129, 256, 700];

        let mut block = Block::new();
        for bit in marks {
            block.mark_bits(bit, bit + 1);
        }

        for bit in 0..BLOCK_RANGE {
            assert_eq!(block.is_marked(bit), marks.contains(&bit), "bit {bit}");
        }

        assert_eq!(block.ones_count(), marks.len());
    }

    #[test]
    fn block_marks_whole_and_partial_words() {
        let mut block = Block::new();
        block.mark_bits(60, 200);

        assert!(!block.is_marked(59));
        assert!(block.is_marked(60));
        assert!(block.is_marked(64));
        assert!(block.is_marked(199));
        assert!(!block.is_marked(200));
        assert_eq!(block.ones_count(), 140);
    }

    #[test]
    fn empty_bitmap_has_nothing_marked() {
        let bitmap = Bitmap::new();

        assert!(!bitmap.is_marked(0));
        assert!(!bitmap.is_marked(0x1234_5678));
        assert!(!bitmap.any_marked(0, 4 * BLOCK_RANGE));
        assert_eq!(bitmap.size(), 0);
        assert!(bitmap.utilization().abs() < f64::EPSILON);
    }

    #[test]
    fn zero_length_mark_is_noop() {
        let mut bitmap = Bitmap::new();
        bitmap.mark_range(0x1000, 0);

        assert!(!bitmap.is_marked(0x1000));
        assert_eq!(bitmap.size(), 0);
    }

    #[test]
    fn queries_do_not_allocate_blocks() {
        let bitmap = Bitmap::new();
        _ = bitmap.is_marked(5 * BLOCK_RANGE);
        _ = bitmap.any_marked(3 * BLOCK_RANGE, 10);

        assert_eq!(bitmap.size(), 0);
    }

    #[test]
    fn mark_range_crosses_block_boundary() {
        let mut bitmap = Bitmap::new();
        let start = BLOCK_RANGE - 10;
        bitmap.mark_range(start, 20);

        assert!(!bitmap.is_marked(start - 1));
        for addr in start..start + 20 {
            assert!(bitmap.is_marked(addr), "addr {addr:#x}");
        }
        assert!(!bitmap.is_marked(start + 20));

        assert_eq!(bitmap.size(), 2 * BLOCK_WORDS * WORD_BYTES);
    }

    #[test]
    fn any_marked_sees_single_bit_in_large_range() {
        let mut bitmap = Bitmap::new();
        bitmap.mark_range(3 * BLOCK_RANGE + 77, 1);

        assert!(bitmap.any_marked(0, 4 * BLOCK_RANGE));
        assert!(bitmap.any_marked(3 * BLOCK_RANGE + 77, 1));
        assert!(!bitmap.any_marked(0, 3 * BLOCK_RANGE + 77));
        assert!(!bitmap.any_marked(3 * BLOCK_RANGE + 78, BLOCK_RANGE));
    }

    #[test]
    fn utilization_is_mean_over_blocks() {
        let mut bitmap = Bitmap::new();
        bitmap.mark_range(0, BLOCK_RANGE);
        bitmap.mark_range(BLOCK_RANGE, BLOCK_RANGE / 2);

        assert!((bitmap.utilization() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn random_ranges_are_marked_exactly() {
        const RANGES: usize = 1000;

        let mut rng = SmallRng::seed_from_u64(312_321_312);
        let mut bitmap = Bitmap::new();
        let mut ranges = Vec::with_capacity(RANGES);

        let mut addr = 0_usize;
        for _ in 0..RANGES {
            addr += rng.random_range(0..BLOCK_RANGE / 16);
            let len = rng.random_range(0..40_usize);
            ranges.push((addr, len));
            bitmap.mark_range(addr, len);
        }

        for &(start, len) in &ranges {
            for offset in 0..len {
                assert!(bitmap.is_marked(start + offset), "not marked at {start:#x}");
            }
        }

        // Probe random addresses against the reference set of ranges.
        for _ in 0..RANGES {
            let probe = rng.random_range(0..addr + 40);
            let expected = ranges
                .iter()
                .any(|&(start, len)| probe >= start && probe < start + len);

            assert_eq!(bitmap.is_marked(probe), expected, "probe {probe:#x}");
        }
    }
}
