//! Action planner: turns a before/after image comparison into a minimal
//! list of erase operations.
//!
//! Flash can only clear bits on a write; restoring any bit to 1 requires an
//! erase, and erase granularity is usually much coarser than a single byte.
//! Given the current contents of a region and the desired contents, this
//! module decides which erase blocks actually need to fire, and whether it's
//! cheaper to erase a handful of adjoining small blocks individually or
//! promote to one larger block that covers all of them.
//!
//! The promotion rule: a candidate block is worth erasing as a unit once at
//! least 70% of its constituent smallest-granularity blocks need erasing
//! anyway (computed as `dirty*10 >= 7*total` to stay in integer arithmetic).
//! Larger candidates are tried first (descending by size) so a block that
//! clears the 70% bar absorbs its children before they can be considered
//! individually.

use alloc::vec::Vec;

use crate::chip::{EraseBlock, WriteGranularity};

use super::unified::need_erase;

/// A single planned erase: `size` bytes starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseOp {
    /// Start address of the block to erase
    pub start: u32,
    /// Size of the block in bytes
    pub size: u32,
}

/// Numerator/denominator for the promotion threshold: promote once at least
/// 70% of a candidate block's constituent smallest-granularity units are dirty.
const PROMOTE_NUM: u32 = 7;
const PROMOTE_DEN: u32 = 10;

/// Distinct uniform erase sizes present in `erase_blocks`, ascending,
/// excluding a size that covers the whole chip (chip-erase is never chosen
/// implicitly by the planner — callers ask for that explicitly).
fn candidate_sizes(erase_blocks: &[EraseBlock], flash_size: u32) -> Vec<u32> {
    let mut sizes: Vec<u32> = erase_blocks
        .iter()
        .filter_map(|eb| eb.uniform_size())
        .filter(|&s| s > 0 && s < flash_size)
        .collect();
    sizes.sort_unstable();
    sizes.dedup();
    sizes
}

/// Plan erase operations for `[start, end]` (inclusive) without reference to
/// current/desired contents: every block intersecting the range is erased,
/// preferring the largest aligned block at each position. Used for plain
/// erase commands where there is nothing to diff against.
pub fn plan_optimal_erase_region(
    erase_blocks: &[EraseBlock],
    flash_size: u32,
    start: u32,
    end: u32,
) -> Vec<EraseOp> {
    let sizes = candidate_sizes(erase_blocks, flash_size);
    let Some(&smallest) = sizes.first() else {
        return Vec::new();
    };

    let mut ops = Vec::new();
    let mut addr = (start / smallest) * smallest;

    while addr <= end {
        let remaining = end.saturating_sub(addr) + 1;
        let size = sizes
            .iter()
            .copied()
            .filter(|&s| addr.is_multiple_of(s))
            .filter(|&s| s <= remaining || s == smallest)
            .max()
            .unwrap_or(smallest);

        ops.push(EraseOp { start: addr, size });
        addr = addr.saturating_add(size);
        if size == 0 {
            break;
        }
    }

    ops
}

/// Plan erase operations needed to turn `current` into `data` over
/// `[start, end]` (inclusive), diffing the two buffers (each exactly
/// `end - start + 1` bytes long) and promoting to larger blocks per the 70%
/// threshold. Falls back to [`plan_optimal_erase_region`] if either buffer
/// is absent or the wrong length (nothing to diff against).
pub fn plan_optimal_erase(
    erase_blocks: &[EraseBlock],
    flash_size: u32,
    current: Option<&[u8]>,
    data: Option<&[u8]>,
    start: u32,
    end: u32,
    granularity: WriteGranularity,
) -> Vec<EraseOp> {
    let region_len = (end - start + 1) as usize;
    let (current, data) = match (current, data) {
        (Some(c), Some(d)) if c.len() == region_len && d.len() == region_len => (c, d),
        _ => return plan_optimal_erase_region(erase_blocks, flash_size, start, end),
    };

    let sizes = candidate_sizes(erase_blocks, flash_size);
    let Some(&smallest) = sizes.first() else {
        return Vec::new();
    };

    let grid_start = (start / smallest) * smallest;
    let grid_end_block = end / smallest; // index of last smallest block (inclusive)
    let grid_end = grid_end_block.saturating_mul(smallest).saturating_add(smallest - 1);
    let grid_end = grid_end.min(flash_size.saturating_sub(1));

    let unit_count = ((grid_end - grid_start) / smallest + 1) as usize;

    // Finest-granularity dirty bitmap, indexed from grid_start.
    let mut dirty = alloc::vec![false; unit_count];
    for (i, d) in dirty.iter_mut().enumerate() {
        let unit_start = grid_start + (i as u32) * smallest;
        let unit_end = unit_start + smallest - 1;
        // Intersect [unit_start, unit_end] with [start, end] (the region we
        // actually have data for); bytes outside that never register dirty.
        let lo = unit_start.max(start);
        let hi = unit_end.min(end);
        if lo > hi {
            continue;
        }
        let rel_lo = (lo - start) as usize;
        let rel_hi = (hi - start) as usize;
        *d = need_erase(
            &current[rel_lo..=rel_hi],
            &data[rel_lo..=rel_hi],
            granularity,
        );
    }

    let mut consumed = alloc::vec![false; unit_count];
    let mut ops: Vec<EraseOp> = Vec::new();

    // Try candidate sizes largest-first so a block that clears the
    // promotion threshold claims its constituent units before they're
    // considered individually.
    for &size in sizes.iter().rev().filter(|&&s| s > smallest) {
        let units_per_block = (size / smallest) as usize;
        let mut addr = grid_start;
        while addr <= grid_end {
            if addr % size == 0 {
                let idx = ((addr - grid_start) / smallest) as usize;
                if idx + units_per_block <= unit_count
                    && (idx..idx + units_per_block).all(|j| !consumed[j])
                {
                    let dirty_count = (idx..idx + units_per_block).filter(|&j| dirty[j]).count()
                        as u32;
                    if dirty_count * PROMOTE_DEN >= PROMOTE_NUM * units_per_block as u32 {
                        ops.push(EraseOp { start: addr, size });
                        for j in idx..idx + units_per_block {
                            consumed[j] = true;
                        }
                    }
                }
            }
            addr += size;
        }
    }

    // Leftover dirty units not absorbed by any promotion, emitted at the
    // smallest granularity.
    for (i, &d) in dirty.iter().enumerate() {
        if d && !consumed[i] {
            ops.push(EraseOp {
                start: grid_start + (i as u32) * smallest,
                size: smallest,
            });
        }
    }

    ops.sort_by_key(|op| op.start);
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::EraseBlock;
    use crate::spi::opcodes;

    fn blocks() -> Vec<EraseBlock> {
        alloc::vec![
            EraseBlock::new(opcodes::SE_20, 4096),
            EraseBlock::new(opcodes::BE_52, 32768),
            EraseBlock::new(opcodes::BE_D8, 65536),
        ]
    }

    #[test]
    fn no_diff_produces_no_ops() {
        let data = alloc::vec![0xAAu8; 65536];
        let ops = plan_optimal_erase(
            &blocks(),
            1024 * 1024,
            Some(&data),
            Some(&data),
            0,
            65535,
            WriteGranularity::Bit,
        );
        assert!(ops.is_empty());
    }

    #[test]
    fn single_changed_byte_erases_one_smallest_block() {
        let mut current = alloc::vec![0xFFu8; 4096];
        let mut want = current.clone();
        want[10] = 0x00;
        current[10] = 0xFF;
        let ops = plan_optimal_erase(
            &blocks(),
            1024 * 1024,
            Some(&current),
            Some(&want),
            0,
            4095,
            WriteGranularity::Bit,
        );
        // 0x00 is a subset of 0xFF bits, so no erase is actually needed.
        assert!(ops.is_empty());
    }

    #[test]
    fn bit_that_needs_to_rise_forces_erase() {
        let mut current = alloc::vec![0x00u8; 4096];
        let mut want = current.clone();
        want[10] = 0xFF;
        current[10] = 0x00;
        let ops = plan_optimal_erase(
            &blocks(),
            1024 * 1024,
            Some(&current),
            Some(&want),
            0,
            4095,
            WriteGranularity::Bit,
        );
        assert_eq!(ops, alloc::vec![EraseOp { start: 0, size: 4096 }]);
    }

    #[test]
    fn mostly_dirty_32k_promotes_to_32k_block() {
        // 8 constituent 4K sub-blocks; make 6/8 need a bit-rise (75% >= 70%).
        let mut current = alloc::vec![0x00u8; 32768];
        let want = alloc::vec![0xFFu8; 32768];
        for sub in 0..6 {
            current[sub * 4096] = 0x00;
        }
        // leave the last two 4K sub-blocks already matching (no erase needed there)
        for sub in 6..8 {
            let off = sub * 4096;
            current[off..off + 4096].copy_from_slice(&want[off..off + 4096]);
        }
        let ops = plan_optimal_erase(
            &blocks(),
            1024 * 1024,
            Some(&current),
            Some(&want),
            0,
            32767,
            WriteGranularity::Bit,
        );
        assert_eq!(ops, alloc::vec![EraseOp { start: 0, size: 32768 }]);
    }

    #[test]
    fn minority_dirty_stays_at_small_granularity() {
        // Only 1/8 sub-blocks dirty: 12.5% < 70%, no promotion.
        let mut current = alloc::vec![0xFFu8; 32768];
        let want = current.clone();
        current[0] = 0x00; // needs a 0->1 rise in sub-block 0 only
        let ops = plan_optimal_erase(
            &blocks(),
            1024 * 1024,
            Some(&current),
            Some(&want),
            0,
            32767,
            WriteGranularity::Bit,
        );
        assert_eq!(ops, alloc::vec![EraseOp { start: 0, size: 4096 }]);
    }

    #[test]
    fn plain_region_erase_picks_largest_aligned_block() {
        let ops = plan_optimal_erase_region(&blocks(), 1024 * 1024, 0, 65535);
        assert_eq!(ops, alloc::vec![EraseOp { start: 0, size: 65536 }]);
    }
}
