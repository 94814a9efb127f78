#![warn(missing_docs)]
//! Status types published by the compact block processor.
//!
//! Everything here is a plain value: the processor publishes these snapshots and consumers read them.

use std::ops::RangeInclusive;

use zcash_protocol::consensus::BlockHeight;

pub mod balance;
pub mod processor_info;
pub mod state;

/// An inclusive range of block heights. `start > end` means there is nothing to do.
pub type BlockRange = RangeInclusive<BlockHeight>;

/// The canonical empty range, `1..=0`.
///
/// ```
/// use sync_status::empty_range;
///
/// assert!(empty_range().is_empty());
/// ```
pub fn empty_range() -> BlockRange {
    BlockHeight::from_u32(1)..=BlockHeight::from_u32(0)
}

/// Number of blocks covered by an inclusive range, zero when the range is empty.
///
/// ```
/// use sync_status::range_len;
/// use zcash_protocol::consensus::BlockHeight;
///
/// assert_eq!(range_len(&(BlockHeight::from_u32(991)..=BlockHeight::from_u32(1000))), 10);
/// assert_eq!(range_len(&sync_status::empty_range()), 0);
/// ```
pub fn range_len(range: &BlockRange) -> u32 {
    if range.is_empty() {
        0
    } else {
        u32::from(*range.end()) - u32::from(*range.start()) + 1
    }
}
