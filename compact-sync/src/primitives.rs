//! Module for primitive structs associated with the processor

use getset::CopyGetters;
use zcash_primitives::block::BlockHash;
use zcash_protocol::consensus::BlockHeight;

/// Compact block header data as persisted and validated locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct BlockSummary {
    height: BlockHeight,
    hash: BlockHash,
    prev_hash: BlockHash,
    time: u32,
}

impl BlockSummary {
    pub fn from_parts(height: BlockHeight, hash: BlockHash, prev_hash: BlockHash, time: u32) -> Self {
        Self {
            height,
            hash,
            prev_hash,
            time,
        }
    }
}
