//! Gap and hash-chain checks over runs of persisted blocks.

use zcash_primitives::block::BlockHash;
use zcash_protocol::consensus::BlockHeight;

use crate::primitives::BlockSummary;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContinuityError {
    #[error("Height discontinuity. Block with height {height} is not continuous with previous block height {previous_block_height}")]
    HeightDiscontinuity {
        height: BlockHeight,
        previous_block_height: BlockHeight,
    },
    #[error("Hash discontinuity. Block prev_hash {prev_hash} with height {height} does not match previous block hash {previous_block_hash}")]
    HashDiscontinuity {
        height: BlockHeight,
        prev_hash: BlockHash,
        previous_block_hash: BlockHash,
    },
}

impl ContinuityError {
    /// Height of the first block that does not extend its predecessor.
    pub fn height(&self) -> BlockHeight {
        match self {
            Self::HeightDiscontinuity { height, .. } | Self::HashDiscontinuity { height, .. } => {
                *height
            }
        }
    }
}

/// Checks that `blocks` ascend one height at a time and that each block's `prev_hash` matches the
/// hash of the block before it.
///
/// `previous` is the block directly below the run, if known. The first block is checked against it.
pub fn check_continuity(
    blocks: &[BlockSummary],
    previous: Option<&BlockSummary>,
) -> Result<(), ContinuityError> {
    let mut prev = previous.copied();

    for block in blocks {
        if let Some(prev) = prev {
            if block.height() != prev.height() + 1 {
                return Err(ContinuityError::HeightDiscontinuity {
                    height: block.height(),
                    previous_block_height: prev.height(),
                });
            }
            if block.prev_hash() != prev.hash() {
                return Err(ContinuityError::HashDiscontinuity {
                    height: block.height(),
                    prev_hash: block.prev_hash(),
                    previous_block_hash: prev.hash(),
                });
            }
        }
        prev = Some(*block);
    }

    Ok(())
}

/// Height of the first discontinuity in `blocks`, if any.
pub fn first_discontinuity(blocks: &[BlockSummary]) -> Option<BlockHeight> {
    check_continuity(blocks, None)
        .err()
        .map(|error| error.height())
}
