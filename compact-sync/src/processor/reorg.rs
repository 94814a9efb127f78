use std::cmp;
use std::sync::atomic::Ordering;

use zcash_protocol::consensus::BlockHeight;

use super::CompactBlockProcessor;
use crate::error::ProcessorError;
use crate::traits::{BlockSource, TransactionStore, WalletBackend};

impl<D, R, B> CompactBlockProcessor<D, R, B>
where
    D: BlockSource,
    R: TransactionStore,
    B: WalletBackend,
{
    /// Rewinds the backend and the block source below a chain error at `error_height`.
    ///
    /// Each consecutive chain error rewinds further. Once `retries` consecutive errors have been
    /// handled the next one fails with [`ProcessorError::FailedReorgRepair`].
    pub(super) async fn handle_chain_error(
        &self,
        error_height: BlockHeight,
    ) -> Result<(), ProcessorError> {
        let consecutive_errors = self.consecutive_chain_errors.load(Ordering::SeqCst);
        if consecutive_errors >= self.config.retries() {
            tracing::error!(
                "chain error at height {error_height} persists after {consecutive_errors} rewinds"
            );
            return Err(ProcessorError::FailedReorgRepair {
                height: error_height,
                attempts: consecutive_errors,
            });
        }

        let rewind_height = rewind_target(
            error_height,
            consecutive_errors,
            self.config.rewind_distance(),
            self.config.max_reorg_size(),
            self.lower_bound_height,
        );
        tracing::warn!(
            "chain error detected at height {error_height}, rewinding to {rewind_height}"
        );
        self.backend
            .rewind_to(rewind_height)
            .await
            .map_err(ProcessorError::backend)?;
        self.downloader
            .rewind_to(rewind_height)
            .await
            .map_err(ProcessorError::downloader)?;

        if let Some(listener) = &self.on_chain_error {
            listener(error_height, rewind_height);
        }
        self.consecutive_chain_errors.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

/// Height to rewind to after the `consecutive_errors + 1`-th chain error in a row.
///
/// The distance grows by `rewind_distance` per consecutive error up to `max_reorg_size`, and the
/// result never drops below `lower_bound`.
pub(crate) fn rewind_target(
    error_height: BlockHeight,
    consecutive_errors: u32,
    rewind_distance: u32,
    max_reorg_size: u32,
    lower_bound: BlockHeight,
) -> BlockHeight {
    let offset = cmp::min(
        max_reorg_size,
        rewind_distance.saturating_mul(consecutive_errors.saturating_add(1)),
    );
    let target = BlockHeight::from_u32(u32::from(error_height).saturating_sub(offset));

    cmp::max(target, lower_bound)
}
