use std::cell::Cell;

use zcash_protocol::consensus::BlockHeight;

use sync_status::state::State;
use sync_status::BlockRange;

use super::{CompactBlockProcessor, CycleOutcome};
use crate::error::ProcessorError;
use crate::retry::retry_up_to;
use crate::traits::{BlockSource, TransactionStore, WalletBackend};

/// Attempts of a whole scan before it is reported as failed.
const SCAN_RETRIES: u32 = 3;

impl<D, R, B> CompactBlockProcessor<D, R, B>
where
    D: BlockSource,
    R: TransactionStore,
    B: WalletBackend,
{
    /// Validates `range` and scans it when it is consistent.
    ///
    /// A chain error is returned as an outcome, not an error, so the caller can rewind.
    pub(super) async fn validate_and_scan_new_blocks(
        &self,
        range: BlockRange,
    ) -> Result<CycleOutcome, ProcessorError> {
        self.set_state(State::Validating);
        if let Some(error_height) = self.validate_new_blocks(&range).await? {
            return Ok(CycleOutcome::ChainError(error_height));
        }
        if self.is_stopped() {
            return Ok(CycleOutcome::Stopped);
        }

        self.set_state(State::Scanning);
        self.scan_new_blocks(&range).await?;
        self.set_state(State::Scanned(range));

        Ok(CycleOutcome::Processed)
    }

    async fn validate_new_blocks(
        &self,
        range: &BlockRange,
    ) -> Result<Option<BlockHeight>, ProcessorError> {
        if range.is_empty() {
            tracing::debug!("no blocks to validate");
            return Ok(None);
        }
        tracing::debug!("validating blocks in range {}..={}", range.start(), range.end());

        let error_height = self
            .backend
            .validate_chain_tail(range.clone())
            .await
            .map_err(ProcessorError::backend)?;
        match error_height {
            Some(height) => tracing::warn!("validation failed at height {height}"),
            None => tracing::debug!("validation succeeded"),
        }

        Ok(error_height)
    }

    async fn scan_new_blocks(&self, range: &BlockRange) -> Result<(), ProcessorError> {
        if range.is_empty() {
            tracing::debug!("no blocks to scan");
            return Ok(());
        }
        tracing::debug!("scanning blocks in range {}..={}", range.start(), range.end());

        let attempts = Cell::new(0);
        let result = retry_up_to(SCAN_RETRIES, |attempt| {
            attempts.set(attempt);
            self.scan_until_done(range)
        })
        .await;

        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProcessorError::FailedScan {
                attempts: attempts.get(),
                source: None,
            }),
            Err(exhausted) => Err(ProcessorError::FailedScan {
                attempts: exhausted.attempts,
                source: Some(exhausted.error.into()),
            }),
        }
    }

    /// Scans batch after batch until the scanner fails, stops advancing or reaches the end of
    /// `range`. Returns the result of the last scan call.
    async fn scan_until_done(&self, range: &BlockRange) -> Result<bool, ProcessorError> {
        let end = *range.end();
        let mut last_scanned = self.info.borrow().last_scanned_height();

        loop {
            let result = self
                .backend
                .scan_batch(self.config.scan_batch_size())
                .await
                .map_err(ProcessorError::backend)?;
            let scanned = self
                .repository
                .last_scanned_height()
                .await
                .map_err(ProcessorError::storage)?;

            let scanned_new_blocks = scanned != last_scanned;
            if scanned_new_blocks {
                tracing::debug!("scanned up to {scanned:?}");
                self.info.send_modify(|info| {
                    info.set_last_scanned_height(scanned);
                });
                last_scanned = scanned;
            }
            let reached_end = scanned.is_some_and(|height| height >= end);

            if !result || reached_end || self.is_stopped() {
                return Ok(result);
            }
            if !scanned_new_blocks {
                // no measured advance ends the scan even when the scanner reports success
                tracing::warn!("scan made no progress below {end}, ending scan for this cycle");
                return Ok(result);
            }
        }
    }
}
