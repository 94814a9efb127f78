use std::cmp;

use zcash_protocol::consensus::BlockHeight;

use sync_status::state::State;
use sync_status::{range_len, BlockRange};

use super::CompactBlockProcessor;
use crate::error::ProcessorError;
use crate::retry::retry_up_to;
use crate::traits::{BlockSource, TransactionStore, WalletBackend};

impl<D, R, B> CompactBlockProcessor<D, R, B>
where
    D: BlockSource,
    R: TransactionStore,
    B: WalletBackend,
{
    /// Downloads `range` in batches of `download_batch_size`, publishing progress after each batch.
    ///
    /// Each batch starts at the end of the previous one. A stop request ends the loop between batches.
    pub(super) async fn download_new_blocks(&self, range: BlockRange) -> Result<(), ProcessorError> {
        if range.is_empty() {
            tracing::debug!("no blocks to download");
        } else {
            self.set_state(State::Downloading);

            let start = u32::from(*range.start());
            let end = u32::from(*range.end());
            let batch_size = self.config.download_batch_size();
            let missing_blocks = range_len(&range);
            let batches = missing_blocks / batch_size + u32::from(missing_blocks % batch_size != 0);
            tracing::debug!(
                "found {missing_blocks} missing blocks, downloading in {batches} batches of {batch_size}"
            );

            let mut downloaded_height = start;
            for i in 1..=batches {
                let batch_end = cmp::min(
                    start.saturating_add(i.saturating_mul(batch_size)) - 1,
                    end,
                );
                let batch = BlockHeight::from_u32(downloaded_height)..=BlockHeight::from_u32(batch_end);

                let count = retry_up_to(self.config.retries(), |_| {
                    self.downloader.fetch_range(batch.clone())
                })
                .await
                .map_err(|exhausted| ProcessorError::FailedDownload {
                    range: batch.clone(),
                    attempts: exhausted.attempts,
                    source: exhausted.error.into(),
                })?;
                tracing::debug!(
                    "downloaded {count} blocks in {downloaded_height}..={batch_end} (batch {i} of {batches})"
                );

                let progress = (f64::from(i) / f64::from(batches) * 100.0).round() as u8;
                self.progress.send_replace(progress);
                let last_downloaded = self
                    .downloader
                    .last_downloaded_height()
                    .await
                    .map_err(ProcessorError::downloader)?;
                self.info.send_modify(|info| {
                    info.set_last_downloaded_height(last_downloaded);
                });
                downloaded_height = batch_end;

                if self.is_stopped() {
                    tracing::debug!("download interrupted after batch {i} of {batches}");
                    return Ok(());
                }
            }
        }
        self.progress.send_replace(100);

        Ok(())
    }
}
