use std::cmp;

use zcash_protocol::consensus::BlockHeight;

use sync_status::processor_info::ProcessorInfo;
use sync_status::{empty_range, BlockRange};

use super::CompactBlockProcessor;
use crate::error::ProcessorError;
use crate::traits::{BlockSource, TransactionStore, WalletBackend};

impl<D, R, B> CompactBlockProcessor<D, R, B>
where
    D: BlockSource,
    R: TransactionStore,
    B: WalletBackend,
{
    /// Reads the three cursors, plans this cycle's ranges and publishes them.
    pub(super) async fn update_ranges(&self) -> Result<ProcessorInfo, ProcessorError> {
        let network_height = self
            .downloader
            .latest_height()
            .await
            .map_err(ProcessorError::downloader)?;
        let last_scanned = self
            .repository
            .last_scanned_height()
            .await
            .map_err(ProcessorError::storage)?;
        let last_downloaded = self
            .downloader
            .last_downloaded_height()
            .await
            .map_err(ProcessorError::downloader)?;

        let info = plan_ranges(
            network_height,
            last_scanned,
            last_downloaded,
            self.lower_bound_height,
        );
        tracing::debug!(
            "network height {network_height}, download range {:?}, scan range {:?}",
            info.last_download_range(),
            info.last_scan_range()
        );
        self.info.send_replace(info.clone());

        Ok(info)
    }
}

/// Plans the download and scan ranges of a cycle from the current cursors.
///
/// Downloads resume above whichever of the downloaded and scanned heights is higher, and never
/// start below `lower_bound`.
pub(crate) fn plan_ranges(
    network_height: BlockHeight,
    last_scanned: Option<BlockHeight>,
    last_downloaded: Option<BlockHeight>,
    lower_bound: BlockHeight,
) -> ProcessorInfo {
    let below_lower_bound = BlockHeight::from_u32(u32::from(lower_bound).saturating_sub(1));
    let last_downloaded = last_downloaded.map_or(below_lower_bound, |height| {
        cmp::max(height, below_lower_bound)
    });

    let scan_start = last_scanned.map_or(lower_bound, |height| height + 1);
    let download_floor = last_scanned.map_or(last_downloaded, |height| {
        cmp::max(height, last_downloaded)
    });
    let download_start = cmp::max(download_floor + 1, lower_bound);

    ProcessorInfo::from_parts(
        Some(network_height),
        last_scanned,
        Some(last_downloaded),
        inclusive(download_start, network_height),
        inclusive(scan_start, network_height),
    )
}

fn inclusive(start: BlockHeight, end: BlockHeight) -> BlockRange {
    if start > end {
        empty_range()
    } else {
        start..=end
    }
}
