//! Snapshot of where the processor is relative to the network tip.

use getset::{CopyGetters, Getters, Setters};
use zcash_protocol::consensus::BlockHeight;

use crate::{empty_range, BlockRange};

/// Progress snapshot published by the processor after every height change.
///
/// A `None` height means the value is not known yet.
#[derive(Clone, Debug, PartialEq, Eq, CopyGetters, Getters, Setters)]
#[getset(set = "pub")]
pub struct ProcessorInfo {
    /// Latest height reported by the block source
    #[getset(get_copy = "pub")]
    network_block_height: Option<BlockHeight>,
    /// Latest height whose transactions are in the store
    #[getset(get_copy = "pub")]
    last_scanned_height: Option<BlockHeight>,
    /// Latest height persisted by the block source
    #[getset(get_copy = "pub")]
    last_downloaded_height: Option<BlockHeight>,
    /// Range planned for download in the current cycle
    #[getset(get = "pub")]
    last_download_range: BlockRange,
    /// Range planned for scanning in the current cycle
    #[getset(get = "pub")]
    last_scan_range: BlockRange,
}

impl ProcessorInfo {
    /// Creates a snapshot from its parts.
    pub fn from_parts(
        network_block_height: Option<BlockHeight>,
        last_scanned_height: Option<BlockHeight>,
        last_downloaded_height: Option<BlockHeight>,
        last_download_range: BlockRange,
        last_scan_range: BlockRange,
    ) -> Self {
        Self {
            network_block_height,
            last_scanned_height,
            last_downloaded_height,
            last_download_range,
            last_scan_range,
        }
    }

    /// Returns true when there is a download range left to fetch.
    ///
    /// ```
    /// use sync_status::processor_info::ProcessorInfo;
    /// use zcash_protocol::consensus::BlockHeight;
    ///
    /// let h = BlockHeight::from_u32;
    /// let mut info = ProcessorInfo::default();
    /// info.set_last_download_range(h(991)..=h(1000));
    /// info.set_last_downloaded_height(Some(h(995)));
    /// assert!(info.is_downloading());
    /// info.set_last_downloaded_height(Some(h(1000)));
    /// assert!(!info.is_downloading());
    /// ```
    pub fn is_downloading(&self) -> bool {
        !self.last_download_range.is_empty()
            && below(self.last_downloaded_height, *self.last_download_range.end())
    }

    /// Returns true when downloading is done and the scan range is not yet consumed.
    pub fn is_scanning(&self) -> bool {
        !self.is_downloading()
            && !self.last_scan_range.is_empty()
            && below(self.last_scanned_height, *self.last_scan_range.end())
    }

    /// Scan progress in percent over the current scan range.
    ///
    /// ```
    /// use sync_status::processor_info::ProcessorInfo;
    /// use zcash_protocol::consensus::BlockHeight;
    ///
    /// let h = BlockHeight::from_u32;
    /// let info = ProcessorInfo::from_parts(
    ///     Some(h(1000)),
    ///     Some(h(995)),
    ///     Some(h(1000)),
    ///     h(991)..=h(1000),
    ///     h(991)..=h(1000),
    /// );
    /// assert_eq!(info.scan_progress(), 50);
    /// ```
    pub fn scan_progress(&self) -> u8 {
        let Some(scanned) = self.last_scanned_height else {
            return 0;
        };
        if self.last_scan_range.is_empty() || scanned >= *self.last_scan_range.end() {
            return 100;
        }
        let start = i64::from(u32::from(*self.last_scan_range.start()));
        let end = i64::from(u32::from(*self.last_scan_range.end()));
        let done = i64::from(u32::from(scanned)) - start + 1;
        let percent = (100.0 * done as f64 / (end - start + 1) as f64).round();

        percent.clamp(0.0, 100.0) as u8
    }

    /// False only while every field still holds its initial value.
    pub fn has_data(&self) -> bool {
        *self != Self::default()
    }
}

impl Default for ProcessorInfo {
    fn default() -> Self {
        Self {
            network_block_height: None,
            last_scanned_height: None,
            last_downloaded_height: None,
            last_download_range: empty_range(),
            last_scan_range: empty_range(),
        }
    }
}

fn below(height: Option<BlockHeight>, end: BlockHeight) -> bool {
    height.map_or(true, |h| h < end)
}
