//! Top level error module for the crate

use zcash_protocol::consensus::BlockHeight;

use sync_status::BlockRange;

/// Collaborator errors are carried type-erased so the processor error stays non-generic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top level error enum encapsulating any error that may occur while processing blocks
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The block source failed outside of a retried download batch
    #[error("Block source error. {0}")]
    Downloader(#[source] BoxError),
    /// The transaction store failed
    #[error("Transaction store error. {0}")]
    Storage(#[source] BoxError),
    /// The wallet backend failed outside of scanning
    #[error("Wallet backend error. {0}")]
    Backend(#[source] BoxError),
    /// A download batch failed on every attempt
    #[error("Failed to download blocks {}..={} after {attempts} attempts. {source}", .range.start(), .range.end())]
    FailedDownload {
        /// The batch that could not be downloaded
        range: BlockRange,
        /// Attempts made
        attempts: u32,
        /// Last error reported by the block source
        #[source]
        source: BoxError,
    },
    /// Scanning errored on every attempt, or the scanner reported failure
    #[error("Failed to scan new blocks after {attempts} attempts")]
    FailedScan {
        /// Attempts made
        attempts: u32,
        /// Last error, absent when the scanner returned failure without one
        #[source]
        source: Option<BoxError>,
    },
    /// The transaction store has not been set up
    #[error("Transaction store is not initialized")]
    Uninitialized,
    /// Consecutive reorg repairs did not converge
    #[error("Failed to repair reorg at height {height} after {attempts} rewinds")]
    FailedReorgRepair {
        /// Height of the last chain error
        height: BlockHeight,
        /// Rewinds performed before giving up
        attempts: u32,
    },
    /// The processor was stopped and cannot be started again
    #[error("Processor has been stopped")]
    AlreadyStopped,
    /// Another call to `start` is still running cycles
    #[error("Processor is already running")]
    AlreadyRunning,
    /// A balance query failed
    #[error("Failed to get balance. {0}")]
    Balance(#[source] BoxError),
}

impl ProcessorError {
    pub(crate) fn downloader(error: impl Into<BoxError>) -> Self {
        Self::Downloader(error.into())
    }

    pub(crate) fn storage(error: impl Into<BoxError>) -> Self {
        Self::Storage(error.into())
    }

    pub(crate) fn backend(error: impl Into<BoxError>) -> Self {
        Self::Backend(error.into())
    }

    pub(crate) fn balance(error: impl Into<BoxError>) -> Self {
        Self::Balance(error.into())
    }

    /// Errors that are never retried. They stop the processor.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Uninitialized
                | Self::FailedReorgRepair { .. }
                | Self::AlreadyStopped
                | Self::AlreadyRunning
        )
    }

    /// Errors that mean the block source could not be reached.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Downloader(_) | Self::FailedDownload { .. })
    }
}
