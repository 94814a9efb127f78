#![forbid(unsafe_code)]
//! Chain selection, sync tuning and logging setup for the compact block processor.
use std::{sync::Once, time::Duration};

use getset::CopyGetters;
use zcash_protocol::consensus::{
    BlockHeight, NetworkUpgrade, Parameters, MAIN_NETWORK, TEST_NETWORK,
};

/// Blocks requested from the server per download batch.
pub const DOWNLOAD_BATCH_SIZE: u32 = 100;
/// Blocks handed to the scanner per scan call.
pub const SCAN_BATCH_SIZE: u32 = 150;
/// Attempts per download batch, and the ceiling on consecutive reorg repairs.
pub const RETRIES: u32 = 5;
/// Base step of a reorg rewind. Grows with every consecutive chain error.
pub const REWIND_DISTANCE: u32 = 10;
pub const MAX_REORG: u32 = 100;
pub const POLL_INTERVAL: Duration = Duration::from_secs(75);
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BACKOFF_INTERVAL: Duration = Duration::from_secs(600);

static LOG_INIT: Once = Once::new();

/// Installs a `tracing_subscriber::fmt` subscriber the first time it is called.
///
/// Later calls, or a subscriber installed elsewhere, leave the global subscriber untouched.
pub fn init_logging() {
    LOG_INIT.call_once(|| {
        if tracing_subscriber::fmt().try_init().is_err() {
            tracing::debug!("global subscriber already installed");
        }
    });
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChainType {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl ChainType {
    /// Height at which Sapling activates. Nothing below it is ever downloaded or scanned.
    ///
    /// ```
    /// use sync_config::ChainType;
    ///
    /// assert_eq!(u32::from(ChainType::Mainnet.sapling_activation_height()), 419_200);
    /// assert_eq!(u32::from(ChainType::Testnet.sapling_activation_height()), 280_000);
    /// assert_eq!(u32::from(ChainType::Regtest.sapling_activation_height()), 1);
    /// ```
    pub fn sapling_activation_height(&self) -> BlockHeight {
        let height = match self {
            ChainType::Mainnet => MAIN_NETWORK.activation_height(NetworkUpgrade::Sapling),
            ChainType::Testnet => TEST_NETWORK.activation_height(NetworkUpgrade::Sapling),
            ChainType::Regtest => None,
        };
        height.unwrap_or(BlockHeight::from_u32(1))
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChainType::Mainnet => "main",
            ChainType::Testnet => "test",
            ChainType::Regtest => "regtest",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("download batch size must be at least 1")]
    ZeroDownloadBatchSize,
    #[error("scan batch size must be at least 1")]
    ZeroScanBatchSize,
    #[error("retries must be at least 1")]
    ZeroRetries,
    #[error("rewind distance {rewind_distance} exceeds max reorg size {max_reorg_size}")]
    RewindBeyondMaxReorg {
        rewind_distance: u32,
        max_reorg_size: u32,
    },
}

/// Tuning for the compact block processor.
#[derive(Clone, Debug, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct SyncConfig {
    chain: ChainType,
    download_batch_size: u32,
    scan_batch_size: u32,
    retries: u32,
    rewind_distance: u32,
    max_reorg_size: u32,
    poll_interval: Duration,
    initial_backoff: Duration,
    max_backoff_interval: Duration,
}

impl SyncConfig {
    pub fn new(chain: ChainType) -> Self {
        Self {
            chain,
            download_batch_size: DOWNLOAD_BATCH_SIZE,
            scan_batch_size: SCAN_BATCH_SIZE,
            retries: RETRIES,
            rewind_distance: REWIND_DISTANCE,
            max_reorg_size: MAX_REORG,
            poll_interval: POLL_INTERVAL,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff_interval: MAX_BACKOFF_INTERVAL,
        }
    }

    pub fn with_download_batch_size(mut self, download_batch_size: u32) -> Self {
        self.download_batch_size = download_batch_size;
        self
    }

    pub fn with_scan_batch_size(mut self, scan_batch_size: u32) -> Self {
        self.scan_batch_size = scan_batch_size;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_rewind_distance(mut self, rewind_distance: u32) -> Self {
        self.rewind_distance = rewind_distance;
        self
    }

    pub fn with_max_reorg_size(mut self, max_reorg_size: u32) -> Self {
        self.max_reorg_size = max_reorg_size;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_max_backoff_interval(mut self, max_backoff_interval: Duration) -> Self {
        self.max_backoff_interval = max_backoff_interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download_batch_size == 0 {
            return Err(ConfigError::ZeroDownloadBatchSize);
        }
        if self.scan_batch_size == 0 {
            return Err(ConfigError::ZeroScanBatchSize);
        }
        if self.retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.rewind_distance > self.max_reorg_size {
            return Err(ConfigError::RewindBeyondMaxReorg {
                rewind_distance: self.rewind_distance,
                max_reorg_size: self.max_reorg_size,
            });
        }
        Ok(())
    }

    /// Lowest height the processor will ever download, scan or rewind to.
    ///
    /// Reaches back `max_reorg_size` blocks below `minimum_height` so that a reorg around the
    /// wallet birthday can still be repaired, but never below Sapling activation.
    ///
    /// ```
    /// use sync_config::{ChainType, SyncConfig};
    /// use zcash_protocol::consensus::BlockHeight;
    ///
    /// let config = SyncConfig::new(ChainType::Mainnet);
    /// assert_eq!(
    ///     config.lower_bound_height(BlockHeight::from_u32(1_000_000)),
    ///     BlockHeight::from_u32(999_900)
    /// );
    /// assert_eq!(
    ///     config.lower_bound_height(BlockHeight::from_u32(0)),
    ///     BlockHeight::from_u32(419_200)
    /// );
    /// ```
    pub fn lower_bound_height(&self, minimum_height: BlockHeight) -> BlockHeight {
        let reorg_floor =
            BlockHeight::from_u32(u32::from(minimum_height).saturating_sub(self.max_reorg_size));
        std::cmp::max(self.chain.sapling_activation_height(), reorg_floor)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(ChainType::default())
    }
}
