//! Traits for interfacing the processor with the chain, the block store and the wallet
//!
//! All methods take `&self`. Implementations that hold mutable state use interior mutability.

use std::error::Error;

use zcash_protocol::consensus::BlockHeight;

use sync_status::BlockRange;

use crate::primitives::BlockSummary;

/// Source of compact blocks that persists what it fetches
#[allow(async_fn_in_trait)]
pub trait BlockSource {
    /// Errors associated with reaching the server or persisting blocks
    type Error: Error + Send + Sync + 'static;

    /// Returns the current chain tip reported by the server
    async fn latest_height(&self) -> Result<BlockHeight, Self::Error>;

    /// Fetches and persists an inclusive range of blocks, returning how many were written
    async fn fetch_range(&self, range: BlockRange) -> Result<u32, Self::Error>;

    /// Returns the highest persisted block, `None` when nothing has been downloaded
    async fn last_downloaded_height(&self) -> Result<Option<BlockHeight>, Self::Error>;

    /// Discards every persisted block above `height`
    async fn rewind_to(&self, height: BlockHeight) -> Result<(), Self::Error>;

    /// Releases the connection. Called once when the processor stops.
    async fn stop(&self);
}

/// Read access to the scanned transaction store
#[allow(async_fn_in_trait)]
pub trait TransactionStore {
    /// Errors associated with reading the store
    type Error: Error + Send + Sync + 'static;

    /// Returns true once the store has been created and seeded
    async fn is_initialized(&self) -> Result<bool, Self::Error>;

    /// Returns the highest scanned block, `None` when nothing has been scanned
    async fn last_scanned_height(&self) -> Result<Option<BlockHeight>, Self::Error>;
}

/// The validating and scanning capability of the wallet
#[allow(async_fn_in_trait)]
pub trait WalletBackend {
    /// Errors associated with the backend
    type Error: Error + Send + Sync + 'static;

    /// Checks that persisted blocks in `range` are gap free and chain-sequential.
    ///
    /// Returns the lowest inconsistent height, or `None` when the range is consistent.
    /// Must not mutate anything.
    async fn validate_chain_tail(
        &self,
        range: BlockRange,
    ) -> Result<Option<BlockHeight>, Self::Error>;

    /// Scans up to `batch_size` persisted blocks above the last scanned height.
    ///
    /// Returns false when scanning failed without an error to report.
    async fn scan_batch(&self, batch_size: u32) -> Result<bool, Self::Error>;

    /// Discards all scanned data above `height`
    async fn rewind_to(&self, height: BlockHeight) -> Result<(), Self::Error>;

    /// Total balance of `account` in zatoshi, including unconfirmed funds
    async fn balance(&self, account: u32) -> Result<u64, Self::Error>;

    /// Confirmed, spendable balance of `account` in zatoshi
    async fn verified_balance(&self, account: u32) -> Result<u64, Self::Error>;

    /// Default address of `account`
    async fn address(&self, account: u32) -> Result<String, Self::Error>;
}

/// Remote compact block server
#[allow(async_fn_in_trait)]
pub trait LightWalletService {
    /// Errors associated with the connection
    type Error: Error + Send + Sync + 'static;

    /// Returns the current chain tip
    async fn latest_block_height(&self) -> Result<BlockHeight, Self::Error>;

    /// Returns the blocks of an inclusive range in ascending order
    async fn block_range(&self, range: BlockRange) -> Result<Vec<BlockSummary>, Self::Error>;

    /// Closes the connection
    async fn shutdown(&self);
}

/// Local persistence for downloaded compact blocks
#[allow(async_fn_in_trait)]
pub trait CompactBlockStore {
    /// Errors associated with the store
    type Error: Error + Send + Sync + 'static;

    /// Returns the highest stored block, `None` when the store is empty
    async fn latest_height(&self) -> Result<Option<BlockHeight>, Self::Error>;

    /// Stores blocks, replacing any already stored at the same heights. Returns the number written.
    async fn write_blocks(&self, blocks: Vec<BlockSummary>) -> Result<u32, Self::Error>;

    /// Deletes every block above `height`
    async fn rewind_to(&self, height: BlockHeight) -> Result<(), Self::Error>;
}
