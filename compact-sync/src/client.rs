//! Module for handling all connections to the server
//!
//! [`CompactBlockDownloader`] pairs a [`LightWalletService`] with a [`CompactBlockStore`] so that
//! every fetched range lands in local storage before the processor validates it.

use zcash_protocol::consensus::BlockHeight;

use sync_status::BlockRange;

use crate::traits::{BlockSource, CompactBlockStore, LightWalletService};

/// Errors from either half of a [`CompactBlockDownloader`]
#[derive(Debug, thiserror::Error)]
pub enum DownloaderError<SE, CE>
where
    SE: std::error::Error + 'static,
    CE: std::error::Error + 'static,
{
    /// The server could not be reached or returned an error
    #[error("Light wallet service error. {0}")]
    Service(#[source] SE),
    /// The block store failed
    #[error("Compact block store error. {0}")]
    Store(#[source] CE),
}

/// Downloads compact blocks from the server and persists them
#[derive(Debug)]
pub struct CompactBlockDownloader<S, C> {
    service: S,
    store: C,
}

impl<S, C> CompactBlockDownloader<S, C>
where
    S: LightWalletService,
    C: CompactBlockStore,
{
    /// Creates a downloader writing blocks from `service` into `store`
    pub fn new(service: S, store: C) -> Self {
        Self { service, store }
    }

    /// The server half
    pub fn service(&self) -> &S {
        &self.service
    }

    /// The storage half
    pub fn store(&self) -> &C {
        &self.store
    }
}

impl<S, C> BlockSource for CompactBlockDownloader<S, C>
where
    S: LightWalletService,
    C: CompactBlockStore,
{
    type Error = DownloaderError<S::Error, C::Error>;

    async fn latest_height(&self) -> Result<BlockHeight, Self::Error> {
        self.service
            .latest_block_height()
            .await
            .map_err(DownloaderError::Service)
    }

    async fn fetch_range(&self, range: BlockRange) -> Result<u32, Self::Error> {
        if range.is_empty() {
            return Ok(0);
        }
        let blocks = self
            .service
            .block_range(range.clone())
            .await
            .map_err(DownloaderError::Service)?;
        tracing::debug!(
            "fetched {} blocks in range {}..={}",
            blocks.len(),
            range.start(),
            range.end()
        );

        self.store
            .write_blocks(blocks)
            .await
            .map_err(DownloaderError::Store)
    }

    async fn last_downloaded_height(&self) -> Result<Option<BlockHeight>, Self::Error> {
        self.store
            .latest_height()
            .await
            .map_err(DownloaderError::Store)
    }

    async fn rewind_to(&self, height: BlockHeight) -> Result<(), Self::Error> {
        tracing::debug!("rewinding compact block store to {height}");
        self.store
            .rewind_to(height)
            .await
            .map_err(DownloaderError::Store)
    }

    async fn stop(&self) {
        self.service.shutdown().await;
    }
}
