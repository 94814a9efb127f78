//! Entrypoint for the compact block processor
//!
//! Each cycle plans the download and scan ranges, downloads new blocks, validates the persisted
//! tail and then either scans or rewinds after a reorg. Cycles repeat until [`CompactBlockProcessor::stop`]
//! is called or a fatal error occurs.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use zcash_protocol::consensus::BlockHeight;

use sync_config::{ConfigError, SyncConfig};
use sync_status::balance::WalletBalance;
use sync_status::processor_info::ProcessorInfo;
use sync_status::state::State;

use crate::error::ProcessorError;
use crate::retry::retry_with_backoff;
use crate::traits::{BlockSource, TransactionStore, WalletBackend};

mod download;
mod ranges;
mod reorg;
mod scan;

/// Decides whether the processor keeps running after a non-fatal error. Returning false stops it.
pub type ProcessorErrorListener = Box<dyn Fn(&ProcessorError) -> bool + Send + Sync>;

/// Notified with `(error_height, rewind_height)` after every reorg rewind.
pub type ChainErrorListener = Box<dyn Fn(BlockHeight, BlockHeight) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Processed,
    ChainError(BlockHeight),
    Stopped,
}

/// Downloads, validates and scans compact blocks, keeping a wallet in step with the chain tip.
///
/// State, progress and [`ProcessorInfo`] are published through watch channels so that every
/// subscriber sees the latest value immediately.
pub struct CompactBlockProcessor<D, R, B> {
    downloader: D,
    repository: R,
    backend: B,
    config: SyncConfig,
    lower_bound_height: BlockHeight,
    consecutive_chain_errors: AtomicU32,
    running: AtomicBool,
    state: watch::Sender<State>,
    progress: watch::Sender<u8>,
    info: watch::Sender<ProcessorInfo>,
    on_processor_error: Option<ProcessorErrorListener>,
    on_chain_error: Option<ChainErrorListener>,
}

impl<D, R, B> CompactBlockProcessor<D, R, B>
where
    D: BlockSource,
    R: TransactionStore,
    B: WalletBackend,
{
    /// Creates a processor that never looks below `minimum_height` less the maximum reorg size.
    ///
    /// `minimum_height` is usually the wallet birthday.
    pub fn new(
        downloader: D,
        repository: R,
        backend: B,
        config: SyncConfig,
        minimum_height: BlockHeight,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let lower_bound_height = config.lower_bound_height(minimum_height);
        let (state, _) = watch::channel(State::Initialized);
        let (progress, _) = watch::channel(0);
        let (info, _) = watch::channel(ProcessorInfo::default());

        Ok(Self {
            downloader,
            repository,
            backend,
            config,
            lower_bound_height,
            consecutive_chain_errors: AtomicU32::new(0),
            running: AtomicBool::new(false),
            state,
            progress,
            info,
            on_processor_error: None,
            on_chain_error: None,
        })
    }

    pub fn with_processor_error_listener(
        mut self,
        listener: impl Fn(&ProcessorError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_processor_error = Some(Box::new(listener));
        self
    }

    pub fn with_chain_error_listener(
        mut self,
        listener: impl Fn(BlockHeight, BlockHeight) + Send + Sync + 'static,
    ) -> Self {
        self.on_chain_error = Some(Box::new(listener));
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn lower_bound_height(&self) -> BlockHeight {
        self.lower_bound_height
    }

    pub fn state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Download progress of the current cycle, 0 to 100.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn processor_info(&self) -> watch::Receiver<ProcessorInfo> {
        self.info.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.borrow().is_stopped()
    }

    /// Runs cycles until the processor is stopped.
    ///
    /// Returns `Ok` after [`Self::stop`]. Returns the error that ended processing when it was fatal
    /// or when the processor error listener declined to continue, in which case the processor
    /// is stopped before returning.
    ///
    /// Only one call runs cycles at a time. A concurrent call returns
    /// [`ProcessorError::AlreadyRunning`] and leaves the running one untouched.
    pub async fn start(&self) -> Result<(), ProcessorError> {
        if self.is_stopped() {
            return Err(ProcessorError::AlreadyStopped);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("compact block processor is already running");
            return Err(ProcessorError::AlreadyRunning);
        }

        let result = match self.verify_setup().await {
            Ok(()) => {
                tracing::info!(
                    "starting compact block processor with lower bound {}",
                    self.lower_bound_height
                );
                self.run().await
            }
            Err(error) => Err(error),
        };

        let result = match result {
            Ok(()) => {
                tracing::info!("compact block processor stopped");
                Ok(())
            }
            Err(error) => {
                tracing::error!("compact block processor failed. {error}");
                self.stop().await;
                Err(error)
            }
        };
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Stops the processor. Running stages exit at their next checkpoint.
    pub async fn stop(&self) {
        let stopped = self.state.send_if_modified(|state| {
            if state.is_stopped() {
                false
            } else {
                *state = State::Stopped;
                true
            }
        });
        if stopped {
            tracing::info!("stopping compact block processor");
            self.downloader.stop().await;
        }
    }

    pub async fn last_downloaded_height(&self) -> Result<Option<BlockHeight>, ProcessorError> {
        self.downloader
            .last_downloaded_height()
            .await
            .map_err(ProcessorError::downloader)
    }

    pub async fn last_scanned_height(&self) -> Result<Option<BlockHeight>, ProcessorError> {
        self.repository
            .last_scanned_height()
            .await
            .map_err(ProcessorError::storage)
    }

    pub async fn get_address(&self, account: u32) -> Result<String, ProcessorError> {
        self.backend
            .address(account)
            .await
            .map_err(ProcessorError::backend)
    }

    /// Total and spendable balance of `account`.
    pub async fn get_balance_info(&self, account: u32) -> Result<WalletBalance, ProcessorError> {
        let total = self
            .backend
            .balance(account)
            .await
            .map_err(ProcessorError::balance)?;
        let available = self
            .backend
            .verified_balance(account)
            .await
            .map_err(ProcessorError::balance)?;

        Ok(WalletBalance::new(total, available))
    }

    async fn verify_setup(&self) -> Result<(), ProcessorError> {
        let initialized = self
            .repository
            .is_initialized()
            .await
            .map_err(ProcessorError::storage)?;
        if initialized {
            Ok(())
        } else {
            Err(ProcessorError::Uninitialized)
        }
    }

    async fn run(&self) -> Result<(), ProcessorError> {
        while !self.is_stopped() {
            retry_with_backoff(
                |error| self.handle_processor_error(error),
                self.config.initial_backoff(),
                self.config.max_backoff_interval(),
                || self.run_cycle(),
                |delay| self.sleep_or_stop(delay),
            )
            .await?;
        }

        Ok(())
    }

    /// One cycle and its follow-up. The backoff sequence starts over with every call.
    async fn run_cycle(&self) -> Result<(), ProcessorError> {
        if self.is_stopped() {
            return Ok(());
        }
        match self.process_new_blocks().await? {
            CycleOutcome::Processed => {
                self.consecutive_chain_errors.store(0, Ordering::SeqCst);
                self.sleep_or_stop(self.config.poll_interval()).await;
            }
            CycleOutcome::ChainError(error_height) => {
                self.handle_chain_error(error_height).await?
            }
            CycleOutcome::Stopped => {}
        }

        Ok(())
    }

    async fn process_new_blocks(&self) -> Result<CycleOutcome, ProcessorError> {
        tracing::debug!(
            "beginning to process new blocks with lower bound {}",
            self.lower_bound_height
        );
        let info = self.update_ranges().await?;

        if info.last_download_range().is_empty() && info.last_scan_range().is_empty() {
            tracing::debug!("nothing to process, no new blocks to download or scan");
            self.set_state(State::Scanned(info.last_scan_range().clone()));
            return Ok(CycleOutcome::Processed);
        }

        self.download_new_blocks(info.last_download_range().clone())
            .await?;
        if self.is_stopped() {
            return Ok(CycleOutcome::Stopped);
        }

        self.validate_and_scan_new_blocks(info.last_scan_range().clone())
            .await
    }

    fn handle_processor_error(&self, error: &ProcessorError) -> bool {
        if error.is_fatal() {
            return false;
        }
        if self.is_stopped() {
            tracing::debug!("ignoring error after stop. {error}");
            return true;
        }
        if error.is_network() {
            self.set_state(State::Disconnected);
        }
        tracing::warn!("error while processing blocks. {error}");

        self.on_processor_error
            .as_ref()
            .map_or(true, |listener| listener(error))
    }

    /// Publishes `new_state` unless the processor has stopped or is already in it.
    fn set_state(&self, new_state: State) {
        self.state.send_if_modified(|state| {
            if state.is_stopped() || *state == new_state {
                return false;
            }
            tracing::debug!("state changed from {state} to {new_state}");
            *state = new_state;
            true
        });
    }

    /// Sleeps for `duration`, waking early on stop. Returns true if stopped.
    async fn sleep_or_stop(&self, duration: Duration) -> bool {
        let mut state = self.state.subscribe();
        let stopped = async {
            loop {
                if state.borrow_and_update().is_stopped() {
                    return;
                }
                if state.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_stopped(),
            _ = stopped => true,
        }
    }
}
