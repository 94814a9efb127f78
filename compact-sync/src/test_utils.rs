//! In-memory collaborators for exercising the processor without a server or a wallet database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use zcash_primitives::block::BlockHash;
use zcash_protocol::consensus::BlockHeight;

use sync_status::BlockRange;

use crate::continuity::check_continuity;
use crate::primitives::BlockSummary;
use crate::traits::{CompactBlockStore, LightWalletService, TransactionStore, WalletBackend};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct MockError(pub &'static str);

pub(crate) fn h(height: u32) -> BlockHeight {
    BlockHeight::from_u32(height)
}

/// Deterministic hash of the block at `height` on `fork`.
pub(crate) fn hash(height: u32, fork: u32) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&height.to_le_bytes());
    bytes[4..8].copy_from_slice(&fork.to_le_bytes());
    BlockHash(bytes)
}

/// A block on `fork` that links to the block below it on the same fork.
pub(crate) fn block(height: u32, fork: u32) -> BlockSummary {
    BlockSummary::from_parts(
        h(height),
        hash(height, fork),
        hash(height.saturating_sub(1), fork),
        1_700_000_000 + height * 75,
    )
}

pub(crate) fn chain(start: u32, end: u32, fork: u32) -> Vec<BlockSummary> {
    (start..=end).map(|height| block(height, fork)).collect()
}

/// Waits until the watched value satisfies `predicate`.
pub(crate) async fn wait_until<T>(receiver: &mut watch::Receiver<T>, predicate: impl Fn(&T) -> bool) {
    loop {
        if predicate(&receiver.borrow_and_update()) {
            return;
        }
        receiver.changed().await.unwrap();
    }
}

#[derive(Debug)]
struct ChainInner {
    tip: u32,
    // heights at and above each key belong to the mapped fork
    forks: BTreeMap<u32, u32>,
}

/// The canonical chain as the server sees it.
#[derive(Debug, Clone)]
pub(crate) struct MockChain {
    inner: Arc<Mutex<ChainInner>>,
}

impl MockChain {
    pub(crate) fn new(tip: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChainInner {
                tip,
                forks: BTreeMap::new(),
            })),
        }
    }

    pub(crate) fn tip(&self) -> BlockHeight {
        h(self.inner.lock().unwrap().tip)
    }

    pub(crate) fn set_tip(&self, tip: u32) {
        self.inner.lock().unwrap().tip = tip;
    }

    /// Replaces every block from `height` upwards with blocks of a new fork.
    pub(crate) fn reorg_from(&self, height: u32) {
        let mut inner = self.inner.lock().unwrap();
        let next_fork = inner.forks.values().max().copied().unwrap_or(0) + 1;
        inner.forks.retain(|start, _| *start < height);
        inner.forks.insert(height, next_fork);
    }

    fn fork_at(&self, height: u32) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .forks
            .range(..=height)
            .next_back()
            .map_or(0, |(_, fork)| *fork)
    }

    pub(crate) fn block(&self, height: BlockHeight) -> BlockSummary {
        let height = u32::from(height);
        let fork = self.fork_at(height);
        BlockSummary::from_parts(
            h(height),
            hash(height, fork),
            hash(height.saturating_sub(1), self.fork_at(height.saturating_sub(1))),
            1_700_000_000 + height * 75,
        )
    }
}

#[derive(Debug, Default)]
struct ServiceInner {
    failing_tip_requests: AtomicU32,
    failing_range_requests: AtomicU32,
    range_requests: Mutex<Vec<BlockRange>>,
    shut_down: AtomicBool,
}

/// Light wallet server backed by a [`MockChain`].
#[derive(Debug, Clone)]
pub(crate) struct MockService {
    chain: MockChain,
    inner: Arc<ServiceInner>,
}

impl MockService {
    pub(crate) fn new(chain: MockChain) -> Self {
        Self {
            chain,
            inner: Arc::default(),
        }
    }

    pub(crate) fn fail_next_requests(&self, count: u32) {
        self.inner
            .failing_range_requests
            .store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_tip_requests(&self, count: u32) {
        self.inner.failing_tip_requests.store(count, Ordering::SeqCst);
    }

    pub(crate) fn requested_ranges(&self) -> Vec<BlockRange> {
        self.inner.range_requests.lock().unwrap().clone()
    }

    pub(crate) fn range_requests(&self) -> usize {
        self.inner.range_requests.lock().unwrap().len()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl LightWalletService for MockService {
    type Error = MockError;

    async fn latest_block_height(&self) -> Result<BlockHeight, Self::Error> {
        if take_failure(&self.inner.failing_tip_requests) {
            return Err(MockError("connection refused"));
        }
        Ok(self.chain.tip())
    }

    async fn block_range(&self, range: BlockRange) -> Result<Vec<BlockSummary>, Self::Error> {
        self.inner.range_requests.lock().unwrap().push(range.clone());
        // lets other futures on the test task observe progress between batches
        tokio::task::yield_now().await;
        if take_failure(&self.inner.failing_range_requests) {
            return Err(MockError("stream reset"));
        }
        let tip = self.chain.tip();
        Ok((u32::from(*range.start())..=u32::from(*range.end()))
            .map(h)
            .filter(|height| *height <= tip)
            .map(|height| self.chain.block(height))
            .collect())
    }

    async fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Block store over a shared map. Clones see the same blocks.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryBlockStore {
    blocks: Arc<Mutex<BTreeMap<BlockHeight, BlockSummary>>>,
    writes: Arc<AtomicU32>,
}

impl MemoryBlockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_blocks(blocks: Vec<BlockSummary>) -> Self {
        let store = Self::new();
        store
            .blocks
            .lock()
            .unwrap()
            .extend(blocks.into_iter().map(|block| (block.height(), block)));
        store
    }

    pub(crate) fn block(&self, height: BlockHeight) -> Option<BlockSummary> {
        self.blocks.lock().unwrap().get(&height).copied()
    }

    pub(crate) fn blocks_in(&self, range: &BlockRange) -> Vec<BlockSummary> {
        if range.is_empty() {
            return Vec::new();
        }
        self.blocks
            .lock()
            .unwrap()
            .range(range.clone())
            .map(|(_, block)| *block)
            .collect()
    }

    pub(crate) fn tip(&self) -> Option<BlockHeight> {
        self.blocks.lock().unwrap().keys().next_back().copied()
    }

    pub(crate) fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CompactBlockStore for MemoryBlockStore {
    type Error = MockError;

    async fn latest_height(&self) -> Result<Option<BlockHeight>, Self::Error> {
        Ok(self.tip())
    }

    async fn write_blocks(&self, blocks: Vec<BlockSummary>) -> Result<u32, Self::Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let count = blocks.len() as u32;
        self.blocks
            .lock()
            .unwrap()
            .extend(blocks.into_iter().map(|block| (block.height(), block)));
        Ok(count)
    }

    async fn rewind_to(&self, height: BlockHeight) -> Result<(), Self::Error> {
        self.blocks.lock().unwrap().retain(|key, _| *key <= height);
        Ok(())
    }
}

#[derive(Debug)]
struct BackendInner {
    initialized: AtomicBool,
    scanned: Mutex<Option<BlockHeight>>,
    forced_chain_error: Mutex<Option<(BlockHeight, bool)>>,
    scan_errors: AtomicU32,
    scan_result: AtomicBool,
    stalled: AtomicBool,
    scan_calls: AtomicU32,
    rewinds: Mutex<Vec<BlockHeight>>,
    balance_error: AtomicBool,
}

/// Wallet backend and transaction store in one, scanning whatever the [`MemoryBlockStore`] holds.
#[derive(Debug, Clone)]
pub(crate) struct MockBackend {
    store: MemoryBlockStore,
    inner: Arc<BackendInner>,
}

impl MockBackend {
    pub(crate) fn new(store: MemoryBlockStore, scanned: Option<u32>) -> Self {
        Self {
            store,
            inner: Arc::new(BackendInner {
                initialized: AtomicBool::new(true),
                scanned: Mutex::new(scanned.map(h)),
                forced_chain_error: Mutex::new(None),
                scan_errors: AtomicU32::new(0),
                scan_result: AtomicBool::new(true),
                stalled: AtomicBool::new(false),
                scan_calls: AtomicU32::new(0),
                rewinds: Mutex::new(Vec::new()),
                balance_error: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn set_initialized(&self, initialized: bool) {
        self.inner.initialized.store(initialized, Ordering::SeqCst);
    }

    /// Validation reports `height` on its next call only.
    pub(crate) fn fail_validation_once_at(&self, height: u32) {
        *self.inner.forced_chain_error.lock().unwrap() = Some((h(height), false));
    }

    /// Validation reports `height` on every call.
    pub(crate) fn fail_validation_at(&self, height: u32) {
        *self.inner.forced_chain_error.lock().unwrap() = Some((h(height), true));
    }

    pub(crate) fn fail_next_scans(&self, count: u32) {
        self.inner.scan_errors.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_scan_result(&self, result: bool) {
        self.inner.scan_result.store(result, Ordering::SeqCst);
    }

    pub(crate) fn stall(&self) {
        self.inner.stalled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_balance(&self) {
        self.inner.balance_error.store(true, Ordering::SeqCst);
    }

    pub(crate) fn scanned(&self) -> Option<BlockHeight> {
        *self.inner.scanned.lock().unwrap()
    }

    pub(crate) fn scan_calls(&self) -> u32 {
        self.inner.scan_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn rewinds(&self) -> Vec<BlockHeight> {
        self.inner.rewinds.lock().unwrap().clone()
    }
}

impl TransactionStore for MockBackend {
    type Error = MockError;

    async fn is_initialized(&self) -> Result<bool, Self::Error> {
        Ok(self.inner.initialized.load(Ordering::SeqCst))
    }

    async fn last_scanned_height(&self) -> Result<Option<BlockHeight>, Self::Error> {
        Ok(self.scanned())
    }
}

impl WalletBackend for MockBackend {
    type Error = MockError;

    async fn validate_chain_tail(
        &self,
        range: BlockRange,
    ) -> Result<Option<BlockHeight>, Self::Error> {
        {
            let mut forced = self.inner.forced_chain_error.lock().unwrap();
            if let Some((height, repeat)) = *forced {
                if !repeat {
                    *forced = None;
                }
                return Ok(Some(height));
            }
        }
        let previous = self.store.block(*range.start() - 1);
        let blocks = self.store.blocks_in(&range);
        Ok(check_continuity(&blocks, previous.as_ref())
            .err()
            .map(|error| error.height()))
    }

    async fn scan_batch(&self, batch_size: u32) -> Result<bool, Self::Error> {
        self.inner.scan_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.inner.scan_errors) {
            return Err(MockError("trial decryption failed"));
        }
        if !self.inner.scan_result.load(Ordering::SeqCst) {
            return Ok(false);
        }
        if self.inner.stalled.load(Ordering::SeqCst) {
            return Ok(true);
        }
        let mut scanned = self.inner.scanned.lock().unwrap();
        let Some(tip) = self.store.tip() else {
            return Ok(true);
        };
        let next = scanned.map_or(h(1), |height| height + 1);
        if next <= tip {
            let end = std::cmp::min(next + (batch_size - 1), tip);
            *scanned = Some(end);
        }
        Ok(true)
    }

    async fn rewind_to(&self, height: BlockHeight) -> Result<(), Self::Error> {
        self.inner.rewinds.lock().unwrap().push(height);
        let mut scanned = self.inner.scanned.lock().unwrap();
        *scanned = scanned.map(|scanned| std::cmp::min(scanned, height));
        Ok(())
    }

    async fn balance(&self, _account: u32) -> Result<u64, Self::Error> {
        if self.inner.balance_error.load(Ordering::SeqCst) {
            return Err(MockError("database locked"));
        }
        Ok(150_000)
    }

    async fn verified_balance(&self, _account: u32) -> Result<u64, Self::Error> {
        if self.inner.balance_error.load(Ordering::SeqCst) {
            return Err(MockError("database locked"));
        }
        Ok(100_000)
    }

    async fn address(&self, account: u32) -> Result<String, Self::Error> {
        Ok(format!("zregtestsapling1account{account}"))
    }
}
