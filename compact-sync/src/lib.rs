#![warn(missing_docs)]
//! Compact block sync processor
//!
//! Entrypoint: [`crate::processor::CompactBlockProcessor`]
//!
//! The processor keeps three cursors in step: the network tip reported by a [`traits::BlockSource`],
//! the last downloaded block and the last scanned block of a [`traits::TransactionStore`]. Downloaded
//! blocks are validated and scanned through a [`traits::WalletBackend`]. Reorgs are repaired by
//! rewinding both stores.

pub mod client;
#[allow(missing_docs)]
pub mod continuity;
pub mod error;
#[allow(missing_docs)]
pub mod primitives;
#[allow(missing_docs)]
pub mod processor;
#[allow(missing_docs)]
pub mod retry;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_utils;

pub use sync_config::{init_logging, ChainType, SyncConfig};
pub use sync_status::{
    balance::WalletBalance, processor_info::ProcessorInfo, state::State, BlockRange,
};
