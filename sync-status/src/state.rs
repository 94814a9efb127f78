//! The processor is always in exactly one of these states:
//!  Initialized === constructed, no cycle has run yet
//!  Downloading, Validating, Scanning === a stage of the current cycle is running
//!  Scanned === a cycle completed, carrying the range it covered
//!  Disconnected === the last cycle failed to reach the block source
//!  Stopped === terminal, nothing runs after this

use crate::BlockRange;

/// Processor states. Every transition is broadcast to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// The initial state of the processor, once it is constructed.
    Initialized,
    /// The latest block height available from the server is greater than what we have locally and
    /// compact blocks are being downloaded.
    Downloading,
    /// Downloaded blocks are being checked for gaps and for chain-sequential hashes, which is how
    /// a reorg is detected.
    Validating,
    /// Downloaded blocks are being decrypted.
    Scanning,
    /// Done decrypting blocks, for now. Carries the range that was just completed.
    Scanned(BlockRange),
    /// No connection to the block source.
    Disconnected,
    /// `stop` has been called. Processors are not restarted.
    Stopped,
}

impl State {
    /// States that imply a live connection to the block source.
    /// # Examples
    ///
    /// ```
    /// use sync_status::state::State;
    ///
    /// assert!(State::Downloading.is_connected());
    /// assert!(State::Scanned(sync_status::empty_range()).is_connected());
    /// assert!(!State::Disconnected.is_connected());
    /// assert!(!State::Initialized.is_connected());
    /// ```
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::Downloading | Self::Validating | Self::Scanning | Self::Scanned(_)
        )
    }

    /// States that belong to a sync cycle.
    pub fn is_syncing(&self) -> bool {
        self.is_connected()
    }

    /// # Examples
    ///
    /// ```
    /// use sync_status::state::State;
    ///
    /// assert!(State::Stopped.is_stopped());
    /// assert!(!State::Scanning.is_stopped());
    /// ```
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns the completed range if this is [`State::Scanned`].
    pub fn scanned_range(&self) -> Option<&BlockRange> {
        match self {
            Self::Scanned(range) => Some(range),
            _ => None,
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::Initialized
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Downloading => write!(f, "downloading"),
            Self::Validating => write!(f, "validating"),
            Self::Scanning => write!(f, "scanning"),
            Self::Scanned(range) if range.is_empty() => write!(f, "scanned, nothing new"),
            Self::Scanned(range) => write!(f, "scanned {}..={}", range.start(), range.end()),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
