//! Balance snapshot returned by balance queries.

/// Wallet balance in zatoshi. Never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WalletBalance {
    /// Everything the wallet has received and not spent, including unconfirmed funds.
    pub total_zatoshi: u64,
    /// The part of the total that is confirmed and spendable.
    pub available_zatoshi: u64,
}

impl WalletBalance {
    /// Creates a balance snapshot.
    pub fn new(total_zatoshi: u64, available_zatoshi: u64) -> Self {
        Self {
            total_zatoshi,
            available_zatoshi,
        }
    }

    /// Funds that are not yet spendable.
    ///
    /// ```
    /// use sync_status::balance::WalletBalance;
    ///
    /// assert_eq!(WalletBalance::new(50_000, 20_000).pending_zatoshi(), 30_000);
    /// assert_eq!(WalletBalance::new(10, 20).pending_zatoshi(), 0);
    /// ```
    pub fn pending_zatoshi(&self) -> u64 {
        self.total_zatoshi.saturating_sub(self.available_zatoshi)
    }
}

impl std::fmt::Display for WalletBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} zats total, {} zats available",
            self.total_zatoshi, self.available_zatoshi
        )
    }
}
