//! Common test utilities

use digital_wallet::cache::MemoryHistoryCache;
use digital_wallet::ledger::WalletLedger;
use digital_wallet::store::MemoryWalletStore;

/// Ledger engine over the in-memory store and cache. The store handle is
/// returned too so tests can assert on raw wallet state (version, balance)
/// the engine does not expose.
pub fn setup_ledger() -> (
    MemoryWalletStore,
    WalletLedger<MemoryWalletStore, MemoryHistoryCache>,
) {
    let store = MemoryWalletStore::new();
    let ledger = WalletLedger::new(store.clone(), MemoryHistoryCache::new());
    (store, ledger)
}
