//! C7 + the registry/hart-table pairing: the single piece of state every dispatch call needs
//! exclusive access to. Grounded on the original monitor's single `spinlock_t
//! enclave_metadata_lock` guarding both `enclaves[]` and `cpus[]` together — here that pairing
//! is a plain struct, and exclusivity comes from wrapping *that* in one [`spin::Mutex`]
//! (`src/lib.rs`'s `MONITOR` static) rather than a lock per field.

use crate::hart::HartTable;
use crate::registry::EnclaveRegistry;

/// Everything a dispatch call needs exclusive access to: the enclave registry and the per-hart
/// world-state table.
pub struct Monitor {
    pub registry: EnclaveRegistry,
    pub harts: HartTable,
}

impl Monitor {
    /// An empty monitor: no enclaves, every hart in the host world.
    pub fn new() -> Self {
        Self { registry: EnclaveRegistry::new(), harts: HartTable::new() }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
