//! In-memory backends. Default wiring for tests and single-process
//! deployments; every handle is a cheap clone over shared state behind
//! tokio locks.

mod ledger;
mod sync_store;
mod tenant;

pub use ledger::MemoryRequestLedger;
pub use sync_store::MemorySyncStore;
pub use tenant::{MemoryTenantDirectory, StaticAuthorizationGuard};
