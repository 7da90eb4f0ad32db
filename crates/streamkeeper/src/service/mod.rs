pub mod authz;
pub(crate) mod cache;
pub mod gateway;
pub mod ledger;
pub mod lifecycle;
mod model;
pub mod notifier;
pub mod sync_store;
pub mod tenant;

pub use authz::{
    approve_capability, request_capability, AllowAllGuard, AuthorizationGuard, Capability,
};
pub use gateway::{
    AclSpec, ClusterGateway, RemoteClusterStatus, RemoteOperation, RemoteOutcome, RemoteTopic,
    RestClusterGateway, TokenSigner,
};
pub use ledger::RequestLedger;
pub use lifecycle::RequestLifecycleService;
pub use model::*;
pub use notifier::{LogNotifier, NotificationKind, Notifier};
pub use sync_store::SyncStateStore;
pub use tenant::TenantDirectory;

/// Wiring of every collaborator behind the lifecycle service. Cloning is
/// cheap; each backend is expected to be a handle over shared state.
#[derive(Clone, Debug)]
pub struct State<A, D, L, S, G, N>
where
    A: AuthorizationGuard,
    D: TenantDirectory,
    L: RequestLedger,
    S: SyncStateStore,
    G: ClusterGateway,
    N: Notifier,
{
    pub authz: A,
    pub directory: D,
    pub ledger: L,
    pub sot: S,
    pub gateway: G,
    pub notifier: N,
}
