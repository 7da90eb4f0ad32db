#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::pedantic
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::large_enum_variant,
    clippy::missing_errors_doc
)]
#![forbid(unsafe_code)]
mod config;
pub mod service;
pub use config::{CacheConfig, ClusterApiConfig, DynAppConfig, CONFIG};
pub use service::{EnvironmentId, RequestId, ResourceId, TeamId, TenantId};

pub mod implementations;

pub mod api;
mod request_context;

pub use async_trait;
pub use request_context::{Principal, RequestContext};
pub use tokio;
pub use tracing;

#[cfg(test)]
mod tests;
