mod error;

pub use error::{ErrorKind, GovernanceError, Result};
