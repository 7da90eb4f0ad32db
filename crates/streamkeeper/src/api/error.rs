use std::{
    error::Error as StdError,
    fmt::{Display, Formatter},
};

use http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Result<T, E = GovernanceError> = std::result::Result<T, E>;

/// Closed taxonomy of governance failures. Every public operation returns
/// either a success payload or exactly one of these kinds; there are no
/// sentinel "failure" strings.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input, rejected before any persistence.
    Validation,
    /// Principal lacks the capability for the action.
    NotAuthorized,
    /// A CREATED request already exists for the same resource, environment
    /// and tenant.
    DuplicateRequest,
    /// Action attempted on a request that is no longer in CREATED state.
    StaleRequest,
    /// Approver equals requestor.
    SelfApproval,
    /// Delete blocked by existing dependent resources.
    HasDependents,
    /// The cluster-operations call failed; never retried automatically.
    RemoteExecution,
    /// Referenced request or resource does not exist, or is outside the
    /// caller's environment scope.
    NotFound,
    /// Invalid or missing process configuration, raised eagerly.
    Configuration,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotAuthorized => StatusCode::FORBIDDEN,
            ErrorKind::DuplicateRequest
            | ErrorKind::StaleRequest
            | ErrorKind::SelfApproval
            | ErrorKind::HasDependents => StatusCode::CONFLICT,
            ErrorKind::RemoteExecution => StatusCode::FAILED_DEPENDENCY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error payload carried by every failing governance operation.
#[derive(Debug)]
pub struct GovernanceError {
    pub kind: ErrorKind,
    pub message: String,
    /// Further details accumulated while the error bubbles up.
    pub stack: Vec<String>,
    pub source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    pub error_id: Uuid,
}

impl GovernanceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: Vec::new(),
            source: None,
            error_id: Uuid::now_v7(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthorized, message)
    }

    pub fn duplicate_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateRequest, message)
    }

    pub fn stale_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StaleRequest, message)
    }

    pub fn self_approval(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SelfApproval, message)
    }

    pub fn has_dependents(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HasDependents, message)
    }

    pub fn remote_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteExecution, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn append_detail(mut self, detail: impl Into<String>) -> Self {
        self.stack.push(detail.into());
        self
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }
}

impl Display for GovernanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} ({}): {}", self.kind, self.status_code(), self.message)?;

        if !self.stack.is_empty() {
            writeln!(f, "Stack:")?;
            for detail in &self.stack {
                writeln!(f, "  {detail}")?;
            }
        }

        if let Some(source) = self.source.as_ref() {
            writeln!(f, "Caused by:")?;
            error_chain_fmt(&**source, f)?;
        }

        Ok(())
    }
}

impl StdError for GovernanceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

fn error_chain_fmt(
    e: &(dyn StdError + Send + Sync + 'static),
    f: &mut Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{e}")?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{cause}")?;
        current = cause.source();
    }
    Ok(())
}
