// src/error.rs
use thiserror::Error;

use crate::ea::EaDecodeError;
use crate::infoblox::ClientError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    ExtAttrs(#[from] EaDecodeError),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{action} failed: {source}")]
    Remote {
        action: &'static str,
        #[source]
        source: ClientError,
    },
}

impl ResourceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ResourceError::NotFound { what: what.into() }
    }

    /// Wrap a client failure, keeping not-found distinct from other errors.
    pub fn remote(action: &'static str, err: ClientError) -> Self {
        match err {
            ClientError::NotFound { reference } => ResourceError::NotFound {
                what: format!("object '{reference}'"),
            },
            other => ResourceError::Remote {
                action,
                source: other,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound { .. })
    }

    /// Local input problems; never worth retrying.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ResourceError::Validation(_) | ResourceError::ExtAttrs(_)
        )
    }
}

pub type ResourceResult<T> = Result<T, ResourceError>;
