//! Remote object manager: the Infoblox WAPI as seen by the resource handlers.
pub mod client;
#[cfg(test)]
pub(crate) mod memory;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

use types::*;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("object '{reference}' not found")]
    NotFound { reference: String },

    #[error("WAPI request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAPI returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected WAPI response: {0}")]
    Decode(String),

    #[error("HTTPS support is not compiled in, enable the 'https-client' feature")]
    TlsUnavailable,
}

impl ClientError {
    pub fn not_found(reference: impl Into<String>) -> Self {
        ClientError::NotFound {
            reference: reference.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Who the calls are made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub cmp_type: String, // "Terraform"
    pub tenant_id: String,
}

/// Per-type operations against the appliance. Every call either returns the
/// object, `ClientError::NotFound`, or another `ClientError`.
#[async_trait]
pub trait ObjectManager: Send + Sync {
    async fn create_a_record(&self, spec: &ARecordSpec) -> Result<RecordA, ClientError>;
    async fn get_a_record_by_ref(&self, reference: &str) -> Result<RecordA, ClientError>;
    async fn update_a_record(
        &self,
        reference: &str,
        spec: &ARecordSpec,
    ) -> Result<RecordA, ClientError>;
    async fn delete_a_record(&self, reference: &str) -> Result<String, ClientError>;

    async fn create_aaaa_record(&self, spec: &AAAARecordSpec) -> Result<RecordAAAA, ClientError>;
    async fn get_aaaa_record_by_ref(&self, reference: &str) -> Result<RecordAAAA, ClientError>;
    async fn update_aaaa_record(
        &self,
        reference: &str,
        spec: &AAAARecordSpec,
    ) -> Result<RecordAAAA, ClientError>;
    async fn delete_aaaa_record(&self, reference: &str) -> Result<String, ClientError>;

    async fn create_ptr_record(&self, spec: &PtrRecordSpec) -> Result<RecordPTR, ClientError>;
    async fn get_ptr_record_by_ref(&self, reference: &str) -> Result<RecordPTR, ClientError>;
    async fn update_ptr_record(
        &self,
        reference: &str,
        spec: &PtrRecordSpec,
    ) -> Result<RecordPTR, ClientError>;
    async fn delete_ptr_record(&self, reference: &str) -> Result<String, ClientError>;

    /// `Ok(None)` when no host record matches.
    async fn get_host_record(
        &self,
        query: &HostRecordQuery,
    ) -> Result<Option<HostRecord>, ClientError>;
    async fn get_host_record_by_ref(&self, reference: &str) -> Result<HostRecord, ClientError>;
    async fn update_host_record(
        &self,
        reference: &str,
        spec: &HostRecordSpec,
    ) -> Result<HostRecord, ClientError>;
}

/// Hands out object managers bound to a scope.
pub trait Connector: Send + Sync {
    fn object_manager(&self, scope: Scope) -> Arc<dyn ObjectManager>;
}
