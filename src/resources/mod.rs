//! Resource handlers: typed field sets and their create / read / update /
//! delete operations against the object manager.
pub mod a_record;
pub mod aaaa_record;
pub mod ip_association;
pub mod ptr_record;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ProviderContext;
use crate::error::{ResourceError, ResourceResult};
use crate::validation::ValidationError;

/// Result of a create or update: the (possibly new) remote reference and the
/// state to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub id: String,
    pub state: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    Present(T),
    /// The remote object is gone; drop it from state.
    Absent,
}

/// Last persisted state next to the newly planned one.
#[derive(Debug)]
pub struct Diff<'a, T> {
    pub prior: &'a T,
    pub planned: &'a T,
}

impl<T> Clone for Diff<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Diff<'_, T> {}

impl<'a, T> Diff<'a, T> {
    pub fn new(prior: &'a T, planned: &'a T) -> Self {
        Self { prior, planned }
    }

    /// Both sides are the same state (plain destroy).
    pub fn unchanged(state: &'a T) -> Self {
        Self {
            prior: state,
            planned: state,
        }
    }

    pub fn changed<F, V>(&self, field: F) -> bool
    where
        F: Fn(&T) -> V,
        V: PartialEq,
    {
        field(self.prior) != field(self.planned)
    }

    /// Fails with `ImmutableField` when the selected field differs.
    pub fn reject_change<F, V>(&self, name: &'static str, field: F) -> Result<(), ValidationError>
    where
        F: Fn(&T) -> V,
        V: PartialEq,
    {
        if self.changed(field) {
            Err(ValidationError::ImmutableField(name))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
pub trait Resource: Send + Sync {
    type Data: Serialize + DeserializeOwned + Clone + Send + Sync;

    fn type_name(&self) -> &'static str;

    async fn create(
        &self,
        ctx: &ProviderContext,
        data: &Self::Data,
    ) -> ResourceResult<Applied<Self::Data>>;

    async fn read(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &Self::Data,
    ) -> ResourceResult<ReadOutcome<Self::Data>>;

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, Self::Data>,
    ) -> ResourceResult<Applied<Self::Data>>;

    /// Removing an object that is already gone succeeds.
    async fn delete(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, Self::Data>,
    ) -> ResourceResult<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid {kind} attributes: {source}")]
    Attributes {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Object-safe view of a [`Resource`] working on JSON attribute documents.
#[async_trait]
pub trait DocumentResource: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn create_document(
        &self,
        ctx: &ProviderContext,
        attrs: Value,
    ) -> Result<Applied<Value>, DispatchError>;

    async fn read_document(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: Value,
    ) -> Result<ReadOutcome<Value>, DispatchError>;

    async fn update_document(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Applied<Value>, DispatchError>;

    async fn delete_document(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: Value,
        planned: Value,
    ) -> Result<(), DispatchError>;
}

fn parse<R: Resource>(r: &R, attrs: Value) -> Result<R::Data, DispatchError> {
    serde_json::from_value(attrs).map_err(|source| DispatchError::Attributes {
        kind: r.type_name(),
        source,
    })
}

fn render<R: Resource>(r: &R, data: &R::Data) -> Result<Value, DispatchError> {
    serde_json::to_value(data).map_err(|source| DispatchError::Attributes {
        kind: r.type_name(),
        source,
    })
}

#[async_trait]
impl<R: Resource> DocumentResource for R {
    fn kind(&self) -> &'static str {
        self.type_name()
    }

    async fn create_document(
        &self,
        ctx: &ProviderContext,
        attrs: Value,
    ) -> Result<Applied<Value>, DispatchError> {
        let data = parse(self, attrs)?;
        let applied = Resource::create(self, ctx, &data).await?;
        Ok(Applied {
            state: render(self, &applied.state)?,
            id: applied.id,
        })
    }

    async fn read_document(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: Value,
    ) -> Result<ReadOutcome<Value>, DispatchError> {
        let prior = parse(self, prior)?;
        match Resource::read(self, ctx, id, &prior).await? {
            ReadOutcome::Present(state) => Ok(ReadOutcome::Present(render(self, &state)?)),
            ReadOutcome::Absent => Ok(ReadOutcome::Absent),
        }
    }

    async fn update_document(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Applied<Value>, DispatchError> {
        let prior = parse(self, prior)?;
        let planned = parse(self, planned)?;
        let applied = Resource::update(self, ctx, id, Diff::new(&prior, &planned)).await?;
        Ok(Applied {
            state: render(self, &applied.state)?,
            id: applied.id,
        })
    }

    async fn delete_document(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: Value,
        planned: Value,
    ) -> Result<(), DispatchError> {
        let prior = parse(self, prior)?;
        let planned = parse(self, planned)?;
        Resource::delete(self, ctx, id, Diff::new(&prior, &planned)).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ARecord,
    AaaaRecord,
    PtrRecord,
    Ipv4Association,
    Ipv6Association,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown resource type '{0}'")]
pub struct UnknownResourceKind(pub String);

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::ARecord,
        ResourceKind::AaaaRecord,
        ResourceKind::PtrRecord,
        ResourceKind::Ipv4Association,
        ResourceKind::Ipv6Association,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ARecord => "a_record",
            ResourceKind::AaaaRecord => "aaaa_record",
            ResourceKind::PtrRecord => "ptr_record",
            ResourceKind::Ipv4Association => "ipv4_association",
            ResourceKind::Ipv6Association => "ipv6_association",
        }
    }

    pub fn handler(&self) -> &'static dyn DocumentResource {
        match self {
            ResourceKind::ARecord => &a_record::ARecordResource,
            ResourceKind::AaaaRecord => &aaaa_record::AaaaRecordResource,
            ResourceKind::PtrRecord => &ptr_record::PtrRecordResource,
            ResourceKind::Ipv4Association => &ip_association::IPV4_ASSOCIATION,
            ResourceKind::Ipv6Association => &ip_association::IPV6_ASSOCIATION,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Terraform-style names are accepted too.
        let name = s.trim().trim_start_matches("infoblox_");
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| UnknownResourceKind(s.to_string()))
    }
}

pub(crate) fn ttl_undef() -> i64 {
    crate::validation::TTL_UNDEF
}

pub(crate) fn enabled() -> bool {
    true
}
