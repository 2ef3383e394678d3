//! `a_record`: an IPv4 address record.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Applied, Diff, ReadOutcome, Resource};
use crate::ProviderContext;
use crate::ea;
use crate::error::{ResourceError, ResourceResult};
use crate::infoblox::types::{ARecordSpec, RecordA};
use crate::validation::{self, ttl_from_remote, ttl_policy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ARecordData {
    pub fqdn: String,
    #[serde(alias = "ip_address")]
    pub ip_addr: String,
    #[serde(default)]
    pub dns_view: Option<String>,
    #[serde(default = "super::ttl_undef")]
    pub ttl: i64,
    #[serde(default)]
    pub comment: String,
    /// JSON object as a string; empty means no attributes.
    #[serde(default, alias = "extensible_attributes")]
    pub ext_attrs: String,
    #[serde(default)]
    pub zone: String, // computed
}

impl ARecordData {
    pub fn use_ttl(&self) -> bool {
        self.ttl >= 0
    }
}

pub struct ARecordResource;

fn build_spec(ctx: &ProviderContext, data: &ARecordData) -> ResourceResult<ARecordSpec> {
    validation::require_domain_name("fqdn", &data.fqdn)?;
    validation::parse_ipv4("ip_addr", &data.ip_addr)?;
    Ok(ARecordSpec {
        view: ctx.dns_view(&data.dns_view),
        name: data.fqdn.clone(),
        ipv4addr: data.ip_addr.clone(),
        ttl: ttl_policy(data.ttl)?,
        comment: data.comment.clone(),
        ea: ea::decode(&data.ext_attrs)?,
    })
}

fn state_from_remote(rec: RecordA, configured: &ARecordData) -> ARecordData {
    ARecordData {
        fqdn: rec.name.unwrap_or_else(|| configured.fqdn.clone()),
        ip_addr: rec.ipv4addr.unwrap_or_else(|| configured.ip_addr.clone()),
        dns_view: Some(rec.view)
            .filter(|view| !view.is_empty())
            .or_else(|| configured.dns_view.clone()),
        ttl: ttl_from_remote(rec.use_ttl, rec.ttl),
        comment: rec.comment.unwrap_or_default(),
        ext_attrs: ea::encode_remote(rec.ea.as_ref(), &configured.ext_attrs),
        zone: rec.zone,
    }
}

#[async_trait]
impl Resource for ARecordResource {
    type Data = ARecordData;

    fn type_name(&self) -> &'static str {
        "a_record"
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        data: &ARecordData,
    ) -> ResourceResult<Applied<ARecordData>> {
        let spec = build_spec(ctx, data)?;
        let objmgr = ctx.object_manager(spec.ea.as_ref());
        let rec = objmgr
            .create_a_record(&spec)
            .await
            .map_err(|e| ResourceError::remote("creating A record", e))?;
        info!(reference = %rec.reference, fqdn = %data.fqdn, "created A record");
        Ok(Applied {
            id: rec.reference.clone(),
            state: state_from_remote(rec, data),
        })
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &ARecordData,
    ) -> ResourceResult<ReadOutcome<ARecordData>> {
        let objmgr = ctx.object_manager(ea::decode(&prior.ext_attrs)?.as_ref());
        match objmgr.get_a_record_by_ref(id).await {
            Ok(rec) => Ok(ReadOutcome::Present(state_from_remote(rec, prior))),
            Err(e) if e.is_not_found() => {
                debug!(reference = %id, "A record is gone");
                Ok(ReadOutcome::Absent)
            }
            Err(e) => Err(ResourceError::remote("reading A record", e)),
        }
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, ARecordData>,
    ) -> ResourceResult<Applied<ARecordData>> {
        diff.reject_change("dns_view", |d| ctx.dns_view(&d.dns_view))?;
        let spec = build_spec(ctx, diff.planned)?;
        let objmgr = ctx.object_manager(spec.ea.as_ref());
        let rec = objmgr
            .update_a_record(id, &spec)
            .await
            .map_err(|e| ResourceError::remote("updating A record", e))?;
        info!(reference = %rec.reference, previous = %id, "updated A record");
        Ok(Applied {
            id: rec.reference.clone(),
            state: state_from_remote(rec, diff.planned),
        })
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, ARecordData>,
    ) -> ResourceResult<()> {
        let objmgr = ctx.object_manager(ea::decode(&diff.prior.ext_attrs)?.as_ref());
        match objmgr.delete_a_record(id).await {
            Ok(_) => {
                info!(reference = %id, "deleted A record");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ResourceError::remote("deleting A record", e)),
        }
    }
}
