//! `aaaa_record`: an IPv6 address record.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Applied, Diff, ReadOutcome, Resource};
use crate::ProviderContext;
use crate::ea;
use crate::error::{ResourceError, ResourceResult};
use crate::infoblox::types::{AAAARecordSpec, RecordAAAA};
use crate::validation::{self, ttl_from_remote, ttl_policy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AaaaRecordData {
    pub fqdn: String,
    #[serde(alias = "ipv6_address")]
    pub ipv6_addr: String,
    #[serde(default)]
    pub dns_view: Option<String>,
    #[serde(default = "super::ttl_undef")]
    pub ttl: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default, alias = "extensible_attributes")]
    pub ext_attrs: String,
    #[serde(default)]
    pub zone: String,
}

impl AaaaRecordData {
    pub fn use_ttl(&self) -> bool {
        self.ttl >= 0
    }
}

pub struct AaaaRecordResource;

fn build_spec(ctx: &ProviderContext, data: &AaaaRecordData) -> ResourceResult<AAAARecordSpec> {
    validation::require_domain_name("fqdn", &data.fqdn)?;
    validation::parse_ipv6("ipv6_addr", &data.ipv6_addr)?;
    Ok(AAAARecordSpec {
        view: ctx.dns_view(&data.dns_view),
        name: data.fqdn.clone(),
        ipv6addr: data.ipv6_addr.clone(),
        ttl: ttl_policy(data.ttl)?,
        comment: data.comment.clone(),
        ea: ea::decode(&data.ext_attrs)?,
    })
}

fn state_from_remote(rec: RecordAAAA, configured: &AaaaRecordData) -> AaaaRecordData {
    AaaaRecordData {
        fqdn: rec.name.unwrap_or_else(|| configured.fqdn.clone()),
        ipv6_addr: rec.ipv6addr.unwrap_or_else(|| configured.ipv6_addr.clone()),
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
impl Resource for AaaaRecordResource {
    type Data = AaaaRecordData;

    fn type_name(&self) -> &'static str {
        "aaaa_record"
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        data: &AaaaRecordData,
    ) -> ResourceResult<Applied<AaaaRecordData>> {
        let spec = build_spec(ctx, data)?;
        let objmgr = ctx.object_manager(spec.ea.as_ref());
        let rec = objmgr
            .create_aaaa_record(&spec)
            .await
            .map_err(|e| ResourceError::remote("creating AAAA record", e))?;
        info!(reference = %rec.reference, fqdn = %data.fqdn, "created AAAA record");
        Ok(Applied {
            id: rec.reference.clone(),
            state: state_from_remote(rec, data),
        })
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &AaaaRecordData,
    ) -> ResourceResult<ReadOutcome<AaaaRecordData>> {
        let objmgr = ctx.object_manager(ea::decode(&prior.ext_attrs)?.as_ref());
        match objmgr.get_aaaa_record_by_ref(id).await {
            Ok(rec) => Ok(ReadOutcome::Present(state_from_remote(rec, prior))),
            Err(e) if e.is_not_found() => {
                debug!(reference = %id, "AAAA record is gone");
                Ok(ReadOutcome::Absent)
            }
            Err(e) => Err(ResourceError::remote("reading AAAA record", e)),
        }
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, AaaaRecordData>,
    ) -> ResourceResult<Applied<AaaaRecordData>> {
        diff.reject_change("dns_view", |d| ctx.dns_view(&d.dns_view))?;
        let spec = build_spec(ctx, diff.planned)?;
        let objmgr = ctx.object_manager(spec.ea.as_ref());
        let rec = objmgr
            .update_aaaa_record(id, &spec)
            .await
            .map_err(|e| ResourceError::remote("updating AAAA record", e))?;
        info!(reference = %rec.reference, previous = %id, "updated AAAA record");
        Ok(Applied {
            id: rec.reference.clone(),
            state: state_from_remote(rec, diff.planned),
        })
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, AaaaRecordData>,
    ) -> ResourceResult<()> {
        let objmgr = ctx.object_manager(ea::decode(&diff.prior.ext_attrs)?.as_ref());
        match objmgr.delete_aaaa_record(id).await {
            Ok(_) => {
                info!(reference = %id, "deleted AAAA record");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ResourceError::remote("deleting AAAA record", e)),
        }
    }
}
