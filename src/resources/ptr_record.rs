//! `ptr_record`: a pointer record keyed on a record name or on an address.
//! The appliance derives `name` and `zone` from whichever one is given.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Applied, Diff, ReadOutcome, Resource};
use crate::ProviderContext;
use crate::ea;
use crate::error::{ResourceError, ResourceResult};
use crate::infoblox::types::{PtrRecordSpec, PtrTarget, RecordPTR};
use crate::validation::{self, ttl_from_remote, ttl_policy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtrRecordData {
    #[serde(default)]
    pub network_view: Option<String>,
    #[serde(default)]
    pub dns_view: Option<String>,
    pub ptrdname: String,
    #[serde(default)]
    pub record_name: String,
    #[serde(default, alias = "ip_address")]
    pub ip_addr: String,
    #[serde(default)]
    pub ipv6_addr: String,
    #[serde(default = "super::ttl_undef")]
    pub ttl: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default, alias = "extensible_attributes")]
    pub ext_attrs: String,
    // computed by the appliance
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: String,
}

impl PtrRecordData {
    pub fn use_ttl(&self) -> bool {
        self.ttl >= 0
    }

    fn target(&self) -> ResourceResult<PtrTarget> {
        validation::exactly_one(&[
            ("record_name", !self.record_name.is_empty()),
            ("ip_addr", !self.ip_addr.is_empty()),
            ("ipv6_addr", !self.ipv6_addr.is_empty()),
        ])?;
        if !self.record_name.is_empty() {
            validation::validate_domain_name(&self.record_name)?;
            Ok(PtrTarget::RecordName(self.record_name.clone()))
        } else if !self.ip_addr.is_empty() {
            validation::parse_ipv4("ip_addr", &self.ip_addr)?;
            Ok(PtrTarget::Ipv4(self.ip_addr.clone()))
        } else {
            validation::parse_ipv6("ipv6_addr", &self.ipv6_addr)?;
            Ok(PtrTarget::Ipv6(self.ipv6_addr.clone()))
        }
    }
}

pub struct PtrRecordResource;

fn build_spec(ctx: &ProviderContext, data: &PtrRecordData) -> ResourceResult<PtrRecordSpec> {
    validation::require_domain_name("ptrdname", &data.ptrdname)?;
    Ok(PtrRecordSpec {
        view: ctx.dns_view(&data.dns_view),
        ptrdname: data.ptrdname.clone(),
        target: data.target()?,
        ttl: ttl_policy(data.ttl)?,
        comment: data.comment.clone(),
        ea: ea::decode(&data.ext_attrs)?,
    })
}

/// Only the addressing field the user configured is refreshed, so switching
/// the remote representation does not show up as drift in the others.
fn state_from_remote(ctx: &ProviderContext, rec: RecordPTR, configured: &PtrRecordData) -> PtrRecordData {
    let keep = |configured: &str, remote: Option<String>| {
        if configured.is_empty() {
            String::new()
        } else {
            remote
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| configured.to_string())
        }
    };
    PtrRecordData {
        network_view: Some(ctx.network_view(&configured.network_view)),
        dns_view: Some(rec.view)
            .filter(|view| !view.is_empty())
            .or_else(|| configured.dns_view.clone()),
        ptrdname: rec.ptrdname.unwrap_or_else(|| configured.ptrdname.clone()),
        record_name: keep(&configured.record_name, rec.name.clone()),
        ip_addr: keep(&configured.ip_addr, rec.ipv4addr),
        ipv6_addr: keep(&configured.ipv6_addr, rec.ipv6addr),
        ttl: ttl_from_remote(rec.use_ttl, rec.ttl),
        comment: rec.comment.unwrap_or_default(),
        ext_attrs: ea::encode_remote(rec.ea.as_ref(), &configured.ext_attrs),
        name: rec.name.unwrap_or_default(),
        zone: rec.zone,
    }
}

#[async_trait]
impl Resource for PtrRecordResource {
    type Data = PtrRecordData;

    fn type_name(&self) -> &'static str {
        "ptr_record"
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        data: &PtrRecordData,
    ) -> ResourceResult<Applied<PtrRecordData>> {
        let spec = build_spec(ctx, data)?;
        let objmgr = ctx.object_manager(spec.ea.as_ref());
        let rec = objmgr
            .create_ptr_record(&spec)
            .await
            .map_err(|e| ResourceError::remote("creating PTR record", e))?;
        info!(reference = %rec.reference, ptrdname = %data.ptrdname, "created PTR record");
        Ok(Applied {
            id: rec.reference.clone(),
            state: state_from_remote(ctx, rec, data),
        })
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &PtrRecordData,
    ) -> ResourceResult<ReadOutcome<PtrRecordData>> {
        let objmgr = ctx.object_manager(ea::decode(&prior.ext_attrs)?.as_ref());
        match objmgr.get_ptr_record_by_ref(id).await {
            Ok(rec) => Ok(ReadOutcome::Present(state_from_remote(ctx, rec, prior))),
            Err(e) if e.is_not_found() => {
                debug!(reference = %id, "PTR record is gone");
                Ok(ReadOutcome::Absent)
            }
            Err(e) => Err(ResourceError::remote("reading PTR record", e)),
        }
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, PtrRecordData>,
    ) -> ResourceResult<Applied<PtrRecordData>> {
        diff.reject_change("network_view", |d| ctx.network_view(&d.network_view))?;
        diff.reject_change("dns_view", |d| ctx.dns_view(&d.dns_view))?;
        let spec = build_spec(ctx, diff.planned)?;
        let objmgr = ctx.object_manager(spec.ea.as_ref());
        let rec = objmgr
            .update_ptr_record(id, &spec)
            .await
            .map_err(|e| ResourceError::remote("updating PTR record", e))?;
        info!(reference = %rec.reference, previous = %id, "updated PTR record");
        Ok(Applied {
            id: rec.reference.clone(),
            state: state_from_remote(ctx, rec, diff.planned),
        })
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, PtrRecordData>,
    ) -> ResourceResult<()> {
        let objmgr = ctx.object_manager(ea::decode(&diff.prior.ext_attrs)?.as_ref());
        match objmgr.delete_ptr_record(id).await {
            Ok(_) => {
                info!(reference = %id, "deleted PTR record");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ResourceError::remote("deleting PTR record", e)),
        }
    }
}
