//! `ipv4_association` / `ipv6_association`: binds an address and a MAC (or
//! DUID) to an existing host record. The host record itself is never created
//! or removed here; destroying the association clears the identifier.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Applied, Diff, ReadOutcome, Resource};
use crate::ProviderContext;
use crate::ea;
use crate::error::{ResourceError, ResourceResult};
use crate::infoblox::types::{AddressQuery, HostBinding, HostRecord, HostRecordQuery, HostRecordSpec};
use crate::validation::{self, ttl_from_remote, ttl_policy};

/// Written in place of the MAC when an IPv4 association is destroyed.
pub const ZERO_MAC: &str = "00:00:00:00:00:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAssociationData {
    #[serde(default)]
    pub network_view: Option<String>,
    #[serde(default)]
    pub dns_view: Option<String>,
    #[serde(default = "super::enabled")]
    pub enable_dns: bool,
    #[serde(default)]
    pub enable_dhcp: bool,
    #[serde(default)]
    pub cidr: String,
    #[serde(alias = "ip_address")]
    pub ip_addr: String,
    #[serde(default, alias = "mac_address")]
    pub mac_addr: String,
    #[serde(default)]
    pub duid: String,
    pub fqdn: String,
    #[serde(default = "super::ttl_undef")]
    pub ttl: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default, alias = "extensible_attributes")]
    pub ext_attrs: String,
}

pub struct IpAssociation {
    pub family: Family,
}

pub static IPV4_ASSOCIATION: IpAssociation = IpAssociation { family: Family::V4 };
pub static IPV6_ASSOCIATION: IpAssociation = IpAssociation { family: Family::V6 };

impl IpAssociation {
    fn address(&self, data: &IpAssociationData) -> ResourceResult<AddressQuery> {
        match self.family {
            Family::V4 => {
                validation::parse_ipv4("ip_addr", &data.ip_addr)?;
                Ok(AddressQuery::V4(data.ip_addr.clone()))
            }
            Family::V6 => {
                validation::parse_ipv6("ip_addr", &data.ip_addr)?;
                Ok(AddressQuery::V6(data.ip_addr.clone()))
            }
        }
    }

    /// `disassociate` binds the zero MAC / empty DUID instead of the
    /// configured identifier.
    fn host_spec(
        &self,
        data: &IpAssociationData,
        network_view: String,
        view: String,
        disassociate: bool,
    ) -> ResourceResult<HostRecordSpec> {
        validation::require_domain_name("fqdn", &data.fqdn)?;
        let binding = match self.family {
            Family::V4 => {
                validation::parse_ipv4("ip_addr", &data.ip_addr)?;
                let mac = validation::normalize_mac(&data.mac_addr)?;
                HostBinding::V4 {
                    cidr: data.cidr.clone(),
                    addr: data.ip_addr.clone(),
                    mac: if disassociate { ZERO_MAC.to_string() } else { mac },
                }
            }
            Family::V6 => {
                validation::parse_ipv6("ip_addr", &data.ip_addr)?;
                validation::validate_duid(&data.duid)?;
                HostBinding::V6 {
                    cidr: data.cidr.clone(),
                    addr: data.ip_addr.clone(),
                    duid: if disassociate { String::new() } else { data.duid.clone() },
                }
            }
        };
        Ok(HostRecordSpec {
            name: data.fqdn.clone(),
            network_view,
            view,
            enable_dns: data.enable_dns,
            enable_dhcp: data.enable_dhcp,
            binding,
            ttl: ttl_policy(data.ttl)?,
            comment: data.comment.clone(),
            ea: ea::decode(&data.ext_attrs)?,
            aliases: Vec::new(),
        })
    }

    /// Shared by create and update: find the host record holding the address
    /// and bind the identifier to it.
    async fn associate(
        &self,
        ctx: &ProviderContext,
        data: &IpAssociationData,
    ) -> ResourceResult<Applied<IpAssociationData>> {
        let network_view = ctx.network_view(&data.network_view);
        // IPAM-only hosts are searched without a DNS view
        let view = if data.enable_dns {
            ctx.dns_view(&data.dns_view)
        } else {
            String::new()
        };
        let query = HostRecordQuery {
            network_view: network_view.clone(),
            view: view.clone(),
            name: data.fqdn.clone(),
            address: self.address(data)?,
        };
        let spec = self.host_spec(data, network_view, view, false)?;
        let objmgr = ctx.object_manager(spec.ea.as_ref());

        let host = objmgr
            .get_host_record(&query)
            .await
            .map_err(|e| ResourceError::remote("looking up host record", e))?
            .ok_or_else(|| ResourceError::not_found(format!("host record '{}'", data.fqdn)))?;
        let updated = objmgr
            .update_host_record(&host.reference, &spec)
            .await
            .map_err(|e| ResourceError::remote("updating host record", e))?;
        info!(
            reference = %updated.reference,
            fqdn = %data.fqdn,
            ip_addr = %data.ip_addr,
            "associated address with host record"
        );
        Ok(Applied {
            id: updated.reference.clone(),
            state: self.state_from_remote(ctx, &updated, data),
        })
    }

    fn state_from_remote(
        &self,
        ctx: &ProviderContext,
        host: &HostRecord,
        configured: &IpAssociationData,
    ) -> IpAssociationData {
        let mut state = configured.clone();
        state.network_view = Some(
            host.network_view
                .clone()
                .filter(|view| !view.is_empty())
                .unwrap_or_else(|| ctx.network_view(&configured.network_view)),
        );
        state.dns_view = Some(match host.view.as_deref() {
            Some(view) if configured.enable_dns && !view.is_empty() => view.to_string(),
            _ => ctx.dns_view(&configured.dns_view),
        });
        if let Some(name) = &host.name {
            state.fqdn = name.clone();
        }
        state.enable_dns = host.configure_for_dns.unwrap_or(configured.enable_dns);
        state.ttl = ttl_from_remote(host.use_ttl, host.ttl);
        state.comment = host.comment.clone().unwrap_or_default();
        state.ext_attrs = ea::encode_remote(host.ea.as_ref(), &configured.ext_attrs);

        match self.family {
            Family::V4 => {
                if let Some(entry) = host.ipv4_entry(&configured.ip_addr) {
                    state.enable_dhcp = entry.configure_for_dhcp.unwrap_or(configured.enable_dhcp);
                    let remote = entry.mac.clone().unwrap_or_default();
                    let local = validation::normalize_mac(&configured.mac_addr).unwrap_or_default();
                    if !remote.eq_ignore_ascii_case(&local) {
                        state.mac_addr = remote;
                    }
                }
            }
            Family::V6 => {
                if let Some(entry) = host.ipv6_entry(&configured.ip_addr) {
                    state.enable_dhcp = entry.configure_for_dhcp.unwrap_or(configured.enable_dhcp);
                    let remote = entry.duid.clone().unwrap_or_default();
                    if !remote.eq_ignore_ascii_case(&configured.duid) {
                        state.duid = remote;
                    }
                }
            }
        }
        state
    }
}

#[async_trait]
impl Resource for IpAssociation {
    type Data = IpAssociationData;

    fn type_name(&self) -> &'static str {
        match self.family {
            Family::V4 => "ipv4_association",
            Family::V6 => "ipv6_association",
        }
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        data: &IpAssociationData,
    ) -> ResourceResult<Applied<IpAssociationData>> {
        self.associate(ctx, data).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &IpAssociationData,
    ) -> ResourceResult<ReadOutcome<IpAssociationData>> {
        let objmgr = ctx.object_manager(ea::decode(&prior.ext_attrs)?.as_ref());
        match objmgr.get_host_record_by_ref(id).await {
            Ok(host) => Ok(ReadOutcome::Present(self.state_from_remote(ctx, &host, prior))),
            Err(e) if e.is_not_found() => {
                debug!(reference = %id, "host record is gone");
                Ok(ReadOutcome::Absent)
            }
            Err(e) => Err(ResourceError::remote("reading host record", e)),
        }
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _id: &str,
        diff: Diff<'_, IpAssociationData>,
    ) -> ResourceResult<Applied<IpAssociationData>> {
        diff.reject_change("network_view", |d| ctx.network_view(&d.network_view))?;
        diff.reject_change("dns_view", |d| ctx.dns_view(&d.dns_view))?;
        self.associate(ctx, diff.planned).await
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        id: &str,
        diff: Diff<'_, IpAssociationData>,
    ) -> ResourceResult<()> {
        diff.reject_change("network_view", |d| ctx.network_view(&d.network_view))?;
        diff.reject_change("dns_view", |d| ctx.dns_view(&d.dns_view))?;
        let data = diff.planned;
        let spec = self.host_spec(
            data,
            ctx.network_view(&data.network_view),
            ctx.dns_view(&data.dns_view),
            true,
        )?;
        let objmgr = ctx.object_manager(spec.ea.as_ref());
        match objmgr.update_host_record(id, &spec).await {
            Ok(host) => {
                info!(reference = %host.reference, fqdn = %data.fqdn, "cleared host record association");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(reference = %id, "host record already gone, nothing to disassociate");
                Ok(())
            }
            Err(e) => Err(ResourceError::remote("clearing host record association", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::testing;
    use serde_json::json;

    fn data(value: serde_json::Value) -> IpAssociationData {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn create_binds_mac_to_existing_host() {
        let (ctx, grid) = testing::context();
        let host_ref = grid
            .insert_host_record("host1.test.com", "default", "default", AddressQuery::V4("10.0.0.12".into()))
            .await;
        let input = data(json!({
            "fqdn": "host1.test.com",
            "ip_addr": "10.0.0.12",
            "mac_addr": "11-22-33-44-55-66",
            "enable_dhcp": true,
            "ttl": 60,
        }));
        let applied = IPV4_ASSOCIATION.create(&ctx, &input).await.unwrap();
        assert_eq!(applied.id, host_ref);
        assert_eq!(applied.state.mac_addr, "11-22-33-44-55-66");
        assert!(applied.state.enable_dns);
        assert!(applied.state.enable_dhcp);
        assert_eq!(applied.state.ttl, 60);

        let hosts = grid.host_records().await;
        let entry = hosts[0].ipv4_entry("10.0.0.12").unwrap();
        assert_eq!(entry.mac.as_deref(), Some("11:22:33:44:55:66"));
        assert_eq!(entry.configure_for_dhcp, Some(true));
    }

    #[tokio::test]
    async fn missing_host_record_is_not_found() {
        let (ctx, _grid) = testing::context();
        let input = data(json!({"fqdn": "nohost.test.com", "ip_addr": "10.0.0.12"}));
        let err = IPV4_ASSOCIATION.create(&ctx, &input).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "host record 'nohost.test.com' not found");
    }

    #[tokio::test]
    async fn ipam_only_host_is_found_without_dns_view() {
        let (ctx, grid) = testing::context();
        grid.insert_host_record("ipam.test.com", "internal", "default", AddressQuery::V4("10.1.0.5".into()))
            .await;
        let input = data(json!({
            "fqdn": "ipam.test.com",
            "ip_addr": "10.1.0.5",
            "enable_dns": false,
            "mac_addr": "aa:bb:cc:dd:ee:ff",
        }));
        let applied = IPV4_ASSOCIATION.create(&ctx, &input).await.unwrap();
        assert!(!applied.state.enable_dns);
        assert_eq!(applied.state.dns_view.as_deref(), Some("default"));
        let hosts = grid.host_records().await;
        assert_eq!(hosts[0].view.as_deref(), Some("internal"));
        assert_eq!(hosts[0].configure_for_dns, Some(false));
    }

    #[tokio::test]
    async fn update_rejects_view_changes() {
        let (ctx, grid) = testing::context();
        grid.insert_host_record("host1.test.com", "default", "default", AddressQuery::V4("10.0.0.12".into()))
            .await;
        let input = data(json!({"fqdn": "host1.test.com", "ip_addr": "10.0.0.12"}));
        let applied = IPV4_ASSOCIATION.create(&ctx, &input).await.unwrap();

        let mut moved = applied.state.clone();
        moved.network_view = Some("other".into());
        moved.mac_addr = "aa:bb:cc:dd:ee:ff".into();
        let err = IPV4_ASSOCIATION
            .update(&ctx, &applied.id, Diff::new(&applied.state, &moved))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "changing the value of 'network_view' field is not allowed"
        );

        let mut moved = applied.state.clone();
        moved.dns_view = Some("internal".into());
        moved.mac_addr = "aa:bb:cc:dd:ee:ff".into();
        let err = IPV4_ASSOCIATION
            .update(&ctx, &applied.id, Diff::new(&applied.state, &moved))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "changing the value of 'dns_view' field is not allowed"
        );
        let hosts = grid.host_records().await;
        let entry = hosts[0].ipv4_entry("10.0.0.12").unwrap();
        assert!(entry.mac.as_deref().is_none_or(str::is_empty));

        let err = IPV4_ASSOCIATION
            .delete(&ctx, &applied.id, Diff::new(&applied.state, &moved))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "changing the value of 'dns_view' field is not allowed"
        );
    }

    #[tokio::test]
    async fn delete_clears_mac_but_keeps_host() {
        let (ctx, grid) = testing::context();
        grid.insert_host_record("host1.test.com", "default", "default", AddressQuery::V4("10.0.0.12".into()))
            .await;
        let input = data(json!({
            "fqdn": "host1.test.com",
            "ip_addr": "10.0.0.12",
            "mac_addr": "11:22:33:44:55:66",
        }));
        let applied = IPV4_ASSOCIATION.create(&ctx, &input).await.unwrap();
        IPV4_ASSOCIATION
            .delete(&ctx, &applied.id, Diff::unchanged(&applied.state))
            .await
            .unwrap();

        let outcome = IPV4_ASSOCIATION
            .read(&ctx, &applied.id, &applied.state)
            .await
            .unwrap();
        let ReadOutcome::Present(state) = outcome else {
            panic!("host record must survive");
        };
        assert_eq!(state.mac_addr, ZERO_MAC);
    }

    #[tokio::test]
    async fn ipv6_delete_clears_duid() {
        let (ctx, grid) = testing::context();
        grid.insert_host_record("host6.test.com", "default", "default", AddressQuery::V6("2000::12".into()))
            .await;
        let input = data(json!({
            "fqdn": "host6.test.com",
            "ip_addr": "2000::12",
            "duid": "0c:c0:84:d3:03:00:09:12",
        }));
        let applied = IPV6_ASSOCIATION.create(&ctx, &input).await.unwrap();
        assert_eq!(applied.state.duid, "0c:c0:84:d3:03:00:09:12");

        IPV6_ASSOCIATION
            .delete(&ctx, &applied.id, Diff::unchanged(&applied.state))
            .await
            .unwrap();
        let hosts = grid.host_records().await;
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].ipv6_entry("2000::12").unwrap().duid, None);
    }

    #[tokio::test]
    async fn delete_of_vanished_host_succeeds() {
        let (ctx, _grid) = testing::context();
        let state = data(json!({"fqdn": "gone.test.com", "ip_addr": "10.0.0.9"}));
        IPV4_ASSOCIATION
            .delete(&ctx, "record:host/ZG5zLm999999:gone.test.com/default", Diff::unchanged(&state))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn family_mismatch_is_a_validation_error() {
        let (ctx, _grid) = testing::context();
        let input = data(json!({"fqdn": "host1.test.com", "ip_addr": "2000::1"}));
        let err = IPV4_ASSOCIATION.create(&ctx, &input).await.unwrap_err();
        assert!(err.is_validation());
        let bad_mac = data(json!({
            "fqdn": "host1.test.com",
            "ip_addr": "10.0.0.1",
            "mac_addr": "11:22:33",
        }));
        let err = IPV4_ASSOCIATION.create(&ctx, &bad_mac).await.unwrap_err();
        assert_eq!(err.to_string(), "'11:22:33' is not a valid MAC address");
    }
}
