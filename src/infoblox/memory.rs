//! In-memory grid used by the handler tests. It keys objects the way NIOS
//! does (the reference embeds the name, so renames re-key) and derives PTR
//! names and zones from addresses.
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::infoblox::types::*;
use crate::infoblox::{ClientError, Connector, ObjectManager, Scope};

#[derive(Default)]
struct GridState {
    a: BTreeMap<String, RecordA>,
    aaaa: BTreeMap<String, RecordAAAA>,
    ptr: BTreeMap<String, RecordPTR>,
    host: BTreeMap<String, HostRecord>,
    next_id: u64,
}

impl GridState {
    fn reference(&mut self, objtype: &str, name: &str, view: &str) -> String {
        self.next_id += 1;
        format!("{objtype}/ZG5zLm{:06}:{name}/{view}", self.next_id)
    }
}

#[derive(Default)]
pub(crate) struct MemoryGrid {
    state: RwLock<GridState>,
    scopes: Mutex<Vec<Scope>>,
}

impl MemoryGrid {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scopes object managers were requested with, in order.
    pub fn scopes(&self) -> Vec<Scope> {
        self.scopes.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub async fn insert_host_record(
        &self,
        name: &str,
        view: &str,
        network_view: &str,
        binding: AddressQuery,
    ) -> String {
        let mut state = self.state.write().await;
        let reference = state.reference("record:host", name, view);
        let (ipv4addrs, ipv6addrs) = match binding {
            AddressQuery::V4(addr) => (
                vec![HostRecordIpv4Addr {
                    reference: None,
                    ipv4addr: Some(addr),
                    mac: None,
                    configure_for_dhcp: Some(false),
                }],
                Vec::new(),
            ),
            AddressQuery::V6(addr) => (
                Vec::new(),
                vec![HostRecordIpv6Addr {
                    reference: None,
                    ipv6addr: Some(addr),
                    duid: None,
                    configure_for_dhcp: Some(false),
                }],
            ),
        };
        state.host.insert(
            reference.clone(),
            HostRecord {
                reference: reference.clone(),
                name: Some(name.to_string()),
                view: Some(view.to_string()),
                network_view: Some(network_view.to_string()),
                configure_for_dns: Some(true),
                ipv4addrs,
                ipv6addrs,
                ttl: Some(0),
                use_ttl: Some(false),
                comment: Some(String::new()),
                ea: Some(Default::default()),
            },
        );
        reference
    }

    pub async fn host_records(&self) -> Vec<HostRecord> {
        self.state.read().await.host.values().cloned().collect()
    }

    pub async fn a_record_count(&self) -> usize {
        self.state.read().await.a.len()
    }
}

pub(crate) struct MemoryConnector(pub Arc<MemoryGrid>);

impl Connector for MemoryConnector {
    fn object_manager(&self, scope: Scope) -> Arc<dyn ObjectManager> {
        if let Ok(mut scopes) = self.0.scopes.lock() {
            scopes.push(scope);
        }
        self.0.clone()
    }
}

fn ttl_fields(ttl: Option<u32>) -> (Option<u32>, Option<bool>) {
    match ttl {
        Some(ttl) => (Some(ttl), Some(true)),
        None => (Some(0), Some(false)),
    }
}

fn parent_zone(name: &str) -> String {
    name.split_once('.')
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_default()
}

fn reverse_v4(addr: Ipv4Addr) -> String {
    let o = addr.octets();
    format!("{}.{}.{}.{}.in-addr.arpa", o[3], o[2], o[1], o[0])
}

fn reverse_v6(addr: Ipv6Addr) -> String {
    let nibbles: Vec<String> = addr
        .octets()
        .iter()
        .rev()
        .flat_map(|b| [b & 0x0f, b >> 4])
        .map(|n| format!("{n:x}"))
        .collect();
    format!("{}.ip6.arpa", nibbles.join("."))
}

fn v4_from_reverse(name: &str) -> Option<String> {
    let labels: Vec<&str> = name.strip_suffix(".in-addr.arpa")?.split('.').collect();
    if labels.len() != 4 {
        return None;
    }
    let addr: Vec<&str> = labels.into_iter().rev().collect();
    Some(addr.join(".")).filter(|a| a.parse::<Ipv4Addr>().is_ok())
}

fn bad_address(addr: &str) -> ClientError {
    ClientError::Api {
        status: 400,
        message: format!("Invalid IP address '{addr}'"),
    }
}

fn ptr_from_spec(reference: String, spec: &PtrRecordSpec) -> Result<RecordPTR, ClientError> {
    let (name, ipv4addr, ipv6addr) = match &spec.target {
        PtrTarget::RecordName(name) => (
            name.clone(),
            v4_from_reverse(name).unwrap_or_default(),
            String::new(),
        ),
        PtrTarget::Ipv4(addr) => {
            let parsed: Ipv4Addr = addr.parse().map_err(|_| bad_address(addr))?;
            (reverse_v4(parsed), addr.clone(), String::new())
        }
        PtrTarget::Ipv6(addr) => {
            let parsed: Ipv6Addr = addr.parse().map_err(|_| bad_address(addr))?;
            (reverse_v6(parsed), String::new(), addr.clone())
        }
    };
    let (ttl, use_ttl) = ttl_fields(spec.ttl);
    Ok(RecordPTR {
        reference,
        zone: parent_zone(&name),
        name: Some(name),
        ptrdname: Some(spec.ptrdname.clone()),
        ipv4addr: Some(ipv4addr),
        ipv6addr: Some(ipv6addr),
        view: spec.view.clone(),
        ttl,
        use_ttl,
        comment: Some(spec.comment.clone()),
        ea: Some(spec.ea.clone().unwrap_or_default()),
    })
}

fn conflict(name: &str) -> ClientError {
    ClientError::Api {
        status: 400,
        message: format!("The record '{name}' already exists."),
    }
}

#[async_trait]
impl ObjectManager for MemoryGrid {
    async fn create_a_record(&self, spec: &ARecordSpec) -> Result<RecordA, ClientError> {
        let mut state = self.state.write().await;
        let duplicate = state.a.values().any(|r| {
            r.name.as_deref() == Some(spec.name.as_str())
                && r.ipv4addr.as_deref() == Some(spec.ipv4addr.as_str())
                && r.view == spec.view
        });
        if duplicate {
            return Err(conflict(&spec.name));
        }
        let reference = state.reference("record:a", &spec.name, &spec.view);
        let (ttl, use_ttl) = ttl_fields(spec.ttl);
        let rec = RecordA {
            reference: reference.clone(),
            name: Some(spec.name.clone()),
            ipv4addr: Some(spec.ipv4addr.clone()),
            view: spec.view.clone(),
            zone: parent_zone(&spec.name),
            ttl,
            use_ttl,
            comment: Some(spec.comment.clone()),
            ea: Some(spec.ea.clone().unwrap_or_default()),
        };
        state.a.insert(reference, rec.clone());
        Ok(rec)
    }

    async fn get_a_record_by_ref(&self, reference: &str) -> Result<RecordA, ClientError> {
        self.state
            .read()
            .await
            .a
            .get(reference)
            .cloned()
            .ok_or_else(|| ClientError::not_found(reference))
    }

    async fn update_a_record(
        &self,
        reference: &str,
        spec: &ARecordSpec,
    ) -> Result<RecordA, ClientError> {
        let mut state = self.state.write().await;
        let mut rec = state
            .a
            .remove(reference)
            .ok_or_else(|| ClientError::not_found(reference))?;
        if rec.name.as_deref() != Some(spec.name.as_str()) {
            rec.reference = state.reference("record:a", &spec.name, &rec.view);
        }
        let (ttl, use_ttl) = ttl_fields(spec.ttl);
        rec.name = Some(spec.name.clone());
        rec.zone = parent_zone(&spec.name);
        rec.ipv4addr = Some(spec.ipv4addr.clone());
        rec.ttl = ttl;
        rec.use_ttl = use_ttl;
        rec.comment = Some(spec.comment.clone());
        rec.ea = Some(spec.ea.clone().unwrap_or_default());
        state.a.insert(rec.reference.clone(), rec.clone());
        Ok(rec)
    }

    async fn delete_a_record(&self, reference: &str) -> Result<String, ClientError> {
        self.state
            .write()
            .await
            .a
            .remove(reference)
            .map(|rec| rec.reference)
            .ok_or_else(|| ClientError::not_found(reference))
    }

    async fn create_aaaa_record(&self, spec: &AAAARecordSpec) -> Result<RecordAAAA, ClientError> {
        let mut state = self.state.write().await;
        let duplicate = state.aaaa.values().any(|r| {
            r.name.as_deref() == Some(spec.name.as_str())
                && r.ipv6addr.as_deref() == Some(spec.ipv6addr.as_str())
                && r.view == spec.view
        });
        if duplicate {
            return Err(conflict(&spec.name));
        }
        let reference = state.reference("record:aaaa", &spec.name, &spec.view);
        let (ttl, use_ttl) = ttl_fields(spec.ttl);
        let rec = RecordAAAA {
            reference: reference.clone(),
            name: Some(spec.name.clone()),
            ipv6addr: Some(spec.ipv6addr.clone()),
            view: spec.view.clone(),
            zone: parent_zone(&spec.name),
            ttl,
            use_ttl,
            comment: Some(spec.comment.clone()),
            ea: Some(spec.ea.clone().unwrap_or_default()),
        };
        state.aaaa.insert(reference, rec.clone());
        Ok(rec)
    }

    async fn get_aaaa_record_by_ref(&self, reference: &str) -> Result<RecordAAAA, ClientError> {
        self.state
            .read()
            .await
            .aaaa
            .get(reference)
            .cloned()
            .ok_or_else(|| ClientError::not_found(reference))
    }

    async fn update_aaaa_record(
        &self,
        reference: &str,
        spec: &AAAARecordSpec,
    ) -> Result<RecordAAAA, ClientError> {
        let mut state = self.state.write().await;
        let mut rec = state
            .aaaa
            .remove(reference)
            .ok_or_else(|| ClientError::not_found(reference))?;
        if rec.name.as_deref() != Some(spec.name.as_str()) {
            rec.reference = state.reference("record:aaaa", &spec.name, &rec.view);
        }
        let (ttl, use_ttl) = ttl_fields(spec.ttl);
        rec.name = Some(spec.name.clone());
        rec.zone = parent_zone(&spec.name);
        rec.ipv6addr = Some(spec.ipv6addr.clone());
        rec.ttl = ttl;
        rec.use_ttl = use_ttl;
        rec.comment = Some(spec.comment.clone());
        rec.ea = Some(spec.ea.clone().unwrap_or_default());
        state.aaaa.insert(rec.reference.clone(), rec.clone());
        Ok(rec)
    }

    async fn delete_aaaa_record(&self, reference: &str) -> Result<String, ClientError> {
        self.state
            .write()
            .await
            .aaaa
            .remove(reference)
            .map(|rec| rec.reference)
            .ok_or_else(|| ClientError::not_found(reference))
    }

    async fn create_ptr_record(&self, spec: &PtrRecordSpec) -> Result<RecordPTR, ClientError> {
        let mut state = self.state.write().await;
        let placeholder = String::new();
        let mut rec = ptr_from_spec(placeholder, spec)?;
        let name = rec.name.clone().unwrap_or_default();
        rec.reference = state.reference("record:ptr", &name, &spec.view);
        state.ptr.insert(rec.reference.clone(), rec.clone());
        Ok(rec)
    }

    async fn get_ptr_record_by_ref(&self, reference: &str) -> Result<RecordPTR, ClientError> {
        self.state
            .read()
            .await
            .ptr
            .get(reference)
            .cloned()
            .ok_or_else(|| ClientError::not_found(reference))
    }

    async fn update_ptr_record(
        &self,
        reference: &str,
        spec: &PtrRecordSpec,
    ) -> Result<RecordPTR, ClientError> {
        let mut state = self.state.write().await;
        let old = state
            .ptr
            .get(reference)
            .cloned()
            .ok_or_else(|| ClientError::not_found(reference))?;
        let mut rec = ptr_from_spec(old.reference.clone(), spec)?;
        rec.view = old.view.clone();
        if rec.name != old.name {
            let name = rec.name.clone().unwrap_or_default();
            rec.reference = state.reference("record:ptr", &name, &old.view);
        }
        state.ptr.remove(reference);
        state.ptr.insert(rec.reference.clone(), rec.clone());
        Ok(rec)
    }

    async fn delete_ptr_record(&self, reference: &str) -> Result<String, ClientError> {
        self.state
            .write()
            .await
            .ptr
            .remove(reference)
            .map(|rec| rec.reference)
            .ok_or_else(|| ClientError::not_found(reference))
    }

    async fn get_host_record(
        &self,
        query: &HostRecordQuery,
    ) -> Result<Option<HostRecord>, ClientError> {
        let state = self.state.read().await;
        let found = state.host.values().find(|host| {
            let address_matches = match &query.address {
                AddressQuery::V4(addr) => host.ipv4_entry(addr).is_some(),
                AddressQuery::V6(addr) => host.ipv6_entry(addr).is_some(),
            };
            host.name.as_deref() == Some(query.name.as_str())
                && host.network_view.as_deref() == Some(query.network_view.as_str())
                && (query.view.is_empty() || host.view.as_deref() == Some(query.view.as_str()))
                && address_matches
        });
        Ok(found.cloned())
    }

    async fn get_host_record_by_ref(&self, reference: &str) -> Result<HostRecord, ClientError> {
        self.state
            .read()
            .await
            .host
            .get(reference)
            .cloned()
            .ok_or_else(|| ClientError::not_found(reference))
    }

    async fn update_host_record(
        &self,
        reference: &str,
        spec: &HostRecordSpec,
    ) -> Result<HostRecord, ClientError> {
        let mut state = self.state.write().await;
        let mut host = state
            .host
            .remove(reference)
            .ok_or_else(|| ClientError::not_found(reference))?;
        if host.name.as_deref() != Some(spec.name.as_str()) {
            let view = host.view.clone().unwrap_or_default();
            host.reference = state.reference("record:host", &spec.name, &view);
        }
        match &spec.binding {
            HostBinding::V4 { addr, mac, .. } => {
                host.ipv4addrs = vec![HostRecordIpv4Addr {
                    reference: None,
                    ipv4addr: Some(addr.clone()),
                    mac: Some(mac.clone()).filter(|m| !m.is_empty()),
                    configure_for_dhcp: Some(spec.enable_dhcp),
                }];
            }
            HostBinding::V6 { addr, duid, .. } => {
                host.ipv6addrs = vec![HostRecordIpv6Addr {
                    reference: None,
                    ipv6addr: Some(addr.clone()),
                    duid: Some(duid.clone()).filter(|d| !d.is_empty()),
                    configure_for_dhcp: Some(spec.enable_dhcp),
                }];
            }
        }
        if !spec.view.is_empty() {
            host.view = Some(spec.view.clone());
        }
        let (ttl, use_ttl) = ttl_fields(spec.ttl);
        host.name = Some(spec.name.clone());
        host.configure_for_dns = Some(spec.enable_dns);
        host.ttl = ttl;
        host.use_ttl = use_ttl;
        host.comment = Some(spec.comment.clone());
        host.ea = Some(spec.ea.clone().unwrap_or_default());
        state.host.insert(host.reference.clone(), host.clone());
        Ok(host)
    }
}
