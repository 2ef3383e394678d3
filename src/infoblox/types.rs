use serde::{Deserialize, Serialize};

use crate::ea::ExtAttrs;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordA {
    #[serde(rename = "_ref")]
    pub reference: String, // "record:a/ZG5zLmJpbmRfYSQ...:name1.test.com/default"
    pub name: Option<String>,
    pub ipv4addr: Option<String>,
    #[serde(default)]
    pub view: String,
    #[serde(default)]
    pub zone: String,
    pub ttl: Option<u32>,
    pub use_ttl: Option<bool>,
    pub comment: Option<String>,
    #[serde(
        default,
        rename = "extattrs",
        with = "crate::ea::wapi_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub ea: Option<ExtAttrs>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordAAAA {
    #[serde(rename = "_ref")]
    pub reference: String,
    pub name: Option<String>,
    pub ipv6addr: Option<String>,
    #[serde(default)]
    pub view: String,
    #[serde(default)]
    pub zone: String,
    pub ttl: Option<u32>,
    pub use_ttl: Option<bool>,
    pub comment: Option<String>,
    #[serde(
        default,
        rename = "extattrs",
        with = "crate::ea::wapi_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub ea: Option<ExtAttrs>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPTR {
    #[serde(rename = "_ref")]
    pub reference: String,
    pub name: Option<String>,     // "4.0.0.10.in-addr.arpa" or a forward-zone name
    pub ptrdname: Option<String>, // target of the pointer
    pub ipv4addr: Option<String>,
    pub ipv6addr: Option<String>,
    #[serde(default)]
    pub view: String,
    #[serde(default)]
    pub zone: String,
    pub ttl: Option<u32>,
    pub use_ttl: Option<bool>,
    pub comment: Option<String>,
    #[serde(
        default,
        rename = "extattrs",
        with = "crate::ea::wapi_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub ea: Option<ExtAttrs>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostRecordIpv4Addr {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub ipv4addr: Option<String>,
    pub mac: Option<String>,
    pub configure_for_dhcp: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostRecordIpv6Addr {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub ipv6addr: Option<String>,
    pub duid: Option<String>,
    pub configure_for_dhcp: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    #[serde(rename = "_ref")]
    pub reference: String,
    pub name: Option<String>,
    pub view: Option<String>,
    pub network_view: Option<String>,
    pub configure_for_dns: Option<bool>,
    #[serde(default)]
    pub ipv4addrs: Vec<HostRecordIpv4Addr>,
    #[serde(default)]
    pub ipv6addrs: Vec<HostRecordIpv6Addr>,
    pub ttl: Option<u32>,
    pub use_ttl: Option<bool>,
    pub comment: Option<String>,
    #[serde(
        default,
        rename = "extattrs",
        with = "crate::ea::wapi_format",
        skip_serializing_if = "Option::is_none"
    )]
    pub ea: Option<ExtAttrs>,
}

impl HostRecord {
    pub fn ipv4_entry(&self, addr: &str) -> Option<&HostRecordIpv4Addr> {
        self.ipv4addrs
            .iter()
            .find(|entry| entry.ipv4addr.as_deref() == Some(addr))
    }

    pub fn ipv6_entry(&self, addr: &str) -> Option<&HostRecordIpv6Addr> {
        self.ipv6addrs
            .iter()
            .find(|entry| entry.ipv6addr.as_deref() == Some(addr))
    }
}

// Inputs handed to the object manager. They are the full object: the WAPI
// client has no partial update.

#[derive(Debug, Clone, PartialEq)]
pub struct ARecordSpec {
    pub view: String,
    pub name: String,
    pub ipv4addr: String,
    /// `None` leaves the zone default in effect.
    pub ttl: Option<u32>,
    pub comment: String,
    pub ea: Option<ExtAttrs>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AAAARecordSpec {
    pub view: String,
    pub name: String,
    pub ipv6addr: String,
    pub ttl: Option<u32>,
    pub comment: String,
    pub ea: Option<ExtAttrs>,
}

/// What a PTR record is keyed on; the appliance derives the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtrTarget {
    RecordName(String),
    Ipv4(String),
    Ipv6(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PtrRecordSpec {
    pub view: String,
    pub ptrdname: String,
    pub target: PtrTarget,
    pub ttl: Option<u32>,
    pub comment: String,
    pub ea: Option<ExtAttrs>,
}

/// Address plus client identifier bound to a host record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostBinding {
    V4 {
        cidr: String,
        addr: String,
        mac: String,
    },
    V6 {
        cidr: String,
        addr: String,
        duid: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostRecordSpec {
    pub name: String,
    pub network_view: String,
    /// Empty when the host is not configured for DNS.
    pub view: String,
    pub enable_dns: bool,
    pub enable_dhcp: bool,
    pub binding: HostBinding,
    pub ttl: Option<u32>,
    pub comment: String,
    pub ea: Option<ExtAttrs>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressQuery {
    V4(String),
    V6(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecordQuery {
    pub network_view: String,
    /// Empty searches all DNS views (IPAM-only hosts).
    pub view: String,
    pub name: String,
    pub address: AddressQuery,
}
