//! Comparators used by the tests: does the object on the appliance look the
//! way we expect?
use std::fmt::Debug;

use crate::ea::ExtAttrs;
use crate::infoblox::types::{HostRecord, RecordA, RecordAAAA, RecordPTR};
use crate::infoblox::{ClientError, ObjectManager};

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("the value of '{field}' field is '{got}', but expected '{expected}'")]
    Mismatch {
        field: &'static str,
        got: String,
        expected: String,
    },
    #[error("the object with ID '{0}' has 'ext_attrs' field, but it is not expected to exist")]
    UnexpectedExtAttrs(String),
    #[error("the object with ID '{0}' has no 'ext_attrs' field, but it is expected to exist")]
    MissingExtAttrs(String),
    #[error("object with ID '{0}' not found, but expected to exist")]
    Missing(String),
    #[error("object with ID '{0}' remains")]
    Remains(String),
    #[error("host record '{reference}' has no entry for {addr}")]
    NoAddress { reference: String, addr: String },
    #[error(transparent)]
    Client(#[from] ClientError),
}

fn show<T: Debug>(value: &Option<T>) -> String {
    match value {
        Some(v) => format!("{v:?}").trim_matches('"').to_string(),
        None => "nil".to_string(),
    }
}

fn field<T: Debug + PartialEq>(
    name: &'static str,
    got: &Option<T>,
    expected: &Option<T>,
) -> Result<(), CheckError> {
    if got == expected {
        return Ok(());
    }
    Err(CheckError::Mismatch {
        field: name,
        got: show(got),
        expected: show(expected),
    })
}

fn plain(name: &'static str, got: &str, expected: &str) -> Result<(), CheckError> {
    if got == expected {
        return Ok(());
    }
    Err(CheckError::Mismatch {
        field: name,
        got: got.to_string(),
        expected: expected.to_string(),
    })
}

/// `ttl` is only compared when `use_ttl` is set.
fn ttl(
    got: (Option<bool>, Option<u32>),
    expected: (Option<bool>, Option<u32>),
) -> Result<(), CheckError> {
    field("use_ttl", &got.0, &expected.0)?;
    if expected.0 == Some(true) {
        field("ttl", &got.1, &expected.1)?;
    }
    Ok(())
}

/// An empty remote set counts as no attributes.
pub fn ext_attrs(
    id: &str,
    got: Option<&ExtAttrs>,
    expected: Option<&ExtAttrs>,
) -> Result<(), CheckError> {
    let got = got.filter(|attrs| !attrs.is_empty());
    let expected = expected.filter(|attrs| !attrs.is_empty());
    match (got, expected) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(CheckError::UnexpectedExtAttrs(id.to_string())),
        (None, Some(_)) => Err(CheckError::MissingExtAttrs(id.to_string())),
        (Some(got), Some(expected)) => {
            for (name, value) in expected.iter() {
                if got.get(name) != Some(value) {
                    return Err(CheckError::Mismatch {
                        field: "ext_attrs",
                        got: format!("{name}={:?}", got.get(name)),
                        expected: format!("{name}={value:?}"),
                    });
                }
            }
            if got.len() != expected.len() {
                return Err(CheckError::Mismatch {
                    field: "ext_attrs",
                    got: crate::ea::encode(got),
                    expected: crate::ea::encode(expected),
                });
            }
            Ok(())
        }
    }
}

pub fn compare_a_record(rec: &RecordA, expected: &RecordA) -> Result<(), CheckError> {
    field("fqdn", &rec.name, &expected.name)?;
    field("ipv4addr", &rec.ipv4addr, &expected.ipv4addr)?;
    plain("dns_view", &rec.view, &expected.view)?;
    ttl((rec.use_ttl, rec.ttl), (expected.use_ttl, expected.ttl))?;
    field("comment", &rec.comment, &expected.comment)?;
    ext_attrs(&rec.reference, rec.ea.as_ref(), expected.ea.as_ref())
}

pub fn compare_aaaa_record(rec: &RecordAAAA, expected: &RecordAAAA) -> Result<(), CheckError> {
    field("fqdn", &rec.name, &expected.name)?;
    field("ipv6addr", &rec.ipv6addr, &expected.ipv6addr)?;
    plain("dns_view", &rec.view, &expected.view)?;
    ttl((rec.use_ttl, rec.ttl), (expected.use_ttl, expected.ttl))?;
    field("comment", &rec.comment, &expected.comment)?;
    ext_attrs(&rec.reference, rec.ea.as_ref(), expected.ea.as_ref())
}

pub fn compare_ptr_record(rec: &RecordPTR, expected: &RecordPTR) -> Result<(), CheckError> {
    field("ptrdname", &rec.ptrdname, &expected.ptrdname)?;
    field("comment", &rec.comment, &expected.comment)?;
    field("name", &rec.name, &expected.name)?;
    ttl((rec.use_ttl, rec.ttl), (expected.use_ttl, expected.ttl))?;
    plain("view", &rec.view, &expected.view)?;
    plain("zone", &rec.zone, &expected.zone)?;
    field("ipv4addr", &rec.ipv4addr, &expected.ipv4addr)?;
    field("ipv6addr", &rec.ipv6addr, &expected.ipv6addr)?;
    ext_attrs(&rec.reference, rec.ea.as_ref(), expected.ea.as_ref())
}

/// The identifier bound to `addr` on a host record: the MAC for IPv4, the
/// DUID for IPv6.
pub fn compare_host_binding(
    host: &HostRecord,
    addr: &str,
    expected: Option<&str>,
) -> Result<(), CheckError> {
    let got = if let Some(entry) = host.ipv4_entry(addr) {
        entry.mac.clone()
    } else if let Some(entry) = host.ipv6_entry(addr) {
        entry.duid.clone()
    } else {
        return Err(CheckError::NoAddress {
            reference: host.reference.clone(),
            addr: addr.to_string(),
        });
    };
    let got = got.filter(|id| !id.is_empty());
    let expected = expected.filter(|id| !id.is_empty()).map(str::to_string);
    field("mac_addr/duid", &got, &expected)
}

pub async fn expect_a_record(
    objmgr: &dyn ObjectManager,
    id: &str,
    expected: &RecordA,
) -> Result<(), CheckError> {
    let rec = objmgr.get_a_record_by_ref(id).await.map_err(|e| missing(id, e))?;
    compare_a_record(&rec, expected)
}

pub async fn expect_aaaa_record(
    objmgr: &dyn ObjectManager,
    id: &str,
    expected: &RecordAAAA,
) -> Result<(), CheckError> {
    let rec = objmgr
        .get_aaaa_record_by_ref(id)
        .await
        .map_err(|e| missing(id, e))?;
    compare_aaaa_record(&rec, expected)
}

/// `expected = None` asserts the record is gone.
pub async fn expect_ptr_record(
    objmgr: &dyn ObjectManager,
    id: &str,
    expected: Option<&RecordPTR>,
) -> Result<(), CheckError> {
    match (objmgr.get_ptr_record_by_ref(id).await, expected) {
        (Ok(rec), Some(expected)) => compare_ptr_record(&rec, expected),
        (Ok(_), None) => Err(CheckError::Remains(id.to_string())),
        (Err(e), None) if e.is_not_found() => Ok(()),
        (Err(e), _) => Err(missing(id, e)),
    }
}

pub async fn expect_host_binding(
    objmgr: &dyn ObjectManager,
    id: &str,
    addr: &str,
    expected: Option<&str>,
) -> Result<(), CheckError> {
    let host = objmgr
        .get_host_record_by_ref(id)
        .await
        .map_err(|e| missing(id, e))?;
    compare_host_binding(&host, addr, expected)
}

pub async fn expect_a_record_destroyed(
    objmgr: &dyn ObjectManager,
    id: &str,
) -> Result<(), CheckError> {
    destroyed(id, objmgr.get_a_record_by_ref(id).await)
}

pub async fn expect_aaaa_record_destroyed(
    objmgr: &dyn ObjectManager,
    id: &str,
) -> Result<(), CheckError> {
    destroyed(id, objmgr.get_aaaa_record_by_ref(id).await)
}

fn destroyed<T>(id: &str, fetched: Result<T, ClientError>) -> Result<(), CheckError> {
    match fetched {
        Ok(_) => Err(CheckError::Remains(id.to_string())),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn missing(id: &str, err: ClientError) -> CheckError {
    if err.is_not_found() {
        CheckError::Missing(id.to_string())
    } else {
        CheckError::Client(err)
    }
}
