//! Local input checks shared by every resource handler.
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Sentinel TTL meaning "inherit the zone default".
pub const TTL_UNDEF: i64 = -1;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("'{0}' is required")]
    Missing(&'static str),
    #[error("TTL value must be 0 or higher")]
    NegativeTtl(i64),
    #[error("TTL value {0} is out of range (max {max})", max = u32::MAX)]
    TtlOutOfRange(i64),
    #[error("changing the value of '{0}' field is not allowed")]
    ImmutableField(&'static str),
    #[error("only one of {} may be set", .0.join(", "))]
    ConflictingFields(Vec<&'static str>),
    #[error("one of {} must be set", .0.join(", "))]
    MissingOneOf(Vec<&'static str>),
    #[error("'{field}' must be a valid {family} address, got '{value}'")]
    InvalidAddress {
        field: &'static str,
        family: &'static str,
        value: String,
    },
    #[error("'{0}' is not a valid MAC address")]
    InvalidMac(String),
    #[error("'{0}' is not a valid DHCP unique identifier")]
    InvalidDuid(String),
    #[error("'{0}' is not a valid domain name")]
    InvalidDomainName(String),
}

lazy_static::lazy_static! {
    /// One DNS label. NIOS takes IDN labels and converts them itself, so only
    /// the length and the absence of whitespace are checked here.
    static ref LABEL_RE: Regex = Regex::new(r"^[^\s.]{1,63}$").unwrap();
    /// Colon separated EUI-48.
    static ref MAC_RE: Regex = Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").unwrap();
    static ref DUID_RE: Regex = Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2})*$").unwrap();
}

/// Translate the configured TTL into the `use_ttl`/`ttl` pair sent to the
/// appliance. `None` means no explicit TTL.
pub fn ttl_policy(ttl: i64) -> Result<Option<u32>, ValidationError> {
    if ttl == TTL_UNDEF {
        return Ok(None);
    }
    if ttl < 0 {
        return Err(ValidationError::NegativeTtl(ttl));
    }
    u32::try_from(ttl)
        .map(Some)
        .map_err(|_| ValidationError::TtlOutOfRange(ttl))
}

/// Inverse of [`ttl_policy`] for values read back from the appliance.
pub fn ttl_from_remote(use_ttl: Option<bool>, ttl: Option<u32>) -> i64 {
    match (use_ttl, ttl) {
        (Some(true), Some(ttl)) => i64::from(ttl),
        (Some(true), None) => 0,
        _ => TTL_UNDEF,
    }
}

pub fn validate_domain_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() || trimmed.chars().count() > 253 {
        return Err(ValidationError::InvalidDomainName(name.to_string()));
    }
    if !trimmed.split('.').all(|label| LABEL_RE.is_match(label)) {
        return Err(ValidationError::InvalidDomainName(name.to_string()));
    }
    Ok(())
}

/// Required, syntactically valid domain name.
pub fn require_domain_name(field: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::Missing(field));
    }
    validate_domain_name(name)
}

pub fn parse_ipv4(field: &'static str, value: &str) -> Result<Ipv4Addr, ValidationError> {
    value
        .parse::<Ipv4Addr>()
        .map_err(|_| ValidationError::InvalidAddress {
            field,
            family: "IPv4",
            value: value.to_string(),
        })
}

pub fn parse_ipv6(field: &'static str, value: &str) -> Result<Ipv6Addr, ValidationError> {
    value
        .parse::<Ipv6Addr>()
        .map_err(|_| ValidationError::InvalidAddress {
            field,
            family: "IPv6",
            value: value.to_string(),
        })
}

/// Accepts both `aa:bb:..` and the dash separated `aa-bb-..` notation and
/// returns the colon form. An empty value stays empty.
pub fn normalize_mac(mac: &str) -> Result<String, ValidationError> {
    if mac.is_empty() {
        return Ok(String::new());
    }
    let normalized = mac.replace('-', ":");
    if !MAC_RE.is_match(&normalized) {
        return Err(ValidationError::InvalidMac(mac.to_string()));
    }
    Ok(normalized)
}

pub fn validate_duid(duid: &str) -> Result<(), ValidationError> {
    if duid.is_empty() || DUID_RE.is_match(duid) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDuid(duid.to_string()))
    }
}

/// Exactly one of the named fields must be present.
pub fn exactly_one(fields: &[(&'static str, bool)]) -> Result<(), ValidationError> {
    let set: Vec<&'static str> = fields
        .iter()
        .filter(|(_, present)| *present)
        .map(|(name, _)| *name)
        .collect();
    match set.len() {
        1 => Ok(()),
        0 => Err(ValidationError::MissingOneOf(
            fields.iter().map(|(name, _)| *name).collect(),
        )),
        _ => Err(ValidationError::ConflictingFields(set)),
    }
}
