//! Extensible attributes: the flat JSON string users configure, and the
//! `{"Name": {"value": ...}}` shape the WAPI expects.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// EA whose value selects the tenant scope of the object manager.
pub const TENANT_ID_EA: &str = "Tenant ID";

#[derive(Debug, thiserror::Error)]
#[error("cannot process 'ext_attrs' field: {0}")]
pub struct EaDecodeError(#[from] serde_json::Error);

/// A single attribute value. Multi-value attributes come as lists; anything
/// that is not one of the common NIOS shapes is carried as raw JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EaValue {
    Text(String),
    Integer(i64),
    Number(Number),
    Flag(bool),
    List(Vec<Value>),
    Raw(Value),
}

impl EaValue {
    /// Values coming back from the appliance. Never fails.
    fn from_remote(value: Value) -> Self {
        match value {
            Value::String(s) => EaValue::Text(s),
            Value::Bool(b) => EaValue::Flag(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => EaValue::Integer(i),
                None => EaValue::Number(n),
            },
            Value::Array(items) => EaValue::List(items),
            other => EaValue::Raw(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtAttrs(BTreeMap<String, EaValue>);

#[derive(Debug, Serialize, Deserialize)]
struct WapiEaEntry<T> {
    value: T,
}

/// Wire form as sent to and returned by the WAPI.
pub type WapiExtAttrs = BTreeMap<String, Value>;

impl ExtAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: EaValue) -> Option<EaValue> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&EaValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EaValue)> {
        self.0.iter()
    }

    pub fn to_wapi(&self) -> WapiExtAttrs {
        self.0
            .iter()
            .map(|(name, value)| {
                let entry = WapiEaEntry { value };
                (
                    name.clone(),
                    serde_json::to_value(entry).unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Entries that are not `{"value": ...}` objects are skipped.
    pub fn from_wapi(wire: WapiExtAttrs) -> Self {
        let attrs = wire
            .into_iter()
            .filter_map(|(name, entry)| {
                let entry: WapiEaEntry<Value> = serde_json::from_value(entry).ok()?;
                Some((name, EaValue::from_remote(entry.value)))
            })
            .collect();
        ExtAttrs(attrs)
    }
}

impl<K: Into<String>> FromIterator<(K, EaValue)> for ExtAttrs {
    fn from_iter<I: IntoIterator<Item = (K, EaValue)>>(iter: I) -> Self {
        ExtAttrs(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Decode the configured `ext_attrs` string. An empty string means the
/// attribute set is absent, which is not the same as `{}`.
pub fn decode(json: &str) -> Result<Option<ExtAttrs>, EaDecodeError> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(json)?))
}

/// Compact JSON with sorted keys.
pub fn encode(attrs: &ExtAttrs) -> String {
    serde_json::to_string(attrs).unwrap_or_else(|_| "{}".to_string())
}

/// Render remote attributes back into the configured string form. The
/// configured text is kept when it already describes the remote set, and an
/// empty remote set only becomes `{}` when the caller had configured `{}`.
pub fn encode_remote(remote: Option<&ExtAttrs>, configured: &str) -> String {
    let remote = remote.filter(|attrs| !attrs.is_empty());
    let local = decode(configured).ok().flatten();
    match (remote, local) {
        (None, _) if configured.trim().is_empty() => String::new(),
        (None, Some(local)) if local.is_empty() => configured.to_string(),
        (None, _) => "{}".to_string(),
        (Some(remote), Some(local)) if *remote == local => configured.to_string(),
        (Some(remote), _) => encode(remote),
    }
}

/// `#[serde(with = "...")]` adapter for `Option<ExtAttrs>` fields holding the
/// WAPI `extattrs` object.
pub mod wapi_format {
    use super::{ExtAttrs, WapiExtAttrs};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(attrs: &Option<ExtAttrs>, ser: S) -> Result<S::Ok, S::Error> {
        attrs.as_ref().map(ExtAttrs::to_wapi).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<ExtAttrs>, D::Error> {
        Ok(Option::<WapiExtAttrs>::deserialize(de)?.map(ExtAttrs::from_wapi))
    }
}

pub fn tenant_id(attrs: Option<&ExtAttrs>) -> Option<&str> {
    match attrs?.get(TENANT_ID_EA)? {
        EaValue::Text(tenant) => Some(tenant.as_str()),
        _ => None,
    }
}
