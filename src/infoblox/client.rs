use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::ea::{ExtAttrs, WapiExtAttrs};
use crate::infoblox::types::*;
use crate::infoblox::{ClientError, Connector, ObjectManager, Scope};

const A_RECORD_FIELDS: &str = "name,ipv4addr,view,zone,ttl,use_ttl,comment,extattrs";
const AAAA_RECORD_FIELDS: &str = "name,ipv6addr,view,zone,ttl,use_ttl,comment,extattrs";
const PTR_RECORD_FIELDS: &str =
    "name,ptrdname,ipv4addr,ipv6addr,view,zone,ttl,use_ttl,comment,extattrs";
const HOST_RECORD_FIELDS: &str =
    "name,view,network_view,configure_for_dns,ipv4addrs,ipv6addrs,ttl,use_ttl,comment,extattrs";

#[derive(Clone)]
pub struct WapiClient {
    http: Client,
    base_url: String, // e.g. "https://gm.example.com:443/wapi/v2.7"
    username: String,
    password: String,
}

#[cfg(feature = "https-client")]
fn https_client(config: &ProviderConfig) -> Result<Client, ClientError> {
    if !config.ssl_verify {
        warn!("TLS certificate verification is disabled");
    }
    Ok(Client::builder()
        .timeout(config.http_request_timeout)
        .danger_accept_invalid_certs(!config.ssl_verify)
        .build()?)
}

#[cfg(not(feature = "https-client"))]
fn https_client(_config: &ProviderConfig) -> Result<Client, ClientError> {
    Err(ClientError::TlsUnavailable)
}

impl WapiClient {
    /// Fails with [`ClientError::TlsUnavailable`] when built without the
    /// `https-client` feature, since the WAPI is only served over HTTPS.
    pub fn new(config: &ProviderConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: https_client(config)?,
            base_url: config.wapi_base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Client against an explicit base URL, without TLS tuning.
    pub fn with_base_url(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.basic_auth(&self.username, Some(&self.password))
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_object<T: DeserializeOwned>(
        &self,
        reference: &str,
        fields: &str,
    ) -> Result<T, ClientError> {
        let res = self
            .auth(self.http.get(self.url(reference)))
            .query(&[("_return_fields", fields)])
            .send()
            .await?;
        decode(check(res, reference).await?).await
    }

    async fn search<T: DeserializeOwned>(
        &self,
        objtype: &str,
        params: &[(&str, &str)],
        fields: &str,
    ) -> Result<Vec<T>, ClientError> {
        let res = self
            .auth(self.http.get(self.url(objtype)))
            .query(params)
            .query(&[("_return_fields", fields)])
            .send()
            .await?;
        decode(check(res, objtype).await?).await
    }

    async fn create_object<B: Serialize, T: DeserializeOwned>(
        &self,
        objtype: &str,
        body: &B,
        fields: &str,
    ) -> Result<T, ClientError> {
        let res = self
            .auth(self.http.post(self.url(objtype)))
            .query(&[("_return_fields", fields), ("_return_as_object", "1")])
            .json(body)
            .send()
            .await?;
        let wrapped: ReturnedObject<T> = decode(check(res, objtype).await?).await?;
        Ok(wrapped.result)
    }

    async fn update_object<B: Serialize, T: DeserializeOwned>(
        &self,
        reference: &str,
        body: &B,
        fields: &str,
    ) -> Result<T, ClientError> {
        let res = self
            .auth(self.http.put(self.url(reference)))
            .query(&[("_return_fields", fields), ("_return_as_object", "1")])
            .json(body)
            .send()
            .await?;
        let wrapped: ReturnedObject<T> = decode(check(res, reference).await?).await?;
        Ok(wrapped.result)
    }

    async fn delete_object(&self, reference: &str) -> Result<String, ClientError> {
        let res = self
            .auth(self.http.delete(self.url(reference)))
            .send()
            .await?;
        decode(check(res, reference).await?).await
    }
}

impl Connector for WapiClient {
    fn object_manager(&self, scope: Scope) -> Arc<dyn ObjectManager> {
        Arc::new(WapiObjectManager {
            client: self.clone(),
            scope,
        })
    }
}

#[derive(Deserialize)]
struct ReturnedObject<T> {
    result: T,
}

#[derive(Debug, Default, Deserialize)]
struct WapiErrorBody {
    #[serde(rename = "Error", default)]
    error: String, // "AdmConDataNotFoundError: Reference ... not found"
    #[serde(default)]
    code: String, // "Client.Ibap.Data.NotFound"
    #[serde(default)]
    text: String,
}

impl WapiErrorBody {
    fn is_not_found(&self) -> bool {
        self.code.ends_with("Data.NotFound") || self.error.starts_with("AdmConDataNotFoundError")
    }
}

async fn check(res: Response, reference: &str) -> Result<Response, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let parsed: Option<WapiErrorBody> = serde_json::from_str(&body).ok();
    if status == StatusCode::NOT_FOUND || parsed.as_ref().is_some_and(WapiErrorBody::is_not_found) {
        return Err(ClientError::not_found(reference));
    }
    let message = match parsed {
        Some(err) if !err.text.is_empty() => err.text,
        Some(err) if !err.error.is_empty() => err.error,
        _ => body,
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    res.json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// Create sends EAs only when configured; update always sends the full set so
/// that removed attributes are cleared.
fn body_ea(ea: &Option<ExtAttrs>, updating: bool) -> Option<WapiExtAttrs> {
    match ea {
        Some(attrs) => Some(attrs.to_wapi()),
        None if updating => Some(WapiExtAttrs::new()),
        None => None,
    }
}

#[derive(Serialize)]
struct RecordBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv4addr: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv6addr: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ptrdname: Option<&'a str>,
    view: &'a str,
    use_ttl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    comment: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    extattrs: Option<WapiExtAttrs>,
}

impl<'a> RecordBody<'a> {
    fn new(
        view: &'a str,
        ttl: Option<u32>,
        comment: &'a str,
        ea: &Option<ExtAttrs>,
        updating: bool,
    ) -> Self {
        Self {
            name: None,
            ipv4addr: None,
            ipv6addr: None,
            ptrdname: None,
            view,
            use_ttl: ttl.is_some(),
            ttl,
            comment,
            extattrs: body_ea(ea, updating),
        }
    }

    fn a(spec: &'a ARecordSpec, updating: bool) -> Self {
        Self {
            name: Some(spec.name.as_str()),
            ipv4addr: Some(spec.ipv4addr.as_str()),
            ..Self::new(&spec.view, spec.ttl, &spec.comment, &spec.ea, updating)
        }
    }

    fn aaaa(spec: &'a AAAARecordSpec, updating: bool) -> Self {
        Self {
            name: Some(spec.name.as_str()),
            ipv6addr: Some(spec.ipv6addr.as_str()),
            ..Self::new(&spec.view, spec.ttl, &spec.comment, &spec.ea, updating)
        }
    }

    fn ptr(spec: &'a PtrRecordSpec, updating: bool) -> Self {
        let mut body = Self {
            ptrdname: Some(spec.ptrdname.as_str()),
            ..Self::new(&spec.view, spec.ttl, &spec.comment, &spec.ea, updating)
        };
        match &spec.target {
            PtrTarget::RecordName(name) => body.name = Some(name.as_str()),
            PtrTarget::Ipv4(addr) => body.ipv4addr = Some(addr.as_str()),
            PtrTarget::Ipv6(addr) => body.ipv6addr = Some(addr.as_str()),
        }
        body
    }
}

#[derive(Serialize)]
struct HostIpv4Body {
    ipv4addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    mac: String,
    configure_for_dhcp: bool,
}

#[derive(Serialize)]
struct HostIpv6Body {
    ipv6addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    duid: String,
    configure_for_dhcp: bool,
}

#[derive(Serialize)]
struct HostRecordBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    view: &'a str,
    configure_for_dns: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ipv4addrs: Vec<HostIpv4Body>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ipv6addrs: Vec<HostIpv6Body>,
    use_ttl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    comment: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    extattrs: Option<WapiExtAttrs>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<&'a str>,
}

/// An empty address with a CIDR asks the appliance for the next free one.
fn address_or_next_available(addr: &str, cidr: &str, network_view: &str) -> String {
    if addr.is_empty() && !cidr.is_empty() {
        format!("func:nextavailableip:{cidr},{network_view}")
    } else {
        addr.to_string()
    }
}

impl<'a> HostRecordBody<'a> {
    fn from_spec(spec: &'a HostRecordSpec) -> Self {
        let (ipv4addrs, ipv6addrs) = match &spec.binding {
            HostBinding::V4 { cidr, addr, mac } => (
                vec![HostIpv4Body {
                    ipv4addr: address_or_next_available(addr, cidr, &spec.network_view),
                    mac: mac.clone(),
                    configure_for_dhcp: spec.enable_dhcp,
                }],
                Vec::new(),
            ),
            HostBinding::V6 { cidr, addr, duid } => (
                Vec::new(),
                vec![HostIpv6Body {
                    ipv6addr: address_or_next_available(addr, cidr, &spec.network_view),
                    duid: duid.clone(),
                    configure_for_dhcp: spec.enable_dhcp,
                }],
            ),
        };
        Self {
            name: &spec.name,
            view: &spec.view,
            configure_for_dns: spec.enable_dns,
            ipv4addrs,
            ipv6addrs,
            use_ttl: spec.ttl.is_some(),
            ttl: spec.ttl,
            comment: &spec.comment,
            extattrs: body_ea(&spec.ea, true),
            aliases: spec.aliases.iter().map(String::as_str).collect(),
        }
    }
}

/// Object manager talking to a live grid master.
pub struct WapiObjectManager {
    client: WapiClient,
    scope: Scope,
}

impl WapiObjectManager {
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

#[async_trait]
impl ObjectManager for WapiObjectManager {
    async fn create_a_record(&self, spec: &ARecordSpec) -> Result<RecordA, ClientError> {
        debug!(cmp_type = %self.scope.cmp_type, tenant = %self.scope.tenant_id, name = %spec.name, "WAPI create record:a");
        self.client
            .create_object("record:a", &RecordBody::a(spec, false), A_RECORD_FIELDS)
            .await
    }

    async fn get_a_record_by_ref(&self, reference: &str) -> Result<RecordA, ClientError> {
        self.client.get_object(reference, A_RECORD_FIELDS).await
    }

    async fn update_a_record(
        &self,
        reference: &str,
        spec: &ARecordSpec,
    ) -> Result<RecordA, ClientError> {
        debug!(tenant = %self.scope.tenant_id, %reference, "WAPI update record:a");
        self.client
            .update_object(reference, &RecordBody::a(spec, true), A_RECORD_FIELDS)
            .await
    }

    async fn delete_a_record(&self, reference: &str) -> Result<String, ClientError> {
        self.client.delete_object(reference).await
    }

    async fn create_aaaa_record(&self, spec: &AAAARecordSpec) -> Result<RecordAAAA, ClientError> {
        debug!(cmp_type = %self.scope.cmp_type, tenant = %self.scope.tenant_id, name = %spec.name, "WAPI create record:aaaa");
        self.client
            .create_object(
                "record:aaaa",
                &RecordBody::aaaa(spec, false),
                AAAA_RECORD_FIELDS,
            )
            .await
    }

    async fn get_aaaa_record_by_ref(&self, reference: &str) -> Result<RecordAAAA, ClientError> {
        self.client.get_object(reference, AAAA_RECORD_FIELDS).await
    }

    async fn update_aaaa_record(
        &self,
        reference: &str,
        spec: &AAAARecordSpec,
    ) -> Result<RecordAAAA, ClientError> {
        debug!(tenant = %self.scope.tenant_id, %reference, "WAPI update record:aaaa");
        self.client
            .update_object(reference, &RecordBody::aaaa(spec, true), AAAA_RECORD_FIELDS)
            .await
    }

    async fn delete_aaaa_record(&self, reference: &str) -> Result<String, ClientError> {
        self.client.delete_object(reference).await
    }

    async fn create_ptr_record(&self, spec: &PtrRecordSpec) -> Result<RecordPTR, ClientError> {
        debug!(cmp_type = %self.scope.cmp_type, tenant = %self.scope.tenant_id, ptrdname = %spec.ptrdname, "WAPI create record:ptr");
        self.client
            .create_object("record:ptr", &RecordBody::ptr(spec, false), PTR_RECORD_FIELDS)
            .await
    }

    async fn get_ptr_record_by_ref(&self, reference: &str) -> Result<RecordPTR, ClientError> {
        self.client.get_object(reference, PTR_RECORD_FIELDS).await
    }

    async fn update_ptr_record(
        &self,
        reference: &str,
        spec: &PtrRecordSpec,
    ) -> Result<RecordPTR, ClientError> {
        debug!(tenant = %self.scope.tenant_id, %reference, "WAPI update record:ptr");
        self.client
            .update_object(reference, &RecordBody::ptr(spec, true), PTR_RECORD_FIELDS)
            .await
    }

    async fn delete_ptr_record(&self, reference: &str) -> Result<String, ClientError> {
        self.client.delete_object(reference).await
    }

    async fn get_host_record(
        &self,
        query: &HostRecordQuery,
    ) -> Result<Option<HostRecord>, ClientError> {
        let mut params = vec![
            ("name", query.name.as_str()),
            ("network_view", query.network_view.as_str()),
        ];
        if !query.view.is_empty() {
            params.push(("view", query.view.as_str()));
        }
        match &query.address {
            AddressQuery::V4(addr) => params.push(("ipv4addr", addr.as_str())),
            AddressQuery::V6(addr) => params.push(("ipv6addr", addr.as_str())),
        }
        let found: Vec<HostRecord> = self
            .client
            .search("record:host", &params, HOST_RECORD_FIELDS)
            .await?;
        Ok(found.into_iter().next())
    }

    async fn get_host_record_by_ref(&self, reference: &str) -> Result<HostRecord, ClientError> {
        self.client.get_object(reference, HOST_RECORD_FIELDS).await
    }

    async fn update_host_record(
        &self,
        reference: &str,
        spec: &HostRecordSpec,
    ) -> Result<HostRecord, ClientError> {
        debug!(tenant = %self.scope.tenant_id, %reference, "WAPI update record:host");
        self.client
            .update_object(
                reference,
                &HostRecordBody::from_spec(spec),
                HOST_RECORD_FIELDS,
            )
            .await
    }
}
