use std::net::Ipv6Addr;
use std::time::Duration;

pub const DEFAULT_NETWORK_VIEW: &str = "default";
pub const DEFAULT_DNS_VIEW: &str = "default";
pub const DEFAULT_CMP_TYPE: &str = "Terraform";
pub const DEFAULT_WAPI_VERSION: &str = "2.7";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' must not be empty")]
    Empty(&'static str),
    #[error("invalid WAPI version '{0}' (expected e.g. 2.7)")]
    WapiVersion(String),
}

/// Connection settings and provider-wide defaults.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub server: String, // host name or address of the grid master
    pub port: u16,
    pub wapi_version: String,
    pub username: String,
    pub password: String,
    pub ssl_verify: bool,
    pub http_request_timeout: Duration,
    /// Cloud-management-platform type recorded by the object manager.
    pub cmp_type: String,
    pub default_network_view: String,
    pub default_dns_view: String,
}

impl ProviderConfig {
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_PORT,
            wapi_version: DEFAULT_WAPI_VERSION.to_string(),
            username: username.into(),
            password: password.into(),
            ssl_verify: true,
            http_request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cmp_type: DEFAULT_CMP_TYPE.to_string(),
            default_network_view: DEFAULT_NETWORK_VIEW.to_string(),
            default_dns_view: DEFAULT_DNS_VIEW.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("server", &self.server),
            ("username", &self.username),
            ("password", &self.password),
            ("cmp_type", &self.cmp_type),
            ("default_network_view", &self.default_network_view),
            ("default_dns_view", &self.default_dns_view),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }
        let well_formed = self
            .wapi_version
            .trim_start_matches('v')
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
        if !well_formed {
            return Err(ConfigError::WapiVersion(self.wapi_version.clone()));
        }
        Ok(())
    }

    /// Base URL of the WAPI, e.g. `https://gm.example.com:443/wapi/v2.7`.
    pub fn wapi_base_url(&self) -> String {
        let host = self
            .server
            .trim()
            .trim_start_matches("https://")
            .trim_end_matches('/');
        let host = if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        format!(
            "https://{}:{}/wapi/v{}",
            host,
            self.port,
            self.wapi_version.trim_start_matches('v')
        )
    }
}
