//! Infoblox DNS/IPAM objects (A, AAAA and PTR records, IP associations)
//! managed through create / read / update / delete handlers.

#[cfg(any(test, feature = "acceptance"))]
pub mod check;
pub mod config;
pub mod db;
pub mod ea;
pub mod error;
pub mod infoblox;
pub mod lifecycle;
pub mod resources;
pub mod validation;

use config::ProviderConfig;
use ea::ExtAttrs;
use infoblox::{Connector, ObjectManager, Scope};

use std::sync::Arc;

/// Provider-wide dependencies handed to every resource handler.
pub struct ProviderContext {
    pub connector: Arc<dyn Connector>,
    pub cmp_type: String,
    pub default_network_view: String,
    pub default_dns_view: String,
}

impl ProviderContext {
    pub fn new(config: &ProviderConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            cmp_type: config.cmp_type.clone(),
            default_network_view: config.default_network_view.clone(),
            default_dns_view: config.default_dns_view.clone(),
        }
    }

    /// Object manager scoped to the tenant named by the `Tenant ID` EA, if any.
    pub fn object_manager(&self, ea: Option<&ExtAttrs>) -> Arc<dyn ObjectManager> {
        let tenant_id = ea::tenant_id(ea).unwrap_or_default().to_string();
        self.connector.object_manager(Scope {
            cmp_type: self.cmp_type.clone(),
            tenant_id,
        })
    }

    pub fn dns_view(&self, configured: &Option<String>) -> String {
        pick(configured, &self.default_dns_view)
    }

    pub fn network_view(&self, configured: &Option<String>) -> String {
        pick(configured, &self.default_network_view)
    }
}

fn pick(configured: &Option<String>, default: &str) -> String {
    match configured.as_deref().map(str::trim) {
        Some(view) if !view.is_empty() => view.to_string(),
        _ => default.to_string(),
    }
}

/// Arc-wrapped `ProviderContext` shared by concurrent handler calls.
pub type SharedContext = Arc<ProviderContext>;
