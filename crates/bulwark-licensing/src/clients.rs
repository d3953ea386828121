//! Ways of reaching the organization service. Every request carries the
//! current request context.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;

use bulwark_common::{Organization, PropagateContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// Through the gateway's `/api/organization` route.
    Rest,
    /// Directly against the first known organization instance.
    Discovery,
}

impl ClientKind {
    /// Unknown or empty names fall back to [`ClientKind::Rest`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovery" => ClientKind::Discovery,
            "rest" | "feign" => ClientKind::Rest,
            other => {
                if !other.is_empty() {
                    tracing::debug!(client_type = other, "unknown client type, using rest");
                }
                ClientKind::Rest
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClientKind::Rest => "rest",
            ClientKind::Discovery => "discovery",
        }
    }
}

#[async_trait]
pub trait OrganizationClient: Send + Sync {
    /// `Ok(None)` when the organization service answers 404.
    async fn get_organization(&self, organization_id: &str) -> anyhow::Result<Option<Organization>>;
}

async fn fetch_organization(http: &reqwest::Client, url: &str) -> anyhow::Result<Option<Organization>> {
    let resp = http
        .get(url)
        .with_request_context()
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if resp.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let resp = resp.error_for_status()?;
    let org = resp
        .json::<Organization>()
        .await
        .with_context(|| format!("decode organization from {url}"))?;
    Ok(Some(org))
}

pub struct GatewayOrganizationClient {
    http: reqwest::Client,
    gateway_url: String,
}

impl GatewayOrganizationClient {
    pub fn new(http: reqwest::Client, gateway_url: &str) -> Self {
        Self {
            http,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl OrganizationClient for GatewayOrganizationClient {
    async fn get_organization(&self, organization_id: &str) -> anyhow::Result<Option<Organization>> {
        let url = format!(
            "{}/api/organization/v1/organizations/{organization_id}",
            self.gateway_url
        );
        fetch_organization(&self.http, &url).await
    }
}

/// Static list of organization service instance base URLs.
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    instances: Vec<String>,
}

impl ServiceDirectory {
    pub fn new(instances: impl IntoIterator<Item = String>) -> Self {
        Self {
            instances: instances
                .into_iter()
                .map(|i| i.trim().trim_end_matches('/').to_string())
                .filter(|i| !i.is_empty())
                .collect(),
        }
    }

    pub fn instances(&self) -> &[String] {
        &self.instances
    }
}

pub struct DiscoveryOrganizationClient {
    http: reqwest::Client,
    directory: Arc<ServiceDirectory>,
}

impl DiscoveryOrganizationClient {
    pub fn new(http: reqwest::Client, directory: Arc<ServiceDirectory>) -> Self {
        Self { http, directory }
    }
}

#[async_trait]
impl OrganizationClient for DiscoveryOrganizationClient {
    async fn get_organization(&self, organization_id: &str) -> anyhow::Result<Option<Organization>> {
        let base = self
            .directory
            .instances()
            .first()
            .ok_or_else(|| anyhow!("no organization service instances registered"))?;
        let url = format!("{base}/v1/organizations/{organization_id}");
        fetch_organization(&self.http, &url).await
    }
}

/// One client per [`ClientKind`].
#[derive(Clone)]
pub struct OrganizationClients {
    pub rest: Arc<dyn OrganizationClient>,
    pub discovery: Arc<dyn OrganizationClient>,
}

impl OrganizationClients {
    pub fn get(&self, kind: ClientKind) -> Arc<dyn OrganizationClient> {
        match kind {
            ClientKind::Rest => self.rest.clone(),
            ClientKind::Discovery => self.discovery.clone(),
        }
    }
}
