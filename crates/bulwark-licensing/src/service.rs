use bulwark_common::{ContextStore, License, Organization};
use bulwark_meta::RecordStore;
use bulwark_resilience::{ResilienceError, ResilientExecutor};

use crate::clients::{ClientKind, OrganizationClients};

/// Dependency guarding organization lookups used for license enrichment.
pub const ORGANIZATION_SERVICE: &str = "organization-service";
/// Dependency guarding the per-organization license listing.
pub const LICENSES_BY_ORG: &str = "licenses-by-org";

#[derive(Debug, thiserror::Error)]
pub enum LicenseError {
    #[error("license '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct LicenseService {
    licenses: RecordStore<License>,
    executor: ResilientExecutor,
    clients: OrganizationClients,
    comment: Option<String>,
}

fn record_id(organization_id: &str, license_id: &str) -> String {
    format!("{organization_id}/{license_id}")
}

impl LicenseService {
    pub fn new(
        licenses: RecordStore<License>,
        executor: ResilientExecutor,
        clients: OrganizationClients,
        comment: Option<String>,
    ) -> Self {
        Self {
            licenses,
            executor,
            clients,
            comment,
        }
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    /// Licenses of one organization, or a single placeholder license when the
    /// listing cannot be produced in time.
    pub async fn licenses_by_org(&self, organization_id: &str) -> Result<Vec<License>, LicenseError> {
        tracing::debug!(
            organization_id,
            correlation_id=%ContextStore::current().correlation_id(),
            "listing licenses"
        );
        let store = self.licenses.clone();
        let prefix = record_id(organization_id, "");
        let licenses = self
            .executor
            .call(
                LICENSES_BY_ORG,
                async move { store.list(&prefix).await },
                |_| Ok(vec![License::placeholder(organization_id)]),
            )
            .await?;
        Ok(licenses)
    }

    /// One license enriched with its organization's name and contacts. When the
    /// organization service is unavailable the license is still returned,
    /// carrying the unavailable-organization placeholder.
    pub async fn get_license(
        &self,
        organization_id: &str,
        license_id: &str,
        client: ClientKind,
    ) -> Result<License, LicenseError> {
        let license = self
            .licenses
            .find(&record_id(organization_id, license_id))
            .await?
            .ok_or_else(|| LicenseError::NotFound(license_id.to_string()))?;

        let org = self.retrieve_organization(organization_id, client).await?;
        let license = match org {
            Some(org) => {
                if org.is_unavailable() {
                    tracing::warn!(organization_id, license_id, "returning license with degraded organization data");
                }
                license.with_organization(&org)
            }
            None => {
                tracing::debug!(organization_id, "organization not found, license not enriched");
                license
            }
        };

        Ok(match &self.comment {
            Some(comment) => License {
                comment: Some(comment.clone()),
                ..license
            },
            None => license,
        })
    }

    async fn retrieve_organization(
        &self,
        organization_id: &str,
        kind: ClientKind,
    ) -> Result<Option<Organization>, ResilienceError> {
        tracing::debug!(organization_id, client = kind.as_str(), "retrieving organization");
        let client = self.clients.get(kind);
        let id = organization_id.to_string();
        self.executor
            .call(
                ORGANIZATION_SERVICE,
                async move { client.get_organization(&id).await },
                |_| Ok(Some(Organization::unavailable(organization_id))),
            )
            .await
    }

    pub async fn save_license(&self, organization_id: &str, license: License) -> Result<License, LicenseError> {
        let license = License {
            license_id: uuid::Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            ..license.without_enrichment()
        };
        self.licenses
            .save(&record_id(organization_id, &license.license_id), &license)
            .await?;
        tracing::info!(organization_id, license_id=%license.license_id, "license created");
        Ok(license)
    }

    pub async fn update_license(
        &self,
        organization_id: &str,
        license_id: &str,
        license: License,
    ) -> Result<License, LicenseError> {
        let id = record_id(organization_id, license_id);
        if self.licenses.find(&id).await?.is_none() {
            return Err(LicenseError::NotFound(license_id.to_string()));
        }
        let license = License {
            license_id: license_id.to_string(),
            organization_id: organization_id.to_string(),
            ..license.without_enrichment()
        };
        self.licenses.save(&id, &license).await?;
        tracing::info!(organization_id, license_id, "license updated");
        Ok(license)
    }

    pub async fn delete_license(&self, organization_id: &str, license_id: &str) -> Result<(), LicenseError> {
        if !self.licenses.delete(&record_id(organization_id, license_id)).await? {
            return Err(LicenseError::NotFound(license_id.to_string()));
        }
        tracing::info!(organization_id, license_id, "license deleted");
        Ok(())
    }
}
