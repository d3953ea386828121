use serde::{Deserialize, Serialize};

use crate::organization::Organization;

pub const PLACEHOLDER_LICENSE_ID: &str = "0000000-00-00000";
pub const PLACEHOLDER_PRODUCT_NAME: &str = "Sorry no licensing information currently available";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct License {
    #[serde(default)]
    pub license_id: String,
    #[serde(default)]
    pub organization_id: String,
    pub product_name: String,
    #[serde(default)]
    pub license_type: String,
    #[serde(default)]
    pub license_max: u32,
    #[serde(default)]
    pub license_allocated: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    // Filled from the organization service on read, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
}

impl License {
    /// Single-entry stand-in returned when the license list cannot be produced.
    pub fn placeholder(organization_id: &str) -> Self {
        Self {
            license_id: PLACEHOLDER_LICENSE_ID.to_string(),
            organization_id: organization_id.to_string(),
            product_name: PLACEHOLDER_PRODUCT_NAME.to_string(),
            ..Self::default()
        }
    }

    pub fn with_organization(self, org: &Organization) -> Self {
        Self {
            organization_name: Some(org.name.clone()),
            contact_name: Some(org.contact_name.clone()),
            contact_email: Some(org.contact_email.clone()),
            contact_phone: Some(org.contact_phone.clone()),
            ..self
        }
    }

    /// Drops enrichment fields so only the owned record is persisted.
    pub fn without_enrichment(self) -> Self {
        Self {
            organization_name: None,
            contact_name: None,
            contact_email: None,
            contact_phone: None,
            ..self
        }
    }
}
