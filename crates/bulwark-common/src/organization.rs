use serde::{Deserialize, Serialize};

/// Name given to the placeholder returned when organization data cannot be fetched.
pub const UNAVAILABLE_ORGANIZATION_NAME: &str = "Organization information currently unavailable";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
}

impl Organization {
    /// Degraded stand-in used as the fallback for organization lookups.
    pub fn unavailable(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: UNAVAILABLE_ORGANIZATION_NAME.to_string(),
            ..Self::default()
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.name == UNAVAILABLE_ORGANIZATION_NAME
    }
}
