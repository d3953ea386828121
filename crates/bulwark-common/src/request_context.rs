use http::HeaderValue;
use serde::{Deserialize, Serialize};

/// Header carrying the correlation id assigned by the gateway.
pub const CORRELATION_ID: &str = "correlation-id";
/// Header carrying the calling user's id.
pub const USER_ID: &str = "user-id";
/// Header carrying the caller's auth token.
pub const AUTH_TOKEN: &str = "auth-token";
/// Header carrying the tenant (organization) id.
pub const ORG_ID: &str = "org-id";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("invalid request context: {field} {reason}")]
    InvalidContext { field: &'static str, reason: String },
}

/// Identity and correlation data of one inbound request.
///
/// Values are immutable once built; the `with_*` methods return a modified copy.
/// All fields default to the empty string, which is what a unit observes before
/// anything was installed for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RequestContext {
    correlation_id: String,
    user_id: String,
    auth_token: String,
    tenant_id: String,
}

impl RequestContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn with_correlation_id(&self, correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..self.clone()
        }
    }

    pub fn with_user_id(&self, user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..self.clone()
        }
    }

    pub fn with_auth_token(&self, auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            ..self.clone()
        }
    }

    pub fn with_tenant_id(&self, tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.correlation_id.is_empty()
            && self.user_id.is_empty()
            && self.auth_token.is_empty()
            && self.tenant_id.is_empty()
    }

    /// Every field must be representable as an HTTP header value, otherwise the
    /// context could not be re-injected on egress.
    pub fn validate(&self) -> Result<(), ContextError> {
        let fields = [
            (CORRELATION_ID, &self.correlation_id),
            (USER_ID, &self.user_id),
            (AUTH_TOKEN, &self.auth_token),
            (ORG_ID, &self.tenant_id),
        ];
        for (field, value) in fields {
            if HeaderValue::from_str(value).is_err() {
                return Err(ContextError::InvalidContext {
                    field,
                    reason: "is not a valid header value".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_returns_modified_copy() {
        let base = RequestContext::empty().with_correlation_id("abc-123");
        let derived = base.with_auth_token("tok1");

        assert_eq!(base.auth_token(), "");
        assert_eq!(derived.correlation_id(), "abc-123");
        assert_eq!(derived.auth_token(), "tok1");
        assert!(RequestContext::empty().is_empty());
        assert!(!derived.is_empty());
    }

    #[test]
    fn test_validate_rejects_control_characters() {
        let ok = RequestContext::empty()
            .with_correlation_id("abc-123")
            .with_tenant_id("org 42");
        assert!(ok.validate().is_ok());

        let bad = RequestContext::empty().with_user_id("alice\nbob");
        assert_eq!(
            bad.validate(),
            Err(ContextError::InvalidContext {
                field: USER_ID,
                reason: "is not a valid header value".to_string(),
            })
        );
    }
}
