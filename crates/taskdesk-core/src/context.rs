use std::fmt;

use tracing::{debug, warn};

use crate::error::ApiError;

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Per-invocation request state: the bearer credential attached to outgoing
/// calls, and whether a 401 has asked the caller to send the user back to
/// login.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    credential: Option<Credential>,
    login_required: bool,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
            login_required: false,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn login_required(&self) -> bool {
        self.login_required
    }

    pub fn sign_in(&mut self, credential: Credential) {
        debug!("credential attached to request context");
        self.credential = Some(credential);
        self.login_required = false;
    }

    /// Called on a 401: drops the credential and raises the login signal.
    pub fn expire(&mut self) {
        warn!("credential rejected by API; login required");
        self.credential = None;
        self.login_required = true;
    }

    pub fn require_login(&self) -> Result<&Credential, ApiError> {
        self.credential.as_ref().ok_or(ApiError::Authentication)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_clears_credential_and_requests_login() {
        let mut ctx = RequestContext::with_credential(Credential::new("abc"));
        assert!(ctx.require_login().is_ok());

        ctx.expire();

        assert!(!ctx.is_authenticated());
        assert!(ctx.login_required());
        assert_eq!(ctx.require_login(), Err(ApiError::Authentication));

        ctx.sign_in(Credential::new("fresh"));
        assert!(!ctx.login_required());
        assert_eq!(ctx.credential().map(Credential::expose), Some("fresh"));
    }

    #[test]
    fn debug_output_redacts_token() {
        let ctx = RequestContext::with_credential(Credential::new("secret-token"));
        let rendered = format!("{ctx:?}");
        assert!(!rendered.contains("secret-token"));
    }
}
