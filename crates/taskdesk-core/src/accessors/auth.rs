use serde::{Deserialize, Serialize};
use taskdesk_shared::AccessToken;
use tracing::{info, instrument, warn};

use crate::client::{ApiClient, Method, Transport};
use crate::context::{Credential, RequestContext};
use crate::error::{ApiError, Failure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginPortal {
    #[default]
    User,
    Admin,
}

impl LoginPortal {
    pub fn path(self) -> &'static str {
        match self {
            Self::User => "/users/login",
            Self::Admin => "/users/admin/login",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl<T: Transport> ApiClient<T> {
    /// Exchanges username and password for a bearer token and attaches it to
    /// `ctx`. A rejected login leaves the context as it was.
    #[instrument(skip(self, ctx, password))]
    pub async fn login(
        &self,
        ctx: &mut RequestContext,
        portal: LoginPortal,
        username: &str,
        password: &str,
    ) -> Result<Credential, ApiError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ApiError::Validation("Username is required".to_string()));
        }
        if password.is_empty() {
            return Err(ApiError::Validation("Password is required".to_string()));
        }

        let fields = vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ];
        let response = self.send_form(Method::Post, portal.path(), fields).await?;

        if response.status != 200 {
            let message = response
                .detail()
                .unwrap_or_else(|| "Invalid username or password".to_string());
            warn!(status = response.status, portal = portal.as_str(), "login rejected");
            return Err(ApiError::Login(Failure::new(message, response.status, None)));
        }

        let status = response.status;
        let token: AccessToken = response.decode()?;
        if token.access_token.is_empty() {
            return Err(ApiError::Login(Failure::new(
                "Invalid username or password",
                status,
                None,
            )));
        }

        let credential = Credential::new(token.access_token);
        ctx.sign_in(credential.clone());
        info!(portal = portal.as_str(), "logged in");
        Ok(credential)
    }
}
