use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;
use taskdesk_shared::{TaskDto, UserDto, UserRef, UserRegistration};
use tracing::{debug, info, instrument, warn};

use crate::client::{ApiClient, Method, Transport};
use crate::context::RequestContext;
use crate::error::{ApiError, Failure};

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

static EMAIL_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN));

#[derive(Clone)]
pub struct RegistrationForm {
    pub email: String,
    pub name: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(self) -> Result<UserRegistration, ApiError> {
        let email = self.email.trim().to_string();
        let name = self.name.trim().to_string();

        if email.is_empty() {
            return Err(ApiError::Validation("Email is required".to_string()));
        }
        let email_re = EMAIL_RE
            .as_ref()
            .map_err(|err| ApiError::Validation(err.to_string()))?;
        if !email_re.is_match(&email) {
            return Err(ApiError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(ApiError::Validation("Name is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(ApiError::Validation("Password is required".to_string()));
        }
        if self.password != self.confirm_password {
            return Err(ApiError::Validation("Passwords do not match".to_string()));
        }

        Ok(UserRegistration {
            email,
            name,
            password: self.password,
        })
    }
}

/// A task together with its resolved assignee, for the details view.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetails {
    pub task: TaskDto,
    pub assignee: Option<UserRef>,
}

impl TaskDetails {
    pub fn assignee_label(&self) -> String {
        match (&self.assignee, self.task.effective_assignee_id()) {
            (Some(user), _) if user.email.is_empty() => user.name.clone(),
            (Some(user), _) => format!("{} ({})", user.name, user.email),
            (None, Some(id)) => format!("User ID: {id}"),
            (None, None) => "Unassigned".to_string(),
        }
    }
}

impl<T: Transport> ApiClient<T> {
    #[instrument(skip(self, ctx))]
    pub async fn list_users(&self, ctx: &mut RequestContext) -> Result<Vec<UserDto>, ApiError> {
        self.fetch_users(ctx, "/users/all").await
    }

    #[instrument(skip(self, ctx))]
    pub async fn list_active_users(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Vec<UserDto>, ApiError> {
        self.fetch_users(ctx, "/users/all/active").await
    }

    #[instrument(skip(self, ctx))]
    pub async fn set_user_active(
        &self,
        ctx: &mut RequestContext,
        id: u64,
        active: bool,
    ) -> Result<(), ApiError> {
        let action = if active { "activate" } else { "deactivate" };
        let response = self
            .send(ctx, Method::Patch, &format!("/users/{action}/{id}"), None)
            .await?;
        if response.status != 200 {
            return Err(ApiError::StatusUpdate(
                response.failure(format!("Failed to {action} user")),
            ));
        }

        info!(id, active, "user status updated");
        Ok(())
    }

    #[instrument(skip(self, ctx))]
    pub async fn current_user(&self, ctx: &mut RequestContext) -> Result<UserDto, ApiError> {
        let response = self.send(ctx, Method::Get, "/users/me", None).await?;
        if response.status != 200 {
            return Err(ApiError::Server(
                response.failure("Failed to load current user"),
            ));
        }
        response.decode()
    }

    /// Registers a user; the admin endpoint creates an administrator.
    #[instrument(skip(self, ctx, registration), fields(email = %registration.email))]
    pub async fn register_user(
        &self,
        ctx: &mut RequestContext,
        registration: &UserRegistration,
        admin: bool,
    ) -> Result<UserDto, ApiError> {
        let path = if admin {
            "/users/register/admin"
        } else {
            "/users/register"
        };
        let body = json!({
            "email": registration.email,
            "name": registration.name,
            "password": registration.password,
        });

        let response = self.send(ctx, Method::Post, path, Some(body)).await?;
        if response.status != 201 {
            let message = response
                .detail()
                .unwrap_or_else(|| "Registration failed".to_string());
            return Err(ApiError::Registration(Failure::new(
                message,
                response.status,
                None,
            )));
        }

        info!(admin, "user registered");
        response.decode()
    }

    /// Loads a task and resolves its assignee. A failure while loading the
    /// user list only costs the assignee's name.
    #[instrument(skip(self, ctx))]
    pub async fn load_task_details(
        &self,
        ctx: &mut RequestContext,
        id: u64,
    ) -> Result<TaskDetails, ApiError> {
        let task = self.get_task(ctx, id).await?;

        if let Some(nested) = task.assignee.clone() {
            return Ok(TaskDetails {
                task,
                assignee: Some(nested),
            });
        }

        let Some(assignee_id) = task.assignee_id else {
            return Ok(TaskDetails {
                task,
                assignee: None,
            });
        };

        let assignee = match self.list_users(ctx).await {
            Ok(users) => users
                .into_iter()
                .find(|user| user.id == assignee_id)
                .map(|user| UserRef {
                    id: user.id,
                    name: user.name,
                    email: user.email,
                }),
            Err(err) => {
                warn!(task = id, assignee_id, error = %err, "assignee lookup failed; continuing");
                None
            }
        };

        if assignee.is_none() {
            debug!(task = id, assignee_id, "assignee did not resolve to a known user");
        }

        Ok(TaskDetails { task, assignee })
    }

    async fn fetch_users(
        &self,
        ctx: &mut RequestContext,
        path: &str,
    ) -> Result<Vec<UserDto>, ApiError> {
        let response = self.send(ctx, Method::Get, path, None).await?;
        if response.status != 200 {
            return Err(ApiError::Fetch(response.failure("Failed to fetch users")));
        }

        let users: Vec<UserDto> = response.decode()?;
        debug!(count = users.len(), "fetched users");
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, name: &str, password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn registration_checks_fields_in_order() {
        let cases = [
            (form("", "A", "p", "p"), "Email is required"),
            (form("not-an-email", "A", "p", "p"), "Please enter a valid email address"),
            (form("a@example.com", " ", "p", "p"), "Name is required"),
            (form("a@example.com", "A", "", ""), "Password is required"),
            (form("a@example.com", "A", "p", "q"), "Passwords do not match"),
        ];

        for (input, expected) in cases {
            assert_eq!(
                input.validate().unwrap_err(),
                ApiError::Validation(expected.to_string())
            );
        }

        let ok = form(" a@example.com ", " Ana ", "pw", "pw").validate().unwrap();
        assert_eq!(ok.email, "a@example.com");
        assert_eq!(ok.name, "Ana");
    }

    #[test]
    fn email_pattern_is_compiled_once_and_reused() {
        assert!(EMAIL_RE.is_ok());
        for email in ["x@y.io", "first.last@sub.example.org"] {
            assert!(form(email, "N", "p", "p").validate().is_ok());
        }
        assert!(EMAIL_RE.as_ref().is_ok_and(|re| !re.is_match("two@@signs.com")));
    }
}
